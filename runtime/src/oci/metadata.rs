//! Build metadata retrieval from OCI labels.
//!
//! A freshly exported image carries three labels describing what was built:
//!
//! - `io.buildpacks.stack.id` — the stack identifier (plain string)
//! - `io.buildpacks.build.metadata` — the ordered buildpack list (JSON)
//! - `io.buildpacks.lifecycle.metadata` — layer metadata (JSON), including
//!   the run-image reference actually used and the legacy stack run-image
//!
//! The canonical stack run-image pointer is reconstructed by crossing two
//! label sub-trees: the legacy `stack.runImage.image` field names the
//! repository, the newer `runImage.reference` field names the concrete
//! digest. The result is always `<repository>@<digest>`, never a tag.

use std::sync::Arc;

use buildseal_core::error::{CompletionError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::reference::ImageReference;
use super::registry::{FetchedImage, ImageFetcher};

/// Label holding the stack identifier.
pub const STACK_ID_LABEL: &str = "io.buildpacks.stack.id";

/// Label holding the buildpack list.
pub const BUILD_METADATA_LABEL: &str = "io.buildpacks.build.metadata";

/// Label holding layer metadata, including run-image references.
pub const LAYER_METADATA_LABEL: &str = "io.buildpacks.lifecycle.metadata";

/// One buildpack that participated in the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackMetadata {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

/// Metadata retrieved from a freshly built image. Immutable after
/// construction; one instance per retrieval call.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltImage {
    /// Content-addressed identifier: `<registry>/<repository>@<digest>`
    pub identifier: String,
    /// Image creation timestamp from the config
    pub completed_at: DateTime<Utc>,
    /// Ordered buildpack descriptors
    pub buildpacks: Vec<BuildpackMetadata>,
    /// Base stack descriptor
    pub stack: BuiltImageStack,
}

/// Base-stack descriptor of a built image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImageStack {
    /// Reconstructed run-image pointer: `<repository>@<digest>`
    pub run_image: String,
    /// Stack identifier
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct BuildMetadata {
    #[serde(default)]
    buildpacks: Vec<BuildpackMetadata>,
}

#[derive(Debug, Deserialize)]
struct LayerMetadata {
    // The app layer list is never consumed here, but its schema changed
    // across lifecycle versions and both shapes must decode.
    #[serde(default, rename = "app")]
    _app: AppLayers,
    #[serde(rename = "runImage")]
    run_image: RunImageMetadata,
    stack: StackMetadata,
}

/// App layer metadata: a single object in lifecycle 0.5, a list from 0.6 on.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AppLayers {
    One(AppLayerMetadata),
    Many(Vec<AppLayerMetadata>),
}

impl Default for AppLayers {
    fn default() -> Self {
        AppLayers::Many(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct AppLayerMetadata {
    #[serde(default, rename = "sha")]
    _sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunImageMetadata {
    reference: String,
}

#[derive(Debug, Deserialize)]
struct StackMetadata {
    #[serde(rename = "runImage")]
    run_image: StackRunImage,
}

#[derive(Debug, Deserialize)]
struct StackRunImage {
    image: String,
}

/// Retrieves build metadata from remote images through an injected fetch
/// capability.
pub struct RemoteMetadataRetriever {
    fetcher: Arc<dyn ImageFetcher>,
}

impl RemoteMetadataRetriever {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch the built image and decode its build metadata.
    ///
    /// Fails if any of the three metadata labels is absent or malformed;
    /// there are no partial results.
    pub async fn get_built_image(&self, reference: &ImageReference) -> Result<BuiltImage> {
        let image = self.fetcher.fetch(reference).await?;
        read_built_image(image)
    }

    /// Fetch the cache image and return its content-addressed identifier.
    pub async fn get_cache_image(&self, reference: &ImageReference) -> Result<String> {
        let image = self.fetcher.fetch(reference).await?;
        Ok(image.identifier)
    }
}

fn read_built_image(image: FetchedImage) -> Result<BuiltImage> {
    let stack_id = string_label(&image, STACK_ID_LABEL)?;
    let build_metadata: BuildMetadata = json_label(&image, BUILD_METADATA_LABEL)?;
    let layer_metadata: LayerMetadata = json_label(&image, LAYER_METADATA_LABEL)?;

    let run_image_ref = ImageReference::parse(&layer_metadata.run_image.reference)?;
    let base_image_ref = ImageReference::parse(&layer_metadata.stack.run_image.image)?;

    let completed_at = image.created.ok_or_else(|| CompletionError::Fetch {
        reference: image.identifier.clone(),
        message: "image config has no creation timestamp".to_string(),
    })?;

    Ok(BuiltImage {
        identifier: image.identifier,
        completed_at,
        buildpacks: build_metadata.buildpacks,
        stack: BuiltImageStack {
            // Repository from the legacy stack label, digest from the
            // run-image reference actually used for this build.
            run_image: format!(
                "{}@{}",
                base_image_ref.repository_root(),
                run_image_ref.identifier()
            ),
            id: stack_id,
        },
    })
}

fn string_label(image: &FetchedImage, label: &str) -> Result<String> {
    image
        .labels
        .get(label)
        .cloned()
        .ok_or_else(|| CompletionError::LabelMissing {
            label: label.to_string(),
        })
}

fn json_label<T: DeserializeOwned>(image: &FetchedImage, label: &str) -> Result<T> {
    let raw = string_label(image, label)?;
    serde_json::from_str(&raw).map_err(|e| CompletionError::LabelDecode {
        label: label.to_string(),
        message: e.to_string(),
    })
}
