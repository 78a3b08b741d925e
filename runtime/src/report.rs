//! Lifecycle export report.
//!
//! The build-export step leaves a TOML report describing what it pushed;
//! this is the completion step's sole input besides the registry itself.

use std::path::Path;

use buildseal_core::error::{CompletionError, Result};
use serde::{Deserialize, Serialize};

/// Report written by the export phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    #[serde(default)]
    pub image: ImageReport,
}

/// The image section of the export report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImageReport {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub image_id: String,
    #[serde(default)]
    pub manifest_size: i64,
}

impl ExportReport {
    /// Decode a report from a TOML file.
    pub fn decode_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            CompletionError::ReportDecode(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&data).map_err(|e| CompletionError::ReportDecode(e.to_string()))
    }

    /// The digest-qualified reference of the built image:
    /// `<first tag>@<digest>`, used verbatim as the fetch target.
    pub fn built_image_reference(&self) -> Result<String> {
        let tag = self
            .image
            .tags
            .first()
            .ok_or(CompletionError::NoImageInReport)?;
        Ok(format!("{}@{}", tag, self.image.digest))
    }
}
