//! Image signing dispatch.
//!
//! Activation is decided once, up front: the presence of cosign key material
//! activates the content-signing backend, a configured notary server url
//! activates notarization. The result is an explicit list of
//! [`SigningRequest`]s — adding a backend is a data change, not a
//! control-flow change. Requests run sequentially, content signing first,
//! and the first failure aborts the whole dispatch.

pub mod cosign;
pub mod notary;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use buildseal_core::config::CompletionConfig;
use buildseal_core::error::{CompletionError, Result};

use crate::report::ExportReport;
use self::cosign::CosignSigner;
use self::notary::NotarySigner;

/// The signing backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Content signing (cosign-style signatures pushed to the registry)
    Cosign,
    /// Notary v1 trust publication
    Notary,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Cosign => write!(f, "cosign"),
            BackendKind::Notary => write!(f, "notary"),
        }
    }
}

/// Per-backend signing parameters, constructed fresh per run.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    pub kind: BackendKind,
    /// Location of the backend's secret material
    pub secret_path: PathBuf,
    /// Custom signing annotations (cosign)
    pub annotations: BTreeMap<String, String>,
    /// Per-secret target repositories (cosign)
    pub repositories: BTreeMap<String, String>,
    /// Per-secret legacy docker media type flags (cosign)
    pub media_types: BTreeMap<String, String>,
    /// Notary server url (notary)
    pub notary_url: Option<String>,
}

/// Parse repeated `key=value` arguments into an override map.
///
/// Arguments with anything other than exactly one `=` are rejected; this
/// runs before any signing attempt.
pub fn parse_key_value_args(args: &[String]) -> Result<BTreeMap<String, String>> {
    let mut overrides = BTreeMap::new();
    for arg in args {
        let mut parts = arg.splitn(3, '=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => {
                overrides.insert(key.to_string(), value.to_string());
            }
            _ => return Err(CompletionError::OverrideArgParse(arg.clone())),
        }
    }
    Ok(overrides)
}

/// Build the list of active signing requests from the configuration.
///
/// Neither activation condition holding yields an empty list — not an
/// error. Override parse failures surface here, before any backend runs.
pub fn signing_requests(config: &CompletionConfig) -> Result<Vec<SigningRequest>> {
    let mut requests = Vec::new();

    if config.cosign_secret_dir.exists() {
        requests.push(SigningRequest {
            kind: BackendKind::Cosign,
            secret_path: config.cosign_secret_dir.clone(),
            annotations: parse_key_value_args(&config.cosign_annotations)?,
            repositories: parse_key_value_args(&config.cosign_repositories)?,
            media_types: parse_key_value_args(&config.cosign_docker_media_types)?,
            notary_url: None,
        });
    }

    if let Some(url) = config.notary_v1_url() {
        requests.push(SigningRequest {
            kind: BackendKind::Notary,
            secret_path: config.notary_secret_dir.clone(),
            annotations: BTreeMap::new(),
            repositories: BTreeMap::new(),
            media_types: BTreeMap::new(),
            notary_url: Some(url.to_string()),
        });
    }

    Ok(requests)
}

/// A signing capability.
///
/// Uniform contract so new backends slot into the dispatcher without
/// altering its control flow.
#[async_trait]
pub trait SigningBackend: Send + Sync {
    /// The request kind this backend serves.
    fn kind(&self) -> BackendKind;

    /// Sign the images named by the report using the request's secret
    /// material and overrides.
    async fn sign(&self, report: &ExportReport, request: &SigningRequest) -> Result<()>;
}

/// Invokes the active signing backends in request order.
pub struct SigningDispatcher {
    backends: Vec<Arc<dyn SigningBackend>>,
}

impl SigningDispatcher {
    /// Dispatcher over the production backends.
    pub fn new() -> Self {
        Self::with_backends(vec![
            Arc::new(CosignSigner::new()) as Arc<dyn SigningBackend>,
            Arc::new(NotarySigner::new()) as Arc<dyn SigningBackend>,
        ])
    }

    /// Dispatcher over caller-supplied backends (test doubles included).
    pub fn with_backends(backends: Vec<Arc<dyn SigningBackend>>) -> Self {
        Self { backends }
    }

    /// Run each request against its backend, in order. The first failure
    /// aborts the dispatch; later backends are never attempted.
    pub async fn dispatch(&self, requests: &[SigningRequest], report: &ExportReport) -> Result<()> {
        for request in requests {
            let backend = self
                .backends
                .iter()
                .find(|b| b.kind() == request.kind)
                .ok_or_else(|| CompletionError::SignBackend {
                    backend: request.kind.to_string(),
                    message: "no backend registered".to_string(),
                })?;

            tracing::info!(backend = %request.kind, "Signing image");

            backend.sign(report, request).await.map_err(|e| match e {
                e @ CompletionError::SignBackend { .. } => e,
                other => CompletionError::SignBackend {
                    backend: request.kind.to_string(),
                    message: other.to_string(),
                },
            })?;
        }
        Ok(())
    }
}

impl Default for SigningDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
