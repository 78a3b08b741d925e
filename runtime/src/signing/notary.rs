//! Notarization backend (notary v1).
//!
//! Publishes a hash target per exported tag: the target bytes come straight
//! from the report (manifest digest + manifest size), so no image content is
//! re-fetched. The trust directory lives under the mounted secret path.

use async_trait::async_trait;
use buildseal_core::error::{CompletionError, Result};
use tokio::process::Command;

use super::{BackendKind, SigningBackend, SigningRequest};
use crate::oci::reference::ImageReference;
use crate::report::ExportReport;

const NOTARY_COMMAND: &str = "notary";

/// Publishes trust data for exported images to a notary v1 server.
pub struct NotarySigner {
    command: String,
}

impl NotarySigner {
    pub fn new() -> Self {
        Self {
            command: NOTARY_COMMAND.to_string(),
        }
    }

    fn backend_error(&self, message: String) -> CompletionError {
        CompletionError::SignBackend {
            backend: self.kind().to_string(),
            message,
        }
    }
}

impl Default for NotarySigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SigningBackend for NotarySigner {
    fn kind(&self) -> BackendKind {
        BackendKind::Notary
    }

    async fn sign(&self, report: &ExportReport, request: &SigningRequest) -> Result<()> {
        let url = request
            .notary_url
            .as_deref()
            .ok_or_else(|| self.backend_error("notary server url not configured".to_string()))?;

        if report.image.tags.is_empty() {
            return Err(CompletionError::NoImageInReport);
        }

        let digest_hex = report
            .image
            .digest
            .strip_prefix("sha256:")
            .ok_or_else(|| {
                self.backend_error(format!(
                    "report digest is not sha256-qualified: '{}'",
                    report.image.digest
                ))
            })?;
        if report.image.manifest_size <= 0 {
            return Err(self.backend_error("report carries no manifest size".to_string()));
        }

        for tag in &report.image.tags {
            let reference = ImageReference::parse(tag)?;
            let gun = reference.repository_root();
            let version = reference.identifier();

            tracing::info!(gun = %gun, version = %version, server = %url, "Publishing notary target");

            let output = Command::new(&self.command)
                .arg("-s")
                .arg(url)
                .arg("-d")
                .arg(&request.secret_path)
                .arg("addhash")
                .arg(&gun)
                .arg(version)
                .arg(report.image.manifest_size.to_string())
                .arg("--sha256")
                .arg(digest_hex)
                .arg("--publish")
                .output()
                .await
                .map_err(|e| {
                    self.backend_error(format!("failed to run {}: {}", self.command, e))
                })?;

            if !output.status.success() {
                return Err(self.backend_error(format!(
                    "publishing target for {} failed: {}",
                    tag,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ImageReport;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn notary_request(url: Option<&str>) -> SigningRequest {
        SigningRequest {
            kind: BackendKind::Notary,
            secret_path: PathBuf::from("/var/notary/v1"),
            annotations: BTreeMap::new(),
            repositories: BTreeMap::new(),
            media_types: BTreeMap::new(),
            notary_url: url.map(String::from),
        }
    }

    fn report(tags: &[&str], digest: &str, manifest_size: i64) -> ExportReport {
        ExportReport {
            image: ImageReport {
                tags: tags.iter().map(|t| t.to_string()).collect(),
                digest: digest.to_string(),
                manifest_size,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_missing_url_is_backend_error() {
        let signer = NotarySigner::new();
        let err = signer
            .sign(
                &report(&["reg.io/app:latest"], "sha256:abc", 1024),
                &notary_request(None),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::SignBackend { .. }));
    }

    #[tokio::test]
    async fn test_empty_tag_list_is_rejected() {
        let signer = NotarySigner::new();
        let err = signer
            .sign(
                &report(&[], "sha256:abc", 1024),
                &notary_request(Some("https://notary.example.com")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::NoImageInReport));
    }

    #[tokio::test]
    async fn test_unqualified_digest_is_rejected() {
        let signer = NotarySigner::new();
        let err = signer
            .sign(
                &report(&["reg.io/app:latest"], "abc123", 1024),
                &notary_request(Some("https://notary.example.com")),
            )
            .await
            .unwrap_err();
        match err {
            CompletionError::SignBackend { message, .. } => {
                assert!(message.contains("not sha256-qualified"));
            }
            other => panic!("expected SignBackend, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_manifest_size_is_rejected() {
        let signer = NotarySigner::new();
        let err = signer
            .sign(
                &report(&["reg.io/app:latest"], "sha256:abc", 0),
                &notary_request(Some("https://notary.example.com")),
            )
            .await
            .unwrap_err();
        match err {
            CompletionError::SignBackend { message, .. } => {
                assert!(message.contains("manifest size"));
            }
            other => panic!("expected SignBackend, got {:?}", other),
        }
    }
}
