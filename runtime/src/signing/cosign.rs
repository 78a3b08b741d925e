//! Content-signing backend (cosign).
//!
//! Key material is mounted one directory per secret under the cosign secret
//! path; each key signs the digest-qualified built image. Per-secret
//! repository and media-type overrides are keyed by secret name, matching
//! the `secretname=value` flag form they were parsed from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use buildseal_core::error::{CompletionError, Result};
use tokio::process::Command;

use super::{BackendKind, SigningBackend, SigningRequest};
use crate::report::ExportReport;

const COSIGN_COMMAND: &str = "cosign";
const KEY_FILE_NAME: &str = "cosign.key";
const PASSWORD_FILE_NAME: &str = "cosign.password";

/// Signs images with cosign keys found under the secret directory.
pub struct CosignSigner {
    command: String,
}

impl CosignSigner {
    pub fn new() -> Self {
        Self {
            command: COSIGN_COMMAND.to_string(),
        }
    }
}

impl Default for CosignSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SigningBackend for CosignSigner {
    fn kind(&self) -> BackendKind {
        BackendKind::Cosign
    }

    async fn sign(&self, report: &ExportReport, request: &SigningRequest) -> Result<()> {
        let target = report.built_image_reference()?;
        let keys = discover_keys(&request.secret_path)?;

        if keys.is_empty() {
            return Err(CompletionError::SignBackend {
                backend: self.kind().to_string(),
                message: format!("no keys found in {}", request.secret_path.display()),
            });
        }

        for key in keys {
            tracing::info!(secret = %key.secret_name, image = %target, "Signing with cosign key");
            self.sign_with_key(&target, &key, request).await?;
        }
        Ok(())
    }
}

impl CosignSigner {
    async fn sign_with_key(
        &self,
        target: &str,
        key: &CosignKey,
        request: &SigningRequest,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.command);
        cmd.arg("sign").arg("--key").arg(&key.key_path);

        for (name, value) in &request.annotations {
            cmd.arg("-a").arg(format!("{}={}", name, value));
        }
        cmd.arg(target);

        // COSIGN_PASSWORD must always be present; an unencrypted key pairs
        // with an empty password.
        cmd.env("COSIGN_PASSWORD", key.password.as_deref().unwrap_or(""));
        if let Some(repository) = request.repositories.get(&key.secret_name) {
            cmd.env("COSIGN_REPOSITORY", repository);
        }
        if let Some(media_types) = request.media_types.get(&key.secret_name) {
            cmd.env("COSIGN_DOCKER_MEDIA_TYPES", media_types);
        }

        let output = cmd.output().await.map_err(|e| CompletionError::SignBackend {
            backend: self.kind().to_string(),
            message: format!("failed to run {}: {}", self.command, e),
        })?;

        if !output.status.success() {
            return Err(CompletionError::SignBackend {
                backend: self.kind().to_string(),
                message: format!(
                    "signing {} with secret {} failed: {}",
                    target,
                    key.secret_name,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

struct CosignKey {
    secret_name: String,
    key_path: PathBuf,
    password: Option<String>,
}

/// Enumerate secret directories containing a `cosign.key`, sorted by name.
fn discover_keys(secret_dir: &Path) -> Result<Vec<CosignKey>> {
    let entries = std::fs::read_dir(secret_dir).map_err(|e| CompletionError::SignBackend {
        backend: BackendKind::Cosign.to_string(),
        message: format!("failed to read {}: {}", secret_dir.display(), e),
    })?;

    let mut keys = Vec::new();
    for entry in entries {
        let entry = entry.map_err(CompletionError::Io)?;
        let key_path = entry.path().join(KEY_FILE_NAME);
        if !key_path.is_file() {
            continue;
        }
        let password = std::fs::read_to_string(entry.path().join(PASSWORD_FILE_NAME))
            .ok()
            .map(|p| p.trim_end().to_string());
        keys.push(CosignKey {
            secret_name: entry.file_name().to_string_lossy().into_owned(),
            key_path,
            password,
        });
    }
    keys.sort_by(|a, b| a.secret_name.cmp(&b.secret_name));
    Ok(keys)
}
