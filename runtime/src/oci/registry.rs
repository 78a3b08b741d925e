//! Registry fetch capability.
//!
//! `ImageFetcher` is the single seam between the metadata retriever and the
//! outside world; `RegistryFetcher` implements it over `oci-distribution`
//! (Docker Hub, GHCR, etc.), and tests substitute in-memory doubles.

use std::collections::HashMap;

use async_trait::async_trait;
use buildseal_core::error::{CompletionError, Result};
use chrono::{DateTime, Utc};
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference};
use oci_spec::image::ImageConfiguration;

use super::credentials::CredentialSet;
use super::reference::ImageReference;

/// Authentication credentials for a container registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Create basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Create authentication from environment variables.
    ///
    /// Reads `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`.
    /// Falls back to anonymous if not set.
    pub fn from_env() -> Self {
        let username = std::env::var("REGISTRY_USERNAME").ok();
        let password = std::env::var("REGISTRY_PASSWORD").ok();

        if username.is_some() && password.is_some() {
            Self { username, password }
        } else {
            Self::anonymous()
        }
    }

    /// Resolve authentication for a registry from the reconciled credential
    /// set, falling back to env vars, then anonymous.
    pub fn from_credential_set(creds: &CredentialSet, registry: &str) -> Self {
        if let Some((username, password)) = creds.basic_auth_for(registry) {
            return Self::basic(username, password);
        }
        Self::from_env()
    }

    /// Convert to oci-distribution auth type.
    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// An image fetched by reference, projected to what the completion step
/// needs: the label map, the creation timestamp, and the content-addressed
/// identifier (`<registry>/<repository>@<manifest digest>`).
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub labels: HashMap<String, String>,
    pub created: Option<DateTime<Utc>>,
    pub identifier: String,
}

/// Fetches an image's config and identity by reference.
///
/// Deliberately a single method so registry clients, local caches, and test
/// doubles are interchangeable.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, reference: &ImageReference) -> Result<FetchedImage>;
}

/// `ImageFetcher` backed by a remote registry.
pub struct RegistryFetcher {
    client: Client,
    creds: CredentialSet,
}

impl RegistryFetcher {
    /// Create a fetcher resolving auth per registry from the credential set.
    pub fn new(creds: CredentialSet) -> Self {
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        };
        Self {
            client: Client::new(config),
            creds,
        }
    }

    fn to_oci_reference(reference: &ImageReference) -> Result<Reference> {
        let ref_str = reference.full_reference();
        ref_str
            .parse::<Reference>()
            .map_err(|e| CompletionError::ReferenceParse(format!("'{}': {}", ref_str, e)))
    }
}

#[async_trait]
impl ImageFetcher for RegistryFetcher {
    async fn fetch(&self, reference: &ImageReference) -> Result<FetchedImage> {
        let oci_ref = Self::to_oci_reference(reference)?;
        let auth = RegistryAuth::from_credential_set(&self.creds, &reference.registry).to_oci_auth();

        tracing::info!(reference = %reference, "Fetching image manifest");

        // Pull the manifest (resolves multi-arch indexes) and the manifest
        // digest, which is the image's content-addressed identity.
        let (manifest, manifest_digest) = self
            .client
            .pull_image_manifest(&oci_ref, &auth)
            .await
            .map_err(|e| CompletionError::Fetch {
                reference: reference.to_string(),
                message: format!("failed to pull manifest: {}", e),
            })?;

        // Pull the config blob; labels and the creation timestamp live there.
        let mut config_data: Vec<u8> = Vec::new();
        self.client
            .pull_blob(&oci_ref, &manifest.config, &mut config_data)
            .await
            .map_err(|e| CompletionError::Fetch {
                reference: reference.to_string(),
                message: format!("failed to pull config blob: {}", e),
            })?;

        let config: ImageConfiguration =
            serde_json::from_slice(&config_data).map_err(|e| CompletionError::Fetch {
                reference: reference.to_string(),
                message: format!("invalid image config: {}", e),
            })?;

        let labels = config
            .config()
            .as_ref()
            .and_then(|c| c.labels().clone())
            .unwrap_or_default();

        let created = config
            .created()
            .as_deref()
            .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
            .map(|t| t.with_timezone(&Utc));

        Ok(FetchedImage {
            labels,
            created,
            identifier: format!("{}@{}", reference.repository_root(), manifest_digest),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_auth_anonymous() {
        let auth = RegistryAuth::anonymous();
        assert!(matches!(auth.to_oci_auth(), OciRegistryAuth::Anonymous));
    }

    #[test]
    fn test_registry_auth_basic() {
        let auth = RegistryAuth::basic("user", "pass");
        assert!(matches!(auth.to_oci_auth(), OciRegistryAuth::Basic(_, _)));
    }

    #[test]
    fn test_auth_resolution_from_credential_set() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".dockerconfigjson"),
            r#"{"auths": {"reg.example.com": {"username": "u", "password": "p"}}}"#,
        )
        .unwrap();
        let set = CredentialSet::from_dockerconfigjson_secret(dir.path()).unwrap();

        let auth = RegistryAuth::from_credential_set(&set, "reg.example.com");
        assert_eq!(auth.username.as_deref(), Some("u"));
        assert_eq!(auth.password.as_deref(), Some("p"));
    }

    #[test]
    fn test_to_oci_reference() {
        let reference = ImageReference::parse("ghcr.io/org/app:v1").unwrap();
        let oci_ref = RegistryFetcher::to_oci_reference(&reference).unwrap();
        assert_eq!(oci_ref.to_string(), "ghcr.io/org/app:v1");
    }

    #[test]
    fn test_to_oci_reference_with_digest() {
        let reference = ImageReference::parse(
            "reg.io/app:latest@sha256:0fd6395e4fe38a0c089665cbe10f52fb26fc64b4b15e672ada412bd7ab5499a0",
        )
        .unwrap();
        let oci_ref = RegistryFetcher::to_oci_reference(&reference).unwrap();
        assert!(oci_ref.to_string().contains("sha256:"));
    }
}
