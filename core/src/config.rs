use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default directory holding registry credential secrets.
pub const REGISTRY_SECRETS_DIR: &str = "/var/build-secrets";

/// Default path of the lifecycle export report.
pub const REPORT_FILE_PATH: &str = "/var/report/report.toml";

/// Default directory holding notary v1 auth material.
pub const NOTARY_SECRET_DIR: &str = "/var/notary/v1";

/// Default directory holding cosign key material. Its presence is the
/// activation signal for the content-signing backend.
pub const COSIGN_SECRET_DIR: &str = "/var/build-secrets/cosign";

/// Default path the serialized completion record is written to.
pub const TERMINATION_MESSAGE_PATH: &str = "/dev/termination-log";

/// Environment variable consulted when no cache tag flag is given.
pub const CACHE_TAG_ENV_VAR: &str = "CACHE_TAG";

/// Completion step configuration.
///
/// Built once at process start from the flag surface and treated as
/// immutable for the remainder of the run. Components receive it by
/// reference; nothing reads process-wide state after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Path to the lifecycle export report
    pub report_path: PathBuf,

    /// Directory holding registry credential secrets
    pub registry_secrets_dir: PathBuf,

    /// Directory holding cosign key material
    pub cosign_secret_dir: PathBuf,

    /// Directory holding notary v1 auth material
    pub notary_secret_dir: PathBuf,

    /// Path the serialized completion record is written to
    pub termination_message_path: PathBuf,

    /// Tag of the build cache image, if one was exported
    pub cache_tag: Option<String>,

    /// Notary V1 server url; non-empty activates notarization
    pub notary_v1_url: Option<String>,

    /// Basic auth secrets of the form 'secretname=registry.domain'
    pub basic_auth_secrets: Vec<String>,

    /// Legacy single-file docker cfg secret names
    pub dockercfg_secrets: Vec<String>,

    /// Docker config JSON secret names
    pub dockerconfig_secrets: Vec<String>,

    /// Cosign signing annotations ('key=value')
    pub cosign_annotations: Vec<String>,

    /// Cosign signing repositories ('secretname=registry.example.com/project')
    pub cosign_repositories: Vec<String>,

    /// Cosign legacy docker media type flags ('secretname=1')
    pub cosign_docker_media_types: Vec<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            report_path: PathBuf::from(REPORT_FILE_PATH),
            registry_secrets_dir: PathBuf::from(REGISTRY_SECRETS_DIR),
            cosign_secret_dir: PathBuf::from(COSIGN_SECRET_DIR),
            notary_secret_dir: PathBuf::from(NOTARY_SECRET_DIR),
            termination_message_path: PathBuf::from(TERMINATION_MESSAGE_PATH),
            cache_tag: None,
            notary_v1_url: None,
            basic_auth_secrets: Vec::new(),
            dockercfg_secrets: Vec::new(),
            dockerconfig_secrets: Vec::new(),
            cosign_annotations: Vec::new(),
            cosign_repositories: Vec::new(),
            cosign_docker_media_types: Vec::new(),
        }
    }
}

impl CompletionConfig {
    /// The cache tag, treating an empty string as unset.
    pub fn cache_tag(&self) -> Option<&str> {
        self.cache_tag.as_deref().filter(|t| !t.is_empty())
    }

    /// The notary server url, treating an empty string as unset.
    pub fn notary_v1_url(&self) -> Option<&str> {
        self.notary_v1_url.as_deref().filter(|u| !u.is_empty())
    }
}
