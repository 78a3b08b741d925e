//! Buildseal CLI — flag surface and completion-run orchestration.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use buildseal_core::config::{
    CompletionConfig, CACHE_TAG_ENV_VAR, COSIGN_SECRET_DIR, NOTARY_SECRET_DIR,
    REGISTRY_SECRETS_DIR, REPORT_FILE_PATH, TERMINATION_MESSAGE_PATH,
};
use buildseal_core::error::Result;
use buildseal_runtime::oci::credentials::{default_docker_config_path, CredentialSet};
use buildseal_runtime::{
    signing_requests, BuildStatusMetadata, ExportReport, GzipStatusCodec, ImageReference,
    RegistryFetcher, RemoteMetadataRetriever, SigningDispatcher,
};

/// Build completion step — records what was built and signs the result.
#[derive(Debug, Parser)]
#[command(name = "buildseal", version, about)]
pub struct Args {
    /// Tag of the image cache
    #[arg(long)]
    pub cache_tag: Option<String>,

    /// Notary V1 server url
    #[arg(long)]
    pub notary_v1_url: Option<String>,

    /// Basic authentication for docker of the form 'secretname=docker.domain.com'
    #[arg(long = "basic-docker")]
    pub basic_docker: Vec<String>,

    /// Docker Cfg credential secret name (legacy single-file format)
    #[arg(long = "dockercfg")]
    pub dockercfg: Vec<String>,

    /// Docker Config JSON credential secret name
    #[arg(long = "dockerconfig")]
    pub dockerconfig: Vec<String>,

    /// Cosign custom signing annotation of the form 'key=value'
    #[arg(long = "cosign-annotations")]
    pub cosign_annotations: Vec<String>,

    /// Cosign signing repository of the form 'secretname=registry.example.com/project'
    #[arg(long = "cosign-repositories")]
    pub cosign_repositories: Vec<String>,

    /// Cosign legacy docker media types flag of the form 'secretname=1'
    #[arg(long = "cosign-docker-media-types")]
    pub cosign_docker_media_types: Vec<String>,

    /// Path to the lifecycle export report
    #[arg(long, default_value = REPORT_FILE_PATH)]
    pub report_path: PathBuf,

    /// Directory holding registry credential secrets
    #[arg(long, default_value = REGISTRY_SECRETS_DIR)]
    pub registry_secrets_dir: PathBuf,

    /// Directory holding cosign key material
    #[arg(long, default_value = COSIGN_SECRET_DIR)]
    pub cosign_secret_dir: PathBuf,

    /// Directory holding notary v1 auth material
    #[arg(long, default_value = NOTARY_SECRET_DIR)]
    pub notary_secret_dir: PathBuf,

    /// Path the serialized completion record is written to
    #[arg(long, default_value = TERMINATION_MESSAGE_PATH)]
    pub termination_message_path: PathBuf,
}

impl Args {
    /// Freeze the flag surface into the immutable run configuration.
    pub fn into_config(self) -> CompletionConfig {
        CompletionConfig {
            report_path: self.report_path,
            registry_secrets_dir: self.registry_secrets_dir,
            cosign_secret_dir: self.cosign_secret_dir,
            notary_secret_dir: self.notary_secret_dir,
            termination_message_path: self.termination_message_path,
            cache_tag: self
                .cache_tag
                .or_else(|| std::env::var(CACHE_TAG_ENV_VAR).ok()),
            notary_v1_url: self.notary_v1_url,
            basic_auth_secrets: self.basic_docker,
            dockercfg_secrets: self.dockercfg,
            dockerconfig_secrets: self.dockerconfig,
            cosign_annotations: self.cosign_annotations,
            cosign_repositories: self.cosign_repositories,
            cosign_docker_media_types: self.cosign_docker_media_types,
        }
    }
}

/// Run the completion step.
///
/// Every failure is terminal; the caller turns it into a non-zero exit.
pub async fn run(config: &CompletionConfig) -> Result<()> {
    let creds = load_credentials(config)?;
    creds.save(&default_docker_config_path()?)?;

    let report = ExportReport::decode_file(&config.report_path)?;
    let built_image_ref = report.built_image_reference()?;

    let fetcher = Arc::new(RegistryFetcher::new(creds));
    let retriever = RemoteMetadataRetriever::new(fetcher);

    let cache_image_ref = match config.cache_tag() {
        Some(tag) => {
            let reference = ImageReference::parse(tag)?;
            Some(retriever.get_cache_image(&reference).await?)
        }
        None => None,
    };

    let built_reference = ImageReference::parse(&built_image_ref)?;
    let built_image = retriever.get_built_image(&built_reference).await?;

    let status = BuildStatusMetadata::assemble(
        &built_image,
        &built_image_ref,
        cache_image_ref.as_deref(),
    );
    let encoded = GzipStatusCodec::encode(&status)?;
    std::fs::write(&config.termination_message_path, encoded)?;

    let requests = signing_requests(config)?;
    if !requests.is_empty() {
        SigningDispatcher::new().dispatch(&requests, &report).await?;
    }

    info!("Build successful");
    Ok(())
}

/// Merge credentials from all secret sources, in flag-category order:
/// basic-auth secrets first, then legacy docker cfg, then docker config
/// JSON. Later sources overwrite same-domain entries.
fn load_credentials(config: &CompletionConfig) -> Result<CredentialSet> {
    let mut creds = CredentialSet::from_basic_auth_secrets(
        &config.registry_secrets_dir,
        &config.basic_auth_secrets,
    )?;

    for name in &config.dockercfg_secrets {
        let secret_dir = config.registry_secrets_dir.join(name);
        let additional = CredentialSet::from_dockercfg_secret(&secret_dir)?;
        log_loaded_domains(&additional, name, &secret_dir);
        creds = creds.merge(additional);
    }

    for name in &config.dockerconfig_secrets {
        let secret_dir = config.registry_secrets_dir.join(name);
        let additional = CredentialSet::from_dockerconfigjson_secret(&secret_dir)?;
        log_loaded_domains(&additional, name, &secret_dir);
        creds = creds.merge(additional);
    }
    Ok(creds)
}

fn log_loaded_domains(set: &CredentialSet, secret: &str, location: &std::path::Path) {
    for domain in set.domains() {
        info!(
            domain,
            secret,
            location = %location.display(),
            "Loading registry credential"
        );
    }
}
