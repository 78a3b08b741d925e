//! Registry credential reconciliation.
//!
//! Credentials arrive from three kinds of mounted secrets — basic-auth
//! `secretname=domain` pairs, legacy single-file `.dockercfg` secrets, and
//! `.dockerconfigjson` secrets. They merge into one domain-keyed set
//! (last writer wins) and flush to a standard docker `config.json` so
//! collaborators using ambient credential discovery can find them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use buildseal_core::error::{CompletionError, Result};
use serde::{Deserialize, Serialize};

/// One registry auth entry, in docker config.json shape.
///
/// Either `auth` (base64 of `user:pass`) or the explicit username/password
/// pair may be present; real docker configs contain both shapes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl AuthEntry {
    /// Build an entry from a username/password pair, encoding the `auth`
    /// field the way `docker login` does.
    pub fn basic(username: &str, password: &str) -> Self {
        Self {
            auth: Some(BASE64.encode(format!("{}:{}", username, password))),
            username: None,
            password: None,
        }
    }

    /// Resolve to a `(username, password)` pair if possible.
    pub fn resolve(&self) -> Option<(String, String)> {
        if let (Some(u), Some(p)) = (&self.username, &self.password) {
            return Some((u.clone(), p.clone()));
        }
        let decoded = BASE64.decode(self.auth.as_deref()?).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (u, p) = decoded.split_once(':')?;
        Some((u.to_string(), p.to_string()))
    }
}

/// On-disk docker `config.json` shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DockerConfigFile {
    auths: BTreeMap<String, AuthEntry>,
}

/// Domain-keyed registry credential set.
///
/// Constructed once per run from the secret sources, then treated as
/// immutable.
#[derive(Debug, Clone, Default)]
pub struct CredentialSet {
    entries: BTreeMap<String, AuthEntry>,
}

impl CredentialSet {
    /// Parse basic-auth secrets.
    ///
    /// Each argument is `secretname=registry.domain`; the secret directory
    /// `<dir>/<secretname>` holds `username` and `password` files.
    pub fn from_basic_auth_secrets(dir: &Path, args: &[String]) -> Result<Self> {
        let mut set = Self::default();
        for arg in args {
            let (name, domain) = arg.split_once('=').ok_or_else(|| {
                CompletionError::CredentialParse(format!(
                    "secret argument not formatted as 'secretname=domain': {}",
                    arg
                ))
            })?;
            if name.is_empty() || domain.is_empty() {
                return Err(CompletionError::CredentialParse(format!(
                    "secret argument not formatted as 'secretname=domain': {}",
                    arg
                )));
            }

            let secret_dir = dir.join(name);
            let username = read_secret_file(&secret_dir.join("username"))?;
            let password = read_secret_file(&secret_dir.join("password"))?;

            set.entries.insert(
                normalize_registry(domain),
                AuthEntry::basic(username.trim_end(), password.trim_end()),
            );
        }
        Ok(set)
    }

    /// Parse a legacy single-file `.dockercfg` secret: a bare
    /// `domain -> entry` map with no `auths` wrapper.
    pub fn from_dockercfg_secret(secret_dir: &Path) -> Result<Self> {
        let path = secret_dir.join(".dockercfg");
        let data = read_secret_file(&path)?;
        let raw: BTreeMap<String, AuthEntry> = serde_json::from_str(&data).map_err(|e| {
            CompletionError::CredentialParse(format!(
                "invalid .dockercfg at {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::from_raw(raw))
    }

    /// Parse a `.dockerconfigjson` secret: `{"auths": {domain: entry}}`.
    pub fn from_dockerconfigjson_secret(secret_dir: &Path) -> Result<Self> {
        let path = secret_dir.join(".dockerconfigjson");
        let data = read_secret_file(&path)?;
        let config: DockerConfigFile = serde_json::from_str(&data).map_err(|e| {
            CompletionError::CredentialParse(format!(
                "invalid .dockerconfigjson at {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::from_raw(config.auths))
    }

    fn from_raw(raw: BTreeMap<String, AuthEntry>) -> Self {
        let entries = raw
            .into_iter()
            .map(|(domain, entry)| (normalize_registry(&domain), entry))
            .collect();
        Self { entries }
    }

    /// Merge `additional` into this set. Entries from `additional` overwrite
    /// same-domain entries already present; other domains are unaffected.
    /// Merge order is caller-controlled.
    pub fn merge(mut self, additional: CredentialSet) -> CredentialSet {
        self.entries.extend(additional.entries);
        self
    }

    /// Look up the entry for a registry domain.
    pub fn get(&self, registry: &str) -> Option<&AuthEntry> {
        self.entries.get(&normalize_registry(registry))
    }

    /// Resolve a `(username, password)` pair for a registry domain.
    pub fn basic_auth_for(&self, registry: &str) -> Option<(String, String)> {
        self.get(registry).and_then(AuthEntry::resolve)
    }

    /// The registry domains present in the set, sorted.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the merged set as a docker `config.json` atomically
    /// (write tmp, rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CompletionError::CredentialWrite(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = DockerConfigFile {
            auths: self.entries.clone(),
        };
        let data = serde_json::to_string_pretty(&file)
            .map_err(|e| CompletionError::CredentialWrite(e.to_string()))?;

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &data).map_err(|e| {
            CompletionError::CredentialWrite(format!(
                "failed to write {}: {}",
                tmp_path.display(),
                e
            ))
        })?;
        std::fs::rename(&tmp_path, path).map_err(|e| {
            CompletionError::CredentialWrite(format!(
                "failed to rename {} -> {}: {}",
                tmp_path.display(),
                path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

/// Default flush location: `~/.docker/config.json`.
pub fn default_docker_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        CompletionError::CredentialWrite("cannot determine home directory".to_string())
    })?;
    Ok(home.join(".docker").join("config.json"))
}

fn read_secret_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        CompletionError::CredentialParse(format!("failed to read {}: {}", path.display(), e))
    })
}

/// Normalize registry names (e.g., "docker.io" and "registry-1.docker.io"
/// → "index.docker.io").
fn normalize_registry(registry: &str) -> String {
    let r = registry.trim().to_lowercase();
    if r == "docker.io" || r == "registry-1.docker.io" {
        "index.docker.io".to_string()
    } else {
        r
    }
}
