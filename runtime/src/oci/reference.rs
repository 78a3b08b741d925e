//! OCI image reference parsing.
//!
//! Parses references like `gcr.io:443/run:full-cnb` or
//! `reg.io/app@sha256:abc...` into structured components and provides the
//! two pieces of reference arithmetic the metadata retriever needs: the
//! repository root (`<registry>/<repository>`) and the identifier (digest
//! when present, tag otherwise).

use buildseal_core::error::{CompletionError, Result};

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Default tag when neither tag nor digest is specified.
const DEFAULT_TAG: &str = "latest";

/// Parsed OCI image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "gcr.io:443", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "library/nginx", "appimage/name")
    pub repository: String,
    /// Tag (e.g., "latest", "full-cnb")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports `[registry/]repository[:tag][@digest]`. A bare name like
    /// `nginx` resolves to `docker.io/library/nginx:latest`.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(CompletionError::ReferenceParse(
                "empty image reference".to_string(),
            ));
        }

        // Split off the digest first (@ separator)
        let (name_tag, digest) = match reference.rsplit_once('@') {
            Some((head, digest_part)) => {
                if !digest_part.contains(':') {
                    return Err(CompletionError::ReferenceParse(format!(
                        "invalid digest in '{}': expected algorithm:hex",
                        reference
                    )));
                }
                (head, Some(digest_part.to_string()))
            }
            None => (reference, None),
        };

        // Split the tag: the last colon after the last slash
        let (name, tag) = split_tag(name_tag);

        let (registry, repository) = split_registry_repository(name)?;

        // Apply the default tag only when neither tag nor digest is present
        let tag = match (&tag, &digest) {
            (None, None) => Some(DEFAULT_TAG.to_string()),
            _ => tag,
        };

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// The `<registry>/<repository>` part, with no tag or digest.
    ///
    /// This is the repository a signature or a reconstructed run-image
    /// pointer attaches to.
    pub fn repository_root(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// The most precise identifier available: the digest when present,
    /// the tag otherwise.
    pub fn identifier(&self) -> &str {
        match (&self.digest, &self.tag) {
            (Some(digest), _) => digest,
            (None, Some(tag)) => tag,
            (None, None) => DEFAULT_TAG,
        }
    }

    /// The full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = self.repository_root();
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = CompletionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split `name[:tag]`, leaving registry ports alone.
fn split_tag(name_tag: &str) -> (&str, Option<String>) {
    let after_slash_start = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
    let last_part = &name_tag[after_slash_start..];

    match last_part.rfind(':') {
        Some(colon_in_part) => {
            let colon_pos = after_slash_start + colon_in_part;
            let candidate = &name_tag[colon_pos + 1..];
            // A colon in a single-component name could be a registry port
            // (e.g. "myregistry.io:5000/..."), but ports only occur before a
            // slash; here we are past the last slash, so a purely numeric
            // remainder with no slash before it is a port, not a tag.
            if after_slash_start == 0 && candidate.chars().all(|c| c.is_ascii_digit()) {
                (name_tag, None)
            } else {
                (&name_tag[..colon_pos], Some(candidate.to_string()))
            }
        }
        None => (name_tag, None),
    }
}

/// Split a name into registry and repository components.
fn split_registry_repository(name: &str) -> Result<(String, String)> {
    // The first component is a registry hostname when it contains a dot or
    // colon, or is "localhost"
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            if rest.is_empty() {
                return Err(CompletionError::ReferenceParse(format!(
                    "empty repository in reference '{}'",
                    name
                )));
            }
            return Ok((first.to_string(), rest.to_string()));
        }
    }

    // No registry detected — use the default
    let repository = if name.contains('/') {
        name.to_string()
    } else {
        // Single name like "nginx" → "library/nginx" for Docker Hub
        format!("library/{}", name)
    };

    Ok((DEFAULT_REGISTRY.to_string(), repository))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_name() {
        let r = ImageReference::parse("nginx").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "library/nginx");
        assert_eq!(r.tag, Some("latest".to_string()));
        assert_eq!(r.digest, None);
    }

    #[test]
    fn test_parse_registry_repo_tag() {
        let r = ImageReference::parse("gcr.io:443/run:full-cnb").unwrap();
        assert_eq!(r.registry, "gcr.io:443");
        assert_eq!(r.repository, "run");
        assert_eq!(r.tag, Some("full-cnb".to_string()));
    }

    #[test]
    fn test_parse_digest_reference() {
        let r = ImageReference::parse(
            "localhost:5000/node@sha256:0fd6395e4fe38a0c089665cbe10f52fb26fc64b4b15e672ada412bd7ab5499a0",
        )
        .unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.repository, "node");
        assert_eq!(r.tag, None);
        assert_eq!(
            r.identifier(),
            "sha256:0fd6395e4fe38a0c089665cbe10f52fb26fc64b4b15e672ada412bd7ab5499a0"
        );
    }

    #[test]
    fn test_parse_tag_and_digest() {
        let r = ImageReference::parse("reg.io/app:latest@sha256:abc123").unwrap();
        assert_eq!(r.registry, "reg.io");
        assert_eq!(r.repository, "app");
        assert_eq!(r.tag, Some("latest".to_string()));
        assert_eq!(r.digest, Some("sha256:abc123".to_string()));
        // Digest wins over tag as the identifier
        assert_eq!(r.identifier(), "sha256:abc123");
    }

    #[test]
    fn test_parse_no_tag_with_registry() {
        let r = ImageReference::parse("reg.io/appimage/name").unwrap();
        assert_eq!(r.registry, "reg.io");
        assert_eq!(r.repository, "appimage/name");
        assert_eq!(r.tag, Some("latest".to_string()));
    }

    #[test]
    fn test_repository_root_drops_tag_and_digest() {
        let r = ImageReference::parse("gcr.io:443/run:full-cnb").unwrap();
        assert_eq!(r.repository_root(), "gcr.io:443/run");

        let r = ImageReference::parse("reg.io/app@sha256:abc123").unwrap();
        assert_eq!(r.repository_root(), "reg.io/app");
    }

    #[test]
    fn test_identifier_falls_back_to_tag() {
        let r = ImageReference::parse("reg.io/app:v1").unwrap();
        assert_eq!(r.identifier(), "v1");
    }

    #[test]
    fn test_parse_localhost_registry() {
        let r = ImageReference::parse("localhost/myimage:test").unwrap();
        assert_eq!(r.registry, "localhost");
        assert_eq!(r.repository, "myimage");
    }

    #[test]
    fn test_parse_registry_with_port_no_tag() {
        let r = ImageReference::parse("myregistry.io:5000/myimage").unwrap();
        assert_eq!(r.registry, "myregistry.io:5000");
        assert_eq!(r.repository, "myimage");
        assert_eq!(r.tag, Some("latest".to_string()));
    }

    #[test]
    fn test_parse_empty_reference() {
        assert!(ImageReference::parse("").is_err());
        assert!(ImageReference::parse("   ").is_err());
    }

    #[test]
    fn test_parse_invalid_digest() {
        assert!(ImageReference::parse("nginx@invaliddigest").is_err());
    }

    #[test]
    fn test_full_reference_round_trip() {
        for s in [
            "docker.io/library/nginx:latest",
            "gcr.io:443/run:full-cnb",
            "reg.io/app:latest@sha256:abc123",
        ] {
            let r = ImageReference::parse(s).unwrap();
            assert_eq!(r.full_reference(), s);
        }
    }

    #[test]
    fn test_display() {
        let r = ImageReference::parse("nginx:1.25").unwrap();
        assert_eq!(format!("{}", r), "docker.io/library/nginx:1.25");
    }

    #[test]
    fn test_deep_repository_path() {
        let r = ImageReference::parse("ghcr.io/org/sub/image:v1").unwrap();
        assert_eq!(r.registry, "ghcr.io");
        assert_eq!(r.repository, "org/sub/image");
    }
}
