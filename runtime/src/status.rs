//! The build status record and its wire codec.
//!
//! `BuildStatusMetadata` is the externally visible completion record: one is
//! produced per build, serialized once, and never mutated afterward. The
//! codec is gzip-compressed canonical JSON, base64-encoded so it survives
//! the size-limited text channel it is handed off through.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use buildseal_core::error::{CompletionError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::oci::metadata::{BuildpackMetadata, BuiltImage};

/// Externally visible completion record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatusMetadata {
    /// Buildpacks that participated in the build; empty, never absent
    #[serde(default)]
    pub buildpack_metadata: Vec<BuildpackMetadata>,
    /// Digest-qualified reference of the built image
    pub latest_image: String,
    /// Digest reference of the cache image, empty when no cache was exported
    #[serde(default)]
    pub latest_cache_image: String,
    /// Reconstructed stack run-image pointer
    pub stack_run_image: String,
    /// Stack identifier
    pub stack_id: String,
}

impl BuildStatusMetadata {
    /// Assemble the completion record. Pure: no I/O, no failure modes.
    pub fn assemble(
        built: &BuiltImage,
        latest_image: &str,
        cache_image: Option<&str>,
    ) -> Self {
        Self {
            buildpack_metadata: built.buildpacks.clone(),
            latest_image: latest_image.to_string(),
            latest_cache_image: cache_image.unwrap_or_default().to_string(),
            stack_run_image: built.stack.run_image.clone(),
            stack_id: built.stack.id.clone(),
        }
    }
}

/// Deterministic, reversible codec for the completion record:
/// JSON → gzip → base64.
pub struct GzipStatusCodec;

impl GzipStatusCodec {
    /// Encode a record to its compact hand-off form.
    pub fn encode(metadata: &BuildStatusMetadata) -> Result<String> {
        let json = serde_json::to_vec(metadata)?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let compressed = encoder.finish()?;

        Ok(BASE64.encode(compressed))
    }

    /// Decode a record previously produced by [`encode`](Self::encode).
    pub fn decode(data: &str) -> Result<BuildStatusMetadata> {
        let compressed = BASE64
            .decode(data.trim())
            .map_err(|e| CompletionError::Serialization(format!("invalid base64: {}", e)))?;

        let mut json = Vec::new();
        GzDecoder::new(&compressed[..]).read_to_end(&mut json)?;

        Ok(serde_json::from_slice(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::metadata::BuiltImageStack;
    use chrono::{DateTime, Utc};

    fn test_built_image() -> BuiltImage {
        BuiltImage {
            identifier: "reg.io/app@sha256:abc123".to_string(),
            completed_at: "2024-03-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap(),
            buildpacks: vec![BuildpackMetadata {
                id: "test.id".to_string(),
                version: "1.2.3".to_string(),
                homepage: Some("https://example.com".to_string()),
            }],
            stack: BuiltImageStack {
                run_image: "gcr.io:443/run@sha256:0fd639".to_string(),
                id: "io.buildpacks.stack.bionic".to_string(),
            },
        }
    }

    #[test]
    fn test_assemble() {
        let built = test_built_image();
        let status = BuildStatusMetadata::assemble(
            &built,
            "reg.io/app:latest@sha256:abc123",
            Some("reg.io/cache@sha256:def456"),
        );

        assert_eq!(status.latest_image, "reg.io/app:latest@sha256:abc123");
        assert_eq!(status.latest_cache_image, "reg.io/cache@sha256:def456");
        assert_eq!(status.stack_run_image, "gcr.io:443/run@sha256:0fd639");
        assert_eq!(status.stack_id, "io.buildpacks.stack.bionic");
        assert_eq!(status.buildpack_metadata, built.buildpacks);
    }

    #[test]
    fn test_assemble_without_cache_image() {
        let built = test_built_image();
        let status = BuildStatusMetadata::assemble(&built, "reg.io/app@sha256:abc123", None);
        assert_eq!(status.latest_cache_image, "");
    }

    #[test]
    fn test_assemble_with_no_buildpacks() {
        let mut built = test_built_image();
        built.buildpacks = Vec::new();
        let status = BuildStatusMetadata::assemble(&built, "reg.io/app@sha256:abc123", None);
        // Normalized to empty, never absent
        assert!(status.buildpack_metadata.is_empty());
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"buildpackMetadata\":[]"));
    }

    #[test]
    fn test_codec_round_trip() {
        let built = test_built_image();
        let status = BuildStatusMetadata::assemble(
            &built,
            "reg.io/app:latest@sha256:abc123",
            Some("reg.io/cache@sha256:def456"),
        );

        let encoded = GzipStatusCodec::encode(&status).unwrap();
        let decoded = GzipStatusCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, status);
    }

    #[test]
    fn test_codec_round_trip_minimal_record() {
        let mut built = test_built_image();
        built.buildpacks = Vec::new();
        let status = BuildStatusMetadata::assemble(&built, "reg.io/app@sha256:abc123", None);

        let encoded = GzipStatusCodec::encode(&status).unwrap();
        let decoded = GzipStatusCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, status);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let built = test_built_image();
        let status = BuildStatusMetadata::assemble(&built, "reg.io/app@sha256:abc123", None);

        let first = GzipStatusCodec::encode(&status).unwrap();
        let second = GzipStatusCodec::encode(&status).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(GzipStatusCodec::decode("not base64!!").is_err());
        // Valid base64 but not gzip
        assert!(GzipStatusCodec::decode(&BASE64.encode("plain text")).is_err());
    }
}
