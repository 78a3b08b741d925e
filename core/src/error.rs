use thiserror::Error;

/// Build-completion error types.
///
/// None of these are recovered locally: every variant is fatal to the
/// current completion run and propagates to the caller.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// Export report could not be decoded
    #[error("Report decode error: {0}")]
    ReportDecode(String),

    /// Export report contains no image tags
    #[error("no image found in report")]
    NoImageInReport,

    /// A credential secret or argument could not be parsed
    #[error("Credential parse error: {0}")]
    CredentialParse(String),

    /// Merged credentials could not be written to disk
    #[error("Credential write error: {0}")]
    CredentialWrite(String),

    /// Image fetch failed (network, auth, or not found)
    #[error("Fetch error: {reference} - {message}")]
    Fetch { reference: String, message: String },

    /// A required OCI label is absent from the image config
    #[error("Label missing: {label}")]
    LabelMissing { label: String },

    /// A required OCI label could not be decoded
    #[error("Label decode error: {label} - {message}")]
    LabelDecode { label: String, message: String },

    /// An image reference could not be parsed
    #[error("Invalid image reference: {0}")]
    ReferenceParse(String),

    /// A key=value override argument is malformed
    #[error("argument not formatted as key=value: {0}")]
    OverrideArgParse(String),

    /// A signing backend reported failure
    #[error("Signing error: {backend} - {message}")]
    SignBackend { backend: String, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CompletionError {
    fn from(err: serde_json::Error) -> Self {
        CompletionError::Serialization(err.to_string())
    }
}

/// Result type alias for build-completion operations
pub type Result<T> = std::result::Result<T, CompletionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_image_in_report_display() {
        let error = CompletionError::NoImageInReport;
        assert_eq!(error.to_string(), "no image found in report");
    }

    #[test]
    fn test_fetch_error_display() {
        let error = CompletionError::Fetch {
            reference: "reg.io/app:latest".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Fetch error: reg.io/app:latest - connection refused"
        );
    }

    #[test]
    fn test_label_missing_display() {
        let error = CompletionError::LabelMissing {
            label: "io.buildpacks.stack.id".to_string(),
        };
        assert_eq!(error.to_string(), "Label missing: io.buildpacks.stack.id");
    }

    #[test]
    fn test_label_decode_display() {
        let error = CompletionError::LabelDecode {
            label: "io.buildpacks.build.metadata".to_string(),
            message: "expected value at line 1".to_string(),
        };
        assert!(error.to_string().contains("io.buildpacks.build.metadata"));
    }

    #[test]
    fn test_override_arg_parse_display() {
        let error = CompletionError::OverrideArgParse("keyvalue".to_string());
        assert_eq!(
            error.to_string(),
            "argument not formatted as key=value: keyvalue"
        );
    }

    #[test]
    fn test_sign_backend_display() {
        let error = CompletionError::SignBackend {
            backend: "cosign".to_string(),
            message: "no keys found".to_string(),
        };
        assert_eq!(error.to_string(), "Signing error: cosign - no keys found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: CompletionError = io_error.into();
        assert!(matches!(error, CompletionError::Io(_)));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> =
            serde_json::from_str("{ invalid json }");
        let error: CompletionError = result.unwrap_err().into();
        assert!(matches!(error, CompletionError::Serialization(_)));
    }

    #[test]
    fn test_error_is_debug() {
        let error = CompletionError::NoImageInReport;
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("NoImageInReport"));
    }
}
