//! Error types for flowtmpl.
//!
//! Every failure is a locally detected validation error. Each variant carries
//! the offending id, token location or path so the caller can act on it, and
//! a stable code for callers that report errors in structured form.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for flowtmpl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// flowtmpl error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed template document, duplicate ids, unknown datatype or column type.
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// Reference to a parameter that is not declared.
    #[error("Unknown parameter '{id}' at {location}")]
    UnknownParameter { id: String, location: String },

    /// Required value with neither a supplied argument nor a default.
    #[error("Missing value for '{id}'")]
    MissingValue { id: String },

    /// Supplied or default value that does not satisfy the declared type.
    #[error("Invalid value for '{id}': {message}")]
    InvalidValue { id: String, message: String },

    #[error("No template specification file found in {}", dir.display())]
    MissingSpecFile { dir: PathBuf },

    #[error("Failed to retrieve template source: {0}")]
    SourceRetrieval(String),

    #[error("Unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure while staging or publishing a template.
    #[error("Filesystem error at {}: {message}", path.display())]
    Filesystem { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unknown_parameter(id: impl Into<String>, location: impl Into<String>) -> Self {
        Error::UnknownParameter {
            id: id.into(),
            location: location.into(),
        }
    }

    pub(crate) fn missing_value(id: impl Into<String>) -> Self {
        Error::MissingValue { id: id.into() }
    }

    pub(crate) fn invalid_value(id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidValue {
            id: id.into(),
            message: message.into(),
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Error::Filesystem {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Get the error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidTemplate(_) => "INVALID_TEMPLATE",
            Error::UnknownParameter { .. } => "UNKNOWN_PARAMETER",
            Error::MissingValue { .. } => "MISSING_VALUE",
            Error::InvalidValue { .. } => "INVALID_VALUE",
            Error::MissingSpecFile { .. } => "MISSING_SPEC_FILE",
            Error::SourceRetrieval(_) => "SOURCE_RETRIEVAL_ERROR",
            Error::UnknownTemplate(_) => "UNKNOWN_TEMPLATE",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Filesystem { .. } => "FILESYSTEM_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }

    /// Convert to a structured JSON error response.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::InvalidTemplate("x".into()).code(),
            "INVALID_TEMPLATE"
        );
        assert_eq!(
            Error::unknown_parameter("a", "$.b").code(),
            "UNKNOWN_PARAMETER"
        );
        assert_eq!(Error::missing_value("a").code(), "MISSING_VALUE");
        assert_eq!(Error::invalid_value("a", "bad").code(), "INVALID_VALUE");
        assert_eq!(
            Error::MissingSpecFile {
                dir: PathBuf::from("/tmp/x")
            }
            .code(),
            "MISSING_SPEC_FILE"
        );
        assert_eq!(
            Error::SourceRetrieval("boom".into()).code(),
            "SOURCE_RETRIEVAL_ERROR"
        );
        assert_eq!(Error::UnknownTemplate("id".into()).code(), "UNKNOWN_TEMPLATE");
    }

    #[test]
    fn test_messages_carry_context() {
        let err = Error::unknown_parameter("sleeptime", "$.inputs.parameters.sleep");
        let msg = err.to_string();
        assert!(msg.contains("sleeptime"));
        assert!(msg.contains("$.inputs.parameters.sleep"));

        let err = Error::MissingSpecFile {
            dir: PathBuf::from("/src/bench"),
        };
        assert!(err.to_string().contains("/src/bench"));
    }

    #[test]
    fn test_to_json() {
        let json = Error::missing_value("names").to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "MISSING_VALUE");
        assert_eq!(json["error"]["message"], "Missing value for 'names'");
    }

    #[test]
    fn test_filesystem_error_names_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::filesystem("/src/bench/data/names.txt", io);
        assert_eq!(err.code(), "FILESYSTEM_ERROR");
        let msg = err.to_string();
        assert!(msg.contains("/src/bench/data/names.txt"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert_eq!(err.code(), "IO_ERROR");
        assert!(err.to_string().contains("gone"));
    }
}
