//! Error types for surveyform.
//!
//! Remote store failures are reported as typed variants so callers never have
//! to inspect HTTP status codes themselves.

use thiserror::Error;

/// The main error type for surveyform operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Remote Store Errors ===
    /// The remote store rejected a request or could not be reached.
    #[error("remote store request failed ({}): {message}", describe_status(.status))]
    RemoteStore {
        /// HTTP status returned by the store, if a response was received.
        status: Option<u16>,
        /// Description of what went wrong.
        message: String,
    },

    /// A conditional write lost against a concurrent writer.
    #[error("conflicting write to {path}: the remote file changed since it was fetched")]
    Conflict {
        /// Remote path of the table.
        path: String,
    },

    /// Every attempt of the fetch-append-commit cycle hit a conflict.
    #[error("gave up after {attempts} conflicting attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    // === Table Errors ===
    /// The remote file is not a well-formed answer table.
    #[error("malformed answer table: {message}")]
    MalformedTable {
        /// Description of the problem.
        message: String,
    },

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The remote content was not valid base64.
    #[error("invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The remote content was not valid UTF-8.
    #[error("invalid UTF-8 content: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    // === Submission Errors ===
    /// The submission was rejected before reaching the store.
    #[error("invalid submission: {message}")]
    Validation {
        /// Why the submission was rejected.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system or socket operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for surveyform operations.
pub type Result<T> = std::result::Result<T, Error>;

fn describe_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "no response".to_string(), |code| format!("status {code}"))
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::RemoteStore {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl Error {
    /// Create a remote store error.
    #[must_use]
    pub fn remote_store(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteStore {
            status,
            message: message.into(),
        }
    }

    /// Create a conflict error for the given remote path.
    #[must_use]
    pub fn conflict(path: impl Into<String>) -> Self {
        Self::Conflict { path: path.into() }
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a malformed table error.
    #[must_use]
    pub fn malformed_table(message: impl Into<String>) -> Self {
        Self::MalformedTable {
            message: message.into(),
        }
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a lost conditional write.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if this error was raised before any network call.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// HTTP status attached to a remote store failure.
    #[must_use]
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            Self::RemoteStore { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_store_display_with_status() {
        let err = Error::remote_store(Some(401), "Bad credentials");
        assert_eq!(
            err.to_string(),
            "remote store request failed (status 401): Bad credentials"
        );
        assert_eq!(err.remote_status(), Some(401));
    }

    #[test]
    fn test_remote_store_display_without_status() {
        let err = Error::remote_store(None, "connection refused");
        assert_eq!(
            err.to_string(),
            "remote store request failed (no response): connection refused"
        );
        assert_eq!(err.remote_status(), None);
    }

    #[test]
    fn test_conflict_error() {
        let err = Error::conflict("respostas.csv");
        assert!(err.is_conflict());
        assert!(!err.is_validation());
        assert!(err.to_string().contains("respostas.csv"));
    }

    #[test]
    fn test_validation_error() {
        let err = Error::validation("answer at least one question");
        assert!(err.is_validation());
        assert!(!err.is_conflict());
        assert_eq!(
            err.to_string(),
            "invalid submission: answer at least one question"
        );
    }

    #[test]
    fn test_retries_exhausted_display() {
        let err = Error::RetriesExhausted { attempts: 3 };
        assert_eq!(err.to_string(), "gave up after 3 conflicting attempts");
    }

    #[test]
    fn test_malformed_table_display() {
        let err = Error::malformed_table("unexpected header");
        assert!(err.to_string().contains("unexpected header"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::config_validation("repository must be owner/name");
        assert!(err.to_string().contains("owner/name"));
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("address in use"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_from_base64_error() {
        use base64::Engine as _;
        let decoded = base64::engine::general_purpose::STANDARD.decode("***");
        if let Err(b64_err) = decoded {
            let err: Error = b64_err.into();
            assert!(matches!(err, Error::Base64(_)));
        }
    }

    #[test]
    fn test_from_utf8_error() {
        let utf8_err = String::from_utf8(vec![0xff, 0xfe]).unwrap_err();
        let err: Error = utf8_err.into();
        assert!(matches!(err, Error::Utf8(_)));
    }
}
