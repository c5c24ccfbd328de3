//! Error types for s3ctl-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.
//! Errors produced by core operations always name the operation and the
//! bucket/key or local path they were working on.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for s3ctl-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for s3ctl-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed `s3://bucket/key` address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid command argument (expiry out of range, unsafe key, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Named profile does not exist in the configuration file
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// Bucket or object does not exist
    #[error("{op} {target}: not found")]
    NotFound { op: &'static str, target: String },

    /// Authentication or permission failure reported by the backend
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Conflict reported by the backend (e.g. bucket already exists)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Network or protocol failure from the storage backend
    #[error("{op} {target} failed: {message}")]
    Backend {
        op: &'static str,
        target: String,
        message: String,
    },

    /// Local filesystem access failure
    #[error("{op} {} failed: {source}", path.display())]
    LocalIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Feature not supported by backend
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Operation interrupted by the cancellation signal
    #[error("Operation cancelled")]
    Cancelled,

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Build a backend error carrying operation and target context
    pub fn backend(op: &'static str, target: impl Into<String>, message: impl ToString) -> Self {
        Error::Backend {
            op,
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Build a not-found error for `target` seen by `op`
    pub fn not_found(op: &'static str, target: impl Into<String>) -> Self {
        Error::NotFound {
            op,
            target: target.into(),
        }
    }

    /// Build a local I/O error carrying operation and path context
    pub fn local_io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::LocalIo {
            op,
            path: path.into(),
            source,
        }
    }

    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidAddress(_) | Error::InvalidArgument(_) => 2, // UsageError
            Error::Config(_) => 2,                                     // UsageError
            Error::Backend { .. } => 3,                                // NetworkError
            Error::Auth(_) => 4,                                       // AuthError
            Error::NotFound { .. } | Error::ProfileNotFound(_) => 5,   // NotFound
            Error::Conflict(_) => 6,                                   // Conflict
            Error::UnsupportedFeature(_) => 7,                         // UnsupportedFeature
            Error::Cancelled => 130,                                   // Interrupted
            _ => 1,                                                    // GeneralError
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::InvalidAddress("test".into()).exit_code(), 2);
        assert_eq!(Error::InvalidArgument("test".into()).exit_code(), 2);
        assert_eq!(Error::Config("test".into()).exit_code(), 2);
        assert_eq!(Error::backend("put_object", "b/k", "timeout").exit_code(), 3);
        assert_eq!(Error::Auth("test".into()).exit_code(), 4);
        assert_eq!(Error::not_found("stat_object", "b/k").exit_code(), 5);
        assert_eq!(Error::ProfileNotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::Conflict("test".into()).exit_code(), 6);
        assert_eq!(Error::UnsupportedFeature("test".into()).exit_code(), 7);
        assert_eq!(Error::Cancelled.exit_code(), 130);
        assert_eq!(Error::General("test".into()).exit_code(), 1);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(Error::local_io("open", "/tmp/a", io).exit_code(), 1);
    }

    #[test]
    fn test_error_display() {
        let err = Error::ProfileNotFound("minio".into());
        assert_eq!(err.to_string(), "Profile not found: minio");

        let err = Error::InvalidAddress("bucket/x".into());
        assert_eq!(err.to_string(), "Invalid address: bucket/x");

        let err = Error::not_found("get_object", "photos/dog.jpg");
        assert_eq!(err.to_string(), "get_object photos/dog.jpg: not found");

        let err = Error::backend("get_object", "photos/cat.jpg", "connection reset");
        assert_eq!(
            err.to_string(),
            "get_object photos/cat.jpg failed: connection reset"
        );
    }

    #[test]
    fn test_local_io_names_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::local_io("open", "/data/b.txt", io);
        let msg = err.to_string();
        assert!(msg.starts_with("open /data/b.txt failed"));
        assert!(msg.contains("denied"));
    }
}
