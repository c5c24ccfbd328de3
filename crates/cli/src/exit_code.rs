//! Process exit codes
//!
//! Scripts rely on these values; changing one is a breaking change.

use s3ctl_core::Error;

/// Exit status of an s3ctl invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Operation completed, including informational no-op outcomes
    Success = 0,

    /// Local I/O and other unclassified failures
    GeneralError = 1,

    /// Malformed address, bad argument or unusable configuration
    UsageError = 2,

    /// Network or protocol failure reported by the backend
    NetworkError = 3,

    /// Authentication or permission failure
    AuthError = 4,

    /// Bucket, object or profile does not exist
    NotFound = 5,

    /// Conflicting state on the backend
    Conflict = 6,

    /// Requested feature cannot be provided
    UnsupportedFeature = 7,

    /// Interrupted by Ctrl+C
    Interrupted = 130,
}

impl ExitCode {
    /// Convert exit code to i32 for use with std::process::exit
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Create exit code from i32 value
    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::GeneralError),
            2 => Some(Self::UsageError),
            3 => Some(Self::NetworkError),
            4 => Some(Self::AuthError),
            5 => Some(Self::NotFound),
            6 => Some(Self::Conflict),
            7 => Some(Self::UnsupportedFeature),
            130 => Some(Self::Interrupted),
            _ => None,
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        Self::from_i32(err.exit_code()).unwrap_or(Self::GeneralError)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}
