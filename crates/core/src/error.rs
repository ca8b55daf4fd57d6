//! Run-level error types
//!
//! Every fatal failure surfaces as a [`RunError`] tagged with a stable
//! [`ErrorKind`]; the binary prints the kind next to the message and maps
//! it onto the exit code.

use std::fmt;

use thiserror::Error;

use crate::bridge::BridgeError;

/// Stable failure classes surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed user input, rejected before any device interaction.
    BadInput,
    /// An explicit `--target` matched neither a serial nor an AVD id.
    TargetNotFound,
    /// Nothing connected and nothing bootable.
    NoDeviceAvailable,
    /// A device bridge operation failed.
    DeviceCommunication,
    /// No usable Android SDK installation was found.
    SdkNotFound,
    /// The emulator or AVD home directory could not be resolved.
    EnvironmentNotFound,
}

impl ErrorKind {
    /// The tag printed next to error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadInput => "ERR_BAD_INPUT",
            ErrorKind::TargetNotFound => "ERR_TARGET_NOT_FOUND",
            ErrorKind::NoDeviceAvailable => "ERR_NO_DEVICE",
            ErrorKind::DeviceCommunication => "ERR_DEVICE_COMMUNICATION",
            ErrorKind::SdkNotFound => "ERR_SDK_NOT_FOUND",
            ErrorKind::EnvironmentNotFound => "ERR_ENVIRONMENT_NOT_FOUND",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fatal failure of one run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("{0}")]
    BadInput(String),

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("no connected device or installed virtual device found")]
    NoDeviceAvailable,

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// SDK or environment resolution failure, surfaced unchanged from the
    /// resolver with the kind it reported.
    #[error("{message}")]
    Environment {
        /// Kind reported by the resolver.
        kind: ErrorKind,
        /// Resolver message.
        message: String,
    },
}

impl RunError {
    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::BadInput(_) => ErrorKind::BadInput,
            RunError::TargetNotFound(_) => ErrorKind::TargetNotFound,
            RunError::NoDeviceAvailable => ErrorKind::NoDeviceAvailable,
            RunError::Bridge(_) => ErrorKind::DeviceCommunication,
            RunError::Environment { kind, .. } => *kind,
        }
    }
}

/// Result type alias for run operations.
pub type Result<T> = std::result::Result<T, RunError>;
