//! Error types shared by the address parser, the key model, the daemon
//! connector and the FFI shim.

use thiserror::Error;

use crate::address::AddressParseError;
use crate::drkey::derivation::DerivationError;

/// Top-level error for every fallible DRKey operation.
#[derive(Debug, Error)]
pub enum DrkeyError {
    /// An endpoint string could not be parsed.
    #[error("address error: {0}")]
    Address(#[from] AddressParseError),

    /// Local derivation rejected its inputs or the protocol is unknown.
    #[error("derivation error: {0}")]
    Derivation(#[from] DerivationError),

    /// The daemon could not be reached or the HTTP exchange failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The daemon did not answer within the request deadline.
    #[error("daemon request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The daemon answered with a structured error.
    #[error("daemon error {code}: {message}")]
    Daemon { code: String, message: String },

    /// The daemon answered with something we cannot interpret.
    #[error("invalid daemon response: {0}")]
    InvalidResponse(String),

    /// Local I/O failed (runtime start-up, socket bind).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type DrkeyResult<T> = Result<T, DrkeyError>;
