//! JSON messages exchanged with the key daemon.
//!
//! ```json
//! POST /drkey/v1/lvl2
//! {
//!   "key_type": "HOST_TO_HOST",
//!   "protocol": "piskes",
//!   "src_ia": "1-ff00:0:111",
//!   "dst_ia": "1-ff00:0:112",
//!   "src_host": "127.0.0.1",
//!   "dst_host": "fd00:f00d:cafe::7f00:a",
//!   "val_time": 1700000000
//! }
//! ```
//!
//! Errors use the envelope `{"error": {"code": "...", "message": "..."}}`.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::drkey::{Epoch, Key, Lvl2Key, Lvl2Meta};
use crate::errors::{DrkeyError, DrkeyResult};

/// Path of the level-2 key endpoint.
pub const LVL2_PATH: &str = "/drkey/v1/lvl2";

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Request for a level-2 key valid at `val_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lvl2KeyRequest {
    #[serde(flatten)]
    pub meta: Lvl2Meta,
    /// Unix seconds.
    pub val_time: i64,
}

/// A level-2 key as returned by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lvl2KeyResponse {
    #[serde(flatten)]
    pub meta: Lvl2Meta,
    pub not_before: i64,
    pub not_after: i64,
    /// Base64 of the 16 key bytes.
    pub key: String,
}

impl From<&Lvl2Key> for Lvl2KeyResponse {
    fn from(key: &Lvl2Key) -> Self {
        Self {
            meta: key.meta(),
            not_before: key.epoch.not_before,
            not_after: key.epoch.not_after,
            key: B64.encode(key.key.as_bytes()),
        }
    }
}

impl Lvl2KeyResponse {
    /// Decode into a [`Lvl2Key`], checking the key length and interval.
    pub fn into_key(self) -> DrkeyResult<Lvl2Key> {
        let bytes = B64
            .decode(self.key.as_bytes())
            .map_err(|e| DrkeyError::InvalidResponse(format!("key is not base64: {e}")))?;
        let key = Key::from_slice(&bytes).ok_or_else(|| {
            DrkeyError::InvalidResponse(format!("expected 16 key bytes, got {}", bytes.len()))
        })?;

        if self.not_before >= self.not_after {
            return Err(DrkeyError::InvalidResponse(format!(
                "empty validity interval [{}, {})",
                self.not_before, self.not_after
            )));
        }

        let epoch = Epoch::new(self.not_before, self.not_after);
        Ok(Lvl2Key::from_meta(&self.meta, epoch, key))
    }
}

/// Machine-readable error codes returned by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request payload is invalid or malformed
    InvalidRequest,
    /// The requested key could not be derived
    DerivationFailed,
    /// Unexpected internal error
    InternalError,
    /// Unknown error code (forward compatibility)
    #[serde(other)]
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::DerivationFailed => "DERIVATION_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inner body of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl From<ErrorResponse> for DrkeyError {
    fn from(resp: ErrorResponse) -> Self {
        DrkeyError::Daemon {
            code: resp.error.code.to_string(),
            message: resp.error.message,
        }
    }
}
