//! DRKey key model.
//!
//! A level-2 key is identified by its [`Lvl2Meta`] (key type, protocol and
//! the two endpoints) and is valid during one [`Epoch`]. An AS-to-AS level-2
//! key doubles as the [`DelegationSecret`] from which host-level keys are
//! derived locally.

pub mod derivation;
pub mod epoch;
pub mod issuer;

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::address::{HostAddr, IsdAsn, ScionAddr};
use derivation::DerivationError;

pub use epoch::EpochSchedule;

/// Symmetric key length in bytes.
pub const KEY_LEN: usize = 16;

/// Protocol name used by the demo flows and the FFI shim.
pub const PISKES: &str = "piskes";

/// Which pair of parties a key is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyType {
    AsToAs,
    AsToHost,
    HostToHost,
}

impl KeyType {
    /// Type tag used in derivation inputs.
    pub fn code(&self) -> u8 {
        match self {
            KeyType::AsToAs => 0,
            KeyType::AsToHost => 1,
            KeyType::HostToHost => 2,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyType::AsToAs => "as_to_as",
            KeyType::AsToHost => "as_to_host",
            KeyType::HostToHost => "host_to_host",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Epoch
// ============================================================================

/// Validity interval `[not_before, not_after)` in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Epoch {
    pub not_before: i64,
    pub not_after: i64,
}

impl Epoch {
    pub fn new(not_before: i64, not_after: i64) -> Self {
        Self {
            not_before,
            not_after,
        }
    }

    /// Whether `t` falls inside the half-open interval.
    pub fn contains(&self, t: i64) -> bool {
        self.not_before <= t && t < self.not_after
    }

    pub fn duration_secs(&self) -> i64 {
        self.not_after - self.not_before
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

fn format_unix(secs: i64) -> String {
    match DateTime::<Utc>::from_timestamp(secs, 0) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => secs.to_string(),
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]",
            format_unix(self.not_before),
            format_unix(self.not_after)
        )
    }
}

// ============================================================================
// Key material
// ============================================================================

/// A 128-bit symmetric key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Key(bytes)
    }

    /// Build a key from a slice of exactly [`KEY_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().ok()?;
        Some(Key(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Lowercase hex, 32 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key(..)")
    }
}

// ============================================================================
// Metadata and keys
// ============================================================================

/// Identifies which level-2 key is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lvl2Meta {
    pub key_type: KeyType,
    pub protocol: String,
    pub src_ia: IsdAsn,
    pub dst_ia: IsdAsn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_host: Option<HostAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_host: Option<HostAddr>,
}

impl Lvl2Meta {
    /// AS-to-AS metadata, i.e. the metadata of a delegation secret.
    pub fn as_to_as(protocol: impl Into<String>, src_ia: IsdAsn, dst_ia: IsdAsn) -> Self {
        Self {
            key_type: KeyType::AsToAs,
            protocol: protocol.into(),
            src_ia,
            dst_ia,
            src_host: None,
            dst_host: None,
        }
    }

    pub fn as_to_host(protocol: impl Into<String>, src_ia: IsdAsn, dst: ScionAddr) -> Self {
        Self {
            key_type: KeyType::AsToHost,
            protocol: protocol.into(),
            src_ia,
            dst_ia: dst.isd_as,
            src_host: None,
            dst_host: Some(dst.host),
        }
    }

    pub fn host_to_host(protocol: impl Into<String>, src: ScionAddr, dst: ScionAddr) -> Self {
        Self {
            key_type: KeyType::HostToHost,
            protocol: protocol.into(),
            src_ia: src.isd_as,
            dst_ia: dst.isd_as,
            src_host: Some(src.host),
            dst_host: Some(dst.host),
        }
    }

    /// The AS-to-AS metadata covering the same protocol and IA pair.
    pub fn delegation_meta(&self) -> Self {
        Self::as_to_as(self.protocol.clone(), self.src_ia, self.dst_ia)
    }
}

/// A level-2 key together with the metadata it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lvl2Key {
    pub key_type: KeyType,
    pub protocol: String,
    pub src_ia: IsdAsn,
    pub dst_ia: IsdAsn,
    pub src_host: Option<HostAddr>,
    pub dst_host: Option<HostAddr>,
    pub epoch: Epoch,
    pub key: Key,
}

impl Lvl2Key {
    pub fn from_meta(meta: &Lvl2Meta, epoch: Epoch, key: Key) -> Self {
        Self {
            key_type: meta.key_type,
            protocol: meta.protocol.clone(),
            src_ia: meta.src_ia,
            dst_ia: meta.dst_ia,
            src_host: meta.src_host,
            dst_host: meta.dst_host,
            epoch,
            key,
        }
    }

    pub fn meta(&self) -> Lvl2Meta {
        Lvl2Meta {
            key_type: self.key_type,
            protocol: self.protocol.clone(),
            src_ia: self.src_ia,
            dst_ia: self.dst_ia,
            src_host: self.src_host,
            dst_host: self.dst_host,
        }
    }
}

/// AS-pair scoped secret from which host-level keys are derived locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationSecret {
    pub protocol: String,
    pub epoch: Epoch,
    pub src_ia: IsdAsn,
    pub dst_ia: IsdAsn,
    pub key: Key,
}

impl TryFrom<Lvl2Key> for DelegationSecret {
    type Error = DerivationError;

    fn try_from(key: Lvl2Key) -> Result<Self, Self::Error> {
        if key.key_type != KeyType::AsToAs {
            return Err(DerivationError::KeyTypeMismatch {
                expected: KeyType::AsToAs,
                actual: key.key_type,
            });
        }
        Ok(DelegationSecret {
            protocol: key.protocol,
            epoch: key.epoch,
            src_ia: key.src_ia,
            dst_ia: key.dst_ia,
            key: key.key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(s: &str) -> ScionAddr {
        s.parse().unwrap()
    }

    #[test]
    fn epoch_is_half_open() {
        let epoch = Epoch::new(100, 200);
        assert!(epoch.contains(100));
        assert!(epoch.contains(199));
        assert!(!epoch.contains(200));
        assert!(!epoch.contains(99));
        assert_eq!(epoch.duration_secs(), 100);
    }

    #[test]
    fn epoch_display_is_utc() {
        let epoch = Epoch::new(0, 86_400);
        assert_eq!(
            epoch.to_string(),
            "[1970-01-01T00:00:00Z, 1970-01-02T00:00:00Z]"
        );
    }

    #[test]
    fn key_hex_is_lowercase_32_chars() {
        let key = Key::new([0xAB; KEY_LEN]);
        let hex = key.to_hex();
        assert_eq!(hex.len(), 32);
        assert_eq!(hex, "ab".repeat(16));
        assert_eq!(format!("{:?}", key), "Key(..)");
    }

    #[test]
    fn key_from_slice_checks_length() {
        assert!(Key::from_slice(&[0u8; 16]).is_some());
        assert!(Key::from_slice(&[0u8; 15]).is_none());
        assert!(Key::from_slice(&[0u8; 32]).is_none());
    }

    #[test]
    fn host_to_host_meta_from_endpoints() {
        let meta = Lvl2Meta::host_to_host(
            PISKES,
            endpoint("1-ff00:0:111,[127.0.0.1]"),
            endpoint("1-ff00:0:112,[fd00:f00d:cafe::7f00:a]"),
        );
        assert_eq!(meta.key_type, KeyType::HostToHost);
        assert!(meta.src_host.is_some());
        assert!(meta.dst_host.is_some());

        let ds_meta = meta.delegation_meta();
        assert_eq!(ds_meta.key_type, KeyType::AsToAs);
        assert_eq!(ds_meta.src_ia, meta.src_ia);
        assert_eq!(ds_meta.dst_ia, meta.dst_ia);
        assert!(ds_meta.src_host.is_none());
    }

    #[test]
    fn delegation_secret_requires_as_to_as() {
        let meta = Lvl2Meta::host_to_host(
            PISKES,
            endpoint("1-ff00:0:111,[127.0.0.1]"),
            endpoint("1-ff00:0:112,[127.0.0.2]"),
        );
        let key = Lvl2Key::from_meta(&meta, Epoch::new(0, 10), Key::new([1; KEY_LEN]));
        let err = DelegationSecret::try_from(key).unwrap_err();
        assert!(matches!(err, DerivationError::KeyTypeMismatch { .. }));

        let ds_key = Lvl2Key::from_meta(
            &meta.delegation_meta(),
            Epoch::new(0, 10),
            Key::new([2; KEY_LEN]),
        );
        let ds = DelegationSecret::try_from(ds_key).unwrap();
        assert_eq!(ds.protocol, PISKES);
        assert_eq!(ds.epoch, Epoch::new(0, 10));
    }

    #[test]
    fn meta_serializes_key_type_screaming() {
        let meta = Lvl2Meta::as_to_as(PISKES, IsdAsn(1), IsdAsn(2));
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["key_type"], "AS_TO_AS");
        assert!(json.get("src_host").is_none());
    }
}
