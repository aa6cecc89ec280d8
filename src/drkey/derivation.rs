//! Level-1 / level-2 derivation and the registry of delegated derivations.
//!
//! Every derivation step is a PRF keyed with the parent key:
//!
//! ```text
//! lvl1       = PRF(master,  epoch.not_before || src_ia || dst_ia)
//! lvl2 (std) = PRF(lvl1,    key_type || len(protocol) || protocol || hosts)
//! lvl2 (ds)  = PRF(ds.key,  key_type || hosts)
//! ```
//!
//! where `PRF` is HMAC-SHA256 truncated to [`KEY_LEN`] bytes and `hosts`
//! encodes each present host as `type || len || bytes`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use ring::hmac;
use thiserror::Error;

use super::{DelegationSecret, Epoch, Key, KeyType, Lvl2Key, Lvl2Meta, KEY_LEN, PISKES};
use crate::address::{HostAddr, IsdAsn};

/// Errors raised by local derivation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error("no derivation registered for protocol {0:?}")]
    UnknownProtocol(String),

    #[error("key type mismatch: expected {expected}, got {actual}")]
    KeyTypeMismatch { expected: KeyType, actual: KeyType },

    #[error("key type {0} cannot be derived from a delegation secret")]
    UnsupportedKeyType(KeyType),

    #[error("protocol mismatch: metadata has {meta:?}, secret has {secret:?}")]
    ProtocolMismatch { meta: String, secret: String },

    #[error("ISD-AS mismatch: metadata {meta_src} -> {meta_dst}, secret {ds_src} -> {ds_dst}")]
    IsdAsnMismatch {
        meta_src: IsdAsn,
        meta_dst: IsdAsn,
        ds_src: IsdAsn,
        ds_dst: IsdAsn,
    },

    #[error("metadata is missing the {0} host")]
    MissingHost(&'static str),

    #[error("validity time {0} has no representable epoch")]
    TimeOutOfRange(i64),
}

/// A protocol whose host-level keys are derived from the delegation secret.
pub trait DelegatedDerivation: Send + Sync {
    /// Protocol name this derivation is registered under.
    fn name(&self) -> &str;

    /// Derive the level-2 key described by `meta` from `ds`.
    fn derive_lvl2_from_ds(
        &self,
        meta: &Lvl2Meta,
        ds: &DelegationSecret,
    ) -> Result<Lvl2Key, DerivationError>;
}

pub(crate) fn prf(key: &[u8], input: &[u8]) -> Key {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&key, input);

    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&tag.as_ref()[..KEY_LEN]);
    Key::new(out)
}

fn encode_host(buf: &mut Vec<u8>, host: &HostAddr) {
    let bytes = host.to_bytes();
    buf.push(host.type_code());
    buf.push(bytes.len() as u8);
    buf.extend_from_slice(&bytes);
}

/// Append the host part of the derivation input for `meta.key_type`.
fn encode_hosts(buf: &mut Vec<u8>, meta: &Lvl2Meta) -> Result<(), DerivationError> {
    match meta.key_type {
        KeyType::AsToAs => {}
        KeyType::AsToHost => {
            let dst = meta.dst_host.as_ref().ok_or(DerivationError::MissingHost("dst"))?;
            encode_host(buf, dst);
        }
        KeyType::HostToHost => {
            let src = meta.src_host.as_ref().ok_or(DerivationError::MissingHost("src"))?;
            let dst = meta.dst_host.as_ref().ok_or(DerivationError::MissingHost("dst"))?;
            encode_host(buf, src);
            encode_host(buf, dst);
        }
    }
    Ok(())
}

/// Derive the level-1 key of an AS pair for one epoch.
pub fn derive_lvl1(master_secret: &[u8], epoch: Epoch, src_ia: IsdAsn, dst_ia: IsdAsn) -> Key {
    let mut input = Vec::with_capacity(24);
    input.extend_from_slice(&epoch.not_before.to_be_bytes());
    input.extend_from_slice(&src_ia.to_u64().to_be_bytes());
    input.extend_from_slice(&dst_ia.to_u64().to_be_bytes());
    prf(master_secret, &input)
}

/// Standard level-2 derivation directly from the level-1 key.
pub fn derive_lvl2_standard(
    meta: &Lvl2Meta,
    lvl1: &Key,
    epoch: Epoch,
) -> Result<Lvl2Key, DerivationError> {
    let protocol = meta.protocol.as_bytes();

    let mut input = Vec::with_capacity(2 + protocol.len() + 36);
    input.push(meta.key_type.code());
    input.push(protocol.len().min(u8::MAX as usize) as u8);
    input.extend_from_slice(&protocol[..protocol.len().min(u8::MAX as usize)]);
    encode_hosts(&mut input, meta)?;

    let key = prf(lvl1.as_bytes(), &input);
    Ok(Lvl2Key::from_meta(meta, epoch, key))
}

/// The `piskes` delegated derivation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Piskes;

impl DelegatedDerivation for Piskes {
    fn name(&self) -> &str {
        PISKES
    }

    fn derive_lvl2_from_ds(
        &self,
        meta: &Lvl2Meta,
        ds: &DelegationSecret,
    ) -> Result<Lvl2Key, DerivationError> {
        if meta.protocol != ds.protocol {
            return Err(DerivationError::ProtocolMismatch {
                meta: meta.protocol.clone(),
                secret: ds.protocol.clone(),
            });
        }
        if meta.src_ia != ds.src_ia || meta.dst_ia != ds.dst_ia {
            return Err(DerivationError::IsdAsnMismatch {
                meta_src: meta.src_ia,
                meta_dst: meta.dst_ia,
                ds_src: ds.src_ia,
                ds_dst: ds.dst_ia,
            });
        }
        if meta.key_type == KeyType::AsToAs {
            return Err(DerivationError::UnsupportedKeyType(meta.key_type));
        }

        let mut input = Vec::with_capacity(37);
        input.push(meta.key_type.code());
        encode_hosts(&mut input, meta)?;

        let key = prf(ds.key.as_bytes(), &input);
        Ok(Lvl2Key::from_meta(meta, ds.epoch, key))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Explicit mapping from protocol name to its delegated derivation.
#[derive(Clone, Default)]
pub struct DerivationRegistry {
    derivations: HashMap<String, Arc<dyn DelegatedDerivation>>,
}

impl DerivationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every derivation shipped in this crate.
    pub fn with_known_derivations() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Piskes));
        registry
    }

    /// Register `derivation` under its own name, replacing any previous one.
    pub fn register(&mut self, derivation: Arc<dyn DelegatedDerivation>) {
        self.derivations
            .insert(derivation.name().to_string(), derivation);
    }

    pub fn get(&self, protocol: &str) -> Result<Arc<dyn DelegatedDerivation>, DerivationError> {
        self.derivations
            .get(protocol)
            .cloned()
            .ok_or_else(|| DerivationError::UnknownProtocol(protocol.to_string()))
    }

    pub fn contains(&self, protocol: &str) -> bool {
        self.derivations.contains_key(protocol)
    }

    /// Registered protocol names, sorted.
    pub fn protocols(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.derivations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up `meta.protocol` and derive from `ds`.
    pub fn derive(
        &self,
        meta: &Lvl2Meta,
        ds: &DelegationSecret,
    ) -> Result<Lvl2Key, DerivationError> {
        self.get(&meta.protocol)?.derive_lvl2_from_ds(meta, ds)
    }
}

impl fmt::Debug for DerivationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivationRegistry")
            .field("protocols", &self.protocols())
            .finish()
    }
}

lazy_static! {
    static ref KNOWN_DERIVATIONS: DerivationRegistry = DerivationRegistry::with_known_derivations();
}

/// Process-wide registry populated with the built-in derivations.
pub fn known_derivations() -> &'static DerivationRegistry {
    &KNOWN_DERIVATIONS
}
