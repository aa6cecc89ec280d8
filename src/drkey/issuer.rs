//! Key issuance on the daemon side.
//!
//! A [`KeyIssuer`] owns the master secret and the epoch schedule and answers
//! level-2 key requests for any time. Keys of protocols with a registered
//! delegated derivation are derived from the AS-to-AS key, so a host that
//! holds the delegation secret computes exactly the key the issuer hands out.

use std::fmt;

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::TryRngCore;

use super::derivation::{
    derive_lvl1, derive_lvl2_standard, known_derivations, DerivationError, DerivationRegistry,
};
use super::{DelegationSecret, EpochSchedule, KeyType, Lvl2Key, Lvl2Meta};
use crate::client::connector::Lvl2KeyProvider;
use crate::errors::DrkeyResult;

/// Master secret size in bytes.
pub const MASTER_SECRET_LEN: usize = 32;

/// Generate a new random master secret.
pub fn generate_master_secret() -> [u8; MASTER_SECRET_LEN] {
    let mut secret = [0u8; MASTER_SECRET_LEN];
    let mut rng = OsRng;

    // If OsRng fails here, the environment is badly broken → hard panic is acceptable.
    rng.try_fill_bytes(&mut secret)
        .expect("OsRng failed to generate master secret");

    secret
}

/// Issues level-2 keys from a master secret.
#[derive(Clone)]
pub struct KeyIssuer {
    master_secret: Vec<u8>,
    schedule: EpochSchedule,
    registry: DerivationRegistry,
}

impl KeyIssuer {
    pub fn new(master_secret: impl Into<Vec<u8>>, schedule: EpochSchedule) -> Self {
        Self {
            master_secret: master_secret.into(),
            schedule,
            registry: known_derivations().clone(),
        }
    }

    /// Issuer with a fresh random master secret.
    pub fn random(schedule: EpochSchedule) -> Self {
        Self::new(generate_master_secret().to_vec(), schedule)
    }

    pub fn with_registry(mut self, registry: DerivationRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn schedule(&self) -> EpochSchedule {
        self.schedule
    }

    pub fn registry(&self) -> &DerivationRegistry {
        &self.registry
    }

    /// Issue the key described by `meta` for the epoch containing `val_time`.
    pub fn issue(&self, meta: &Lvl2Meta, val_time: i64) -> Result<Lvl2Key, DerivationError> {
        let epoch = self
            .schedule
            .epoch_at(val_time)
            .ok_or(DerivationError::TimeOutOfRange(val_time))?;
        let lvl1 = derive_lvl1(&self.master_secret, epoch, meta.src_ia, meta.dst_ia);

        match meta.key_type {
            KeyType::AsToAs => derive_lvl2_standard(meta, &lvl1, epoch),
            _ if self.registry.contains(&meta.protocol) => {
                let ds_key = derive_lvl2_standard(&meta.delegation_meta(), &lvl1, epoch)?;
                let ds = DelegationSecret::try_from(ds_key)?;
                self.registry.derive(meta, &ds)
            }
            _ => derive_lvl2_standard(meta, &lvl1, epoch),
        }
    }
}

impl fmt::Debug for KeyIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyIssuer")
            .field("schedule", &self.schedule)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// In-process provider, no daemon involved.
#[async_trait]
impl Lvl2KeyProvider for KeyIssuer {
    async fn lvl2_key(&self, meta: &Lvl2Meta, val_time: i64) -> DrkeyResult<Lvl2Key> {
        Ok(self.issue(meta, val_time)?)
    }
}
