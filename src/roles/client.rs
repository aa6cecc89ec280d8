//! Client role: fetch host keys straight from the daemon (slow path).

use std::time::Duration;

use crate::client::connector::{DaemonConnector, Lvl2KeyProvider};
use crate::drkey::derivation::DerivationError;
use crate::drkey::{unix_now, KeyType, Lvl2Key, Lvl2Meta};
use crate::errors::DrkeyResult;

/// Requests host-to-host keys from the daemon, one round trip per call.
#[derive(Debug, Clone)]
pub struct KeyClient<P = DaemonConnector> {
    provider: P,
}

impl KeyClient<DaemonConnector> {
    pub async fn connect(daemon_addr: &str, timeout: Duration) -> DrkeyResult<Self> {
        let connector = DaemonConnector::connect_with_timeout(daemon_addr, timeout).await?;
        Ok(Self::new(connector))
    }
}

impl<P: Lvl2KeyProvider> KeyClient<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Host key valid now.
    pub async fn host_key(&self, meta: &Lvl2Meta) -> DrkeyResult<Lvl2Key> {
        self.host_key_at(meta, unix_now()).await
    }

    /// Host key valid at `val_time` (Unix seconds).
    pub async fn host_key_at(&self, meta: &Lvl2Meta, val_time: i64) -> DrkeyResult<Lvl2Key> {
        if meta.key_type == KeyType::AsToAs {
            return Err(DerivationError::KeyTypeMismatch {
                expected: KeyType::HostToHost,
                actual: meta.key_type,
            }
            .into());
        }
        self.provider.lvl2_key(meta, val_time).await
    }
}
