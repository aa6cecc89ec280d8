//! Server (delegate) role: fetch the delegation secret once, then derive
//! host keys locally (fast path).

use std::time::Duration;

use tracing::info;

use crate::client::connector::{DaemonConnector, Lvl2KeyProvider};
use crate::drkey::derivation::{known_derivations, DerivationRegistry};
use crate::drkey::{unix_now, DelegationSecret, Lvl2Key, Lvl2Meta};
use crate::errors::{DrkeyError, DrkeyResult};

/// The delegation secret valid now plus the neighbouring epochs' keys.
#[derive(Debug, Clone)]
pub struct DelegationSecretReport {
    pub current: DelegationSecret,
    /// Key returned for `current.epoch.not_after + 1`.
    pub next: Lvl2Key,
    /// Key returned for `current.epoch.not_before - 1`.
    pub prev: Lvl2Key,
}

/// Fetches delegation secrets and derives host keys from them.
#[derive(Debug, Clone)]
pub struct KeyServer<P = DaemonConnector> {
    provider: P,
    registry: DerivationRegistry,
}

impl KeyServer<DaemonConnector> {
    pub async fn connect(daemon_addr: &str, timeout: Duration) -> DrkeyResult<Self> {
        let connector = DaemonConnector::connect_with_timeout(daemon_addr, timeout).await?;
        Ok(Self::new(connector))
    }
}

impl<P: Lvl2KeyProvider> KeyServer<P> {
    /// Server using the built-in derivations.
    pub fn new(provider: P) -> Self {
        Self::with_registry(provider, known_derivations().clone())
    }

    pub fn with_registry(provider: P, registry: DerivationRegistry) -> Self {
        Self { provider, registry }
    }

    pub fn registry(&self) -> &DerivationRegistry {
        &self.registry
    }

    /// Delegation secret for `meta`'s protocol and IA pair, valid now.
    pub async fn delegation_secret(&self, meta: &Lvl2Meta) -> DrkeyResult<DelegationSecretReport> {
        self.delegation_secret_at(meta, unix_now()).await
    }

    /// Delegation secret valid at `now`, followed by the keys one second past
    /// either end of its epoch.
    pub async fn delegation_secret_at(
        &self,
        meta: &Lvl2Meta,
        now: i64,
    ) -> DrkeyResult<DelegationSecretReport> {
        let ds_meta = meta.delegation_meta();

        let current = self.provider.lvl2_key(&ds_meta, now).await?;
        info!(
            protocol = %ds_meta.protocol,
            src_ia = %ds_meta.src_ia,
            dst_ia = %ds_meta.dst_ia,
            epoch = %current.epoch,
            "Fetched delegation secret"
        );

        let next_time = current.epoch.not_after.checked_add(1).ok_or_else(|| {
            DrkeyError::InvalidResponse(format!("epoch {} has no successor", current.epoch))
        })?;
        let prev_time = current.epoch.not_before.checked_sub(1).ok_or_else(|| {
            DrkeyError::InvalidResponse(format!("epoch {} has no predecessor", current.epoch))
        })?;

        let next = self.provider.lvl2_key(&ds_meta, next_time).await?;
        let prev = self.provider.lvl2_key(&ds_meta, prev_time).await?;

        Ok(DelegationSecretReport {
            current: DelegationSecret::try_from(current)?,
            next,
            prev,
        })
    }

    /// Derive the host key for `meta` from `ds` without contacting the daemon.
    pub fn host_key_from_ds(&self, meta: &Lvl2Meta, ds: &DelegationSecret) -> DrkeyResult<Lvl2Key> {
        Ok(self.registry.derive(meta, ds)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drkey::derivation::DerivationError;
    use crate::drkey::issuer::KeyIssuer;
    use crate::drkey::EpochSchedule;
    use crate::drkey::{Epoch, Key, KEY_LEN};
    use crate::roles::client::KeyClient;
    use async_trait::async_trait;
    use crate::roles::host_meta;

    fn issuer() -> KeyIssuer {
        let schedule = EpochSchedule::new(Duration::from_secs(86_400)).unwrap();
        KeyIssuer::new(vec![9; 32], schedule)
    }

    fn meta() -> Lvl2Meta {
        host_meta(
            "1-ff00:0:111,[127.0.0.1]".parse().unwrap(),
            "1-ff00:0:112,[fd00:f00d:cafe::7f00:a]".parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn report_covers_neighbouring_epochs() {
        let server = KeyServer::new(issuer());
        let now = 1_700_000_000;
        let report = server.delegation_secret_at(&meta(), now).await.unwrap();

        let epoch = report.current.epoch;
        assert!(epoch.contains(now));
        assert_eq!(report.next.epoch.not_before, epoch.not_after);
        assert_eq!(report.prev.epoch.not_after, epoch.not_before);
        assert_ne!(report.next.key, report.current.key);
        assert_ne!(report.prev.key, report.current.key);
    }

    #[tokio::test]
    async fn fast_path_matches_slow_path() {
        let issuer = issuer();
        let now = 1_700_000_000;

        let server = KeyServer::new(issuer.clone());
        let report = server.delegation_secret_at(&meta(), now).await.unwrap();
        let derived = server.host_key_from_ds(&meta(), &report.current).unwrap();

        let fetched = KeyClient::new(issuer).host_key_at(&meta(), now).await.unwrap();
        assert_eq!(derived, fetched);
    }

    #[tokio::test]
    async fn unknown_protocol_fails() {
        let server = KeyServer::with_registry(issuer(), DerivationRegistry::new());
        let report = server.delegation_secret_at(&meta(), 0).await.unwrap();
        let err = server.host_key_from_ds(&meta(), &report.current).unwrap_err();
        assert!(matches!(
            err,
            DrkeyError::Derivation(DerivationError::UnknownProtocol(_))
        ));
    }

    /// Hands out a fixed epoch regardless of the requested time.
    struct FixedEpoch(Epoch);

    #[async_trait]
    impl Lvl2KeyProvider for FixedEpoch {
        async fn lvl2_key(&self, meta: &Lvl2Meta, _val_time: i64) -> DrkeyResult<Lvl2Key> {
            Ok(Lvl2Key::from_meta(meta, self.0, Key::new([1; KEY_LEN])))
        }
    }

    #[tokio::test]
    async fn epoch_at_range_end_is_invalid_response() {
        let server = KeyServer::new(FixedEpoch(Epoch::new(i64::MAX - 10, i64::MAX)));
        let err = server
            .delegation_secret_at(&meta(), i64::MAX - 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DrkeyError::InvalidResponse(_)), "{err:?}");

        let server = KeyServer::new(FixedEpoch(Epoch::new(i64::MIN, i64::MIN + 10)));
        let err = server
            .delegation_secret_at(&meta(), i64::MIN + 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DrkeyError::InvalidResponse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn extreme_times_are_rejected_by_issuer() {
        let server = KeyServer::new(issuer());
        for t in [i64::MAX, i64::MIN] {
            let err = server.delegation_secret_at(&meta(), t).await.unwrap_err();
            assert!(matches!(
                err,
                DrkeyError::Derivation(DerivationError::TimeOutOfRange(_))
            ));
        }
    }
}
