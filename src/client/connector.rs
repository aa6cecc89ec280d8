//! Connection to the key daemon.
//!
//! Every request is bounded by the connector's timeout; expiry is reported
//! as [`DrkeyError::Timeout`]. There is no retry and no caching: each call is
//! one round trip.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::drkey::{Lvl2Key, Lvl2Meta};
use crate::errors::{DrkeyError, DrkeyResult};
use crate::wire::{ErrorResponse, Lvl2KeyRequest, Lvl2KeyResponse, HEALTH_PATH, LVL2_PATH};

/// Default daemon address.
pub const DEFAULT_DAEMON_ADDR: &str = "127.0.0.1:30255";

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of level-2 keys.
#[async_trait]
pub trait Lvl2KeyProvider: Send + Sync {
    /// Fetch the level-2 key described by `meta` valid at `val_time`
    /// (Unix seconds).
    async fn lvl2_key(&self, meta: &Lvl2Meta, val_time: i64) -> DrkeyResult<Lvl2Key>;
}

/// HTTP connector to a key daemon.
#[derive(Debug, Clone)]
pub struct DaemonConnector {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl DaemonConnector {
    /// Build a connector without touching the network.
    ///
    /// `addr` is either `host:port` or a full `http(s)://` URL.
    pub fn new(addr: &str, timeout: Duration) -> DrkeyResult<Self> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(DrkeyError::Config("daemon address is empty".to_string()));
        }

        let base_url = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{addr}")
        };

        Ok(Self {
            http: Client::new(),
            base_url,
            timeout,
        })
    }

    /// Connect with the default 10 second request timeout.
    pub async fn connect(addr: &str) -> DrkeyResult<Self> {
        Self::connect_with_timeout(addr, DEFAULT_REQUEST_TIMEOUT).await
    }

    /// Build a connector and check that the daemon answers.
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> DrkeyResult<Self> {
        let connector = Self::new(addr, timeout)?;
        connector.health().await?;
        debug!(daemon = %connector.base_url, "Connected to key daemon");
        Ok(connector)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Query `GET /health`.
    pub async fn health(&self) -> DrkeyResult<()> {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);
        let resp = self
            .with_deadline(async { self.http.get(&url).send().await.map_err(DrkeyError::from) })
            .await?;

        if !resp.status().is_success() {
            return Err(DrkeyError::InvalidResponse(format!(
                "health check failed with HTTP status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn with_deadline<T, F>(&self, fut: F) -> DrkeyResult<T>
    where
        F: Future<Output = DrkeyResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(daemon = %self.base_url, timeout = ?self.timeout, "Daemon request timed out");
                Err(DrkeyError::Timeout(self.timeout))
            }
        }
    }

    async fn request_lvl2(&self, request: &Lvl2KeyRequest) -> DrkeyResult<Lvl2Key> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, LVL2_PATH))
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await?;
            return Err(match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => err.into(),
                Err(_) => {
                    DrkeyError::InvalidResponse(format!("daemon returned HTTP status {status}"))
                }
            });
        }

        let body: Lvl2KeyResponse = resp.json().await.map_err(|e| {
            DrkeyError::InvalidResponse(format!("failed to parse lvl2 response: {e}"))
        })?;
        let key = body.into_key()?;

        if key.meta() != request.meta {
            return Err(DrkeyError::InvalidResponse(
                "daemon answered for different key metadata".to_string(),
            ));
        }
        if !key.epoch.contains(request.val_time) {
            return Err(DrkeyError::InvalidResponse(format!(
                "epoch {} does not contain requested time {}",
                key.epoch, request.val_time
            )));
        }

        Ok(key)
    }
}

#[async_trait]
impl Lvl2KeyProvider for DaemonConnector {
    async fn lvl2_key(&self, meta: &Lvl2Meta, val_time: i64) -> DrkeyResult<Lvl2Key> {
        let request = Lvl2KeyRequest {
            meta: meta.clone(),
            val_time,
        };
        debug!(
            key_type = %meta.key_type,
            protocol = %meta.protocol,
            src_ia = %meta.src_ia,
            dst_ia = %meta.dst_ia,
            val_time,
            "Requesting lvl2 key"
        );
        self.with_deadline(self.request_lvl2(&request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_gets_http_scheme() {
        let c = DaemonConnector::new("127.0.0.1:30255", DEFAULT_REQUEST_TIMEOUT).unwrap();
        assert_eq!(c.base_url(), "http://127.0.0.1:30255");
    }

    #[test]
    fn full_url_is_kept() {
        let c = DaemonConnector::new("https://daemon.local:8443/", Duration::from_secs(1)).unwrap();
        assert_eq!(c.base_url(), "https://daemon.local:8443");
        assert_eq!(c.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn empty_address_is_config_error() {
        assert!(matches!(
            DaemonConnector::new("  ", DEFAULT_REQUEST_TIMEOUT),
            Err(DrkeyError::Config(_))
        ));
    }
}
