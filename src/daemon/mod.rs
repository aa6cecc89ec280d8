//! Reference key daemon.
//!
//! A small HTTP service that issues level-2 keys from a local master secret,
//! so the client, the delegate and the C shim have something to talk to.
//!
//! - `api_error` → error envelope and status mapping
//! - `handlers`  → Axum handlers and shared state
//! - `logging`   → request ID middleware and health body
//! - `routes`    → router builder

pub mod api_error;
pub mod handlers;
pub mod logging;
pub mod routes;

pub use api_error::ApiError;
pub use handlers::AppState;
pub use routes::build_router;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::DrkeyConfig;
use crate::drkey::issuer::KeyIssuer;
use crate::errors::DrkeyResult;

impl AppState {
    /// State for a daemon configured by `config`.
    ///
    /// Without a configured master secret a random one is generated, so keys
    /// only stay stable for the lifetime of the process.
    pub fn from_config(config: &DrkeyConfig) -> DrkeyResult<Self> {
        let schedule = config.epoch_schedule()?;
        let issuer = match config.master_secret()? {
            Some(secret) => KeyIssuer::new(secret, schedule),
            None => {
                info!("No master secret configured, generating a random one");
                KeyIssuer::random(schedule)
            }
        };
        Ok(Self::new(issuer))
    }
}

/// Serve the daemon on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: AppState) -> DrkeyResult<()> {
    let app = build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
