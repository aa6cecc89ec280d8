//! hello-drkey - DRKey delegation secrets for SCION end hosts
//!
//! Two ways of obtaining a host-to-host key are shown side by side:
//!
//! - the **client** asks the key daemon for the host key directly;
//! - the **server** (a delegate) fetches the AS-to-AS delegation secret once
//!   and derives host keys locally through the protocol registry.
//!
//! A C-callable shim ([`ffi`]) exposes the delegation-secret fetch to
//! non-Rust callers.
//!
//! # Features
//!
//! - `daemon` - Reference key daemon (HTTP service). Enabled by default.
//!
//! # Example
//!
//! ```toml
//! # Library, CLI and reference daemon
//! hello-drkey = { path = "." }
//!
//! # Client side only
//! hello-drkey = { path = ".", default-features = false }
//! ```

// Core modules (always available)
pub mod address;
pub mod config;
pub mod drkey;
pub mod errors;
pub mod ffi;
pub mod logging;
pub mod roles;
pub mod wire;

// Daemon connection (always available)
pub mod client {
    pub mod connector;

    pub use connector::{DaemonConnector, Lvl2KeyProvider};
}

// Reference key daemon (requires "daemon" feature)
#[cfg(feature = "daemon")]
#[path = "daemon/mod.rs"]
pub mod daemon;

pub use address::{parse_endpoint, HostAddr, IsdAsn, ScionAddr};
pub use drkey::{DelegationSecret, Epoch, Key, KeyType, Lvl2Key, Lvl2Meta};
pub use errors::{DrkeyError, DrkeyResult};
