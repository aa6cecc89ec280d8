//! The two demo roles.
//!
//! - `client` → fetches host keys from the daemon on every call
//! - `server` → fetches the delegation secret, derives host keys locally

pub mod client;
pub mod server;

pub use client::KeyClient;
pub use server::{DelegationSecretReport, KeyServer};

use crate::address::ScionAddr;
use crate::drkey::{Lvl2Meta, PISKES};

/// Host-to-host `piskes` metadata for a source/destination pair.
pub fn host_meta(src: ScionAddr, dst: ScionAddr) -> Lvl2Meta {
    Lvl2Meta::host_to_host(PISKES, src, dst)
}

/// Which demo roles to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    pub client: bool,
    pub server: bool,
}

impl Roles {
    /// Roles from the command-line flags; no flag selects both.
    pub fn from_flags(client: bool, server: bool) -> Self {
        if !client && !server {
            return Self {
                client: true,
                server: true,
            };
        }
        Self { client, server }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flag_selects_both_roles() {
        assert_eq!(
            Roles::from_flags(false, false),
            Roles {
                client: true,
                server: true
            }
        );
    }

    #[test]
    fn single_flag_selects_one_role() {
        let roles = Roles::from_flags(true, false);
        assert!(roles.client && !roles.server);

        let roles = Roles::from_flags(false, true);
        assert!(!roles.client && roles.server);

        assert_eq!(Roles::from_flags(true, true), Roles::from_flags(false, false));
    }
}
