/*!
 * C-callable delegation secret fetch.
 *
 * Two aborting entry points mirror the demo contract: on any failure the
 * process is aborted, nothing is returned. `drkey_get_delegation_secret` is
 * the recoverable form for long-lived callers.
 *
 * Packed layout (32 bytes, native endian):
 *
 * | offset | size | field               |
 * |--------|------|---------------------|
 * | 0      | 8    | validity_not_before |
 * | 8      | 8    | validity_not_after  |
 * | 16     | 16   | key                 |
 */

#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::ffi::CStr;
use std::fmt::Display;
use std::ptr;
use std::time::Duration;

use libc::{c_char, c_int};
use tracing::error;

use crate::address::IsdAsn;
use crate::client::connector::{DaemonConnector, Lvl2KeyProvider, DEFAULT_REQUEST_TIMEOUT};
use crate::drkey::{DelegationSecret, Lvl2Meta, KEY_LEN, PISKES};
use crate::errors::{DrkeyError, DrkeyResult};

/// Size of the packed delegation secret buffer.
pub const DELEGATION_SECRET_LEN: usize = 8 + 8 + KEY_LEN;

pub const DRKEY_OK: c_int = 0;
pub const DRKEY_ERR_INVALID_ARGUMENT: c_int = -1;
pub const DRKEY_ERR_TRANSPORT: c_int = -2;
pub const DRKEY_ERR_TIMEOUT: c_int = -3;
pub const DRKEY_ERR_DAEMON: c_int = -4;
pub const DRKEY_ERR_OTHER: c_int = -5;

/// Fixed-layout delegation secret handed across the C boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DelegationSecretRecord {
    pub validity_not_before: i64,
    pub validity_not_after: i64,
    pub key: [u8; KEY_LEN],
}

impl DelegationSecretRecord {
    /// Serialize into the packed buffer layout.
    pub fn to_bytes(&self) -> [u8; DELEGATION_SECRET_LEN] {
        let mut buf = [0u8; DELEGATION_SECRET_LEN];
        buf[0..8].copy_from_slice(&self.validity_not_before.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.validity_not_after.to_ne_bytes());
        buf[16..].copy_from_slice(&self.key);
        buf
    }

    /// Inverse of [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(buf: &[u8; DELEGATION_SECRET_LEN]) -> Self {
        let mut not_before = [0u8; 8];
        let mut not_after = [0u8; 8];
        let mut key = [0u8; KEY_LEN];
        not_before.copy_from_slice(&buf[0..8]);
        not_after.copy_from_slice(&buf[8..16]);
        key.copy_from_slice(&buf[16..]);

        Self {
            validity_not_before: i64::from_ne_bytes(not_before),
            validity_not_after: i64::from_ne_bytes(not_after),
            key,
        }
    }
}

impl From<&DelegationSecret> for DelegationSecretRecord {
    fn from(ds: &DelegationSecret) -> Self {
        Self {
            validity_not_before: ds.epoch.not_before,
            validity_not_after: ds.epoch.not_after,
            key: *ds.key.as_bytes(),
        }
    }
}

/// Fetch the `piskes` delegation secret for `src_ia -> dst_ia` valid at
/// `val_time`.
pub async fn fetch_delegation_secret_async(
    daemon_addr: &str,
    src_ia: u64,
    dst_ia: u64,
    val_time: i64,
    timeout: Duration,
) -> DrkeyResult<DelegationSecret> {
    let connector = DaemonConnector::connect_with_timeout(daemon_addr, timeout).await?;
    let meta = Lvl2Meta::as_to_as(PISKES, IsdAsn(src_ia), IsdAsn(dst_ia));
    let key = connector.lvl2_key(&meta, val_time).await?;
    Ok(DelegationSecret::try_from(key)?)
}

/// Blocking form of [`fetch_delegation_secret_async`] with the default
/// 10 second timeout. Runs on its own current-thread runtime, so it must not
/// be called from inside a tokio runtime.
pub fn fetch_delegation_secret(
    daemon_addr: &str,
    src_ia: u64,
    dst_ia: u64,
    val_time: i64,
) -> DrkeyResult<DelegationSecretRecord> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let ds = runtime.block_on(fetch_delegation_secret_async(
        daemon_addr,
        src_ia,
        dst_ia,
        val_time,
        DEFAULT_REQUEST_TIMEOUT,
    ))?;
    Ok(DelegationSecretRecord::from(&ds))
}

/// Map an error to the status code returned by `drkey_get_delegation_secret`.
pub fn error_code(err: &DrkeyError) -> c_int {
    match err {
        DrkeyError::Address(_) | DrkeyError::Config(_) => DRKEY_ERR_INVALID_ARGUMENT,
        DrkeyError::Transport(_) => DRKEY_ERR_TRANSPORT,
        DrkeyError::Timeout(_) => DRKEY_ERR_TIMEOUT,
        DrkeyError::Daemon { .. } | DrkeyError::InvalidResponse(_) => DRKEY_ERR_DAEMON,
        DrkeyError::Derivation(_) | DrkeyError::Io(_) => DRKEY_ERR_OTHER,
    }
}

unsafe fn read_addr(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(str::to_owned)
}

fn fatal(err: impl Display) -> ! {
    error!(error = %err, "Fatal error in GetDelegationSecret");
    eprintln!("Fatal error: {err}");
    std::process::abort()
}

unsafe fn fetch_or_abort(
    addr: *const c_char,
    src_ia: u64,
    dst_ia: u64,
    val_time: i64,
) -> DelegationSecretRecord {
    let addr = match read_addr(addr) {
        Some(addr) => addr,
        None => fatal("daemon address is null or not UTF-8"),
    };
    match fetch_delegation_secret(&addr, src_ia, dst_ia, val_time) {
        Ok(record) => record,
        Err(e) => fatal(e),
    }
}

/// Fetch a delegation secret into three discrete output locations.
///
/// Aborts the process on any error.
///
/// # Safety
///
/// `sciond_addr` must point to a NUL-terminated string. `validity_not_before`
/// and `validity_not_after` must be valid for an `i64` write and `key` for a
/// 16-byte write.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn GetDelegationSecret(
    sciond_addr: *const c_char,
    src_ia: u64,
    dst_ia: u64,
    val_time: i64,
    validity_not_before: *mut i64,
    validity_not_after: *mut i64,
    key: *mut u8,
) {
    if validity_not_before.is_null() || validity_not_after.is_null() || key.is_null() {
        fatal("null output pointer");
    }

    let record = fetch_or_abort(sciond_addr, src_ia, dst_ia, val_time);

    ptr::write(validity_not_before, record.validity_not_before);
    ptr::write(validity_not_after, record.validity_not_after);
    ptr::copy_nonoverlapping(record.key.as_ptr(), key, KEY_LEN);
}

/// Fetch a delegation secret into a packed 32-byte buffer.
///
/// Aborts the process on any error.
///
/// # Safety
///
/// `sciond_addr` must point to a NUL-terminated string and `out` must be
/// valid for a [`DELEGATION_SECRET_LEN`]-byte write.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn GetDelegationSecretBuf(
    sciond_addr: *const c_char,
    src_ia: u64,
    dst_ia: u64,
    val_time: i64,
    out: *mut u8,
) {
    if out.is_null() {
        fatal("null output buffer");
    }

    let record = fetch_or_abort(sciond_addr, src_ia, dst_ia, val_time);
    let bytes = record.to_bytes();
    ptr::copy_nonoverlapping(bytes.as_ptr(), out, DELEGATION_SECRET_LEN);
}

/// Recoverable variant: returns [`DRKEY_OK`] and fills `out` (packed layout),
/// or a negative `DRKEY_ERR_*` code and leaves `out` untouched.
///
/// # Safety
///
/// `sciond_addr` must be null or point to a NUL-terminated string and `out`
/// must be null or valid for a [`DELEGATION_SECRET_LEN`]-byte write.
#[no_mangle]
pub unsafe extern "C" fn drkey_get_delegation_secret(
    sciond_addr: *const c_char,
    src_ia: u64,
    dst_ia: u64,
    val_time: i64,
    out: *mut u8,
) -> c_int {
    if out.is_null() {
        return DRKEY_ERR_INVALID_ARGUMENT;
    }
    let Some(addr) = read_addr(sciond_addr) else {
        return DRKEY_ERR_INVALID_ARGUMENT;
    };

    match fetch_delegation_secret(&addr, src_ia, dst_ia, val_time) {
        Ok(record) => {
            let bytes = record.to_bytes();
            ptr::copy_nonoverlapping(bytes.as_ptr(), out, DELEGATION_SECRET_LEN);
            DRKEY_OK
        }
        Err(e) => {
            error!(error = %e, "Failed to fetch delegation secret");
            error_code(&e)
        }
    }
}
