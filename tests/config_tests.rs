use std::env;
use std::time::Duration;

use serial_test::serial;

use drkey::config::{get_daemon_addr, is_logging_enabled, DrkeyConfig};
use drkey::errors::DrkeyError;

const VARS: &[&str] = &[
    "DRKEY_SCIOND_ADDR",
    "DRKEY_REQUEST_TIMEOUT_SECS",
    "DRKEY_SERVER_HOST",
    "DRKEY_SERVER_PORT",
    "DRKEY_EPOCH_DURATION_SECS",
    "DRKEY_MASTER_SECRET",
    "DRKEY_LOGGING_ENABLED",
    "DRKEY_LOG_LEVEL",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn defaults_without_env() {
    clear_env();

    let config = DrkeyConfig::load().expect("config should load");
    assert_eq!(config.daemon.address, "127.0.0.1:30255");
    assert_eq!(config.request_timeout(), Duration::from_secs(10));
    assert_eq!(config.server.port, 30255);
    assert_eq!(config.server.epoch_duration_secs, 86_400);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn env_overrides_defaults() {
    clear_env();
    env::set_var("DRKEY_SCIOND_ADDR", "10.0.0.1:31000");
    env::set_var("DRKEY_REQUEST_TIMEOUT_SECS", "3");
    env::set_var("DRKEY_SERVER_PORT", "31000");
    env::set_var("DRKEY_EPOCH_DURATION_SECS", "600");
    env::set_var("DRKEY_MASTER_SECRET", "ab".repeat(32));
    env::set_var("DRKEY_LOGGING_ENABLED", "true");
    env::set_var("DRKEY_LOG_LEVEL", "debug");

    let config = DrkeyConfig::load().expect("config should load");
    assert_eq!(config.daemon.address, "10.0.0.1:31000");
    assert_eq!(config.request_timeout(), Duration::from_secs(3));
    assert_eq!(config.server.port, 31000);
    assert_eq!(
        config.epoch_schedule().unwrap().duration(),
        Duration::from_secs(600)
    );
    assert_eq!(config.master_secret().unwrap().unwrap(), vec![0xab; 32]);
    assert!(config.logging.enabled);
    assert_eq!(config.logging.level, "debug");
    assert!(config.validate().is_ok());

    clear_env();
}

#[test]
#[serial]
fn invalid_master_secret_fails_validation() {
    clear_env();
    env::set_var("DRKEY_MASTER_SECRET", "not-hex");

    let config = DrkeyConfig::load().expect("config should load");
    assert!(matches!(config.validate(), Err(DrkeyError::Config(_))));

    clear_env();
}

#[test]
#[serial]
fn unparsable_numbers_fall_back_to_defaults() {
    clear_env();
    env::set_var("DRKEY_SERVER_PORT", "not-a-port");

    let config = DrkeyConfig::load().expect("config should load");
    assert_eq!(config.server.port, 30255);

    clear_env();
}

#[test]
#[serial]
fn global_accessors_do_not_panic() {
    // Values depend on the environment of the first caller; only check shape.
    assert!(!get_daemon_addr().is_empty());
    let _logging_enabled = is_logging_enabled();
}
