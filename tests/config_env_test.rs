//! Environment overrides. Kept in its own test binary since it mutates the
//! process environment; tests within it run serially.

use awc_logger::config::Settings;
use serial_test::serial;
use std::path::Path;
use std::time::Duration;

const SHIPPED_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/config/awc_logger.toml");

/// Load `path` with the given variables set, removing them afterwards.
fn load_with_env(path: impl AsRef<Path>, vars: &[(&str, &str)]) -> awc_logger::AppResult<Settings> {
    for (key, value) in vars {
        std::env::set_var(key, value);
    }
    let settings = Settings::load_from(path);
    for (key, _) in vars {
        std::env::remove_var(key);
    }
    settings
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("awc.toml");
    std::fs::write(
        &path,
        r#"
        [rotation]
        unit = "hours"
        interval = 1

        [devices.AWC1]
        host = "10.2.2.201"
        "#,
    )
    .unwrap();

    let settings = load_with_env(
        &path,
        &[
            ("AWC_LOGGER_ROTATION__INTERVAL", "6"),
            ("AWC_LOGGER_LINK__CONNECT_TIMEOUT_SECS", "3"),
        ],
    )
    .unwrap();
    assert_eq!(settings.rotation.interval, 6);
    assert_eq!(settings.link.connect_timeout(), Duration::from_secs(3));
}

#[test]
#[serial]
fn test_device_host_override_applies_to_configured_device() {
    let settings =
        load_with_env(SHIPPED_CONFIG, &[("AWC_LOGGER_DEVICES__AWC1__HOST", "10.2.2.210")]).unwrap();

    let devices = settings.devices();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id.as_str(), "AWC1");
    assert_eq!(devices[0].address(), "10.2.2.210:23");
    assert_eq!(devices[1].id.as_str(), "AWC2");
    assert_eq!(devices[1].address(), "10.2.2.205:23");
}

#[test]
#[serial]
fn test_device_port_override_keeps_file_host() {
    let settings =
        load_with_env(SHIPPED_CONFIG, &[("AWC_LOGGER_DEVICES__AWC2__PORT", "2323")]).unwrap();

    let devices = settings.devices();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[1].address(), "10.2.2.205:2323");
}
