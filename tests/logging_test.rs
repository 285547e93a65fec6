//! Subscriber installation. Runs in its own binary since it sets the global
//! dispatcher.

use awc_logger::config::Settings;
use awc_logger::logging::{self, OutputFormat, TracingConfig};
use tracing::Level;

#[test]
fn test_init_is_idempotent() {
    let settings = Settings::from_toml_str(
        r#"
        [logging]
        level = "warn"
        format = "compact"

        [devices.AWC1]
        host = "10.2.2.201"
        "#,
    )
    .unwrap();

    assert!(logging::init_from_settings(&settings).is_ok());
    let again = TracingConfig::new(Level::DEBUG).with_format(OutputFormat::Json);
    assert!(logging::init(again).is_ok());
    tracing::warn!(device = "AWC1", "still logging");
}
