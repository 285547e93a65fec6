//! Device identity and connection state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a configured device, e.g. `AWC1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap a device identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A remote controller streaming telemetry over telnet.
///
/// Built once from configuration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Unique identifier, also used in segment filenames.
    pub id: DeviceId,
    /// Hostname or IP address.
    pub host: String,
    /// TCP port of the telnet service.
    pub port: u16,
}

impl Device {
    /// Create a device description.
    pub fn new(id: impl Into<DeviceId>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
        }
    }

    /// `host:port` form used for connecting and in status messages.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Link state of one device, owned by its reconnector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No link and no attempt in progress.
    #[default]
    Disconnected,
    /// A connect (and header read) is in progress.
    Connecting,
    /// Header received; data lines are being recorded.
    Connected,
    /// Waiting before the next connect attempt.
    Backoff,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Backoff => "backoff",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_address() {
        let device = Device::new("AWC1", "10.2.2.201", 23);
        assert_eq!(device.address(), "10.2.2.201:23");
        assert_eq!(device.id.to_string(), "AWC1");
    }
}
