//! Device links
//!
//! A [`Connector`] opens a [`DeviceLink`] to a device; the link yields text
//! lines until it fails. The first line of every session is the header, which
//! the link keeps alongside the data lines.
//!
//! - [`telnet`]: the real link, a telnet session over TCP
//! - [`mock`]: scripted links for tests and dry runs

pub mod mock;
pub mod telnet;

pub use mock::{Attempt, ScriptedConnector};
pub use telnet::{TelnetConnector, TelnetLink};

use crate::device::Device;
use crate::error::ConnectionError;
use async_trait::async_trait;

/// One live session with a device.
#[async_trait]
pub trait DeviceLink: Send {
    /// Wait for the next complete line, without its delimiter.
    ///
    /// The first line returned after connecting is the header.
    async fn read_line(&mut self) -> Result<String, ConnectionError>;

    /// Header of this session, once the first line has been read.
    fn header(&self) -> Option<&str>;
}

/// Opens links. Shared by all device tasks.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Link type produced by this connector.
    type Link: DeviceLink + 'static;

    /// Establish a new session with `device`.
    async fn connect(&self, device: &Device) -> Result<Self::Link, ConnectionError>;
}
