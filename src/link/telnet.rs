//! Telnet over TCP.
//!
//! The controllers speak a minimal telnet dialect: no login, CRLF-terminated
//! lines, and occasional option negotiation right after connecting. Every
//! option is refused (`DO`/`DONT` answered with `WONT`, `WILL`/`WONT` with
//! `DONT`) and command sequences are removed from the data stream.

use super::{Connector, DeviceLink};
use crate::config::LinkConfig;
use crate::device::Device;
use crate::error::ConnectionError;
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Telnet's default port
pub const DEFAULT_PORT: u16 = 23;

/// Line delimiter on the wire
pub const LINE_DELIMITER: &[u8] = b"\r\n";

/// Longest line accepted before the session is dropped
pub const MAX_LINE_LEN: usize = 64 * 1024;

const READ_CHUNK: usize = 4096;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

/// Opens telnet sessions with the configured timeouts.
#[derive(Debug, Clone)]
pub struct TelnetConnector {
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
}

impl TelnetConnector {
    /// Connector with explicit timeouts. `read_timeout: None` waits forever.
    pub fn new(connect_timeout: Duration, read_timeout: Option<Duration>) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }

    /// Connector using the `[link]` settings.
    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(config.connect_timeout(), config.read_timeout())
    }
}

impl Default for TelnetConnector {
    fn default() -> Self {
        Self::from_config(&LinkConfig::default())
    }
}

#[async_trait]
impl Connector for TelnetConnector {
    type Link = TelnetLink;

    async fn connect(&self, device: &Device) -> Result<TelnetLink, ConnectionError> {
        let address = device.address();
        let stream = timeout(
            self.connect_timeout,
            TcpStream::connect((device.host.as_str(), device.port)),
        )
        .await
        .map_err(|_| ConnectionError::TimedOut("connecting"))??;

        stream.set_nodelay(true)?;
        tracing::debug!(device = %device.id, %address, "TCP connection established");

        let (reader, writer) = stream.into_split();
        Ok(TelnetLink {
            reader,
            writer,
            pending: BytesMut::with_capacity(READ_CHUNK),
            scanned: 0,
            filter: TelnetFilter::default(),
            read_timeout: self.read_timeout,
            header: None,
        })
    }
}

/// An open telnet session.
pub struct TelnetLink {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    pending: BytesMut,
    /// Bytes of `pending` already known to hold no delimiter.
    scanned: usize,
    filter: TelnetFilter,
    read_timeout: Option<Duration>,
    header: Option<String>,
}

impl TelnetLink {
    /// Split the first complete line off the pending buffer.
    fn take_line(&mut self) -> Option<String> {
        // A CR at the end of the scanned part may pair with a new LF.
        let from = self.scanned.saturating_sub(LINE_DELIMITER.len() - 1);
        let Some(pos) = self.pending[from..]
            .windows(LINE_DELIMITER.len())
            .position(|w| w == LINE_DELIMITER)
        else {
            self.scanned = self.pending.len();
            return None;
        };
        let raw = self.pending.split_to(from + pos);
        self.pending.advance(LINE_DELIMITER.len());
        self.scanned = 0;
        Some(String::from_utf8_lossy(&raw).trim_end().to_string())
    }

    async fn fill(&mut self) -> Result<(), ConnectionError> {
        let mut chunk = [0u8; READ_CHUNK];
        let read = self.reader.read(&mut chunk);
        let n = match self.read_timeout {
            Some(limit) => timeout(limit, read)
                .await
                .map_err(|_| ConnectionError::TimedOut("waiting for a line"))??,
            None => read.await?,
        };
        if n == 0 {
            return Err(ConnectionError::Eof);
        }

        let mut replies = Vec::new();
        self.filter.feed(&chunk[..n], &mut self.pending, &mut replies);
        if !replies.is_empty() {
            self.writer.write_all(&replies).await?;
            self.writer.flush().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceLink for TelnetLink {
    async fn read_line(&mut self) -> Result<String, ConnectionError> {
        loop {
            if let Some(line) = self.take_line() {
                if self.header.is_none() {
                    self.header = Some(line.clone());
                }
                return Ok(line);
            }
            if self.pending.len() > MAX_LINE_LEN {
                return Err(ConnectionError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("no line delimiter within {} bytes", MAX_LINE_LEN),
                )));
            }
            self.fill().await?;
        }
    }

    fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }
}

/// Incremental telnet command stripper.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum FilterState {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Separates payload bytes from telnet commands across read boundaries.
#[derive(Debug, Default)]
pub(crate) struct TelnetFilter {
    state: FilterState,
}

impl TelnetFilter {
    /// Append the payload of `input` to `data` and the negotiation answers to
    /// `replies`.
    pub(crate) fn feed(&mut self, input: &[u8], data: &mut BytesMut, replies: &mut Vec<u8>) {
        for &byte in input {
            self.state = match (self.state, byte) {
                (FilterState::Data, IAC) => FilterState::Iac,
                (FilterState::Data, b) => {
                    data.extend_from_slice(&[b]);
                    FilterState::Data
                }
                (FilterState::Iac, IAC) => {
                    data.extend_from_slice(&[IAC]);
                    FilterState::Data
                }
                (FilterState::Iac, cmd @ (DO | DONT | WILL | WONT)) => FilterState::Negotiate(cmd),
                (FilterState::Iac, SB) => FilterState::Sub,
                (FilterState::Iac, _) => FilterState::Data,
                (FilterState::Negotiate(cmd), option) => {
                    let answer = if cmd == DO || cmd == DONT { WONT } else { DONT };
                    replies.extend_from_slice(&[IAC, answer, option]);
                    FilterState::Data
                }
                (FilterState::Sub, IAC) => FilterState::SubIac,
                (FilterState::Sub, _) => FilterState::Sub,
                (FilterState::SubIac, SE) => FilterState::Data,
                (FilterState::SubIac, _) => FilterState::Sub,
            };
        }
    }
}
