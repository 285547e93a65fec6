//! Scripted Links
//!
//! Simulated devices for exercising the reconnect and recording path without a
//! network. Each device gets a queue of connection attempts; every call to
//! `connect` consumes the next one.
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = ScriptedConnector::new()
//!     .script("AWC1", [Attempt::Refuse, Attempt::lines(["H", "1", "2"])]);
//! ```
//!
//! Once a device's queue is empty, further attempts are refused. All waits
//! use `tokio::time`, so tests may run with paused time.

use super::{Connector, DeviceLink};
use crate::device::{Device, DeviceId};
use crate::error::ConnectionError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of one scripted connection attempt.
#[derive(Debug, Clone)]
pub enum Attempt {
    /// The connection is refused.
    Refuse,
    /// The connection succeeds and delivers `lines` (header first), one every
    /// `interval`. Afterwards the stream ends, or stays silent if `hang`.
    Stream {
        /// Header followed by data lines
        lines: Vec<String>,
        /// Delay before each line
        interval: Duration,
        /// Stay connected but silent after the last line
        hang: bool,
    },
}

impl Attempt {
    /// Deliver `lines` immediately, then end the stream.
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Attempt::Stream {
            lines: lines.into_iter().map(Into::into).collect(),
            interval: Duration::ZERO,
            hang: false,
        }
    }

    /// Deliver `lines` immediately, then keep the link open and silent.
    pub fn lines_then_hang<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match Self::lines(lines) {
            Attempt::Stream { lines, interval, .. } => Attempt::Stream {
                lines,
                interval,
                hang: true,
            },
            refuse => refuse,
        }
    }

    /// Space the lines of a stream `interval` apart.
    pub fn every(self, every: Duration) -> Self {
        match self {
            Attempt::Stream { lines, hang, .. } => Attempt::Stream {
                lines,
                interval: every,
                hang,
            },
            refuse => refuse,
        }
    }
}

/// Connector replaying per-device scripts.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    scripts: Mutex<HashMap<DeviceId, VecDeque<Attempt>>>,
    attempts: Mutex<Vec<(DeviceId, Instant)>>,
}

impl ScriptedConnector {
    /// Connector with no scripts; every attempt is refused.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append attempts to a device's script.
    pub fn script<I>(self, device: impl Into<DeviceId>, attempts: I) -> Self
    where
        I: IntoIterator<Item = Attempt>,
    {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(device.into())
            .or_default()
            .extend(attempts);
        self
    }

    /// Instants at which `device` tried to connect.
    pub fn attempts_for(&self, device: &DeviceId) -> Vec<Instant> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| id == device)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Link = ScriptedLink;

    async fn connect(&self, device: &Device) -> Result<ScriptedLink, ConnectionError> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((device.id.clone(), Instant::now()));

        let next = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&device.id)
            .and_then(VecDeque::pop_front);

        match next {
            None | Some(Attempt::Refuse) => Err(ConnectionError::Refused),
            Some(Attempt::Stream {
                lines,
                interval,
                hang,
            }) => Ok(ScriptedLink {
                lines: lines.into(),
                interval,
                hang,
                header: None,
            }),
        }
    }
}

/// Link produced by [`ScriptedConnector`].
#[derive(Debug)]
pub struct ScriptedLink {
    lines: VecDeque<String>,
    interval: Duration,
    hang: bool,
    header: Option<String>,
}

#[async_trait]
impl DeviceLink for ScriptedLink {
    async fn read_line(&mut self) -> Result<String, ConnectionError> {
        let Some(line) = self.lines.pop_front() else {
            if self.hang {
                std::future::pending::<()>().await;
            }
            return Err(ConnectionError::Eof);
        };
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        if self.header.is_none() {
            self.header = Some(line.clone());
        }
        Ok(line)
    }

    fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }
}
