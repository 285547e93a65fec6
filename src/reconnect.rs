//! Reconnect loop for one device.
//!
//! ```text
//!            ┌──────────── shutdown ─────────────┐
//!            ▼                                   │
//!   Disconnected ──► Connecting ──► Connected ───┤
//!                       ▲   │           │        │
//!                       │   └─ error ──►├──► Backoff
//!                       └──── sleep ────┘
//! ```
//!
//! Link errors move the device to `Backoff`, where it waits for the next delay
//! of its [`Backoff`] sequence and tries again. There is no retry limit. The
//! sequence resets once a connection has delivered its header. Only segment
//! write errors end the loop with an error.

use crate::backoff::{Backoff, BackoffPolicy};
use crate::device::{ConnectionState, Device};
use crate::error::{AppResult, ConnectionError, LoggerError};
use crate::link::{Connector, DeviceLink};
use crate::recorder::RotatingRecorder;
use crate::shutdown::Shutdown;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Keeps one device connected and feeds its lines to a recorder.
pub struct Reconnector<C: Connector> {
    device: Device,
    connector: Arc<C>,
    backoff: Backoff,
    state: watch::Sender<ConnectionState>,
}

impl<C: Connector> Reconnector<C> {
    /// Reconnector starting in `Disconnected` with a fresh backoff sequence.
    pub fn new(device: Device, connector: Arc<C>, policy: BackoffPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            device,
            connector,
            backoff: Backoff::new(policy),
            state,
        }
    }

    /// Current link state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Follow state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// The device this loop serves.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Run until `shutdown` fires or a segment write fails.
    ///
    /// Link failures never escape this function. On return the recorder's
    /// segment is closed and the state is `Disconnected`.
    pub async fn run(
        &mut self,
        recorder: &mut RotatingRecorder,
        mut shutdown: Shutdown,
    ) -> AppResult<()> {
        let result = loop {
            if shutdown.is_triggered() {
                break Ok(());
            }

            self.set_state(ConnectionState::Connecting);
            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Ok(()),
                outcome = self.session(recorder) => outcome,
            };

            let err = match outcome {
                Err(LoggerError::Connection(err)) => err,
                Err(fatal) => break Err(fatal),
                Ok(never) => match never {},
            };

            self.set_state(ConnectionState::Backoff);
            let delay = self.backoff.next_delay();
            warn!(device = %self.device.id, error = %err, "Connection on {} failed", self.device.id);
            info!(
                device = %self.device.id,
                delay_secs = delay.as_secs_f64(),
                "-> Starting again in {:.1} seconds",
                delay.as_secs_f64()
            );

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        };

        let closed = recorder.close();
        self.set_state(ConnectionState::Disconnected);
        info!(device = %self.device.id, "Acquisition stopped");
        result.and(closed)
    }

    /// One connection: header, then data lines until the link fails.
    async fn session(&mut self, recorder: &mut RotatingRecorder) -> AppResult<Infallible> {
        info!(device = %self.device.id, address = %self.device.address(), "Connecting");
        let mut link = self.connector.connect(&self.device).await?;
        let header = link.read_line().await?;

        self.backoff.reset();
        self.set_state(ConnectionState::Connected);
        let path = recorder.start_segment(&header)?;
        info!(
            device = %self.device.id,
            path = %path.display(),
            "Logging {} in file {}",
            self.device.id,
            path.display()
        );

        loop {
            let line = link.read_line().await.map_err(|err| self.disconnected(err))?;
            recorder.record(&line)?;
        }
    }

    fn disconnected(&self, err: ConnectionError) -> LoggerError {
        debug!(device = %self.device.id, error = %err, "Link lost");
        LoggerError::Connection(err)
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(device = %self.device.id, from = %previous, to = %next, "State change");
        }
    }
}
