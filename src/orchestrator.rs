//! One acquisition task per device.
//!
//! The orchestrator turns [`Settings`] into independent device tasks, each
//! owning a [`Reconnector`] and a [`RotatingRecorder`]. Tasks share only the
//! read-only settings and the connector, so a failing device (or a panicking
//! task) never holds up the others.
//!
//! # Example
//! ```no_run
//! use awc_logger::{config::Settings, link::TelnetConnector, orchestrator::Orchestrator, shutdown};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! let connector = TelnetConnector::from_config(&settings.link);
//! let (trigger, signal) = shutdown::channel();
//! let fleet = Orchestrator::new(settings, connector).spawn(&signal);
//! trigger.trigger();
//! for (device, exit) in fleet.join().await {
//!     println!("{device}: {exit:?}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::Settings;
use crate::device::{ConnectionState, Device, DeviceId};
use crate::error::LoggerError;
use crate::link::Connector;
use crate::reconnect::Reconnector;
use crate::recorder::{Clock, RotatingRecorder, SystemClock};
use crate::shutdown::Shutdown;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

/// How a device task ended.
#[derive(Debug)]
pub enum TaskExit {
    /// Stopped on shutdown.
    Stopped,
    /// Ended by a non-recoverable error (segment I/O).
    Failed(LoggerError),
    /// The task panicked or was aborted.
    Panicked(String),
}

/// Spawns and supervises the device tasks.
pub struct Orchestrator<C: Connector> {
    settings: Arc<Settings>,
    connector: Arc<C>,
    clock: Arc<dyn Clock>,
}

impl<C: Connector> Orchestrator<C> {
    /// Orchestrator using the system clock.
    pub fn new(settings: Settings, connector: C) -> Self {
        Self {
            settings: Arc::new(settings),
            connector: Arc::new(connector),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for rotation decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configured devices.
    pub fn devices(&self) -> Vec<Device> {
        self.settings.devices()
    }

    /// Start one task per configured device.
    pub fn spawn(&self, shutdown: &Shutdown) -> Fleet {
        let tasks = self
            .settings
            .devices()
            .into_iter()
            .map(|device| self.spawn_device(device, shutdown.clone()))
            .collect();
        Fleet { tasks }
    }

    /// Run all devices until `shutdown` fires and every task has ended.
    pub async fn run(&self, shutdown: Shutdown) -> Vec<(DeviceId, TaskExit)> {
        self.spawn(&shutdown).join().await
    }

    fn spawn_device(&self, device: Device, shutdown: Shutdown) -> DeviceTask {
        let id = device.id.clone();
        let mut recorder = RotatingRecorder::from_settings(id.clone(), &self.settings, self.clock.clone());
        let mut reconnector = Reconnector::new(device, self.connector.clone(), self.settings.backoff);
        let state = reconnector.subscribe();

        info!(device = %id, "Starting acquisition task");
        let span = info_span!("device", id = %id);
        let handle = tokio::spawn(
            async move { reconnector.run(&mut recorder, shutdown).await }.instrument(span),
        );

        DeviceTask { id, state, handle }
    }
}

struct DeviceTask {
    id: DeviceId,
    state: watch::Receiver<ConnectionState>,
    handle: JoinHandle<Result<(), LoggerError>>,
}

/// Handles of the running device tasks.
pub struct Fleet {
    tasks: Vec<DeviceTask>,
}

impl Fleet {
    /// Devices with a running (or finished) task.
    pub fn devices(&self) -> Vec<DeviceId> {
        self.tasks.iter().map(|t| t.id.clone()).collect()
    }

    /// Latest connection state of a device.
    pub fn state(&self, device: &DeviceId) -> Option<ConnectionState> {
        self.tasks
            .iter()
            .find(|t| &t.id == device)
            .map(|t| *t.state.borrow())
    }

    /// Follow the connection state of a device.
    pub fn watch_state(&self, device: &DeviceId) -> Option<watch::Receiver<ConnectionState>> {
        self.tasks.iter().find(|t| &t.id == device).map(|t| t.state.clone())
    }

    /// Abort one device's task, leaving the others running.
    pub fn abort(&self, device: &DeviceId) {
        if let Some(task) = self.tasks.iter().find(|t| &t.id == device) {
            task.handle.abort();
        }
    }

    /// Wait for every task to end and report how each one did.
    pub async fn join(self) -> Vec<(DeviceId, TaskExit)> {
        let (ids, handles): (Vec<_>, Vec<_>) = self
            .tasks
            .into_iter()
            .map(|task| (task.id, task.handle))
            .unzip();

        let results = join_all(handles).await;
        ids.into_iter()
            .zip(results)
            .map(|(id, result)| {
                let exit = match result {
                    Ok(Ok(())) => TaskExit::Stopped,
                    Ok(Err(err)) => {
                        error!(device = %id, error = %err, "Acquisition task failed");
                        TaskExit::Failed(err)
                    }
                    Err(join_err) => {
                        error!(device = %id, error = %join_err, "Acquisition task crashed");
                        TaskExit::Panicked(join_err.to_string())
                    }
                };
                (id, exit)
            })
            .collect()
    }
}
