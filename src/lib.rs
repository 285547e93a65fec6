//! # AWC Logger Core Library
//!
//! Continuous acquisition of line-oriented measurement streams from
//! AWC remote-controllable power devices. Each device is reached over a plain
//! telnet session; its first line is a column header and every following line is a
//! data row. Rows are written to time-rotated segment files, each starting
//! with the header of the connection that produced it.
//!
//! ## Crate Structure
//!
//! - **`config`**: Layered settings (TOML file plus `AWC_LOGGER_*` environment
//!   overrides) and their validation. See `config::Settings`.
//! - **`device`**: Device identity, address and connection state.
//! - **`link`**: The `DeviceLink`/`Connector` seam, the telnet implementation
//!   and a scripted one for tests.
//! - **`backoff`**: Reconnect delay sequence.
//! - **`reconnect`**: Per-device connect/read/backoff loop.
//! - **`recorder`**: Rotation policy, segment naming and the rotating writer.
//! - **`orchestrator`**: One task per device, joined on shutdown.
//! - **`shutdown`**: Cooperative stop signal.
//! - **`logging`**: `tracing` subscriber setup.
//! - **`error`**: `LoggerError` and `ConnectionError`.

pub mod backoff;
pub mod config;
pub mod device;
pub mod error;
pub mod link;
pub mod logging;
pub mod orchestrator;
pub mod reconnect;
pub mod recorder;
pub mod shutdown;

pub use config::Settings;
pub use device::{ConnectionState, Device, DeviceId};
pub use error::{AppResult, ConnectionError, LoggerError};
pub use orchestrator::{Fleet, Orchestrator, TaskExit};
pub use recorder::RotatingRecorder;
