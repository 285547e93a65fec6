//! Custom error types for the application.
//!
//! Two enums cover everything that can go wrong while acquiring telemetry:
//!
//! - **`ConnectionError`**: transient link failures (refusal, timeout, reset,
//!   end-of-stream). These never leave a device task; the reconnector absorbs
//!   them and schedules another attempt.
//! - **`LoggerError`**: the crate-level error. Configuration problems surface
//!   here at startup, and segment write failures surface here at runtime, where
//!   they end the affected device task only.
//!
//! `LoggerError` converts from the underlying error types with `#[from]`, so
//! the `?` operator works throughout the crate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, LoggerError>;

/// A failure on the link to a device. Always recoverable by reconnecting.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("connection refused")]
    Refused,

    #[error("timed out while {0}")]
    TimedOut(&'static str),

    #[error("connection reset by peer")]
    Reset,

    #[error("end of stream")]
    Eof,

    #[error("link I/O error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ConnectionError::Refused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ConnectionError::Reset,
            io::ErrorKind::UnexpectedEof => ConnectionError::Eof,
            io::ErrorKind::TimedOut => ConnectionError::TimedOut("waiting on the socket"),
            _ => ConnectionError::Io(err),
        }
    }
}

/// Errors raised by configuration loading and by the recording pipeline.
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Segment I/O error on '{}': {source}", path.display())]
    Segment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("No open segment for device '{0}'")]
    NoOpenSegment(String),

    #[error("Failed to initialize tracing: {0}")]
    Tracing(String),
}

impl From<figment::Error> for LoggerError {
    fn from(err: figment::Error) -> Self {
        LoggerError::Config(Box::new(err))
    }
}

impl LoggerError {
    /// Whether the reconnector should retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, LoggerError::Connection(_))
    }
}
