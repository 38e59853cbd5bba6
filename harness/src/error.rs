//! Harness error types
//!
//! Every variant belongs to one lifecycle [`Phase`] so a failing test can say
//! whether spawning, readiness, connecting, calling or teardown went wrong.

use shared::{SharedError, StatusCode};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("setup failed during spawn of {binary}: {reason}")]
    SpawnFailed { binary: String, reason: String },

    #[error("setup failed during readiness: node (pid {pid:?}) not serving on {addr} after {waited:?}: {reason}")]
    NotReady {
        addr: SocketAddr,
        pid: Option<u32>,
        waited: Duration,
        reason: String,
    },

    #[error("setup failed during connect to {addr}: {reason}")]
    ConnectFailed { addr: SocketAddr, reason: String },

    #[error("transport error: {message}")]
    TransportError { message: String },

    #[error("remote error from {service}/{method}: {code}: {message}")]
    RemoteError {
        service: String,
        method: String,
        code: StatusCode,
        message: String,
    },

    #[error("query connection is closed")]
    Closed,

    #[error("teardown failed to stop pid {pid}: {reason}")]
    StopFailed { pid: u32, reason: String },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("invalid fixture state: {message}")]
    InvalidState { message: String },

    #[error("codec error: {0}")]
    Codec(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Lifecycle phase an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Spawn,
    Readiness,
    Connect,
    Call,
    Teardown,
    Harness,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Spawn => "spawn",
            Phase::Readiness => "readiness",
            Phase::Connect => "connect",
            Phase::Call => "call",
            Phase::Teardown => "teardown",
            Phase::Harness => "harness",
        };
        f.write_str(name)
    }
}

impl Phase {
    /// Setup phases abort the test after cleanup
    pub fn is_setup(&self) -> bool {
        matches!(self, Phase::Spawn | Phase::Readiness | Phase::Connect)
    }
}

impl HarnessError {
    pub fn phase(&self) -> Phase {
        match self {
            HarnessError::SpawnFailed { .. } => Phase::Spawn,
            HarnessError::NotReady { .. } => Phase::Readiness,
            HarnessError::ConnectFailed { .. } => Phase::Connect,
            HarnessError::TransportError { .. }
            | HarnessError::RemoteError { .. }
            | HarnessError::Closed
            | HarnessError::Codec(_) => Phase::Call,
            HarnessError::StopFailed { .. } => Phase::Teardown,
            HarnessError::ConfigurationError { .. } | HarnessError::InvalidState { .. } | HarnessError::IoError(_) => {
                Phase::Harness
            }
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        HarnessError::TransportError {
            message: message.into(),
        }
    }

    pub fn spawn_failed(binary: impl fmt::Display, reason: impl Into<String>) -> Self {
        HarnessError::SpawnFailed {
            binary: binary.to_string(),
            reason: reason.into(),
        }
    }

    pub fn config(field: impl Into<String>) -> Self {
        HarnessError::ConfigurationError { field: field.into() }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        HarnessError::InvalidState {
            message: message.into(),
        }
    }

    /// Status code of a remote failure
    pub fn remote_code(&self) -> Option<StatusCode> {
        match self {
            HarnessError::RemoteError { code, .. } => Some(*code),
            _ => None,
        }
    }
}
