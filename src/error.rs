//! Error types for backend delegation

use std::time::Duration;

use thiserror::Error;

use crate::backend::BackendKind;

/// Failure talking to a single coordinator.
///
/// Never fatal: the negotiator logs it and treats the coordinator as unreachable.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Client is closed")]
    Closed,
}

/// A shuffle backend could not be constructed.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Error, Debug)]
pub enum DelegationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid propagated decision: {0}")]
    InvalidDecision(String),

    #[error("Local shuffle backend unavailable: {0}")]
    LocalBackendUnavailable(#[source] BackendError),

    #[error("Worker cannot construct the {kind} backend chosen by the driver: {source}")]
    WorkerBackendMismatch {
        kind: BackendKind,
        #[source]
        source: BackendError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for DelegationError {
    fn from(err: toml::de::Error) -> Self {
        DelegationError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for DelegationError {
    fn from(err: toml::ser::Error) -> Self {
        DelegationError::Toml(err.to_string())
    }
}

impl DelegationError {
    /// Whether this error prevents the job from starting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DelegationError::LocalBackendUnavailable(_)
                | DelegationError::WorkerBackendMismatch { .. }
                | DelegationError::InvalidDecision(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DelegationError>;
