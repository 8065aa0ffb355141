//! Dispatcher errors.
//!
//! Registration failures are expected, checked results for the caller.
//! Everything else that can go wrong during message flow is an internal
//! fault surfaced through logging and metrics, not through these types.

use thiserror::Error;

use types::{MessageKind, ServiceId};

/// Admission failures from `register`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("service id {id} out of range (valid: 1..={max})")]
    IdOutOfRange { id: ServiceId, max: ServiceId },

    #[error("service id {id} already registered")]
    DuplicateId { id: ServiceId },

    #[error("dispatcher already started; registration is closed")]
    AlreadyStarted,
}

/// Failures from the dispatcher façade's lifecycle and configuration
/// surface.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher is already running")]
    AlreadyRunning,

    #[error("dispatcher was stopped and cannot be restarted")]
    Stopped,

    #[error("worker thread count must be nonzero")]
    NoWorkers,

    #[error("duplicate schema for message kind {kind}")]
    DuplicateSchema { kind: MessageKind },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("network engine: {0}")]
    Network(#[from] network::NetworkError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}
