//! Engine-surface errors.
//!
//! Only startup can fail toward the caller; everything after that (link
//! drops, bad frames, auth rejects) is handled inside the engine's tasks
//! and surfaced through logging and [`crate::metrics::EngineMetrics`].

use thiserror::Error;

/// Errors returned from the engine's synchronous surface.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("engine already started")]
    AlreadyStarted,

    #[error("failed to build engine runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
