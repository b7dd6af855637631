//! Error types for vecanim
//!
//! Defines the loader-subsystem error type using thiserror for clear error
//! propagation. Pool-level errors (capability, worker startup) are terminal
//! for the pool until an explicit reset; all other kinds are local to one
//! load call or one player.

use thiserror::Error;

/// Main error type for the animation loader subsystem
#[derive(Error, Debug)]
pub enum Error {
    /// Environment cannot run the decode codec; no worker startup is attempted
    #[error("Decode codec unsupported in this environment")]
    CapabilityUnsupported,

    /// One or more decode workers failed to signal readiness
    #[error("Worker startup failed: {0}")]
    WorkerStartup(String),

    /// Asset retrieval errors (network, HTTP status)
    #[error("Asset fetch failed: {0}")]
    Fetch(String),

    /// Compressed asset could not be expanded
    #[error("Asset decompression failed: {0}")]
    Decompression(String),

    /// No explicit render size and none inferable from the target
    #[error("No render size for animation: {0}")]
    Sizing(String),

    /// Caller-supplied predicate rejected the load before dispatch
    #[error("Load cancelled: {0}")]
    Cancelled(String),

    /// Worker-reported decode failure, surfaced on the player after the
    /// fact (the player was already handed to the caller at dispatch time)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Operation attempted in a state that does not permit it
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Convenience Result type using the vecanim Error
pub type Result<T> = std::result::Result<T, Error>;
