//! Worker → coordinator messages
//!
//! All communication from decode workers back to the coordinating context
//! flows through one tagged event enum consumed by a single router task.
//! Decode events are keyed by request identifier; startup events are keyed
//! by worker index. A worker emits its events in order over one channel, so
//! delivery order per request identifier matches emission order. No ordering
//! holds across workers.

use crate::fetch::AnimationAsset;
use uuid::Uuid;

/// One decode assignment, dispatched to a single worker
#[derive(Debug, Clone)]
pub struct DecodeJob {
    /// Correlation key for all events this job produces
    pub req_id: Uuid,

    /// Asset to decode
    pub asset: AnimationAsset,

    /// Render width in pixels
    pub width: u32,

    /// Render height in pixels
    pub height: u32,

    /// Optional recolor (hex string, e.g. "ffffff")
    pub color: Option<String>,

    /// Optional tone substitution index
    pub tone_index: Option<u8>,
}

/// Events emitted by decode workers, consumed by the frame router
///
/// Startup events are stamped with the pool generation that spawned the
/// worker, so signals from a worker set torn down mid-startup cannot be
/// miscounted toward a later startup attempt.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Worker finished startup and can accept jobs
    Ready { worker_id: usize, generation: u64 },

    /// Worker could not start (codec construction failed)
    StartupFailed {
        worker_id: usize,
        generation: u64,
        message: String,
    },

    /// Asset metadata decoded; frames will follow
    Loaded {
        req_id: Uuid,
        frame_count: u32,
        frame_rate: f64,
    },

    /// One decoded frame buffer
    Frame {
        req_id: Uuid,
        frame_no: u32,
        data: Vec<u8>,
    },

    /// Decode failed for this one request; other requests are unaffected
    DecodeFailed { req_id: Uuid, message: String },
}
