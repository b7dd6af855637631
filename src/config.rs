//! Loader configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Animation loader configuration
///
/// Constructed by the embedding application; all fields have working
/// defaults matching the reference client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Number of parallel decode workers (fixed for the pool's lifetime)
    pub workers_limit: usize,

    /// Base path for named built-in assets (`{base}/{name}.json`)
    pub assets_base_path: String,

    /// Upper bound on waiting for a player's first rendered frame
    pub first_frame_timeout_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            workers_limit: 4,
            assets_base_path: "assets/animations".to_string(),
            first_frame_timeout_ms: 2500,
        }
    }
}

impl LoaderConfig {
    /// First-frame wait bound as a `Duration`
    pub fn first_frame_timeout(&self) -> Duration {
        Duration::from_millis(self.first_frame_timeout_ms)
    }
}
