//! Visibility coordinator boundary
//!
//! Consumed collaborator: decides which players actually render based on
//! viewport visibility. The loader enrolls every new player here, and the
//! frame router delegates error-driven eviction to it.

use crate::player::{Player, RenderTarget};
use std::sync::Arc;

/// External coordinator of render/pause state by viewport visibility
pub trait VisibilityCoordinator: Send + Sync {
    /// Enroll a newly created player under `group`
    fn add_animation(&self, player: &Arc<Player>, group: &str);

    /// Players currently enrolled for `target`
    fn get_animations(&self, target: &RenderTarget) -> Vec<Arc<Player>>;

    /// Re-evaluate one player; `force_evict` + `is_error` requests removal
    /// of a broken animation instance
    fn check_animation(&self, player: &Arc<Player>, force_evict: bool, is_error: bool);
}
