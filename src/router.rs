//! Frame router
//!
//! Single consumer of the worker event stream. Startup signals feed the
//! pool's readiness accounting; decode events are routed to the live player
//! for their request identifier. Events whose player has already been torn
//! down are dropped; that drop is the designed defense against workers
//! finishing work for a player destroyed mid-flight, and doubles as the
//! post-dispatch cancellation mechanism.

use crate::events::WorkerEvent;
use crate::pool::DecodeWorkerPool;
use crate::registry::PlayerRegistry;
use crate::visibility::VisibilityCoordinator;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

pub(crate) struct FrameRouter {
    pool: Arc<DecodeWorkerPool>,
    registry: Arc<PlayerRegistry>,
    visibility: Arc<dyn VisibilityCoordinator>,
}

impl FrameRouter {
    pub fn new(
        pool: Arc<DecodeWorkerPool>,
        registry: Arc<PlayerRegistry>,
        visibility: Arc<dyn VisibilityCoordinator>,
    ) -> Self {
        Self {
            pool,
            registry,
            visibility,
        }
    }

    /// Consume worker events until every sender is gone
    pub async fn run(self, mut event_rx: mpsc::UnboundedReceiver<WorkerEvent>) {
        while let Some(event) = event_rx.recv().await {
            self.handle(event);
        }
        debug!("Frame router stopped (all worker senders dropped)");
    }

    fn handle(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::Ready {
                worker_id,
                generation,
            } => {
                self.pool.note_worker_ready(worker_id, generation);
            }

            WorkerEvent::StartupFailed {
                worker_id,
                generation,
                message,
            } => {
                self.pool.note_startup_failed(worker_id, generation, message);
            }

            WorkerEvent::Loaded {
                req_id,
                frame_count,
                frame_rate,
            } => {
                let Some(player) = self.registry.get(req_id) else {
                    warn!("Loaded event for destroyed player dropped (req_id={})", req_id);
                    return;
                };
                debug!(
                    "Player {} loaded: {} frames @ {} fps",
                    req_id, frame_count, frame_rate
                );
                player.on_load(frame_count, frame_rate);
            }

            WorkerEvent::Frame {
                req_id,
                frame_no,
                data,
            } => {
                let Some(player) = self.registry.get(req_id) else {
                    warn!(
                        "Frame {} for destroyed player dropped (req_id={})",
                        frame_no, req_id
                    );
                    return;
                };
                player.render_frame(frame_no, data);
            }

            WorkerEvent::DecodeFailed { req_id, message } => {
                // Fatal for this one player only; eviction is delegated to
                // the visibility coordinator rather than surfaced as a load
                // failure (the player was already returned to the caller).
                let Some(player) = self.registry.get(req_id) else {
                    debug!(
                        "Decode failure for destroyed player dropped (req_id={})",
                        req_id
                    );
                    return;
                };
                error!("Decode failed for player {}: {}", req_id, message);
                player.on_decode_error(message);

                if let Some(target) = player.targets().first() {
                    for animation in self.visibility.get_animations(target) {
                        self.visibility.check_animation(&animation, true, true);
                    }
                }
            }
        }
    }
}
