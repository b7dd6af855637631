//! Load orchestrator
//!
//! Public entry point of the subsystem. Resolves "load by asset name" and
//! "load by URL" into a fully initialized [`Player`]: capability gate,
//! memoized pool startup, sync-cache short-circuit, fetch + sizing, the
//! pre-dispatch cancellation check, round-robin worker assignment, and
//! registration/enrollment. The player is returned before decode completes.

use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use crate::events::DecodeJob;
use crate::fetch::{AnimationAsset, AssetFetcher, Decompress};
use crate::player::{CacheKey, Player, RenderParams, RenderTarget};
use crate::pool::DecodeWorkerPool;
use crate::registry::PlayerRegistry;
use crate::router::FrameRouter;
use crate::visibility::VisibilityCoordinator;
use crate::worker::CodecFactory;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where the animation bytes come from
enum AssetSource {
    Url(String),
    Data(AnimationAsset),
}

/// Animation loader: worker pool, player cache, and frame routing in one place
///
/// Construction spawns the frame-router task, so a Tokio runtime must be
/// current. The capability probe runs exactly once, here; when it fails the
/// pool is never started and every load fails fast.
pub struct AnimationLoader {
    config: LoaderConfig,
    codec_supported: bool,
    pool: Arc<DecodeWorkerPool>,
    registry: Arc<PlayerRegistry>,
    fetcher: AssetFetcher,
    visibility: Arc<dyn VisibilityCoordinator>,
}

impl AnimationLoader {
    pub fn new(
        config: LoaderConfig,
        codec_factory: Arc<dyn CodecFactory>,
        decompressor: Arc<dyn Decompress>,
        visibility: Arc<dyn VisibilityCoordinator>,
    ) -> Self {
        let codec_supported = codec_factory.probe();
        if !codec_supported {
            warn!("Animation codec unsupported in this environment; loads will fail fast");
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let pool = Arc::new(DecodeWorkerPool::new(
            config.workers_limit,
            codec_factory,
            event_tx,
        ));
        let registry = Arc::new(PlayerRegistry::new());

        let router = FrameRouter::new(
            Arc::clone(&pool),
            Arc::clone(&registry),
            Arc::clone(&visibility),
        );
        tokio::spawn(router.run(event_rx));

        Self {
            config,
            codec_supported,
            pool,
            registry,
            fetcher: AssetFetcher::new(decompressor),
            visibility,
        }
    }

    /// Load a named built-in asset from the configured assets path
    pub async fn load_by_asset_name(
        &self,
        mut params: RenderParams,
        name: &str,
    ) -> Result<Arc<Player>> {
        let url = format!("{}/{}.json", self.config.assets_base_path, name);
        params.name = Some(name.to_string());
        self.load_animation(params, AssetSource::Url(url)).await
    }

    /// Load an arbitrary URL; the player name defaults to the URL
    pub async fn load_by_url(&self, mut params: RenderParams, url: &str) -> Result<Arc<Player>> {
        if params.name.is_none() {
            params.name = Some(url.to_string());
        }
        self.load_animation(params, AssetSource::Url(url.to_string()))
            .await
    }

    /// Load pre-fetched animation bytes, skipping retrieval
    pub async fn load_animation_data(
        &self,
        mut params: RenderParams,
        asset: AnimationAsset,
    ) -> Result<Arc<Player>> {
        if params.name.is_none() {
            params.name = Some(asset.name.clone());
        }
        self.load_animation(params, AssetSource::Data(asset)).await
    }

    async fn load_animation(
        &self,
        params: RenderParams,
        source: AssetSource,
    ) -> Result<Arc<Player>> {
        if !self.codec_supported {
            return Err(Error::CapabilityUnsupported);
        }

        self.pool.ensure_ready().await?;

        let name = match &params.name {
            Some(name) => name.clone(),
            None => {
                return Err(Error::InvalidState(
                    "load request carries no asset name".to_string(),
                ))
            }
        };

        let (width, height) = Self::resolve_size(&params, &name)?;
        let cache_key = CacheKey::derive(
            &name,
            width,
            height,
            params.color.as_deref(),
            params.tone_index,
        );

        // Sync-cache short circuit: no second fetch, no second decode.
        // Caller-opt-in only; non-sync loads never consult the share cache.
        if params.sync {
            if let Some(shared) = self.registry.shared_player(&cache_key) {
                debug!("Sharing cached player for {}", cache_key);
                return Ok(shared);
            }
        }

        let asset = match source {
            AssetSource::Data(asset) => asset,
            AssetSource::Url(url) => self.fetcher.fetch(&url, &name).await?,
        };

        // Staleness check just before worker assignment; after dispatch the
        // only cancellation is dropping events for a destroyed player.
        if let Some(guard) = &params.middleware {
            if !guard() {
                return Err(Error::Cancelled(name));
            }
        }

        // Re-checks the share cache under the registry lock; the worker slot
        // is claimed inside the same critical section, only once the check
        // misses, so a load resolving to an existing player never advances
        // the round-robin cursor.
        let req_id = Uuid::new_v4();
        let mut assigned_slot = None;
        let (registered, created) =
            self.registry
                .insert_or_share_with(params.sync, Some(&cache_key), || {
                    let assigned = self.pool.assign_worker()?;
                    let player = Player::new(
                        req_id,
                        assigned.worker_id,
                        name.clone(),
                        Some(cache_key.clone()),
                        width,
                        height,
                        &params,
                    );
                    assigned_slot = Some(assigned);
                    Ok::<_, Error>(player)
                })?;
        if !created {
            debug!("Lost share race for {}; reusing existing player", name);
            return Ok(registered);
        }
        let assigned = assigned_slot.ok_or_else(|| {
            Error::InvalidState("no worker slot recorded for new player".to_string())
        })?;

        self.visibility.add_animation(&registered, registered.group());

        let job = DecodeJob {
            req_id,
            asset,
            width,
            height,
            color: params.color.clone(),
            tone_index: params.tone_index,
        };
        if let Err(e) = assigned.submit(job) {
            self.registry.deregister(req_id);
            return Err(e);
        }

        debug!(
            "Dispatched {} to worker {} (req_id={})",
            name, registered.worker_id(), req_id
        );
        Ok(registered)
    }

    /// Explicit size, else the first target's styled size
    fn resolve_size(params: &RenderParams, name: &str) -> Result<(u32, u32)> {
        let styled = params.targets.first();
        let width = params
            .width
            .filter(|w| *w > 0)
            .or_else(|| styled.and_then(|t| t.styled_width));
        let height = params
            .height
            .filter(|h| *h > 0)
            .or_else(|| styled.and_then(|t| t.styled_height));

        match (width, height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
            _ => Err(Error::Sizing(name.to_string())),
        }
    }

    /// Resolve on the player's first rendered frame, or after the configured
    /// timeout, whichever comes first
    ///
    /// The timeout is a UX guarantee, not a failure: decode continues
    /// regardless, so this always hands the player back.
    pub async fn wait_for_first_frame(&self, player: &Arc<Player>) -> Arc<Player> {
        let mut rx = player.subscribe_first_frame();
        let _ = tokio::time::timeout(
            self.config.first_frame_timeout(),
            rx.wait_for(|seen| *seen),
        )
        .await;
        Arc::clone(player)
    }

    /// Apply a loop flag to all live players, restoring each one's autoplay
    pub fn set_global_loop(&self, enabled: bool) {
        for player in self.registry.players() {
            player.set_loop(enabled);
            player.reset_autoplay();
        }
    }

    /// First live player rendering into `target`, if any
    pub fn animation_for_target(&self, target: &RenderTarget) -> Option<Arc<Player>> {
        self.registry.animation_for_target(target)
    }

    /// Owner-driven teardown: release the request identifier from both
    /// registry maps; later worker events for it become no-ops
    pub fn destroy_player(&self, player: &Arc<Player>) {
        if self.registry.deregister(player.req_id()).is_some() {
            debug!("Destroyed player {} ({})", player.req_id(), player.name());
        }
    }

    /// Terminate all workers and reset the pool so a later load re-initializes
    pub fn shutdown_workers(&self) {
        self.pool.shutdown();
        info!("Decode workers shut down");
    }

    /// Number of live players (diagnostics)
    pub fn player_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether the pool has completed startup (diagnostics)
    pub fn is_pool_ready(&self) -> bool {
        self.pool.is_ready()
    }

    /// Number of live decode workers (diagnostics)
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }
}
