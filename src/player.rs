//! Player handles and render parameters
//!
//! A [`Player`] is a live binding between one decoded animation asset and
//! one or more render targets. Players are created by the loader, shared as
//! `Arc` handles, and torn down explicitly by their owner through
//! [`crate::loader::AnimationLoader::destroy_player`].

use crate::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use uuid::Uuid;

/// Cancellation predicate: returns `false` once the load is stale
pub type LoadGuard = Arc<dyn Fn() -> bool + Send + Sync>;

/// Headless stand-in for a visual container: identity plus styled size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub id: Uuid,
    pub styled_width: Option<u32>,
    pub styled_height: Option<u32>,
}

impl RenderTarget {
    pub fn new(styled_width: Option<u32>, styled_height: Option<u32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            styled_width,
            styled_height,
        }
    }
}

/// Caller-facing load configuration
#[derive(Default)]
pub struct RenderParams {
    /// Visual containers this player renders into (at least one)
    pub targets: Vec<RenderTarget>,

    /// Explicit render width; inferred from the first target when `None`
    pub width: Option<u32>,

    /// Explicit render height; inferred from the first target when `None`
    pub height: Option<u32>,

    /// Loop playback
    pub loop_animation: bool,

    /// Start playing as soon as frames arrive
    pub autoplay: bool,

    /// Optional recolor (hex string)
    pub color: Option<String>,

    /// Optional tone substitution index
    pub tone_index: Option<u8>,

    /// Visibility-coordination group name
    pub group: String,

    /// Opt in to synchronous cache sharing (see [`CacheKey`])
    pub sync: bool,

    /// Explicit player name; defaults to the asset name or source URL
    pub name: Option<String>,

    /// Evaluated just before worker assignment; `false` aborts the load
    pub middleware: Option<LoadGuard>,
}

impl fmt::Debug for RenderParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderParams")
            .field("targets", &self.targets.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("loop_animation", &self.loop_animation)
            .field("autoplay", &self.autoplay)
            .field("color", &self.color)
            .field("tone_index", &self.tone_index)
            .field("group", &self.group)
            .field("sync", &self.sync)
            .field("name", &self.name)
            .field("middleware", &self.middleware.is_some())
            .finish()
    }
}

/// Derived identity for shareable decode results
///
/// Two loads with an identical cache key (and sync sharing enabled) resolve
/// to the same player instead of spawning a second decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive deterministically from name and render parameters
    pub fn derive(
        name: &str,
        width: u32,
        height: u32,
        color: Option<&str>,
        tone_index: Option<u8>,
    ) -> Self {
        let color = color.unwrap_or("");
        let tone = tone_index.map(|t| t.to_string()).unwrap_or_default();
        Self(format!("{}-{}-{}-{}-{}", name, width, height, color, tone))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Latest decoded frame delivered to a player
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub frame_no: u32,
    pub data: Vec<u8>,
}

/// Playback metadata and frame state, updated by the router
#[derive(Debug, Default)]
struct PlaybackInfo {
    frame_count: u32,
    frame_rate: f64,
    current_frame: Option<RenderedFrame>,
    /// Worker-reported decode failure, if any
    error: Option<String>,
}

/// One rendering target bound to one decoded asset instance
pub struct Player {
    req_id: Uuid,
    name: String,
    cache_key: Option<CacheKey>,
    group: String,
    worker_id: usize,
    width: u32,
    height: u32,
    targets: Vec<RenderTarget>,

    /// Autoplay as originally requested; restored by `set_global_loop`
    autoplay_default: bool,
    autoplay: AtomicBool,
    loop_enabled: AtomicBool,

    playback: Mutex<PlaybackInfo>,

    /// Flips to `true` once, on the first rendered frame
    first_frame_tx: watch::Sender<bool>,
}

impl Player {
    pub(crate) fn new(
        req_id: Uuid,
        worker_id: usize,
        name: String,
        cache_key: Option<CacheKey>,
        width: u32,
        height: u32,
        params: &RenderParams,
    ) -> Arc<Self> {
        let (first_frame_tx, _) = watch::channel(false);
        Arc::new(Self {
            req_id,
            name,
            cache_key,
            group: params.group.clone(),
            worker_id,
            width,
            height,
            targets: params.targets.clone(),
            autoplay_default: params.autoplay,
            autoplay: AtomicBool::new(params.autoplay),
            loop_enabled: AtomicBool::new(params.loop_animation),
            playback: Mutex::new(PlaybackInfo::default()),
            first_frame_tx,
        })
    }

    pub fn req_id(&self) -> Uuid {
        self.req_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache_key(&self) -> Option<&CacheKey> {
        self.cache_key.as_ref()
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Index of the decode worker this player's job was assigned to
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn targets(&self) -> &[RenderTarget] {
        &self.targets
    }

    pub fn renders_into(&self, target: &RenderTarget) -> bool {
        self.targets.iter().any(|t| t.id == target.id)
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled.load(Ordering::Relaxed)
    }

    pub fn set_loop(&self, enabled: bool) {
        self.loop_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn autoplay(&self) -> bool {
        self.autoplay.load(Ordering::Relaxed)
    }

    pub fn set_autoplay(&self, enabled: bool) {
        self.autoplay.store(enabled, Ordering::Relaxed);
    }

    /// Re-apply the autoplay flag the player was created with
    pub fn reset_autoplay(&self) {
        self.autoplay
            .store(self.autoplay_default, Ordering::Relaxed);
    }

    /// Frame count and frame rate reported by the worker's `loaded` event
    pub fn playback_info(&self) -> (u32, f64) {
        let info = self.playback.lock().unwrap();
        (info.frame_count, info.frame_rate)
    }

    /// Most recently rendered frame, if any has arrived yet
    pub fn current_frame(&self) -> Option<RenderedFrame> {
        self.playback.lock().unwrap().current_frame.clone()
    }

    /// Load-completion hook (router-only): worker finished parsing the asset
    pub(crate) fn on_load(&self, frame_count: u32, frame_rate: f64) {
        let mut info = self.playback.lock().unwrap();
        info.frame_count = frame_count;
        info.frame_rate = frame_rate;
    }

    /// Failure hook (router-only): the worker could not decode this asset
    pub(crate) fn on_decode_error(&self, message: String) {
        self.playback.lock().unwrap().error = Some(message);
    }

    /// Decode failure reported for this player, if any
    ///
    /// Decode runs after the player is returned, so failures surface here
    /// rather than as a load error.
    pub fn decode_error(&self) -> Option<Error> {
        self.playback
            .lock()
            .unwrap()
            .error
            .as_ref()
            .map(|message| Error::Decode(message.clone()))
    }

    /// Render hook (router-only): store the frame and wake first-frame waiters
    pub(crate) fn render_frame(&self, frame_no: u32, data: Vec<u8>) {
        {
            let mut info = self.playback.lock().unwrap();
            info.current_frame = Some(RenderedFrame { frame_no, data });
        }
        self.first_frame_tx.send_replace(true);
    }

    /// Subscribe to the one-shot first-frame signal
    pub fn subscribe_first_frame(&self) -> watch::Receiver<bool> {
        self.first_frame_tx.subscribe()
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("req_id", &self.req_id)
            .field("name", &self.name)
            .field("cache_key", &self.cache_key)
            .field("worker_id", &self.worker_id)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
