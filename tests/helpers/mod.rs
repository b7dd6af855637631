//! Shared test fixtures: instrumented mock codec, decompressor, and
//! visibility coordinator implementations.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;
use vecanim::events::DecodeJob;
use vecanim::player::{Player, RenderTarget};
use vecanim::worker::{AnimationCodec, CodecFactory, FrameSink};
use vecanim::{AnimationLoader, Decompress, LoaderConfig, RenderParams, VisibilityCoordinator};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .try_init();
}

/// What the mock codec does with each job
#[derive(Debug, Clone, Copy)]
pub enum CodecBehavior {
    /// Emit `loaded` followed by `frames` frame events
    EmitFrames { frames: u32 },
    /// Emit `loaded` only, never a frame
    LoadedOnly,
    /// Sleep first, then emit `loaded` + frames (for stale-event races)
    Delayed { delay_ms: u64, frames: u32 },
    /// Fail every decode
    FailDecode,
}

/// Instrumented codec factory: counts instance creations and records every
/// decoded request identifier.
pub struct MockCodecFactory {
    supported: bool,
    fail_create: AtomicBool,
    /// Sleep inside `create_codec` (simulates slow worker startup)
    create_delay_ms: u64,
    behavior: CodecBehavior,
    created: AtomicUsize,
    decodes: Arc<Mutex<Vec<Uuid>>>,
}

impl MockCodecFactory {
    pub fn new(behavior: CodecBehavior) -> Arc<Self> {
        Arc::new(Self {
            supported: true,
            fail_create: AtomicBool::new(false),
            create_delay_ms: 0,
            behavior,
            created: AtomicUsize::new(0),
            decodes: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn with_create_delay(behavior: CodecBehavior, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            supported: true,
            fail_create: AtomicBool::new(false),
            create_delay_ms: delay_ms,
            behavior,
            created: AtomicUsize::new(0),
            decodes: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn unsupported() -> Arc<Self> {
        Arc::new(Self {
            supported: false,
            fail_create: AtomicBool::new(false),
            create_delay_ms: 0,
            behavior: CodecBehavior::LoadedOnly,
            created: AtomicUsize::new(0),
            decodes: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn failing_startup() -> Arc<Self> {
        Arc::new(Self {
            supported: true,
            fail_create: AtomicBool::new(true),
            create_delay_ms: 0,
            behavior: CodecBehavior::LoadedOnly,
            created: AtomicUsize::new(0),
            decodes: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Flip codec-construction failure on or off for later startups
    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn decode_count(&self) -> usize {
        self.decodes.lock().unwrap().len()
    }

    pub fn decoded_req_ids(&self) -> Vec<Uuid> {
        self.decodes.lock().unwrap().clone()
    }
}

impl CodecFactory for MockCodecFactory {
    fn probe(&self) -> bool {
        self.supported
    }

    fn create_codec(&self) -> Result<Box<dyn AnimationCodec>, String> {
        if self.create_delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.create_delay_ms));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err("mock codec unavailable".to_string());
        }
        Ok(Box::new(MockCodec {
            behavior: self.behavior,
            decodes: Arc::clone(&self.decodes),
        }))
    }
}

struct MockCodec {
    behavior: CodecBehavior,
    decodes: Arc<Mutex<Vec<Uuid>>>,
}

impl AnimationCodec for MockCodec {
    fn decode(&mut self, job: &DecodeJob, sink: &mut dyn FrameSink) -> Result<(), String> {
        self.decodes.lock().unwrap().push(job.req_id);

        let emit = |sink: &mut dyn FrameSink, frames: u32| {
            sink.loaded(frames.max(1), 60.0);
            for frame_no in 0..frames {
                sink.frame(frame_no, vec![frame_no as u8; 4]);
            }
        };

        match self.behavior {
            CodecBehavior::EmitFrames { frames } => emit(sink, frames),
            CodecBehavior::LoadedOnly => sink.loaded(10, 60.0),
            CodecBehavior::Delayed { delay_ms, frames } => {
                std::thread::sleep(Duration::from_millis(delay_ms));
                emit(sink, frames);
            }
            CodecBehavior::FailDecode => return Err("mock decode failure".to_string()),
        }

        Ok(())
    }
}

/// Decompressor that reverses the fixture "compression" (per-byte +1) and
/// counts invocations.
pub struct MockDecompressor {
    calls: AtomicUsize,
}

impl MockDecompressor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fixture-side transform matching `decompress`
    pub fn compress(data: &[u8]) -> Vec<u8> {
        data.iter().map(|b| b.wrapping_add(1)).collect()
    }
}

impl Decompress for MockDecompressor {
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if bytes.is_empty() {
            return Err("empty compressed payload".to_string());
        }
        Ok(bytes.iter().map(|b| b.wrapping_sub(1)).collect())
    }
}

/// Recording visibility coordinator
#[derive(Default)]
pub struct MockVisibility {
    enrolled: Mutex<Vec<(Arc<Player>, String)>>,
    checks: Mutex<Vec<(Uuid, bool, bool)>>,
}

impl MockVisibility {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enrolled_count(&self) -> usize {
        self.enrolled.lock().unwrap().len()
    }

    /// (req_id, force_evict, is_error) tuples from `check_animation`
    pub fn checks(&self) -> Vec<(Uuid, bool, bool)> {
        self.checks.lock().unwrap().clone()
    }
}

impl VisibilityCoordinator for MockVisibility {
    fn add_animation(&self, player: &Arc<Player>, group: &str) {
        self.enrolled
            .lock()
            .unwrap()
            .push((Arc::clone(player), group.to_string()));
    }

    fn get_animations(&self, target: &RenderTarget) -> Vec<Arc<Player>> {
        self.enrolled
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p.renders_into(target))
            .map(|(p, _)| Arc::clone(p))
            .collect()
    }

    fn check_animation(&self, player: &Arc<Player>, force_evict: bool, is_error: bool) {
        self.checks
            .lock()
            .unwrap()
            .push((player.req_id(), force_evict, is_error));
    }
}

/// Loader wired to the given factory with fresh mock collaborators
pub struct TestHarness {
    pub loader: AnimationLoader,
    pub factory: Arc<MockCodecFactory>,
    pub decompressor: Arc<MockDecompressor>,
    pub visibility: Arc<MockVisibility>,
}

pub fn harness(factory: Arc<MockCodecFactory>) -> TestHarness {
    harness_with_config(factory, LoaderConfig::default())
}

pub fn harness_with_config(
    factory: Arc<MockCodecFactory>,
    config: LoaderConfig,
) -> TestHarness {
    init_tracing();
    let decompressor = MockDecompressor::new();
    let visibility = MockVisibility::new();
    let loader = AnimationLoader::new(
        config,
        factory.clone() as Arc<dyn CodecFactory>,
        decompressor.clone() as Arc<dyn Decompress>,
        visibility.clone() as Arc<dyn VisibilityCoordinator>,
    );
    TestHarness {
        loader,
        factory,
        decompressor,
        visibility,
    }
}

/// Render params with an explicit 64x64 size and one target
pub fn params_64(sync: bool) -> RenderParams {
    RenderParams {
        targets: vec![RenderTarget::new(Some(64), Some(64))],
        width: Some(64),
        height: Some(64),
        sync,
        ..Default::default()
    }
}

/// A normalized in-memory asset
pub fn asset(name: &str) -> vecanim::AnimationAsset {
    vecanim::AnimationAsset {
        name: name.to_string(),
        data: br#"{"v":"5.5.2","fr":60,"layers":[]}"#.to_vec(),
    }
}
