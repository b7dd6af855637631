//! # vecanim
//!
//! Worker-pool loader, cache, and frame router for vector animation assets.
//!
//! **Purpose:** fetch and decompress animation assets, decode them across a
//! fixed set of parallel workers, de-duplicate decode work through
//! reference-counted player caching, and route worker frame events to live
//! players with lifecycle-safe drops for destroyed ones.
//!
//! **Architecture:** one coordinating context (registry, pool state,
//! round-robin cursor behind mutexes, never held across awaits) plus N
//! decode worker threads that communicate exclusively by tagged messages
//! consumed by a single router task.
//!
//! The codec itself is opaque: the embedding application supplies a
//! [`worker::CodecFactory`], a [`fetch::Decompress`] capability, and a
//! [`visibility::VisibilityCoordinator`]; this crate orchestrates around
//! them.

pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod loader;
pub mod player;
pub mod pool;
pub mod registry;
mod router;
pub mod visibility;
pub mod worker;

pub use config::LoaderConfig;
pub use error::{Error, Result};
pub use events::DecodeJob;
pub use fetch::{AnimationAsset, Decompress};
pub use loader::AnimationLoader;
pub use player::{CacheKey, Player, RenderParams, RenderTarget, RenderedFrame};
pub use visibility::VisibilityCoordinator;
pub use worker::{AnimationCodec, CodecFactory, FrameSink};
