//! Player registry
//!
//! Maps request identifiers to live players, and cache keys to the set of
//! players backed by the same decoded asset. A player appears in at most one
//! cache-key sharer set, and only while registered by request identifier.
//! Deregistration drops empty sharer sets so no empty entries persist.

use crate::player::{CacheKey, Player, RenderTarget};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
struct RegistryInner {
    /// Request identifier → live player
    players: HashMap<Uuid, Arc<Player>>,

    /// Cache key → request identifiers of players sharing that decode
    by_cache_key: HashMap<CacheKey, HashSet<Uuid>>,
}

/// Registry of live players, keyed by request identifier and cache key
#[derive(Default)]
pub struct PlayerRegistry {
    inner: Mutex<RegistryInner>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `player`, or return an existing sharer instead
    ///
    /// When `share` is set and a player is already registered under the same
    /// cache key, that player is returned and `player` is discarded. The
    /// check and the insert happen under one lock, so two back-to-back
    /// sharing loads for the same key always converge on one player.
    pub fn insert_or_share(&self, share: bool, player: Arc<Player>) -> Arc<Player> {
        let mut inner = self.inner.lock().unwrap();

        if share {
            if let Some(key) = player.cache_key() {
                if let Some(existing) = Self::sharer_locked(&inner, key) {
                    return existing;
                }
            }
        }

        Self::insert_locked(&mut inner, &player);
        player
    }

    /// Share-or-construct under one lock
    ///
    /// Like [`insert_or_share`](Self::insert_or_share), but the player is
    /// built by `make` only after the share check misses, so construction
    /// side effects (claiming a worker slot) never happen for a load that
    /// resolves to an existing player. The flag reports whether `make` ran.
    pub fn insert_or_share_with<E>(
        &self,
        share: bool,
        cache_key: Option<&CacheKey>,
        make: impl FnOnce() -> std::result::Result<Arc<Player>, E>,
    ) -> std::result::Result<(Arc<Player>, bool), E> {
        let mut inner = self.inner.lock().unwrap();

        if share {
            if let Some(key) = cache_key {
                if let Some(existing) = Self::sharer_locked(&inner, key) {
                    return Ok((existing, false));
                }
            }
        }

        let player = make()?;
        Self::insert_locked(&mut inner, &player);
        Ok((player, true))
    }

    fn insert_locked(inner: &mut RegistryInner, player: &Arc<Player>) {
        let req_id = player.req_id();
        if let Some(key) = player.cache_key() {
            inner
                .by_cache_key
                .entry(key.clone())
                .or_default()
                .insert(req_id);
        }
        inner.players.insert(req_id, Arc::clone(player));
    }

    /// Existing player backed by the decode identified by `key`, if any
    pub fn shared_player(&self, key: &CacheKey) -> Option<Arc<Player>> {
        let inner = self.inner.lock().unwrap();
        Self::sharer_locked(&inner, key)
    }

    fn sharer_locked(inner: &RegistryInner, key: &CacheKey) -> Option<Arc<Player>> {
        inner
            .by_cache_key
            .get(key)
            .and_then(|ids| ids.iter().next())
            .and_then(|id| inner.players.get(id))
            .map(Arc::clone)
    }

    /// Live player for `req_id`, if not yet destroyed
    pub fn get(&self, req_id: Uuid) -> Option<Arc<Player>> {
        self.inner.lock().unwrap().players.get(&req_id).map(Arc::clone)
    }

    /// Remove both mappings for `req_id`
    ///
    /// Returns the removed player so the caller can log or finalize it.
    pub fn deregister(&self, req_id: Uuid) -> Option<Arc<Player>> {
        let mut inner = self.inner.lock().unwrap();
        let player = inner.players.remove(&req_id)?;

        if let Some(key) = player.cache_key() {
            if let Some(ids) = inner.by_cache_key.get_mut(key) {
                ids.remove(&req_id);
                if ids.is_empty() {
                    inner.by_cache_key.remove(key);
                }
            }
        }

        Some(player)
    }

    /// Snapshot of all live players
    pub fn players(&self) -> Vec<Arc<Player>> {
        self.inner.lock().unwrap().players.values().map(Arc::clone).collect()
    }

    /// First live player rendering into `target`, if any
    pub fn animation_for_target(&self, target: &RenderTarget) -> Option<Arc<Player>> {
        let inner = self.inner.lock().unwrap();
        inner
            .players
            .values()
            .find(|p| p.renders_into(target))
            .map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn cache_entry_count(&self) -> usize {
        self.inner.lock().unwrap().by_cache_key.len()
    }
}
