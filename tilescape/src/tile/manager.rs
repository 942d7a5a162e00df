//! The tile cache: an indexed set of live tiles with frame-liveness eviction.
//!
//! Membership changes (`get_or_create`, `evict_unused`) and iteration all
//! happen under a single mutex guarding the index; individual tile payloads
//! are guarded per-tile so the fetch layer can write pixels concurrently
//! with compositor reads of other tiles.
//!
//! # Eviction model
//!
//! The compositor calls [`TileManager::mark_all_unused`] at the start of a
//! cycle, marks every tile the window needs (including fallback ancestors),
//! then calls [`TileManager::evict_unused`] at the end. A tile survives when
//! it is used this frame or pinned by a consumer; everything else is removed
//! from the index and its pixel memory is released once the last outstanding
//! handle drops.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{Tile, TileId};

/// Point-in-time cache statistics.
///
/// Counters are cumulative since creation; `live` is the current entry count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a live tile.
    pub hits: u64,
    /// Lookups that missed.
    pub misses: u64,
    /// Tiles created.
    pub created: u64,
    /// Tiles evicted.
    pub evicted: u64,
    /// Tiles currently live.
    pub live: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tiles: {} live, {} created, {} evicted, {} hits, {} misses",
            self.live, self.created, self.evicted, self.hits, self.misses
        )
    }
}

/// Owner of all live tiles, indexed by [`TileId`].
///
/// Invariant: at most one tile per key at any time. All tiles share one
/// pixel edge length, fixed at construction.
pub struct TileManager {
    tile_size: u32,
    index: Mutex<HashMap<TileId, Arc<Tile>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    created: AtomicU64,
    evicted: AtomicU64,
}

impl TileManager {
    /// Create an empty cache for tiles of the given edge length.
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size,
            index: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            created: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Tile edge length in pixels.
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// O(1) lookup of a live tile.
    pub fn get(&self, id: &TileId) -> Option<Arc<Tile>> {
        let found = self.index.lock().get(id).cloned();
        match found {
            Some(tile) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(tile)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Look up a tile, creating and registering it on a miss.
    ///
    /// Invoked by the compositor when the tile window requires a tile that
    /// is not in the cache. The new tile starts in `Idle` status and marked
    /// used for the current cycle.
    pub fn get_or_create(&self, id: TileId) -> Arc<Tile> {
        let mut index = self.index.lock();
        if let Some(tile) = index.get(&id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(tile);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.created.fetch_add(1, Ordering::Relaxed);
        let tile = Arc::new(Tile::new(id, self.tile_size));
        index.insert(id, Arc::clone(&tile));
        tile
    }

    /// Clear every tile's frame-liveness marker.
    ///
    /// Called once per composition cycle before tile-window selection.
    pub fn mark_all_unused(&self) {
        let index = self.index.lock();
        for tile in index.values() {
            tile.clear_used();
        }
    }

    /// Dispose every tile that is neither used this frame nor pinned.
    ///
    /// Returns the number of tiles removed. Pixel payloads of removed tiles
    /// are freed once the last outstanding `Bytes` handle drops, so readers
    /// mid-blit on another thread are unaffected.
    pub fn evict_unused(&self) -> usize {
        let mut index = self.index.lock();
        let before = index.len();
        index.retain(|_, tile| tile.is_used() || tile.is_pinned());
        let removed = before - index.len();
        if removed > 0 {
            self.evicted.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, live = index.len(), "Evicted unused tiles");
        }
        removed
    }

    /// Snapshot of every live tile's key.
    ///
    /// Order is unspecified; callers sort as needed. Intended for fetch
    /// layers and diagnostics that need to enumerate outstanding tiles.
    pub fn live_ids(&self) -> Vec<TileId> {
        self.index.lock().keys().copied().collect()
    }

    /// Number of live tiles.
    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.index.lock().is_empty()
    }

    /// Remove every tile regardless of liveness.
    pub fn clear(&self) {
        let mut index = self.index.lock();
        let removed = index.len();
        index.clear();
        self.evicted.fetch_add(removed as u64, Ordering::Relaxed);
    }

    /// Snapshot of the cumulative statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            live: self.len(),
        }
    }
}

impl fmt::Debug for TileManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileManager")
            .field("tile_size", &self.tile_size)
            .field("live", &self.len())
            .finish()
    }
}
