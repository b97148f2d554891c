//! # Chunk Store
//!
//! Memory-bounded LRU cache of chunks over an unbounded world.
//!
//! ## Lifecycle
//!
//! ```text
//! NotResident --get--> [restore from storage | generate] --> Resident(clean)
//! Resident(clean) --modify--> Resident(dirty)
//! Resident(dirty) --evict--> persist snapshot --> NotResident
//! Resident(clean) --evict--> NotResident
//! ```
//!
//! ## Concurrency
//!
//! One `parking_lot::Mutex` guards the resident map, the recency index and
//! the counters. Restore and generation run outside the lock; insertion and
//! eviction (including the persist of an evicted dirty chunk) run under it,
//! so `resident <= capacity` holds whenever the lock is released.
//!
//! Resident chunks are shared as `Arc<Chunk>`. Mutation goes through
//! [`ChunkStore::modify_chunk`], which copies on write if a reader still
//! holds the old version.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tessera_procedural::{Chunk, ChunkCoord, Coord, Decoration, TerrainGenerator, Tile};

use crate::config::WorldConfig;
use crate::error::{WorldError, WorldResult};
use crate::storage::{ChunkStorage, MemoryStorage};

/// Axis-aligned box of tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileArea {
    /// Left edge (inclusive).
    pub x: i32,
    /// Top edge (inclusive).
    pub y: i32,
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
}

impl TileArea {
    /// Creates an area.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Square box of `2 * radius + 1` tiles per side around `center`.
    #[must_use]
    pub fn around(center: Coord, radius: u32) -> Self {
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        let side = radius.saturating_mul(2).saturating_add(1);
        Self::new(center.x.saturating_sub(r), center.y.saturating_sub(r), side, side)
    }

    /// True if the area covers no tiles.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether a coordinate lies inside the area.
    #[must_use]
    pub fn contains(&self, coord: Coord) -> bool {
        let dx = i64::from(coord.x) - i64::from(self.x);
        let dy = i64::from(coord.y) - i64::from(self.y);
        (0..i64::from(self.width)).contains(&dx) && (0..i64::from(self.height)).contains(&dy)
    }

    /// Bottom-right corner (inclusive), clamped to the coordinate range.
    fn last(&self) -> Coord {
        let span = |len: u32| i32::try_from(len.saturating_sub(1)).unwrap_or(i32::MAX);
        Coord::new(
            self.x.saturating_add(span(self.width)),
            self.y.saturating_add(span(self.height)),
        )
    }

    /// Number of chunks the area intersects.
    #[must_use]
    pub fn chunk_count(&self, chunk_size: u32) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let min = ChunkCoord::from_tile(Coord::new(self.x, self.y), chunk_size);
        let max = ChunkCoord::from_tile(self.last(), chunk_size);
        let cols = u64::from(max.x.abs_diff(min.x)) + 1;
        let rows = u64::from(max.y.abs_diff(min.y)) + 1;
        cols * rows
    }

    /// Chunks the area intersects, row-major.
    #[must_use]
    pub fn chunk_coords(&self, chunk_size: u32) -> Vec<ChunkCoord> {
        if self.is_empty() {
            return Vec::new();
        }
        let min = ChunkCoord::from_tile(Coord::new(self.x, self.y), chunk_size);
        let max = ChunkCoord::from_tile(self.last(), chunk_size);
        (min.y..=max.y)
            .flat_map(|cy| (min.x..=max.x).map(move |cx| ChunkCoord::new(cx, cy)))
            .collect()
    }

    /// Every coordinate in the area, row-major.
    pub fn coords(&self) -> impl Iterator<Item = Coord> {
        let Self { x, y, width, height } = *self;
        (0..height).flat_map(move |dy| {
            (0..width).map(move |dx| {
                Coord::new(x.saturating_add_unsigned(dx), y.saturating_add_unsigned(dy))
            })
        })
    }
}

/// Snapshot of cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CacheStats {
    /// Chunks currently in memory.
    pub resident_count: usize,
    /// Maximum resident chunks.
    pub capacity: usize,
    /// Chunks produced by the generator (including corruption fallbacks).
    pub total_generated: u64,
    /// Chunks restored from storage.
    pub total_restored: u64,
    /// Chunks released from memory.
    pub total_evicted: u64,
    /// Snapshots written successfully.
    pub total_persisted: u64,
    /// Snapshot writes that failed.
    pub persist_failures: u64,
    /// Snapshots that failed to decode and were regenerated.
    pub corrupt_snapshots: u64,
    /// Touches served from memory.
    pub hits: u64,
    /// Touches that required a restore or a generation.
    pub misses: u64,
    /// `hits / (hits + misses)`, zero before the first touch.
    pub cache_hit_rate: f64,
}

/// Outcome of [`ChunkStore::evict_all`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Chunks released.
    pub evicted: usize,
    /// Dirty chunks written to storage.
    pub persisted: usize,
    /// Dirty chunks whose write failed (mutations lost).
    pub failed: usize,
}

/// Where a freshly loaded chunk came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Origin {
    Generated,
    Restored,
    /// Snapshot existed but was corrupt; regenerated.
    Recovered,
}

#[derive(Debug, Default)]
struct Counters {
    generated: u64,
    restored: u64,
    evicted: u64,
    persisted: u64,
    persist_failures: u64,
    corrupt: u64,
    hits: u64,
    misses: u64,
}

impl Counters {
    fn record_load(&mut self, origin: Origin) {
        self.misses += 1;
        match origin {
            Origin::Generated => self.generated += 1,
            Origin::Restored => self.restored += 1,
            Origin::Recovered => {
                self.generated += 1;
                self.corrupt += 1;
            }
        }
    }
}

#[derive(Debug)]
struct Entry {
    chunk: Arc<Chunk>,
    touched: u64,
}

/// State guarded by the store mutex.
#[derive(Debug, Default)]
struct Inner {
    chunks: HashMap<ChunkCoord, Entry>,
    /// Touch tick -> chunk; first entry is least recently used.
    recency: BTreeMap<u64, ChunkCoord>,
    clock: u64,
    /// Bumped whenever a dirty chunk leaves memory.
    persist_epoch: u64,
    counters: Counters,
}

impl Inner {
    /// Marks a resident chunk most recently used.
    fn touch(&mut self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        let entry = self.chunks.get_mut(&coord)?;
        self.clock += 1;
        self.recency.remove(&entry.touched);
        entry.touched = self.clock;
        self.recency.insert(self.clock, coord);
        Some(Arc::clone(&entry.chunk))
    }

    fn insert(&mut self, chunk: Arc<Chunk>) {
        self.clock += 1;
        let coord = chunk.coord();
        self.recency.insert(self.clock, coord);
        let entry = Entry {
            chunk,
            touched: self.clock,
        };
        if let Some(old) = self.chunks.insert(coord, entry) {
            self.recency.remove(&old.touched);
        }
    }

    /// Removes the least recently used chunk not in `pinned`.
    fn pop_lru(&mut self, pinned: &[ChunkCoord]) -> Option<Arc<Chunk>> {
        let (&tick, &coord) = self.recency.iter().find(|&(_, c)| !pinned.contains(c))?;
        self.recency.remove(&tick);
        self.chunks.remove(&coord).map(|entry| entry.chunk)
    }
}

/// LRU cache of chunks backed by a snapshot store.
pub struct ChunkStore {
    config: WorldConfig,
    generator: TerrainGenerator,
    storage: Arc<dyn ChunkStorage>,
    inner: Mutex<Inner>,
}

impl ChunkStore {
    /// Creates a store over the given snapshot storage.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Config`] if the configuration is invalid.
    pub fn new(config: &WorldConfig, storage: Arc<dyn ChunkStorage>) -> WorldResult<Self> {
        config.validate()?;
        tracing::info!(
            "Chunk store ready: seed {}, {}x{} tiles per chunk, capacity {}",
            config.seed,
            config.chunk_size,
            config.chunk_size,
            config.cache_capacity
        );
        Ok(Self {
            generator: TerrainGenerator::new(config.world_seed(), config.terrain),
            config: config.clone(),
            storage,
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Creates a store backed by a fresh [`MemoryStorage`].
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Config`] if the configuration is invalid.
    pub fn in_memory(config: &WorldConfig) -> WorldResult<Self> {
        Self::new(config, Arc::new(MemoryStorage::new()))
    }

    /// Configuration the store was built with.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Generator used for misses.
    #[must_use]
    pub const fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    /// Chunk edge length in tiles.
    #[must_use]
    pub const fn chunk_size(&self) -> u32 {
        self.config.chunk_size
    }

    /// Maximum resident chunks.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.config.cache_capacity
    }

    /// Returns a chunk, restoring or generating it on a miss.
    ///
    /// The chunk becomes most recently used; the least recently used chunk
    /// may be evicted.
    pub fn get_chunk(&self, coord: ChunkCoord) -> Arc<Chunk> {
        self.fetch(coord, &[coord])
    }

    /// Returns the tile at a world coordinate.
    pub fn get_tile(&self, coord: Coord) -> Tile {
        let chunk = self.get_chunk(ChunkCoord::from_tile(coord, self.chunk_size()));
        chunk
            .tile(coord)
            .copied()
            .unwrap_or_else(|| self.generator.generate(coord))
    }

    /// Loads every chunk intersecting `area` in one call.
    ///
    /// Chunks touched by this call are never evicted by it, so all of them
    /// are resident when it returns (barring concurrent callers).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EmptyArea`] for a zero-sized box and
    /// [`WorldError::AreaTooLarge`] if the box spans more chunks than the
    /// cache can hold.
    pub fn get_chunks_in_area(&self, area: TileArea) -> WorldResult<Vec<Arc<Chunk>>> {
        if area.is_empty() {
            return Err(WorldError::EmptyArea);
        }
        let requested = area.chunk_count(self.chunk_size());
        let capacity = self.capacity();
        if requested > capacity as u64 {
            return Err(WorldError::AreaTooLarge {
                requested: usize::try_from(requested).unwrap_or(usize::MAX),
                capacity,
            });
        }

        let coords = area.chunk_coords(self.chunk_size());
        Ok(coords.iter().map(|&coord| self.fetch(coord, &coords)).collect())
    }

    /// Flags a resident chunk as holding unpersisted mutations.
    ///
    /// Returns `false` if the chunk is not resident.
    pub fn mark_dirty(&self, coord: ChunkCoord) -> bool {
        let mut inner = self.inner.lock();
        match inner.chunks.get_mut(&coord) {
            Some(entry) => {
                Arc::make_mut(&mut entry.chunk).mark_dirty();
                true
            }
            None => false,
        }
    }

    /// Mutates a chunk in place and marks it dirty.
    ///
    /// The chunk is loaded first if needed. `f` runs under the store lock
    /// and must not call back into the store.
    pub fn modify_chunk<R>(&self, coord: ChunkCoord, f: impl FnOnce(&mut Chunk) -> R) -> R {
        loop {
            let held = self.fetch(coord, &[coord]);
            let mut inner = self.inner.lock();
            // A concurrent caller may have evicted it between fetch and lock.
            if let Some(entry) = inner.chunks.get_mut(&coord) {
                drop(held);
                let chunk = Arc::make_mut(&mut entry.chunk);
                let out = f(chunk);
                chunk.mark_dirty();
                return out;
            }
        }
    }

    /// Sets the decoration on a tile, returning the previous one.
    pub fn set_decoration(&self, coord: Coord, decoration: Option<Decoration>) -> Option<Decoration> {
        let chunk_coord = ChunkCoord::from_tile(coord, self.chunk_size());
        self.modify_chunk(chunk_coord, |chunk| {
            let previous = chunk.tile(coord).and_then(|t| t.decoration);
            chunk.set_decoration(coord, decoration);
            previous
        })
    }

    /// Persists every dirty chunk and releases all resident chunks.
    pub fn evict_all(&self) -> EvictionReport {
        let mut inner = self.inner.lock();
        let mut report = EvictionReport::default();

        while let Some(chunk) = inner.pop_lru(&[]) {
            report.evicted += 1;
            let dirty = chunk.is_dirty();
            match (dirty, self.retire(&mut inner, &chunk)) {
                (true, true) => report.persisted += 1,
                (true, false) => report.failed += 1,
                _ => {}
            }
        }

        tracing::info!(
            "Evicted all chunks: {} released, {} persisted, {} failed",
            report.evicted,
            report.persisted,
            report.failed
        );
        report
    }

    /// Current counters.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let c = &inner.counters;
        let touches = c.hits + c.misses;
        CacheStats {
            resident_count: inner.chunks.len(),
            capacity: self.capacity(),
            total_generated: c.generated,
            total_restored: c.restored,
            total_evicted: c.evicted,
            total_persisted: c.persisted,
            persist_failures: c.persist_failures,
            corrupt_snapshots: c.corrupt,
            hits: c.hits,
            misses: c.misses,
            cache_hit_rate: if touches == 0 {
                0.0
            } else {
                c.hits as f64 / touches as f64
            },
        }
    }

    /// Whether a chunk is in memory. Does not count as a touch.
    #[must_use]
    pub fn is_resident(&self, coord: ChunkCoord) -> bool {
        self.inner.lock().chunks.contains_key(&coord)
    }

    /// Resident chunks, least recently used first.
    #[must_use]
    pub fn resident_by_recency(&self) -> Vec<ChunkCoord> {
        self.inner.lock().recency.values().copied().collect()
    }

    fn fetch(&self, coord: ChunkCoord, pinned: &[ChunkCoord]) -> Arc<Chunk> {
        loop {
            let epoch = {
                let mut inner = self.inner.lock();
                if let Some(chunk) = inner.touch(coord) {
                    inner.counters.hits += 1;
                    return chunk;
                }
                inner.persist_epoch
            };

            let (chunk, origin) = self.load(coord);

            let mut inner = self.inner.lock();
            if let Some(existing) = inner.touch(coord) {
                inner.counters.hits += 1;
                return existing;
            }
            // A dirty chunk was written while we loaded; our copy may predate it.
            if inner.persist_epoch != epoch {
                continue;
            }

            inner.counters.record_load(origin);
            let chunk = Arc::new(chunk);
            inner.insert(Arc::clone(&chunk));
            while inner.chunks.len() > self.capacity() {
                let Some(victim) = inner.pop_lru(pinned) else {
                    break;
                };
                self.retire(&mut inner, &victim);
            }
            return chunk;
        }
    }

    /// Restores a chunk from storage or generates it. Runs without the lock.
    fn load(&self, coord: ChunkCoord) -> (Chunk, Origin) {
        let size = self.chunk_size();
        match self.storage.get(coord) {
            Ok(Some(bytes)) => match Chunk::decode_snapshot(&bytes, coord, size) {
                Ok(chunk) => {
                    tracing::debug!("Restored chunk ({}, {})", coord.x, coord.y);
                    return (chunk, Origin::Restored);
                }
                Err(e) => {
                    tracing::warn!(
                        "Corrupt snapshot for chunk ({}, {}), regenerating: {}",
                        coord.x,
                        coord.y,
                        e
                    );
                    return (self.generator.generate_chunk(coord, size), Origin::Recovered);
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    "Failed to read snapshot for chunk ({}, {}), regenerating: {}",
                    coord.x,
                    coord.y,
                    e
                );
            }
        }
        tracing::debug!("Generated chunk ({}, {})", coord.x, coord.y);
        (self.generator.generate_chunk(coord, size), Origin::Generated)
    }

    /// Accounts for a chunk leaving memory, persisting it if dirty.
    ///
    /// Returns `false` only when a write was needed and failed.
    fn retire(&self, inner: &mut Inner, chunk: &Chunk) -> bool {
        let coord = chunk.coord();
        inner.counters.evicted += 1;
        if !chunk.is_dirty() {
            tracing::debug!("Evicted clean chunk ({}, {})", coord.x, coord.y);
            return true;
        }

        inner.persist_epoch += 1;
        match self.storage.put(coord, &chunk.encode_snapshot()) {
            Ok(()) => {
                inner.counters.persisted += 1;
                tracing::debug!("Evicted and persisted chunk ({}, {})", coord.x, coord.y);
                true
            }
            Err(e) => {
                inner.counters.persist_failures += 1;
                tracing::warn!(
                    "Failed to persist chunk ({}, {}), mutations lost: {}",
                    coord.x,
                    coord.y,
                    e
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStore")
            .field("config", &self.config)
            .field("resident", &self.inner.lock().chunks.len())
            .finish_non_exhaustive()
    }
}

impl Drop for ChunkStore {
    fn drop(&mut self) {
        let dirty = self
            .inner
            .get_mut()
            .chunks
            .values()
            .any(|entry| entry.chunk.is_dirty());
        if dirty {
            self.evict_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(capacity: usize) -> ChunkStore {
        let config = WorldConfig::new(42).with_chunk_size(8).with_capacity(capacity);
        ChunkStore::in_memory(&config).expect("valid config")
    }

    #[test]
    fn test_miss_then_hit() {
        let store = store(4);
        let a = store.get_chunk(ChunkCoord::new(0, 0));
        let b = store.get_chunk(ChunkCoord::new(0, 0));

        assert!(Arc::ptr_eq(&a, &b));
        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_generated, 1);
        assert!((stats.cache_hit_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_lru_victim_is_least_recent() {
        let store = store(3);
        for x in 0..3 {
            store.get_chunk(ChunkCoord::new(x, 0));
        }
        store.get_chunk(ChunkCoord::new(0, 0));
        store.get_chunk(ChunkCoord::new(3, 0));

        assert!(!store.is_resident(ChunkCoord::new(1, 0)));
        assert_eq!(
            store.resident_by_recency(),
            vec![ChunkCoord::new(2, 0), ChunkCoord::new(0, 0), ChunkCoord::new(3, 0)]
        );
    }

    #[test]
    fn test_stats_on_fresh_store() {
        let stats = store(2).stats();
        assert_eq!(stats.resident_count, 0);
        assert_eq!(stats.capacity, 2);
        assert!(stats.cache_hit_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn test_get_tile_matches_generator() {
        let store = store(4);
        for coord in [Coord::new(0, 0), Coord::new(-1, -1), Coord::new(17, -9)] {
            assert_eq!(store.get_tile(coord), store.generator().generate(coord));
        }
    }

    #[test]
    fn test_mark_dirty_requires_residency() {
        let store = store(2);
        let coord = ChunkCoord::new(1, 1);
        assert!(!store.mark_dirty(coord));

        store.get_chunk(coord);
        assert!(store.mark_dirty(coord));
        assert!(store.get_chunk(coord).is_dirty());
    }

    #[test]
    fn test_modify_copies_on_write() {
        let store = store(2);
        let coord = Coord::new(3, 3);
        let before = store.get_chunk(ChunkCoord::new(0, 0));

        assert_eq!(store.set_decoration(coord, Some(Decoration::Well)), None);
        assert_eq!(store.set_decoration(coord, Some(Decoration::Tree)), Some(Decoration::Well));

        assert_eq!(before.tile(coord).and_then(|t| t.decoration), None);
        assert!(!before.is_dirty());
        let after = store.get_chunk(ChunkCoord::new(0, 0));
        assert_eq!(after.tile(coord).and_then(|t| t.decoration), Some(Decoration::Tree));
        assert!(after.is_dirty());
    }

    #[test]
    fn test_area_validation() {
        let store = store(4);
        assert!(matches!(
            store.get_chunks_in_area(TileArea::new(0, 0, 0, 5)),
            Err(WorldError::EmptyArea)
        ));
        assert!(matches!(
            store.get_chunks_in_area(TileArea::new(0, 0, 24, 24)),
            Err(WorldError::AreaTooLarge { requested: 9, capacity: 4 })
        ));
        assert_eq!(store.stats().resident_count, 0);
    }

    #[test]
    fn test_area_chunks_survive_their_own_batch() {
        let store = store(4);
        for x in 10..14 {
            store.get_chunk(ChunkCoord::new(x, 10));
        }

        let chunks = store
            .get_chunks_in_area(TileArea::new(-4, -4, 16, 16))
            .expect("4 chunks fit");
        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert!(store.is_resident(chunk.coord()));
        }
        assert_eq!(store.stats().resident_count, 4);
    }

    #[test]
    fn test_tile_area_geometry() {
        let area = TileArea::around(Coord::new(0, 0), 2);
        assert_eq!(area, TileArea::new(-2, -2, 5, 5));
        assert!(area.contains(Coord::new(2, -2)));
        assert!(!area.contains(Coord::new(3, 0)));
        assert_eq!(area.coords().count(), 25);
        assert_eq!(area.coords().next(), Some(Coord::new(-2, -2)));

        assert_eq!(area.chunk_count(8), 4);
        assert_eq!(
            area.chunk_coords(8),
            vec![
                ChunkCoord::new(-1, -1),
                ChunkCoord::new(0, -1),
                ChunkCoord::new(-1, 0),
                ChunkCoord::new(0, 0),
            ]
        );
        assert_eq!(TileArea::new(0, 0, 0, 3).coords().count(), 0);
        assert_eq!(TileArea::new(0, 0, 8, 8).chunk_count(8), 1);
    }

    #[test]
    fn test_evict_all_reports() {
        let store = store(4);
        store.get_chunk(ChunkCoord::new(0, 0));
        store.set_decoration(Coord::new(9, 0), Some(Decoration::House));

        let report = store.evict_all();
        assert_eq!(report, EvictionReport { evicted: 2, persisted: 1, failed: 0 });
        assert_eq!(store.stats().resident_count, 0);
        assert_eq!(store.stats().total_persisted, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = WorldConfig::new(1).with_capacity(0);
        assert!(matches!(ChunkStore::in_memory(&config), Err(WorldError::Config(_))));
    }
}
