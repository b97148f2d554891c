//! # Navigable World
//!
//! Facade over the chunk store: tile access, movement neighbourhoods, A*
//! pathfinding, spawn search and preloading.
//!
//! ## Pathfinding
//!
//! - Step cost 1 orthogonal, sqrt(2) diagonal
//! - Heuristic: Manhattan when 4-connected, Euclidean when 8-connected
//! - Equal f-scores pop in discovery order, so results are reproducible
//! - The search stops after `max_expanded_nodes` expansions; an unbounded
//!   world needs that cap to guarantee termination
//!
//! Every passability probe goes through the chunk store, once per tile per
//! search, so a search never holds more chunks than the cache does and its
//! chunk traffic shows up in [`CacheStats`].

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use tessera_procedural::{Chunk, ChunkCoord, Coord, Decoration, Tile};
use thiserror::Error;

use crate::config::{Connectivity, NavigationConfig, WorldConfig};
use crate::error::{WorldError, WorldResult};
use crate::spawn::{SpawnConstraints, SpawnLocator, SpawnResult};
use crate::storage::ChunkStorage;
use crate::store::{CacheStats, ChunkStore, TileArea};

/// Orthogonal moves: N, E, S, W.
const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Diagonal moves: NE, SE, SW, NW.
const DIAGONAL: [(i32, i32); 4] = [(1, -1), (1, 1), (-1, 1), (-1, -1)];

/// Reasons a path search produced no path.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    /// The start tile is impassable.
    #[error("start tile is impassable")]
    StartBlocked,
    /// The goal tile is impassable.
    #[error("goal tile is impassable")]
    GoalBlocked,
    /// The node budget ran out before the goal was reached.
    #[error("search budget exhausted after expanding {expanded} nodes")]
    BudgetExhausted {
        /// Nodes expanded.
        expanded: usize,
    },
    /// Every reachable tile was expanded without meeting the goal.
    #[error("goal unreachable, {expanded} nodes expanded")]
    Unreachable {
        /// Nodes expanded.
        expanded: usize,
    },
}

/// A found path.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    /// Coordinates from start to goal, both inclusive.
    pub coords: Vec<Coord>,
    /// Sum of step costs.
    pub cost: f64,
    /// Nodes expanded to find it.
    pub expanded: usize,
}

impl Path {
    /// Number of coordinates, start and goal included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Never true for a path returned by a search.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Number of steps.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.coords.len().saturating_sub(1)
    }
}

/// Admissible distance estimate for the neighbourhood.
#[must_use]
pub fn heuristic(connectivity: Connectivity, from: Coord, to: Coord) -> f64 {
    match connectivity {
        Connectivity::Four => f64::from(from.manhattan(to)),
        Connectivity::Eight => from.distance(to),
    }
}

/// Adjacent coordinates in neighbour order (N, E, S, W, then diagonals).
///
/// Moves off the edge of the `i32` grid are skipped.
pub fn adjacent(coord: Coord, connectivity: Connectivity) -> impl Iterator<Item = (Coord, f64)> {
    let diagonals = match connectivity {
        Connectivity::Four => 0,
        Connectivity::Eight => DIAGONAL.len(),
    };
    ORTHOGONAL
        .into_iter()
        .filter_map(move |(dx, dy)| Some((coord.checked_offset(dx, dy)?, 1.0)))
        .chain(
            DIAGONAL
                .into_iter()
                .take(diagonals)
                .filter_map(move |(dx, dy)| {
                    Some((coord.checked_offset(dx, dy)?, std::f64::consts::SQRT_2))
                }),
        )
}

/// Open-set entry. Ordered so the `BinaryHeap` pops lowest f, then earliest
/// discovery.
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f64,
    seq: u64,
    coord: Coord,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.f.total_cmp(&self.f) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ordering => ordering,
        }
    }
}

/// A* over any passability function.
///
/// `passable` is queried at most once per coordinate.
///
/// # Errors
///
/// Returns a [`PathError`] when no path is found.
pub fn find_path_with(
    start: Coord,
    goal: Coord,
    navigation: &NavigationConfig,
    mut passable: impl FnMut(Coord) -> bool,
) -> Result<Path, PathError> {
    let mut memo: HashMap<Coord, bool> = HashMap::new();
    let mut is_open = |coord: Coord| *memo.entry(coord).or_insert_with(|| passable(coord));

    if !is_open(start) {
        return Err(PathError::StartBlocked);
    }
    if !is_open(goal) {
        return Err(PathError::GoalBlocked);
    }

    let connectivity = navigation.connectivity;
    let mut open = BinaryHeap::new();
    let mut g_score: HashMap<Coord, f64> = HashMap::new();
    let mut came_from: HashMap<Coord, Coord> = HashMap::new();
    let mut closed: HashSet<Coord> = HashSet::new();
    let mut seq = 0u64;
    let mut expanded = 0usize;

    g_score.insert(start, 0.0);
    open.push(OpenNode {
        f: heuristic(connectivity, start, goal),
        seq,
        coord: start,
    });

    while let Some(OpenNode { coord, .. }) = open.pop() {
        if !closed.insert(coord) {
            continue;
        }
        expanded += 1;

        let g = g_score.get(&coord).copied().unwrap_or(f64::INFINITY);
        if coord == goal {
            return Ok(Path {
                coords: reconstruct(&came_from, goal),
                cost: g,
                expanded,
            });
        }
        if expanded >= navigation.max_expanded_nodes {
            return Err(PathError::BudgetExhausted { expanded });
        }

        for (next, step) in adjacent(coord, connectivity) {
            if closed.contains(&next) || !is_open(next) {
                continue;
            }
            let tentative = g + step;
            let improved = match g_score.entry(next) {
                Entry::Occupied(mut e) if tentative < *e.get() => {
                    e.insert(tentative);
                    true
                }
                Entry::Occupied(_) => false,
                Entry::Vacant(e) => {
                    e.insert(tentative);
                    true
                }
            };
            if improved {
                came_from.insert(next, coord);
                seq += 1;
                open.push(OpenNode {
                    f: tentative + heuristic(connectivity, next, goal),
                    seq,
                    coord: next,
                });
            }
        }
    }

    Err(PathError::Unreachable { expanded })
}

fn reconstruct(came_from: &HashMap<Coord, Coord>, goal: Coord) -> Vec<Coord> {
    let mut coords = vec![goal];
    let mut current = goal;
    while let Some(&previous) = came_from.get(&current) {
        coords.push(previous);
        current = previous;
    }
    coords.reverse();
    coords
}

/// Queryable, navigable view of the world.
#[derive(Debug)]
pub struct NavigableWorld {
    store: ChunkStore,
}

impl NavigableWorld {
    /// Creates a world over the given snapshot storage.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Config`](crate::WorldError::Config) if the
    /// configuration is invalid.
    pub fn new(config: &WorldConfig, storage: Arc<dyn ChunkStorage>) -> WorldResult<Self> {
        Ok(Self::from_store(ChunkStore::new(config, storage)?))
    }

    /// Creates a world with in-memory persistence.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Config`](crate::WorldError::Config) if the
    /// configuration is invalid.
    pub fn in_memory(config: &WorldConfig) -> WorldResult<Self> {
        Ok(Self::from_store(ChunkStore::in_memory(config)?))
    }

    /// Wraps an existing store.
    #[must_use]
    pub const fn from_store(store: ChunkStore) -> Self {
        Self { store }
    }

    /// The underlying chunk store.
    #[must_use]
    pub const fn store(&self) -> &ChunkStore {
        &self.store
    }

    /// Tile at a world coordinate.
    pub fn tile_at(&self, coord: Coord) -> Tile {
        self.store.get_tile(coord)
    }

    /// Passable neighbours under the configured connectivity.
    pub fn neighbors(&self, coord: Coord) -> Vec<Coord> {
        adjacent(coord, self.store.config().navigation.connectivity)
            .map(|(next, _)| next)
            .filter(|&next| self.store.get_tile(next).passable)
            .collect()
    }

    /// Shortest path between two tiles.
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] if either end is impassable, the goal is
    /// unreachable or the node budget runs out.
    pub fn find_path(&self, start: Coord, goal: Coord) -> Result<Path, PathError> {
        let navigation = self.store.config().navigation;
        let result = find_path_with(start, goal, &navigation, |c| self.store.get_tile(c).passable);

        match &result {
            Ok(path) => tracing::debug!(
                "Path ({}, {}) -> ({}, {}): {} steps, cost {:.2}, {} expanded",
                start.x,
                start.y,
                goal.x,
                goal.y,
                path.steps(),
                path.cost,
                path.expanded
            ),
            Err(e @ PathError::BudgetExhausted { .. }) => tracing::warn!(
                "Path ({}, {}) -> ({}, {}) abandoned: {}",
                start.x,
                start.y,
                goal.x,
                goal.y,
                e
            ),
            Err(e) => tracing::debug!(
                "No path ({}, {}) -> ({}, {}): {}",
                start.x,
                start.y,
                goal.x,
                goal.y,
                e
            ),
        }
        result
    }

    /// Loads every chunk within `radius` chunks of the chunk holding `coord`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AreaTooLarge`](crate::WorldError::AreaTooLarge)
    /// if the block does not fit in the cache.
    pub fn preload_area_around(&self, coord: Coord, radius: u32) -> WorldResult<usize> {
        let side_chunks = u64::from(radius) * 2 + 1;
        let requested = side_chunks.saturating_mul(side_chunks);
        let capacity = self.store.capacity();
        if requested > capacity as u64 {
            return Err(WorldError::AreaTooLarge {
                requested: usize::try_from(requested).unwrap_or(usize::MAX),
                capacity,
            });
        }

        let size = self.store.chunk_size();
        let center = ChunkCoord::from_tile(coord, size);
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        let corner = ChunkCoord::new(center.x.saturating_sub(r), center.y.saturating_sub(r)).origin(size);
        let side = radius
            .saturating_mul(2)
            .saturating_add(1)
            .saturating_mul(size);

        let loaded = self
            .store
            .get_chunks_in_area(TileArea::new(corner.x, corner.y, side, side))?
            .len();
        tracing::debug!("Preloaded {} chunks around ({}, {})", loaded, coord.x, coord.y);
        Ok(loaded)
    }

    /// Spawn search using the configured constraints.
    pub fn find_spawn_locations(&self, count: usize) -> SpawnResult {
        let constraints = SpawnConstraints::from(&self.store.config().spawn);
        self.find_spawn_locations_with(count, &constraints)
    }

    /// Spawn search with explicit constraints.
    pub fn find_spawn_locations_with(&self, count: usize, constraints: &SpawnConstraints) -> SpawnResult {
        SpawnLocator::new(&self.store).find_spawn_locations(count, constraints)
    }

    /// Every tile within `radius` tiles (square box), row-major.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AreaTooLarge`](crate::WorldError::AreaTooLarge)
    /// if the box does not fit in the cache.
    pub fn tiles_in_radius(&self, center: Coord, radius: u32) -> WorldResult<Vec<Tile>> {
        let area = TileArea::around(center, radius);
        let chunks: HashMap<ChunkCoord, Arc<Chunk>> = self
            .store
            .get_chunks_in_area(area)?
            .into_iter()
            .map(|chunk| (chunk.coord(), chunk))
            .collect();

        let size = self.store.chunk_size();
        Ok(area
            .coords()
            .filter_map(|coord| {
                chunks
                    .get(&ChunkCoord::from_tile(coord, size))
                    .and_then(|chunk| chunk.tile(coord).copied())
            })
            .collect())
    }

    /// Sets a tile's decoration, returning the previous one.
    pub fn set_decoration(&self, coord: Coord, decoration: Option<Decoration>) -> Option<Decoration> {
        self.store.set_decoration(coord, decoration)
    }

    /// Cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }
}
