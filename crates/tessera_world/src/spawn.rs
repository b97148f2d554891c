//! # Spawn Locator
//!
//! Finds mutually separated starting tiles near an origin.
//!
//! The search walks concentric chunk rings (radius 0, 1, 2, ...) around the
//! origin's chunk. Within a ring, candidates are ranked by biome preference
//! (Plains, then Village, then Farmland, then the rest), then by distance to
//! the origin, then by discovery order, and accepted greedily while they keep
//! the minimum separation from everything accepted so far.
//!
//! Every chunk the search visits goes through the chunk store and becomes
//! resident, evicting colder chunks as usual.

use tessera_procedural::{Biome, ChunkCoord, Coord};

use crate::config::SpawnConfig;
use crate::store::ChunkStore;

/// Rules a spawn tile must satisfy.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnConstraints {
    /// Tile the search is centred on.
    pub origin: Coord,
    /// Minimum Euclidean distance between accepted tiles.
    pub min_separation: f64,
    /// Largest chunk ring searched.
    pub max_search_radius: u32,
    /// Biomes a spawn may stand on. Impassable biomes are never accepted.
    pub acceptable: Vec<Biome>,
}

impl SpawnConstraints {
    /// Restricts the acceptable biomes.
    #[must_use]
    pub fn with_biomes(mut self, biomes: &[Biome]) -> Self {
        self.acceptable = biomes.to_vec();
        self
    }

    /// Moves the search origin.
    #[must_use]
    pub const fn with_origin(mut self, origin: Coord) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the minimum separation.
    #[must_use]
    pub const fn with_separation(mut self, min_separation: f64) -> Self {
        self.min_separation = min_separation;
        self
    }

    /// Caps the ring radius.
    #[must_use]
    pub const fn with_max_radius(mut self, max_search_radius: u32) -> Self {
        self.max_search_radius = max_search_radius;
        self
    }

    fn accepts(&self, biome: Biome) -> bool {
        biome.is_passable() && self.acceptable.contains(&biome)
    }
}

impl Default for SpawnConstraints {
    fn default() -> Self {
        Self::from(&SpawnConfig::default())
    }
}

impl From<&SpawnConfig> for SpawnConstraints {
    fn from(config: &SpawnConfig) -> Self {
        Self {
            origin: config.origin(),
            min_separation: config.min_separation,
            max_search_radius: config.max_search_radius,
            acceptable: Biome::ALL.into_iter().filter(|b| b.is_passable()).collect(),
        }
    }
}

/// Outcome of a spawn search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpawnResult {
    /// Exactly the requested number of locations.
    Complete(Vec<Coord>),
    /// The radius cap was reached first.
    Partial {
        /// Locations found, in acceptance order.
        locations: Vec<Coord>,
        /// Number originally asked for.
        requested: usize,
    },
}

impl SpawnResult {
    /// Locations found, in acceptance order.
    #[must_use]
    pub fn locations(&self) -> &[Coord] {
        match self {
            Self::Complete(locations) | Self::Partial { locations, .. } => locations,
        }
    }

    /// Consumes the result, keeping the locations.
    #[must_use]
    pub fn into_locations(self) -> Vec<Coord> {
        match self {
            Self::Complete(locations) | Self::Partial { locations, .. } => locations,
        }
    }

    /// Whether every requested location was found.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Spawn search over a chunk store.
#[derive(Debug, Clone, Copy)]
pub struct SpawnLocator<'a> {
    store: &'a ChunkStore,
}

#[derive(Clone, Copy)]
struct Candidate {
    coord: Coord,
    rank: u8,
    dist_sq: i64,
    discovered: usize,
}

impl<'a> SpawnLocator<'a> {
    /// Creates a locator reading tiles through `store`.
    #[must_use]
    pub const fn new(store: &'a ChunkStore) -> Self {
        Self { store }
    }

    /// Finds up to `count` spawn tiles.
    pub fn find_spawn_locations(&self, count: usize, constraints: &SpawnConstraints) -> SpawnResult {
        let chunk_size = self.store.chunk_size();
        let center = ChunkCoord::from_tile(constraints.origin, chunk_size);
        let min_sq = constraints.min_separation * constraints.min_separation;
        let mut accepted: Vec<Coord> = Vec::with_capacity(count);

        let mut radius = 0;
        while accepted.len() < count && radius <= constraints.max_search_radius {
            let candidates = self.ring_candidates(center, radius, constraints);

            for candidate in candidates {
                let separated = accepted
                    .iter()
                    .all(|a| squared_distance(*a, candidate.coord) >= min_sq);
                if separated {
                    accepted.push(candidate.coord);
                    if accepted.len() == count {
                        break;
                    }
                }
            }
            radius += 1;
        }

        tracing::debug!(
            "Spawn search around ({}, {}): {}/{} found within {} rings",
            constraints.origin.x,
            constraints.origin.y,
            accepted.len(),
            count,
            radius
        );

        if accepted.len() == count {
            SpawnResult::Complete(accepted)
        } else {
            tracing::warn!(
                "Spawn search hit radius cap {} with {}/{} locations",
                constraints.max_search_radius,
                accepted.len(),
                count
            );
            SpawnResult::Partial {
                locations: accepted,
                requested: count,
            }
        }
    }

    /// Acceptable tiles of one chunk ring, best first.
    fn ring_candidates(
        &self,
        center: ChunkCoord,
        radius: u32,
        constraints: &SpawnConstraints,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for coord in center.ring(radius) {
            let chunk = self.store.get_chunk(coord);
            for tile in chunk.tiles() {
                if constraints.accepts(tile.biome) {
                    let dx = i64::from(tile.coord.x) - i64::from(constraints.origin.x);
                    let dy = i64::from(tile.coord.y) - i64::from(constraints.origin.y);
                    candidates.push(Candidate {
                        coord: tile.coord,
                        rank: tile.biome.spawn_rank(),
                        dist_sq: dx * dx + dy * dy,
                        discovered: candidates.len(),
                    });
                }
            }
        }
        candidates.sort_unstable_by_key(|c| (c.rank, c.dist_sq, c.discovered));
        candidates
    }
}

#[allow(clippy::cast_precision_loss)]
fn squared_distance(a: Coord, b: Coord) -> f64 {
    let dx = i64::from(a.x) - i64::from(b.x);
    let dy = i64::from(a.y) - i64::from(b.y);
    (dx * dx + dy * dy) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;

    fn store() -> ChunkStore {
        let config = WorldConfig::new(42).with_chunk_size(16).with_capacity(16);
        ChunkStore::in_memory(&config).expect("valid config")
    }

    #[test]
    fn test_spawns_are_passable_and_separated() {
        let store = store();
        let constraints = SpawnConstraints::default();
        let result = SpawnLocator::new(&store).find_spawn_locations(12, &constraints);

        assert!(result.is_complete());
        let spots = result.locations();
        assert_eq!(spots.len(), 12);
        for (i, a) in spots.iter().enumerate() {
            assert!(store.get_tile(*a).passable);
            for b in &spots[i + 1..] {
                assert!(a.distance(*b) >= 3.0, "{a:?} and {b:?} too close");
            }
        }
    }

    #[test]
    fn test_search_is_deterministic() {
        let constraints = SpawnConstraints::default().with_origin(Coord::new(100, -40));
        let a = SpawnLocator::new(&store()).find_spawn_locations(8, &constraints);
        let b = SpawnLocator::new(&store()).find_spawn_locations(8, &constraints);
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_count_is_complete() {
        let store = store();
        let result = SpawnLocator::new(&store).find_spawn_locations(0, &SpawnConstraints::default());
        assert_eq!(result, SpawnResult::Complete(Vec::new()));
        assert_eq!(store.stats().resident_count, 0);
    }

    #[test]
    fn test_radius_cap_gives_partial_result() {
        let store = store();
        // One 16x16 chunk cannot hold 1000 tiles three apart.
        let constraints = SpawnConstraints::default().with_max_radius(0);
        let result = SpawnLocator::new(&store).find_spawn_locations(1000, &constraints);

        match result {
            SpawnResult::Partial { locations, requested } => {
                assert_eq!(requested, 1000);
                assert!(locations.len() < 1000);
            }
            SpawnResult::Complete(_) => panic!("expected a partial result"),
        }
    }

    #[test]
    fn test_unacceptable_biomes_are_skipped() {
        let store = store();
        let only_urban = SpawnConstraints::default()
            .with_biomes(&[Biome::Urban, Biome::Water])
            .with_max_radius(1);
        let result = SpawnLocator::new(&store).find_spawn_locations(3, &only_urban);

        assert!(!result.is_complete());
        assert!(result.locations().is_empty());
    }

    #[test]
    fn test_preferred_biome_first_within_ring() {
        let store = store();
        let constraints = SpawnConstraints::default().with_max_radius(0);
        let result = SpawnLocator::new(&store).find_spawn_locations(5, &constraints);

        let ranks: Vec<u8> = result
            .locations()
            .iter()
            .map(|c| store.get_tile(*c).biome.spawn_rank())
            .collect();
        let mut sorted = ranks.clone();
        sorted.sort_unstable();
        assert_eq!(ranks, sorted);
    }
}
