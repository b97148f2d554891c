//! # World Configuration
//!
//! Supplied once at construction, never changed afterwards. Loaded from TOML:
//!
//! ```toml
//! seed = 42
//! chunk_size = 32
//! cache_capacity = 100
//!
//! [terrain]
//! water = 0.30
//! mountain = 0.75
//!
//! [navigation]
//! connectivity = "eight"
//! max_expanded_nodes = 10000
//!
//! [spawn]
//! min_separation = 3.0
//! max_search_radius = 8
//! ```
//!
//! Every key except `seed` is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_procedural::{BiomeThresholds, Coord, WorldSeed};

use crate::error::ConfigError;

/// Largest accepted chunk edge, in tiles.
pub const MAX_CHUNK_SIZE: u32 = 1024;

/// Neighbourhood used for movement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Orthogonal moves only.
    #[default]
    Four,
    /// Orthogonal and diagonal moves.
    Eight,
}

/// Pathfinding settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Movement neighbourhood.
    pub connectivity: Connectivity,
    /// A* gives up after expanding this many nodes.
    pub max_expanded_nodes: usize,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Four,
            max_expanded_nodes: 10_000,
        }
    }
}

/// Spawn search settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Minimum Euclidean distance between two accepted spawns.
    pub min_separation: f64,
    /// Largest chunk ring searched around the origin.
    pub max_search_radius: u32,
    /// Tile the search starts from.
    pub origin_x: i32,
    /// Tile the search starts from.
    pub origin_y: i32,
}

impl SpawnConfig {
    /// Search origin as a coordinate.
    #[must_use]
    pub const fn origin(&self) -> Coord {
        Coord::new(self.origin_x, self.origin_y)
    }
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            min_separation: 3.0,
            max_search_radius: 8,
            origin_x: 0,
            origin_y: 0,
        }
    }
}

const fn default_chunk_size() -> u32 {
    32
}

const fn default_cache_capacity() -> usize {
    100
}

/// Complete world configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Sole source of procedural determinism.
    pub seed: u64,
    /// Chunk edge length in tiles.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    /// Maximum number of resident chunks.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Biome classification thresholds.
    #[serde(default)]
    pub terrain: BiomeThresholds,
    /// Pathfinding settings.
    #[serde(default)]
    pub navigation: NavigationConfig,
    /// Spawn search settings.
    #[serde(default)]
    pub spawn: SpawnConfig,
}

impl WorldConfig {
    /// Default configuration for a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            chunk_size: default_chunk_size(),
            cache_capacity: default_cache_capacity(),
            terrain: BiomeThresholds::default(),
            navigation: NavigationConfig::default(),
            spawn: SpawnConfig::default(),
        }
    }

    /// Sets chunk size.
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets cache capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Sets the movement neighbourhood.
    #[must_use]
    pub const fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.navigation.connectivity = connectivity;
        self
    }

    /// The world seed.
    #[must_use]
    pub const fn world_seed(&self) -> WorldSeed {
        WorldSeed::new(self.seed)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] on out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`WorldConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks every range constraint.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint as [`ConfigError::Invalid`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_owned(),
            })
        };

        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return invalid("chunk_size", "must be in 1..=1024");
        }
        if self.cache_capacity == 0 {
            return invalid("cache_capacity", "must be at least 1");
        }

        let t = &self.terrain;
        let unit = [
            ("terrain.water", t.water),
            ("terrain.mountain", t.mountain),
            ("terrain.desert_temperature", t.desert_temperature),
            ("terrain.desert_moisture", t.desert_moisture),
            ("terrain.forest_moisture", t.forest_moisture),
            ("terrain.village_chance", t.village_chance),
            ("terrain.farmland_chance", t.farmland_chance),
        ];
        for (field, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return invalid(field, "must be in [0, 1]");
            }
        }
        if t.water >= t.mountain {
            return invalid("terrain.water", "must be below terrain.mountain");
        }
        if t.village_chance + t.farmland_chance > 1.0 {
            return invalid("terrain.farmland_chance", "village + farmland chance exceeds 1");
        }

        if self.navigation.max_expanded_nodes == 0 {
            return invalid("navigation.max_expanded_nodes", "must be at least 1");
        }
        let separation = self.spawn.min_separation;
        if !separation.is_finite() || separation < 0.0 {
            return invalid("spawn.min_separation", "must be a finite, non-negative distance");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config = WorldConfig::from_toml_str("seed = 42").expect("valid config");
        assert_eq!(config, WorldConfig::new(42));
        assert_eq!(config.chunk_size, 32);
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.navigation.connectivity, Connectivity::Four);
    }

    #[test]
    fn test_full_toml() {
        let config = WorldConfig::from_toml_str(
            r#"
            seed = 7
            chunk_size = 16
            cache_capacity = 4

            [terrain]
            water = 0.25

            [navigation]
            connectivity = "eight"
            max_expanded_nodes = 500

            [spawn]
            min_separation = 5.0
            origin_x = -10
            "#,
        )
        .expect("valid config");

        assert_eq!(config.chunk_size, 16);
        assert_eq!(config.cache_capacity, 4);
        assert!((config.terrain.water - 0.25).abs() < f64::EPSILON);
        assert!((config.terrain.mountain - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.navigation.connectivity, Connectivity::Eight);
        assert_eq!(config.navigation.max_expanded_nodes, 500);
        assert_eq!(config.spawn.origin(), Coord::new(-10, 0));
        assert_eq!(config.spawn.max_search_radius, 8);
    }

    #[test]
    fn test_missing_seed_is_a_parse_error() {
        assert!(matches!(
            WorldConfig::from_toml_str("chunk_size = 32"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validation_rejects_bad_ranges() {
        let cases = [
            (WorldConfig::new(1).with_chunk_size(0), "chunk_size"),
            (WorldConfig::new(1).with_chunk_size(4096), "chunk_size"),
            (WorldConfig::new(1).with_capacity(0), "cache_capacity"),
        ];
        for (config, expected) in cases {
            match config.validate() {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected invalid {expected}, got {other:?}"),
            }
        }

        let mut inverted = WorldConfig::new(1);
        inverted.terrain.water = 0.9;
        assert!(inverted.validate().is_err());

        let mut greedy = WorldConfig::new(1);
        greedy.terrain.village_chance = 0.6;
        greedy.terrain.farmland_chance = 0.6;
        assert!(greedy.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("world.toml");
        std::fs::write(&path, "seed = 3\ncache_capacity = 9\n").expect("write config");

        let config = WorldConfig::load(&path).expect("load config");
        assert_eq!(config.seed, 3);
        assert_eq!(config.cache_capacity, 9);

        assert!(matches!(
            WorldConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
