//! # Tessera Procedural Generation
//!
//! Deterministic tile generation for an unbounded, reproducible world.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed and coordinate always produce the same tile
//! 2. **Seamless**: Fields are sampled by absolute coordinate, so chunk borders
//!    need no special handling
//! 3. **Stateless**: Probability-gated features use coordinate hashes, never a
//!    mutable RNG, so regeneration after eviction is exact
//!
//! ## Core Components
//!
//! - [`NoiseField`]: octaved simplex noise remapped to [0, 1]
//! - [`BiomeClassifier`]: ordered rule table from climate to [`Biome`]
//! - [`TerrainGenerator`]: world coordinate to fully populated [`Tile`]
//! - [`Chunk`]: a square tile grid plus its snapshot codec
//!
//! ## Example
//!
//! ```rust
//! use tessera_procedural::{ChunkCoord, Coord, TerrainGenerator, WorldSeed};
//!
//! let generator = TerrainGenerator::with_seed(WorldSeed::new(12345));
//! let tile = generator.generate(Coord::new(100, -200));
//! assert_eq!(tile, generator.generate(Coord::new(100, -200)));
//!
//! let chunk = generator.generate_chunk(ChunkCoord::new(3, -7), 32);
//! assert_eq!(chunk.tiles().len(), 32 * 32);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod biome;
pub mod chunk;
pub mod noise;
pub mod terrain;

pub use biome::{Biome, BiomeClassifier, BiomeRule, BiomeThresholds, Surface};
pub use chunk::{Chunk, ChunkCoord, Coord, SnapshotError};
pub use noise::{Climate, ClimateFields, NoiseField, NoiseParams, SimplexNoise, WorldSeed};
pub use terrain::{Decoration, TerrainGenerator, Tile};
