//! # Tessera World
//!
//! A memory-bounded view of an unbounded procedural world.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              NavigableWorld                   │
//! │   tile_at · neighbors · find_path · spawns    │
//! └───────────────────────┬──────────────────────┘
//!                         │
//! ┌───────────────────────▼──────────────────────┐
//! │                 ChunkStore                    │
//! │   LRU (capacity) · dirty tracking · stats     │
//! └──────────┬─────────────────────────┬─────────┘
//!            │ miss                    │ evict dirty
//! ┌──────────▼──────────┐   ┌──────────▼─────────┐
//! │  TerrainGenerator   │   │   ChunkStorage     │
//! │  (pure, seeded)     │   │   put / get        │
//! └─────────────────────┘   └────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! 1. Resident chunks never exceed the configured capacity
//! 2. Any tile reads the same before and after its chunk is evicted and
//!    reloaded (mutations included, if the snapshot write succeeded)
//! 3. Persistence failures are logged and counted, never returned
//!
//! ## Example
//!
//! ```rust
//! use tessera_procedural::Coord;
//! use tessera_world::{NavigableWorld, WorldConfig};
//!
//! let config = WorldConfig::new(42).with_capacity(16);
//! let world = NavigableWorld::in_memory(&config).unwrap();
//!
//! let spawns = world.find_spawn_locations(4);
//! if let [a, b, ..] = spawns.locations() {
//!     let _ = world.find_path(*a, *b);
//! }
//! assert!(world.stats().resident_count <= 16);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod navigation;
pub mod spawn;
pub mod storage;
pub mod store;

pub use config::{Connectivity, NavigationConfig, SpawnConfig, WorldConfig, MAX_CHUNK_SIZE};
pub use error::{ConfigError, WorldError, WorldResult};
pub use navigation::{find_path_with, heuristic, NavigableWorld, Path, PathError};
pub use spawn::{SpawnConstraints, SpawnLocator, SpawnResult};
pub use storage::{ChunkStorage, DirectoryStorage, MemoryStorage};
pub use store::{CacheStats, ChunkStore, EvictionReport, TileArea};
