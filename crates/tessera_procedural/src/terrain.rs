//! # Terrain Generation
//!
//! `generate(seed, coordinate) -> Tile` as a pure function.
//!
//! ## Pipeline
//!
//! 1. Sample elevation, moisture and temperature at the absolute coordinate
//! 2. Run the ordered biome rule table
//! 3. Roll the settlement pass from a coordinate hash (no RNG state)
//! 4. Derive passability, surface variant
//!
//! The same seed and coordinate always give a bit-identical [`Tile`], no
//! matter which chunks were generated, evicted or restored before.

use crate::biome::{Biome, BiomeClassifier, BiomeThresholds, Surface};
use crate::chunk::{Chunk, ChunkCoord, Coord};
use crate::noise::{ClimateFields, WorldSeed};

/// Something placed on a tile by a collaborator (building, crop, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Decoration {
    /// Flowers.
    Flower = 1,
    /// A loose rock.
    Rock = 2,
    /// A bush.
    Bush = 3,
    /// A tree.
    Tree = 4,
    /// A cactus.
    Cactus = 5,
    /// A house.
    House = 6,
    /// A shop.
    Shop = 7,
    /// A well.
    Well = 8,
    /// A planted crop.
    Crop = 9,
    /// Any other placed structure.
    Structure = 10,
}

impl Decoration {
    /// Snapshot code for an optional decoration (0 = none).
    #[must_use]
    pub const fn code(decoration: Option<Self>) -> u16 {
        match decoration {
            Some(d) => d as u16,
            None => 0,
        }
    }

    /// Decodes a snapshot code. `Err` carries the unknown code.
    ///
    /// # Errors
    ///
    /// Returns the raw code if it names no decoration.
    pub const fn from_code(code: u16) -> Result<Option<Self>, u16> {
        Ok(Some(match code {
            0 => return Ok(None),
            1 => Self::Flower,
            2 => Self::Rock,
            3 => Self::Bush,
            4 => Self::Tree,
            5 => Self::Cactus,
            6 => Self::House,
            7 => Self::Shop,
            8 => Self::Well,
            9 => Self::Crop,
            10 => Self::Structure,
            other => return Err(other),
        }))
    }
}

/// A single grid cell.
///
/// Everything except `decoration` is fixed at generation time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tile {
    /// World coordinate of this tile.
    pub coord: Coord,
    /// Terrain category.
    pub biome: Biome,
    /// Elevation in [0, 1].
    pub elevation: f32,
    /// Moisture in [0, 1].
    pub moisture: f32,
    /// Temperature in [0, 1].
    pub temperature: f32,
    /// Whether agents may stand here.
    pub passable: bool,
    /// Cosmetic surface variant in `0..Tile::VARIANTS`.
    pub variant: u8,
    /// Collaborator-owned slot.
    pub decoration: Option<Decoration>,
}

impl Tile {
    /// Number of cosmetic surface variants.
    pub const VARIANTS: u8 = 4;

    /// Ground surface under this tile.
    #[must_use]
    pub const fn surface(&self) -> Surface {
        self.biome.surface()
    }

    /// True when the immutable, generated part of two tiles matches.
    #[must_use]
    pub fn same_base(&self, other: &Self) -> bool {
        Self { decoration: None, ..*self } == Self { decoration: None, ..*other }
    }
}

/// Pure terrain generator for one world seed.
#[derive(Clone)]
pub struct TerrainGenerator {
    seed: WorldSeed,
    climate: ClimateFields,
    classifier: BiomeClassifier,
}

impl TerrainGenerator {
    /// Salt for the Plains -> settlement roll.
    const SETTLEMENT_SALT: u64 = 0x5e77_1e;
    /// Salt for the cosmetic variant roll.
    const VARIANT_SALT: u64 = 0x7a_1a47;

    /// Creates a generator.
    #[must_use]
    pub fn new(seed: WorldSeed, thresholds: BiomeThresholds) -> Self {
        Self {
            seed,
            climate: ClimateFields::new(seed),
            classifier: BiomeClassifier::new(thresholds),
        }
    }

    /// Creates a generator with default thresholds.
    #[must_use]
    pub fn with_seed(seed: WorldSeed) -> Self {
        Self::new(seed, BiomeThresholds::default())
    }

    /// The world seed.
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// The classifier in use.
    #[must_use]
    pub const fn classifier(&self) -> &BiomeClassifier {
        &self.classifier
    }

    /// The climate fields in use.
    #[must_use]
    pub const fn climate(&self) -> &ClimateFields {
        &self.climate
    }

    /// Generates the tile at a world coordinate.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn generate(&self, coord: Coord) -> Tile {
        let climate = self.climate.sample(coord.x, coord.y);
        let roll = self.seed.hash_unit(coord.x, coord.y, Self::SETTLEMENT_SALT);
        let biome = self.classifier.classify(&climate, roll);
        let variant = (self.seed.hash_coord(coord.x, coord.y, Self::VARIANT_SALT)
            % u64::from(Tile::VARIANTS)) as u8;

        Tile {
            coord,
            biome,
            elevation: climate.elevation as f32,
            moisture: climate.moisture as f32,
            temperature: climate.temperature as f32,
            passable: biome.is_passable(),
            variant,
            decoration: None,
        }
    }

    /// Generates every tile of a chunk (row-major, `y` outer).
    #[must_use]
    pub fn generate_chunk(&self, coord: ChunkCoord, chunk_size: u32) -> Chunk {
        let tiles = coord.tiles(chunk_size).map(|c| self.generate(c)).collect();
        Chunk::from_tiles(coord, chunk_size, tiles)
    }
}
