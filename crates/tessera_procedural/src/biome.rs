//! # Biome Classification
//!
//! Determines terrain type from climate samples.
//!
//! Classification is a declarative, ordered rule table evaluated top to
//! bottom; the first matching rule wins. A secondary, hash-driven pass turns
//! a share of Plains into settlements (Village, Farmland).

use serde::{Deserialize, Serialize};

use crate::noise::Climate;

/// Biome types in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Biome {
    /// Open water. Never passable.
    Water = 0,
    /// Grassland.
    Plains = 1,
    /// Woodland.
    Forest = 2,
    /// Hot, dry sand.
    Desert = 3,
    /// High ground. Never passable.
    Mountains = 4,
    /// Settlement carved out of plains.
    Village = 5,
    /// Cultivated plains.
    Farmland = 6,
    /// Dense settlement. Part of the closed set but not produced by generation.
    Urban = 7,
}

impl Biome {
    /// Every biome, in discriminant order.
    pub const ALL: [Self; 8] = [
        Self::Water,
        Self::Plains,
        Self::Forest,
        Self::Desert,
        Self::Mountains,
        Self::Village,
        Self::Farmland,
        Self::Urban,
    ];

    /// Returns whether agents may stand on this biome.
    ///
    /// Mountains are hard-impassable, like water.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        !matches!(self, Self::Water | Self::Mountains)
    }

    /// Preference rank for spawning (lower is better).
    #[must_use]
    pub const fn spawn_rank(self) -> u8 {
        match self {
            Self::Plains => 0,
            Self::Village => 1,
            Self::Farmland => 2,
            _ => 3,
        }
    }

    /// Returns the ground surface rendered for this biome.
    #[must_use]
    pub const fn surface(self) -> Surface {
        match self {
            Self::Water => Surface::Water,
            Self::Plains | Self::Forest => Surface::Grass,
            Self::Desert => Surface::Sand,
            Self::Mountains => Surface::Rock,
            Self::Village => Surface::StonePath,
            Self::Farmland => Surface::Soil,
            Self::Urban => Surface::Pavement,
        }
    }

    /// Converts from u8.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Water),
            1 => Some(Self::Plains),
            2 => Some(Self::Forest),
            3 => Some(Self::Desert),
            4 => Some(Self::Mountains),
            5 => Some(Self::Village),
            6 => Some(Self::Farmland),
            7 => Some(Self::Urban),
            _ => None,
        }
    }
}

/// Ground material under a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Water.
    Water,
    /// Grass.
    Grass,
    /// Sand.
    Sand,
    /// Bare rock.
    Rock,
    /// Paved village path.
    StonePath,
    /// Tilled soil.
    Soil,
    /// City pavement.
    Pavement,
}

/// Classification thresholds. All climate values live in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeThresholds {
    /// Elevation below this is Water.
    pub water: f64,
    /// Elevation above this is Mountains.
    pub mountain: f64,
    /// Temperature above this (with low moisture) is Desert.
    pub desert_temperature: f64,
    /// Moisture below this (with high temperature) is Desert.
    pub desert_moisture: f64,
    /// Moisture above this is Forest.
    pub forest_moisture: f64,
    /// Share of Plains turned into Village.
    pub village_chance: f64,
    /// Share of Plains turned into Farmland.
    pub farmland_chance: f64,
}

impl Default for BiomeThresholds {
    fn default() -> Self {
        Self {
            water: 0.30,
            mountain: 0.75,
            desert_temperature: 0.70,
            desert_moisture: 0.30,
            forest_moisture: 0.70,
            village_chance: 0.05,
            farmland_chance: 0.10,
        }
    }
}

/// One row of the classification table.
#[derive(Clone, Copy)]
pub struct BiomeRule {
    /// Biome produced when the predicate holds.
    pub biome: Biome,
    /// Predicate over the climate sample.
    pub predicate: fn(&Climate, &BiomeThresholds) -> bool,
}

impl std::fmt::Debug for BiomeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiomeRule").field("biome", &self.biome).finish_non_exhaustive()
    }
}

fn is_water(c: &Climate, t: &BiomeThresholds) -> bool {
    c.elevation < t.water
}

fn is_mountain(c: &Climate, t: &BiomeThresholds) -> bool {
    c.elevation > t.mountain
}

fn is_desert(c: &Climate, t: &BiomeThresholds) -> bool {
    c.temperature > t.desert_temperature && c.moisture < t.desert_moisture
}

fn is_forest(c: &Climate, t: &BiomeThresholds) -> bool {
    c.moisture > t.forest_moisture
}

/// Ordered classification table; first match wins, Plains is the fallback.
const RULES: [BiomeRule; 4] = [
    BiomeRule { biome: Biome::Water, predicate: is_water },
    BiomeRule { biome: Biome::Mountains, predicate: is_mountain },
    BiomeRule { biome: Biome::Desert, predicate: is_desert },
    BiomeRule { biome: Biome::Forest, predicate: is_forest },
];

/// Biome classifier over climate samples.
#[derive(Clone, Debug)]
pub struct BiomeClassifier {
    thresholds: BiomeThresholds,
}

impl BiomeClassifier {
    /// Creates a classifier with the given thresholds.
    #[must_use]
    pub const fn new(thresholds: BiomeThresholds) -> Self {
        Self { thresholds }
    }

    /// The ordered rule table.
    #[must_use]
    pub fn rules() -> &'static [BiomeRule] {
        &RULES
    }

    /// Returns the thresholds in use.
    #[must_use]
    pub const fn thresholds(&self) -> &BiomeThresholds {
        &self.thresholds
    }

    /// Classifies a climate sample without the settlement pass.
    #[must_use]
    pub fn classify_climate(&self, climate: &Climate) -> Biome {
        RULES
            .iter()
            .find(|rule| (rule.predicate)(climate, &self.thresholds))
            .map_or(Biome::Plains, |rule| rule.biome)
    }

    /// Classifies a climate sample, then applies the settlement pass.
    ///
    /// `settlement_roll` is a uniform value in `[0, 1)` that must be derived
    /// from the tile's coordinate and the world seed.
    #[must_use]
    pub fn classify(&self, climate: &Climate, settlement_roll: f64) -> Biome {
        match self.classify_climate(climate) {
            Biome::Plains => self.settle(settlement_roll),
            other => other,
        }
    }

    /// Maps a roll onto Village / Farmland / Plains.
    fn settle(&self, roll: f64) -> Biome {
        let t = &self.thresholds;
        if roll < t.village_chance {
            Biome::Village
        } else if roll < t.village_chance + t.farmland_chance {
            Biome::Farmland
        } else {
            Biome::Plains
        }
    }
}

impl Default for BiomeClassifier {
    fn default() -> Self {
        Self::new(BiomeThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn climate(elevation: f64, moisture: f64, temperature: f64) -> Climate {
        Climate { elevation, moisture, temperature }
    }

    #[test]
    fn test_water_wins_first() {
        let classifier = BiomeClassifier::default();
        // Hot and dry, but below sea level.
        assert_eq!(classifier.classify_climate(&climate(0.29, 0.1, 0.9)), Biome::Water);
    }

    #[test]
    fn test_mountains_before_climate_rules() {
        let classifier = BiomeClassifier::default();
        assert_eq!(classifier.classify_climate(&climate(0.8, 0.9, 0.9)), Biome::Mountains);
    }

    #[test]
    fn test_desert_needs_heat_and_dryness() {
        let classifier = BiomeClassifier::default();
        assert_eq!(classifier.classify_climate(&climate(0.5, 0.2, 0.8)), Biome::Desert);
        assert_eq!(classifier.classify_climate(&climate(0.5, 0.2, 0.6)), Biome::Plains);
        assert_eq!(classifier.classify_climate(&climate(0.5, 0.5, 0.8)), Biome::Plains);
    }

    #[test]
    fn test_forest_and_plains_fallback() {
        let classifier = BiomeClassifier::default();
        assert_eq!(classifier.classify_climate(&climate(0.5, 0.8, 0.5)), Biome::Forest);
        assert_eq!(classifier.classify_climate(&climate(0.5, 0.5, 0.5)), Biome::Plains);
    }

    #[test]
    fn test_threshold_boundaries_are_strict() {
        let classifier = BiomeClassifier::default();
        assert_eq!(classifier.classify_climate(&climate(0.30, 0.5, 0.5)), Biome::Plains);
        assert_eq!(classifier.classify_climate(&climate(0.75, 0.5, 0.5)), Biome::Plains);
    }

    #[test]
    fn test_settlement_pass_only_touches_plains() {
        let classifier = BiomeClassifier::default();
        let plains = climate(0.5, 0.5, 0.5);
        let forest = climate(0.5, 0.9, 0.5);

        assert_eq!(classifier.classify(&plains, 0.01), Biome::Village);
        assert_eq!(classifier.classify(&plains, 0.07), Biome::Farmland);
        assert_eq!(classifier.classify(&plains, 0.5), Biome::Plains);
        assert_eq!(classifier.classify(&forest, 0.01), Biome::Forest);
    }

    #[test]
    fn test_passability() {
        assert!(!Biome::Water.is_passable());
        assert!(!Biome::Mountains.is_passable());
        for biome in [Biome::Plains, Biome::Forest, Biome::Desert, Biome::Village, Biome::Farmland, Biome::Urban] {
            assert!(biome.is_passable(), "{biome:?} should be passable");
        }
    }

    #[test]
    fn test_u8_conversion_covers_all() {
        for biome in Biome::ALL {
            assert_eq!(Biome::from_u8(biome as u8), Some(biome));
        }
        assert_eq!(Biome::from_u8(8), None);
    }

    #[test]
    fn test_spawn_rank_order() {
        assert!(Biome::Plains.spawn_rank() < Biome::Village.spawn_rank());
        assert!(Biome::Village.spawn_rank() < Biome::Farmland.spawn_rank());
        assert!(Biome::Farmland.spawn_rank() < Biome::Forest.spawn_rank());
    }
}
