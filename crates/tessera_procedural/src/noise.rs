//! # Noise Fields
//!
//! Deterministic, continuous pseudo-random sampling.
//!
//! ## Layers
//!
//! - [`SimplexNoise`]: a single 2D simplex lattice, values in [-1, 1]
//! - [`NoiseField`]: octaved simplex remapped to [0, 1] at a fixed scale
//! - [`ClimateFields`]: the three decorrelated fields terrain is built from
//!
//! ## Determinism Guarantee
//!
//! Given the same [`WorldSeed`], every sampler here produces **exactly** the
//! same values on any platform, any time, in any access order. Sampling is
//! always by absolute world coordinate, which is what makes chunk borders
//! seamless without any border handling.

use serde::{Deserialize, Serialize};

/// Seed of one world. Every generated value is a function of this and a
/// coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Wraps a raw seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Raw seed.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Sub-seed for one purpose, such as a single climate field.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mixed = (self.0 ^ purpose).wrapping_mul(0x517c_c1b7_2722_0a95);
        Self(mixed ^ (mixed >> 32))
    }

    /// Hashes a world coordinate into a 64-bit value.
    ///
    /// `salt` separates independent decisions made for the same tile.
    #[inline]
    #[must_use]
    pub const fn hash_coord(self, x: i32, y: i32, salt: u64) -> u64 {
        let packed = (x as u32 as u64) | ((y as u32 as u64) << 32);
        let mut hash = mix64(packed);
        hash ^= self.0;
        hash ^= salt.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        mix64(hash)
    }

    /// Maps a world coordinate to a uniform value in `[0, 1)`.
    ///
    /// Stateless replacement for an RNG draw: the answer depends only on
    /// `(seed, x, y, salt)`, never on how many draws came before.
    #[inline]
    #[must_use]
    pub fn hash_unit(self, x: i32, y: i32, salt: u64) -> f64 {
        // Top 53 bits fill an f64 mantissa exactly.
        (self.hash_coord(x, y, salt) >> 11) as f64 / (1u64 << 53) as f64
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(0xDEAD_BEEF_CAFE_BABE)
    }
}

impl From<u64> for WorldSeed {
    fn from(seed: u64) -> Self {
        Self(seed)
    }
}

/// `SplitMix64` finalizer.
#[inline]
const fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Seeded lattice hash: a shuffled 0..=255, stored twice so `a + perm[b]`
/// never needs a bounds wrap.
#[derive(Clone)]
struct PermutationTable {
    perm: [u8; 512],
}

impl PermutationTable {
    /// Corner gradients, indexed by `hash % 12`.
    #[rustfmt::skip]
    const GRADIENTS: [[i8; 2]; 12] = [
        [1, 0], [1, 1], [0, 1], [-1, 1],
        [-1, 0], [-1, -1], [0, -1], [1, -1],
        [1, 0], [0, 1], [-1, 0], [0, -1],
    ];

    #[allow(clippy::cast_possible_truncation)]
    fn new(seed: WorldSeed) -> Self {
        let mut perm = [0u8; 512];

        for (i, slot) in perm.iter_mut().take(256).enumerate() {
            *slot = i as u8;
        }

        // Fisher-Yates shuffle driven by xorshift64. A zero state would never
        // advance, so it is nudged onto a non-zero one.
        let mut state = seed.value() | 1;
        for i in (1..256usize).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            perm.swap(i, (state % (i as u64 + 1)) as usize);
        }

        perm.copy_within(0..256, 256);
        Self { perm }
    }

    #[inline]
    fn get(&self, index: usize) -> u8 {
        self.perm[index & 511]
    }

    #[inline]
    fn gradient(hash: u8) -> [i8; 2] {
        Self::GRADIENTS[(hash % 12) as usize]
    }
}

/// Two-dimensional simplex noise in [-1, 1].
///
/// # Example
///
/// ```rust
/// use tessera_procedural::{SimplexNoise, WorldSeed};
///
/// let simplex = SimplexNoise::new(WorldSeed::new(42));
/// assert!((-1.0..=1.0).contains(&simplex.sample(12.25, -3.5)));
/// ```
#[derive(Clone)]
pub struct SimplexNoise {
    lattice: PermutationTable,
}

impl SimplexNoise {
    /// (sqrt(3) - 1) / 2
    const F2: f64 = 0.366_025_403_784_439;
    /// (3 - sqrt(3)) / 6
    const G2: f64 = 0.211_324_865_405_187;

    /// Shuffles a lattice for `seed`.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            lattice: PermutationTable::new(seed),
        }
    }

    /// Noise value at a point, in [-1, 1].
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        // Cell containing the point, in skewed space.
        let s = (x + y) * Self::F2;
        let (cx, cy) = (fast_floor(x + s), fast_floor(y + s));

        // Offsets from the three triangle corners.
        let t = f64::from(cx + cy) * Self::G2;
        let (dx0, dy0) = (x - (f64::from(cx) - t), y - (f64::from(cy) - t));
        let (ox, oy): (i32, i32) = if dx0 > dy0 { (1, 0) } else { (0, 1) };
        let (dx1, dy1) = (dx0 - f64::from(ox) + Self::G2, dy0 - f64::from(oy) + Self::G2);
        let (dx2, dy2) = (dx0 - 1.0 + 2.0 * Self::G2, dy0 - 1.0 + 2.0 * Self::G2);

        let (lx, ly) = ((cx & 255) as usize, (cy & 255) as usize);
        let (ox, oy) = (ox as usize, oy as usize);
        let lattice = &self.lattice;
        let h0 = lattice.get(lx + lattice.get(ly) as usize);
        let h1 = lattice.get(lx + ox + lattice.get(ly + oy) as usize);
        let h2 = lattice.get(lx + 1 + lattice.get(ly + 1) as usize);

        let sum = Self::corner(dx0, dy0, h0) + Self::corner(dx1, dy1, h1) + Self::corner(dx2, dy2, h2);
        (70.0 * sum).clamp(-1.0, 1.0)
    }

    /// Radially attenuated gradient ramp of one corner.
    #[inline]
    fn corner(dx: f64, dy: f64, hash: u8) -> f64 {
        let falloff = 0.5 - dx * dx - dy * dy;
        if falloff <= 0.0 {
            return 0.0;
        }
        let [gx, gy] = PermutationTable::gradient(hash);
        falloff.powi(4) * (dx * f64::from(gx) + dy * f64::from(gy))
    }

    /// Fractal sum of `octaves` layers.
    ///
    /// Frequency doubles each octave; amplitude is scaled by `persistence`.
    /// The sum is normalized by the total amplitude, so the result stays in
    /// [-1, 1].
    #[must_use]
    pub fn octaved(&self, x: f64, y: f64, octaves: u32, persistence: f64) -> f64 {
        let (mut sum, mut weight) = (0.0, 0.0);
        let (mut amplitude, mut frequency) = (1.0, 1.0);

        for _ in 0..octaves.max(1) {
            sum += amplitude * self.sample(x * frequency, y * frequency);
            weight += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }

        sum / weight
    }
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn fast_floor(v: f64) -> i32 {
    let truncated = v as i32;
    truncated - i32::from(v < f64::from(truncated))
}

/// Shape of one octaved noise field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseParams {
    /// World-to-noise coordinate scale (smaller = broader features).
    pub scale: f64,
    /// Number of octaves summed.
    pub octaves: u32,
    /// Amplitude multiplier applied per octave.
    pub persistence: f64,
}

impl NoiseParams {
    /// Elevation: broad continents with moderate detail.
    pub const ELEVATION: Self = Self { scale: 0.02, octaves: 4, persistence: 0.5 };
    /// Moisture: slightly busier than elevation.
    pub const MOISTURE: Self = Self { scale: 0.03, octaves: 3, persistence: 0.6 };
    /// Temperature: very broad bands.
    pub const TEMPERATURE: Self = Self { scale: 0.01, octaves: 2, persistence: 0.4 };
}

/// A seeded, octaved scalar field over world coordinates.
#[derive(Clone)]
pub struct NoiseField {
    noise: SimplexNoise,
    params: NoiseParams,
}

impl NoiseField {
    /// Creates a field from a (derived) seed and its shape.
    #[must_use]
    pub fn new(seed: WorldSeed, params: NoiseParams) -> Self {
        Self {
            noise: SimplexNoise::new(seed),
            params,
        }
    }

    /// Samples the field at an absolute world coordinate.
    ///
    /// # Returns
    ///
    /// A value in `[0, 1]`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let p = &self.params;
        let raw = self
            .noise
            .octaved(x * p.scale, y * p.scale, p.octaves, p.persistence);
        ((raw + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Returns the field's shape.
    #[must_use]
    pub const fn params(&self) -> NoiseParams {
        self.params
    }
}

/// One climate sample at a tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Climate {
    /// Elevation in [0, 1].
    pub elevation: f64,
    /// Moisture in [0, 1].
    pub moisture: f64,
    /// Temperature in [0, 1].
    pub temperature: f64,
}

/// The three independent climate fields terrain is built from.
#[derive(Clone)]
pub struct ClimateFields {
    elevation: NoiseField,
    moisture: NoiseField,
    temperature: NoiseField,
}

impl ClimateFields {
    /// Per-field purposes passed to [`WorldSeed::derive`].
    const ELEVATION_PURPOSE: u64 = 1;
    const MOISTURE_PURPOSE: u64 = 2;
    const TEMPERATURE_PURPOSE: u64 = 3;

    /// Builds the fields with the default shapes.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self::with_params(
            seed,
            NoiseParams::ELEVATION,
            NoiseParams::MOISTURE,
            NoiseParams::TEMPERATURE,
        )
    }

    /// Builds the fields with explicit shapes.
    #[must_use]
    pub fn with_params(
        seed: WorldSeed,
        elevation: NoiseParams,
        moisture: NoiseParams,
        temperature: NoiseParams,
    ) -> Self {
        Self {
            elevation: NoiseField::new(seed.derive(Self::ELEVATION_PURPOSE), elevation),
            moisture: NoiseField::new(seed.derive(Self::MOISTURE_PURPOSE), moisture),
            temperature: NoiseField::new(seed.derive(Self::TEMPERATURE_PURPOSE), temperature),
        }
    }

    /// Samples all three fields at a world tile.
    #[must_use]
    pub fn sample(&self, x: i32, y: i32) -> Climate {
        let (fx, fy) = (f64::from(x), f64::from(y));
        Climate {
            elevation: self.elevation.sample(fx, fy),
            moisture: self.moisture.sample(fx, fy),
            temperature: self.temperature.sample(fx, fy),
        }
    }

    /// Samples elevation only.
    #[must_use]
    pub fn elevation(&self, x: i32, y: i32) -> f64 {
        self.elevation.sample(f64::from(x), f64::from(y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_bits() {
        let a = SimplexNoise::new(WorldSeed::new(12345));
        let b = SimplexNoise::new(WorldSeed::new(12345));

        for i in -50..50 {
            let (x, y) = (f64::from(i) * 0.31, f64::from(i) * -0.23);
            assert_eq!(a.sample(x, y).to_bits(), b.sample(x, y).to_bits());
        }
    }

    #[test]
    fn test_seeds_disagree() {
        let a = SimplexNoise::new(WorldSeed::new(1));
        let b = SimplexNoise::new(WorldSeed::new(2));

        let differing = (0..50)
            .map(|i| f64::from(i) * 1.37 + 0.5)
            .filter(|&x| a.sample(x, x * 0.7) != b.sample(x, x * 0.7))
            .count();
        assert!(differing > 40, "only {differing}/50 samples differ");
    }

    #[test]
    fn test_sample_stays_in_range() {
        let simplex = SimplexNoise::new(WorldSeed::new(42));

        for i in 0..10_000 {
            let (x, y) = (f64::from(i) * 0.1 - 500.0, f64::from(i) * 0.13 - 650.0);
            let v = simplex.sample(x, y);
            assert!((-1.0..=1.0).contains(&v), "{v} at ({x}, {y})");
        }
    }

    #[test]
    fn test_small_steps_small_changes() {
        let simplex = SimplexNoise::new(WorldSeed::new(42));
        let here = simplex.sample(100.0, 100.0);

        assert!((here - simplex.sample(100.001, 100.0)).abs() < 0.01);
        assert!((here - simplex.sample(100.0, 100.001)).abs() < 0.01);
    }

    #[test]
    fn test_floor_handles_negatives() {
        assert_eq!(fast_floor(2.7), 2);
        assert_eq!(fast_floor(-0.5), -1);
        assert_eq!(fast_floor(-3.0), -3);
        assert_eq!(fast_floor(0.0), 0);
    }

    #[test]
    fn test_field_range_is_unit_interval() {
        let field = NoiseField::new(WorldSeed::new(7), NoiseParams::ELEVATION);

        for i in -2000..2000 {
            let value = field.sample(f64::from(i) * 3.0, f64::from(i) * -1.7);
            assert!((0.0..=1.0).contains(&value), "Field value {value} outside [0, 1]");
        }
    }

    #[test]
    fn test_climate_fields_are_decorrelated() {
        let fields = ClimateFields::new(WorldSeed::new(99));

        let mut equal = 0;
        for i in 0..500 {
            let c = fields.sample(i * 7, i * -3);
            if c.elevation == c.moisture || c.moisture == c.temperature {
                equal += 1;
            }
        }
        assert!(equal < 5, "Climate fields should be independent");
    }

    #[test]
    fn test_purposes_give_distinct_seeds() {
        let base = WorldSeed::new(42);

        assert_eq!(base.derive(1), base.derive(1));
        assert_ne!(base.derive(1), base.derive(2));
        assert_ne!(base.derive(1), base);
    }

    #[test]
    fn test_hash_unit_is_stateless_and_uniform() {
        let seed = WorldSeed::new(42);

        assert_eq!(
            seed.hash_unit(-17, 4, 9).to_bits(),
            seed.hash_unit(-17, 4, 9).to_bits()
        );
        assert_ne!(seed.hash_unit(1, 2, 0), seed.hash_unit(2, 1, 0));

        let mut below_tenth = 0;
        let total = 20_000;
        for i in 0..total {
            let v = seed.hash_unit(i % 200 - 100, i / 200 - 50, 3);
            assert!((0.0..1.0).contains(&v));
            if v < 0.1 {
                below_tenth += 1;
            }
        }
        let ratio = f64::from(below_tenth) / f64::from(total);
        assert!((0.08..0.12).contains(&ratio), "Hash should be roughly uniform: {ratio}");
    }
}
