//! # Chunk System
//!
//! The world is organized into square chunks of `chunk_size x chunk_size`
//! tiles. A chunk is the unit of loading, eviction and persistence.
//!
//! ## Snapshot Format
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic bytes `"TSCK"` |
//! | 4 | 1 | Format version (`u8`, currently 1) |
//! | 5 | 4 | Chunk size (`u32`, little-endian) |
//! | 9 | 4 | Chunk X (`i32`, little-endian) |
//! | 13 | 4 | Chunk Y (`i32`, little-endian) |
//! | 17 | 4 | Payload length (`u32`, little-endian) |
//! | 21 | N | LZ4 payload (size-prepended) of packed tile records |
//! | 21+N | 4 | CRC32 of every preceding byte |
//!
//! A tile record is 16 bytes: elevation, moisture, temperature (`f32`),
//! decoration code (`u16`), biome (`u8`), flags (`u8`: bit 0 passable,
//! bits 1-2 variant). Tile coordinates are implied by record order.

use bytemuck::{Pod, Zeroable};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use crate::biome::Biome;
use crate::terrain::{Decoration, Tile};

/// World tile coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    /// X coordinate in tiles.
    pub x: i32,
    /// Y coordinate in tiles.
    pub y: i32,
}

impl Coord {
    /// Creates a new coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this coordinate shifted by `(dx, dy)`, clamped to the grid.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Shifted coordinate, or `None` if it falls off the `i32` grid.
    #[inline]
    #[must_use]
    pub const fn checked_offset(self, dx: i32, dy: i32) -> Option<Self> {
        match (self.x.checked_add(dx), self.y.checked_add(dy)) {
            (Some(x), Some(y)) => Some(Self { x, y }),
            _ => None,
        }
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }

    /// Manhattan distance.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl From<(i32, i32)> for Coord {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
const fn clamp_to_grid(v: i64) -> i32 {
    if v < i32::MIN as i64 {
        i32::MIN
    } else if v > i32::MAX as i64 {
        i32::MAX
    } else {
        v as i32
    }
}

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not tiles).
    pub x: i32,
    /// Y coordinate (in chunks, not tiles).
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts a world tile coordinate to its chunk (floor division).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn from_tile(coord: Coord, chunk_size: u32) -> Self {
        let size = chunk_size as i32;
        Self {
            x: coord.x.div_euclid(size),
            y: coord.y.div_euclid(size),
        }
    }

    /// Returns the world coordinate of the chunk's origin (corner).
    ///
    /// Chunks past the edge of the tile grid get a clamped origin.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn origin(self, chunk_size: u32) -> Coord {
        let size = chunk_size as i32;
        Coord {
            x: self.x.saturating_mul(size),
            y: self.y.saturating_mul(size),
        }
    }

    /// Splits a world coordinate into its offset inside this chunk's grid.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub const fn local_offset(coord: Coord, chunk_size: u32) -> (usize, usize) {
        let size = chunk_size as i32;
        (
            coord.x.rem_euclid(size) as usize,
            coord.y.rem_euclid(size) as usize,
        )
    }

    /// Iterates every world coordinate of this chunk, row-major (`y` outer).
    ///
    /// A chunk that straddles the edge of the `i32` grid repeats the edge
    /// coordinate for its out-of-range cells. Power-of-two sizes never
    /// straddle.
    pub fn tiles(self, chunk_size: u32) -> impl Iterator<Item = Coord> {
        let size = i64::from(chunk_size);
        let (ox, oy) = (i64::from(self.x) * size, i64::from(self.y) * size);
        (0..size).flat_map(move |dy| {
            (0..size).map(move |dx| Coord::new(clamp_to_grid(ox + dx), clamp_to_grid(oy + dy)))
        })
    }

    /// Chunks whose Chebyshev distance from `self` is exactly `radius`.
    ///
    /// Ordered row by row; radius 0 yields `self` only.
    #[must_use]
    pub fn ring(self, radius: u32) -> Vec<Self> {
        let Ok(r) = i32::try_from(radius) else {
            return Vec::new();
        };
        if r == 0 {
            return vec![self];
        }
        let mut ring = Vec::with_capacity(8 * radius.min(1024) as usize);
        for dy in -r..=r {
            for dx in -r..=r {
                if dx.abs() != r && dy.abs() != r {
                    continue;
                }
                if let (Some(x), Some(y)) = (self.x.checked_add(dx), self.y.checked_add(dy)) {
                    ring.push(Self::new(x, y));
                }
            }
        }
        ring
    }
}

/// Errors raised while decoding a chunk snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// The data does not start with the expected magic bytes.
    #[error("invalid magic bytes")]
    InvalidMagic,
    /// The format version is not supported by this build.
    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u8),
    /// The data is shorter than its header claims.
    #[error("snapshot truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum expected byte count.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
    /// The trailing checksum does not match the content.
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the snapshot.
        stored: u32,
        /// Checksum computed over the content.
        computed: u32,
    },
    /// The payload failed to decompress or has the wrong length.
    #[error("payload decompression failed: {0}")]
    Decompress(String),
    /// Snapshot was written with a different chunk size.
    #[error("chunk size mismatch: expected {expected}, got {actual}")]
    ChunkSizeMismatch {
        /// Chunk size of this world.
        expected: u32,
        /// Chunk size recorded in the snapshot.
        actual: u32,
    },
    /// Snapshot belongs to a different chunk.
    #[error("coordinate mismatch: expected {expected:?}, got {actual:?}")]
    CoordinateMismatch {
        /// Requested chunk.
        expected: ChunkCoord,
        /// Chunk recorded in the snapshot.
        actual: ChunkCoord,
    },
    /// A tile record names an unknown biome.
    #[error("invalid biome id: {0}")]
    InvalidBiome(u8),
    /// A tile record names an unknown decoration.
    #[error("invalid decoration code: {0}")]
    InvalidDecoration(u16),
}

/// Packed, fixed-layout tile record used inside snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct TileRecord {
    elevation: f32,
    moisture: f32,
    temperature: f32,
    decoration: u16,
    biome: u8,
    flags: u8,
}

impl TileRecord {
    const PASSABLE: u8 = 0b001;
    const VARIANT_SHIFT: u8 = 1;
    const VARIANT_MASK: u8 = 0b11;

    fn pack(tile: &Tile) -> Self {
        let mut flags = (tile.variant & Self::VARIANT_MASK) << Self::VARIANT_SHIFT;
        if tile.passable {
            flags |= Self::PASSABLE;
        }
        Self {
            elevation: tile.elevation,
            moisture: tile.moisture,
            temperature: tile.temperature,
            decoration: Decoration::code(tile.decoration),
            biome: tile.biome as u8,
            flags,
        }
    }

    fn unpack(self, coord: Coord) -> Result<Tile, SnapshotError> {
        let biome = Biome::from_u8(self.biome).ok_or(SnapshotError::InvalidBiome(self.biome))?;
        let decoration =
            Decoration::from_code(self.decoration).map_err(SnapshotError::InvalidDecoration)?;
        Ok(Tile {
            coord,
            biome,
            elevation: self.elevation,
            moisture: self.moisture,
            temperature: self.temperature,
            passable: self.flags & Self::PASSABLE != 0,
            variant: (self.flags >> Self::VARIANT_SHIFT) & Self::VARIANT_MASK,
            decoration,
        })
    }
}

/// Magic bytes identifying a chunk snapshot.
const SNAPSHOT_MAGIC: &[u8; 4] = b"TSCK";

/// Current snapshot format version.
const SNAPSHOT_VERSION: u8 = 1;

/// Header length in bytes (magic + version + size + x + y + payload length).
const HEADER_LEN: usize = 4 + 1 + 4 + 4 + 4 + 4;

/// A chunk of world data.
///
/// Contains a `size x size` grid of tiles plus a dirty flag that is set by
/// every mutation and cleared once the chunk is persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    coord: ChunkCoord,
    size: u32,
    /// Tile data, indexed `[y * size + x]`.
    tiles: Vec<Tile>,
    dirty: bool,
}

impl Chunk {
    /// Wraps an already generated tile grid (row-major, `y` outer).
    ///
    /// # Panics
    ///
    /// Panics if `tiles.len() != size * size`; that is a generator defect.
    #[must_use]
    pub fn from_tiles(coord: ChunkCoord, size: u32, tiles: Vec<Tile>) -> Self {
        assert_eq!(
            tiles.len(),
            (size as usize) * (size as usize),
            "chunk {coord:?} needs {size}x{size} tiles"
        );
        Self {
            coord,
            size,
            tiles,
            dirty: false,
        }
    }

    /// Chunk position in the world.
    #[inline]
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Edge length in tiles.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// All tiles, row-major.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Gets a tile by local offset.
    #[inline]
    #[must_use]
    pub fn tile_local(&self, x: usize, y: usize) -> Option<&Tile> {
        let size = self.size as usize;
        (x < size && y < size).then(|| &self.tiles[y * size + x])
    }

    /// Gets a tile by world coordinate, if it belongs to this chunk.
    #[must_use]
    pub fn tile(&self, coord: Coord) -> Option<&Tile> {
        if ChunkCoord::from_tile(coord, self.size) != self.coord {
            return None;
        }
        let (x, y) = ChunkCoord::local_offset(coord, self.size);
        self.tile_local(x, y)
    }

    /// Biome at the chunk centre.
    #[must_use]
    pub fn dominant_biome(&self) -> Biome {
        let half = self.size as usize / 2;
        self.tile_local(half, half).map_or(Biome::Plains, |t| t.biome)
    }

    /// Whether the chunk holds mutations not yet persisted.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flags the chunk as holding unpersisted mutations.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clears the dirty flag after a successful persist.
    #[inline]
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Sets the decoration slot of a tile and marks the chunk dirty.
    ///
    /// Returns `false` if the coordinate is outside this chunk.
    pub fn set_decoration(&mut self, coord: Coord, decoration: Option<Decoration>) -> bool {
        if ChunkCoord::from_tile(coord, self.size) != self.coord {
            return false;
        }
        let (x, y) = ChunkCoord::local_offset(coord, self.size);
        let size = self.size as usize;
        self.tiles[y * size + x].decoration = decoration;
        self.dirty = true;
        true
    }

    /// Serializes the full tile grid into a snapshot.
    #[must_use]
    pub fn encode_snapshot(&self) -> Vec<u8> {
        let records: Vec<TileRecord> = self.tiles.iter().map(TileRecord::pack).collect();
        let payload = compress_prepend_size(bytemuck::cast_slice(&records));

        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + 4);
        buf.extend_from_slice(SNAPSHOT_MAGIC);
        buf.push(SNAPSHOT_VERSION);
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(&self.coord.x.to_le_bytes());
        buf.extend_from_slice(&self.coord.y.to_le_bytes());
        #[allow(clippy::cast_possible_truncation)]
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&payload);

        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Restores a chunk from a snapshot.
    ///
    /// The restored chunk is clean: its content is already durable.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the bytes are truncated, corrupted,
    /// or describe a different chunk or chunk size.
    pub fn decode_snapshot(
        data: &[u8],
        expected: ChunkCoord,
        chunk_size: u32,
    ) -> Result<Self, SnapshotError> {
        if data.len() < 4 || &data[0..4] != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic);
        }
        if data.len() < HEADER_LEN + 4 {
            return Err(SnapshotError::Truncated {
                expected: HEADER_LEN + 4,
                actual: data.len(),
            });
        }
        if data[4] != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(data[4]));
        }

        let size = read_u32(data, 5);
        let coord = ChunkCoord::new(read_i32(data, 9), read_i32(data, 13));
        let payload_len = read_u32(data, 17) as usize;
        let total = HEADER_LEN + payload_len + 4;
        if data.len() < total {
            return Err(SnapshotError::Truncated {
                expected: total,
                actual: data.len(),
            });
        }

        let stored = read_u32(data, HEADER_LEN + payload_len);
        let computed = crc32fast::hash(&data[..HEADER_LEN + payload_len]);
        if stored != computed {
            return Err(SnapshotError::ChecksumMismatch { stored, computed });
        }
        if size != chunk_size {
            return Err(SnapshotError::ChunkSizeMismatch {
                expected: chunk_size,
                actual: size,
            });
        }
        if coord != expected {
            return Err(SnapshotError::CoordinateMismatch {
                expected,
                actual: coord,
            });
        }

        let record_len = std::mem::size_of::<TileRecord>();
        let expected_bytes = (size as usize) * (size as usize) * record_len;
        let payload = &data[HEADER_LEN..HEADER_LEN + payload_len];
        // Reject bogus size prefixes before lz4 allocates for them.
        if payload.len() < 4 || read_u32(payload, 0) as usize != expected_bytes {
            return Err(SnapshotError::Decompress(format!(
                "payload does not hold {expected_bytes} bytes of tile records"
            )));
        }
        let raw = decompress_size_prepended(payload)
            .map_err(|e| SnapshotError::Decompress(e.to_string()))?;
        if raw.len() != expected_bytes {
            return Err(SnapshotError::Decompress(format!(
                "expected {expected_bytes} bytes, got {}",
                raw.len()
            )));
        }

        let tiles = raw
            .chunks_exact(record_len)
            .map(bytemuck::pod_read_unaligned::<TileRecord>)
            .zip(coord.tiles(size))
            .map(|(record, world)| record.unpack(world))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_tiles(coord, size, tiles))
    }
}

#[inline]
fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[inline]
fn read_i32(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::WorldSeed;
    use crate::terrain::TerrainGenerator;

    fn generated(coord: ChunkCoord, size: u32) -> Chunk {
        TerrainGenerator::with_seed(WorldSeed::new(42)).generate_chunk(coord, size)
    }

    #[test]
    fn test_chunk_coord_from_tile() {
        let c = |x, y| ChunkCoord::from_tile(Coord::new(x, y), 16);
        assert_eq!(c(0, 0), ChunkCoord::new(0, 0));
        assert_eq!(c(15, 15), ChunkCoord::new(0, 0));
        assert_eq!(c(16, 16), ChunkCoord::new(1, 1));
        assert_eq!(c(-1, -1), ChunkCoord::new(-1, -1));
        assert_eq!(c(-16, -16), ChunkCoord::new(-1, -1));
        assert_eq!(c(-17, -17), ChunkCoord::new(-2, -2));
    }

    #[test]
    fn test_local_offset_is_floor_based() {
        assert_eq!(ChunkCoord::local_offset(Coord::new(-1, 33), 32), (31, 1));
        assert_eq!(ChunkCoord::local_offset(Coord::new(-32, 0), 32), (0, 0));
    }

    #[test]
    fn test_tiles_cover_chunk_row_major() {
        let coords: Vec<Coord> = ChunkCoord::new(-1, 2).tiles(4).collect();
        assert_eq!(coords.len(), 16);
        assert_eq!(coords[0], Coord::new(-4, 8));
        assert_eq!(coords[1], Coord::new(-3, 8));
        assert_eq!(coords[4], Coord::new(-4, 9));
        assert_eq!(coords[15], Coord::new(-1, 11));
    }

    #[test]
    fn test_ring_sizes() {
        let center = ChunkCoord::new(3, -2);
        assert_eq!(center.ring(0), vec![center]);
        assert_eq!(center.ring(1).len(), 8);
        assert_eq!(center.ring(2).len(), 16);
        assert!(center.ring(2).iter().all(|c| (c.x - 3).abs().max((c.y + 2).abs()) == 2));
    }

    #[test]
    fn test_grid_edges_do_not_overflow() {
        let max = Coord::new(i32::MAX, i32::MIN);
        assert_eq!(max.checked_offset(1, 0), None);
        assert_eq!(max.checked_offset(0, -1), None);
        assert_eq!(max.checked_offset(-1, 1), Some(Coord::new(i32::MAX - 1, i32::MIN + 1)));
        assert_eq!(max.offset(5, -5), max);

        assert_eq!(ChunkCoord::new(i32::MAX, i32::MIN).origin(32), max);
        assert_eq!(ChunkCoord::new(i32::MAX, 0).ring(1).len(), 5);

        // 3 does not divide 2^31, so the last column straddles the edge.
        let edge = ChunkCoord::from_tile(Coord::new(i32::MAX, 0), 3);
        let chunk = generated(edge, 3);
        let tile = chunk.tile(Coord::new(i32::MAX, 0)).expect("edge tile");
        assert_eq!(tile.coord, Coord::new(i32::MAX, 0));

        let low = ChunkCoord::from_tile(Coord::new(i32::MIN, 0), 3);
        let chunk = generated(low, 3);
        let tile = chunk.tile(Coord::new(i32::MIN, 0)).expect("edge tile");
        assert_eq!(tile.coord, Coord::new(i32::MIN, 0));

        let corner = ChunkCoord::from_tile(Coord::new(i32::MIN, i32::MIN), 32);
        assert_eq!(corner.origin(32), Coord::new(i32::MIN, i32::MIN));
        assert!(generated(corner, 32).tile(Coord::new(i32::MIN, i32::MIN)).is_some());
    }

    #[test]
    fn test_tile_lookup_by_world_coord() {
        let chunk = generated(ChunkCoord::new(-1, 0), 8);
        let tile = chunk.tile(Coord::new(-3, 5)).expect("tile inside chunk");
        assert_eq!(tile.coord, Coord::new(-3, 5));
        assert!(chunk.tile(Coord::new(0, 5)).is_none());
    }

    #[test]
    fn test_set_decoration_marks_dirty() {
        let mut chunk = generated(ChunkCoord::new(0, 0), 8);
        assert!(!chunk.is_dirty());
        assert!(!chunk.set_decoration(Coord::new(100, 0), Some(Decoration::Well)));
        assert!(!chunk.is_dirty());
        assert!(chunk.set_decoration(Coord::new(2, 3), Some(Decoration::Well)));
        assert!(chunk.is_dirty());
        assert_eq!(chunk.tile(Coord::new(2, 3)).map(|t| t.decoration), Some(Some(Decoration::Well)));
    }

    #[test]
    fn test_snapshot_preserves_mutations() {
        let coord = ChunkCoord::new(-3, 7);
        let mut chunk = generated(coord, 16);
        chunk.set_decoration(Coord::new(-40, 120), Some(Decoration::House));

        let bytes = chunk.encode_snapshot();
        let restored = Chunk::decode_snapshot(&bytes, coord, 16).expect("valid snapshot");

        assert_eq!(restored.tiles(), chunk.tiles());
        assert!(!restored.is_dirty(), "restored chunks are already durable");
    }

    #[test]
    fn test_snapshot_detects_bit_flip() {
        let coord = ChunkCoord::new(0, 0);
        let mut bytes = generated(coord, 8).encode_snapshot();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0x40;

        assert!(matches!(
            Chunk::decode_snapshot(&bytes, coord, 8),
            Err(SnapshotError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_snapshot_rejects_wrong_identity() {
        let coord = ChunkCoord::new(1, 1);
        let bytes = generated(coord, 8).encode_snapshot();

        assert!(matches!(
            Chunk::decode_snapshot(&bytes, ChunkCoord::new(1, 2), 8),
            Err(SnapshotError::CoordinateMismatch { .. })
        ));
        assert!(matches!(
            Chunk::decode_snapshot(&bytes, coord, 16),
            Err(SnapshotError::ChunkSizeMismatch { expected: 16, actual: 8 })
        ));
    }

    #[test]
    fn test_snapshot_rejects_garbage() {
        let coord = ChunkCoord::new(0, 0);
        assert_eq!(Chunk::decode_snapshot(b"", coord, 8), Err(SnapshotError::InvalidMagic));
        assert_eq!(Chunk::decode_snapshot(b"NOPE-----", coord, 8), Err(SnapshotError::InvalidMagic));

        let bytes = generated(coord, 8).encode_snapshot();
        assert!(matches!(
            Chunk::decode_snapshot(&bytes[..bytes.len() - 10], coord, 8),
            Err(SnapshotError::Truncated { .. })
        ));
    }
}
