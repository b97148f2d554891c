//! # Durable Chunk Storage
//!
//! A key-value store of chunk snapshots keyed by chunk coordinate. The chunk
//! store only needs `put` and `get`; the codec lives in
//! [`Chunk::encode_snapshot`](tessera_procedural::Chunk::encode_snapshot).
//!
//! Two backends ship with the crate:
//!
//! - [`MemoryStorage`]: process-local map, used by tests and short sessions
//! - [`DirectoryStorage`]: one file per chunk, replaced atomically

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tessera_procedural::ChunkCoord;

/// Key-value store of chunk snapshots.
///
/// Implementations must be callable from any thread. The chunk store calls
/// `put` while holding its cache lock, so `put` should not call back into
/// the store.
pub trait ChunkStorage: Send + Sync {
    /// Stores (or replaces) the snapshot for a chunk.
    ///
    /// # Errors
    ///
    /// Returns any I/O failure; the caller logs it and carries on.
    fn put(&self, coord: ChunkCoord, snapshot: &[u8]) -> io::Result<()>;

    /// Fetches the snapshot for a chunk, `None` if never stored.
    ///
    /// # Errors
    ///
    /// Returns any I/O failure; the caller falls back to regeneration.
    fn get(&self, coord: ChunkCoord) -> io::Result<Option<Vec<u8>>>;
}

/// In-memory snapshot store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshots: RwLock<HashMap<ChunkCoord, Vec<u8>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }

    /// Whether a snapshot exists for the chunk.
    #[must_use]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.snapshots.read().contains_key(&coord)
    }

    /// Overwrites raw snapshot bytes.
    pub fn insert_raw(&self, coord: ChunkCoord, bytes: Vec<u8>) {
        self.snapshots.write().insert(coord, bytes);
    }
}

impl ChunkStorage for MemoryStorage {
    fn put(&self, coord: ChunkCoord, snapshot: &[u8]) -> io::Result<()> {
        self.snapshots.write().insert(coord, snapshot.to_vec());
        Ok(())
    }

    fn get(&self, coord: ChunkCoord) -> io::Result<Option<Vec<u8>>> {
        Ok(self.snapshots.read().get(&coord).cloned())
    }
}

/// One snapshot file per chunk under a root directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves either the old snapshot or the new one.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    /// Opens (creating if needed) a snapshot directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds a chunk's snapshot.
    #[must_use]
    pub fn path_for(&self, coord: ChunkCoord) -> PathBuf {
        self.root.join(format!("chunk_{}_{}.bin", coord.x, coord.y))
    }
}

impl ChunkStorage for DirectoryStorage {
    fn put(&self, coord: ChunkCoord, snapshot: &[u8]) -> io::Result<()> {
        let path = self.path_for(coord);
        let tmp = path.with_extension("tmp");

        let mut writer = BufWriter::new(File::create(&tmp)?);
        writer.write_all(snapshot)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&tmp, &path)
    }

    fn get(&self, coord: ChunkCoord) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(coord)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
