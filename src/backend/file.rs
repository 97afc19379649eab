//! Local-disk block storage.
//!
//! ## Layout
//!
//! ```text
//! dir/
//! ├── parent/name/00000000.sdb    blocks 0 .. n-1
//! ├── parent/name/00000001.sdb    blocks n .. 2n-1
//! ├── schema-name.df              metadata files
//! cold_dir/
//! └── parent/name/...             purged block files
//! ```
//!
//! A block file holds `n = max(1, max_file_size / BLOCK_SIZE)` fixed
//! slots of [`BLOCK_SIZE`] bytes. Block `i` lives in file `i / n` at byte
//! offset `(i % n) * BLOCK_SIZE`. An all-zero header marks an empty slot.
//!
//! ## Design
//!
//! - Open file handles are kept in an [`LruCache`] bounded by
//!   `max_open_files`
//! - Read failures and short reads are logged and reported as misses
//! - Write failures are logged and returned as `StoreError::Io`
//! - `open` completes synchronously

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use tracing::{debug, error, warn};

use crate::backend::{DecodeFn, OpenFn, StorageBackend};
use crate::config::FileBackendConfig;
use crate::error::{Result, StoreError};
use crate::types::{Block, BlockHdr, SeriesId, BLOCK_SIZE, HDR_SIZE};

/// Block file extension
pub const BLOCK_FILE_EXT: &str = "sdb";

/// Metadata file extension
pub const META_FILE_EXT: &str = "df";

/// Block file address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FileId {
    series: SeriesId,
    index: u32,
}

/// Per-series file state
#[derive(Debug, Clone)]
struct SeriesFiles {
    /// `parent/name`, relative to both `dir` and `cold_dir`
    rel: PathBuf,

    /// Oldest block file still in `dir`
    min_file: u32,
}

/// Block and metadata storage in a local directory tree.
pub struct FileBackend {
    config: FileBackendConfig,
    blocks_per_file: u32,
    series: Vec<Option<SeriesFiles>>,
    files: LruCache<FileId, File>,
    file_loads: u64,
    file_misses: u64,
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("dir", &self.config.dir)
            .field("blocks_per_file", &self.blocks_per_file)
            .field("open_files", &self.files.len())
            .finish()
    }
}

impl FileBackend {
    /// Create a backend from a validated configuration.
    pub fn new(config: FileBackendConfig) -> Result<Self> {
        config.validate()?;
        let blocks_per_file = (config.max_file_size / BLOCK_SIZE as u64).clamp(1, u32::MAX as u64) as u32;
        let max_open = NonZeroUsize::new(config.max_open_files)
            .ok_or_else(|| StoreError::Config("max_open_files must be at least 1".into()))?;
        Ok(Self {
            config,
            blocks_per_file,
            series: Vec::new(),
            files: LruCache::new(max_open),
            file_loads: 0,
            file_misses: 0,
        })
    }

    /// Backend configuration
    #[inline]
    pub fn config(&self) -> &FileBackendConfig {
        &self.config
    }

    /// Block slots per file
    #[inline]
    pub fn blocks_per_file(&self) -> u32 {
        self.blocks_per_file
    }

    /// Number of cached open file handles
    #[inline]
    pub fn open_files(&self) -> usize {
        self.files.len()
    }

    /// `(lookups, handle cache misses)` since creation
    #[inline]
    pub fn file_stats(&self) -> (u64, u64) {
        (self.file_loads, self.file_misses)
    }

    /// Path of block file `index` of a series, relative to `dir`
    pub fn block_file_name(&self, series: SeriesId, index: u32) -> Option<PathBuf> {
        let files = self.series_files(series)?;
        Some(files.rel.join(format!("{:08x}.{}", index, BLOCK_FILE_EXT)))
    }

    /// Absolute path of a metadata file
    pub fn meta_path(&self, name: &str) -> PathBuf {
        self.config.dir.join(format!("{}.{}", name, META_FILE_EXT))
    }

    // ========================================================================
    // File handles
    // ========================================================================

    fn series_files(&self, series: SeriesId) -> Option<&SeriesFiles> {
        self.series.get(series as usize)?.as_ref()
    }

    /// File id and byte offset of a block slot
    #[inline]
    fn locate(&self, series: SeriesId, index: u32) -> (FileId, u64) {
        let file = FileId {
            series,
            index: index / self.blocks_per_file,
        };
        let slot = (index % self.blocks_per_file) as u64;
        (file, slot * BLOCK_SIZE as u64)
    }

    fn get_file(&mut self, id: FileId, create: bool) -> Option<&mut File> {
        self.file_loads += 1;
        if self.files.contains(&id) {
            return self.files.get_mut(&id);
        }
        self.file_misses += 1;

        let rel = self.block_file_name(id.series, id.index)?;
        let path = self.config.dir.join(rel);
        let file = match open_block_file(&path, create) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !create => return None,
            Err(e) => {
                error!(path = %path.display(), error = %e, "could not open block file");
                return None;
            }
        };
        self.files.put(id, file);
        self.files.get_mut(&id)
    }

    fn drop_handles(&mut self, pred: impl Fn(&FileId) -> bool) {
        let doomed: Vec<FileId> = self.files.iter().map(|(id, _)| *id).filter(|id| pred(id)).collect();
        for id in doomed {
            self.files.pop(&id);
        }
    }

    /// Move one block file to cold storage
    fn archive(&self, rel: &Path) {
        let from = self.config.dir.join(rel);
        let to = self.config.cold_dir.join(rel);
        if let Some(parent) = to.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!(path = %parent.display(), error = %e, "could not create cold directory");
                return;
            }
        }
        match fs::rename(&from, &to) {
            Ok(()) => debug!(from = %from.display(), to = %to.display(), "archived block file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!(
                from = %from.display(),
                to = %to.display(),
                error = %e,
                "could not archive block file"
            ),
        }
    }

    fn read_slot(&mut self, series: SeriesId, index: u32, buf: &mut [u8]) -> bool {
        let (id, offset) = self.locate(series, index);
        let Some(file) = self.get_file(id, false) else {
            return false;
        };
        match read_at(file, offset, buf) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
            Err(e) => {
                warn!(series, index, offset, error = %e, "block read failed");
                false
            }
        }
    }
}

fn open_block_file(path: &Path, create: bool) -> io::Result<File> {
    match OpenOptions::new().read(true).write(true).open(path) {
        Err(e) if create && e.kind() == io::ErrorKind::NotFound => {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            OpenOptions::new().read(true).write(true).create(true).open(path)
        }
        other => other,
    }
}

fn read_at(file: &mut File, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}

fn write_at(file: &mut File, offset: u64, buf: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(buf)
}

/// Parse `{index:08x}.sdb`
fn parse_block_file_name(name: &str) -> Option<u32> {
    let stem = name.strip_suffix(BLOCK_FILE_EXT)?.strip_suffix('.')?;
    if stem.len() != 8 {
        return None;
    }
    u32::from_str_radix(stem, 16).ok()
}

impl StorageBackend for FileBackend {
    fn init(&mut self) -> Result<()> {
        fs::create_dir_all(&self.config.dir)?;
        Ok(())
    }

    fn finish(&mut self) {
        self.files.clear();
    }

    fn open(&mut self, series: SeriesId, parent: &str, name: &str, open_fn: OpenFn) -> Result<()> {
        let rel = Path::new(parent).join(name);
        let dir = self.config.dir.join(&rel);

        let mut min_file: Option<u32> = None;
        match fs::read_dir(&dir) {
            Ok(entries) => {
                for entry in entries {
                    let entry = entry?;
                    let file_name = entry.file_name();
                    let Some(index) = file_name.to_str().and_then(parse_block_file_name) else {
                        continue;
                    };
                    min_file = Some(min_file.map_or(index, |m| m.min(index)));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                error!(path = %dir.display(), error = %e, "could not scan series directory");
                return Err(e.into());
            }
        }
        let min_file = min_file.unwrap_or(0);

        let slot = series as usize;
        if self.series.len() <= slot {
            self.series.resize(slot + 1, None);
        }
        self.series[slot] = Some(SeriesFiles { rel, min_file });

        let first_block = min_file.saturating_mul(self.blocks_per_file);
        debug!(series, path = %dir.display(), first_block, "opened series");
        open_fn(first_block);
        Ok(())
    }

    fn close(&mut self, series: SeriesId) {
        self.drop_handles(|id| id.series == series);
        if let Some(slot) = self.series.get_mut(series as usize) {
            *slot = None;
        }
    }

    fn load_hdr(&mut self, series: SeriesId, index: u32) -> Option<BlockHdr> {
        let mut buf = [0u8; HDR_SIZE];
        if !self.read_slot(series, index, &mut buf) || buf.iter().all(|&b| b == 0) {
            return None;
        }
        BlockHdr::from_bytes(&buf)
    }

    fn load(&mut self, series: SeriesId, index: u32, buf: &mut [u8]) -> bool {
        let Some(buf) = buf.get_mut(..BLOCK_SIZE) else {
            return false;
        };
        let mut image = vec![0u8; BLOCK_SIZE];
        if !self.read_slot(series, index, &mut image) || image[..HDR_SIZE].iter().all(|&b| b == 0) {
            return false;
        }
        buf.copy_from_slice(&image);
        true
    }

    fn save(&mut self, block: Arc<Block>) -> Result<()> {
        let (series, index) = (block.series(), block.index());
        let (id, offset) = self.locate(series, index);
        let path = self
            .block_file_name(series, id.index)
            .map(|rel| self.config.dir.join(rel))
            .ok_or_else(|| StoreError::NotFound(format!("series {} is not open", series)))?;
        let Some(file) = self.get_file(id, true) else {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("could not open {}", path.display()),
            )));
        };
        if let Err(e) = write_at(file, offset, &block.to_image()) {
            error!(path = %path.display(), offset, error = %e, "block write failed");
            return Err(e.into());
        }
        Ok(())
    }

    fn purge(&mut self, series: SeriesId, index: u32) {
        let limit = index / self.blocks_per_file;
        let Some(files) = self.series_files(series).cloned() else {
            return;
        };
        if limit <= files.min_file {
            return;
        }
        self.drop_handles(|id| id.series == series && id.index < limit);
        for file_index in files.min_file..limit {
            self.archive(&files.rel.join(format!("{:08x}.{}", file_index, BLOCK_FILE_EXT)));
        }
        if let Some(Some(state)) = self.series.get_mut(series as usize) {
            state.min_file = limit;
        }
    }

    fn load_file(&mut self, name: &str, decode: DecodeFn<'_>, max_file_size: u64) -> Result<()> {
        let path = self.meta_path(name);
        let size = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if size > max_file_size {
            return Err(StoreError::FileTooLarge {
                path,
                size,
                max: max_file_size,
            });
        }
        let data = fs::read(&path)?;
        decode(&data)
    }

    fn save_file(&mut self, name: &str, payload: &[u8]) -> Result<()> {
        let path = self.meta_path(name);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension(format!("{}.tmp", META_FILE_EXT));
        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(payload)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|e| {
            error!(path = %path.display(), error = %e, "metadata write failed");
            StoreError::Io(e)
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tempfile::TempDir;

    use crate::types::BlockKey;

    fn backend(dir: &TempDir, max_file_size: u64) -> FileBackend {
        let mut config = FileBackendConfig::new(dir.path().join("hot"));
        config.cold_dir = dir.path().join("cold");
        config.max_file_size = max_file_size;
        let mut backend = FileBackend::new(config).unwrap();
        backend.init().unwrap();
        backend
    }

    fn open(backend: &mut FileBackend, series: SeriesId) -> u32 {
        let first = Arc::new(AtomicU32::new(u32::MAX));
        let sink = Arc::clone(&first);
        backend
            .open(series, "feed", "px", Box::new(move |i| sink.store(i, Ordering::SeqCst)))
            .unwrap();
        first.load(Ordering::SeqCst)
    }

    fn block(series: SeriesId, index: u32, payload: &[u8]) -> Arc<Block> {
        let mut hdr = BlockHdr::new(index as u64 * 10, 2);
        hdr.count = 10;
        Arc::new(Block::new(BlockKey::new(series, index), hdr, payload))
    }

    #[test]
    fn test_parse_block_file_name() {
        assert_eq!(parse_block_file_name("0000000a.sdb"), Some(10));
        assert_eq!(parse_block_file_name("a.sdb"), None);
        assert_eq!(parse_block_file_name("0000000a.df"), None);
        assert_eq!(parse_block_file_name("zzzzzzzz.sdb"), None);
    }

    #[test]
    fn test_blocks_per_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(backend(&dir, 1).blocks_per_file(), 1);
        assert_eq!(backend(&dir, BLOCK_SIZE as u64 * 4 + 7).blocks_per_file(), 4);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut fb = backend(&dir, BLOCK_SIZE as u64 * 2);
        assert_eq!(open(&mut fb, 0), 0);

        for i in 0..5 {
            fb.save(block(0, i, &[i as u8; 20])).unwrap();
        }
        assert!(dir.path().join("hot/feed/px/00000000.sdb").exists());
        assert!(dir.path().join("hot/feed/px/00000002.sdb").exists());

        let mut buf = vec![0u8; BLOCK_SIZE];
        assert!(fb.load(0, 3, &mut buf));
        let loaded = Block::from_image(BlockKey::new(0, 3), &buf).unwrap();
        assert_eq!(loaded.payload(), &[3u8; 20]);
        assert_eq!(fb.load_hdr(0, 3).unwrap().offset, 30);

        assert!(!fb.load(0, 5, &mut buf));
        assert_eq!(fb.load_hdr(0, 9), None);
    }

    #[test]
    fn test_save_needs_open() {
        let dir = TempDir::new().unwrap();
        let mut fb = backend(&dir, BLOCK_SIZE as u64 * 2);
        let err = fb.save(block(0, 0, &[1])).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("series 0 is not open"));

        open(&mut fb, 0);
        fb.save(block(0, 0, &[1])).unwrap();
        fb.close(0);
        assert!(fb.save(block(0, 1, &[1])).unwrap_err().is_not_found());
    }

    #[test]
    fn test_reopen_after_purge() {
        let dir = TempDir::new().unwrap();
        let mut fb = backend(&dir, BLOCK_SIZE as u64 * 2);
        open(&mut fb, 0);
        for i in 0..6 {
            fb.save(block(0, i, &[1, 2, 3])).unwrap();
        }

        fb.purge(0, 5);
        assert!(!dir.path().join("hot/feed/px/00000000.sdb").exists());
        assert!(!dir.path().join("hot/feed/px/00000001.sdb").exists());
        assert!(dir.path().join("cold/feed/px/00000001.sdb").exists());
        assert!(dir.path().join("hot/feed/px/00000002.sdb").exists());
        assert_eq!(fb.load_hdr(0, 1), None);

        fb.close(0);
        assert_eq!(open(&mut fb, 0), 4);
    }

    #[test]
    fn test_handle_cache_bounded() {
        let dir = TempDir::new().unwrap();
        let mut config = FileBackendConfig::new(dir.path());
        config.max_file_size = BLOCK_SIZE as u64;
        config.max_open_files = 2;
        let mut fb = FileBackend::new(config).unwrap();
        open(&mut fb, 0);

        for i in 0..5 {
            fb.save(block(0, i, &[9])).unwrap();
        }
        assert_eq!(fb.open_files(), 2);
        let mut buf = vec![0u8; BLOCK_SIZE];
        assert!(fb.load(0, 0, &mut buf));

        fb.close(0);
        assert_eq!(fb.open_files(), 0);
    }

    #[test]
    fn test_meta_files() {
        let dir = TempDir::new().unwrap();
        let mut fb = backend(&dir, 1 << 20);
        fb.save_file("schema", b"hello").unwrap();

        let mut seen = Vec::new();
        fb.load_file("schema", &mut |data: &[u8]| -> Result<()> {
            seen.extend_from_slice(data);
            Ok(())
        }, 64)
        .unwrap();
        assert_eq!(seen, b"hello");

        let err = fb.load_file("schema", &mut |_: &[u8]| -> Result<()> { Ok(()) }, 4).unwrap_err();
        assert!(matches!(err, StoreError::FileTooLarge { size: 5, max: 4, .. }));

        let err = fb.load_file("missing", &mut |_: &[u8]| -> Result<()> { Ok(()) }, 64).unwrap_err();
        assert!(err.is_not_found());
    }
}
