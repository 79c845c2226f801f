//! Path-keyed cache of memory-mapped shard files.

use std::{
    fs::File,
    ops::Deref,
    path::{Path, PathBuf},
    ptr::NonNull,
    sync::{Arc, RwLock},
};

use ahash::AHashMap;
use ftgs_common::{Result, error::Error};

/// A read-only byte region backing one shard file.
///
/// Mappings created by the cache own their `memmap2::Mmap` and are unmapped
/// when the last handle drops. Host regions are borrowed: the core never
/// unmaps them.
pub enum Mapping {
    Owned(memmap2::Mmap),
    Host(HostRegion),
    /// A zero-length file. `mmap` rejects empty files on some platforms.
    Empty,
}

impl Mapping {
    pub fn is_owned(&self) -> bool {
        matches!(self, Mapping::Owned(_))
    }
}

impl Deref for Mapping {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Mapping::Owned(mmap) => &mmap[..],
            Mapping::Host(region) => region.as_slice(),
            Mapping::Empty => &[],
        }
    }
}

impl std::fmt::Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Mapping::Owned(_) => "owned",
            Mapping::Host(_) => "host",
            Mapping::Empty => "empty",
        };
        f.debug_struct("Mapping")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

/// A memory region mapped by the host process.
pub struct HostRegion {
    ptr: NonNull<u8>,
    len: usize,
}

impl HostRegion {
    fn as_slice(&self) -> &[u8] {
        // SAFETY: `MapCache::insert_host_mapping` requires the region to be
        // valid, immutable and alive for the cache's lifetime.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

// SAFETY: the region is read-only for as long as the cache holds it.
unsafe impl Send for HostRegion {}
unsafe impl Sync for HostRegion {}

/// Cache of mapped shard files, keyed by path and shared by every shard of a
/// run.
///
/// All files are mapped while the run is initialized; the parallel phase
/// only reads from the cache.
#[derive(Default)]
pub struct MapCache {
    cache: RwLock<AHashMap<PathBuf, Arc<Mapping>>>,
}

impl MapCache {
    pub fn new() -> MapCache {
        Default::default()
    }

    /// Registers a region already mapped by the host for `path`.
    ///
    /// A later [`get_or_map`](Self::get_or_map) of the same path returns the
    /// host region instead of mapping the file again.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` readable bytes that stay valid and unmodified
    /// until this cache and every `Arc<Mapping>` obtained from it are dropped.
    pub unsafe fn insert_host_mapping(&self, path: impl Into<PathBuf>, ptr: *const u8, len: usize) {
        let path = path.into();
        let mapping = match NonNull::new(ptr as *mut u8) {
            Some(ptr) if len > 0 => Mapping::Host(HostRegion { ptr, len }),
            _ => Mapping::Empty,
        };
        log::trace!("map cache: host region for {} ({len} bytes)", path.display());
        self.cache
            .write()
            .expect("write lock")
            .insert(path, Arc::new(mapping));
    }

    /// Returns the mapping of `path`, mapping the file on first access.
    ///
    /// A file that cannot be opened or mapped is an I/O error naming the path.
    pub fn get_or_map(&self, path: &Path) -> Result<Arc<Mapping>> {
        if let Some(cached) = self.get(path) {
            log::trace!("map cache: hit {}", path.display());
            return Ok(cached);
        }
        log::trace!("map cache: miss {}", path.display());
        let mapping = Arc::new(Self::map_file(path)?);
        let mut cache = self.cache.write().expect("write lock");
        Ok(cache
            .entry(path.to_path_buf())
            .or_insert(mapping)
            .clone())
    }

    pub fn get(&self, path: &Path) -> Option<Arc<Mapping>> {
        self.cache.read().expect("read lock").get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.cache.read().expect("read lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of mappings created (and owned) by the cache.
    pub fn owned_count(&self) -> usize {
        self.cache
            .read()
            .expect("read lock")
            .values()
            .filter(|m| m.is_owned())
            .count()
    }

    fn map_file(path: &Path) -> Result<Mapping> {
        let context = || path.display().to_string();
        let file = File::open(path).map_err(|e| Error::io(context(), e))?;
        let len = file.metadata().map_err(|e| Error::io(context(), e))?.len();
        if len == 0 {
            return Ok(Mapping::Empty);
        }
        // SAFETY: shard files are immutable while a run reads them.
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| Error::io(context(), e))?;
        Ok(Mapping::Owned(mmap))
    }
}

impl std::fmt::Debug for MapCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
