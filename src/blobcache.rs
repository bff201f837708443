//! Two-tier byte cache for embedded issue files.
//!
//! Lookup order: memory (bounded LRU) → disk (the path recorded in the
//! cache row, else `<blob-dir>/<file-id>`) → authenticated CDN fetch.
//! A successful network fetch is written back to disk best-effort and the
//! learned size/path are recorded in the database row. Concurrent fetches
//! of the same file may duplicate the download; both produce identical
//! bytes, so last-write-wins on the disk tier is harmless.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::{debug, warn};

use crate::api::OpCtx;
use crate::error::FsResult;
use crate::model::EmbeddedFile;
use crate::repo::Repository;

pub struct BlobCache {
    dir: PathBuf,
    mem: Mutex<LruCache<String, Arc<Vec<u8>>>>,
}

impl BlobCache {
    pub fn new(dir: PathBuf, max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self { dir, mem: Mutex::new(LruCache::new(capacity)) }
    }

    fn disk_path(&self, file: &EmbeddedFile) -> PathBuf {
        match &file.cache_path {
            Some(path) => PathBuf::from(path),
            None => self.dir.join(&file.id),
        }
    }

    /// Full contents of an embedded file, via memory, disk, or network.
    pub fn fetch(
        &self,
        repo: &Repository,
        ctx: OpCtx,
        file: &EmbeddedFile,
    ) -> FsResult<Arc<Vec<u8>>> {
        if let Ok(mut mem) = self.mem.lock() {
            if let Some(bytes) = mem.get(&file.id) {
                return Ok(bytes.clone());
            }
        }

        let disk = self.disk_path(file);
        if let Ok(bytes) = std::fs::read(&disk) {
            debug!(file = %file.id, path = %disk.display(), "blob disk hit");
            let bytes = Arc::new(bytes);
            self.remember(&file.id, bytes.clone());
            return Ok(bytes);
        }

        let backend = repo.backend().clone();
        let url = file.url.clone();
        let fetched = repo
            .runtime()
            .block_on(async move { backend.download(ctx, &url).await })?;
        let bytes = Arc::new(fetched.to_vec());
        debug!(file = %file.id, size = bytes.len(), "blob fetched");

        let target = self.dir.join(&file.id);
        if let Err(e) = write_blob(&target, &bytes) {
            warn!(file = %file.id, "cannot persist blob: {e}");
        } else if let Err(e) =
            repo.cache().set_file_cache(&file.id, &target.to_string_lossy(), bytes.len() as u64)
        {
            warn!(file = %file.id, "cannot record blob path: {e}");
        }

        self.remember(&file.id, bytes.clone());
        Ok(bytes)
    }

    /// Slice `[off, off + len)` of the file; reads past end are empty.
    pub fn read(
        &self,
        repo: &Repository,
        ctx: OpCtx,
        file: &EmbeddedFile,
        offset: u64,
        len: u32,
    ) -> FsResult<Vec<u8>> {
        let bytes = self.fetch(repo, ctx, file)?;
        let start = offset as usize;
        if start >= bytes.len() {
            return Ok(Vec::new());
        }
        let end = start.saturating_add(len as usize).min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }

    /// Size if already known locally (memory or disk), without fetching.
    pub fn known_size(&self, file: &EmbeddedFile) -> Option<u64> {
        if file.size > 0 {
            return Some(file.size);
        }
        if let Ok(mut mem) = self.mem.lock() {
            if let Some(bytes) = mem.get(&file.id) {
                return Some(bytes.len() as u64);
            }
        }
        std::fs::metadata(self.disk_path(file)).ok().map(|m| m.len())
    }

    fn remember(&self, id: &str, bytes: Arc<Vec<u8>>) {
        if let Ok(mut mem) = self.mem.lock() {
            mem.put(id.to_string(), bytes);
        }
    }
}

fn write_blob(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
}
