use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ahash::AHashMap;
use tracing::trace;

use super::error::{BufferError, BufferResult};
use super::replacer::Replacer;
use super::{BufferSlot, PageKey};
use crate::file::{HeapPage, PageFileManager};

struct PoolState {
    page_table: AHashMap<PageKey, BufferSlot>,
    replacer: Box<dyn Replacer>,
}

/// Fixed-capacity page cache keyed by (file id, page id).
///
/// All page traffic from the heap and index layers funnels through this
/// type; the file manager is touched only on a cache miss or when a dirty
/// page must be written out. Every public method runs under one
/// coarse-grained lock covering the page table, the replacer, and all
/// pin/flush/evict bookkeeping, which serializes page access process-wide
/// but leaves no room for lost updates or torn evictions.
pub struct BufferPoolManager {
    pool_size: usize,
    file_manager: PageFileManager,
    storage_root: PathBuf,
    state: Mutex<PoolState>,
}

impl BufferPoolManager {
    pub fn new(
        pool_size: usize,
        file_manager: PageFileManager,
        replacer: Box<dyn Replacer>,
        storage_root: impl Into<PathBuf>,
    ) -> Self {
        assert!(pool_size > 0, "pool size must be > 0");
        Self {
            pool_size,
            file_manager,
            storage_root: storage_root.into(),
            state: Mutex::new(PoolState {
                page_table: AHashMap::new(),
                replacer,
            }),
        }
    }

    /// Fetch a page, reading it from disk on a miss.
    ///
    /// Returns an owned copy of the cached page; mutations are applied by
    /// handing the modified copy back through `update_page`.
    pub fn get_page(&self, key: &PageKey) -> BufferResult<HeapPage> {
        let mut state = self.state.lock().unwrap();
        let slot = Self::fetch_slot(
            &mut state,
            key,
            &self.file_manager,
            &self.storage_root,
            self.pool_size,
        )?;
        Ok(slot.page.clone())
    }

    /// Admit a freshly created in-memory page (not yet durable).
    ///
    /// Fails with `AlreadyCached` if the key is already resident.
    pub fn new_page(&self, key: &PageKey, page: HeapPage) -> BufferResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.page_table.contains_key(key) {
            return Err(BufferError::AlreadyCached(key.clone()));
        }

        Self::ensure_space(
            &mut state,
            &self.file_manager,
            &self.storage_root,
            self.pool_size,
        )?;
        state
            .page_table
            .insert(key.clone(), BufferSlot::new(key.clone(), page));
        Self::touch(&mut state, key);
        Ok(())
    }

    /// Replace the cached page's content and mark the slot dirty, loading
    /// the page from disk first if it is not resident
    pub fn update_page(&self, key: &PageKey, page: HeapPage) -> BufferResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.page_table.contains_key(key) {
            Self::fetch_slot(
                &mut state,
                key,
                &self.file_manager,
                &self.storage_root,
                self.pool_size,
            )?;
        }
        let slot = state.page_table.get_mut(key).unwrap();
        slot.page = page;
        slot.dirty = true;
        Self::touch(&mut state, key);
        Ok(())
    }

    /// Exempt a page from eviction until unpinned
    pub fn pin_page(&self, key: &PageKey) -> BufferResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.page_table.contains_key(key) {
            Self::fetch_slot(
                &mut state,
                key,
                &self.file_manager,
                &self.storage_root,
                self.pool_size,
            )?;
        }
        state.page_table.get_mut(key).unwrap().pinned = true;
        state.replacer.delete(key);
        Ok(())
    }

    /// Re-admit a pinned page to eviction candidacy; no-op when the page
    /// is absent or not pinned
    pub fn unpin_page(&self, key: &PageKey) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        match state.page_table.get_mut(key) {
            Some(slot) if slot.pinned => {
                slot.pinned = false;
                state.replacer.push(key.clone());
            }
            _ => {}
        }
    }

    /// Write the page out if it is cached and dirty
    pub fn flush_page(&self, key: &PageKey) -> BufferResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(slot) = state.page_table.get_mut(key)
            && slot.dirty
        {
            self.file_manager
                .write(&slot.page, &self.storage_root.join(key.file_id()))?;
            slot.dirty = false;
        }
        Ok(())
    }

    /// Flush every dirty slot; the crate's sole durability checkpoint
    pub fn flush_all_pages(&self) -> BufferResult<()> {
        let mut state = self.state.lock().unwrap();
        let dirty: Vec<PageKey> = state
            .page_table
            .values()
            .filter(|slot| slot.dirty)
            .map(|slot| slot.key.clone())
            .collect();
        trace!(pages = dirty.len(), "checkpoint: flushing dirty pages");
        for key in dirty {
            let slot = state.page_table.get_mut(&key).unwrap();
            self.file_manager
                .write(&slot.page, &self.storage_root.join(key.file_id()))?;
            slot.dirty = false;
        }
        Ok(())
    }

    /// Snapshot of the currently dirty keys, drained by the background
    /// writer
    pub fn dirty_keys(&self) -> Vec<PageKey> {
        let state = self.state.lock().unwrap();
        state
            .page_table
            .values()
            .filter(|slot| slot.dirty)
            .map(|slot| slot.key.clone())
            .collect()
    }

    /// Number of pages currently cached
    pub fn cached_page_count(&self) -> usize {
        self.state.lock().unwrap().page_table.len()
    }

    /// Whether the given key is resident in the cache
    pub fn is_cached(&self, key: &PageKey) -> bool {
        self.state.lock().unwrap().page_table.contains_key(key)
    }

    pub fn file_manager(&self) -> &PageFileManager {
        &self.file_manager
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    fn fetch_slot<'a>(
        state: &'a mut PoolState,
        key: &PageKey,
        file_manager: &PageFileManager,
        storage_root: &Path,
        pool_size: usize,
    ) -> BufferResult<&'a mut BufferSlot> {
        if state.page_table.contains_key(key) {
            let slot = state.page_table.get_mut(key).unwrap();
            slot.usage_count += 1;
            Self::touch(state, key);
            return Ok(state.page_table.get_mut(key).unwrap());
        }

        Self::ensure_space(state, file_manager, storage_root, pool_size)?;
        let page = file_manager.read(key.page_id(), &storage_root.join(key.file_id()))?;
        state
            .page_table
            .insert(key.clone(), BufferSlot::new(key.clone(), page));
        Self::touch(state, key);
        Ok(state.page_table.get_mut(key).unwrap())
    }

    fn touch(state: &mut PoolState, key: &PageKey) {
        let pinned = state
            .page_table
            .get(key)
            .map(|slot| slot.pinned)
            .unwrap_or(false);
        if !pinned {
            state.replacer.push(key.clone());
        }
    }

    /// Make room for one more slot when the cache is at capacity. A dirty
    /// victim is flushed synchronously before removal; finding no victim
    /// at all is a hard capacity-exhaustion error, never retried.
    fn ensure_space(
        state: &mut PoolState,
        file_manager: &PageFileManager,
        storage_root: &Path,
        pool_size: usize,
    ) -> BufferResult<()> {
        while state.page_table.len() >= pool_size {
            let victim = state
                .replacer
                .pick_victim()
                .ok_or(BufferError::NoVictimAvailable)?;

            if let Some(slot) = state.page_table.get_mut(&victim) {
                if slot.dirty {
                    file_manager.write(&slot.page, &storage_root.join(victim.file_id()))?;
                    slot.dirty = false;
                }
                trace!(key = %victim, "evicting page");
                state.page_table.remove(&victim);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::replacer::LruReplacer;
    use tempfile::TempDir;

    fn pool(root: &Path, capacity: usize) -> BufferPoolManager {
        BufferPoolManager::new(
            capacity,
            PageFileManager::new(),
            Box::new(LruReplacer::new()),
            root,
        )
    }

    fn seed_page(root: &Path, file_id: &str, page_id: u32, marker: &[u8]) {
        let manager = PageFileManager::new();
        let mut page = HeapPage::new(page_id);
        page.write(marker).unwrap();
        manager.write(&page, &root.join(file_id)).unwrap();
    }

    #[test]
    fn test_cache_hit_avoids_reread() {
        let temp_dir = TempDir::new().unwrap();
        seed_page(temp_dir.path(), "t.dat", 0, b"x");
        let pool = pool(temp_dir.path(), 4);

        let key = PageKey::new("t.dat", 0);
        pool.get_page(&key).unwrap();
        pool.get_page(&key).unwrap();

        assert_eq!(pool.file_manager().read_count(), 1);
        assert_eq!(pool.cached_page_count(), 1);
    }

    #[test]
    fn test_miss_propagates_read_failure() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool(temp_dir.path(), 4);

        let err = pool.get_page(&PageKey::new("absent.dat", 0)).unwrap_err();
        assert!(matches!(
            err,
            BufferError::File(crate::file::FileError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_new_page_rejects_duplicate_key() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool(temp_dir.path(), 4);

        let key = PageKey::new("t.dat", 0);
        pool.new_page(&key, HeapPage::new(0)).unwrap();
        let err = pool.new_page(&key, HeapPage::new(0)).unwrap_err();
        assert!(matches!(err, BufferError::AlreadyCached(_)));
    }

    #[test]
    fn test_eviction_flushes_dirty_victim() {
        let temp_dir = TempDir::new().unwrap();
        seed_page(temp_dir.path(), "t.dat", 0, b"a");
        seed_page(temp_dir.path(), "t.dat", 1, b"b");
        let pool = pool(temp_dir.path(), 1);

        let key_a = PageKey::new("t.dat", 0);
        let mut page_a = pool.get_page(&key_a).unwrap();
        page_a.write(b"dirtied").unwrap();
        pool.update_page(&key_a, page_a).unwrap();
        assert_eq!(pool.file_manager().write_count(), 0);

        // Requesting B forces A out; the dirty A must hit disk exactly once
        pool.get_page(&PageKey::new("t.dat", 1)).unwrap();
        assert_eq!(pool.file_manager().write_count(), 1);
        assert!(!pool.is_cached(&key_a));

        // And the dirtied content survived the round trip
        let page_a = pool.get_page(&key_a).unwrap();
        assert_eq!(page_a.read(1).unwrap(), b"dirtied");
    }

    #[test]
    fn test_pin_blocks_eviction() {
        let temp_dir = TempDir::new().unwrap();
        seed_page(temp_dir.path(), "t.dat", 0, b"a");
        seed_page(temp_dir.path(), "t.dat", 1, b"b");
        let pool = pool(temp_dir.path(), 1);

        let key_a = PageKey::new("t.dat", 0);
        pool.pin_page(&key_a).unwrap();

        let err = pool.get_page(&PageKey::new("t.dat", 1)).unwrap_err();
        assert!(matches!(err, BufferError::NoVictimAvailable));
        assert!(pool.is_cached(&key_a));

        // Unpinning re-admits the page as a victim
        pool.unpin_page(&key_a);
        pool.get_page(&PageKey::new("t.dat", 1)).unwrap();
        assert!(!pool.is_cached(&key_a));
    }

    #[test]
    fn test_flush_page_clears_dirty() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool(temp_dir.path(), 4);

        let key = PageKey::new("t.dat", 0);
        pool.new_page(&key, HeapPage::new(0)).unwrap();
        let mut page = pool.get_page(&key).unwrap();
        page.write(b"row").unwrap();
        pool.update_page(&key, page).unwrap();
        assert_eq!(pool.dirty_keys().len(), 1);

        pool.flush_page(&key).unwrap();
        assert!(pool.dirty_keys().is_empty());

        // Flushing a clean page is a no-op
        let before = pool.file_manager().write_count();
        pool.flush_page(&key).unwrap();
        assert_eq!(pool.file_manager().write_count(), before);
    }

    #[test]
    fn test_flush_all_pages() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool(temp_dir.path(), 8);

        for page_id in 0..3 {
            let key = PageKey::new("t.dat", page_id);
            let mut page = HeapPage::new(page_id);
            page.write(b"r").unwrap();
            pool.new_page(&key, page.clone()).unwrap();
            pool.update_page(&key, page).unwrap();
        }
        assert_eq!(pool.dirty_keys().len(), 3);

        pool.flush_all_pages().unwrap();
        assert!(pool.dirty_keys().is_empty());
        assert_eq!(pool.file_manager().write_count(), 3);
    }
}
