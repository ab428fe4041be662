use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use tracing::debug;

use super::error::{HeapError, HeapResult};
use super::row::{self, Value};
use super::tid::Tid;
use crate::buffer::{BufferPoolManager, PageKey};
use crate::catalog::{Catalog, ColumnDefinition, DataType, TableDefinition};
use crate::file::{HeapPage, PAGE_SIZE, PageId};

/// Hands out one lock per backing file id.
///
/// Two TableHeap instances opened for the same file share the lock by
/// identity, so concurrent sessions cannot race on "is there space in
/// the last page". Owned by the process root and passed down to every
/// heap constructor.
pub struct LockRegistry {
    locks: Mutex<AHashMap<String, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(AHashMap::new()),
        }
    }

    pub fn lock_for(&self, file_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(
            locks
                .entry(file_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only row heap over slotted pages.
///
/// Holds no page state itself; every access re-resolves through the
/// buffer pool, so slot lifetime is entirely pool-governed.
pub struct TableHeap {
    root: PathBuf,
    pool: Arc<BufferPoolManager>,
    catalog: Arc<Catalog>,
    table: TableDefinition,
    columns: Vec<ColumnDefinition>,
    types: Vec<DataType>,
    file_lock: Arc<Mutex<()>>,
    /// Last page count pushed to the catalog
    pages_hint: Mutex<u32>,
}

impl TableHeap {
    pub fn new(
        pool: Arc<BufferPoolManager>,
        catalog: Arc<Catalog>,
        locks: &LockRegistry,
        table: TableDefinition,
    ) -> Self {
        let columns = catalog.columns(table.oid);
        let types = columns.iter().map(|c| c.data_type).collect();
        let file_lock = locks.lock_for(&table.file_node);
        let root = pool.storage_root().to_path_buf();
        let pages_hint = Mutex::new(table.pages_count);
        Self {
            root,
            pool,
            catalog,
            table,
            columns,
            types,
            file_lock,
            pages_hint,
        }
    }

    pub fn table(&self) -> &TableDefinition {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Append a row, returning its stable address.
    ///
    /// The row goes to the last existing page; when that page reports
    /// `OutOfSpace` a fresh page is allocated at the old page count and
    /// the write retried there. The touched page is flushed before
    /// returning, and a grown page count is pushed to the catalog.
    pub fn insert_row(&self, values: &[Value]) -> HeapResult<Tid> {
        let _guard = self.file_lock.lock().unwrap();

        let row_bytes = row::encode_row(values, &self.types)?;
        let pages = self.page_count()?;

        if pages == 0 {
            let tid = self.write_to_fresh_page(0, &row_bytes)?;
            self.update_pages_count_if_needed()?;
            return Ok(tid);
        }

        let last_key = self.key(pages - 1);
        let mut last = self.pool.get_page(&last_key)?;
        match last.write(&row_bytes) {
            Ok(slot_id) => {
                self.pool.update_page(&last_key, last)?;
                self.pool.flush_page(&last_key)?;
                self.update_pages_count_if_needed()?;
                Ok(Tid::new(pages - 1, slot_id))
            }
            Err(crate::file::PageError::OutOfSpace { .. }) => {
                let tid = self.write_to_fresh_page(pages, &row_bytes)?;
                self.update_pages_count_if_needed()?;
                Ok(tid)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Read and decode the row at the given address
    pub fn read_row(&self, tid: Tid) -> HeapResult<Vec<Value>> {
        let _guard = self.file_lock.lock().unwrap();
        let page = self.pool.get_page(&self.key(tid.page_id))?;
        let row_bytes = page.read(tid.slot_id)?;
        row::decode_row(&row_bytes, &self.types)
    }

    /// Forward scan over every occupied slot in ascending
    /// (page id, slot id) order.
    ///
    /// The page count is fixed when the scan is created; the per-file
    /// lock is reacquired only while touching a page, so writers may
    /// interleave with a long scan.
    pub fn scan_tids(&self) -> HeapResult<TidScan> {
        let pages = {
            let _guard = self.file_lock.lock().unwrap();
            self.page_count()?
        };
        Ok(TidScan {
            pool: Arc::clone(&self.pool),
            file_lock: Arc::clone(&self.file_lock),
            file_node: self.table.file_node.clone(),
            pages,
            page_id: 0,
            slot_id: 0,
            slot_count: None,
        })
    }

    fn write_to_fresh_page(&self, page_id: PageId, row_bytes: &[u8]) -> HeapResult<Tid> {
        let key = self.key(page_id);
        let mut page = HeapPage::new(page_id);
        let slot_id = page.write(row_bytes)?;
        self.pool.new_page(&key, page.clone())?;
        self.pool.update_page(&key, page)?;
        self.pool.flush_page(&key)?;
        debug!(table = %self.table.name, page_id, "heap grew by one page");
        Ok(Tid::new(page_id, slot_id))
    }

    fn update_pages_count_if_needed(&self) -> HeapResult<()> {
        let actual = self.page_count()?;
        let mut hint = self.pages_hint.lock().unwrap();
        if actual > *hint {
            self.catalog.update_pages_count(self.table.oid, actual)?;
            *hint = actual;
        }
        Ok(())
    }

    /// Physical page count of the backing file; a size that is not an
    /// exact multiple of the page size means the file is corrupt
    fn page_count(&self) -> HeapResult<u32> {
        page_count_of(&self.root.join(&self.table.file_node))
    }

    fn key(&self, page_id: PageId) -> PageKey {
        PageKey::new(self.table.file_node.clone(), page_id)
    }
}

fn page_count_of(path: &Path) -> HeapResult<u32> {
    if !path.exists() {
        return Ok(0);
    }
    let size = fs::metadata(path)?.len();
    if size == 0 {
        return Ok(0);
    }
    if size % PAGE_SIZE as u64 != 0 {
        return Err(HeapError::CorruptFile {
            path: path.to_path_buf(),
            size,
        });
    }
    Ok((size / PAGE_SIZE as u64) as u32)
}

/// Restartable forward iterator over the TIDs of one heap, skipping
/// pages with no occupied slots
pub struct TidScan {
    pool: Arc<BufferPoolManager>,
    file_lock: Arc<Mutex<()>>,
    file_node: String,
    pages: u32,
    page_id: PageId,
    slot_id: u16,
    slot_count: Option<u16>,
}

impl Iterator for TidScan {
    type Item = HeapResult<Tid>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.page_id >= self.pages {
                return None;
            }

            let slot_count = match self.slot_count {
                Some(count) => count,
                None => {
                    let _guard = self.file_lock.lock().unwrap();
                    let key = PageKey::new(self.file_node.clone(), self.page_id);
                    match self.pool.get_page(&key) {
                        Ok(page) => {
                            let count = page.slot_count();
                            self.slot_count = Some(count);
                            count
                        }
                        Err(err) => {
                            // Terminate the scan after surfacing the error
                            self.pages = 0;
                            return Some(Err(err.into()));
                        }
                    }
                }
            };

            if self.slot_id < slot_count {
                let tid = Tid::new(self.page_id, self.slot_id);
                self.slot_id += 1;
                return Some(Ok(tid));
            }

            self.page_id += 1;
            self.slot_id = 0;
            self.slot_count = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LruReplacer;
    use crate::file::PageFileManager;
    use tempfile::TempDir;

    fn open_heap(root: &Path, pool_size: usize) -> TableHeap {
        let pool = Arc::new(BufferPoolManager::new(
            pool_size,
            PageFileManager::new(),
            Box::new(LruReplacer::new()),
            root,
        ));
        let catalog = Arc::new(Catalog::open(root).unwrap());
        let table = match catalog.table("events") {
            Ok(table) => table,
            Err(_) => catalog
                .create_table(
                    "events",
                    &[
                        ("id".to_string(), DataType::Int64),
                        ("tag".to_string(), DataType::Varchar),
                    ],
                )
                .unwrap(),
        };
        let locks = LockRegistry::new();
        TableHeap::new(pool, catalog, &locks, table)
    }

    fn sample_row(i: i64) -> Vec<Value> {
        vec![Value::Int64(i), Value::Varchar(format!("tag-{i}"))]
    }

    #[test]
    fn test_insert_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let heap = open_heap(temp_dir.path(), 16);

        let tid = heap.insert_row(&sample_row(1)).unwrap();
        assert_eq!(tid, Tid::new(0, 0));

        let row = heap.read_row(tid).unwrap();
        assert_eq!(row, sample_row(1));
    }

    #[test]
    fn test_append_spills_to_new_page() {
        let temp_dir = TempDir::new().unwrap();
        let heap = open_heap(temp_dir.path(), 16);

        // Each row is small; fill well past one page
        let mut tids = Vec::new();
        for i in 0..600 {
            tids.push(heap.insert_row(&sample_row(i)).unwrap());
        }

        let last = tids.last().unwrap();
        assert!(last.page_id > 0, "expected the heap to grow past page 0");
        assert!(heap.catalog.table("events").unwrap().pages_count > 1);

        // Slot ids restart on each page and rows decode correctly
        for (i, tid) in tids.iter().enumerate() {
            assert_eq!(heap.read_row(*tid).unwrap(), sample_row(i as i64));
        }
    }

    #[test]
    fn test_scan_returns_insertion_order() {
        let temp_dir = TempDir::new().unwrap();
        let heap = open_heap(temp_dir.path(), 16);

        let mut inserted = Vec::new();
        for i in 0..500 {
            inserted.push(heap.insert_row(&sample_row(i)).unwrap());
        }

        let scanned: Vec<Tid> = heap
            .scan_tids()
            .unwrap()
            .collect::<HeapResult<Vec<_>>>()
            .unwrap();
        assert_eq!(scanned, inserted);
    }

    #[test]
    fn test_restart_preserves_rows_even_with_tiny_pool() {
        let temp_dir = TempDir::new().unwrap();
        let rows = 400;
        {
            // Pool smaller than the working set: evictions during insert
            let heap = open_heap(temp_dir.path(), 2);
            for i in 0..rows {
                heap.insert_row(&sample_row(i)).unwrap();
            }
        }

        // Fresh pool, same files
        let heap = open_heap(temp_dir.path(), 2);
        let scanned: Vec<Vec<Value>> = heap
            .scan_tids()
            .unwrap()
            .map(|tid| heap.read_row(tid.unwrap()).unwrap())
            .collect();
        assert_eq!(scanned.len(), rows as usize);
        for (i, row) in scanned.iter().enumerate() {
            assert_eq!(*row, sample_row(i as i64));
        }
    }

    #[test]
    fn test_corrupt_file_size_detected() {
        let temp_dir = TempDir::new().unwrap();
        let heap = open_heap(temp_dir.path(), 16);
        heap.insert_row(&sample_row(1)).unwrap();

        // Truncate the heap file to a non-multiple of the page size
        let path = temp_dir.path().join(&heap.table().file_node);
        let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(PAGE_SIZE as u64 - 1).unwrap();

        let err = heap.insert_row(&sample_row(2)).unwrap_err();
        assert!(matches!(err, HeapError::CorruptFile { .. }));
    }

    #[test]
    fn test_lock_registry_shares_by_file_id() {
        let registry = LockRegistry::new();
        let a = registry.lock_for("1.dat");
        let b = registry.lock_for("1.dat");
        let c = registry.lock_for("2.dat");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
