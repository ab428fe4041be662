use std::sync::Arc;

use tracing::debug;

use super::error::{IndexError, IndexResult};
use super::{IndexKey, key_hash};
use crate::buffer::{BufferPoolManager, PageKey};
use crate::catalog::{DataType, IndexDefinition, IndexKind};
use crate::file::{HEADER_SIZE, HeapPage, PAGE_SIZE, PageId};
use crate::heap::Tid;

const MAGIC: u32 = 0x4849_4458;
const VERSION: u32 = 1;

/// Fixed-size directory region: 64 pages of bucket-head entries right
/// after the meta page
const DIR_PAGES: u32 = 64;
const DIR_ENTRY_BYTES: usize = 4;
const DIR_ENTRIES_PER_PAGE: u32 = ((PAGE_SIZE - HEADER_SIZE) / DIR_ENTRY_BYTES) as u32;
const DATA_START_PAGE: u32 = 1 + DIR_PAGES;

const BUCKET_NEXT_OVERFLOW_OFF: usize = HEADER_SIZE;
const BUCKET_ENTRY_COUNT_OFF: usize = HEADER_SIZE + 4;
const BUCKET_FREE_OFF: usize = HEADER_SIZE + 8;
const BUCKET_DATA_OFF: usize = HEADER_SIZE + 12;

const META_MAGIC_OFF: usize = HEADER_SIZE;
const META_VERSION_OFF: usize = HEADER_SIZE + 4;
const META_BUCKET_COUNT_OFF: usize = HEADER_SIZE + 8;
const META_LOWMASK_OFF: usize = HEADER_SIZE + 12;
const META_HIGHMASK_OFF: usize = HEADER_SIZE + 16;
const META_SPLITPTR_OFF: usize = HEADER_SIZE + 20;
const META_MAXBUCKET_OFF: usize = HEADER_SIZE + 24;
const META_RECORDCOUNT_OFF: usize = HEADER_SIZE + 28;
const META_NEXT_PAGE_OFF: usize = HEADER_SIZE + 36;

const INITIAL_BUCKETS: u32 = 16;
const MAX_LOAD_FACTOR: f64 = 0.75;
const TARGET_BUCKET_ENTRIES: u64 = 64;

const NO_PAGE: i32 = -1;

#[derive(Debug, Clone, Copy)]
struct Meta {
    bucket_count: u32,
    lowmask: u32,
    highmask: u32,
    split_pointer: u32,
    max_bucket: u32,
    record_count: u64,
    next_page_id: PageId,
}

struct Entry {
    hash: u32,
    key: IndexKey,
    tid: Tid,
}

/// On-disk extendible hash table with linear, one-bucket-at-a-time
/// growth.
///
/// A directory maps bucket ids to bucket-head pages; buckets chain
/// overflow pages. Splits always drain the bucket under the split
/// pointer, never the bucket that just overflowed, so the bucket-address
/// function stays compatible with existing files; the insert loop keeps
/// splitting until the load factor drops back under the threshold.
pub struct DiskHashIndex {
    pool: Arc<BufferPoolManager>,
    def: IndexDefinition,
    key_type: DataType,
    meta: Meta,
}

impl DiskHashIndex {
    pub fn open(pool: Arc<BufferPoolManager>, def: IndexDefinition) -> IndexResult<Self> {
        if def.kind != IndexKind::Hash {
            return Err(IndexError::WrongIndexKind {
                expected: IndexKind::Hash,
                actual: def.kind,
            });
        }

        let path = pool.storage_root().join(&def.file_node);
        let needs_init = !path.exists() || std::fs::metadata(&path).map_or(true, |m| m.len() == 0);

        let key_type = def.key_type;
        let mut index = Self {
            pool,
            def,
            key_type,
            meta: Meta {
                bucket_count: 0,
                lowmask: 0,
                highmask: 0,
                split_pointer: 0,
                max_bucket: 0,
                record_count: 0,
                next_page_id: 0,
            },
        };

        if needs_init {
            index.initialize_new()?;
        } else {
            index.load_meta()?;
        }
        Ok(index)
    }

    pub fn definition(&self) -> &IndexDefinition {
        &self.def
    }

    pub fn bucket_count(&self) -> u32 {
        self.meta.bucket_count
    }

    pub fn record_count(&self) -> u64 {
        self.meta.record_count
    }

    pub fn insert(&mut self, key: &IndexKey, tid: Tid) -> IndexResult<()> {
        self.check_key_type(key)?;

        let hash = key_hash(key);
        let bucket = self.compute_bucket(hash);
        let entry = Entry {
            hash,
            key: key.clone(),
            tid,
        };
        self.insert_into_bucket_chain(bucket, &entry)?;

        self.meta.record_count += 1;
        self.write_meta()?;

        // One insert may require several splits to get back under the
        // threshold; each one advances the split pointer by one bucket
        while self.load_factor() > MAX_LOAD_FACTOR {
            self.perform_split()?;
        }
        Ok(())
    }

    pub fn search(&self, key: &IndexKey) -> IndexResult<Vec<Tid>> {
        self.check_key_type(key)?;

        let hash = key_hash(key);
        let bucket = self.compute_bucket(hash);

        let mut out = Vec::new();
        self.for_each_entry(bucket, |entry| {
            // Stored hash first: cheap rejection before key equality
            if entry.hash == hash && entry.key == *key {
                out.push(entry.tid);
            }
        })?;
        Ok(out)
    }

    fn initialize_new(&mut self) -> IndexResult<()> {
        self.new_and_flush_page(0, |buf| {
            write_u32_at(buf, META_MAGIC_OFF, MAGIC);
            write_u32_at(buf, META_VERSION_OFF, VERSION);
        })?;
        for page_id in 1..=DIR_PAGES {
            self.new_and_flush_page(page_id, |_| {})?;
        }

        self.meta = Meta {
            bucket_count: INITIAL_BUCKETS,
            lowmask: INITIAL_BUCKETS - 1,
            highmask: INITIAL_BUCKETS - 1,
            split_pointer: 0,
            max_bucket: INITIAL_BUCKETS - 1,
            record_count: 0,
            next_page_id: DATA_START_PAGE,
        };

        for bucket_id in 0..INITIAL_BUCKETS {
            let head = self.allocate_data_page()?;
            self.init_bucket_page(head)?;
            self.set_bucket_head(bucket_id, head)?;
        }

        self.write_meta()?;
        debug!(index = %self.def.name, "initialized hash index file");
        Ok(())
    }

    fn load_meta(&mut self) -> IndexResult<()> {
        let page = self.pool.get_page(&self.key(0))?;
        let buf = page.bytes();

        let magic = read_u32_at(buf, META_MAGIC_OFF);
        if magic != MAGIC {
            return Err(IndexError::BadMagic(magic));
        }
        let version = read_u32_at(buf, META_VERSION_OFF);
        if version != VERSION {
            return Err(IndexError::UnsupportedVersion(version));
        }

        self.meta = Meta {
            bucket_count: read_u32_at(buf, META_BUCKET_COUNT_OFF),
            lowmask: read_u32_at(buf, META_LOWMASK_OFF),
            highmask: read_u32_at(buf, META_HIGHMASK_OFF),
            split_pointer: read_u32_at(buf, META_SPLITPTR_OFF),
            max_bucket: read_u32_at(buf, META_MAXBUCKET_OFF),
            record_count: read_u64_at(buf, META_RECORDCOUNT_OFF),
            next_page_id: read_u32_at(buf, META_NEXT_PAGE_OFF),
        };
        Ok(())
    }

    fn write_meta(&self) -> IndexResult<()> {
        let key = self.key(0);
        let mut page = self.pool.get_page(&key)?;
        let buf = page.bytes_mut();

        write_u32_at(buf, META_MAGIC_OFF, MAGIC);
        write_u32_at(buf, META_VERSION_OFF, VERSION);
        write_u32_at(buf, META_BUCKET_COUNT_OFF, self.meta.bucket_count);
        write_u32_at(buf, META_LOWMASK_OFF, self.meta.lowmask);
        write_u32_at(buf, META_HIGHMASK_OFF, self.meta.highmask);
        write_u32_at(buf, META_SPLITPTR_OFF, self.meta.split_pointer);
        write_u32_at(buf, META_MAXBUCKET_OFF, self.meta.max_bucket);
        write_u64_at(buf, META_RECORDCOUNT_OFF, self.meta.record_count);
        write_u32_at(buf, META_NEXT_PAGE_OFF, self.meta.next_page_id);

        self.pool.update_page(&key, page)?;
        Ok(())
    }

    fn load_factor(&self) -> f64 {
        let capacity = self.meta.bucket_count.max(1) as u64 * TARGET_BUCKET_ENTRIES;
        self.meta.record_count as f64 / capacity as f64
    }

    /// Standard linear-hashing address function: use the wide mask, and
    /// fall back to the narrow one when the addressed bucket has not been
    /// split into existence yet
    fn compute_bucket(&self, hash: u32) -> u32 {
        let bucket = hash & self.meta.highmask;
        if bucket > self.meta.max_bucket {
            hash & self.meta.lowmask
        } else {
            bucket
        }
    }

    fn perform_split(&mut self) -> IndexResult<()> {
        let split_bucket = self.meta.split_pointer;
        let new_bucket = self.meta.max_bucket + 1;

        if new_bucket >= DIR_PAGES * DIR_ENTRIES_PER_PAGE {
            return Err(IndexError::DirectoryFull(new_bucket));
        }

        let new_head = self.allocate_data_page()?;
        self.init_bucket_page(new_head)?;
        self.set_bucket_head(new_bucket, new_head)?;

        self.meta.max_bucket = new_bucket;
        self.meta.bucket_count = new_bucket + 1;
        if self.meta.max_bucket > self.meta.highmask {
            self.meta.highmask = (self.meta.highmask << 1) | 1;
        }
        self.write_meta()?;

        // Re-address every entry of the split-pointer bucket under the
        // widened mask; record count is unchanged by the move
        let moved = self.drain_bucket_chain(split_bucket)?;
        for entry in &moved {
            let target = self.compute_bucket(entry.hash);
            self.insert_into_bucket_chain(target, entry)?;
        }

        self.meta.split_pointer += 1;
        if self.meta.split_pointer == self.meta.lowmask + 1 {
            // A full pass doubled the address space
            self.meta.lowmask = self.meta.highmask;
            self.meta.split_pointer = 0;
        }
        self.write_meta()?;

        debug!(
            index = %self.def.name,
            buckets = self.meta.bucket_count,
            moved = moved.len(),
            "hash index split"
        );
        Ok(())
    }

    fn drain_bucket_chain(&mut self, bucket: u32) -> IndexResult<Vec<Entry>> {
        let head = self.bucket_head(bucket)?;

        let mut out = Vec::new();
        let mut current = head as i32;
        while current != NO_PAGE && current != 0 {
            let page = self.pool.get_page(&self.key(current as PageId))?;
            self.read_entries(&page, &mut out)?;
            current = read_i32_at(page.bytes(), BUCKET_NEXT_OVERFLOW_OFF);
        }

        // Only the head is recycled; drained overflow pages stay orphaned
        self.reset_bucket_page(head)?;
        Ok(out)
    }

    fn insert_into_bucket_chain(&mut self, bucket: u32, entry: &Entry) -> IndexResult<()> {
        let mut current = self.bucket_head(bucket)?;
        if current == 0 {
            return Err(IndexError::BucketUninitialized(bucket));
        }

        let entry_bytes = encode_entry(entry)?;

        loop {
            let key = self.key(current);
            let mut page = self.pool.get_page(&key)?;

            let mut free = read_u32_at(page.bytes(), BUCKET_FREE_OFF) as usize;
            if free < BUCKET_DATA_OFF {
                // Page was allocated but never stamped; stamp it now
                stamp_empty_bucket(page.bytes_mut());
                free = BUCKET_DATA_OFF;
            }

            if free + entry_bytes.len() <= PAGE_SIZE {
                page.bytes_mut()[free..free + entry_bytes.len()].copy_from_slice(&entry_bytes);
                write_u32_at(page.bytes_mut(), BUCKET_FREE_OFF, (free + entry_bytes.len()) as u32);
                let count = read_u32_at(page.bytes(), BUCKET_ENTRY_COUNT_OFF);
                write_u32_at(page.bytes_mut(), BUCKET_ENTRY_COUNT_OFF, count + 1);

                self.pool.update_page(&key, page)?;
                return Ok(());
            }

            let next = read_i32_at(page.bytes(), BUCKET_NEXT_OVERFLOW_OFF);
            if next == NO_PAGE {
                let overflow = self.allocate_data_page()?;
                self.init_bucket_page(overflow)?;
                write_i32_at(page.bytes_mut(), BUCKET_NEXT_OVERFLOW_OFF, overflow as i32);
                self.pool.update_page(&key, page)?;
                current = overflow;
            } else {
                current = next as PageId;
            }
        }
    }

    fn for_each_entry(
        &self,
        bucket: u32,
        mut consumer: impl FnMut(&Entry),
    ) -> IndexResult<()> {
        let mut current = self.bucket_head(bucket)? as i32;
        let mut entries = Vec::new();
        while current != NO_PAGE && current != 0 {
            let page = self.pool.get_page(&self.key(current as PageId))?;
            entries.clear();
            self.read_entries(&page, &mut entries)?;
            for entry in &entries {
                consumer(entry);
            }
            current = read_i32_at(page.bytes(), BUCKET_NEXT_OVERFLOW_OFF);
        }
        Ok(())
    }

    fn read_entries(&self, page: &HeapPage, out: &mut Vec<Entry>) -> IndexResult<()> {
        let buf = page.bytes();
        let count = read_u32_at(buf, BUCKET_ENTRY_COUNT_OFF);
        let mut off = BUCKET_DATA_OFF;
        for _ in 0..count {
            let (entry, next_off) = self.decode_entry(buf, off)?;
            out.push(entry);
            off = next_off;
        }
        Ok(())
    }

    fn decode_entry(&self, buf: &[u8], mut off: usize) -> IndexResult<(Entry, usize)> {
        let hash = read_u32_at(buf, off);
        off += 4;

        let key = match self.key_type {
            DataType::Int64 => {
                let key = IndexKey::decode(DataType::Int64, &buf[off..off + 8])?;
                off += 8;
                key
            }
            DataType::Varchar => {
                let len = read_u16_at(buf, off) as usize;
                off += 2;
                let key = IndexKey::decode(DataType::Varchar, &buf[off..off + len])?;
                off += len;
                key
            }
        };

        let tid = Tid::read_from(&buf[off..off + Tid::ENCODED_LEN]);
        off += Tid::ENCODED_LEN;

        Ok((Entry { hash, key, tid }, off))
    }

    fn init_bucket_page(&self, page_id: PageId) -> IndexResult<()> {
        let key = self.key(page_id);
        let mut page = self.pool.get_page(&key)?;
        stamp_empty_bucket(page.bytes_mut());
        self.pool.update_page(&key, page)?;
        Ok(())
    }

    fn reset_bucket_page(&self, page_id: PageId) -> IndexResult<()> {
        self.init_bucket_page(page_id)
    }

    /// Draw a fresh page id from the meta allocator, persisting the
    /// counter before the page is used
    fn allocate_data_page(&mut self) -> IndexResult<PageId> {
        let id = self.meta.next_page_id;
        self.meta.next_page_id += 1;
        self.write_meta()?;

        let key = self.key(id);
        let page = HeapPage::new(id);
        self.pool.new_page(&key, page.clone())?;
        self.pool.update_page(&key, page)?;
        Ok(id)
    }

    fn bucket_head(&self, bucket: u32) -> IndexResult<PageId> {
        let (key, off) = self.directory_slot(bucket);
        let page = self.pool.get_page(&key)?;
        Ok(read_u32_at(page.bytes(), off))
    }

    fn set_bucket_head(&self, bucket: u32, head: PageId) -> IndexResult<()> {
        let (key, off) = self.directory_slot(bucket);
        let mut page = self.pool.get_page(&key)?;
        write_u32_at(page.bytes_mut(), off, head);
        self.pool.update_page(&key, page)?;
        Ok(())
    }

    fn directory_slot(&self, bucket: u32) -> (PageKey, usize) {
        let dir_page = 1 + bucket / DIR_ENTRIES_PER_PAGE;
        let slot = (bucket % DIR_ENTRIES_PER_PAGE) as usize;
        (self.key(dir_page), HEADER_SIZE + slot * DIR_ENTRY_BYTES)
    }

    fn new_and_flush_page(
        &self,
        page_id: PageId,
        init: impl FnOnce(&mut [u8]),
    ) -> IndexResult<()> {
        let key = self.key(page_id);
        let mut page = HeapPage::new(page_id);
        init(page.bytes_mut());
        self.pool.new_page(&key, page.clone())?;
        self.pool.update_page(&key, page)?;
        self.pool.flush_page(&key)?;
        Ok(())
    }

    fn check_key_type(&self, key: &IndexKey) -> IndexResult<()> {
        if key.data_type() != self.key_type {
            return Err(IndexError::KeyTypeMismatch {
                expected: self.key_type,
                actual: key.data_type(),
            });
        }
        Ok(())
    }

    fn key(&self, page_id: PageId) -> PageKey {
        PageKey::new(self.def.file_node.clone(), page_id)
    }
}

fn stamp_empty_bucket(buf: &mut [u8]) {
    write_i32_at(buf, BUCKET_NEXT_OVERFLOW_OFF, NO_PAGE);
    write_u32_at(buf, BUCKET_ENTRY_COUNT_OFF, 0);
    write_u32_at(buf, BUCKET_FREE_OFF, BUCKET_DATA_OFF as u32);
}

/// Entry layout: hash u32, key payload (INT64: 8 bytes; TEXT: u16 length
/// + bytes), then the 6-byte TID
fn encode_entry(entry: &Entry) -> IndexResult<Vec<u8>> {
    let key_bytes = entry.key.encode()?;
    let mut out = match entry.key {
        IndexKey::Int64(_) => {
            let mut out = Vec::with_capacity(4 + 8 + Tid::ENCODED_LEN);
            out.extend_from_slice(&entry.hash.to_be_bytes());
            out.extend_from_slice(&key_bytes);
            out
        }
        IndexKey::Text(_) => {
            let mut out = Vec::with_capacity(4 + 2 + key_bytes.len() + Tid::ENCODED_LEN);
            out.extend_from_slice(&entry.hash.to_be_bytes());
            out.extend_from_slice(&(key_bytes.len() as u16).to_be_bytes());
            out.extend_from_slice(&key_bytes);
            out
        }
    };
    let mut tid_buf = [0u8; Tid::ENCODED_LEN];
    entry.tid.write_to(&mut tid_buf);
    out.extend_from_slice(&tid_buf);
    Ok(out)
}

fn read_u16_at(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

fn read_u32_at(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn read_u64_at(buf: &[u8], off: usize) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&buf[off..off + 8]);
    u64::from_be_bytes(arr)
}

fn read_i32_at(buf: &[u8], off: usize) -> i32 {
    i32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn write_u32_at(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_be_bytes());
}

fn write_u64_at(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_be_bytes());
}

fn write_i32_at(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LruReplacer;
    use crate::catalog::{Catalog, IndexKind};
    use crate::file::PageFileManager;
    use tempfile::TempDir;

    fn open_pool(root: &std::path::Path, capacity: usize) -> Arc<BufferPoolManager> {
        Arc::new(BufferPoolManager::new(
            capacity,
            PageFileManager::new(),
            Box::new(LruReplacer::new()),
            root,
        ))
    }

    fn int_index_def(root: &std::path::Path) -> IndexDefinition {
        let catalog = Catalog::open(root).unwrap();
        if catalog.table("t").is_err() {
            catalog
                .create_table("t", &[("id".to_string(), DataType::Int64)])
                .unwrap();
        }
        match catalog.index("hidx_t_id") {
            Ok(def) => def,
            Err(_) => catalog
                .create_index("hidx_t_id", "t", "id", IndexKind::Hash)
                .unwrap(),
        }
    }

    #[test]
    fn test_starts_with_sixteen_buckets() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_pool(temp_dir.path(), 128);
        let index = DiskHashIndex::open(pool, int_index_def(temp_dir.path())).unwrap();
        assert_eq!(index.bucket_count(), 16);
        assert_eq!(index.record_count(), 0);
    }

    #[test]
    fn test_insert_search_and_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_pool(temp_dir.path(), 128);
        let mut index = DiskHashIndex::open(pool, int_index_def(temp_dir.path())).unwrap();

        index.insert(&IndexKey::Int64(7), Tid::new(0, 1)).unwrap();
        index.insert(&IndexKey::Int64(7), Tid::new(0, 2)).unwrap();
        index.insert(&IndexKey::Int64(8), Tid::new(0, 3)).unwrap();

        let found = index.search(&IndexKey::Int64(7)).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&Tid::new(0, 1)));
        assert!(found.contains(&Tid::new(0, 2)));

        assert_eq!(index.search(&IndexKey::Int64(8)).unwrap(), vec![Tid::new(0, 3)]);
        assert!(index.search(&IndexKey::Int64(9)).unwrap().is_empty());
    }

    #[test]
    fn test_splits_grow_buckets_and_keep_every_record() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_pool(temp_dir.path(), 256);
        let mut index = DiskHashIndex::open(pool, int_index_def(temp_dir.path())).unwrap();

        let n = 5000i64;
        for i in 0..n {
            index
                .insert(
                    &IndexKey::Int64(i),
                    Tid::new((i / 100) as u32, (i % 100) as u16),
                )
                .unwrap();
        }

        assert!(index.bucket_count() > 16, "expected bucket growth");
        assert_eq!(index.record_count(), n as u64);

        for k in [0i64, 1, 16, 255, 1024, 2500, 4999] {
            let got = index.search(&IndexKey::Int64(k)).unwrap();
            assert_eq!(got, vec![Tid::new((k / 100) as u32, (k % 100) as u16)]);
        }
    }

    #[test]
    fn test_persistence_across_restart() {
        let temp_dir = TempDir::new().unwrap();
        {
            let pool = open_pool(temp_dir.path(), 256);
            let mut index =
                DiskHashIndex::open(Arc::clone(&pool), int_index_def(temp_dir.path())).unwrap();
            for i in 0i64..2000 {
                index.insert(&IndexKey::Int64(i), Tid::new(0, (i % 100) as u16)).unwrap();
            }
            pool.flush_all_pages().unwrap();
        }

        let pool = open_pool(temp_dir.path(), 256);
        let index = DiskHashIndex::open(pool, int_index_def(temp_dir.path())).unwrap();
        assert_eq!(index.record_count(), 2000);
        for k in [0i64, 999, 1999] {
            let got = index.search(&IndexKey::Int64(k)).unwrap();
            assert_eq!(got, vec![Tid::new(0, (k % 100) as u16)]);
        }
    }

    #[test]
    fn test_text_keys() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = Catalog::open(temp_dir.path()).unwrap();
        catalog
            .create_table("s", &[("name".to_string(), DataType::Varchar)])
            .unwrap();
        let def = catalog
            .create_index("hidx_s_name", "s", "name", IndexKind::Hash)
            .unwrap();

        let pool = open_pool(temp_dir.path(), 128);
        let mut index = DiskHashIndex::open(pool, def).unwrap();

        index
            .insert(&IndexKey::Text("alpha".to_string()), Tid::new(0, 0))
            .unwrap();
        index
            .insert(&IndexKey::Text("beta".to_string()), Tid::new(0, 1))
            .unwrap();

        assert_eq!(
            index.search(&IndexKey::Text("alpha".to_string())).unwrap(),
            vec![Tid::new(0, 0)]
        );
        assert!(index
            .search(&IndexKey::Text("gamma".to_string()))
            .unwrap()
            .is_empty());

        let err = index.search(&IndexKey::Int64(1)).unwrap_err();
        assert!(matches!(err, IndexError::KeyTypeMismatch { .. }));
    }
}
