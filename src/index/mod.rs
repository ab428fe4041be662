//! On-disk secondary indexes: linear hashing and a B+tree, both
//! addressing their pages exclusively through the buffer pool by
//! (file id, page id).

mod btree;
mod error;
mod hash;

pub use btree::DiskBTreeIndex;
pub use error::{IndexError, IndexResult};
pub use hash::DiskHashIndex;

use std::sync::{Arc, Mutex};

use ahash::AHashMap;

use crate::buffer::BufferPoolManager;
use crate::catalog::{Catalog, DataType, IndexDefinition, IndexKind};
use crate::heap::{TableHeap, Tid, Value};

/// Maximum encoded key length (u16 length prefix on disk)
const MAX_KEY_LEN: usize = 0xFFFF;

/// A typed index key.
///
/// Keys compare by the natural ordering of their type; mixing variants
/// against an index of the other key type is rejected up front, so the
/// derived cross-variant ordering is never observed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    Int64(i64),
    Text(String),
}

impl IndexKey {
    pub fn data_type(&self) -> DataType {
        match self {
            IndexKey::Int64(_) => DataType::Int64,
            IndexKey::Text(_) => DataType::Varchar,
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            IndexKey::Int64(_) => 8,
            IndexKey::Text(s) => s.len(),
        }
    }

    fn encode(&self) -> IndexResult<Vec<u8>> {
        match self {
            IndexKey::Int64(v) => Ok(v.to_be_bytes().to_vec()),
            IndexKey::Text(s) => {
                if s.len() > MAX_KEY_LEN {
                    return Err(IndexError::KeyTooLarge { len: s.len() });
                }
                Ok(s.as_bytes().to_vec())
            }
        }
    }

    fn decode(data_type: DataType, bytes: &[u8]) -> IndexResult<Self> {
        match data_type {
            DataType::Int64 => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    IndexError::BadKeyEncoding(format!(
                        "INT64 key must be 8 bytes, got {}",
                        bytes.len()
                    ))
                })?;
                Ok(IndexKey::Int64(i64::from_be_bytes(arr)))
            }
            DataType::Varchar => {
                let s = std::str::from_utf8(bytes).map_err(|e| {
                    IndexError::BadKeyEncoding(format!("key is not valid UTF-8: {e}"))
                })?;
                Ok(IndexKey::Text(s.to_string()))
            }
        }
    }
}

impl From<Value> for IndexKey {
    fn from(value: Value) -> Self {
        match value {
            Value::Int64(v) => IndexKey::Int64(v),
            Value::Varchar(s) => IndexKey::Text(s),
        }
    }
}

/// Deterministic 31-bit key hash for the hash index.
///
/// Stored entries carry this hash on disk, so it must be stable across
/// processes; the randomly seeded hashers used for in-memory maps are
/// unsuitable here.
fn key_hash(key: &IndexKey) -> u32 {
    let h = match key {
        IndexKey::Int64(v) => {
            let v = *v as u64;
            (v ^ (v >> 32)) as u32
        }
        IndexKey::Text(s) => s
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32)),
    };
    h & 0x7fff_ffff
}

/// The two index backends as a closed variant; no further kinds are
/// anticipated
pub enum Index {
    Hash(DiskHashIndex),
    BTree(DiskBTreeIndex),
}

impl Index {
    /// Open (or initialize) the index described by the definition
    pub fn open(pool: Arc<BufferPoolManager>, def: IndexDefinition) -> IndexResult<Self> {
        match def.kind {
            IndexKind::Hash => Ok(Index::Hash(DiskHashIndex::open(pool, def)?)),
            IndexKind::BTree => Ok(Index::BTree(DiskBTreeIndex::open(pool, def)?)),
        }
    }

    pub fn definition(&self) -> &IndexDefinition {
        match self {
            Index::Hash(index) => index.definition(),
            Index::BTree(index) => index.definition(),
        }
    }

    pub fn insert(&mut self, key: &IndexKey, tid: Tid) -> IndexResult<()> {
        match self {
            Index::Hash(index) => index.insert(key, tid),
            Index::BTree(index) => index.insert(key, tid),
        }
    }

    /// Exact-match lookup; duplicate keys yield multiple TIDs
    pub fn search(&self, key: &IndexKey) -> IndexResult<Vec<Tid>> {
        match self {
            Index::Hash(index) => index.search(key),
            Index::BTree(index) => index.search(key),
        }
    }

    /// Ordered range lookup; statically unsupported for hash indexes
    pub fn range_search(
        &self,
        from: Option<&IndexKey>,
        from_inclusive: bool,
        to: Option<&IndexKey>,
        to_inclusive: bool,
    ) -> IndexResult<Vec<Tid>> {
        match self {
            Index::Hash(_) => Err(IndexError::UnsupportedOperation(
                "HASH index does not support range_search",
            )),
            Index::BTree(index) => index.range_search(from, from_inclusive, to, to_inclusive),
        }
    }
}

/// Caches open index instances by name, one coarse lock per instance:
/// structural mutation (splits) must be atomic relative to concurrent
/// search/insert on the same index
pub struct IndexManager {
    pool: Arc<BufferPoolManager>,
    catalog: Arc<Catalog>,
    open: Mutex<AHashMap<String, Arc<Mutex<Index>>>>,
}

impl IndexManager {
    pub fn new(pool: Arc<BufferPoolManager>, catalog: Arc<Catalog>) -> Self {
        Self {
            pool,
            catalog,
            open: Mutex::new(AHashMap::new()),
        }
    }

    /// Fetch the cached instance for a definition, opening it on first
    /// use
    pub fn get_or_open(&self, def: &IndexDefinition) -> IndexResult<Arc<Mutex<Index>>> {
        let mut open = self.open.lock().unwrap();
        if let Some(index) = open.get(&def.name) {
            return Ok(Arc::clone(index));
        }
        let index = Arc::new(Mutex::new(Index::open(
            Arc::clone(&self.pool),
            def.clone(),
        )?));
        open.insert(def.name.clone(), Arc::clone(&index));
        Ok(index)
    }

    /// Resolve an index by catalog name and open it
    pub fn open_by_name(&self, name: &str) -> IndexResult<Arc<Mutex<Index>>> {
        let def = self.catalog.index(name)?;
        self.get_or_open(&def)
    }

    /// All indexes registered for a table, opened as needed
    pub fn indexes_for_table(&self, table_oid: u32) -> IndexResult<Vec<Arc<Mutex<Index>>>> {
        self.catalog
            .list_indexes(table_oid)
            .iter()
            .map(|def| self.get_or_open(def))
            .collect()
    }

    /// Open an index and populate it from the existing rows of its table
    pub fn create_and_build(
        &self,
        def: &IndexDefinition,
        heap: &TableHeap,
    ) -> IndexResult<Arc<Mutex<Index>>> {
        let index = self.get_or_open(def)?;
        {
            let mut guard = index.lock().unwrap();
            for tid in heap.scan_tids()? {
                let tid = tid?;
                let row = heap.read_row(tid)?;
                let value = row
                    .into_iter()
                    .nth(def.column_position)
                    .ok_or_else(|| IndexError::CorruptNode {
                        page_id: tid.page_id,
                        detail: format!("row has no column {}", def.column_position),
                    })?;
                guard.insert(&IndexKey::from(value), tid)?;
            }
        }
        Ok(index)
    }
}
