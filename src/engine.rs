use std::sync::Arc;

use thiserror::Error;

use crate::buffer::{
    BufferError, BufferPoolManager, ClockReplacer, DirtyPageWriter, LruReplacer, Replacer,
};
use crate::catalog::{Catalog, CatalogError};
use crate::config::{ReplacerKind, StorageOptions};
use crate::file::PageFileManager;
use crate::heap::{HeapError, LockRegistry, TableHeap};
use crate::index::{IndexError, IndexManager};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Heap(#[from] HeapError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Process root for one storage directory: owns the buffer pool, the
/// catalog, the per-file lock registry, the open-index cache and the
/// background writer, and wires them together.
pub struct StorageEngine {
    pool: Arc<BufferPoolManager>,
    catalog: Arc<Catalog>,
    locks: LockRegistry,
    indexes: IndexManager,
    writer: DirtyPageWriter,
}

impl StorageEngine {
    pub fn open(options: StorageOptions) -> EngineResult<Self> {
        let replacer: Box<dyn Replacer> = match options.replacer {
            ReplacerKind::Lru => Box::new(LruReplacer::new()),
            ReplacerKind::Clock => Box::new(ClockReplacer::new()),
        };

        let pool = Arc::new(BufferPoolManager::new(
            options.pool_size,
            PageFileManager::new(),
            replacer,
            &options.root,
        ));
        let catalog = Arc::new(Catalog::open(&options.root)?);
        let indexes = IndexManager::new(Arc::clone(&pool), Arc::clone(&catalog));
        let writer = DirtyPageWriter::new(
            Arc::clone(&pool),
            options.flush_interval,
            options.flush_batch_size,
            options.checkpoint_interval,
        );

        Ok(Self {
            pool,
            catalog,
            locks: LockRegistry::new(),
            indexes,
            writer,
        })
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.pool
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn index_manager(&self) -> &IndexManager {
        &self.indexes
    }

    /// Open a heap over an existing table
    pub fn table_heap(&self, table_name: &str) -> EngineResult<TableHeap> {
        let table = self.catalog.table(table_name)?;
        Ok(TableHeap::new(
            Arc::clone(&self.pool),
            Arc::clone(&self.catalog),
            &self.locks,
            table,
        ))
    }

    /// Start the periodic batched flush; idempotent
    pub fn start_background_writer(&self) {
        self.writer.start_background_writer();
    }

    /// Start the periodic full checkpoint; idempotent
    pub fn start_checkpointer(&self) {
        self.writer.start_checkpointer();
    }

    /// Flush every dirty page, the crate's durability boundary. Called
    /// after any non-read statement and before an orderly shutdown.
    pub fn checkpoint(&self) -> EngineResult<()> {
        self.pool.flush_all_pages()?;
        Ok(())
    }
}

// Writer threads stop and join when the engine drops (DirtyPageWriter's
// own Drop), so teardown is deterministic in tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DataType, IndexKind};
    use crate::heap::Value;
    use crate::index::IndexKey;
    use tempfile::TempDir;

    fn options(root: &std::path::Path) -> StorageOptions {
        let mut options = StorageOptions::new(root);
        options.pool_size = 64;
        options
    }

    #[test]
    fn test_end_to_end_heap_and_indexes() {
        let temp_dir = TempDir::new().unwrap();
        let engine = StorageEngine::open(options(temp_dir.path())).unwrap();

        engine
            .catalog()
            .create_table(
                "users",
                &[
                    ("id".to_string(), DataType::Int64),
                    ("name".to_string(), DataType::Varchar),
                ],
            )
            .unwrap();

        let heap = engine.table_heap("users").unwrap();
        for i in 0i64..300 {
            heap.insert_row(&[Value::Int64(i), Value::Varchar(format!("user-{i}"))])
                .unwrap();
        }

        let table = engine.catalog().table("users").unwrap();
        let btree_def = engine
            .catalog()
            .create_index("users_id_btree", "users", "id", IndexKind::BTree)
            .unwrap();
        let hash_def = engine
            .catalog()
            .create_index("users_name_hash", "users", "name", IndexKind::Hash)
            .unwrap();

        engine
            .index_manager()
            .create_and_build(&btree_def, &heap)
            .unwrap();
        engine
            .index_manager()
            .create_and_build(&hash_def, &heap)
            .unwrap();

        let by_id = engine.index_manager().open_by_name("users_id_btree").unwrap();
        let found = by_id
            .lock()
            .unwrap()
            .search(&IndexKey::Int64(123))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            heap.read_row(found[0]).unwrap()[1],
            Value::Varchar("user-123".to_string())
        );

        let by_name = engine
            .index_manager()
            .open_by_name("users_name_hash")
            .unwrap();
        let found = by_name
            .lock()
            .unwrap()
            .search(&IndexKey::Text("user-42".to_string()))
            .unwrap();
        assert_eq!(found.len(), 1);

        // Hash indexes reject ordered scans
        let err = by_name
            .lock()
            .unwrap()
            .range_search(None, true, None, true)
            .unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedOperation(_)));

        assert_eq!(engine.index_manager().indexes_for_table(table.oid).unwrap().len(), 2);

        engine.checkpoint().unwrap();
    }

    #[test]
    fn test_restart_reopens_same_files() {
        let temp_dir = TempDir::new().unwrap();
        {
            let engine = StorageEngine::open(options(temp_dir.path())).unwrap();
            engine
                .catalog()
                .create_table("events", &[("id".to_string(), DataType::Int64)])
                .unwrap();
            let heap = engine.table_heap("events").unwrap();
            for i in 0i64..50 {
                heap.insert_row(&[Value::Int64(i)]).unwrap();
            }
            engine.checkpoint().unwrap();
        }

        let engine = StorageEngine::open(options(temp_dir.path())).unwrap();
        let heap = engine.table_heap("events").unwrap();
        let rows: Vec<_> = heap
            .scan_tids()
            .unwrap()
            .map(|tid| heap.read_row(tid.unwrap()).unwrap())
            .collect();
        assert_eq!(rows.len(), 50);
        assert_eq!(rows[49], vec![Value::Int64(49)]);
    }

    #[test]
    fn test_background_writer_starts_idempotently() {
        let temp_dir = TempDir::new().unwrap();
        let engine = StorageEngine::open(options(temp_dir.path())).unwrap();
        engine.start_background_writer();
        engine.start_background_writer();
        engine.start_checkpointer();
        engine.start_checkpointer();
        // Engine drop joins the threads
    }
}
