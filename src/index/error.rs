use thiserror::Error;

use crate::buffer::BufferError;
use crate::catalog::{CatalogError, DataType, IndexKind};
use crate::file::{PageError, PageId};
use crate::heap::HeapError;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Heap(#[from] HeapError),

    #[error("not an index file (bad magic): {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported index file version: {0}")]
    UnsupportedVersion(u32),

    #[error("index definition kind mismatch: expected {expected:?}, got {actual:?}")]
    WrongIndexKind { expected: IndexKind, actual: IndexKind },

    #[error("key type mismatch: index keys are {expected:?}, got {actual:?}")]
    KeyTypeMismatch { expected: DataType, actual: DataType },

    #[error("index key too large: {len} bytes")]
    KeyTooLarge { len: usize },

    #[error("bad key encoding: {0}")]
    BadKeyEncoding(String),

    #[error("operation not supported by this index kind: {0}")]
    UnsupportedOperation(&'static str),

    #[error("bucket directory capacity exceeded: bucket {0}")]
    DirectoryFull(u32),

    #[error("bucket head is not initialized: bucket {0}")]
    BucketUninitialized(u32),

    #[error("node serialization exceeds page capacity: {size} bytes")]
    NodeTooLarge { size: usize },

    #[error("corrupted index node at page {page_id}: {detail}")]
    CorruptNode { page_id: PageId, detail: String },
}

pub type IndexResult<T> = Result<T, IndexError>;
