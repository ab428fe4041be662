use std::path::PathBuf;
use thiserror::Error;

use crate::buffer::BufferError;
use crate::catalog::{CatalogError, DataType};
use crate::file::PageError;

#[derive(Debug, Error)]
pub enum HeapError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupted heap file (size {size} is not a multiple of the page size): {path}")]
    CorruptFile { path: PathBuf, size: u64 },

    #[error("row column count mismatch: row has {row}, schema has {schema}")]
    ColumnCountMismatch { row: usize, schema: usize },

    #[error("value does not match column type {expected:?}")]
    TypeMismatch { expected: DataType },

    #[error("VARCHAR exceeds 255 bytes in UTF-8: {len}")]
    VarcharTooLong { len: usize },

    #[error("bad field encoding: {0}")]
    BadFieldEncoding(String),
}

pub type HeapResult<T> = Result<T, HeapError>;
