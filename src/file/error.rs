use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::PageId;

/// Errors raised by operations on a single slotted page
#[derive(Debug, Error)]
pub enum PageError {
    #[error("invalid page signature")]
    BadSignature,

    #[error("not enough space in page: required {required}, free {free}")]
    OutOfSpace { required: usize, free: usize },

    #[error("slot index out of range: {slot} (slot count {slot_count})")]
    SlotOutOfRange { slot: u16, slot_count: u16 },

    #[error("corrupted page: invalid slot bounds (offset={offset}, length={length}, upper={upper})")]
    CorruptSlot { offset: u16, length: u16, upper: u16 },

    #[error("page buffer must be exactly {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

pub type PageResult<T> = Result<T, PageError>;

/// Errors raised by paged file I/O
#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error("file does not exist: {0}")]
    FileNotFound(PathBuf),

    #[error("page {page_id} is out of file bounds (file size {file_size})")]
    PageOutOfBounds { page_id: PageId, file_size: u64 },
}

pub type FileResult<T> = Result<T, FileError>;
