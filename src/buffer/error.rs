use thiserror::Error;

use super::PageKey;
use crate::file::FileError;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error("page already exists in buffer: {0}")]
    AlreadyCached(PageKey),

    #[error("no eviction victim available (all pages pinned)")]
    NoVictimAvailable,
}

pub type BufferResult<T> = Result<T, BufferError>;
