mod error;
mod pool;
mod replacer;
mod writer;

pub use error::{BufferError, BufferResult};
pub use pool::BufferPoolManager;
pub use replacer::{ClockReplacer, LruReplacer, Replacer};
pub use writer::DirtyPageWriter;

use std::fmt;

use crate::file::{HeapPage, PageId};

/// A key identifying a page across the whole cache: the physical file
/// (tablespace) name plus the page's 0-based offset within it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    file_id: String,
    page_id: PageId,
}

impl PageKey {
    pub fn new(file_id: impl Into<String>, page_id: PageId) -> Self {
        Self {
            file_id: file_id.into(),
            page_id,
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_id, self.page_id)
    }
}

/// Cache entry owning one in-memory page plus its bookkeeping state.
///
/// Exactly one slot exists per cached PageKey; slots are created on first
/// touch and destroyed only by eviction.
#[derive(Debug)]
pub struct BufferSlot {
    key: PageKey,
    page: HeapPage,
    dirty: bool,
    pinned: bool,
    usage_count: u64,
}

impl BufferSlot {
    fn new(key: PageKey, page: HeapPage) -> Self {
        Self {
            key,
            page,
            dirty: false,
            pinned: false,
            usage_count: 0,
        }
    }

    pub fn key(&self) -> &PageKey {
        &self.key
    }

    pub fn page(&self) -> &HeapPage {
        &self.page
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }
}
