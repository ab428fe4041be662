use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::{FileError, FileResult, PageError};
use super::page::HeapPage;
use super::{PAGE_SIZE, PageId};

/// Byte-exact fixed-size page I/O against a file.
///
/// Stateless apart from I/O counters: no cache, no interpretation of the
/// page's logical content. Every page lives at `page_id * PAGE_SIZE`.
pub struct PageFileManager {
    read_count: AtomicU64,
    write_count: AtomicU64,
}

impl PageFileManager {
    pub fn new() -> Self {
        Self {
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
        }
    }

    /// Write a page at its offset, creating the file and any missing
    /// parent directories
    pub fn write(&self, page: &HeapPage, path: &Path) -> FileResult<()> {
        let bytes = page.bytes();
        if bytes.len() != PAGE_SIZE {
            return Err(PageError::InvalidLength {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            }
            .into());
        }
        if !page.is_valid() {
            return Err(PageError::BadSignature.into());
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        let offset = page.page_id() as u64 * PAGE_SIZE as u64;
        file.seek(SeekFrom::Start(offset))?;
        // write_all loops over partial writes until the buffer is exhausted
        file.write_all(bytes)?;

        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Read the page stored at the given id, validating bounds and
    /// signature
    pub fn read(&self, page_id: PageId, path: &Path) -> FileResult<HeapPage> {
        if !path.exists() {
            return Err(FileError::FileNotFound(path.to_path_buf()));
        }

        let mut file = OpenOptions::new().read(true).open(path)?;
        let file_size = file.metadata()?.len();

        let offset = page_id as u64 * PAGE_SIZE as u64;
        if offset + PAGE_SIZE as u64 > file_size {
            return Err(FileError::PageOutOfBounds { page_id, file_size });
        }

        let mut buf = vec![0u8; PAGE_SIZE];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;

        self.read_count.fetch_add(1, Ordering::Relaxed);
        Ok(HeapPage::from_bytes(page_id, &buf)?)
    }

    /// Total pages read from disk since construction
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Total pages written to disk since construction
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }
}

impl Default for PageFileManager {
    fn default() -> Self {
        Self::new()
    }
}
