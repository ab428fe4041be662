use std::path::PathBuf;
use std::time::Duration;

/// Eviction policy selector for the buffer pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacerKind {
    #[default]
    Lru,
    Clock,
}

/// Number of pages in the buffer pool by default.
/// 1024 pages x 8KB = 8MB of cached data.
pub const DEFAULT_POOL_SIZE: usize = 1024;

/// Tuning knobs for a storage engine instance
#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Directory under which every file id resolves
    pub root: PathBuf,
    /// Buffer pool capacity in pages
    pub pool_size: usize,
    pub replacer: ReplacerKind,
    /// Period of the background dirty-page flush loop
    pub flush_interval: Duration,
    /// Max pages flushed per background iteration
    pub flush_batch_size: usize,
    /// Period of the full-checkpoint loop
    pub checkpoint_interval: Duration,
}

impl StorageOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pool_size: DEFAULT_POOL_SIZE,
            replacer: ReplacerKind::default(),
            flush_interval: Duration::from_millis(200),
            flush_batch_size: 64,
            checkpoint_interval: Duration::from_secs(30),
        }
    }
}
