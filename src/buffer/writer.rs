use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use super::BufferPoolManager;

/// Shared stop signal the worker threads park on between iterations,
/// so `stop` interrupts a sleeping loop immediately instead of waiting
/// out the interval
struct Shutdown {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl Shutdown {
    fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    /// Sleep for `timeout` or until stopped; returns true once stopped
    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.stopped.lock().unwrap();
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap();
        *guard
    }

    fn trigger(&self) {
        *self.stopped.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

/// Background maintenance for the buffer pool: a periodic batched flush
/// of dirty pages and a periodic full checkpoint.
///
/// Both loops start at most once, survive failing iterations, and join
/// deterministically on `stop` (also invoked on drop).
pub struct DirtyPageWriter {
    pool: Arc<BufferPoolManager>,
    flush_interval: Duration,
    flush_batch_size: usize,
    checkpoint_interval: Duration,

    shutdown: Arc<Shutdown>,
    background_started: AtomicBool,
    checkpoint_started: AtomicBool,
    background_handle: Mutex<Option<JoinHandle<()>>>,
    checkpoint_handle: Mutex<Option<JoinHandle<()>>>,
}

impl DirtyPageWriter {
    pub fn new(
        pool: Arc<BufferPoolManager>,
        flush_interval: Duration,
        flush_batch_size: usize,
        checkpoint_interval: Duration,
    ) -> Self {
        assert!(flush_batch_size > 0, "flush batch size must be > 0");
        assert!(
            !flush_interval.is_zero() && !checkpoint_interval.is_zero(),
            "writer intervals must be > 0"
        );
        Self {
            pool,
            flush_interval,
            flush_batch_size,
            checkpoint_interval,
            shutdown: Arc::new(Shutdown::new()),
            background_started: AtomicBool::new(false),
            checkpoint_started: AtomicBool::new(false),
            background_handle: Mutex::new(None),
            checkpoint_handle: Mutex::new(None),
        }
    }

    /// Start the batched dirty-page flush loop; subsequent calls are
    /// no-ops
    pub fn start_background_writer(&self) {
        if self.background_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let pool = Arc::clone(&self.pool);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.flush_interval;
        let batch_size = self.flush_batch_size;

        let handle = std::thread::Builder::new()
            .name("dirty-page-writer".into())
            .spawn(move || {
                while !shutdown.wait(interval) {
                    let dirty = pool.dirty_keys();
                    for key in dirty.into_iter().take(batch_size) {
                        if let Err(err) = pool.flush_page(&key) {
                            // One failing page must not stop the loop
                            warn!(key = %key, error = %err, "background flush failed");
                        }
                    }
                }
                debug!("background writer stopped");
            })
            .expect("failed to spawn dirty-page-writer thread");

        *self.background_handle.lock().unwrap() = Some(handle);
    }

    /// Start the full-checkpoint loop; subsequent calls are no-ops
    pub fn start_checkpointer(&self) {
        if self.checkpoint_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let pool = Arc::clone(&self.pool);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.checkpoint_interval;

        let handle = std::thread::Builder::new()
            .name("checkpointer".into())
            .spawn(move || {
                while !shutdown.wait(interval) {
                    if let Err(err) = pool.flush_all_pages() {
                        warn!(error = %err, "checkpoint failed");
                    }
                }
                debug!("checkpointer stopped");
            })
            .expect("failed to spawn checkpointer thread");

        *self.checkpoint_handle.lock().unwrap() = Some(handle);
    }

    /// Signal both loops to stop and join them
    pub fn stop(&self) {
        self.shutdown.trigger();
        if let Some(handle) = self.background_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.checkpoint_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DirtyPageWriter {
    fn drop(&mut self) {
        self.stop();
    }
}
