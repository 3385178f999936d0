use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-wide runtime configuration shared by every index built on top
/// of this crate. Thread-safe via atomics so it can be tuned while a
/// search is in flight.
#[derive(Debug)]
pub struct RuntimeConfig {
    /// Width of bounded parallel regions (add / search / range_search).
    /// Zero means "let rayon's global pool decide".
    pub num_threads: AtomicUsize,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self {
            num_threads: AtomicUsize::new(0),
        }
    }

    pub fn get_num_threads(&self) -> usize {
        self.num_threads.load(Ordering::Relaxed)
    }

    pub fn set_num_threads(&self, val: usize) {
        self.num_threads.store(val, Ordering::Relaxed);
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}
