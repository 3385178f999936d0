use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide monotonic counters, additive across concurrent
/// searches. There is no per-search isolation: two searches running at
/// once both contribute to the same sink.
///
/// Mirrors `hyperspace_core::config::GlobalConfig`'s pattern of plain
/// atomics with load/fetch_add accessors, one field per observable.
#[derive(Debug, Default)]
pub struct Stats {
    nq: AtomicU64,
    nlist: AtomicU64,
    ndis: AtomicU64,
    nheap_updates: AtomicU64,
    quantization_time_ms: AtomicU64,
    search_time_ms: AtomicU64,
}

/// A snapshot taken by a single thread during a parallel region. Merged
/// into the global [`Stats`] sink once, at the region boundary, to
/// avoid contention on shared counters from every scan.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatsDelta {
    pub nq: u64,
    pub nlist: u64,
    pub ndis: u64,
    pub nheap_updates: u64,
}

impl StatsDelta {
    pub fn merge(&mut self, other: StatsDelta) {
        self.nq += other.nq;
        self.nlist += other.nlist;
        self.ndis += other.ndis;
        self.nheap_updates += other.nheap_updates;
    }
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, delta: StatsDelta) {
        self.nq.fetch_add(delta.nq, Ordering::Relaxed);
        self.nlist.fetch_add(delta.nlist, Ordering::Relaxed);
        self.ndis.fetch_add(delta.ndis, Ordering::Relaxed);
        self.nheap_updates
            .fetch_add(delta.nheap_updates, Ordering::Relaxed);
    }

    pub fn add_quantization_time_ms(&self, ms: u64) {
        self.quantization_time_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn add_search_time_ms(&self, ms: u64) {
        self.search_time_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn nq(&self) -> u64 {
        self.nq.load(Ordering::Relaxed)
    }

    pub fn nlist(&self) -> u64 {
        self.nlist.load(Ordering::Relaxed)
    }

    pub fn ndis(&self) -> u64 {
        self.ndis.load(Ordering::Relaxed)
    }

    pub fn nheap_updates(&self) -> u64 {
        self.nheap_updates.load(Ordering::Relaxed)
    }

    pub fn quantization_time_ms(&self) -> u64 {
        self.quantization_time_ms.load(Ordering::Relaxed)
    }

    pub fn search_time_ms(&self) -> u64 {
        self.search_time_ms.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.nq.store(0, Ordering::Relaxed);
        self.nlist.store(0, Ordering::Relaxed);
        self.ndis.store(0, Ordering::Relaxed);
        self.nheap_updates.store(0, Ordering::Relaxed);
        self.quantization_time_ms.store(0, Ordering::Relaxed);
        self.search_time_ms.store(0, Ordering::Relaxed);
    }
}
