//! Fixed-capacity priority queue over flat `(heap_d, heap_i)` arrays,
//! parameterized by [`MetricType`] instead of a fixed comparator. This is
//! the shared heap protocol [`crate::collaborators::ListScanner`]
//! implementations scan into: a min-heap for inner product (root holds
//! the smallest accepted score, the threshold to beat) and a max-heap
//! for L2 (root holds the largest accepted distance).
//!
//! Capacity is the array length and never changes; empty slots are
//! pre-filled with the metric's worst sentinel and id `-1` so a plain
//! "is this candidate better than the root" check works uniformly
//! whether or not the heap is "full" yet.

use crate::metric::MetricType;

#[inline]
fn is_worse(metric: MetricType, a: f32, b: f32) -> bool {
    // a is worse than b iff b would be picked over a, i.e. b is better.
    metric.is_better(b, a)
}

/// Resets a heap to its empty state: every slot holds the metric's worst
/// sentinel distance and id `-1`.
pub fn heapify(heap_d: &mut [f32], heap_i: &mut [i64], metric: MetricType) {
    let sentinel = metric.worst_sentinel();
    heap_d.fill(sentinel);
    heap_i.fill(-1);
}

fn sift_down(heap_d: &mut [f32], heap_i: &mut [i64], metric: MetricType, mut i: usize) {
    let n = heap_d.len();
    loop {
        let l = 2 * i + 1;
        let r = 2 * i + 2;
        let mut worst = i;
        if l < n && is_worse(metric, heap_d[worst], heap_d[l]) {
            worst = l;
        }
        if r < n && is_worse(metric, heap_d[worst], heap_d[r]) {
            worst = r;
        }
        if worst == i {
            break;
        }
        heap_d.swap(i, worst);
        heap_i.swap(i, worst);
        i = worst;
    }
}

/// Pushes a replace-the-worst candidate. Returns `true` iff the
/// candidate was strictly better than the current root and was
/// inserted. Ties keep the incumbent — whichever candidate the scanner
/// offered first wins.
pub fn heap_push(heap_d: &mut [f32], heap_i: &mut [i64], metric: MetricType, d: f32, id: i64) -> bool {
    if heap_d.is_empty() {
        return false;
    }
    if metric.is_better(d, heap_d[0]) {
        heap_d[0] = d;
        heap_i[0] = id;
        sift_down(heap_d, heap_i, metric, 0);
        true
    } else {
        false
    }
}

/// k-way merge: pushes every `(d, id)` pair from `src` into `dst`,
/// returning the number that were actually inserted. Used to fold a
/// per-thread private heap into the final per-query heap (parallel
/// mode 1).
pub fn heap_addn(
    heap_d: &mut [f32],
    heap_i: &mut [i64],
    metric: MetricType,
    src_d: &[f32],
    src_i: &[i64],
) -> usize {
    let mut n = 0;
    for (&d, &id) in src_d.iter().zip(src_i.iter()) {
        if id < 0 {
            continue;
        }
        if heap_push(heap_d, heap_i, metric, d, id) {
            n += 1;
        }
    }
    n
}

/// In-place reorder from heap order into fully sorted order: ascending
/// distance for L2, descending similarity for inner product (best
/// result first either way).
pub fn heap_reorder(heap_d: &mut [f32], heap_i: &mut [i64], metric: MetricType) {
    let mut n = heap_d.len();
    while n > 1 {
        heap_d.swap(0, n - 1);
        heap_i.swap(0, n - 1);
        n -= 1;
        sift_down(&mut heap_d[..n], &mut heap_i[..n], metric, 0);
    }
}
