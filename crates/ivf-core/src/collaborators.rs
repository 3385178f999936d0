//! Contracts for the pieces external to the IVF core: a concrete
//! coarse quantizer, a concrete vector codec and its per-list scanner.
//! The IVF engine in `ivf-index` is generic over these traits; this
//! crate also ships minimal, correct reference implementations (see
//! [`crate::flat`]) so the engine is exercisable without a real
//! product/residual quantizer.

use crate::error::IvfResult;
use crate::filter::FilterBitset;
use crate::metric::MetricType;

/// Maps vectors to nearest-centroid list ids. Owned and driven by the
/// level-1 quantizer wrapper (C3); trained either by delegating fully
/// to this quantizer (`quantizer_trains_alone == 1`) or by having the
/// wrapper run k-means and `add` the resulting centroids itself.
pub trait CoarseQuantizer: Send + Sync {
    fn d(&self) -> usize;
    fn metric_type(&self) -> MetricType;
    fn is_trained(&self) -> bool;
    fn ntotal(&self) -> usize;

    /// Resets to the untrained, empty state.
    fn reset(&mut self);

    /// Trains on `n` vectors of dimension `d()`, flattened row-major in
    /// `x`. Implementations that cannot train themselves (most don't,
    /// by default) may treat this as a no-op and rely on the wrapper
    /// calling `add` directly.
    fn train(&mut self, n: usize, x: &[f32]) -> IvfResult<()>;

    /// Appends `n` already-trained centroids to this quantizer.
    fn add(&mut self, n: usize, x: &[f32]) -> IvfResult<()>;

    /// For each of `n` query vectors, writes the single nearest
    /// centroid id into `out_ids` (`-1` if the quantizer is empty).
    fn assign(&self, n: usize, x: &[f32], out_ids: &mut [i64]);

    /// For each of `n` query vectors, writes the `k` nearest centroid
    /// ids (and their scores) into `out_dis`/`out_ids`, best first.
    /// Short ids are `-1` with the metric's worst sentinel score if
    /// fewer than `k` centroids exist.
    fn search(&self, n: usize, x: &[f32], k: usize, out_dis: &mut [f32], out_ids: &mut [i64]);
}

/// Encodes vectors into per-entry byte codes and builds the per-list
/// scanner used to score a posting list against a query (C5/C7).
pub trait Codec: Send + Sync {
    fn d(&self) -> usize;
    fn code_size(&self) -> usize;

    /// Optional residual/codebook training step; most codecs need one,
    /// a flat pass-through codec does not.
    fn train_residual(&mut self, _n: usize, _x: &[f32]) -> IvfResult<()> {
        Ok(())
    }

    /// Encodes `n` vectors into `out_codes` (`n * code_size()` bytes).
    /// `list_assignments`, when given, lets list-aware codecs (e.g. a
    /// residual coder) subtract the assigned centroid before encoding.
    /// The coarse (list-id) prefix for the standalone `sa_encode`
    /// format in §6 is prepended by the level-1 quantizer wrapper, not
    /// here — this trait only ever produces `code_size()` bytes.
    fn encode_vectors(
        &self,
        n: usize,
        x: &[f32],
        list_assignments: Option<&[i64]>,
        out_codes: &mut [u8],
    );

    /// Decodes a single entry's code back into a `d()`-length vector.
    /// Base contract: unsupported, unless a concrete codec implements
    /// it.
    fn decode(&self, _code: &[u8], _out: &mut [f32]) -> IvfResult<()> {
        Err(crate::error::IvfError::unsupported(
            "codec does not support reconstruction",
        ))
    }

    fn new_scanner(&self, metric: MetricType, store_pairs: bool) -> Box<dyn ListScanner>;
}

/// Scores a single posting list against a query vector and pushes
/// candidates into a bounded heap (search) or a radius buffer (range
/// search). One instance is created per worker thread and reused
/// across lists and queries within that thread's share of the work.
pub trait ListScanner: Send {
    fn set_query(&mut self, x: &[f32]);

    /// Selects the list this scanner will score next. `coarse_dis` is
    /// the query-to-centroid distance computed during probe selection;
    /// scanners over a residual codec use it to reconstruct absolute
    /// scores from list-relative ones.
    fn set_list(&mut self, list_id: i64, coarse_dis: f32);

    /// Scores `n` entries (`codes`, `ids`) from the current list,
    /// pushing survivors into `(heap_d, heap_i)`. Returns the number of
    /// heap updates performed. `ids` is `None` when the list stores no
    /// explicit id array (offsets serve as ids); `filter`, when
    /// present, excludes matching ids from consideration.
    fn scan_codes(
        &self,
        n: usize,
        codes: &[u8],
        ids: Option<&[i64]>,
        heap_d: &mut [f32],
        heap_i: &mut [i64],
        filter: Option<&dyn FilterBitset>,
    ) -> u64;

    /// Appends `(id, score)` pairs satisfying the radius predicate to
    /// `out`. Base contract: unsupported.
    fn scan_codes_range(
        &self,
        _n: usize,
        _codes: &[u8],
        _ids: Option<&[i64]>,
        _radius: f32,
        _out: &mut Vec<(i64, f32)>,
        _filter: Option<&dyn FilterBitset>,
    ) -> IvfResult<()> {
        Err(crate::error::IvfError::unsupported(
            "scanner does not support range search",
        ))
    }
}
