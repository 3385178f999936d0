//! Reference implementations of the collaborator traits: a brute-force
//! nearest-centroid quantizer and a pass-through ("flat") vector codec
//! that stores raw `f32` components as its code. Neither is an ANN
//! structure in its own right — that would defeat the purpose of
//! testing the IVF layer against a known-correct baseline — they exist
//! so the workspace is exercisable end-to-end without a real product
//! quantizer or HNSW-backed coarse quantizer plugged in.

use crate::collaborators::{Codec, CoarseQuantizer, ListScanner};
use crate::error::{IvfError, IvfResult};
use crate::filter::FilterBitset;
use crate::heap::heap_push;
use crate::metric::MetricType;

/// Exhaustive-scan coarse quantizer: `assign`/`search` compare the
/// query against every centroid. Correct but O(n * ntotal); fine for a
/// coarse quantizer whose `ntotal` is `nlist` (typically a few thousand
/// at most).
#[derive(Debug, Clone)]
pub struct FlatQuantizer {
    d: usize,
    metric: MetricType,
    centroids: Vec<f32>,
}

impl FlatQuantizer {
    pub fn new(d: usize, metric: MetricType) -> Self {
        Self {
            d,
            metric,
            centroids: Vec::new(),
        }
    }

    fn centroid(&self, i: usize) -> &[f32] {
        &self.centroids[i * self.d..(i + 1) * self.d]
    }
}

impl CoarseQuantizer for FlatQuantizer {
    fn d(&self) -> usize {
        self.d
    }

    fn metric_type(&self) -> MetricType {
        self.metric
    }

    fn is_trained(&self) -> bool {
        // A flat quantizer needs no training of its own; it is "trained"
        // once it holds centroids (set via `add` by the wrapper).
        self.ntotal() > 0
    }

    fn ntotal(&self) -> usize {
        self.centroids.len() / self.d.max(1)
    }

    fn reset(&mut self) {
        self.centroids.clear();
    }

    fn train(&mut self, _n: usize, _x: &[f32]) -> IvfResult<()> {
        Ok(())
    }

    fn add(&mut self, n: usize, x: &[f32]) -> IvfResult<()> {
        if x.len() != n * self.d {
            return Err(IvfError::invariant(format!(
                "expected {} floats, got {}",
                n * self.d,
                x.len()
            )));
        }
        self.centroids.extend_from_slice(x);
        Ok(())
    }

    fn assign(&self, n: usize, x: &[f32], out_ids: &mut [i64]) {
        let mut dis = vec![self.metric.worst_sentinel(); n];
        self.search_into(n, x, 1, &mut dis, out_ids);
    }

    fn search(&self, n: usize, x: &[f32], k: usize, out_dis: &mut [f32], out_ids: &mut [i64]) {
        self.search_into(n, x, k, out_dis, out_ids);
    }
}

impl FlatQuantizer {
    fn search_into(&self, n: usize, x: &[f32], k: usize, out_dis: &mut [f32], out_ids: &mut [i64]) {
        let ntotal = self.ntotal();
        for q in 0..n {
            let query = &x[q * self.d..(q + 1) * self.d];
            let heap_d = &mut out_dis[q * k..(q + 1) * k];
            let heap_i = &mut out_ids[q * k..(q + 1) * k];
            crate::heap::heapify(heap_d, heap_i, self.metric);
            for c in 0..ntotal {
                let score = self.metric.score(query, self.centroid(c));
                heap_push(heap_d, heap_i, self.metric, score, c as i64);
            }
            crate::heap::heap_reorder(heap_d, heap_i, self.metric);
        }
    }
}

/// Pass-through codec: a code is just the vector's `f32` components in
/// native-endian bytes (`code_size = d * 4`). Stands in for the
/// out-of-scope product/residual quantizer so every IVF operation has a
/// concrete, correct path to exercise.
#[derive(Debug, Clone)]
pub struct FlatCodec {
    d: usize,
    metric: MetricType,
}

impl FlatCodec {
    pub fn new(d: usize, metric: MetricType) -> Self {
        Self { d, metric }
    }
}

impl Codec for FlatCodec {
    fn d(&self) -> usize {
        self.d
    }

    fn code_size(&self) -> usize {
        self.d * 4
    }

    fn encode_vectors(
        &self,
        n: usize,
        x: &[f32],
        _list_assignments: Option<&[i64]>,
        out_codes: &mut [u8],
    ) {
        for i in 0..n {
            let vec = &x[i * self.d..(i + 1) * self.d];
            let out = &mut out_codes[i * self.code_size()..(i + 1) * self.code_size()];
            for (chunk, &v) in out.chunks_exact_mut(4).zip(vec.iter()) {
                chunk.copy_from_slice(&v.to_le_bytes());
            }
        }
    }

    fn decode(&self, code: &[u8], out: &mut [f32]) -> IvfResult<()> {
        if code.len() != self.code_size() || out.len() != self.d {
            return Err(IvfError::invariant("code/out length mismatch"));
        }
        for (dst, chunk) in out.iter_mut().zip(code.chunks_exact(4)) {
            *dst = f32::from_le_bytes(chunk.try_into().unwrap());
        }
        Ok(())
    }

    fn new_scanner(&self, metric: MetricType, store_pairs: bool) -> Box<dyn ListScanner> {
        Box::new(FlatScanner {
            d: self.d,
            metric,
            store_pairs,
            list_id: -1,
            query: Vec::new(),
        })
    }
}

struct FlatScanner {
    d: usize,
    metric: MetricType,
    store_pairs: bool,
    list_id: i64,
    query: Vec<f32>,
}

impl ListScanner for FlatScanner {
    fn set_query(&mut self, x: &[f32]) {
        self.query.clear();
        self.query.extend_from_slice(x);
    }

    fn set_list(&mut self, list_id: i64, _coarse_dis: f32) {
        self.list_id = list_id;
    }

    fn scan_codes(
        &self,
        n: usize,
        codes: &[u8],
        ids: Option<&[i64]>,
        heap_d: &mut [f32],
        heap_i: &mut [i64],
        filter: Option<&dyn FilterBitset>,
    ) -> u64 {
        let code_size = self.d * 4;
        let mut updates = 0u64;
        for offset in 0..n {
            let code = &codes[offset * code_size..(offset + 1) * code_size];
            let mut vec = vec![0.0f32; self.d];
            for (dst, chunk) in vec.iter_mut().zip(code.chunks_exact(4)) {
                *dst = f32::from_le_bytes(chunk.try_into().unwrap());
            }
            let score = self.metric.score(&self.query, &vec);

            let external_id = ids.map_or(offset as i64, |ids| ids[offset]);
            if let Some(filter) = filter {
                if filter.test(external_id) {
                    continue;
                }
            }
            let label = if self.store_pairs {
                crate::lo::lo_build(self.list_id as u64, offset as u64) as i64
            } else {
                external_id
            };
            if heap_push(heap_d, heap_i, self.metric, score, label) {
                updates += 1;
            }
        }
        updates
    }

    fn scan_codes_range(
        &self,
        n: usize,
        codes: &[u8],
        ids: Option<&[i64]>,
        radius: f32,
        out: &mut Vec<(i64, f32)>,
        filter: Option<&dyn FilterBitset>,
    ) -> IvfResult<()> {
        let code_size = self.d * 4;
        for offset in 0..n {
            let code = &codes[offset * code_size..(offset + 1) * code_size];
            let mut vec = vec![0.0f32; self.d];
            for (dst, chunk) in vec.iter_mut().zip(code.chunks_exact(4)) {
                *dst = f32::from_le_bytes(chunk.try_into().unwrap());
            }
            let score = self.metric.score(&self.query, &vec);

            let satisfies = match self.metric {
                MetricType::L2 => score <= radius,
                MetricType::InnerProduct => score >= radius,
            };
            if !satisfies {
                continue;
            }
            let external_id = ids.map_or(offset as i64, |ids| ids[offset]);
            if let Some(filter) = filter {
                if filter.test(external_id) {
                    continue;
                }
            }
            let label = if self.store_pairs {
                crate::lo::lo_build(self.list_id as u64, offset as u64) as i64
            } else {
                external_id
            };
            out.push((label, score));
        }
        Ok(())
    }
}
