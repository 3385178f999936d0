//! The IVF search core (C8): index state plus add / search / range
//! search / reconstruction / update / merge operations tying C3
//! (quantizer), C4 (inverted lists) and C6 (direct map) together.

use ivf_core::{
    lo_listno, lo_offset, Codec, FilterBitset, InterruptHook, IvfError, IvfResult, ListScanner,
    MetricType, NeverInterrupt, Stats, StatsDelta,
};
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::direct_map::{DirectMap, DirectMapType};
use crate::inverted_lists::{ArrayInvertedLists, InvertedLists, ReadOnlyInvertedLists};
use crate::quantizer::Level1Quantizer;

/// Vectors are chunked at this size before being added, recursing on
/// each chunk so a single call never holds an unbounded amount of
/// per-call scratch memory.
const ADD_CHUNK_SIZE: usize = 65536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelMode {
    PerQuery = 0,
    PerProbe = 1,
    RangeFlat = 2,
}

impl ParallelMode {
    fn from_u8(v: u8) -> IvfResult<Self> {
        match v {
            0 => Ok(ParallelMode::PerQuery),
            1 => Ok(ParallelMode::PerProbe),
            2 => Ok(ParallelMode::RangeFlat),
            other => Err(IvfError::unsupported(format!("unknown parallel_mode {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsetType {
    /// Copy entries whose id falls in `[a1, a2)`.
    IdRange,
    /// Copy entries where `id % a1 == a2`.
    IdModulo,
    /// Copy a running-cumulative-count slice per list so the overall
    /// split approaches the fractions `a1 / ntotal` and `a2 / ntotal`.
    Sharding,
}

pub struct IvfIndex {
    pub d: usize,
    pub metric_type: MetricType,
    pub nprobe: usize,
    pub max_codes: usize,
    pub parallel_mode: ParallelMode,
    pub store_pairs_range_search: bool,

    ntotal: usize,
    is_trained_flag: bool,

    quantizer: Level1Quantizer,
    codec: Box<dyn Codec>,
    invlists: Box<dyn InvertedLists>,
    direct_map: DirectMap,

    own_invlists: bool,
    own_quantizer: bool,
    quantizer_backup: Option<Box<dyn ivf_core::CoarseQuantizer>>,

    pub stats: Stats,
}

impl IvfIndex {
    pub fn new(
        d: usize,
        metric_type: MetricType,
        quantizer: Level1Quantizer,
        codec: Box<dyn Codec>,
        direct_map_type: DirectMapType,
    ) -> Self {
        let nlist = quantizer.nlist();
        let code_size = codec.code_size();
        Self {
            d,
            metric_type,
            nprobe: 1,
            max_codes: 0,
            parallel_mode: ParallelMode::PerQuery,
            store_pairs_range_search: false,
            ntotal: 0,
            is_trained_flag: false,
            quantizer,
            codec,
            invlists: Box::new(ArrayInvertedLists::new(nlist, code_size)),
            direct_map: DirectMap::new(direct_map_type),
            own_invlists: true,
            own_quantizer: true,
            quantizer_backup: None,
            stats: Stats::new(),
        }
    }

    pub fn ntotal(&self) -> usize {
        self.ntotal
    }

    pub fn nlist(&self) -> usize {
        self.quantizer.nlist()
    }

    pub fn is_trained(&self) -> bool {
        self.is_trained_flag
    }

    pub fn coarse_code_size(&self) -> usize {
        self.quantizer.coarse_code_size()
    }

    /// `coarse_code_size + code_size`, per the standalone codec format.
    pub fn sa_code_size(&self) -> usize {
        self.quantizer.coarse_code_size() + self.codec.code_size()
    }

    // ---- training --------------------------------------------------

    #[tracing::instrument(level = "debug", skip(self, x))]
    pub fn train(&mut self, n: usize, x: &[f32]) -> IvfResult<()> {
        if self.is_trained_flag {
            return Ok(());
        }
        let start = std::time::Instant::now();
        self.quantizer.train(n, x)?;
        self.codec.train_residual(n, x)?;

        self.is_trained_flag = true;
        self.stats
            .add_quantization_time_ms(start.elapsed().as_millis() as u64);
        tracing::debug!(nlist = self.nlist(), n, "coarse quantizer trained");
        Ok(())
    }

    // ---- add ---------------------------------------------------------

    #[tracing::instrument(level = "debug", skip(self, x, ids))]
    pub fn add(&mut self, n: usize, x: &[f32], ids: Option<&[i64]>) -> IvfResult<()> {
        if n == 0 {
            return Ok(());
        }
        if !self.is_trained_flag {
            return Err(IvfError::invariant("cannot add before training"));
        }
        if let Some(ids) = ids {
            if ids.len() != n {
                return Err(IvfError::invariant("ids length must equal n"));
            }
        }
        self.direct_map.check_can_add(ids)?;

        if n > ADD_CHUNK_SIZE {
            let mut offset = 0;
            while offset < n {
                let chunk = (n - offset).min(ADD_CHUNK_SIZE);
                let sub_x = &x[offset * self.d..(offset + chunk) * self.d];
                let sub_ids = ids.map(|ids| &ids[offset..offset + chunk]);
                self.add(chunk, sub_x, sub_ids)?;
                offset += chunk;
            }
            return Ok(());
        }

        let mut assign = vec![0i64; n];
        self.quantizer.assign(n, x, &mut assign);

        let code_size = self.codec.code_size();
        let mut codes = vec![0u8; n * code_size];
        self.codec.encode_vectors(n, x, Some(&assign), &mut codes);

        let base_id = self.ntotal as i64;
        let num_threads = rayon::current_num_threads().max(1);

        // Single-writer-per-list partitioning: thread t only appends
        // entries whose list falls in its residue class mod num_threads,
        // so distinct threads never race on the same list's lock.
        (0..num_threads).into_par_iter().for_each(|t| {
            for i in 0..n {
                let list_no = assign[i];
                let external_id = ids.map_or(base_id + i as i64, |ids| ids[i]);

                if list_no < 0 {
                    if t == 0 {
                        // thread 0 owns recording of discarded vectors
                        self.direct_map.mark_unassigned(external_id);
                    }
                    continue;
                }
                if (list_no as usize) % num_threads != t {
                    continue;
                }
                let code = &codes[i * code_size..(i + 1) * code_size];
                let offset = self.invlists.add_entry(list_no as usize, external_id, code);
                self.direct_map.set(external_id, list_no as usize, offset);
            }
        });

        self.ntotal += n;
        Ok(())
    }

    // ---- search ------------------------------------------------------

    #[tracing::instrument(level = "debug", skip(self, x, distances, labels, filter))]
    pub fn search(
        &self,
        n: usize,
        x: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &mut [i64],
        filter: Option<&dyn FilterBitset>,
    ) -> IvfResult<()> {
        if n == 0 {
            return Ok(());
        }
        let nprobe = self.nprobe.max(1);
        let mut coarse_dis = vec![self.metric_type.worst_sentinel(); n * nprobe];
        let mut coarse_ids = vec![-1i64; n * nprobe];
        self.quantizer
            .search(n, x, nprobe, &mut coarse_dis, &mut coarse_ids);

        self.invlists.prefetch_lists(&coarse_ids);

        self.search_preassigned(
            n,
            x,
            k,
            &coarse_ids,
            &coarse_dis,
            distances,
            labels,
            false,
            false,
            filter,
            &NeverInterrupt,
        )
    }

    /// Scores queries against pre-selected probe lists. `store_pairs`
    /// makes every returned label a lo-handle instead of an external id
    /// — the mode [`Self::search_and_reconstruct`] uses so it can defer
    /// the id lookup to the same pass that decodes the vector.
    #[allow(clippy::too_many_arguments)]
    pub fn search_preassigned(
        &self,
        n: usize,
        x: &[f32],
        k: usize,
        coarse_ids: &[i64],
        coarse_dis: &[f32],
        distances: &mut [f32],
        labels: &mut [i64],
        no_heap_init: bool,
        store_pairs: bool,
        filter: Option<&dyn FilterBitset>,
        interrupt: &dyn InterruptHook,
    ) -> IvfResult<()> {
        if n == 0 {
            return Ok(());
        }
        let nprobe = coarse_ids.len() / n.max(1);
        let interrupted = std::sync::atomic::AtomicBool::new(false);

        if !no_heap_init {
            ivf_core::heap::heapify(distances, labels, self.metric_type);
        }

        match self.parallel_mode {
            ParallelMode::PerQuery => {
                let total_delta = distances
                    .par_chunks_mut(k)
                    .zip(labels.par_chunks_mut(k))
                    .enumerate()
                    .map(|(q, (heap_d, heap_i))| {
                        if interrupt.is_interrupted() {
                            interrupted.store(true, std::sync::atomic::Ordering::SeqCst);
                            return StatsDelta::default();
                        }
                        let mut scanner = self.codec.new_scanner(self.metric_type, store_pairs);
                        let query = &x[q * self.d..(q + 1) * self.d];
                        scanner.set_query(query);
                        let mut delta = StatsDelta {
                            nq: 1,
                            ..Default::default()
                        };
                        // nprobe rarely exceeds a few dozen, so the
                        // non-empty, in-range probes for this query fit
                        // inline without a heap allocation.
                        let probes: SmallVec<[(usize, f32); 8]> = (0..nprobe)
                            .filter_map(|p| {
                                let list_no = coarse_ids[q * nprobe + p];
                                if list_no < 0 || list_no as usize >= self.nlist() {
                                    return None;
                                }
                                let list_no = list_no as usize;
                                if self.invlists.list_size(list_no) == 0 {
                                    return None;
                                }
                                Some((list_no, coarse_dis[q * nprobe + p]))
                            })
                            .collect();

                        let mut scanned = 0usize;
                        for (list_no, dis) in probes {
                            if self.max_codes != 0 && scanned >= self.max_codes {
                                break;
                            }
                            let size = self.invlists.list_size(list_no);
                            scanner.set_list(list_no as i64, dis);
                            let ids = self.invlists.get_ids(list_no);
                            let codes = self.invlists.get_codes(list_no);
                            let updates = scanner.scan_codes(
                                size,
                                &codes,
                                ids.as_deref(),
                                heap_d,
                                heap_i,
                                filter,
                            );
                            delta.nlist += 1;
                            delta.ndis += size as u64;
                            delta.nheap_updates += updates;
                            scanned += size;
                        }
                        ivf_core::heap::heap_reorder(heap_d, heap_i, self.metric_type);
                        delta
                    })
                    .reduce(StatsDelta::default, |mut a, b| {
                        a.merge(b);
                        a
                    });
                self.stats.apply(total_delta);
            }
            ParallelMode::PerProbe => {
                for q in 0..n {
                    if interrupt.is_interrupted() {
                        interrupted.store(true, std::sync::atomic::Ordering::SeqCst);
                        break;
                    }
                    let heap_d = &mut distances[q * k..(q + 1) * k];
                    let heap_i = &mut labels[q * k..(q + 1) * k];
                    let query = &x[q * self.d..(q + 1) * self.d];

                    let partials: Vec<(Vec<f32>, Vec<i64>, StatsDelta)> = (0..nprobe)
                        .into_par_iter()
                        .map(|p| {
                            let mut scanner = self.codec.new_scanner(self.metric_type, store_pairs);
                            scanner.set_query(query);
                            let mut priv_d = vec![self.metric_type.worst_sentinel(); k];
                            let mut priv_i = vec![-1i64; k];
                            let mut delta = StatsDelta::default();

                            let list_no = coarse_ids[q * nprobe + p];
                            if list_no >= 0 {
                                let list_no = list_no as usize;
                                if list_no < self.nlist() {
                                    let size = self.invlists.list_size(list_no);
                                    if size > 0 {
                                        scanner.set_list(list_no as i64, coarse_dis[q * nprobe + p]);
                                        let ids = self.invlists.get_ids(list_no);
                                        let codes = self.invlists.get_codes(list_no);
                                        let updates = scanner.scan_codes(
                                            size,
                                            &codes,
                                            ids.as_deref(),
                                            &mut priv_d,
                                            &mut priv_i,
                                            filter,
                                        );
                                        delta.nlist += 1;
                                        delta.ndis += size as u64;
                                        delta.nheap_updates += updates;
                                    }
                                }
                            }
                            (priv_d, priv_i, delta)
                        })
                        .collect();

                    let mut delta = StatsDelta {
                        nq: 1,
                        ..Default::default()
                    };
                    for (priv_d, priv_i, d) in partials {
                        ivf_core::heap::heap_addn(heap_d, heap_i, self.metric_type, &priv_d, &priv_i);
                        delta.merge(d);
                    }
                    ivf_core::heap::heap_reorder(heap_d, heap_i, self.metric_type);
                    self.stats.apply(delta);
                }
            }
            ParallelMode::RangeFlat => {
                return Err(IvfError::unsupported(
                    "parallel_mode 2 is only valid for range_search",
                ));
            }
        }

        if interrupted.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(IvfError::Interrupted);
        }
        Ok(())
    }

    // ---- range search --------------------------------------------------

    pub fn range_search(
        &self,
        n: usize,
        x: &[f32],
        radius: f32,
        filter: Option<&dyn FilterBitset>,
    ) -> IvfResult<Vec<Vec<(i64, f32)>>> {
        self.range_search_with_interrupt(n, x, radius, filter, &NeverInterrupt)
    }

    /// Same as [`Self::range_search`], polling `interrupt` once per query
    /// (or, under [`ParallelMode::PerProbe`], once before each query's
    /// probe fan-out) and surfacing [`IvfError::Interrupted`] once the
    /// parallel region has drained if any query was skipped.
    pub fn range_search_with_interrupt(
        &self,
        n: usize,
        x: &[f32],
        radius: f32,
        filter: Option<&dyn FilterBitset>,
        interrupt: &dyn InterruptHook,
    ) -> IvfResult<Vec<Vec<(i64, f32)>>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let nprobe = self.nprobe.max(1);
        let mut coarse_dis = vec![self.metric_type.worst_sentinel(); n * nprobe];
        let mut coarse_ids = vec![-1i64; n * nprobe];
        self.quantizer
            .search(n, x, nprobe, &mut coarse_dis, &mut coarse_ids);

        let interrupted = std::sync::atomic::AtomicBool::new(false);

        let results: Vec<Vec<(i64, f32)>> = match self.parallel_mode {
            ParallelMode::PerQuery => (0..n)
                .into_par_iter()
                .map(|q| {
                    if interrupt.is_interrupted() {
                        interrupted.store(true, std::sync::atomic::Ordering::SeqCst);
                        return Vec::new();
                    }
                    let mut scanner = self
                        .codec
                        .new_scanner(self.metric_type, self.store_pairs_range_search);
                    let query = &x[q * self.d..(q + 1) * self.d];
                    scanner.set_query(query);
                    let mut out = Vec::new();
                    for p in 0..nprobe {
                        let list_no = coarse_ids[q * nprobe + p];
                        if list_no < 0 {
                            continue;
                        }
                        let list_no = list_no as usize;
                        if list_no >= self.nlist() {
                            continue;
                        }
                        let size = self.invlists.list_size(list_no);
                        if size == 0 {
                            continue;
                        }
                        scanner.set_list(list_no as i64, coarse_dis[q * nprobe + p]);
                        let ids = self.invlists.get_ids(list_no);
                        let codes = self.invlists.get_codes(list_no);
                        let _ = scanner.scan_codes_range(
                            size,
                            &codes,
                            ids.as_deref(),
                            radius,
                            &mut out,
                            filter,
                        );
                    }
                    out
                })
                .collect(),
            ParallelMode::PerProbe => {
                let mut buckets = Vec::with_capacity(n);
                for q in 0..n {
                    if interrupt.is_interrupted() {
                        interrupted.store(true, std::sync::atomic::Ordering::SeqCst);
                        buckets.push(Vec::new());
                        continue;
                    }
                    let query = &x[q * self.d..(q + 1) * self.d];
                    let partials: Vec<Vec<(i64, f32)>> = (0..nprobe)
                        .into_par_iter()
                        .map(|p| {
                            let mut out = Vec::new();
                            let list_no = coarse_ids[q * nprobe + p];
                            if list_no < 0 {
                                return out;
                            }
                            let list_no = list_no as usize;
                            if list_no >= self.nlist() {
                                return out;
                            }
                            let size = self.invlists.list_size(list_no);
                            if size == 0 {
                                return out;
                            }
                            let mut scanner = self
                                .codec
                                .new_scanner(self.metric_type, self.store_pairs_range_search);
                            scanner.set_query(query);
                            scanner.set_list(list_no as i64, coarse_dis[q * nprobe + p]);
                            let ids = self.invlists.get_ids(list_no);
                            let codes = self.invlists.get_codes(list_no);
                            let _ = scanner.scan_codes_range(
                                size,
                                &codes,
                                ids.as_deref(),
                                radius,
                                &mut out,
                                filter,
                            );
                            out
                        })
                        .collect();
                    let mut out = Vec::new();
                    for mut part in partials {
                        out.append(&mut part);
                    }
                    buckets.push(out);
                }
                buckets
            }
            ParallelMode::RangeFlat => {
                // Flat (query, probe) cartesian product: one task per
                // pair, folded back into per-query buckets afterwards.
                let pairs: Vec<(usize, usize)> = (0..n)
                    .flat_map(|q| (0..nprobe).map(move |p| (q, p)))
                    .collect();
                let partials: Vec<(usize, Vec<(i64, f32)>)> = pairs
                    .into_par_iter()
                    .map(|(q, p)| {
                        if interrupt.is_interrupted() {
                            interrupted.store(true, std::sync::atomic::Ordering::SeqCst);
                            return (q, Vec::new());
                        }
                        let list_no = coarse_ids[q * nprobe + p];
                        let mut out = Vec::new();
                        if list_no >= 0 {
                            let list_no = list_no as usize;
                            if list_no < self.nlist() {
                                let size = self.invlists.list_size(list_no);
                                if size > 0 {
                                    let mut scanner = self.codec.new_scanner(
                                        self.metric_type,
                                        self.store_pairs_range_search,
                                    );
                                    let query = &x[q * self.d..(q + 1) * self.d];
                                    scanner.set_query(query);
                                    scanner.set_list(list_no as i64, coarse_dis[q * nprobe + p]);
                                    let ids = self.invlists.get_ids(list_no);
                                    let codes = self.invlists.get_codes(list_no);
                                    let _ = scanner.scan_codes_range(
                                        size,
                                        &codes,
                                        ids.as_deref(),
                                        radius,
                                        &mut out,
                                        filter,
                                    );
                                }
                            }
                        }
                        (q, out)
                    })
                    .collect();
                let mut buckets = vec![Vec::new(); n];
                for (q, mut out) in partials {
                    buckets[q].append(&mut out);
                }
                buckets
            }
        };

        if interrupted.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(IvfError::Interrupted);
        }
        Ok(results)
    }

    // ---- reconstruction --------------------------------------------

    pub fn reconstruct(&self, id: i64, out: &mut [f32]) -> IvfResult<()> {
        let lo = self
            .direct_map
            .get(id)
            .ok_or_else(|| IvfError::invariant(format!("id {id} not present in direct map")))?;
        let list_no = lo_listno(lo) as usize;
        let offset = lo_offset(lo) as usize;
        let code = self.invlists.get_single_code(list_no, offset);
        self.codec.decode(&code, out)
    }

    pub fn reconstruct_n(&self, i0: i64, ni: usize, out: &mut [f32]) -> IvfResult<()> {
        let target = i0..(i0 + ni as i64);
        for list_no in 0..self.nlist() {
            let ids = self.invlists.get_ids(list_no);
            let Some(ids) = ids else { continue };
            for (offset, &id) in ids.iter().enumerate() {
                if target.contains(&id) {
                    let slot = (id - i0) as usize;
                    let code = self.invlists.get_single_code(list_no, offset);
                    self.codec.decode(&code, &mut out[slot * self.d..(slot + 1) * self.d])?;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn search_and_reconstruct(
        &self,
        n: usize,
        x: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &mut [i64],
        reconstructed: &mut [f32],
        filter: Option<&dyn FilterBitset>,
    ) -> IvfResult<()> {
        let nprobe = self.nprobe.max(1);
        let mut coarse_dis = vec![self.metric_type.worst_sentinel(); n * nprobe];
        let mut coarse_ids = vec![-1i64; n * nprobe];
        self.quantizer
            .search(n, x, nprobe, &mut coarse_dis, &mut coarse_ids);

        let mut lo_labels = vec![-1i64; n * k];
        self.search_preassigned(
            n,
            x,
            k,
            &coarse_ids,
            &coarse_dis,
            distances,
            &mut lo_labels,
            false,
            true,
            filter,
            &NeverInterrupt,
        )?;

        for i in 0..n * k {
            let lo = lo_labels[i];
            if lo < 0 {
                labels[i] = -1;
                reconstructed[i * self.d..(i + 1) * self.d].fill(f32::NAN);
                continue;
            }
            let list_no = lo_listno(lo as u64) as usize;
            let offset = lo_offset(lo as u64) as usize;
            let external_id = self.invlists.get_single_id(list_no, offset);
            labels[i] = external_id;
            let code = self.invlists.get_single_code(list_no, offset);
            self.codec
                .decode(&code, &mut reconstructed[i * self.d..(i + 1) * self.d])?;
        }
        Ok(())
    }

    // ---- update ------------------------------------------------------

    pub fn update_vectors(&mut self, ids: &[i64], x: &[f32]) -> IvfResult<()> {
        let n = ids.len();
        match self.direct_map.kind() {
            DirectMapType::None => Err(IvfError::unsupported(
                "update_vectors requires a direct map",
            )),
            DirectMapType::Hashtable => {
                for &id in ids {
                    if self.direct_map.get(id).is_none() {
                        return Err(IvfError::capacity(format!(
                            "update_vectors: id {id} does not exist"
                        )));
                    }
                }
                self.remove_ids(&|id| ids.contains(&id))?;
                self.add(n, x, Some(ids))
            }
            DirectMapType::Array => {
                let mut assign = vec![0i64; n];
                self.quantizer.assign(n, x, &mut assign);
                let code_size = self.codec.code_size();
                let mut codes = vec![0u8; n * code_size];
                self.codec.encode_vectors(n, x, Some(&assign), &mut codes);

                for i in 0..n {
                    let id = ids[i];

                    // Vacate the old (list, offset) first so the id
                    // never briefly exists twice across two lists.
                    if let Some(old_lo) = self.direct_map.get(id) {
                        let old_list = lo_listno(old_lo) as usize;
                        let old_offset = lo_offset(old_lo) as usize;
                        if let Some(moved_id) = self.invlists.remove_entry(old_list, old_offset) {
                            self.direct_map.set(moved_id, old_list, old_offset);
                        }
                    }

                    let new_list = assign[i];
                    if new_list < 0 {
                        self.direct_map.mark_unassigned(id);
                        continue;
                    }
                    let new_list = new_list as usize;
                    let code = &codes[i * code_size..(i + 1) * code_size];
                    let offset = self.invlists.add_entry(new_list, id, code);
                    self.direct_map.update_codes(id, new_list, offset);
                }
                Ok(())
            }
        }
    }

    // ---- remove --------------------------------------------------------

    pub fn remove_ids(&mut self, pred: &dyn Fn(i64) -> bool) -> IvfResult<usize> {
        let removed = self.invlists.remove_ids(pred);
        self.ntotal = self.ntotal.saturating_sub(removed);
        // The direct map's own remove() calls happen per-id from the
        // caller-visible ids; since ArrayInvertedLists compacts with a
        // swap-with-tail it does not itself, we fully rebuild here for
        // correctness with the simple in-memory storage this crate ships.
        self.rebuild_direct_map();
        Ok(removed)
    }

    fn rebuild_direct_map(&mut self) {
        self.direct_map.clear();
        for list_no in 0..self.nlist() {
            if let Some(ids) = self.invlists.get_ids(list_no) {
                for (offset, &id) in ids.iter().enumerate() {
                    self.direct_map.set(id, list_no, offset);
                }
            }
        }
    }

    // ---- merge / subset copy --------------------------------------------

    pub fn merge_from(&mut self, other: &mut IvfIndex, add_id: i64) -> IvfResult<()> {
        if self.d != other.d
            || self.nlist() != other.nlist()
            || self.codec.code_size() != other.codec.code_size()
        {
            return Err(IvfError::invariant(
                "cannot merge indexes with mismatched d/nlist/code_size",
            ));
        }
        if !matches!(self.direct_map.kind(), DirectMapType::None)
            || !matches!(other.direct_map.kind(), DirectMapType::None)
        {
            return Err(IvfError::unsupported(
                "merge_from requires direct maps disabled on both sides",
            ));
        }
        self.invlists.merge_from(other.invlists.as_ref(), add_id)?;
        self.ntotal += other.ntotal;
        other.ntotal = 0;
        other.invlists = Box::new(ArrayInvertedLists::new(other.nlist(), other.codec.code_size()));
        Ok(())
    }

    pub fn copy_subset_to(
        &self,
        other: &mut IvfIndex,
        subset_type: SubsetType,
        a1: i64,
        a2: i64,
    ) -> IvfResult<()> {
        if self.d != other.d || self.nlist() != other.nlist() {
            return Err(IvfError::invariant(
                "cannot copy subset into an index with mismatched d/nlist",
            ));
        }
        let ntotal = self.ntotal.max(1) as i64;

        if subset_type == SubsetType::Sharding {
            // Contiguous per-list slice [i1, i2) whose boundaries are
            // the running cumulative entry count mapped through the
            // fractions a1/ntotal and a2/ntotal, each with its own
            // integer-division accumulator so rounding never drifts
            // across lists.
            let mut accu_n = 0i64;
            let mut accu_a1 = 0i64;
            let mut accu_a2 = 0i64;
            for list_no in 0..self.nlist() {
                let size = self.invlists.list_size(list_no);
                accu_n += size as i64;
                let next_accu_a1 = accu_n * a1 / ntotal;
                let i1 = (next_accu_a1 - accu_a1) as usize;
                accu_a1 = next_accu_a1;
                let next_accu_a2 = accu_n * a2 / ntotal;
                let i2 = (next_accu_a2 - accu_a2) as usize;
                accu_a2 = next_accu_a2;

                for offset in i1..i2 {
                    let id = self.invlists.get_single_id(list_no, offset);
                    let code = self.invlists.get_single_code(list_no, offset);
                    let new_offset = other.invlists.add_entry(list_no, id, &code);
                    other.direct_map.set(id, list_no, new_offset);
                    other.ntotal += 1;
                }
            }
            return Ok(());
        }

        for list_no in 0..self.nlist() {
            let size = self.invlists.list_size(list_no);
            let ids = self.invlists.get_ids(list_no);
            for offset in 0..size {
                let id = ids.as_ref().map_or(offset as i64, |ids| ids[offset]);

                let keep = match subset_type {
                    SubsetType::IdRange => id >= a1 && id < a2,
                    SubsetType::IdModulo => a1 != 0 && id % a1 == a2,
                    SubsetType::Sharding => unreachable!(),
                };
                if keep {
                    let code = self.invlists.get_single_code(list_no, offset);
                    let new_offset = other.invlists.add_entry(list_no, id, &code);
                    other.direct_map.set(id, list_no, new_offset);
                    other.ntotal += 1;
                }
            }
        }
        Ok(())
    }

    // ---- standalone codec ---------------------------------------------

    pub fn sa_encode(&self, n: usize, x: &[f32], out: &mut [u8]) -> IvfResult<()> {
        let sa_size = self.sa_code_size();
        if out.len() != n * sa_size {
            return Err(IvfError::invariant("sa_encode output length mismatch"));
        }
        let mut assign = vec![0i64; n];
        self.quantizer.assign(n, x, &mut assign);

        let code_size = self.codec.code_size();
        let mut codes = vec![0u8; n * code_size];
        self.codec.encode_vectors(n, x, Some(&assign), &mut codes);

        let coarse_size = self.quantizer.coarse_code_size();
        for i in 0..n {
            let entry = &mut out[i * sa_size..(i + 1) * sa_size];
            self.quantizer.encode_listno(assign[i], &mut entry[..coarse_size]);
            entry[coarse_size..].copy_from_slice(&codes[i * code_size..(i + 1) * code_size]);
        }
        Ok(())
    }

    pub fn set_parallel_mode(&mut self, mode: u8) -> IvfResult<()> {
        self.parallel_mode = parallel_mode_from_u8(mode)?;
        Ok(())
    }

    pub fn set_direct_map_type(&mut self, kind: DirectMapType) {
        self.direct_map = DirectMap::new(kind);
        self.rebuild_direct_map();
    }

    /// Swaps in a new coarse quantizer. If `keep_backup` is set, the
    /// displaced quantizer (when owned) is retained in the backup slot
    /// instead of being dropped, so a caller can restore it later via
    /// [`Self::restore_quantizer_backup`].
    pub fn replace_quantizer(
        &mut self,
        new: Box<dyn ivf_core::CoarseQuantizer>,
        own: bool,
        keep_backup: bool,
    ) {
        let old = self.quantizer.replace_quantizer(new);
        if self.own_quantizer && keep_backup {
            self.quantizer_backup = Some(old);
        }
        self.own_quantizer = own;
    }

    pub fn restore_quantizer_backup(&mut self) -> IvfResult<()> {
        let backup = self
            .quantizer_backup
            .take()
            .ok_or_else(|| IvfError::capacity("no quantizer backup to restore"))?;
        self.quantizer.replace_quantizer(backup);
        self.own_quantizer = true;
        Ok(())
    }

    pub fn replace_invlists(
        &mut self,
        new: Box<dyn InvertedLists>,
        own: bool,
    ) -> Option<Box<dyn InvertedLists>> {
        let old = std::mem::replace(&mut self.invlists, new);
        let was_owned = self.own_invlists;
        self.own_invlists = own;
        if was_owned {
            None
        } else {
            Some(old)
        }
    }

    pub fn to_readonly(&mut self) -> IvfResult<()> {
        if self.invlists.is_readonly() {
            return Ok(());
        }
        let ro = ReadOnlyInvertedLists::from_lists(self.invlists.as_ref());
        self.invlists = Box::new(ro);
        Ok(())
    }

    pub fn is_readonly(&self) -> bool {
        self.invlists.is_readonly()
    }

    pub fn list_size(&self, list_no: usize) -> usize {
        self.invlists.list_size(list_no)
    }
}

pub(crate) fn parallel_mode_from_u8(v: u8) -> IvfResult<ParallelMode> {
    ParallelMode::from_u8(v)
}
