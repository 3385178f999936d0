//! Level-1 quantizer wrapper (C3): owns the coarse quantizer, drives
//! its training against one of three strategies, and implements the
//! little-endian list-id codec the rest of the engine uses to prefix
//! standalone codes.

use ivf_core::{CoarseQuantizer, IvfError, IvfResult, MetricType};

use crate::kmeans::{kmeans, KMeansParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainStrategy {
    /// Run k-means ourselves, reset the quantizer, add the centroids.
    ClusterAndReset,
    /// Let the quantizer train on the raw vectors by itself.
    TrainsAlone,
    /// Require L2, cluster with a flat assigner, add without resetting.
    L2Explicit,
}

pub struct Level1Quantizer {
    quantizer: Box<dyn CoarseQuantizer>,
    nlist: usize,
    strategy: TrainStrategy,
    kmeans_params: KMeansParams,
}

impl Level1Quantizer {
    pub fn new(quantizer: Box<dyn CoarseQuantizer>, nlist: usize, strategy: TrainStrategy) -> Self {
        Self {
            quantizer,
            nlist,
            strategy,
            kmeans_params: KMeansParams::default(),
        }
    }

    pub fn nlist(&self) -> usize {
        self.nlist
    }

    pub fn quantizer(&self) -> &dyn CoarseQuantizer {
        self.quantizer.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.quantizer.is_trained() && self.quantizer.ntotal() == self.nlist
    }

    /// Swaps in a new coarse quantizer, returning the displaced one so
    /// the caller can decide whether to drop it or stash it in a backup
    /// slot — the backup-retention policy lives on [`crate::ivf::IvfIndex`],
    /// not here.
    pub fn replace_quantizer(&mut self, new: Box<dyn CoarseQuantizer>) -> Box<dyn CoarseQuantizer> {
        std::mem::replace(&mut self.quantizer, new)
    }

    pub fn train(&mut self, n: usize, x: &[f32]) -> IvfResult<()> {
        if self.is_trained() {
            return Ok(());
        }
        let d = self.quantizer.d();
        let metric = self.quantizer.metric_type();

        match self.strategy {
            TrainStrategy::ClusterAndReset => {
                let spherical = metric == MetricType::InnerProduct;
                let centroids = kmeans(n, d, self.nlist, x, metric, spherical, &self.kmeans_params);
                self.quantizer.reset();
                self.quantizer.add(self.nlist, &centroids)?;
            }
            TrainStrategy::TrainsAlone => {
                self.quantizer.train(n, x)?;
                if self.quantizer.ntotal() != self.nlist {
                    return Err(IvfError::invariant(format!(
                        "quantizer trained to ntotal {} but nlist is {}",
                        self.quantizer.ntotal(),
                        self.nlist
                    )));
                }
            }
            TrainStrategy::L2Explicit => {
                if metric != MetricType::L2 {
                    return Err(IvfError::unsupported(
                        "quantizer_trains_alone=2 requires metric L2",
                    ));
                }
                let centroids = kmeans(n, d, self.nlist, x, metric, false, &self.kmeans_params);
                self.quantizer.add(self.nlist, &centroids)?;
            }
        }
        Ok(())
    }

    /// Bytes needed to represent any list id in `[0, nlist)`.
    pub fn coarse_code_size(&self) -> usize {
        coarse_code_size(self.nlist)
    }

    pub fn encode_listno(&self, list_no: i64, out: &mut [u8]) {
        encode_listno(list_no, self.nlist, out)
    }

    pub fn decode_listno(&self, bytes: &[u8]) -> i64 {
        decode_listno(bytes, self.nlist)
    }

    pub fn assign(&self, n: usize, x: &[f32], out_ids: &mut [i64]) {
        self.quantizer.assign(n, x, out_ids)
    }

    pub fn search(&self, n: usize, x: &[f32], k: usize, out_dis: &mut [f32], out_ids: &mut [i64]) {
        self.quantizer.search(n, x, k, out_dis, out_ids)
    }
}

pub fn coarse_code_size(nlist: usize) -> usize {
    let max_list_no = (nlist.max(1) - 1) as u64;
    let bits = if max_list_no == 0 {
        1
    } else {
        64 - max_list_no.leading_zeros()
    };
    ((bits as usize) + 7) / 8
}

pub fn encode_listno(list_no: i64, nlist: usize, out: &mut [u8]) {
    let size = coarse_code_size(nlist);
    assert_eq!(out.len(), size);
    assert!(list_no >= 0 && (list_no as usize) < nlist);
    let bytes = (list_no as u64).to_le_bytes();
    out.copy_from_slice(&bytes[..size]);
}

pub fn decode_listno(bytes: &[u8], nlist: usize) -> i64 {
    let size = coarse_code_size(nlist);
    assert_eq!(bytes.len(), size);
    let mut buf = [0u8; 8];
    buf[..size].copy_from_slice(bytes);
    let value = u64::from_le_bytes(buf) as i64;
    assert!(value >= 0 && (value as usize) < nlist, "decoded list id out of range");
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_code_size_examples_from_spec() {
        assert_eq!(coarse_code_size(300), 2);
        assert_eq!(coarse_code_size(1), 1);
        assert_eq!(coarse_code_size(256), 1);
        assert_eq!(coarse_code_size(257), 2);
    }

    #[test]
    fn encode_decode_listno_round_trips() {
        let nlist = 300;
        let size = coarse_code_size(nlist);
        for l in [0i64, 1, 259, 299] {
            let mut buf = vec![0u8; size];
            encode_listno(l, nlist, &mut buf);
            assert_eq!(decode_listno(&buf, nlist), l);
        }
    }

    #[test]
    fn encode_listno_matches_spec_example() {
        let nlist = 300;
        let size = coarse_code_size(nlist);
        let mut buf = vec![0u8; size];
        encode_listno(259, nlist, &mut buf);
        assert_eq!(buf, vec![0x03, 0x01]);
    }

    #[test]
    fn training_strategy_1_requires_matching_ntotal() {
        use ivf_core::flat::FlatQuantizer;
        let q = FlatQuantizer::new(2, MetricType::L2);
        let mut l1 = Level1Quantizer::new(Box::new(q), 4, TrainStrategy::TrainsAlone);
        // FlatQuantizer's train() is a no-op, so ntotal stays 0 != nlist.
        let x = vec![0.0f32; 8];
        assert!(l1.train(4, &x).is_err());
    }

    #[test]
    fn training_strategy_0_clusters_and_resets() {
        use ivf_core::flat::FlatQuantizer;
        let q = FlatQuantizer::new(1, MetricType::L2);
        let mut l1 = Level1Quantizer::new(Box::new(q), 2, TrainStrategy::ClusterAndReset);
        let x = vec![0.0f32, 0.1, -0.1, 10.0, 10.1, 9.9];
        l1.train(6, &x).unwrap();
        assert!(l1.is_trained());
    }
}
