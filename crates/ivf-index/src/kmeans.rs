//! Orchestration-level k-means: random-sample initialization plus a
//! fixed number of Lloyd iterations. Deliberately not a research-grade
//! implementation: no k-means++, no balanced-split repair of empty
//! clusters beyond a cheap reseed.

use ivf_core::MetricType;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

pub struct KMeansParams {
    pub niter: usize,
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self { niter: 25, seed: 1234 }
    }
}

/// Runs Lloyd's algorithm over `n` vectors of dimension `d` (row-major
/// in `x`), producing `k` centroids (row-major, `k * d` floats).
/// `spherical` re-normalizes each centroid to unit norm after every
/// update, appropriate when the metric is inner product.
pub fn kmeans(
    n: usize,
    d: usize,
    k: usize,
    x: &[f32],
    metric: MetricType,
    spherical: bool,
    params: &KMeansParams,
) -> Vec<f32> {
    assert!(n >= k, "cannot train {k} clusters from {n} points");
    let mut rng = rand::rngs::StdRng::seed_from_u64(params.seed);
    let picks = sample(&mut rng, n, k).into_vec();

    let mut centroids = vec![0.0f32; k * d];
    for (c, &p) in picks.iter().enumerate() {
        centroids[c * d..(c + 1) * d].copy_from_slice(&x[p * d..(p + 1) * d]);
    }

    let mut assign = vec![0usize; n];

    for _ in 0..params.niter {
        // Assignment step.
        for i in 0..n {
            let point = &x[i * d..(i + 1) * d];
            let mut best = 0usize;
            let mut best_score = metric.worst_sentinel();
            for c in 0..k {
                let centroid = &centroids[c * d..(c + 1) * d];
                let score = metric.score(point, centroid);
                if metric.is_better(score, best_score) {
                    best_score = score;
                    best = c;
                }
            }
            assign[i] = best;
        }

        // Update step.
        let mut sums = vec![0.0f32; k * d];
        let mut counts = vec![0usize; k];
        for i in 0..n {
            let c = assign[i];
            counts[c] += 1;
            let point = &x[i * d..(i + 1) * d];
            let sum = &mut sums[c * d..(c + 1) * d];
            for (s, &v) in sum.iter_mut().zip(point.iter()) {
                *s += v;
            }
        }

        for c in 0..k {
            if counts[c] == 0 {
                // Empty cluster: reseed from a random data point instead
                // of leaving a dead centroid no query can ever reach.
                let p = rng.gen_range(0..n);
                centroids[c * d..(c + 1) * d].copy_from_slice(&x[p * d..(p + 1) * d]);
                continue;
            }
            let inv = 1.0 / counts[c] as f32;
            let dst = &mut centroids[c * d..(c + 1) * d];
            let sum = &sums[c * d..(c + 1) * d];
            for (d_, &s) in dst.iter_mut().zip(sum.iter()) {
                *d_ = s * inv;
            }
            if spherical {
                let norm: f32 = dst.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 1e-12 {
                    for v in dst.iter_mut() {
                        *v /= norm;
                    }
                }
            }
        }
    }

    centroids
}
