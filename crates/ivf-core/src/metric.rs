/// Comparison direction for a similarity metric.
///
/// Inner product is "larger is better" (a min-heap keyed on score, so the
/// smallest stored value is the current threshold to beat); L2 is
/// "smaller is better" (a max-heap keyed on distance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    L2,
    InnerProduct,
}

impl MetricType {
    /// Squared Euclidean distance / inner product of two equal-length slices.
    #[inline]
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            MetricType::L2 => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| {
                    let d = x - y;
                    d * d
                })
                .sum(),
            MetricType::InnerProduct => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
        }
    }

    /// True iff `candidate` should replace `incumbent` as the better of
    /// the two scores under this metric.
    #[inline]
    pub fn is_better(self, candidate: f32, incumbent: f32) -> bool {
        match self {
            MetricType::L2 => candidate < incumbent,
            MetricType::InnerProduct => candidate > incumbent,
        }
    }

    /// The sentinel "no candidate yet" score: `+inf` for L2 (anything is
    /// closer), `-inf` for inner product (anything is more similar).
    #[inline]
    pub fn worst_sentinel(self) -> f32 {
        match self {
            MetricType::L2 => f32::INFINITY,
            MetricType::InnerProduct => f32::NEG_INFINITY,
        }
    }

    /// Ordering such that `sort_by(|a, b| metric.cmp(a, b))` yields results
    /// from best to worst.
    #[inline]
    pub fn cmp(self, a: f32, b: f32) -> std::cmp::Ordering {
        match self {
            MetricType::L2 => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
            MetricType::InnerProduct => b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal),
        }
    }
}
