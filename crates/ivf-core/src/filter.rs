use roaring::RoaringBitmap;

/// An optional bitmap over external ids. Any candidate whose id bit is
/// set is excluded from results. Read-only during a search; may be
/// absent.
///
/// A bitmap membership test gates each candidate during a scan, the
/// same shape used to exclude deleted or filtered-out ids from a
/// result set.
pub trait FilterBitset: Send + Sync {
    /// True if `id` should be excluded from results.
    fn test(&self, id: i64) -> bool;
}

/// A [`FilterBitset`] backed by a [`RoaringBitmap`] of excluded ids.
/// External ids are cast to `u32`; ids outside `u32` range are treated
/// as never excluded (roaring only indexes `u32` keys).
#[derive(Debug, Clone, Default)]
pub struct RoaringFilter {
    excluded: RoaringBitmap,
}

impl RoaringFilter {
    pub fn new() -> Self {
        Self {
            excluded: RoaringBitmap::new(),
        }
    }

    pub fn from_bitmap(excluded: RoaringBitmap) -> Self {
        Self { excluded }
    }

    pub fn exclude(&mut self, id: i64) {
        if let Ok(id) = u32::try_from(id) {
            self.excluded.insert(id);
        }
    }
}

impl FilterBitset for RoaringFilter {
    fn test(&self, id: i64) -> bool {
        match u32::try_from(id) {
            Ok(id) => self.excluded.contains(id),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_only_marked_ids() {
        let mut f = RoaringFilter::new();
        f.exclude(5);
        assert!(f.test(5));
        assert!(!f.test(6));
    }

    #[test]
    fn negative_ids_never_excluded() {
        let f = RoaringFilter::new();
        assert!(!f.test(-1));
    }
}
