//! Posting-list storage (C4). Each list holds parallel `ids`/`codes`
//! arrays; `ArrayInvertedLists` is the in-memory, resizable
//! implementation used by a freshly built index, `ReadOnlyInvertedLists`
//! is the compacted form produced by [`InvertedLists::to_readonly`] —
//! a single contiguous buffer per list, no further growth possible.
//!
//! Per-list locking (one `RwLock` per list, not a single lock over the
//! whole table) so concurrent `add` calls targeting different lists
//! never contend.

use ivf_core::IvfResult;
use parking_lot::RwLock;

/// Storage and lookup surface an [`crate::ivf::IvfIndex`] needs from its
/// posting lists, independent of how a given list is actually laid out
/// in memory.
pub trait InvertedLists: Send + Sync {
    fn nlist(&self) -> usize;
    fn code_size(&self) -> usize;

    fn list_size(&self, list_no: usize) -> usize;

    /// Appends one entry to `list_no`, returning its offset within the
    /// list.
    fn add_entry(&self, list_no: usize, id: i64, code: &[u8]) -> usize;

    /// Copies `list_no`'s full id array out. Returns `None` for lists
    /// that store no explicit ids (offsets double as ids).
    fn get_ids(&self, list_no: usize) -> Option<Vec<i64>>;

    /// Copies `list_no`'s full code array out (`list_size * code_size`
    /// bytes).
    fn get_codes(&self, list_no: usize) -> Vec<u8>;

    fn get_single_id(&self, list_no: usize, offset: usize) -> i64;
    fn get_single_code(&self, list_no: usize, offset: usize) -> Vec<u8>;

    /// Hints that `lists` will be scanned soon; the default in-memory
    /// implementation has nothing to prefetch since everything already
    /// lives in RAM.
    fn prefetch_lists(&self, _lists: &[i64]) {}

    /// Removes every entry for which `pred` returns true. Returns the
    /// number of entries removed.
    fn remove_ids(&self, pred: &dyn Fn(i64) -> bool) -> usize;

    /// Removes the single entry at `(list_no, offset)` by swapping the
    /// list's last entry into its place and shrinking by one. Returns
    /// the id of whichever entry now occupies `offset` (the moved-in
    /// last entry), or `None` if `offset` was already the last slot and
    /// nothing needed to move. A caller holding a direct map must use
    /// the returned id to repoint that id's entry at `offset`.
    fn remove_entry(&self, list_no: usize, offset: usize) -> Option<i64>;

    /// Overwrites the code stored at `(list_no, offset)` in place.
    fn update_code(&self, list_no: usize, offset: usize, code: &[u8]);

    fn is_readonly(&self) -> bool {
        false
    }

    /// Appends every entry of `other` into `self`, list by list.
    fn merge_from(&self, other: &dyn InvertedLists, add_id: i64) -> IvfResult<()>;
}

struct ListData {
    ids: Vec<i64>,
    codes: Vec<u8>,
}

impl ListData {
    fn new() -> Self {
        Self {
            ids: Vec::new(),
            codes: Vec::new(),
        }
    }
}

/// Growable, fully in-memory posting-list table. This is the only
/// storage an index needs while it is being built or mutated; a
/// finished, static index can be compacted via `to_readonly`.
pub struct ArrayInvertedLists {
    code_size: usize,
    lists: Vec<RwLock<ListData>>,
}

impl ArrayInvertedLists {
    pub fn new(nlist: usize, code_size: usize) -> Self {
        let mut lists = Vec::with_capacity(nlist);
        for _ in 0..nlist {
            lists.push(RwLock::new(ListData::new()));
        }
        Self { code_size, lists }
    }
}

impl InvertedLists for ArrayInvertedLists {
    fn nlist(&self) -> usize {
        self.lists.len()
    }

    fn code_size(&self) -> usize {
        self.code_size
    }

    fn list_size(&self, list_no: usize) -> usize {
        self.lists[list_no].read().ids.len()
    }

    fn add_entry(&self, list_no: usize, id: i64, code: &[u8]) -> usize {
        debug_assert_eq!(code.len(), self.code_size);
        let mut list = self.lists[list_no].write();
        let offset = list.ids.len();
        list.ids.push(id);
        list.codes.extend_from_slice(code);
        offset
    }

    fn get_ids(&self, list_no: usize) -> Option<Vec<i64>> {
        Some(self.lists[list_no].read().ids.clone())
    }

    fn get_codes(&self, list_no: usize) -> Vec<u8> {
        self.lists[list_no].read().codes.clone()
    }

    fn get_single_id(&self, list_no: usize, offset: usize) -> i64 {
        self.lists[list_no].read().ids[offset]
    }

    fn get_single_code(&self, list_no: usize, offset: usize) -> Vec<u8> {
        let list = self.lists[list_no].read();
        list.codes[offset * self.code_size..(offset + 1) * self.code_size].to_vec()
    }

    fn remove_ids(&self, pred: &dyn Fn(i64) -> bool) -> usize {
        let mut removed = 0;
        for list in &self.lists {
            let mut list = list.write();
            let code_size = self.code_size;
            let mut keep_ids = Vec::with_capacity(list.ids.len());
            let mut keep_codes = Vec::with_capacity(list.codes.len());
            for (i, &id) in list.ids.iter().enumerate() {
                if pred(id) {
                    removed += 1;
                } else {
                    keep_ids.push(id);
                    keep_codes.extend_from_slice(
                        &list.codes[i * code_size..(i + 1) * code_size],
                    );
                }
            }
            list.ids = keep_ids;
            list.codes = keep_codes;
        }
        removed
    }

    fn remove_entry(&self, list_no: usize, offset: usize) -> Option<i64> {
        let mut list = self.lists[list_no].write();
        let code_size = self.code_size;
        let last = list.ids.len() - 1;
        list.ids.swap_remove(offset);
        if offset != last {
            list.codes
                .copy_within(last * code_size..(last + 1) * code_size, offset * code_size);
        }
        list.codes.truncate(last * code_size);
        if offset < list.ids.len() {
            Some(list.ids[offset])
        } else {
            None
        }
    }

    fn update_code(&self, list_no: usize, offset: usize, code: &[u8]) {
        let mut list = self.lists[list_no].write();
        let code_size = self.code_size;
        list.codes[offset * code_size..(offset + 1) * code_size].copy_from_slice(code);
    }

    fn merge_from(&self, other: &dyn InvertedLists, add_id: i64) -> IvfResult<()> {
        if other.nlist() != self.nlist() {
            return Err(ivf_core::IvfError::invariant(
                "cannot merge inverted lists with different nlist",
            ));
        }
        for list_no in 0..self.nlist() {
            let size = other.list_size(list_no);
            for offset in 0..size {
                let id = other.get_single_id(list_no, offset) + add_id;
                let code = other.get_single_code(list_no, offset);
                self.add_entry(list_no, id, &code);
            }
        }
        Ok(())
    }
}

/// Compacted posting-list table: one contiguous `Box<[u8]>`/`Box<[i64]>`
/// pair per list, built once from an [`ArrayInvertedLists`] and never
/// resized afterwards. `add_entry`/`remove_ids`/`update_code` panic —
/// mutating a read-only index is a programming error the caller should
/// have caught via `is_readonly()`.
pub struct ReadOnlyInvertedLists {
    code_size: usize,
    lists: Vec<(Box<[i64]>, Box<[u8]>)>,
}

impl ReadOnlyInvertedLists {
    pub fn from_lists(src: &dyn InvertedLists) -> Self {
        let code_size = src.code_size();
        let mut lists = Vec::with_capacity(src.nlist());
        for list_no in 0..src.nlist() {
            let ids = src.get_ids(list_no).unwrap_or_default().into_boxed_slice();
            let codes = src.get_codes(list_no).into_boxed_slice();
            lists.push((ids, codes));
        }
        Self { code_size, lists }
    }
}

impl InvertedLists for ReadOnlyInvertedLists {
    fn nlist(&self) -> usize {
        self.lists.len()
    }

    fn code_size(&self) -> usize {
        self.code_size
    }

    fn list_size(&self, list_no: usize) -> usize {
        self.lists[list_no].0.len()
    }

    fn add_entry(&self, _list_no: usize, _id: i64, _code: &[u8]) -> usize {
        panic!("cannot add entries to a read-only inverted list table");
    }

    fn get_ids(&self, list_no: usize) -> Option<Vec<i64>> {
        Some(self.lists[list_no].0.to_vec())
    }

    fn get_codes(&self, list_no: usize) -> Vec<u8> {
        self.lists[list_no].1.to_vec()
    }

    fn get_single_id(&self, list_no: usize, offset: usize) -> i64 {
        self.lists[list_no].0[offset]
    }

    fn get_single_code(&self, list_no: usize, offset: usize) -> Vec<u8> {
        let (_, codes) = &self.lists[list_no];
        codes[offset * self.code_size..(offset + 1) * self.code_size].to_vec()
    }

    fn remove_ids(&self, _pred: &dyn Fn(i64) -> bool) -> usize {
        panic!("cannot remove entries from a read-only inverted list table");
    }

    fn remove_entry(&self, _list_no: usize, _offset: usize) -> Option<i64> {
        panic!("cannot remove entries from a read-only inverted list table");
    }

    fn update_code(&self, _list_no: usize, _offset: usize, _code: &[u8]) {
        panic!("cannot update entries in a read-only inverted list table");
    }

    fn is_readonly(&self) -> bool {
        true
    }

    fn merge_from(&self, _other: &dyn InvertedLists, _add_id: i64) -> IvfResult<()> {
        Err(ivf_core::IvfError::unsupported(
            "cannot merge into a read-only inverted list table",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_read_round_trips() {
        let lists = ArrayInvertedLists::new(2, 4);
        lists.add_entry(0, 10, &[1, 2, 3, 4]);
        lists.add_entry(0, 11, &[5, 6, 7, 8]);
        assert_eq!(lists.list_size(0), 2);
        assert_eq!(lists.get_ids(0).unwrap(), vec![10, 11]);
        assert_eq!(lists.get_single_code(0, 1), vec![5, 6, 7, 8]);
    }

    #[test]
    fn remove_ids_compacts_in_place() {
        let lists = ArrayInvertedLists::new(1, 1);
        lists.add_entry(0, 1, &[1]);
        lists.add_entry(0, 2, &[2]);
        lists.add_entry(0, 3, &[3]);
        let removed = lists.remove_ids(&|id| id == 2);
        assert_eq!(removed, 1);
        assert_eq!(lists.get_ids(0).unwrap(), vec![1, 3]);
    }

    #[test]
    fn readonly_compaction_preserves_contents() {
        let lists = ArrayInvertedLists::new(1, 2);
        lists.add_entry(0, 7, &[9, 9]);
        let ro = ReadOnlyInvertedLists::from_lists(&lists);
        assert!(ro.is_readonly());
        assert_eq!(ro.get_single_id(0, 0), 7);
        assert_eq!(ro.get_single_code(0, 0), vec![9, 9]);
    }

    #[test]
    fn merge_from_offsets_ids() {
        let a = ArrayInvertedLists::new(1, 1);
        a.add_entry(0, 1, &[1]);
        let b = ArrayInvertedLists::new(1, 1);
        b.add_entry(0, 0, &[2]);
        a.merge_from(&b, 100).unwrap();
        assert_eq!(a.get_ids(0).unwrap(), vec![1, 100]);
    }
}
