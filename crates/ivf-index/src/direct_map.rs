//! `id -> lo-handle` reverse lookup (C6). `Array` mode assumes dense,
//! contiguous external ids (a plain `Vec` indexed by id, Faiss-style);
//! `Hashtable` mode backs the same lookup with a [`DashMap`] for sparse
//! or non-contiguous id spaces.

use dashmap::DashMap;
use ivf_core::{lo_build, IvfError, IvfResult, LoHandle};
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectMapType {
    None,
    Array,
    Hashtable,
}

pub enum DirectMap {
    None,
    Array(RwLock<Vec<LoHandle>>),
    Hashtable(DashMap<i64, LoHandle>),
}

const NO_ENTRY: LoHandle = u64::MAX;

impl DirectMap {
    pub fn new(kind: DirectMapType) -> Self {
        match kind {
            DirectMapType::None => DirectMap::None,
            DirectMapType::Array => DirectMap::Array(RwLock::new(Vec::new())),
            DirectMapType::Hashtable => DirectMap::Hashtable(DashMap::new()),
        }
    }

    pub fn kind(&self) -> DirectMapType {
        match self {
            DirectMap::None => DirectMapType::None,
            DirectMap::Array(_) => DirectMapType::Array,
            DirectMap::Hashtable(_) => DirectMapType::Hashtable,
        }
    }

    /// Rejects id choices the active mode cannot represent: `Array`
    /// mode requires every id to be a small non-negative offset so it
    /// can index straight into the backing vector, `None` mode cannot
    /// support caller-supplied ids (sequential implicit ids only).
    pub fn check_can_add(&self, ids: Option<&[i64]>) -> IvfResult<()> {
        match self {
            DirectMap::None => {
                if ids.is_some() {
                    Err(IvfError::unsupported(
                        "direct map mode None cannot accept explicit ids",
                    ))
                } else {
                    Ok(())
                }
            }
            DirectMap::Array(_) => {
                if let Some(ids) = ids {
                    if ids.iter().any(|&id| id < 0) {
                        return Err(IvfError::invariant(
                            "direct map mode Array requires non-negative ids",
                        ));
                    }
                }
                Ok(())
            }
            DirectMap::Hashtable(_) => Ok(()),
        }
    }

    pub fn set(&self, id: i64, list_no: usize, offset: usize) {
        let handle = lo_build(list_no as u64, offset as u64);
        match self {
            DirectMap::None => {}
            DirectMap::Array(v) => {
                let idx = id as usize;
                let mut v = v.write();
                if idx >= v.len() {
                    v.resize(idx + 1, NO_ENTRY);
                }
                v[idx] = handle;
            }
            DirectMap::Hashtable(m) => {
                m.insert(id, handle);
            }
        }
    }

    pub fn get(&self, id: i64) -> Option<LoHandle> {
        match self {
            DirectMap::None => None,
            DirectMap::Array(v) => {
                let v = v.read();
                let idx = id as usize;
                v.get(idx).copied().filter(|&h| h != NO_ENTRY)
            }
            DirectMap::Hashtable(m) => m.get(&id).map(|r| *r),
        }
    }

    /// Records that `id` exists but was not assigned to any list (a
    /// coarse-quantizer assignment of `-1`). In `Array` mode this still
    /// has to extend the backing vector so the id occupies a slot —
    /// otherwise a later id sharing the same index would silently alias
    /// it; `Hashtable` mode needs nothing, absence already means
    /// unassigned.
    pub fn mark_unassigned(&self, id: i64) {
        if let DirectMap::Array(v) = self {
            let idx = id as usize;
            let mut v = v.write();
            if idx >= v.len() {
                v.resize(idx + 1, NO_ENTRY);
            } else {
                v[idx] = NO_ENTRY;
            }
        }
    }

    pub fn remove(&self, id: i64) {
        match self {
            DirectMap::None => {}
            DirectMap::Array(v) => {
                let mut v = v.write();
                let idx = id as usize;
                if idx < v.len() {
                    v[idx] = NO_ENTRY;
                }
            }
            DirectMap::Hashtable(m) => {
                m.remove(&id);
            }
        }
    }

    pub fn clear(&self) {
        match self {
            DirectMap::None => {}
            DirectMap::Array(v) => v.write().clear(),
            DirectMap::Hashtable(m) => m.clear(),
        }
    }

    /// Updates the stored handle for `id` after its code moved to a new
    /// `(list_no, offset)`, e.g. the swap-with-tail that follows a
    /// removal from an `ArrayInvertedLists` list.
    pub fn update_codes(&self, id: i64, list_no: usize, offset: usize) {
        self.set(id, list_no, offset);
    }
}
