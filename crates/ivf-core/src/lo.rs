/// A packed `(list_id, offset)` handle: list in the high 32 bits, offset
/// in the low 32 bits. Used as the direct-map payload and, under
/// `store_pairs`, as the label a scanner writes into the heap before the
/// caller resolves it back to an external id.
pub type LoHandle = u64;

/// Packs a `(list, offset)` pair into a [`LoHandle`].
///
/// # Panics
/// Panics if `list` or `offset` overflow 32 bits — both are expected to
/// stay far below `u32::MAX` for any realistic `nlist` or list length,
/// so this is an invariant check, not a recoverable error.
#[inline]
pub fn lo_build(list: u64, offset: u64) -> LoHandle {
    assert!(list <= u32::MAX as u64, "list id overflows 32 bits: {list}");
    assert!(
        offset <= u32::MAX as u64,
        "list offset overflows 32 bits: {offset}"
    );
    (list << 32) | offset
}

#[inline]
pub fn lo_listno(lo: LoHandle) -> u64 {
    lo >> 32
}

#[inline]
pub fn lo_offset(lo: LoHandle) -> u64 {
    lo & 0xFFFF_FFFF
}
