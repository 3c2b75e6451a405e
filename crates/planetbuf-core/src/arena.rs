//! Arena - Growable Byte Storage for Padded Items
//!
//! An `Arena` owns one contiguous, growable byte region holding a sequence of
//! self-describing items. It is the substrate both the builders (writing) and
//! the typed views (reading) operate on.
//!
//! ## Item Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Item header (8 bytes)                        │
//! │ - Total size incl. header & padding (u32 LE) │
//! │ - Item type discriminant (u8)                │
//! │ - Reserved, zero (3 bytes)                   │
//! ├──────────────────────────────────────────────┤
//! │ Type-specific fixed fields                   │
//! ├──────────────────────────────────────────────┤
//! │ Variable payload (strings, child items)      │
//! ├──────────────────────────────────────────────┤
//! │ Zero padding up to the next 8-byte boundary  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Every item starts at an 8-byte-aligned offset and its recorded size is
//! already rounded up to 8, so iteration advances by the size field alone.
//!
//! ## Handles, not addresses
//!
//! The arena grows by reallocation, which invalidates every address derived
//! from it. All bookkeeping therefore uses byte offsets; an address is
//! recomputed from (arena, offset) at the moment of use and never retained
//! across a call that may grow the arena. The borrow checker enforces the
//! writing half of this contract: mutating the arena requires `&mut`, which
//! cannot coexist with an outstanding slice.
//!
//! ## Commit watermark
//!
//! Items under construction are invisible to readers. The root builder moves
//! the commit watermark forward when it closes, so `items()` only ever sees
//! fully finalized entities.

use bytes::BytesMut;

use crate::entity::{ItemIter, ObjectRef};

/// Alignment boundary for item starts and item sizes.
pub const ALIGNMENT: usize = 8;

/// Round `n` up to the next multiple of [`ALIGNMENT`].
pub const fn padded(n: usize) -> usize {
    (n + (ALIGNMENT - 1)) & !(ALIGNMENT - 1)
}

/// Growable, contiguous storage for a sequence of padded items.
#[derive(Debug, Default)]
pub struct Arena {
    data: BytesMut,
    committed: usize,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            committed: 0,
        }
    }

    /// Total bytes written, including not-yet-committed builder output.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes visible to readers (everything up to the commit watermark).
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// The committed region as a byte slice.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.committed]
    }

    /// Iterate over the committed items.
    pub fn items(&self) -> ItemIter<'_> {
        ItemIter::new(self.bytes())
    }

    /// Iterate over the committed top-level objects (nodes, ways, relations,
    /// areas). Changesets and inner items are skipped.
    pub fn objects(&self) -> impl Iterator<Item = ObjectRef<'_>> {
        self.items().filter_map(|item| item.as_object())
    }

    /// Copy one finished item from another arena to the end of this one.
    /// The copy is committed immediately.
    pub fn append_item(&mut self, item: crate::entity::ItemRef<'_>) {
        self.append(item.as_bytes());
        self.commit();
    }

    /// Move the commit watermark to the current end. Called by the root
    /// builder when it closes.
    pub(crate) fn commit(&mut self) {
        self.committed = self.data.len();
    }

    /// Append `n` zero bytes, returning the offset of the first one.
    pub(crate) fn reserve_zeroed(&mut self, n: usize) -> usize {
        let offset = self.data.len();
        self.data.resize(offset + n, 0);
        offset
    }

    /// Append raw bytes, returning the offset of the first one.
    pub(crate) fn append(&mut self, bytes: &[u8]) -> usize {
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        offset
    }

    /// Overwrite bytes at an absolute offset. The range must already exist.
    pub(crate) fn put_slice_at(&mut self, offset: usize, src: &[u8]) {
        self.data[offset..offset + src.len()].copy_from_slice(src);
    }

    pub(crate) fn write_u32_at(&mut self, offset: usize, value: u32) {
        self.put_slice_at(offset, &value.to_le_bytes());
    }

    pub(crate) fn write_u16_at(&mut self, offset: usize, value: u16) {
        self.put_slice_at(offset, &value.to_le_bytes());
    }

    pub(crate) fn write_u8_at(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    pub(crate) fn read_u32_at(&self, offset: usize) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(buf)
    }

    pub(crate) fn read_u16_at(&self, offset: usize) -> u16 {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(&self.data[offset..offset + 2]);
        u16::from_le_bytes(buf)
    }

    pub(crate) fn read_u8_at(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    pub(crate) fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded() {
        assert_eq!(padded(0), 0);
        assert_eq!(padded(1), 8);
        assert_eq!(padded(7), 8);
        assert_eq!(padded(8), 8);
        assert_eq!(padded(9), 16);
        assert_eq!(padded(16), 16);
    }

    #[test]
    fn test_reserve_zeroed_is_zero_filled() {
        let mut arena = Arena::new();
        arena.append(&[0xff; 5]);
        let offset = arena.reserve_zeroed(11);
        assert_eq!(offset, 5);
        assert_eq!(arena.slice(offset, 11), &[0u8; 11]);
    }

    #[test]
    fn test_offsets_survive_growth() {
        // Offsets recorded before heavy growth must still address the same
        // bytes afterwards, even though the backing allocation moved.
        let mut arena = Arena::new();
        let offset = arena.append(b"landmark");
        for _ in 0..1000 {
            arena.append(&[0xab; 64]);
        }
        assert_eq!(arena.slice(offset, 8), b"landmark");
    }

    #[test]
    fn test_field_write_read_roundtrip() {
        let mut arena = Arena::new();
        let offset = arena.reserve_zeroed(8);
        arena.write_u32_at(offset, 0xdead_beef);
        arena.write_u16_at(offset + 4, 0x1234);
        arena.write_u8_at(offset + 6, 0x56);
        assert_eq!(arena.read_u32_at(offset), 0xdead_beef);
        assert_eq!(arena.read_u16_at(offset + 4), 0x1234);
        assert_eq!(arena.read_u8_at(offset + 6), 0x56);
    }

    #[test]
    fn test_commit_watermark() {
        let mut arena = Arena::new();
        arena.append(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(arena.committed(), 0);
        assert!(arena.bytes().is_empty());

        arena.commit();
        assert_eq!(arena.committed(), 8);
        assert_eq!(arena.bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
