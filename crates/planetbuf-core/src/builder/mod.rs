//! Builder Protocol - Stack-Disciplined Cursors over an Arena
//!
//! An [`ItemBuilder`] is a cursor bound to (arena, start offset, optional
//! parent header offset). It reserves an item's header and fixed fields on
//! open, grows the item by appending, and finalizes on close: zero-pad to the
//! alignment unit, write the final size into the item's own header, and add
//! it to the parent's header. Closing is the only commit point and runs on
//! every exit path via `Drop`.
//!
//! ## Nesting
//!
//! At most one builder is open per nesting level. Opening a child suspends
//! all mutation of the parent until the child closes. This is not a runtime
//! check: a child reborrows the parent's `&mut Arena`, so the borrow checker
//! rejects any use of the parent while the child is alive.
//!
//! ## Size accounting
//!
//! The size field in the in-arena item header is the single source of truth.
//! It is re-read and re-written through the arena on every append, so it
//! stays correct across reallocations; no builder ever caches an address.
//!
//! The specialized builders for each entity shape live in the submodules and
//! are re-exported here.

mod lists;
mod object;

pub use lists::{
    ChangesetDiscussionBuilder, NodeRefListBuilder, RelationMemberListBuilder, TagListBuilder,
};
pub use object::{
    AreaBuilder, ChangesetBuilder, NodeBuilder, RelationBuilder, WayBuilder,
};

/// The node lists of ways and of area rings share one record layout and one
/// builder; the aliases name the role.
pub type WayNodeListBuilder<'a> = NodeRefListBuilder<'a>;
pub type OuterRingBuilder<'a> = NodeRefListBuilder<'a>;
pub type InnerRingBuilder<'a> = NodeRefListBuilder<'a>;

use crate::arena::{padded, Arena};
use crate::entity::layout::ITEM_HEADER_SIZE;
use crate::types::ItemType;

/// Low-level cursor for one in-progress item. Wrapped by the specialized
/// builders; not used directly.
pub struct ItemBuilder<'a> {
    arena: &'a mut Arena,
    /// Offset of this item's header.
    start: usize,
    /// Offset of the parent item's header, if nested.
    parent: Option<usize>,
    closed: bool,
}

impl<'a> ItemBuilder<'a> {
    pub(crate) fn new(
        arena: &'a mut Arena,
        parent: Option<usize>,
        item_type: ItemType,
        fixed_payload: usize,
    ) -> Self {
        let start = arena.reserve_zeroed(ITEM_HEADER_SIZE + fixed_payload);
        arena.write_u32_at(start, (ITEM_HEADER_SIZE + fixed_payload) as u32);
        arena.write_u8_at(start + 4, item_type as u8);
        Self {
            arena,
            start,
            parent,
            closed: false,
        }
    }

    /// Open a nested builder. The returned builder exclusively reborrows the
    /// arena, freezing this builder until it is dropped.
    pub(crate) fn child(&mut self, item_type: ItemType, fixed_payload: usize) -> ItemBuilder<'_> {
        ItemBuilder::new(&mut *self.arena, Some(self.start), item_type, fixed_payload)
    }

    pub(crate) fn start(&self) -> usize {
        self.start
    }

    pub(crate) fn arena(&self) -> &Arena {
        self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut Arena {
        self.arena
    }

    /// Current size of the item, read from its header.
    pub(crate) fn size(&self) -> u32 {
        self.arena.read_u32_at(self.start)
    }

    pub(crate) fn add_size(&mut self, n: u32) {
        let size = self.size();
        self.arena.write_u32_at(self.start, size + n);
    }

    /// Append raw bytes to the item's tail.
    pub(crate) fn append(&mut self, bytes: &[u8]) {
        self.arena.append(bytes);
        self.add_size(bytes.len() as u32);
    }

    /// Append a string's bytes plus a NUL terminator.
    pub(crate) fn append_with_nul(&mut self, bytes: &[u8]) {
        self.arena.append(bytes);
        self.arena.append(&[0]);
        self.add_size(bytes.len() as u32 + 1);
    }

    /// Append `n` zero bytes, returning their absolute offset.
    pub(crate) fn reserve(&mut self, n: usize) -> usize {
        let offset = self.arena.reserve_zeroed(n);
        self.add_size(n as u32);
        offset
    }

    /// Zero-pad the item to the next alignment boundary.
    pub(crate) fn pad_to_alignment(&mut self) {
        let size = self.size() as usize;
        let extra = padded(size) - size;
        if extra > 0 {
            self.arena.reserve_zeroed(extra);
            self.add_size(extra as u32);
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pad_to_alignment();
        let total = self.size();
        match self.parent {
            Some(parent) => {
                let parent_size = self.arena.read_u32_at(parent);
                self.arena.write_u32_at(parent, parent_size + total);
            }
            // Root item finished: make it visible to readers.
            None => self.arena.commit(),
        }
    }
}

impl Drop for ItemBuilder<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ALIGNMENT;

    #[test]
    fn test_item_header_written_on_open() {
        let mut arena = Arena::new();
        let builder = ItemBuilder::new(&mut arena, None, ItemType::TagList, 0);
        assert_eq!(builder.size(), ITEM_HEADER_SIZE as u32);
        drop(builder);
        assert_eq!(arena.read_u8_at(4), ItemType::TagList as u8);
    }

    #[test]
    fn test_close_pads_to_alignment() {
        let mut arena = Arena::new();
        let mut builder = ItemBuilder::new(&mut arena, None, ItemType::TagList, 0);
        builder.append(b"abc");
        drop(builder);

        let size = arena.read_u32_at(0) as usize;
        assert_eq!(size % ALIGNMENT, 0);
        assert_eq!(size, 16); // 8 header + 3 payload + 5 padding
        assert_eq!(arena.committed(), 16);
        // Padding bytes are zero-filled
        assert_eq!(arena.slice(11, 5), &[0u8; 5]);
    }

    #[test]
    fn test_child_size_propagates_to_parent() {
        let mut arena = Arena::new();
        let mut parent = ItemBuilder::new(&mut arena, None, ItemType::Way, 8);
        let mut child = parent.child(ItemType::TagList, 0);
        child.append(b"highway\0primary\0");
        drop(child);

        // Child: 8 header + 16 payload = 24, aligned
        assert_eq!(parent.size(), 16 + 24);
        drop(parent);
        assert_eq!(arena.read_u32_at(0), 40);
    }

    #[test]
    fn test_commit_only_after_root_closes() {
        let mut arena = Arena::new();
        let mut parent = ItemBuilder::new(&mut arena, None, ItemType::Way, 8);
        let child = parent.child(ItemType::TagList, 0);
        drop(child);
        assert_eq!(parent.arena().committed(), 0);
        drop(parent);
        assert_eq!(arena.committed(), 24);
    }

    #[test]
    fn test_nested_sizes_are_padded_multiples() {
        let mut arena = Arena::new();
        let mut parent = ItemBuilder::new(&mut arena, None, ItemType::Relation, 8);
        for payload in [b"x".as_slice(), b"1234567".as_slice(), b"12345678".as_slice()] {
            let mut child = parent.child(ItemType::TagList, 0);
            child.append(payload);
            drop(child);
        }
        drop(parent);

        // Children: 16, 16, 16 (8 + 8 payload, exact); parent 16 + 48
        let total = arena.read_u32_at(0);
        assert_eq!(total % ALIGNMENT as u32, 0);
        assert_eq!(total, 16 + 16 + 16 + 16);
    }
}
