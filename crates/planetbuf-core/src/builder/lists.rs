//! Builders for the inner list items: tag lists, node reference lists,
//! relation member lists, and changeset discussions.

use crate::arena::Arena;
use crate::entity::layout::{
    CM_TEXT_LEN, CM_TIMESTAMP, CM_UID, CM_USER_LEN, COMMENT_RECORD_SIZE, MEMBER_FLAG_FULL,
    MEMBER_RECORD_SIZE, M_FLAGS, M_ID, M_ROLE_LEN, M_TYPE, NODE_REF_RECORD_SIZE,
};
use crate::entity::ObjectRef;
use crate::error::{Error, Result};
use crate::types::{
    ItemType, Location, NodeRef, ObjectId, Timestamp, UserId, MAX_COMMENT_TEXT_LEN, MAX_STRING_LEN,
};

use super::ItemBuilder;

/// Check a free-text field against the common string ceiling before any byte
/// of it is written.
pub(crate) fn check_string_len(field: &'static str, s: &str) -> Result<()> {
    if s.len() > MAX_STRING_LEN {
        return Err(Error::LengthExceeded {
            field,
            len: s.len(),
            max: MAX_STRING_LEN,
        });
    }
    Ok(())
}

/// Builds a tag list: alternating NUL-terminated key and value strings.
pub struct TagListBuilder<'a> {
    inner: ItemBuilder<'a>,
}

impl<'a> TagListBuilder<'a> {
    /// Open a standalone tag list at the top level of the arena. Tag lists
    /// nested in an entity are opened through that entity's builder instead.
    pub fn new(arena: &'a mut Arena) -> Self {
        Self {
            inner: ItemBuilder::new(arena, None, ItemType::TagList, 0),
        }
    }

    pub(crate) fn from_inner(inner: ItemBuilder<'a>) -> Self {
        Self { inner }
    }

    /// Append one key/value pair. On a length error nothing is written and
    /// the pairs added so far are kept.
    pub fn add_tag(&mut self, key: &str, value: &str) -> Result<()> {
        check_string_len("tag key", key)?;
        check_string_len("tag value", value)?;
        self.inner.append_with_nul(key.as_bytes());
        self.inner.append_with_nul(value.as_bytes());
        Ok(())
    }

    /// Close the list explicitly. Dropping the builder has the same effect.
    pub fn finish(self) {}
}

/// Builds a way node list or an area ring: a run of fixed-size node
/// reference records.
pub struct NodeRefListBuilder<'a> {
    inner: ItemBuilder<'a>,
}

impl<'a> NodeRefListBuilder<'a> {
    pub(crate) fn from_inner(inner: ItemBuilder<'a>) -> Self {
        Self { inner }
    }

    pub fn add_node_ref(&mut self, node_ref: NodeRef) {
        let mut record = [0u8; NODE_REF_RECORD_SIZE];
        record[0..8].copy_from_slice(&node_ref.id.to_le_bytes());
        record[8..12].copy_from_slice(&node_ref.location.x().to_le_bytes());
        record[12..16].copy_from_slice(&node_ref.location.y().to_le_bytes());
        self.inner.append(&record);
    }

    pub fn add(&mut self, id: ObjectId, location: Location) {
        self.add_node_ref(NodeRef::new(id, location));
    }

    pub fn finish(self) {}
}

/// Builds a relation member list. Each member is a fixed record, a
/// NUL-terminated role string padded to the alignment unit, and optionally a
/// full embedded copy of the member entity.
pub struct RelationMemberListBuilder<'a> {
    inner: ItemBuilder<'a>,
}

impl<'a> RelationMemberListBuilder<'a> {
    pub(crate) fn from_inner(inner: ItemBuilder<'a>) -> Self {
        Self { inner }
    }

    /// Append one member. `full` embeds a copy of the member entity so the
    /// relation can be processed without a second lookup.
    pub fn add_member(
        &mut self,
        member_type: ItemType,
        id: ObjectId,
        role: &str,
        full: Option<ObjectRef<'_>>,
    ) -> Result<()> {
        debug_assert!(
            matches!(
                member_type,
                ItemType::Node | ItemType::Way | ItemType::Relation
            ),
            "relation members are nodes, ways, or relations"
        );
        check_string_len("relation member role", role)?;

        let mut record = [0u8; MEMBER_RECORD_SIZE];
        record[M_ID..M_ID + 8].copy_from_slice(&id.to_le_bytes());
        record[M_TYPE] = member_type as u8;
        if full.is_some() {
            record[M_FLAGS] = MEMBER_FLAG_FULL;
        }
        record[M_ROLE_LEN..M_ROLE_LEN + 2]
            .copy_from_slice(&((role.len() + 1) as u16).to_le_bytes());

        self.inner.append(&record);
        self.inner.append_with_nul(role.as_bytes());
        // Align before the embedded entity so its own layout holds.
        self.inner.pad_to_alignment();
        if let Some(full) = full {
            self.inner.append(full.as_bytes());
        }
        Ok(())
    }

    pub fn finish(self) {}
}

/// Builds a changeset discussion. Comments are added as a strict two-phase
/// unit: `add_comment()` writes the metadata and user name, then exactly one
/// `add_comment_text()` completes it.
pub struct ChangesetDiscussionBuilder<'a> {
    inner: ItemBuilder<'a>,
    /// Offset of the comment record still waiting for its text.
    pending: Option<usize>,
}

const ORDER_MSG: &str = "add_comment() and add_comment_text() must alternate strictly";

impl<'a> ChangesetDiscussionBuilder<'a> {
    pub(crate) fn from_inner(inner: ItemBuilder<'a>) -> Self {
        Self {
            inner,
            pending: None,
        }
    }

    /// Start a comment: fixed record plus the commenting user's name.
    pub fn add_comment(&mut self, timestamp: Timestamp, uid: UserId, user: &str) -> Result<()> {
        debug_assert!(self.pending.is_none(), "{ORDER_MSG}");
        check_string_len("changeset comment user name", user)?;

        let record = self.inner.reserve(COMMENT_RECORD_SIZE);
        let arena = self.inner.arena_mut();
        arena.put_slice_at(record + CM_TIMESTAMP, &timestamp.to_le_bytes());
        arena.put_slice_at(record + CM_UID, &uid.to_le_bytes());
        arena.write_u16_at(record + CM_USER_LEN, (user.len() + 1) as u16);
        self.inner.append_with_nul(user.as_bytes());
        self.pending = Some(record);
        Ok(())
    }

    /// Complete the pending comment with its text.
    pub fn add_comment_text(&mut self, text: &str) -> Result<()> {
        debug_assert!(self.pending.is_some(), "{ORDER_MSG}");
        if text.len() > MAX_COMMENT_TEXT_LEN {
            return Err(Error::LengthExceeded {
                field: "changeset comment text",
                len: text.len(),
                max: MAX_COMMENT_TEXT_LEN,
            });
        }
        let record = match self.pending.take() {
            Some(record) => record,
            None => return Ok(()),
        };
        self.inner
            .arena_mut()
            .write_u16_at(record + CM_TEXT_LEN, text.len() as u16);
        self.inner.append_with_nul(text.as_bytes());
        // Each comment unit is padded individually.
        self.inner.pad_to_alignment();
        Ok(())
    }

    pub fn finish(self) {}
}

impl Drop for ChangesetDiscussionBuilder<'_> {
    fn drop(&mut self) {
        // Skip the check when unwinding from another panic, which would
        // otherwise turn into an abort.
        if !std::thread::panicking() {
            debug_assert!(self.pending.is_none(), "{ORDER_MSG}");
        }
    }
}
