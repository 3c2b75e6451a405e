//! Builders for the top-level entities: nodes, ways, relations, areas, and
//! changesets.
//!
//! The four object kinds share the common object layout and delegate to
//! `ObjectCore`; a macro stamps out the shared setter surface per builder so
//! each keeps its own concrete type and only the type-specific methods differ.

use std::str::FromStr;

use crate::arena::{padded, Arena, ALIGNMENT};
use crate::entity::layout::{
    CHANGESET_FIXED_SIZE, C_BOUNDS, C_CLOSED_AT, C_CREATED_AT, C_ID, C_NUM_CHANGES,
    C_NUM_COMMENTS, C_UID, C_USER_LEN, FLAG_DELETED, FLAG_VISIBLE, ITEM_HEADER_SIZE,
    NODE_FIXED_SIZE, OBJECT_FIXED_SIZE, O_CHANGESET, O_FLAGS, O_ID, O_LAT, O_LON, O_TIMESTAMP,
    O_UID, O_USER_LEN, O_VERSION,
};
use crate::entity::ObjectRef;
use crate::error::{Error, Result};
use crate::types::{
    object_id_to_area_id, BoundingBox, ChangesetId, ItemType, Location, NodeRef, ObjectId,
    Timestamp, UserId, UNDEFINED_COORDINATE,
};

use super::lists::{
    check_string_len, ChangesetDiscussionBuilder, NodeRefListBuilder, RelationMemberListBuilder,
    TagListBuilder,
};
use super::ItemBuilder;

fn parse_attribute<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| Error::InvalidAttribute {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Shared implementation of the common object layout.
struct ObjectCore<'a> {
    inner: ItemBuilder<'a>,
    /// Fixed size of this object kind, including the item header.
    fixed_size: usize,
}

impl<'a> ObjectCore<'a> {
    fn new(arena: &'a mut Arena, item_type: ItemType, fixed_size: usize) -> Self {
        let mut inner = ItemBuilder::new(arena, None, item_type, fixed_size - ITEM_HEADER_SIZE);
        // One alignment unit is always reserved for the user name; a short
        // name fits without growing the item.
        inner.reserve(ALIGNMENT);
        let start = inner.start();
        let arena = inner.arena_mut();
        arena.write_u8_at(start + O_FLAGS, FLAG_VISIBLE);
        // Empty user name: just the NUL terminator.
        arena.write_u16_at(start + O_USER_LEN, 1);
        Self { inner, fixed_size }
    }

    fn put(&mut self, field: usize, bytes: &[u8]) {
        let offset = self.inner.start() + field;
        self.inner.arena_mut().put_slice_at(offset, bytes);
    }

    fn set_id(&mut self, id: ObjectId) {
        self.put(O_ID, &id.to_le_bytes());
    }

    fn set_version(&mut self, version: u32) {
        self.put(O_VERSION, &version.to_le_bytes());
    }

    fn set_changeset(&mut self, changeset: ChangesetId) {
        self.put(O_CHANGESET, &changeset.to_le_bytes());
    }

    fn set_uid(&mut self, uid: UserId) {
        self.put(O_UID, &uid.to_le_bytes());
    }

    fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.put(O_TIMESTAMP, &timestamp.to_le_bytes());
    }

    fn set_flag(&mut self, flag: u8, on: bool) {
        let offset = self.inner.start() + O_FLAGS;
        let flags = self.inner.arena().read_u8_at(offset);
        let flags = if on { flags | flag } else { flags & !flag };
        self.inner.arena_mut().write_u8_at(offset, flags);
    }

    fn set_visible(&mut self, visible: bool) {
        self.set_flag(FLAG_VISIBLE, visible);
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.set_flag(FLAG_DELETED, deleted);
        self.set_flag(FLAG_VISIBLE, !deleted);
    }

    /// True while the user name is still the initial empty one and nothing
    /// variable-length has been appended.
    fn user_untouched(&self) -> bool {
        let start = self.inner.start();
        self.inner.arena().read_u16_at(start + O_USER_LEN) == 1
            && self.inner.size() as usize == self.fixed_size + ALIGNMENT
    }

    fn set_user(&mut self, user: &str) -> Result<()> {
        check_string_len("user name", user)?;
        debug_assert!(
            self.user_untouched(),
            "set_user() must be called at most once and before any sub-builders"
        );
        let needed = user.len() + 1;
        if needed > ALIGNMENT {
            self.inner.reserve(padded(needed) - ALIGNMENT);
        }
        let user_offset = self.inner.start() + self.fixed_size;
        self.inner.arena_mut().put_slice_at(user_offset, user.as_bytes());
        let start = self.inner.start();
        self.inner
            .arena_mut()
            .write_u16_at(start + O_USER_LEN, needed as u16);
        Ok(())
    }

    /// Set one field from its textual name and value, as they appear in XML
    /// and similar formats. Unknown names are ignored.
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "id" => self.set_id(parse_attribute(name, value)?),
            "version" => self.set_version(parse_attribute(name, value)?),
            "changeset" => self.set_changeset(parse_attribute(name, value)?),
            "uid" => self.set_uid(parse_attribute(name, value)?),
            "timestamp" => self.set_timestamp(parse_attribute(name, value)?),
            "user" => self.set_user(value)?,
            "visible" => match value {
                "true" => self.set_visible(true),
                "false" => self.set_visible(false),
                _ => {
                    return Err(Error::InvalidAttribute {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
                }
            },
            _ => {}
        }
        Ok(())
    }

    fn tags(&mut self) -> TagListBuilder<'_> {
        TagListBuilder::from_inner(self.inner.child(ItemType::TagList, 0))
    }

    fn add_tags(&mut self, tags: &[(&str, &str)]) -> Result<()> {
        let mut builder = self.tags();
        for (key, value) in tags {
            builder.add_tag(key, value)?;
        }
        Ok(())
    }
}

macro_rules! object_builder {
    ($(#[$doc:meta])* $name:ident, $item_type:expr, $fixed_size:expr) => {
        $(#[$doc])*
        pub struct $name<'a> {
            core: ObjectCore<'a>,
        }

        impl<'a> $name<'a> {
            pub fn new(arena: &'a mut Arena) -> Self {
                Self {
                    core: ObjectCore::new(arena, $item_type, $fixed_size),
                }
            }

            pub fn set_id(&mut self, id: ObjectId) -> &mut Self {
                self.core.set_id(id);
                self
            }

            pub fn set_version(&mut self, version: u32) -> &mut Self {
                self.core.set_version(version);
                self
            }

            pub fn set_changeset(&mut self, changeset: ChangesetId) -> &mut Self {
                self.core.set_changeset(changeset);
                self
            }

            pub fn set_uid(&mut self, uid: UserId) -> &mut Self {
                self.core.set_uid(uid);
                self
            }

            pub fn set_timestamp(&mut self, timestamp: Timestamp) -> &mut Self {
                self.core.set_timestamp(timestamp);
                self
            }

            pub fn set_visible(&mut self, visible: bool) -> &mut Self {
                self.core.set_visible(visible);
                self
            }

            pub fn set_deleted(&mut self, deleted: bool) -> &mut Self {
                self.core.set_deleted(deleted);
                self
            }

            /// Set the user name. Must be called before any sub-builder is
            /// opened, and at most once.
            pub fn set_user(&mut self, user: &str) -> Result<&mut Self> {
                self.core.set_user(user)?;
                Ok(self)
            }

            /// Set one field from its textual name and value.
            pub fn set_attribute(&mut self, name: &str, value: &str) -> Result<&mut Self> {
                self.core.set_attribute(name, value)?;
                Ok(self)
            }

            /// Open a builder for this entity's tag list.
            pub fn tags(&mut self) -> TagListBuilder<'_> {
                self.core.tags()
            }

            /// Add a complete tag list in one call.
            pub fn add_tags(&mut self, tags: &[(&str, &str)]) -> Result<&mut Self> {
                self.core.add_tags(tags)?;
                Ok(self)
            }

            /// Close the entity explicitly. Dropping the builder has the
            /// same effect.
            pub fn finish(self) {}
        }
    };
}

object_builder!(
    /// Builds a node: object fields plus a location.
    NodeBuilder,
    ItemType::Node,
    NODE_FIXED_SIZE
);
object_builder!(
    /// Builds a way: object fields plus a node reference list.
    WayBuilder,
    ItemType::Way,
    OBJECT_FIXED_SIZE
);
object_builder!(
    /// Builds a relation: object fields plus a member list.
    RelationBuilder,
    ItemType::Relation,
    OBJECT_FIXED_SIZE
);
object_builder!(
    /// Builds an area: object fields plus outer and inner rings.
    AreaBuilder,
    ItemType::Area,
    OBJECT_FIXED_SIZE
);

impl NodeBuilder<'_> {
    pub fn set_location(&mut self, location: Location) -> &mut Self {
        self.core.put(O_LON, &location.x().to_le_bytes());
        self.core.put(O_LAT, &location.y().to_le_bytes());
        self
    }
}

impl WayBuilder<'_> {
    /// Open a builder for this way's node reference list.
    pub fn nodes(&mut self) -> NodeRefListBuilder<'_> {
        NodeRefListBuilder::from_inner(self.core.inner.child(ItemType::WayNodeList, 0))
    }

    /// Add a complete node reference list in one call.
    pub fn add_node_refs(&mut self, refs: &[NodeRef]) -> &mut Self {
        let mut builder = self.nodes();
        for node_ref in refs {
            builder.add_node_ref(*node_ref);
        }
        drop(builder);
        self
    }
}

impl RelationBuilder<'_> {
    /// Open a builder for this relation's member list.
    pub fn members(&mut self) -> RelationMemberListBuilder<'_> {
        RelationMemberListBuilder::from_inner(
            self.core.inner.child(ItemType::RelationMemberList, 0),
        )
    }
}

impl AreaBuilder<'_> {
    /// Open a builder for an outer boundary ring.
    pub fn outer_ring(&mut self) -> NodeRefListBuilder<'_> {
        NodeRefListBuilder::from_inner(self.core.inner.child(ItemType::OuterRing, 0))
    }

    /// Open a builder for an inner boundary ring (a hole).
    pub fn inner_ring(&mut self) -> NodeRefListBuilder<'_> {
        NodeRefListBuilder::from_inner(self.core.inner.child(ItemType::InnerRing, 0))
    }

    /// Copy the metadata of the way or relation this area was assembled
    /// from. The area id is derived from the source id so way-based and
    /// relation-based areas never collide.
    pub fn initialize_from(&mut self, source: &ObjectRef<'_>) -> Result<&mut Self> {
        debug_assert!(
            matches!(source.item_type(), ItemType::Way | ItemType::Relation),
            "areas are assembled from ways and relations"
        );
        self.core
            .set_id(object_id_to_area_id(source.id(), source.item_type()));
        self.core.set_version(source.version());
        self.core.set_changeset(source.changeset());
        self.core.set_timestamp(source.timestamp());
        self.core.set_visible(source.visible());
        self.core.set_uid(source.uid());
        self.core.set_user(source.user())?;
        Ok(self)
    }
}

/// Builds a changeset: its own fixed layout (bounds instead of a location,
/// two timestamps) plus an optional discussion.
pub struct ChangesetBuilder<'a> {
    inner: ItemBuilder<'a>,
}

impl<'a> ChangesetBuilder<'a> {
    pub fn new(arena: &'a mut Arena) -> Self {
        let mut inner = ItemBuilder::new(
            arena,
            None,
            ItemType::Changeset,
            CHANGESET_FIXED_SIZE - ITEM_HEADER_SIZE,
        );
        inner.reserve(ALIGNMENT);
        let start = inner.start();
        let arena = inner.arena_mut();
        arena.write_u16_at(start + C_USER_LEN, 1);
        // Bounds start out undefined, not at coordinate zero.
        for i in 0..4 {
            arena.put_slice_at(start + C_BOUNDS + 4 * i, &UNDEFINED_COORDINATE.to_le_bytes());
        }
        Self { inner }
    }

    fn put(&mut self, field: usize, bytes: &[u8]) {
        let offset = self.inner.start() + field;
        self.inner.arena_mut().put_slice_at(offset, bytes);
    }

    pub fn set_id(&mut self, id: ChangesetId) -> &mut Self {
        self.put(C_ID, &id.to_le_bytes());
        self
    }

    pub fn set_uid(&mut self, uid: UserId) -> &mut Self {
        self.put(C_UID, &uid.to_le_bytes());
        self
    }

    pub fn set_created_at(&mut self, timestamp: Timestamp) -> &mut Self {
        self.put(C_CREATED_AT, &timestamp.to_le_bytes());
        self
    }

    pub fn set_closed_at(&mut self, timestamp: Timestamp) -> &mut Self {
        self.put(C_CLOSED_AT, &timestamp.to_le_bytes());
        self
    }

    pub fn set_num_changes(&mut self, num: u32) -> &mut Self {
        self.put(C_NUM_CHANGES, &num.to_le_bytes());
        self
    }

    pub fn set_num_comments(&mut self, num: u32) -> &mut Self {
        self.put(C_NUM_COMMENTS, &num.to_le_bytes());
        self
    }

    pub fn set_bounds(&mut self, bounds: &BoundingBox) -> &mut Self {
        self.put(C_BOUNDS, &bounds.bottom_left().x().to_le_bytes());
        self.put(C_BOUNDS + 4, &bounds.bottom_left().y().to_le_bytes());
        self.put(C_BOUNDS + 8, &bounds.top_right().x().to_le_bytes());
        self.put(C_BOUNDS + 12, &bounds.top_right().y().to_le_bytes());
        self
    }

    /// Set the user name. Must be called before any sub-builder is opened,
    /// and at most once.
    pub fn set_user(&mut self, user: &str) -> Result<&mut Self> {
        check_string_len("user name", user)?;
        let start = self.inner.start();
        debug_assert!(
            self.inner.arena().read_u16_at(start + C_USER_LEN) == 1
                && self.inner.size() as usize == CHANGESET_FIXED_SIZE + ALIGNMENT,
            "set_user() must be called at most once and before any sub-builders"
        );
        let needed = user.len() + 1;
        if needed > ALIGNMENT {
            self.inner.reserve(padded(needed) - ALIGNMENT);
        }
        let user_offset = self.inner.start() + CHANGESET_FIXED_SIZE;
        self.inner.arena_mut().put_slice_at(user_offset, user.as_bytes());
        let start = self.inner.start();
        self.inner
            .arena_mut()
            .write_u16_at(start + C_USER_LEN, needed as u16);
        Ok(self)
    }

    /// Set one field from its textual name and value. Unknown names are
    /// ignored.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        match name {
            "id" => {
                let id = parse_attribute(name, value)?;
                self.set_id(id);
            }
            "uid" => {
                let uid = parse_attribute(name, value)?;
                self.set_uid(uid);
            }
            "created_at" => {
                let timestamp = parse_attribute(name, value)?;
                self.set_created_at(timestamp);
            }
            "closed_at" => {
                let timestamp = parse_attribute(name, value)?;
                self.set_closed_at(timestamp);
            }
            "num_changes" => {
                let num = parse_attribute(name, value)?;
                self.set_num_changes(num);
            }
            "comments_count" => {
                let num = parse_attribute(name, value)?;
                self.set_num_comments(num);
            }
            "user" => {
                self.set_user(value)?;
            }
            _ => {}
        }
        Ok(self)
    }

    /// Open a builder for this changeset's tag list.
    pub fn tags(&mut self) -> TagListBuilder<'_> {
        TagListBuilder::from_inner(self.inner.child(ItemType::TagList, 0))
    }

    /// Open a builder for this changeset's discussion.
    pub fn discussion(&mut self) -> ChangesetDiscussionBuilder<'_> {
        ChangesetDiscussionBuilder::from_inner(
            self.inner.child(ItemType::ChangesetDiscussion, 0),
        )
    }

    /// Close the changeset explicitly. Dropping the builder has the same
    /// effect.
    pub fn finish(self) {}
}
