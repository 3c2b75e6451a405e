//! Typed Read-Side Views over Buffer-Resident Entities
//!
//! Builders write entities into an [`Arena`](crate::Arena); the views in this
//! module read them back without copying. A view is a thin wrapper around the
//! item's byte slice; every field access decodes at the moment of use.
//!
//! Views only exist for committed items, so all layout invariants (alignment,
//! padded sizes, NUL-terminated strings) hold by construction.

use crate::arena::padded;
use crate::types::{
    BoundingBox, ChangesetId, ItemType, Location, NodeRef, ObjectId, Timestamp, UserId,
};

/// Binary layout constants shared by the builders and the views.
///
/// All offsets are relative to the start of the item (including its header).
pub(crate) mod layout {
    /// Size (u32 LE) + type (u8) + 3 reserved bytes.
    pub(crate) const ITEM_HEADER_SIZE: usize = 8;

    pub(crate) const O_ID: usize = 8;
    pub(crate) const O_TIMESTAMP: usize = 16;
    pub(crate) const O_CHANGESET: usize = 24;
    pub(crate) const O_UID: usize = 32;
    pub(crate) const O_VERSION: usize = 36;
    pub(crate) const O_FLAGS: usize = 40;
    pub(crate) const O_USER_LEN: usize = 42;
    /// Fixed size of ways, relations, and areas (incl. header).
    pub(crate) const OBJECT_FIXED_SIZE: usize = 48;

    pub(crate) const O_LON: usize = 48;
    pub(crate) const O_LAT: usize = 52;
    /// Fixed size of nodes (object fields plus the location).
    pub(crate) const NODE_FIXED_SIZE: usize = 56;

    pub(crate) const FLAG_VISIBLE: u8 = 0x01;
    pub(crate) const FLAG_DELETED: u8 = 0x02;

    pub(crate) const C_ID: usize = 8;
    pub(crate) const C_CREATED_AT: usize = 16;
    pub(crate) const C_CLOSED_AT: usize = 24;
    pub(crate) const C_UID: usize = 32;
    pub(crate) const C_NUM_CHANGES: usize = 36;
    pub(crate) const C_NUM_COMMENTS: usize = 40;
    pub(crate) const C_USER_LEN: usize = 44;
    pub(crate) const C_BOUNDS: usize = 48;
    pub(crate) const CHANGESET_FIXED_SIZE: usize = 64;

    /// Relation member record: id (i64), member type (u8), flags (u8),
    /// role size incl. NUL (u16), 4 reserved bytes.
    pub(crate) const MEMBER_RECORD_SIZE: usize = 16;
    pub(crate) const M_ID: usize = 0;
    pub(crate) const M_TYPE: usize = 8;
    pub(crate) const M_FLAGS: usize = 9;
    pub(crate) const M_ROLE_LEN: usize = 10;
    pub(crate) const MEMBER_FLAG_FULL: u8 = 0x01;

    /// Changeset comment record: timestamp (i64), uid (u32), user name size
    /// incl. NUL (u16), text size excl. NUL (u16).
    pub(crate) const COMMENT_RECORD_SIZE: usize = 16;
    pub(crate) const CM_TIMESTAMP: usize = 0;
    pub(crate) const CM_UID: usize = 8;
    pub(crate) const CM_USER_LEN: usize = 12;
    pub(crate) const CM_TEXT_LEN: usize = 14;

    /// Node reference record: id (i64), x (i32), y (i32).
    pub(crate) const NODE_REF_RECORD_SIZE: usize = 16;
}

use layout::*;

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(data[offset..offset + 2].try_into().unwrap_or([0; 2]))
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap_or([0; 4]))
}

fn read_i32(data: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(data[offset..offset + 4].try_into().unwrap_or([0; 4]))
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap_or([0; 8]))
}

fn read_i64(data: &[u8], offset: usize) -> i64 {
    i64::from_le_bytes(data[offset..offset + 8].try_into().unwrap_or([0; 8]))
}

/// Read a string of `len_with_nul` bytes (including the terminator).
fn read_str(data: &[u8], offset: usize, len_with_nul: usize) -> &str {
    if len_with_nul == 0 {
        return "";
    }
    std::str::from_utf8(&data[offset..offset + len_with_nul - 1]).unwrap_or("")
}

/// An untyped view of one item (entity or inner item).
#[derive(Debug, Clone, Copy)]
pub struct ItemRef<'a> {
    data: &'a [u8],
}

impl<'a> ItemRef<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn item_type(&self) -> ItemType {
        ItemType::try_from(self.data[4]).unwrap_or(ItemType::Undefined)
    }

    /// Recorded size including header and padding; always a multiple of the
    /// padding unit.
    pub fn byte_size(&self) -> usize {
        read_u32(self.data, 0) as usize
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// View as a node, way, relation, or area.
    pub fn as_object(&self) -> Option<ObjectRef<'a>> {
        if self.item_type().is_object() {
            Some(ObjectRef { data: self.data })
        } else {
            None
        }
    }

    pub fn as_changeset(&self) -> Option<ChangesetRef<'a>> {
        if self.item_type() == ItemType::Changeset {
            Some(ChangesetRef { data: self.data })
        } else {
            None
        }
    }
}

/// Iterator over consecutive items in a byte region.
#[derive(Debug, Clone)]
pub struct ItemIter<'a> {
    rest: &'a [u8],
}

impl<'a> ItemIter<'a> {
    pub(crate) fn new(rest: &'a [u8]) -> Self {
        Self { rest }
    }
}

impl<'a> Iterator for ItemIter<'a> {
    type Item = ItemRef<'a>;

    fn next(&mut self) -> Option<ItemRef<'a>> {
        if self.rest.len() < ITEM_HEADER_SIZE {
            return None;
        }
        let size = read_u32(self.rest, 0) as usize;
        if size < ITEM_HEADER_SIZE || size > self.rest.len() {
            return None;
        }
        let (item, rest) = self.rest.split_at(size);
        self.rest = rest;
        Some(ItemRef::new(item))
    }
}

/// View of an entity with the common object layout (node, way, relation,
/// area): id, version, flags, changeset, uid, timestamp, user name, tags,
/// and type-specific children.
#[derive(Debug, Clone, Copy)]
pub struct ObjectRef<'a> {
    data: &'a [u8],
}

impl<'a> ObjectRef<'a> {
    pub fn item_type(&self) -> ItemType {
        ItemType::try_from(self.data[4]).unwrap_or(ItemType::Undefined)
    }

    pub fn byte_size(&self) -> usize {
        read_u32(self.data, 0) as usize
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn id(&self) -> ObjectId {
        read_i64(self.data, O_ID)
    }

    pub fn version(&self) -> u32 {
        read_u32(self.data, O_VERSION)
    }

    pub fn changeset(&self) -> ChangesetId {
        read_u64(self.data, O_CHANGESET)
    }

    pub fn uid(&self) -> UserId {
        read_u32(self.data, O_UID)
    }

    pub fn timestamp(&self) -> Timestamp {
        read_i64(self.data, O_TIMESTAMP)
    }

    pub fn visible(&self) -> bool {
        self.data[O_FLAGS] & FLAG_VISIBLE != 0
    }

    pub fn deleted(&self) -> bool {
        self.data[O_FLAGS] & FLAG_DELETED != 0
    }

    /// User name; empty if never set.
    pub fn user(&self) -> &'a str {
        read_str(self.data, self.fixed_size(), self.user_len())
    }

    /// Location of a node. Undefined for other object types.
    pub fn location(&self) -> Location {
        if self.item_type() != ItemType::Node {
            return Location::undefined();
        }
        Location::new(read_i32(self.data, O_LON), read_i32(self.data, O_LAT))
    }

    /// Node references of a way (empty for other object types).
    pub fn nodes(&self) -> NodeRefIter<'a> {
        self.subitems()
            .find(|item| item.item_type() == ItemType::WayNodeList)
            .map(|item| NodeRefIter::new(&item.as_bytes()[ITEM_HEADER_SIZE..]))
            .unwrap_or_else(|| NodeRefIter::new(&[]))
    }

    /// Members of a relation (empty for other object types).
    pub fn members(&self) -> MemberIter<'a> {
        self.subitems()
            .find(|item| item.item_type() == ItemType::RelationMemberList)
            .map(|item| MemberIter::new(&item.as_bytes()[ITEM_HEADER_SIZE..]))
            .unwrap_or_else(|| MemberIter::new(&[]))
    }

    /// Outer rings of an area.
    pub fn outer_rings(&self) -> impl Iterator<Item = Ring<'a>> {
        self.rings(ItemType::OuterRing)
    }

    /// Inner rings of an area.
    pub fn inner_rings(&self) -> impl Iterator<Item = Ring<'a>> {
        self.rings(ItemType::InnerRing)
    }

    fn rings(&self, kind: ItemType) -> impl Iterator<Item = Ring<'a>> {
        self.subitems().filter_map(move |item| {
            if item.item_type() == kind {
                Some(Ring { data: item.as_bytes() })
            } else {
                None
            }
        })
    }

    pub fn tags(&self) -> TagIter<'a> {
        self.subitems()
            .find(|item| item.item_type() == ItemType::TagList)
            .map(|item| TagIter::new(&item.as_bytes()[ITEM_HEADER_SIZE..]))
            .unwrap_or_else(|| TagIter::new(&[]))
    }

    /// Iterate the child items following the fixed fields and user name.
    pub fn subitems(&self) -> ItemIter<'a> {
        ItemIter::new(&self.data[self.children_offset()..])
    }

    fn user_len(&self) -> usize {
        read_u16(self.data, O_USER_LEN) as usize
    }

    fn fixed_size(&self) -> usize {
        if self.item_type() == ItemType::Node {
            NODE_FIXED_SIZE
        } else {
            OBJECT_FIXED_SIZE
        }
    }

    fn children_offset(&self) -> usize {
        self.fixed_size() + padded(self.user_len())
    }
}

/// View of a changeset: metadata, bounds, user name, and discussion.
#[derive(Debug, Clone, Copy)]
pub struct ChangesetRef<'a> {
    data: &'a [u8],
}

impl<'a> ChangesetRef<'a> {
    pub fn byte_size(&self) -> usize {
        read_u32(self.data, 0) as usize
    }

    pub fn id(&self) -> ChangesetId {
        read_u64(self.data, C_ID)
    }

    pub fn uid(&self) -> UserId {
        read_u32(self.data, C_UID)
    }

    pub fn created_at(&self) -> Timestamp {
        read_i64(self.data, C_CREATED_AT)
    }

    pub fn closed_at(&self) -> Timestamp {
        read_i64(self.data, C_CLOSED_AT)
    }

    pub fn num_changes(&self) -> u32 {
        read_u32(self.data, C_NUM_CHANGES)
    }

    pub fn num_comments(&self) -> u32 {
        read_u32(self.data, C_NUM_COMMENTS)
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(
            Location::new(read_i32(self.data, C_BOUNDS), read_i32(self.data, C_BOUNDS + 4)),
            Location::new(
                read_i32(self.data, C_BOUNDS + 8),
                read_i32(self.data, C_BOUNDS + 12),
            ),
        )
    }

    pub fn user(&self) -> &'a str {
        read_str(self.data, CHANGESET_FIXED_SIZE, self.user_len())
    }

    /// Discussion comments, oldest first. Empty if the changeset has no
    /// discussion child.
    pub fn comments(&self) -> CommentIter<'a> {
        self.subitems()
            .find(|item| item.item_type() == ItemType::ChangesetDiscussion)
            .map(|item| CommentIter::new(&item.as_bytes()[ITEM_HEADER_SIZE..]))
            .unwrap_or_else(|| CommentIter::new(&[]))
    }

    pub fn subitems(&self) -> ItemIter<'a> {
        let user_len = self.user_len();
        ItemIter::new(&self.data[CHANGESET_FIXED_SIZE + padded(user_len)..])
    }

    fn user_len(&self) -> usize {
        read_u16(self.data, C_USER_LEN) as usize
    }
}

/// Iterator over (key, value) pairs of a tag list.
///
/// Keys and values are stored as alternating NUL-terminated strings. The
/// trailing item padding is all zeros, so iteration stops when only zero
/// bytes remain; a tag with both key and value empty is therefore not
/// representable.
#[derive(Debug, Clone)]
pub struct TagIter<'a> {
    rest: &'a [u8],
}

impl<'a> TagIter<'a> {
    fn new(rest: &'a [u8]) -> Self {
        Self { rest }
    }
}

impl<'a> Iterator for TagIter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<(&'a str, &'a str)> {
        if self.rest.iter().all(|&b| b == 0) {
            return None;
        }
        let key_end = self.rest.iter().position(|&b| b == 0)?;
        let value_start = key_end + 1;
        let value_end = value_start + self.rest[value_start..].iter().position(|&b| b == 0)?;

        let key = std::str::from_utf8(&self.rest[..key_end]).unwrap_or("");
        let value = std::str::from_utf8(&self.rest[value_start..value_end]).unwrap_or("");
        self.rest = &self.rest[value_end + 1..];
        Some((key, value))
    }
}

/// Iterator over the fixed-size node reference records of a way node list or
/// ring.
#[derive(Debug, Clone)]
pub struct NodeRefIter<'a> {
    rest: &'a [u8],
}

impl<'a> NodeRefIter<'a> {
    fn new(rest: &'a [u8]) -> Self {
        Self { rest }
    }
}

impl Iterator for NodeRefIter<'_> {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        if self.rest.len() < NODE_REF_RECORD_SIZE {
            return None;
        }
        let node_ref = NodeRef::new(
            read_i64(self.rest, 0),
            Location::new(read_i32(self.rest, 8), read_i32(self.rest, 12)),
        );
        self.rest = &self.rest[NODE_REF_RECORD_SIZE..];
        Some(node_ref)
    }
}

/// One boundary loop of an area polygon.
#[derive(Debug, Clone, Copy)]
pub struct Ring<'a> {
    data: &'a [u8],
}

impl<'a> Ring<'a> {
    pub fn item_type(&self) -> ItemType {
        ItemType::try_from(self.data[4]).unwrap_or(ItemType::Undefined)
    }

    pub fn nodes(&self) -> NodeRefIter<'a> {
        NodeRefIter::new(&self.data[ITEM_HEADER_SIZE..])
    }
}

/// One member of a relation.
#[derive(Debug, Clone, Copy)]
pub struct RelationMember<'a> {
    pub member_type: ItemType,
    pub id: ObjectId,
    pub role: &'a str,
    /// The embedded copy of the member entity, if one was stored.
    pub full: Option<ObjectRef<'a>>,
}

/// Iterator over the member records of a relation member list.
#[derive(Debug, Clone)]
pub struct MemberIter<'a> {
    rest: &'a [u8],
}

impl<'a> MemberIter<'a> {
    fn new(rest: &'a [u8]) -> Self {
        Self { rest }
    }
}

impl<'a> Iterator for MemberIter<'a> {
    type Item = RelationMember<'a>;

    fn next(&mut self) -> Option<RelationMember<'a>> {
        if self.rest.len() < MEMBER_RECORD_SIZE {
            return None;
        }
        let id = read_i64(self.rest, M_ID);
        let member_type = ItemType::try_from(self.rest[M_TYPE]).unwrap_or(ItemType::Undefined);
        if member_type == ItemType::Undefined {
            // Trailing zeros cannot form a valid member record.
            return None;
        }
        let flags = self.rest[M_FLAGS];
        let role_len = read_u16(self.rest, M_ROLE_LEN) as usize;
        let role = read_str(self.rest, MEMBER_RECORD_SIZE, role_len);

        let mut offset = padded(MEMBER_RECORD_SIZE + role_len);
        let full = if flags & MEMBER_FLAG_FULL != 0 {
            let item_size = read_u32(self.rest, offset) as usize;
            let item = ItemRef::new(&self.rest[offset..offset + item_size]);
            offset += item_size;
            item.as_object()
        } else {
            None
        };

        self.rest = &self.rest[offset..];
        Some(RelationMember {
            member_type,
            id,
            role,
            full,
        })
    }
}

/// One comment of a changeset discussion.
#[derive(Debug, Clone, Copy)]
pub struct ChangesetComment<'a> {
    pub timestamp: Timestamp,
    pub uid: UserId,
    pub user: &'a str,
    pub text: &'a str,
}

/// Iterator over the comment records of a changeset discussion.
#[derive(Debug, Clone)]
pub struct CommentIter<'a> {
    rest: &'a [u8],
}

impl<'a> CommentIter<'a> {
    fn new(rest: &'a [u8]) -> Self {
        Self { rest }
    }
}

impl<'a> Iterator for CommentIter<'a> {
    type Item = ChangesetComment<'a>;

    fn next(&mut self) -> Option<ChangesetComment<'a>> {
        if self.rest.len() < COMMENT_RECORD_SIZE {
            return None;
        }
        let user_len = read_u16(self.rest, CM_USER_LEN) as usize;
        if user_len == 0 {
            // A valid comment always stores at least the user NUL byte.
            return None;
        }
        let text_len = read_u16(self.rest, CM_TEXT_LEN) as usize;

        let user = read_str(self.rest, COMMENT_RECORD_SIZE, user_len);
        let text_start = COMMENT_RECORD_SIZE + user_len;
        let text =
            std::str::from_utf8(&self.rest[text_start..text_start + text_len]).unwrap_or("");

        let comment = ChangesetComment {
            timestamp: read_i64(self.rest, CM_TIMESTAMP),
            uid: read_u32(self.rest, CM_UID),
            user,
            text,
        };
        // Comment units are padded individually, including the text NUL.
        self.rest = &self.rest[padded(text_start + text_len + 1)..];
        Some(comment)
    }
}
