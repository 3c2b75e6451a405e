//! Basic Types of the Entity Model
//!
//! This module defines the small value types shared by the whole crate:
//! item type discriminants, id and timestamp aliases, packed locations and
//! bounding boxes, string-length ceilings, the entity-type filter used by
//! block decoders, and the way/relation to area id mapping.
//!
//! ## Ids
//! Object ids are signed 64-bit (negative ids are used for not-yet-uploaded
//! entities by editors). Changeset ids and user ids are unsigned.
//!
//! ## Coordinates
//! A `Location` stores (x, y) as 32-bit integers in units of 1e-7 degrees,
//! which gives about 1 cm of resolution and makes every location exactly
//! 8 bytes. `i32::MAX` is the "undefined" sentinel for both axes.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Id of a node, way, relation, or area.
pub type ObjectId = i64;

/// Id of a changeset.
pub type ChangesetId = u64;

/// Id of a user account.
pub type UserId = u32;

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

/// Maximum byte length of tag keys and values, member roles, and user names.
///
/// String sizes are stored in a u16 field including the NUL terminator,
/// so the longest representable string is one short of `u16::MAX`.
pub const MAX_STRING_LEN: usize = u16::MAX as usize - 1;

/// Maximum byte length of a changeset comment text.
///
/// The comment text length is stored without its NUL terminator, so it is
/// exactly one byte longer than [`MAX_STRING_LEN`]. The asymmetry is
/// deliberate and part of the stored format.
pub const MAX_COMMENT_TEXT_LEN: usize = u16::MAX as usize;

/// Discriminant stored in every item header.
///
/// Values below 0x10 are entities (the unit of map data); values from 0x11
/// up are inner items that only appear nested inside an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ItemType {
    Undefined = 0x00,
    Node = 0x01,
    Way = 0x02,
    Relation = 0x03,
    Area = 0x04,
    Changeset = 0x05,
    TagList = 0x11,
    WayNodeList = 0x12,
    RelationMemberList = 0x13,
    OuterRing = 0x14,
    InnerRing = 0x15,
    ChangesetDiscussion = 0x16,
}

impl ItemType {
    /// True for the five top-level entity kinds.
    pub fn is_entity(self) -> bool {
        matches!(
            self,
            ItemType::Node
                | ItemType::Way
                | ItemType::Relation
                | ItemType::Area
                | ItemType::Changeset
        )
    }

    /// True for entities sharing the common object layout (everything but
    /// changesets).
    pub fn is_object(self) -> bool {
        matches!(
            self,
            ItemType::Node | ItemType::Way | ItemType::Relation | ItemType::Area
        )
    }
}

impl TryFrom<u8> for ItemType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0x00 => Ok(ItemType::Undefined),
            0x01 => Ok(ItemType::Node),
            0x02 => Ok(ItemType::Way),
            0x03 => Ok(ItemType::Relation),
            0x04 => Ok(ItemType::Area),
            0x05 => Ok(ItemType::Changeset),
            0x11 => Ok(ItemType::TagList),
            0x12 => Ok(ItemType::WayNodeList),
            0x13 => Ok(ItemType::RelationMemberList),
            0x14 => Ok(ItemType::OuterRing),
            0x15 => Ok(ItemType::InnerRing),
            0x16 => Ok(ItemType::ChangesetDiscussion),
            other => Err(Error::InvalidItemType(other)),
        }
    }
}

/// Sentinel coordinate for "no location set".
pub const UNDEFINED_COORDINATE: i32 = i32::MAX;

const COORDINATE_SCALE: f64 = 1e7;

/// A geographic position packed into 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    x: i32,
    y: i32,
}

impl Location {
    /// A location with both coordinates set to the undefined sentinel.
    pub const fn undefined() -> Self {
        Self {
            x: UNDEFINED_COORDINATE,
            y: UNDEFINED_COORDINATE,
        }
    }

    /// Create from raw fixed-point coordinates (units of 1e-7 degrees).
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Create from floating-point degrees, rounding to the fixed-point grid.
    pub fn from_degrees(lon: f64, lat: f64) -> Self {
        Self {
            x: (lon * COORDINATE_SCALE).round() as i32,
            y: (lat * COORDINATE_SCALE).round() as i32,
        }
    }

    pub const fn x(&self) -> i32 {
        self.x
    }

    pub const fn y(&self) -> i32 {
        self.y
    }

    pub fn lon(&self) -> f64 {
        f64::from(self.x) / COORDINATE_SCALE
    }

    pub fn lat(&self) -> f64 {
        f64::from(self.y) / COORDINATE_SCALE
    }

    /// False if either coordinate is the undefined sentinel.
    pub fn is_defined(&self) -> bool {
        self.x != UNDEFINED_COORDINATE && self.y != UNDEFINED_COORDINATE
    }

    /// True if defined and within the +-180 / +-90 degree range.
    pub fn is_valid(&self) -> bool {
        self.is_defined()
            && self.lon() >= -180.0
            && self.lon() <= 180.0
            && self.lat() >= -90.0
            && self.lat() <= 90.0
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::undefined()
    }
}

/// Axis-aligned bounding box of two locations (used by changesets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    bottom_left: Location,
    top_right: Location,
}

impl BoundingBox {
    /// An empty box; extending it with any defined location makes it valid.
    pub const fn undefined() -> Self {
        Self {
            bottom_left: Location::undefined(),
            top_right: Location::undefined(),
        }
    }

    pub const fn new(bottom_left: Location, top_right: Location) -> Self {
        Self {
            bottom_left,
            top_right,
        }
    }

    pub const fn bottom_left(&self) -> Location {
        self.bottom_left
    }

    pub const fn top_right(&self) -> Location {
        self.top_right
    }

    pub fn is_valid(&self) -> bool {
        self.bottom_left.is_defined() && self.top_right.is_defined()
    }

    /// Grow the box to include the given location. Undefined locations are
    /// ignored.
    pub fn extend(&mut self, location: Location) {
        if !location.is_defined() {
            return;
        }
        if !self.is_valid() {
            self.bottom_left = location;
            self.top_right = location;
            return;
        }
        self.bottom_left = Location::new(
            self.bottom_left.x().min(location.x()),
            self.bottom_left.y().min(location.y()),
        );
        self.top_right = Location::new(
            self.top_right.x().max(location.x()),
            self.top_right.y().max(location.y()),
        );
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::undefined()
    }
}

/// A node reference inside a way node list or ring: a node id plus an
/// optional resolved location. Exactly 16 bytes when stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef {
    pub id: ObjectId,
    pub location: Location,
}

impl NodeRef {
    pub const fn new(id: ObjectId, location: Location) -> Self {
        Self { id, location }
    }

    /// A reference without a resolved location.
    pub const fn bare(id: ObjectId) -> Self {
        Self {
            id,
            location: Location::undefined(),
        }
    }
}

/// Map a way or relation id into the area id space.
///
/// Way ids map to even area ids, relation ids to odd ones, so the two source
/// id spaces stay disjoint and the mapping is invertible without collisions.
pub fn object_id_to_area_id(id: ObjectId, item_type: ItemType) -> ObjectId {
    debug_assert!(
        matches!(item_type, ItemType::Way | ItemType::Relation),
        "areas are only created from ways and relations"
    );
    (id * 2) | ObjectId::from(item_type == ItemType::Relation)
}

/// Recover the source id and type from an area id.
pub fn area_id_to_object_id(area_id: ObjectId) -> (ObjectId, ItemType) {
    let item_type = if area_id & 1 == 1 {
        ItemType::Relation
    } else {
        ItemType::Way
    };
    (area_id >> 1, item_type)
}

/// Bitmask selecting which entity types a block decoder should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityBits(u8);

impl EntityBits {
    pub const NOTHING: EntityBits = EntityBits(0x00);
    pub const NODE: EntityBits = EntityBits(0x01);
    pub const WAY: EntityBits = EntityBits(0x02);
    pub const RELATION: EntityBits = EntityBits(0x04);
    pub const AREA: EntityBits = EntityBits(0x08);
    pub const CHANGESET: EntityBits = EntityBits(0x10);
    /// Nodes, ways, relations, and areas.
    pub const OBJECT: EntityBits = EntityBits(0x0f);
    pub const ALL: EntityBits = EntityBits(0x1f);

    pub fn contains(self, item_type: ItemType) -> bool {
        let bit = match item_type {
            ItemType::Node => 0x01,
            ItemType::Way => 0x02,
            ItemType::Relation => 0x04,
            ItemType::Area => 0x08,
            ItemType::Changeset => 0x10,
            _ => return false,
        };
        self.0 & bit != 0
    }
}

impl std::ops::BitOr for EntityBits {
    type Output = EntityBits;

    fn bitor(self, rhs: EntityBits) -> EntityBits {
        EntityBits(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_degree_roundtrip() {
        let loc = Location::from_degrees(13.377, 52.516);
        assert_eq!(loc.x(), 133_770_000);
        assert_eq!(loc.y(), 525_160_000);
        assert!((loc.lon() - 13.377).abs() < 1e-7);
        assert!((loc.lat() - 52.516).abs() < 1e-7);
        assert!(loc.is_valid());
    }

    #[test]
    fn test_location_undefined() {
        let loc = Location::undefined();
        assert!(!loc.is_defined());
        assert!(!loc.is_valid());
        assert_eq!(Location::default(), loc);
    }

    #[test]
    fn test_location_out_of_range_is_invalid() {
        let loc = Location::from_degrees(190.0, 0.0);
        assert!(loc.is_defined());
        assert!(!loc.is_valid());
    }

    #[test]
    fn test_bounding_box_extend() {
        let mut bounds = BoundingBox::undefined();
        assert!(!bounds.is_valid());

        bounds.extend(Location::from_degrees(10.0, 20.0));
        assert!(bounds.is_valid());
        assert_eq!(bounds.bottom_left(), bounds.top_right());

        bounds.extend(Location::from_degrees(-5.0, 25.0));
        assert_eq!(bounds.bottom_left(), Location::from_degrees(-5.0, 20.0));
        assert_eq!(bounds.top_right(), Location::from_degrees(10.0, 25.0));

        // Undefined locations must not shrink or reset the box
        bounds.extend(Location::undefined());
        assert_eq!(bounds.top_right(), Location::from_degrees(10.0, 25.0));
    }

    #[test]
    fn test_item_type_roundtrip() {
        for raw in [0x00u8, 0x01, 0x02, 0x03, 0x04, 0x05, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16] {
            let t = ItemType::try_from(raw).unwrap();
            assert_eq!(t as u8, raw);
        }
        assert!(ItemType::try_from(0x42).is_err());
    }

    #[test]
    fn test_item_type_classification() {
        assert!(ItemType::Node.is_entity());
        assert!(ItemType::Changeset.is_entity());
        assert!(!ItemType::TagList.is_entity());
        assert!(ItemType::Area.is_object());
        assert!(!ItemType::Changeset.is_object());
    }

    #[test]
    fn test_area_id_mapping_disjoint() {
        // The same source id as way and as relation must map to different
        // area ids.
        let from_way = object_id_to_area_id(1234, ItemType::Way);
        let from_relation = object_id_to_area_id(1234, ItemType::Relation);
        assert_ne!(from_way, from_relation);
    }

    #[test]
    fn test_area_id_mapping_invertible() {
        for id in [0i64, 1, 42, 1234, i32::MAX as i64, -1, -1234] {
            let (back, t) = area_id_to_object_id(object_id_to_area_id(id, ItemType::Way));
            assert_eq!((back, t), (id, ItemType::Way));

            let (back, t) = area_id_to_object_id(object_id_to_area_id(id, ItemType::Relation));
            assert_eq!((back, t), (id, ItemType::Relation));
        }
    }

    #[test]
    fn test_entity_bits() {
        let bits = EntityBits::NODE | EntityBits::WAY;
        assert!(bits.contains(ItemType::Node));
        assert!(bits.contains(ItemType::Way));
        assert!(!bits.contains(ItemType::Relation));
        assert!(!bits.contains(ItemType::TagList));

        assert!(EntityBits::ALL.contains(ItemType::Changeset));
        assert!(EntityBits::OBJECT.contains(ItemType::Area));
        assert!(!EntityBits::OBJECT.contains(ItemType::Changeset));
        assert!(!EntityBits::NOTHING.contains(ItemType::Node));
    }

    #[test]
    fn test_string_ceiling_asymmetry() {
        // The comment text ceiling is exactly one byte above the generic
        // string ceiling.
        assert_eq!(MAX_COMMENT_TEXT_LEN, MAX_STRING_LEN + 1);
    }
}
