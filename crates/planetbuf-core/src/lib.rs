//! Core entity model: a growable arena of padded, self-describing items,
//! stack-disciplined builders that write entities into it, and zero-copy
//! typed views that read them back.
//!
//! ```
//! use planetbuf_core::{Arena, Location, NodeBuilder};
//!
//! let mut arena = Arena::new();
//! let mut node = NodeBuilder::new(&mut arena);
//! node.set_id(17).set_location(Location::from_degrees(13.4, 52.5));
//! node.tags().add_tag("amenity", "fountain")?;
//! node.finish();
//!
//! let object = arena.objects().next().unwrap();
//! assert_eq!(object.id(), 17);
//! # Ok::<(), planetbuf_core::Error>(())
//! ```

mod arena;
mod builder;
mod entity;
mod error;
mod types;

pub use arena::{padded, Arena, ALIGNMENT};
pub use builder::{
    AreaBuilder, ChangesetBuilder, ChangesetDiscussionBuilder, InnerRingBuilder, ItemBuilder,
    NodeBuilder, NodeRefListBuilder, OuterRingBuilder, RelationBuilder,
    RelationMemberListBuilder, TagListBuilder, WayBuilder, WayNodeListBuilder,
};
pub use entity::{
    ChangesetComment, ChangesetRef, CommentIter, ItemIter, ItemRef, MemberIter, NodeRefIter,
    ObjectRef, RelationMember, Ring, TagIter,
};
pub use error::{Error, Result};
pub use types::{
    area_id_to_object_id, object_id_to_area_id, BoundingBox, ChangesetId, EntityBits, ItemType,
    Location, NodeRef, ObjectId, Timestamp, UserId, MAX_COMMENT_TEXT_LEN, MAX_STRING_LEN,
    UNDEFINED_COORDINATE,
};
