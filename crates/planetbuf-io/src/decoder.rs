//! The decoding collaborator of the block index.
//!
//! The index knows where blocks are; a [`BlockDecoder`] knows what is inside
//! them. Decompression and body parsing are entirely the implementor's
//! concern; the index only hands over the raw payload bytes.

use planetbuf_core::{Arena, EntityBits};

use crate::error::Result;

/// Whether the decoder should fill in entity metadata (version, timestamp,
/// user) or skip it for speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMeta {
    Yes,
    No,
}

/// Decodes one blob payload into an arena of entities.
pub trait BlockDecoder: Send {
    /// Decode `data`, producing only the entity kinds selected by
    /// `entities`, in the order they appear in the block.
    fn decode(&self, data: Vec<u8>, entities: EntityBits, read_meta: ReadMeta) -> Result<Arena>;
}
