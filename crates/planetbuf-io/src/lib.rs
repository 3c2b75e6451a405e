//! Random access to blob-framed entity files.
//!
//! A one-pass scan over the blob headers yields a [`BlockIndexTable`]; blocks
//! are then read and decoded on demand through a caller-supplied
//! [`BlockDecoder`]. See the [`index`](crate::index) module docs for the
//! framing and memoization details.

mod blob;
mod decoder;
mod error;
pub mod index;

pub use blob::{
    BlobHeader, DATA_BLOCK_TYPE, FILE_HEADER_TYPE, MAX_BLOB_HEADER_SIZE, MAX_BLOCK_SIZE,
};
pub use decoder::{BlockDecoder, ReadMeta};
pub use error::{Error, Result};
pub use index::{BlockIndexTable, BlockStart};
