//! Error types for the block-framed file layer.
//!
//! Truncation, type mismatches, and size violations are all `Format` errors
//! with a human-readable reason; an unexpected end of file during an
//! expected read counts as truncation, not as an i/o error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file format error: {0}")]
    Format(String),

    #[error("block index {0} out of range")]
    BlockIndexOutOfRange(usize),

    #[error(transparent)]
    Entity(#[from] planetbuf_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
