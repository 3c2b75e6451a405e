//! Error Types for the Entity Model
//!
//! Two kinds of failures exist on the building side:
//!
//! - **Length errors**: a free-text field (tag key/value, member role, user
//!   name, comment text) exceeds its fixed ceiling. These are checked before
//!   a single byte is written, so the arena is left exactly as it was and the
//!   caller can recover.
//! - **Contract violations**: call-order breaches such as `set_user()` after a
//!   sub-builder was opened, or a changeset comment without its text. These
//!   are programmer errors and fire `debug_assert!` instead of returning an
//!   error; they are never relied on for memory safety.
//!
//! All fallible functions return `Result<T>`, aliased to `Result<T, Error>`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{field} is too long ({len} > {max})")]
    LengthExceeded {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid item type: {0:#x}")]
    InvalidItemType(u8),

    #[error("invalid value for attribute '{name}': {value:?}")]
    InvalidAttribute { name: String, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
