//! Error types for RPM payload operations.
//!
//! Errors fall into four classes: malformed member tables ([`Error::BadMagic`],
//! [`Error::InvalidField`], [`Error::EmptyName`], [`Error::Truncated`]), archive integrity
//! violations ([`Error::ConflictingLinkTargets`]), per-call lookup failures
//! ([`Error::MemberNotFound`]), and decompressor availability
//! ([`Error::UnsupportedCodec`]). Offsets in table errors are relative to the start of the
//! decompressed payload stream.

use std::io;

use thiserror::Error;

use super::member::InodeId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A 6-byte entry magic started with `07` but was not the supported `070701` format.
    #[error("unsupported entry magic {found:?} at payload offset {offset}")]
    BadMagic { offset: u64, found: [u8; 6] },

    /// A fixed-width header field did not parse as 8 ASCII-hex digits.
    #[error("invalid {field} field in entry header at payload offset {offset}")]
    InvalidField { offset: u64, field: &'static str },

    /// An entry declared a zero-length name.
    #[error("entry at payload offset {offset} has an empty name")]
    EmptyName { offset: u64 },

    /// The payload ended inside an entry, or before the trailer entry was seen.
    #[error("member table ended unexpectedly at payload offset {offset}")]
    Truncated { offset: u64 },

    /// Two data-bearing members claim the same inode; there is no way to pick a link target.
    #[error("members {first:?} and {second:?} both carry data for inode {ino:?}")]
    ConflictingLinkTargets {
        ino: InodeId,
        first: String,
        second: String,
    },

    #[error("member {0:?} not found in archive")]
    MemberNotFound(String),

    /// The payload codec tag is unknown, or its decompressor is not compiled into this build.
    #[error("no decompressor available for payload codec {0:?}")]
    UnsupportedCodec(String),
}
