//! Payload placement and codec selection.
//!
//! The outer RPM lead/header parser is not part of this crate. Whatever parses it reports two
//! facts through [`PayloadLayout`]: the absolute file offset where the compressed payload
//! begins, and the codec tag recorded in the header (`PAYLOADCOMPRESSOR`). Everything else in
//! this crate works from those two values.

/// The compression codec applied to the member archive, from the closed set of tags an RPM
/// header may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Uncompressed payload.
    None,
    Gzip,
    Xz,
    Zstd,
}

impl Codec {
    /// Map a header codec tag to a `Codec`. Returns `None` for tags outside the supported set.
    pub fn from_tag(tag: &str) -> Option<Codec> {
        match tag {
            "none" => Some(Codec::None),
            "gzip" => Some(Codec::Gzip),
            "xz" => Some(Codec::Xz),
            "zstd" => Some(Codec::Zstd),
            _ => None,
        }
    }

    /// Whether this build carries a decompressor for the codec. Selection of an unavailable
    /// codec is reported when the payload stream is first needed, not at archive construction.
    pub fn is_available(self) -> bool {
        match self {
            Codec::None => true,
            Codec::Gzip => cfg!(feature = "flate2"),
            Codec::Xz => cfg!(feature = "lzma-rs"),
            Codec::Zstd => cfg!(feature = "ruzstd"),
        }
    }
}

/// Where the compressed payload lives inside the RPM file, and how it is compressed. Produced
/// by the (external) header parser and consumed by
/// [`RpmArchive`](super::archive::RpmArchive).
#[derive(Debug, Clone)]
pub struct PayloadLayout {
    /// Absolute offset of the first compressed payload byte, i.e. the end of the header region.
    pub data_offset: u64,
    /// Codec tag as recorded in the header, e.g. `"gzip"`.
    pub codec: String,
}

impl PayloadLayout {
    pub fn new(data_offset: u64, codec: impl Into<String>) -> Self {
        Self {
            data_offset,
            codec: codec.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_tags() {
        assert_eq!(Codec::from_tag("gzip"), Some(Codec::Gzip));
        assert_eq!(Codec::from_tag("xz"), Some(Codec::Xz));
        assert_eq!(Codec::from_tag("zstd"), Some(Codec::Zstd));
        assert_eq!(Codec::from_tag("none"), Some(Codec::None));
        assert_eq!(Codec::from_tag("bzip2"), None);
        assert_eq!(Codec::from_tag(""), None);
    }

    #[test]
    fn test_none_always_available() {
        assert!(Codec::None.is_available());
    }
}
