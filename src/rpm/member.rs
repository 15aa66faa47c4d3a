//! Decoded member-table entries and the member handle returned to callers.

use std::io::{self, Read};
use std::str;

use super::error::{Error, Result};

/// Identity of the underlying file an entry refers to. Entries sharing an `InodeId` are
/// hardlinks to one file and get folded onto a single data-bearing target during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InodeId {
    pub dev_major: u32,
    pub dev_minor: u32,
    pub ino: u32,
}

/// The fixed header of one cpio "new ASCII" (`070701`) entry: thirteen 8-byte ASCII-hex
/// fields following the 6-byte magic. Every field is parsed fixed-width to keep the stream
/// position exact, whether or not it is consumed downstream.
#[derive(Debug)]
#[allow(dead_code)]
pub(crate) struct EntryHeader {
    pub ino: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime: u32,
    pub filesize: u32,
    pub dev_major: u32,
    pub dev_minor: u32,
    pub rdev_major: u32,
    pub rdev_minor: u32,
    pub namesize: u32,
    pub checksum: u32,
}

impl EntryHeader {
    /// Read the thirteen hex fields. `entry_offset` is the payload offset of the entry's
    /// magic, used only for error reporting.
    pub fn read<R: Read>(r: &mut R, entry_offset: u64) -> Result<EntryHeader> {
        Ok(EntryHeader {
            ino: read_hex8(r, entry_offset, "ino")?,
            mode: read_hex8(r, entry_offset, "mode")?,
            uid: read_hex8(r, entry_offset, "uid")?,
            gid: read_hex8(r, entry_offset, "gid")?,
            nlink: read_hex8(r, entry_offset, "nlink")?,
            mtime: read_hex8(r, entry_offset, "mtime")?,
            filesize: read_hex8(r, entry_offset, "filesize")?,
            dev_major: read_hex8(r, entry_offset, "devmajor")?,
            dev_minor: read_hex8(r, entry_offset, "devminor")?,
            rdev_major: read_hex8(r, entry_offset, "rdevmajor")?,
            rdev_minor: read_hex8(r, entry_offset, "rdevminor")?,
            namesize: read_hex8(r, entry_offset, "namesize")?,
            checksum: read_hex8(r, entry_offset, "checksum")?,
        })
    }

    pub fn inode_id(&self) -> InodeId {
        InodeId {
            dev_major: self.dev_major,
            dev_minor: self.dev_minor,
            ino: self.ino,
        }
    }
}

fn read_hex8<R: Read>(r: &mut R, entry_offset: u64, field: &'static str) -> Result<u32> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Truncated { offset: entry_offset }
        } else {
            e.into()
        }
    })?;
    str::from_utf8(&buf)
        .ok()
        .and_then(|s| u32::from_str_radix(s, 16).ok())
        .ok_or(Error::InvalidField { offset: entry_offset, field })
}

/// One decoded table entry. Created by the table decoder, then touched exactly once more by
/// the hardlink resolver, which may point `link_target` at the data-bearing entry of the same
/// inode group. Placement fields keep their decoded values for diagnostics; delegation to the
/// link target happens in [`Member`], not here.
#[derive(Debug)]
pub(crate) struct MemberRecord {
    pub name: String,
    /// Payload offset of this entry's magic.
    pub table_offset: u64,
    /// Payload offset where this entry's data begins.
    pub data_start: u64,
    pub size: u64,
    pub isdir: bool,
    pub ino: InodeId,
    pub is_elf: bool,
    pub mode: u32,
    pub mtime: u32,
    pub nlink: u32,
    /// Index of the data-bearing entry of this inode group within the member list, when this
    /// entry is a hardlink to it. Never self-referential.
    pub link_target: Option<usize>,
}

/// A member of the archive: a borrowed handle onto one record of the decoded member list.
/// Placement accessors ([`size`](Member::size), [`data_start`](Member::data_start),
/// [`is_elf`](Member::is_elf)) transparently follow the hardlink target when one is present.
#[derive(Debug, Clone, Copy)]
pub struct Member<'a> {
    records: &'a [MemberRecord],
    index: usize,
}

impl<'a> Member<'a> {
    pub(crate) fn new(records: &'a [MemberRecord], index: usize) -> Self {
        Self { records, index }
    }

    fn record(&self) -> &'a MemberRecord {
        &self.records[self.index]
    }

    fn target(&self) -> &'a MemberRecord {
        match self.record().link_target {
            Some(t) => &self.records[t],
            None => self.record(),
        }
    }

    /// The member's path as stored in the archive, e.g. `./usr/bin/tool`.
    pub fn name(&self) -> &'a str {
        &self.record().name
    }

    /// Size in bytes of the member's data (the link target's data for hardlinks).
    pub fn size(&self) -> u64 {
        self.target().size
    }

    /// Offset of the member's data within the decompressed payload stream.
    pub fn data_start(&self) -> u64 {
        self.target().data_start
    }

    /// Whether the member's data starts with the ELF magic.
    pub fn is_elf(&self) -> bool {
        self.target().is_elf
    }

    /// A directory entry. Entries that looked like directories but turned out to be hardlinks
    /// to a data-bearing member are not directories.
    pub fn is_dir(&self) -> bool {
        let r = self.record();
        r.isdir && r.link_target.is_none()
    }

    /// Whether this member defers its data to another member of the same inode group.
    pub fn is_hardlink(&self) -> bool {
        self.record().link_target.is_some()
    }

    pub fn inode(&self) -> InodeId {
        self.record().ino
    }

    /// Payload offset of the entry header this member was decoded from. Diagnostic; always the
    /// member's own offset, never the link target's.
    pub fn table_offset(&self) -> u64 {
        self.record().table_offset
    }

    /// Unix mode bits as recorded in the entry header.
    pub fn mode(&self) -> u32 {
        self.record().mode
    }

    /// Modification time as seconds since the epoch.
    pub fn mtime(&self) -> u32 {
        self.record().mtime
    }

    pub fn nlink(&self) -> u32 {
        self.record().nlink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(fields: [u32; 13]) -> Vec<u8> {
        let mut out = Vec::new();
        for f in fields {
            out.extend_from_slice(format!("{:08x}", f).as_bytes());
        }
        out
    }

    #[test]
    fn test_read_header() -> Result<()> {
        let mut fields = [0u32; 13];
        fields[0] = 0x2d; // ino
        fields[4] = 1; // nlink
        fields[6] = 0x1000; // filesize
        fields[7] = 8; // devmajor
        fields[8] = 17; // devminor
        fields[11] = 6; // namesize
        let bytes = header_bytes(fields);

        let hdr = EntryHeader::read(&mut &bytes[..], 0)?;
        assert_eq!(hdr.ino, 0x2d);
        assert_eq!(hdr.nlink, 1);
        assert_eq!(hdr.filesize, 0x1000);
        assert_eq!(hdr.namesize, 6);
        assert_eq!(
            hdr.inode_id(),
            InodeId { dev_major: 8, dev_minor: 17, ino: 0x2d }
        );
        Ok(())
    }

    #[test]
    fn test_rejects_non_hex_field() {
        let mut bytes = header_bytes([0u32; 13]);
        bytes[8..16].copy_from_slice(b"000zz000"); // corrupt the mode field
        match EntryHeader::read(&mut &bytes[..], 42) {
            Err(Error::InvalidField { offset: 42, field: "mode" }) => {}
            other => panic!("expected InvalidField for mode, got {:?}", other),
        }
    }

    #[test]
    fn test_short_header_is_truncation() {
        let bytes = header_bytes([0u32; 13]);
        match EntryHeader::read(&mut &bytes[..40], 0) {
            Err(Error::Truncated { .. }) => {}
            other => panic!("expected Truncated, got {:?}", other),
        }
    }
}
