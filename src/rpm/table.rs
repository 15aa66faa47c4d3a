//! Member-table decoding and hardlink resolution.
//!
//! The decompressed payload is a cpio "new ASCII" stream: a sequence of entries, each a 6-byte
//! `070701` magic, a fixed ASCII-hex header, a NUL-terminated name padded to 4-byte alignment,
//! and the file data padded the same way. Enumeration stops at the reserved `TRAILER!!!` entry.
//! Decoding scans forward two bytes at a time for the magic prefix, so stray bytes between
//! entries are skipped rather than fatal; a `07…` magic other than `070701` is fatal.

use std::collections::HashMap;
use std::io::{self, Read, Seek};

use log::{debug, trace};

use super::error::{Error, Result};
use super::member::{EntryHeader, MemberRecord};

const ENTRY_MAGIC: &[u8; 6] = b"070701";
const MAGIC_PREFIX: &[u8; 2] = b"07";

/// Reserved name of the end-of-table entry.
const TRAILER_NAME: &str = "TRAILER!!!";

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Decode the member table from a payload stream positioned at its start, then resolve
/// hardlinks. Fails atomically: any malformed entry or integrity violation discards all
/// decoded records.
pub(crate) fn read_members<R: Read + Seek>(r: &mut R) -> Result<Vec<MemberRecord>> {
    let mut records = Vec::new();
    loop {
        let mut prefix = [0u8; 2];
        if read_full(r, &mut prefix)? < 2 {
            // The stream may not end before the trailer entry.
            return Err(Error::Truncated {
                offset: r.stream_position()?,
            });
        }
        if &prefix != MAGIC_PREFIX {
            trace!("skipping 2 unexpected bytes while scanning for entry magic");
            continue;
        }

        let mut rest = [0u8; 4];
        let offset = r.stream_position()? - 2;
        r.read_exact(&mut rest)
            .map_err(|e| eof_as_truncation(e, offset))?;
        if rest[..] != ENTRY_MAGIC[2..] {
            let mut found = [0u8; 6];
            found[..2].copy_from_slice(&prefix);
            found[2..].copy_from_slice(&rest);
            return Err(Error::BadMagic { offset, found });
        }

        let record = read_entry(r, offset)?;
        if record.name == TRAILER_NAME {
            break;
        }
        records.push(record);
    }
    debug!("decoded {} member table entries", records.len());

    resolve_links(&mut records)?;
    Ok(records)
}

/// Decode one entry whose magic has already been consumed. `entry_offset` is the payload
/// offset of the magic.
fn read_entry<R: Read + Seek>(r: &mut R, entry_offset: u64) -> Result<MemberRecord> {
    let header = EntryHeader::read(r, entry_offset)?;

    let mut name_buf = vec![0u8; header.namesize as usize];
    r.read_exact(&mut name_buf)
        .map_err(|e| eof_as_truncation(e, entry_offset))?;
    if name_buf.last() == Some(&0) {
        name_buf.pop();
    }
    let name = String::from_utf8(name_buf).map_err(|_| Error::InvalidField {
        offset: entry_offset,
        field: "name",
    })?;
    if name.is_empty() {
        return Err(Error::EmptyName { offset: entry_offset });
    }

    // The trailer consumes nothing beyond its header and name.
    if name == TRAILER_NAME {
        return Ok(trailer_record(name, entry_offset, header));
    }

    skip_alignment(r, entry_offset)?;
    let data_start = r.stream_position()?;
    let size = u64::from(header.filesize);

    // Sniff the native-executable signature off the first 4 data bytes, then consume the rest
    // of the data by reading, so a declared size that overruns the stream is caught here
    // rather than truncating silently.
    let mut is_elf = false;
    if size >= 4 {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)
            .map_err(|e| eof_as_truncation(e, entry_offset))?;
        is_elf = magic == ELF_MAGIC;
        skip_exact(r, size - 4, entry_offset)?;
    } else {
        skip_exact(r, size, entry_offset)?;
    }
    skip_alignment(r, entry_offset)?;

    let isdir = header.nlink == 2 && size == 0;
    Ok(MemberRecord {
        name,
        table_offset: entry_offset,
        data_start,
        size,
        isdir,
        ino: header.inode_id(),
        is_elf,
        mode: header.mode,
        mtime: header.mtime,
        nlink: header.nlink,
        link_target: None,
    })
}

fn trailer_record(name: String, entry_offset: u64, header: EntryHeader) -> MemberRecord {
    MemberRecord {
        name,
        table_offset: entry_offset,
        data_start: 0,
        size: 0,
        isdir: false,
        ino: header.inode_id(),
        is_elf: false,
        mode: header.mode,
        mtime: header.mtime,
        nlink: header.nlink,
        link_target: None,
    }
}

/// For each inode group, find the single data-bearing entry and point every other entry of the
/// group at it. A group with no data-bearing entry (directories, dangling zero-size entries)
/// is left untouched; a group with more than one is an unrecoverable integrity violation.
fn resolve_links(records: &mut [MemberRecord]) -> Result<()> {
    let mut groups: HashMap<_, Vec<usize>> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        groups.entry(record.ino).or_default().push(i);
    }

    // Walk groups in first-appearance order so a malformed archive reports deterministically.
    for i in 0..records.len() {
        let Some(group) = groups.remove(&records[i].ino) else {
            continue;
        };
        let mut target: Option<usize> = None;
        for &j in &group {
            if records[j].size > 0 && !records[j].isdir {
                if let Some(first) = target {
                    return Err(Error::ConflictingLinkTargets {
                        ino: records[j].ino,
                        first: records[first].name.clone(),
                        second: records[j].name.clone(),
                    });
                }
                target = Some(j);
            }
        }
        let Some(target) = target else { continue };
        for &j in &group {
            if j != target {
                trace!(
                    "member {:?} resolves to hardlink target {:?}",
                    records[j].name,
                    records[target].name
                );
                records[j].link_target = Some(target);
            }
        }
    }
    Ok(())
}

/// Read to the next 4-byte alignment boundary of the payload stream.
fn skip_alignment<R: Read + Seek>(r: &mut R, entry_offset: u64) -> Result<()> {
    let pos = r.stream_position()?;
    skip_exact(r, (4 - pos % 4) % 4, entry_offset)
}

fn skip_exact<R: Read>(r: &mut R, n: u64, entry_offset: u64) -> Result<()> {
    let copied = io::copy(&mut r.by_ref().take(n), &mut io::sink())?;
    if copied < n {
        return Err(Error::Truncated { offset: entry_offset });
    }
    Ok(())
}

/// Fill `buf` unless the stream ends first; returns the number of bytes read.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn eof_as_truncation(e: io::Error, offset: u64) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated { offset }
    } else {
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // Appends one well-formed 070701 entry to `image`, tracking stream-absolute alignment.
    fn push_entry(image: &mut Vec<u8>, name: &str, ino: u32, nlink: u32, data: &[u8]) {
        let mut fields = [0u32; 13];
        fields[0] = ino;
        fields[4] = nlink;
        fields[6] = data.len() as u32;
        fields[11] = name.len() as u32 + 1;
        image.extend_from_slice(b"070701");
        for f in fields {
            image.extend_from_slice(format!("{:08x}", f).as_bytes());
        }
        image.extend_from_slice(name.as_bytes());
        image.push(0);
        while image.len() % 4 != 0 {
            image.push(0);
        }
        image.extend_from_slice(data);
        while image.len() % 4 != 0 {
            image.push(0);
        }
    }

    fn push_trailer(image: &mut Vec<u8>) {
        push_entry(image, "TRAILER!!!", 0, 1, b"");
    }

    #[test]
    fn test_decode_placement() -> Result<()> {
        let mut image = Vec::new();
        push_entry(&mut image, "a.txt", 10, 1, b"abcd");
        let second_offset = image.len() as u64;
        push_entry(&mut image, "b.txt", 11, 1, b"hello world");
        push_trailer(&mut image);

        let records = read_members(&mut Cursor::new(image.clone()))?;
        assert_eq!(records.len(), 2);

        // header is 6 magic + 104 hex bytes; "a.txt" plus NUL lands the data at 116, already
        // 4-aligned
        assert_eq!(records[0].table_offset, 0);
        assert_eq!(records[0].data_start, 116);
        assert_eq!(records[0].size, 4);
        assert_eq!(&image[116..120], b"abcd");

        assert_eq!(records[1].table_offset, second_offset);
        assert_eq!(records[1].size, 11);
        let ds = records[1].data_start as usize;
        assert_eq!(&image[ds..ds + 11], b"hello world");
        Ok(())
    }

    #[test]
    fn test_resync_scan_tolerates_junk() -> Result<()> {
        let mut image = Vec::new();
        image.extend_from_slice(&[0u8; 6]); // leading junk, even length
        push_entry(&mut image, "a.txt", 10, 1, b"abcd");
        // entries end 4-aligned, so even-length junk keeps the scan in phase
        image.extend_from_slice(b"\x00\x00");
        push_trailer(&mut image);

        let records = read_members(&mut Cursor::new(image))?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "a.txt");
        Ok(())
    }

    #[test]
    fn test_foreign_magic_is_fatal() {
        let mut image = Vec::new();
        image.extend_from_slice(b"070707"); // old ASCII format
        image.extend_from_slice(&[b'0'; 104]);
        match read_members(&mut Cursor::new(image)) {
            Err(Error::BadMagic { offset: 0, found }) => assert_eq!(&found, b"070707"),
            other => panic!("expected BadMagic, got {:?}", other),
        }
    }

    #[test]
    fn test_eof_before_trailer() {
        let mut image = Vec::new();
        push_entry(&mut image, "a.txt", 10, 1, b"abcd");
        match read_members(&mut Cursor::new(image)) {
            Err(Error::Truncated { .. }) => {}
            other => panic!("expected Truncated, got {:?}", other),
        }
    }

    #[test]
    fn test_declared_size_past_end() {
        let mut image = Vec::new();
        push_entry(&mut image, "a.txt", 10, 1, b"abcd");
        // Claim more data than the stream holds
        let size_field = 6 + 6 * 8;
        image[size_field..size_field + 8].copy_from_slice(b"00001000");
        match read_members(&mut Cursor::new(image)) {
            Err(Error::Truncated { offset: 0 }) => {}
            other => panic!("expected Truncated at entry 0, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_name_is_fatal() {
        let mut image = Vec::new();
        image.extend_from_slice(b"070701");
        let mut fields = [0u32; 13];
        fields[11] = 1; // namesize covers only the terminator
        for f in fields {
            image.extend_from_slice(format!("{:08x}", f).as_bytes());
        }
        image.push(0);
        match read_members(&mut Cursor::new(image)) {
            Err(Error::EmptyName { offset: 0 }) => {}
            other => panic!("expected EmptyName, got {:?}", other),
        }
    }

    #[test]
    fn test_elf_detection() -> Result<()> {
        let mut image = Vec::new();
        push_entry(&mut image, "bin/tool", 20, 1, b"\x7fELF\x02\x01\x01\x00");
        push_entry(&mut image, "doc/readme", 21, 1, b"plain text here");
        push_trailer(&mut image);

        let records = read_members(&mut Cursor::new(image))?;
        assert!(records[0].is_elf);
        assert!(!records[1].is_elf);
        Ok(())
    }

    #[test]
    fn test_hardlink_resolution() -> Result<()> {
        let mut image = Vec::new();
        push_entry(&mut image, "real.bin", 30, 2, b"ten bytes!");
        push_entry(&mut image, "alias.bin", 30, 2, b"");
        push_trailer(&mut image);

        let records = read_members(&mut Cursor::new(image))?;
        assert_eq!(records[0].link_target, None);
        assert_eq!(records[1].link_target, Some(0));
        Ok(())
    }

    #[test]
    fn test_conflicting_targets() {
        let mut image = Vec::new();
        push_entry(&mut image, "one.bin", 30, 2, b"data a");
        push_entry(&mut image, "two.bin", 30, 2, b"data b");
        push_trailer(&mut image);

        match read_members(&mut Cursor::new(image)) {
            Err(Error::ConflictingLinkTargets { first, second, .. }) => {
                assert_eq!(first, "one.bin");
                assert_eq!(second, "two.bin");
            }
            other => panic!("expected ConflictingLinkTargets, got {:?}", other),
        }
    }

    #[test]
    fn test_directory_heuristic() -> Result<()> {
        let mut image = Vec::new();
        push_entry(&mut image, "usr", 40, 2, b"");
        push_entry(&mut image, "usr/bin/tool", 41, 1, b"#!/bin/sh\n");
        push_trailer(&mut image);

        let records = read_members(&mut Cursor::new(image))?;
        assert!(records[0].isdir);
        assert!(records[0].link_target.is_none());
        assert!(!records[1].isdir);
        Ok(())
    }
}
