use std::cell::{OnceCell, RefCell};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use super::compressed::CodecReader;
use super::error::{Error, Result};
use super::member::{Member, MemberRecord};
use super::payload::{Codec, PayloadLayout};
use super::shared::{SharedStream, StreamHandle};
use super::stream::{CachingReader, SubFile};
use super::table;

/// The decompressed payload stream: the compressed region of the RPM file, windowed and fed
/// through the payload codec, cached so it can be seeked.
pub type PayloadReader<R> = CachingReader<CodecReader<SubFile<R>>>;

/// A reader over one member's bytes, as returned by [`RpmArchive::open_member`].
pub type MemberReader<R> = SubFile<StreamHandle<PayloadReader<R>>>;

/// The top-level interface to the member archive of an RPM package. An `RpmArchive` can list
/// the archive's members, look them up by name, and open readers over their contents.
///
/// The payload stream and the member list are both built on first use and cached for the life
/// of the archive. All access is single-threaded; readers handed out by
/// [`open_member`](Self::open_member) coordinate their positions internally, so several may be
/// alive at once.
pub struct RpmArchive<R: Read + Seek> {
    source: RefCell<Option<R>>,
    layout: PayloadLayout,
    payload: OnceCell<RefCell<SharedStream<PayloadReader<R>>>>,
    members: OnceCell<Vec<MemberRecord>>,
}

impl RpmArchive<BufReader<File>> {
    /// Open the file at `path` as an RPM archive, using a BufReader. `layout` comes from the
    /// caller's header parser.
    pub fn open<P>(path: P, layout: PayloadLayout) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        Ok(Self::new(BufReader::new(File::open(path)?), layout))
    }
}

impl<R: Read + Seek> RpmArchive<R> {
    /// Create a new RpmArchive over the provided reader. No I/O happens until members or the
    /// payload are first requested.
    pub fn new(reader: R, layout: PayloadLayout) -> Self {
        Self {
            source: RefCell::new(Some(reader)),
            layout,
            payload: OnceCell::new(),
            members: OnceCell::new(),
        }
    }

    /// The payload placement this archive was constructed with.
    pub fn layout(&self) -> &PayloadLayout {
        &self.layout
    }

    /// Retrieve an iterator over the members of the archive, in archive order. Directory
    /// entries are never included. The table is decoded and hardlinks resolved on the first
    /// call; a malformed table surfaces here and leaves nothing cached.
    pub fn members(&self) -> Result<Members<'_>> {
        let records = self.records()?;
        Ok(Members { records, next: 0 })
    }

    /// Look up a member by name. When a name occurs more than once, the last occurrence in
    /// archive order is returned, that being the version that superseded the others.
    pub fn member(&self, name: &str) -> Result<Member<'_>> {
        let records = self.records()?;
        for index in (0..records.len()).rev() {
            let member = Member::new(records, index);
            if !member.is_dir() && member.name() == name {
                return Ok(member);
            }
        }
        Err(Error::MemberNotFound(name.to_string()))
    }

    /// Open a reader over a member's data. Hardlinks read their target's data. The returned
    /// reader stays valid alongside others; positions are coordinated through the shared
    /// payload stream.
    pub fn open_member(&self, member: &Member<'_>) -> Result<MemberReader<R>> {
        let payload = self.payload()?;
        let handle = payload.borrow_mut().handle();
        Ok(SubFile::new(handle, member.data_start(), Some(member.size()))?)
    }

    /// Look up a member by name and open a reader over its data.
    pub fn open_file(&self, name: &str) -> Result<MemberReader<R>> {
        let member = self.member(name)?;
        self.open_member(&member)
    }

    /// All members whose data carries the ELF executable signature, hardlinks included.
    pub fn executables(&self) -> Result<Vec<Member<'_>>> {
        Ok(self.members()?.filter(|m| m.is_elf()).collect())
    }

    fn records(&self) -> Result<&[MemberRecord]> {
        if let Some(records) = self.members.get() {
            return Ok(records);
        }
        let payload = self.payload()?;
        let mut reader = payload.borrow_mut().handle();
        reader.seek(SeekFrom::Start(0))?;
        let records = table::read_members(&mut reader)?;
        let _ = self.members.set(records);
        Ok(self.members.get().expect("member cache just populated"))
    }

    fn payload(&self) -> Result<&RefCell<SharedStream<PayloadReader<R>>>> {
        if let Some(payload) = self.payload.get() {
            return Ok(payload);
        }

        // Resolve the codec tag before touching the source reader, so an unsupported tag
        // leaves the archive untouched.
        let codec = Codec::from_tag(&self.layout.codec)
            .filter(|c| c.is_available())
            .ok_or_else(|| Error::UnsupportedCodec(self.layout.codec.clone()))?;
        debug!(
            "opening payload at offset {} with codec {:?}",
            self.layout.data_offset, codec
        );

        let Some(mut source) = self.source.borrow_mut().take() else {
            // A previous construction attempt failed partway through decoding and consumed
            // the reader.
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "payload stream unavailable after an earlier construction failure",
            )));
        };

        // Position the source by hand before handing it over; a seek failure here keeps the
        // reader, so the call can be retried.
        if let Err(e) = source.seek(SeekFrom::Start(self.layout.data_offset)) {
            *self.source.borrow_mut() = Some(source);
            return Err(e.into());
        }

        let window = SubFile::new(source, self.layout.data_offset, None)?;
        let decoded = CachingReader::new(CodecReader::new(window, codec)?);
        let _ = self.payload.set(RefCell::new(SharedStream::new(decoded)));
        Ok(self.payload.get().expect("payload cache just populated"))
    }
}

/// An iterator over the non-directory members of an archive, in archive order.
#[derive(Debug)]
pub struct Members<'a> {
    records: &'a [MemberRecord],
    next: usize,
}

impl<'a> Iterator for Members<'a> {
    type Item = Member<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.records.len() {
            let member = Member::new(self.records, self.next);
            self.next += 1;
            if !member.is_dir() {
                return Some(member);
            }
        }
        None
    }
}
