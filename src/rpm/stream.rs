use std::cmp;
use std::io::{self, Read, Seek, SeekFrom};

/// A read-only window onto a seekable reader. The window begins at a fixed offset of the inner
/// reader and optionally carries a length cap; reads never cross the cap and seeks are expressed
/// in window-relative coordinates. Without a cap, the window extends to the end of the inner
/// reader.
///
/// Both the compressed payload region of an RPM file and a single member's bytes within the
/// decompressed payload are exposed through this type.
#[derive(Debug)]
pub struct SubFile<R> {
    inner: R,
    start: u64,
    len: Option<u64>,
    pos: u64,
}

impl<R: Read + Seek> SubFile<R> {
    /// Open a window starting at `start` bytes into `inner`. The inner reader is positioned at
    /// the window start immediately.
    pub fn new(mut inner: R, start: u64, len: Option<u64>) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(start))?;
        Ok(Self { inner, start, len, pos: 0 })
    }

    /// The length cap of this window, if one was set.
    pub fn limit(&self) -> Option<u64> {
        self.len
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn set_abs(&mut self, abs: u64) -> io::Result<u64> {
        if abs < self.start {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before the start of the window",
            ));
        }
        let n = self.inner.seek(SeekFrom::Start(abs))?;
        self.pos = n - self.start;
        Ok(self.pos)
    }
}

impl<R: Read + Seek> Read for SubFile<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let max = match self.len {
            Some(len) => {
                if self.pos >= len {
                    return Ok(0);
                }
                cmp::min(buf.len() as u64, len - self.pos) as usize
            }
            None => buf.len(),
        };
        let n = self.inner.read(&mut buf[..max])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for SubFile<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(p) => self.set_abs(self.start + p),
            SeekFrom::Current(p) => {
                let target = (self.start + self.pos) as i64 + p;
                if target < 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "seek to a negative offset",
                    ));
                }
                self.set_abs(target as u64)
            }
            SeekFrom::End(p) => {
                let end = match self.len {
                    Some(len) => self.start + len,
                    None => self.inner.seek(SeekFrom::End(0))?,
                };
                let target = end as i64 + p;
                if target < 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "seek to a negative offset",
                    ));
                }
                self.set_abs(target as u64)
            }
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}

/// A seekable reader over a forward-only inner reader. Inner data is pulled on demand and
/// appended to an in-memory cache; seeks and re-reads are served from the cache. The payload
/// decompressors only implement `Read`, but the table decoder and member extraction both need
/// `Seek`, so the decompressed payload is always accessed through this type.
#[derive(Debug)]
pub struct CachingReader<R> {
    inner: R,
    cache: io::Cursor<Vec<u8>>,
}

impl<R: Read> CachingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: io::Cursor::new(Vec::new()),
        }
    }
}

impl<R: Read> Read for CachingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pos = self.cache.position();
        let wanted_end = pos + buf.len() as u64;
        let cached_end = self.cache.get_ref().len() as u64;

        // Pull anything missing from the inner reader onto the end of the cache. A short pull
        // means the inner reader is exhausted; the cursor read below then returns short too.
        if wanted_end > cached_end {
            self.cache.seek(SeekFrom::End(0))?;
            io::copy(
                &mut self.inner.by_ref().take(wanted_end - cached_end),
                &mut self.cache,
            )?;
            self.cache.set_position(pos);
        }

        self.cache.read(buf)
    }
}

impl<R> Seek for CachingReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cache.seek(pos)
    }
}
