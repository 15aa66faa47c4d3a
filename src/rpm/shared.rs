//! Position-tracked sharing of one seekable reader.
//!
//! The decompressed payload is a single stream, but it has several logical consumers: the table
//! decoder, and one reader per extracted member. Each consumer holds a [`StreamHandle`] that
//! remembers its own position; whenever a handle that was not the last user touches the stream,
//! it first re-seeks the shared inner reader to where it left off. Sharing is `Rc`-based and
//! strictly single-threaded.

use std::cell::{RefCell, RefMut};
use std::io::{self, Read, Seek, SeekFrom};
use std::rc::Rc;

#[derive(Debug)]
pub(crate) struct SharedStream<R> {
    state: Rc<RefCell<StreamState<R>>>,
    next_id: usize,
}

#[derive(Debug)]
struct StreamState<R> {
    inner: R,
    // id of the handle whose position the inner reader currently reflects
    owner: usize,
}

impl<R: Read + Seek> SharedStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            state: Rc::new(RefCell::new(StreamState { inner, owner: 0 })),
            next_id: 1,
        }
    }

    pub fn handle(&mut self) -> StreamHandle<R> {
        let id = self.next_id;
        self.next_id += 1;
        StreamHandle {
            state: self.state.clone(),
            id,
            pos: 0,
        }
    }
}

/// One consumer's view of a shared seekable reader. See the module docs for the sharing rules.
#[derive(Debug)]
pub struct StreamHandle<R> {
    state: Rc<RefCell<StreamState<R>>>,
    id: usize,
    pos: u64,
}

impl<R: Seek> StreamHandle<R> {
    fn claim(&self, state: &mut RefMut<StreamState<R>>) -> io::Result<()> {
        if state.owner != self.id {
            state.owner = self.id;
            state.inner.seek(SeekFrom::Start(self.pos))?;
        }
        Ok(())
    }
}

impl<R: Read + Seek> Read for StreamHandle<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        self.claim(&mut state)?;
        let n = state.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Seek> Seek for StreamHandle<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let mut state = self.state.borrow_mut();
        self.claim(&mut state)?;
        let n = state.inner.seek(pos)?;
        self.pos = n;
        Ok(n)
    }
}
