//! Scoped file handle acquisition (spec §4.B).
//!
//! Modeled as an explicit `{Unopened, Open, Closed}` state machine (spec
//! §9 design note) so a handle can never be silently reopened after
//! `close()`. The [`FileHandleFactory`] indirection is the test seam:
//! production code routes through [`OsFileHandleFactory`], tests through
//! an in-memory fake.

use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Whether a file is being opened for reading or writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
}

/// A seekable byte stream a [`FileHandle`] can wrap — either a real OS
/// file or an in-memory fake.
pub trait ReadWriteSeek: Read + Write + Seek {}
impl<T: Read + Write + Seek> ReadWriteSeek for T {}

/// Creates the underlying stream for a [`FileHandle`]. Implementations
/// MUST be pure — no hidden per-call state (spec §5) — so that the same
/// factory can be shared across independent jobs.
pub trait FileHandleFactory {
    fn create_file_handle(&self, path: &Path, mode: FileMode) -> io::Result<Box<dyn ReadWriteSeek>>;
}

/// The production factory: routes straight to `std::fs::File`.
pub struct OsFileHandleFactory;

impl FileHandleFactory for OsFileHandleFactory {
    fn create_file_handle(&self, path: &Path, mode: FileMode) -> io::Result<Box<dyn ReadWriteSeek>> {
        match mode {
            FileMode::Read => Ok(Box::new(File::open(path)?)),
            FileMode::Write => Ok(Box::new(File::create(path)?)),
        }
    }
}

enum State {
    Unopened,
    Open(Box<dyn ReadWriteSeek>),
    Closed,
}

/// A scoped file handle: opened lazily on first use, closed exactly
/// once, and never reopened after close.
pub struct FileHandle {
    factory: Arc<dyn FileHandleFactory>,
    path: PathBuf,
    mode: FileMode,
    state: State,
}

impl FileHandle {
    pub fn new(path: PathBuf, mode: FileMode, factory: Arc<dyn FileHandleFactory>) -> Self {
        Self { factory, path, mode, state: State::Unopened }
    }

    /// Open the underlying stream now. A no-op if already open. Errors
    /// if the handle has already been closed.
    pub fn open(&mut self) -> io::Result<()> {
        match self.state {
            State::Open(_) => Ok(()),
            State::Closed => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("cannot reopen a closed file handle: {}", self.path.display()),
            )),
            State::Unopened => {
                let stream = self.factory.create_file_handle(&self.path, self.mode)?;
                self.state = State::Open(stream);
                Ok(())
            }
        }
    }

    /// Return the underlying stream, auto-opening if not yet open.
    pub fn handle(&mut self) -> io::Result<&mut dyn ReadWriteSeek> {
        self.open()?;
        match &mut self.state {
            State::Open(stream) => Ok(stream.as_mut()),
            _ => unreachable!("open() guarantees State::Open or an Err return"),
        }
    }

    /// Idempotent close, safe to call on a never-opened handle.
    pub fn close(&mut self) {
        self.state = State::Closed;
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFileHandleFactory;

    #[test]
    fn close_is_idempotent_on_never_opened_handle() {
        let factory = Arc::new(FakeFileHandleFactory::default());
        let mut h = FileHandle::new(PathBuf::from("/x"), FileMode::Write, factory);
        h.close();
        h.close();
    }

    #[test]
    fn reopen_after_close_fails() {
        let factory: Arc<dyn FileHandleFactory> = Arc::new(FakeFileHandleFactory::default());
        let mut h = FileHandle::new(PathBuf::from("/x"), FileMode::Write, factory);
        h.open().unwrap();
        h.close();
        assert!(h.open().is_err());
    }

    #[test]
    fn handle_auto_opens() {
        let factory: Arc<dyn FileHandleFactory> = Arc::new(FakeFileHandleFactory::default());
        let mut h = FileHandle::new(PathBuf::from("/x"), FileMode::Write, factory);
        h.handle().unwrap().write_all(b"hi").unwrap();
    }
}
