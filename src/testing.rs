//! In-memory fakes shared by unit tests across modules (spec §8: "Tests
//! SHOULD use a fake FileHandleFactory backed by in-memory buffers to
//! exercise §4.C and §4.D without touching disk").

#![cfg(test)]

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::file_handle::{FileHandleFactory, FileMode, ReadWriteSeek};

/// A factory whose files live in a shared in-memory map, so a file
/// written by one `FileHandle` is visible to a later reader opened
/// against the same factory — mirroring how the real OS filesystem
/// lets a writer and a reader of the same path observe each other.
#[derive(Default, Clone)]
pub struct FakeFileHandleFactory {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
}

impl FileHandleFactory for FakeFileHandleFactory {
    fn create_file_handle(&self, path: &Path, mode: FileMode) -> io::Result<Box<dyn ReadWriteSeek>> {
        if mode == FileMode::Write {
            self.files.lock().unwrap().insert(path.to_path_buf(), Vec::new());
        } else if !self.files.lock().unwrap().contains_key(path) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such fake file"));
        }
        Ok(Box::new(FakeStream {
            files: self.files.clone(),
            path: path.to_path_buf(),
            pos: 0,
        }))
    }
}

/// A seekable stream backed directly by a shared `files` map entry —
/// every read/write touches the map in place so readers and writers
/// sharing a factory see each other's bytes immediately.
struct FakeStream {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    path: PathBuf,
    pos: usize,
}

impl Read for FakeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let files = self.files.lock().unwrap();
        let data = files.get(&self.path).map(|v| v.as_slice()).unwrap_or(&[]);
        if self.pos >= data.len() {
            return Ok(0);
        }
        let n = (data.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for FakeStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut files = self.files.lock().unwrap();
        let data = files.entry(self.path.clone()).or_default();
        let end = self.pos + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FakeStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.files.lock().unwrap().get(&self.path).map(|v| v.len()).unwrap_or(0) as i64;
        let new_pos = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(n) => len + n,
            SeekFrom::Current(n) => self.pos as i64 + n,
        };
        if new_pos < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "negative seek"));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }
}
