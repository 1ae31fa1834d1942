//! Scanline streamer (spec §4.C): a single seek + single read/write per
//! call. Collapsing a block-copy to one syscall per scanline is the
//! core performance contract — the fastest-varying axis may be millions
//! of voxels long, and only the orthogonal iteration is slow.

use std::io::{Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::file_handle::FileHandle;

/// Linear byte offset of `start` within a Fortran-ordered grid of
/// `dims`, at `bytes_per_voxel` bytes per element. Generalises to any
/// dimensionality, though this crate only ever calls it with 3.
pub fn linear_offset(dims: &[i64], bytes_per_voxel: usize, start: &[i64]) -> u64 {
    let mut offset: i64 = 0;
    let mut multiple: i64 = bytes_per_voxel as i64;
    for (coord, len) in start.iter().zip(dims.iter()) {
        offset += coord * multiple;
        multiple *= len;
    }
    offset as u64
}

/// Streams scanlines of voxels in and out of a sub-volume's raw file.
pub struct ScanlineStreamer {
    dims: Vec<i64>,
    bytes_per_voxel: usize,
}

impl ScanlineStreamer {
    pub fn new(dims: Vec<i64>, bytes_per_voxel: usize) -> Self {
        Self { dims, bytes_per_voxel }
    }

    /// Read `num_voxels` voxels starting at local coordinate `start`, via
    /// a single seek and a single read.
    pub fn read(&self, handle: &mut FileHandle, start: &[i64], num_voxels: i64) -> Result<Vec<u8>> {
        let offset = linear_offset(&self.dims, self.bytes_per_voxel, start);
        let n_bytes = num_voxels as usize * self.bytes_per_voxel;
        let stream = handle.handle()?;
        stream.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; n_bytes];
        std::io::Read::read_exact(stream, &mut buf)?;
        Ok(buf)
    }

    /// Write `payload` starting at local coordinate `start`, via a
    /// single seek and a single write. Fails with `ShortWrite` if fewer
    /// bytes were accepted than requested.
    pub fn write(&self, handle: &mut FileHandle, start: &[i64], payload: &[u8]) -> Result<()> {
        let offset = linear_offset(&self.dims, self.bytes_per_voxel, start);
        let stream = handle.handle()?;
        stream.seek(SeekFrom::Start(offset))?;
        let written = std::io::Write::write(stream, payload)?;
        if written != payload.len() {
            return Err(Error::ShortWrite { expected: payload.len(), actual: written });
        }
        Ok(())
    }
}
