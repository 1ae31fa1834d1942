//! Combined view (spec §4.E): many [`SubImage`] blocks addressed as one
//! contiguous logical volume.
//!
//! A scanline of the whole image can cross a block boundary on axis 0,
//! so both `read_scanline` and `write_scanline` loop, pulling or
//! pushing one block's worth at a time. Which block currently owns the
//! cursor rarely changes between consecutive calls, so the last match
//! is cached as a plain index rather than re-scanned from the front
//! each time.

use crate::error::{Error, Result};
use crate::sub_image::SubImage;

pub struct CombinedView {
    blocks: Vec<SubImage>,
    last_used: usize,
}

impl CombinedView {
    /// Blocks are sorted by their descriptor `index` (spec §4.E), not by
    /// filename or origin coordinates — order in a `.gift` file's
    /// `split_files` is arbitrary, and `index` is what's authoritative.
    pub fn new(mut blocks: Vec<SubImage>) -> Self {
        blocks.sort_by_key(|b| b.index());
        Self { blocks, last_used: 0 }
    }

    fn find_block(&mut self, v_global: &[i64; 3], strict: bool) -> Result<usize> {
        if let Some(b) = self.blocks.get(self.last_used) {
            if b.contains_voxel(v_global, strict) {
                return Ok(self.last_used);
            }
        }
        for (i, b) in self.blocks.iter().enumerate() {
            if b.contains_voxel(v_global, strict) {
                self.last_used = i;
                return Ok(i);
            }
        }
        Err(Error::OutOfRange { coord: v_global.to_vec() })
    }

    pub fn bytes_per_voxel(&mut self) -> Result<usize> {
        self.blocks[0].bytes_per_voxel()
    }

    /// Total image size, derived from the outermost block edges (every
    /// axis has a block touching each boundary, with zero guard band
    /// there — spec §8 invariant 3).
    pub fn image_dims(&self) -> [i64; 3] {
        let mut dims = [0i64; 3];
        for block in &self.blocks {
            let r = block.get_ranges();
            for axis in 0..3 {
                dims[axis] = dims[axis].max(r[axis].origin_end + 1);
            }
        }
        dims
    }

    /// Read `num_voxels` voxels starting at `start`, sourcing each from
    /// whichever block's ROI owns it. Every voxel in the combined image
    /// belongs to exactly one block's ROI, so this never double-reads
    /// overlap data.
    pub fn read_scanline(&mut self, start: [i64; 3], num_voxels: i64) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut cursor = start;
        let mut remaining = num_voxels;
        while remaining > 0 {
            let idx = self.find_block(&cursor, true)?;
            let roi_end = self.blocks[idx].get_ranges()[0].roi_end();
            let available = (roi_end - cursor[0] + 1).max(1);
            let chunk = remaining.min(available);
            let bpv = self.blocks[idx].bytes_per_voxel()?;
            let bytes = self.blocks[idx].read(&cursor, chunk)?;
            let voxels_read = (bytes.len() / bpv) as i64;
            if voxels_read == 0 {
                return Err(Error::OutOfRange { coord: cursor.to_vec() });
            }
            out.extend_from_slice(&bytes);
            cursor[0] += voxels_read;
            remaining -= voxels_read;
        }
        Ok(out)
    }

    /// Write `payload` starting at `start`, splitting across blocks at
    /// each block's own axis-0 boundary as needed.
    ///
    /// This assumes `self`'s blocks form a non-overlapping partition of
    /// the coordinate space (true for the combiner's single synthetic
    /// output block, and for a zero-overlap series) — it finds the
    /// *first* block whose origin region claims a coordinate and writes
    /// the whole chunk there. It must never be used to write into a set
    /// of blocks with `pad_start`/`pad_end` > 0, since a guard-band
    /// voxel belongs to more than one block's origin region and this
    /// method would only ever write it into one of them. The splitter
    /// writes each overlapping block's full origin region directly
    /// through `SubImage::write` instead (see `Splitter::split`).
    pub fn write_scanline(&mut self, start: [i64; 3], payload: &[u8]) -> Result<()> {
        let idx = self.find_block(&start, false)?;
        let bpv = self.blocks[idx].bytes_per_voxel()?;
        let total_voxels = (payload.len() / bpv) as i64;

        let mut cursor = start;
        let mut offset = 0usize;
        let mut remaining = total_voxels;
        while remaining > 0 {
            let idx = self.find_block(&cursor, false)?;
            let origin_end = self.blocks[idx].get_ranges()[0].origin_end;
            let available = (origin_end - cursor[0] + 1).max(1);
            let chunk = remaining.min(available);
            let n_bytes = chunk as usize * bpv;
            self.blocks[idx].write(&cursor, &payload[offset..offset + n_bytes])?;
            cursor[0] += chunk;
            offset += n_bytes;
            remaining -= chunk;
        }
        Ok(())
    }

    /// Drive a full-volume copy: every scanline of `source` is read and
    /// written into `self` in turn. Used by the combiner to assemble
    /// its single output image from a reader view over many blocks.
    pub fn copy_from(&mut self, source: &mut CombinedView) -> Result<()> {
        let dims = source.image_dims();
        for k in 0..dims[2] {
            for j in 0..dims[1] {
                let mut i = 0i64;
                while i < dims[0] {
                    let start = [i, j, k];
                    let bytes = source.read_scanline(start, dims[0] - i)?;
                    let bpv = source.bytes_per_voxel()?;
                    let voxels = (bytes.len() / bpv) as i64;
                    self.write_scanline(start, &bytes)?;
                    i += voxels;
                }
            }
        }
        Ok(())
    }

    pub fn close(&mut self) {
        for block in &mut self.blocks {
            block.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_handle::FileHandleFactory;
    use crate::header::{Header, Value};
    use crate::planner::{image_block_ranges, AxisRange};
    use crate::sub_image::Mode;
    use crate::testing::FakeFileHandleFactory;
    use std::sync::Arc;

    fn template() -> Header {
        let mut h = Header::new();
        h.set("ObjectType", Value::Str("Image".into()));
        h.set("NDims", Value::Int(3));
        h.set("BinaryData", Value::Bool(true));
        h.set("ElementType", Value::Str("MET_INT".into()));
        h
    }

    #[test]
    fn read_scanline_stitches_across_block_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("block").to_string_lossy().into_owned();
        let factory: Arc<dyn FileHandleFactory> = Arc::new(FakeFileHandleFactory::default());

        let ranges = image_block_ranges(&[8, 1, 1], &[5, 1, 1], &[0, 0, 0]);
        assert_eq!(ranges.len(), 2);

        let mut blocks = Vec::new();
        for (idx, r) in ranges.iter().enumerate() {
            let mut sub =
                SubImage::new(&base, &format!("_{idx}"), idx as u32, *r, factory.clone(), Mode::Write(template())).unwrap();
            for v in r[0].origin_start..=r[0].origin_end {
                sub.write(&[v, 0, 0], &(v as i32).to_le_bytes()).unwrap();
            }
            sub.close();
            blocks.push(SubImage::new(&base, &format!("_{idx}"), idx as u32, *r, factory.clone(), Mode::Read).unwrap());
        }

        let mut view = CombinedView::new(blocks);
        let bytes = view.read_scanline([0, 0, 0], 8).unwrap();
        let values: Vec<i32> = bytes.chunks(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn image_dims_matches_source_extent() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("block").to_string_lossy().into_owned();
        let factory: Arc<dyn FileHandleFactory> = Arc::new(FakeFileHandleFactory::default());
        let ranges = image_block_ranges(&[8, 3, 2], &[5, 5, 5], &[0, 0, 0]);

        let mut blocks = Vec::new();
        for (idx, r) in ranges.iter().enumerate() {
            let mut sub =
                SubImage::new(&base, &format!("_{idx}"), idx as u32, *r, factory.clone(), Mode::Write(template())).unwrap();
            sub.close();
            blocks.push(SubImage::new(&base, &format!("_{idx}"), idx as u32, *r, factory.clone(), Mode::Read).unwrap());
        }
        let view = CombinedView::new(blocks);
        assert_eq!(view.image_dims(), [8, 3, 2]);
    }

    #[test]
    fn single_block_view_round_trips_full_volume() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("whole").to_string_lossy().into_owned();
        let factory: Arc<dyn FileHandleFactory> = Arc::new(FakeFileHandleFactory::default());
        let whole: AxisRange = AxisRange { origin_start: 0, origin_end: 3, pad_start: 0, pad_end: 0 };
        let ranges = [whole, whole, AxisRange { origin_start: 0, origin_end: 0, pad_start: 0, pad_end: 0 }];

        let writer = SubImage::new(&base, "", 0, ranges, factory.clone(), Mode::Write(template())).unwrap();
        let mut write_view = CombinedView::new(vec![writer]);
        for j in 0..4 {
            write_view.write_scanline([0, j, 0], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]).unwrap();
        }
        write_view.close();

        let reader = SubImage::new(&base, "", 0, ranges, factory, Mode::Read).unwrap();
        let mut read_view = CombinedView::new(vec![reader]);
        let bytes = read_view.read_scanline([0, 0, 0], 4).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
    }
}
