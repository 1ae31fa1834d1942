//! Sub-image (spec §4.D): one block's `.mhd`/`.raw` pair, opened either
//! for read (header loaded lazily from disk) or for write (header
//! derived from a template and persisted immediately).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::file_handle::{FileHandle, FileHandleFactory, FileMode};
use crate::header::{Header, Value};
use crate::planner::BlockRanges;
use crate::streamer::ScanlineStreamer;

/// Whether a [`SubImage`] was opened to read an existing block or to
/// write a new one. The presence of a template header is what the
/// original tool used to mean "this call is a write" — here that's a
/// typed variant instead of an `Option` the caller has to interpret.
pub enum Mode {
    Read,
    Write(Header),
}

/// One block of the split volume: its own `.mhd` header and `.raw`
/// payload, addressed in the *global* coordinate space of the parent
/// image via `ranges`.
pub struct SubImage {
    mhd_path: PathBuf,
    ranges: BlockRanges,
    index: u32,
    factory: Arc<dyn FileHandleFactory>,
    header: Option<Header>,
    raw_handle: Option<FileHandle>,
}

impl SubImage {
    /// `base_filename` is the source image's path without extension;
    /// `suffix` (e.g. `"_0"`) distinguishes this block's files from its
    /// siblings. `index` is the descriptor-authoritative block position
    /// (spec §3: "Order in `split_files` is arbitrary; `index` is
    /// authoritative") — it is what [`crate::combined_view::CombinedView`]
    /// sorts blocks by, independent of filename or origin coordinates.
    /// In `Mode::Write`, `DimSize`/`Origin`/`ElementDataFile` are
    /// overridden on the template header and the header is saved to
    /// disk before this call returns — the payload file is created
    /// lazily on first write.
    pub fn new(
        base_filename: &str,
        suffix: &str,
        index: u32,
        ranges: BlockRanges,
        factory: Arc<dyn FileHandleFactory>,
        mode: Mode,
    ) -> Result<Self> {
        let mhd_path = PathBuf::from(format!("{base_filename}{suffix}.mhd"));

        match mode {
            Mode::Write(mut header) => {
                let dim_size: Vec<i64> = ranges.iter().map(|a| a.dim()).collect();
                let origin: Vec<i64> = ranges.iter().map(|a| a.origin_start).collect();
                let raw_name = file_name_of(&format!("{base_filename}{suffix}.raw"));

                header.set("DimSize", Value::IntList(dim_size));
                header.set("Origin", Value::IntList(origin));
                header.set("ElementDataFile", Value::Str(raw_name));
                header.save(&mhd_path)?;

                Ok(Self { mhd_path, ranges, index, factory, header: Some(header), raw_handle: None })
            }
            Mode::Read => Ok(Self { mhd_path, ranges, index, factory, header: None, raw_handle: None }),
        }
    }

    fn ensure_header(&mut self) -> Result<&Header> {
        if self.header.is_none() {
            self.header = Some(Header::load(&self.mhd_path)?);
        }
        Ok(self.header.as_ref().unwrap())
    }

    pub fn bytes_per_voxel(&mut self) -> Result<usize> {
        let header = self.ensure_header()?;
        Ok(crate::header::bytes_per_voxel(header.element_type()?))
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn get_ranges(&self) -> &BlockRanges {
        &self.ranges
    }

    /// Whether `v_global` falls inside this block. `strict` selects the
    /// ROI (non-overlapping region this block owns) instead of the full
    /// stored region including guard bands.
    pub fn contains_voxel(&self, v_global: &[i64; 3], strict: bool) -> bool {
        for axis in 0..3 {
            let r = &self.ranges[axis];
            let (lo, hi) = if strict { (r.roi_start(), r.roi_end()) } else { (r.origin_start, r.origin_end) };
            if v_global[axis] < lo || v_global[axis] > hi {
                return false;
            }
        }
        true
    }

    fn to_local(&self, v_global: &[i64; 3]) -> [i64; 3] {
        let mut local = [0i64; 3];
        for axis in 0..3 {
            local[axis] = v_global[axis] - self.ranges[axis].origin_start;
        }
        local
    }

    fn raw_path(&self) -> Result<PathBuf> {
        let header = self.header.as_ref().expect("header must be loaded before opening the raw file");
        let name = header.element_data_file()?;
        let parent = self.mhd_path.parent().unwrap_or_else(|| Path::new(""));
        Ok(parent.join(name))
    }

    fn ensure_raw_open(&mut self, mode: FileMode) -> Result<()> {
        self.ensure_header()?;
        if self.raw_handle.is_none() {
            let path = self.raw_path()?;
            self.raw_handle = Some(FileHandle::new(path, mode, self.factory.clone()));
        }
        Ok(())
    }

    fn streamer(&mut self) -> Result<ScanlineStreamer> {
        let header = self.header.as_ref().unwrap();
        let dims: Vec<i64> = self.ranges.iter().map(|a| a.dim()).collect();
        let bpv = crate::header::bytes_per_voxel(header.element_type()?);
        Ok(ScanlineStreamer::new(dims, bpv))
    }

    /// Read up to `num_voxels` voxels starting at global coordinate
    /// `v_global`, clipped so the read never runs past this block's ROI
    /// on axis 0. Errors with `OutOfRange` if `v_global` does not fall
    /// inside this block's ROI (spec §4.D: reads are strict).
    pub fn read(&mut self, v_global: &[i64; 3], num_voxels: i64) -> Result<Vec<u8>> {
        if !self.contains_voxel(v_global, true) {
            return Err(Error::OutOfRange { coord: v_global.to_vec() });
        }
        self.ensure_raw_open(FileMode::Read)?;
        let local = self.to_local(v_global);
        let roi_end0 = self.ranges[0].roi_end();
        let available = roi_end0 - v_global[0] + 1;
        let clipped = num_voxels.min(available);
        let streamer = self.streamer()?;
        streamer.read(self.raw_handle.as_mut().unwrap(), &local, clipped)
    }

    /// Write `payload` starting at global coordinate `v_global`. Unlike
    /// `read`, the caller is trusted to stay within this block's ROI;
    /// no clipping is applied.
    pub fn write(&mut self, v_global: &[i64; 3], payload: &[u8]) -> Result<()> {
        self.ensure_raw_open(FileMode::Write)?;
        let local = self.to_local(v_global);
        let streamer = self.streamer()?;
        streamer.write(self.raw_handle.as_mut().unwrap(), &local, payload)
    }

    pub fn close(&mut self) {
        if let Some(handle) = self.raw_handle.as_mut() {
            handle.close();
        }
    }
}

impl Drop for SubImage {
    fn drop(&mut self) {
        self.close();
    }
}

fn file_name_of(path: &str) -> String {
    Path::new(path).file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::AxisRange;
    use crate::testing::FakeFileHandleFactory;

    fn ranges(dims: [i64; 3]) -> BlockRanges {
        [
            AxisRange { origin_start: 0, origin_end: dims[0] - 1, pad_start: 0, pad_end: 0 },
            AxisRange { origin_start: 0, origin_end: dims[1] - 1, pad_start: 0, pad_end: 0 },
            AxisRange { origin_start: 0, origin_end: dims[2] - 1, pad_start: 0, pad_end: 0 },
        ]
    }

    fn template() -> Header {
        let mut h = Header::new();
        h.set("ObjectType", Value::Str("Image".into()));
        h.set("NDims", Value::Int(3));
        h.set("BinaryData", Value::Bool(true));
        h.set("ElementType", Value::Str("MET_INT".into()));
        h
    }

    #[test]
    fn write_mode_persists_header_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("block").to_string_lossy().into_owned();
        let factory: Arc<dyn FileHandleFactory> = Arc::new(FakeFileHandleFactory::default());

        let _sub = SubImage::new(&base, "_0", 0, ranges([4, 3, 2]), factory, Mode::Write(template())).unwrap();

        let mhd = std::fs::read_to_string(format!("{base}_0.mhd")).unwrap();
        assert!(mhd.contains("DimSize = 4 3 2"));
        assert!(mhd.contains("Origin = 0 0 0"));
        assert!(mhd.contains("ElementDataFile = block_0.raw"));
    }

    #[test]
    fn read_clips_at_axis0_end_of_block() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("block").to_string_lossy().into_owned();
        let factory: Arc<dyn FileHandleFactory> = Arc::new(FakeFileHandleFactory::default());

        let mut writer =
            SubImage::new(&base, "_0", 0, ranges([4, 1, 1]), factory.clone(), Mode::Write(template())).unwrap();
        for v in 0..4i32 {
            writer.write(&[v as i64, 0, 0], &v.to_le_bytes()).unwrap();
        }
        writer.close();

        let mut reader = SubImage::new(&base, "_0", 0, ranges([4, 1, 1]), factory, Mode::Read).unwrap();
        let bytes = reader.read(&[2, 0, 0], 100).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(i32::from_le_bytes(bytes[0..4].try_into().unwrap()), 2);
        assert_eq!(i32::from_le_bytes(bytes[4..8].try_into().unwrap()), 3);
    }

    #[test]
    fn read_outside_block_is_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("block").to_string_lossy().into_owned();
        let factory: Arc<dyn FileHandleFactory> = Arc::new(FakeFileHandleFactory::default());
        let _writer = SubImage::new(&base, "_0", 0, ranges([4, 1, 1]), factory.clone(), Mode::Write(template())).unwrap();

        let mut reader = SubImage::new(&base, "_0", 0, ranges([4, 1, 1]), factory, Mode::Read).unwrap();
        assert!(reader.read(&[9, 0, 0], 1).is_err());
    }

    #[test]
    fn contains_voxel_strict_excludes_guard_band() {
        let mut block = ranges([10, 1, 1]);
        block[0].pad_start = 2;
        block[0].pad_end = 2;
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("block").to_string_lossy().into_owned();
        let factory: Arc<dyn FileHandleFactory> = Arc::new(FakeFileHandleFactory::default());
        let sub = SubImage::new(&base, "_0", 0, block, factory, Mode::Write(template())).unwrap();

        assert!(!sub.contains_voxel(&[1, 0, 0], true));
        assert!(sub.contains_voxel(&[1, 0, 0], false));
        assert!(sub.contains_voxel(&[5, 0, 0], true));
    }
}
