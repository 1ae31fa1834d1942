//! Splitter (spec §4.G): partitions one MetaIO volume into overlapping
//! blocks and records the split in a `.gift` descriptor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::combined_view::CombinedView;
use crate::descriptor::{FileRangeEntry, SplitDescriptor};
use crate::error::{Error, Result};
use crate::file_handle::{FileHandleFactory, OsFileHandleFactory};
use crate::header::Header;
use crate::planner::{image_block_ranges, AxisRange};
use crate::sub_image::{Mode, SubImage};

const DEFAULT_MAX_BLOCK_SIZE: [i64; 3] = [500, 500, 500];
const DEFAULT_OVERLAP_SIZE: [i64; 3] = [50, 50, 50];

pub struct Splitter {
    max_block_size: [i64; 3],
    overlap_size: [i64; 3],
    factory: Arc<dyn FileHandleFactory>,
}

impl Default for Splitter {
    fn default() -> Self {
        Self {
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            overlap_size: DEFAULT_OVERLAP_SIZE,
            factory: Arc::new(OsFileHandleFactory),
        }
    }
}

impl Splitter {
    pub fn new(factory: Arc<dyn FileHandleFactory>) -> Self {
        Self { max_block_size: DEFAULT_MAX_BLOCK_SIZE, overlap_size: DEFAULT_OVERLAP_SIZE, factory }
    }

    /// Overrides the per-axis block size and overlap width. Both MUST
    /// be exactly 3 long, matching the volume's three axes.
    pub fn with_block_params(mut self, max_block_size: &[i64], overlap_size: &[i64]) -> Result<Self> {
        self.max_block_size = to_axis3(max_block_size, "max block size")?;
        self.overlap_size = to_axis3(overlap_size, "overlap size")?;
        Ok(self)
    }

    /// Split `filename` (a `.mhd` path) into blocks named
    /// `<out_prefix>_0.mhd`, `<out_prefix>_1.mhd`, ... in planner order,
    /// with a `<out_prefix>.gift` descriptor recording the split.
    pub fn split(&self, filename: &Path, out_prefix: &str) -> Result<SplitDescriptor> {
        let source_stem = strip_extension(filename);
        let source_header = Header::load(filename)?;
        let dim_size = source_header.dim_size()?;
        if dim_size.len() != 3 {
            return Err(Error::InvalidArgument(format!(
                "only 3-dimensional volumes are supported, got {} dims",
                dim_size.len()
            )));
        }
        let image_size = [dim_size[0], dim_size[1], dim_size[2]];

        let source_ranges = whole_image_ranges(&image_size);
        let source_sub = SubImage::new(&source_stem, "", 0, source_ranges, self.factory.clone(), Mode::Read)?;
        let mut source_view = CombinedView::new(vec![source_sub]);

        let block_ranges = image_block_ranges(&image_size, &self.max_block_size, &self.overlap_size);
        let mut split_files = Vec::with_capacity(block_ranges.len());

        // Each block's full origin region (ROI plus guard band) is
        // written independently, straight through `SubImage::write`
        // rather than through a shared `CombinedView` over all blocks:
        // blocks overlap whenever overlap_size > 0, so a guard-band
        // voxel belongs to more than one block's origin region and must
        // be written into *every* one of them, not claimed by whichever
        // block a partition-style coordinate scan finds first (spec
        // §4.G step 5).
        for (index, ranges) in block_ranges.iter().enumerate() {
            let suffix = format!("_{index}");
            let mut sub = SubImage::new(
                out_prefix,
                &suffix,
                index as u32,
                *ranges,
                self.factory.clone(),
                Mode::Write(source_header.clone()),
            )?;

            for j in ranges[1].origin_start..=ranges[1].origin_end {
                for k in ranges[2].origin_start..=ranges[2].origin_end {
                    let start = [ranges[0].origin_start, j, k];
                    let bytes = source_view.read_scanline(start, ranges[0].dim())?;
                    sub.write(&start, &bytes)?;
                }
            }
            sub.close();

            split_files.push(FileRangeEntry {
                filename: format!("{}{}.mhd", file_name(out_prefix), suffix),
                suffix,
                index: index as u32,
                ranges: ranges.map(|a| a.as_range_array()),
            });
        }

        source_view.close();

        let descriptor = SplitDescriptor::new(
            vec![FileRangeEntry {
                filename: file_name(filename),
                suffix: String::new(),
                index: 0,
                ranges: source_ranges.map(|a| a.as_range_array()),
            }],
            split_files,
        );
        descriptor.save(&descriptor_path(out_prefix))?;
        Ok(descriptor)
    }
}

fn to_axis3(v: &[i64], label: &str) -> Result<[i64; 3]> {
    if v.len() != 3 {
        return Err(Error::InvalidArgument(format!("{label} must have exactly 3 values, got {}", v.len())));
    }
    Ok([v[0], v[1], v[2]])
}

fn whole_image_ranges(image_size: &[i64; 3]) -> [AxisRange; 3] {
    let mut ranges = [AxisRange { origin_start: 0, origin_end: 0, pad_start: 0, pad_end: 0 }; 3];
    for axis in 0..3 {
        ranges[axis] = AxisRange { origin_start: 0, origin_end: image_size[axis] - 1, pad_start: 0, pad_end: 0 };
    }
    ranges
}

fn strip_extension(path: &Path) -> String {
    path.with_extension("").to_string_lossy().into_owned()
}

fn file_name(path: impl AsRef<Path>) -> String {
    path.as_ref().file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

fn descriptor_path(stem: &str) -> PathBuf {
    PathBuf::from(format!("{stem}.gift"))
}
