//! Combiner (spec §4.H): reassembles a split series back into one
//! MetaIO volume, either from a `.gift` descriptor or, lacking one, by
//! auto-discovering a numbered series on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::combined_view::CombinedView;
use crate::descriptor::SplitDescriptor;
use crate::error::{Error, Result};
use crate::file_handle::{FileHandleFactory, OsFileHandleFactory};
use crate::header::Header;
use crate::planner::AxisRange;
use crate::sub_image::{Mode, SubImage};

pub struct Combiner {
    factory: Arc<dyn FileHandleFactory>,
}

impl Default for Combiner {
    fn default() -> Self {
        Self { factory: Arc::new(OsFileHandleFactory) }
    }
}

impl Combiner {
    pub fn new(factory: Arc<dyn FileHandleFactory>) -> Self {
        Self { factory }
    }

    /// Reassemble a series recorded in a `.gift` descriptor, writing
    /// the combined volume to `<out_prefix>.mhd`/`.raw`.
    pub fn combine_with_descriptor(&self, descriptor_path: &Path, out_prefix: &str) -> Result<()> {
        let descriptor = SplitDescriptor::load(descriptor_path)?;
        let dir = descriptor_path.parent().unwrap_or_else(|| Path::new(""));

        let mut blocks = Vec::with_capacity(descriptor.split_files.len());
        for entry in &descriptor.split_files {
            let stem = strip_extension(&dir.join(&entry.filename));
            let sub = SubImage::new(&stem, "", entry.index, entry.axis_ranges(), self.factory.clone(), Mode::Read)?;
            blocks.push(sub);
        }

        let source_stem = strip_extension(&dir.join(&descriptor.source_files[0].filename));
        let template = Header::load(&PathBuf::from(format!("{source_stem}.mhd")))?;

        self.combine_blocks(blocks, out_prefix, template)
    }

    /// Reassemble a series with no descriptor, by probing for
    /// `<base>1.mhd`, `<base>2.mhd`, ... and stacking them along axis 2.
    /// Every block's axis 0 and axis 1 sizes MUST match; only axis 2 is
    /// allowed to vary between blocks, since without a descriptor there
    /// is no record of how else the volume might have been partitioned.
    pub fn combine_auto(&self, base: &Path, out_prefix: &str) -> Result<()> {
        let base_str = base.to_string_lossy().into_owned();
        let mut candidates = Vec::new();
        let mut index = 1u32;
        loop {
            let candidate = PathBuf::from(format!("{base_str}{index}.mhd"));
            if !candidate.exists() {
                break;
            }
            candidates.push(candidate);
            index += 1;
        }
        if candidates.is_empty() {
            return Err(Error::InvalidArgument(format!("no numbered series found for base {base_str:?}")));
        }

        let first_header = Header::load(&candidates[0])?;
        let first_dim = first_header.dim_size()?;
        if first_dim.len() != 3 {
            return Err(Error::InvalidArgument("only 3-dimensional volumes are supported".into()));
        }

        let mut blocks = Vec::with_capacity(candidates.len());
        let mut axis2_offset = 0i64;
        for (i, candidate) in candidates.iter().enumerate() {
            let header = Header::load(candidate)?;
            let dim = header.dim_size()?;
            if dim.len() != 3 {
                return Err(Error::InvalidArgument("only 3-dimensional volumes are supported".into()));
            }
            if dim[0] != first_dim[0] || dim[1] != first_dim[1] {
                return Err(Error::InvalidArgument(format!(
                    "block {} has axis 0/1 size {:?}, expected {:?}",
                    i + 1,
                    &dim[0..2],
                    &first_dim[0..2]
                )));
            }

            let ranges = [
                AxisRange { origin_start: 0, origin_end: dim[0] - 1, pad_start: 0, pad_end: 0 },
                AxisRange { origin_start: 0, origin_end: dim[1] - 1, pad_start: 0, pad_end: 0 },
                AxisRange { origin_start: axis2_offset, origin_end: axis2_offset + dim[2] - 1, pad_start: 0, pad_end: 0 },
            ];
            axis2_offset += dim[2];

            let stem = strip_extension(candidate);
            let sub = SubImage::new(&stem, "", i as u32, ranges, self.factory.clone(), Mode::Read)?;
            blocks.push(sub);
        }

        self.combine_blocks(blocks, out_prefix, first_header)
    }

    fn combine_blocks(&self, blocks: Vec<SubImage>, out_prefix: &str, template: Header) -> Result<()> {
        let mut source_view = CombinedView::new(blocks);
        let dims = source_view.image_dims();

        let out_ranges = [
            AxisRange { origin_start: 0, origin_end: dims[0] - 1, pad_start: 0, pad_end: 0 },
            AxisRange { origin_start: 0, origin_end: dims[1] - 1, pad_start: 0, pad_end: 0 },
            AxisRange { origin_start: 0, origin_end: dims[2] - 1, pad_start: 0, pad_end: 0 },
        ];

        let out_sub = SubImage::new(out_prefix, "", 0, out_ranges, self.factory.clone(), Mode::Write(template))?;
        let mut dest_view = CombinedView::new(vec![out_sub]);

        dest_view.copy_from(&mut source_view)?;
        source_view.close();
        dest_view.close();
        Ok(())
    }
}

fn strip_extension(path: &Path) -> String {
    path.with_extension("").to_string_lossy().into_owned()
}
