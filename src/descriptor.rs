//! JSON sidecar descriptor (`.gift`), spec §3 / §6.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::planner::AxisRange;

pub const APPNAME: &str = "GIFT-Surg split data";
pub const VERSION: &str = "1.0";

/// One file entry in either `source_files` or `split_files`: a filename,
/// an index (authoritative — list order is not), and per-axis
/// `[origin_start, origin_end, pad_start, pad_end]` ranges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRangeEntry {
    pub filename: String,
    #[serde(default)]
    pub suffix: String,
    pub index: u32,
    pub ranges: [[i64; 4]; 3],
}

impl FileRangeEntry {
    pub fn axis_ranges(&self) -> [AxisRange; 3] {
        [
            AxisRange::from_range_array(self.ranges[0]),
            AxisRange::from_range_array(self.ranges[1]),
            AxisRange::from_range_array(self.ranges[2]),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitDescriptor {
    pub appname: String,
    pub version: String,
    pub source_files: Vec<FileRangeEntry>,
    pub split_files: Vec<FileRangeEntry>,
}

impl SplitDescriptor {
    pub fn new(source_files: Vec<FileRangeEntry>, split_files: Vec<FileRangeEntry>) -> Self {
        Self {
            appname: APPNAME.to_string(),
            version: VERSION.to_string(),
            source_files,
            split_files,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let descriptor: SplitDescriptor = serde_json::from_str(&text)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Checks required by spec §4.H: correct app/version, and exactly
    /// one source file (multi-source descriptors are unsupported).
    pub fn validate(&self) -> Result<()> {
        if self.appname != APPNAME {
            return Err(Error::InvalidDescriptor(format!(
                "unexpected appname {:?}, expected {:?}",
                self.appname, APPNAME
            )));
        }
        if self.version != VERSION {
            return Err(Error::InvalidDescriptor(format!(
                "unsupported descriptor version {:?}, expected {:?}",
                self.version, VERSION
            )));
        }
        if self.source_files.len() != 1 {
            return Err(Error::InvalidDescriptor(format!(
                "expected exactly one source file, found {}",
                self.source_files.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SplitDescriptor {
        SplitDescriptor::new(
            vec![FileRangeEntry {
                filename: "source.mhd".into(),
                suffix: String::new(),
                index: 0,
                ranges: [[0, 100, 0, 0], [0, 200, 0, 0], [0, 3, 0, 0]],
            }],
            vec![FileRangeEntry {
                filename: "source_0.mhd".into(),
                suffix: "_0".into(),
                index: 0,
                ranges: [[0, 50, 0, 10], [0, 200, 0, 0], [0, 3, 0, 0]],
            }],
        )
    }

    #[test]
    fn round_trips_through_json() {
        let d = sample();
        let out = tempfile::NamedTempFile::new().unwrap();
        d.save(out.path()).unwrap();
        let loaded = SplitDescriptor::load(out.path()).unwrap();
        assert_eq!(loaded.appname, APPNAME);
        assert_eq!(loaded.version, VERSION);
        assert_eq!(loaded.split_files[0].ranges, d.split_files[0].ranges);
    }

    #[test]
    fn rejects_wrong_appname() {
        let mut d = sample();
        d.appname = "something else".into();
        assert!(d.validate().is_err());
    }

    #[test]
    fn rejects_multi_source() {
        let mut d = sample();
        d.source_files.push(d.source_files[0].clone());
        assert!(d.validate().is_err());
    }
}
