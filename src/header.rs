//! MetaIO header codec (spec §4.A).
//!
//! A `.mhd` header is a flat text file of `Key = Value` lines. Order
//! matters to downstream tooling, so we keep it in an insertion-ordered
//! map rather than a hashed one (spec §9 design note).

use indexmap::IndexMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};

/// The canonical key order `save` emits before any extra user keys.
const CANONICAL_KEYS: &[&str] = &[
    "ObjectType",
    "NDims",
    "BinaryData",
    "BinaryDataByteOrderMSB",
    "CompressedData",
    "CompressedDataSize",
    "TransformMatrix",
    "Offset",
    "CenterOfRotation",
    "AnatomicalOrientation",
    "ElementSpacing",
    "DimSize",
    "ElementNumberOfChannels",
    "ElementSize",
    "ElementType",
    "ElementDataFile",
    "Comment",
    "SeriesDescription",
    "AcquisitionDate",
    "AcquisitionTime",
    "StudyDate",
    "StudyTime",
];

const FLOAT_LIST_KEYS: &[&str] = &["ElementSpacing", "Offset", "CenterOfRotation", "TransformMatrix"];
const INT_KEYS: &[&str] = &["NDims", "ElementNumberOfChannels"];
const INT_LIST_KEYS: &[&str] = &["DimSize"];
const BOOL_KEYS: &[&str] = &["BinaryData", "BinaryDataByteOrderMSB", "CompressedData"];

/// A single header value, typed according to its key (spec §4.A).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    Bool(bool),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Value::Str(s) => s.is_empty(),
            Value::IntList(v) => v.is_empty(),
            Value::FloatList(v) => v.is_empty(),
            Value::Int(_) | Value::Bool(_) => false,
        }
    }

    /// Render without brackets or commas, matching the original
    /// `save_mhd_header`'s list-flattening step.
    fn render(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Bool(b) => if *b { "True".to_string() } else { "False".to_string() },
            Value::IntList(v) => v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" "),
            Value::FloatList(v) => v.iter().map(|x| format_float(*x)).collect::<Vec<_>>().join(" "),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            Value::IntList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 {
        format!("{:.0}", f)
    } else {
        f.to_string()
    }
}

/// Parse every whitespace-separated token in `raw`, failing with
/// `InvalidHeader` (rather than silently dropping the bad token) the
/// moment one doesn't parse.
fn parse_list<T: std::str::FromStr>(key: &str, raw: &str) -> Result<Vec<T>> {
    raw.split_whitespace()
        .map(|tok| {
            tok.parse::<T>()
                .map_err(|_| Error::InvalidHeader(format!("{key}: invalid numeric token {tok:?}")))
        })
        .collect()
}

fn coerce(key: &str, raw: &str) -> Result<Value> {
    if FLOAT_LIST_KEYS.contains(&key) {
        Ok(Value::FloatList(parse_list(key, raw)?))
    } else if INT_KEYS.contains(&key) {
        let n = raw
            .parse()
            .map_err(|_| Error::InvalidHeader(format!("{key}: invalid integer value {raw:?}")))?;
        Ok(Value::Int(n))
    } else if INT_LIST_KEYS.contains(&key) {
        Ok(Value::IntList(parse_list(key, raw)?))
    } else if BOOL_KEYS.contains(&key) {
        Ok(Value::Bool(raw.eq_ignore_ascii_case("true")))
    } else {
        Ok(Value::Str(raw.to_string()))
    }
}

/// An insertion-ordered MetaIO header.
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub fields: IndexMap<String, Value>,
}

impl Header {
    pub fn new() -> Self {
        Self { fields: IndexMap::new() }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    pub fn dim_size(&self) -> Result<Vec<i64>> {
        self.get("DimSize")
            .and_then(Value::as_int_list)
            .map(|v| v.to_vec())
            .ok_or_else(|| Error::InvalidHeader("missing or malformed DimSize".into()))
    }

    pub fn ndims(&self) -> Result<i64> {
        self.get("NDims")
            .and_then(Value::as_int)
            .ok_or_else(|| Error::InvalidHeader("missing or malformed NDims".into()))
    }

    pub fn element_type(&self) -> Result<&str> {
        self.get("ElementType")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidHeader("missing ElementType".into()))
    }

    pub fn element_data_file(&self) -> Result<&str> {
        self.get("ElementDataFile")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidHeader("missing ElementDataFile".into()))
    }

    /// Load a header from a `.mhd` file, splitting each non-empty line at
    /// the first `=` and trimming whitespace on both sides.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut header = Header::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let idx = line.find('=').ok_or_else(|| {
                Error::InvalidHeader(format!("line has no '=': {line:?}"))
            })?;
            let key = line[..idx].trim();
            let val = line[idx + 1..].trim();
            if key.is_empty() {
                return Err(Error::InvalidHeader(format!("empty key in line: {line:?}")));
            }
            header.fields.insert(key.to_string(), coerce(key, val)?);
        }

        Ok(header)
    }

    /// Save a header, emitting the canonical key order first, then any
    /// extra user keys in insertion order. Empty values are skipped.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        let mut emitted: Vec<&str> = Vec::new();

        for key in CANONICAL_KEYS {
            if let Some(value) = self.fields.get(*key) {
                if !value.is_empty() {
                    out.push_str(key);
                    out.push_str(" = ");
                    out.push_str(&value.render());
                    out.push('\n');
                }
                emitted.push(key);
            }
        }

        for (key, value) in &self.fields {
            if emitted.contains(&key.as_str()) {
                continue;
            }
            if value.is_empty() {
                continue;
            }
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(&value.render());
            out.push('\n');
        }

        let mut f = fs::File::create(path)?;
        f.write_all(out.as_bytes())?;
        Ok(())
    }
}

/// Bytes per voxel for a MetaIO `ElementType`. Unknown tokens fall back
/// to 2 — a compatibility hazard inherited from the original tool
/// (`get_bytes_per_voxel`'s `switcher.get(element_type, 2)`), kept here
/// deliberately rather than failing closed.
pub fn bytes_per_voxel(element_type: &str) -> usize {
    match element_type {
        "MET_CHAR" | "MET_UCHAR" => 1,
        "MET_SHORT" | "MET_USHORT" => 2,
        "MET_INT" | "MET_UINT" | "MET_FLOAT" => 4,
        "MET_DOUBLE" => 8,
        _ => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn bytes_per_voxel_map_matches_s6() {
        assert_eq!(bytes_per_voxel("MET_CHAR"), 1);
        assert_eq!(bytes_per_voxel("MET_UCHAR"), 1);
        assert_eq!(bytes_per_voxel("MET_SHORT"), 2);
        assert_eq!(bytes_per_voxel("MET_USHORT"), 2);
        assert_eq!(bytes_per_voxel("MET_INT"), 4);
        assert_eq!(bytes_per_voxel("MET_UINT"), 4);
        assert_eq!(bytes_per_voxel("MET_FLOAT"), 4);
        assert_eq!(bytes_per_voxel("MET_DOUBLE"), 8);
        assert_eq!(bytes_per_voxel("MET_WEIRD"), 2);
    }

    #[test]
    fn load_parses_typed_fields() {
        let f = write_tmp(
            "ObjectType = Image\nNDims = 3\nDimSize = 101 222 4\nBinaryData = True\nElementType = MET_INT\nElementDataFile = foo.raw\n",
        );
        let h = Header::load(f.path()).unwrap();
        assert_eq!(h.ndims().unwrap(), 3);
        assert_eq!(h.dim_size().unwrap(), vec![101, 222, 4]);
        assert_eq!(h.element_type().unwrap(), "MET_INT");
        assert_eq!(h.element_data_file().unwrap(), "foo.raw");
        assert_eq!(h.get("BinaryData").unwrap(), &Value::Bool(true));
    }

    #[test]
    fn load_rejects_line_without_equals() {
        let f = write_tmp("ObjectType = Image\nThisLineIsBroken\n");
        assert!(Header::load(f.path()).is_err());
    }

    #[test]
    fn load_rejects_unparseable_int() {
        let f = write_tmp("NDims = abc\n");
        assert!(Header::load(f.path()).is_err());
    }

    #[test]
    fn load_rejects_unparseable_token_in_int_list() {
        let f = write_tmp("DimSize = 10 bad 30\n");
        assert!(Header::load(f.path()).is_err());
    }

    #[test]
    fn load_rejects_unparseable_token_in_float_list() {
        let f = write_tmp("Offset = 0.0 xx 1.0\n");
        assert!(Header::load(f.path()).is_err());
    }

    #[test]
    fn save_emits_no_brackets_or_commas() {
        let mut h = Header::new();
        h.set("DimSize", Value::IntList(vec![1, 2, 3]));
        let out = tempfile::NamedTempFile::new().unwrap();
        h.save(out.path()).unwrap();
        let text = fs::read_to_string(out.path()).unwrap();
        assert!(!text.contains('['));
        assert!(!text.contains(']'));
        assert!(!text.contains(','));
        assert!(text.contains("DimSize = 1 2 3"));
    }

    #[test]
    fn save_skips_empty_values() {
        let mut h = Header::new();
        h.set("ObjectType", Value::Str("Image".into()));
        h.set("Comment", Value::Str(String::new()));
        let out = tempfile::NamedTempFile::new().unwrap();
        h.save(out.path()).unwrap();
        let text = fs::read_to_string(out.path()).unwrap();
        assert!(!text.contains("Comment"));
    }

    #[test]
    fn header_round_trip_on_canonical_keys() {
        let mut h = Header::new();
        h.set("ObjectType", Value::Str("Image".into()));
        h.set("NDims", Value::Int(3));
        h.set("BinaryData", Value::Bool(true));
        h.set("DimSize", Value::IntList(vec![10, 20, 30]));
        h.set("ElementType", Value::Str("MET_SHORT".into()));
        h.set("ElementDataFile", Value::Str("out.raw".into()));

        let out = tempfile::NamedTempFile::new().unwrap();
        h.save(out.path()).unwrap();
        let loaded = Header::load(out.path()).unwrap();

        assert_eq!(loaded.ndims().unwrap(), 3);
        assert_eq!(loaded.dim_size().unwrap(), vec![10, 20, 30]);
        assert_eq!(loaded.element_type().unwrap(), "MET_SHORT");
        assert_eq!(loaded.get("BinaryData").unwrap(), &Value::Bool(true));
    }
}
