//! Crate-wide error taxonomy (spec §7).

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("coordinate {coord:?} is out of range")]
    OutOfRange { coord: Vec<i64> },

    #[error("short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite { expected: usize, actual: usize },

    #[error("I/O failure: {0}")]
    IoFailure(#[from] io::Error),

    #[error("descriptor JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
