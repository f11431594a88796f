//! Error types for GRF storage operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrfError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive manifest not found: {0}")]
    ManifestMissing(PathBuf),

    #[error("archive manifest {0} lists no archives")]
    ManifestEmpty(PathBuf),

    #[error("archive not found: {0}")]
    ArchiveNotFound(PathBuf),

    #[error("no usable archives: all {0} manifest entries failed to load")]
    NoArchives(usize),

    #[error("bad archive header: {0}")]
    BadHeader(String),

    #[error("unsupported archive version {0:#06x}")]
    UnsupportedVersion(u32),

    #[error("archive uses legacy encryption, which is not supported")]
    UnsupportedEncryption,

    #[error("file table inflate failed: {0}")]
    TableInflate(String),

    #[error("file table parse failed: {0}")]
    TableParse(String),

    #[error("inflate failed: {0}")]
    Inflate(String),

    #[error("name is not valid UTF-8")]
    InvalidUtf8,

    #[error("entry not found: {0}")]
    MissingEntry(String),

    #[error("read beyond archive bounds: offset={offset}, length={length}, size={size}")]
    OutOfBounds {
        offset: u64,
        length: usize,
        size: u64,
    },

    #[error("short read at offset {offset}: wanted {wanted} bytes, got {got}")]
    Truncated {
        offset: u64,
        wanted: usize,
        got: usize,
    },

    #[error("loading archive {1} timed out after {0} seconds")]
    LoadTimeout(u64, PathBuf),
}

pub type Result<T> = std::result::Result<T, GrfError>;
