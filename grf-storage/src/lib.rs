//! GRF archive storage engine
//!
//! Exposes the contents of legacy packed GRF game archives as an
//! in-process file service: validated header and table parsing,
//! encoding-tolerant filename decoding (UTF-8, CP949/EUC-KR, Latin-1
//! mojibake), a unified cross-archive index with collision-safe
//! normalization, a doubly-bounded LRU content cache, and a deep
//! encoding validator that produces a persistent repair mapping.

pub mod archive;
pub mod cache;
pub mod config;
pub mod encoding;
pub mod error;
pub mod index;
pub mod inflate;
pub mod manifest;
pub mod storage;
pub mod validator;

pub use archive::{Archive, ByteSource, Entry, FileSource, OpenOptions};
pub use config::StorageConfig;
pub use encoding::NameEncoding;
pub use error::{GrfError, Result};
pub use index::{IndexEntry, RepairMap, Resolution, UnifiedIndex, normalize_path};
pub use storage::GrfStorage;
pub use validator::{ValidationReport, ValidationRun, ValidatorOptions};
