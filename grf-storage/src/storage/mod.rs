//! Storage facade: boot, resolution, and serve-time state

mod grf_storage;
mod missing_log;

pub use grf_storage::{GrfStorage, StorageStats};
pub use missing_log::{MissingLog, MissingRecord, MissingStats};
