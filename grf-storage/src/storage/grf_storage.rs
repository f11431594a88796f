//! Main GRF storage implementation
//!
//! Boot opens every manifest archive in order, builds the unified index,
//! merges the repair mapping, and exposes the resolver. After boot the
//! only mutable state is the content cache and the missing-path ring, so
//! `fetch` is safe to call from any number of threads.

use crate::archive::{Archive, OpenOptions};
use crate::cache::{CacheStatsSnapshot, ContentCache};
use crate::config::StorageConfig;
use crate::error::{GrfError, Result};
use crate::index::{
    IndexStats, RepairLookup, RepairMap, Resolution, UnifiedIndex, normalize_path,
};
use crate::manifest::read_manifest;
use crate::storage::missing_log::{MissingLog, MissingStats};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Safety net on a single archive load; a parse that spins longer than
/// this fails the archive instead of hanging boot.
const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// How often a missing path is worth a `warn!`.
const MISSING_NOTICE_COOLDOWN: Duration = Duration::from_secs(60);

/// Combined stats document for the consumer surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub cache: CacheStatsSnapshot,
    pub index: IndexStats,
    pub missing: MissingStats,
    pub archives: Vec<crate::archive::ArchiveStats>,
}

pub struct GrfStorage {
    config: StorageConfig,
    archives: Vec<Archive>,
    index: UnifiedIndex,
    repair: Option<RepairLookup>,
    cache: ContentCache,
    missing: MissingLog,
}

impl GrfStorage {
    /// Open all archives listed in the manifest and build the index.
    ///
    /// A failing archive is skipped with an error log; boot fails only
    /// when nothing loads at all.
    pub fn load(manifest_path: &Path, config: StorageConfig) -> Result<Self> {
        let names = read_manifest(manifest_path)?;
        let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        let options = OpenOptions {
            auto_detect_threshold: config.auto_detect_threshold,
            scan_limit: config.scan_limit,
            encoding_override: None,
        };

        let total = names.len();
        let mut archives = Vec::with_capacity(total);
        for name in names {
            let path = base.join(&name);
            match open_with_timeout(&path, &options, LOAD_TIMEOUT) {
                Ok(archive) => archives.push(archive),
                Err(e) => error!(path = %path.display(), "failed to load archive: {e}"),
            }
        }
        if archives.is_empty() {
            return Err(GrfError::NoArchives(total));
        }

        let mut index = UnifiedIndex::new();
        for (id, archive) in archives.iter().enumerate() {
            index.ingest_archive(id as u16, archive.iter_entries().map(|e| e.name.as_str()));
        }

        let repair_path = config
            .repair_map_path
            .clone()
            .unwrap_or_else(|| base.join("path-mapping.json"));
        let repair = if repair_path.is_file() {
            match RepairMap::load(&repair_path) {
                Ok(map) => {
                    index.merge_repair_paths(
                        map.paths.iter().map(|(b, c)| (b.as_str(), c.as_str())),
                    );
                    Some(RepairLookup::new(&map))
                }
                Err(e) => {
                    warn!(path = %repair_path.display(), "repair mapping unusable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let cache = ContentCache::new(config.cache.max_entries, config.cache_max_bytes());

        info!(
            archives = archives.len(),
            indexed = index.len(),
            "storage ready"
        );

        Ok(Self {
            config,
            archives,
            index,
            repair,
            cache,
            missing: MissingLog::new(MISSING_NOTICE_COOLDOWN),
        })
    }

    /// Resolve `path` to its bytes: cache, then mirror, then index, then
    /// the repair-mapped alternate spelling. `None` means not found, and
    /// the miss is recorded.
    pub fn fetch(&self, path: &str) -> Option<Arc<Vec<u8>>> {
        let key = normalize_path(path);

        if let Some(buf) = self.cache.get(&key) {
            return Some(buf);
        }

        if let Some(buf) = self.fetch_mirrored(&key) {
            return Some(buf);
        }

        let mut tried = vec![key.clone()];
        if let Some(buf) = self.fetch_indexed(path, &key) {
            return Some(buf);
        }

        if let Some(repair) = &self.repair {
            if let Some(alternate) = repair.alternate_for(path) {
                tried.push(alternate.to_owned());
                let alternate_key = normalize_path(alternate);
                if let Some(buf) = self.fetch_indexed(alternate, &alternate_key) {
                    return Some(buf);
                }
            }
        }

        self.missing.record(path, &key, tried);
        None
    }

    fn fetch_indexed(&self, path: &str, key: &str) -> Option<Arc<Vec<u8>>> {
        let entry = match self.index.resolve(path) {
            Resolution::Found(entry) => entry,
            Resolution::NotFound | Resolution::Ambiguous(_) => return None,
        };
        let archive = self.archives.get(usize::from(entry.archive_id))?;

        match archive.get(&entry.raw_key) {
            Ok(bytes) => {
                let buf = Arc::new(bytes);
                self.cache.put(key.to_owned(), Arc::clone(&buf));
                self.mirror_write(key, &buf);
                Some(buf)
            }
            Err(e) => {
                // a corrupt entry degrades to not-found
                warn!(
                    path = %path,
                    archive = %archive.label(),
                    "extraction failed: {e}"
                );
                None
            }
        }
    }

    fn mirror_root(&self) -> Option<&PathBuf> {
        if !self.config.extract.enabled {
            return None;
        }
        self.config.mirror_dir.as_ref()
    }

    fn fetch_mirrored(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let target = mirror_relative(self.mirror_root()?, key)?;
        let bytes = std::fs::read(target).ok()?;
        debug!(key = %key, "served from physical mirror");
        let buf = Arc::new(bytes);
        self.cache.put(key.to_owned(), Arc::clone(&buf));
        Some(buf)
    }

    fn mirror_write(&self, key: &str, buf: &[u8]) {
        let Some(root) = self.mirror_root() else {
            return;
        };
        let Some(target) = mirror_relative(root, key) else {
            warn!(key = %key, "key does not stay under the mirror root, not mirrored");
            return;
        };
        let write = || -> std::io::Result<()> {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, buf)
        };
        if let Err(e) = write() {
            warn!(path = %target.display(), "mirror write failed: {e}");
        }
    }

    /// Unique canonical paths across the index, sorted.
    pub fn list(&self) -> Vec<String> {
        self.index.originals()
    }

    /// Canonical paths matching `pattern`.
    pub fn search(&self, pattern: &Regex) -> Vec<String> {
        self.index
            .originals()
            .into_iter()
            .filter(|path| pattern.is_match(path))
            .collect()
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            cache: self.cache.stats(),
            index: self.index.stats(),
            missing: self.missing.stats(),
            archives: self.archives.iter().map(Archive::stats).collect(),
        }
    }

    pub fn archives(&self) -> &[Archive] {
        &self.archives
    }
}

/// Resolve `key` to a location strictly under `root`. An absolute key
/// would replace the root in `Path::join`, and a `..` segment would climb
/// out of it; both are rejected.
fn mirror_relative(root: &Path, key: &str) -> Option<PathBuf> {
    if Path::new(key).is_absolute() || key.split('/').any(|seg| seg == "..") {
        return None;
    }
    Some(root.join(key))
}

/// Run `Archive::open_path` on a worker thread with a hard timeout. An
/// overrun fails the load; the worker's late result is dropped with its
/// channel.
fn open_with_timeout(path: &Path, options: &OpenOptions, timeout: Duration) -> Result<Archive> {
    let (tx, rx) = mpsc::channel();
    let worker_path = path.to_path_buf();
    let worker_options = options.clone();

    thread::Builder::new()
        .name("grf-load".into())
        .spawn(move || {
            let _ = tx.send(Archive::open_path(&worker_path, &worker_options));
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(GrfError::LoadTimeout(
            timeout.as_secs(),
            path.to_path_buf(),
        )),
    }
}
