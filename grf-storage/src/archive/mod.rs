//! GRF archive reading: header, file table, and on-demand extraction

mod header;
mod reader;
mod table;

pub use header::{GrfHeader, HEADER_SIZE, SIGNATURE, VERSION_0200, VERSION_0300};
pub use reader::{ByteSource, FileSource};
pub use table::{Entry, FLAG_DES_HEADER, FLAG_FILE, FLAG_MIXCRYPT};

use crate::encoding::{self, NameEncoding};
use crate::error::{GrfError, Result};
use crate::inflate::{ensure_inflatable, inflate_exact};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Knobs for opening an archive.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Fraction of invalid-UTF-8 names above which CP949 is selected.
    pub auto_detect_threshold: f64,
    /// Cap on entries inspected during detection (0 = all).
    pub scan_limit: usize,
    /// Skip detection and decode names under this encoding.
    pub encoding_override: Option<NameEncoding>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            auto_detect_threshold: 0.01,
            scan_limit: 0,
            encoding_override: None,
        }
    }
}

/// One opened GRF archive: parsed table, detected encoding, and a byte
/// source for extraction. Immutable after `open`.
pub struct Archive {
    source: Box<dyn ByteSource>,
    label: String,
    header: GrfHeader,
    encoding: NameEncoding,
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
    skipped: usize,
    parse_errors: usize,
}

/// Per-archive summary counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveStats {
    pub label: String,
    pub version: u32,
    pub detected_encoding: String,
    pub total_entries: usize,
    pub bad_names: usize,
    pub skipped: usize,
    pub parse_errors: usize,
    pub extensions: BTreeMap<String, u64>,
}

impl Archive {
    /// Open an archive from a positioned byte source.
    pub fn open(
        source: Box<dyn ByteSource>,
        label: impl Into<String>,
        options: &OpenOptions,
    ) -> Result<Self> {
        let label = label.into();
        let archive_len = source.len();

        if archive_len < HEADER_SIZE as u64 {
            return Err(GrfError::BadHeader(format!(
                "archive is {archive_len} bytes, shorter than the {HEADER_SIZE} byte header"
            )));
        }

        let header = GrfHeader::parse(&source.read_at(0, HEADER_SIZE)?)?;
        debug!(
            label = %label,
            version = header.version,
            declared = header.declared_count,
            effective = header.effective_count(),
            "parsed archive header"
        );

        let table = Self::read_table(source.as_ref(), &header, archive_len)?;
        let (walk, _width) = table::parse_table(
            &table,
            header.effective_count(),
            header.version,
            archive_len,
        );

        let encoding = match options.encoding_override {
            Some(enc) => enc,
            None => encoding::detect_encoding(
                walk.files.iter().map(|f| f.raw_name.as_slice()),
                options.auto_detect_threshold,
                options.scan_limit,
            ),
        };

        let mut entries = Vec::with_capacity(walk.files.len());
        let mut by_name = HashMap::with_capacity(walk.files.len());
        for raw in walk.files {
            let name = encoding::decode_lossy(&raw.raw_name, encoding);
            let has_bad_name = encoding::count_replacement(&name) > 0;
            if has_bad_name {
                debug!(label = %label, name = %name, "entry name decoded with replacement characters");
            }
            // later duplicates supersede earlier ones, as clients do
            by_name.insert(name.clone(), entries.len());
            entries.push(Entry {
                raw_name: raw.raw_name,
                name,
                compressed_size: raw.compressed_size,
                compressed_size_aligned: raw.compressed_size_aligned,
                real_size: raw.real_size,
                flags: raw.flags,
                offset: raw.offset,
                has_bad_name,
            });
        }

        if walk.parse_errors > 0 {
            warn!(
                label = %label,
                parse_errors = walk.parse_errors,
                "file table walk stopped early"
            );
        }

        info!(
            label = %label,
            entries = entries.len(),
            skipped = walk.skipped,
            encoding = %encoding,
            "opened archive"
        );

        Ok(Self {
            source,
            label,
            header,
            encoding,
            entries,
            by_name,
            skipped: walk.skipped,
            parse_errors: walk.parse_errors,
        })
    }

    /// Open an archive file on disk.
    pub fn open_path(path: &Path, options: &OpenOptions) -> Result<Self> {
        if !path.is_file() {
            return Err(GrfError::ArchiveNotFound(path.to_path_buf()));
        }
        let source = FileSource::open(path)?;
        Self::open(Box::new(source), path.display().to_string(), options)
    }

    fn read_table(source: &dyn ByteSource, header: &GrfHeader, archive_len: u64) -> Result<Vec<u8>> {
        let table_pos = u64::from(header.table_offset) + HEADER_SIZE as u64;
        let head = source.read_at(table_pos, 8).map_err(|e| {
            GrfError::TableParse(format!("table header at {table_pos} unreadable: {e}"))
        })?;

        let mut cur = Cursor::new(head.as_slice());
        let compressed_size = cur.read_u32::<LittleEndian>()?;
        let uncompressed_size = cur.read_u32::<LittleEndian>()?;

        if compressed_size == 0 {
            return Err(GrfError::TableInflate("file table is empty".into()));
        }
        if u64::from(compressed_size) > archive_len {
            return Err(GrfError::TableParse(format!(
                "table claims {compressed_size} compressed bytes in a {archive_len} byte archive"
            )));
        }

        // the size ceiling propagates as an inflate error; a corrupt
        // stream is a table-level failure
        ensure_inflatable(uncompressed_size as usize)?;
        let compressed = source
            .read_at(table_pos + 8, compressed_size as usize)
            .map_err(|e| GrfError::TableParse(format!("table body unreadable: {e}")))?;
        inflate_exact(&compressed, uncompressed_size as usize)
            .map_err(|e| GrfError::TableInflate(e.to_string()))
    }

    /// Extract one entry's bytes by its decoded name.
    pub fn get(&self, raw_key: &str) -> Result<Vec<u8>> {
        let entry = self
            .entry(raw_key)
            .ok_or_else(|| GrfError::MissingEntry(raw_key.to_owned()))?;

        if entry.is_encrypted() {
            return Err(GrfError::UnsupportedEncryption);
        }
        if entry.real_size == 0 {
            return Ok(Vec::new());
        }

        let data = self.source.read_at(
            entry.offset + HEADER_SIZE as u64,
            entry.compressed_size_aligned as usize,
        )?;
        inflate_exact(&data, entry.real_size as usize)
    }

    /// Look up an entry record without extracting it.
    pub fn entry(&self, raw_key: &str) -> Option<&Entry> {
        self.by_name.get(raw_key).map(|&i| &self.entries[i])
    }

    /// All addressable entries in table order. Restartable.
    pub fn iter_entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn version(&self) -> u32 {
        self.header.version
    }

    pub fn encoding(&self) -> NameEncoding {
        self.encoding
    }

    pub fn stats(&self) -> ArchiveStats {
        let mut extensions: BTreeMap<String, u64> = BTreeMap::new();
        for entry in &self.entries {
            if let Some(ext) = entry.extension() {
                *extensions.entry(ext).or_default() += 1;
            }
        }

        ArchiveStats {
            label: self.label.clone(),
            version: self.header.version,
            detected_encoding: self.encoding.as_str().to_owned(),
            total_entries: self.entries.len(),
            bad_names: self.entries.iter().filter(|e| e.has_bad_name).count(),
            skipped: self.skipped,
            parse_errors: self.parse_errors,
            extensions,
        }
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("label", &self.label)
            .field("version", &format_args!("{:#06x}", self.header.version))
            .field("encoding", &self.encoding)
            .field("entries", &self.entries.len())
            .finish()
    }
}
