//! Archive manifest (`DATA.INI`) parsing
//!
//! An INI-like file where only the `[data]` section matters. Entries are
//! `<integer> = <filename>.grf`; the file order is the archive priority
//! order, so numbered keys are validated but otherwise ignored and the
//! values are kept as an ordered, de-duplicated list.

use crate::error::{GrfError, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// Read the manifest at `path` into an ordered list of archive names.
pub fn read_manifest(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(GrfError::ManifestMissing(path.to_path_buf()));
    }
    let file = File::open(path)?;
    parse_manifest(BufReader::new(file), path)
}

fn parse_manifest<R: BufRead>(reader: R, origin: &Path) -> Result<Vec<String>> {
    let mut in_data = false;
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = match line.find([';', '#']) {
            Some(pos) => &line[..pos],
            None => line.as_str(),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') {
            in_data = line.eq_ignore_ascii_case("[data]");
            continue;
        }
        if !in_data {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            warn!(origin = %origin.display(), line, "manifest line without '=', skipped");
            continue;
        };
        if key.trim().parse::<u32>().is_err() {
            warn!(origin = %origin.display(), line, "manifest key is not an integer, skipped");
            continue;
        }

        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if seen.insert(value.to_ascii_lowercase()) {
            names.push(value.to_owned());
        } else {
            debug!(origin = %origin.display(), value, "duplicate manifest entry removed");
        }
    }

    if names.is_empty() {
        return Err(GrfError::ManifestEmpty(origin.to_path_buf()));
    }
    Ok(names)
}
