//! Persisted path-repair mapping
//!
//! The deep validator writes this document; boot loads it and feeds the
//! `paths` table into the index so broken spellings resolve to their
//! canonical Korean forms.

use super::normalize_path;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Per-archive counters recorded alongside the mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrfRepairSummary {
    pub file: String,
    pub total_files: u64,
    pub mapped: u64,
    pub mojibake: u64,
    pub c1: u64,
    pub detected_encoding: String,
}

/// Whole-run counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairSummary {
    pub total_files: u64,
    pub total_mapped: u64,
    pub mojibake_fixed: u64,
    pub c1_fixed: u64,
}

/// The `path-mapping.json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairMap {
    pub generated_at: String,
    pub grfs: Vec<GrfRepairSummary>,
    /// Broken (mojibake or C1-bearing) path → canonical path.
    pub paths: HashMap<String, String>,
    pub summary: RepairSummary,
}

impl RepairMap {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let map: RepairMap = serde_json::from_reader(BufReader::new(file))?;
        info!(
            path = %path.display(),
            paths = map.paths.len(),
            "loaded repair mapping"
        );
        Ok(map)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        info!(path = %path.display(), paths = self.paths.len(), "wrote repair mapping");
        Ok(())
    }
}

/// Normalized two-way view over a repair mapping, used by the resolver to
/// find the alternate spelling of a missed path.
pub struct RepairLookup {
    broken_to_canonical: HashMap<String, String>,
    canonical_to_broken: HashMap<String, String>,
}

impl RepairLookup {
    pub fn new(map: &RepairMap) -> Self {
        let mut broken_to_canonical = HashMap::with_capacity(map.paths.len());
        let mut canonical_to_broken = HashMap::with_capacity(map.paths.len());
        for (broken, canonical) in &map.paths {
            broken_to_canonical.insert(normalize_path(broken), canonical.clone());
            canonical_to_broken.insert(normalize_path(canonical), broken.clone());
        }
        Self {
            broken_to_canonical,
            canonical_to_broken,
        }
    }

    /// The other spelling of `path`, whichever direction applies.
    pub fn alternate_for(&self, path: &str) -> Option<&str> {
        let key = normalize_path(path);
        self.broken_to_canonical
            .get(&key)
            .or_else(|| self.canonical_to_broken.get(&key))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.broken_to_canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.broken_to_canonical.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RepairMap {
        RepairMap {
            generated_at: "2024-01-01T00:00:00Z".into(),
            grfs: vec![GrfRepairSummary {
                file: "a.grf".into(),
                total_files: 10,
                mapped: 1,
                mojibake: 1,
                c1: 0,
                detected_encoding: "cp949".into(),
            }],
            paths: HashMap::from([(
                "À¯ÀúÀÎÅÍÆäÀÌ½º/t.bmp".to_owned(),
                "유저인터페이스/t.bmp".to_owned(),
            )]),
            summary: RepairSummary {
                total_files: 10,
                total_mapped: 1,
                mojibake_fixed: 1,
                c1_fixed: 0,
            },
        }
    }

    #[test]
    fn roundtrips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("path-mapping.json");
        sample().save(&path).unwrap();

        let loaded = RepairMap::load(&path).unwrap();
        assert_eq!(loaded.summary.total_mapped, 1);
        assert_eq!(
            loaded.paths.get("À¯ÀúÀÎÅÍÆäÀÌ½º/t.bmp").map(String::as_str),
            Some("유저인터페이스/t.bmp")
        );
    }

    #[test]
    fn serializes_spec_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("generatedAt").is_some());
        assert!(json["summary"].get("totalMapped").is_some());
        assert!(json["grfs"][0].get("detectedEncoding").is_some());
    }

    #[test]
    fn lookup_goes_both_ways() {
        let lookup = RepairLookup::new(&sample());
        assert_eq!(
            lookup.alternate_for("À¯ÀúÀÎÅÍÆäÀÌ½º/t.bmp"),
            Some("유저인터페이스/t.bmp")
        );
        assert_eq!(
            lookup.alternate_for("유저인터페이스\\T.BMP"),
            Some("À¯ÀúÀÎÅÍÆäÀÌ½º/t.bmp")
        );
        assert_eq!(lookup.alternate_for("data/other.txt"), None);
    }
}
