//! Unified cross-archive path index
//!
//! Archives are ingested in manifest order, which is priority order: the
//! first archive to claim a normalized key wins, and later claims are
//! counted as collisions without overwriting. Read-only after boot.

use super::{backslash_alias, normalize_path};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, trace};

/// Where a normalized key points: the owning archive and the raw key to
/// hand that archive back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub archive_id: u16,
    pub raw_key: String,
    /// Original broken spelling, when the key came in through the repair
    /// mapping.
    pub mapped_from: Option<String>,
}

/// Outcome of a lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution<'a> {
    Found(&'a IndexEntry),
    NotFound,
    /// Only reachable when the index was augmented with an explicit
    /// multi-candidate source; ordinary ingestion masks collisions.
    Ambiguous(Vec<&'a IndexEntry>),
}

enum Slot {
    Single(IndexEntry),
    Multi(Vec<IndexEntry>),
}

impl Slot {
    fn resolution(&self) -> Resolution<'_> {
        match self {
            Slot::Single(entry) => Resolution::Found(entry),
            Slot::Multi(entries) => Resolution::Ambiguous(entries.iter().collect()),
        }
    }

    fn winner(&self) -> &IndexEntry {
        match self {
            Slot::Single(entry) => entry,
            Slot::Multi(entries) => &entries[0],
        }
    }
}

/// Snapshot of index counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub keys: usize,
    pub originals: usize,
    pub collisions: u64,
    pub mapped: u64,
}

#[derive(Default)]
pub struct UnifiedIndex {
    map: HashMap<String, Slot>,
    collisions: u64,
    mapped: u64,
}

impl UnifiedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest every entry of an archive under its normalized key and its
    /// Windows-style backslash alias.
    pub fn ingest_archive<'a>(
        &mut self,
        archive_id: u16,
        names: impl IntoIterator<Item = &'a str>,
    ) {
        let mut added = 0usize;
        for raw_key in names {
            if self.insert_normalized(normalize_path(raw_key), archive_id, raw_key) {
                added += 1;
            }
            self.insert_alias(backslash_alias(raw_key), archive_id, raw_key);
        }
        info!(archive_id, added, "ingested archive into index");
    }

    /// Insert under the canonical key, counting a collision when the key
    /// is already claimed. Returns whether the entry won the key.
    fn insert_normalized(&mut self, key: String, archive_id: u16, raw_key: &str) -> bool {
        use std::collections::hash_map::Entry;
        match self.map.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(Slot::Single(IndexEntry {
                    archive_id,
                    raw_key: raw_key.to_owned(),
                    mapped_from: None,
                }));
                true
            }
            Entry::Occupied(slot) => {
                trace!(key = %slot.key(), archive_id, "index collision, first insert wins");
                self.collisions += 1;
                false
            }
        }
    }

    /// Insert a secondary spelling. Losing the key is not a collision:
    /// the canonical insert already counted it.
    fn insert_alias(&mut self, key: String, archive_id: u16, raw_key: &str) {
        self.map.entry(key).or_insert_with(|| {
            Slot::Single(IndexEntry {
                archive_id,
                raw_key: raw_key.to_owned(),
                mapped_from: None,
            })
        });
    }

    /// Register an explicit set of equally-plausible candidates for a
    /// key. Lookups of that key then report `Ambiguous`.
    pub fn insert_candidates(&mut self, key: &str, candidates: Vec<IndexEntry>) {
        if candidates.is_empty() {
            return;
        }
        self.map
            .insert(normalize_path(key), Slot::Multi(candidates));
    }

    /// Merge the repair mapping: every broken spelling whose canonical
    /// form resolves becomes an alias of the same entry.
    pub fn merge_repair_paths<'a>(
        &mut self,
        paths: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let mut merged = 0usize;
        for (broken, canonical) in paths {
            let Some(slot) = self.map.get(&normalize_path(canonical)) else {
                debug!(broken, canonical, "repair target not in index, skipped");
                continue;
            };
            let mut entry = slot.winner().clone();
            entry.mapped_from = Some(broken.to_owned());

            use std::collections::hash_map::Entry;
            if let Entry::Vacant(v) = self.map.entry(normalize_path(broken)) {
                v.insert(Slot::Single(entry));
                self.mapped += 1;
                merged += 1;
            }
        }
        info!(merged, "merged repair mapping into index");
    }

    /// Look a path up under its normalized form, then under the
    /// Windows-style alias form.
    pub fn resolve(&self, path: &str) -> Resolution<'_> {
        if let Some(slot) = self.map.get(&normalize_path(path)) {
            return slot.resolution();
        }
        if let Some(slot) = self.map.get(&backslash_alias(path)) {
            return slot.resolution();
        }
        Resolution::NotFound
    }

    /// Unique original raw keys across all winning entries, sorted.
    pub fn originals(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .map
            .values()
            .map(|slot| slot.winner().raw_key.as_str())
            .collect();
        set.into_iter().map(str::to_owned).collect()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            keys: self.map.len(),
            originals: self.originals().len(),
            collisions: self.collisions,
            mapped: self.mapped,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found_in<'a>(index: &'a UnifiedIndex, path: &str) -> &'a IndexEntry {
        match index.resolve(path) {
            Resolution::Found(entry) => entry,
            other => panic!("expected Found for {path:?}, got {other:?}"),
        }
    }

    #[test]
    fn indexed_keys_resolve_under_any_spelling() {
        let mut index = UnifiedIndex::new();
        index.ingest_archive(0, ["data/texture/foo.bmp"]);

        for spelling in [
            "data/texture/foo.bmp",
            "DATA/TEXTURE/FOO.BMP",
            "data\\texture\\foo.bmp",
            "data\\\\texture/foo.bmp",
        ] {
            let entry = found_in(&index, spelling);
            assert_eq!(entry.archive_id, 0);
            assert_eq!(entry.raw_key, "data/texture/foo.bmp");
        }
    }

    #[test]
    fn first_archive_wins_and_collision_is_counted_once() {
        let mut index = UnifiedIndex::new();
        index.ingest_archive(0, ["data/mon.spr"]);
        index.ingest_archive(1, ["data/mon.spr"]);

        assert_eq!(found_in(&index, "data/mon.spr").archive_id, 0);
        assert_eq!(index.stats().collisions, 1);
    }

    #[test]
    fn unknown_path_is_not_found() {
        let mut index = UnifiedIndex::new();
        index.ingest_archive(0, ["data/a.txt"]);
        assert_eq!(index.resolve("data/b.txt"), Resolution::NotFound);
    }

    #[test]
    fn repair_paths_alias_the_canonical_entry() {
        let mut index = UnifiedIndex::new();
        index.ingest_archive(0, ["유저인터페이스/t.bmp"]);
        index.merge_repair_paths([("À¯ÀúÀÎÅÍÆäÀÌ½º/t.bmp", "유저인터페이스/t.bmp")]);

        let entry = found_in(&index, "À¯ÀúÀÎÅÍÆäÀÌ½º/t.bmp");
        assert_eq!(entry.raw_key, "유저인터페이스/t.bmp");
        assert_eq!(
            entry.mapped_from.as_deref(),
            Some("À¯ÀúÀÎÅÍÆäÀÌ½º/t.bmp")
        );
        assert_eq!(index.stats().mapped, 1);
    }

    #[test]
    fn repair_paths_without_canonical_target_are_skipped() {
        let mut index = UnifiedIndex::new();
        index.ingest_archive(0, ["data/a.txt"]);
        index.merge_repair_paths([("broken", "data/gone.txt")]);
        assert_eq!(index.resolve("broken"), Resolution::NotFound);
        assert_eq!(index.stats().mapped, 0);
    }

    #[test]
    fn explicit_candidates_resolve_ambiguous() {
        let mut index = UnifiedIndex::new();
        index.insert_candidates(
            "data/dup.txt",
            vec![
                IndexEntry {
                    archive_id: 0,
                    raw_key: "data/dup.txt".into(),
                    mapped_from: None,
                },
                IndexEntry {
                    archive_id: 1,
                    raw_key: "data/dup.txt".into(),
                    mapped_from: None,
                },
            ],
        );

        match index.resolve("DATA\\dup.txt") {
            Resolution::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected Ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn originals_are_unique() {
        let mut index = UnifiedIndex::new();
        index.ingest_archive(0, ["data/a.txt", "data/b.txt"]);
        index.ingest_archive(1, ["data/a.txt"]);
        assert_eq!(index.originals(), vec!["data/a.txt", "data/b.txt"]);
    }
}
