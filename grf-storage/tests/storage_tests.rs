mod common;

use common::{GrfBuilder, cp949, mojibake, write_manifest};
use grf_storage::config::{ExtractConfig, StorageConfig};
use grf_storage::error::GrfError;
use grf_storage::index::{RepairMap, RepairSummary};
use grf_storage::storage::GrfStorage;
use regex::Regex;
use std::collections::HashMap;

fn small_cache_config() -> StorageConfig {
    let mut config = StorageConfig::default();
    config.cache.max_entries = 16;
    config.cache.max_memory_mb = 1;
    config
}

#[test]
fn fetch_resolves_across_spellings_and_caches() {
    let dir = tempfile::tempdir().unwrap();
    let image = GrfBuilder::new().file("data\\foo.txt", b"hello").build();
    let manifest = write_manifest(dir.path(), &[("a.grf", image)]);

    let storage = GrfStorage::load(&manifest, small_cache_config()).unwrap();

    assert_eq!(storage.fetch("data/foo.txt").unwrap().as_slice(), b"hello");
    assert_eq!(storage.fetch("DATA\\FOO.TXT").unwrap().as_slice(), b"hello");

    let stats = storage.stats();
    assert_eq!(stats.cache.misses, 1);
    assert_eq!(stats.cache.hits, 1);
}

#[test]
fn unknown_path_is_recorded_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let image = GrfBuilder::new().file("data\\foo.txt", b"hello").build();
    let manifest = write_manifest(dir.path(), &[("a.grf", image)]);

    let storage = GrfStorage::load(&manifest, small_cache_config()).unwrap();

    assert!(storage.fetch("data/nope.txt").is_none());
    let missing = storage.stats().missing;
    assert_eq!(missing.total, 1);
    assert_eq!(missing.last_path.as_deref(), Some("data/nope.txt"));
}

#[test]
fn earlier_archive_wins_collisions() {
    let dir = tempfile::tempdir().unwrap();
    let first = GrfBuilder::new().file("data\\mon.spr", b"from a").build();
    let second = GrfBuilder::new().file("data\\mon.spr", b"from b").build();
    let manifest = write_manifest(dir.path(), &[("a.grf", first), ("b.grf", second)]);

    let storage = GrfStorage::load(&manifest, small_cache_config()).unwrap();

    assert_eq!(storage.fetch("data/mon.spr").unwrap().as_slice(), b"from a");
    assert_eq!(storage.stats().index.collisions, 1);
}

#[test]
fn korean_names_resolve_and_mojibake_needs_the_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let mut raw = cp949("유저인터페이스");
    raw.extend_from_slice(b"\\t.bmp");
    let image = GrfBuilder::new().raw_file(raw, b"bitmap").build();
    let manifest = write_manifest(dir.path(), &[("kr.grf", image)]);

    let broken = format!("{}/t.bmp", mojibake("유저인터페이스"));

    // without a repair mapping the broken spelling stays unresolved
    let storage = GrfStorage::load(&manifest, small_cache_config()).unwrap();
    assert!(storage.fetch("유저인터페이스/t.bmp").is_some());
    assert!(storage.fetch(&broken).is_none());
    drop(storage);

    let mapping = RepairMap {
        generated_at: "2024-01-01T00:00:00Z".into(),
        grfs: Vec::new(),
        paths: HashMap::from([(broken.clone(), "유저인터페이스\\t.bmp".to_owned())]),
        summary: RepairSummary::default(),
    };
    mapping.save(&dir.path().join("path-mapping.json")).unwrap();

    let storage = GrfStorage::load(&manifest, small_cache_config()).unwrap();
    assert_eq!(storage.fetch(&broken).unwrap().as_slice(), b"bitmap");
    assert_eq!(storage.stats().index.mapped, 1);
}

#[test]
fn broken_archives_are_skipped_but_boot_survives() {
    let dir = tempfile::tempdir().unwrap();
    let good = GrfBuilder::new().file("data\\ok.txt", b"fine").build();
    let manifest = write_manifest(
        dir.path(),
        &[("bad.grf", b"not a grf at all".to_vec()), ("good.grf", good)],
    );

    let storage = GrfStorage::load(&manifest, small_cache_config()).unwrap();
    assert_eq!(storage.archives().len(), 1);
    assert!(storage.fetch("data/ok.txt").is_some());
}

#[test]
fn boot_fails_when_nothing_loads() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write_manifest(dir.path(), &[("bad.grf", vec![0u8; 16])]);

    assert!(matches!(
        GrfStorage::load(&manifest, small_cache_config()),
        Err(GrfError::NoArchives(1))
    ));
}

#[test]
fn boot_fails_without_manifest() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        GrfStorage::load(&dir.path().join("DATA.INI"), StorageConfig::default()),
        Err(GrfError::ManifestMissing(_))
    ));
}

#[test]
fn manifest_entries_pointing_nowhere_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let good = GrfBuilder::new().file("data\\ok.txt", b"fine").build();
    std::fs::write(dir.path().join("good.grf"), &good).unwrap();
    let manifest = dir.path().join("DATA.INI");
    std::fs::write(&manifest, "[data]\n0=ghost.grf\n1=good.grf\n").unwrap();

    let storage = GrfStorage::load(&manifest, small_cache_config()).unwrap();
    assert_eq!(storage.archives().len(), 1);
}

#[test]
fn list_and_search_cover_the_index() {
    let dir = tempfile::tempdir().unwrap();
    let image = GrfBuilder::new()
        .file("data\\mon.spr", b"1")
        .file("data\\mon.act", b"2")
        .file("texture\\wall.bmp", b"3")
        .build();
    let manifest = write_manifest(dir.path(), &[("a.grf", image)]);

    let storage = GrfStorage::load(&manifest, small_cache_config()).unwrap();

    let all = storage.list();
    assert_eq!(all.len(), 3);
    assert!(all.contains(&"data\\mon.spr".to_owned()));

    let sprites = storage.search(&Regex::new(r"(?i)\.spr$").unwrap());
    assert_eq!(sprites, vec!["data\\mon.spr"]);
}

#[test]
fn mirror_write_through_and_probe() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = dir.path().join("mirror");
    let image = GrfBuilder::new().file("data\\foo.txt", b"hello").build();
    let manifest = write_manifest(dir.path(), &[("a.grf", image)]);

    let mut config = small_cache_config();
    config.extract = ExtractConfig { enabled: true };
    config.mirror_dir = Some(mirror.clone());

    let storage = GrfStorage::load(&manifest, config).unwrap();

    // fetch writes the extracted bytes through to the mirror
    assert!(storage.fetch("DATA\\foo.txt").is_some());
    assert_eq!(
        std::fs::read(mirror.join("data/foo.txt")).unwrap(),
        b"hello"
    );

    // a file that exists only in the mirror is served from it
    std::fs::write(mirror.join("data/pre.txt"), b"mirrored").unwrap();
    assert_eq!(storage.fetch("data/pre.txt").unwrap().as_slice(), b"mirrored");
}

#[test]
fn mirror_never_escapes_its_root() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = dir.path().join("mirror");
    std::fs::create_dir_all(&mirror).unwrap();

    // one entry whose decoded name is an absolute path
    let image = GrfBuilder::new()
        .file("/sneaky-mirror-escape.txt", b"payload")
        .file("data\\ok.txt", b"fine")
        .build();
    let manifest = write_manifest(dir.path(), &[("a.grf", image)]);

    let mut config = small_cache_config();
    config.extract = ExtractConfig { enabled: true };
    config.mirror_dir = Some(mirror.clone());
    let storage = GrfStorage::load(&manifest, config).unwrap();

    // an absolute request must not read through the mirror probe
    assert!(storage.fetch("/etc/passwd").is_none());

    // the absolute-named entry still serves, but is never mirrored
    assert_eq!(
        storage.fetch("/sneaky-mirror-escape.txt").unwrap().as_slice(),
        b"payload"
    );
    assert!(!std::path::Path::new("/sneaky-mirror-escape.txt").exists());
    assert!(!mirror.join("sneaky-mirror-escape.txt").exists());

    // a parent-directory request cannot climb out either
    assert!(storage.fetch("../escape.txt").is_none());
    assert!(!dir.path().join("escape.txt").exists());
}

#[test]
fn validator_mapping_feeds_the_resolver() {
    use grf_storage::validator::{self, ValidatorOptions};

    // a legacy mirror whose names were mojibake-mangled in transit
    let legacy_dir = tempfile::tempdir().unwrap();
    let broken = format!("{}\\t.bmp", mojibake("유저인터페이스"));
    let legacy = GrfBuilder::new().file(&broken, b"old bytes").build();
    std::fs::write(legacy_dir.path().join("legacy.grf"), legacy).unwrap();

    let run = validator::validate(legacy_dir.path(), &ValidatorOptions::default()).unwrap();
    assert_eq!(run.repair_map.summary.total_mapped, 1);

    // serve from the repaired archive, with the validator's mapping
    let serve_dir = tempfile::tempdir().unwrap();
    let mut raw = cp949("유저인터페이스");
    raw.extend_from_slice(b"\\t.bmp");
    let repaired = GrfBuilder::new().raw_file(raw, b"new bytes").build();
    let manifest = write_manifest(serve_dir.path(), &[("kr.grf", repaired)]);
    run.repair_map
        .save(&serve_dir.path().join("path-mapping.json"))
        .unwrap();

    let storage = GrfStorage::load(&manifest, small_cache_config()).unwrap();
    // clients still asking with the mangled spelling reach the repaired
    // entry
    assert_eq!(storage.fetch(&broken).unwrap().as_slice(), b"new bytes");
}

#[test]
fn concurrent_fetches_agree() {
    use std::sync::Arc;
    use std::thread;

    let dir = tempfile::tempdir().unwrap();
    let mut builder = GrfBuilder::new();
    for i in 0..16 {
        builder = builder.file(&format!("data\\file{i}.bin"), format!("body {i}").as_bytes());
    }
    let manifest = write_manifest(dir.path(), &[("a.grf", builder.build())]);

    let storage = Arc::new(GrfStorage::load(&manifest, small_cache_config()).unwrap());
    let mut handles = Vec::new();
    for t in 0..8 {
        let storage = Arc::clone(&storage);
        handles.push(thread::spawn(move || {
            for round in 0..50 {
                let i = (t + round) % 16;
                let body = storage.fetch(&format!("data/file{i}.bin")).unwrap();
                assert_eq!(body.as_slice(), format!("body {i}").as_bytes());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = storage.stats();
    assert!(stats.cache.hits > 0);
    assert!(stats.cache.entries <= 16);
}
