//! Deep filename-encoding validator
//!
//! Walks every decoded filename across a set of archives, classifies the
//! damage (U+FFFD, C1 controls, mojibake, roundtrip failures), computes a
//! health score per archive, and produces the repair mapping that boot
//! later merges into the index.

use crate::archive::{Archive, OpenOptions};
use crate::encoding::{
    NameEncoding, count_c1, count_replacement, is_mojibake, repair, roundtrip_ok,
};
use crate::error::{GrfError, Result};
use crate::index::{GrfRepairSummary, RepairMap, RepairSummary};
use crate::manifest::read_manifest;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    /// Cap on entries inspected per archive (0 = all).
    pub read_limit: usize,
    /// Example paths kept per defect category.
    pub examples_limit: usize,
    /// Skip detection and decode under this encoding.
    pub encoding_override: Option<NameEncoding>,
    pub auto_detect_threshold: f64,
    pub scan_limit: usize,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            read_limit: 0,
            examples_limit: 5,
            encoding_override: None,
            auto_detect_threshold: 0.01,
            scan_limit: 0,
        }
    }
}

/// Sample paths per defect category, capped by `examples_limit`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectExamples {
    pub bad_ufffd: Vec<String>,
    pub bad_c1: Vec<String>,
    pub mojibake: Vec<String>,
    pub roundtrip_final_fail: Vec<String>,
}

/// Per-archive classification counters.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveValidation {
    pub file: String,
    pub detected_encoding: String,
    pub total_files: u64,
    pub bad_ufffd: u64,
    pub bad_c1: u64,
    pub mojibake: u64,
    pub roundtrip_raw_fail: u64,
    pub roundtrip_repairable: u64,
    pub roundtrip_final_fail: u64,
    pub health: f64,
    pub examples: DefectExamples,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadFailure {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationTotals {
    pub total_files: u64,
    pub bad_ufffd: u64,
    pub bad_c1: u64,
    pub mojibake: u64,
    pub roundtrip_raw_fail: u64,
    pub roundtrip_repairable: u64,
    pub roundtrip_final_fail: u64,
    pub health: f64,
}

/// The timestamped JSON report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub generated_at: String,
    pub archives: Vec<ArchiveValidation>,
    pub load_failures: Vec<LoadFailure>,
    pub totals: ValidationTotals,
    /// Roundtrip failures that repair could not explain away as U+FFFD
    /// damage; these escalate the exit code.
    #[serde(skip)]
    hard_final_fails: u64,
}

impl ValidationReport {
    /// 0 clean, 1 warnings only, 2 load failures or unexplained
    /// roundtrip failures.
    pub fn exit_code(&self) -> i32 {
        if !self.load_failures.is_empty() || self.hard_final_fails > 0 {
            2
        } else if self.totals.bad_ufffd > 0
            || self.totals.bad_c1 > 0
            || self.totals.mojibake > 0
            || self.totals.roundtrip_raw_fail > 0
        {
            1
        } else {
            0
        }
    }
}

/// Everything one validator invocation produces.
pub struct ValidationRun {
    pub report: ValidationReport,
    pub repair_map: RepairMap,
}

/// Archive paths named by `input`: either a directory of `.grf` files
/// (sorted) or a manifest resolving relative to its own directory.
pub fn collect_archive_paths(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_dir() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(input)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("grf"))
            })
            .collect();
        paths.sort();
        return Ok(paths);
    }

    let base = input.parent().unwrap_or_else(|| Path::new("."));
    let names = read_manifest(input)?;
    Ok(names.into_iter().map(|name| base.join(name)).collect())
}

/// Validate every archive reachable from `input`.
pub fn validate(input: &Path, options: &ValidatorOptions) -> Result<ValidationRun> {
    let paths = collect_archive_paths(input)?;
    if paths.is_empty() {
        return Err(GrfError::ManifestEmpty(input.to_path_buf()));
    }
    Ok(validate_paths(&paths, options))
}

/// Validate an explicit list of archives. Per-archive load failures are
/// accumulated, never fatal.
pub fn validate_paths(paths: &[PathBuf], options: &ValidatorOptions) -> ValidationRun {
    let open_options = OpenOptions {
        auto_detect_threshold: options.auto_detect_threshold,
        scan_limit: options.scan_limit,
        encoding_override: options.encoding_override,
    };

    let mut archives = Vec::new();
    let mut load_failures = Vec::new();
    let mut mapped_paths: HashMap<String, String> = HashMap::new();
    let mut grf_summaries = Vec::new();

    for path in paths {
        let archive = match Archive::open_path(path, &open_options) {
            Ok(archive) => archive,
            Err(e) => {
                load_failures.push(LoadFailure {
                    file: path.display().to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let (outcome, pairs) = validate_archive_inner(&archive, options);
        grf_summaries.push(GrfRepairSummary {
            file: path.display().to_string(),
            total_files: outcome.total_files,
            mapped: pairs.len() as u64,
            mojibake: outcome.mojibake,
            c1: outcome.bad_c1,
            detected_encoding: outcome.detected_encoding.clone(),
        });
        for (broken, canonical) in pairs {
            mapped_paths.entry(broken).or_insert(canonical);
        }
        archives.push(outcome);
    }

    let mut totals = ValidationTotals::default();
    let mut hard_final_fails = 0u64;
    for v in &archives {
        totals.total_files += v.total_files;
        totals.bad_ufffd += v.bad_ufffd;
        totals.bad_c1 += v.bad_c1;
        totals.mojibake += v.mojibake;
        totals.roundtrip_raw_fail += v.roundtrip_raw_fail;
        totals.roundtrip_repairable += v.roundtrip_repairable;
        totals.roundtrip_final_fail += v.roundtrip_final_fail;
        hard_final_fails += v.hard_final_fails;
    }
    totals.health = health_score(totals.total_files, totals.bad_ufffd, totals.bad_c1);

    let generated_at = Utc::now().to_rfc3339();
    let summary = RepairSummary {
        total_files: totals.total_files,
        total_mapped: mapped_paths.len() as u64,
        mojibake_fixed: archives.iter().map(|v| v.mojibake_fixed).sum(),
        c1_fixed: archives.iter().map(|v| v.c1_fixed).sum(),
    };

    info!(
        archives = archives.len(),
        failures = load_failures.len(),
        mapped = mapped_paths.len(),
        "validation finished"
    );

    ValidationRun {
        report: ValidationReport {
            generated_at: generated_at.clone(),
            archives: archives.iter().map(|v| v.validation.clone()).collect(),
            load_failures,
            totals,
            hard_final_fails,
        },
        repair_map: RepairMap {
            generated_at,
            grfs: grf_summaries,
            paths: mapped_paths,
            summary,
        },
    }
}

struct ArchiveOutcome {
    validation: ArchiveValidation,
    hard_final_fails: u64,
    mojibake_fixed: u64,
    c1_fixed: u64,
}

impl std::ops::Deref for ArchiveOutcome {
    type Target = ArchiveValidation;

    fn deref(&self) -> &ArchiveValidation {
        &self.validation
    }
}

/// Classify every decoded name of one archive.
pub fn validate_archive(
    archive: &Archive,
    options: &ValidatorOptions,
) -> (ArchiveValidation, Vec<(String, String)>) {
    let (outcome, pairs) = validate_archive_inner(archive, options);
    (outcome.validation, pairs)
}

fn validate_archive_inner(
    archive: &Archive,
    options: &ValidatorOptions,
) -> (ArchiveOutcome, Vec<(String, String)>) {
    // roundtrips check CP949 whenever detection ran: EUC-KR detection is
    // CP949's subset, and a utf8 verdict says nothing about how the
    // bytes were produced
    let roundtrip_encoding = match options.encoding_override {
        Some(NameEncoding::Utf8) => NameEncoding::Utf8,
        Some(NameEncoding::Latin1) => NameEncoding::Latin1,
        _ => NameEncoding::Cp949,
    };

    let mut v = ArchiveValidation {
        file: archive.label().to_owned(),
        detected_encoding: archive.encoding().as_str().to_owned(),
        ..ArchiveValidation::default()
    };
    let mut pairs = Vec::new();
    let mut hard_final_fails = 0u64;
    let mut mojibake_fixed = 0u64;
    let mut c1_fixed = 0u64;

    for entry in archive.iter_entries() {
        if options.read_limit > 0 && v.total_files as usize >= options.read_limit {
            break;
        }
        v.total_files += 1;

        let name = entry.name.as_str();
        let has_ufffd = count_replacement(name) > 0;
        let has_c1 = count_c1(name) > 0;
        let moji = is_mojibake(name);
        let raw_ok = roundtrip_ok(name, roundtrip_encoding);

        if has_ufffd {
            v.bad_ufffd += 1;
            push_example(&mut v.examples.bad_ufffd, options.examples_limit, name);
        }
        if has_c1 {
            v.bad_c1 += 1;
            push_example(&mut v.examples.bad_c1, options.examples_limit, name);
        }
        if moji {
            v.mojibake += 1;
            push_example(&mut v.examples.mojibake, options.examples_limit, name);
        }

        let mut repaired_to = None;
        if !raw_ok || moji || has_c1 {
            let fixed = repair(name);
            if fixed != name
                && count_replacement(&fixed) == 0
                && roundtrip_ok(&fixed, roundtrip_encoding)
            {
                debug!(broken = %name, canonical = %fixed, "name is repairable");
                repaired_to = Some(fixed);
            }
        }

        if !raw_ok {
            v.roundtrip_raw_fail += 1;
            if repaired_to.is_some() {
                v.roundtrip_repairable += 1;
            } else {
                v.roundtrip_final_fail += 1;
                if !has_ufffd {
                    hard_final_fails += 1;
                }
                push_example(
                    &mut v.examples.roundtrip_final_fail,
                    options.examples_limit,
                    name,
                );
            }
        }

        if let Some(fixed) = repaired_to {
            if moji {
                mojibake_fixed += 1;
            } else if has_c1 {
                c1_fixed += 1;
            }
            pairs.push((name.to_owned(), fixed));
        }
    }

    v.health = health_score(v.total_files, v.bad_ufffd, v.bad_c1);

    (
        ArchiveOutcome {
            validation: v,
            hard_final_fails,
            mojibake_fixed,
            c1_fixed,
        },
        pairs,
    )
}

fn health_score(total: u64, bad_ufffd: u64, bad_c1: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (total.saturating_sub(bad_ufffd).saturating_sub(bad_c1)) as f64 / total as f64
}

fn push_example(examples: &mut Vec<String>, limit: usize, name: &str) {
    if examples.len() < limit {
        examples.push(name.to_owned());
    }
}
