//! Cross-archive path index and the mojibake repair mapping

mod repair_map;
mod unified_index;

pub use repair_map::{GrfRepairSummary, RepairLookup, RepairMap, RepairSummary};
pub use unified_index::{IndexEntry, IndexStats, Resolution, UnifiedIndex};

use unicode_normalization::UnicodeNormalization;

/// Canonical lookup form of a path: runs of `/` or `\` collapse to a
/// single `/`, ASCII characters are lowercased, and the result is Unicode
/// NFC. Two raw paths with equal normalization collide by design.
pub fn normalize_path(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut prev_separator = false;

    for c in path.chars() {
        if c == '/' || c == '\\' {
            if !prev_separator {
                collapsed.push('/');
            }
            prev_separator = true;
        } else {
            collapsed.push(c.to_ascii_lowercase());
            prev_separator = false;
        }
    }

    collapsed.nfc().collect()
}

/// The ad-hoc Windows-style alias: lowercased, forward slashes flipped to
/// backslashes, no collapsing and no NFC.
pub(crate) fn backslash_alias(path: &str) -> String {
    path.to_ascii_lowercase().replace('/', "\\")
}
