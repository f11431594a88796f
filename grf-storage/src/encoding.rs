//! Byte-string decoding and repair for archive filenames
//!
//! Legacy archives carry CP949 (EUC-KR superset) filenames. Depending on
//! which tool last touched an archive, a name may arrive as clean UTF-8,
//! raw CP949 bytes, or "mojibake": CP949 bytes that were reinterpreted as
//! Latin-1 somewhere upstream, each byte widened to a U+0080..U+00FF code
//! point. This module decodes under a chosen encoding, detects the damage
//! classes, and repairs what can be repaired.

use crate::error::{GrfError, Result};
use encoding_rs::EUC_KR;
use std::fmt;
use std::str::FromStr;

/// Encoding used to decode raw filename bytes.
///
/// `EucKr` is kept as a distinct label but decodes through the CP949
/// tables: CP949 is a strict superset and tolerates the extension rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameEncoding {
    Utf8,
    Cp949,
    EucKr,
    Latin1,
    /// No addressable entries were available to inspect.
    Unknown,
}

impl NameEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            NameEncoding::Utf8 => "utf8",
            NameEncoding::Cp949 => "cp949",
            NameEncoding::EucKr => "euckr",
            NameEncoding::Latin1 => "latin1",
            NameEncoding::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NameEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NameEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(NameEncoding::Utf8),
            "cp949" | "windows-949" | "uhc" => Ok(NameEncoding::Cp949),
            "euckr" | "euc-kr" => Ok(NameEncoding::EucKr),
            "latin1" | "iso-8859-1" => Ok(NameEncoding::Latin1),
            other => Err(format!("unknown encoding: {other}")),
        }
    }
}

/// Decode a byte slice under `encoding`.
///
/// UTF-8 is strict and fails on any ill-formed sequence. CP949/EUC-KR is
/// tolerant: invalid sequences decode to U+FFFD and are flagged downstream.
/// Latin-1 maps every byte to the identical code point, C1 controls
/// included (the WHATWG "latin1" label aliases windows-1252, which would
/// destroy exactly the C1 bytes the repair path needs, so it is mapped by
/// hand).
pub fn decode(bytes: &[u8], encoding: NameEncoding) -> Result<String> {
    match encoding {
        NameEncoding::Utf8 => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| GrfError::InvalidUtf8),
        NameEncoding::Cp949 | NameEncoding::EucKr | NameEncoding::Unknown => {
            let (decoded, _) = EUC_KR.decode_without_bom_handling(bytes);
            Ok(decoded.into_owned())
        }
        NameEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Tolerant variant of [`decode`]: ill-formed UTF-8 decodes with U+FFFD
/// instead of failing. Used when walking a file table whose encoding has
/// already been chosen.
pub fn decode_lossy(bytes: &[u8], encoding: NameEncoding) -> String {
    match encoding {
        NameEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        _ => match decode(bytes, encoding) {
            Ok(s) => s,
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        },
    }
}

/// Strict UTF-8 validity check with an ASCII fast path.
pub fn is_utf8(bytes: &[u8]) -> bool {
    bytes.is_ascii() || std::str::from_utf8(bytes).is_ok()
}

/// Number of U+FFFD replacement characters in `s`.
pub fn count_replacement(s: &str) -> usize {
    s.chars().filter(|&c| c == '\u{FFFD}').count()
}

/// Number of C1 control code points (U+0080..U+009F) in `s`.
pub fn count_c1(s: &str) -> usize {
    s.chars().filter(|&c| ('\u{80}'..='\u{9F}').contains(&c)).count()
}

/// Number of Hangul syllables (U+AC00..U+D7A3) in `s`.
pub fn count_hangul(s: &str) -> usize {
    s.chars()
        .filter(|&c| ('\u{AC00}'..='\u{D7A3}').contains(&c))
        .count()
}

/// Whether `s` looks like CP949 bytes reinterpreted as Latin-1.
///
/// Every non-ASCII code point must sit in U+00A0..U+00FF (standard EUC-KR
/// lead and trail bytes land there; C1-range code points mean a different
/// damage class), there must be at least one byte pair's worth of them,
/// no Hangul, and at least half must be in the accented-letter block that
/// reinterpreted Hangul syllable bytes concentrate in.
pub fn is_mojibake(s: &str) -> bool {
    let mut extended = 0usize;
    let mut accented = 0usize;

    for c in s.chars() {
        let cp = c as u32;
        if cp < 0x80 {
            continue;
        }
        if !(0xA0..=0xFF).contains(&cp) {
            return false;
        }
        extended += 1;
        if cp >= 0xC0 {
            accented += 1;
        }
    }

    extended >= 2 && accented * 2 >= extended
}

/// Narrow every code point of `s` to a byte, or `None` if any is above
/// U+00FF.
fn narrow_to_bytes(s: &str) -> Option<Vec<u8>> {
    s.chars()
        .map(|c| {
            let cp = c as u32;
            (cp <= 0xFF).then_some(cp as u8)
        })
        .collect()
}

/// Reinterpret the code points of `s` as raw bytes and decode them as
/// CP949. Returns `s` unchanged when any code point is above U+00FF or the
/// CP949 decode is not clean.
pub fn fix_mojibake(s: &str) -> String {
    let Some(bytes) = narrow_to_bytes(s) else {
        return s.to_owned();
    };
    let (decoded, had_errors) = EUC_KR.decode_without_bom_handling(&bytes);
    if had_errors {
        return s.to_owned();
    }
    decoded.into_owned()
}

/// Repair a path segment whose leading run of narrow code points hides a
/// CP949 sequence. The repaired form is accepted only when it strictly
/// decreases the C1 count without introducing new U+FFFD.
pub fn fix_c1_prefix(segment: &str) -> String {
    let prefix: Vec<char> = segment
        .chars()
        .take_while(|&c| (c as u32) <= 0xFF)
        .collect();
    if !prefix.iter().any(|&c| (c as u32) >= 0x80) {
        return segment.to_owned();
    }

    let bytes: Vec<u8> = prefix.iter().map(|&c| c as u32 as u8).collect();
    let tail: String = segment.chars().skip(prefix.len()).collect();

    let (decoded, had_errors) = EUC_KR.decode_without_bom_handling(&bytes);
    if had_errors {
        return segment.to_owned();
    }

    let candidate = format!("{decoded}{tail}");
    if count_c1(&candidate) < count_c1(segment)
        && count_replacement(&candidate) <= count_replacement(segment)
    {
        candidate
    } else {
        segment.to_owned()
    }
}

/// Repair a full path: un-mojibake the whole string, then attempt a
/// C1-prefix repair on each `/`-separated segment.
pub fn repair(name: &str) -> String {
    let fixed = fix_mojibake(name);
    fixed
        .split('/')
        .map(fix_c1_prefix)
        .collect::<Vec<_>>()
        .join("/")
}

/// `decode(encode(s)) == s` under `encoding`.
pub fn roundtrip_ok(s: &str, encoding: NameEncoding) -> bool {
    match encoding {
        NameEncoding::Utf8 => true,
        NameEncoding::Latin1 => s.chars().all(|c| (c as u32) <= 0xFF),
        NameEncoding::Cp949 | NameEncoding::EucKr | NameEncoding::Unknown => {
            let (bytes, _, enc_errors) = EUC_KR.encode(s);
            if enc_errors {
                return false;
            }
            let (back, dec_errors) = EUC_KR.decode_without_bom_handling(&bytes);
            !dec_errors && back == s
        }
    }
}

/// Choose an encoding for an archive by sampling raw names.
///
/// Names are checked for strict UTF-8 validity; when the invalid fraction
/// among inspected names exceeds `threshold`, CP949 is selected.
/// `scan_limit` caps inspection (0 means all). With nothing to inspect the
/// result is [`NameEncoding::Unknown`].
pub fn detect_encoding<'a, I>(names: I, threshold: f64, scan_limit: usize) -> NameEncoding
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut inspected = 0usize;
    let mut invalid = 0usize;

    for raw in names {
        if scan_limit > 0 && inspected >= scan_limit {
            break;
        }
        inspected += 1;
        if !is_utf8(raw) {
            invalid += 1;
        }
    }

    if inspected == 0 {
        NameEncoding::Unknown
    } else if invalid as f64 / inspected as f64 > threshold {
        NameEncoding::Cp949
    } else {
        NameEncoding::Utf8
    }
}
