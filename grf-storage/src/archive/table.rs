//! File table parsing
//!
//! The central table is one zlib stream of packed entries:
//! `name\0 | compSize u32 | compAligned u32 | realSize u32 | flags u8 |
//! offset u32|u64`. Version 0x200 always stores 32-bit offsets. Version
//! 0x300 archives exist in both widths in the wild, so the table is
//! walked once per layout and the better-scoring parse wins.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use tracing::debug;

/// Entry flag: set for real files, clear for directories/placeholders.
pub const FLAG_FILE: u8 = 0x01;
/// Legacy per-entry encryption variants. Neither is supported.
pub const FLAG_MIXCRYPT: u8 = 0x02;
pub const FLAG_DES_HEADER: u8 = 0x04;

/// One addressable file inside an archive.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Name bytes exactly as stored in the table.
    pub raw_name: Vec<u8>,
    /// Name decoded under the archive's detected encoding.
    pub name: String,
    pub compressed_size: u32,
    pub compressed_size_aligned: u32,
    pub real_size: u32,
    pub flags: u8,
    /// Offset relative to the end of the 46-byte header.
    pub offset: u64,
    /// The decoded name contains U+FFFD; still indexed, but flagged.
    pub has_bad_name: bool,
}

impl Entry {
    pub fn is_encrypted(&self) -> bool {
        self.flags & (FLAG_MIXCRYPT | FLAG_DES_HEADER) != 0
    }

    /// File extension, lowercased, without the dot.
    pub fn extension(&self) -> Option<String> {
        let base = self.name.rsplit(['/', '\\']).next()?;
        let (stem, ext) = base.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OffsetWidth {
    U32,
    U64,
}

impl OffsetWidth {
    fn meta_len(self) -> usize {
        // compSize + compAligned + realSize + flags + offset
        match self {
            OffsetWidth::U32 => 4 + 4 + 4 + 1 + 4,
            OffsetWidth::U64 => 4 + 4 + 4 + 1 + 8,
        }
    }
}

/// Raw (not yet decoded) outcome of one table walk.
#[derive(Debug, Default)]
pub(crate) struct TableWalk {
    pub files: Vec<RawFileEntry>,
    pub skipped: usize,
    pub parse_errors: usize,
    pub out_of_range: usize,
}

#[derive(Debug)]
pub(crate) struct RawFileEntry {
    pub raw_name: Vec<u8>,
    pub compressed_size: u32,
    pub compressed_size_aligned: u32,
    pub real_size: u32,
    pub flags: u8,
    pub offset: u64,
}

fn read_meta(buf: &[u8], width: OffsetWidth) -> Option<(u32, u32, u32, u8, u64)> {
    let mut cur = Cursor::new(buf);
    let compressed = cur.read_u32::<LittleEndian>().ok()?;
    let aligned = cur.read_u32::<LittleEndian>().ok()?;
    let real = cur.read_u32::<LittleEndian>().ok()?;
    let flags = cur.read_u8().ok()?;
    let offset = match width {
        OffsetWidth::U32 => u64::from(cur.read_u32::<LittleEndian>().ok()?),
        OffsetWidth::U64 => cur.read_u64::<LittleEndian>().ok()?,
    };
    Some((compressed, aligned, real, flags, offset))
}

fn walk(table: &[u8], max_entries: u32, width: OffsetWidth, archive_len: u64) -> TableWalk {
    let mut out = TableWalk::default();
    let mut pos = 0usize;

    while pos < table.len() && (out.files.len() + out.skipped) < max_entries as usize {
        let Some(nul) = table[pos..].iter().position(|&b| b == 0) else {
            out.parse_errors += 1;
            break;
        };
        let raw_name = table[pos..pos + nul].to_vec();
        let meta_start = pos + nul + 1;
        let meta_len = width.meta_len();

        if meta_start + meta_len > table.len() {
            out.parse_errors += 1;
            break;
        }

        let Some((compressed, aligned, real, flags, offset)) =
            read_meta(&table[meta_start..meta_start + meta_len], width)
        else {
            out.parse_errors += 1;
            break;
        };
        pos = meta_start + meta_len;

        if flags & FLAG_FILE == 0 {
            out.skipped += 1;
            continue;
        }

        if offset >= archive_len || offset.saturating_add(u64::from(aligned)) > archive_len {
            out.out_of_range += 1;
        }

        out.files.push(RawFileEntry {
            raw_name,
            compressed_size: compressed,
            compressed_size_aligned: aligned,
            real_size: real,
            flags,
            offset,
        });
    }

    out
}

/// Walk the inflated table, choosing the offset width for 0x300 archives.
///
/// The winning layout maximizes inspected file entries, tie-broken by
/// fewer parse errors, then by fewer offsets falling outside the archive.
/// A full tie keeps the legacy 32-bit layout.
pub(crate) fn parse_table(
    table: &[u8],
    max_entries: u32,
    version: u32,
    archive_len: u64,
) -> (TableWalk, OffsetWidth) {
    if version < super::header::VERSION_0300 {
        return (walk(table, max_entries, OffsetWidth::U32, archive_len), OffsetWidth::U32);
    }

    let narrow = walk(table, max_entries, OffsetWidth::U32, archive_len);
    let wide = walk(table, max_entries, OffsetWidth::U64, archive_len);

    debug!(
        narrow_files = narrow.files.len(),
        narrow_errors = narrow.parse_errors,
        narrow_oor = narrow.out_of_range,
        wide_files = wide.files.len(),
        wide_errors = wide.parse_errors,
        wide_oor = wide.out_of_range,
        "choosing 0x300 offset layout"
    );

    if prefer_wide(&narrow, &wide) {
        (wide, OffsetWidth::U64)
    } else {
        (narrow, OffsetWidth::U32)
    }
}

/// More inspected entries wins; ties break on fewer parse errors, then on
/// fewer out-of-range offsets. A full tie keeps the narrow legacy layout.
fn prefer_wide(narrow: &TableWalk, wide: &TableWalk) -> bool {
    let narrow_score = (
        narrow.files.len(),
        usize::MAX - narrow.parse_errors,
        usize::MAX - narrow.out_of_range,
    );
    let wide_score = (
        wide.files.len(),
        usize::MAX - wide.parse_errors,
        usize::MAX - wide.out_of_range,
    );
    wide_score > narrow_score
}
