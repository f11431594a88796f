//! GRF header parsing

use crate::error::{GrfError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Fixed header length; entry offsets and the table offset are relative
/// to this.
pub const HEADER_SIZE: usize = 46;

/// ASCII signature, NUL-padded to 16 bytes.
pub const SIGNATURE: &[u8; 15] = b"Master of Magic";

pub const VERSION_0200: u32 = 0x200;
pub const VERSION_0300: u32 = 0x300;

/// Parsed 46-byte GRF header.
///
/// Wire layout (little-endian): `signature[16] | key[14] |
/// tableOffset u32 | seed u32 | nFiles u32 | version u32`.
#[derive(Debug, Clone)]
pub struct GrfHeader {
    pub table_offset: u32,
    pub seed: u32,
    pub declared_count: u32,
    pub version: u32,
}

impl GrfHeader {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < HEADER_SIZE {
            return Err(GrfError::BadHeader(format!(
                "header needs {HEADER_SIZE} bytes, got {}",
                raw.len()
            )));
        }

        if &raw[..SIGNATURE.len()] != SIGNATURE || raw[SIGNATURE.len()] != 0 {
            return Err(GrfError::BadHeader("signature mismatch".into()));
        }

        // bytes 16..30 carry the legacy DES key; any nonzero byte marks
        // an encrypted archive, which is rejected outright
        if raw[16..30].iter().any(|&b| b != 0) {
            return Err(GrfError::UnsupportedEncryption);
        }

        let mut cur = Cursor::new(&raw[30..HEADER_SIZE]);
        let table_offset = cur.read_u32::<LittleEndian>()?;
        let seed = cur.read_u32::<LittleEndian>()?;
        let declared_count = cur.read_u32::<LittleEndian>()?;
        let version = cur.read_u32::<LittleEndian>()?;

        if version != VERSION_0200 && version != VERSION_0300 {
            return Err(GrfError::UnsupportedVersion(version));
        }

        Ok(Self {
            table_offset,
            seed,
            declared_count,
            version,
        })
    }

    /// Number of real table entries: `max(declared − seed − 7, 0)`.
    pub fn effective_count(&self) -> u32 {
        self.declared_count
            .saturating_sub(self.seed)
            .saturating_sub(7)
    }
}
