#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const FLAG_FILE: u8 = 0x01;

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

struct BuildEntry {
    name: Vec<u8>,
    content: Vec<u8>,
    flags: u8,
}

/// Builds GRF archive images byte-for-byte, entirely in memory.
pub struct GrfBuilder {
    version: u32,
    seed: u32,
    wide_offsets: bool,
    entries: Vec<BuildEntry>,
}

impl GrfBuilder {
    pub fn new() -> Self {
        Self {
            version: 0x200,
            seed: 0,
            wide_offsets: false,
            entries: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Store 8-byte entry offsets (0x300 layout variant).
    pub fn wide_offsets(mut self) -> Self {
        self.wide_offsets = true;
        self
    }

    pub fn file(self, name: &str, content: &[u8]) -> Self {
        self.raw_file(name.as_bytes().to_vec(), content)
    }

    pub fn raw_file(mut self, name: Vec<u8>, content: &[u8]) -> Self {
        self.entries.push(BuildEntry {
            name,
            content: content.to_vec(),
            flags: FLAG_FILE,
        });
        self
    }

    pub fn file_with_flags(mut self, name: &str, content: &[u8], flags: u8) -> Self {
        self.entries.push(BuildEntry {
            name: name.as_bytes().to_vec(),
            content: content.to_vec(),
            flags,
        });
        self
    }

    pub fn directory(mut self, name: &str) -> Self {
        self.entries.push(BuildEntry {
            name: name.as_bytes().to_vec(),
            content: Vec::new(),
            flags: 0,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut body = Vec::new();
        let mut table = Vec::new();

        for entry in &self.entries {
            table.extend_from_slice(&entry.name);
            table.push(0);
            if entry.flags & FLAG_FILE != 0 {
                let compressed = deflate(&entry.content);
                let offset = body.len() as u64;
                table.write_u32::<LittleEndian>(compressed.len() as u32).unwrap();
                table.write_u32::<LittleEndian>(compressed.len() as u32).unwrap();
                table
                    .write_u32::<LittleEndian>(entry.content.len() as u32)
                    .unwrap();
                table.push(entry.flags);
                write_offset(&mut table, offset, self.wide_offsets);
                body.extend_from_slice(&compressed);
            } else {
                table.write_u32::<LittleEndian>(0).unwrap();
                table.write_u32::<LittleEndian>(0).unwrap();
                table.write_u32::<LittleEndian>(0).unwrap();
                table.push(entry.flags);
                write_offset(&mut table, 0, self.wide_offsets);
            }
        }

        let table_offset = body.len() as u32;
        let compressed_table = deflate(&table);

        let mut out = Vec::new();
        out.extend_from_slice(b"Master of Magic");
        out.push(0);
        out.extend_from_slice(&[0u8; 14]);
        out.write_u32::<LittleEndian>(table_offset).unwrap();
        out.write_u32::<LittleEndian>(self.seed).unwrap();
        out.write_u32::<LittleEndian>(self.entries.len() as u32 + self.seed + 7)
            .unwrap();
        out.write_u32::<LittleEndian>(self.version).unwrap();
        out.extend_from_slice(&body);
        out.write_u32::<LittleEndian>(compressed_table.len() as u32)
            .unwrap();
        out.write_u32::<LittleEndian>(table.len() as u32).unwrap();
        out.extend_from_slice(&compressed_table);
        out
    }
}

/// Header claiming a file table of `compressed_size` compressed bytes at
/// offset 0, with no table bytes behind it.
pub fn header_only_image(compressed_size: u32, uncompressed_size: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"Master of Magic");
    out.push(0);
    out.extend_from_slice(&[0u8; 14]);
    out.write_u32::<LittleEndian>(0).unwrap();
    out.write_u32::<LittleEndian>(0).unwrap();
    out.write_u32::<LittleEndian>(8).unwrap();
    out.write_u32::<LittleEndian>(0x200).unwrap();
    out.write_u32::<LittleEndian>(compressed_size).unwrap();
    out.write_u32::<LittleEndian>(uncompressed_size).unwrap();
    out
}

fn write_offset(table: &mut Vec<u8>, offset: u64, wide: bool) {
    if wide {
        table.write_u64::<LittleEndian>(offset).unwrap();
    } else {
        table.write_u32::<LittleEndian>(offset as u32).unwrap();
    }
}

/// CP949 bytes of `s`.
pub fn cp949(s: &str) -> Vec<u8> {
    let (bytes, _, had_errors) = encoding_rs::EUC_KR.encode(s);
    assert!(!had_errors, "fixture must be CP949-encodable: {s}");
    bytes.into_owned()
}

/// CP949 bytes of `s`, widened byte-for-byte to Latin-1 code points.
pub fn mojibake(s: &str) -> String {
    cp949(s).iter().map(|&b| char::from(b)).collect()
}

/// Write archives plus a `DATA.INI` manifest into `dir`; returns the
/// manifest path.
pub fn write_manifest(dir: &Path, archives: &[(&str, Vec<u8>)]) -> PathBuf {
    let mut manifest = String::from("[data]\n");
    for (i, (name, image)) in archives.iter().enumerate() {
        std::fs::write(dir.join(name), image).unwrap();
        manifest.push_str(&format!("{i}={name}\n"));
    }
    let path = dir.join("DATA.INI");
    std::fs::write(&path, manifest).unwrap();
    path
}
