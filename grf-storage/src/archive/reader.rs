//! Positioned byte access over an opened archive file

use crate::error::{GrfError, Result};
use memmap2::{Mmap, MmapOptions};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Narrow capability the archive parser needs from its backing bytes:
/// a bounds-checked positioned read and a total length.
pub trait ByteSource: Send + Sync {
    /// Read exactly `length` bytes starting at `offset`. A read that
    /// cannot be satisfied in full is an error, never a short buffer.
    fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>>;

    /// Total length of the underlying bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSource for Vec<u8> {
    fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        check_bounds(offset, length, self.as_slice().len() as u64)?;
        let start = offset as usize;
        Ok(self[start..start + length].to_vec())
    }

    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }
}

fn check_bounds(offset: u64, length: usize, size: u64) -> Result<()> {
    let end = offset
        .checked_add(length as u64)
        .ok_or(GrfError::OutOfBounds {
            offset,
            length,
            size,
        })?;
    if end > size {
        return Err(GrfError::OutOfBounds {
            offset,
            length,
            size,
        });
    }
    Ok(())
}

/// File-backed byte source with memory mapping.
///
/// Files under 2 GiB are memory-mapped and served without locking. Larger
/// files (or mmap failures) fall back to one buffered handle behind a
/// mutex, since the handle's position is shared state.
pub struct FileSource {
    mmap: Option<Mmap>,
    file: Option<Mutex<BufReader<File>>>,
    size: u64,
}

const MMAP_LIMIT: u64 = 2_147_483_648;

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        debug!(path = %path.display(), size, "opening archive file");

        let mmap = if size > 0 && size < MMAP_LIMIT {
            match unsafe { MmapOptions::new().map(&file) } {
                Ok(mmap) => Some(mmap),
                Err(e) => {
                    debug!(path = %path.display(), "mmap failed, using file reader: {e}");
                    None
                }
            }
        } else {
            None
        };

        let file = if mmap.is_none() {
            Some(Mutex::new(BufReader::new(file)))
        } else {
            None
        };

        Ok(Self { mmap, file, size })
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        check_bounds(offset, length, self.size)?;

        if let Some(ref mmap) = self.mmap {
            let start = offset as usize;
            return Ok(mmap[start..start + length].to_vec());
        }

        let Some(ref file) = self.file else {
            return Err(GrfError::OutOfBounds {
                offset,
                length,
                size: self.size,
            });
        };

        let mut guard = file.lock();
        guard.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length];
        guard.read_exact(&mut buf).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                GrfError::Truncated {
                    offset,
                    wanted: length,
                    got: 0,
                }
            } else {
                GrfError::Io(e)
            }
        })?;
        Ok(buf)
    }

    fn len(&self) -> u64 {
        self.size
    }
}
