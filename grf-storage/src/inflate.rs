//! Zlib inflate with an uncompressed-size ceiling

use crate::error::{GrfError, Result};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Hard ceiling on any declared uncompressed size (512 MiB). A table or
/// entry claiming more than this is corrupt or hostile.
pub const MAX_INFLATED_SIZE: usize = 512 * 1024 * 1024;

/// Reject a declared uncompressed size above [`MAX_INFLATED_SIZE`] before
/// any bytes are decoded.
pub fn ensure_inflatable(expected: usize) -> Result<()> {
    if expected > MAX_INFLATED_SIZE {
        return Err(GrfError::Inflate(format!(
            "declared uncompressed size {expected} exceeds the {MAX_INFLATED_SIZE} byte ceiling"
        )));
    }
    Ok(())
}

/// Inflate a zlib-wrapped DEFLATE stream to exactly `expected` bytes.
///
/// Any zlib error, a truncated stream, or a length mismatch fails; a short
/// result is never returned silently.
pub fn inflate_exact(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    ensure_inflatable(expected)?;

    if data.is_empty() {
        return Err(GrfError::Inflate("empty compressed stream".into()));
    }

    let mut decoder = ZlibDecoder::new(data).take(expected as u64 + 1);
    let mut out = Vec::with_capacity(expected);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| GrfError::Inflate(format!("zlib: {e}")))?;

    if out.len() != expected {
        return Err(GrfError::Inflate(format!(
            "size mismatch: expected {expected} bytes, got {}",
            out.len()
        )));
    }

    Ok(out)
}
