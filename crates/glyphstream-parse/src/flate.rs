//! Flate stream decoding.
//!
//! PDF flate streams carry a zlib wrapper, but real-world streams are
//! often truncated or missing their checksum. The decoder therefore
//! discards the 2-byte zlib header and inflates the rest in raw mode
//! through a fixed-size buffer, tolerating a premature end of stream once
//! any bytes have been produced. A format error with zero recoverable
//! bytes is re-raised to the caller.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use log::warn;

use crate::error::EngineError;

const INFLATE_BUF_SIZE: usize = 2048;

/// Decode a zlib-wrapped flate stream.
///
/// # Errors
///
/// Returns [`EngineError::Flate`] only when the stream is corrupt and no
/// bytes at all could be recovered.
pub fn flate_decode(data: &[u8]) -> Result<Vec<u8>, EngineError> {
    // Skip the zlib header; raw mode also bypasses the Adler checksum so
    // a missing stream end cannot fail an otherwise-good stream.
    if data.len() <= 2 {
        return Ok(Vec::new());
    }
    let input = &data[2..];

    let mut inflater = Decompress::new(false);
    let mut output = Vec::new();
    let mut buf = [0u8; INFLATE_BUF_SIZE];
    let mut offset = 0usize;

    loop {
        let before_in = inflater.total_in();
        let before_out = inflater.total_out();
        match inflater.decompress(&input[offset..], &mut buf, FlushDecompress::None) {
            Ok(status) => {
                let consumed = (inflater.total_in() - before_in) as usize;
                let produced = (inflater.total_out() - before_out) as usize;
                offset += consumed;
                output.extend_from_slice(&buf[..produced]);

                if status == Status::StreamEnd {
                    break;
                }
                if offset >= input.len() && produced == 0 {
                    // Input exhausted without a stream end.
                    break;
                }
                if consumed == 0 && produced == 0 {
                    break;
                }
            }
            Err(err) => {
                if output.is_empty() {
                    return Err(EngineError::Flate(err.to_string()));
                }
                // Some data could be read; keep it.
                warn!("premature end of flate stream: {err}");
                break;
            }
        }
    }

    Ok(output)
}

/// Encode bytes as a zlib-wrapped flate stream.
pub fn flate_encode(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}
