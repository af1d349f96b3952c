//! RGB → baseline JPEG at fixed quality.
//!
//! Single-shot per frame, no frame-to-frame prediction. Failures are
//! reported to the caller; the streaming loop decides whether to abort.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use doomcast_core::{EncodeError, JPEG_QUALITY};

/// Encode a tightly packed RGB raster into a JPEG buffer.
pub fn encode_rgb(rgb: &[u8], width: u32, height: u32) -> Result<Bytes, EncodeError> {
    let mut out = Vec::with_capacity(16 * 1024);
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode(rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError {
            reason: e.to_string(),
        })?;
    if out.is_empty() {
        return Err(EncodeError {
            reason: "encoder produced no output".to_owned(),
        });
    }
    Ok(Bytes::from(out))
}
