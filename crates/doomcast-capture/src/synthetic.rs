//! Deterministic placeholder raster.
//!
//! Used both as the startup placeholder (before the target program draws
//! anything) and as the fallback whenever a live capture fails. Pure in
//! `(x, y, frame_id)` so captures are reproducible and testable.

use doomcast_core::{FRAME_HEIGHT, FRAME_WIDTH};

use crate::FrameSource;

/// Fill `rgb` with the test pattern for the given frame counter.
pub fn fill(frame_id: u64, rgb: &mut [u8]) {
    for y in 0..FRAME_HEIGHT {
        for x in 0..FRAME_WIDTH {
            let idx = (y * FRAME_WIDTH + x) * 3;
            rgb[idx] = ((x as u64 + frame_id) % 256) as u8;
            rgb[idx + 1] = ((y * 2) % 256) as u8;
            rgb[idx + 2] = ((frame_id * 5) % 256) as u8;
        }
    }
}

/// A frame source that only ever produces the test pattern.
///
/// Sessions fall back to this when no capture backend can be opened at all.
pub struct SyntheticSource;

impl FrameSource for SyntheticSource {
    fn capture(&mut self, frame_id: u64, rgb: &mut [u8]) {
        fill(frame_id, rgb);
    }
}
