//! Fixed frame geometry and streaming constants.
//!
//! chocolate-doom renders at its native 320×200; every buffer size in the
//! system derives from these two numbers. Changing them is out of scope.

use std::time::Duration;

/// Frame width in pixels.
pub const FRAME_WIDTH: usize = 320;

/// Frame height in pixels.
pub const FRAME_HEIGHT: usize = 200;

/// Number of concurrently addressable session slots.
pub const MAX_SESSIONS: usize = 8;

/// Baseline JPEG quality (0–100).
pub const JPEG_QUALITY: u8 = 80;

/// Multipart boundary token for the MJPEG response.
pub const STREAM_BOUNDARY: &str = "frame";

/// Pause between streamed frames (~30 Hz target).
pub const FRAME_INTERVAL: Duration = Duration::from_micros(33_333);

/// Size of one RGB raster: 3 bytes per pixel.
pub const RGB_FRAME_LEN: usize = FRAME_WIDTH * FRAME_HEIGHT * 3;

/// Size of one raw framebuffer read: 4 bytes per pixel (BGRA).
pub const RAW_FRAME_LEN: usize = FRAME_WIDTH * FRAME_HEIGHT * 4;
