//! Raw framebuffer device capture.
//!
//! Reads the whole 320×200 BGRA region from offset 0 on every capture. A
//! read that returns anything other than the expected byte count marks the
//! device as dead: the handle is closed and never reopened, and the session
//! serves synthetic frames from then on.

use std::fs::File;
use std::path::Path;

use tracing::warn;

use doomcast_core::{RAW_FRAME_LEN, RGB_FRAME_LEN};

use crate::{synthetic, FrameSource};

pub struct FramebufferSource {
    device: Option<File>,
    raw: Vec<u8>,
}

impl FramebufferSource {
    /// Open the capture device. An open failure is not fatal: the source
    /// starts degraded and produces synthetic frames, matching the server's
    /// "stream continuity over fidelity" policy.
    pub fn open(path: &Path) -> Self {
        let device = match File::open(path) {
            Ok(f) => Some(f),
            Err(e) => {
                warn!(
                    "unable to open framebuffer {}: {e} (falling back to synthetic frames)",
                    path.display()
                );
                None
            }
        };
        Self {
            device,
            raw: vec![0u8; RAW_FRAME_LEN],
        }
    }

    /// True once the device handle has been closed (or never opened).
    pub fn is_degraded(&self) -> bool {
        self.device.is_none()
    }
}

impl FrameSource for FramebufferSource {
    fn capture(&mut self, frame_id: u64, rgb: &mut [u8]) {
        debug_assert_eq!(rgb.len(), RGB_FRAME_LEN);

        if let Some(device) = &self.device {
            #[cfg(unix)]
            let read = {
                use std::os::unix::fs::FileExt;
                device.read_at(&mut self.raw, 0)
            };
            #[cfg(not(unix))]
            let read: std::io::Result<usize> = Err(std::io::Error::other("no pread"));

            match read {
                Ok(n) if n == RAW_FRAME_LEN => {
                    bgra_to_rgb(&self.raw, rgb);
                    return;
                }
                Ok(n) => {
                    warn!(
                        "framebuffer read returned {n} (expected {RAW_FRAME_LEN}), \
                         switching to synthetic frames"
                    );
                    self.device = None;
                }
                Err(e) => {
                    warn!("framebuffer read failed: {e}, switching to synthetic frames");
                    self.device = None;
                }
            }
        }

        synthetic::fill(frame_id, rgb);
    }
}

/// Fixed channel reorder: keep B, G, R of each 4-byte pixel, drop the alpha
/// byte. No color-space correction.
fn bgra_to_rgb(raw: &[u8], rgb: &mut [u8]) {
    for (src, dst) in raw.chunks_exact(4).zip(rgb.chunks_exact_mut(3)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    }
}
