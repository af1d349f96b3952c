//! doomcast-capture — frame capture backends.
//!
//! # Backends
//!
//! | Backend | Source | Input partner |
//! |---------|--------|---------------|
//! | [`FramebufferSource`] | raw `/dev/fb*` read | FIFO |
//! | [`X11Source`] | X11 `GetImage` on a tracked window | XTEST |
//! | [`SyntheticSource`] | deterministic test pattern | — |
//!
//! All backends satisfy the same contract: [`FrameSource::capture`] always
//! fills the caller's RGB buffer. Internal failures substitute the synthetic
//! pattern so a stream never stalls on a broken capture path.

pub mod framebuffer;
pub mod synthetic;
#[cfg(unix)]
pub mod x11;

pub use framebuffer::FramebufferSource;
pub use synthetic::SyntheticSource;
#[cfg(unix)]
pub use x11::{X11Handle, X11Source};

/// A per-session frame producer.
///
/// `rgb` must be exactly [`doomcast_core::RGB_FRAME_LEN`] bytes; `frame_id`
/// is the session's monotonic frame counter, used to animate the synthetic
/// pattern.
pub trait FrameSource: Send {
    fn capture(&mut self, frame_id: u64, rgb: &mut [u8]);
}
