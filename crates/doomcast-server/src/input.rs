//! Input sinks — how a decoded payload reaches the running program.
//!
//! Two backends behind one trait, mirroring the capture split:
//!
//! - [`FifoSink`] writes the raw payload to the session's named pipe. The
//!   payload framing belongs entirely to whatever reads the pipe; no parsing
//!   happens here.
//! - [`XtestSink`] parses the text key protocol, resolves the token to a
//!   keysym and keycode, refocuses the capture target, and injects synthetic
//!   press/release events.

use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use tracing::debug;

use doomcast_capture::X11Handle;
use doomcast_core::input::{parse_payload, resolve_keysym, KeyAction};
use doomcast_core::InputError;

/// A per-session input delivery channel.
pub trait InputSink: Send {
    fn deliver(&mut self, payload: &[u8]) -> Result<(), InputError>;
}

// ── FifoSink ──────────────────────────────────────────────────────────────────

/// Named-pipe sink. Opens the FIFO non-blocking on every call — there is no
/// persistent writer, so a missing reader surfaces immediately as a failure
/// instead of blocking the connection's worker.
pub struct FifoSink {
    path: PathBuf,
}

impl FifoSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl InputSink for FifoSink {
    fn deliver(&mut self, payload: &[u8]) -> Result<(), InputError> {
        let mut fifo = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.path)
            .map_err(|e| InputError::DeliveryFailed {
                reason: format!("open FIFO {}: {e}", self.path.display()),
            })?;
        fifo.write_all(payload)
            .map_err(|e| InputError::DeliveryFailed {
                reason: format!("write FIFO {}: {e}", self.path.display()),
            })?;
        Ok(())
    }
}

// ── XtestSink ─────────────────────────────────────────────────────────────────

/// Synthetic key-event sink over XTEST.
pub struct XtestSink {
    handle: X11Handle,
}

impl XtestSink {
    pub fn new(handle: X11Handle) -> Self {
        Self { handle }
    }

    fn fake(&mut self, keycode: u8, press: bool) -> Result<(), InputError> {
        self.handle
            .fake_key(keycode, press)
            .map_err(|e| InputError::DeliveryFailed {
                reason: format!("xtest injection: {e:#}"),
            })
    }
}

impl InputSink for XtestSink {
    fn deliver(&mut self, payload: &[u8]) -> Result<(), InputError> {
        if !self.handle.xtest_supported() {
            return Err(InputError::Rejected {
                reason: "display does not support XTEST injection".to_owned(),
            });
        }

        let request = parse_payload(payload)?;
        let keysym = resolve_keysym(&request.token).ok_or_else(|| InputError::Rejected {
            reason: format!("unresolvable key {:?}", request.token),
        })?;
        let keycode = self
            .handle
            .keycode_for(keysym)
            .ok_or_else(|| InputError::Rejected {
                reason: format!("no keycode for keysym {keysym:#x}"),
            })?;

        // Refocus so the events land on the program, not whatever window
        // happens to hold focus right now.
        self.handle
            .ensure_target()
            .map_err(|e| InputError::DeliveryFailed {
                reason: format!("refocusing target: {e:#}"),
            })?;

        debug!(
            "injecting {:?} keysym={keysym:#x} keycode={keycode}",
            request.action
        );
        match request.action {
            KeyAction::Press => self.fake(keycode, true)?,
            KeyAction::Release => self.fake(keycode, false)?,
            KeyAction::Tap => {
                self.fake(keycode, true)?;
                self.fake(keycode, false)?;
            }
        }
        Ok(())
    }
}
