//! Fixed-capacity session table.
//!
//! A session id is a direct slot index in `[0, MAX_SESSIONS)`. Structural
//! changes (lookup, creation, teardown) serialize behind one table lock;
//! each session's mutable state sits behind its own lock so steady-state
//! streaming never contends on the table. Creation is all-or-nothing: a
//! session is never observable half-initialized.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use nix::errno::Errno;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::{info, warn};

use doomcast_capture::{FrameSource, FramebufferSource, SyntheticSource};
use doomcast_core::{
    CaptureMode, EncodeError, InputError, ServerConfig, SessionError, FRAME_HEIGHT, FRAME_WIDTH,
    MAX_SESSIONS, RGB_FRAME_LEN,
};

use crate::input::{FifoSink, InputSink, XtestSink};
use crate::jpeg;
use crate::spawn::{spawn_doom, DoomChild};

// ── Session ───────────────────────────────────────────────────────────────────

/// One logical instance of the target program plus its capture/input
/// backends. Shared across connections via `Arc`.
pub struct Session {
    id: usize,
    /// Epoch seconds of the last request touching this session.
    last_activity: AtomicU64,
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    frame_id: u64,
    rgb: Vec<u8>,
    source: Box<dyn FrameSource>,
    sink: Box<dyn InputSink>,
    child: Option<DoomChild>,
    fifo_path: Option<PathBuf>,
}

impl Session {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Stamp the last-activity clock.
    pub fn touch(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.last_activity.store(now, Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> u64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    /// Frames captured so far. Diagnostic only, never wire-visible.
    pub fn frame_count(&self) -> u64 {
        self.inner.lock().expect("session state poisoned").frame_id
    }

    pub fn doom_pid(&self) -> Option<u32> {
        self.inner
            .lock()
            .expect("session state poisoned")
            .child
            .as_ref()
            .map(|c| c.pid())
    }

    /// Capture one frame and encode it. Capture cannot fail (synthetic
    /// fallback); encoding can, and that is the caller's problem.
    pub fn capture_jpeg(&self) -> Result<Bytes, EncodeError> {
        let mut guard = self.inner.lock().expect("session state poisoned");
        let inner = &mut *guard;
        inner.source.capture(inner.frame_id, &mut inner.rgb);
        inner.frame_id += 1;
        jpeg::encode_rgb(&inner.rgb, FRAME_WIDTH as u32, FRAME_HEIGHT as u32)
    }

    /// Forward one input payload to the session's sink.
    pub fn deliver_input(&self, payload: &[u8]) -> Result<(), InputError> {
        self.touch();
        self.inner
            .lock()
            .expect("session state poisoned")
            .sink
            .deliver(payload)
    }
}

// ── SessionManager ────────────────────────────────────────────────────────────

pub struct SessionManager {
    cfg: ServerConfig,
    slots: Mutex<Vec<Option<Arc<Session>>>>,
}

impl SessionManager {
    pub fn new(cfg: ServerConfig) -> Self {
        Self {
            cfg,
            slots: Mutex::new((0..MAX_SESSIONS).map(|_| None).collect()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.cfg
    }

    /// Number of occupied slots (diagnostics and tests).
    pub fn active_sessions(&self) -> usize {
        self.slots
            .lock()
            .expect("session table poisoned")
            .iter()
            .filter(|s| s.is_some())
            .count()
    }

    /// Look up a session, creating it on first access.
    ///
    /// Re-access of an active slot only stamps activity and returns the same
    /// session, so a stream and an input request against one id share state
    /// without re-spawning the program.
    pub fn get_or_create(&self, id: i64) -> Result<Arc<Session>, SessionError> {
        if id < 0 || id as usize >= MAX_SESSIONS {
            return Err(SessionError::InvalidSession { id });
        }
        let idx = id as usize;

        let mut slots = self.slots.lock().expect("session table poisoned");
        if let Some(session) = &slots[idx] {
            session.touch();
            return Ok(Arc::clone(session));
        }

        let session = self.create_session(idx)?;
        slots[idx] = Some(Arc::clone(&session));
        info!("session {idx} initialized");
        Ok(session)
    }

    /// Build all per-session resources. Called with the table lock held so
    /// creation is serialized; any failure cleans up what was made so far.
    fn create_session(&self, id: usize) -> Result<Arc<Session>, SessionError> {
        let (source, sink, fifo_path) = match self.cfg.mode {
            CaptureMode::Framebuffer => self.framebuffer_backends(id)?,
            CaptureMode::X11 => self.x11_backends(id)?,
        };

        let child = match spawn_doom(&self.cfg, id) {
            Ok(child) => child,
            Err(e) => {
                if let Some(path) = &fifo_path {
                    let _ = std::fs::remove_file(path);
                }
                return Err(e);
            }
        };

        let session = Session {
            id,
            last_activity: AtomicU64::new(0),
            inner: Mutex::new(SessionInner {
                frame_id: 0,
                rgb: vec![0u8; RGB_FRAME_LEN],
                source,
                sink,
                child,
                fifo_path,
            }),
        };
        session.touch();
        Ok(Arc::new(session))
    }

    #[allow(clippy::type_complexity)]
    fn framebuffer_backends(
        &self,
        id: usize,
    ) -> Result<(Box<dyn FrameSource>, Box<dyn InputSink>, Option<PathBuf>), SessionError> {
        if let Err(e) = std::fs::create_dir_all(&self.cfg.session_dir) {
            warn!(
                "failed to create session dir {}: {e}",
                self.cfg.session_dir.display()
            );
        }
        let fifo = self.cfg.session_dir.join(format!("input_{id}"));
        match mkfifo(&fifo, Mode::from_bits_truncate(0o666)) {
            Ok(()) | Err(Errno::EEXIST) => {}
            Err(e) => {
                return Err(SessionError::ResourceExhausted {
                    id,
                    reason: format!("mkfifo {}: {e}", fifo.display()),
                });
            }
        }

        // An unopenable device is tolerated: the source starts degraded and
        // serves synthetic frames.
        let source = FramebufferSource::open(&self.cfg.framebuffer);
        let sink = FifoSink::new(fifo.clone());
        Ok((Box::new(source), Box::new(sink), Some(fifo)))
    }

    #[allow(clippy::type_complexity)]
    fn x11_backends(
        &self,
        id: usize,
    ) -> Result<(Box<dyn FrameSource>, Box<dyn InputSink>, Option<PathBuf>), SessionError> {
        use doomcast_capture::{X11Handle, X11Source};

        let display = self.cfg.display.as_deref();

        // Capture degrades to synthetic frames when the display is
        // unreachable; only the input connection is load-bearing.
        let source: Box<dyn FrameSource> = match X11Handle::connect(display) {
            Ok(handle) => Box::new(X11Source::new(handle)),
            Err(e) => {
                warn!("X11 capture connect failed for session {id}: {e:#}, synthetic frames only");
                Box::new(SyntheticSource)
            }
        };

        let input_handle = X11Handle::connect(display).map_err(|e| {
            SessionError::ResourceExhausted {
                id,
                reason: format!("X11 input connect: {e:#}"),
            }
        })?;
        Ok((source, Box::new(XtestSink::new(input_handle)), None))
    }

    /// Release everything a session owns and free its slot.
    ///
    /// Idempotent: tearing down an inactive slot is a no-op. Streaming
    /// connections still holding the `Arc` keep their clone until they end;
    /// the slot itself is immediately reusable.
    ///
    /// The table lock is held until the child is signalled and the FIFO is
    /// unlinked: a racing `get_or_create` on the same id must not adopt the
    /// dying session's pipe only to have it unlinked underneath it.
    pub fn teardown(&self, id: usize) {
        if id >= MAX_SESSIONS {
            return;
        }
        let mut slots = self.slots.lock().expect("session table poisoned");
        let Some(session) = slots[id].take() else {
            return;
        };

        info!("tearing down session {id}");
        let mut inner = session.inner.lock().expect("session state poisoned");
        if let Some(child) = inner.child.take() {
            child.terminate();
        }
        if let Some(path) = inner.fifo_path.take() {
            let _ = std::fs::remove_file(&path);
        }
        // Capture and input backends close when the last Arc drops.
    }
}
