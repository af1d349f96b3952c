//! Process supervision for the target program.
//!
//! Each session spawns its own chocolate-doom bound to the session's capture
//! target. The parent never waits synchronously: the child is handed to a
//! detached reaper task so exits are drained opportunistically and never
//! accumulate as zombies. Session state does not depend on the child being
//! alive — when the program dies, capture degrades to synthetic frames.

use std::process::Stdio;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::{info, warn};

use doomcast_core::{CaptureMode, ServerConfig, SessionError, FRAME_HEIGHT, FRAME_WIDTH};

/// Handle to a spawned target program.
#[derive(Debug)]
pub struct DoomChild {
    pid: u32,
}

impl DoomChild {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Best-effort termination: one SIGTERM, no forced-kill escalation.
    /// The detached reaper task collects the exit status.
    pub fn terminate(&self) {
        if let Err(e) = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
            warn!("SIGTERM to pid {} failed: {e}", self.pid);
        }
    }
}

/// Spawn the target program for a session.
///
/// `Ok(None)` means the spawn kill-switch is set: the session stays fully
/// functional (capture, input) with no underlying program, which is how the
/// server is exercised on machines without chocolate-doom installed.
pub fn spawn_doom(cfg: &ServerConfig, session_id: usize) -> Result<Option<DoomChild>, SessionError> {
    if cfg.disable_spawn {
        info!("DOOM_DISABLE_SPAWN=1, skipping {} launch for session {session_id}", cfg.doom_bin);
        return Ok(None);
    }

    // The program exits uselessly without its WAD; refuse up front.
    if let Err(e) = std::fs::File::open(&cfg.wad_path) {
        return Err(SessionError::SpawnFailed {
            id: session_id,
            reason: format!("WAD {} not readable: {e}", cfg.wad_path.display()),
        });
    }

    let mut cmd = Command::new(&cfg.doom_bin);
    cmd.arg("-iwad")
        .arg(&cfg.wad_path)
        .args([
            "-width",
            &FRAME_WIDTH.to_string(),
            "-height",
            &FRAME_HEIGHT.to_string(),
            "-nosound",
            "-nomusic",
            "-window", // keep keyboard focus logic simple
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    match cfg.mode {
        CaptureMode::Framebuffer => {
            cmd.env("SDL_VIDEODRIVER", "fbcon")
                .env("SDL_FBDEV", &cfg.framebuffer);
        }
        CaptureMode::X11 => {
            cmd.env("SDL_VIDEODRIVER", "x11");
            if let Some(display) = &cfg.display {
                cmd.env("DISPLAY", display);
            }
        }
    }

    let mut child = cmd.spawn().map_err(|e| SessionError::SpawnFailed {
        id: session_id,
        reason: format!("exec {}: {e}", cfg.doom_bin),
    })?;
    let pid = child.id().unwrap_or(0);

    // Fire-and-forget reaper: awaiting the child is what prevents zombies.
    // No per-session exit notification is delivered on purpose.
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => info!("doom pid {pid} exited: {status}"),
            Err(e) => warn!("waiting on doom pid {pid}: {e}"),
        }
    });

    info!("spawned {} (pid={pid}) for session {session_id}", cfg.doom_bin);
    Ok(Some(DoomChild { pid }))
}
