//! Environment-driven server configuration.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `DOOM_SERVER_PORT` | `8080` | listen port (invalid values ignored) |
//! | `DOOM_FRAMEBUFFER` | `/dev/fb0` | raw capture device |
//! | `DOOM_SESSION_DIR` | `/root/doom_sessions` | per-session FIFO directory |
//! | `DOOM_WAD_PATH` | `/root/freedoom1.wad` | game asset, required to spawn |
//! | `DOOM_BIN` | `chocolate-doom` | target program |
//! | `DOOM_BACKEND` | `fb` | `fb` or `x11` capture/input backend pair |
//! | `DOOM_DISPLAY` | `$DISPLAY` | X11 display for the `x11` backend |
//! | `DOOM_DISABLE_SPAWN` | unset | `1` skips spawning the program |
//! | `DOOM_PUBLIC_DIR` | `public` | static asset root |

use std::path::PathBuf;

use tracing::warn;

/// Which capture/input backend pair a session gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Raw framebuffer device capture + FIFO input.
    Framebuffer,
    /// X11 window capture + XTEST key injection.
    X11,
}

/// Resolved server configuration. Built once at startup, shared read-only.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub framebuffer: PathBuf,
    pub session_dir: PathBuf,
    pub wad_path: PathBuf,
    pub doom_bin: String,
    pub mode: CaptureMode,
    /// X11 display name; `None` lets the connection library pick `$DISPLAY`.
    pub display: Option<String>,
    /// Kill-switch: run sessions without the target program.
    pub disable_spawn: bool,
    pub public_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            framebuffer: PathBuf::from("/dev/fb0"),
            session_dir: PathBuf::from("/root/doom_sessions"),
            wad_path: PathBuf::from("/root/freedoom1.wad"),
            doom_bin: "chocolate-doom".to_owned(),
            mode: CaptureMode::Framebuffer,
            display: None,
            disable_spawn: false,
            public_dir: PathBuf::from("public"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Empty values count as unset, matching the original server's
    /// `getenv` handling.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| get(key).filter(|v| !v.is_empty());
        let mut cfg = Self::default();

        if let Some(port) = get("DOOM_SERVER_PORT") {
            match port.parse::<u16>() {
                Ok(p) if p > 0 => cfg.port = p,
                _ => warn!("ignoring invalid DOOM_SERVER_PORT={port}"),
            }
        }
        if let Some(fb) = get("DOOM_FRAMEBUFFER") {
            cfg.framebuffer = PathBuf::from(fb);
        }
        if let Some(dir) = get("DOOM_SESSION_DIR") {
            cfg.session_dir = PathBuf::from(dir);
        }
        if let Some(wad) = get("DOOM_WAD_PATH") {
            cfg.wad_path = PathBuf::from(wad);
        }
        if let Some(bin) = get("DOOM_BIN") {
            cfg.doom_bin = bin;
        }
        if let Some(backend) = get("DOOM_BACKEND") {
            match backend.to_ascii_lowercase().as_str() {
                "fb" | "framebuffer" => cfg.mode = CaptureMode::Framebuffer,
                "x11" => cfg.mode = CaptureMode::X11,
                other => warn!("unknown DOOM_BACKEND={other}, keeping framebuffer"),
            }
        }
        cfg.display = get("DOOM_DISPLAY").or_else(|| get("DISPLAY"));
        cfg.disable_spawn = get("DOOM_DISABLE_SPAWN").as_deref() == Some("1");
        if let Some(dir) = get("DOOM_PUBLIC_DIR") {
            cfg.public_dir = PathBuf::from(dir);
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.framebuffer, PathBuf::from("/dev/fb0"));
        assert_eq!(cfg.mode, CaptureMode::Framebuffer);
        assert!(!cfg.disable_spawn);
        assert!(cfg.display.is_none());
    }

    #[test]
    fn overrides_apply() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("DOOM_SERVER_PORT", "9000"),
            ("DOOM_FRAMEBUFFER", "/dev/fb1"),
            ("DOOM_BACKEND", "x11"),
            ("DOOM_DISPLAY", ":1"),
            ("DOOM_DISABLE_SPAWN", "1"),
        ]));
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.framebuffer, PathBuf::from("/dev/fb1"));
        assert_eq!(cfg.mode, CaptureMode::X11);
        assert_eq!(cfg.display.as_deref(), Some(":1"));
        assert!(cfg.disable_spawn);
    }

    #[test]
    fn bad_port_and_backend_fall_back() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("DOOM_SERVER_PORT", "notaport"),
            ("DOOM_BACKEND", "wayland"),
        ]));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.mode, CaptureMode::Framebuffer);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = ServerConfig::from_lookup(lookup(&[("DOOM_FRAMEBUFFER", "")]));
        assert_eq!(cfg.framebuffer, PathBuf::from("/dev/fb0"));
    }

    #[test]
    fn display_falls_back_to_x11_default() {
        let cfg = ServerConfig::from_lookup(lookup(&[("DISPLAY", ":0")]));
        assert_eq!(cfg.display.as_deref(), Some(":0"));
    }
}
