//! Text input protocol for `POST /input`.
//!
//! The payload is a single trimmed token, optionally wrapped:
//!
//! ```text
//! [key:]<name>[:down|:press|:up|:release]
//! ```
//!
//! Examples: `up`, `key:Escape`, `ctrl:down`, `w:release`. Without an action
//! suffix a full press-then-release tap is produced.
//!
//! The FIFO backend forwards raw payloads verbatim and never parses them;
//! this module only serves the XTEST backend, which needs a keysym.

use crate::errors::InputError;

/// What to do with the resolved key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Press only.
    Press,
    /// Release only.
    Release,
    /// Press followed by release (the default).
    Tap,
}

/// A parsed input payload: the key token plus the requested action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRequest {
    pub token: String,
    pub action: KeyAction,
}

/// Parse a raw `POST /input` payload into a [`KeyRequest`].
///
/// The keysym itself is resolved separately via [`resolve_keysym`] so that
/// parse failures and unknown keys report distinct reasons.
pub fn parse_payload(payload: &[u8]) -> Result<KeyRequest, InputError> {
    let text = std::str::from_utf8(payload).map_err(|_| InputError::Rejected {
        reason: "payload is not valid UTF-8".to_owned(),
    })?;
    let mut token = text.trim();
    if token.is_empty() {
        return Err(InputError::Rejected {
            reason: "empty payload".to_owned(),
        });
    }

    if token.len() >= 4 && token[..4].eq_ignore_ascii_case("key:") {
        token = &token[4..];
    }

    let mut action = KeyAction::Tap;
    if let Some((head, tail)) = token.rsplit_once(':') {
        match tail.to_ascii_lowercase().as_str() {
            "down" | "press" => {
                action = KeyAction::Press;
                token = head;
            }
            "up" | "release" => {
                action = KeyAction::Release;
                token = head;
            }
            // Not an action word: the colon belongs to the token.
            _ => {}
        }
    }

    if token.is_empty() {
        return Err(InputError::Rejected {
            reason: "payload has no key token".to_owned(),
        });
    }

    Ok(KeyRequest {
        token: token.to_owned(),
        action,
    })
}

// ── Keysym resolution ─────────────────────────────────────────────────────────
//
// Values are from <X11/keysymdef.h>. Latin-1 characters map directly to their
// code point, which the single-character fallback relies on.

const XK_SPACE: u32 = 0x0020;
const XK_BACKSPACE: u32 = 0xff08;
const XK_TAB: u32 = 0xff09;
const XK_RETURN: u32 = 0xff0d;
const XK_ESCAPE: u32 = 0xff1b;
const XK_HOME: u32 = 0xff50;
const XK_LEFT: u32 = 0xff51;
const XK_UP: u32 = 0xff52;
const XK_RIGHT: u32 = 0xff53;
const XK_DOWN: u32 = 0xff54;
const XK_PAGE_UP: u32 = 0xff55;
const XK_PAGE_DOWN: u32 = 0xff56;
const XK_END: u32 = 0xff57;
const XK_INSERT: u32 = 0xff63;
const XK_DELETE: u32 = 0xffff;
const XK_SHIFT_L: u32 = 0xffe1;
const XK_CONTROL_L: u32 = 0xffe3;
const XK_CAPS_LOCK: u32 = 0xffe5;
const XK_ALT_L: u32 = 0xffe9;
const XK_SUPER_L: u32 = 0xffeb;
const XK_F1: u32 = 0xffbe;

/// Common-name aliases, matched case-insensitively. First stop in the chain
/// so that browser-style names (`ArrowUp`) and short forms (`esc`) work.
const ALIASES: &[(&str, u32)] = &[
    ("up", XK_UP),
    ("arrowup", XK_UP),
    ("down", XK_DOWN),
    ("arrowdown", XK_DOWN),
    ("left", XK_LEFT),
    ("arrowleft", XK_LEFT),
    ("right", XK_RIGHT),
    ("arrowright", XK_RIGHT),
    ("space", XK_SPACE),
    ("spacebar", XK_SPACE),
    ("enter", XK_RETURN),
    ("return", XK_RETURN),
    ("escape", XK_ESCAPE),
    ("esc", XK_ESCAPE),
    ("tab", XK_TAB),
    ("backspace", XK_BACKSPACE),
    ("shift", XK_SHIFT_L),
    ("ctrl", XK_CONTROL_L),
    ("control", XK_CONTROL_L),
    ("alt", XK_ALT_L),
    ("meta", XK_SUPER_L),
    ("super", XK_SUPER_L),
    ("capslock", XK_CAPS_LOCK),
    ("delete", XK_DELETE),
    ("del", XK_DELETE),
    ("insert", XK_INSERT),
    ("home", XK_HOME),
    ("end", XK_END),
    ("pageup", XK_PAGE_UP),
    ("pgup", XK_PAGE_UP),
    ("pagedown", XK_PAGE_DOWN),
    ("pgdn", XK_PAGE_DOWN),
];

/// Exact keysym names, matched case-sensitively (the `XStringToKeysym` set
/// this server actually needs).
const KEYSYM_NAMES: &[(&str, u32)] = &[
    ("space", XK_SPACE),
    ("BackSpace", XK_BACKSPACE),
    ("Tab", XK_TAB),
    ("Return", XK_RETURN),
    ("Escape", XK_ESCAPE),
    ("Home", XK_HOME),
    ("Left", XK_LEFT),
    ("Up", XK_UP),
    ("Right", XK_RIGHT),
    ("Down", XK_DOWN),
    ("Page_Up", XK_PAGE_UP),
    ("Page_Down", XK_PAGE_DOWN),
    ("End", XK_END),
    ("Insert", XK_INSERT),
    ("Delete", XK_DELETE),
    ("Shift_L", XK_SHIFT_L),
    ("Shift_R", 0xffe2),
    ("Control_L", XK_CONTROL_L),
    ("Control_R", 0xffe4),
    ("Caps_Lock", XK_CAPS_LOCK),
    ("Alt_L", XK_ALT_L),
    ("Alt_R", 0xffea),
    ("Super_L", XK_SUPER_L),
    ("Super_R", 0xffec),
    ("F1", XK_F1),
    ("F2", XK_F1 + 1),
    ("F3", XK_F1 + 2),
    ("F4", XK_F1 + 3),
    ("F5", XK_F1 + 4),
    ("F6", XK_F1 + 5),
    ("F7", XK_F1 + 6),
    ("F8", XK_F1 + 7),
    ("F9", XK_F1 + 8),
    ("F10", XK_F1 + 9),
    ("F11", XK_F1 + 10),
    ("F12", XK_F1 + 11),
];

fn lookup_name(name: &str) -> Option<u32> {
    KEYSYM_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
}

/// Resolve a key token to an X11 keysym.
///
/// Resolution order: alias table → single letter/digit → exact keysym name →
/// lowercased keysym name → single Latin-1 character. Returns `None` for
/// anything unresolvable; no event must be emitted in that case.
pub fn resolve_keysym(token: &str) -> Option<u32> {
    let lowered = token.to_ascii_lowercase();
    if let Some((_, sym)) = ALIASES.iter().find(|(name, _)| *name == lowered) {
        return Some(*sym);
    }

    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() {
            // Keyboard mappings list the lowercase keysym, so fold case here.
            return Some(c.to_ascii_lowercase() as u32);
        }
    }

    if let Some(sym) = lookup_name(token) {
        return Some(sym);
    }
    if let Some(sym) = lookup_name(&lowered) {
        return Some(sym);
    }

    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if (c as u32) <= 0xff {
            return Some(c as u32);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_aliases_are_case_insensitive() {
        for token in ["Up", "up", "UP", "ArrowUp", "arrowup"] {
            assert_eq!(resolve_keysym(token), Some(XK_UP), "token {token:?}");
        }
        assert_eq!(resolve_keysym("ArrowLeft"), Some(XK_LEFT));
        assert_eq!(resolve_keysym("esc"), resolve_keysym("Escape"));
    }

    #[test]
    fn letters_and_digits_resolve() {
        assert_eq!(resolve_keysym("w"), Some('w' as u32));
        assert_eq!(resolve_keysym("W"), Some('w' as u32));
        assert_eq!(resolve_keysym("5"), Some('5' as u32));
    }

    #[test]
    fn keysym_names_resolve() {
        assert_eq!(resolve_keysym("Return"), Some(XK_RETURN));
        assert_eq!(resolve_keysym("F10"), Some(XK_F1 + 9));
        assert_eq!(resolve_keysym("Shift_L"), Some(XK_SHIFT_L));
    }

    #[test]
    fn single_char_fallback() {
        assert_eq!(resolve_keysym(","), Some(',' as u32));
        assert_eq!(resolve_keysym(";"), Some(';' as u32));
    }

    #[test]
    fn unresolvable_tokens_yield_none() {
        assert_eq!(resolve_keysym("notakey"), None);
        assert_eq!(resolve_keysym("…"), None);
    }

    #[test]
    fn action_suffix_variants() {
        let down = parse_payload(b"k:down").unwrap();
        let press = parse_payload(b"k:press").unwrap();
        assert_eq!(down, press);
        assert_eq!(down.action, KeyAction::Press);

        let up = parse_payload(b"k:UP").unwrap();
        assert_eq!(up.action, KeyAction::Release);
        assert_eq!(up.token, "k");

        let tap = parse_payload(b"k").unwrap();
        assert_eq!(tap.action, KeyAction::Tap);
    }

    #[test]
    fn key_prefix_is_stripped() {
        let req = parse_payload(b"key:Escape").unwrap();
        assert_eq!(req.token, "Escape");
        assert_eq!(req.action, KeyAction::Tap);

        let req = parse_payload(b"KEY:w:down").unwrap();
        assert_eq!(req.token, "w");
        assert_eq!(req.action, KeyAction::Press);
    }

    #[test]
    fn whitespace_is_trimmed() {
        let req = parse_payload(b"  up\n").unwrap();
        assert_eq!(req.token, "up");
    }

    #[test]
    fn empty_and_garbage_payloads_rejected() {
        assert!(parse_payload(b"").is_err());
        assert!(parse_payload(b"   \n").is_err());
        assert!(parse_payload(&[0xff, 0xfe]).is_err());
        assert!(parse_payload(b"key:").is_err());
    }

    #[test]
    fn colon_token_is_not_an_action_split() {
        // A trailing suffix that is not an action word stays in the token.
        let req = parse_payload(b"a:b").unwrap();
        assert_eq!(req.token, "a:b");
        assert_eq!(req.action, KeyAction::Tap);
    }
}
