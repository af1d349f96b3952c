//! doomcast-core — shared types, errors, configuration, and the text input
//! protocol spoken on `POST /input`.
//!
//! Everything here is backend-neutral: the framebuffer/X11 capture backends
//! live in `doomcast-capture`, the server itself in `doomcast-server`.

pub mod config;
pub mod errors;
pub mod input;
pub mod types;

pub use config::{CaptureMode, ServerConfig};
pub use errors::{EncodeError, InputError, SessionError};
pub use input::{KeyAction, KeyRequest};
pub use types::{
    FRAME_HEIGHT, FRAME_INTERVAL, FRAME_WIDTH, JPEG_QUALITY, MAX_SESSIONS, RAW_FRAME_LEN,
    RGB_FRAME_LEN, STREAM_BOUNDARY,
};
