//! X11 window capture and the shared target-window tracking.
//!
//! The target program runs as a normal X11 client, so its window can move,
//! unmap, or lose focus to other windows at any time. [`X11Handle`] therefore
//! re-validates its bound window before every capture and every key
//! injection, re-discovering a suitable one by a depth-first walk of the
//! window tree when needed, and raises + focuses it each time.
//!
//! Pixel data from `GetImage` arrives in the drawable's native format; each
//! channel is extracted via the visual's bit mask and rescaled to 8 bits, so
//! 16-, 24- and 32-bit visuals all normalize to plain RGB.

use anyhow::{bail, Context};
use tracing::{debug, info, warn};

use x11rb::connection::{Connection, RequestConnection as _};
use x11rb::protocol::xproto::{
    ConfigureWindowAux, ConnectionExt as _, ImageFormat, ImageOrder, InputFocus, MapState,
    Screen, StackMode, Visualid, Window, KEY_PRESS_EVENT, KEY_RELEASE_EVENT,
};
use x11rb::protocol::xtest::{self, ConnectionExt as _};
use x11rb::rust_connection::RustConnection;

use doomcast_core::{FRAME_HEIGHT, FRAME_WIDTH, RGB_FRAME_LEN};

use crate::{synthetic, FrameSource};

// ── X11Handle ─────────────────────────────────────────────────────────────────

/// One display connection plus the tracked capture/injection target.
///
/// Capture and input each own their own handle; X11 connections are cheap and
/// independent handles avoid sharing a socket across the two paths.
pub struct X11Handle {
    conn: RustConnection,
    screen: Screen,
    lsb_first: bool,
    target: Option<Window>,
    xtest_supported: bool,
    keymap: Vec<(u32, u8)>,
}

impl X11Handle {
    /// Connect to `display` (or `$DISPLAY` when `None`).
    pub fn connect(display: Option<&str>) -> anyhow::Result<Self> {
        let (conn, screen_num) = x11rb::connect(display).context("X11 connect")?;
        let setup = conn.setup();
        let screen = setup.roots[screen_num].clone();
        let lsb_first = setup.image_byte_order == ImageOrder::LSB_FIRST;

        let xtest_supported = conn
            .extension_information(xtest::X11_EXTENSION_NAME)
            .context("querying XTEST presence")?
            .is_some();
        if !xtest_supported {
            warn!("XTEST extension missing; key injection unavailable on this display");
        }

        let keymap = load_keymap(&conn)?;

        info!(
            "X11 connected (screen {}x{}, xtest={})",
            screen.width_in_pixels, screen.height_in_pixels, xtest_supported
        );

        Ok(Self {
            conn,
            screen,
            lsb_first,
            target: None,
            xtest_supported,
            keymap,
        })
    }

    /// Whether synthetic key injection is available on this connection.
    pub fn xtest_supported(&self) -> bool {
        self.xtest_supported
    }

    /// Translate a keysym to a keycode via the server's keyboard mapping.
    pub fn keycode_for(&self, keysym: u32) -> Option<u8> {
        self.keymap
            .iter()
            .find(|(sym, _)| *sym == keysym)
            .map(|(_, code)| *code)
    }

    // ── Target tracking ───────────────────────────────────────────────────────

    /// Validate (or re-discover) the target window, then raise and focus it.
    ///
    /// The program may lose focus to other windows spawned on the display, so
    /// this runs before every capture and every injection.
    pub fn ensure_target(&mut self) -> anyhow::Result<Window> {
        if let Some(win) = self.target {
            if self.window_presentable(win) {
                self.raise_and_focus(win)?;
                return Ok(win);
            }
            debug!("target window {win:#x} no longer presentable, re-discovering");
            self.target = None;
        }

        let target = match self.discover_target(self.screen.root)? {
            Some(win) => {
                debug!("capture target: window {win:#x}");
                win
            }
            None => {
                debug!("no candidate window found, capturing the root");
                self.screen.root
            }
        };
        self.target = Some(target);
        self.raise_and_focus(target)?;
        Ok(target)
    }

    /// Mapped and at least frame-sized.
    fn window_presentable(&self, win: Window) -> bool {
        let viewable = match self.conn.get_window_attributes(win) {
            Ok(cookie) => match cookie.reply() {
                Ok(attrs) => attrs.map_state == MapState::VIEWABLE,
                Err(_) => false,
            },
            Err(_) => false,
        };
        if !viewable {
            return false;
        }
        let geom = match self.conn.get_geometry(win) {
            Ok(cookie) => match cookie.reply() {
                Ok(geom) => geom,
                Err(_) => return false,
            },
            Err(_) => return false,
        };
        geom.width as usize >= FRAME_WIDTH && geom.height as usize >= FRAME_HEIGHT
    }

    /// Depth-first search below `root`; first presentable window wins.
    fn discover_target(&self, root: Window) -> anyhow::Result<Option<Window>> {
        let tree = self
            .conn
            .query_tree(root)
            .context("query_tree")?
            .reply()
            .context("query_tree reply")?;
        for child in tree.children {
            if self.window_presentable(child) {
                return Ok(Some(child));
            }
            if let Some(found) = self.discover_target(child)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn raise_and_focus(&self, win: Window) -> anyhow::Result<()> {
        // Focusing the root is pointless; skip the requests.
        if win == self.screen.root {
            return Ok(());
        }
        self.conn
            .configure_window(win, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))
            .context("raise window")?;
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, win, x11rb::CURRENT_TIME)
            .context("set input focus")?;
        self.conn.flush().context("flush focus requests")?;
        Ok(())
    }

    // ── Capture ───────────────────────────────────────────────────────────────

    /// Grab one frame from the tracked target into `rgb`.
    pub fn capture_into(&mut self, rgb: &mut [u8]) -> anyhow::Result<()> {
        debug_assert_eq!(rgb.len(), RGB_FRAME_LEN);
        let target = self.ensure_target()?;

        let image = self
            .conn
            .get_image(
                ImageFormat::Z_PIXMAP,
                target,
                0,
                0,
                FRAME_WIDTH as u16,
                FRAME_HEIGHT as u16,
                !0,
            )
            .context("get_image")?
            .reply()
            .context("get_image reply")?;

        let (bits_per_pixel, scanline_pad) = self
            .pixmap_format(image.depth)
            .with_context(|| format!("no pixmap format for depth {}", image.depth))?;
        let (red, green, blue) = self
            .visual_masks(image.visual)
            .with_context(|| format!("unknown visual {:#x}", image.visual))?;

        normalize_pixels(
            &image.data,
            bits_per_pixel,
            scanline_pad,
            self.lsb_first,
            (red, green, blue),
            rgb,
        )
    }

    // ── Key injection ─────────────────────────────────────────────────────────

    /// Emit a synthetic key press or release via XTEST.
    pub fn fake_key(&mut self, keycode: u8, press: bool) -> anyhow::Result<()> {
        if !self.xtest_supported {
            bail!("XTEST not supported on this display");
        }
        let kind = if press {
            KEY_PRESS_EVENT
        } else {
            KEY_RELEASE_EVENT
        };
        self.conn
            .xtest_fake_input(kind, keycode, x11rb::CURRENT_TIME, x11rb::NONE, 0, 0, 0)
            .context("xtest_fake_input")?;
        self.conn.flush().context("flush fake input")?;
        Ok(())
    }

    // ── Format helpers ────────────────────────────────────────────────────────

    fn pixmap_format(&self, depth: u8) -> Option<(u8, u8)> {
        self.conn
            .setup()
            .pixmap_formats
            .iter()
            .find(|f| f.depth == depth)
            .map(|f| (f.bits_per_pixel, f.scanline_pad))
    }

    fn visual_masks(&self, visual: Visualid) -> Option<(u32, u32, u32)> {
        for depth in &self.screen.allowed_depths {
            for v in &depth.visuals {
                if v.visual_id == visual {
                    return Some((v.red_mask, v.green_mask, v.blue_mask));
                }
            }
        }
        None
    }
}

// ── Pixel normalization ───────────────────────────────────────────────────────

/// Convert a ZPixmap image to tightly packed 8-bit RGB using the visual's
/// channel masks. Handles arbitrary channel widths, not just 5/6/5 or 8/8/8.
fn normalize_pixels(
    data: &[u8],
    bits_per_pixel: u8,
    scanline_pad: u8,
    lsb_first: bool,
    (red_mask, green_mask, blue_mask): (u32, u32, u32),
    rgb: &mut [u8],
) -> anyhow::Result<()> {
    let bytes_per_pixel = match bits_per_pixel {
        16 => 2,
        24 => 3,
        32 => 4,
        other => bail!("unsupported bits-per-pixel {other}"),
    };
    let pad_bits = scanline_pad.max(8) as usize;
    let stride = (FRAME_WIDTH * bits_per_pixel as usize).div_ceil(pad_bits) * pad_bits / 8;
    if data.len() < stride * FRAME_HEIGHT {
        bail!(
            "short image data: {} bytes for stride {stride} x {FRAME_HEIGHT} rows",
            data.len()
        );
    }

    for y in 0..FRAME_HEIGHT {
        let row = &data[y * stride..];
        for x in 0..FRAME_WIDTH {
            let px = &row[x * bytes_per_pixel..x * bytes_per_pixel + bytes_per_pixel];
            let mut value: u32 = 0;
            if lsb_first {
                for (i, b) in px.iter().enumerate() {
                    value |= (*b as u32) << (8 * i);
                }
            } else {
                for b in px {
                    value = (value << 8) | *b as u32;
                }
            }
            let idx = (y * FRAME_WIDTH + x) * 3;
            rgb[idx] = extract_channel(value, red_mask);
            rgb[idx + 1] = extract_channel(value, green_mask);
            rgb[idx + 2] = extract_channel(value, blue_mask);
        }
    }
    Ok(())
}

/// Pull one channel out of a pixel and rescale it to 0–255.
fn extract_channel(pixel: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0;
    }
    let shift = mask.trailing_zeros();
    let width = mask.count_ones();
    let value = (pixel & mask) >> shift;
    let max = (1u32 << width) - 1;
    ((value * 255) / max) as u8
}

// ── X11Source ─────────────────────────────────────────────────────────────────

/// [`FrameSource`] over an [`X11Handle`].
///
/// Capture failures are transient: the call falls back to the synthetic
/// pattern and the target is dropped so the next call re-discovers it. This
/// differs from the framebuffer backend's permanent degrade on purpose — an
/// X11 window can come back, a dead device read cannot.
pub struct X11Source {
    handle: X11Handle,
}

impl X11Source {
    pub fn new(handle: X11Handle) -> Self {
        Self { handle }
    }
}

impl FrameSource for X11Source {
    fn capture(&mut self, frame_id: u64, rgb: &mut [u8]) {
        if let Err(e) = self.handle.capture_into(rgb) {
            warn!("X11 capture failed: {e:#}, serving synthetic frame");
            self.handle.target = None;
            synthetic::fill(frame_id, rgb);
        }
    }
}

// ── Keyboard mapping ──────────────────────────────────────────────────────────

/// Flatten the server's keyboard mapping into (keysym, keycode) pairs,
/// keeping the first keycode seen for each keysym.
fn load_keymap(conn: &RustConnection) -> anyhow::Result<Vec<(u32, u8)>> {
    let setup = conn.setup();
    let min = setup.min_keycode;
    let count = setup.max_keycode - min + 1;
    let mapping = conn
        .get_keyboard_mapping(min, count)
        .context("get_keyboard_mapping")?
        .reply()
        .context("get_keyboard_mapping reply")?;

    let per = mapping.keysyms_per_keycode as usize;
    let mut keymap: Vec<(u32, u8)> = Vec::new();
    for (i, syms) in mapping.keysyms.chunks(per).enumerate() {
        let keycode = min + i as u8;
        for &sym in syms {
            if sym != 0 && !keymap.iter().any(|(s, _)| *s == sym) {
                keymap.push((sym, keycode));
            }
        }
    }
    Ok(keymap)
}
