// Copyright 2019 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Platform specific implementations.
//!
//! Every backend implements [`NativeDisplay`] (the connection and its event stream) and
//! [`NativeWindow`] (one native window). All policy lives above this line, in
//! [`PlatformWindow`](crate::PlatformWindow) and [`MessageQueue`](crate::MessageQueue); a
//! backend only translates requests and events.

use std::any::Any;
use std::os::raw::c_void;

use crate::clipboard::{ClipboardContents, ClipboardImage};
use crate::description::{Decorations, WindowDescription, WindowKind};
use crate::error::Error;
use crate::input::{KeyboardEvent, MouseButton};
use crate::keyboard_types::Modifiers;
use crate::kurbo::{Insets, Point, Rect, Size, Vec2};
use crate::site::NativeMessage;

pub mod error;
pub mod headless;

#[cfg(any(
    target_os = "windows",
    all(feature = "x11", any(target_os = "linux", target_os = "freebsd"))
))]
mod shared;

#[cfg(all(feature = "x11", any(target_os = "linux", target_os = "freebsd")))]
pub(crate) mod x11;

#[cfg(target_os = "windows")]
pub(crate) mod windows;

/// Identifies a native window within its display connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub(crate) u64);

impl WindowId {
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

/// A pixel format chosen before the window exists.
///
/// On X11 the GL visual decides the window's depth and colormap, so it has to be picked
/// first. Backends that choose the format afterwards ignore it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisualInfo {
    pub visual_id: u32,
    pub depth: u8,
    /// Alpha mask of the visual's render format, 0 when the visual has no alpha.
    pub alpha_mask: u16,
}

/// The raw handle of a native window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawWindow {
    Xlib { window: u32 },
    Win32 { hwnd: *mut c_void },
    Headless { id: u64 },
}

/// The raw handle of a display connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawDisplay {
    Xlib { display: *mut c_void, screen: i32 },
    Win32,
    Headless,
}

/// Everything a backend needs to allocate a window.
pub struct NativeWindowParams<'a> {
    pub description: &'a WindowDescription,
    /// The client area, in screen pixels.
    pub client: Rect,
    pub visual: Option<VisualInfo>,
    pub owner: Option<RawWindow>,
}

/// Size constraints in client pixels. `None` leaves the constraint unset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SizeHints {
    pub min: Option<Size>,
    pub max: Option<Size>,
}

/// Ways of asking the window manager for frame decorations, most expressive first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecorationTier {
    /// Window types and states from the extended window manager hints.
    Extended,
    /// `_MOTIF_WM_HINTS`.
    Motif,
    /// KDE and GNOME specific hints.
    Legacy,
}

impl DecorationTier {
    pub const ALL: [DecorationTier; 3] = [
        DecorationTier::Extended,
        DecorationTier::Motif,
        DecorationTier::Legacy,
    ];
}

/// Window state as reported by the window manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WmState {
    pub minimized: bool,
    pub maximized: bool,
    pub fullscreen: bool,
}

/// A state change the window asks the window manager for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateRequest {
    Minimize,
    Maximize,
    Restore,
    Fullscreen(bool),
}

/// Premultiplied BGRA pixels for a layered window, top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayeredImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Per-pixel alpha of the last presented frame, top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlphaMask {
    pub width: u32,
    pub height: u32,
    pub alpha: Vec<u8>,
}

impl AlphaMask {
    /// Alpha at a client pixel; pixels outside the mask are transparent.
    pub fn alpha_at(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0;
        }
        let index = y as usize * self.width as usize + x as usize;
        self.alpha.get(index).copied().unwrap_or(0)
    }

    /// The bounding box of every pixel whose alpha reaches `threshold`.
    pub fn opaque_bounds(&self, threshold: u8) -> Option<Rect> {
        let mut bounds: Option<Rect> = None;
        for (index, alpha) in self.alpha.iter().enumerate() {
            if *alpha < threshold || self.width == 0 {
                continue;
            }
            let x = (index % self.width as usize) as f64;
            let y = (index / self.width as usize) as f64;
            let pixel = Rect::new(x, y, x + 1.0, y + 1.0);
            bounds = Some(bounds.map_or(pixel, |b| b.union(pixel)));
        }
        bounds
    }
}

/// A backend-neutral window event.
///
/// Positions are client coordinates in pixels.
#[derive(Clone, Debug, PartialEq)]
pub enum NativeEvent {
    Mapped,
    Unmapped,
    /// The client area now covers `rect`, in screen pixels.
    Configured { rect: Rect },
    /// The window manager state properties changed.
    StateChanged,
    CloseRequested,
    FocusIn,
    FocusOut,
    Expose(Rect),
    Key(KeyboardEvent),
    Button {
        pos: Point,
        button: MouseButton,
        down: bool,
        mods: Modifiers,
    },
    Motion {
        pos: Point,
        mods: Modifiers,
    },
    Wheel {
        pos: Point,
        delta: Vec2,
        mods: Modifiers,
    },
    /// Another client took over the clipboard.
    ClipboardLost,
}

impl NativeEvent {
    /// Whether this is a pointer event subject to mouse capture.
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            NativeEvent::Button { .. } | NativeEvent::Motion { .. } | NativeEvent::Wheel { .. }
        )
    }

    pub(crate) fn offset_pointer(&mut self, offset: Vec2) {
        match self {
            NativeEvent::Button { pos, .. }
            | NativeEvent::Motion { pos, .. }
            | NativeEvent::Wheel { pos, .. } => *pos += offset,
            _ => {}
        }
    }
}

/// A connection to a native display.
pub trait NativeDisplay {
    fn create_window(&self, params: &NativeWindowParams) -> Result<Box<dyn NativeWindow>, Error>;

    /// Returns the next pending event without blocking.
    fn next_event(&self) -> Option<(WindowId, NativeEvent)>;

    /// Whether [`next_event`](NativeDisplay::next_event) would return something.
    fn has_pending(&self) -> bool;

    /// Sends buffered requests.
    fn flush(&self) {}

    /// The file descriptor to poll for incoming events, if the connection has one.
    #[cfg(unix)]
    fn connection_fd(&self) -> Option<std::os::unix::io::RawFd> {
        None
    }

    /// The bounds of a monitor in pixels; unknown monitors give the primary one.
    fn screen_rect(&self, monitor: usize) -> Rect;

    /// Pixel density of the primary monitor.
    fn ppi(&self) -> f64;

    fn raw_display(&self) -> RawDisplay;

    fn as_any(&self) -> &dyn Any;
}

/// One native window.
///
/// Requests are fire and forget: the outcome arrives later as a [`NativeEvent`].
pub trait NativeWindow {
    fn id(&self) -> WindowId;

    fn raw_handle(&self) -> RawWindow;

    fn border_width(&self) -> f64 {
        0.0
    }

    fn map(&self, activate: bool);

    fn unmap(&self);

    /// Places the window frame at `frame_origin` with a client area of `client_size`.
    fn move_resize(&self, frame_origin: Point, client_size: Size);

    fn set_size_hints(&self, hints: &SizeHints);

    /// Asks for `decorations` through one tier. Returns `false` if the tier is not available.
    fn apply_decorations(&self, tier: DecorationTier, decorations: &Decorations) -> bool;

    /// Sets the first kind from `chain` the backend supports and returns it.
    fn set_kind(&self, chain: &[WindowKind]) -> WindowKind;

    /// Decoration sizes as reported by the window manager.
    fn probe_frame_extents(&self) -> Option<Insets>;

    /// `None` if the state could not be read.
    fn query_state(&self) -> Option<WmState>;

    fn request_state(&self, request: StateRequest);

    fn set_title(&self, title: &str);

    fn set_enabled(&self, enabled: bool);

    fn raise(&self);

    fn lower(&self);

    fn focus(&self);

    fn has_focus(&self) -> bool;

    fn set_pointer_grab(&self, grab: bool);

    fn set_cursor_visible(&self, visible: bool);

    /// The client area as the platform currently sees it, in screen pixels.
    fn client_rect(&self) -> Option<Rect>;

    /// Pushes a frame to a layered window without composition.
    fn update_layered(&self, image: &LayeredImage) -> Result<(), Error>;

    fn composition_enabled(&self) -> bool {
        false
    }

    /// Restricts hit testing to the visible part of a composited window.
    fn set_hit_region(&self, _region: Option<Rect>) {}

    /// Asks for an expose event over `rect`.
    fn request_expose(&self, rect: Rect);

    /// Takes the clipboard over with `contents`.
    fn claim_clipboard(&self, contents: &ClipboardContents) -> bool;

    /// Clipboard text owned by another client.
    fn fetch_clipboard_text(&self) -> Option<String>;

    fn fetch_clipboard_image(&self) -> Option<ClipboardImage> {
        None
    }

    /// Installs the hook that sees raw platform messages before the backend handles them.
    ///
    /// The hook returns `true` for messages it consumed.
    fn set_message_filter(&self, _filter: MessageFilter) {}

    fn destroy(&self);

    fn as_any(&self) -> &dyn Any;
}

/// See [`NativeWindow::set_message_filter`].
pub type MessageFilter = Box<dyn Fn(&NativeMessage) -> bool>;

/// Opens the native display for this platform.
pub(crate) fn open_default() -> Result<Box<dyn NativeDisplay>, Error> {
    cfg_if::cfg_if! {
        if #[cfg(all(feature = "x11", any(target_os = "linux", target_os = "freebsd")))] {
            let display = x11::display::Display::open()?;
            tracing::debug!("Selected X11 backend");
            Ok(Box::new(display))
        } else if #[cfg(target_os = "windows")] {
            let display = windows::display::Display::open()?;
            tracing::debug!("Selected Win32 backend");
            Ok(Box::new(display))
        } else {
            Err(Error::NoDisplay)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_mask_lookup() {
        let mask = AlphaMask {
            width: 3,
            height: 2,
            alpha: vec![0, 0, 0, 0, 255, 9],
        };
        assert_eq!(mask.alpha_at(1, 1), 255);
        assert_eq!(mask.alpha_at(2, 1), 9);
        assert_eq!(mask.alpha_at(3, 0), 0);
        assert_eq!(mask.alpha_at(-1, 0), 0);
        assert_eq!(mask.opaque_bounds(10), Some(Rect::new(1.0, 1.0, 2.0, 2.0)));
        assert_eq!(mask.opaque_bounds(0), Some(Rect::new(0.0, 0.0, 3.0, 2.0)));
    }

    #[test]
    fn pointer_offset_only_moves_pointer_events() {
        let mut motion = NativeEvent::Motion {
            pos: Point::new(5.0, 5.0),
            mods: Modifiers::empty(),
        };
        motion.offset_pointer(Vec2::new(10.0, -5.0));
        assert_eq!(
            motion,
            NativeEvent::Motion {
                pos: Point::new(15.0, 0.0),
                mods: Modifiers::empty(),
            }
        );
        let mut expose = NativeEvent::Expose(Rect::ZERO);
        expose.offset_pointer(Vec2::new(1.0, 1.0));
        assert_eq!(expose, NativeEvent::Expose(Rect::ZERO));
    }
}
