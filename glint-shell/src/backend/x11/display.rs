// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! The X11 display connection and its event stream.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;

use anyhow::Context;
use tracing::{debug, error, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::{ReplyError, ReplyOrIdError};
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    self, Atom, AtomEnum, ClientMessageEvent, ConnectionExt, Cursor, EventMask, NotifyMode,
    Screen, Timestamp, Window,
};
use x11rb::protocol::Event;
use x11rb::resource_manager::new_from_default as new_resource_db_from_default;
use x11rb::xcb_ffi::XCBConnection;

use super::selection::Selection;
use super::util;
use super::window::X11Window;
use super::xlib::XlibDisplay;
use crate::backend::shared::keycodes;
use crate::backend::{
    NativeDisplay, NativeEvent, NativeWindow, NativeWindowParams, RawDisplay, WindowId,
};
use crate::error::Error;
use crate::input::KeyboardEvent;
use crate::keyboard_types::{KeyState, Modifiers};
use crate::kurbo::{Point, Rect, Vec2};

// Atoms every window needs. They are created if the server does not know them yet.
//
// _NET_WM_PING lets the window manager check that we still answer, WM_DELETE_WINDOW turns
// the close button into a message. The _NET_WM_STATE and _NET_WM_WINDOW_TYPE families are
// only used when _NET_SUPPORTED lists them. GLINT_SELECTION is the property clipboard
// conversions are delivered into.
x11rb::atom_manager! {
    pub(crate) Atoms: AtomsCookie {
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        WM_STATE,
        WM_CHANGE_STATE,
        _NET_WM_PING,
        _NET_WM_PID,
        _NET_WM_NAME,
        _NET_SUPPORTED,
        _NET_WM_STATE,
        _NET_WM_STATE_HIDDEN,
        _NET_WM_STATE_MAXIMIZED_HORZ,
        _NET_WM_STATE_MAXIMIZED_VERT,
        _NET_WM_STATE_FULLSCREEN,
        _NET_WM_STATE_ABOVE,
        _NET_FRAME_EXTENTS,
        _NET_REQUEST_FRAME_EXTENTS,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_NORMAL,
        _NET_WM_WINDOW_TYPE_DIALOG,
        _NET_WM_WINDOW_TYPE_UTILITY,
        _NET_WM_WINDOW_TYPE_TOOLTIP,
        _NET_WM_WINDOW_TYPE_POPUP_MENU,
        _NET_WM_WINDOW_TYPE_COMBO,
        _NET_WM_WINDOW_TYPE_DROPDOWN_MENU,
        UTF8_STRING,
        CLIPBOARD,
        TARGETS,
        INCR,
        GLINT_SELECTION,
        GLINT_IMAGE: b"image/x-glint-rgba",
    }
}

/// Atoms that only mean something if a running client already created them.
#[derive(Debug, Default)]
pub(crate) struct LegacyAtoms {
    pub motif_wm_hints: Option<Atom>,
    pub kde_override: Option<Atom>,
    pub win_hints: Option<Atom>,
}

impl LegacyAtoms {
    fn intern(conn: &XCBConnection) -> Result<LegacyAtoms, ReplyOrIdError> {
        let existing = |name: &[u8]| -> Result<Option<Atom>, ReplyOrIdError> {
            let atom = conn.intern_atom(true, name)?.reply()?.atom;
            Ok((atom != x11rb::NONE).then_some(atom))
        };
        Ok(LegacyAtoms {
            motif_wm_hints: existing(b"_MOTIF_WM_HINTS")?,
            kde_override: existing(b"_KDE_NET_WM_WINDOW_TYPE_OVERRIDE")?,
            win_hints: existing(b"_WIN_HINTS")?,
        })
    }
}

/// State shared between the display and its windows.
pub(crate) struct DisplayInner {
    // Dropped before `xlib`, which owns the underlying connection.
    pub(crate) conn: XCBConnection,
    xlib: XlibDisplay,
    pub(crate) screen_num: usize,
    pub(crate) atoms: Atoms,
    pub(crate) legacy: LegacyAtoms,
    /// Atoms listed in the root window's `_NET_SUPPORTED`.
    pub(crate) supported: HashSet<Atom>,
    /// Events read while waiting for something else.
    pub(crate) pending: RefCell<VecDeque<Event>>,
    pub(crate) selection: RefCell<Selection>,
    /// Newest server timestamp seen.
    pub(crate) timestamp: Cell<Timestamp>,
    ppi: f64,
    hidden_cursor: Cell<Option<Cursor>>,
    /// Keycode and time of the last release swallowed as half of an autorepeat pair.
    last_release: Cell<Option<(u8, Timestamp)>>,
}

impl DisplayInner {
    pub(crate) fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }

    pub(crate) fn root(&self) -> Window {
        self.screen().root
    }

    pub(crate) fn supports(&self, atom: Atom) -> bool {
        self.supported.contains(&atom)
    }

    /// Whether a compositing manager owns `_NET_WM_CM_Sn`.
    pub(crate) fn composition_enabled(&self) -> bool {
        let name = format!("_NET_WM_CM_S{}", self.screen_num);
        let owner = self
            .conn
            .intern_atom(false, name.as_bytes())
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .and_then(|reply| self.conn.get_selection_owner(reply.atom).ok())
            .and_then(|cookie| cookie.reply().ok())
            .map(|reply| reply.owner);
        matches!(owner, Some(owner) if owner != x11rb::NONE)
    }

    /// A fully transparent cursor, created on first use.
    pub(crate) fn hidden_cursor(&self) -> Result<Cursor, ReplyOrIdError> {
        if let Some(cursor) = self.hidden_cursor.get() {
            return Ok(cursor);
        }
        let pixmap = self.conn.generate_id()?;
        self.conn.create_pixmap(1, pixmap, self.root(), 1, 1)?;
        let cursor = self.conn.generate_id()?;
        self.conn
            .create_cursor(cursor, pixmap, pixmap, 0, 0, 0, 0, 0, 0, 0, 0)?;
        self.conn.free_pixmap(pixmap)?;
        self.hidden_cursor.set(Some(cursor));
        Ok(cursor)
    }

    fn update_timestamp(&self, event: &Event) {
        if !event.server_generated() {
            return;
        }
        let time = match event {
            Event::KeyPress(ev) => ev.time,
            Event::KeyRelease(ev) => ev.time,
            Event::ButtonPress(ev) => ev.time,
            Event::ButtonRelease(ev) => ev.time,
            Event::MotionNotify(ev) => ev.time,
            Event::PropertyNotify(ev) => ev.time,
            _ => return,
        };
        self.timestamp.set(time);
    }

    fn read_event(&self) -> Option<Event> {
        if let Some(event) = self.pending.borrow_mut().pop_front() {
            return Some(event);
        }
        match self.conn.poll_for_event() {
            Ok(event) => event,
            Err(e) => {
                error!("X11 connection failed: {}", e);
                None
            }
        }
    }

    /// Whether the next event is the press half of an autorepeat pair.
    fn is_autorepeat(&self, release: &xproto::KeyReleaseEvent) -> bool {
        if self.pending.borrow().is_empty() {
            match self.conn.poll_for_event() {
                Ok(Some(event)) => self.pending.borrow_mut().push_back(event),
                _ => return false,
            }
        }
        matches!(
            self.pending.borrow().front(),
            Some(Event::KeyPress(press))
                if press.event == release.event
                    && press.detail == release.detail
                    && press.time == release.time
        )
    }

    fn translate(&self, event: Event) -> Option<(WindowId, NativeEvent)> {
        let atoms = &self.atoms;
        let id = |window: Window| WindowId(u64::from(window));
        match event {
            Event::Expose(ev) => Some((
                id(ev.window),
                NativeEvent::Expose(Rect::from_origin_size(
                    (f64::from(ev.x), f64::from(ev.y)),
                    (f64::from(ev.width), f64::from(ev.height)),
                )),
            )),
            Event::ConfigureNotify(ev) => {
                let origin = self
                    .conn
                    .translate_coordinates(ev.window, self.root(), 0, 0)
                    .ok()
                    .and_then(|cookie| cookie.reply().ok())
                    .map(|reply| (f64::from(reply.dst_x), f64::from(reply.dst_y)))
                    .unwrap_or((f64::from(ev.x), f64::from(ev.y)));
                let rect = Rect::from_origin_size(
                    origin,
                    (f64::from(ev.width), f64::from(ev.height)),
                );
                Some((id(ev.window), NativeEvent::Configured { rect }))
            }
            Event::MapNotify(ev) => Some((id(ev.window), NativeEvent::Mapped)),
            Event::UnmapNotify(ev) => Some((id(ev.window), NativeEvent::Unmapped)),
            Event::PropertyNotify(ev) => {
                (ev.atom == atoms._NET_WM_STATE || ev.atom == atoms.WM_STATE)
                    .then(|| (id(ev.window), NativeEvent::StateChanged))
            }
            Event::FocusIn(ev) if !is_grab_mode(ev.mode) => {
                Some((id(ev.event), NativeEvent::FocusIn))
            }
            Event::FocusOut(ev) if !is_grab_mode(ev.mode) => {
                Some((id(ev.event), NativeEvent::FocusOut))
            }
            Event::KeyPress(ev) | Event::KeyRelease(ev) => {
                let down = ev.response_type & 0x7f == xproto::KEY_PRESS_EVENT;
                if !down && self.is_autorepeat(&ev) {
                    self.last_release.set(Some((ev.detail, ev.time)));
                    return None;
                }
                let mods = util::key_mods(ev.state);
                let code = keycodes::x11_keycode_to_code(ev.detail);
                let repeat = down && self.key_was_repeated(&ev);
                Some((
                    id(ev.event),
                    NativeEvent::Key(KeyboardEvent {
                        state: if down { KeyState::Down } else { KeyState::Up },
                        code,
                        key: keycodes::code_to_key(code, mods),
                        mods,
                        repeat,
                    }),
                ))
            }
            Event::ButtonPress(ev) | Event::ButtonRelease(ev) => {
                let down = ev.response_type & 0x7f == xproto::BUTTON_PRESS_EVENT;
                let pos = Point::new(f64::from(ev.event_x), f64::from(ev.event_y));
                let mods = util::key_mods(ev.state);
                if (4..=7).contains(&ev.detail) {
                    // Wheel ticks come as press/release pairs; the release carries nothing.
                    if !down {
                        return None;
                    }
                    let shift = mods.contains(Modifiers::SHIFT);
                    let delta = match ev.detail {
                        4 if shift => Vec2::new(-120.0, 0.0),
                        4 => Vec2::new(0.0, -120.0),
                        5 if shift => Vec2::new(120.0, 0.0),
                        5 => Vec2::new(0.0, 120.0),
                        6 => Vec2::new(-120.0, 0.0),
                        _ => Vec2::new(120.0, 0.0),
                    };
                    return Some((id(ev.event), NativeEvent::Wheel { pos, delta, mods }));
                }
                Some((
                    id(ev.event),
                    NativeEvent::Button {
                        pos,
                        button: util::mouse_button(ev.detail),
                        down,
                        mods,
                    },
                ))
            }
            Event::MotionNotify(ev) => Some((
                id(ev.event),
                NativeEvent::Motion {
                    pos: Point::new(f64::from(ev.event_x), f64::from(ev.event_y)),
                    mods: util::key_mods(ev.state),
                },
            )),
            Event::ClientMessage(ev) => self.handle_client_message(ev),
            Event::SelectionRequest(ev) => {
                if let Err(e) = self
                    .selection
                    .borrow()
                    .handle_request(&self.conn, atoms, &ev)
                {
                    warn!("failed to answer a clipboard request: {}", e);
                }
                None
            }
            Event::SelectionClear(ev) => self
                .selection
                .borrow_mut()
                .handle_clear(atoms, &ev)
                .map(|window| (id(window), NativeEvent::ClipboardLost)),
            Event::Error(e) => {
                error!("X11 error: {:?}", e);
                None
            }
            _ => None,
        }
    }

    fn key_was_repeated(&self, press: &xproto::KeyPressEvent) -> bool {
        let last = self.last_release.replace(None);
        matches!(last, Some((detail, time)) if detail == press.detail && time == press.time)
    }

    fn handle_client_message(&self, ev: ClientMessageEvent) -> Option<(WindowId, NativeEvent)> {
        let atoms = &self.atoms;
        if ev.type_ != atoms.WM_PROTOCOLS || ev.format != 32 {
            return None;
        }
        let protocol = ev.data.as_data32()[0];
        if protocol == atoms.WM_DELETE_WINDOW {
            return Some((WindowId(u64::from(ev.window)), NativeEvent::CloseRequested));
        }
        if protocol == atoms._NET_WM_PING {
            let root = self.root();
            let reply = ClientMessageEvent { window: root, ..ev };
            log_x11!(self.conn.send_event(
                false,
                root,
                EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
                reply,
            ));
        }
        None
    }
}

fn is_grab_mode(mode: NotifyMode) -> bool {
    mode == NotifyMode::GRAB || mode == NotifyMode::UNGRAB
}

/// The connection to an X server.
pub(crate) struct Display {
    inner: Rc<DisplayInner>,
}

impl Display {
    pub(crate) fn open() -> Result<Display, Error> {
        let xlib = XlibDisplay::open().map_err(|e| {
            warn!("failed to open the X display: {}", e);
            Error::NoDisplay
        })?;
        let conn = unsafe { XCBConnection::from_raw_xcb_connection(xlib.xcb_connection(), false) }
            .map_err(super::error::Error::from)?;
        let screen_num = usize::try_from(xlib.screen()).unwrap_or(0);
        let atoms = Atoms::new(&conn)
            .map_err(ReplyError::from)
            .and_then(|cookie| cookie.reply())
            .map_err(super::error::Error::from)?;
        let legacy = LegacyAtoms::intern(&conn).context("intern legacy window manager atoms")?;
        let root = conn.setup().roots[screen_num].root;
        let supported = read_supported(&conn, root, atoms._NET_SUPPORTED);
        debug!("window manager supports {} hints", supported.len());
        let ppi = read_ppi(&conn, &conn.setup().roots[screen_num]);

        Ok(Display {
            inner: Rc::new(DisplayInner {
                conn,
                xlib,
                screen_num,
                atoms,
                legacy,
                supported,
                pending: Default::default(),
                selection: Default::default(),
                timestamp: Cell::new(x11rb::CURRENT_TIME),
                ppi,
                hidden_cursor: Cell::new(None),
                last_release: Cell::new(None),
            }),
        })
    }
}

impl NativeDisplay for Display {
    fn create_window(&self, params: &NativeWindowParams) -> Result<Box<dyn NativeWindow>, Error> {
        let window = X11Window::create(&self.inner, params)?;
        Ok(Box::new(window))
    }

    fn next_event(&self) -> Option<(WindowId, NativeEvent)> {
        while let Some(event) = self.inner.read_event() {
            self.inner.update_timestamp(&event);
            if let Some(translated) = self.inner.translate(event) {
                return Some(translated);
            }
        }
        None
    }

    fn has_pending(&self) -> bool {
        if !self.inner.pending.borrow().is_empty() {
            return true;
        }
        match self.inner.conn.poll_for_event() {
            Ok(Some(event)) => {
                self.inner.pending.borrow_mut().push_back(event);
                true
            }
            _ => false,
        }
    }

    fn flush(&self) {
        log_x11!(self.inner.conn.flush());
    }

    fn connection_fd(&self) -> Option<RawFd> {
        Some(self.inner.conn.as_raw_fd())
    }

    fn screen_rect(&self, monitor: usize) -> Rect {
        let monitors = match read_monitors(&self.inner.conn, self.inner.screen()) {
            Ok(monitors) => monitors,
            Err(e) => {
                error!("failed to list monitors: {}", e);
                Vec::new()
            }
        };
        let screen = self.inner.screen();
        let whole = Rect::from_origin_size(
            (0.0, 0.0),
            (
                f64::from(screen.width_in_pixels),
                f64::from(screen.height_in_pixels),
            ),
        );
        monitors
            .get(monitor)
            .or_else(|| monitors.iter().find(|(primary, _)| *primary))
            .map(|(_, rect)| *rect)
            .unwrap_or(whole)
    }

    fn ppi(&self) -> f64 {
        self.inner.ppi
    }

    fn raw_display(&self) -> RawDisplay {
        RawDisplay::Xlib {
            display: self.inner.xlib.as_ptr(),
            screen: self.inner.xlib.screen(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn read_supported(conn: &XCBConnection, root: Window, net_supported: Atom) -> HashSet<Atom> {
    let reply = conn
        .get_property(false, root, net_supported, AtomEnum::ATOM, 0, u32::MAX)
        .ok()
        .and_then(|cookie| cookie.reply().ok());
    reply
        .and_then(|reply| reply.value32().map(|atoms| atoms.collect()))
        .unwrap_or_default()
}

/// Pixel density: `GLINT_X11_DPI`, then `Xft.dpi`, then the physical screen size.
fn read_ppi(conn: &XCBConnection, screen: &Screen) -> f64 {
    if let Ok(value) = std::env::var("GLINT_X11_DPI") {
        match value.parse::<f64>() {
            Ok(dpi) if dpi > 0.0 => return dpi,
            _ => warn!("ignoring invalid GLINT_X11_DPI {:?}", value),
        }
    }
    match new_resource_db_from_default(conn).map(|db| db.get_value::<f64>("Xft.dpi", "")) {
        Ok(Ok(Some(dpi))) if dpi > 0.0 => return dpi,
        Ok(Err(e)) => warn!("unable to parse Xft.dpi: {:?}", e),
        _ => {}
    }
    if screen.width_in_millimeters > 0 {
        f64::from(screen.width_in_pixels) * 25.4 / f64::from(screen.width_in_millimeters)
    } else {
        96.0
    }
}

/// Monitor bounds and whether each one is the primary.
fn read_monitors(
    conn: &XCBConnection,
    screen: &Screen,
) -> Result<Vec<(bool, Rect)>, ReplyOrIdError> {
    let randr_1_5 = conn
        .extension_information(randr::X11_EXTENSION_NAME)?
        .is_some()
        && {
            let version = conn.randr_query_version(1, 5)?.reply()?;
            (version.major_version, version.minor_version) >= (1, 5)
        };
    if !randr_1_5 {
        return Ok(Vec::new());
    }
    Ok(conn
        .randr_get_monitors(screen.root, true)?
        .reply()?
        .monitors
        .iter()
        .map(|info| {
            let rect = Rect::from_origin_size(
                (f64::from(info.x), f64::from(info.y)),
                (f64::from(info.width), f64::from(info.height)),
            );
            (info.primary, rect)
        })
        .collect())
}
