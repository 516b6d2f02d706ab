// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! X11 window creation and window manager negotiation.

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::cookie::VoidCookie;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::properties::{WmHints, WmHintsState};
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ColormapAlloc,
    ConfigureWindowAux, ConnectionExt, CreateGCAux, CreateWindowAux, EventMask, ExposeEvent,
    Gcontext, GrabMode, ImageFormat, InputFocus, PropMode, StackMode, Window, WindowClass,
    CLIENT_MESSAGE_EVENT, EXPOSE_EVENT,
};
use x11rb::protocol::Event;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::xcb_ffi::XCBConnection;

use super::display::DisplayInner;
use super::selection;
use super::util;
use crate::backend::{
    DecorationTier, LayeredImage, NativeWindow, NativeWindowParams, RawWindow, SizeHints,
    StateRequest, WindowId, WmState,
};
use crate::clipboard::{ClipboardContents, ClipboardImage};
use crate::description::{Decorations, WindowKind};
use crate::error::Error;
use crate::kurbo::{Insets, Point, Rect, Size};

/// How long the window manager gets to answer `_NET_REQUEST_FRAME_EXTENTS`.
const FRAME_EXTENTS_TIMEOUT: Duration = Duration::from_millis(50);

/// `IconicState` from the ICCCM.
const ICONIC_STATE: u32 = 3;

const NET_WM_STATE_REMOVE: u32 = 0;
const NET_WM_STATE_ADD: u32 = 1;
/// Source indication for requests from normal applications.
const SOURCE_APPLICATION: u32 = 1;

// _MOTIF_WM_HINTS layout.
const MWM_HINTS_FUNCTIONS: u32 = 1;
const MWM_HINTS_DECORATIONS: u32 = 2;
const MWM_FUNC_RESIZE: u32 = 2;
const MWM_FUNC_MOVE: u32 = 4;
const MWM_FUNC_MINIMIZE: u32 = 8;
const MWM_FUNC_MAXIMIZE: u32 = 16;
const MWM_FUNC_CLOSE: u32 = 32;
const MWM_DECOR_BORDER: u32 = 2;
const MWM_DECOR_RESIZEH: u32 = 4;
const MWM_DECOR_TITLE: u32 = 8;
const MWM_DECOR_MENU: u32 = 16;
const MWM_DECOR_MINIMIZE: u32 = 32;
const MWM_DECOR_MAXIMIZE: u32 = 64;

fn event_mask() -> EventMask {
    EventMask::KEY_PRESS
        | EventMask::KEY_RELEASE
        | EventMask::BUTTON_PRESS
        | EventMask::BUTTON_RELEASE
        | EventMask::ENTER_WINDOW
        | EventMask::LEAVE_WINDOW
        | EventMask::POINTER_MOTION
        | EventMask::KEYMAP_STATE
        | EventMask::EXPOSURE
        | EventMask::STRUCTURE_NOTIFY
        | EventMask::FOCUS_CHANGE
        | EventMask::PROPERTY_CHANGE
}

pub(crate) struct X11Window {
    id: Window,
    display: Rc<DisplayInner>,
    gc: Gcontext,
    depth: u8,
    /// Adopted from another client; never destroyed by us.
    foreign: bool,
    kind: Cell<WindowKind>,
    destroyed: Cell<bool>,
}

impl X11Window {
    pub(crate) fn create(
        display: &Rc<DisplayInner>,
        params: &NativeWindowParams,
    ) -> Result<X11Window, Error> {
        let description = params.description;
        let (id, depth, foreign) = match description.handle() {
            Some(RawWindow::Xlib { window }) => {
                let depth = adopt(display, window)?;
                (window, depth, true)
            }
            Some(other) => {
                return Err(Error::WindowCreation(format!(
                    "cannot adopt {other:?} on an X11 display"
                )))
            }
            None => create_native(display, params)?,
        };

        let conn = &display.conn;
        let gc = conn
            .generate_id()
            .map_err(|e| creation_error("allocate graphics context id", e))?;
        check(conn.create_gc(gc, id, &CreateGCAux::new()), "create graphics context")?;

        let window = X11Window {
            id,
            display: Rc::clone(display),
            gc,
            depth,
            foreign,
            kind: Cell::new(WindowKind::Normal),
            destroyed: Cell::new(false),
        };
        if !foreign {
            window.set_identity()?;
            if let Some(RawWindow::Xlib { window: owner }) = params.owner {
                log_x11!(conn.change_property32(
                    PropMode::REPLACE,
                    id,
                    AtomEnum::WM_TRANSIENT_FOR,
                    AtomEnum::WINDOW,
                    &[owner],
                ));
            }
            if description.is_fullscreen() || description.is_topmost() {
                window.set_initial_state(description.is_fullscreen(), description.is_topmost());
            }
        }
        debug!("created X11 window {:#x} (depth {})", id, depth);
        Ok(window)
    }

    fn conn(&self) -> &XCBConnection {
        &self.display.conn
    }

    /// Tells the window manager who owns the window and which protocols it speaks.
    fn set_identity(&self) -> Result<(), Error> {
        let conn = self.conn();
        let atoms = &self.display.atoms;
        let pid = nix::unistd::Pid::this().as_raw();
        if let Ok(pid) = u32::try_from(pid) {
            log_x11!(conn.change_property32(
                PropMode::REPLACE,
                self.id,
                atoms._NET_WM_PID,
                AtomEnum::CARDINAL,
                &[pid],
            ));
        }

        let mut buffer = [0u8; 256];
        if let Ok(hostname) = nix::unistd::gethostname(&mut buffer) {
            log_x11!(conn.change_property8(
                PropMode::REPLACE,
                self.id,
                AtomEnum::WM_CLIENT_MACHINE,
                AtomEnum::STRING,
                hostname.to_bytes(),
            ));
        }

        if let Some(wm_class) = wm_class() {
            log_x11!(conn.change_property8(
                PropMode::REPLACE,
                self.id,
                AtomEnum::WM_CLASS,
                AtomEnum::STRING,
                &wm_class,
            ));
        }

        check(
            conn.change_property32(
                PropMode::REPLACE,
                self.id,
                atoms.WM_PROTOCOLS,
                AtomEnum::ATOM,
                &[atoms.WM_DELETE_WINDOW, atoms._NET_WM_PING],
            ),
            "set WM_PROTOCOLS",
        )
    }

    /// `_NET_WM_STATE` can be written directly while the window is still unmapped.
    fn set_initial_state(&self, fullscreen: bool, topmost: bool) {
        let atoms = &self.display.atoms;
        if !self.display.supports(atoms._NET_WM_STATE) {
            debug!("window manager has no _NET_WM_STATE; initial state ignored");
            return;
        }
        let mut states = Vec::new();
        if fullscreen {
            states.push(atoms._NET_WM_STATE_FULLSCREEN);
        }
        if topmost {
            states.push(atoms._NET_WM_STATE_ABOVE);
        }
        log_x11!(self.conn().change_property32(
            PropMode::REPLACE,
            self.id,
            atoms._NET_WM_STATE,
            AtomEnum::ATOM,
            &states,
        ));
    }

    fn kind_atom(&self, kind: WindowKind) -> Atom {
        let atoms = &self.display.atoms;
        match kind {
            WindowKind::Normal => atoms._NET_WM_WINDOW_TYPE_NORMAL,
            WindowKind::Dialog => atoms._NET_WM_WINDOW_TYPE_DIALOG,
            WindowKind::Utility => atoms._NET_WM_WINDOW_TYPE_UTILITY,
            WindowKind::Tooltip => atoms._NET_WM_WINDOW_TYPE_TOOLTIP,
            WindowKind::PopupMenu => atoms._NET_WM_WINDOW_TYPE_POPUP_MENU,
            WindowKind::Combo => atoms._NET_WM_WINDOW_TYPE_COMBO,
            WindowKind::DropdownMenu => atoms._NET_WM_WINDOW_TYPE_DROPDOWN_MENU,
        }
    }

    /// Sends a client message about this window to the root window.
    fn send_to_root(&self, message_type: Atom, data: [u32; 5]) {
        let root = self.display.root();
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window: self.id,
            type_: message_type,
            data: data.into(),
        };
        log_x11!(self.conn().send_event(
            false,
            root,
            EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
            event,
        ));
    }

    fn change_wm_state(&self, add: bool, first: Atom, second: Atom) {
        let action = if add {
            NET_WM_STATE_ADD
        } else {
            NET_WM_STATE_REMOVE
        };
        self.send_to_root(
            self.display.atoms._NET_WM_STATE,
            [action, first, second, SOURCE_APPLICATION, 0],
        );
    }

    fn set_motif_hints(&self, atom: Atom, decorations: &Decorations) {
        let mut functions = MWM_FUNC_MOVE;
        let mut decor = 0;
        if decorations.border {
            decor |= MWM_DECOR_BORDER;
        }
        if decorations.resize_handles {
            functions |= MWM_FUNC_RESIZE;
            decor |= MWM_DECOR_RESIZEH;
        }
        if decorations.title {
            decor |= MWM_DECOR_TITLE;
        }
        if decorations.menu {
            decor |= MWM_DECOR_MENU;
        }
        if decorations.minimize {
            functions |= MWM_FUNC_MINIMIZE;
            decor |= MWM_DECOR_MINIMIZE;
        }
        if decorations.maximize {
            functions |= MWM_FUNC_MAXIMIZE;
            decor |= MWM_DECOR_MAXIMIZE;
        }
        if decorations.close {
            functions |= MWM_FUNC_CLOSE;
        }
        let hints = [
            MWM_HINTS_FUNCTIONS | MWM_HINTS_DECORATIONS,
            functions,
            decor,
            0,
            0,
        ];
        log_x11!(self
            .conn()
            .change_property32(PropMode::REPLACE, self.id, atom, atom, &hints));
    }

    fn read_atoms(&self, property: Atom) -> Option<Vec<Atom>> {
        let reply = self
            .conn()
            .get_property(false, self.id, property, AtomEnum::ATOM, 0, 64)
            .ok()?
            .reply()
            .ok()?;
        Some(reply.value32().map(|atoms| atoms.collect()).unwrap_or_default())
    }

    fn is_iconic(&self) -> bool {
        let wm_state = self.display.atoms.WM_STATE;
        self.conn()
            .get_property(false, self.id, wm_state, wm_state, 0, 2)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .and_then(|reply| reply.value32().and_then(|mut values| values.next()))
            == Some(ICONIC_STATE)
    }

    /// Waits for the `_NET_FRAME_EXTENTS` property to change, parking other events.
    fn wait_for_frame_extents(&self) -> bool {
        let deadline = Instant::now() + FRAME_EXTENTS_TIMEOUT;
        let frame_extents = self.display.atoms._NET_FRAME_EXTENTS;
        loop {
            match util::wait_for_event_with_deadline(self.conn(), deadline) {
                Ok(Some(Event::PropertyNotify(ev)))
                    if ev.window == self.id && ev.atom == frame_extents =>
                {
                    self.display
                        .pending
                        .borrow_mut()
                        .push_back(Event::PropertyNotify(ev));
                    return true;
                }
                Ok(Some(event)) => self.display.pending.borrow_mut().push_back(event),
                Ok(None) => return false,
                Err(e) => {
                    warn!("X11 connection failed: {}", e);
                    return false;
                }
            }
        }
    }

    fn fetch_clipboard(&self, target: Atom) -> Option<Vec<u8>> {
        let display = &self.display;
        match selection::fetch(
            &display.conn,
            &display.atoms,
            display.screen_num,
            target,
            display.timestamp.get(),
            &display.pending,
        ) {
            Ok(data) => data,
            Err(e) => {
                warn!("clipboard transfer failed: {}", e);
                None
            }
        }
    }
}

impl NativeWindow for X11Window {
    fn id(&self) -> WindowId {
        WindowId(u64::from(self.id))
    }

    fn raw_handle(&self) -> RawWindow {
        RawWindow::Xlib { window: self.id }
    }

    fn map(&self, _activate: bool) {
        log_x11!(self.conn().map_window(self.id));
        log_x11!(self.conn().flush());
    }

    fn unmap(&self) {
        log_x11!(self.conn().unmap_window(self.id));
        log_x11!(self.conn().flush());
    }

    fn move_resize(&self, frame_origin: Point, client_size: Size) {
        let size = client_size.round();
        log_x11!(self.conn().configure_window(
            self.id,
            &ConfigureWindowAux::new()
                .x(frame_origin.x.round() as i32)
                .y(frame_origin.y.round() as i32)
                .width(size.width.max(1.0) as u32)
                .height(size.height.max(1.0) as u32),
        ));
    }

    fn set_size_hints(&self, hints: &SizeHints) {
        log_x11!(util::normal_hints(hints, None).set_normal_hints(self.conn(), self.id));
    }

    fn apply_decorations(&self, tier: DecorationTier, decorations: &Decorations) -> bool {
        let atoms = &self.display.atoms;
        let legacy = &self.display.legacy;
        match tier {
            DecorationTier::Extended => {
                if !self.display.supports(atoms._NET_WM_WINDOW_TYPE) {
                    return false;
                }
                // Window types only know "framed" and "unframed".
                let undecorated_kind = matches!(
                    self.kind.get(),
                    WindowKind::Tooltip
                        | WindowKind::PopupMenu
                        | WindowKind::Combo
                        | WindowKind::DropdownMenu
                );
                if undecorated_kind {
                    !decorations.any()
                } else {
                    *decorations == Decorations::ALL
                }
            }
            DecorationTier::Motif => match legacy.motif_wm_hints {
                Some(atom) => {
                    self.set_motif_hints(atom, decorations);
                    true
                }
                None => false,
            },
            DecorationTier::Legacy => {
                if let (false, Some(kde)) = (decorations.any(), legacy.kde_override) {
                    log_x11!(self.conn().change_property32(
                        PropMode::REPLACE,
                        self.id,
                        atoms._NET_WM_WINDOW_TYPE,
                        AtomEnum::ATOM,
                        &[kde, atoms._NET_WM_WINDOW_TYPE_NORMAL],
                    ));
                    return true;
                }
                match legacy.win_hints {
                    Some(win_hints) => {
                        // GNOME hints carry no decoration bits; clearing them leaves the
                        // frame to the window manager's default.
                        log_x11!(self.conn().change_property32(
                            PropMode::REPLACE,
                            self.id,
                            win_hints,
                            AtomEnum::CARDINAL,
                            &[0],
                        ));
                        true
                    }
                    None => false,
                }
            }
        }
    }

    fn set_kind(&self, chain: &[WindowKind]) -> WindowKind {
        let atoms = &self.display.atoms;
        if !self.display.supports(atoms._NET_WM_WINDOW_TYPE) {
            debug!("_NET_WM_WINDOW_TYPE is not supported; keeping the default window type");
            return WindowKind::Normal;
        }
        let kind = chain
            .iter()
            .copied()
            .find(|kind| self.display.supports(self.kind_atom(*kind)))
            .unwrap_or(WindowKind::Normal);
        log_x11!(self.conn().change_property32(
            PropMode::REPLACE,
            self.id,
            atoms._NET_WM_WINDOW_TYPE,
            AtomEnum::ATOM,
            &[self.kind_atom(kind)],
        ));
        debug!("window {:#x} has type {:?}", self.id, kind);
        self.kind.set(kind);
        kind
    }

    fn probe_frame_extents(&self) -> Option<Insets> {
        let atoms = &self.display.atoms;
        if !self.display.supports(atoms._NET_FRAME_EXTENTS) {
            return None;
        }
        if self.display.supports(atoms._NET_REQUEST_FRAME_EXTENTS) {
            self.send_to_root(atoms._NET_REQUEST_FRAME_EXTENTS, [0; 5]);
            log_x11!(self.conn().flush());
            if !self.wait_for_frame_extents() {
                warn!("window manager did not answer _NET_REQUEST_FRAME_EXTENTS");
            }
        }
        let reply = self
            .conn()
            .get_property(
                false,
                self.id,
                atoms._NET_FRAME_EXTENTS,
                AtomEnum::CARDINAL,
                0,
                4,
            )
            .ok()?
            .reply()
            .ok()?;
        let extents: Vec<f64> = reply.value32()?.map(f64::from).collect();
        match extents[..] {
            [left, right, top, bottom, ..] => Some(Insets::new(left, top, right, bottom)),
            _ => None,
        }
    }

    fn query_state(&self) -> Option<WmState> {
        let atoms = &self.display.atoms;
        let states = self.read_atoms(atoms._NET_WM_STATE)?;
        let has = |atom: Atom| states.contains(&atom);
        let minimized = if self.display.supports(atoms._NET_WM_STATE_HIDDEN) {
            has(atoms._NET_WM_STATE_HIDDEN)
        } else {
            self.is_iconic()
        };
        Some(WmState {
            minimized,
            maximized: has(atoms._NET_WM_STATE_MAXIMIZED_HORZ)
                && has(atoms._NET_WM_STATE_MAXIMIZED_VERT),
            fullscreen: has(atoms._NET_WM_STATE_FULLSCREEN),
        })
    }

    fn request_state(&self, request: StateRequest) {
        let atoms = &self.display.atoms;
        match request {
            StateRequest::Minimize => {
                self.send_to_root(atoms.WM_CHANGE_STATE, [ICONIC_STATE, 0, 0, 0, 0]);
            }
            StateRequest::Maximize => self.change_wm_state(
                true,
                atoms._NET_WM_STATE_MAXIMIZED_HORZ,
                atoms._NET_WM_STATE_MAXIMIZED_VERT,
            ),
            StateRequest::Restore => {
                if self.query_state().map_or(false, |state| state.minimized) {
                    log_x11!(self.conn().map_window(self.id));
                }
                self.change_wm_state(
                    false,
                    atoms._NET_WM_STATE_MAXIMIZED_HORZ,
                    atoms._NET_WM_STATE_MAXIMIZED_VERT,
                );
            }
            StateRequest::Fullscreen(fullscreen) => {
                self.change_wm_state(fullscreen, atoms._NET_WM_STATE_FULLSCREEN, 0)
            }
        }
        log_x11!(self.conn().flush());
    }

    fn set_title(&self, title: &str) {
        let atoms = &self.display.atoms;
        // WM_NAME is nominally Latin-1; _NET_WM_NAME carries the real UTF-8 title.
        log_x11!(self.conn().change_property8(
            PropMode::REPLACE,
            self.id,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            title.as_bytes(),
        ));
        log_x11!(self.conn().change_property8(
            PropMode::REPLACE,
            self.id,
            atoms._NET_WM_NAME,
            atoms.UTF8_STRING,
            title.as_bytes(),
        ));
    }

    fn set_enabled(&self, enabled: bool) {
        let mut hints = WmHints::new();
        hints.input = Some(enabled);
        hints.initial_state = Some(WmHintsState::Normal);
        log_x11!(hints.set(self.conn(), self.id));
    }

    fn raise(&self) {
        log_x11!(self.conn().configure_window(
            self.id,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        ));
    }

    fn lower(&self) {
        log_x11!(self.conn().configure_window(
            self.id,
            &ConfigureWindowAux::new().stack_mode(StackMode::BELOW),
        ));
    }

    fn focus(&self) {
        log_x11!(self
            .conn()
            .set_input_focus(InputFocus::PARENT, self.id, x11rb::CURRENT_TIME));
    }

    fn has_focus(&self) -> bool {
        self.conn()
            .get_input_focus()
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .map_or(false, |reply| reply.focus == self.id)
    }

    fn set_pointer_grab(&self, grab: bool) {
        if grab {
            log_x11!(self.conn().grab_pointer(
                true,
                self.id,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                x11rb::NONE,
                x11rb::CURRENT_TIME,
            ));
        } else {
            log_x11!(self.conn().ungrab_pointer(x11rb::CURRENT_TIME));
        }
    }

    fn set_cursor_visible(&self, visible: bool) {
        let cursor = if visible {
            x11rb::NONE
        } else {
            match self.display.hidden_cursor() {
                Ok(cursor) => cursor,
                Err(e) => {
                    warn!("failed to create the hidden cursor: {}", e);
                    return;
                }
            }
        };
        log_x11!(self.conn().change_window_attributes(
            self.id,
            &ChangeWindowAttributesAux::new().cursor(cursor),
        ));
    }

    fn client_rect(&self) -> Option<Rect> {
        let conn = self.conn();
        let geometry = conn.get_geometry(self.id).ok()?.reply().ok()?;
        let origin = conn
            .translate_coordinates(self.id, geometry.root, 0, 0)
            .ok()?
            .reply()
            .ok()?;
        Some(Rect::from_origin_size(
            (f64::from(origin.dst_x), f64::from(origin.dst_y)),
            (f64::from(geometry.width), f64::from(geometry.height)),
        ))
    }

    fn update_layered(&self, image: &LayeredImage) -> Result<(), Error> {
        let stride = image.width as usize * 4;
        if stride == 0 || image.pixels.len() < stride * image.height as usize {
            return Ok(());
        }
        // Split into strips that fit in one request.
        let max_bytes = self.conn().maximum_request_bytes().saturating_sub(24);
        let rows_per_strip = (max_bytes / stride).max(1);
        for (strip, rows) in image.pixels.chunks(stride * rows_per_strip).enumerate() {
            let height = rows.len() / stride;
            let cookie = self.conn().put_image(
                ImageFormat::Z_PIXMAP,
                self.id,
                self.gc,
                image.width as u16,
                height as u16,
                0,
                (strip * rows_per_strip) as i16,
                0,
                self.depth,
                rows,
            );
            cookie.map_err(|e| super::error::Error::from(ReplyError::from(e)))?;
        }
        Ok(())
    }

    fn composition_enabled(&self) -> bool {
        self.display.composition_enabled()
    }

    fn request_expose(&self, rect: Rect) {
        let rect = rect.expand();
        let event = ExposeEvent {
            response_type: EXPOSE_EVENT,
            sequence: 0,
            window: self.id,
            x: rect.x0.max(0.0) as u16,
            y: rect.y0.max(0.0) as u16,
            width: rect.width() as u16,
            height: rect.height() as u16,
            count: 0,
        };
        log_x11!(self
            .conn()
            .send_event(false, self.id, EventMask::EXPOSURE, event));
    }

    fn claim_clipboard(&self, contents: &ClipboardContents) -> bool {
        let display = &self.display;
        let claimed = display.selection.borrow_mut().claim(
            &display.conn,
            &display.atoms,
            self.id,
            contents.clone(),
            display.timestamp.get(),
        );
        match claimed {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!("failed to take the clipboard: {}", e);
                false
            }
        }
    }

    fn fetch_clipboard_text(&self) -> Option<String> {
        // Converting our own selection would wait on ourselves.
        if let Some(owned) = self.display.selection.borrow().owned() {
            return owned.text.clone();
        }
        let data = self.fetch_clipboard(self.display.atoms.UTF8_STRING)?;
        String::from_utf8(data).ok()
    }

    fn fetch_clipboard_image(&self) -> Option<ClipboardImage> {
        if let Some(owned) = self.display.selection.borrow().owned() {
            return owned.image.clone();
        }
        let data = self.fetch_clipboard(self.display.atoms.GLINT_IMAGE)?;
        ClipboardImage::from_bytes(&data)
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.display.selection.borrow_mut().release(self.id);
        log_x11!(self.conn().free_gc(self.gc));
        if self.foreign {
            log_x11!(self.conn().change_window_attributes(
                self.id,
                &ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT),
            ));
        } else {
            log_x11!(self.conn().destroy_window(self.id));
        }
        log_x11!(self.conn().flush());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Takes over a window created elsewhere and returns its depth.
fn adopt(display: &DisplayInner, window: Window) -> Result<u8, Error> {
    let conn = &display.conn;
    let geometry = conn
        .get_geometry(window)
        .map_err(ReplyError::from)
        .and_then(|cookie| cookie.reply())
        .map_err(|e| creation_error("query adopted window", e))?;
    check(
        conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().event_mask(event_mask()),
        ),
        "select events on adopted window",
    )?;
    debug!("adopted X11 window {:#x}", window);
    Ok(geometry.depth)
}

fn create_native(
    display: &DisplayInner,
    params: &NativeWindowParams,
) -> Result<(Window, u8, bool), Error> {
    let conn = &display.conn;
    let screen = display.screen();
    let description = params.description;
    let id = conn
        .generate_id()
        .map_err(|e| creation_error("allocate window id", e))?;

    let static_popup = description.is_static_popup();
    // Small popups keep what is under them to avoid redraws when they close.
    let save_under =
        description.is_popup() && params.client.width() * params.client.height() < 256.0 * 256.0;
    let mut aux = CreateWindowAux::new()
        .event_mask(event_mask())
        .border_pixel(0)
        .override_redirect(u32::from(static_popup))
        .save_under(u32::from(save_under));

    let (depth, visual) = match params.visual {
        Some(visual) => {
            let depth = util::visual_depth(screen, visual.visual_id).unwrap_or(visual.depth);
            // Windows whose depth differs from the root need their own colormap.
            let colormap = conn
                .generate_id()
                .map_err(|e| creation_error("allocate colormap id", e))?;
            check(
                conn.create_colormap(ColormapAlloc::NONE, colormap, screen.root, visual.visual_id),
                "create colormap",
            )?;
            aux = aux.colormap(colormap);
            (depth, visual.visual_id)
        }
        None => (screen.root_depth, screen.root_visual),
    };

    let client = params.client.round();
    debug!(
        "creating X11 window at {:?} (depth {}, save under {}, override redirect {})",
        client, depth, save_under, static_popup
    );
    check(
        conn.create_window(
            depth,
            id,
            screen.root,
            client.x0 as i16,
            client.y0 as i16,
            client.width().max(1.0) as u16,
            client.height().max(1.0) as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            visual,
            &aux,
        ),
        "create window",
    )?;
    if let Some(colormap) = aux.colormap {
        log_x11!(conn.free_colormap(colormap));
    }
    Ok((id, depth, false))
}

/// `WM_CLASS`: the binary name as instance, capitalized as class.
fn wm_class() -> Option<Vec<u8>> {
    let arg0 = std::env::args_os().next()?;
    let path: &std::path::Path = arg0.as_ref();
    let name = path.file_name()?.to_str()?;
    let mut wm_class = Vec::with_capacity(2 * (name.len() + 1));
    wm_class.extend(name.as_bytes());
    wm_class.push(0);
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        wm_class.extend(first.to_uppercase().to_string().as_bytes());
        wm_class.extend(chars.as_str().as_bytes());
    }
    wm_class.push(0);
    Some(wm_class)
}

fn check(
    request: Result<VoidCookie<'_, XCBConnection>, ConnectionError>,
    what: &str,
) -> Result<(), Error> {
    request
        .map_err(ReplyError::from)
        .and_then(|cookie| cookie.check())
        .map_err(|e| creation_error(what, e))
}

fn creation_error(what: &str, err: impl std::fmt::Display) -> Error {
    Error::WindowCreation(format!("{what}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wm_class_has_instance_and_class() {
        let wm_class = wm_class().unwrap();
        let parts: Vec<&[u8]> = wm_class.split(|b| *b == 0).collect();
        // Instance, class, and the empty tail after the final NUL.
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), parts[1].len());
        assert!(parts[2].is_empty());
    }

    #[test]
    fn event_mask_covers_structure_and_input() {
        let mask = u32::from(event_mask());
        for wanted in [
            EventMask::STRUCTURE_NOTIFY,
            EventMask::KEY_PRESS,
            EventMask::PROPERTY_CHANGE,
        ] {
            assert_ne!(mask & u32::from(wanted), 0);
        }
    }
}
