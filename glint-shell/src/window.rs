// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! The platform window state machine.

use std::cell::{Cell, RefCell, RefMut};
use std::rc::{Rc, Weak};
use std::time::Instant;

use tracing::{debug, warn};

use crate::backend::{
    AlphaMask, DecorationTier, NativeEvent, NativeWindow, NativeWindowParams, RawDisplay,
    RawWindow, SizeHints, StateRequest, VisualInfo, WindowId,
};
use crate::clipboard::{Clipboard, ClipboardImage};
use crate::description::{Decorations, WindowDescription, WindowKind};
use crate::error::Error;
use crate::input::{InputContext, MouseButton, MouseButtons, MouseEvent, MouseEventKind};
use crate::kurbo::{Insets, Point, Rect, Size, Vec2};
use crate::message_queue::MessageQueue;
use crate::region::Region;
use crate::scale::{Scalable, Scale};
use crate::site::WindowSite;

#[cfg(feature = "raw-win-handle")]
use raw_window_handle::{
    HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle,
};

/// Smallest client size, per axis, an outer size is converted to.
pub const MIN_CLIENT_SIZE: f64 = 8.0;

/// Left clicks on a layered window over pixels with less alpha than this fall through.
pub const CLICK_THROUGH_ALPHA: u8 = 10;

/// A native top level window.
///
/// The window keeps two client rectangles, both in screen pixels: `requested` is what the
/// application asked for last, `current` is what the platform confirmed last. Requests made
/// before the window manager has framed the window are replayed once it has.
///
/// Everything an application sees (the description, geometry getters and setters, input
/// events) is in logical units; [`Scale`] converts to pixels.
//
// The site is never called while one of the `RefCell`s is borrowed, so site callbacks may
// call back into the window.
pub struct PlatformWindow {
    native: Box<dyn NativeWindow>,
    queue: MessageQueue,
    description: WindowDescription,
    site: Rc<dyn WindowSite>,
    scale: Cell<Scale>,
    kind: WindowKind,
    decoration_tier: Option<DecorationTier>,
    title: RefCell<String>,
    /// Known once the window has been mapped.
    frame: Cell<Option<Insets>>,
    requested: Cell<Rect>,
    /// The last outer rect asked for, replayed with the real frame once it is known.
    requested_outer: Cell<Option<Rect>>,
    current: Cell<Rect>,
    mapped: Cell<bool>,
    minimized: Cell<bool>,
    maximized: Cell<bool>,
    restore_to_maximized: Cell<bool>,
    min_size: Cell<Size>,
    max_size: Cell<Option<Size>>,
    input: RefCell<InputContext>,
    clipboard: Clipboard,
    invalid: RefCell<Region>,
    on_resized: RefCell<Option<Box<dyn Fn()>>>,
    alpha_mask: RefCell<Option<AlphaMask>>,
}

impl PlatformWindow {
    /// Creates a window for `description` on the display behind `queue`.
    ///
    /// `visual` is the pixel format chosen before creation, for backends that need one.
    pub fn create(
        visual: Option<VisualInfo>,
        site: Rc<dyn WindowSite>,
        description: &WindowDescription,
        queue: &MessageQueue,
    ) -> Result<Rc<PlatformWindow>, Error> {
        let display = queue.display();
        let scale = match description.pixel_ratio() {
            Some(ratio) if ratio > 0.0 => Scale::uniform(ratio),
            _ => Scale::from_ppi(display.ppi()),
        };
        let screen = display.screen_rect(description.fullscreen_monitor());
        let client = initial_client_rect(description, scale, screen);
        let owner = description
            .owner()
            .and_then(Weak::upgrade)
            .map(|owner| owner.raw_handle());

        let native = display.create_window(&NativeWindowParams {
            description,
            client,
            visual,
            owner,
        })?;

        let kind = native.set_kind(&description.kind_chain());
        let decoration_tier = apply_decorations(native.as_ref(), &description.decorations());
        let (min_size, max_size) = if description.allow_resize() {
            (Size::new(MIN_CLIENT_SIZE, MIN_CLIENT_SIZE), None)
        } else {
            (client.size(), Some(client.size()))
        };
        native.set_size_hints(&SizeHints {
            min: Some(min_size),
            max: max_size,
        });
        native.set_title(description.title());

        let weak_site = Rc::downgrade(&site);
        native.set_message_filter(Box::new(move |message| {
            weak_site
                .upgrade()
                .map_or(false, |site| site.window_message(message))
        }));

        #[allow(unused_mut)]
        let mut input = InputContext::default();
        #[cfg(target_os = "linux")]
        if display.raw_display() != RawDisplay::Headless {
            input.set_joysticks(crate::input::open_joysticks());
        }

        let window = Rc::new(PlatformWindow {
            native,
            queue: queue.clone(),
            description: description.clone(),
            site,
            scale: Cell::new(scale),
            kind,
            decoration_tier,
            title: RefCell::new(description.title().to_string()),
            frame: Cell::new(None),
            requested: Cell::new(client),
            requested_outer: Cell::new(None),
            current: Cell::new(client),
            mapped: Cell::new(false),
            minimized: Cell::new(false),
            maximized: Cell::new(false),
            restore_to_maximized: Cell::new(false),
            min_size: Cell::new(min_size),
            max_size: Cell::new(max_size),
            input: RefCell::new(input),
            clipboard: Clipboard::new(),
            invalid: RefCell::new(Region::EMPTY),
            on_resized: RefCell::new(None),
            alpha_mask: RefCell::new(None),
        });
        queue.add_client(&window);
        debug!(
            "created window {:?} ({:?}, decorations via {:?})",
            window.id(),
            kind,
            decoration_tier
        );

        if description.is_visible() {
            window.show(!description.has_no_activate());
        }
        Ok(window)
    }

    pub fn id(&self) -> WindowId {
        self.native.id()
    }

    pub fn raw_handle(&self) -> RawWindow {
        self.native.raw_handle()
    }

    pub fn raw_display(&self) -> RawDisplay {
        self.queue.display().raw_display()
    }

    /// The backend window, for GL drivers.
    pub fn native(&self) -> &dyn NativeWindow {
        self.native.as_ref()
    }

    pub fn description(&self) -> &WindowDescription {
        &self.description
    }

    pub fn site(&self) -> &Rc<dyn WindowSite> {
        &self.site
    }

    pub fn message_queue(&self) -> &MessageQueue {
        &self.queue
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    /// How the decorations were requested; `None` if the window manager took no hints.
    pub fn decoration_tier(&self) -> Option<DecorationTier> {
        self.decoration_tier
    }

    pub fn scale(&self) -> Scale {
        self.scale.get()
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.scale.get().x()
    }

    /// Overrides the pixel ratio; `None` derives it from the screen density again.
    pub fn set_pixel_ratio(&self, ratio: Option<f64>) {
        let scale = match ratio {
            Some(ratio) if ratio > 0.0 => Scale::uniform(ratio),
            _ => Scale::from_ppi(self.queue.display().ppi()),
        };
        self.scale.set(scale);
    }

    /// Frame extents in pixels; the border width on every side until the window is mapped.
    pub fn frame_extents(&self) -> Insets {
        self.frame.get().unwrap_or_else(|| {
            let border = self.native.border_width();
            Insets::uniform(border)
        })
    }

    /// The window rectangle including its frame, in screen coordinates.
    pub fn get_geometry(&self) -> Rect {
        let client = self.current.get();
        let frame = self.frame_extents();
        Rect::new(
            client.x0 - frame.x0,
            client.y0 - frame.y0,
            client.x1 + frame.x1,
            client.y1 + frame.y1,
        )
        .to_dp(self.scale.get())
    }

    /// The client area in client coordinates.
    pub fn get_viewport(&self) -> Rect {
        self.current.get().size().to_rect().to_dp(self.scale.get())
    }

    /// The client area in screen pixels.
    pub fn client_rect_px(&self) -> Rect {
        self.current.get()
    }

    pub fn client_to_screen(&self, client: Point) -> Point {
        let scale = self.scale.get();
        (client.to_px(scale) + self.current.get().origin().to_vec2()).to_dp(scale)
    }

    pub fn screen_to_client(&self, screen: Point) -> Point {
        let scale = self.scale.get();
        (screen.to_px(scale) - self.current.get().origin().to_vec2()).to_dp(scale)
    }

    /// Moves and resizes the window. `rect` is the client area if `client_area` is set, the
    /// outer frame otherwise.
    pub fn set_position(&self, rect: Rect, client_area: bool) {
        self.set_position_px(rect.to_px(self.scale.get()), client_area);
    }

    fn set_position_px(&self, rect: Rect, client_area: bool) {
        let frame = self.frame_extents();
        let client = if client_area {
            self.requested_outer.set(None);
            rect
        } else {
            self.requested_outer.set(Some(rect));
            outer_to_client(rect, frame)
        };
        self.request_client_rect(client, frame);
    }

    /// Resizes the window, keeping the requested origin.
    pub fn set_size(&self, width: f64, height: f64, client_area: bool) {
        let size = Size::new(width, height).to_px(self.scale.get());
        let frame = self.frame_extents();
        let origin = self.requested.get().origin();
        let client_size = if client_area {
            self.requested_outer.set(None);
            size
        } else {
            if let Some(outer) = self.requested_outer.get() {
                self.requested_outer
                    .set(Some(Rect::from_origin_size(outer.origin(), size)));
            }
            outer_to_client_size(size, frame)
        };
        self.request_client_rect(Rect::from_origin_size(origin, client_size), frame);
    }

    fn request_client_rect(&self, client: Rect, frame: Insets) {
        self.requested.set(client);
        let fixed = !self.description.allow_resize();
        if fixed {
            self.native.set_size_hints(&SizeHints::default());
        }
        let frame_origin = Point::new(client.x0 - frame.x0, client.y0 - frame.y0);
        self.native.move_resize(frame_origin, client.size());
        if fixed {
            self.min_size.set(client.size());
            self.max_size.set(Some(client.size()));
            self.push_size_hints();
        }
    }

    fn push_size_hints(&self) {
        self.native.set_size_hints(&SizeHints {
            min: Some(self.min_size.get()),
            max: self.max_size.get(),
        });
    }

    pub fn set_minimum_size(&self, width: f64, height: f64, client_area: bool) {
        let size = Size::new(width, height).to_px(self.scale.get());
        let size = if client_area {
            size
        } else {
            outer_to_client_size(size, self.frame_extents())
        };
        self.min_size.set(size);
        self.push_size_hints();
    }

    pub fn set_maximum_size(&self, width: f64, height: f64, client_area: bool) {
        let size = Size::new(width, height).to_px(self.scale.get());
        let size = if client_area {
            size
        } else {
            outer_to_client_size(size, self.frame_extents())
        };
        self.max_size.set(Some(size));
        self.push_size_hints();
    }

    pub fn get_minimum_size(&self, client_area: bool) -> Size {
        self.size_with_frame(self.min_size.get(), client_area)
    }

    /// `None` when the window has no maximum size.
    pub fn get_maximum_size(&self, client_area: bool) -> Option<Size> {
        self.max_size
            .get()
            .map(|size| self.size_with_frame(size, client_area))
    }

    fn size_with_frame(&self, size: Size, client_area: bool) -> Size {
        let size = if client_area {
            size
        } else {
            let frame = self.frame_extents();
            Size::new(
                size.width + frame.x0 + frame.x1,
                size.height + frame.y0 + frame.y1,
            )
        };
        size.to_dp(self.scale.get())
    }

    pub fn show(&self, activate: bool) {
        self.native.map(activate);
        if activate {
            self.native.set_enabled(true);
        }
    }

    pub fn hide(&self) {
        self.native.set_enabled(false);
        self.native.unmap();
    }

    pub fn set_visible(&self, visible: bool, activate: bool) {
        if visible {
            self.show(activate);
        } else {
            self.hide();
        }
    }

    /// Whether the window is mapped, as far as the last processed events tell.
    pub fn is_visible(&self) -> bool {
        self.mapped.get()
    }

    pub fn minimize(&self) {
        if self.is_minimized() {
            debug!("window {:?} already minimized", self.id());
            return;
        }
        self.restore_to_maximized.set(self.is_maximized());
        self.native.request_state(StateRequest::Minimize);
    }

    pub fn maximize(&self) {
        self.native.request_state(StateRequest::Maximize);
    }

    pub fn restore(&self) {
        if self.is_minimized() {
            if self.restore_to_maximized.get() {
                self.native.request_state(StateRequest::Maximize);
            } else {
                self.native.request_state(StateRequest::Restore);
            }
        } else if self.is_maximized() {
            self.native.request_state(StateRequest::Restore);
        }
    }

    /// Reads the state from the window manager, falling back to the last known value.
    pub fn is_minimized(&self) -> bool {
        self.native
            .query_state()
            .map_or(self.minimized.get(), |state| state.minimized)
    }

    pub fn is_maximized(&self) -> bool {
        self.native
            .query_state()
            .map_or(self.maximized.get(), |state| state.maximized)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.description.is_fullscreen()
    }

    pub fn has_focus(&self) -> bool {
        self.native.has_focus()
    }

    pub fn bring_to_front(&self) {
        self.native.raise();
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.native.set_enabled(enabled);
    }

    pub fn title(&self) -> String {
        self.title.borrow().clone()
    }

    pub fn set_title(&self, title: &str) {
        self.native.set_title(title);
        *self.title.borrow_mut() = title.to_string();
    }

    pub fn set_cursor_visible(&self, visible: bool) {
        self.native.set_cursor_visible(visible);
    }

    /// Routes all pointer input to this window, or releases the capture this window holds.
    pub fn capture_mouse(&self, capture: bool) {
        self.queue.set_mouse_capture(self, capture);
    }

    /// Queues part of the client area (in client coordinates) for repainting.
    pub fn request_repaint(&self, rect: Rect) {
        let viewport = self.get_viewport();
        let was_empty = {
            let mut invalid = self.invalid.borrow_mut();
            let was_empty = invalid.is_empty();
            invalid.add_rect_bounded(rect.intersect(viewport), viewport);
            was_empty
        };
        if was_empty {
            self.native
                .request_expose(crate::util::expand_to_pixels(rect.to_px(self.scale.get())));
        }
    }

    /// Takes the coalesced repaint requests.
    pub fn take_repaint(&self) -> Vec<Rect> {
        self.invalid.borrow_mut().take()
    }

    pub fn input(&self) -> RefMut<'_, InputContext> {
        self.input.borrow_mut()
    }

    pub fn set_clipboard_text(&self, text: &str) {
        let contents = self.clipboard.put_text(text.to_string());
        if !self.native.claim_clipboard(&contents) {
            warn!("could not take the clipboard over");
        }
    }

    pub fn set_clipboard_image(&self, image: ClipboardImage) {
        let contents = self.clipboard.put_image(image);
        if !self.native.claim_clipboard(&contents) {
            warn!("could not take the clipboard over");
        }
    }

    pub fn get_clipboard_text(&self) -> Option<String> {
        match self.clipboard.owned() {
            Some(contents) => contents.text,
            None => self.native.fetch_clipboard_text(),
        }
    }

    pub fn get_clipboard_image(&self) -> Option<ClipboardImage> {
        match self.clipboard.owned() {
            Some(contents) => contents.image,
            None => self.native.fetch_clipboard_image(),
        }
    }

    pub fn is_clipboard_text_available(&self) -> bool {
        self.get_clipboard_text().is_some()
    }

    pub fn is_clipboard_image_available(&self) -> bool {
        self.get_clipboard_image().is_some()
    }

    /// Sets the function run after every client size change, before the site hears of it.
    pub fn set_on_resized(&self, callback: Option<Box<dyn Fn()>>) {
        match self.on_resized.try_borrow_mut() {
            Ok(mut slot) => *slot = callback,
            Err(_) => warn!("resize callback replaced while running"),
        }
    }

    /// Sets the alpha of the last presented frame.
    ///
    /// The mask decides which clicks fall through a layered window, and restricts hit testing
    /// on composited layered windows.
    pub fn set_alpha_mask(&self, mask: Option<AlphaMask>) {
        if self.native.composition_enabled() {
            let region = mask
                .as_ref()
                .and_then(|mask| mask.opaque_bounds(CLICK_THROUGH_ALPHA));
            self.native.set_hit_region(region);
        }
        *self.alpha_mask.borrow_mut() = mask;
    }

    fn notify_resized(&self) {
        match self.on_resized.try_borrow() {
            Ok(callback) => {
                if let Some(callback) = callback.as_ref() {
                    callback();
                }
            }
            Err(_) => warn!("resize callback is already running"),
        }
    }

    /// Handles one event addressed to this window.
    pub(crate) fn handle_event(&self, event: NativeEvent) {
        match event {
            NativeEvent::Mapped => self.on_mapped(),
            NativeEvent::Unmapped => self.mapped.set(false),
            NativeEvent::Configured { rect } => self.process_window_resize(rect),
            NativeEvent::StateChanged => self.process_state_change(),
            NativeEvent::CloseRequested => self.site.close(),
            NativeEvent::FocusIn => self.site.got_focus(),
            NativeEvent::FocusOut => {
                if !self.native.has_focus() {
                    self.input.borrow_mut().keyboard().release_all();
                    self.site.lost_focus();
                }
            }
            NativeEvent::Expose(rect) => {
                let rect = rect.to_dp(self.scale.get());
                let viewport = self.get_viewport();
                self.invalid
                    .borrow_mut()
                    .add_rect_bounded(rect.intersect(viewport), viewport);
                self.site.paint(rect);
            }
            NativeEvent::Key(event) => self.input.borrow_mut().keyboard().received(event),
            NativeEvent::ClipboardLost => self.clipboard.lost(),
            pointer @ (NativeEvent::Button { .. }
            | NativeEvent::Motion { .. }
            | NativeEvent::Wheel { .. }) => self.deliver_pointer(pointer),
        }
    }

    fn on_mapped(&self) {
        self.mapped.set(true);
        if self.frame.get().is_none() {
            let frame = match self.native.probe_frame_extents() {
                Some(frame) => frame,
                None => {
                    debug!("frame extents unknown, assuming the border width");
                    Insets::uniform(self.native.border_width())
                }
            };
            self.frame.set(Some(frame));
        }
        if self.description.is_fullscreen() {
            self.native.focus();
        } else {
            match self.requested_outer.get() {
                Some(outer) => self.set_position_px(outer, false),
                None => self.set_position_px(self.requested.get(), true),
            }
        }
    }

    fn process_window_resize(&self, new_rect: Rect) {
        let old_rect = self.current.replace(new_rect);
        if self.mapped.get() && self.frame.get().is_some() {
            self.requested.set(new_rect);
            self.requested_outer.set(None);
        }

        if old_rect.origin() != new_rect.origin() {
            self.site.moved();
        }
        if old_rect.size() != new_rect.size() {
            let mut geometry = new_rect.to_dp(self.scale.get());
            self.notify_resized();
            self.site.resize(geometry.width(), geometry.height());
            self.site.window_resize(&mut geometry);
        }
    }

    fn process_state_change(&self) {
        let state = match self.native.query_state() {
            Some(state) => state,
            None => return,
        };
        if state.minimized {
            if !self.minimized.get() {
                self.site.minimized();
            }
            self.minimized.set(true);
            self.maximized.set(false);
        } else if state.maximized {
            if !self.maximized.get() {
                self.site.maximized();
            }
            if self.minimized.get() {
                // Coming back from minimized straight to maximized skips the configure.
                let mut geometry = self.get_geometry();
                self.site.moved();
                self.site.window_resize(&mut geometry);
                self.notify_resized();
                self.site.resize(geometry.width(), geometry.height());
            }
            self.minimized.set(false);
            self.maximized.set(true);
        } else {
            if self.minimized.get() || self.maximized.get() {
                self.site.restored();
            }
            self.minimized.set(false);
            self.maximized.set(false);
        }
    }

    /// Whether a pointer event should fall through to the window below.
    ///
    /// A left press on a layered window over a nearly transparent pixel lowers the window.
    pub(crate) fn click_through(&self, event: &NativeEvent) -> bool {
        if !self.description.is_layered() {
            return false;
        }
        let pos = match event {
            NativeEvent::Button {
                pos,
                button: MouseButton::Left,
                down: true,
                ..
            } => *pos,
            _ => return false,
        };
        let alpha = self
            .alpha_mask
            .borrow()
            .as_ref()
            .map(|mask| mask.alpha_at(pos.x.floor() as i64, pos.y.floor() as i64));
        match alpha {
            Some(alpha) if alpha < CLICK_THROUGH_ALPHA => {
                self.native.lower();
                true
            }
            _ => false,
        }
    }

    fn deliver_pointer(&self, event: NativeEvent) {
        let scale = self.scale.get();
        let (kind, pos, button, mods, wheel_delta) = match event {
            NativeEvent::Button {
                pos,
                button,
                down,
                mods,
            } => {
                let kind = if down {
                    MouseEventKind::Down
                } else {
                    MouseEventKind::Up
                };
                (kind, pos, button, mods, Vec2::ZERO)
            }
            NativeEvent::Motion { pos, mods } => {
                (MouseEventKind::Move, pos, MouseButton::None, mods, Vec2::ZERO)
            }
            NativeEvent::Wheel { pos, delta, mods } => {
                (MouseEventKind::Wheel, pos, MouseButton::None, mods, delta)
            }
            _ => return,
        };
        let event = MouseEvent {
            kind,
            pos: pos.to_dp(scale),
            button,
            buttons: MouseButtons::new(),
            mods,
            count: 0,
            wheel_delta,
        };
        self.input
            .borrow_mut()
            .mouse()
            .received(event, Instant::now());
    }

    #[cfg(target_os = "linux")]
    pub(crate) fn joystick_fds(&self) -> Vec<std::os::unix::io::RawFd> {
        self.input
            .borrow_mut()
            .joysticks()
            .iter()
            .filter_map(|joystick| joystick.raw_fd())
            .collect()
    }

    #[cfg(target_os = "linux")]
    pub(crate) fn poll_joysticks(&self) {
        for joystick in self.input.borrow_mut().joysticks() {
            joystick.read_device();
        }
    }
}

impl Drop for PlatformWindow {
    fn drop(&mut self) {
        debug!("destroying window {:?}", self.native.id());
        self.input.get_mut().dispose();
        self.clipboard.clear();
        self.on_resized.get_mut().take();
        self.queue.remove_client(self.native.id());
        self.native.destroy();
    }
}

/// Where a new window's client area goes, in screen pixels.
fn initial_client_rect(description: &WindowDescription, scale: Scale, screen: Rect) -> Rect {
    if description.is_fullscreen() {
        return screen;
    }
    let position = description.position();
    if description.is_centered() {
        let size = position.size().to_px(scale);
        let origin = screen.center() - size.to_vec2() / 2.0;
        return Rect::from_origin_size(origin, size).round();
    }
    let rect = position.to_px(scale);
    if description.position_client_area() {
        rect
    } else {
        outer_to_client(rect, Insets::ZERO)
    }
}

/// Tries each decoration tier in turn; the first the window manager takes wins.
fn apply_decorations(
    native: &dyn NativeWindow,
    decorations: &Decorations,
) -> Option<DecorationTier> {
    let tier = DecorationTier::ALL
        .into_iter()
        .find(|tier| native.apply_decorations(*tier, decorations));
    if tier.is_none() && decorations.any() {
        warn!("the window manager takes no decoration hints, the window stays undecorated");
    }
    tier
}

fn outer_to_client(outer: Rect, frame: Insets) -> Rect {
    let origin = Point::new(outer.x0 + frame.x0, outer.y0 + frame.y0);
    Rect::from_origin_size(origin, outer_to_client_size(outer.size(), frame))
}

fn outer_to_client_size(outer: Size, frame: Insets) -> Size {
    Size::new(
        (outer.width - frame.x0 - frame.x1).max(MIN_CLIENT_SIZE),
        (outer.height - frame.y0 - frame.y1).max(MIN_CLIENT_SIZE),
    )
}

#[cfg(feature = "raw-win-handle")]
unsafe impl HasRawWindowHandle for PlatformWindow {
    fn raw_window_handle(&self) -> RawWindowHandle {
        match self.native.raw_handle() {
            RawWindow::Xlib { window } => {
                let mut handle = raw_window_handle::XlibWindowHandle::empty();
                handle.window = window as _;
                RawWindowHandle::Xlib(handle)
            }
            RawWindow::Win32 { hwnd } => {
                let mut handle = raw_window_handle::Win32WindowHandle::empty();
                handle.hwnd = hwnd;
                RawWindowHandle::Win32(handle)
            }
            // Headless windows are identified the way canvas windows are: by a number.
            RawWindow::Headless { id } => {
                let mut handle = raw_window_handle::WebWindowHandle::empty();
                handle.id = id as u32;
                RawWindowHandle::Web(handle)
            }
        }
    }
}

#[cfg(feature = "raw-win-handle")]
unsafe impl HasRawDisplayHandle for PlatformWindow {
    fn raw_display_handle(&self) -> RawDisplayHandle {
        match self.raw_display() {
            RawDisplay::Xlib { display, screen } => {
                let mut handle = raw_window_handle::XlibDisplayHandle::empty();
                handle.display = display;
                handle.screen = screen;
                RawDisplayHandle::Xlib(handle)
            }
            RawDisplay::Win32 => {
                RawDisplayHandle::Windows(raw_window_handle::WindowsDisplayHandle::empty())
            }
            RawDisplay::Headless => {
                RawDisplayHandle::Web(raw_window_handle::WebDisplayHandle::empty())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn outer_sizes_keep_a_minimum() {
        let frame = Insets::new(4.0, 24.0, 4.0, 4.0);
        let client = outer_to_client(Rect::new(100.0, 100.0, 110.0, 120.0), frame);
        assert_eq!(client.origin(), Point::new(104.0, 124.0));
        assert_eq!(client.size(), Size::new(MIN_CLIENT_SIZE, MIN_CLIENT_SIZE));
        assert_eq!(
            outer_to_client_size(Size::new(648.0, 508.0), frame),
            Size::new(640.0, 480.0)
        );
    }

    #[test]
    fn centered_and_fullscreen_placement() {
        let screen = Rect::new(0.0, 0.0, 1920.0, 1080.0);
        let mut desc = WindowDescription::new();
        desc.set_centered_size(Size::new(640.0, 480.0), true);
        assert_eq!(
            initial_client_rect(&desc, Scale::default(), screen),
            Rect::new(640.0, 300.0, 1280.0, 780.0)
        );
        desc.set_fullscreen(true, 0);
        assert_eq!(initial_client_rect(&desc, Scale::default(), screen), screen);
    }

    #[test]
    fn client_area_is_scaled() {
        let mut desc = WindowDescription::new();
        desc.set_position(Rect::new(10.0, 10.0, 330.0, 250.0), true);
        assert_eq!(
            initial_client_rect(&desc, Scale::uniform(2.0), Rect::ZERO),
            Rect::new(20.0, 20.0, 660.0, 500.0)
        );
    }
}
