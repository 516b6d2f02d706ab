// Copyright 2021 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! A display without a server behind it.
//!
//! The headless backend simulates a small reparenting window manager: it adds a frame
//! around decorated windows once they are mapped, honours size hints, may place windows on
//! its own when they are first mapped and keeps a focus chain. Tests drive it through
//! [`HeadlessDisplay::inject`] and inspect it through [`HeadlessDisplay::window`].

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::clipboard::{ClipboardContents, ClipboardImage};
use crate::description::{Decorations, WindowKind};
use crate::error::Error;
use crate::kurbo::{Insets, Point, Rect, Size, Vec2};
use crate::site::NativeMessage;

use super::{
    DecorationTier, LayeredImage, MessageFilter, NativeDisplay, NativeEvent, NativeWindow,
    NativeWindowParams, RawDisplay, RawWindow, SizeHints, StateRequest, WindowId, WmState,
};

/// How the simulated window manager behaves.
#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    /// The frame added around decorated windows.
    pub frame: Insets,
    /// Whether the frame size can be queried. If not, windows have to guess.
    pub report_frame_extents: bool,
    /// Decoration hints the window manager understands.
    pub accepted_tiers: Vec<DecorationTier>,
    /// Window kinds the window manager understands.
    pub supported_kinds: Vec<WindowKind>,
    /// Where the window manager puts a client area on first map, ignoring earlier requests.
    pub place_on_map: Option<Point>,
    pub screen: Size,
    pub ppi: f64,
    pub composition: bool,
    /// Makes every window allocation fail.
    pub fail_create: bool,
}

impl Default for HeadlessConfig {
    fn default() -> HeadlessConfig {
        HeadlessConfig {
            frame: Insets::new(4.0, 24.0, 4.0, 4.0),
            report_frame_extents: true,
            accepted_tiers: DecorationTier::ALL.to_vec(),
            supported_kinds: vec![
                WindowKind::Normal,
                WindowKind::Dialog,
                WindowKind::Utility,
                WindowKind::Tooltip,
                WindowKind::PopupMenu,
                WindowKind::Combo,
                WindowKind::DropdownMenu,
            ],
            place_on_map: None,
            screen: Size::new(1920.0, 1080.0),
            ppi: 96.0,
            composition: false,
            fail_create: false,
        }
    }
}

/// The simulated window manager's view of one window.
#[derive(Clone, Debug)]
pub struct SimWindow {
    /// Client area in screen pixels.
    pub client: Rect,
    pub mapped: bool,
    ever_mapped: bool,
    /// Created by another client and not adopted yet.
    foreign: bool,
    pub title: String,
    pub kind: WindowKind,
    pub decorations: Option<(DecorationTier, Decorations)>,
    pub hints: SizeHints,
    pub state: WmState,
    restore_rect: Option<Rect>,
    pub enabled: bool,
    pub lowered: bool,
    pub pointer_grabbed: bool,
    pub cursor_visible: bool,
    pub layered_frames: usize,
    pub hit_region: Option<Rect>,
    pub destroyed: bool,
}

impl SimWindow {
    fn new(client: Rect, title: String, foreign: bool) -> SimWindow {
        SimWindow {
            client,
            mapped: false,
            ever_mapped: false,
            foreign,
            title,
            kind: WindowKind::Normal,
            decorations: None,
            hints: SizeHints::default(),
            state: WmState::default(),
            restore_rect: None,
            enabled: true,
            lowered: false,
            pointer_grabbed: false,
            cursor_visible: true,
            layered_frames: 0,
            hit_region: None,
            destroyed: false,
        }
    }

    fn decorated(&self) -> bool {
        matches!(self.decorations, Some((_, d)) if d.any())
    }

    fn clamp(&self, size: Size) -> Size {
        let mut size = size;
        if let Some(min) = self.hints.min {
            size = Size::new(size.width.max(min.width), size.height.max(min.height));
        }
        if let Some(max) = self.hints.max {
            size = Size::new(size.width.min(max.width), size.height.min(max.height));
        }
        size
    }
}

#[derive(Default)]
struct State {
    windows: HashMap<WindowId, SimWindow>,
    events: VecDeque<(WindowId, NativeEvent)>,
    focus: Option<WindowId>,
    clipboard_owner: Option<WindowId>,
    clipboard: ClipboardContents,
}

struct Inner {
    config: HeadlessConfig,
    state: RefCell<State>,
    filters: RefCell<HashMap<WindowId, MessageFilter>>,
    next_id: Cell<u64>,
}

impl Inner {
    fn frame_of(&self, window: &SimWindow) -> Insets {
        if window.decorated() {
            self.config.frame
        } else {
            Insets::ZERO
        }
    }
}

/// A simulated display connection. Clones share the same window manager.
#[derive(Clone)]
pub struct HeadlessDisplay {
    inner: Rc<Inner>,
}

impl HeadlessDisplay {
    pub fn new(config: HeadlessConfig) -> HeadlessDisplay {
        HeadlessDisplay {
            inner: Rc::new(Inner {
                config,
                state: RefCell::new(State::default()),
                filters: RefCell::new(HashMap::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    pub fn config(&self) -> &HeadlessConfig {
        &self.inner.config
    }

    /// A snapshot of a window as the window manager sees it.
    pub fn window(&self, id: WindowId) -> Option<SimWindow> {
        self.inner.state.borrow().windows.get(&id).cloned()
    }

    /// Queues an event as if the server had sent it.
    pub fn inject(&self, id: WindowId, event: NativeEvent) {
        self.inner.state.borrow_mut().events.push_back((id, event));
    }

    pub fn focused(&self) -> Option<WindowId> {
        self.inner.state.borrow().focus
    }

    /// Delivers a raw message through the window's message filter. Returns whether it was
    /// consumed.
    pub fn send_message(&self, id: WindowId, message: NativeMessage) -> bool {
        match self.inner.filters.borrow().get(&id) {
            Some(filter) => filter(&message),
            None => false,
        }
    }

    /// Creates a window as if another client had, for adopting through
    /// [`WindowDescription::set_handle`](crate::WindowDescription::set_handle).
    pub fn add_foreign_window(&self, client: Rect) -> RawWindow {
        let id = self.allocate_id();
        let window = SimWindow::new(client, String::new(), true);
        self.inner.state.borrow_mut().windows.insert(id, window);
        RawWindow::Headless { id: id.0 }
    }

    fn allocate_id(&self) -> WindowId {
        let id = WindowId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        id
    }

    /// Simulates another application copying `text`.
    pub fn set_foreign_clipboard(&self, text: &str) {
        let mut state = self.inner.state.borrow_mut();
        if let Some(owner) = state.clipboard_owner.take() {
            state.events.push_back((owner, NativeEvent::ClipboardLost));
        }
        state.clipboard = ClipboardContents {
            text: Some(text.to_string()),
            image: None,
        };
    }
}

impl NativeDisplay for HeadlessDisplay {
    fn create_window(&self, params: &NativeWindowParams) -> Result<Box<dyn NativeWindow>, Error> {
        if self.inner.config.fail_create {
            return Err(Error::WindowCreation("the display refused the window".into()));
        }
        let id = match params.description.handle() {
            Some(RawWindow::Headless { id }) => {
                let id = WindowId(id);
                let mut state = self.inner.state.borrow_mut();
                match state.windows.get_mut(&id) {
                    Some(window) if window.foreign && !window.destroyed => {
                        window.foreign = false;
                        tracing::debug!("headless window {:?} adopted", id);
                    }
                    _ => {
                        return Err(Error::WindowCreation(format!(
                            "no foreign window {id:?} to adopt"
                        )))
                    }
                }
                drop(state);
                return Ok(Box::new(HeadlessWindow {
                    id,
                    inner: Rc::clone(&self.inner),
                }));
            }
            Some(other) => {
                return Err(Error::WindowCreation(format!(
                    "{other:?} does not belong to this display"
                )))
            }
            None => self.allocate_id(),
        };
        let window = SimWindow::new(
            params.client,
            params.description.title().to_string(),
            false,
        );
        self.inner.state.borrow_mut().windows.insert(id, window);
        tracing::debug!("headless window {:?} created at {:?}", id, params.client);
        Ok(Box::new(HeadlessWindow {
            id,
            inner: Rc::clone(&self.inner),
        }))
    }

    fn next_event(&self) -> Option<(WindowId, NativeEvent)> {
        self.inner.state.borrow_mut().events.pop_front()
    }

    fn has_pending(&self) -> bool {
        !self.inner.state.borrow().events.is_empty()
    }

    fn screen_rect(&self, _monitor: usize) -> Rect {
        self.inner.config.screen.to_rect()
    }

    fn ppi(&self) -> f64 {
        self.inner.config.ppi
    }

    fn raw_display(&self) -> RawDisplay {
        RawDisplay::Headless
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A window on a [`HeadlessDisplay`].
pub struct HeadlessWindow {
    id: WindowId,
    inner: Rc<Inner>,
}

impl HeadlessWindow {
    fn with_window<R>(
        &self,
        f: impl FnOnce(&mut SimWindow, &mut VecDeque<(WindowId, NativeEvent)>) -> R,
    ) -> Option<R> {
        let mut state = self.inner.state.borrow_mut();
        let State {
            windows, events, ..
        } = &mut *state;
        match windows.get_mut(&self.id) {
            Some(window) if !window.destroyed => Some(f(window, events)),
            _ => None,
        }
    }

    fn set_focus(&self, focus: Option<WindowId>) {
        let mut state = self.inner.state.borrow_mut();
        if state.focus == focus {
            return;
        }
        if let Some(old) = state.focus.take() {
            state.events.push_back((old, NativeEvent::FocusOut));
        }
        if let Some(new) = focus {
            state.events.push_back((new, NativeEvent::FocusIn));
        }
        state.focus = focus;
    }
}

impl NativeWindow for HeadlessWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn raw_handle(&self) -> RawWindow {
        RawWindow::Headless { id: self.id.0 }
    }

    fn map(&self, activate: bool) {
        let place = self.inner.config.place_on_map;
        let id = self.id;
        let mapped = self.with_window(|window, events| {
            if window.mapped {
                return false;
            }
            if !window.ever_mapped {
                if let Some(origin) = place {
                    window.client = window.client.with_origin(origin);
                }
            }
            window.mapped = true;
            window.ever_mapped = true;
            window.state.minimized = false;
            events.push_back((
                id,
                NativeEvent::Configured {
                    rect: window.client,
                },
            ));
            events.push_back((id, NativeEvent::Mapped));
            true
        });
        if mapped == Some(true) && activate {
            self.set_focus(Some(id));
        }
    }

    fn unmap(&self) {
        let id = self.id;
        self.with_window(|window, events| {
            if window.mapped {
                window.mapped = false;
                events.push_back((id, NativeEvent::Unmapped));
            }
        });
        if self.has_focus() {
            self.set_focus(None);
        }
    }

    fn move_resize(&self, frame_origin: Point, client_size: Size) {
        let id = self.id;
        let inner = Rc::clone(&self.inner);
        self.with_window(|window, events| {
            let origin = if window.mapped {
                let frame = inner.frame_of(window);
                frame_origin + Vec2::new(frame.x0, frame.y0)
            } else {
                frame_origin
            };
            let size = window.clamp(client_size);
            window.client = Rect::from_origin_size(origin, size);
            events.push_back((
                id,
                NativeEvent::Configured {
                    rect: window.client,
                },
            ));
        });
    }

    fn set_size_hints(&self, hints: &SizeHints) {
        self.with_window(|window, _| window.hints = *hints);
    }

    fn apply_decorations(&self, tier: DecorationTier, decorations: &Decorations) -> bool {
        if !self.inner.config.accepted_tiers.contains(&tier) {
            return false;
        }
        self.with_window(|window, _| window.decorations = Some((tier, *decorations)))
            .is_some()
    }

    fn set_kind(&self, chain: &[WindowKind]) -> WindowKind {
        let kind = chain
            .iter()
            .copied()
            .find(|kind| self.inner.config.supported_kinds.contains(kind))
            .unwrap_or(WindowKind::Normal);
        self.with_window(|window, _| window.kind = kind);
        kind
    }

    fn probe_frame_extents(&self) -> Option<Insets> {
        if !self.inner.config.report_frame_extents {
            return None;
        }
        let inner = Rc::clone(&self.inner);
        self.with_window(|window, _| inner.frame_of(window))
    }

    fn query_state(&self) -> Option<WmState> {
        self.with_window(|window, _| window.state)
    }

    fn request_state(&self, request: StateRequest) {
        let id = self.id;
        let screen = self.inner.config.screen.to_rect();
        let inner = Rc::clone(&self.inner);
        self.with_window(|window, events| {
            match request {
                StateRequest::Minimize => window.state.minimized = true,
                StateRequest::Maximize => {
                    if !window.state.maximized {
                        window.restore_rect = Some(window.client);
                    }
                    let frame = inner.frame_of(window);
                    window.client = Rect::new(
                        screen.x0 + frame.x0,
                        screen.y0 + frame.y0,
                        screen.x1 - frame.x1,
                        screen.y1 - frame.y1,
                    );
                    window.state.minimized = false;
                    window.state.maximized = true;
                    events.push_back((
                        id,
                        NativeEvent::Configured {
                            rect: window.client,
                        },
                    ));
                }
                StateRequest::Restore => {
                    window.state.minimized = false;
                    window.state.maximized = false;
                    if let Some(rect) = window.restore_rect.take() {
                        window.client = rect;
                        events.push_back((id, NativeEvent::Configured { rect }));
                    }
                }
                StateRequest::Fullscreen(on) => window.state.fullscreen = on,
            }
            events.push_back((id, NativeEvent::StateChanged));
        });
    }

    fn set_title(&self, title: &str) {
        self.with_window(|window, _| window.title = title.to_string());
    }

    fn set_enabled(&self, enabled: bool) {
        self.with_window(|window, _| window.enabled = enabled);
    }

    fn raise(&self) {
        self.with_window(|window, _| window.lowered = false);
    }

    fn lower(&self) {
        self.with_window(|window, _| window.lowered = true);
    }

    fn focus(&self) {
        if self.with_window(|window, _| window.mapped) == Some(true) {
            self.set_focus(Some(self.id));
        }
    }

    fn has_focus(&self) -> bool {
        self.inner.state.borrow().focus == Some(self.id)
    }

    fn set_pointer_grab(&self, grab: bool) {
        self.with_window(|window, _| window.pointer_grabbed = grab);
    }

    fn set_cursor_visible(&self, visible: bool) {
        self.with_window(|window, _| window.cursor_visible = visible);
    }

    fn client_rect(&self) -> Option<Rect> {
        self.with_window(|window, _| window.client)
    }

    fn update_layered(&self, image: &LayeredImage) -> Result<(), Error> {
        let expected = image.width as usize * image.height as usize * 4;
        if image.pixels.len() != expected {
            return Err(super::error::Error::Headless(format!(
                "layered image holds {} bytes, expected {}",
                image.pixels.len(),
                expected
            ))
            .into());
        }
        self.with_window(|window, _| window.layered_frames += 1)
            .ok_or(Error::WindowDropped)
    }

    fn composition_enabled(&self) -> bool {
        self.inner.config.composition
    }

    fn set_hit_region(&self, region: Option<Rect>) {
        self.with_window(|window, _| window.hit_region = region);
    }

    fn request_expose(&self, rect: Rect) {
        let id = self.id;
        self.with_window(|_, events| events.push_back((id, NativeEvent::Expose(rect))));
    }

    fn claim_clipboard(&self, contents: &ClipboardContents) -> bool {
        let mut state = self.inner.state.borrow_mut();
        if let Some(owner) = state.clipboard_owner {
            if owner != self.id {
                state.events.push_back((owner, NativeEvent::ClipboardLost));
            }
        }
        state.clipboard_owner = Some(self.id);
        state.clipboard = contents.clone();
        true
    }

    fn fetch_clipboard_text(&self) -> Option<String> {
        self.inner.state.borrow().clipboard.text.clone()
    }

    fn fetch_clipboard_image(&self) -> Option<ClipboardImage> {
        self.inner.state.borrow().clipboard.image.clone()
    }

    fn set_message_filter(&self, filter: MessageFilter) {
        self.inner.filters.borrow_mut().insert(self.id, filter);
    }

    fn destroy(&self) {
        let id = self.id;
        self.inner.filters.borrow_mut().remove(&id);
        let mut state = self.inner.state.borrow_mut();
        if let Some(window) = state.windows.get_mut(&id) {
            window.destroyed = true;
            window.mapped = false;
        }
        if state.focus == Some(id) {
            state.focus = None;
        }
        if state.clipboard_owner == Some(id) {
            state.clipboard_owner = None;
        }
        state.events.retain(|(target, _)| *target != id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::WindowDescription;
    use test_log::test;

    fn create(display: &HeadlessDisplay, client: Rect) -> Box<dyn NativeWindow> {
        let description = WindowDescription::new();
        let params = NativeWindowParams {
            description: &description,
            client,
            visual: None,
            owner: None,
        };
        display.create_window(&params).unwrap()
    }

    #[test]
    fn frame_is_added_after_map() {
        let display = HeadlessDisplay::new(HeadlessConfig::default());
        let window = create(&display, Rect::new(0.0, 0.0, 100.0, 100.0));
        assert!(window.apply_decorations(DecorationTier::Extended, &Decorations {
            border: true,
            ..Decorations::NONE
        }));
        window.move_resize(Point::new(10.0, 10.0), Size::new(50.0, 50.0));
        assert_eq!(window.client_rect(), Some(Rect::new(10.0, 10.0, 60.0, 60.0)));

        window.map(true);
        window.move_resize(Point::new(10.0, 10.0), Size::new(50.0, 50.0));
        assert_eq!(window.client_rect(), Some(Rect::new(14.0, 34.0, 64.0, 84.0)));
        assert!(window.has_focus());
    }

    #[test]
    fn size_hints_are_enforced() {
        let display = HeadlessDisplay::new(HeadlessConfig::default());
        let window = create(&display, Rect::new(0.0, 0.0, 100.0, 100.0));
        let fixed = Size::new(100.0, 100.0);
        window.set_size_hints(&SizeHints {
            min: Some(fixed),
            max: Some(fixed),
        });
        window.move_resize(Point::ZERO, Size::new(300.0, 20.0));
        assert_eq!(window.client_rect().map(|r| r.size()), Some(fixed));
    }

    #[test]
    fn rejected_tier_is_reported() {
        let display = HeadlessDisplay::new(HeadlessConfig {
            accepted_tiers: vec![DecorationTier::Legacy],
            supported_kinds: vec![WindowKind::Normal, WindowKind::Combo],
            ..HeadlessConfig::default()
        });
        let window = create(&display, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(!window.apply_decorations(DecorationTier::Extended, &Decorations::NONE));
        assert!(window.apply_decorations(DecorationTier::Legacy, &Decorations::NONE));
        let chain = [WindowKind::Utility, WindowKind::PopupMenu, WindowKind::Combo];
        assert_eq!(window.set_kind(&chain), WindowKind::Combo);
    }

    #[test]
    fn failing_display() {
        let display = HeadlessDisplay::new(HeadlessConfig {
            fail_create: true,
            ..HeadlessConfig::default()
        });
        let description = WindowDescription::new();
        let params = NativeWindowParams {
            description: &description,
            client: Rect::ZERO,
            visual: None,
            owner: None,
        };
        assert!(matches!(
            display.create_window(&params),
            Err(Error::WindowCreation(_))
        ));
    }
}
