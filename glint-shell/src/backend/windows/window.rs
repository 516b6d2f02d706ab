// Copyright 2018 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Win32 windows.
//!
//! Every window, created or adopted, runs [`win_proc_dispatch`]. The window procedure only
//! translates: messages become [`NativeEvent`]s on the display queue, except for the few
//! that must be answered on the spot (size limits, hit testing, activation).

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::mem;
use std::ptr;
use std::rc::Rc;

use keyboard_types::{KeyState, Modifiers};
use scopeguard::defer;
use tracing::{debug, error, warn};
use winapi::ctypes::c_int;
use winapi::shared::basetsd::LONG_PTR;
use winapi::shared::minwindef::{
    BOOL, DWORD, FALSE, HIWORD, LPARAM, LRESULT, TRUE, UINT, WPARAM,
};
use winapi::shared::windef::{HWND, POINT, RECT, SIZE};
use winapi::um::winbase::{
    GlobalAlloc, GlobalFree, GlobalLock, GlobalSize, GlobalUnlock, GMEM_MOVEABLE,
};
use winapi::um::wingdi::{
    CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, SelectObject, AC_SRC_ALPHA,
    AC_SRC_OVER, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, BLENDFUNCTION, DIB_RGB_COLORS,
};
use winapi::um::winuser::*;

use super::display::EventQueue;
use super::error::Error;
use super::util::{
    composition_enabled, enable_alpha_channel, get_x_lparam, get_y_lparam, recti_to_rect,
    rect_to_recti, FromWide, ToWide, CLASS_NAME, SHADOW_CLASS_NAME,
};
use crate::backend::shared::keycodes::{code_to_key, scan_to_code};
use crate::backend::{
    DecorationTier, LayeredImage, MessageFilter, NativeEvent, NativeWindow, NativeWindowParams,
    RawWindow, SizeHints, StateRequest, WindowId, WmState,
};
use crate::clipboard::{ClipboardContents, ClipboardFormat, ClipboardImage};
use crate::description::{Decorations, WindowKind};
use crate::input::{KeyboardEvent, MouseButton};
use crate::kurbo::{Insets, Point, Rect, Size, Vec2};
use crate::site::NativeMessage;

const MODIFIER_MAP: &[(c_int, Modifiers, i16)] = &[
    (VK_MENU, Modifiers::ALT, 0x80),
    (VK_CAPITAL, Modifiers::CAPS_LOCK, 0x1),
    (VK_CONTROL, Modifiers::CONTROL, 0x80),
    (VK_NUMLOCK, Modifiers::NUM_LOCK, 0x1),
    (VK_SCROLL, Modifiers::SCROLL_LOCK, 0x1),
    (VK_SHIFT, Modifiers::SHIFT, 0x80),
    (VK_LWIN, Modifiers::META, 0x80),
    (VK_RWIN, Modifiers::META, 0x80),
];

/// The part of a window shared with its window procedure.
pub(crate) struct WindowState {
    /// Zero until `CreateWindowExW` returns the handle.
    id: Cell<WindowId>,
    events: EventQueue,
    filter: RefCell<Option<MessageFilter>>,
    hints: Cell<SizeHints>,
    hit_region: Cell<Option<Rect>>,
    no_activate: bool,
    has_mouse_focus: Cell<bool>,
    /// Set while we empty the clipboard ourselves.
    claiming_clipboard: Cell<bool>,
    /// The procedure an adopted window had before us.
    previous_proc: Cell<WNDPROC>,
}

impl WindowState {
    fn push(&self, event: NativeEvent) {
        self.events.borrow_mut().push_back((self.id.get(), event));
    }

    fn push_configured(&self, hwnd: HWND) {
        match client_screen_rect(hwnd) {
            Some(rect) => self.push(NativeEvent::Configured { rect }),
            None => warn!("failed to read the client area: {}", Error::last("GetClientRect")),
        }
    }

    fn default_proc(&self, hwnd: HWND, msg: UINT, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        match self.previous_proc.get() {
            Some(previous) => unsafe { CallWindowProcW(Some(previous), hwnd, msg, wparam, lparam) },
            None => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
        }
    }

    /// Returns `None` for messages that go on to the default procedure.
    fn window_proc(
        &self,
        hwnd: HWND,
        msg: UINT,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> Option<LRESULT> {
        if let Ok(filter) = self.filter.try_borrow() {
            let message = NativeMessage {
                message: msg,
                wparam,
                lparam,
            };
            if filter.as_ref().map_or(false, |filter| filter(&message)) {
                return Some(0);
            }
        }

        match msg {
            WM_SHOWWINDOW => {
                // A non-zero lparam is a parent being minimized or restored.
                if lparam == 0 {
                    self.push(if wparam != 0 {
                        NativeEvent::Mapped
                    } else {
                        NativeEvent::Unmapped
                    });
                }
                None
            }
            WM_SIZE => {
                self.push(NativeEvent::StateChanged);
                if wparam != SIZE_MINIMIZED {
                    self.push_configured(hwnd);
                }
                Some(0)
            }
            WM_MOVE => {
                if unsafe { IsIconic(hwnd) } == FALSE {
                    self.push_configured(hwnd);
                }
                Some(0)
            }
            WM_CLOSE => {
                self.push(NativeEvent::CloseRequested);
                Some(0)
            }
            WM_SETFOCUS => {
                self.push(NativeEvent::FocusIn);
                None
            }
            WM_KILLFOCUS => {
                self.push(NativeEvent::FocusOut);
                None
            }
            WM_PAINT => unsafe {
                let mut ps: PAINTSTRUCT = mem::zeroed();
                BeginPaint(hwnd, &mut ps);
                self.push(NativeEvent::Expose(recti_to_rect(ps.rcPaint)));
                EndPaint(hwnd, &ps);
                Some(0)
            },
            WM_ERASEBKGND => Some(1),
            WM_GETMINMAXINFO => {
                let info = unsafe { &mut *(lparam as *mut MINMAXINFO) };
                let hints = self.hints.get();
                let frame = frame_insets(hwnd);
                if let Some(min) = hints.min {
                    let outer = min + frame.size();
                    info.ptMinTrackSize.x = outer.width.ceil() as i32;
                    info.ptMinTrackSize.y = outer.height.ceil() as i32;
                }
                if let Some(max) = hints.max {
                    let outer = max + frame.size();
                    info.ptMaxTrackSize.x = outer.width.ceil() as i32;
                    info.ptMaxTrackSize.y = outer.height.ceil() as i32;
                }
                Some(0)
            }
            WM_NCHITTEST => {
                let region = self.hit_region.get()?;
                let mut p = POINT {
                    x: get_x_lparam(lparam),
                    y: get_y_lparam(lparam),
                };
                if unsafe { ScreenToClient(hwnd, &mut p) } == FALSE {
                    return None;
                }
                if region.contains(Point::new(p.x as f64, p.y as f64)) {
                    None
                } else {
                    Some(HTTRANSPARENT as LRESULT)
                }
            }
            WM_MOUSEACTIVATE if self.no_activate => Some(MA_NOACTIVATE as LRESULT),
            WM_KEYDOWN | WM_SYSKEYDOWN | WM_KEYUP | WM_SYSKEYUP => {
                let (scan, extended, repeated) = key_flags(lparam);
                let code = scan_to_code(scan, extended);
                let mods = get_modifiers();
                let down = msg == WM_KEYDOWN || msg == WM_SYSKEYDOWN;
                self.push(NativeEvent::Key(KeyboardEvent {
                    state: if down { KeyState::Down } else { KeyState::Up },
                    code,
                    key: code_to_key(code, mods),
                    mods,
                    repeat: down && repeated,
                }));
                // System keys still need the default handling for Alt+F4 and the window menu.
                if msg == WM_SYSKEYDOWN || msg == WM_SYSKEYUP {
                    None
                } else {
                    Some(0)
                }
            }
            WM_MOUSEWHEEL | WM_MOUSEHWHEEL => {
                let system_delta = HIWORD(wparam as u32) as i16 as f64;
                let mods = get_modifiers();
                let delta = match msg {
                    WM_MOUSEWHEEL if mods.contains(Modifiers::SHIFT) => {
                        Vec2::new(-system_delta, 0.)
                    }
                    WM_MOUSEWHEEL => Vec2::new(0., -system_delta),
                    _ => Vec2::new(system_delta, 0.),
                };
                let mut p = POINT {
                    x: get_x_lparam(lparam),
                    y: get_y_lparam(lparam),
                };
                if unsafe { ScreenToClient(hwnd, &mut p) } == FALSE {
                    warn!("ScreenToClient failed: {}", Error::last("ScreenToClient"));
                    return None;
                }
                self.push(NativeEvent::Wheel {
                    pos: Point::new(p.x as f64, p.y as f64),
                    delta,
                    mods,
                });
                Some(0)
            }
            WM_MOUSEMOVE => {
                // Ask for WM_MOUSELEAVE once the pointer is inside.
                if !self.has_mouse_focus.get() {
                    let mut desc = TRACKMOUSEEVENT {
                        cbSize: mem::size_of::<TRACKMOUSEEVENT>() as DWORD,
                        dwFlags: TME_LEAVE,
                        hwndTrack: hwnd,
                        dwHoverTime: HOVER_DEFAULT,
                    };
                    if unsafe { TrackMouseEvent(&mut desc) } != FALSE {
                        self.has_mouse_focus.set(true);
                    } else {
                        warn!("failed to TrackMouseEvent: {}", Error::last("TrackMouseEvent"));
                    }
                }
                self.push(NativeEvent::Motion {
                    pos: Point::new(get_x_lparam(lparam) as f64, get_y_lparam(lparam) as f64),
                    mods: get_modifiers(),
                });
                Some(0)
            }
            WM_MOUSELEAVE => {
                self.has_mouse_focus.set(false);
                Some(0)
            }
            // The class has no CS_DBLCLKS, so double clicks arrive as plain presses.
            WM_LBUTTONDOWN | WM_LBUTTONUP | WM_RBUTTONDOWN | WM_RBUTTONUP | WM_MBUTTONDOWN
            | WM_MBUTTONUP | WM_XBUTTONDOWN | WM_XBUTTONUP => {
                let button = match msg {
                    WM_LBUTTONDOWN | WM_LBUTTONUP => MouseButton::Left,
                    WM_RBUTTONDOWN | WM_RBUTTONUP => MouseButton::Right,
                    WM_MBUTTONDOWN | WM_MBUTTONUP => MouseButton::Middle,
                    _ => match HIWORD(wparam as u32) {
                        XBUTTON1 => MouseButton::X1,
                        XBUTTON2 => MouseButton::X2,
                        other => {
                            warn!("unexpected X button {}", other);
                            return None;
                        }
                    },
                };
                let down = matches!(
                    msg,
                    WM_LBUTTONDOWN | WM_RBUTTONDOWN | WM_MBUTTONDOWN | WM_XBUTTONDOWN
                );
                self.push(NativeEvent::Button {
                    pos: Point::new(get_x_lparam(lparam) as f64, get_y_lparam(lparam) as f64),
                    button,
                    down,
                    mods: get_modifiers(),
                });
                if matches!(msg, WM_XBUTTONDOWN | WM_XBUTTONUP) {
                    Some(TRUE as LRESULT)
                } else {
                    Some(0)
                }
            }
            WM_DESTROYCLIPBOARD => {
                if !self.claiming_clipboard.get() {
                    self.push(NativeEvent::ClipboardLost);
                }
                Some(0)
            }
            _ => None,
        }
    }
}

/// The window procedure of every glint window.
///
/// The [`WindowState`] is handed over through `lpCreateParams` and kept in `GWLP_USERDATA`
/// until `WM_NCDESTROY`.
pub(crate) unsafe extern "system" fn win_proc_dispatch(
    hwnd: HWND,
    msg: UINT,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_CREATE {
        let create_struct = &*(lparam as *const CREATESTRUCTW);
        let state_ptr = create_struct.lpCreateParams;
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, state_ptr as LONG_PTR);
    }
    let state_ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const WindowState;
    if state_ptr.is_null() {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    let state = &*state_ptr;
    let result = state
        .window_proc(hwnd, msg, wparam, lparam)
        .unwrap_or_else(|| state.default_proc(hwnd, msg, wparam, lparam));

    if msg == WM_NCDESTROY {
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
        drop(Rc::from_raw(state_ptr));
    }
    result
}

pub(crate) struct Win32Window {
    hwnd: HWND,
    state: Rc<WindowState>,
    popup: bool,
    foreign: bool,
    destroyed: Cell<bool>,
    cursor_hidden: Cell<bool>,
    /// Style and window rect to return to when leaving fullscreen.
    windowed: Cell<Option<(DWORD, RECT)>>,
    image_format: UINT,
    /// Layered, with the alpha channel handed to the compositor.
    layered_composited: bool,
}

impl Win32Window {
    pub(crate) fn create(
        events: &EventQueue,
        params: &NativeWindowParams,
    ) -> Result<Win32Window, crate::error::Error> {
        let description = params.description;
        let state = |id| {
            Rc::new(WindowState {
                id: Cell::new(id),
                events: Rc::clone(events),
                filter: RefCell::new(None),
                hints: Cell::new(SizeHints::default()),
                hit_region: Cell::new(None),
                no_activate: description.has_no_activate(),
                has_mouse_focus: Cell::new(false),
                claiming_clipboard: Cell::new(false),
                previous_proc: Cell::new(None),
            })
        };
        let image_format =
            unsafe { RegisterClipboardFormatW(ClipboardFormat::IMAGE.to_wide().as_ptr()) };

        match description.handle() {
            Some(RawWindow::Win32 { hwnd }) => {
                let hwnd = hwnd as HWND;
                if hwnd.is_null() || unsafe { IsWindow(hwnd) } == FALSE {
                    return Err(Error::NullHwnd.into());
                }
                let state = state(hwnd_id(hwnd));
                adopt(hwnd, &state);
                debug!("adopted window {:?}", hwnd);
                return Ok(Win32Window {
                    hwnd,
                    state,
                    popup: description.is_popup(),
                    foreign: true,
                    destroyed: Cell::new(false),
                    cursor_hidden: Cell::new(false),
                    windowed: Cell::new(None),
                    image_format,
                    layered_composited: false,
                });
            }
            Some(other) => {
                return Err(crate::error::Error::WindowCreation(format!(
                    "cannot adopt {other:?} on a Win32 display"
                )))
            }
            None => {}
        }

        let popup = description.is_popup() || description.is_fullscreen();
        let style = window_style(popup, &description.decorations());
        let mut ex_style = 0;
        if description.is_topmost() {
            ex_style |= WS_EX_TOPMOST;
        }
        if description.is_tool_window() {
            ex_style |= WS_EX_TOOLWINDOW;
        }
        // Composited layered windows keep their alpha through the compositor instead.
        let composited = description.is_layered() && composition_enabled();
        if description.is_layered() && !composited {
            ex_style |= WS_EX_LAYERED;
        }
        if description.has_no_activate() {
            ex_style |= WS_EX_NOACTIVATE;
        }
        let class_name = if description.has_drop_shadow() {
            SHADOW_CLASS_NAME
        } else {
            CLASS_NAME
        }
        .to_wide();

        let client = params.client.round();
        let outer = rect_to_recti(client + adjusted_insets(style, ex_style));
        let owner = match params.owner {
            Some(RawWindow::Win32 { hwnd }) => hwnd as HWND,
            _ => ptr::null_mut(),
        };
        let title = description.title().to_wide();

        let state = state(WindowId(0));
        let state_ptr = Rc::into_raw(Rc::clone(&state));
        let hwnd = unsafe {
            CreateWindowExW(
                ex_style,
                class_name.as_ptr(),
                title.as_ptr(),
                style,
                outer.left,
                outer.top,
                outer.right - outer.left,
                outer.bottom - outer.top,
                owner,
                ptr::null_mut(),
                ptr::null_mut(),
                state_ptr as *mut _,
            )
        };
        if hwnd.is_null() {
            let err = Error::last("CreateWindowExW");
            // WM_NCDESTROY never ran if the count is still 2.
            if Rc::strong_count(&state) == 2 {
                unsafe { drop(Rc::from_raw(state_ptr)) };
            }
            return Err(crate::error::Error::WindowCreation(err.to_string()));
        }
        set_window_id(&state, hwnd);
        if composited {
            enable_alpha_channel(hwnd, None);
        }

        let windowed = description.is_fullscreen().then(|| {
            let inner = client.inset((-client.width() / 8.0, -client.height() / 8.0));
            let decorated = window_style(false, &Decorations::ALL);
            (decorated, rect_to_recti(inner + adjusted_insets(decorated, ex_style)))
        });

        debug!("created window {:?}", hwnd);
        Ok(Win32Window {
            hwnd,
            state,
            popup: description.is_popup(),
            foreign: false,
            destroyed: Cell::new(false),
            cursor_hidden: Cell::new(false),
            windowed: Cell::new(windowed),
            image_format,
            layered_composited: composited,
        })
    }

    fn style(&self) -> (DWORD, DWORD) {
        unsafe {
            (
                GetWindowLongPtrW(self.hwnd, GWL_STYLE) as DWORD,
                GetWindowLongPtrW(self.hwnd, GWL_EXSTYLE) as DWORD,
            )
        }
    }

    fn set_style(&self, style: DWORD) {
        unsafe {
            SetWindowLongPtrW(self.hwnd, GWL_STYLE, style as LONG_PTR);
            SetWindowPos(
                self.hwnd,
                ptr::null_mut(),
                0,
                0,
                0,
                0,
                SWP_FRAMECHANGED | SWP_NOMOVE | SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE,
            );
        }
    }

    fn set_fullscreen(&self, fullscreen: bool) {
        let (style, _) = self.style();
        if fullscreen {
            if self.windowed.get().is_some() {
                return;
            }
            let mut rect = RECT {
                left: 0,
                top: 0,
                right: 0,
                bottom: 0,
            };
            unsafe { GetWindowRect(self.hwnd, &mut rect) };
            self.windowed.set(Some((style, rect)));
            let monitor = monitor_rect(self.hwnd);
            let popup =
                (style & (WS_VISIBLE | WS_DISABLED)) | window_style(true, &Decorations::NONE);
            unsafe {
                SetWindowLongPtrW(self.hwnd, GWL_STYLE, popup as LONG_PTR);
                SetWindowPos(
                    self.hwnd,
                    HWND_TOP,
                    monitor.left,
                    monitor.top,
                    monitor.right - monitor.left,
                    monitor.bottom - monitor.top,
                    SWP_FRAMECHANGED | SWP_NOACTIVATE,
                );
            }
        } else if let Some((windowed_style, rect)) = self.windowed.take() {
            unsafe {
                SetWindowLongPtrW(
                    self.hwnd,
                    GWL_STYLE,
                    (windowed_style | (style & (WS_VISIBLE | WS_DISABLED))) as LONG_PTR,
                );
                SetWindowPos(
                    self.hwnd,
                    ptr::null_mut(),
                    rect.left,
                    rect.top,
                    rect.right - rect.left,
                    rect.bottom - rect.top,
                    SWP_FRAMECHANGED | SWP_NOZORDER | SWP_NOACTIVATE,
                );
            }
        }
        // Win32 has no notification for this.
        self.state.push(NativeEvent::StateChanged);
    }

    fn read_clipboard(&self, format: UINT) -> Option<Vec<u8>> {
        unsafe {
            if IsClipboardFormatAvailable(format) == FALSE || OpenClipboard(self.hwnd) == FALSE {
                return None;
            }
            defer! {
                CloseClipboard();
            }
            let handle = GetClipboardData(format);
            if handle.is_null() {
                return None;
            }
            let locked = GlobalLock(handle) as *const u8;
            if locked.is_null() {
                return None;
            }
            let data = if format == CF_UNICODETEXT {
                let text = (locked as *mut u16).from_wide();
                text.map(String::into_bytes)
            } else {
                Some(std::slice::from_raw_parts(locked, GlobalSize(handle)).to_vec())
            };
            GlobalUnlock(handle);
            data
        }
    }
}

impl NativeWindow for Win32Window {
    fn id(&self) -> WindowId {
        hwnd_id(self.hwnd)
    }

    fn raw_handle(&self) -> RawWindow {
        RawWindow::Win32 {
            hwnd: self.hwnd as *mut _,
        }
    }

    fn map(&self, activate: bool) {
        let cmd = if activate { SW_SHOW } else { SW_SHOWNA };
        unsafe { ShowWindow(self.hwnd, cmd) };
    }

    fn unmap(&self) {
        unsafe { ShowWindow(self.hwnd, SW_HIDE) };
    }

    fn move_resize(&self, frame_origin: Point, client_size: Size) {
        let outer = client_size + frame_insets(self.hwnd).size();
        let ok = unsafe {
            SetWindowPos(
                self.hwnd,
                ptr::null_mut(),
                frame_origin.x.round() as i32,
                frame_origin.y.round() as i32,
                outer.width.round() as i32,
                outer.height.round() as i32,
                SWP_NOZORDER | SWP_NOACTIVATE,
            )
        };
        if ok == FALSE {
            warn!("failed to place window: {}", Error::last("SetWindowPos"));
        }
    }

    fn set_size_hints(&self, hints: &SizeHints) {
        self.state.hints.set(*hints);
    }

    fn apply_decorations(&self, tier: DecorationTier, decorations: &Decorations) -> bool {
        // Win32 styles express every decoration directly.
        if tier != DecorationTier::Extended {
            return false;
        }
        if self.windowed.get().is_some() {
            return true;
        }
        let (style, _) = self.style();
        let keep = style & (WS_VISIBLE | WS_DISABLED | WS_MINIMIZE | WS_MAXIMIZE);
        self.set_style(keep | window_style(self.popup, decorations));
        true
    }

    fn set_kind(&self, chain: &[WindowKind]) -> WindowKind {
        let kind = chain.first().copied().unwrap_or(WindowKind::Normal);
        if !matches!(kind, WindowKind::Normal | WindowKind::Dialog) {
            let (_, ex_style) = self.style();
            unsafe {
                SetWindowLongPtrW(
                    self.hwnd,
                    GWL_EXSTYLE,
                    (ex_style | WS_EX_TOOLWINDOW) as LONG_PTR,
                )
            };
        }
        kind
    }

    fn probe_frame_extents(&self) -> Option<Insets> {
        Some(frame_insets(self.hwnd))
    }

    fn query_state(&self) -> Option<WmState> {
        unsafe {
            Some(WmState {
                minimized: IsIconic(self.hwnd) != FALSE,
                maximized: IsZoomed(self.hwnd) != FALSE,
                fullscreen: self.windowed.get().is_some(),
            })
        }
    }

    fn request_state(&self, request: StateRequest) {
        let cmd = match request {
            StateRequest::Minimize => SW_MINIMIZE,
            StateRequest::Maximize => SW_MAXIMIZE,
            StateRequest::Restore => SW_RESTORE,
            StateRequest::Fullscreen(fullscreen) => return self.set_fullscreen(fullscreen),
        };
        unsafe { ShowWindow(self.hwnd, cmd) };
    }

    fn set_title(&self, title: &str) {
        unsafe { SetWindowTextW(self.hwnd, title.to_wide().as_ptr()) };
    }

    fn set_enabled(&self, enabled: bool) {
        unsafe { EnableWindow(self.hwnd, enabled as BOOL) };
    }

    fn raise(&self) {
        unsafe {
            SetWindowPos(
                self.hwnd,
                HWND_TOP,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            )
        };
    }

    fn lower(&self) {
        unsafe {
            SetWindowPos(
                self.hwnd,
                HWND_BOTTOM,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            )
        };
    }

    fn focus(&self) {
        unsafe {
            if GetForegroundWindow() != self.hwnd {
                SetForegroundWindow(self.hwnd);
            }
            SetFocus(self.hwnd);
        }
    }

    fn has_focus(&self) -> bool {
        unsafe { GetFocus() == self.hwnd }
    }

    fn set_pointer_grab(&self, grab: bool) {
        unsafe {
            if grab {
                SetCapture(self.hwnd);
            } else if GetCapture() == self.hwnd {
                ReleaseCapture();
            }
        }
    }

    fn set_cursor_visible(&self, visible: bool) {
        // ShowCursor keeps a counter; only move it once per change.
        if self.cursor_hidden.get() == visible {
            self.cursor_hidden.set(!visible);
            unsafe { ShowCursor(visible as BOOL) };
        }
    }

    fn client_rect(&self) -> Option<Rect> {
        client_screen_rect(self.hwnd)
    }

    fn update_layered(&self, image: &LayeredImage) -> Result<(), crate::error::Error> {
        let expected = image.width as usize * image.height as usize * 4;
        if image.pixels.len() != expected {
            return Err(anyhow::anyhow!(
                "layered image is {} bytes, expected {}",
                image.pixels.len(),
                expected
            )
            .into());
        }
        unsafe {
            let screen_dc = GetDC(ptr::null_mut());
            defer! {
                ReleaseDC(ptr::null_mut(), screen_dc);
            }
            let memory_dc = CreateCompatibleDC(screen_dc);
            if memory_dc.is_null() {
                return Err(Error::last("CreateCompatibleDC").into());
            }
            defer! {
                DeleteDC(memory_dc);
            }

            let mut info: BITMAPINFO = mem::zeroed();
            info.bmiHeader = BITMAPINFOHEADER {
                biSize: mem::size_of::<BITMAPINFOHEADER>() as DWORD,
                biWidth: image.width as i32,
                // Negative for top-down rows.
                biHeight: -(image.height as i32),
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB,
                ..mem::zeroed()
            };
            let mut bits = ptr::null_mut();
            let bitmap = CreateDIBSection(
                memory_dc,
                &info,
                DIB_RGB_COLORS,
                &mut bits,
                ptr::null_mut(),
                0,
            );
            if bitmap.is_null() || bits.is_null() {
                return Err(Error::last("CreateDIBSection").into());
            }
            defer! {
                DeleteObject(bitmap as _);
            }
            ptr::copy_nonoverlapping(image.pixels.as_ptr(), bits as *mut u8, expected);
            let previous = SelectObject(memory_dc, bitmap as _);
            defer! {
                SelectObject(memory_dc, previous);
            }

            let mut size = SIZE {
                cx: image.width as i32,
                cy: image.height as i32,
            };
            let mut source = POINT { x: 0, y: 0 };
            let mut blend = BLENDFUNCTION {
                BlendOp: AC_SRC_OVER,
                BlendFlags: 0,
                SourceConstantAlpha: 255,
                AlphaFormat: AC_SRC_ALPHA,
            };
            if UpdateLayeredWindow(
                self.hwnd,
                screen_dc,
                ptr::null_mut(),
                &mut size,
                memory_dc,
                &mut source,
                0,
                &mut blend,
                ULW_ALPHA,
            ) == FALSE
            {
                return Err(Error::last("UpdateLayeredWindow").into());
            }
        }
        Ok(())
    }

    fn composition_enabled(&self) -> bool {
        composition_enabled()
    }

    fn set_hit_region(&self, region: Option<Rect>) {
        self.state.hit_region.set(region);
        if self.layered_composited {
            enable_alpha_channel(self.hwnd, region.map(|r| rect_to_recti(r.expand())));
        }
    }

    fn request_expose(&self, rect: Rect) {
        let rect = rect_to_recti(rect.expand());
        unsafe { InvalidateRect(self.hwnd, &rect, FALSE) };
    }

    fn claim_clipboard(&self, contents: &ClipboardContents) -> bool {
        unsafe {
            if OpenClipboard(self.hwnd) == FALSE {
                warn!("failed to open the clipboard: {}", Error::last("OpenClipboard"));
                return false;
            }
            defer! {
                CloseClipboard();
            }
            self.state.claiming_clipboard.set(true);
            EmptyClipboard();
            self.state.claiming_clipboard.set(false);

            let mut claimed = true;
            if let Some(text) = &contents.text {
                let wide = text.to_wide();
                let bytes = std::slice::from_raw_parts(
                    wide.as_ptr() as *const u8,
                    wide.len() * mem::size_of::<u16>(),
                );
                claimed &= set_clipboard_data(CF_UNICODETEXT, bytes);
            }
            if let Some(image) = &contents.image {
                if self.image_format == 0 {
                    warn!("the image clipboard format is not registered");
                    claimed = false;
                } else {
                    claimed &= set_clipboard_data(self.image_format, &image.to_bytes());
                }
            }
            claimed
        }
    }

    fn fetch_clipboard_text(&self) -> Option<String> {
        let data = self.read_clipboard(CF_UNICODETEXT)?;
        String::from_utf8(data).ok()
    }

    fn fetch_clipboard_image(&self) -> Option<ClipboardImage> {
        if self.image_format == 0 {
            return None;
        }
        let data = self.read_clipboard(self.image_format)?;
        ClipboardImage::from_bytes(&data)
    }

    fn set_message_filter(&self, filter: MessageFilter) {
        match self.state.filter.try_borrow_mut() {
            Ok(mut slot) => *slot = Some(filter),
            Err(_) => warn!("cannot replace the message filter while it runs"),
        }
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        if self.cursor_hidden.get() {
            self.set_cursor_visible(true);
        }
        self.set_pointer_grab(false);
        if self.foreign {
            release_adopted(self.hwnd);
        } else if unsafe { DestroyWindow(self.hwnd) } == FALSE {
            error!("failed to destroy window: {}", Error::last("DestroyWindow"));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn hwnd_id(hwnd: HWND) -> WindowId {
    WindowId(hwnd as usize as u64)
}

/// Gives a new window its id, including events it queued while being created.
fn set_window_id(state: &WindowState, hwnd: HWND) {
    let placeholder = state.id.replace(hwnd_id(hwnd));
    for (id, _) in state.events.borrow_mut().iter_mut() {
        if *id == placeholder {
            *id = hwnd_id(hwnd);
        }
    }
}

/// Routes an existing window's messages through [`win_proc_dispatch`].
fn adopt(hwnd: HWND, state: &Rc<WindowState>) {
    unsafe {
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, Rc::into_raw(Rc::clone(state)) as LONG_PTR);
        let previous =
            SetWindowLongPtrW(hwnd, GWLP_WNDPROC, win_proc_dispatch as usize as LONG_PTR);
        state
            .previous_proc
            .set(mem::transmute::<LONG_PTR, WNDPROC>(previous));
    }
}

/// Gives an adopted window its own procedure back. The window itself stays.
fn release_adopted(hwnd: HWND) {
    unsafe {
        let state_ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const WindowState;
        if state_ptr.is_null() {
            return;
        }
        if let Some(previous) = (*state_ptr).previous_proc.get() {
            SetWindowLongPtrW(hwnd, GWLP_WNDPROC, previous as usize as LONG_PTR);
        }
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
        drop(Rc::from_raw(state_ptr));
    }
}

/// The style bits for a set of decorations.
fn window_style(popup: bool, decorations: &Decorations) -> DWORD {
    let mut style = WS_CLIPCHILDREN | WS_CLIPSIBLINGS;
    style |= if popup { WS_POPUP } else { WS_OVERLAPPED };
    if decorations.title {
        style |= WS_CAPTION;
    } else if decorations.border {
        style |= WS_BORDER;
    }
    if decorations.resize_handles {
        style |= WS_THICKFRAME;
    }
    if decorations.menu || decorations.close {
        style |= WS_SYSMENU;
    }
    if decorations.minimize {
        style |= WS_MINIMIZEBOX;
    }
    if decorations.maximize {
        style |= WS_MAXIMIZEBOX;
    }
    style
}

/// Splits the key message `lparam` into scan code, extended flag and auto-repeat flag.
fn key_flags(lparam: LPARAM) -> (u16, bool, bool) {
    let scan = ((lparam >> 16) & 0xff) as u16;
    let extended = (lparam >> 24) & 1 != 0;
    let repeated = (lparam >> 30) & 1 != 0;
    (scan, extended, repeated)
}

fn get_modifiers() -> Modifiers {
    let mut modifiers = Modifiers::empty();
    for &(vk, modifier, mask) in MODIFIER_MAP {
        if unsafe { GetKeyState(vk) } & mask != 0 {
            modifiers |= modifier;
        }
    }
    modifiers
}

/// Frame sizes for a style pair, from an empty client rect.
fn adjusted_insets(style: DWORD, ex_style: DWORD) -> Insets {
    let mut rect = RECT {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };
    if unsafe { AdjustWindowRectEx(&mut rect, style, FALSE, ex_style) } == FALSE {
        warn!("AdjustWindowRectEx failed: {}", Error::last("AdjustWindowRectEx"));
        return Insets::ZERO;
    }
    Insets::new(
        -rect.left as f64,
        -rect.top as f64,
        rect.right as f64,
        rect.bottom as f64,
    )
}

fn frame_insets(hwnd: HWND) -> Insets {
    unsafe {
        adjusted_insets(
            GetWindowLongPtrW(hwnd, GWL_STYLE) as DWORD,
            GetWindowLongPtrW(hwnd, GWL_EXSTYLE) as DWORD,
        )
    }
}

fn client_screen_rect(hwnd: HWND) -> Option<Rect> {
    unsafe {
        let mut rect = mem::zeroed::<RECT>();
        if GetClientRect(hwnd, &mut rect) == FALSE {
            return None;
        }
        let mut origin = POINT { x: 0, y: 0 };
        if ClientToScreen(hwnd, &mut origin) == FALSE {
            return None;
        }
        Some(Rect::from_origin_size(
            (origin.x as f64, origin.y as f64),
            (rect.right as f64, rect.bottom as f64),
        ))
    }
}

fn monitor_rect(hwnd: HWND) -> RECT {
    unsafe {
        let monitor = MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST);
        let mut info: MONITORINFO = mem::zeroed();
        info.cbSize = mem::size_of::<MONITORINFO>() as DWORD;
        if GetMonitorInfoW(monitor, &mut info) == FALSE {
            warn!("failed to get monitor info: {}", Error::last("GetMonitorInfoW"));
        }
        info.rcMonitor
    }
}

/// Copies `bytes` into a global block owned by the clipboard from then on.
unsafe fn set_clipboard_data(format: UINT, bytes: &[u8]) -> bool {
    let handle = GlobalAlloc(GMEM_MOVEABLE, bytes.len());
    if handle.is_null() {
        return false;
    }
    let locked = GlobalLock(handle) as *mut u8;
    if locked.is_null() {
        GlobalFree(handle);
        return false;
    }
    ptr::copy_nonoverlapping(bytes.as_ptr(), locked, bytes.len());
    GlobalUnlock(handle);
    if SetClipboardData(format, handle).is_null() {
        warn!(
            "failed to set clipboard format {}: {}",
            format,
            Error::last("SetClipboardData")
        );
        GlobalFree(handle);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styles_follow_decorations() {
        let full = window_style(false, &Decorations::ALL);
        assert_eq!(full & WS_CAPTION, WS_CAPTION);
        assert_ne!(full & WS_THICKFRAME, 0);
        assert_ne!(full & WS_SYSMENU, 0);
        assert_eq!(full & WS_POPUP, 0);

        let bare = window_style(true, &Decorations::NONE);
        assert_ne!(bare & WS_POPUP, 0);
        assert_eq!(bare & (WS_CAPTION | WS_BORDER | WS_THICKFRAME | WS_SYSMENU), 0);

        let bordered = window_style(
            true,
            &Decorations {
                border: true,
                ..Decorations::NONE
            },
        );
        assert_eq!(bordered & WS_CAPTION, WS_BORDER);
    }

    #[test]
    fn key_lparam_fields() {
        // Scan code 0x1c (Enter), extended, previously down.
        let lparam = (0x1c << 16) | (1 << 24) | (1 << 30) | 1;
        assert_eq!(key_flags(lparam), (0x1c, true, true));
        assert_eq!(key_flags(0x001e_0001), (0x1e, false, false));
    }

    #[test]
    fn ids_come_from_handles() {
        let hwnd = 0x1234usize as HWND;
        assert_eq!(hwnd_id(hwnd).to_raw(), 0x1234);
    }
}
