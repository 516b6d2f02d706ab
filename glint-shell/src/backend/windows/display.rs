// Copyright 2019 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! The Win32 "display": the thread's message queue plus the registered window classes.
//!
//! Win32 delivers messages by calling the window procedure, so translated events are parked
//! in a queue shared with every window until [`NativeDisplay::next_event`] hands them out.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::mem;
use std::ptr;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};
use winapi::shared::minwindef::{BOOL, HINSTANCE, LPARAM, TRUE};
use winapi::shared::ntdef::LPCWSTR;
use winapi::shared::windef::{
    DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2, HCURSOR, HDC, HMONITOR, LPRECT, RECT,
};
use winapi::um::libloaderapi::GetModuleHandleW;
use winapi::um::shellscalingapi::PROCESS_PER_MONITOR_DPI_AWARE;
use winapi::um::wingdi::{GetDeviceCaps, LOGPIXELSX};
use winapi::um::winuser::{
    DispatchMessageW, EnumDisplayMonitors, GetDC, GetMonitorInfoW, LoadCursorW, LoadIconW,
    PeekMessageW, RegisterClassW, ReleaseDC, TranslateMessage, CS_DROPSHADOW, CS_OWNDC,
    IDC_ARROW, MAKEINTRESOURCEW, MONITORINFO, MONITORINFOF_PRIMARY, MSG, PM_NOREMOVE, PM_REMOVE,
    WM_QUIT, WNDCLASSW,
};

use super::error::Error;
use super::util::{recti_to_rect, ToWide, CLASS_NAME, OPTIONAL_FUNCTIONS, SHADOW_CLASS_NAME};
use super::window::{self, Win32Window};
use crate::backend::{
    NativeDisplay, NativeEvent, NativeWindow, NativeWindowParams, RawDisplay, WindowId,
};
use crate::kurbo::Rect;

/// Events translated by window procedures and not yet handed out.
pub(crate) type EventQueue = Rc<RefCell<VecDeque<(WindowId, NativeEvent)>>>;

/// Used to ensure the window classes are registered only once per process.
static WINDOW_CLASSES_REGISTERED: AtomicBool = AtomicBool::new(false);

const DEFAULT_DPI: f64 = 96.0;

pub(crate) struct Display {
    events: EventQueue,
}

impl Display {
    pub(crate) fn open() -> Result<Display, crate::error::Error> {
        set_dpi_awareness();
        if WINDOW_CLASSES_REGISTERED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            if let Err(e) = register_classes() {
                WINDOW_CLASSES_REGISTERED.store(false, Ordering::Release);
                return Err(e.into());
            }
        }
        Ok(Display {
            events: Rc::new(RefCell::new(VecDeque::new())),
        })
    }
}

fn set_dpi_awareness() {
    if let Some(func) = OPTIONAL_FUNCTIONS.SetProcessDpiAwarenessContext {
        // Windows 10 only.
        unsafe {
            func(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
        }
    } else if let Some(func) = OPTIONAL_FUNCTIONS.SetProcessDpiAwareness {
        unsafe {
            func(PROCESS_PER_MONITOR_DPI_AWARE);
        }
    }
}

fn register_classes() -> Result<(), Error> {
    for (name, style) in [
        (CLASS_NAME, CS_OWNDC),
        (SHADOW_CLASS_NAME, CS_OWNDC | CS_DROPSHADOW),
    ] {
        let class_name = name.to_wide();
        let class = unsafe {
            WNDCLASSW {
                style,
                lpfnWndProc: Some(window::win_proc_dispatch),
                cbClsExtra: 0,
                cbWndExtra: 0,
                hInstance: 0 as HINSTANCE,
                hIcon: LoadIconW(GetModuleHandleW(0 as LPCWSTR), MAKEINTRESOURCEW(1)),
                hCursor: LoadCursorW(ptr::null_mut(), IDC_ARROW) as HCURSOR,
                // The GL layer paints everything.
                hbrBackground: ptr::null_mut(),
                lpszMenuName: 0 as LPCWSTR,
                lpszClassName: class_name.as_ptr(),
            }
        };
        if unsafe { RegisterClassW(&class) } == 0 {
            return Err(Error::last("RegisterClassW"));
        }
    }
    debug!("registered window classes");
    Ok(())
}

/// Dispatches one message from the thread queue. Returns `false` once the queue is empty.
fn pump_one() -> bool {
    unsafe {
        let mut msg = mem::MaybeUninit::<MSG>::uninit();
        if PeekMessageW(msg.as_mut_ptr(), ptr::null_mut(), 0, 0, PM_REMOVE) == 0 {
            return false;
        }
        let msg = msg.assume_init();
        if msg.message == WM_QUIT {
            debug!("ignoring WM_QUIT, windows are closed through their sites");
            return true;
        }
        TranslateMessage(&msg);
        DispatchMessageW(&msg);
        true
    }
}

impl NativeDisplay for Display {
    fn create_window(
        &self,
        params: &NativeWindowParams,
    ) -> Result<Box<dyn NativeWindow>, crate::error::Error> {
        let window = Win32Window::create(&self.events, params)?;
        Ok(Box::new(window))
    }

    fn next_event(&self) -> Option<(WindowId, NativeEvent)> {
        loop {
            if let Some(event) = self.events.borrow_mut().pop_front() {
                return Some(event);
            }
            if !pump_one() {
                return None;
            }
        }
    }

    fn has_pending(&self) -> bool {
        if !self.events.borrow().is_empty() {
            return true;
        }
        let mut msg = mem::MaybeUninit::<MSG>::uninit();
        unsafe { PeekMessageW(msg.as_mut_ptr(), ptr::null_mut(), 0, 0, PM_NOREMOVE) != 0 }
    }

    fn screen_rect(&self, monitor: usize) -> Rect {
        let monitors = get_monitors();
        monitors
            .get(monitor)
            .or_else(|| monitors.first())
            .copied()
            .unwrap_or_else(|| {
                warn!("no monitors found");
                Rect::ZERO
            })
    }

    fn ppi(&self) -> f64 {
        if let Some(func) = OPTIONAL_FUNCTIONS.GetDpiForSystem {
            return f64::from(unsafe { func() });
        }
        unsafe {
            let hdc = GetDC(ptr::null_mut());
            if hdc.is_null() {
                return DEFAULT_DPI;
            }
            let dpi = GetDeviceCaps(hdc, LOGPIXELSX);
            ReleaseDC(ptr::null_mut(), hdc);
            if dpi > 0 {
                f64::from(dpi)
            } else {
                DEFAULT_DPI
            }
        }
    }

    fn raw_display(&self) -> RawDisplay {
        RawDisplay::Win32
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

unsafe extern "system" fn monitorenumproc(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _lprect: LPRECT,
    lparam: LPARAM,
) -> BOOL {
    let rect = RECT {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };
    let mut info = MONITORINFO {
        cbSize: mem::size_of::<MONITORINFO>() as u32,
        rcMonitor: rect,
        rcWork: rect,
        dwFlags: 0,
    };
    if GetMonitorInfoW(hmonitor, &mut info) == 0 {
        warn!("failed to get monitor info: {}", Error::last("GetMonitorInfoW"));
        return TRUE;
    }
    let monitors = &mut *(lparam as *mut Vec<(bool, Rect)>);
    monitors.push((
        info.dwFlags & MONITORINFOF_PRIMARY != 0,
        recti_to_rect(info.rcMonitor),
    ));
    TRUE
}

/// Monitor bounds with the primary monitor first.
fn get_monitors() -> Vec<Rect> {
    let mut monitors = Vec::<(bool, Rect)>::new();
    let ptr = &mut monitors as *mut Vec<(bool, Rect)>;
    if unsafe {
        EnumDisplayMonitors(
            ptr::null_mut(),
            ptr::null_mut(),
            Some(monitorenumproc),
            ptr as LPARAM,
        )
    } == 0
    {
        warn!(
            "failed to enumerate display monitors: {}",
            Error::last("EnumDisplayMonitors")
        );
    }
    monitors.sort_by_key(|(primary, _)| !primary);
    monitors.into_iter().map(|(_, rect)| rect).collect()
}
