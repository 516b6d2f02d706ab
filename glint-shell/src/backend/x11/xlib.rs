// Copyright 2021 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! The Xlib display behind the connection.
//!
//! GLX works on Xlib displays, so the connection is opened with `XOpenDisplay` and its XCB
//! half is handed to x11rb. Both libraries are loaded at runtime.

use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use libloading::Library;

use super::error::Error;

type XOpenDisplay = unsafe extern "C" fn(*const c_char) -> *mut c_void;
type XCloseDisplay = unsafe extern "C" fn(*mut c_void) -> c_int;
type XDefaultScreen = unsafe extern "C" fn(*mut c_void) -> c_int;
type XGetXCBConnection = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type XSetEventQueueOwner = unsafe extern "C" fn(*mut c_void, c_int);

/// `XCBOwnsEventQueue` from `Xlib-xcb.h`.
const XCB_OWNS_EVENT_QUEUE: c_int = 1;

pub(crate) struct XlibDisplay {
    display: *mut c_void,
    screen: c_int,
    xcb: *mut c_void,
    close_display: XCloseDisplay,
    _xlib_xcb: Library,
    _xlib: Library,
}

impl XlibDisplay {
    /// Opens the display named by `$DISPLAY`.
    pub(crate) fn open() -> Result<XlibDisplay, Error> {
        let xlib = load(&["libX11.so.6", "libX11.so"])?;
        let xlib_xcb = load(&["libX11-xcb.so.1", "libX11-xcb.so"])?;
        unsafe {
            let open_display: XOpenDisplay = symbol(&xlib, b"XOpenDisplay\0")?;
            let close_display: XCloseDisplay = symbol(&xlib, b"XCloseDisplay\0")?;
            let default_screen: XDefaultScreen = symbol(&xlib, b"XDefaultScreen\0")?;
            let get_xcb: XGetXCBConnection = symbol(&xlib_xcb, b"XGetXCBConnection\0")?;
            let set_owner: XSetEventQueueOwner = symbol(&xlib_xcb, b"XSetEventQueueOwner\0")?;

            let display = open_display(ptr::null());
            if display.is_null() {
                return Err(Error::Xlib("XOpenDisplay failed".into()));
            }
            let xcb = get_xcb(display);
            if xcb.is_null() {
                close_display(display);
                return Err(Error::Xlib("the display has no XCB connection".into()));
            }
            // Otherwise libX11 may take events off the queue before x11rb sees them.
            set_owner(display, XCB_OWNS_EVENT_QUEUE);
            Ok(XlibDisplay {
                display,
                screen: default_screen(display),
                xcb,
                close_display,
                _xlib_xcb: xlib_xcb,
                _xlib: xlib,
            })
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut c_void {
        self.display
    }

    pub(crate) fn screen(&self) -> c_int {
        self.screen
    }

    pub(crate) fn xcb_connection(&self) -> *mut c_void {
        self.xcb
    }
}

impl Drop for XlibDisplay {
    fn drop(&mut self) {
        unsafe { (self.close_display)(self.display) };
    }
}

fn load(names: &[&str]) -> Result<Library, Error> {
    let mut last_error = String::new();
    for name in names {
        match unsafe { Library::new(name) } {
            Ok(library) => return Ok(library),
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(Error::Xlib(last_error))
}

unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Result<T, Error> {
    library
        .get::<T>(name)
        .map(|symbol| *symbol)
        .map_err(|e| Error::Xlib(e.to_string()))
}
