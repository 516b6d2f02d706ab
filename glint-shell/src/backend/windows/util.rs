// Copyright 2019 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Conversions between Win32 and Rust types, and functions loaded at runtime because only
//! some versions of Windows have them.

use std::ffi::{CString, OsStr, OsString};
use std::mem;
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::slice;

use once_cell::sync::Lazy;
use tracing::info;
use winapi::shared::minwindef::{BOOL, HMODULE, UINT};
use winapi::shared::ntdef::{HRESULT, LPWSTR};
use winapi::shared::windef::{DPI_AWARENESS_CONTEXT, HWND, RECT};
use winapi::shared::winerror::SUCCEEDED;
use winapi::um::dwmapi::{DWM_BB_BLURREGION, DWM_BB_ENABLE, DWM_BLURBEHIND};
use winapi::um::libloaderapi::{GetModuleHandleW, GetProcAddress, LoadLibraryW};
use winapi::um::shellscalingapi::PROCESS_DPI_AWARENESS;
use winapi::um::wingdi::{CreateRectRgn, DeleteObject};

use crate::kurbo::Rect;

use super::error::Error;

pub(crate) fn as_result(hr: HRESULT) -> Result<(), Error> {
    if SUCCEEDED(hr) {
        Ok(())
    } else {
        Err(Error::Hr(hr))
    }
}

pub trait ToWide {
    fn to_wide(&self) -> Vec<u16>;
}

impl<T> ToWide for T
where
    T: AsRef<OsStr>,
{
    fn to_wide(&self) -> Vec<u16> {
        self.as_ref().encode_wide().chain(Some(0)).collect()
    }
}

pub trait FromWide {
    fn to_u16_slice(&self) -> &[u16];

    fn to_os_string(&self) -> OsString {
        OsStringExt::from_wide(self.to_u16_slice())
    }

    fn from_wide(&self) -> Option<String> {
        String::from_utf16(self.to_u16_slice()).ok()
    }
}

impl FromWide for LPWSTR {
    fn to_u16_slice(&self) -> &[u16] {
        unsafe {
            let mut len = 0;
            while *self.offset(len) != 0 {
                len += 1;
            }
            slice::from_raw_parts(*self, len as usize)
        }
    }
}

impl FromWide for [u16] {
    fn to_u16_slice(&self) -> &[u16] {
        self
    }
}

#[inline]
pub(crate) fn rect_to_recti(rect: Rect) -> RECT {
    RECT {
        left: rect.x0 as i32,
        top: rect.y0 as i32,
        right: rect.x1 as i32,
        bottom: rect.y1 as i32,
    }
}

#[inline]
pub(crate) fn recti_to_rect(rect: RECT) -> Rect {
    Rect::new(
        rect.left as f64,
        rect.top as f64,
        rect.right as f64,
        rect.bottom as f64,
    )
}

/// Low word of an `LPARAM`, sign extended. Mouse coordinates can be negative.
#[inline]
pub(crate) fn get_x_lparam(lparam: isize) -> i32 {
    (lparam & 0xffff) as i16 as i32
}

/// High word of an `LPARAM`, sign extended.
#[inline]
pub(crate) fn get_y_lparam(lparam: isize) -> i32 {
    ((lparam >> 16) & 0xffff) as i16 as i32
}

// from user32.dll
type GetDpiForSystem = unsafe extern "system" fn() -> UINT;
type SetProcessDpiAwarenessContext = unsafe extern "system" fn(DPI_AWARENESS_CONTEXT) -> BOOL;
// from shcore.dll
type SetProcessDpiAwareness = unsafe extern "system" fn(PROCESS_DPI_AWARENESS) -> HRESULT;
// from dwmapi.dll
type DwmIsCompositionEnabled = unsafe extern "system" fn(*mut BOOL) -> HRESULT;
type DwmEnableBlurBehindWindow = unsafe extern "system" fn(HWND, *const DWM_BLURBEHIND) -> HRESULT;

#[allow(non_snake_case)] // For member fields
pub struct OptionalFunctions {
    pub GetDpiForSystem: Option<GetDpiForSystem>,
    pub SetProcessDpiAwarenessContext: Option<SetProcessDpiAwarenessContext>,
    pub SetProcessDpiAwareness: Option<SetProcessDpiAwareness>,
    pub DwmIsCompositionEnabled: Option<DwmIsCompositionEnabled>,
    pub DwmEnableBlurBehindWindow: Option<DwmEnableBlurBehindWindow>,
}

#[allow(non_snake_case)] // For local variables
fn load_optional_functions() -> OptionalFunctions {
    // Sets the local of the same name to the function in $lib, if it is there.
    macro_rules! load_function {
        ($lib: expr, $function: ident, $min_windows_version: expr) => {{
            let name = stringify!($function);
            let function_ptr = match CString::new(name) {
                Ok(cstr) => unsafe { GetProcAddress($lib, cstr.as_ptr()) },
                Err(_) => std::ptr::null_mut(),
            };

            if function_ptr.is_null() {
                info!(
                    "Could not load `{}`. Windows {} or later is needed",
                    name, $min_windows_version
                );
            } else {
                let function = unsafe { mem::transmute::<_, $function>(function_ptr) };
                $function = Some(function);
            }
        }};
    }

    fn load_library(name: &str) -> HMODULE {
        let encoded_name = name.to_wide();

        // Reuse the module if something in the process already loaded it.
        let library = unsafe { GetModuleHandleW(encoded_name.as_ptr()) };
        if !library.is_null() {
            return library;
        }

        unsafe { LoadLibraryW(encoded_name.as_ptr()) }
    }

    let shcore = load_library("shcore.dll");
    let user32 = load_library("user32.dll");
    let dwmapi = load_library("dwmapi.dll");

    let mut GetDpiForSystem = None;
    let mut SetProcessDpiAwarenessContext = None;
    let mut SetProcessDpiAwareness = None;
    let mut DwmIsCompositionEnabled = None;
    let mut DwmEnableBlurBehindWindow = None;

    if shcore.is_null() {
        info!("No shcore.dll");
    } else {
        load_function!(shcore, SetProcessDpiAwareness, "8.1");
    }

    if user32.is_null() {
        info!("No user32.dll");
    } else {
        load_function!(user32, GetDpiForSystem, "10");
        load_function!(user32, SetProcessDpiAwarenessContext, "10");
    }

    if dwmapi.is_null() {
        info!("No dwmapi.dll");
    } else {
        load_function!(dwmapi, DwmIsCompositionEnabled, "Vista");
        load_function!(dwmapi, DwmEnableBlurBehindWindow, "Vista");
    }

    OptionalFunctions {
        GetDpiForSystem,
        SetProcessDpiAwarenessContext,
        SetProcessDpiAwareness,
        DwmIsCompositionEnabled,
        DwmEnableBlurBehindWindow,
    }
}

pub static OPTIONAL_FUNCTIONS: Lazy<OptionalFunctions> = Lazy::new(load_optional_functions);

pub(crate) const CLASS_NAME: &str = "glint";
/// Same as [`CLASS_NAME`] with `CS_DROPSHADOW`, which is a class style.
pub(crate) const SHADOW_CLASS_NAME: &str = "glint-shadow";

/// Whether the desktop window manager composes windows.
///
/// Always true on Windows 8 and later.
pub(crate) fn composition_enabled() -> bool {
    let Some(is_enabled) = OPTIONAL_FUNCTIONS.DwmIsCompositionEnabled else {
        return false;
    };
    let mut enabled: BOOL = 0;
    match as_result(unsafe { is_enabled(&mut enabled) }) {
        Ok(()) => enabled != 0,
        Err(e) => {
            info!("DwmIsCompositionEnabled failed: {}", e);
            false
        }
    }
}

/// Lets the compositor use the alpha channel of `hwnd` inside `region` (client pixels), or
/// over the whole window.
pub(crate) fn enable_alpha_channel(hwnd: HWND, region: Option<RECT>) {
    let Some(enable_blur) = OPTIONAL_FUNCTIONS.DwmEnableBlurBehindWindow else {
        return;
    };
    unsafe {
        let mut blur: DWM_BLURBEHIND = mem::zeroed();
        blur.dwFlags = DWM_BB_ENABLE;
        blur.fEnable = 1;
        if let Some(rect) = region {
            blur.dwFlags |= DWM_BB_BLURREGION;
            blur.hRgnBlur = CreateRectRgn(rect.left, rect.top, rect.right, rect.bottom);
        }
        if let Err(e) = as_result(enable_blur(hwnd, &blur)) {
            info!("DwmEnableBlurBehindWindow failed: {}", e);
        }
        if !blur.hRgnBlur.is_null() {
            DeleteObject(blur.hRgnBlur as _);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lparam_words_are_sign_extended() {
        let lparam = ((-5i16 as u16 as isize) << 16) | (-20i16 as u16 as isize);
        assert_eq!(get_x_lparam(lparam), -20);
        assert_eq!(get_y_lparam(lparam), -5);
        assert_eq!(get_x_lparam(0x0030_0040), 0x40);
    }

    #[test]
    fn failed_hresults_become_errors() {
        use winapi::shared::winerror::{E_FAIL, S_FALSE, S_OK};

        assert!(as_result(S_OK).is_ok());
        assert!(as_result(S_FALSE).is_ok());
        assert!(matches!(as_result(E_FAIL), Err(Error::Hr(hr)) if hr == E_FAIL));
    }

    #[test]
    fn wide_strings_round_trip() {
        let wide = "glint".to_wide();
        assert_eq!(wide.last(), Some(&0));
        assert_eq!(wide[..wide.len() - 1].from_wide().as_deref(), Some("glint"));
    }
}
