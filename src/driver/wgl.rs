// Copyright 2021 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! WGL.
//!
//! Pixel formats are applied to a window after it exists. The extension string and
//! `wglCreateContextAttribsARB` are only reachable through a current context, so a
//! throwaway legacy context is made on the window first.
//!
//! Layered windows without composition cannot be rendered to directly. Their context
//! renders into a hidden shadow window instead, and each frame is read back from it.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::{CStr, CString, OsStr};
use std::os::raw::{c_char, c_int, c_void};
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use tracing::{debug, warn};
use winapi::shared::minwindef::{BOOL, FALSE, HMODULE};
use winapi::shared::windef::{HDC, HGLRC, HWND};
use winapi::um::libloaderapi::{GetProcAddress, LoadLibraryW};
use winapi::um::wingdi::{
    wglCreateContext, wglDeleteContext, wglGetCurrentContext, wglGetCurrentDC, wglGetProcAddress,
    wglMakeCurrent, wglShareLists, ChoosePixelFormat, DescribePixelFormat, SetPixelFormat,
    SwapBuffers, PFD_DOUBLEBUFFER, PFD_DRAW_TO_WINDOW, PFD_MAIN_PLANE, PFD_STEREO,
    PFD_SUPPORT_OPENGL, PFD_TYPE_RGBA, PIXELFORMATDESCRIPTOR,
};
use winapi::um::winuser::{
    CreateWindowExW, DestroyWindow, GetDC, ReleaseDC, SetWindowPos, SWP_NOACTIVATE, SWP_NOMOVE,
    SWP_NOZORDER, WS_POPUP,
};

use glint_shell::{PlatformWindow, RawWindow};

use super::gl::GlCalls;
use super::{
    ContextRequest, ContextTarget, FormatRequest, GlDriver, NativeGlContext, PixelFormat,
    PixelRect, ReadFormat, ReadSource, VisualTiming,
};
use crate::context::{ContextHandle, GlProfile};
use crate::error::Error;
use crate::functions::{Entry, GlApi, GlFunctionTable};

const PFD_SUPPORT_COMPOSITION: u32 = 0x0000_8000;

const WGL_DRAW_TO_WINDOW_ARB: c_int = 0x2001;
const WGL_ACCELERATION_ARB: c_int = 0x2003;
const WGL_SUPPORT_OPENGL_ARB: c_int = 0x2010;
const WGL_DOUBLE_BUFFER_ARB: c_int = 0x2011;
const WGL_STEREO_ARB: c_int = 0x2012;
const WGL_PIXEL_TYPE_ARB: c_int = 0x2013;
const WGL_COLOR_BITS_ARB: c_int = 0x2014;
const WGL_RED_BITS_ARB: c_int = 0x2015;
const WGL_GREEN_BITS_ARB: c_int = 0x2017;
const WGL_BLUE_BITS_ARB: c_int = 0x2019;
const WGL_ALPHA_BITS_ARB: c_int = 0x201B;
const WGL_DEPTH_BITS_ARB: c_int = 0x2022;
const WGL_STENCIL_BITS_ARB: c_int = 0x2023;
const WGL_FULL_ACCELERATION_ARB: c_int = 0x2027;
const WGL_TYPE_RGBA_ARB: c_int = 0x202B;
const WGL_SAMPLE_BUFFERS_ARB: c_int = 0x2041;
const WGL_SAMPLES_ARB: c_int = 0x2042;

/// Upper bound on the formats taken from `wglChoosePixelFormatARB`.
const MAX_ARB_FORMATS: usize = 64;

type ChoosePixelFormatArb =
    unsafe extern "system" fn(HDC, *const c_int, *const f32, u32, *mut c_int, *mut u32) -> BOOL;
type GetPixelFormatAttribivArb =
    unsafe extern "system" fn(HDC, c_int, c_int, u32, *const c_int, *mut c_int) -> BOOL;

fn to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(Some(0)).collect()
}

/// `opengl32.dll`, for the GL 1.1 functions `wglGetProcAddress` does not return.
struct OpenGl32(HMODULE);

impl OpenGl32 {
    fn load() -> Result<OpenGl32, Error> {
        let module = unsafe { LoadLibraryW(to_wide("opengl32.dll").as_ptr()) };
        if module.is_null() {
            return Err(Error::ContextCreation("opengl32.dll could not be loaded".into()));
        }
        Ok(OpenGl32(module))
    }

    fn proc_address(&self, name: &str) -> Option<*const c_void> {
        let name = CString::new(name).ok()?;
        let ptr = unsafe { wglGetProcAddress(name.as_ptr()) };
        // Some drivers return small sentinel values instead of null.
        if !matches!(ptr as isize, -1 | 0 | 1 | 2 | 3) {
            return Some(ptr as *const c_void);
        }
        let ptr = unsafe { GetProcAddress(self.0, name.as_ptr()) };
        (!ptr.is_null()).then_some(ptr as *const c_void)
    }
}

/// The device context a GL context renders through.
struct Surface {
    hwnd: HWND,
    hdc: HDC,
    shadow: bool,
}

impl Surface {
    fn of_window(hwnd: HWND) -> Result<Surface, Error> {
        let hdc = unsafe { GetDC(hwnd) };
        if hdc.is_null() {
            return Err(Error::ContextCreation("GetDC failed".into()));
        }
        Ok(Surface {
            hwnd,
            hdc,
            shadow: false,
        })
    }

    /// A hidden popup standing in for a layered window.
    fn shadow(width: i32, height: i32) -> Result<Surface, Error> {
        let class = to_wide("STATIC");
        let title = to_wide("");
        let hwnd = unsafe {
            CreateWindowExW(
                0,
                class.as_ptr(),
                title.as_ptr(),
                WS_POPUP,
                0,
                0,
                width.max(1),
                height.max(1),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if hwnd.is_null() {
            return Err(Error::ContextCreation("shadow window creation failed".into()));
        }
        let mut surface = Surface::of_window(hwnd).map_err(|e| {
            unsafe { DestroyWindow(hwnd) };
            e
        })?;
        surface.shadow = true;
        Ok(surface)
    }

    fn resize(&self, width: u32, height: u32) {
        if self.shadow {
            unsafe {
                SetWindowPos(
                    self.hwnd,
                    ptr::null_mut(),
                    0,
                    0,
                    width.max(1) as c_int,
                    height.max(1) as c_int,
                    SWP_NOMOVE | SWP_NOZORDER | SWP_NOACTIVATE,
                )
            };
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(self.hwnd, self.hdc);
            if self.shadow {
                DestroyWindow(self.hwnd);
            }
        }
    }
}

/// A WGL driver for the process.
pub(crate) struct WglDriver {
    opengl32: Rc<OpenGl32>,
    functions: OnceCell<GlFunctionTable>,
    /// The surface prepared for the next context.
    prepared: RefCell<Option<Rc<Surface>>>,
}

impl WglDriver {
    pub(crate) fn open() -> Result<WglDriver, Error> {
        Ok(WglDriver {
            opengl32: Rc::new(OpenGl32::load()?),
            functions: OnceCell::new(),
            prepared: RefCell::new(None),
        })
    }

    fn hwnd(window: &PlatformWindow) -> Result<HWND, Error> {
        match window.raw_handle() {
            RawWindow::Win32 { hwnd } => Ok(hwnd as HWND),
            other => Err(Error::ContextCreation(format!("not a Win32 window: {:?}", other))),
        }
    }

    fn surface(&self) -> Result<Rc<Surface>, Error> {
        self.prepared
            .borrow()
            .clone()
            .ok_or_else(|| Error::ContextCreation("window was not prepared".into()))
    }

    /// Resolves the extension string and the entry points through a temporary context on
    /// `hdc`, which needs a pixel format. `wglGetProcAddress` returns nothing without one.
    fn functions(&self, hdc: HDC) -> &GlFunctionTable {
        self.functions.get_or_init(|| {
            let loader = self.opengl32.clone();
            let table = unsafe {
                with_temporary_context(hdc, || {
                    let extensions = query_extensions(&self.opengl32, hdc).unwrap_or_default();
                    debug!("WGL extensions: {}", extensions);
                    let table = GlFunctionTable::new(GlApi::Wgl, extensions, move |name| {
                        loader.proc_address(name)
                    });
                    table.resolve_all();
                    table
                })
            };
            table.unwrap_or_else(|| GlFunctionTable::new(GlApi::Wgl, "", |_| None))
        })
    }

    /// Multisampled formats for `hdc` from `wglChoosePixelFormatARB`.
    ///
    /// The entry points need a context, and a context needs a pixel format, so a hidden
    /// window with a plain format hosts the query. Pixel format numbers are per device,
    /// so the result applies to `hdc`.
    fn multisample_formats(&self, hdc: HDC, request: &FormatRequest) -> Option<Vec<PixelFormat>> {
        let host = Surface::shadow(1, 1).ok()?;
        let pfd = descriptor(request);
        let id = unsafe { ChoosePixelFormat(host.hdc, &pfd) };
        if id == 0 || unsafe { SetPixelFormat(host.hdc, id, &pfd) } == FALSE {
            return None;
        }
        let (choose, get_attribs) = self.functions(host.hdc).multisample_config_entries()?;
        let (choose, get_attribs) = unsafe {
            (
                std::mem::transmute::<*const c_void, ChoosePixelFormatArb>(choose),
                std::mem::transmute::<*const c_void, GetPixelFormatAttribivArb>(get_attribs),
            )
        };
        let attribs = arb_attributes(request);
        unsafe {
            with_temporary_context(host.hdc, || {
                let mut ids = [0; MAX_ARB_FORMATS];
                let mut count = 0u32;
                let chosen = choose(
                    hdc,
                    attribs.as_ptr(),
                    ptr::null(),
                    MAX_ARB_FORMATS as u32,
                    ids.as_mut_ptr(),
                    &mut count,
                );
                if chosen == FALSE {
                    return Vec::new();
                }
                ids[..(count as usize).min(MAX_ARB_FORMATS)]
                    .iter()
                    .filter_map(|id| describe_arb(get_attribs, hdc, *id))
                    .collect()
            })
        }
    }

    fn finish(
        &self,
        surface: Rc<Surface>,
        hglrc: HGLRC,
        profile: GlProfile,
    ) -> Result<WglContext, Error> {
        let swap_interval = self
            .functions(surface.hdc)
            .swap_interval_entry()
            .map(|(_, ptr)| ptr);
        let context = WglContext {
            opengl32: self.opengl32.clone(),
            surface,
            hglrc,
            profile,
            swap_interval,
            gl: OnceCell::new(),
            version: OnceCell::new(),
        };
        context.make_current()?;
        context.gl()?;
        Ok(context)
    }
}

/// Runs `f` with a throwaway legacy context current on `hdc`, then restores the previous
/// context. `None` if `hdc` cannot host a context.
unsafe fn with_temporary_context<T>(hdc: HDC, f: impl FnOnce() -> T) -> Option<T> {
    let temporary = wglCreateContext(hdc);
    if temporary.is_null() {
        warn!("temporary context creation failed");
        return None;
    }
    let previous = (wglGetCurrentContext(), wglGetCurrentDC());
    wglMakeCurrent(hdc, temporary);
    let result = f();
    wglMakeCurrent(previous.1, previous.0);
    wglDeleteContext(temporary);
    Some(result)
}

/// Needs a current context.
unsafe fn query_extensions(opengl32: &OpenGl32, hdc: HDC) -> Option<String> {
    type GetExtensionsStringArb = unsafe extern "system" fn(HDC) -> *const c_char;

    opengl32
        .proc_address("wglGetExtensionsStringARB")
        .and_then(|ptr| {
            let get = std::mem::transmute::<*const c_void, GetExtensionsStringArb>(ptr);
            let ptr = get(hdc);
            (!ptr.is_null()).then(|| CStr::from_ptr(ptr).to_string_lossy().into_owned())
        })
}

fn descriptor(request: &FormatRequest) -> PIXELFORMATDESCRIPTOR {
    let mut pfd: PIXELFORMATDESCRIPTOR = unsafe { std::mem::zeroed() };
    pfd.nSize = std::mem::size_of::<PIXELFORMATDESCRIPTOR>() as u16;
    pfd.nVersion = 1;
    pfd.dwFlags = PFD_DRAW_TO_WINDOW | PFD_SUPPORT_OPENGL;
    if request.double_buffer {
        pfd.dwFlags |= PFD_DOUBLEBUFFER;
    }
    if request.stereo {
        pfd.dwFlags |= PFD_STEREO;
    }
    if request.layered {
        pfd.dwFlags |= PFD_SUPPORT_COMPOSITION;
    }
    pfd.iPixelType = PFD_TYPE_RGBA;
    pfd.cColorBits = request.buffer_size;
    pfd.cRedBits = request.red_size;
    pfd.cGreenBits = request.green_size;
    pfd.cBlueBits = request.blue_size;
    pfd.cAlphaBits = request.alpha_size;
    pfd.cDepthBits = request.depth_size;
    pfd.cStencilBits = request.stencil_size;
    pfd.iLayerType = PFD_MAIN_PLANE;
    pfd
}

/// The `wglChoosePixelFormatARB` attribute list for `request`. Any sample count is
/// accepted, ranking happens afterwards.
fn arb_attributes(request: &FormatRequest) -> Vec<c_int> {
    vec![
        WGL_DRAW_TO_WINDOW_ARB,
        1,
        WGL_SUPPORT_OPENGL_ARB,
        1,
        WGL_ACCELERATION_ARB,
        WGL_FULL_ACCELERATION_ARB,
        WGL_PIXEL_TYPE_ARB,
        WGL_TYPE_RGBA_ARB,
        WGL_DOUBLE_BUFFER_ARB,
        request.double_buffer as c_int,
        WGL_STEREO_ARB,
        request.stereo as c_int,
        WGL_COLOR_BITS_ARB,
        request.buffer_size.into(),
        WGL_RED_BITS_ARB,
        request.red_size.into(),
        WGL_GREEN_BITS_ARB,
        request.green_size.into(),
        WGL_BLUE_BITS_ARB,
        request.blue_size.into(),
        WGL_ALPHA_BITS_ARB,
        request.alpha_size.into(),
        WGL_DEPTH_BITS_ARB,
        request.depth_size.into(),
        WGL_STENCIL_BITS_ARB,
        request.stencil_size.into(),
        0,
    ]
}

unsafe fn describe_arb(
    get_attribs: GetPixelFormatAttribivArb,
    hdc: HDC,
    id: c_int,
) -> Option<PixelFormat> {
    let names = [
        WGL_SAMPLE_BUFFERS_ARB,
        WGL_SAMPLES_ARB,
        WGL_ALPHA_BITS_ARB,
        WGL_DEPTH_BITS_ARB,
        WGL_STENCIL_BITS_ARB,
        WGL_DOUBLE_BUFFER_ARB,
    ];
    let mut values = [0; 6];
    if get_attribs(hdc, id, 0, names.len() as u32, names.as_ptr(), values.as_mut_ptr()) == FALSE
    {
        return None;
    }
    Some(PixelFormat {
        id,
        visual: None,
        sample_buffers: values[0],
        samples: values[1],
        alpha_bits: values[2],
        depth_bits: values[3],
        stencil_bits: values[4],
        double_buffered: values[5] != 0,
    })
}

fn describe(hdc: HDC, id: c_int) -> Option<PixelFormat> {
    let mut pfd: PIXELFORMATDESCRIPTOR = unsafe { std::mem::zeroed() };
    let size = std::mem::size_of::<PIXELFORMATDESCRIPTOR>() as u32;
    if unsafe { DescribePixelFormat(hdc, id, size, &mut pfd) } == 0 {
        return None;
    }
    Some(PixelFormat {
        id,
        visual: None,
        sample_buffers: 0,
        samples: 0,
        alpha_bits: pfd.cAlphaBits.into(),
        depth_bits: pfd.cDepthBits.into(),
        stencil_bits: pfd.cStencilBits.into(),
        double_buffered: pfd.dwFlags & PFD_DOUBLEBUFFER != 0,
    })
}

impl GlDriver for WglDriver {
    fn api(&self) -> GlApi {
        GlApi::Wgl
    }

    fn display_id(&self) -> usize {
        Rc::as_ptr(&self.opengl32) as usize
    }

    fn visual_timing(&self) -> VisualTiming {
        VisualTiming::AfterWindow
    }

    fn pixel_formats(
        &self,
        window: Option<&PlatformWindow>,
        request: &FormatRequest,
    ) -> Result<Vec<PixelFormat>, Error> {
        let window = window.ok_or(Error::NoPixelFormat)?;
        let surface = Surface::of_window(WglDriver::hwnd(window)?)?;

        if request.multisampling > 0 {
            match self.multisample_formats(surface.hdc, request) {
                Some(formats) if !formats.is_empty() => return Ok(formats),
                _ => debug!("no multisampled formats, using ChoosePixelFormat"),
            }
        }

        let pfd = descriptor(request);
        let id = unsafe { ChoosePixelFormat(surface.hdc, &pfd) };
        if id == 0 {
            return Ok(Vec::new());
        }
        Ok(describe(surface.hdc, id).into_iter().collect())
    }

    fn prepare_window(&self, target: &ContextTarget) -> Result<(), Error> {
        let surface = if target.layered_readback {
            let size = target.window.client_rect_px().size();
            Surface::shadow(size.width as i32, size.height as i32)?
        } else {
            Surface::of_window(WglDriver::hwnd(target.window)?)?
        };
        let mut pfd: PIXELFORMATDESCRIPTOR = unsafe { std::mem::zeroed() };
        let size = std::mem::size_of::<PIXELFORMATDESCRIPTOR>() as u32;
        unsafe { DescribePixelFormat(surface.hdc, target.format.id, size, &mut pfd) };
        if unsafe { SetPixelFormat(surface.hdc, target.format.id, &pfd) } == FALSE {
            return Err(Error::ContextCreation("SetPixelFormat failed".into()));
        }
        *self.prepared.borrow_mut() = Some(Rc::new(surface));
        Ok(())
    }

    fn has_create_context_attribs(&self, _target: &ContextTarget) -> bool {
        match self.surface() {
            Ok(surface) => self
                .functions(surface.hdc)
                .is_available(Entry::CreateContextAttribs),
            Err(_) => false,
        }
    }

    fn create_context_attribs(
        &self,
        _target: &ContextTarget,
        request: &ContextRequest,
        share: Option<ContextHandle>,
    ) -> Result<Option<Box<dyn NativeGlContext>>, Error> {
        type CreateContextAttribs = unsafe extern "system" fn(HDC, HGLRC, *const c_int) -> HGLRC;

        let surface = self.surface()?;
        let create = match self.functions(surface.hdc).get(Entry::CreateContextAttribs) {
            Some(ptr) => unsafe {
                std::mem::transmute::<*const c_void, CreateContextAttribs>(ptr)
            },
            None => return Err(Error::MissingEntryPoint("wglCreateContextAttribsARB")),
        };
        let share = share_context(share, self.display_id());
        let attributes = request.attributes();
        let hglrc = unsafe { create(surface.hdc, share, attributes.as_ptr()) };
        if hglrc.is_null() {
            return Ok(None);
        }
        Ok(Some(Box::new(self.finish(surface, hglrc, GlProfile::Core)?)))
    }

    fn create_legacy_context(
        &self,
        _target: &ContextTarget,
        share: Option<ContextHandle>,
    ) -> Result<Box<dyn NativeGlContext>, Error> {
        let surface = self.surface()?;
        let hglrc = unsafe { wglCreateContext(surface.hdc) };
        if hglrc.is_null() {
            return Err(Error::ContextCreation("wglCreateContext failed".into()));
        }
        let share = share_context(share, self.display_id());
        if !share.is_null() && unsafe { wglShareLists(share, hglrc) } == FALSE {
            warn!("wglShareLists failed, the context gets its own namespace");
        }
        Ok(Box::new(self.finish(surface, hglrc, GlProfile::Legacy)?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn share_context(share: Option<ContextHandle>, display: usize) -> HGLRC {
    share
        .filter(|handle| handle.api == GlApi::Wgl && handle.display == display)
        .map_or(ptr::null_mut(), |handle| handle.raw as HGLRC)
}

/// A WGL context on a window or a shadow window.
pub(crate) struct WglContext {
    opengl32: Rc<OpenGl32>,
    surface: Rc<Surface>,
    hglrc: HGLRC,
    profile: GlProfile,
    swap_interval: Option<*const c_void>,
    gl: OnceCell<GlCalls>,
    version: OnceCell<(i32, i32)>,
}

impl WglContext {
    fn gl(&self) -> Result<&GlCalls, Error> {
        self.gl
            .get_or_try_init(|| GlCalls::load(|name| self.opengl32.proc_address(name)))
    }

    fn with_gl<T: Default>(&self, f: impl FnOnce(&GlCalls) -> T) -> T {
        if !self.is_current() && self.make_current().is_err() {
            return T::default();
        }
        match self.gl() {
            Ok(gl) => f(gl),
            Err(e) => {
                warn!("{}", e);
                T::default()
            }
        }
    }
}

impl NativeGlContext for WglContext {
    fn make_current(&self) -> Result<(), Error> {
        if unsafe { wglMakeCurrent(self.surface.hdc, self.hglrc) } == FALSE {
            return Err(Error::ContextCreation("wglMakeCurrent failed".into()));
        }
        Ok(())
    }

    fn is_current(&self) -> bool {
        unsafe { wglGetCurrentContext() == self.hglrc }
    }

    fn clear_current(&self) {
        if self.is_current() {
            unsafe { wglMakeCurrent(ptr::null_mut(), ptr::null_mut()) };
        }
    }

    fn swap_buffers(&self) -> Result<(), Error> {
        if unsafe { SwapBuffers(self.surface.hdc) } == FALSE {
            return Err(Error::ContextCreation("SwapBuffers failed".into()));
        }
        Ok(())
    }

    fn set_swap_interval(&self, interval: i32) -> bool {
        type SwapIntervalExt = unsafe extern "system" fn(c_int) -> BOOL;
        match self.swap_interval {
            Some(ptr) => unsafe {
                let f = std::mem::transmute::<*const c_void, SwapIntervalExt>(ptr);
                f(interval) != FALSE
            },
            None => false,
        }
    }

    fn get_proc_address(&self, name: &str) -> Option<*const c_void> {
        self.opengl32.proc_address(name)
    }

    fn version(&self) -> (i32, i32) {
        *self.version.get_or_init(|| self.with_gl(GlCalls::version))
    }

    fn profile(&self) -> GlProfile {
        self.profile
    }

    fn shared_handle(&self) -> ContextHandle {
        ContextHandle {
            api: GlApi::Wgl,
            profile: self.profile,
            display: Rc::as_ptr(&self.opengl32) as usize,
            raw: self.hglrc as usize,
        }
    }

    fn flush(&self) {
        self.with_gl(GlCalls::flush)
    }

    fn read_pixels(&self, rect: PixelRect, source: ReadSource, format: ReadFormat) -> Vec<u8> {
        self.with_gl(|gl| gl.read_pixels(rect, source, format))
    }

    fn blit_to_front(&self, rect: PixelRect) {
        self.with_gl(|gl| gl.blit_to_front(rect))
    }

    fn resize(&self, width: u32, height: u32) {
        self.surface.resize(width, height);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for WglContext {
    fn drop(&mut self) {
        self.clear_current();
        unsafe { wglDeleteContext(self.hglrc) };
    }
}
