// Copyright 2021 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! GLX, loaded from `libGL` at runtime.
//!
//! GLX 1.3 servers get FBConfig based format selection and, when
//! `GLX_ARB_create_context` is advertised, versioned contexts. GLX 1.2 only has visuals
//! and legacy contexts.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_short, c_uchar, c_uint, c_ulong, c_void};
use std::ptr;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use libloading::Library;
use once_cell::unsync::OnceCell;
use tracing::{debug, warn};

use glint_shell::{PlatformWindow, RawWindow, VisualInfo};

use super::gl::GlCalls;
use super::{
    ContextRequest, ContextTarget, FormatRequest, GlDriver, NativeGlContext, PixelFormat,
    PixelRect, ReadFormat, ReadSource, VisualTiming,
};
use crate::context::{ContextHandle, GlProfile};
use crate::error::Error;
use crate::functions::{Entry, GlApi, GlFunctionTable};

type Display = c_void;
type GlxContext = *mut c_void;
type GlxFbConfig = *mut c_void;
type GlxDrawable = c_ulong;
type Bool = c_int;

const TRUE: Bool = 1;
const FALSE: Bool = 0;

const GLX_USE_GL: c_int = 1;
const GLX_BUFFER_SIZE: c_int = 2;
const GLX_RGBA: c_int = 4;
const GLX_DOUBLEBUFFER: c_int = 5;
const GLX_STEREO: c_int = 6;
const GLX_RED_SIZE: c_int = 8;
const GLX_GREEN_SIZE: c_int = 9;
const GLX_BLUE_SIZE: c_int = 10;
const GLX_ALPHA_SIZE: c_int = 11;
const GLX_DEPTH_SIZE: c_int = 12;
const GLX_STENCIL_SIZE: c_int = 13;
const GLX_X_VISUAL_TYPE: c_int = 0x22;
const GLX_TRUE_COLOR: c_int = 0x8002;
const GLX_DRAWABLE_TYPE: c_int = 0x8010;
const GLX_RENDER_TYPE: c_int = 0x8011;
const GLX_X_RENDERABLE: c_int = 0x8012;
const GLX_RGBA_TYPE: c_int = 0x8014;
const GLX_WINDOW_BIT: c_int = 0x0001;
const GLX_RGBA_BIT: c_int = 0x0001;
const GLX_SAMPLE_BUFFERS: c_int = 100000;
const GLX_SAMPLES: c_int = 100001;

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
struct XVisualInfo {
    visual: *mut c_void,
    visualid: c_ulong,
    screen: c_int,
    depth: c_int,
    class: c_int,
    red_mask: c_ulong,
    green_mask: c_ulong,
    blue_mask: c_ulong,
    colormap_size: c_int,
    bits_per_rgb: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
struct XRenderDirectFormat {
    red: c_short,
    red_mask: c_short,
    green: c_short,
    green_mask: c_short,
    blue: c_short,
    blue_mask: c_short,
    alpha: c_short,
    alpha_mask: c_short,
}

#[repr(C)]
#[allow(dead_code)]
struct XRenderPictFormat {
    id: c_ulong,
    kind: c_int,
    depth: c_int,
    direct: XRenderDirectFormat,
    colormap: c_ulong,
}

type XErrorHandler = Option<unsafe extern "C" fn(*mut Display, *mut c_void) -> c_int>;

/// Entry points from `libGL` and `libX11`.
struct GlxLib {
    query_version: unsafe extern "C" fn(*mut Display, *mut c_int, *mut c_int) -> Bool,
    query_extensions_string: unsafe extern "C" fn(*mut Display, c_int) -> *const c_char,
    choose_visual: unsafe extern "C" fn(*mut Display, c_int, *const c_int) -> *mut XVisualInfo,
    get_config: unsafe extern "C" fn(*mut Display, *mut XVisualInfo, c_int, *mut c_int) -> c_int,
    create_context:
        unsafe extern "C" fn(*mut Display, *mut XVisualInfo, GlxContext, Bool) -> GlxContext,
    choose_fb_config:
        unsafe extern "C" fn(*mut Display, c_int, *const c_int, *mut c_int) -> *mut GlxFbConfig,
    get_fb_config_attrib:
        unsafe extern "C" fn(*mut Display, GlxFbConfig, c_int, *mut c_int) -> c_int,
    get_visual_from_fb_config:
        unsafe extern "C" fn(*mut Display, GlxFbConfig) -> *mut XVisualInfo,
    create_new_context:
        unsafe extern "C" fn(*mut Display, GlxFbConfig, c_int, GlxContext, Bool) -> GlxContext,
    make_current: unsafe extern "C" fn(*mut Display, GlxDrawable, GlxContext) -> Bool,
    get_current_context: unsafe extern "C" fn() -> GlxContext,
    swap_buffers: unsafe extern "C" fn(*mut Display, GlxDrawable),
    destroy_context: unsafe extern "C" fn(*mut Display, GlxContext),
    get_proc_address: unsafe extern "C" fn(*const c_uchar) -> *const c_void,
    x_free: unsafe extern "C" fn(*mut c_void) -> c_int,
    x_sync: unsafe extern "C" fn(*mut Display, Bool) -> c_int,
    x_set_error_handler: unsafe extern "C" fn(XErrorHandler) -> XErrorHandler,
    render_find_visual_format:
        Option<unsafe extern "C" fn(*mut Display, *const c_void) -> *const XRenderPictFormat>,
    _librender: Option<Library>,
    _libx11: Library,
    _libgl: Library,
}

impl GlxLib {
    fn load() -> Result<GlxLib, Error> {
        let libgl = load(&["libGL.so.1", "libGL.so"])?;
        let libx11 = load(&["libX11.so.6", "libX11.so"])?;
        let librender = load(&["libXrender.so.1", "libXrender.so"])
            .map_err(|e| debug!("no XRender, visual alpha from depth: {}", e))
            .ok();
        unsafe {
            Ok(GlxLib {
                query_version: symbol(&libgl, "glXQueryVersion")?,
                query_extensions_string: symbol(&libgl, "glXQueryExtensionsString")?,
                choose_visual: symbol(&libgl, "glXChooseVisual")?,
                get_config: symbol(&libgl, "glXGetConfig")?,
                create_context: symbol(&libgl, "glXCreateContext")?,
                choose_fb_config: symbol(&libgl, "glXChooseFBConfig")?,
                get_fb_config_attrib: symbol(&libgl, "glXGetFBConfigAttrib")?,
                get_visual_from_fb_config: symbol(&libgl, "glXGetVisualFromFBConfig")?,
                create_new_context: symbol(&libgl, "glXCreateNewContext")?,
                make_current: symbol(&libgl, "glXMakeCurrent")?,
                get_current_context: symbol(&libgl, "glXGetCurrentContext")?,
                swap_buffers: symbol(&libgl, "glXSwapBuffers")?,
                destroy_context: symbol(&libgl, "glXDestroyContext")?,
                get_proc_address: symbol(&libgl, "glXGetProcAddressARB")?,
                x_free: symbol(&libx11, "XFree")?,
                x_sync: symbol(&libx11, "XSync")?,
                x_set_error_handler: symbol(&libx11, "XSetErrorHandler")?,
                render_find_visual_format: librender
                    .as_ref()
                    .and_then(|lib| symbol(lib, "XRenderFindVisualFormat").ok()),
                _librender: librender,
                _libx11: libx11,
                _libgl: libgl,
            })
        }
    }

    /// The alpha mask of `info`'s visual. Without XRender only 32 bit visuals count.
    fn visual_alpha_mask(&self, display: *mut Display, info: &XVisualInfo) -> u16 {
        match self.render_find_visual_format {
            Some(find) => {
                let format = unsafe { find(display, info.visual) };
                if format.is_null() {
                    0
                } else {
                    unsafe { (*format).direct.alpha_mask }.max(0) as u16
                }
            }
            None if info.depth == 32 => 0xff,
            None => 0,
        }
    }

    fn proc_address(&self, name: &str) -> Option<*const c_void> {
        let name = CString::new(name).ok()?;
        let ptr = unsafe { (self.get_proc_address)(name.as_ptr() as *const c_uchar) };
        (!ptr.is_null()).then_some(ptr)
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
    Err(Error::ContextCreation(last_error))
}

unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, Error> {
    let bytes = format!("{name}\0");
    library
        .get::<T>(bytes.as_bytes())
        .map(|symbol| *symbol)
        .map_err(|_| Error::MissingEntryPoint(name))
}

static X_ERROR_RAISED: AtomicBool = AtomicBool::new(false);

unsafe extern "C" fn record_x_error(_display: *mut Display, _event: *mut c_void) -> c_int {
    X_ERROR_RAISED.store(true, Ordering::SeqCst);
    0
}

/// Runs `f` with X errors recorded instead of aborting the process.
///
/// Returns the result of `f` and whether an X error was raised during it.
fn trap_x_errors<T>(lib: &GlxLib, display: *mut Display, f: impl FnOnce() -> T) -> (T, bool) {
    unsafe {
        X_ERROR_RAISED.store(false, Ordering::SeqCst);
        let previous = (lib.x_set_error_handler)(Some(record_x_error));
        let result = f();
        (lib.x_sync)(display, FALSE);
        (lib.x_set_error_handler)(previous);
        (result, X_ERROR_RAISED.swap(false, Ordering::SeqCst))
    }
}

/// A GLX connection on one Xlib display.
pub(crate) struct GlxDriver {
    lib: Rc<GlxLib>,
    display: *mut Display,
    screen: c_int,
    version: (i32, i32),
    functions: GlFunctionTable,
    /// FBConfigs of the last query, indexed by [`PixelFormat::id`].
    fb_configs: RefCell<Vec<GlxFbConfig>>,
    /// Visuals of the last GLX 1.2 query.
    visuals: RefCell<Vec<XVisualInfo>>,
}

impl GlxDriver {
    pub(crate) fn open(display: *mut c_void, screen: i32) -> Result<GlxDriver, Error> {
        let lib = Rc::new(GlxLib::load()?);
        let (mut major, mut minor) = (0, 0);
        if unsafe { (lib.query_version)(display, &mut major, &mut minor) } == FALSE {
            return Err(Error::ContextCreation("GLX is not supported".into()));
        }
        let extensions = unsafe {
            let ptr = (lib.query_extensions_string)(display, screen);
            if ptr.is_null() {
                String::new()
            } else {
                std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
            }
        };
        debug!("GLX {}.{}", major, minor);
        let loader = lib.clone();
        let functions =
            GlFunctionTable::new(GlApi::Glx, extensions, move |name| loader.proc_address(name));
        Ok(GlxDriver {
            lib,
            display,
            screen,
            version: (major, minor),
            functions,
            fb_configs: RefCell::new(Vec::new()),
            visuals: RefCell::new(Vec::new()),
        })
    }

    fn has_fb_configs(&self) -> bool {
        self.version >= (1, 3)
    }

    fn fb_config_formats(&self, request: &FormatRequest) -> Result<Vec<PixelFormat>, Error> {
        let mut attribs = vec![
            GLX_X_RENDERABLE,
            TRUE,
            GLX_DRAWABLE_TYPE,
            GLX_WINDOW_BIT,
            GLX_RENDER_TYPE,
            GLX_RGBA_BIT,
            GLX_X_VISUAL_TYPE,
            GLX_TRUE_COLOR,
            GLX_DOUBLEBUFFER,
            request.double_buffer as c_int,
            GLX_STEREO,
            request.stereo as c_int,
            GLX_RED_SIZE,
            request.red_size.into(),
            GLX_GREEN_SIZE,
            request.green_size.into(),
            GLX_BLUE_SIZE,
            request.blue_size.into(),
            GLX_ALPHA_SIZE,
            request.alpha_size.into(),
            GLX_DEPTH_SIZE,
            request.depth_size.into(),
            GLX_STENCIL_SIZE,
            request.stencil_size.into(),
        ];
        if request.multisampling > 0 {
            attribs.extend([GLX_SAMPLE_BUFFERS, 1, GLX_SAMPLES, request.multisampling.into()]);
        }
        attribs.push(0);

        let mut count = 0;
        let configs = unsafe {
            (self.lib.choose_fb_config)(self.display, self.screen, attribs.as_ptr(), &mut count)
        };
        if configs.is_null() || count <= 0 {
            return Ok(Vec::new());
        }
        let configs_vec =
            unsafe { std::slice::from_raw_parts(configs, count as usize) }.to_vec();
        unsafe { (self.lib.x_free)(configs as *mut c_void) };

        let mut formats = Vec::with_capacity(configs_vec.len());
        for (index, config) in configs_vec.iter().enumerate() {
            let attrib = |name| {
                let mut value = 0;
                unsafe {
                    (self.lib.get_fb_config_attrib)(self.display, *config, name, &mut value)
                };
                value
            };
            let visual = unsafe { (self.lib.get_visual_from_fb_config)(self.display, *config) };
            if visual.is_null() {
                continue;
            }
            let info = unsafe { *visual };
            unsafe { (self.lib.x_free)(visual as *mut c_void) };
            formats.push(PixelFormat {
                id: index as i32,
                visual: Some(VisualInfo {
                    visual_id: info.visualid as u32,
                    depth: info.depth as u8,
                    alpha_mask: self.lib.visual_alpha_mask(self.display, &info),
                }),
                sample_buffers: attrib(GLX_SAMPLE_BUFFERS),
                samples: attrib(GLX_SAMPLES),
                alpha_bits: attrib(GLX_ALPHA_SIZE),
                depth_bits: attrib(GLX_DEPTH_SIZE),
                stencil_bits: attrib(GLX_STENCIL_SIZE),
                double_buffered: attrib(GLX_DOUBLEBUFFER) != 0,
            });
        }
        *self.fb_configs.borrow_mut() = configs_vec;
        Ok(formats)
    }

    fn visual_formats(&self, request: &FormatRequest) -> Result<Vec<PixelFormat>, Error> {
        let mut attribs = vec![
            GLX_RGBA,
            GLX_BUFFER_SIZE,
            request.buffer_size.into(),
            GLX_RED_SIZE,
            request.red_size.into(),
            GLX_GREEN_SIZE,
            request.green_size.into(),
            GLX_BLUE_SIZE,
            request.blue_size.into(),
            GLX_ALPHA_SIZE,
            request.alpha_size.into(),
            GLX_DEPTH_SIZE,
            request.depth_size.into(),
            GLX_STENCIL_SIZE,
            request.stencil_size.into(),
        ];
        if request.double_buffer {
            attribs.push(GLX_DOUBLEBUFFER);
        }
        if request.stereo {
            attribs.push(GLX_STEREO);
        }
        attribs.push(0);

        let visual =
            unsafe { (self.lib.choose_visual)(self.display, self.screen, attribs.as_ptr()) };
        if visual.is_null() {
            return Ok(Vec::new());
        }
        let mut info = unsafe { *visual };
        unsafe { (self.lib.x_free)(visual as *mut c_void) };
        let mut config = |name| {
            let mut value = 0;
            unsafe { (self.lib.get_config)(self.display, &mut info, name, &mut value) };
            value
        };
        if config(GLX_USE_GL) == 0 {
            return Ok(Vec::new());
        }
        let mut format = PixelFormat {
            id: 0,
            visual: None,
            sample_buffers: config(GLX_SAMPLE_BUFFERS),
            samples: config(GLX_SAMPLES),
            alpha_bits: config(GLX_ALPHA_SIZE),
            depth_bits: config(GLX_DEPTH_SIZE),
            stencil_bits: config(GLX_STENCIL_SIZE),
            double_buffered: config(GLX_DOUBLEBUFFER) != 0,
        };
        format.visual = Some(VisualInfo {
            visual_id: info.visualid as u32,
            depth: info.depth as u8,
            alpha_mask: self.lib.visual_alpha_mask(self.display, &info),
        });
        *self.visuals.borrow_mut() = vec![info];
        Ok(vec![format])
    }

    fn fb_config(&self, format: &PixelFormat) -> Result<GlxFbConfig, Error> {
        self.fb_configs
            .borrow()
            .get(format.id as usize)
            .copied()
            .ok_or(Error::NoPixelFormat)
    }

    fn drawable(window: &PlatformWindow) -> Result<GlxDrawable, Error> {
        match window.raw_handle() {
            RawWindow::Xlib { window } => Ok(window as GlxDrawable),
            other => Err(Error::ContextCreation(format!("not an X11 window: {:?}", other))),
        }
    }

    fn share_context(&self, share: Option<ContextHandle>) -> GlxContext {
        share
            .filter(|handle| handle.api == GlApi::Glx && handle.display == self.display as usize)
            .map_or(ptr::null_mut(), |handle| handle.raw as GlxContext)
    }

    fn finish(
        &self,
        target: &ContextTarget,
        context: GlxContext,
        profile: GlProfile,
    ) -> Result<GlxGlContext, Error> {
        let context = GlxGlContext {
            lib: self.lib.clone(),
            display: self.display,
            drawable: GlxDriver::drawable(target.window)?,
            context,
            profile,
            swap_interval: self.functions.swap_interval_entry(),
            gl: OnceCell::new(),
            version: OnceCell::new(),
        };
        context.make_current()?;
        context.gl()?;
        Ok(context)
    }
}

impl GlDriver for GlxDriver {
    fn api(&self) -> GlApi {
        GlApi::Glx
    }

    fn display_id(&self) -> usize {
        self.display as usize
    }

    fn visual_timing(&self) -> VisualTiming {
        VisualTiming::BeforeWindow
    }

    fn pixel_formats(
        &self,
        _window: Option<&PlatformWindow>,
        request: &FormatRequest,
    ) -> Result<Vec<PixelFormat>, Error> {
        if self.has_fb_configs() {
            self.fb_config_formats(request)
        } else {
            self.visual_formats(request)
        }
    }

    fn prepare_window(&self, _target: &ContextTarget) -> Result<(), Error> {
        Ok(())
    }

    fn has_create_context_attribs(&self, _target: &ContextTarget) -> bool {
        self.has_fb_configs() && self.functions.is_available(Entry::CreateContextAttribs)
    }

    fn create_context_attribs(
        &self,
        target: &ContextTarget,
        request: &ContextRequest,
        share: Option<ContextHandle>,
    ) -> Result<Option<Box<dyn NativeGlContext>>, Error> {
        type CreateContextAttribs = unsafe extern "C" fn(
            *mut Display,
            GlxFbConfig,
            GlxContext,
            Bool,
            *const c_int,
        ) -> GlxContext;

        let create = match self.functions.get(Entry::CreateContextAttribs) {
            Some(ptr) => unsafe {
                std::mem::transmute::<*const c_void, CreateContextAttribs>(ptr)
            },
            None => return Err(Error::MissingEntryPoint("glXCreateContextAttribsARB")),
        };
        let config = self.fb_config(target.format)?;
        let share = self.share_context(share);
        let attributes = request.attributes();
        let (context, failed) = trap_x_errors(&self.lib, self.display, || unsafe {
            create(self.display, config, share, TRUE, attributes.as_ptr())
        });
        if failed || context.is_null() {
            if !context.is_null() {
                unsafe { (self.lib.destroy_context)(self.display, context) };
            }
            return Ok(None);
        }
        Ok(Some(Box::new(self.finish(target, context, GlProfile::Core)?)))
    }

    fn create_legacy_context(
        &self,
        target: &ContextTarget,
        share: Option<ContextHandle>,
    ) -> Result<Box<dyn NativeGlContext>, Error> {
        let share = self.share_context(share);
        let (context, failed) = if self.has_fb_configs() {
            let config = self.fb_config(target.format)?;
            trap_x_errors(&self.lib, self.display, || unsafe {
                (self.lib.create_new_context)(self.display, config, GLX_RGBA_TYPE, share, TRUE)
            })
        } else {
            let mut visual = self
                .visuals
                .borrow()
                .first()
                .copied()
                .ok_or(Error::NoPixelFormat)?;
            trap_x_errors(&self.lib, self.display, || unsafe {
                (self.lib.create_context)(self.display, &mut visual, share, TRUE)
            })
        };
        if failed || context.is_null() {
            return Err(Error::ContextCreation("glXCreateContext failed".into()));
        }
        Ok(Box::new(self.finish(target, context, GlProfile::Legacy)?))
    }

    fn legacy_requires_lower_versions(&self) -> bool {
        !self.has_fb_configs()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A GLX context rendering to one X window.
pub(crate) struct GlxGlContext {
    lib: Rc<GlxLib>,
    display: *mut Display,
    drawable: GlxDrawable,
    context: GlxContext,
    profile: GlProfile,
    swap_interval: Option<(Entry, *const c_void)>,
    gl: OnceCell<GlCalls>,
    version: OnceCell<(i32, i32)>,
}

impl GlxGlContext {
    fn gl(&self) -> Result<&GlCalls, Error> {
        self.gl
            .get_or_try_init(|| GlCalls::load(|name| self.lib.proc_address(name)))
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

impl NativeGlContext for GlxGlContext {
    fn make_current(&self) -> Result<(), Error> {
        if unsafe { (self.lib.make_current)(self.display, self.drawable, self.context) } == FALSE {
            return Err(Error::ContextCreation("glXMakeCurrent failed".into()));
        }
        Ok(())
    }

    fn is_current(&self) -> bool {
        unsafe { (self.lib.get_current_context)() == self.context }
    }

    fn clear_current(&self) {
        if self.is_current() {
            unsafe { (self.lib.make_current)(self.display, 0, ptr::null_mut()) };
        }
    }

    fn swap_buffers(&self) -> Result<(), Error> {
        unsafe { (self.lib.swap_buffers)(self.display, self.drawable) };
        Ok(())
    }

    fn set_swap_interval(&self, interval: i32) -> bool {
        type SwapIntervalExt = unsafe extern "C" fn(*mut Display, GlxDrawable, c_int);
        type SwapIntervalSgi = unsafe extern "C" fn(c_int) -> c_int;
        type SwapIntervalMesa = unsafe extern "C" fn(c_uint) -> c_int;

        let (entry, ptr) = match self.swap_interval {
            Some(found) => found,
            None => return false,
        };
        unsafe {
            match entry {
                Entry::SwapIntervalExt => {
                    let f = std::mem::transmute::<*const c_void, SwapIntervalExt>(ptr);
                    f(self.display, self.drawable, interval);
                }
                Entry::SwapIntervalSgi => {
                    let f = std::mem::transmute::<*const c_void, SwapIntervalSgi>(ptr);
                    f(interval);
                }
                Entry::SwapIntervalMesa => {
                    let f = std::mem::transmute::<*const c_void, SwapIntervalMesa>(ptr);
                    f(interval.max(0) as c_uint);
                }
                _ => return false,
            }
        }
        true
    }

    fn get_proc_address(&self, name: &str) -> Option<*const c_void> {
        self.lib.proc_address(name)
    }

    fn version(&self) -> (i32, i32) {
        *self.version.get_or_init(|| self.with_gl(GlCalls::version))
    }

    fn profile(&self) -> GlProfile {
        self.profile
    }

    fn shared_handle(&self) -> ContextHandle {
        ContextHandle {
            api: GlApi::Glx,
            profile: self.profile,
            display: self.display as usize,
            raw: self.context as usize,
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

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlxGlContext {
    fn drop(&mut self) {
        self.clear_current();
        unsafe { (self.lib.destroy_context)(self.display, self.context) };
    }
}
