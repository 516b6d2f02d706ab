// Copyright 2021 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! The handful of core GL calls the binder issues itself.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_uint, c_void};

use tracing::debug;

use super::{PixelRect, ReadFormat, ReadSource};
use crate::error::Error;

#[allow(non_camel_case_types)]
type GLenum = c_uint;

const GL_VERSION: GLenum = 0x1F02;
const GL_FRONT: GLenum = 0x0404;
const GL_BACK: GLenum = 0x0405;
const GL_ALPHA: GLenum = 0x1906;
const GL_BGRA: GLenum = 0x80E1;
const GL_UNSIGNED_BYTE: GLenum = 0x1401;
const GL_PACK_ALIGNMENT: GLenum = 0x0D05;
const GL_READ_FRAMEBUFFER: GLenum = 0x8CA8;
const GL_DRAW_FRAMEBUFFER: GLenum = 0x8CA9;
const GL_READ_FRAMEBUFFER_BINDING: GLenum = 0x8CAA;
const GL_DRAW_FRAMEBUFFER_BINDING: GLenum = 0x8CA6;
const GL_COLOR_BUFFER_BIT: c_uint = 0x4000;
const GL_NEAREST: GLenum = 0x2600;

type GetString = unsafe extern "system" fn(GLenum) -> *const u8;
type GetIntegerv = unsafe extern "system" fn(GLenum, *mut c_int);
type Flush = unsafe extern "system" fn();
type ReadBuffer = unsafe extern "system" fn(GLenum);
type DrawBuffer = unsafe extern "system" fn(GLenum);
type PixelStorei = unsafe extern "system" fn(GLenum, c_int);
type ReadPixels =
    unsafe extern "system" fn(c_int, c_int, c_int, c_int, GLenum, GLenum, *mut c_void);
type BindFramebuffer = unsafe extern "system" fn(GLenum, c_uint);
type BlitFramebuffer = unsafe extern "system" fn(
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_uint,
    GLenum,
);

/// Core GL functions, resolved once a context is current.
pub(crate) struct GlCalls {
    get_string: GetString,
    get_integerv: GetIntegerv,
    flush: Flush,
    read_buffer: ReadBuffer,
    draw_buffer: DrawBuffer,
    pixel_storei: PixelStorei,
    read_pixels: ReadPixels,
    bind_framebuffer: Option<BindFramebuffer>,
    blit_framebuffer: Option<BlitFramebuffer>,
}

macro_rules! required {
    ($loader:expr, $name:literal) => {
        match $loader($name) {
            Some(ptr) => unsafe { std::mem::transmute::<*const c_void, _>(ptr) },
            None => return Err(Error::MissingEntryPoint($name)),
        }
    };
}

macro_rules! optional {
    ($loader:expr, $name:literal) => {
        $loader($name).map(|ptr| unsafe { std::mem::transmute::<*const c_void, _>(ptr) })
    };
}

impl GlCalls {
    pub(crate) fn load(loader: impl Fn(&str) -> Option<*const c_void>) -> Result<GlCalls, Error> {
        let loader = |name: &str| loader(name).filter(|ptr| !ptr.is_null());
        Ok(GlCalls {
            get_string: required!(loader, "glGetString"),
            get_integerv: required!(loader, "glGetIntegerv"),
            flush: required!(loader, "glFlush"),
            read_buffer: required!(loader, "glReadBuffer"),
            draw_buffer: required!(loader, "glDrawBuffer"),
            pixel_storei: required!(loader, "glPixelStorei"),
            read_pixels: required!(loader, "glReadPixels"),
            bind_framebuffer: optional!(loader, "glBindFramebuffer"),
            blit_framebuffer: optional!(loader, "glBlitFramebuffer"),
        })
    }

    /// The version of the current context, `(0, 0)` if the driver did not say.
    pub(crate) fn version(&self) -> (i32, i32) {
        let ptr = unsafe { (self.get_string)(GL_VERSION) };
        if ptr.is_null() {
            return (0, 0);
        }
        let version = unsafe { CStr::from_ptr(ptr as *const c_char) };
        parse_gl_version(&version.to_string_lossy()).unwrap_or((0, 0))
    }

    pub(crate) fn flush(&self) {
        unsafe { (self.flush)() }
    }

    /// Reads `rect` of the default framebuffer, bottom row first.
    pub(crate) fn read_pixels(
        &self,
        rect: PixelRect,
        source: ReadSource,
        format: ReadFormat,
    ) -> Vec<u8> {
        let (gl_format, bytes) = match format {
            ReadFormat::Bgra => (GL_BGRA, 4),
            ReadFormat::Alpha => (GL_ALPHA, 1),
        };
        let mut pixels = vec![0u8; rect.width as usize * rect.height as usize * bytes];
        if pixels.is_empty() {
            return pixels;
        }
        unsafe {
            let previous = self.bind_default_framebuffer();
            (self.read_buffer)(match source {
                ReadSource::Front => GL_FRONT,
                ReadSource::Back => GL_BACK,
            });
            (self.pixel_storei)(GL_PACK_ALIGNMENT, 1);
            (self.read_pixels)(
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                gl_format,
                GL_UNSIGNED_BYTE,
                pixels.as_mut_ptr() as *mut c_void,
            );
            self.restore_framebuffers(previous);
        }
        pixels
    }

    /// Copies `rect` of the back buffer to the front buffer.
    pub(crate) fn blit_to_front(&self, rect: PixelRect) {
        let blit = match self.blit_framebuffer {
            Some(blit) => blit,
            None => {
                debug!("glBlitFramebuffer unavailable, flushing instead");
                self.flush();
                return;
            }
        };
        unsafe {
            let previous = self.bind_default_framebuffer();
            (self.read_buffer)(GL_BACK);
            (self.draw_buffer)(GL_FRONT);
            let (x0, y0) = (rect.x, rect.y);
            let (x1, y1) = (rect.x + rect.width, rect.y + rect.height);
            blit(x0, y0, x1, y1, x0, y0, x1, y1, GL_COLOR_BUFFER_BIT, GL_NEAREST);
            (self.draw_buffer)(GL_BACK);
            self.restore_framebuffers(previous);
            (self.flush)();
        }
    }

    unsafe fn bind_default_framebuffer(&self) -> Option<(c_int, c_int)> {
        let bind = self.bind_framebuffer?;
        let mut read = 0;
        let mut draw = 0;
        (self.get_integerv)(GL_READ_FRAMEBUFFER_BINDING, &mut read);
        (self.get_integerv)(GL_DRAW_FRAMEBUFFER_BINDING, &mut draw);
        bind(GL_READ_FRAMEBUFFER, 0);
        bind(GL_DRAW_FRAMEBUFFER, 0);
        Some((read, draw))
    }

    unsafe fn restore_framebuffers(&self, previous: Option<(c_int, c_int)>) {
        if let (Some(bind), Some((read, draw))) = (self.bind_framebuffer, previous) {
            bind(GL_READ_FRAMEBUFFER, read as c_uint);
            bind(GL_DRAW_FRAMEBUFFER, draw as c_uint);
        }
    }
}

/// Parses the leading `major.minor` of a `GL_VERSION` string.
///
/// Desktop strings look like `4.6.0 NVIDIA 535.54`; ES strings carry a prefix such as
/// `OpenGL ES 3.2 Mesa 23.1`.
pub fn parse_gl_version(version: &str) -> Option<(i32, i32)> {
    let start = version.find(|c: char| c.is_ascii_digit())?;
    let mut numbers = version[start..]
        .split(|c: char| !c.is_ascii_digit())
        .map(str::parse::<i32>);
    let major = numbers.next()?.ok()?;
    let minor = numbers.next()?.ok()?;
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_strings() {
        assert_eq!(parse_gl_version("4.6.0 NVIDIA 535.54.03"), Some((4, 6)));
        assert_eq!(parse_gl_version("3.3 (Core Profile) Mesa 23.1.4"), Some((3, 3)));
        assert_eq!(parse_gl_version("OpenGL ES 3.2 Mesa 23.1"), Some((3, 2)));
        assert_eq!(parse_gl_version("2.1"), Some((2, 1)));
        assert_eq!(parse_gl_version("garbage"), None);
        assert_eq!(parse_gl_version("4"), None);
    }

    #[test]
    fn missing_core_function_is_reported() {
        let result = GlCalls::load(|name| (name != "glReadPixels").then_some(1 as *const c_void));
        assert!(matches!(result, Err(Error::MissingEntryPoint("glReadPixels"))));
    }
}
