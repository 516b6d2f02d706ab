// Copyright 2019 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Window-system GL drivers.
//!
//! A [`GlDriver`] knows how to pick pixel formats and create contexts on one display
//! connection; the contexts it creates implement [`NativeGlContext`]. Which driver is used
//! follows from the display backend, see [`open`].

use std::any::Any;
use std::os::raw::c_void;
use std::rc::Rc;

use glint_shell::{
    GlExtension, NativeDisplay, PlatformWindow, RawDisplay, VisualInfo, WindowDescription,
};

use crate::context::{ContextHandle, GlProfile};
use crate::error::Error;
use crate::functions::GlApi;

pub(crate) mod gl;
pub mod headless;

#[cfg(all(feature = "x11", any(target_os = "linux", target_os = "freebsd")))]
pub(crate) mod glx;

#[cfg(target_os = "windows")]
pub(crate) mod wgl;

pub use gl::parse_gl_version;

/// When the pixel format has to be known relative to window creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisualTiming {
    /// The format decides the window's visual, as with GLX.
    BeforeWindow,
    /// The format is applied to an existing window, as with WGL.
    AfterWindow,
}

/// A framebuffer configuration offered by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelFormat {
    /// Driver specific identifier (FBConfig index, pixel format number).
    pub id: i32,
    /// The X visual a window needs for this format, if any.
    pub visual: Option<VisualInfo>,
    pub sample_buffers: i32,
    pub samples: i32,
    pub alpha_bits: i32,
    pub depth_bits: i32,
    pub stencil_bits: i32,
    pub double_buffered: bool,
}

impl PixelFormat {
    /// Whether the format has a full 8 bit alpha channel.
    ///
    /// A format bound to an X visual also needs the visual itself to carry the alpha.
    pub fn has_full_alpha(&self) -> bool {
        self.alpha_bits >= 8
            && self
                .visual
                .map_or(true, |visual| visual.alpha_mask >= 0xff)
    }
}

/// The framebuffer attributes a window asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatRequest {
    pub double_buffer: bool,
    pub stereo: bool,
    pub buffer_size: u8,
    pub red_size: u8,
    pub green_size: u8,
    pub blue_size: u8,
    pub alpha_size: u8,
    pub depth_size: u8,
    pub stencil_size: u8,
    pub multisampling: u8,
    pub layered: bool,
}

impl FormatRequest {
    pub fn from_description(desc: &WindowDescription) -> FormatRequest {
        let layered = desc.is_layered();
        let mut request = FormatRequest {
            double_buffer: desc.flipping_buffers() > 1,
            stereo: false,
            buffer_size: 24,
            red_size: 8,
            green_size: 8,
            blue_size: 8,
            alpha_size: if layered { 8 } else { 0 },
            depth_size: desc.depth_size(),
            stencil_size: desc.stencil_size(),
            multisampling: desc.multisampling(),
            layered,
        };
        if let GlExtension::Legacy(legacy) = desc.gl() {
            request.double_buffer = legacy.double_buffer;
            request.stereo = legacy.stereo;
            request.buffer_size = legacy.buffer_size;
            request.red_size = legacy.red_size;
            request.green_size = legacy.green_size;
            request.blue_size = legacy.blue_size;
        }
        request
    }
}

/// Attributes for the attribute-based context creation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextRequest {
    pub major: i32,
    pub minor: i32,
    pub debug: bool,
    pub forward_compatible: bool,
    pub core_profile: bool,
    pub compatibility_profile: bool,
    pub layer_plane: i32,
}

impl ContextRequest {
    /// `(attribute, value)` pairs as understood by both `*CreateContextAttribsARB`.
    pub fn attributes(&self) -> Vec<i32> {
        const MAJOR_VERSION: i32 = 0x2091;
        const MINOR_VERSION: i32 = 0x2092;
        const LAYER_PLANE: i32 = 0x2093;
        const FLAGS: i32 = 0x2094;
        const PROFILE_MASK: i32 = 0x9126;
        const DEBUG_BIT: i32 = 0x0001;
        const FORWARD_COMPATIBLE_BIT: i32 = 0x0002;
        const CORE_PROFILE_BIT: i32 = 0x0001;
        const COMPATIBILITY_PROFILE_BIT: i32 = 0x0002;

        let mut flags = 0;
        if self.debug {
            flags |= DEBUG_BIT;
        }
        if self.forward_compatible {
            flags |= FORWARD_COMPATIBLE_BIT;
        }
        let mut profile = 0;
        if self.core_profile {
            profile |= CORE_PROFILE_BIT;
        }
        if self.compatibility_profile {
            profile |= COMPATIBILITY_PROFILE_BIT;
        }

        let mut attributes = vec![MAJOR_VERSION, self.major, MINOR_VERSION, self.minor];
        if self.layer_plane != 0 {
            attributes.extend([LAYER_PLANE, self.layer_plane]);
        }
        if flags != 0 {
            attributes.extend([FLAGS, flags]);
        }
        if profile != 0 {
            attributes.extend([PROFILE_MASK, profile]);
        }
        attributes.push(0);
        attributes
    }
}

/// What a context is being created for.
pub struct ContextTarget<'a> {
    pub window: &'a PlatformWindow,
    pub format: &'a PixelFormat,
    /// Layered window without composition: frames are read back instead of presented.
    pub layered_readback: bool,
}

/// A pixel rectangle in GL window coordinates, origin at the bottom left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadSource {
    Front,
    Back,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadFormat {
    /// Four bytes per pixel.
    Bgra,
    /// One byte per pixel.
    Alpha,
}

/// A native GL context bound to one window.
pub trait NativeGlContext {
    fn make_current(&self) -> Result<(), Error>;

    fn is_current(&self) -> bool;

    /// Releases the context if it is current on this thread.
    fn clear_current(&self);

    fn swap_buffers(&self) -> Result<(), Error>;

    /// Applies a swap interval. Returns `false` if no swap control is available.
    fn set_swap_interval(&self, interval: i32) -> bool;

    fn get_proc_address(&self, name: &str) -> Option<*const c_void>;

    fn version(&self) -> (i32, i32);

    fn profile(&self) -> GlProfile;

    fn shared_handle(&self) -> ContextHandle;

    fn flush(&self);

    /// Reads pixels of the default framebuffer, bottom row first.
    fn read_pixels(&self, rect: PixelRect, source: ReadSource, format: ReadFormat) -> Vec<u8>;

    /// Copies `rect` of the back buffer to the front buffer.
    fn blit_to_front(&self, rect: PixelRect);

    /// The drawable changed size.
    fn resize(&self, _width: u32, _height: u32) {}

    fn as_any(&self) -> &dyn Any;
}

/// Pixel format selection and context creation on one display connection.
pub trait GlDriver {
    fn api(&self) -> GlApi;

    /// Identifies the display connection; contexts only share within one display.
    fn display_id(&self) -> usize;

    fn visual_timing(&self) -> VisualTiming;

    /// Formats matching `request`, in the driver's order of preference. `window` is set
    /// for drivers that choose after window creation.
    fn pixel_formats(
        &self,
        window: Option<&PlatformWindow>,
        request: &FormatRequest,
    ) -> Result<Vec<PixelFormat>, Error>;

    /// Gets the window ready for contexts of `target.format`.
    fn prepare_window(&self, target: &ContextTarget) -> Result<(), Error>;

    /// Whether the attribute-based creation path exists.
    fn has_create_context_attribs(&self, target: &ContextTarget) -> bool;

    /// Creates a context through the attribute-based path.
    ///
    /// `Ok(None)` means the driver refused this particular version and another may be tried.
    fn create_context_attribs(
        &self,
        target: &ContextTarget,
        request: &ContextRequest,
        share: Option<ContextHandle>,
    ) -> Result<Option<Box<dyn NativeGlContext>>, Error>;

    fn create_legacy_context(
        &self,
        target: &ContextTarget,
        share: Option<ContextHandle>,
    ) -> Result<Box<dyn NativeGlContext>, Error>;

    /// Whether the legacy path can only honour requests that accept lower versions.
    fn legacy_requires_lower_versions(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

/// Opens the driver that matches `display`.
pub fn open(display: &dyn NativeDisplay) -> Result<Rc<dyn GlDriver>, Error> {
    match display.raw_display() {
        RawDisplay::Headless => Ok(headless::HeadlessGl::shared()),
        #[cfg(all(feature = "x11", any(target_os = "linux", target_os = "freebsd")))]
        RawDisplay::Xlib { display, screen } => {
            Ok(Rc::new(glx::GlxDriver::open(display, screen)?))
        }
        #[cfg(target_os = "windows")]
        RawDisplay::Win32 => Ok(Rc::new(wgl::WglDriver::open()?)),
        #[allow(unreachable_patterns)]
        other => Err(Error::ContextCreation(format!(
            "no GL driver for display {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_shell::GlLegacyOptions;

    #[test]
    fn context_attributes() {
        let request = ContextRequest {
            major: 4,
            minor: 3,
            debug: true,
            forward_compatible: false,
            core_profile: true,
            compatibility_profile: false,
            layer_plane: 0,
        };
        assert_eq!(
            request.attributes(),
            vec![0x2091, 4, 0x2092, 3, 0x2094, 1, 0x9126, 1, 0]
        );
    }

    #[test]
    fn legacy_description_sets_color_sizes() {
        let mut desc = WindowDescription::new();
        desc.set_gl(GlExtension::Legacy(GlLegacyOptions {
            double_buffer: false,
            ..GlLegacyOptions::default()
        }));
        desc.set_layered(true);
        let request = FormatRequest::from_description(&desc);
        assert!(!request.double_buffer);
        assert_eq!(request.red_size, 4);
        assert_eq!(request.alpha_size, 8);
        assert!(request.layered);
    }
}
