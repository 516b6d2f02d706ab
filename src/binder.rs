// Copyright 2019 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Binding a GL context to a platform window.

use std::cell::Cell;
use std::os::raw::c_void;
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex};

use glint_shell::kurbo::{Point, Rect};
use glint_shell::{
    AlphaMask, GlCoreOptions, GlExtension, GlLegacyOptions, LayeredImage, MessageQueue,
    PlatformWindow, WindowDescription, WindowSite,
};
use tracing::{debug, info, warn};

use crate::config;
use crate::context::{
    ContextHandle, DisplayContext, GlProfile, GraphicContextProvider, ProviderGuard,
};
use crate::driver::{
    self, ContextRequest, ContextTarget, FormatRequest, GlDriver, NativeGlContext, PixelFormat,
    PixelRect, ReadFormat, ReadSource, VisualTiming,
};
use crate::error::Error;

/// Versions tried by the attribute-based path, newest first.
pub const KNOWN_VERSIONS: [(i32, i32); 10] = [
    (4, 5),
    (4, 4),
    (4, 3),
    (4, 2),
    (4, 1),
    (4, 0),
    (3, 3),
    (3, 2),
    (3, 1),
    (3, 0),
];

/// Where a binder is in its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinderState {
    NoContext,
    VisualSelected,
    Bound,
    Destroyed,
}

/// A context's entry in the shared namespace registry.
///
/// The registry is shared between threads, so it only holds the plain handle.
struct SharedSlot(Mutex<Option<ContextHandle>>);

impl GraphicContextProvider for SharedSlot {
    fn shared_context_handle(&self) -> Option<ContextHandle> {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SharedSlot {
    fn clear(&self) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// A platform window with a GL context bound to it.
///
/// The binder owns both: the context is released before the window goes away.
pub struct GlContextBinder {
    context: Rc<dyn NativeGlContext>,
    window: Rc<PlatformWindow>,
    driver: Rc<dyn GlDriver>,
    format: PixelFormat,
    swap_interval: Cell<i32>,
    use_gl3: bool,
    double_buffered: bool,
    layered_readback: bool,
    slot: Arc<SharedSlot>,
    provider: Arc<dyn GraphicContextProvider>,
    ctx: DisplayContext,
    state: Cell<BinderState>,
}

impl GlContextBinder {
    /// Creates a window for `description` with a context from the display's own driver.
    pub fn create(
        site: Rc<dyn WindowSite>,
        description: &WindowDescription,
        ctx: &DisplayContext,
        queue: &MessageQueue,
    ) -> Result<GlContextBinder, Error> {
        let driver = driver::open(queue.display())?;
        GlContextBinder::create_with_driver(site, description, ctx, queue, driver)
    }

    /// Creates a window for `description` with a context from `driver`.
    pub fn create_with_driver(
        site: Rc<dyn WindowSite>,
        description: &WindowDescription,
        ctx: &DisplayContext,
        queue: &MessageQueue,
        driver: Rc<dyn GlDriver>,
    ) -> Result<GlContextBinder, Error> {
        let options =
            ContextOptions::from_description(description, config::gl_version_override());
        let request = FormatRequest::from_description(description);

        let (window, format) = match driver.visual_timing() {
            VisualTiming::BeforeWindow => {
                let formats = driver.pixel_formats(None, &request)?;
                let format = select_pixel_format(&formats, &request)?;
                let window = PlatformWindow::create(format.visual, site, description, queue)?;
                (window, format)
            }
            VisualTiming::AfterWindow => {
                let window = PlatformWindow::create(None, site, description, queue)?;
                let formats = driver.pixel_formats(Some(&window), &request)?;
                let format = select_pixel_format(&formats, &request)?;
                (window, format)
            }
        };
        info!(
            "{:?}: pixel format {} ({} samples, {} bit alpha, depth {}, stencil {})",
            window.id(),
            format.id,
            format.samples,
            format.alpha_bits,
            format.depth_bits,
            format.stencil_bits
        );

        let layered_readback = description.is_layered()
            && (config::composition_disabled() || !window.native().composition_enabled());
        let target = ContextTarget {
            window: &window,
            format: &format,
            layered_readback,
        };
        driver.prepare_window(&target)?;

        let slot = Arc::new(SharedSlot(Mutex::new(None)));
        let provider: Arc<dyn GraphicContextProvider> = slot.clone();
        let (context, use_gl3) = {
            let mut guard = ctx.shared_gc().get_provider();
            let (context, use_gl3) = negotiate(driver.as_ref(), &target, &options, &guard)?;
            *slot.0.lock().unwrap_or_else(|e| e.into_inner()) = Some(context.shared_handle());
            guard.register(&provider);
            (context, use_gl3)
        };
        let context: Rc<dyn NativeGlContext> = Rc::from(context);
        let (major, minor) = context.version();
        info!(
            "created OpenGL {}.{} {:?} context for {:?}",
            major,
            minor,
            context.profile(),
            window.id()
        );

        context.make_current()?;
        let swap_interval = description.swap_interval();
        if swap_interval != -1 && !context.set_swap_interval(swap_interval) {
            debug!("no swap control available");
        }

        let weak_window = Rc::downgrade(&window);
        let weak_context: Weak<dyn NativeGlContext> = Rc::downgrade(&context);
        window.set_on_resized(Some(Box::new(move || {
            if let (Some(window), Some(context)) = (weak_window.upgrade(), weak_context.upgrade())
            {
                resize_drawable(&window, context.as_ref());
            }
        })));

        Ok(GlContextBinder {
            double_buffered: format.double_buffered,
            context,
            window,
            driver,
            format,
            swap_interval: Cell::new(swap_interval),
            use_gl3,
            layered_readback,
            slot,
            provider,
            ctx: ctx.clone(),
            state: Cell::new(BinderState::Bound),
        })
    }

    pub fn window(&self) -> &Rc<PlatformWindow> {
        &self.window
    }

    pub fn context(&self) -> &dyn NativeGlContext {
        self.context.as_ref()
    }

    pub fn driver(&self) -> &Rc<dyn GlDriver> {
        &self.driver
    }

    /// This binder's entry in the shared namespace registry.
    pub fn provider(&self) -> &Arc<dyn GraphicContextProvider> {
        &self.provider
    }

    pub fn pixel_format(&self) -> &PixelFormat {
        &self.format
    }

    pub fn state(&self) -> BinderState {
        self.state.get()
    }

    /// Whether the programmable pipeline is in use.
    pub fn use_gl3(&self) -> bool {
        self.use_gl3
    }

    pub fn is_double_buffered(&self) -> bool {
        self.double_buffered
    }

    /// Whether frames of this layered window are read back instead of presented.
    pub fn is_layered_readback(&self) -> bool {
        self.layered_readback
    }

    /// The swap interval last applied, `-1` if none was.
    pub fn swap_interval(&self) -> i32 {
        self.swap_interval.get()
    }

    pub fn get_viewport(&self) -> Rect {
        self.window.get_viewport()
    }

    pub fn get_opengl_version(&self) -> (i32, i32) {
        self.context.version()
    }

    pub fn make_current(&self) -> Result<(), Error> {
        self.context.make_current()
    }

    pub fn is_current(&self) -> bool {
        self.context.is_current()
    }

    pub fn get_proc_address(&self, name: &str) -> Option<*const c_void> {
        self.context.get_proc_address(name)
    }

    /// Presents the frame.
    ///
    /// `interval` replaces the swap interval when it is not `-1`.
    pub fn flip(&self, interval: i32) -> Result<(), Error> {
        if self.state.get() != BinderState::Bound {
            debug!("flip on a binder without context");
            return Ok(());
        }
        if self.layered_readback {
            return self.present_layered();
        }
        if interval != -1 && interval != self.swap_interval.get() {
            self.swap_interval.set(interval);
            if !self.context.set_swap_interval(interval) {
                debug!("swap interval {} not applied", interval);
            }
        }
        self.context.swap_buffers()?;
        if self.window.description().is_layered() {
            let (width, height) = self.drawable_size();
            let alpha = self.context.read_pixels(
                full_rect(width, height),
                ReadSource::Front,
                ReadFormat::Alpha,
            );
            self.window.set_alpha_mask(Some(AlphaMask {
                width,
                height,
                alpha: flip_rows(&alpha, width as usize, height as usize),
            }));
        }
        Ok(())
    }

    /// Copies `rect` (client pixels) of the back buffer to the screen.
    pub fn update(&self, rect: Rect) {
        if self.state.get() != BinderState::Bound {
            return;
        }
        let (width, height) = self.drawable_size();
        let rect = match clamp_to_viewport(rect, width, height) {
            Some(rect) => rect,
            None => return,
        };
        if self.double_buffered {
            self.context.blit_to_front(rect);
        } else {
            self.context.flush();
        }
    }

    /// The BGRA color of the presented frame at a client pixel.
    pub fn get_pixel(&self, pos: Point) -> Option<[u8; 4]> {
        let (width, height) = self.drawable_size();
        let (x, y) = (pos.x.floor() as i32, pos.y.floor() as i32);
        if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
            return None;
        }
        let rect = PixelRect {
            x,
            y: height as i32 - 1 - y,
            width: 1,
            height: 1,
        };
        let pixel = self.context.read_pixels(rect, ReadSource::Front, ReadFormat::Bgra);
        pixel.get(..4).and_then(|p| p.try_into().ok())
    }

    /// Brings the drawable in line with the window's client area.
    pub fn on_window_resized(&self) {
        resize_drawable(&self.window, self.context.as_ref());
    }

    fn drawable_size(&self) -> (u32, u32) {
        let size = self.window.client_rect_px().size();
        (size.width.max(0.0) as u32, size.height.max(0.0) as u32)
    }

    fn present_layered(&self) -> Result<(), Error> {
        let (width, height) = self.drawable_size();
        let source = if self.double_buffered {
            ReadSource::Back
        } else {
            ReadSource::Front
        };
        let bgra = self
            .context
            .read_pixels(full_rect(width, height), source, ReadFormat::Bgra);
        let mut pixels = flip_rows(&bgra, width as usize * 4, height as usize);
        premultiply(&mut pixels);
        let alpha = pixels.chunks_exact(4).map(|p| p[3]).collect();
        self.window.native().update_layered(&LayeredImage {
            width,
            height,
            pixels,
        })?;
        self.window.set_alpha_mask(Some(AlphaMask {
            width,
            height,
            alpha,
        }));
        Ok(())
    }
}

impl Drop for GlContextBinder {
    fn drop(&mut self) {
        self.window.set_on_resized(None);
        self.window.set_alpha_mask(None);
        self.context.clear_current();
        self.slot.clear();
        self.ctx.shared_gc().remove_provider(&self.provider);
        self.state.set(BinderState::Destroyed);
        debug!("released the context of {:?}", self.window.id());
    }
}

/// The context-related part of a description, after overrides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ContextOptions {
    Core(GlCoreOptions),
    Legacy(GlLegacyOptions),
}

impl ContextOptions {
    fn from_description(desc: &WindowDescription, version: Option<(i32, i32)>) -> ContextOptions {
        let mut options = match desc.gl() {
            GlExtension::None => ContextOptions::Core(GlCoreOptions::default()),
            GlExtension::Core(core) => ContextOptions::Core(*core),
            GlExtension::Legacy(legacy) => ContextOptions::Legacy(*legacy),
        };
        if let (ContextOptions::Core(core), Some((major, minor))) = (&mut options, version) {
            info!("requested OpenGL version overridden to {}.{}", major, minor);
            core.version_major = major;
            core.version_minor = minor;
        }
        options
    }

    fn share_namespace(&self) -> bool {
        match self {
            ContextOptions::Core(core) => core.share_namespace,
            ContextOptions::Legacy(legacy) => legacy.share_namespace,
        }
    }
}

fn negotiate(
    driver: &dyn GlDriver,
    target: &ContextTarget,
    options: &ContextOptions,
    guard: &ProviderGuard,
) -> Result<(Box<dyn NativeGlContext>, bool), Error> {
    let share = |profile| {
        options
            .share_namespace()
            .then(|| guard.find_shared(driver.api(), profile, driver.display_id()))
            .flatten()
    };
    let legacy = || driver.create_legacy_context(target, share(GlProfile::Legacy));

    let core = match options {
        ContextOptions::Legacy(_) => return Ok((legacy()?, false)),
        ContextOptions::Core(core) if core.version_major < 3 => return Ok((legacy()?, false)),
        ContextOptions::Core(core) => core,
    };
    let (major, minor) = (core.version_major, core.version_minor);
    let unsupported = Error::UnsupportedVersion { major, minor };

    let context = if driver.has_create_context_attribs(target) {
        let mut created = None;
        for (major, minor) in version_candidates(major, minor, core.allow_lower_versions) {
            let request = ContextRequest {
                major,
                minor,
                debug: core.debug,
                forward_compatible: core.forward_compatible,
                core_profile: core.core_profile,
                compatibility_profile: core.compatibility_profile,
                layer_plane: core.layer_plane,
            };
            if let Some(context) =
                driver.create_context_attribs(target, &request, share(GlProfile::Core))?
            {
                created = Some(context);
                break;
            }
            debug!("OpenGL {}.{} refused", major, minor);
        }
        match created {
            Some(context) => context,
            None if !core.allow_lower_versions => return Err(unsupported),
            None => {
                warn!("no OpenGL 3 context available, falling back to a legacy context");
                legacy()?
            }
        }
    } else if !core.allow_lower_versions && driver.legacy_requires_lower_versions() {
        return Err(unsupported);
    } else {
        debug!("attribute-based context creation unavailable");
        legacy()?
    };

    let use_gl3 = use_gl3(major, core.allow_lower_versions, context.version().0);
    Ok((context, use_gl3))
}

/// The versions to try, in order, for a request of `major.minor`.
pub fn version_candidates(major: i32, minor: i32, allow_lower: bool) -> Vec<(i32, i32)> {
    if !allow_lower {
        return vec![(major, minor)];
    }
    let mut candidates = Vec::new();
    if !KNOWN_VERSIONS.contains(&(major, minor)) && (major, minor) > KNOWN_VERSIONS[0] {
        candidates.push((major, minor));
    }
    candidates.extend(
        KNOWN_VERSIONS
            .iter()
            .copied()
            .filter(|version| *version <= (major, minor)),
    );
    candidates
}

/// Whether the programmable pipeline is used for a request of `requested_major`.
pub fn use_gl3(requested_major: i32, allow_lower: bool, actual_major: i32) -> bool {
    if requested_major < 3 {
        false
    } else if !allow_lower {
        true
    } else {
        actual_major >= 3
    }
}

/// Raises the sample count until the request is met, so the first format reaching the
/// request wins; among formats with that count the most sample buffers win. Layered
/// windows only consider formats with a full alpha channel.
pub fn select_pixel_format(
    formats: &[PixelFormat],
    request: &FormatRequest,
) -> Result<PixelFormat, Error> {
    let mut candidates = formats
        .iter()
        .filter(|format| !request.layered || format.has_full_alpha());
    let first = candidates.next().ok_or(Error::NoPixelFormat)?;
    let mut best = *first;
    let wanted = i32::from(request.multisampling);
    let mut max_samples = 0;
    let mut max_sample_buffers = 0;
    for format in std::iter::once(first).chain(candidates) {
        if max_samples < wanted && format.samples > max_samples {
            max_samples = format.samples;
            best = *format;
        }
        if format.samples == max_samples && format.sample_buffers > max_sample_buffers {
            max_sample_buffers = format.sample_buffers;
            best = *format;
        }
    }
    Ok(best)
}

fn resize_drawable(window: &PlatformWindow, context: &dyn NativeGlContext) {
    let size = window.client_rect_px().size();
    context.resize(size.width.max(0.0) as u32, size.height.max(0.0) as u32);
}

fn full_rect(width: u32, height: u32) -> PixelRect {
    PixelRect {
        x: 0,
        y: 0,
        width: width as i32,
        height: height as i32,
    }
}

/// Clamps a client rect (top left origin) to the drawable and converts it to GL
/// coordinates. `None` if nothing is left.
fn clamp_to_viewport(rect: Rect, width: u32, height: u32) -> Option<PixelRect> {
    let left = rect.x0.max(0.0).floor() as i32;
    let top = rect.y0.max(0.0).floor() as i32;
    let right = (rect.x1.ceil() as i32).min(width as i32);
    let bottom = (rect.y1.ceil() as i32).min(height as i32);
    if right <= left || bottom <= top {
        return None;
    }
    Some(PixelRect {
        x: left,
        y: height as i32 - bottom,
        width: right - left,
        height: bottom - top,
    })
}

/// Reverses the row order of `rows` rows of `stride` bytes.
fn flip_rows(pixels: &[u8], stride: usize, rows: usize) -> Vec<u8> {
    if stride == 0 {
        return Vec::new();
    }
    pixels
        .chunks_exact(stride)
        .take(rows)
        .rev()
        .flatten()
        .copied()
        .collect()
}

fn premultiply(bgra: &mut [u8]) {
    for pixel in bgra.chunks_exact_mut(4) {
        let alpha = u16::from(pixel[3]);
        for channel in &mut pixel[..3] {
            *channel = ((u16::from(*channel) * alpha + 127) / 255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_shell::VisualInfo;

    fn format(id: i32, samples: i32, sample_buffers: i32, alpha_bits: i32) -> PixelFormat {
        PixelFormat {
            id,
            visual: None,
            sample_buffers,
            samples,
            alpha_bits,
            depth_bits: 24,
            stencil_bits: 8,
            double_buffered: true,
        }
    }

    fn request(multisampling: u8, layered: bool) -> FormatRequest {
        let mut desc = WindowDescription::new();
        desc.set_multisampling(multisampling);
        desc.set_layered(layered);
        FormatRequest::from_description(&desc)
    }

    #[test]
    fn candidates_descend_from_the_request() {
        assert_eq!(
            version_candidates(3, 3, true),
            vec![(3, 3), (3, 2), (3, 1), (3, 0)]
        );
        assert_eq!(version_candidates(4, 3, false), vec![(4, 3)]);
        assert_eq!(version_candidates(4, 6, true)[..2], [(4, 6), (4, 5)]);
        assert!(version_candidates(2, 1, true).is_empty());
    }

    #[test]
    fn gl3_decision() {
        assert!(!use_gl3(2, false, 4));
        assert!(use_gl3(3, false, 2));
        assert!(use_gl3(3, true, 3));
        assert!(!use_gl3(4, true, 2));
    }

    #[test]
    fn first_format_reaching_the_request_wins() {
        let formats = [
            format(1, 0, 0, 8),
            format(2, 4, 1, 8),
            format(3, 8, 1, 8),
            format(4, 4, 1, 8),
        ];
        let chosen = select_pixel_format(&formats, &request(4, false)).map(|f| f.id);
        assert_eq!(chosen.ok(), Some(2));
        let chosen = select_pixel_format(&formats, &request(0, false)).map(|f| f.id);
        assert_eq!(chosen.ok(), Some(1));
    }

    #[test]
    fn sample_buffers_break_ties() {
        let formats = [format(1, 0, 0, 8), format(2, 0, 1, 8)];
        let chosen = select_pixel_format(&formats, &request(0, false)).map(|f| f.id);
        assert_eq!(chosen.ok(), Some(2));
    }

    #[test]
    fn layered_needs_alpha() {
        let formats = [format(1, 0, 0, 0), format(2, 0, 0, 8)];
        let chosen = select_pixel_format(&formats, &request(0, true)).map(|f| f.id);
        assert_eq!(chosen.ok(), Some(2));
        let no_alpha = [format(1, 0, 0, 0)];
        assert!(matches!(
            select_pixel_format(&no_alpha, &request(0, true)),
            Err(Error::NoPixelFormat)
        ));
    }

    #[test]
    fn layered_needs_alpha_in_the_visual() {
        let visual = |depth, alpha_mask| VisualInfo {
            visual_id: 0x21,
            depth,
            alpha_mask,
        };
        let formats = [
            PixelFormat {
                visual: Some(visual(24, 0)),
                ..format(1, 0, 0, 8)
            },
            PixelFormat {
                visual: Some(visual(32, 0xff)),
                ..format(2, 0, 0, 8)
            },
        ];
        let chosen = select_pixel_format(&formats, &request(0, true)).map(|f| f.id);
        assert_eq!(chosen.ok(), Some(2));
        assert!(matches!(
            select_pixel_format(&formats[..1], &request(0, true)),
            Err(Error::NoPixelFormat)
        ));
    }

    #[test]
    fn inexact_request_takes_the_next_higher_count() {
        let formats = [format(1, 0, 0, 8), format(2, 4, 1, 8), format(3, 8, 1, 8)];
        let chosen = select_pixel_format(&formats, &request(2, false)).map(|f| f.id);
        assert_eq!(chosen.ok(), Some(2));
        let chosen = select_pixel_format(&formats, &request(16, false)).map(|f| f.id);
        assert_eq!(chosen.ok(), Some(3));
    }

    #[test]
    fn update_rect_is_clamped_and_flipped() {
        let rect = clamp_to_viewport(Rect::new(-10.0, 10.0, 50.0, 30.0), 40, 100);
        assert_eq!(
            rect,
            Some(PixelRect {
                x: 0,
                y: 70,
                width: 40,
                height: 20
            })
        );
        assert_eq!(clamp_to_viewport(Rect::new(50.0, 0.0, 60.0, 10.0), 40, 100), None);
    }

    #[test]
    fn premultiplied_pixels() {
        let mut pixels = vec![255, 128, 0, 128, 10, 20, 30, 255, 200, 200, 200, 0];
        premultiply(&mut pixels);
        assert_eq!(pixels, vec![128, 64, 0, 128, 10, 20, 30, 255, 0, 0, 0, 0]);
    }

    #[test]
    fn rows_are_reversed() {
        let rows = flip_rows(&[1, 2, 3, 4, 5, 6], 2, 3);
        assert_eq!(rows, vec![5, 6, 3, 4, 1, 2]);
    }

    #[test]
    fn version_override_only_touches_core_requests() {
        let mut desc = WindowDescription::new();
        assert_eq!(
            ContextOptions::from_description(&desc, Some((4, 1))),
            ContextOptions::Core(GlCoreOptions::version(4, 1))
        );
        desc.set_gl(GlExtension::Legacy(GlLegacyOptions::default()));
        assert_eq!(
            ContextOptions::from_description(&desc, Some((4, 1))),
            ContextOptions::Legacy(GlLegacyOptions::default())
        );
    }
}
