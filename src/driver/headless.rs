// Copyright 2022 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! A GL driver without a GPU.
//!
//! Contexts keep their framebuffers in memory and their object namespaces in the driver,
//! so everything the binder does (version negotiation, sharing, swap control, readback)
//! can be observed from tests. Which versions can be created and which extensions exist
//! is configurable.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::os::raw::c_void;
use std::rc::Rc;

use tracing::debug;

use super::{
    ContextRequest, ContextTarget, FormatRequest, GlDriver, NativeGlContext, PixelFormat,
    PixelRect, ReadFormat, ReadSource, VisualTiming,
};
use crate::context::{ContextHandle, GlProfile};
use crate::error::Error;
use crate::functions::{Entry, GlApi, GlFunctionTable};
use glint_shell::PlatformWindow;

/// What the simulated driver supports.
#[derive(Clone, Debug)]
pub struct HeadlessGlConfig {
    /// Versions the attribute-based path can create.
    pub attrib_versions: Vec<(i32, i32)>,
    /// The version every legacy context reports.
    pub legacy_version: (i32, i32),
    /// The window-system extension string.
    pub extensions: String,
    pub formats: Vec<PixelFormat>,
    pub timing: VisualTiming,
    pub legacy_requires_lower_versions: bool,
}

impl Default for HeadlessGlConfig {
    fn default() -> HeadlessGlConfig {
        let format = PixelFormat {
            id: 1,
            visual: None,
            sample_buffers: 0,
            samples: 0,
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 8,
            double_buffered: true,
        };
        HeadlessGlConfig {
            attrib_versions: vec![
                (4, 6),
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
            ],
            legacy_version: (2, 1),
            extensions: "GLX_ARB_create_context GLX_ARB_create_context_profile \
                         GLX_EXT_swap_control"
                .into(),
            formats: vec![
                PixelFormat {
                    id: 0,
                    alpha_bits: 0,
                    ..format
                },
                format,
                PixelFormat {
                    id: 2,
                    sample_buffers: 1,
                    samples: 4,
                    ..format
                },
            ],
            timing: VisualTiming::BeforeWindow,
            legacy_requires_lower_versions: false,
        }
    }
}

#[derive(Default)]
struct Namespace {
    textures: RefCell<HashSet<u32>>,
    next: Cell<u32>,
}

#[derive(Default)]
struct Shared {
    current: Cell<Option<u64>>,
    next_id: Cell<u64>,
    namespaces: RefCell<HashMap<u64, Rc<Namespace>>>,
}

/// The simulated driver.
pub struct HeadlessGl {
    config: HeadlessGlConfig,
    functions: GlFunctionTable,
    shared: Rc<Shared>,
}

thread_local! {
    static DEFAULT_DRIVER: Rc<HeadlessGl> =
        Rc::new(HeadlessGl::new(HeadlessGlConfig::default()));
}

extern "C" fn simulated_entry_point() {}

fn simulated_address(name: &str) -> Option<*const c_void> {
    name.starts_with("gl")
        .then_some(simulated_entry_point as *const c_void)
}

impl HeadlessGl {
    pub fn new(config: HeadlessGlConfig) -> HeadlessGl {
        let functions =
            GlFunctionTable::new(GlApi::Headless, &config.extensions, simulated_address);
        HeadlessGl {
            config,
            functions,
            shared: Rc::new(Shared::default()),
        }
    }

    /// The default driver of this thread, used for headless displays.
    pub fn shared() -> Rc<HeadlessGl> {
        DEFAULT_DRIVER.with(Rc::clone)
    }

    pub fn config(&self) -> &HeadlessGlConfig {
        &self.config
    }

    pub fn functions(&self) -> &GlFunctionTable {
        &self.functions
    }

    /// The number of distinct object namespaces among live contexts.
    pub fn namespace_count(&self) -> usize {
        let namespaces = self.shared.namespaces.borrow();
        let mut seen: Vec<*const Namespace> = namespaces.values().map(Rc::as_ptr).collect();
        seen.sort();
        seen.dedup();
        seen.len()
    }

    fn create(
        &self,
        target: &ContextTarget,
        version: (i32, i32),
        profile: GlProfile,
        share: Option<ContextHandle>,
    ) -> HeadlessContext {
        let id = self.shared.next_id.get() + 1;
        self.shared.next_id.set(id);

        let joined = share
            .filter(|handle| handle.display == self.display_id())
            .and_then(|handle| {
                let namespaces = self.shared.namespaces.borrow();
                namespaces.get(&(handle.raw as u64)).cloned()
            });
        let namespace = match joined {
            Some(namespace) => {
                debug!("context {} joins an existing namespace", id);
                namespace
            }
            None => Rc::new(Namespace::default()),
        };
        self.shared
            .namespaces
            .borrow_mut()
            .insert(id, namespace.clone());

        let size = target.window.client_rect_px().size();
        let surface = Surface::new(size.width as u32, size.height as u32);
        HeadlessContext {
            id,
            shared: self.shared.clone(),
            display: self.display_id(),
            namespace,
            version,
            profile,
            double_buffered: target.format.double_buffered,
            swap_entry: self.functions.swap_interval_entry().map(|(entry, _)| entry),
            front: RefCell::new(surface.clone()),
            back: RefCell::new(surface),
            swaps: Cell::new(0),
            swap_interval: Cell::new(None),
        }
    }
}

impl GlDriver for HeadlessGl {
    fn api(&self) -> GlApi {
        GlApi::Headless
    }

    fn display_id(&self) -> usize {
        Rc::as_ptr(&self.shared) as usize
    }

    fn visual_timing(&self) -> VisualTiming {
        self.config.timing
    }

    fn pixel_formats(
        &self,
        _window: Option<&PlatformWindow>,
        request: &FormatRequest,
    ) -> Result<Vec<PixelFormat>, Error> {
        Ok(self
            .config
            .formats
            .iter()
            .filter(|f| f.depth_bits >= i32::from(request.depth_size))
            .filter(|f| f.stencil_bits >= i32::from(request.stencil_size))
            .copied()
            .collect())
    }

    fn prepare_window(&self, _target: &ContextTarget) -> Result<(), Error> {
        Ok(())
    }

    fn has_create_context_attribs(&self, _target: &ContextTarget) -> bool {
        self.functions.is_available(Entry::CreateContextAttribs)
    }

    fn create_context_attribs(
        &self,
        target: &ContextTarget,
        request: &ContextRequest,
        share: Option<ContextHandle>,
    ) -> Result<Option<Box<dyn NativeGlContext>>, Error> {
        let version = (request.major, request.minor);
        if !self.config.attrib_versions.contains(&version) {
            return Ok(None);
        }
        Ok(Some(Box::new(self.create(target, version, GlProfile::Core, share))))
    }

    fn create_legacy_context(
        &self,
        target: &ContextTarget,
        share: Option<ContextHandle>,
    ) -> Result<Box<dyn NativeGlContext>, Error> {
        let version = self.config.legacy_version;
        Ok(Box::new(self.create(target, version, GlProfile::Legacy, share)))
    }

    fn legacy_requires_lower_versions(&self) -> bool {
        self.config.legacy_requires_lower_versions
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// BGRA pixels, bottom row first.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    fn new(width: u32, height: u32) -> Surface {
        Surface {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }

    fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
        match self.offset(x, y) {
            Some(i) => [
                self.pixels[i],
                self.pixels[i + 1],
                self.pixels[i + 2],
                self.pixels[i + 3],
            ],
            None => [0; 4],
        }
    }

    fn set_pixel(&mut self, x: i32, y: i32, bgra: [u8; 4]) {
        if let Some(i) = self.offset(x, y) {
            self.pixels[i..i + 4].copy_from_slice(&bgra);
        }
    }

    fn rect_points(rect: PixelRect) -> impl Iterator<Item = (i32, i32)> {
        (rect.y..rect.y + rect.height)
            .flat_map(move |y| (rect.x..rect.x + rect.width).map(move |x| (x, y)))
    }
}

/// A simulated context.
pub struct HeadlessContext {
    id: u64,
    shared: Rc<Shared>,
    display: usize,
    namespace: Rc<Namespace>,
    version: (i32, i32),
    profile: GlProfile,
    double_buffered: bool,
    swap_entry: Option<Entry>,
    front: RefCell<Surface>,
    back: RefCell<Surface>,
    swaps: Cell<usize>,
    swap_interval: Cell<Option<i32>>,
}

impl HeadlessContext {
    /// Allocates a texture name in the context's namespace.
    pub fn create_texture(&self) -> u32 {
        let name = self.namespace.next.get() + 1;
        self.namespace.next.set(name);
        self.namespace.textures.borrow_mut().insert(name);
        name
    }

    /// Whether `name` is a texture in this context's namespace.
    pub fn is_texture(&self, name: u32) -> bool {
        self.namespace.textures.borrow().contains(&name)
    }

    /// Fills `rect` (GL coordinates) of the draw buffer.
    pub fn fill_rect(&self, rect: PixelRect, bgra: [u8; 4]) {
        let mut surface = self.draw_buffer().borrow_mut();
        for (x, y) in Surface::rect_points(rect) {
            surface.set_pixel(x, y, bgra);
        }
    }

    /// A pixel of the front buffer, in GL coordinates.
    pub fn front_pixel(&self, x: i32, y: i32) -> [u8; 4] {
        self.front.borrow().pixel(x, y)
    }

    pub fn size(&self) -> (u32, u32) {
        let front = self.front.borrow();
        (front.width, front.height)
    }

    pub fn swap_count(&self) -> usize {
        self.swaps.get()
    }

    /// The last swap interval applied.
    pub fn swap_interval(&self) -> Option<i32> {
        self.swap_interval.get()
    }

    /// The entry point swap control goes through.
    pub fn swap_entry(&self) -> Option<Entry> {
        self.swap_entry
    }

    fn draw_buffer(&self) -> &RefCell<Surface> {
        if self.double_buffered {
            &self.back
        } else {
            &self.front
        }
    }
}

impl NativeGlContext for HeadlessContext {
    fn make_current(&self) -> Result<(), Error> {
        self.shared.current.set(Some(self.id));
        Ok(())
    }

    fn is_current(&self) -> bool {
        self.shared.current.get() == Some(self.id)
    }

    fn clear_current(&self) {
        if self.is_current() {
            self.shared.current.set(None);
        }
    }

    fn swap_buffers(&self) -> Result<(), Error> {
        if self.double_buffered {
            let back = self.back.borrow().clone();
            *self.front.borrow_mut() = back;
        }
        self.swaps.set(self.swaps.get() + 1);
        Ok(())
    }

    fn set_swap_interval(&self, interval: i32) -> bool {
        if self.swap_entry.is_none() {
            return false;
        }
        self.swap_interval.set(Some(interval));
        true
    }

    fn get_proc_address(&self, name: &str) -> Option<*const c_void> {
        simulated_address(name)
    }

    fn version(&self) -> (i32, i32) {
        self.version
    }

    fn profile(&self) -> GlProfile {
        self.profile
    }

    fn shared_handle(&self) -> ContextHandle {
        ContextHandle {
            api: GlApi::Headless,
            profile: self.profile,
            display: self.display,
            raw: self.id as usize,
        }
    }

    fn flush(&self) {}

    fn read_pixels(&self, rect: PixelRect, source: ReadSource, format: ReadFormat) -> Vec<u8> {
        let surface = match source {
            ReadSource::Front => self.front.borrow(),
            ReadSource::Back => self.back.borrow(),
        };
        let mut out = Vec::new();
        for (x, y) in Surface::rect_points(rect) {
            let pixel = surface.pixel(x, y);
            match format {
                ReadFormat::Bgra => out.extend_from_slice(&pixel),
                ReadFormat::Alpha => out.push(pixel[3]),
            }
        }
        out
    }

    fn blit_to_front(&self, rect: PixelRect) {
        if !self.double_buffered {
            return;
        }
        let back = self.back.borrow();
        let mut front = self.front.borrow_mut();
        for (x, y) in Surface::rect_points(rect) {
            front.set_pixel(x, y, back.pixel(x, y));
        }
    }

    fn resize(&self, width: u32, height: u32) {
        *self.front.borrow_mut() = Surface::new(width, height);
        *self.back.borrow_mut() = Surface::new(width, height);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for HeadlessContext {
    fn drop(&mut self) {
        self.clear_current();
        self.shared.namespaces.borrow_mut().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_rect_is_clipped() {
        let mut surface = Surface::new(2, 2);
        let rect = PixelRect {
            x: 1,
            y: 0,
            width: 4,
            height: 1,
        };
        for (x, y) in Surface::rect_points(rect) {
            surface.set_pixel(x, y, [1, 2, 3, 4]);
        }
        assert_eq!(surface.pixel(1, 0), [1, 2, 3, 4]);
        assert_eq!(surface.pixel(0, 0), [0; 4]);
        assert_eq!(surface.pixel(5, 0), [0; 4]);
    }

    #[test]
    fn formats_honour_depth_and_stencil() {
        let driver = HeadlessGl::new(HeadlessGlConfig {
            formats: vec![PixelFormat {
                id: 9,
                visual: None,
                sample_buffers: 0,
                samples: 0,
                alpha_bits: 8,
                depth_bits: 16,
                stencil_bits: 0,
                double_buffered: true,
            }],
            ..HeadlessGlConfig::default()
        });
        let mut request = FormatRequest::from_description(&Default::default());
        request.depth_size = 16;
        assert_eq!(driver.pixel_formats(None, &request).map(|f| f.len()).ok(), Some(1));
        request.stencil_size = 8;
        assert_eq!(driver.pixel_formats(None, &request).map(|f| f.len()).ok(), Some(0));
    }
}
