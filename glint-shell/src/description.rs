// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! The configuration a window (and its GL context) is created from.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Weak;
use std::sync::Arc;

use crate::backend::RawWindow;
use crate::kurbo::{Rect, Size};
use crate::window::PlatformWindow;

/// Options for contexts created through the attribute based path (GL 3.0 and up).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlCoreOptions {
    /// Requested major version.
    pub version_major: i32,
    /// Requested minor version.
    pub version_minor: i32,
    /// Whether a lower version than requested may be returned.
    pub allow_lower_versions: bool,
    /// Request a debug context.
    pub debug: bool,
    /// Request a forward compatible context.
    pub forward_compatible: bool,
    /// Request the core profile.
    pub core_profile: bool,
    /// Request the compatibility profile.
    pub compatibility_profile: bool,
    /// Overlay/underlay plane the context renders to; 0 is the main plane.
    pub layer_plane: i32,
    /// Share object namespaces with the other contexts of the process.
    pub share_namespace: bool,
}

impl Default for GlCoreOptions {
    fn default() -> GlCoreOptions {
        GlCoreOptions {
            version_major: 3,
            version_minor: 0,
            allow_lower_versions: true,
            debug: false,
            forward_compatible: false,
            core_profile: true,
            compatibility_profile: false,
            layer_plane: 0,
            share_namespace: true,
        }
    }
}

impl GlCoreOptions {
    /// Options requesting `major.minor`, keeping the other defaults.
    pub fn version(major: i32, minor: i32) -> GlCoreOptions {
        GlCoreOptions {
            version_major: major,
            version_minor: minor,
            ..GlCoreOptions::default()
        }
    }
}

/// Options for fixed function (GL 1.x) contexts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlLegacyOptions {
    pub double_buffer: bool,
    pub stereo: bool,
    pub buffer_size: u8,
    pub red_size: u8,
    pub green_size: u8,
    pub blue_size: u8,
    pub share_namespace: bool,
}

impl Default for GlLegacyOptions {
    fn default() -> GlLegacyOptions {
        GlLegacyOptions {
            double_buffer: true,
            stereo: false,
            buffer_size: 24,
            red_size: 4,
            green_size: 4,
            blue_size: 4,
            share_namespace: true,
        }
    }
}

/// The GL specific part of a [`WindowDescription`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GlExtension {
    /// No GL specific options; a GL binder uses its defaults.
    #[default]
    None,
    /// A programmable pipeline context, negotiated by version.
    Core(GlCoreOptions),
    /// A fixed function context.
    Legacy(GlLegacyOptions),
}

/// Everything needed to create a window.
///
/// The description is a plain value: it is filled in once by the application and copied into
/// the window and the GL binder when they are created.
#[derive(Clone)]
pub struct WindowDescription {
    title: String,
    position: Rect,
    position_client_area: bool,
    fullscreen: bool,
    fullscreen_monitor: usize,
    allow_resize: bool,
    visible: bool,
    topmost: bool,
    layered: bool,
    tool_window: bool,
    dialog: bool,
    popup: bool,
    caption: bool,
    sysmenu: bool,
    minimize_button: bool,
    maximize_button: bool,
    drop_shadow: bool,
    no_activate: bool,
    update_supported: bool,
    flipping_buffers: u32,
    swap_interval: i32,
    depth_size: u8,
    stencil_size: u8,
    multisampling: u8,
    pixel_ratio: Option<f64>,
    owner: Option<Weak<PlatformWindow>>,
    handle: Option<RawWindow>,
    gl: GlExtension,
    data: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Default for WindowDescription {
    fn default() -> WindowDescription {
        WindowDescription {
            title: String::new(),
            position: Rect::new(0.0, 0.0, 640.0, 480.0),
            position_client_area: false,
            fullscreen: false,
            fullscreen_monitor: 0,
            allow_resize: false,
            visible: true,
            topmost: false,
            layered: false,
            tool_window: false,
            dialog: false,
            popup: false,
            caption: true,
            sysmenu: true,
            minimize_button: true,
            maximize_button: false,
            drop_shadow: false,
            no_activate: false,
            update_supported: false,
            flipping_buffers: 2,
            swap_interval: -1,
            depth_size: 0,
            stencil_size: 0,
            multisampling: 0,
            pixel_ratio: None,
            owner: None,
            handle: None,
            gl: GlExtension::None,
            data: HashMap::new(),
        }
    }
}

impl fmt::Debug for WindowDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WindowDescription")
            .field("title", &self.title)
            .field("position", &self.position)
            .field("position_client_area", &self.position_client_area)
            .field("fullscreen", &self.fullscreen)
            .field("allow_resize", &self.allow_resize)
            .field("visible", &self.visible)
            .field("layered", &self.layered)
            .field("popup", &self.popup)
            .field("gl", &self.gl)
            .field("data_keys", &self.data.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl WindowDescription {
    pub fn new() -> WindowDescription {
        WindowDescription::default()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title<S: Into<String>>(&mut self, title: S) {
        self.title = title.into();
    }

    /// The requested window rectangle, in logical units.
    ///
    /// A rectangle whose left and top are both `-1` asks for the window to be centered on
    /// the screen.
    pub fn position(&self) -> Rect {
        self.position
    }

    /// Whether [`position`](Self::position) describes the client area rather than the
    /// outer window frame.
    pub fn position_client_area(&self) -> bool {
        self.position_client_area
    }

    pub fn set_position(&mut self, position: Rect, client_area: bool) {
        self.position = position;
        self.position_client_area = client_area;
    }

    /// Sets the size, keeping the current origin.
    pub fn set_size(&mut self, size: Size, client_area: bool) {
        self.position = Rect::from_origin_size(self.position.origin(), size);
        self.position_client_area = client_area;
    }

    /// Requests a window centered on screen.
    pub fn set_centered_size(&mut self, size: Size, client_area: bool) {
        self.position = Rect::new(-1.0, -1.0, size.width - 1.0, size.height - 1.0);
        self.position_client_area = client_area;
    }

    pub fn is_centered(&self) -> bool {
        self.position.x0 == -1.0 && self.position.y0 == -1.0
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn fullscreen_monitor(&self) -> usize {
        self.fullscreen_monitor
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool, monitor: usize) {
        self.fullscreen = fullscreen;
        self.fullscreen_monitor = monitor;
    }

    pub fn allow_resize(&self) -> bool {
        self.allow_resize
    }

    pub fn set_allow_resize(&mut self, allow: bool) {
        self.allow_resize = allow;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_topmost(&self) -> bool {
        self.topmost
    }

    pub fn set_topmost(&mut self, topmost: bool) {
        self.topmost = topmost;
    }

    /// Layered windows have per-pixel alpha transparency.
    pub fn is_layered(&self) -> bool {
        self.layered
    }

    pub fn set_layered(&mut self, layered: bool) {
        self.layered = layered;
    }

    pub fn is_tool_window(&self) -> bool {
        self.tool_window
    }

    pub fn set_tool_window(&mut self, tool_window: bool) {
        self.tool_window = tool_window;
    }

    pub fn is_dialog(&self) -> bool {
        self.dialog
    }

    pub fn set_dialog(&mut self, dialog: bool) {
        self.dialog = dialog;
    }

    pub fn is_popup(&self) -> bool {
        self.popup
    }

    pub fn set_popup(&mut self, popup: bool) {
        self.popup = popup;
    }

    pub fn has_caption(&self) -> bool {
        self.caption
    }

    pub fn show_caption(&mut self, caption: bool) {
        self.caption = caption;
    }

    pub fn has_sysmenu(&self) -> bool {
        self.sysmenu
    }

    pub fn show_sysmenu(&mut self, sysmenu: bool) {
        self.sysmenu = sysmenu;
    }

    pub fn has_minimize_button(&self) -> bool {
        self.minimize_button
    }

    pub fn show_minimize_button(&mut self, show: bool) {
        self.minimize_button = show;
    }

    pub fn has_maximize_button(&self) -> bool {
        self.maximize_button
    }

    pub fn show_maximize_button(&mut self, show: bool) {
        self.maximize_button = show;
    }

    pub fn has_drop_shadow(&self) -> bool {
        self.drop_shadow
    }

    pub fn set_drop_shadow(&mut self, drop_shadow: bool) {
        self.drop_shadow = drop_shadow;
    }

    /// Windows that should not take focus when shown.
    pub fn has_no_activate(&self) -> bool {
        self.no_activate
    }

    pub fn set_no_activate(&mut self, no_activate: bool) {
        self.no_activate = no_activate;
    }

    /// Whether partial updates of the front buffer will be requested.
    pub fn is_update_supported(&self) -> bool {
        self.update_supported
    }

    pub fn set_update_supported(&mut self, supported: bool) {
        self.update_supported = supported;
    }

    pub fn flipping_buffers(&self) -> u32 {
        self.flipping_buffers
    }

    pub fn set_flipping_buffers(&mut self, buffers: u32) {
        self.flipping_buffers = buffers;
    }

    /// The swap interval; `-1` leaves the driver default untouched.
    pub fn swap_interval(&self) -> i32 {
        self.swap_interval
    }

    pub fn set_swap_interval(&mut self, interval: i32) {
        self.swap_interval = interval;
    }

    pub fn depth_size(&self) -> u8 {
        self.depth_size
    }

    pub fn set_depth_size(&mut self, bits: u8) {
        self.depth_size = bits;
    }

    pub fn stencil_size(&self) -> u8 {
        self.stencil_size
    }

    pub fn set_stencil_size(&mut self, bits: u8) {
        self.stencil_size = bits;
    }

    pub fn multisampling(&self) -> u8 {
        self.multisampling
    }

    pub fn set_multisampling(&mut self, samples: u8) {
        self.multisampling = samples;
    }

    /// An explicit pixel ratio. When unset, the ratio is derived from the screen density.
    pub fn pixel_ratio(&self) -> Option<f64> {
        self.pixel_ratio
    }

    pub fn set_pixel_ratio(&mut self, ratio: Option<f64>) {
        self.pixel_ratio = ratio;
    }

    pub fn owner(&self) -> Option<&Weak<PlatformWindow>> {
        self.owner.as_ref()
    }

    pub fn set_owner(&mut self, owner: Option<Weak<PlatformWindow>>) {
        self.owner = owner;
    }

    /// An existing native window to adopt instead of creating a new one.
    pub fn handle(&self) -> Option<RawWindow> {
        self.handle
    }

    pub fn set_handle(&mut self, handle: Option<RawWindow>) {
        self.handle = handle;
    }

    pub fn gl(&self) -> &GlExtension {
        &self.gl
    }

    pub fn set_gl(&mut self, gl: GlExtension) {
        self.gl = gl;
    }

    /// Attaches arbitrary data to the description under `name`.
    pub fn set_data<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.data.insert(name.into(), Arc::new(value));
    }

    /// Retrieves data attached with [`set_data`](Self::set_data), if it has type `T`.
    pub fn data<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.data.get(name).and_then(|value| value.downcast_ref::<T>())
    }

    /// The ordered list of native window kinds this description asks for.
    ///
    /// Backends pick the first kind they support; the list always ends with
    /// [`WindowKind::Normal`].
    pub fn kind_chain(&self) -> Vec<WindowKind> {
        if self.dialog {
            vec![WindowKind::Dialog, WindowKind::Normal]
        } else if self.is_static_popup() {
            vec![WindowKind::Tooltip, WindowKind::Normal]
        } else if self.popup {
            vec![
                WindowKind::Utility,
                WindowKind::PopupMenu,
                WindowKind::Combo,
                WindowKind::DropdownMenu,
                WindowKind::Normal,
            ]
        } else if self.tool_window {
            vec![WindowKind::Utility, WindowKind::Normal]
        } else {
            vec![WindowKind::Normal]
        }
    }

    /// A popup without caption that cannot be resized; it bypasses the window manager.
    pub fn is_static_popup(&self) -> bool {
        self.popup && !self.caption && !self.allow_resize
    }

    /// The frame decorations this description asks for.
    pub fn decorations(&self) -> Decorations {
        if self.fullscreen || self.is_static_popup() {
            return Decorations::NONE;
        }
        Decorations {
            border: !self.popup || self.allow_resize,
            resize_handles: self.allow_resize,
            title: self.caption,
            menu: self.caption && self.sysmenu,
            minimize: self.caption && self.minimize_button,
            maximize: self.caption && self.maximize_button && self.allow_resize,
            close: self.caption && self.sysmenu,
        }
    }
}

/// The semantic type of a native window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Normal,
    Dialog,
    Utility,
    Tooltip,
    PopupMenu,
    Combo,
    DropdownMenu,
}

/// Frame decorations a window asks its window manager for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decorations {
    pub border: bool,
    pub resize_handles: bool,
    pub title: bool,
    pub menu: bool,
    pub minimize: bool,
    pub maximize: bool,
    pub close: bool,
}

impl Decorations {
    pub const NONE: Decorations = Decorations {
        border: false,
        resize_handles: false,
        title: false,
        menu: false,
        minimize: false,
        maximize: false,
        close: false,
    };

    pub const ALL: Decorations = Decorations {
        border: true,
        resize_handles: true,
        title: true,
        menu: true,
        minimize: true,
        maximize: true,
        close: true,
    };

    /// Whether any frame is requested at all.
    pub fn any(&self) -> bool {
        *self != Decorations::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let desc = WindowDescription::new();
        assert_eq!(desc.swap_interval(), -1);
        assert_eq!(desc.flipping_buffers(), 2);
        assert!(desc.is_visible());
        assert!(!desc.allow_resize());
        assert_eq!(*desc.gl(), GlExtension::None);
        assert_eq!(desc.kind_chain(), vec![WindowKind::Normal]);
    }

    #[test]
    fn popup_kinds() {
        let mut desc = WindowDescription::new();
        desc.set_popup(true);
        desc.show_caption(false);
        assert!(desc.is_static_popup());
        assert_eq!(desc.kind_chain()[0], WindowKind::Tooltip);
        assert_eq!(desc.decorations(), Decorations::NONE);

        desc.show_caption(true);
        let chain = desc.kind_chain();
        assert_eq!(chain.first(), Some(&WindowKind::Utility));
        assert_eq!(chain.last(), Some(&WindowKind::Normal));
        assert_eq!(chain.len(), 5);
    }

    #[test]
    fn attached_data_is_typed() {
        let mut desc = WindowDescription::new();
        desc.set_data("frame-rate", 60u32);
        assert_eq!(desc.data::<u32>("frame-rate"), Some(&60));
        assert_eq!(desc.data::<i64>("frame-rate"), None);
        let copy = desc.clone();
        assert_eq!(copy.data::<u32>("frame-rate"), Some(&60));
    }

    #[test]
    fn centered_request() {
        let mut desc = WindowDescription::new();
        desc.set_centered_size(Size::new(300.0, 200.0), true);
        assert!(desc.is_centered());
        assert_eq!(desc.position().size(), Size::new(300.0, 200.0));
    }
}
