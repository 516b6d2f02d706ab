// Copyright 2018 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! The callback interface a platform window reports through.

use std::any::Any;

use crate::kurbo::Rect;

/// A raw message the platform received for a window, before any translation.
///
/// Only the Win32 backend produces these; the X11 backend translates every event it knows
/// about itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeMessage {
    pub message: u32,
    pub wparam: usize,
    pub lparam: isize,
}

/// The receiver of window signals.
///
/// This is the boundary towards whatever owns the window (usually a UI layer). Every method
/// has an empty default, so implementors only override the signals they care about.
///
/// Geometry passed to these methods is in logical units.
#[allow(unused_variables)]
pub trait WindowSite {
    /// The client area changed size.
    fn resize(&self, width: f64, height: f64) {}

    /// Part of the client area was exposed and must be repainted.
    fn paint(&self, invalid: Rect) {}

    /// The user asked to close the window. The window stays open until it is dropped.
    fn close(&self) {}

    fn got_focus(&self) {}

    fn lost_focus(&self) {}

    fn minimized(&self) {}

    fn maximized(&self) {}

    fn restored(&self) {}

    /// The window origin moved.
    fn moved(&self) {}

    /// Called synchronously while the window geometry changes; `geometry` may be adjusted.
    fn window_resize(&self, geometry: &mut Rect) {}

    /// Gives the site the first look at a raw platform message. Returning `true` marks the
    /// message as handled and skips the default processing.
    fn window_message(&self, message: &NativeMessage) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}
