// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Pixel ratio helpers.

use crate::kurbo::{Insets, Point, Rect, Size, Vec2};

/// Coordinate scaling between physical pixels and logical units.
///
/// Window geometry handed to a [`WindowDescription`] or to the geometry setters of a
/// [`PlatformWindow`] is expressed in logical units. The native window and the GL viewport
/// work in physical pixels; `Scale` converts between the two.
///
/// The glint backends use the same factor on both axes, but the type keeps them separate so
/// that a backend reporting a non-square pixel ratio can be supported later.
///
/// [`WindowDescription`]: crate::WindowDescription
/// [`PlatformWindow`]: crate::PlatformWindow
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Scale {
    x: f64,
    y: f64,
}

/// Translation of coordinates between logical units and pixels using a [`Scale`].
pub trait Scalable {
    /// Converts from logical units into pixels.
    fn to_px(&self, scale: Scale) -> Self;
    /// Converts from pixels into logical units.
    fn to_dp(&self, scale: Scale) -> Self;
}

impl Default for Scale {
    fn default() -> Scale {
        Scale { x: 1.0, y: 1.0 }
    }
}

impl Scale {
    /// Create a new `Scale` based on the specified axis factors.
    pub fn new(x: f64, y: f64) -> Scale {
        Scale { x, y }
    }

    /// A `Scale` with the same factor on both axes.
    pub fn uniform(ratio: f64) -> Scale {
        Scale { x: ratio, y: ratio }
    }

    /// Picks the pixel ratio closest to the given screen density.
    ///
    /// Densities are bucketed in steps of 16 PPI. Up to 96 PPI the ratio is 1:1. Between 96
    /// and 192 PPI the ratio moves in sixths. From 192 PPI up the ratio is rounded down to a
    /// whole number so that every logical unit maps onto an integer number of pixels.
    pub fn from_ppi(ppi: f64) -> Scale {
        let steps = (ppi / 16.0).round() as i64;
        let ratio = if steps <= 6 {
            1.0
        } else if steps >= 12 {
            (steps / 6) as f64
        } else {
            steps as f64 / 6.0
        };
        Scale::uniform(ratio)
    }

    /// Returns the x axis scale factor.
    #[inline]
    pub fn x(self) -> f64 {
        self.x
    }

    /// Returns the y axis scale factor.
    #[inline]
    pub fn y(self) -> f64 {
        self.y
    }
}

impl Scalable for Vec2 {
    #[inline]
    fn to_px(&self, scale: Scale) -> Vec2 {
        Vec2::new(self.x * scale.x, self.y * scale.y)
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Vec2 {
        Vec2::new(self.x / scale.x, self.y / scale.y)
    }
}

impl Scalable for Point {
    #[inline]
    fn to_px(&self, scale: Scale) -> Point {
        Point::new(self.x * scale.x, self.y * scale.y)
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Point {
        Point::new(self.x / scale.x, self.y / scale.y)
    }
}

impl Scalable for Size {
    #[inline]
    fn to_px(&self, scale: Scale) -> Size {
        Size::new(self.width * scale.x, self.height * scale.y)
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Size {
        Size::new(self.width / scale.x, self.height / scale.y)
    }
}

impl Scalable for Rect {
    /// Converts a `Rect` into pixels, using the x axis factor for `x0` and `x1`
    /// and the y axis factor for `y0` and `y1`.
    #[inline]
    fn to_px(&self, scale: Scale) -> Rect {
        Rect::new(
            self.x0 * scale.x,
            self.y0 * scale.y,
            self.x1 * scale.x,
            self.y1 * scale.y,
        )
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Rect {
        Rect::new(
            self.x0 / scale.x,
            self.y0 / scale.y,
            self.x1 / scale.x,
            self.y1 / scale.y,
        )
    }
}

impl Scalable for Insets {
    #[inline]
    fn to_px(&self, scale: Scale) -> Insets {
        Insets::new(
            self.x0 * scale.x,
            self.y0 * scale.y,
            self.x1 * scale.x,
            self.y1 * scale.y,
        )
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Insets {
        Insets::new(
            self.x0 / scale.x,
            self.y0 / scale.y,
            self.x1 / scale.x,
            self.y1 / scale.y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_from_density() {
        assert_eq!(Scale::from_ppi(72.0).x(), 1.0);
        assert_eq!(Scale::from_ppi(96.0).x(), 1.0);
        // 120 PPI rounds to 8 steps of 16.
        assert!((Scale::from_ppi(120.0).x() - 8.0 / 6.0).abs() < 1e-9);
        assert!((Scale::from_ppi(144.0).x() - 1.5).abs() < 1e-9);
        assert_eq!(Scale::from_ppi(192.0).x(), 2.0);
        // 17 steps: whole multiples only above 192 PPI.
        assert_eq!(Scale::from_ppi(270.0).x(), 2.0);
        assert_eq!(Scale::from_ppi(288.0).x(), 3.0);
    }

    #[test]
    fn round_trip_rect() {
        let scale = Scale::uniform(2.0);
        let rect = Rect::new(10.0, 20.0, 330.0, 260.0);
        assert_eq!(rect.to_px(scale), Rect::new(20.0, 40.0, 660.0, 520.0));
        assert_eq!(rect.to_px(scale).to_dp(scale), rect);
    }
}
