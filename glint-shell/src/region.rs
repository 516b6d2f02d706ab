// Copyright 2019 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Coalescing of pending repaint requests.

use crate::kurbo::Rect;

/// Number of distinct pending rectangles kept before a region collapses to its viewport.
pub const MAX_PENDING_RECTS: usize = 16;

/// A list of rectangles that still need to be repainted.
///
/// Rectangles are coalesced on insertion: a rectangle that lies inside one already pending is
/// dropped, and a pending rectangle that lies inside the new one is replaced by it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Region {
    rects: Vec<Rect>,
}

fn contains(outer: &Rect, inner: &Rect) -> bool {
    outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && outer.x1 >= inner.x1 && outer.y1 >= inner.y1
}

impl Region {
    /// The empty region.
    pub const EMPTY: Region = Region { rects: Vec::new() };

    /// Returns the collection of rectangles making up this region.
    #[inline]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Adds a rectangle to this region, coalescing it with the pending ones.
    ///
    /// Empty rectangles are ignored.
    pub fn add_rect(&mut self, rect: Rect) {
        let rect = rect.abs();
        if rect.area() <= 0.0 {
            return;
        }
        if self.rects.iter().any(|pending| contains(pending, &rect)) {
            return;
        }
        match self.rects.iter().position(|pending| contains(&rect, pending)) {
            Some(first) => {
                self.rects[first] = rect;
                let mut index = 0;
                self.rects.retain(|pending| {
                    let keep = index == first || !contains(&rect, pending);
                    index += 1;
                    keep
                });
            }
            None => self.rects.push(rect),
        }
    }

    /// Adds a rectangle, falling back to the whole `viewport` once too many distinct
    /// rectangles are pending.
    pub fn add_rect_bounded(&mut self, rect: Rect, viewport: Rect) {
        self.add_rect(rect);
        if self.rects.len() > MAX_PENDING_RECTS {
            self.set_rect(viewport);
        }
    }

    /// Replaces this region with a single rectangle.
    pub fn set_rect(&mut self, rect: Rect) {
        self.clear();
        self.add_rect(rect);
    }

    /// Sets this region to the empty region.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Returns a rectangle containing this region.
    pub fn bounding_box(&self) -> Rect {
        match self.rects.split_first() {
            None => Rect::ZERO,
            Some((first, rest)) => rest.iter().fold(*first, |r, s| r.union(*s)),
        }
    }

    /// Returns `true` if this region is empty.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Clips every pending rectangle to `rect`, dropping those that fall outside.
    pub fn intersect_with(&mut self, rect: Rect) {
        for r in &mut self.rects {
            *r = r.intersect(rect);
        }
        self.rects.retain(|r| r.area() > 0.0)
    }

    /// Removes and returns the pending rectangles.
    pub fn take(&mut self) -> Vec<Rect> {
        std::mem::take(&mut self.rects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contained_rect_is_dropped() {
        let mut region = Region::EMPTY;
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        region.add_rect(outer);
        region.add_rect(Rect::new(10.0, 10.0, 20.0, 20.0));
        assert_eq!(region.rects(), &[outer]);
    }

    #[test]
    fn containing_rect_replaces() {
        let mut region = Region::EMPTY;
        let inner = Rect::new(10.0, 10.0, 20.0, 20.0);
        let other = Rect::new(200.0, 200.0, 220.0, 220.0);
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        region.add_rect(inner);
        region.add_rect(other);
        region.add_rect(outer);
        assert_eq!(region.rects(), &[outer, other]);
    }

    #[test]
    fn containing_rect_swallows_several() {
        let mut region = Region::EMPTY;
        region.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        region.add_rect(Rect::new(300.0, 0.0, 310.0, 10.0));
        region.add_rect(Rect::new(20.0, 20.0, 30.0, 30.0));
        let outer = Rect::new(0.0, 0.0, 50.0, 50.0);
        region.add_rect(outer);
        assert_eq!(region.rects().len(), 2);
        assert_eq!(region.rects()[0], outer);
    }

    #[test]
    fn overflow_collapses_to_viewport() {
        let viewport = Rect::new(0.0, 0.0, 640.0, 480.0);
        let mut region = Region::EMPTY;
        for i in 0..=MAX_PENDING_RECTS {
            let x = i as f64 * 20.0;
            region.add_rect_bounded(Rect::new(x, 0.0, x + 10.0, 10.0), viewport);
        }
        assert_eq!(region.rects(), &[viewport]);
    }

    #[test]
    fn empty_rects_are_ignored() {
        let mut region = Region::EMPTY;
        region.add_rect(Rect::new(5.0, 5.0, 5.0, 50.0));
        assert!(region.is_empty());
        assert_eq!(region.bounding_box(), Rect::ZERO);
    }
}
