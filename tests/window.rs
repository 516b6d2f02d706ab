// Copyright 2022 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Window behaviour against the simulated window manager.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use glint::kurbo::{Insets, Point, Rect, Size};
use glint::shell::{
    DecorationTier, HeadlessConfig, HeadlessDisplay, MessageQueue, MouseEventKind, NativeEvent,
    PlatformWindow, WindowDescription, WindowSite,
};
use test_log::test;

#[derive(Default)]
struct Recorder {
    resizes: RefCell<Vec<(f64, f64)>>,
}

impl WindowSite for Recorder {
    fn resize(&self, width: f64, height: f64) {
        self.resizes.borrow_mut().push((width, height));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn open(config: HeadlessConfig) -> (HeadlessDisplay, MessageQueue) {
    let display = HeadlessDisplay::new(config);
    let queue = MessageQueue::new(Box::new(display.clone())).unwrap();
    (display, queue)
}

fn create(queue: &MessageQueue, description: &WindowDescription) -> Rc<PlatformWindow> {
    PlatformWindow::create(None, Rc::new(Recorder::default()), description, queue).unwrap()
}

fn client_area(rect: Rect) -> WindowDescription {
    let mut description = WindowDescription::new();
    description.set_position(rect, true);
    description
}

#[test]
fn fixed_size_window_pins_min_and_max() {
    let (_display, queue) = open(HeadlessConfig::default());
    let window = create(&queue, &client_area(Rect::new(0.0, 0.0, 320.0, 200.0)));
    queue.process();

    let size = Size::new(320.0, 200.0);
    assert_eq!(window.get_minimum_size(true), size);
    assert_eq!(window.get_maximum_size(true), Some(size));

    window.set_size(400.0, 300.0, true);
    queue.process();
    let size = Size::new(400.0, 300.0);
    assert_eq!(window.get_minimum_size(true), size);
    assert_eq!(window.get_maximum_size(true), Some(size));
}

#[test]
fn resizable_window_has_no_maximum() {
    let (_display, queue) = open(HeadlessConfig::default());
    let mut description = client_area(Rect::new(0.0, 0.0, 320.0, 200.0));
    description.set_allow_resize(true);
    let window = create(&queue, &description);
    assert_eq!(window.get_maximum_size(true), None);
}

#[test]
fn client_area_description_sets_viewport_and_geometry() {
    let (_display, queue) = open(HeadlessConfig::default());
    let window = create(&queue, &client_area(Rect::new(100.0, 100.0, 740.0, 580.0)));
    queue.process();

    assert!(window.is_visible());
    assert_eq!(window.get_viewport(), Rect::new(0.0, 0.0, 640.0, 480.0));
    assert_eq!(window.frame_extents(), Insets::new(4.0, 24.0, 4.0, 4.0));
    assert_eq!(window.get_geometry(), Rect::new(96.0, 76.0, 744.0, 584.0));
}

#[test]
fn requests_before_map_are_replayed() {
    let (display, queue) = open(HeadlessConfig {
        place_on_map: Some(Point::new(700.0, 700.0)),
        ..HeadlessConfig::default()
    });
    let mut description = client_area(Rect::new(0.0, 0.0, 100.0, 100.0));
    description.set_visible(false);
    let window = create(&queue, &description);

    window.set_position(Rect::new(50.0, 60.0, 250.0, 260.0), true);
    window.set_size(300.0, 200.0, true);
    window.show(true);
    queue.process();
    queue.process();

    let expected = Rect::new(50.0, 60.0, 350.0, 260.0);
    assert_eq!(window.client_rect_px(), expected);
    assert_eq!(display.window(window.id()).map(|w| w.client), Some(expected));
}

#[test]
fn outer_request_before_map_uses_the_real_frame() {
    let (_display, queue) = open(HeadlessConfig::default());
    let mut description = client_area(Rect::new(0.0, 0.0, 100.0, 100.0));
    description.set_visible(false);
    let window = create(&queue, &description);

    window.set_position(Rect::new(10.0, 10.0, 210.0, 210.0), false);
    window.show(true);
    queue.process();
    queue.process();

    assert_eq!(window.get_geometry(), Rect::new(10.0, 10.0, 210.0, 210.0));
    assert_eq!(window.client_rect_px(), Rect::new(14.0, 34.0, 206.0, 206.0));
}

#[test]
fn unreported_frame_falls_back_to_the_border() {
    let (_display, queue) = open(HeadlessConfig {
        report_frame_extents: false,
        ..HeadlessConfig::default()
    });
    let window = create(&queue, &client_area(Rect::new(0.0, 0.0, 100.0, 100.0)));
    queue.process();
    assert_eq!(window.frame_extents(), Insets::ZERO);
}

#[test]
fn decorations_fall_back_to_motif() {
    let (display, queue) = open(HeadlessConfig {
        accepted_tiers: vec![DecorationTier::Motif, DecorationTier::Legacy],
        ..HeadlessConfig::default()
    });
    let window = create(&queue, &WindowDescription::new());
    assert_eq!(window.decoration_tier(), Some(DecorationTier::Motif));
    let applied = display.window(window.id()).and_then(|w| w.decorations);
    assert_eq!(applied.map(|(tier, _)| tier), Some(DecorationTier::Motif));
}

#[test]
fn window_survives_a_manager_without_decoration_hints() {
    let (display, queue) = open(HeadlessConfig {
        accepted_tiers: Vec::new(),
        ..HeadlessConfig::default()
    });
    let window = create(&queue, &WindowDescription::new());
    queue.process();
    assert_eq!(window.decoration_tier(), None);
    assert!(display.window(window.id()).map_or(false, |w| w.mapped));
}

#[test]
fn pixel_ratio_follows_density() {
    let (_display, queue) = open(HeadlessConfig {
        ppi: 192.0,
        ..HeadlessConfig::default()
    });
    let window = create(&queue, &client_area(Rect::new(0.0, 0.0, 100.0, 50.0)));
    queue.process();
    assert_eq!(window.pixel_ratio(), 2.0);
    assert_eq!(window.client_rect_px().size(), Size::new(200.0, 100.0));
    assert_eq!(window.get_viewport(), Rect::new(0.0, 0.0, 100.0, 50.0));
}

#[test]
fn mouse_capture_routes_and_translates() {
    let (display, queue) = open(HeadlessConfig::default());
    let a = create(&queue, &client_area(Rect::new(0.0, 0.0, 200.0, 200.0)));
    let b = create(&queue, &client_area(Rect::new(300.0, 0.0, 500.0, 200.0)));
    queue.process();

    a.capture_mouse(true);
    assert!(display.window(a.id()).map_or(false, |w| w.pointer_grabbed));
    // Only the holder can release.
    b.capture_mouse(false);
    assert_eq!(queue.mouse_capture().map(|w| w.id()), Some(a.id()));

    display.inject(
        b.id(),
        NativeEvent::Motion {
            pos: Point::new(10.0, 10.0),
            mods: Default::default(),
        },
    );
    queue.process();
    let event = a.input().mouse().poll();
    assert_eq!(event.as_ref().map(|e| e.kind), Some(MouseEventKind::Move));
    assert_eq!(event.map(|e| e.pos), Some(Point::new(310.0, 10.0)));
    assert!(b.input().mouse().poll().is_none());

    b.capture_mouse(true);
    assert!(!display.window(a.id()).map_or(true, |w| w.pointer_grabbed));
    b.capture_mouse(false);
    assert!(queue.mouse_capture().is_none());
}

#[test]
fn site_hears_of_resizes() {
    let (_display, queue) = open(HeadlessConfig::default());
    let site = Rc::new(Recorder::default());
    let mut description = client_area(Rect::new(0.0, 0.0, 100.0, 100.0));
    description.set_allow_resize(true);
    let window = PlatformWindow::create(None, site.clone(), &description, &queue).unwrap();
    queue.process();

    window.set_size(120.0, 80.0, true);
    queue.process();
    assert_eq!(site.resizes.borrow().last(), Some(&(120.0, 80.0)));
}
