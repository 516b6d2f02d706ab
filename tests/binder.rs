// Copyright 2022 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Context negotiation and presentation with the simulated driver.

use std::any::Any;
use std::rc::Rc;
use std::sync::Arc;

use glint::driver::{GlDriver, NativeGlContext, PixelFormat, PixelRect};
use glint::kurbo::{Point, Rect};
use glint::shell::{
    GlCoreOptions, GlExtension, HeadlessConfig, HeadlessDisplay, MessageQueue, MouseButton,
    NativeEvent, VisualInfo, WindowDescription, WindowSite,
};
use glint::{
    BinderState, DisplayContext, Entry, Error, GlContextBinder, GlProfile,
    GraphicContextProvider, HeadlessContext, HeadlessGl, HeadlessGlConfig,
};
use test_log::test;

struct Site;

impl WindowSite for Site {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Fixture {
    display: HeadlessDisplay,
    queue: MessageQueue,
    ctx: DisplayContext,
    driver: Rc<HeadlessGl>,
}

impl Fixture {
    fn new(gl: HeadlessGlConfig) -> Fixture {
        Fixture::with_display(HeadlessConfig::default(), gl)
    }

    fn with_display(config: HeadlessConfig, gl: HeadlessGlConfig) -> Fixture {
        let display = HeadlessDisplay::new(config);
        let queue = MessageQueue::new(Box::new(display.clone())).unwrap();
        Fixture {
            display,
            queue,
            ctx: DisplayContext::new(),
            driver: Rc::new(HeadlessGl::new(gl)),
        }
    }

    fn bind(&self, description: &WindowDescription) -> Result<GlContextBinder, Error> {
        let driver: Rc<dyn GlDriver> = self.driver.clone();
        GlContextBinder::create_with_driver(
            Rc::new(Site),
            description,
            &self.ctx,
            &self.queue,
            driver,
        )
    }
}

fn headless(binder: &GlContextBinder) -> &HeadlessContext {
    binder
        .context()
        .as_any()
        .downcast_ref::<HeadlessContext>()
        .unwrap()
}

fn requesting(options: GlCoreOptions) -> WindowDescription {
    let mut description = WindowDescription::new();
    description.set_position(Rect::new(0.0, 0.0, 100.0, 100.0), true);
    description.set_gl(GlExtension::Core(options));
    description
}

fn strict(major: i32, minor: i32) -> GlCoreOptions {
    GlCoreOptions {
        allow_lower_versions: false,
        ..GlCoreOptions::version(major, minor)
    }
}

#[test]
fn falls_back_to_the_newest_creatable_version() {
    let fixture = Fixture::new(HeadlessGlConfig {
        attrib_versions: vec![(3, 3)],
        ..HeadlessGlConfig::default()
    });
    let binder = fixture
        .bind(&requesting(GlCoreOptions::version(4, 3)))
        .unwrap();
    assert_eq!(binder.get_opengl_version(), (3, 3));
    assert_eq!(binder.context().profile(), GlProfile::Core);
    assert!(binder.use_gl3());
    assert_eq!(binder.state(), BinderState::Bound);
    assert!(binder.is_current());
}

#[test]
fn falls_back_to_a_legacy_context() {
    let fixture = Fixture::new(HeadlessGlConfig {
        attrib_versions: Vec::new(),
        ..HeadlessGlConfig::default()
    });
    let binder = fixture
        .bind(&requesting(GlCoreOptions::version(3, 2)))
        .unwrap();
    assert_eq!(binder.get_opengl_version(), (2, 1));
    assert_eq!(binder.context().profile(), GlProfile::Legacy);
    assert!(!binder.use_gl3());
}

#[test]
fn strict_request_reports_the_missing_version() {
    let fixture = Fixture::new(HeadlessGlConfig {
        attrib_versions: vec![(3, 3)],
        ..HeadlessGlConfig::default()
    });
    let err = fixture.bind(&requesting(strict(4, 3))).err().unwrap();
    assert!(matches!(
        err,
        Error::UnsupportedVersion { major: 4, minor: 3 }
    ));
    assert_eq!(
        err.to_string(),
        "This application requires OpenGL 4.3 or above. Try updating your drivers, or \
         upgrade to a newer graphics card."
    );
    assert!(fixture.ctx.shared_gc().is_empty());
}

#[test]
fn strict_request_without_attribute_path() {
    let fixture = Fixture::new(HeadlessGlConfig {
        extensions: String::new(),
        legacy_requires_lower_versions: true,
        ..HeadlessGlConfig::default()
    });
    let err = fixture.bind(&requesting(strict(3, 0))).err().unwrap();
    assert!(matches!(
        err,
        Error::UnsupportedVersion { major: 3, minor: 0 }
    ));

    // The same driver still hands out legacy contexts to lenient requests.
    let binder = fixture
        .bind(&requesting(GlCoreOptions::version(3, 0)))
        .unwrap();
    assert_eq!(binder.context().profile(), GlProfile::Legacy);
}

#[test]
fn windows_share_one_namespace() {
    let fixture = Fixture::new(HeadlessGlConfig::default());
    let first = fixture
        .bind(&requesting(GlCoreOptions::version(3, 3)))
        .unwrap();
    let second = fixture
        .bind(&requesting(GlCoreOptions::version(3, 3)))
        .unwrap();

    let texture = headless(&first).create_texture();
    assert!(headless(&second).is_texture(texture));
    assert_eq!(fixture.driver.namespace_count(), 1);

    let shared_gc = fixture.ctx.shared_gc();
    assert_eq!(shared_gc.len(), 2);
    let provider = shared_gc.get_provider().first().unwrap();
    assert!(Arc::ptr_eq(&provider, first.provider()));
    drop(provider);

    drop(first);
    assert_eq!(shared_gc.len(), 1);
    let provider = shared_gc.get_provider().first().unwrap();
    assert!(Arc::ptr_eq(&provider, second.provider()));
    assert!(headless(&second).is_texture(texture));
}

#[test]
fn opting_out_of_sharing_keeps_namespaces_apart() {
    let fixture = Fixture::new(HeadlessGlConfig::default());
    let first = fixture
        .bind(&requesting(GlCoreOptions::version(3, 3)))
        .unwrap();
    let second = fixture
        .bind(&requesting(GlCoreOptions {
            share_namespace: false,
            ..GlCoreOptions::version(3, 3)
        }))
        .unwrap();
    let texture = headless(&first).create_texture();
    assert!(!headless(&second).is_texture(texture));
    assert_eq!(fixture.driver.namespace_count(), 2);
}

#[test]
fn swap_interval_from_description_and_flip() {
    let fixture = Fixture::new(HeadlessGlConfig::default());
    let mut description = requesting(GlCoreOptions::version(3, 3));
    description.set_swap_interval(1);
    let binder = fixture.bind(&description).unwrap();
    let context = headless(&binder);
    assert_eq!(context.swap_entry(), Some(Entry::SwapIntervalExt));
    assert_eq!(context.swap_interval(), Some(1));

    binder.flip(-1).unwrap();
    assert_eq!(context.swap_interval(), Some(1));
    assert_eq!(binder.swap_interval(), 1);

    binder.flip(0).unwrap();
    assert_eq!(context.swap_interval(), Some(0));
    assert_eq!(binder.swap_interval(), 0);
    assert_eq!(context.swap_count(), 2);
}

#[test]
fn swap_control_falls_back_to_sgi() {
    let fixture = Fixture::new(HeadlessGlConfig {
        extensions: "GLX_ARB_create_context GLX_SGI_swap_control".into(),
        ..HeadlessGlConfig::default()
    });
    let binder = fixture
        .bind(&requesting(GlCoreOptions::version(3, 3)))
        .unwrap();
    let context = headless(&binder);
    assert_eq!(context.swap_entry(), Some(Entry::SwapIntervalSgi));
    assert_eq!(context.swap_interval(), None);
    binder.flip(1).unwrap();
    assert_eq!(context.swap_interval(), Some(1));
}

#[test]
fn update_copies_the_back_buffer() {
    let fixture = Fixture::new(HeadlessGlConfig::default());
    let binder = fixture
        .bind(&requesting(GlCoreOptions::version(3, 3)))
        .unwrap();
    assert!(binder.is_double_buffered());
    let context = headless(&binder);
    let red = [0, 0, 255, 255];
    context.fill_rect(
        PixelRect {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
        },
        red,
    );
    assert_eq!(binder.get_pixel(Point::new(5.0, 5.0)), Some([0; 4]));

    binder.update(Rect::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(binder.get_pixel(Point::new(5.0, 5.0)), Some(red));
    assert_eq!(binder.get_pixel(Point::new(50.0, 50.0)), Some([0; 4]));
    assert_eq!(binder.get_pixel(Point::new(100.0, 5.0)), None);
    assert_eq!(context.swap_count(), 0);
}

#[test]
fn drawable_follows_the_window() {
    let fixture = Fixture::new(HeadlessGlConfig::default());
    let mut description = requesting(GlCoreOptions::version(3, 3));
    description.set_allow_resize(true);
    let binder = fixture.bind(&description).unwrap();
    fixture.queue.process();
    assert_eq!(headless(&binder).size(), (100, 100));

    binder.window().set_size(200.0, 150.0, true);
    fixture.queue.process();
    assert_eq!(headless(&binder).size(), (200, 150));
    assert_eq!(binder.get_viewport(), Rect::new(0.0, 0.0, 200.0, 150.0));
}

#[test]
fn layered_window_is_read_back() {
    let fixture = Fixture::new(HeadlessGlConfig::default());
    let mut description = requesting(GlCoreOptions::version(3, 3));
    description.set_layered(true);
    let binder = fixture.bind(&description).unwrap();
    fixture.queue.process();
    assert!(binder.is_layered_readback());
    assert!(binder.pixel_format().has_full_alpha());

    // Opaque top left quadrant; GL rows count from the bottom.
    headless(&binder).fill_rect(
        PixelRect {
            x: 0,
            y: 50,
            width: 50,
            height: 50,
        },
        [0, 0, 255, 255],
    );
    binder.flip(-1).unwrap();
    let id = binder.window().id();
    assert_eq!(fixture.display.window(id).map(|w| w.layered_frames), Some(1));

    let click = |pos| NativeEvent::Button {
        pos,
        button: MouseButton::Left,
        down: true,
        mods: Default::default(),
    };
    fixture.display.inject(id, click(Point::new(10.0, 10.0)));
    fixture.queue.process();
    assert!(fixture.display.window(id).map_or(false, |w| !w.lowered));
    assert!(binder.window().input().mouse().poll().is_some());

    fixture.display.inject(id, click(Point::new(80.0, 80.0)));
    fixture.queue.process();
    assert!(fixture.display.window(id).map_or(false, |w| w.lowered));
    assert!(binder.window().input().mouse().poll().is_none());
}

#[test]
fn composited_layered_window_uses_the_hit_region() {
    let fixture = Fixture::with_display(
        HeadlessConfig {
            composition: true,
            ..HeadlessConfig::default()
        },
        HeadlessGlConfig::default(),
    );
    let mut description = requesting(GlCoreOptions::version(3, 3));
    description.set_layered(true);
    let binder = fixture.bind(&description).unwrap();
    assert!(!binder.is_layered_readback());

    headless(&binder).fill_rect(
        PixelRect {
            x: 0,
            y: 50,
            width: 50,
            height: 50,
        },
        [0, 0, 255, 255],
    );
    binder.flip(-1).unwrap();
    let window = fixture.display.window(binder.window().id()).unwrap();
    assert_eq!(window.layered_frames, 0);
    assert_eq!(window.hit_region, Some(Rect::new(0.0, 0.0, 50.0, 50.0)));
}

#[test]
fn layered_window_needs_an_alpha_format() {
    let fixture = Fixture::new(HeadlessGlConfig {
        formats: HeadlessGlConfig::default()
            .formats
            .into_iter()
            .filter(|format| !format.has_full_alpha())
            .collect(),
        ..HeadlessGlConfig::default()
    });
    let mut description = requesting(GlCoreOptions::version(3, 3));
    description.set_layered(true);
    assert!(matches!(fixture.bind(&description), Err(Error::NoPixelFormat)));
}

#[test]
fn layered_window_skips_visuals_without_alpha() {
    let format = HeadlessGlConfig::default().formats[1];
    let with_visual = |id, depth, alpha_mask| PixelFormat {
        id,
        visual: Some(VisualInfo {
            visual_id: 0x20 + id as u32,
            depth,
            alpha_mask,
        }),
        ..format
    };
    let fixture = Fixture::new(HeadlessGlConfig {
        formats: vec![with_visual(1, 24, 0), with_visual(2, 32, 0xff)],
        ..HeadlessGlConfig::default()
    });
    let mut description = requesting(GlCoreOptions::version(3, 3));
    description.set_layered(true);
    let binder = fixture.bind(&description).unwrap();
    assert_eq!(binder.pixel_format().id, 2);
    assert_eq!(binder.pixel_format().alpha_bits, 8);
}

#[test]
fn multisampling_rounds_up_to_an_available_count() {
    let fixture = Fixture::new(HeadlessGlConfig::default());
    let mut description = requesting(GlCoreOptions::version(3, 3));
    description.set_multisampling(2);
    let binder = fixture.bind(&description).unwrap();
    assert_eq!(binder.pixel_format().samples, 4);
    assert_eq!(binder.pixel_format().sample_buffers, 1);
}

#[test]
fn dropping_the_binder_unregisters_it() {
    let fixture = Fixture::new(HeadlessGlConfig::default());
    let binder = fixture
        .bind(&requesting(GlCoreOptions::version(3, 3)))
        .unwrap();
    let id = binder.window().id();
    assert_eq!(fixture.ctx.shared_gc().len(), 1);
    assert_eq!(
        binder.provider().shared_context_handle().map(|h| h.profile),
        Some(GlProfile::Core)
    );

    drop(binder);
    assert!(fixture.ctx.shared_gc().is_empty());
    assert_eq!(fixture.driver.namespace_count(), 0);
    assert!(fixture.display.window(id).map_or(true, |w| w.destroyed));
}
