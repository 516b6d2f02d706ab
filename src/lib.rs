// Copyright 2018 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! OpenGL contexts for native display windows.
//!
//! A [`GlContextBinder`] creates a [`PlatformWindow`](glint_shell::PlatformWindow) together
//! with a GL context for it. The binder picks a pixel format, negotiates the context version
//! with the driver, joins the object namespace of earlier contexts and presents frames,
//! including the readback path for layered windows.
//!
//! Binders cooperate through the registries in a [`DisplayContext`], which the application
//! creates once and hands to every binder.
//!
//! ```no_run
//! use std::any::Any;
//! use std::rc::Rc;
//!
//! use glint::shell::{GlCoreOptions, GlExtension, MessageQueue, WindowDescription, WindowSite};
//! use glint::{DisplayContext, GlContextBinder};
//!
//! struct Site;
//!
//! impl WindowSite for Site {
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! let queue = MessageQueue::open()?;
//! let ctx = DisplayContext::new();
//! let mut description = WindowDescription::new();
//! description.set_title("glint");
//! description.set_gl(GlExtension::Core(GlCoreOptions::version(3, 3)));
//! let binder = GlContextBinder::create(Rc::new(Site), &description, &ctx, &queue)?;
//! binder.flip(1)?;
//! # Ok::<(), glint::Error>(())
//! ```

#![warn(rustdoc::broken_intra_doc_links)]
#![allow(clippy::new_without_default)]
#![deny(clippy::trivially_copy_pass_by_ref)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use glint_shell as shell;
pub use glint_shell::kurbo;

mod binder;
mod config;
mod context;
pub mod driver;
mod error;
mod functions;

pub use binder::{
    select_pixel_format, use_gl3, version_candidates, BinderState, GlContextBinder,
    KNOWN_VERSIONS,
};
pub use context::{
    ContextHandle, DisplayContext, DisplayTargetProvider, DisplayTargets, GlProfile, GlTarget,
    GraphicContextProvider, ProviderGuard, SharedGcData,
};
pub use driver::headless::{HeadlessContext, HeadlessGl, HeadlessGlConfig};
pub use error::Error;
pub use functions::{has_extension, Entry, GlApi, GlFunctionTable};
