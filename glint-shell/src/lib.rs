// Copyright 2018 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Native display windows for the glint GL layer.
//!
//! `glint-shell` owns everything about a window that is not GL: the native window itself
//! (through a backend), its geometry and state as negotiated with the window manager, input
//! routing, the clipboard, and the event pump that ties windows on one display together.
//!
//! The entry points are [`MessageQueue`], which owns a display connection, and
//! [`PlatformWindow::create`], which creates a window on it from a [`WindowDescription`].
//! Applications observe a window through their [`WindowSite`] implementation.

#![warn(rustdoc::broken_intra_doc_links)]
#![allow(clippy::new_without_default)]
#![deny(clippy::trivially_copy_pass_by_ref)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use keyboard_types;
pub use kurbo;

#[macro_use]
mod util;

pub mod backend;
mod clipboard;
mod common_util;
mod description;
mod error;
mod input;
mod message_queue;
mod region;
mod scale;
mod site;
mod window;

pub use backend::headless::{HeadlessConfig, HeadlessDisplay, SimWindow};
pub use backend::{
    AlphaMask, DecorationTier, LayeredImage, NativeDisplay, NativeEvent, NativeWindow, RawDisplay,
    RawWindow, VisualInfo, WindowId, WmState,
};
pub use clipboard::{ClipboardContents, ClipboardFormat, ClipboardImage};
pub use common_util::Counter;
pub use description::{
    Decorations, GlCoreOptions, GlExtension, GlLegacyOptions, WindowDescription, WindowKind,
};
pub use error::Error;
pub use input::{
    InputContext, Joystick, JoystickEvent, Keyboard, KeyboardEvent, Mouse, MouseButton,
    MouseButtons, MouseEvent, MouseEventKind,
};
pub use message_queue::{MessageQueue, WaitResult, Waker};
pub use region::Region;
pub use scale::{Scalable, Scale};
pub use site::{NativeMessage, WindowSite};
pub use window::{PlatformWindow, CLICK_THROUGH_ALPHA, MIN_CLIENT_SIZE};
