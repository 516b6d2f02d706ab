// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! X11 backend.
//!
//! The connection is opened through Xlib so that GLX can share it, and then driven through
//! x11rb on top of the underlying XCB connection. XCB owns the event queue.

// # Notes on error handling in X11
//
// Requests are sent asynchronously and their errors arrive through the event queue, where
// they are logged. Window creation checks its requests synchronously so that a failure can
// be reported to the caller. An error on the request means the connection is broken and
// needs no extra context; an error on the reply gets context naming the request.

#[macro_use]
mod util;

pub(crate) mod display;
pub(crate) mod error;
mod selection;
pub(crate) mod window;
mod xlib;
