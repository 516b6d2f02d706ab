// Copyright 2019 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors at the window shell level.

use std::fmt;
use std::sync::Arc;

use crate::backend::error as backend;

/// Shell errors.
#[derive(Debug, Clone)]
pub enum Error {
    /// No connection to a native display could be opened.
    NoDisplay,
    /// The native window could not be allocated.
    WindowCreation(String),
    /// The window has already been destroyed.
    WindowDropped,
    /// Platform specific error.
    Platform(backend::Error),
    /// Other miscellaneous error.
    Other(Arc<anyhow::Error>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::NoDisplay => write!(f, "Could not open a connection to the display."),
            Error::WindowCreation(reason) => write!(f, "Unable to create window: {reason}"),
            Error::WindowDropped => write!(f, "The window has already been destroyed."),
            Error::Platform(err) => fmt::Display::fmt(err, f),
            Error::Other(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(src: anyhow::Error) -> Error {
        Error::Other(Arc::new(src))
    }
}

impl From<backend::Error> for Error {
    fn from(src: backend::Error) -> Error {
        Error::Platform(src)
    }
}
