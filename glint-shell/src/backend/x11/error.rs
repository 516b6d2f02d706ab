// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! X11 errors.

use std::fmt;
use std::sync::Arc;

use x11rb::errors::{ConnectError, ReplyError};

#[derive(Debug, Clone)]
pub enum Error {
    XError(Arc<ReplyError>),
    /// The XCB connection behind the Xlib display could not be used.
    Connect(Arc<ConnectError>),
    /// libX11 or one of its entry points is missing.
    Xlib(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::XError(e) => e.fmt(f),
            Error::Connect(e) => write!(f, "X11 connection failed: {e}"),
            Error::Xlib(msg) => write!(f, "Xlib unavailable: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<x11rb::x11_utils::X11Error> for Error {
    fn from(err: x11rb::x11_utils::X11Error) -> Error {
        Error::XError(Arc::new(ReplyError::X11Error(err)))
    }
}

impl From<ReplyError> for Error {
    fn from(err: ReplyError) -> Error {
        Error::XError(Arc::new(err))
    }
}

impl From<ConnectError> for Error {
    fn from(err: ConnectError) -> Error {
        Error::Connect(Arc::new(err))
    }
}

impl From<Error> for crate::error::Error {
    fn from(err: Error) -> crate::error::Error {
        crate::error::Error::Platform(err.into())
    }
}
