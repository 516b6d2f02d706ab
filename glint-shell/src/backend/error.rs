// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors raised by a backend.

use std::fmt;

#[derive(Debug, Clone)]
pub enum Error {
    /// The simulated display refused a request.
    Headless(String),
    #[cfg(all(feature = "x11", any(target_os = "linux", target_os = "freebsd")))]
    X11(super::x11::error::Error),
    #[cfg(target_os = "windows")]
    Windows(super::windows::error::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::Headless(msg) => write!(f, "Headless error: {msg}"),
            #[cfg(all(feature = "x11", any(target_os = "linux", target_os = "freebsd")))]
            Error::X11(err) => fmt::Display::fmt(err, f),
            #[cfg(target_os = "windows")]
            Error::Windows(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(all(feature = "x11", any(target_os = "linux", target_os = "freebsd")))]
impl From<super::x11::error::Error> for Error {
    fn from(err: super::x11::error::Error) -> Error {
        Error::X11(err)
    }
}

#[cfg(target_os = "windows")]
impl From<super::windows::error::Error> for Error {
    fn from(err: super::windows::error::Error) -> Error {
        Error::Windows(err)
    }
}
