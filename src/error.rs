// Copyright 2019 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors at the GL binding level.

use std::fmt;
use std::sync::Arc;

/// An error that can occur while creating or driving a GL context.
#[derive(Debug, Clone)]
pub enum Error {
    /// No context of the required version could be created.
    UnsupportedVersion { major: i32, minor: i32 },
    /// No pixel format matches the description.
    NoPixelFormat,
    /// A required GL or window system entry point is missing.
    MissingEntryPoint(&'static str),
    /// The window system refused to create a context.
    ContextCreation(String),
    /// The window could not be created or driven.
    Shell(glint_shell::Error),
    /// Other miscellaneous error.
    Other(Arc<anyhow::Error>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::UnsupportedVersion { major, minor } => write!(
                f,
                "This application requires OpenGL {major}.{minor} or above. \
                 Try updating your drivers, or upgrade to a newer graphics card."
            ),
            Error::NoPixelFormat => write!(f, "No pixel format matches the window description"),
            Error::MissingEntryPoint(name) => write!(f, "Cannot find the {name} function"),
            Error::ContextCreation(msg) => write!(f, "Context creation failed: {msg}"),
            Error::Shell(err) => fmt::Display::fmt(err, f),
            Error::Other(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<glint_shell::Error> for Error {
    fn from(src: glint_shell::Error) -> Error {
        Error::Shell(src)
    }
}

impl From<anyhow::Error> for Error {
    fn from(src: anyhow::Error) -> Error {
        Error::Other(Arc::new(src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_version_message() {
        let err = Error::UnsupportedVersion { major: 4, minor: 3 };
        assert_eq!(
            err.to_string(),
            "This application requires OpenGL 4.3 or above. Try updating your drivers, \
             or upgrade to a newer graphics card."
        );
    }
}
