// Copyright 2021 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Environment overrides.
//!
//! `GLINT_GL_VERSION=major.minor` replaces the requested context version and
//! `GLINT_DISABLE_COMPOSITION` forces layered windows through pixel readback.

use tracing::warn;

const GL_VERSION_VAR: &str = "GLINT_GL_VERSION";
const DISABLE_COMPOSITION_VAR: &str = "GLINT_DISABLE_COMPOSITION";

/// The context version requested through the environment, if any.
pub(crate) fn gl_version_override() -> Option<(i32, i32)> {
    let value = std::env::var(GL_VERSION_VAR).ok()?;
    let version = parse_version(&value);
    if version.is_none() {
        warn!("Ignoring {}={:?}: expected major.minor", GL_VERSION_VAR, value);
    }
    version
}

/// Whether composition is ignored for layered windows.
pub(crate) fn composition_disabled() -> bool {
    std::env::var(DISABLE_COMPOSITION_VAR).map_or(false, |value| is_truthy(&value))
}

fn parse_version(value: &str) -> Option<(i32, i32)> {
    let (major, minor) = value.trim().split_once('.')?;
    let major = major.parse().ok()?;
    let minor = minor.parse().ok()?;
    (major > 0 && minor >= 0).then_some((major, minor))
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.trim(), "" | "0" | "false" | "no")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions() {
        assert_eq!(parse_version("4.3"), Some((4, 3)));
        assert_eq!(parse_version(" 3.0\n"), Some((3, 0)));
        assert_eq!(parse_version("4"), None);
        assert_eq!(parse_version("0.9"), None);
        assert_eq!(parse_version("x.1"), None);
    }

    #[test]
    fn flags() {
        assert!(is_truthy("1"));
        assert!(is_truthy("yes"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }
}
