// Copyright 2019 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Common helpers used by the backends.

use std::sync::atomic::{AtomicU64, Ordering};

/// An incrementing counter for generating unique ids.
///
/// This can be used safely from multiple threads.
pub struct Counter(AtomicU64);

impl Counter {
    /// Create a new counter.
    pub const fn new() -> Counter {
        Counter(AtomicU64::new(1))
    }

    /// Return the next value.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Best-effort lookup of an environment override, logging values that fail to parse.
pub(crate) fn env_override<T: std::str::FromStr>(name: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let value = std::env::var(name).ok()?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!("Ignoring {}={:?}: {}", name, value, err);
            None
        }
    }
}
