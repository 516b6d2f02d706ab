// Copyright 2022 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Thread affinity of the public types.

use glint::shell::PlatformWindow;
use glint::{DisplayContext, GlContextBinder, GlFunctionTable, SharedGcData};
use static_assertions::{assert_impl_all, assert_not_impl_any};

// Windows and contexts stay on the thread that made them.
assert_not_impl_any!(GlContextBinder: Send, Sync);
assert_not_impl_any!(PlatformWindow: Send, Sync);

assert_impl_all!(DisplayContext: Send, Sync, Clone);
assert_impl_all!(SharedGcData: Send, Sync);
assert_not_impl_any!(GlFunctionTable: Send, Sync);

#[test]
fn registries_cross_threads() {
    let ctx = DisplayContext::new();
    let target = glint::GlTarget::register(&ctx);
    let remote = ctx.clone();
    let name = std::thread::spawn(move || {
        remote
            .targets()
            .get_current_target()
            .map(|target| target.name().to_string())
    })
    .join()
    .unwrap();
    assert_eq!(name.as_deref(), Some(target.name()));
}
