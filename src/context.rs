// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Process-wide GL bookkeeping, passed around explicitly.
//!
//! A [`DisplayContext`] holds the two registries every binder on a display cooperates
//! through: the providers a new context may share its object namespace with, and the
//! current display target.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::debug;

use crate::functions::GlApi;

/// Which kind of context a handle refers to. Only contexts of the same profile share.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GlProfile {
    Core,
    Legacy,
}

/// An opaque reference to a native context another context can share with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextHandle {
    pub api: GlApi,
    pub profile: GlProfile,
    /// The display connection the context was created on.
    pub display: usize,
    pub raw: usize,
}

/// Something that owns a context and can offer it for sharing.
pub trait GraphicContextProvider: Send + Sync {
    /// `None` while the provider has no context to share.
    fn shared_context_handle(&self) -> Option<ContextHandle>;
}

/// Something that can be made the current render target.
pub trait DisplayTargetProvider: Send + Sync {
    fn name(&self) -> &str;
}

/// The registries of one application, cheap to clone and safe to send between threads.
#[derive(Clone, Default)]
pub struct DisplayContext(Arc<Inner>);

#[derive(Default)]
struct Inner {
    shared_gc: SharedGcData,
    targets: DisplayTargets,
}

impl DisplayContext {
    pub fn new() -> DisplayContext {
        DisplayContext::default()
    }

    pub fn shared_gc(&self) -> &SharedGcData {
        &self.0.shared_gc
    }

    pub fn targets(&self) -> &DisplayTargets {
        &self.0.targets
    }
}

impl std::fmt::Debug for DisplayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DisplayContext")
            .field("providers", &self.shared_gc().len())
            .finish()
    }
}

/// Contexts whose object namespace new contexts may join.
#[derive(Default)]
pub struct SharedGcData {
    providers: Mutex<Vec<Weak<dyn GraphicContextProvider>>>,
}

impl SharedGcData {
    pub fn add_provider(&self, provider: &Arc<dyn GraphicContextProvider>) {
        let mut providers = lock(&self.providers);
        providers.retain(|p| p.strong_count() > 0);
        providers.push(Arc::downgrade(provider));
    }

    pub fn remove_provider(&self, provider: &Arc<dyn GraphicContextProvider>) {
        let target = Arc::as_ptr(provider) as *const ();
        lock(&self.providers)
            .retain(|p| p.strong_count() > 0 && p.as_ptr() as *const () != target);
    }

    /// Locks the registry. Context creation happens while the guard is held so two
    /// binders never both decide to become the first provider.
    pub fn get_provider(&self) -> ProviderGuard<'_> {
        ProviderGuard {
            providers: lock(&self.providers),
        }
    }

    /// The number of live providers.
    pub fn len(&self) -> usize {
        lock(&self.providers)
            .iter()
            .filter(|p| p.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to [`SharedGcData`].
pub struct ProviderGuard<'a> {
    providers: MutexGuard<'a, Vec<Weak<dyn GraphicContextProvider>>>,
}

impl ProviderGuard<'_> {
    /// Adds a provider without giving up the lock.
    pub fn register(&mut self, provider: &Arc<dyn GraphicContextProvider>) {
        self.providers.retain(|p| p.strong_count() > 0);
        self.providers.push(Arc::downgrade(provider));
    }

    /// The oldest live provider.
    pub fn first(&self) -> Option<Arc<dyn GraphicContextProvider>> {
        self.providers.iter().find_map(Weak::upgrade)
    }

    /// The oldest live provider that offers a context of the same kind on the same display.
    pub fn find_shared(
        &self,
        api: GlApi,
        profile: GlProfile,
        display: usize,
    ) -> Option<ContextHandle> {
        self.providers
            .iter()
            .filter_map(Weak::upgrade)
            .filter_map(|p| p.shared_context_handle())
            .find(|h| h.api == api && h.profile == profile && h.display == display)
    }
}

#[derive(Default)]
struct TargetState {
    targets: Vec<Weak<dyn DisplayTargetProvider>>,
    current: Option<Weak<dyn DisplayTargetProvider>>,
}

/// The known display targets and the current one.
#[derive(Default)]
pub struct DisplayTargets {
    state: Mutex<TargetState>,
}

impl DisplayTargets {
    pub fn add_target(&self, target: &Arc<dyn DisplayTargetProvider>) {
        let mut state = lock(&self.state);
        state.targets.retain(|t| t.strong_count() > 0);
        state.targets.push(Arc::downgrade(target));
    }

    pub fn set_current_target(&self, target: &Arc<dyn DisplayTargetProvider>) {
        lock(&self.state).current = Some(Arc::downgrade(target));
    }

    /// The current target. Once it has gone away, the first live target replaces it.
    pub fn get_current_target(&self) -> Option<Arc<dyn DisplayTargetProvider>> {
        let mut state = lock(&self.state);
        if let Some(current) = state.current.as_ref().and_then(Weak::upgrade) {
            return Some(current);
        }
        state.targets.retain(|t| t.strong_count() > 0);
        let next = state.targets.first().and_then(Weak::upgrade);
        if let Some(next) = &next {
            debug!("current display target is now {}", next.name());
        }
        state.current = next.as_ref().map(Arc::downgrade);
        next
    }
}

/// The OpenGL display target.
#[derive(Debug)]
pub struct GlTarget;

impl DisplayTargetProvider for GlTarget {
    fn name(&self) -> &str {
        "OpenGL"
    }
}

impl GlTarget {
    /// Registers the OpenGL target with `ctx` and makes it current.
    pub fn register(ctx: &DisplayContext) -> Arc<dyn DisplayTargetProvider> {
        let target: Arc<dyn DisplayTargetProvider> = Arc::new(GlTarget);
        ctx.targets().add_target(&target);
        ctx.targets().set_current_target(&target);
        target
    }
}

// Every mutation is a single push or retain, so a poisoned list is still consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Provider(Option<ContextHandle>);

    impl GraphicContextProvider for Provider {
        fn shared_context_handle(&self) -> Option<ContextHandle> {
            self.0
        }
    }

    struct Target(&'static str);

    impl DisplayTargetProvider for Target {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn handle(profile: GlProfile, raw: usize) -> ContextHandle {
        ContextHandle {
            api: GlApi::Headless,
            profile,
            display: 1,
            raw,
        }
    }

    #[test]
    fn shared_lookup_matches_profile() {
        let ctx = DisplayContext::new();
        let legacy: Arc<dyn GraphicContextProvider> =
            Arc::new(Provider(Some(handle(GlProfile::Legacy, 1))));
        let core: Arc<dyn GraphicContextProvider> =
            Arc::new(Provider(Some(handle(GlProfile::Core, 2))));
        ctx.shared_gc().add_provider(&legacy);
        ctx.shared_gc().add_provider(&core);

        let guard = ctx.shared_gc().get_provider();
        assert_eq!(
            guard.find_shared(GlApi::Headless, GlProfile::Core, 1).map(|h| h.raw),
            Some(2)
        );
        assert!(guard.find_shared(GlApi::Headless, GlProfile::Core, 7).is_none());
        assert!(guard.find_shared(GlApi::Glx, GlProfile::Core, 1).is_none());
    }

    #[test]
    fn dropped_providers_disappear() {
        let ctx = DisplayContext::new();
        let first: Arc<dyn GraphicContextProvider> = Arc::new(Provider(None));
        let second: Arc<dyn GraphicContextProvider> = Arc::new(Provider(None));
        ctx.shared_gc().add_provider(&first);
        ctx.shared_gc().add_provider(&second);
        assert_eq!(ctx.shared_gc().len(), 2);

        drop(first);
        let guard = ctx.shared_gc().get_provider();
        assert!(guard.first().map_or(false, |p| Arc::ptr_eq(&p, &second)));
        drop(guard);

        ctx.shared_gc().remove_provider(&second);
        assert!(ctx.shared_gc().is_empty());
    }

    #[test]
    fn current_target_is_reselected_lazily() {
        let ctx = DisplayContext::new();
        let a: Arc<dyn DisplayTargetProvider> = Arc::new(Target("a"));
        let b: Arc<dyn DisplayTargetProvider> = Arc::new(Target("b"));
        ctx.targets().add_target(&a);
        ctx.targets().add_target(&b);
        ctx.targets().set_current_target(&b);

        let current = || ctx.targets().get_current_target().map(|t| t.name().to_string());

        // A live current target wins over the first registered one.
        assert_eq!(current().as_deref(), Some("b"));
        drop(b);
        assert_eq!(current().as_deref(), Some("a"));
        drop(a);
        assert_eq!(current(), None);
    }

    #[test]
    fn gl_target_becomes_current() {
        let ctx = DisplayContext::new();
        let target = GlTarget::register(&ctx);
        let current = ctx.targets().get_current_target();
        assert!(current.map_or(false, |t| Arc::ptr_eq(&t, &target)));
    }
}
