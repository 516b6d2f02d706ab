// Copyright 2021 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Window-system entry points resolved on first use.

use std::fmt;
use std::os::raw::c_void;

use once_cell::unsync::OnceCell;
use tracing::debug;

/// The window-system binding a driver talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GlApi {
    Glx,
    Wgl,
    Headless,
}

/// Optional window-system functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entry {
    CreateContextAttribs,
    SwapIntervalExt,
    SwapIntervalSgi,
    SwapIntervalMesa,
    ChooseConfig,
    GetConfigAttribs,
    GetExtensionsString,
}

impl Entry {
    const COUNT: usize = 7;

    const ALL: [Entry; Entry::COUNT] = [
        Entry::CreateContextAttribs,
        Entry::SwapIntervalExt,
        Entry::SwapIntervalSgi,
        Entry::SwapIntervalMesa,
        Entry::ChooseConfig,
        Entry::GetConfigAttribs,
        Entry::GetExtensionsString,
    ];

    const SWAP_INTERVAL: [Entry; 3] = [
        Entry::SwapIntervalExt,
        Entry::SwapIntervalSgi,
        Entry::SwapIntervalMesa,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// The symbol name and the extension that must be advertised for it, if any.
    pub fn binding(self, api: GlApi) -> Option<(&'static str, Option<&'static str>)> {
        use Entry::*;
        match api {
            GlApi::Glx | GlApi::Headless => Some(match self {
                CreateContextAttribs => (
                    "glXCreateContextAttribsARB",
                    Some("GLX_ARB_create_context"),
                ),
                SwapIntervalExt => ("glXSwapIntervalEXT", Some("GLX_EXT_swap_control")),
                SwapIntervalSgi => ("glXSwapIntervalSGI", Some("GLX_SGI_swap_control")),
                SwapIntervalMesa => ("glXSwapIntervalMESA", Some("GLX_MESA_swap_control")),
                ChooseConfig => ("glXChooseFBConfig", None),
                GetConfigAttribs => ("glXGetFBConfigAttrib", None),
                GetExtensionsString => ("glXQueryExtensionsString", None),
            }),
            GlApi::Wgl => match self {
                CreateContextAttribs => Some((
                    "wglCreateContextAttribsARB",
                    Some("WGL_ARB_create_context"),
                )),
                SwapIntervalExt => Some(("wglSwapIntervalEXT", Some("WGL_EXT_swap_control"))),
                ChooseConfig => Some(("wglChoosePixelFormatARB", Some("WGL_ARB_pixel_format"))),
                GetConfigAttribs => Some((
                    "wglGetPixelFormatAttribivARB",
                    Some("WGL_ARB_pixel_format"),
                )),
                GetExtensionsString => Some(("wglGetExtensionsStringARB", None)),
                SwapIntervalSgi | SwapIntervalMesa => None,
            },
        }
    }
}

/// Whether `extensions` lists `name` as a whole token.
pub fn has_extension(extensions: &str, name: &str) -> bool {
    extensions.split_ascii_whitespace().any(|ext| ext == name)
}

type Loader = Box<dyn Fn(&str) -> Option<*const c_void>>;

/// Lazily resolved function pointers of one window-system binding.
///
/// Entries are looked up through the loader the first time they are asked for and the
/// result, found or not, is kept for the lifetime of the table.
pub struct GlFunctionTable {
    api: GlApi,
    extensions: String,
    loader: Loader,
    slots: [OnceCell<Option<*const c_void>>; Entry::COUNT],
}

impl GlFunctionTable {
    pub fn new(
        api: GlApi,
        extensions: impl Into<String>,
        loader: impl Fn(&str) -> Option<*const c_void> + 'static,
    ) -> GlFunctionTable {
        GlFunctionTable {
            api,
            extensions: extensions.into(),
            loader: Box::new(loader),
            slots: Default::default(),
        }
    }

    pub fn api(&self) -> GlApi {
        self.api
    }

    pub fn extensions(&self) -> &str {
        &self.extensions
    }

    pub fn has_extension(&self, name: &str) -> bool {
        has_extension(&self.extensions, name)
    }

    /// The address of `entry`, or `None` if it is unavailable or its extension is missing.
    pub fn get(&self, entry: Entry) -> Option<*const c_void> {
        *self.slots[entry.index()].get_or_init(|| {
            let (symbol, extension) = entry.binding(self.api)?;
            if let Some(extension) = extension {
                if !self.has_extension(extension) {
                    debug!("{} not advertised, skipping {}", extension, symbol);
                    return None;
                }
            }
            let address = (self.loader)(symbol).filter(|ptr| !ptr.is_null());
            if address.is_none() {
                debug!("{} could not be resolved", symbol);
            }
            address
        })
    }

    pub fn is_available(&self, entry: Entry) -> bool {
        self.get(entry).is_some()
    }

    /// Looks up every entry now, for loaders that only work while a context is current.
    pub fn resolve_all(&self) {
        for entry in Entry::ALL {
            self.get(entry);
        }
    }

    /// The format query pair (choose, get attributes) for multisampled formats, when the
    /// binding advertises multisampling.
    pub fn multisample_config_entries(&self) -> Option<(*const c_void, *const c_void)> {
        let extension = match self.api {
            GlApi::Wgl => "WGL_ARB_multisample",
            GlApi::Glx | GlApi::Headless => "GLX_ARB_multisample",
        };
        if !self.has_extension(extension) {
            return None;
        }
        Some((self.get(Entry::ChooseConfig)?, self.get(Entry::GetConfigAttribs)?))
    }

    /// The preferred swap interval function: EXT, then SGI, then MESA.
    pub fn swap_interval_entry(&self) -> Option<(Entry, *const c_void)> {
        Entry::SWAP_INTERVAL
            .iter()
            .find_map(|entry| self.get(*entry).map(|ptr| (*entry, ptr)))
    }
}

impl fmt::Debug for GlFunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("GlFunctionTable")
            .field("api", &self.api)
            .field("extensions", &self.extensions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn dummy(_: &str) -> Option<*const c_void> {
        Some(1 as *const c_void)
    }

    #[test]
    fn extensions_match_whole_tokens() {
        let exts = "GLX_EXT_swap_control_tear GLX_ARB_create_context_profile";
        assert!(!has_extension(exts, "GLX_EXT_swap_control"));
        assert!(!has_extension(exts, "GLX_ARB_create_context"));
        assert!(has_extension(exts, "GLX_ARB_create_context_profile"));
    }

    #[test]
    fn gated_entries_need_their_extension() {
        let table = GlFunctionTable::new(GlApi::Glx, "GLX_SGI_swap_control", dummy);
        assert!(!table.is_available(Entry::CreateContextAttribs));
        assert!(table.is_available(Entry::ChooseConfig));
        assert_eq!(
            table.swap_interval_entry().map(|(entry, _)| entry),
            Some(Entry::SwapIntervalSgi)
        );
    }

    #[test]
    fn swap_interval_prefers_ext() {
        let table = GlFunctionTable::new(
            GlApi::Glx,
            "GLX_MESA_swap_control GLX_EXT_swap_control GLX_SGI_swap_control",
            dummy,
        );
        assert_eq!(
            table.swap_interval_entry().map(|(entry, _)| entry),
            Some(Entry::SwapIntervalExt)
        );
    }

    #[test]
    fn wgl_has_no_sgi_or_mesa() {
        let table = GlFunctionTable::new(GlApi::Wgl, "GLX_SGI_swap_control", dummy);
        assert_eq!(Entry::SwapIntervalSgi.binding(GlApi::Wgl), None);
        assert!(table.swap_interval_entry().is_none());
    }

    #[test]
    fn multisampled_formats_need_both_extensions() {
        let table = GlFunctionTable::new(GlApi::Wgl, "WGL_ARB_pixel_format", dummy);
        assert!(table.is_available(Entry::GetConfigAttribs));
        assert!(table.multisample_config_entries().is_none());

        let table = GlFunctionTable::new(GlApi::Wgl, "WGL_ARB_multisample", dummy);
        assert!(table.multisample_config_entries().is_none());

        let table =
            GlFunctionTable::new(GlApi::Wgl, "WGL_ARB_pixel_format WGL_ARB_multisample", dummy);
        assert!(table.multisample_config_entries().is_some());
    }

    #[test]
    fn resolve_all_fills_every_slot_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let table = GlFunctionTable::new(
            GlApi::Wgl,
            "WGL_ARB_pixel_format WGL_ARB_create_context WGL_EXT_swap_control",
            move |_| {
                counter.set(counter.get() + 1);
                Some(1 as *const c_void)
            },
        );
        table.resolve_all();
        // SGI and MESA have no WGL binding.
        assert_eq!(calls.get(), 5);
        assert!(table.is_available(Entry::ChooseConfig));
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn lookups_are_cached() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let table = GlFunctionTable::new(GlApi::Glx, "", move |_| {
            counter.set(counter.get() + 1);
            None
        });
        assert!(!table.is_available(Entry::ChooseConfig));
        assert!(!table.is_available(Entry::ChooseConfig));
        assert_eq!(calls.get(), 1);
    }
}
