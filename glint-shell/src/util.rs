// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Small helpers shared by the window and the backends.

/// Wrapper around `RefCell::borrow` that provides error context.
#[allow(unused_macros)]
macro_rules! borrow {
    ($val:expr) => {{
        use anyhow::Context;
        $val.try_borrow().with_context(|| {
            format!(
                "[{}:{}] {}",
                std::file!(),
                std::line!(),
                std::stringify!($val)
            )
        })
    }};
}

/// Wrapper around `RefCell::borrow_mut` that provides error context.
#[allow(unused_macros)]
macro_rules! borrow_mut {
    ($val:expr) => {{
        use anyhow::Context;
        $val.try_borrow_mut().with_context(|| {
            format!(
                "[{}:{}] {}",
                std::file!(),
                std::line!(),
                std::stringify!($val)
            )
        })
    }};
}

/// Logs an error result and carries on.
///
/// Used where a failed request only degrades the window (a hint the window manager never sees,
/// a property that stays unset) and the caller has nothing better to do.
macro_rules! log_err {
    ($val:expr) => {
        if let Err(e) = $val {
            tracing::error!("{:#}", e);
        }
    };
}

/// Rounds a rect to whole pixels, growing it so it still covers the original area.
pub(crate) fn expand_to_pixels(rect: crate::kurbo::Rect) -> crate::kurbo::Rect {
    rect.abs().expand()
}
