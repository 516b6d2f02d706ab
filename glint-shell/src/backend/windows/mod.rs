// Copyright 2018 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Win32 backend.
//!
//! Windows live on the thread that created them. The message filter installed through
//! [`NativeWindow::set_message_filter`](crate::NativeWindow::set_message_filter) sees every
//! message before the backend translates it.

pub(crate) mod display;
pub(crate) mod error;
mod util;
pub(crate) mod window;
