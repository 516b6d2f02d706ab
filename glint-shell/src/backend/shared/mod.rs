// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Logic that is shared by more than one backend.

pub(crate) mod keycodes;
