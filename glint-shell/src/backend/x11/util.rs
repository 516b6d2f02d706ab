// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Miscellaneous utility functions for working with X11.

use std::convert::TryFrom;
use std::os::raw::c_int;
use std::os::unix::io::AsRawFd;
use std::time::Instant;

use tracing::warn;
use x11rb::connection::Connection;
use x11rb::errors::ConnectionError;
use x11rb::properties::WmSizeHints;
use x11rb::protocol::xproto::{self, Screen};
use x11rb::protocol::Event;
use x11rb::xcb_ffi::XCBConnection;

use crate::backend::SizeHints;
use crate::input::MouseButton;
use crate::keyboard_types::Modifiers;

macro_rules! log_x11 {
    ($val:expr) => {
        if let Err(e) = $val {
            // Errors here almost always mean the connection to the server is gone.
            tracing::error!("X11 error: {}", e);
        }
    };
}

/// The depth of the visual `visual_id` on `screen`.
pub(crate) fn visual_depth(screen: &Screen, visual_id: u32) -> Option<u8> {
    screen.allowed_depths.iter().find_map(|depth| {
        depth
            .visuals
            .iter()
            .any(|visual| visual.visual_id == visual_id)
            .then_some(depth.depth)
    })
}

/// Normal hints for a window at the given client size.
pub(crate) fn normal_hints(hints: &SizeHints, size: Option<(i32, i32)>) -> WmSizeHints {
    let mut normal = WmSizeHints::new();
    normal.min_size = hints
        .min
        .map(|min| (min.width as i32, min.height as i32));
    normal.max_size = hints
        .max
        .map(|max| (max.width as i32, max.height as i32));
    normal.size_increment = Some((1, 1));
    normal.base_size = size;
    normal.win_gravity = Some(xproto::Gravity::NORTH_WEST);
    normal
}

// Converts from the `detail` field of a button event.
pub(crate) fn mouse_button(button: u8) -> MouseButton {
    match button {
        1 => MouseButton::Left,
        2 => MouseButton::Middle,
        3 => MouseButton::Right,
        8 => MouseButton::X1,
        9 => MouseButton::X2,
        _ => {
            warn!("unknown mouse button code {}", button);
            MouseButton::None
        }
    }
}

// Extracts the keyboard modifiers from the `state` field of an input event.
pub(crate) fn key_mods(state: u16) -> Modifiers {
    // X11's mod keys are configurable; these are the usual assignments.
    let masks = [
        (xproto::ModMask::SHIFT, Modifiers::SHIFT),
        (xproto::ModMask::CONTROL, Modifiers::CONTROL),
        (xproto::ModMask::M1, Modifiers::ALT),
        (xproto::ModMask::M2, Modifiers::NUM_LOCK),
        (xproto::ModMask::M4, Modifiers::META),
        (xproto::ModMask::LOCK, Modifiers::CAPS_LOCK),
    ];
    masks
        .iter()
        .filter(|(mask, _)| state & u16::from(*mask) != 0)
        .fold(Modifiers::empty(), |mods, (_, modifier)| mods | *modifier)
}

/// Waits for the next event, or returns `None` once `deadline` has passed.
pub(crate) fn wait_for_event_with_deadline(
    conn: &XCBConnection,
    deadline: Instant,
) -> Result<Option<Event>, ConnectionError> {
    use nix::poll::{poll, PollFd, PollFlags};

    loop {
        if let Some(event) = conn.poll_for_event()? {
            return Ok(Some(event));
        }
        let now = Instant::now();
        if deadline <= now {
            return Ok(None);
        }

        let mut poll_fds = [PollFd::new(conn.as_raw_fd(), PollFlags::POLLIN)];
        let poll_timeout = c_int::try_from(deadline.duration_since(now).as_millis())
            .unwrap_or(c_int::MAX - 1)
            // Rounded down above; waking up early would just spin.
            .saturating_add(1);
        match poll(&mut poll_fds, poll_timeout) {
            Ok(_) | Err(nix::errno::Errno::EINTR) => {}
            Err(e) => return Err(std::io::Error::from(e).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_masks() {
        let state = u16::from(xproto::ModMask::SHIFT) | u16::from(xproto::ModMask::M4);
        assert_eq!(key_mods(state), Modifiers::SHIFT | Modifiers::META);
        assert_eq!(key_mods(0), Modifiers::empty());
    }
}
