// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! The `CLIPBOARD` selection.
//!
//! A window that puts something on the clipboard becomes the selection owner itself and
//! answers conversion requests until another client takes the selection over. Data larger
//! than a single request is refused rather than sent incrementally.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::{ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ChangeWindowAttributesAux, ConnectionExt, EventMask, GetPropertyType,
    PropMode, Property, SelectionClearEvent, SelectionNotifyEvent, SelectionRequestEvent,
    Timestamp, Window, WindowClass, SELECTION_NOTIFY_EVENT,
};
use x11rb::protocol::Event;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::xcb_ffi::XCBConnection;

use super::display::Atoms;
use super::util::wait_for_event_with_deadline;
use crate::clipboard::ClipboardContents;

const TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub(crate) struct Selection {
    owner: Option<(Window, ClipboardContents)>,
}

impl Selection {
    /// Makes `window` the owner of the clipboard with `contents`.
    ///
    /// Returns `false` if the server gave the selection to someone else, which happens when
    /// `time` is older than the current owner's.
    pub(crate) fn claim(
        &mut self,
        conn: &XCBConnection,
        atoms: &Atoms,
        window: Window,
        contents: ClipboardContents,
        time: Timestamp,
    ) -> Result<bool, ReplyError> {
        conn.set_selection_owner(window, atoms.CLIPBOARD, time)?;
        let owner = conn.get_selection_owner(atoms.CLIPBOARD)?.reply()?.owner;
        if owner != window {
            debug!("failed to become the clipboard owner");
            return Ok(false);
        }
        self.owner = Some((window, contents));
        Ok(true)
    }

    /// Contents owned by one of our windows, if any.
    pub(crate) fn owned(&self) -> Option<&ClipboardContents> {
        self.owner.as_ref().map(|(_, contents)| contents)
    }

    /// Forgets a window that is going away.
    pub(crate) fn release(&mut self, window: Window) {
        if self.owner.as_ref().map(|(owner, _)| *owner) == Some(window) {
            self.owner = None;
        }
    }

    /// Returns the window that lost the clipboard, if it was one of ours.
    pub(crate) fn handle_clear(
        &mut self,
        atoms: &Atoms,
        event: &SelectionClearEvent,
    ) -> Option<Window> {
        if event.selection != atoms.CLIPBOARD {
            return None;
        }
        match self.owner {
            Some((owner, _)) if owner == event.owner => {
                self.owner = None;
                Some(owner)
            }
            _ => None,
        }
    }

    pub(crate) fn handle_request(
        &self,
        conn: &XCBConnection,
        atoms: &Atoms,
        event: &SelectionRequestEvent,
    ) -> Result<(), ReplyOrIdError> {
        let contents = match &self.owner {
            Some((owner, contents))
                if *owner == event.owner && event.selection == atoms.CLIPBOARD =>
            {
                contents
            }
            _ => {
                debug!("got non-matching selection request");
                reject_transfer(conn, event)?;
                return Ok(());
            }
        };

        if event.target == atoms.TARGETS {
            let mut targets = vec![atoms.TARGETS];
            if contents.text.is_some() {
                targets.push(atoms.UTF8_STRING);
            }
            if contents.image.is_some() {
                targets.push(atoms.GLINT_IMAGE);
            }
            conn.change_property32(
                PropMode::REPLACE,
                event.requestor,
                event.property,
                AtomEnum::ATOM,
                &targets,
            )?;
        } else {
            let data = if event.target == atoms.UTF8_STRING {
                contents.text.as_ref().map(|text| text.as_bytes().to_vec())
            } else if event.target == atoms.GLINT_IMAGE {
                contents.image.as_ref().map(|image| image.to_bytes())
            } else {
                None
            };
            match data {
                Some(data) if data.len() <= maximum_property_length(conn) => {
                    conn.change_property8(
                        PropMode::REPLACE,
                        event.requestor,
                        event.property,
                        event.target,
                        &data,
                    )?;
                }
                Some(_) => {
                    warn!("clipboard contents too large for a single transfer");
                    reject_transfer(conn, event)?;
                    return Ok(());
                }
                None => {
                    reject_transfer(conn, event)?;
                    return Ok(());
                }
            }
        }

        let notify = SelectionNotifyEvent {
            response_type: SELECTION_NOTIFY_EVENT,
            sequence: 0,
            requestor: event.requestor,
            selection: event.selection,
            target: event.target,
            property: event.property,
            time: event.time,
        };
        conn.send_event(false, event.requestor, EventMask::NO_EVENT, notify)?;
        Ok(())
    }
}

/// Converts the clipboard to `target` and reads the result.
///
/// Events that arrive while waiting are parked in `pending` for the event loop.
pub(crate) fn fetch(
    conn: &XCBConnection,
    atoms: &Atoms,
    screen_num: usize,
    target: Atom,
    time: Timestamp,
    pending: &RefCell<VecDeque<Event>>,
) -> Result<Option<Vec<u8>>, ReplyOrIdError> {
    let deadline = Instant::now() + TRANSFER_TIMEOUT;
    let window = TransferWindow::new(conn, screen_num)?;

    conn.convert_selection(
        window.id,
        atoms.CLIPBOARD,
        target,
        atoms.GLINT_SELECTION,
        time,
    )?;
    conn.flush()?;
    let notify = loop {
        match wait_for_event_with_deadline(conn, deadline)? {
            Some(Event::SelectionNotify(notify)) if notify.requestor == window.id => break notify,
            Some(event) => pending.borrow_mut().push_back(event),
            None => {
                warn!("clipboard owner did not answer in time");
                return Ok(None);
            }
        }
    };
    if notify.property == x11rb::NONE {
        debug!("clipboard conversion was refused");
        return Ok(None);
    }

    conn.change_window_attributes(
        window.id,
        &ChangeWindowAttributesAux::default().event_mask(EventMask::PROPERTY_CHANGE),
    )?;
    let property = take_property(conn, window.id, atoms.GLINT_SELECTION)?;
    if property.0 != atoms.INCR {
        return Ok(Some(property.1));
    }

    // Deleting the property above started the incremental transfer.
    conn.flush()?;
    let mut value = Vec::new();
    loop {
        match wait_for_event_with_deadline(conn, deadline)? {
            Some(Event::PropertyNotify(notify))
                if (notify.window, notify.atom, notify.state)
                    == (window.id, atoms.GLINT_SELECTION, Property::NEW_VALUE) =>
            {
                let (_, chunk) = take_property(conn, window.id, atoms.GLINT_SELECTION)?;
                if chunk.is_empty() {
                    return Ok(Some(value));
                }
                value.extend_from_slice(&chunk);
            }
            Some(event) => pending.borrow_mut().push_back(event),
            None => {
                warn!("incremental clipboard transfer timed out");
                return Ok(None);
            }
        }
    }
}

fn take_property(
    conn: &XCBConnection,
    window: Window,
    property: Atom,
) -> Result<(Atom, Vec<u8>), ReplyError> {
    let reply = conn
        .get_property(true, window, property, GetPropertyType::ANY, 0, u32::MAX)?
        .reply()?;
    Ok((reply.type_, reply.value))
}

/// An unmapped window that receives one conversion.
struct TransferWindow<'a> {
    id: Window,
    conn: &'a XCBConnection,
}

impl<'a> TransferWindow<'a> {
    fn new(conn: &'a XCBConnection, screen_num: usize) -> Result<Self, ReplyOrIdError> {
        let id = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            id,
            conn.setup().roots[screen_num].root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &Default::default(),
        )?;
        Ok(TransferWindow { id, conn })
    }
}

impl Drop for TransferWindow<'_> {
    fn drop(&mut self) {
        let _ = self.conn.destroy_window(self.id);
    }
}

fn maximum_property_length(conn: &XCBConnection) -> usize {
    const CHANGE_PROPERTY_HEADER: usize = 24;
    conn.maximum_request_bytes().min(usize::from(u16::MAX)) - CHANGE_PROPERTY_HEADER
}

fn reject_transfer(
    conn: &XCBConnection,
    event: &SelectionRequestEvent,
) -> Result<(), ConnectionError> {
    let notify = SelectionNotifyEvent {
        response_type: SELECTION_NOTIFY_EVENT,
        sequence: 0,
        requestor: event.requestor,
        selection: event.selection,
        target: event.target,
        property: x11rb::NONE,
        time: event.time,
    };
    conn.send_event(false, event.requestor, EventMask::NO_EVENT, notify)?;
    Ok(())
}
