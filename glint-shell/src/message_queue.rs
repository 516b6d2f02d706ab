// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! The per display event pump.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, trace};

use crate::backend::{self, NativeDisplay, WindowId};
use crate::error::Error;
use crate::window::PlatformWindow;

/// What ended a [`MessageQueue::wait`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitResult {
    /// A [`Waker`] was triggered.
    Woken,
    /// Native events are ready for [`MessageQueue::process`].
    Message,
    Timeout,
}

/// Owns a display connection and routes its events to the windows created on it.
///
/// Cloning gives another handle to the same queue.
#[derive(Clone)]
pub struct MessageQueue {
    inner: Rc<QueueInner>,
}

struct QueueInner {
    display: Box<dyn NativeDisplay>,
    clients: RefCell<HashMap<WindowId, Weak<PlatformWindow>>>,
    capture: Cell<Option<WindowId>>,
    wake: Arc<WakeSignal>,
}

/// Wakes a [`MessageQueue`] blocked in [`wait`](MessageQueue::wait) from any thread.
#[derive(Clone)]
pub struct Waker {
    signal: Arc<WakeSignal>,
}

impl Waker {
    pub fn wake(&self) {
        self.signal.raise();
    }
}

impl MessageQueue {
    /// Opens the default display of the platform.
    pub fn open() -> Result<MessageQueue, Error> {
        MessageQueue::new(backend::open_default()?)
    }

    /// Wraps an already open display, such as a
    /// [`HeadlessDisplay`](crate::backend::headless::HeadlessDisplay).
    pub fn new(display: Box<dyn NativeDisplay>) -> Result<MessageQueue, Error> {
        let wake = Arc::new(WakeSignal::new()?);
        Ok(MessageQueue {
            inner: Rc::new(QueueInner {
                display,
                clients: RefCell::new(HashMap::new()),
                capture: Cell::new(None),
                wake,
            }),
        })
    }

    pub fn display(&self) -> &dyn NativeDisplay {
        self.inner.display.as_ref()
    }

    pub fn waker(&self) -> Waker {
        Waker {
            signal: self.inner.wake.clone(),
        }
    }

    pub(crate) fn add_client(&self, window: &Rc<PlatformWindow>) {
        self.inner
            .clients
            .borrow_mut()
            .insert(window.id(), Rc::downgrade(window));
    }

    pub(crate) fn remove_client(&self, id: WindowId) {
        match self.inner.clients.try_borrow_mut() {
            Ok(mut clients) => {
                clients.remove(&id);
            }
            Err(_) => error!("window list is busy, {:?} stays registered", id),
        }
        if self.inner.capture.get() == Some(id) {
            self.inner.capture.set(None);
        }
    }

    /// The window for `id`, if it is still alive.
    pub fn client(&self, id: WindowId) -> Option<Rc<PlatformWindow>> {
        self.inner
            .clients
            .borrow()
            .get(&id)
            .and_then(Weak::upgrade)
    }

    #[cfg(target_os = "linux")]
    fn live_clients(&self) -> Vec<Rc<PlatformWindow>> {
        self.inner
            .clients
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Gives `window` the mouse capture, or releases it.
    ///
    /// Releasing does nothing unless `window` holds the capture.
    pub fn set_mouse_capture(&self, window: &PlatformWindow, capture: bool) {
        let id = window.id();
        let holder = self.inner.capture.get();
        if capture {
            if holder == Some(id) {
                return;
            }
            if let Some(previous) = holder.and_then(|holder| self.client(holder)) {
                previous.native().set_pointer_grab(false);
            }
            self.inner.capture.set(Some(id));
            window.native().set_pointer_grab(true);
        } else if holder == Some(id) {
            self.inner.capture.set(None);
            window.native().set_pointer_grab(false);
        }
    }

    /// The window currently holding the mouse capture.
    pub fn mouse_capture(&self) -> Option<Rc<PlatformWindow>> {
        self.inner.capture.get().and_then(|id| self.client(id))
    }

    /// Blocks until there are events to process, the queue is woken, or `timeout` passes.
    ///
    /// `None` waits without a time limit.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<WaitResult, Error> {
        let display = self.display();
        display.flush();
        if display.has_pending() {
            return Ok(WaitResult::Message);
        }
        self.wait_native(timeout)
    }

    #[cfg(unix)]
    fn wait_native(&self, timeout: Option<Duration>) -> Result<WaitResult, Error> {
        use nix::poll::{poll, PollFd, PollFlags};

        let mut fds = vec![PollFd::new(self.inner.wake.read, PollFlags::POLLIN)];
        if let Some(fd) = self.display().connection_fd() {
            fds.push(PollFd::new(fd, PollFlags::POLLIN));
        }
        #[cfg(target_os = "linux")]
        for window in self.live_clients() {
            for fd in window.joystick_fds() {
                fds.push(PollFd::new(fd, PollFlags::POLLIN));
            }
        }
        let poll_timeout = match timeout {
            Some(timeout) => timeout.as_millis().min(i32::MAX as u128) as i32,
            None => -1,
        };

        loop {
            match poll(&mut fds, poll_timeout) {
                Ok(0) => return Ok(WaitResult::Timeout),
                Ok(_) => {
                    let readable = |fd: &PollFd| {
                        fd.revents()
                            .map_or(false, |revents| revents.contains(PollFlags::POLLIN))
                    };
                    if readable(&fds[0]) {
                        self.inner.wake.drain()?;
                        return Ok(WaitResult::Woken);
                    }
                    return Ok(WaitResult::Message);
                }
                // Interrupted by a signal; the timeout restarts, which is fine for a wait.
                Err(nix::errno::Errno::EINTR) => {}
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context("Failed to poll the display")
                        .into())
                }
            }
        }
    }

    #[cfg(target_os = "windows")]
    fn wait_native(&self, timeout: Option<Duration>) -> Result<WaitResult, Error> {
        use winapi::shared::winerror::WAIT_TIMEOUT;
        use winapi::um::winbase::{INFINITE, WAIT_FAILED, WAIT_OBJECT_0};
        use winapi::um::winuser::{MsgWaitForMultipleObjects, QS_ALLINPUT};

        let millis = match timeout {
            Some(timeout) => timeout.as_millis().min((INFINITE - 1) as u128) as u32,
            None => INFINITE,
        };
        let handles = [self.inner.wake.event.0];
        let result = unsafe {
            MsgWaitForMultipleObjects(1, handles.as_ptr(), 0, millis, QS_ALLINPUT)
        };
        match result {
            WAIT_OBJECT_0 => Ok(WaitResult::Woken),
            r if r == WAIT_OBJECT_0 + 1 => Ok(WaitResult::Message),
            WAIT_TIMEOUT => Ok(WaitResult::Timeout),
            WAIT_FAILED => Err(anyhow::anyhow!("MsgWaitForMultipleObjects failed").into()),
            other => Err(anyhow::anyhow!("unexpected wait result {other}").into()),
        }
    }

    #[cfg(not(any(unix, target_os = "windows")))]
    fn wait_native(&self, _timeout: Option<Duration>) -> Result<WaitResult, Error> {
        Ok(WaitResult::Timeout)
    }

    /// Dispatches every pending native event and returns how many there were.
    pub fn process(&self) -> usize {
        let mut count = 0;
        while let Some((id, event)) = self.display().next_event() {
            count += 1;
            let target = match self.client(id) {
                Some(target) => target,
                None => {
                    trace!("dropping {:?} for unknown window {:?}", event, id);
                    continue;
                }
            };

            if !event.is_pointer() {
                target.handle_event(event);
                continue;
            }
            if target.click_through(&event) {
                continue;
            }
            match self.mouse_capture() {
                Some(holder) if holder.id() != id => {
                    let mut event = event;
                    let offset =
                        target.client_rect_px().origin() - holder.client_rect_px().origin();
                    event.offset_pointer(offset);
                    holder.handle_event(event);
                }
                _ => target.handle_event(event),
            }
        }

        #[cfg(target_os = "linux")]
        for window in self.live_clients() {
            window.poll_joysticks();
        }
        count
    }
}

#[cfg(unix)]
struct WakeSignal {
    read: std::os::unix::io::RawFd,
    write: std::os::unix::io::RawFd,
}

#[cfg(unix)]
impl WakeSignal {
    fn new() -> Result<WakeSignal, Error> {
        use anyhow::Context;
        let (read, write) = nix::unistd::pipe2(nix::fcntl::OFlag::O_NONBLOCK)
            .context("Failed to create the wake pipe")?;
        Ok(WakeSignal { read, write })
    }

    fn raise(&self) {
        match nix::unistd::write(self.write, &[0]) {
            // A full pipe wakes the queue just as well.
            Ok(_) | Err(nix::errno::Errno::EAGAIN) => {}
            Err(e) => error!("Failed to write to the wake pipe: {}", e),
        }
    }

    /// Empties the pipe; every wake adds one byte.
    fn drain(&self) -> Result<(), Error> {
        let mut buf = [0u8; 16];
        loop {
            match nix::unistd::read(self.read, &mut buf[..]) {
                Err(nix::errno::Errno::EINTR) => {}
                Err(nix::errno::Errno::EAGAIN) | Ok(0) => break,
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context("Failed to read from the wake pipe")
                        .into())
                }
                Ok(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
impl Drop for WakeSignal {
    fn drop(&mut self) {
        if let Err(e) = nix::unistd::close(self.read) {
            error!("Error closing the wake pipe: {}", e);
        }
        if let Err(e) = nix::unistd::close(self.write) {
            error!("Error closing the wake pipe: {}", e);
        }
    }
}

#[cfg(target_os = "windows")]
struct EventHandle(winapi::um::winnt::HANDLE);

// Win32 event objects may be signalled from any thread.
#[cfg(target_os = "windows")]
unsafe impl Send for EventHandle {}
#[cfg(target_os = "windows")]
unsafe impl Sync for EventHandle {}

#[cfg(target_os = "windows")]
struct WakeSignal {
    event: EventHandle,
}

#[cfg(target_os = "windows")]
impl WakeSignal {
    fn new() -> Result<WakeSignal, Error> {
        use winapi::um::synchapi::CreateEventW;
        let event = unsafe { CreateEventW(std::ptr::null_mut(), 0, 0, std::ptr::null()) };
        if event.is_null() {
            return Err(anyhow::anyhow!("CreateEventW failed").into());
        }
        Ok(WakeSignal {
            event: EventHandle(event),
        })
    }

    fn raise(&self) {
        if unsafe { winapi::um::synchapi::SetEvent(self.event.0) } == 0 {
            error!("SetEvent failed");
        }
    }
}

#[cfg(target_os = "windows")]
impl Drop for WakeSignal {
    fn drop(&mut self) {
        unsafe { winapi::um::handleapi::CloseHandle(self.event.0) };
    }
}

#[cfg(not(any(unix, target_os = "windows")))]
struct WakeSignal;

#[cfg(not(any(unix, target_os = "windows")))]
impl WakeSignal {
    fn new() -> Result<WakeSignal, Error> {
        Ok(WakeSignal)
    }

    fn raise(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{HeadlessConfig, HeadlessDisplay};
    use test_log::test;

    static_assertions::assert_not_impl_any!(MessageQueue: Send, Sync);
    static_assertions::assert_impl_all!(Waker: Send, Sync, Clone);

    #[test]
    fn waker_wakes_from_another_thread() {
        let queue = MessageQueue::new(Box::new(HeadlessDisplay::new(HeadlessConfig::default())))
            .unwrap();
        let waker = queue.waker();
        std::thread::spawn(move || waker.wake()).join().unwrap();
        assert_eq!(queue.wait(Some(Duration::from_secs(5))).unwrap(), WaitResult::Woken);
    }

    #[test]
    fn idle_queue_times_out() {
        let queue = MessageQueue::new(Box::new(HeadlessDisplay::new(HeadlessConfig::default())))
            .unwrap();
        assert_eq!(
            queue.wait(Some(Duration::from_millis(1))).unwrap(),
            WaitResult::Timeout
        );
        assert_eq!(queue.process(), 0);
    }
}
