// Copyright 2019 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Input devices owned by a window: keyboard, mouse and joysticks.
//!
//! Each device keeps its current state and a queue of the events it received since the
//! application last drained it.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use keyboard_types::{Code, Key, KeyState, Modifiers};

use crate::kurbo::{Point, Vec2};

/// Two clicks closer together than this count as a multi-click.
const MULTI_CLICK_INTERVAL: Duration = Duration::from_millis(500);
/// Two clicks further apart than this (in pixels, per axis) never count as a multi-click.
const MULTI_CLICK_DISTANCE: f64 = 4.0;

/// An indicator of which mouse button was pressed.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
#[repr(u8)]
pub enum MouseButton {
    /// No mouse button.
    None = 0,
    Left = 1,
    Right = 2,
    Middle = 4,
    /// First X button, usually "back".
    X1 = 8,
    /// Second X button, usually "forward".
    X2 = 16,
}

impl MouseButton {
    pub fn is_left(self) -> bool {
        self == MouseButton::Left
    }
}

/// A set of [`MouseButton`]s.
#[derive(PartialEq, Eq, Clone, Copy, Default)]
pub struct MouseButtons(u8);

impl MouseButtons {
    pub fn new() -> MouseButtons {
        MouseButtons(0)
    }

    pub fn insert(&mut self, button: MouseButton) {
        self.0 |= button as u8;
    }

    pub fn remove(&mut self, button: MouseButton) {
        self.0 &= !(button as u8);
    }

    /// Builder-style method for adding `button` to the set.
    pub fn with(mut self, button: MouseButton) -> MouseButtons {
        self.insert(button);
        self
    }

    /// Builder-style method for removing `button` from the set.
    pub fn without(mut self, button: MouseButton) -> MouseButtons {
        self.remove(button);
        self
    }

    pub fn contains(self, button: MouseButton) -> bool {
        button != MouseButton::None && (self.0 & button as u8) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Debug for MouseButtons {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "MouseButtons({:05b})", self.0)
    }
}

/// A keyboard event as stored by [`Keyboard`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyboardEvent {
    pub state: KeyState,
    pub code: Code,
    pub key: Key,
    pub mods: Modifiers,
    pub repeat: bool,
}

/// What happened in a [`MouseEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseEventKind {
    Down,
    Up,
    Move,
    Wheel,
}

/// A mouse event, in client coordinates and logical units.
#[derive(Clone, Debug, PartialEq)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub pos: Point,
    /// The button that changed; [`MouseButton::None`] for moves and wheel events.
    pub button: MouseButton,
    /// The buttons held after this event.
    pub buttons: MouseButtons,
    pub mods: Modifiers,
    /// 1 for a single click, 2 for a double click and so on. 0 for everything else.
    pub count: u8,
    pub wheel_delta: Vec2,
}

/// Keyboard state and event queue.
#[derive(Debug, Default)]
pub struct Keyboard {
    pressed: HashSet<Code>,
    mods: Modifiers,
    events: VecDeque<KeyboardEvent>,
}

impl Keyboard {
    /// Whether the key at the physical position `code` is currently held.
    pub fn is_pressed(&self, code: Code) -> bool {
        self.pressed.contains(&code)
    }

    pub fn modifiers(&self) -> Modifiers {
        self.mods
    }

    /// Takes the oldest queued event.
    pub fn poll(&mut self) -> Option<KeyboardEvent> {
        self.events.pop_front()
    }

    pub(crate) fn received(&mut self, mut event: KeyboardEvent) {
        match event.state {
            KeyState::Down => {
                event.repeat = !self.pressed.insert(event.code);
            }
            KeyState::Up => {
                self.pressed.remove(&event.code);
            }
        }
        self.mods = event.mods;
        self.events.push_back(event);
    }

    /// Releases every held key, reporting a key-up for each one.
    ///
    /// Used when the window loses focus: the key-up events will go to another window.
    pub(crate) fn release_all(&mut self) {
        let mods = Modifiers::empty();
        for code in self.pressed.drain() {
            self.events.push_back(KeyboardEvent {
                state: KeyState::Up,
                code,
                key: Key::Unidentified,
                mods,
                repeat: false,
            });
        }
        self.mods = mods;
    }
}

/// Mouse state, click counting and event queue.
#[derive(Debug)]
pub struct Mouse {
    position: Point,
    buttons: MouseButtons,
    last_click: Option<(Instant, Point, MouseButton)>,
    click_count: u8,
    events: VecDeque<MouseEvent>,
}

impl Default for Mouse {
    fn default() -> Mouse {
        Mouse {
            position: Point::ZERO,
            buttons: MouseButtons::new(),
            last_click: None,
            click_count: 0,
            events: VecDeque::new(),
        }
    }
}

impl Mouse {
    /// Last known pointer position in client coordinates.
    pub fn position(&self) -> Point {
        self.position
    }

    pub fn buttons(&self) -> MouseButtons {
        self.buttons
    }

    pub fn poll(&mut self) -> Option<MouseEvent> {
        self.events.pop_front()
    }

    pub(crate) fn received(&mut self, mut event: MouseEvent, now: Instant) {
        self.position = event.pos;
        match event.kind {
            MouseEventKind::Down => {
                self.buttons.insert(event.button);
                event.count = self.count_click(event.button, event.pos, now);
            }
            MouseEventKind::Up => {
                self.buttons.remove(event.button);
                event.count = 0;
            }
            MouseEventKind::Move | MouseEventKind::Wheel => event.count = 0,
        }
        event.buttons = self.buttons;
        self.events.push_back(event);
    }

    fn count_click(&mut self, button: MouseButton, pos: Point, now: Instant) -> u8 {
        let repeated = match self.last_click {
            Some((when, where_, last_button)) => {
                last_button == button
                    && now.duration_since(when) <= MULTI_CLICK_INTERVAL
                    && (where_.x - pos.x).abs() <= MULTI_CLICK_DISTANCE
                    && (where_.y - pos.y).abs() <= MULTI_CLICK_DISTANCE
            }
            None => false,
        };
        self.click_count = if repeated {
            self.click_count.saturating_add(1)
        } else {
            1
        };
        self.last_click = Some((now, pos, button));
        self.click_count
    }
}

/// A joystick event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JoystickEvent {
    /// An axis moved; `value` is normalized to `-1.0..=1.0`.
    Axis { index: u8, value: f32 },
    Button { index: u8, pressed: bool },
}

/// Joystick state and event queue.
#[derive(Debug)]
pub struct Joystick {
    name: String,
    axes: Vec<f32>,
    buttons: Vec<bool>,
    events: VecDeque<JoystickEvent>,
    #[cfg(target_os = "linux")]
    device: Option<linux_js::Device>,
}

impl Joystick {
    pub fn new(name: impl Into<String>) -> Joystick {
        Joystick {
            name: name.into(),
            axes: Vec::new(),
            buttons: Vec::new(),
            events: VecDeque::new(),
            #[cfg(target_os = "linux")]
            device: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn axis(&self, index: usize) -> f32 {
        self.axes.get(index).copied().unwrap_or(0.0)
    }

    pub fn is_pressed(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    pub fn poll(&mut self) -> Option<JoystickEvent> {
        self.events.pop_front()
    }

    pub(crate) fn received(&mut self, event: JoystickEvent) {
        match event {
            JoystickEvent::Axis { index, value } => {
                let index = index as usize;
                if self.axes.len() <= index {
                    self.axes.resize(index + 1, 0.0);
                }
                self.axes[index] = value;
            }
            JoystickEvent::Button { index, pressed } => {
                let index = index as usize;
                if self.buttons.len() <= index {
                    self.buttons.resize(index + 1, false);
                }
                self.buttons[index] = pressed;
            }
        }
        self.events.push_back(event);
    }

    /// The file descriptor the event pump should wait on, if this joystick is backed by a
    /// device node.
    #[cfg(target_os = "linux")]
    pub(crate) fn raw_fd(&self) -> Option<std::os::unix::io::RawFd> {
        use std::os::unix::io::AsRawFd;
        self.device.as_ref().map(|device| device.file.as_raw_fd())
    }

    /// Drains the device node into the event queue.
    #[cfg(target_os = "linux")]
    pub(crate) fn read_device(&mut self) {
        let events = match self.device.as_mut() {
            Some(device) => device.read_events(),
            None => return,
        };
        for event in events {
            self.received(event);
        }
    }
}

/// Opens the legacy joystick device nodes (`/dev/input/js0` and up).
#[cfg(target_os = "linux")]
pub(crate) fn open_joysticks() -> Vec<Joystick> {
    (0..4)
        .filter_map(|index| {
            let path = format!("/dev/input/js{index}");
            let device = linux_js::Device::open(&path)?;
            let mut joystick = Joystick::new(path);
            joystick.device = Some(device);
            Some(joystick)
        })
        .collect()
}

#[cfg(target_os = "linux")]
mod linux_js {
    use std::fs::{File, OpenOptions};
    use std::io::Read;
    use std::os::unix::fs::OpenOptionsExt;

    use super::JoystickEvent;

    const JS_EVENT_BUTTON: u8 = 0x01;
    const JS_EVENT_AXIS: u8 = 0x02;
    const JS_EVENT_INIT: u8 = 0x80;
    const JS_EVENT_SIZE: usize = 8;

    #[derive(Debug)]
    pub(super) struct Device {
        pub(super) file: File,
    }

    impl Device {
        pub(super) fn open(path: &str) -> Option<Device> {
            let file = OpenOptions::new()
                .read(true)
                .custom_flags(nix::fcntl::OFlag::O_NONBLOCK.bits())
                .open(path)
                .ok()?;
            tracing::debug!("opened joystick {}", path);
            Some(Device { file })
        }

        pub(super) fn read_events(&mut self) -> Vec<JoystickEvent> {
            let mut events = Vec::new();
            let mut buf = [0u8; JS_EVENT_SIZE];
            // struct js_event { u32 time; i16 value; u8 type; u8 number; }
            while let Ok(JS_EVENT_SIZE) = self.file.read(&mut buf) {
                let value = i16::from_ne_bytes([buf[4], buf[5]]);
                let kind = buf[6] & !JS_EVENT_INIT;
                let index = buf[7];
                match kind {
                    JS_EVENT_AXIS => events.push(JoystickEvent::Axis {
                        index,
                        value: value as f32 / i16::MAX as f32,
                    }),
                    JS_EVENT_BUTTON => events.push(JoystickEvent::Button {
                        index,
                        pressed: value != 0,
                    }),
                    _ => {}
                }
            }
            events
        }
    }
}

/// The devices owned by one window.
#[derive(Debug, Default)]
pub struct InputContext {
    keyboard: Keyboard,
    mouse: Mouse,
    joysticks: Vec<Joystick>,
}

impl InputContext {
    pub fn keyboard(&mut self) -> &mut Keyboard {
        &mut self.keyboard
    }

    pub fn mouse(&mut self) -> &mut Mouse {
        &mut self.mouse
    }

    pub fn joysticks(&mut self) -> &mut [Joystick] {
        &mut self.joysticks
    }

    pub(crate) fn set_joysticks(&mut self, joysticks: Vec<Joystick>) {
        self.joysticks = joysticks;
    }

    /// Drops every device, in the order keyboard, mouse, joysticks.
    pub(crate) fn dispose(&mut self) {
        self.keyboard = Keyboard::default();
        self.mouse = Mouse::default();
        self.joysticks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn press(button: MouseButton, pos: Point) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down,
            pos,
            button,
            buttons: MouseButtons::new(),
            mods: Modifiers::empty(),
            count: 0,
            wheel_delta: Vec2::ZERO,
        }
    }

    #[test]
    fn double_click_is_counted() {
        let mut mouse = Mouse::default();
        let start = Instant::now();
        let pos = Point::new(10.0, 10.0);
        mouse.received(press(MouseButton::Left, pos), start);
        mouse.received(
            press(MouseButton::Left, Point::new(12.0, 11.0)),
            start + Duration::from_millis(100),
        );
        assert_eq!(mouse.poll().map(|e| e.count), Some(1));
        let second = mouse.poll().unwrap();
        assert_eq!(second.count, 2);
        assert!(second.buttons.contains(MouseButton::Left));

        // Too late for a triple click.
        mouse.received(press(MouseButton::Left, pos), start + Duration::from_secs(2));
        assert_eq!(mouse.poll().map(|e| e.count), Some(1));
    }

    #[test]
    fn key_repeat_and_release_all() {
        let mut keyboard = Keyboard::default();
        let event = KeyboardEvent {
            state: KeyState::Down,
            code: Code::KeyA,
            key: Key::Character("a".into()),
            mods: Modifiers::empty(),
            repeat: false,
        };
        keyboard.received(event.clone());
        keyboard.received(event);
        assert!(keyboard.is_pressed(Code::KeyA));
        assert!(!keyboard.poll().unwrap().repeat);
        assert!(keyboard.poll().unwrap().repeat);

        keyboard.release_all();
        assert!(!keyboard.is_pressed(Code::KeyA));
        assert_eq!(keyboard.poll().map(|e| e.state), Some(KeyState::Up));
    }

    #[test]
    fn joystick_state_grows() {
        let mut joystick = Joystick::new("pad");
        joystick.received(JoystickEvent::Button {
            index: 3,
            pressed: true,
        });
        joystick.received(JoystickEvent::Axis {
            index: 1,
            value: -0.5,
        });
        assert!(joystick.is_pressed(3));
        assert!(!joystick.is_pressed(0));
        assert_eq!(joystick.axis(1), -0.5);
        assert_eq!(joystick.axis(7), 0.0);
    }
}
