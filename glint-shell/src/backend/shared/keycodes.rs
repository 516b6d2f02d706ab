// Copyright 2020 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Physical key codes.
//!
//! Both supported platforms report keys by position: Win32 as PC/AT set 1 scan codes, X11
//! as evdev codes offset by 8. Evdev numbers the main block the same way set 1 does, so
//! one table serves both.

use crate::keyboard_types::{Code, Key, Modifiers};

/// Set 1 scan codes `0x00..=0x58`, without the `0xE0` prefix.
#[rustfmt::skip]
const MAIN_BLOCK: [Code; 0x59] = [
    Code::Unidentified, Code::Escape, Code::Digit1, Code::Digit2,
    Code::Digit3, Code::Digit4, Code::Digit5, Code::Digit6,
    Code::Digit7, Code::Digit8, Code::Digit9, Code::Digit0,
    Code::Minus, Code::Equal, Code::Backspace, Code::Tab,
    Code::KeyQ, Code::KeyW, Code::KeyE, Code::KeyR,
    Code::KeyT, Code::KeyY, Code::KeyU, Code::KeyI,
    Code::KeyO, Code::KeyP, Code::BracketLeft, Code::BracketRight,
    Code::Enter, Code::ControlLeft, Code::KeyA, Code::KeyS,
    Code::KeyD, Code::KeyF, Code::KeyG, Code::KeyH,
    Code::KeyJ, Code::KeyK, Code::KeyL, Code::Semicolon,
    Code::Quote, Code::Backquote, Code::ShiftLeft, Code::Backslash,
    Code::KeyZ, Code::KeyX, Code::KeyC, Code::KeyV,
    Code::KeyB, Code::KeyN, Code::KeyM, Code::Comma,
    Code::Period, Code::Slash, Code::ShiftRight, Code::NumpadMultiply,
    Code::AltLeft, Code::Space, Code::CapsLock, Code::F1,
    Code::F2, Code::F3, Code::F4, Code::F5,
    Code::F6, Code::F7, Code::F8, Code::F9,
    Code::F10, Code::NumLock, Code::ScrollLock, Code::Numpad7,
    Code::Numpad8, Code::Numpad9, Code::NumpadSubtract, Code::Numpad4,
    Code::Numpad5, Code::Numpad6, Code::NumpadAdd, Code::Numpad1,
    Code::Numpad2, Code::Numpad3, Code::Numpad0, Code::NumpadDecimal,
    Code::Unidentified, Code::Unidentified, Code::IntlBackslash, Code::F11,
    Code::F12,
];

/// Maps a set 1 scan code to a code. `extended` is set for `0xE0` prefixed codes.
pub(crate) fn scan_to_code(scan: u16, extended: bool) -> Code {
    if !extended {
        return MAIN_BLOCK
            .get(scan as usize)
            .copied()
            .unwrap_or(Code::Unidentified);
    }
    match scan {
        0x1C => Code::NumpadEnter,
        0x1D => Code::ControlRight,
        0x35 => Code::NumpadDivide,
        0x37 => Code::PrintScreen,
        0x38 => Code::AltRight,
        0x47 => Code::Home,
        0x48 => Code::ArrowUp,
        0x49 => Code::PageUp,
        0x4B => Code::ArrowLeft,
        0x4D => Code::ArrowRight,
        0x4F => Code::End,
        0x50 => Code::ArrowDown,
        0x51 => Code::PageDown,
        0x52 => Code::Insert,
        0x53 => Code::Delete,
        0x5B => Code::MetaLeft,
        0x5C => Code::MetaRight,
        0x5D => Code::ContextMenu,
        _ => Code::Unidentified,
    }
}

/// Maps an X11 hardware keycode to a code.
pub(crate) fn x11_keycode_to_code(keycode: u8) -> Code {
    let evdev = u16::from(keycode.saturating_sub(8));
    match evdev {
        0..=0x58 => scan_to_code(evdev, false),
        96 => Code::NumpadEnter,
        97 => Code::ControlRight,
        98 => Code::NumpadDivide,
        99 => Code::PrintScreen,
        100 => Code::AltRight,
        102 => Code::Home,
        103 => Code::ArrowUp,
        104 => Code::PageUp,
        105 => Code::ArrowLeft,
        106 => Code::ArrowRight,
        107 => Code::End,
        108 => Code::ArrowDown,
        109 => Code::PageDown,
        110 => Code::Insert,
        111 => Code::Delete,
        119 => Code::Pause,
        125 => Code::MetaLeft,
        126 => Code::MetaRight,
        127 => Code::ContextMenu,
        _ => Code::Unidentified,
    }
}

/// The key a code produces on a US layout.
///
/// There is no keymap lookup; applications that need the layout's characters should use the
/// platform's text input instead.
pub(crate) fn code_to_key(code: Code, mods: Modifiers) -> Key {
    let shift = mods.contains(Modifiers::SHIFT);
    let numpad = mods.contains(Modifiers::NUM_LOCK) != shift;
    let pick = |base: &str, shifted: &str| {
        Key::Character(if shift { shifted } else { base }.to_string())
    };
    let keypad = |navigation: Key, digit: &str| {
        if numpad {
            Key::Character(digit.to_string())
        } else {
            navigation
        }
    };

    if let Some(letter) = letter(code) {
        let letter = if shift != mods.contains(Modifiers::CAPS_LOCK) {
            letter.to_ascii_uppercase()
        } else {
            letter
        };
        return Key::Character(letter.to_string());
    }
    match code {
        Code::Digit1 => pick("1", "!"),
        Code::Digit2 => pick("2", "@"),
        Code::Digit3 => pick("3", "#"),
        Code::Digit4 => pick("4", "$"),
        Code::Digit5 => pick("5", "%"),
        Code::Digit6 => pick("6", "^"),
        Code::Digit7 => pick("7", "&"),
        Code::Digit8 => pick("8", "*"),
        Code::Digit9 => pick("9", "("),
        Code::Digit0 => pick("0", ")"),
        Code::Minus => pick("-", "_"),
        Code::Equal => pick("=", "+"),
        Code::BracketLeft => pick("[", "{"),
        Code::BracketRight => pick("]", "}"),
        Code::Semicolon => pick(";", ":"),
        Code::Quote => pick("'", "\""),
        Code::Backquote => pick("`", "~"),
        Code::Backslash | Code::IntlBackslash => pick("\\", "|"),
        Code::Comma => pick(",", "<"),
        Code::Period => pick(".", ">"),
        Code::Slash => pick("/", "?"),
        Code::Space => Key::Character(" ".to_string()),
        Code::NumpadMultiply => Key::Character("*".to_string()),
        Code::NumpadSubtract => Key::Character("-".to_string()),
        Code::NumpadAdd => Key::Character("+".to_string()),
        Code::NumpadDivide => Key::Character("/".to_string()),
        Code::Numpad0 => keypad(Key::Insert, "0"),
        Code::Numpad1 => keypad(Key::End, "1"),
        Code::Numpad2 => keypad(Key::ArrowDown, "2"),
        Code::Numpad3 => keypad(Key::PageDown, "3"),
        Code::Numpad4 => keypad(Key::ArrowLeft, "4"),
        Code::Numpad5 => keypad(Key::Clear, "5"),
        Code::Numpad6 => keypad(Key::ArrowRight, "6"),
        Code::Numpad7 => keypad(Key::Home, "7"),
        Code::Numpad8 => keypad(Key::ArrowUp, "8"),
        Code::Numpad9 => keypad(Key::PageUp, "9"),
        Code::NumpadDecimal => keypad(Key::Delete, "."),
        Code::Escape => Key::Escape,
        Code::Backspace => Key::Backspace,
        Code::Tab => Key::Tab,
        Code::Enter | Code::NumpadEnter => Key::Enter,
        Code::ShiftLeft | Code::ShiftRight => Key::Shift,
        Code::ControlLeft | Code::ControlRight => Key::Control,
        Code::AltLeft | Code::AltRight => Key::Alt,
        Code::MetaLeft | Code::MetaRight => Key::Meta,
        Code::CapsLock => Key::CapsLock,
        Code::NumLock => Key::NumLock,
        Code::ScrollLock => Key::ScrollLock,
        Code::F1 => Key::F1,
        Code::F2 => Key::F2,
        Code::F3 => Key::F3,
        Code::F4 => Key::F4,
        Code::F5 => Key::F5,
        Code::F6 => Key::F6,
        Code::F7 => Key::F7,
        Code::F8 => Key::F8,
        Code::F9 => Key::F9,
        Code::F10 => Key::F10,
        Code::F11 => Key::F11,
        Code::F12 => Key::F12,
        Code::Home => Key::Home,
        Code::End => Key::End,
        Code::PageUp => Key::PageUp,
        Code::PageDown => Key::PageDown,
        Code::ArrowUp => Key::ArrowUp,
        Code::ArrowDown => Key::ArrowDown,
        Code::ArrowLeft => Key::ArrowLeft,
        Code::ArrowRight => Key::ArrowRight,
        Code::Insert => Key::Insert,
        Code::Delete => Key::Delete,
        Code::PrintScreen => Key::PrintScreen,
        Code::Pause => Key::Pause,
        Code::ContextMenu => Key::ContextMenu,
        _ => Key::Unidentified,
    }
}

fn letter(code: Code) -> Option<char> {
    let letter = match code {
        Code::KeyA => 'a',
        Code::KeyB => 'b',
        Code::KeyC => 'c',
        Code::KeyD => 'd',
        Code::KeyE => 'e',
        Code::KeyF => 'f',
        Code::KeyG => 'g',
        Code::KeyH => 'h',
        Code::KeyI => 'i',
        Code::KeyJ => 'j',
        Code::KeyK => 'k',
        Code::KeyL => 'l',
        Code::KeyM => 'm',
        Code::KeyN => 'n',
        Code::KeyO => 'o',
        Code::KeyP => 'p',
        Code::KeyQ => 'q',
        Code::KeyR => 'r',
        Code::KeyS => 's',
        Code::KeyT => 't',
        Code::KeyU => 'u',
        Code::KeyV => 'v',
        Code::KeyW => 'w',
        Code::KeyX => 'x',
        Code::KeyY => 'y',
        Code::KeyZ => 'z',
        _ => return None,
    };
    Some(letter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_numberings_agree() {
        assert_eq!(scan_to_code(0x1E, false), Code::KeyA);
        assert_eq!(x11_keycode_to_code(0x26), Code::KeyA);
        assert_eq!(scan_to_code(0x48, true), Code::ArrowUp);
        assert_eq!(x11_keycode_to_code(111), Code::ArrowUp);
        assert_eq!(scan_to_code(0x200, false), Code::Unidentified);
    }

    #[test]
    fn shift_and_caps_lock() {
        let lower = Key::Character("q".into());
        let upper = Key::Character("Q".into());
        assert_eq!(code_to_key(Code::KeyQ, Modifiers::empty()), lower);
        assert_eq!(code_to_key(Code::KeyQ, Modifiers::SHIFT), upper);
        assert_eq!(
            code_to_key(Code::KeyQ, Modifiers::SHIFT | Modifiers::CAPS_LOCK),
            lower
        );
        assert_eq!(code_to_key(Code::Numpad8, Modifiers::empty()), Key::ArrowUp);
        assert_eq!(
            code_to_key(Code::Numpad8, Modifiers::NUM_LOCK),
            Key::Character("8".into())
        );
    }
}
