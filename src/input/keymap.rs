//! Default virtual-key -> semantic key table
//!
//! Keys that produce characters (letters, digits, punctuation) are absent on
//! purpose: they go through layout decoding so the user's keyboard layout
//! decides what they mean.

use crate::key::{Key, NamedKey};

/// Maps a virtual-key code (plus the extended-key bit) to a semantic key
pub type KeyMap = fn(vkey: u32, extended: bool) -> Option<Key>;

/// Virtual-key codes
pub mod vk {
    pub const BACK: u32 = 0x08;
    pub const TAB: u32 = 0x09;
    pub const RETURN: u32 = 0x0D;
    pub const SHIFT: u32 = 0x10;
    pub const CONTROL: u32 = 0x11;
    pub const MENU: u32 = 0x12;
    pub const PAUSE: u32 = 0x13;
    pub const ESCAPE: u32 = 0x1B;
    pub const SPACE: u32 = 0x20;
    pub const PRIOR: u32 = 0x21;
    pub const NEXT: u32 = 0x22;
    pub const END: u32 = 0x23;
    pub const HOME: u32 = 0x24;
    pub const LEFT: u32 = 0x25;
    pub const UP: u32 = 0x26;
    pub const RIGHT: u32 = 0x27;
    pub const DOWN: u32 = 0x28;
    pub const SNAPSHOT: u32 = 0x2C;
    pub const INSERT: u32 = 0x2D;
    pub const DELETE: u32 = 0x2E;
    pub const APPS: u32 = 0x5D;
    pub const NUMPAD0: u32 = 0x60;
    pub const NUMPAD9: u32 = 0x69;
    pub const DECIMAL: u32 = 0x6E;
    pub const F1: u32 = 0x70;
    pub const F10: u32 = 0x79;
    pub const F24: u32 = 0x87;
    pub const LSHIFT: u32 = 0xA0;
    pub const RSHIFT: u32 = 0xA1;
    pub const LCONTROL: u32 = 0xA2;
    pub const RCONTROL: u32 = 0xA3;
    pub const LMENU: u32 = 0xA4;
    pub const RMENU: u32 = 0xA5;
    pub const BROWSER_BACK: u32 = 0xA6;
    pub const BROWSER_FORWARD: u32 = 0xA7;
    pub const VOLUME_MUTE: u32 = 0xAD;
    pub const VOLUME_DOWN: u32 = 0xAE;
    pub const VOLUME_UP: u32 = 0xAF;
    pub const MEDIA_NEXT_TRACK: u32 = 0xB0;
    pub const MEDIA_PREV_TRACK: u32 = 0xB1;
    pub const MEDIA_STOP: u32 = 0xB2;
    pub const MEDIA_PLAY_PAUSE: u32 = 0xB3;
}

/// The default [`KeyMap`]
pub fn lookup(vkey: u32, extended: bool) -> Option<Key> {
    // Without the extended bit these come from the keypad with NumLock off
    if !extended {
        let keypad = match vkey {
            vk::RETURN => Some(NamedKey::Enter),
            vk::DELETE => Some(NamedKey::KpDelete),
            _ => None,
        };
        if keypad.is_some() {
            return keypad.map(Key::Named);
        }
    }

    let named = match vkey {
        vk::BACK => NamedKey::Backspace,
        vk::TAB => NamedKey::Tab,
        vk::RETURN => NamedKey::KpEnter,
        vk::PAUSE => NamedKey::Pause,
        vk::ESCAPE => NamedKey::Escape,
        vk::PRIOR => NamedKey::PageUp,
        vk::NEXT => NamedKey::PageDown,
        vk::END => NamedKey::End,
        vk::HOME => NamedKey::Home,
        vk::LEFT => NamedKey::Left,
        vk::UP => NamedKey::Up,
        vk::RIGHT => NamedKey::Right,
        vk::DOWN => NamedKey::Down,
        vk::SNAPSHOT => NamedKey::Print,
        vk::INSERT => NamedKey::Insert,
        vk::DELETE => NamedKey::Delete,
        vk::APPS => NamedKey::Menu,
        vk::NUMPAD0..=vk::NUMPAD9 => NamedKey::Kp((vkey - vk::NUMPAD0) as u8),
        vk::DECIMAL => NamedKey::KpDecimal,
        vk::F1..=vk::F24 => NamedKey::F((vkey - vk::F1 + 1) as u8),
        vk::BROWSER_BACK => NamedKey::Back,
        vk::BROWSER_FORWARD => NamedKey::Forward,
        vk::VOLUME_MUTE => NamedKey::Mute,
        vk::VOLUME_DOWN => NamedKey::VolumeDown,
        vk::VOLUME_UP => NamedKey::VolumeUp,
        vk::MEDIA_NEXT_TRACK => NamedKey::Next,
        vk::MEDIA_PREV_TRACK => NamedKey::Prev,
        vk::MEDIA_STOP => NamedKey::Stop,
        vk::MEDIA_PLAY_PAUSE => NamedKey::PlayPause,
        _ => return None,
    };
    Some(Key::Named(named))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;

    #[test]
    fn test_function_keys() {
        assert!(lookup(vk::F1, false) == Some(Key::Named(NamedKey::F(1))));
        assert!(lookup(vk::F10, false) == Some(Key::Named(NamedKey::F(10))));
        assert!(lookup(vk::F24, false) == Some(Key::Named(NamedKey::F(24))));
    }

    #[test]
    fn test_enter_and_delete_depend_on_extended_bit() {
        assert!(lookup(vk::RETURN, false) == Some(Key::Named(NamedKey::Enter)));
        assert!(lookup(vk::RETURN, true) == Some(Key::Named(NamedKey::KpEnter)));
        assert!(lookup(vk::DELETE, true) == Some(Key::Named(NamedKey::Delete)));
        assert!(lookup(vk::DELETE, false) == Some(Key::Named(NamedKey::KpDelete)));
    }

    #[test]
    fn test_characters_left_to_layout() {
        assert!(lookup(0x41, false).is_none());
        assert!(lookup(vk::SPACE, false).is_none());
        assert!(lookup(vk::SHIFT, false).is_none());
    }

    #[test]
    fn test_keypad_digits() {
        assert!(lookup(vk::NUMPAD0 + 7, false) == Some(Key::Named(NamedKey::Kp(7))));
    }
}
