//! Keyboard decoding: UTF-16 reassembly, modifier state and layout fallback

use super::keymap::vk;
use crate::key::Modifiers;
use tracing::error;

/// Reassembles code points from UTF-16 units delivered one message at a time.
///
/// Invalid sequences are logged and dropped; the decoder is always left in a
/// clean state afterwards.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Utf16Decoder {
    high_surrogate: Option<u16>,
}

const fn is_high_surrogate(unit: u16) -> bool {
    matches!(unit, 0xD800..=0xDBFF)
}

const fn is_low_surrogate(unit: u16) -> bool {
    matches!(unit, 0xDC00..=0xDFFF)
}

/// Combine a surrogate pair into a code point
pub const fn decode_surrogate_pair(lead: u16, trail: u16) -> u32 {
    0x10000 + ((((lead & 0x3ff) as u32) << 10) | (trail & 0x3ff) as u32)
}

impl Utf16Decoder {
    /// Feed one unit. Returns a code point once one is complete.
    pub fn feed(&mut self, unit: u16) -> Option<u32> {
        if is_high_surrogate(unit) {
            self.high_surrogate = Some(unit);
            return None;
        }
        if is_low_surrogate(unit) {
            let Some(lead) = self.high_surrogate.take() else {
                error!(unit = format_args!("{unit:#06x}"), "invalid UTF-16 input");
                return None;
            };
            return Some(decode_surrogate_pair(lead, unit));
        }
        if self.high_surrogate.take().is_some() {
            error!(unit = format_args!("{unit:#06x}"), "invalid UTF-16 input");
            return None;
        }
        Some(unit as u32)
    }

    pub fn reset(&mut self) {
        self.high_surrogate = None;
    }

    pub fn is_pending(&self) -> bool {
        self.high_surrogate.is_some()
    }
}

/// Snapshot of the 256 virtual-key states; bit 0x80 means "down"
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyboardState(pub [u8; 256]);

impl Default for KeyboardState {
    fn default() -> Self {
        KeyboardState([0; 256])
    }
}

impl std::fmt::Debug for KeyboardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let down: Vec<String> = (0..256u32)
            .filter(|&k| self.is_down(k))
            .map(|k| format!("{k:#04x}"))
            .collect();
        f.debug_tuple("KeyboardState").field(&down).finish()
    }
}

impl KeyboardState {
    pub fn is_down(&self, vkey: u32) -> bool {
        self.0.get(vkey as usize).is_some_and(|s| s & 0x80 != 0)
    }

    pub fn press(&mut self, vkey: u32) {
        if let Some(s) = self.0.get_mut(vkey as usize) {
            *s |= 0x80;
        }
    }

    pub fn clear(&mut self, vkey: u32) {
        if let Some(s) = self.0.get_mut(vkey as usize) {
            *s = 0;
        }
    }

    /// AltGr is reported as left Ctrl + right Alt
    pub fn is_alt_gr(&self) -> bool {
        self.is_down(vk::RMENU) && self.is_down(vk::LCONTROL)
    }

    /// Modifiers as the player sees them.
    ///
    /// When the sink uses AltGr as a character modifier, it does not count as
    /// Ctrl+Alt.
    pub fn modifiers(&self, use_alt_gr: bool) -> Modifiers {
        let alt_gr = use_alt_gr && self.is_alt_gr();
        Modifiers {
            ctrl: self.is_down(vk::RCONTROL) || (self.is_down(vk::LCONTROL) && !alt_gr),
            shift: self.is_down(vk::SHIFT),
            alt: self.is_down(vk::LMENU) || (self.is_down(vk::RMENU) && !alt_gr),
        }
    }
}

/// Layout-dependent translation of a key press into a character, as the
/// window system would type it. Returns the last typed code point, a lone
/// UTF-16 unit, or 0.
pub trait Layout {
    fn to_unicode(&self, vkey: u32, scancode: u32, keys: &KeyboardState) -> u32;
}

/// Interpret a layout's UTF-16 output buffer.
///
/// `len` is the count the layout reported; a negative count marks a dead key
/// whose spacing character is still in the buffer. A trailing surrogate pair
/// is combined; anything else yields the last raw unit, lone surrogates
/// included.
pub fn last_typed_unit(buf: &[u16], len: i32) -> u32 {
    let len = (len.unsigned_abs() as usize).min(buf.len());
    if len == 0 {
        return 0;
    }
    if len >= 2 && is_high_surrogate(buf[len - 2]) && is_low_surrogate(buf[len - 1]) {
        return decode_surrogate_pair(buf[len - 2], buf[len - 1]);
    }
    buf[len - 1] as u32
}

/// Decode a key press that has no semantic mapping into a character.
///
/// Tries the real modifier state, then without Alt, then without Ctrl, until
/// the layout produces something printable. Lone surrogates (from injected
/// input) go through `utf16`.
pub fn decode_key(
    layout: &(impl Layout + ?Sized),
    mut keys: KeyboardState,
    vkey: u32,
    scancode: u32,
    use_alt_gr: bool,
    utf16: &mut Utf16Decoder,
) -> Option<u32> {
    if keys.is_alt_gr() && !use_alt_gr {
        keys.clear(vk::RMENU);
        keys.clear(vk::LCONTROL);
        keys.0[vk::MENU as usize] = keys.0[vk::LMENU as usize];
        keys.0[vk::CONTROL as usize] = keys.0[vk::RCONTROL as usize];
    }

    let mut c = layout.to_unicode(vkey, scancode, &keys);

    if c < 0x20 && keys.is_down(vk::MENU) {
        for k in [vk::LMENU, vk::RMENU, vk::MENU] {
            keys.clear(k);
        }
        c = layout.to_unicode(vkey, scancode, &keys);
    }
    if c < 0x20 && keys.is_down(vk::CONTROL) {
        for k in [vk::LCONTROL, vk::RCONTROL, vk::CONTROL] {
            keys.clear(k);
        }
        c = layout.to_unicode(vkey, scancode, &keys);
    }
    if c < 0x20 {
        return None;
    }

    if c < 0x10000 {
        return utf16.feed(c as u16);
    }
    Some(c)
}

/// Whether releasing `vkey` releases every held key.
///
/// Bare modifier releases don't, so a shortcut's modifier can be let go first.
pub fn releases_all(vkey: u32) -> bool {
    !matches!(vkey, vk::MENU | vk::CONTROL | vk::SHIFT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;

    /// US-like layout: letters and digits, Ctrl+letter gives a control code,
    /// Ctrl+Alt gives nothing
    struct TestLayout;

    impl Layout for TestLayout {
        fn to_unicode(&self, vkey: u32, _scancode: u32, keys: &KeyboardState) -> u32 {
            let ctrl = keys.is_down(vk::CONTROL);
            let alt = keys.is_down(vk::MENU);
            let shift = keys.is_down(vk::SHIFT);
            match vkey {
                0x41..=0x5A if ctrl && alt => 0,
                0x41..=0x5A if ctrl => vkey - 0x40,
                0x41..=0x5A if shift => vkey,
                0x41..=0x5A => vkey + 0x20,
                0x30..=0x39 => vkey,
                // A key that types a lone surrogate (injected input)
                0xE7 => 0xD83D,
                0xE8 => 0xDE00,
                _ => 0,
            }
        }
    }

    fn keys_with(down: &[u32]) -> KeyboardState {
        let mut keys = KeyboardState::default();
        for &k in down {
            keys.press(k);
        }
        keys
    }

    #[test]
    fn test_surrogate_pair() {
        let mut decoder = Utf16Decoder::default();
        assert!(decoder.feed(0xD83D).is_none());
        assert!(decoder.is_pending());
        assert!(decoder.feed(0xDE00) == Some(0x1F600));
        assert!(!decoder.is_pending());
    }

    #[test]
    fn test_lone_low_surrogate() {
        let mut decoder = Utf16Decoder::default();
        assert!(decoder.feed(0xDE00).is_none());
        assert!(!decoder.is_pending());
        assert!(decoder.feed(0x41) == Some(0x41));
    }

    #[test]
    fn test_high_surrogate_then_plain_unit() {
        let mut decoder = Utf16Decoder::default();
        decoder.feed(0xD83D);
        // The plain unit is swallowed with the broken pair
        assert!(decoder.feed(0x41).is_none());
        assert!(!decoder.is_pending());
        assert!(decoder.feed(0x42) == Some(0x42));
    }

    #[test]
    fn test_modifiers_alt_gr() {
        let alt_gr = keys_with(&[vk::LCONTROL, vk::CONTROL, vk::RMENU, vk::MENU]);
        assert!(alt_gr.modifiers(true).is_empty());
        let plain = alt_gr.modifiers(false);
        assert!(plain.ctrl);
        assert!(plain.alt);

        let right_ctrl = keys_with(&[vk::RCONTROL, vk::LCONTROL, vk::RMENU, vk::SHIFT]);
        let mods = right_ctrl.modifiers(true);
        assert!(mods.ctrl);
        assert!(mods.shift);
        assert!(!mods.alt);
    }

    #[test]
    fn test_decode_plain_and_shifted() {
        let mut utf16 = Utf16Decoder::default();
        let none = KeyboardState::default();
        assert!(decode_key(&TestLayout, none, 0x41, 0x1E, true, &mut utf16) == Some('a' as u32));
        let shift = keys_with(&[vk::SHIFT, vk::LSHIFT]);
        assert!(decode_key(&TestLayout, shift, 0x41, 0x1E, true, &mut utf16) == Some('A' as u32));
    }

    #[test]
    fn test_decode_falls_back_without_ctrl() {
        let mut utf16 = Utf16Decoder::default();
        // Ctrl+A yields 0x01 as-is; clearing Ctrl gives 'a'
        let ctrl = keys_with(&[vk::CONTROL, vk::LCONTROL]);
        assert!(decode_key(&TestLayout, ctrl, 0x41, 0x1E, true, &mut utf16) == Some('a' as u32));

        // Ctrl+Alt yields nothing, then Ctrl alone yields a control code,
        // then the bare key
        let ctrl_alt = keys_with(&[vk::CONTROL, vk::RCONTROL, vk::MENU, vk::LMENU]);
        assert!(decode_key(&TestLayout, ctrl_alt, 0x42, 0x30, true, &mut utf16) == Some('b' as u32));
    }

    #[test]
    fn test_decode_unprintable() {
        let mut utf16 = Utf16Decoder::default();
        assert!(decode_key(&TestLayout, KeyboardState::default(), 0x70, 0x3B, true, &mut utf16).is_none());
    }

    #[test]
    fn test_decode_lone_surrogates() {
        let mut utf16 = Utf16Decoder::default();
        let none = KeyboardState::default();
        assert!(decode_key(&TestLayout, none, 0xE7, 0, true, &mut utf16).is_none());
        assert!(decode_key(&TestLayout, none, 0xE8, 0, true, &mut utf16) == Some(0x1F600));
    }

    #[test]
    fn test_last_typed_unit() {
        assert!(last_typed_unit(&[0x61, 0x62], 2) == 'b' as u32);
        assert!(last_typed_unit(&[0x61], 0) == 0);
        // Dead acute accent: negative count, spacing form in the buffer
        assert!(last_typed_unit(&[0xB4, 0], -1) == 0xB4);
        assert!(last_typed_unit(&[0xD83D, 0xDE00], 2) == 0x1F600);
        assert!(last_typed_unit(&[0x61, 0xD83D], 2) == 0xD83D);
    }

    /// Layout backed by a fixed output buffer, like a native one
    struct BufferLayout(Vec<u16>, i32);

    impl Layout for BufferLayout {
        fn to_unicode(&self, _vkey: u32, _scancode: u32, _keys: &KeyboardState) -> u32 {
            last_typed_unit(&self.0, self.1)
        }
    }

    #[test]
    fn test_decode_dead_key_and_buffered_surrogates() {
        let mut utf16 = Utf16Decoder::default();
        let none = KeyboardState::default();
        let dead = BufferLayout(vec![0x5E], -1);
        assert!(decode_key(&dead, none, 0xDC, 0x29, true, &mut utf16) == Some('^' as u32));

        let high = BufferLayout(vec![0xD83D], 1);
        let low = BufferLayout(vec![0xDE00], 1);
        assert!(decode_key(&high, none, 0xE7, 0, true, &mut utf16).is_none());
        assert!(utf16.is_pending());
        assert!(decode_key(&low, none, 0xE7, 0, true, &mut utf16) == Some(0x1F600));
    }

    #[test]
    fn test_releases_all() {
        assert!(!releases_all(vk::SHIFT));
        assert!(!releases_all(vk::CONTROL));
        assert!(!releases_all(vk::MENU));
        assert!(releases_all(0x41));
        assert!(releases_all(vk::F10));
        // Side-specific codes are not bare modifier releases
        assert!(releases_all(vk::LSHIFT));
    }
}
