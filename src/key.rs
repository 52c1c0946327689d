//! Player-agnostic key and input event model
//!
//! Platform backends deliver raw virtual-key codes; the GUI thread turns them
//! into the semantic [`Key`] values defined here before handing them to the
//! input sink. Nothing in this module knows about a particular window system.

use std::path::PathBuf;

/// Named (non-character) keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Escape,
    Enter,
    Backspace,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    Pause,
    Print,
    Menu,
    /// Function keys F1-F24
    F(u8),
    KpEnter,
    KpDecimal,
    KpDelete,
    /// Keypad digits 0-9
    Kp(u8),
    PlayPause,
    Stop,
    Next,
    Prev,
    VolumeUp,
    VolumeDown,
    Mute,
    Back,
    Forward,
}

/// Mouse buttons, including the wheel directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    Back,
    Forward,
}

/// Semantic key, as understood by the player's input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable character (Unicode scalar value)
    Char(char),
    Named(NamedKey),
    Mouse(MouseButton),
    /// The user asked the window to close
    CloseWindow,
    MouseEnter,
    MouseLeave,
}

impl Key {
    /// Build a character key from a decoded code point.
    ///
    /// Returns `None` for surrogates and values outside the Unicode range.
    pub fn from_codepoint(cp: u32) -> Option<Self> {
        char::from_u32(cp).map(Key::Char)
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Named(NamedKey::F(n)) => write!(f, "F{n}"),
            Key::Named(NamedKey::Kp(n)) => write!(f, "KP{n}"),
            Key::Named(named) => write!(f, "{named:?}"),
            Key::Mouse(button) => write!(f, "MOUSE_{button:?}"),
            Key::CloseWindow => f.write_str("CLOSE_WIN"),
            Key::MouseEnter => f.write_str("MOUSE_ENTER"),
            Key::MouseLeave => f.write_str("MOUSE_LEAVE"),
        }
    }
}

/// Modifier keys held while a key event was generated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
    };

    pub fn is_empty(&self) -> bool {
        !self.ctrl && !self.shift && !self.alt
    }
}

/// Whether a key went down, came up, or was a single press (characters, wheel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    Down,
    Up,
    Press,
}

/// A decoded key event delivered to the input sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
    pub state: KeyState,
}

impl KeyEvent {
    pub fn new(key: Key, modifiers: Modifiers, state: KeyState) -> Self {
        Self {
            key,
            modifiers,
            state,
        }
    }

    /// A bare press with no modifiers (close requests, enter/leave)
    pub fn press(key: Key) -> Self {
        Self::new(key, Modifiers::NONE, KeyState::Press)
    }
}

/// What to do with dropped content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropAction {
    Replace,
    Append,
}

/// Everything the window can emit towards the player, as one stream.
///
/// Used by channel-based sinks; see [`crate::input::ChannelSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Release every key currently considered held
    ReleaseAll,
    MouseMove { x: i32, y: i32 },
    DropFiles {
        paths: Vec<PathBuf>,
        action: DropAction,
    },
    DropText {
        mime_type: String,
        text: String,
        action: DropAction,
    },
}
