//! Window state shared between the GUI thread and its callers
//!
//! Two halves:
//! 1. [`WindowState`]: everything derived from the native window. Owned by the
//!    GUI thread and only reachable from it (directly while handling a
//!    message, or from a dispatched task).
//! 2. [`SharedState`]: the few values other threads read without dispatch.
//!    Pending event flags, the last published client size, the native handle
//!    (immutable once created) and the lifecycle stage.

use crate::display::DisplayTracker;
use crate::geometry::{Rect, WindowGeometry};
use crate::input::decode::Utf16Decoder;
use crate::platform::NativeHandle;
use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use tracing::debug;

/// Pending notifications for the caller thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventFlags(u32);

impl EventFlags {
    /// Client size changed
    pub const RESIZE: EventFlags = EventFlags(1 << 0);
    /// Position, minimization or monitor-dependent state changed
    pub const WIN_STATE: EventFlags = EventFlags(1 << 1);
    /// Window needs repainting
    pub const EXPOSE: EventFlags = EventFlags(1 << 2);
    pub const ICC_PROFILE_CHANGED: EventFlags = EventFlags(1 << 3);

    pub const fn empty() -> Self {
        EventFlags(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        EventFlags(bits)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: EventFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for EventFlags {
    type Output = EventFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        EventFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Stage of the GUI thread's life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Unstarted = 0,
    Creating = 1,
    Running = 2,
    Terminating = 3,
    Exited = 4,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Lifecycle::Creating,
            2 => Lifecycle::Running,
            3 => Lifecycle::Terminating,
            4 => Lifecycle::Exited,
            _ => Lifecycle::Unstarted,
        }
    }
}

/// Called from the GUI thread whenever events are signalled
pub type EventCallback = Box<dyn Fn(EventFlags) + Send + Sync>;

pub struct SharedState {
    events: AtomicU32,
    client_size: AtomicU64,
    native_handle: AtomicU64,
    lifecycle: AtomicU8,
    on_events: Option<EventCallback>,
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("events", &self.pending())
            .field("client_size", &self.client_size())
            .field("native_handle", &self.native_handle())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

impl SharedState {
    pub fn new(on_events: Option<EventCallback>) -> Self {
        Self {
            events: AtomicU32::new(0),
            client_size: AtomicU64::new(0),
            native_handle: AtomicU64::new(0),
            lifecycle: AtomicU8::new(Lifecycle::Unstarted as u8),
            on_events,
        }
    }

    /// Add `flags` to the pending set and wake the caller.
    pub fn signal(&self, flags: EventFlags) {
        if flags.is_empty() {
            return;
        }
        self.events.fetch_or(flags.bits(), Ordering::AcqRel);
        if let Some(callback) = &self.on_events {
            callback(flags);
        }
    }

    /// Take every pending flag, leaving none behind.
    pub fn drain(&self) -> EventFlags {
        EventFlags::from_bits(self.events.swap(0, Ordering::AcqRel))
    }

    /// Pending flags, without draining them
    pub fn pending(&self) -> EventFlags {
        EventFlags::from_bits(self.events.load(Ordering::Acquire))
    }

    pub fn publish_client_size(&self, w: i32, h: i32) {
        let packed = ((w as u32 as u64) << 32) | (h as u32 as u64);
        self.client_size.store(packed, Ordering::Release);
    }

    pub fn client_size(&self) -> (i32, i32) {
        let packed = self.client_size.load(Ordering::Acquire);
        ((packed >> 32) as u32 as i32, packed as u32 as i32)
    }

    pub(crate) fn set_native_handle(&self, handle: Option<NativeHandle>) {
        self.native_handle
            .store(handle.map_or(0, |h| h.0), Ordering::Release);
    }

    pub fn native_handle(&self) -> Option<NativeHandle> {
        match self.native_handle.load(Ordering::Acquire) {
            0 => None,
            raw => Some(NativeHandle(raw)),
        }
    }

    pub(crate) fn set_lifecycle(&self, stage: Lifecycle) {
        let old = Lifecycle::from_u8(self.lifecycle.swap(stage as u8, Ordering::AcqRel));
        if old != stage {
            debug!(from = ?old, to = ?stage, "gui thread lifecycle");
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }
}

/// Playback snapshot pushed by the player for taskbar feedback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub playing: bool,
    pub paused: bool,
    /// 0-100
    pub percent_pos: u8,
    pub show_progress: bool,
}

/// Everything the GUI thread knows about its window
#[derive(Debug)]
pub struct WindowState {
    /// Embedding parent; most geometry handling is off when set
    pub parent: Option<NativeHandle>,
    pub geometry: WindowGeometry,
    /// Geometry is meaningless until the first reconfiguration
    pub bounds_initialized: bool,
    /// Destruction was already observed, never destroy again
    pub destroyed: bool,
    pub terminate: bool,
    /// Bounds of the screen used for placement
    pub screen_rect: Rect,
    pub display: DisplayTracker,
    pub utf16: Utf16Decoder,
    /// Logical content size from the last reconfiguration
    pub content_size: (i32, i32),
    pub cursor_visible: bool,
    /// Pointer is in the client area and the window isn't in menu mode
    pub can_set_cursor: bool,
    pub tracking_mouse: bool,
    pub mouse_pos: Option<(i32, i32)>,
    pub disable_screensaver: bool,
    pub taskbar_button_created: bool,
    pub playback: PlaybackState,
}

impl WindowState {
    pub fn new(parent: Option<NativeHandle>) -> Self {
        Self {
            parent,
            geometry: WindowGeometry::default(),
            bounds_initialized: false,
            destroyed: false,
            terminate: false,
            screen_rect: Rect::default(),
            display: DisplayTracker::default(),
            utf16: Utf16Decoder::default(),
            content_size: (0, 0),
            cursor_visible: true,
            can_set_cursor: false,
            tracking_mouse: false,
            mouse_pos: None,
            disable_screensaver: false,
            taskbar_button_created: false,
            playback: PlaybackState::default(),
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.parent.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_signal_and_drain() {
        let shared = SharedState::new(None);
        shared.signal(EventFlags::RESIZE);
        shared.signal(EventFlags::WIN_STATE | EventFlags::RESIZE);

        let drained = shared.drain();
        assert!(drained.contains(EventFlags::RESIZE));
        assert!(drained.contains(EventFlags::WIN_STATE));
        assert!(!drained.contains(EventFlags::EXPOSE));
        assert!(shared.drain().is_empty());
    }

    #[test]
    fn test_signal_from_many_threads() {
        let shared = Arc::new(SharedState::new(None));
        let flags = [
            EventFlags::RESIZE,
            EventFlags::WIN_STATE,
            EventFlags::EXPOSE,
            EventFlags::ICC_PROFILE_CHANGED,
        ];
        let handles: Vec<_> = flags
            .into_iter()
            .map(|flag| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || shared.signal(flag))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(shared.drain().bits() == 0b1111);
    }

    #[test]
    fn test_callback_sees_each_signal() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let shared = SharedState::new(Some(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })));
        shared.signal(EventFlags::EXPOSE);
        shared.signal(EventFlags::empty());
        assert!(count.load(Ordering::SeqCst) == 1);
    }

    #[test]
    fn test_client_size_packing() {
        let shared = SharedState::new(None);
        shared.publish_client_size(1920, 1080);
        assert!(shared.client_size() == (1920, 1080));
        shared.publish_client_size(-1, 7);
        assert!(shared.client_size() == (-1, 7));
    }

    #[test]
    fn test_native_handle_and_lifecycle() {
        let shared = SharedState::new(None);
        assert!(shared.native_handle().is_none());
        assert!(shared.lifecycle() == Lifecycle::Unstarted);

        shared.set_native_handle(Some(NativeHandle(0xBEEF)));
        shared.set_lifecycle(Lifecycle::Running);
        assert!(shared.native_handle() == Some(NativeHandle(0xBEEF)));
        assert!(shared.lifecycle() == Lifecycle::Running);
    }
}
