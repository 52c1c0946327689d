//! Platform abstraction layer
//!
//! Provides a unified interface for:
//! - Native window creation and the blocking message pump
//! - Translating window-system messages into [`Message`] values
//! - Window manipulation (placement, style, cursor, capture, taskbar)
//! - Monitor and display queries
//!
//! Each backend implements [`Platform`] (process/thread-level services and the
//! message loop) and [`NativeWindow`] (one window). Both are only ever used
//! from the GUI thread; the window value never leaves it.
//!
//! Backends:
//! - `windows`: Win32
//! - `headless`: an in-memory window system, used by tests and by the demo on
//!   hosts without a native backend

pub mod headless;
#[cfg(windows)]
pub mod windows;

use crate::dispatch::Wakeup;
use crate::display::DisplayInfo;
use crate::geometry::{Borders, FrameMetrics, HitArea, MonitorId, MonitorLayout, Rect, ResizeEdge};
use crate::input::decode::{KeyboardState, Layout};
use crate::input::drop::DropTarget;
use crate::key::MouseButton;
use crate::state::PlaybackState;
use std::sync::Arc;
use thiserror::Error;

/// Raw native window handle (HWND on Windows), as an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

/// Window decoration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStyle {
    /// Title bar and sizing frame
    Framed,
    /// No decoration at all (fullscreen, or `border = false`)
    Borderless,
    /// Embedded into a foreign parent window
    Child,
}

/// Z-order band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowLayer {
    Normal,
    TopMost,
}

/// System sleep / screensaver policy for the GUI thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Let the system idle normally
    Default,
    /// Keep display and system awake
    KeepAwake,
}

/// Progress indicator on the taskbar button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskbarProgress {
    Hidden,
    Normal(u8),
    Paused(u8),
}

impl TaskbarProgress {
    pub fn from_playback(state: &PlaybackState) -> Self {
        if !state.playing || !state.show_progress {
            return TaskbarProgress::Hidden;
        }
        let percent = state.percent_pos.min(100);
        if state.paused {
            TaskbarProgress::Paused(percent)
        } else {
            TaskbarProgress::Normal(percent)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateParams {
    pub title: String,
    pub parent: Option<NativeHandle>,
    pub style: WindowStyle,
}

/// A window-system message, already decoded from its native form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The dispatch queue has work
    Wake,
    Paint,
    /// Client area moved; screen coordinates of its top-left
    Moved { x: i32, y: i32 },
    /// Client area resized (0x0 when minimized)
    Resized { w: i32, h: i32 },
    /// Interactive resize in progress; `rect` is the proposed window rect
    Sizing { edge: ResizeEdge, rect: Rect },
    /// User asked to close the window
    Close,
    /// The native window is gone
    Destroyed,
    /// System wants to start the screensaver or power off the monitor
    ScreensaverRequest,
    /// Non-client hit test at screen coordinates
    HitTest { x: i32, y: i32 },
    KeyDown {
        vkey: u32,
        scancode: u32,
        extended: bool,
        repeat: bool,
        /// Delivered as a system key (Alt held)
        sys: bool,
    },
    KeyUp { vkey: u32 },
    /// One UTF-16 unit of typed text
    Char { unit: u16 },
    FocusLost,
    /// Cursor shape requested; `in_client` when over the client area and not
    /// in menu mode
    SetCursor { in_client: bool },
    /// Client coordinates
    MouseMove { x: i32, y: i32 },
    MouseLeave,
    MouseButton {
        button: MouseButton,
        down: bool,
        x: i32,
        y: i32,
    },
    Wheel { delta: i32, x: i32, y: i32 },
    /// Display mode or monitor arrangement changed
    DisplayChanged,
    /// The shell created our taskbar button
    TaskbarButtonCreated,
}

/// How the handler dealt with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Let the window system apply its default handling
    Default,
    /// Handled; suppress default handling
    Consumed,
    /// Replacement window rect for [`Message::Sizing`]
    Sizing(Rect),
    /// Answer to [`Message::HitTest`]
    HitTest(HitArea),
}

/// Receives messages from the pump
pub trait MessageHandler {
    fn handle(&mut self, message: Message) -> Reply;
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("unable to create window: {0}")]
    CreateWindow(String),
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
    #[error("{call} failed: {message}")]
    Os { call: &'static str, message: String },
}

/// Thread-level services and the message loop
pub trait Platform: Send + 'static {
    type Window: NativeWindow + 'static;

    /// Turn off input method editors for windows of the calling thread.
    fn disable_ime(&mut self) {}

    fn create_window(&mut self, params: &CreateParams) -> Result<Self::Window, PlatformError>;

    /// Pump messages into `handler` until the window is destroyed.
    fn run_message_loop(&mut self, handler: &mut (dyn MessageHandler + 'static));
}

/// One native window, used only from the thread that created it
pub trait NativeWindow: Layout {
    fn native_handle(&self) -> NativeHandle;

    /// Thread-safe hook that makes the pump deliver [`Message::Wake`].
    /// Does nothing once the window is destroyed.
    fn waker(&self) -> Wakeup;

    /// Decoration thickness for `style`
    fn borders(&self, style: WindowStyle) -> Borders;

    fn set_style(&mut self, style: WindowStyle);

    /// Move/resize to the window rect (decoration included) and show the window.
    fn set_placement(&mut self, window: Rect, layer: WindowLayer);

    fn client_size(&self) -> (i32, i32);

    fn is_minimized(&self) -> bool;

    fn is_maximized(&self) -> bool;

    /// Monitor the window system associates with the window
    fn current_monitor(&self) -> MonitorId;

    fn monitor_layout(&self) -> MonitorLayout;

    fn display_info(&self, monitor: MonitorId) -> DisplayInfo;

    fn frame_metrics(&self) -> FrameMetrics;

    fn keyboard_state(&self) -> KeyboardState;

    fn set_title(&mut self, title: &str) -> Result<(), PlatformError>;

    fn set_cursor_visible(&mut self, visible: bool);

    /// Ask for a [`Message::MouseLeave`] once the pointer leaves.
    /// Returns false if tracking could not be set up.
    fn track_mouse_leave(&mut self) -> bool;

    fn set_capture(&mut self, capture: bool);

    /// Start a window-system move of the window, as if the title bar was grabbed.
    fn begin_drag(&mut self);

    fn open_system_menu(&mut self);

    fn set_enabled(&mut self, enabled: bool);

    fn set_execution_state(&mut self, state: ExecutionState) -> Result<(), PlatformError>;

    fn register_drop_target(&mut self, target: Arc<dyn DropTarget>) -> Result<(), PlatformError>;

    fn revoke_drop_target(&mut self);

    /// Acquire the taskbar integration. [`Message::TaskbarButtonCreated`]
    /// follows once the shell is ready.
    fn init_taskbar(&mut self) -> Result<(), PlatformError>;

    fn set_taskbar_progress(&mut self, progress: TaskbarProgress) -> Result<(), PlatformError>;

    /// Tell the shell the window is fullscreen, so the taskbar hides.
    fn mark_fullscreen(&mut self, fullscreen: bool);

    /// Destroy the native window. A [`Message::Destroyed`] follows and the
    /// message loop ends.
    fn destroy(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;

    #[test]
    fn test_taskbar_progress_from_playback() {
        let mut state = PlaybackState {
            playing: true,
            paused: false,
            percent_pos: 42,
            show_progress: true,
        };
        assert!(TaskbarProgress::from_playback(&state) == TaskbarProgress::Normal(42));

        state.paused = true;
        assert!(TaskbarProgress::from_playback(&state) == TaskbarProgress::Paused(42));

        state.show_progress = false;
        assert!(TaskbarProgress::from_playback(&state) == TaskbarProgress::Hidden);

        let stopped = PlaybackState::default();
        assert!(TaskbarProgress::from_playback(&stopped) == TaskbarProgress::Hidden);
    }
}
