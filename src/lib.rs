//! Native video output window
//!
//! A window owned by a dedicated GUI thread. The player side talks to it
//! through [`VideoWindow`] / [`WindowHandle`]: synchronous control requests,
//! content-driven resizing and a set of pending event flags. Keyboard, mouse
//! and drag-and-drop input is decoded on the GUI thread and pushed into an
//! [`InputSink`].
//!
//! The window system itself sits behind [`platform::Platform`]; Win32 is the
//! native backend and [`platform::headless`] runs everywhere.

pub mod config;
pub mod control;
pub mod dispatch;
pub mod display;
pub mod geometry;
pub(crate) mod gui;
pub mod input;
pub mod key;
pub mod platform;
pub mod state;

pub use config::WindowOptions;
pub use control::{
    ControlError, ControlStatus, CreateError, Request, Response, VideoWindow, WindowBuilder,
    WindowHandle, status_of,
};
pub use geometry::MonitorSelector;
pub use input::{ChannelSink, InputSink};
pub use key::{InputEvent, Key, KeyEvent, KeyState, Modifiers};
pub use state::{EventFlags, Lifecycle, PlaybackState};
