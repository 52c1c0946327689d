//! Input plumbing between the window and the player
//!
//! - [`InputSink`]: where decoded events go (the player's input layer)
//! - [`decode`]: UTF-16 reassembly and layout-dependent key decoding
//! - [`keymap`]: the default virtual-key table
//! - [`drop`]: the drag-and-drop target

pub mod decode;
pub mod drop;
pub mod keymap;

use crate::key::{DropAction, InputEvent, KeyEvent};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::trace;

/// Consumer of everything the window decodes.
///
/// Called from the GUI thread; implementations must not block on it.
pub trait InputSink: Send + Sync {
    fn put_key(&self, event: KeyEvent);

    /// Release every key currently held
    fn release_all(&self);

    fn mouse_move(&self, x: i32, y: i32);

    fn drop_files(&self, paths: Vec<PathBuf>, action: DropAction);

    /// Returns false if the data was rejected.
    fn drop_text(&self, mime_type: &str, text: String, action: DropAction) -> bool;

    /// Treat AltGr as a character modifier rather than Ctrl+Alt
    fn use_alt_gr(&self) -> bool {
        true
    }

    /// Whether mouse buttons are bound at all
    fn mouse_enabled(&self) -> bool {
        true
    }

    /// True if a binding claims the point, so a press there must not start
    /// a window drag.
    fn test_dragging(&self, _x: i32, _y: i32) -> bool {
        false
    }
}

/// Forwards every event into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<InputEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InputEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: InputEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(err) => {
                trace!(event = ?err.0, "input receiver gone, dropping event");
                false
            }
        }
    }
}

impl InputSink for ChannelSink {
    fn put_key(&self, event: KeyEvent) {
        self.send(InputEvent::Key(event));
    }

    fn release_all(&self) {
        self.send(InputEvent::ReleaseAll);
    }

    fn mouse_move(&self, x: i32, y: i32) {
        self.send(InputEvent::MouseMove { x, y });
    }

    fn drop_files(&self, paths: Vec<PathBuf>, action: DropAction) {
        self.send(InputEvent::DropFiles { paths, action });
    }

    fn drop_text(&self, mime_type: &str, text: String, action: DropAction) -> bool {
        self.send(InputEvent::DropText {
            mime_type: mime_type.to_string(),
            text,
            action,
        })
    }
}

/// Sink that records events for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    events: std::sync::Mutex<Vec<InputEvent>>,
    /// Answer for `test_dragging`
    pub claims_drag: std::sync::atomic::AtomicBool,
    pub no_alt_gr: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingSink {
    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<InputEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    fn push(&self, event: InputEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
impl InputSink for RecordingSink {
    fn put_key(&self, event: KeyEvent) {
        self.push(InputEvent::Key(event));
    }

    fn release_all(&self) {
        self.push(InputEvent::ReleaseAll);
    }

    fn mouse_move(&self, x: i32, y: i32) {
        self.push(InputEvent::MouseMove { x, y });
    }

    fn drop_files(&self, paths: Vec<PathBuf>, action: DropAction) {
        self.push(InputEvent::DropFiles { paths, action });
    }

    fn drop_text(&self, mime_type: &str, text: String, action: DropAction) -> bool {
        self.push(InputEvent::DropText {
            mime_type: mime_type.to_string(),
            text,
            action,
        });
        true
    }

    fn use_alt_gr(&self) -> bool {
        !self.no_alt_gr.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn test_dragging(&self, _x: i32, _y: i32) -> bool {
        self.claims_drag.load(std::sync::atomic::Ordering::SeqCst)
    }
}
