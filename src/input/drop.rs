//! Drag-and-drop target
//!
//! The backend owns the OS-side registration and hands what it receives to a
//! shared [`DropTarget`]. [`DropHandler`] is the implementation used by the
//! window: it accepts file lists and URLs and forwards them to the input sink.

use super::InputSink;
use crate::key::DropAction;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// Feedback shown to the user while dragging over the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropEffect {
    None,
    Copy,
    Move,
    Link,
}

/// Payload offered by the drag source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropData {
    Files(Vec<PathBuf>),
    Url(String),
    /// Anything else; refused
    Other,
}

impl DropData {
    fn is_supported(&self) -> bool {
        !matches!(self, DropData::Other)
    }
}

pub trait DropTarget: Send + Sync {
    /// Drag entered the window. `proposed` is what the source allows.
    fn on_enter(&self, data: &DropData, proposed: DropEffect) -> DropEffect;
    fn on_over(&self) -> DropEffect;
    fn on_leave(&self);
    /// `append` is set when Shift was held at drop time.
    fn on_drop(&self, data: DropData, append: bool) -> DropEffect;
}

pub struct DropHandler {
    sink: Arc<dyn InputSink>,
    last_effect: Mutex<DropEffect>,
}

impl DropHandler {
    pub fn new(sink: Arc<dyn InputSink>) -> Self {
        Self {
            sink,
            last_effect: Mutex::new(DropEffect::None),
        }
    }

    fn set_effect(&self, effect: DropEffect) {
        *self.last_effect.lock().unwrap_or_else(|e| e.into_inner()) = effect;
    }

    fn effect(&self) -> DropEffect {
        *self.last_effect.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DropTarget for DropHandler {
    fn on_enter(&self, data: &DropData, proposed: DropEffect) -> DropEffect {
        let effect = if data.is_supported() {
            proposed
        } else {
            DropEffect::None
        };
        self.set_effect(effect);
        effect
    }

    fn on_over(&self) -> DropEffect {
        self.effect()
    }

    fn on_leave(&self) {}

    fn on_drop(&self, data: DropData, append: bool) -> DropEffect {
        let action = if append {
            DropAction::Append
        } else {
            DropAction::Replace
        };

        match data {
            DropData::Files(paths) => {
                for path in &paths {
                    debug!(path = %path.display(), "received dropped file");
                }
                self.sink.drop_files(paths, action);
            }
            DropData::Url(url) => {
                if self.sink.drop_text("text/uri-list", url.clone(), action) {
                    debug!(%url, "received dropped URL");
                } else {
                    error!(%url, "error getting dropped URL");
                }
            }
            DropData::Other => self.set_effect(DropEffect::None),
        }
        self.effect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::RecordingSink;
    use crate::key::InputEvent;
    use assert2::assert;

    fn handler() -> (Arc<RecordingSink>, DropHandler) {
        let sink = Arc::new(RecordingSink::default());
        let handler = DropHandler::new(sink.clone());
        (sink, handler)
    }

    #[test]
    fn test_drop_files_replaces() {
        let (sink, handler) = handler();
        let data = DropData::Files(vec![PathBuf::from("a.mkv"), PathBuf::from("b.mkv")]);
        assert!(handler.on_enter(&data, DropEffect::Copy) == DropEffect::Copy);
        assert!(handler.on_over() == DropEffect::Copy);
        assert!(handler.on_drop(data, false) == DropEffect::Copy);

        assert!(
            sink.events()
                == vec![InputEvent::DropFiles {
                    paths: vec![PathBuf::from("a.mkv"), PathBuf::from("b.mkv")],
                    action: DropAction::Replace,
                }]
        );
    }

    #[test]
    fn test_drop_url_with_shift_appends() {
        let (sink, handler) = handler();
        let data = DropData::Url("https://example.com/v.webm".into());
        handler.on_enter(&data, DropEffect::Link);
        handler.on_drop(data, true);

        assert!(
            sink.events()
                == vec![InputEvent::DropText {
                    mime_type: "text/uri-list".into(),
                    text: "https://example.com/v.webm".into(),
                    action: DropAction::Append,
                }]
        );
    }

    #[test]
    fn test_unsupported_data_refused() {
        let (sink, handler) = handler();
        assert!(handler.on_enter(&DropData::Other, DropEffect::Copy) == DropEffect::None);
        assert!(handler.on_over() == DropEffect::None);
        handler.on_leave();
        assert!(handler.on_drop(DropData::Other, false) == DropEffect::None);
        assert!(sink.events().is_empty());
    }
}
