//! Configuration type definitions
//!
//! Contains the data structures representing parsed configuration.

use crate::geometry::MonitorSelector;
use serde::Deserialize;
use std::ops::Range;

/// Byte span in the source file
pub type Span = Range<usize>;

/// A value with its source location, kept until validation is done
#[derive(Debug, Clone)]
pub struct Spanned<T> {
    value: T,
    span: Span,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Initial client-area position, `position = { x = 100, y = 100 }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// Everything the window needs to know about the user's preferences
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOptions {
    pub title: String,
    pub fullscreen: bool,
    /// Keep the window above all non-topmost windows
    pub ontop: bool,
    /// Draw the window-system decoration
    pub border: bool,
    /// Shrink oversized windows so the decoration fits too, not just the client area
    pub fit_border: bool,
    pub keepaspect: bool,
    /// Keep the content aspect while the user resizes the window
    pub keepaspect_window: bool,
    /// Monitor for windowed placement
    pub screen: MonitorSelector,
    /// Monitor for fullscreen; `all` spans every monitor
    pub fs_screen: MonitorSelector,
    /// Foreign window to embed into
    pub wid: Option<u64>,
    /// Initial client position; centred on the screen when unset
    pub position: Option<Position>,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "video".to_string(),
            fullscreen: false,
            ontop: false,
            border: true,
            fit_border: true,
            keepaspect: true,
            keepaspect_window: true,
            screen: MonitorSelector::Current,
            fs_screen: MonitorSelector::Current,
            wid: None,
            position: None,
        }
    }
}

impl WindowOptions {
    /// Selector for the placement mode the window is in
    pub fn selector(&self, fullscreen: bool) -> &MonitorSelector {
        if fullscreen {
            &self.fs_screen
        } else {
            &self.screen
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;

    #[test]
    fn test_spanned_parts() {
        let spanned = Spanned::new(MonitorSelector::Primary, 9..16);
        assert!(spanned.value() == &MonitorSelector::Primary);
        assert!(spanned.span() == &(9..16));
        assert!(spanned.into_inner() == MonitorSelector::Primary);
    }

    #[test]
    fn test_selector_per_mode() {
        let options = WindowOptions {
            screen: MonitorSelector::Index(1),
            fs_screen: MonitorSelector::All,
            ..Default::default()
        };
        assert!(options.selector(false) == &MonitorSelector::Index(1));
        assert!(options.selector(true) == &MonitorSelector::All);
    }
}
