//! Configuration loading, parsing, and validation
//!
//! This module handles:
//! - Loading window options from a TOML file
//! - Parsing with span preservation for error reporting
//! - Validating monitor selectors, types and option names
//!
//! Every problem in a file is collected before reporting, so one run shows
//! them all.

mod error;
mod types;

pub use error::{ConfigError, ConfigIssue, ConfigValidationError};
pub use types::{Position, Spanned, WindowOptions};

use crate::geometry::MonitorSelector;
use serde::Deserialize;
use serde::de::IntoDeserializer;
use std::path::Path;
use toml::de::{DeTable, DeValue};
use tracing::{debug, info};

/// Every option the file may set
const KNOWN_OPTIONS: &[&str] = &[
    "title",
    "fullscreen",
    "ontop",
    "border",
    "fit_border",
    "keepaspect",
    "keepaspect_window",
    "screen",
    "fs_screen",
    "wid",
    "position",
];

/// Load and validate window options from a file
pub fn load(path: impl AsRef<Path>) -> Result<WindowOptions, ConfigError> {
    let path = path.as_ref();
    let source_name = path.display().to_string();

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(&source_name, e))?;

    load_from_str(&source_name, content)
}

/// Load an explicitly requested file, or the default one if it exists.
///
/// A missing default file means defaults; a missing explicit file is an error.
pub fn load_or_default(
    explicit: Option<&Path>,
    default_path: &Path,
) -> Result<WindowOptions, ConfigError> {
    if let Some(path) = explicit {
        info!("loading config from {}", path.display());
        return load(path);
    }
    if !default_path.exists() {
        debug!(path = %default_path.display(), "no config file, using defaults");
        return Ok(WindowOptions::default());
    }
    info!("loading config from {}", default_path.display());
    load(default_path)
}

/// Load and validate window options from a string
///
/// Useful for testing and when config content is already in memory.
pub fn load_from_str(source_name: &str, content: String) -> Result<WindowOptions, ConfigError> {
    let mut loader = ConfigLoader::new(source_name.to_string(), content);
    loader.parse_and_build()
}

/// Internal config loader that tracks parsing state and validation issues
struct ConfigLoader {
    source_name: String,
    source_content: String,
    issues: Vec<ConfigIssue>,
}

/// Monitor selectors as written, before validation
#[derive(Default)]
struct Selectors {
    screen: Option<Spanned<MonitorSelector>>,
    fs_screen: Option<Spanned<MonitorSelector>>,
}

impl ConfigLoader {
    fn new(source_name: String, source_content: String) -> Self {
        Self {
            source_name,
            source_content,
            issues: Vec::new(),
        }
    }

    fn parse_and_build(&mut self) -> Result<WindowOptions, ConfigError> {
        // DeTable borrows from the source while we push issues into self
        let content_for_parse = self.source_content.clone();
        let table = DeTable::parse(&content_for_parse)
            .map_err(|e| ConfigError::parse(&self.source_name, self.source_content.clone(), e))?;

        let mut options = WindowOptions::default();
        let selectors = self.parse_table(table.into_inner(), &mut options);
        self.validate_selectors(selectors, &mut options);

        if self.issues.is_empty() {
            Ok(options)
        } else {
            Err(ConfigValidationError::new(
                self.source_name.clone(),
                self.source_content.clone(),
                std::mem::take(&mut self.issues),
            )
            .into())
        }
    }

    /// Walk the root table, filling `options` with every value that parses
    fn parse_table(&mut self, table: DeTable, options: &mut WindowOptions) -> Selectors {
        let mut selectors = Selectors::default();
        let mut wid_span = None;
        let mut position_span = None;

        for (key, value) in table {
            let name = key.get_ref().as_ref();
            let span = value.span();

            match name {
                "title" => {
                    if let Some(title) = self.parse_value::<String>(name, value, "a string") {
                        options.title = title;
                    }
                }
                "fullscreen" => self.parse_flag(name, value, &mut options.fullscreen),
                "ontop" => self.parse_flag(name, value, &mut options.ontop),
                "border" => self.parse_flag(name, value, &mut options.border),
                "fit_border" => self.parse_flag(name, value, &mut options.fit_border),
                "keepaspect" => self.parse_flag(name, value, &mut options.keepaspect),
                "keepaspect_window" => {
                    self.parse_flag(name, value, &mut options.keepaspect_window)
                }
                "screen" => selectors.screen = self.parse_selector(name, value),
                "fs_screen" => selectors.fs_screen = self.parse_selector(name, value),
                "wid" => match self.parse_value::<i64>(name, value, "an integer") {
                    Some(wid) if wid >= 0 => {
                        options.wid = Some(wid as u64);
                        wid_span = Some(span);
                    }
                    Some(_) => self.issues.push(ConfigIssue {
                        span,
                        message: "'wid' must not be negative".to_string(),
                        label: "negative window id".to_string(),
                        help: None,
                    }),
                    None => {}
                },
                "position" => {
                    if let Some(position) =
                        self.parse_value::<Position>(name, value, "a table { x, y }")
                    {
                        options.position = Some(position);
                        position_span = Some(span);
                    }
                }
                _ => self.issues.push(ConfigIssue::unknown_field(
                    key.span(),
                    name,
                    KNOWN_OPTIONS,
                )),
            }
        }

        if let (Some(position_span), Some(wid_span)) = (position_span, wid_span) {
            self.issues.push(ConfigIssue::position_with_wid(
                position_span,
                wid_span,
                &self.source_content,
            ));
        }

        selectors
    }

    /// Deserialize one value, recording an issue if it has the wrong shape
    fn parse_value<T: for<'de> Deserialize<'de>>(
        &mut self,
        name: &str,
        value: toml::Spanned<DeValue>,
        expected: &str,
    ) -> Option<T> {
        let span = value.span();
        match T::deserialize(value.into_deserializer()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                let mut issue = ConfigIssue::wrong_type(span, name, expected);
                issue.help = Some(e.to_string());
                self.issues.push(issue);
                None
            }
        }
    }

    fn parse_flag(&mut self, name: &str, value: toml::Spanned<DeValue>, target: &mut bool) {
        if let Some(flag) = self.parse_value::<bool>(name, value, "a boolean") {
            *target = flag;
        }
    }

    /// Parse a monitor selector: a keyword, an index or a device name glob
    fn parse_selector(
        &mut self,
        name: &str,
        value: toml::Spanned<DeValue>,
    ) -> Option<Spanned<MonitorSelector>> {
        let span = value.span();
        let keyword = match value.get_ref() {
            DeValue::String(s) => Some(match s.as_ref() {
                "" => {
                    self.issues
                        .push(ConfigIssue::invalid_selector(span, name, "empty name"));
                    return None;
                }
                "current" | "default" => MonitorSelector::Current,
                "primary" => MonitorSelector::Primary,
                "all" => MonitorSelector::All,
                glob => MonitorSelector::Name(glob.to_string()),
            }),
            DeValue::Integer(_) => None,
            _ => {
                self.issues.push(ConfigIssue::wrong_type(
                    span,
                    name,
                    "a string or an integer",
                ));
                return None;
            }
        };
        let selector = match keyword {
            Some(selector) => selector,
            None => {
                let index = self.parse_value::<i64>(name, value, "an integer")?;
                match usize::try_from(index) {
                    Ok(index) => MonitorSelector::Index(index),
                    Err(_) => {
                        self.issues.push(ConfigIssue::invalid_selector(
                            span,
                            name,
                            "monitor indices start at 0",
                        ));
                        return None;
                    }
                }
            }
        };
        Some(Spanned::new(selector, span))
    }

    /// Spanning every monitor only makes sense for fullscreen
    fn validate_selectors(&mut self, selectors: Selectors, options: &mut WindowOptions) {
        if let Some(screen) = selectors.screen {
            if *screen.value() == MonitorSelector::All {
                self.issues.push(ConfigIssue::invalid_selector(
                    screen.span().clone(),
                    "screen",
                    "\"all\" is only valid for fs_screen",
                ));
            } else {
                options.screen = screen.into_inner();
            }
        }
        if let Some(fs_screen) = selectors.fs_screen {
            options.fs_screen = fs_screen.into_inner();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;

    fn validation_error(toml: &str) -> ConfigValidationError {
        match load_from_str("window.toml", toml.to_string()) {
            Err(ConfigError::Validation(v)) => v,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let options = load_from_str("window.toml", String::new()).unwrap();
        assert!(options == WindowOptions::default());
        assert!(options.border);
        assert!(options.title == "video");
    }

    #[test]
    fn test_full_file() {
        let toml = r#"
            title = "movie"
            fullscreen = true
            ontop = true
            border = false
            fit_border = false
            keepaspect_window = false
            screen = 1
            fs_screen = "all"
            position = { x = 100, y = 120 }
        "#;
        let options = load_from_str("window.toml", toml.to_string()).unwrap();
        assert!(options.title == "movie");
        assert!(options.fullscreen);
        assert!(options.ontop);
        assert!(!options.border);
        assert!(!options.fit_border);
        assert!(options.keepaspect);
        assert!(!options.keepaspect_window);
        assert!(options.screen == MonitorSelector::Index(1));
        assert!(options.fs_screen == MonitorSelector::All);
        assert!(options.position == Some(Position { x: 100, y: 120 }));
    }

    #[test]
    fn test_selector_keywords_and_names() {
        let toml = r#"
            screen = "primary"
            fs_screen = "*DISPLAY2"
        "#;
        let options = load_from_str("window.toml", toml.to_string()).unwrap();
        assert!(options.screen == MonitorSelector::Primary);
        assert!(options.fs_screen == MonitorSelector::Name("*DISPLAY2".into()));
    }

    #[test]
    fn test_all_rejected_for_windowed_screen() {
        let toml = "screen = \"all\"\n";
        let err = validation_error(toml);
        assert!(err.len() == 1);
        // Points at the value, not the key
        assert!(err.offsets()[0] >= "screen = ".len() - 1);
        assert!(format!("{err:?}").contains("only valid for fs_screen"));
    }

    #[test]
    fn test_negative_index_rejected() {
        let err = validation_error("fs_screen = -1\n");
        assert!(format!("{err:?}").contains("indices start at 0"));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = validation_error("bordr = false\n");
        assert!(err.offsets() == vec![0]);
        assert!(format!("{err:?}").contains("bordr"));
    }

    #[test]
    fn test_wrong_types_collected() {
        let toml = r#"
            ontop = "yes"
            wid = "abc"
            position = { x = 1 }
        "#;
        let err = validation_error(toml);
        assert!(err.len() == 3);
    }

    #[test]
    fn test_position_with_wid() {
        let toml = "wid = 4242\nposition = { x = 0, y = 0 }\n";
        let err = validation_error(toml);
        let msg = format!("{err:?}");
        assert!(msg.contains("embedded"));
        assert!(msg.contains("line 1"));
    }

    #[test]
    fn test_wid_parsed() {
        let options = load_from_str("window.toml", "wid = 4242\n".to_string()).unwrap();
        assert!(options.wid == Some(4242));
    }

    #[test]
    fn test_syntax_error() {
        let result = load_from_str("window.toml", "title = \n".to_string());
        assert!(let Err(ConfigError::Parse { .. }) = result);
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("window.toml");

        let options = load_or_default(None, &missing).unwrap();
        assert!(options == WindowOptions::default());

        let result = load_or_default(Some(&missing), &missing);
        assert!(let Err(ConfigError::Io { .. }) = result);
    }
}
