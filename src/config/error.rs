//! Configuration error types with source location tracking
//!
//! Provides rich diagnostic output using miette for configuration validation errors.

// False positives from miette's derive macros - fields are used but rustc doesn't see it
#![allow(unused_assignments)]

use super::types::Span;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Convert byte offset to 1-based line number
pub fn byte_offset_to_line(content: &str, offset: usize) -> usize {
    content[..offset.min(content.len())]
        .chars()
        .filter(|&c| c == '\n')
        .count()
        + 1
}

/// A single validation issue with location information
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    /// Byte span in source
    pub span: Span,
    /// Primary error message
    pub message: String,
    /// Label shown at the span location
    pub label: String,
    /// Optional help text with suggestions
    pub help: Option<String>,
}

impl ConfigIssue {
    /// A key this file format doesn't know
    pub fn unknown_field(span: Span, name: &str, known: &[&str]) -> Self {
        Self {
            span,
            message: format!("unknown option '{name}'"),
            label: "not a window option".to_string(),
            help: Some(format!("valid options: {}", known.join(", "))),
        }
    }

    /// A value of the wrong TOML type
    pub fn wrong_type(span: Span, name: &str, expected: &str) -> Self {
        Self {
            span,
            message: format!("'{name}' must be {expected}"),
            label: format!("expected {expected}"),
            help: None,
        }
    }

    /// A monitor selector that can't be used where it was written
    pub fn invalid_selector(span: Span, name: &str, reason: &str) -> Self {
        Self {
            span,
            message: format!("invalid monitor for '{name}': {reason}"),
            label: "invalid monitor".to_string(),
            help: Some(
                "use \"current\", \"primary\", a zero-based index, or a device name \
                 glob like \"*DISPLAY2\""
                    .to_string(),
            ),
        }
    }

    /// `position` next to `wid`: an embedded window is placed by its parent
    pub fn position_with_wid(span: Span, wid_span: Span, source_content: &str) -> Self {
        let wid_line = byte_offset_to_line(source_content, wid_span.start);
        Self {
            span,
            message: "'position' has no effect on an embedded window".to_string(),
            label: "ignored".to_string(),
            help: Some(format!("'wid' is set at line {wid_line}")),
        }
    }
}

/// Individual validation issue wrapped for miette's `#[related]` attribute
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[allow(unused_assignments)] // Fields used by miette's derive macros
pub struct ConfigIssueDiagnostic {
    message: String,
    #[label("{label}")]
    span: SourceSpan,
    label: String,
    #[help]
    help: Option<String>,
}

/// Collection of configuration validation errors
///
/// This is the main diagnostic type returned when config validation fails.
/// It contains the source file and all issues found, sorted by position.
#[derive(Debug, Error, Diagnostic)]
#[error(
    "configuration has {count} error{s}",
    count = self.issues.len(),
    s = if self.issues.len() == 1 { "" } else { "s" }
)]
#[diagnostic(code(vowin::config::validation))]
#[allow(unused_assignments)] // Fields used by miette's derive macros
pub struct ConfigValidationError {
    #[source_code]
    src: NamedSource<String>,

    #[related]
    issues: Vec<ConfigIssueDiagnostic>,
}

impl ConfigValidationError {
    /// Create a validation error from collected issues
    ///
    /// Issues are sorted by source position for deterministic output.
    #[allow(unused_assignments)] // Field assignments used by miette's derive macros
    pub fn new(
        source_name: impl Into<String>,
        source_content: String,
        mut issues: Vec<ConfigIssue>,
    ) -> Self {
        issues.sort_by_key(|i| i.span.start);

        let diagnostics = issues
            .into_iter()
            .map(|issue| ConfigIssueDiagnostic {
                message: issue.message,
                span: (issue.span.start, issue.span.len()).into(),
                label: issue.label,
                help: issue.help,
            })
            .collect();

        let name: String = source_name.into();
        Self {
            src: NamedSource::new(name, source_content),
            issues: diagnostics,
        }
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Source offsets of every issue, in order
    pub fn offsets(&self) -> Vec<usize> {
        self.issues.iter().map(|i| i.span.offset()).collect()
    }
}

/// Top-level configuration errors
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(code(vowin::config::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    #[diagnostic(code(vowin::config::parse))]
    #[allow(unused_assignments)] // Fields used by miette's derive macros
    Parse {
        #[source_code]
        src: NamedSource<String>,
        #[label("parse error")]
        span: Option<SourceSpan>,
        msg: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ConfigValidationError),
}

impl ConfigError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[allow(unused_assignments)] // Field assignments used by miette's derive macros
    pub fn parse(
        source_name: impl Into<String>,
        source_content: String,
        err: toml::de::Error,
    ) -> Self {
        let name: String = source_name.into();
        Self::Parse {
            src: NamedSource::new(name, source_content),
            span: err.span().map(|r| (r.start, r.len()).into()),
            msg: err.message().to_string(),
        }
    }
}
