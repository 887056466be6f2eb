//! Error types for the drill_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for drill_core operations.
///
/// Every value is one concrete kind; there is no catch-all base error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input: routine-file grammar, numeric fields, guide documents
    #[error("{0}")]
    Parse(String),

    /// An optional per-exercise field was omitted and no default is set
    #[error("{0}")]
    Default(String),

    /// API misuse, e.g. starting an exercise that was never prepped
    #[error("{0}")]
    Protocol(String),

    /// Identifier lookup failure in a Guide or GuideBook
    #[error("{0}")]
    NotFound(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Re-wrap a parse or default error with the raw source line appended.
    ///
    /// Other kinds are returned unchanged, so a lookup failure surfaces
    /// exactly as the guide book reported it.
    pub fn with_line(self, line: &str) -> Self {
        match self {
            Error::Parse(msg) => Error::Parse(format!("{}\n  Line: {}", msg, line)),
            Error::Default(msg) => Error::Default(format!("{}\n  Line: {}", msg, line)),
            other => other,
        }
    }

    /// The message with every line prefixed by `indent`
    pub fn indented_message(&self, indent: &str) -> String {
        self.to_string()
            .split('\n')
            .map(|line| format!("{}{}", indent, line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse(_))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Error::Default(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}
