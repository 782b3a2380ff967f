//! Error types for SiteKiln.
//!
//! Library crates use [`SiteKilnError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SiteKiln operations.
#[derive(Debug, thiserror::Error)]
pub enum SiteKilnError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Sass compilation failed for a single source file.
    #[error("failed to compile {path:?}: {message}")]
    Compile { path: PathBuf, message: String },

    /// CSS parsing, minification, or printing error.
    #[error("css error: {0}")]
    Css(String),

    /// HTML assembly or minification error.
    #[error("html error: {0}")]
    Html(String),

    /// Malformed input to a validator or task (not an AMP rule violation).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// One or more output documents failed AMP validation.
    #[error("AMP validation failed for {failed} file(s)")]
    AmpInvalid { failed: usize },

    /// Dev server error (bind, serve, shutdown).
    #[error("server error: {0}")]
    Server(String),

    /// File watcher error.
    #[error("watch error: {0}")]
    Watch(String),

    /// A step running on the blocking pool panicked or was cancelled.
    #[error("task aborted: {0}")]
    Aborted(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SiteKilnError>;

impl SiteKilnError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a compile error for a specific source file.
    pub fn compile(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Compile {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SiteKilnError::config("unknown browser list entry");
        assert_eq!(err.to_string(), "config error: unknown browser list entry");

        let err = SiteKilnError::AmpInvalid { failed: 2 };
        assert_eq!(err.to_string(), "AMP validation failed for 2 file(s)");
    }

    #[test]
    fn compile_error_names_the_file() {
        let err = SiteKilnError::compile("src/css/main.scss", "expected \";\"");
        let msg = err.to_string();
        assert!(msg.contains("main.scss"));
        assert!(msg.contains("expected"));
    }
}
