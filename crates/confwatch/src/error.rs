//! Error types for snapshot diffing and watch registration.
//!
//! This module contains the [`Error`] enum and related functionality for
//! reporting failures with rich diagnostics via [`miette`].
//!
//! # Error Variants
//!
//! | Variant | When It Occurs |
//! |---------|----------------|
//! | [`Error::InvalidPattern`] | A match-watch pattern failed to compile |
//! | [`Error::Canonicalize`] | A subtree could not be serialized for hashing |
//! | [`Error::InvalidRoot`] | A document root is not a map |
//! | [`Error::File`] | Configuration file error |
//! | [`Error::Watch`] | File reload error (with `watch` feature) |
//!
//! # Missing Keys
//!
//! Looking up a path that does not exist is never an error. Lookups return
//! `None`, and absence takes part in change detection like any other value.

use miette::Diagnostic;
use thiserror::Error;

use crate::file::FileError;

#[cfg(feature = "watch")]
use crate::reload::WatchError;

/// Errors reported by the store, its watches and the file layer.
///
/// # Diagnostic Codes
///
/// | Code | Meaning |
/// |------|---------|
/// | `confwatch::invalid_pattern` | Match-watch regex failed to compile |
/// | `confwatch::canonicalize` | Subtree serialization failed while hashing |
/// | `confwatch::invalid_root` | Parsed document is not a map |
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum Error {
    /// A match-watch pattern is not a valid regular expression.
    ///
    /// Raised at registration time; no watch is created.
    #[error("invalid watch pattern `{pattern}`")]
    #[diagnostic(
        code(confwatch::invalid_pattern),
        help("patterns use the `regex` crate syntax and are matched against dot-separated paths")
    )]
    InvalidPattern {
        /// The pattern source text.
        pattern: String,

        /// The underlying compile error.
        #[source]
        source: regex::Error,
    },

    /// A subtree could not be serialized into its canonical form.
    ///
    /// The diff cycle of the affected watch is abandoned and its baseline
    /// is left untouched.
    #[error("failed to canonicalize subtree for hashing")]
    #[diagnostic(
        code(confwatch::canonicalize),
        help("the snapshot contains a value that cannot be serialized as JSON")
    )]
    Canonicalize {
        /// The serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// A configuration document does not have a map at its root.
    #[error("configuration root must be a map, found {found}")]
    #[diagnostic(
        code(confwatch::invalid_root),
        help("top-level documents must be tables/objects/mappings")
    )]
    InvalidRoot {
        /// Type name of the value found at the root.
        found: &'static str,
    },

    /// An error occurred while loading a configuration file.
    #[diagnostic(transparent)]
    #[error(transparent)]
    File(#[from] FileError),

    /// An error occurred in the file reload layer.
    #[cfg(feature = "watch")]
    #[diagnostic(transparent)]
    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl Error {
    /// Create a new `InvalidPattern` error.
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pattern_display() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = Error::invalid_pattern("(", source);
        assert!(err.to_string().contains('('));
        assert_eq!(
            err.code().map(|c| c.to_string()),
            Some("confwatch::invalid_pattern".to_string())
        );
    }

    #[test]
    fn test_invalid_root_display() {
        let err = Error::InvalidRoot { found: "list" };
        assert!(err.to_string().contains("list"));
    }
}
