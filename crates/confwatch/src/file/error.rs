//! File error types with rich diagnostics.

use miette::{Diagnostic, NamedSource, SourceSpan};

/// Error type for reading and parsing configuration files.
///
/// Parse failures carry the file content and the offending span so that
/// [`miette`] can render a source snippet:
///
/// ```text
/// Error: TOML parse error in app.toml
///    ╭─[app.toml:2:8]
///  2 │ port = 80 80
///    │           ^^ expected newline, `#`
///    ╰────
///   help: check for missing quotes, invalid values, or syntax errors
/// ```
#[derive(Debug, Diagnostic, thiserror::Error)]
#[non_exhaustive]
pub enum FileError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    #[diagnostic(
        code(confwatch::file::not_found),
        help("ensure the file exists at the specified path")
    )]
    NotFound {
        /// Path to the missing file.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read configuration file: {path}")]
    #[diagnostic(
        code(confwatch::file::read_error),
        help("check file permissions and ensure it's readable")
    )]
    ReadError {
        /// Path to the file.
        path: String,

        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Unknown file format.
    #[error("unknown configuration file format: .{extension}")]
    #[diagnostic(
        code(confwatch::file::unknown_format),
        help("supported formats: .json, .toml, .yaml, .yml (each behind its feature flag)")
    )]
    UnknownFormat {
        /// The file extension that wasn't recognized.
        extension: String,
    },

    /// Parse error with source location.
    #[error("{format} parse error in {path}")]
    #[diagnostic(code(confwatch::file::parse_error))]
    Parse {
        /// Format name (JSON, TOML, YAML).
        format: &'static str,

        /// Path to the file, or `<string>` for in-memory content.
        path: String,

        /// The source content for display.
        #[source_code]
        src: NamedSource<String>,

        /// The location of the error.
        #[label("{message}")]
        span: SourceSpan,

        /// Description of what went wrong.
        message: String,

        /// Suggestion for how to fix.
        #[help]
        help: String,
    },

    /// Parse error without source location.
    #[error("{format} parse error: {message}")]
    #[diagnostic(code(confwatch::file::parse_error))]
    ParseNoSpan {
        /// Format name.
        format: &'static str,

        /// Description of what went wrong.
        message: String,

        /// Suggestion for how to fix.
        #[help]
        help: String,
    },
}
