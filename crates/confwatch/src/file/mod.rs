//! Loading configuration snapshots from files.
//!
//! Documents are deserialized straight into [`Value`](crate::Value) and
//! wrapped in a [`ConfigTree`]. The top level of a document must be a map;
//! a document that is just a null yields an empty tree.
//!
//! # Supported Formats
//!
//! | Format | Feature Flag | Extensions |
//! |--------|--------------|------------|
//! | JSON | always | `.json` |
//! | TOML | `toml` (default) | `.toml` |
//! | YAML | `yaml` | `.yaml`, `.yml` |
//!
//! TOML datetimes are kept as their RFC 3339 string form.
//!
//! # Error Handling
//!
//! Parse errors include source location information when available,
//! enabling rich diagnostic output via [`miette`]:
//!
//! ```text
//! Error: JSON parse error in app.json
//!    ╭─[app.json:3:1]
//!  3 │ }
//!    │ ^ trailing comma at line 3 column 1
//!    ╰────
//!   help: check for missing commas, quotes, or brackets
//! ```
//!
//! Several files are combined into one snapshot with
//! [`Layers`](crate::Layers).

mod error;
mod format;

use std::path::Path;

use miette::{NamedSource, SourceSpan};

pub use error::FileError;
pub use format::FileFormat;

use crate::error::Error;
use crate::tree::ConfigTree;
use crate::value::Value;

/// Name used in diagnostics for in-memory content.
const STRING_SOURCE: &str = "<string>";

/// Parses configuration content with an explicit format.
///
/// ```rust
/// use confwatch::file::{self, FileFormat};
///
/// let tree = file::parse_str(r#"{"server": {"port": 8080}}"#, FileFormat::Json).unwrap();
/// assert_eq!(tree.get("server.port").and_then(|v| v.to_u16()), Some(8080));
/// ```
///
/// # Errors
///
/// Returns [`Error::File`] when the content does not parse and
/// [`Error::InvalidRoot`] when its top level is not a map.
pub fn parse_str(content: &str, format: FileFormat) -> Result<ConfigTree, Error> {
    parse_content(content, format, Path::new(STRING_SOURCE))
}

/// Parses a configuration file, detecting the format from its extension.
///
/// # Returns
///
/// - `Ok(Some(tree))` - the file was parsed
/// - `Ok(None)` - the file doesn't exist and `required` is `false`
///
/// # Errors
///
/// Returns [`FileError::NotFound`] (wrapped in [`Error::File`]) for a
/// missing required file, and any read, format or parse error.
pub fn parse_file(path: &Path, required: bool) -> Result<Option<ConfigTree>, Error> {
    let path_str = path.display().to_string();

    if !path.exists() {
        if required {
            return Err(FileError::NotFound { path: path_str }.into());
        }
        tracing::debug!(path = %path_str, "optional configuration file absent");
        return Ok(None);
    }

    let format = FileFormat::from_path(path).ok_or_else(|| FileError::UnknownFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown")
            .to_string(),
    })?;

    let content = std::fs::read_to_string(path).map_err(|e| FileError::ReadError {
        path: path_str.clone(),
        source: e,
    })?;

    let tree = parse_content(&content, format, path)?;
    tracing::debug!(path = %path_str, %format, "parsed configuration file");
    Ok(Some(tree))
}

fn parse_content(content: &str, format: FileFormat, path: &Path) -> Result<ConfigTree, Error> {
    let value: Value = match format {
        FileFormat::Json => {
            serde_json::from_str(content).map_err(|e| json_parse_error(&e, content, path))?
        }

        #[cfg(feature = "toml")]
        FileFormat::Toml => {
            toml::from_str(content).map_err(|e| toml_parse_error(&e, content, path))?
        }

        #[cfg(feature = "yaml")]
        FileFormat::Yaml => {
            serde_saphyr::from_str(content).map_err(|e| yaml_parse_error(&e, content, path))?
        }
    };

    match value {
        Value::Null => Ok(ConfigTree::empty()),
        value => ConfigTree::from_value(value),
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Converts a byte offset to a [`SourceSpan`] covering the token there.
fn offset_to_span(offset: usize, content: &str) -> SourceSpan {
    let offset = offset.min(content.len());
    let remaining = content.get(offset..).unwrap_or_default();
    let len = remaining
        .find(|c: char| c.is_whitespace() || (c == ',') || (c == '}') || (c == ']'))
        .unwrap_or(remaining.len().min(20))
        .max(1);

    SourceSpan::new(offset.into(), len)
}

/// Converts a 1-indexed line/column to a byte offset.
fn line_col_to_offset(content: &str, line: usize, col: usize) -> usize {
    let mut offset = 0;

    for (i, l) in content.lines().enumerate() {
        if (i + 1) == line {
            return offset + col.saturating_sub(1);
        }

        offset += l.len() + 1;
    }

    offset
}

fn spanned_error(
    format: FileFormat,
    path: &Path,
    content: &str,
    span: SourceSpan,
    message: String,
) -> FileError {
    FileError::Parse {
        format: format.name(),
        path: path.display().to_string(),
        src: NamedSource::new(path.display().to_string(), content.to_string()),
        span,
        message,
        help: format.help().to_string(),
    }
}

fn json_parse_error(e: &serde_json::Error, content: &str, path: &Path) -> FileError {
    let offset = line_col_to_offset(content, e.line(), e.column());
    spanned_error(
        FileFormat::Json,
        path,
        content,
        offset_to_span(offset, content),
        e.to_string(),
    )
}

#[cfg(feature = "toml")]
fn toml_parse_error(e: &toml::de::Error, content: &str, path: &Path) -> FileError {
    match e.span() {
        Some(span) => spanned_error(
            FileFormat::Toml,
            path,
            content,
            SourceSpan::new(span.start.into(), span.end.saturating_sub(span.start)),
            e.message().to_string(),
        ),

        None => FileError::ParseNoSpan {
            format: FileFormat::Toml.name(),
            message: e.to_string(),
            help: FileFormat::Toml.help().to_string(),
        },
    }
}

#[cfg(feature = "yaml")]
fn yaml_parse_error(e: &serde_saphyr::Error, content: &str, path: &Path) -> FileError {
    let message = e.to_string();

    match extract_yaml_location(&message) {
        Some((line, col)) => {
            let offset = line_col_to_offset(content, line, col);
            spanned_error(
                FileFormat::Yaml,
                path,
                content,
                offset_to_span(offset, content),
                message,
            )
        }

        None => FileError::ParseNoSpan {
            format: FileFormat::Yaml.name(),
            message,
            help: FileFormat::Yaml.help().to_string(),
        },
    }
}

/// Pulls `line N ... column M` out of a YAML error message.
#[cfg(feature = "yaml")]
fn extract_yaml_location(msg: &str) -> Option<(usize, usize)> {
    let line_idx = msg.find("line ")?;
    let after_line = &msg[(line_idx + 5)..];
    let line_end = after_line.find(|c: char| !c.is_ascii_digit())?;
    let line = after_line[..line_end].parse::<usize>().ok()?;

    let col_idx = after_line.find("column ")?;
    let after_col = &after_line[(col_idx + 7)..];
    let col_end = after_col
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after_col.len());
    let col = after_col[..col_end].parse::<usize>().ok()?;

    Some((line, col))
}
