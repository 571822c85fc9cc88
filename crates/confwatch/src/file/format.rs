//! File format detection.
//!
//! | Format | Feature | Extensions |
//! |--------|---------|------------|
//! | JSON | always | `.json` |
//! | TOML | `toml` | `.toml` |
//! | YAML | `yaml` | `.yaml`, `.yml` |

use std::path::Path;

/// Supported configuration file formats.
///
/// The format is detected from the file extension by
/// [`parse_file`](crate::file::parse_file), or given explicitly to
/// [`parse_str`](crate::file::parse_str).
///
/// ```rust
/// use confwatch::file::FileFormat;
/// use std::path::Path;
///
/// assert_eq!(FileFormat::from_path(Path::new("app.json")), Some(FileFormat::Json));
/// assert_eq!(FileFormat::from_path(Path::new("app.txt")), None);
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FileFormat {
    /// JSON format (`.json` extension).
    Json,

    /// TOML format (`.toml` extension).
    ///
    /// Requires the `toml` feature flag.
    #[cfg(feature = "toml")]
    Toml,

    /// YAML format (`.yaml` or `.yml` extension).
    ///
    /// Requires the `yaml` feature flag.
    #[cfg(feature = "yaml")]
    Yaml,
}

impl FileFormat {
    /// Detects the file format from the file extension.
    ///
    /// Returns `None` if the extension is not recognized or if the
    /// required feature flag is not enabled.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;

        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),

            #[cfg(feature = "toml")]
            "toml" => Some(FileFormat::Toml),

            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Some(FileFormat::Yaml),

            _ => None,
        }
    }

    /// Format name for error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::Json => "JSON",

            #[cfg(feature = "toml")]
            FileFormat::Toml => "TOML",

            #[cfg(feature = "yaml")]
            FileFormat::Yaml => "YAML",
        }
    }

    /// Hint shown alongside parse errors.
    pub(crate) fn help(&self) -> &'static str {
        match self {
            FileFormat::Json => "check for missing commas, quotes, or brackets",

            #[cfg(feature = "toml")]
            FileFormat::Toml => "check for missing quotes, invalid values, or syntax errors",

            #[cfg(feature = "yaml")]
            FileFormat::Yaml => "check indentation and ensure proper YAML syntax",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
