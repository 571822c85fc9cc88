//! The ordered list of files one reloader merges.

use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::file;
use crate::layer::Layers;
use crate::tree::ConfigTree;

/// One file layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FileSource {
    pub path: PathBuf,

    /// Dot path the file's content is nested under.
    pub prefix: Option<String>,

    /// A missing required file fails the load; a missing optional one is skipped.
    pub required: bool,
}

impl FileSource {
    pub(crate) fn new(path: impl AsRef<Path>, prefix: Option<&str>, required: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            prefix: prefix.map(str::to_string),
            required,
        }
    }
}

/// Parses every source and merges them in order.
///
/// Stops at the first failing file.
pub(crate) fn load_all(sources: &[FileSource]) -> Result<ConfigTree, Error> {
    let mut layers = Layers::new();
    for source in sources {
        if let Some(tree) = file::parse_file(&source.path, source.required)? {
            layers.push(source.prefix.as_deref(), tree);
        }
    }
    Ok(layers.merge())
}
