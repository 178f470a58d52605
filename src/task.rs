//! TICKscript holder.

use std::path::{Path, PathBuf};

use crate::error::TaskLoadError;

/// A TICKscript read from disk. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// File name of the script, also used as the Kapacitor task id.
    pub name: String,
    /// Directory the script was read from.
    pub path: PathBuf,
    /// Raw script text.
    pub script: String,
}

impl Task {
    /// Reads `dir/name` into a new task.
    pub fn load(name: &str, dir: impl AsRef<Path>) -> Result<Self, TaskLoadError> {
        let dir = dir.as_ref();
        let script_path = dir.join(name);
        let script =
            std::fs::read_to_string(&script_path).map_err(|source| TaskLoadError {
                path: script_path.display().to_string(),
                source,
            })?;
        Ok(Self {
            name: name.to_string(),
            path: dir.to_path_buf(),
            script,
        })
    }

    /// Builds a task from script text already in memory.
    pub fn from_script(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: PathBuf::new(),
            script: script.into(),
        }
    }
}
