//! Process environment mappings.
//!
//! The engine never touches the real process environment. It works on an
//! [`Environ`] copied from the caller and hands back a derived copy.

use std::collections::BTreeMap;
use std::path::Path;

/// A process environment: variable name to value.
pub type Environ = BTreeMap<String, String>;

/// Variable naming the project directory in every prepared environment.
pub const PROJECT_DIR_VAR: &str = "PROJECT_DIR";

/// Variable naming the active environment prefix.
pub const ENV_PREFIX_VAR: &str = "CONDA_PREFIX";

/// Variable naming the active environment, set alongside the prefix.
pub const ENV_NAME_VAR: &str = "CONDA_DEFAULT_ENV";

#[cfg(windows)]
const PATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_SEPARATOR: &str = ":";

/// Snapshot the current process environment.
pub fn from_process() -> Environ {
    std::env::vars().collect()
}

/// Prepend a directory to `PATH` in the given environ.
///
/// Does nothing if the directory is already the first `PATH` entry, so
/// providing the same environment twice leaves `PATH` unchanged.
pub fn prepend_path(environ: &mut Environ, dir: &Path) {
    let dir = dir.to_string_lossy().to_string();
    let current = environ.get("PATH").cloned().unwrap_or_default();
    if current.split(PATH_SEPARATOR).next() == Some(dir.as_str()) {
        return;
    }
    let updated = if current.is_empty() {
        dir
    } else {
        format!("{}{}{}", dir, PATH_SEPARATOR, current)
    };
    environ.insert("PATH".to_string(), updated);
}

/// Copy every entry of `source` into `target`, overwriting existing keys.
pub fn merge_into(source: &Environ, target: &mut Environ) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}
