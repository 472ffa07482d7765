//! Plugin .env files

use indexmap::IndexMap;
use std::path::Path;

use crate::error::{AtkError, ValidationError};

pub const ENV_FILE: &str = ".env";

/// Load KEY=VALUE pairs from a plugin's .env file, in file order
///
/// A missing file yields an empty map. Parsing follows dotenv rules: quotes,
/// `export` prefixes and trailing comments are handled by `dotenvy`. Values
/// are not substituted into the process environment.
pub fn load_env_file(path: &Path) -> Result<IndexMap<String, String>, AtkError> {
    if !path.exists() {
        return Ok(IndexMap::new());
    }

    let entries = dotenvy::from_path_iter(path).map_err(|e| env_error(path, e))?;
    entries
        .map(|item| item.map_err(|e| env_error(path, e)))
        .collect()
}

fn env_error(path: &Path, error: dotenvy::Error) -> AtkError {
    match error {
        dotenvy::Error::Io(source) => AtkError::io(format!("Failed to read {}", path.display()), source),
        other => ValidationError::single(format!("{}: {}", path.display(), other)).into(),
    }
}

/// Variables from `<plugin_dir>/.env`, passed to lifecycle commands
pub fn plugin_env(plugin_dir: &Path) -> Result<IndexMap<String, String>, AtkError> {
    load_env_file(&plugin_dir.join(ENV_FILE))
}
