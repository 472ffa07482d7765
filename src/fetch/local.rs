//! Local directory or single-file sources

use std::fs;
use std::path::Path;

use super::{FetchResult, copy_tree, stage};
use crate::error::{AtkError, IoContext};
use crate::plugin::loader::definition_path;

/// Copy a plugin directory, or a lone YAML file as `plugin.yaml`, into `destination`
///
/// A source that already lives inside `destination` is left alone. The engine
/// never relies on this: it always fetches into scratch space and registers
/// plugins that already sit in `plugins/<name>` through `Engine::add` directly.
/// Other callers get an in-place no-op instead of a recursive copy.
pub fn fetch(source: &Path, destination: &Path) -> Result<FetchResult, AtkError> {
    if !source.exists() {
        return Err(AtkError::SourceNotFound(source.to_path_buf()));
    }

    let source = source
        .canonicalize()
        .io_context(|| format!("Failed to resolve {}", source.display()))?;

    // Already in place: nothing to copy
    if let Ok(dest) = destination.canonicalize()
        && source.starts_with(&dest)
    {
        log::debug!("Source {} is already at {}", source.display(), dest.display());
        return Ok(FetchResult::default());
    }

    if source.is_dir() {
        if definition_path(&source).is_none() {
            return Err(AtkError::NoDefinitionFound(format!(
                "directory {} does not contain plugin.yaml or plugin.yml",
                source.display()
            )));
        }
        return stage(destination, |staging, out| {
            // Adding a directory that contains ATK Home must not copy the staging area
            copy_tree(&source, out, Some(staging))?;
            Ok(FetchResult::default())
        });
    }

    let is_yaml = source
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    if !is_yaml {
        return Err(AtkError::NoDefinitionFound(format!(
            "source file {} must be .yaml or .yml",
            source.display()
        )));
    }

    stage(destination, |_, out| {
        fs::create_dir_all(out).io_context(|| format!("Failed to create {}", out.display()))?;
        fs::copy(&source, out.join("plugin.yaml")).io_context(|| format!("Failed to copy {}", source.display()))?;
        Ok(FetchResult::default())
    })
}
