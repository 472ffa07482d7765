//! Source resolution
//!
//! Classifies a user-supplied source string as a local path, a git URL or a
//! registry name. Purely offline: nothing here touches the network.

use lazy_regex::regex_is_match;
use std::path::{Path, PathBuf};

use crate::error::AtkError;

/// What kind of source a string names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Local(PathBuf),
    Git { url: String },
    Registry { name: String },
}

impl SourceKind {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Git { .. } => "git",
            Self::Registry { .. } => "registry",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Git { url } => write!(f, "{}", url),
            Self::Registry { name } => write!(f, "{}", name),
        }
    }
}

/// Resolve a source string
///
/// Order: explicit path markers, then paths that exist, then URL-like strings,
/// then registry names.
pub fn resolve(source: &str) -> Result<SourceKind, AtkError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(AtkError::UnrecognizedSource("empty source".to_string()));
    }

    if has_path_marker(source) {
        return Ok(SourceKind::Local(expand(source)));
    }

    if Path::new(source).exists() {
        return Ok(SourceKind::Local(PathBuf::from(source)));
    }

    if is_url_like(source) {
        return Ok(SourceKind::Git {
            url: normalize_git_url(source),
        });
    }

    if regex_is_match!(r"^[A-Za-z0-9][A-Za-z0-9._-]*$", source) {
        return Ok(SourceKind::Registry {
            name: source.to_string(),
        });
    }

    Err(AtkError::UnrecognizedSource(source.to_string()))
}

fn has_path_marker(source: &str) -> bool {
    source.starts_with("./")
        || source.starts_with("../")
        || source.starts_with('/')
        || source.starts_with("~/")
        || source == "."
        || source == ".."
}

fn expand(source: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(source).as_ref())
}

fn is_url_like(source: &str) -> bool {
    source.contains("://")
        || regex_is_match!(r"^[\w.-]+@[\w.-]+:.+$", source)
        || regex_is_match!(r"^[\w-]+(\.[\w-]+)+/\S+$", source)
}

/// Turn `host.tld/path` into `https://host.tld/path`
///
/// Full URLs and scp-style addresses pass through unchanged.
pub fn normalize_git_url(url: &str) -> String {
    if url.contains("://") || regex_is_match!(r"^[\w.-]+@[\w.-]+:", url) {
        return url.to_string();
    }
    format!("https://{}", url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_path_markers_are_local() {
        assert_eq!(resolve("./plugin").unwrap(), SourceKind::Local(PathBuf::from("./plugin")));
        assert_eq!(resolve("../plugin").unwrap(), SourceKind::Local(PathBuf::from("../plugin")));
        assert_eq!(resolve("/opt/plugin").unwrap(), SourceKind::Local(PathBuf::from("/opt/plugin")));
    }

    #[test]
    fn test_tilde_is_expanded() {
        match resolve("~/plugins/mine").unwrap() {
            SourceKind::Local(path) => {
                assert!(!path.to_string_lossy().starts_with('~'));
                assert!(path.ends_with("plugins/mine"));
            }
            other => panic!("expected local, got {:?}", other),
        }
    }

    #[test]
    fn test_existing_path_without_marker() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("plugin-dir");
        fs::create_dir_all(&dir).unwrap();
        // Absolute path string exists, so it resolves as local either way
        let resolved = resolve(&dir.to_string_lossy()).unwrap();
        assert_eq!(resolved, SourceKind::Local(dir));
    }

    #[test]
    fn test_urls_are_git() {
        assert_eq!(
            resolve("https://github.com/org/repo").unwrap(),
            SourceKind::Git {
                url: "https://github.com/org/repo".into()
            }
        );
        assert_eq!(
            resolve("git@github.com:org/repo.git").unwrap(),
            SourceKind::Git {
                url: "git@github.com:org/repo.git".into()
            }
        );
        assert_eq!(
            resolve("github.com/org/repo").unwrap(),
            SourceKind::Git {
                url: "https://github.com/org/repo".into()
            }
        );
        assert_eq!(
            resolve("github.com/tool").unwrap(),
            SourceKind::Git {
                url: "https://github.com/tool".into()
            }
        );
    }

    #[test]
    fn test_bare_names_are_registry() {
        assert_eq!(
            resolve("openmemory").unwrap(),
            SourceKind::Registry {
                name: "openmemory".into()
            }
        );
    }

    #[test]
    fn test_unrecognized() {
        assert!(matches!(resolve(""), Err(AtkError::UnrecognizedSource(_))));
        assert!(matches!(resolve("   "), Err(AtkError::UnrecognizedSource(_))));
        assert!(matches!(resolve("not a source!"), Err(AtkError::UnrecognizedSource(_))));
    }

    #[test]
    fn test_normalize_git_url() {
        assert_eq!(normalize_git_url("gitlab.com/a/b"), "https://gitlab.com/a/b");
        assert_eq!(normalize_git_url("ssh://git@host/a/b"), "ssh://git@host/a/b");
        assert_eq!(normalize_git_url("git@host:a/b"), "git@host:a/b");
    }
}
