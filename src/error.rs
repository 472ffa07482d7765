//! Error taxonomy for plugin convergence
//!
//! Commands propagate `eyre::Report`; engine code returns `AtkError` so callers
//! (and `main`) can tell a missing plugin from a git failure.

use std::path::PathBuf;

/// Process exit codes
pub mod exit_code {
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_ARGS: i32 = 2;
    pub const HOME_NOT_INITIALIZED: i32 = 3;
    pub const PLUGIN_NOT_FOUND: i32 = 4;
    pub const PLUGIN_INVALID: i32 = 5;
    pub const LIFECYCLE_ERROR: i32 = 6;
    pub const GIT_ERROR: i32 = 7;
}

/// Field-level problems found while validating a plugin definition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

impl ValidationError {
    pub fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }

    pub fn single(problem: impl Into<String>) -> Self {
        Self {
            problems: vec![problem.into()],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AtkError {
    #[error("Invalid plugin definition: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid plugin name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Unrecognized source: {0}")]
    UnrecognizedSource(String),

    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Plugin '{0}' not found")]
    PluginNotFound(String),

    #[error("No plugin definition found: {0}")]
    NoDefinitionFound(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("Lifecycle command '{command}' failed for plugin '{plugin}' with exit code {code}")]
    Lifecycle { plugin: String, command: String, code: i32 },

    #[error("Plugin '{0}' is a local plugin and cannot be upgraded")]
    LocalNotUpgradable(String),

    #[error("ATK Home not initialized at {}: {}", path.display(), problems.join(", "))]
    HomeNotInitialized { path: PathBuf, problems: Vec<String> },

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl AtkError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::NoDefinitionFound(_) => exit_code::PLUGIN_INVALID,
            Self::InvalidName { .. } | Self::UnrecognizedSource(_) => exit_code::INVALID_ARGS,
            Self::SourceNotFound(_) | Self::PluginNotFound(_) => exit_code::PLUGIN_NOT_FOUND,
            Self::Git(_) => exit_code::GIT_ERROR,
            Self::Lifecycle { .. } => exit_code::LIFECYCLE_ERROR,
            Self::HomeNotInitialized { .. } => exit_code::HOME_NOT_INITIALIZED,
            Self::Fetch(_) | Self::LocalNotUpgradable(_) | Self::Manifest(_) | Self::Io { .. } => {
                exit_code::GENERAL_ERROR
            }
        }
    }
}

/// Extension for attaching context to `std::io::Result` inside engine code
pub trait IoContext<T> {
    fn io_context<F: FnOnce() -> String>(self, f: F) -> Result<T, AtkError>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F: FnOnce() -> String>(self, f: F) -> Result<T, AtkError> {
        self.map_err(|e| AtkError::io(f(), e))
    }
}
