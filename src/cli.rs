use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Resolve the effective output format.
    /// If user specified a format, use it.
    /// Otherwise: TTY → Text, non-TTY (pipe) → Json
    pub fn resolve(user_choice: Option<OutputFormat>) -> OutputFormat {
        match user_choice {
            Some(fmt) => fmt,
            None => {
                if std::io::stdout().is_terminal() {
                    OutputFormat::Text
                } else {
                    OutputFormat::Json
                }
            }
        }
    }
}

#[derive(Parser)]
#[command(
    name = "atk",
    about = "Agent Toolkit - git-backed, declarative plugin manager",
    version,
    after_help = "Logs are written to: ~/.local/share/atk/logs/atk.log\n\nATK Home defaults to ~/.atk (override with ATK_HOME)"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to atk.yaml config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// One plugin by name or directory, or every plugin
#[derive(Args, Debug, Clone)]
pub struct PluginSelector {
    /// Plugin name or directory
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub plugin: Option<String>,

    /// Apply to every installed plugin
    #[arg(long)]
    pub all: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize ATK Home
    Init {
        /// Directory to initialize (defaults to ATK_HOME or ~/.atk)
        path: Option<PathBuf>,
    },

    /// Add plugins from a registry name, git URL or local path
    Add {
        /// Sources to add
        #[arg(required = true)]
        sources: Vec<String>,
    },

    /// Upgrade registry and git plugins to the latest upstream version
    Upgrade {
        #[command(flatten)]
        target: PluginSelector,
    },

    /// Stop and remove plugins
    Remove {
        #[command(flatten)]
        target: PluginSelector,

        /// Treat plugins that are not installed as already removed
        #[arg(long)]
        cleanup: bool,
    },

    /// List installed plugins and report drift
    List {
        /// Output format (auto-detected: text for TTY, json for pipes)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Show whether plugins are running
    Status {
        /// Plugin name or directory (defaults to all)
        plugin: Option<String>,

        /// Output format (auto-detected: text for TTY, json for pipes)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Run a plugin's install command
    Install {
        #[command(flatten)]
        target: PluginSelector,
    },

    /// Run a plugin's uninstall command
    Uninstall {
        #[command(flatten)]
        target: PluginSelector,
    },

    /// Start plugins
    Start {
        #[command(flatten)]
        target: PluginSelector,
    },

    /// Stop plugins
    Stop {
        #[command(flatten)]
        target: PluginSelector,
    },

    /// Stop then start plugins
    Restart {
        #[command(flatten)]
        target: PluginSelector,
    },

    /// Show plugin logs
    Logs {
        /// Plugin name or directory
        plugin: String,
    },

    /// Restore plugin files missing after a fresh clone of ATK Home
    Bootstrap,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_selector_requires_plugin_or_all() {
        assert!(Cli::try_parse_from(["atk", "start"]).is_err());
        assert!(Cli::try_parse_from(["atk", "start", "x", "--all"]).is_err());

        let cli = Cli::try_parse_from(["atk", "stop", "--all"]).unwrap();
        assert!(matches!(cli.command, Commands::Stop { target } if target.all && target.plugin.is_none()));
    }

    #[test]
    fn test_remove_cleanup_flag() {
        let cli = Cli::try_parse_from(["atk", "remove", "ghost", "--cleanup"]).unwrap();
        match cli.command {
            Commands::Remove { target, cleanup } => {
                assert_eq!(target.plugin.as_deref(), Some("ghost"));
                assert!(cleanup);
            }
            _ => panic!("expected remove"),
        }
    }

    #[test]
    fn test_add_requires_source() {
        assert!(Cli::try_parse_from(["atk", "add"]).is_err());
        let cli = Cli::try_parse_from(["atk", "add", "a", "./b"]).unwrap();
        assert!(matches!(cli.command, Commands::Add { sources } if sources == ["a", "./b"]));
    }
}
