// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::loader::default_config_path;
use crate::types::ErrorPolicy;

/// Command-line arguments for `targetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "targetdag",
    version,
    about = "Incremental, dependency-aware pipeline runner.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workflow file (TOML).
    ///
    /// Default: `Targetdag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path(), global = true)]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TARGETDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build every outdated target.
    Run(RunArgs),
    /// List the targets the next run would execute.
    Outdated,
    /// Print targets, commands, dependencies and fingerprints.
    Manifest,
    /// Show what a target (or an arbitrary command) depends on.
    Deps(DepsArgs),
    /// Print a target's stored value.
    Read {
        target: String,
    },
    /// Print the stored metadata of every target.
    Meta,
    /// Print the progress of the latest run.
    Progress,
    /// Remove all stored metadata, objects and progress.
    Destroy,
    /// Remove records of targets no longer in the workflow.
    Prune,
    /// Remove stored objects, keeping metadata.
    Delete(SelectArgs),
    /// Remove metadata, keeping stored objects.
    Invalidate(SelectArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Worker pool size (overrides `[config] workers`).
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Error policy, `continue` or `stop` (overrides `[config] error`).
    #[arg(long, value_name = "POLICY")]
    pub error: Option<ErrorPolicy>,

    /// Only run these targets and their ancestors.
    #[arg(long, value_delimiter = ',', value_name = "A,B")]
    pub names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Args)]
pub struct DepsArgs {
    /// Target whose command is analyzed.
    #[arg(required_unless_present = "command", conflicts_with = "command")]
    pub target: Option<String>,

    /// Analyze this command source instead of a declared target.
    #[arg(long, value_name = "SRC")]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct SelectArgs {
    /// Target names or glob patterns (e.g. `raw_*`).
    #[arg(required_unless_present = "all")]
    pub selectors: Vec<String>,

    /// Select every target.
    #[arg(long, conflicts_with = "selectors")]
    pub all: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let args = CliArgs::try_parse_from([
            "targetdag", "run", "--workers", "4", "--error", "stop", "--names", "a,b",
        ])
        .unwrap();
        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.workers, Some(4));
        assert_eq!(run.error, Some(ErrorPolicy::Stop));
        assert_eq!(run.names, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn selectors_or_all() {
        let args = CliArgs::try_parse_from(["targetdag", "delete", "raw_*", "model"]).unwrap();
        assert!(matches!(args.command, Command::Delete(ref s) if s.selectors.len() == 2));

        let args = CliArgs::try_parse_from(["targetdag", "invalidate", "--all"]).unwrap();
        assert!(matches!(args.command, Command::Invalidate(ref s) if s.all));

        assert!(CliArgs::try_parse_from(["targetdag", "delete"]).is_err());
    }

    #[test]
    fn deps_needs_target_or_command() {
        assert!(CliArgs::try_parse_from(["targetdag", "deps", "model"]).is_ok());
        assert!(CliArgs::try_parse_from(["targetdag", "deps", "--command", "echo $x"]).is_ok());
        assert!(CliArgs::try_parse_from(["targetdag", "deps"]).is_err());
    }
}
