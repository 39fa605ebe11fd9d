//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Static threat scanner for TypeScript and JavaScript repositories.
#[derive(Parser, Debug)]
#[command(name = "codesentry", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format: text or json
    #[arg(short, long, global = true, default_value = "text", env = "CODESENTRY_FORMAT")]
    pub format: String,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a directory for threat patterns
    Scan {
        /// Directory to scan
        path: PathBuf,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit with code 1 if any finding is at or above this severity
        #[arg(long)]
        fail_on: Option<String>,

        /// JSON rule file replacing the built-in rules
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Maximum directory depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Include hidden files and directories
        #[arg(long)]
        include_hidden: bool,

        /// Follow symbolic links
        #[arg(long)]
        follow_symlinks: bool,

        /// Glob patterns to exclude (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Memory ceiling in MiB
        #[arg(long)]
        memory_limit: Option<u64>,

        /// Files processed concurrently
        #[arg(long)]
        concurrency: Option<usize>,

        /// Cancel the scan after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// List detection rules
    Rules {
        /// Show a single rule
        rule: Option<String>,

        /// JSON rule file to list instead of the built-ins
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default config file
    Init {
        /// Output path
        #[arg(default_value = "codesentry.toml")]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_flags() {
        let cli = Cli::parse_from([
            "codesentry",
            "scan",
            "repo",
            "--fail-on",
            "warning",
            "--exclude",
            "dist/**",
            "--exclude",
            "vendor/**",
            "-f",
            "json",
        ]);
        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Scan {
                path,
                fail_on,
                exclude,
                ..
            } => {
                assert_eq!(path, PathBuf::from("repo"));
                assert_eq!(fail_on.as_deref(), Some("warning"));
                assert_eq!(exclude, vec!["dist/**", "vendor/**"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
