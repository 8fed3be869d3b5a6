//! Command-line surface: global store and logging options plus the
//! `browse`, `migrate` and `summary` subcommands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bdo-chronicle")]
#[command(version, about = "Node and crafting reference for Black Desert Online")]
pub struct Cli {
    /// SQLite database path (defaults to ~/.bdo-chronicle/chronicle.sqlite)
    #[arg(long, global = true, env = "BDO_DATABASE")]
    pub database: Option<PathBuf>,

    /// Log file path (defaults to chronicle.log next to the database)
    #[arg(long, global = true, env = "BDO_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log filter, e.g. "info" or "bdo_chronicle=debug"
    #[arg(long, global = true, env = "BDO_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Browse and edit records in the terminal admin (default)
    Browse,

    /// Create or update the schema, then exit
    Migrate,

    /// Print the number of rows in every table
    Summary,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Browse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browse_is_the_default_command() {
        let cli = Cli::try_parse_from(["bdo-chronicle"]).unwrap();
        assert_eq!(cli.command(), Commands::Browse);
        assert!(cli.database.is_none());
    }

    #[test]
    fn flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bdo-chronicle",
            "summary",
            "--database",
            "/tmp/chronicle.sqlite",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.command(), Commands::Summary);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/chronicle.sqlite")));
        assert_eq!(cli.log_level, "debug");
    }
}
