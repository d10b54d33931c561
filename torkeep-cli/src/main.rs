//! torkeep CLI - command-line front end for supervised downloads.
//!
//! Each download added here is driven by a supervisor in the `torkeep`
//! library; this binary only parses arguments and prints status lines.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::run::RunArgs;
use error::CliError;
use runner::CliRunner;

/// Resumable peer-to-peer downloads that never lose progress on exit.
#[derive(Debug, Parser)]
#[command(name = "torkeep", author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: <config_dir>/torkeep/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Resume registered downloads, add new ones and supervise them until
    /// they finish or Ctrl+C
    Run {
        /// .torrent files or magnet URIs to add
        sources: Vec<String>,

        /// Save directory for the added sources
        #[arg(long, value_name = "DIR")]
        save_path: Option<PathBuf>,
    },

    /// List registered downloads
    List,

    /// Forget a registered download (files on disk are kept)
    Remove {
        /// Download id as shown by `torkeep list`
        id: String,
    },

    /// Show the information report of a torrent
    Info {
        /// Registered id, .torrent file or magnet URI
        source: String,
    },

    /// Change the default save directory
    SavePath {
        /// New default save directory
        dir: PathBuf,
    },

    /// View or modify configuration settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config_path = cli
        .config
        .unwrap_or_else(torkeep::config::config_file_path);

    let verbose = cli.verbose;
    let runner = || CliRunner::new(&config_path, verbose);

    match cli.command {
        Commands::Init => commands::init::run(&config_path),
        Commands::Config(command) => commands::config::run(command, &config_path),
        Commands::Run { sources, save_path } => {
            commands::run::run(&runner()?, RunArgs { sources, save_path })
        }
        Commands::List => commands::list::run(&runner()?),
        Commands::Remove { id } => commands::remove::run(&runner()?, &id),
        Commands::Info { source } => commands::info::run(&runner()?, &source),
        Commands::SavePath { dir } => commands::save_path::run(&runner()?, dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_accepts_sources_and_save_path() {
        let cli = Cli::try_parse_from([
            "torkeep",
            "--verbose",
            "run",
            "a.torrent",
            "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567",
            "--save-path",
            "/srv/media",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Run { sources, save_path } => {
                assert_eq!(sources.len(), 2);
                assert_eq!(save_path, Some(PathBuf::from("/srv/media")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["torkeep", "list", "--config", "/tmp/t.ini"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.ini")));
    }
}
