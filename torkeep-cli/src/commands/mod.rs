//! CLI subcommand implementations.

pub mod config;
pub mod info;
pub mod init;
pub mod list;
pub mod remove;
pub mod run;
pub mod save_path;
