//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{DiagnoseCommand, HistoryCommand, ListCommand, RunCommand, ValidateCommand};

/// Release build pipeline driver
#[derive(Debug, Parser, Clone)]
#[command(name = "relpipe")]
#[command(author = "relpipe contributors")]
#[command(version = "0.1.0")]
#[command(about = "Drive tag-pinned upstream release builds from a YAML plan", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a build plan end to end
    Run(RunCommand),

    /// Validate a build plan
    Validate(ValidateCommand),

    /// Scan build logs of an existing checkout for errors
    Diagnose(DiagnoseCommand),

    /// List projects with recorded builds
    List(ListCommand),

    /// Show build history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

use std::ffi::OsString;
