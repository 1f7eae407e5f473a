//! Configuration and CLI argument handling

use std::path::PathBuf;
use clap::{Parser, ValueEnum};

use crate::state::Mode;

/// CLI argument parsing structure
#[derive(Parser)]
#[command(name = "countdown-sequencer")]
#[command(about = "A serial/parallel countdown sequencer with reminders, served over HTTP")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Directory the session snapshot is saved in
    #[arg(long, default_value = ".countdown")]
    pub state_dir: PathBuf,

    /// Mode for a fresh session (ignored when a saved session exists)
    #[arg(short, long, value_enum, default_value_t = ModeArg::Serial)]
    pub mode: ModeArg,

    /// Discard any saved session on startup
    #[arg(long)]
    pub fresh: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Serial,
    Parallel,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Serial => Mode::Serial,
            ModeArg::Parallel => Mode::Parallel,
        }
    }
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
