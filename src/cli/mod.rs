//! CLI module for Delve
//!
//! Command-line parsing for the `delve` binary. Uses clap for argument
//! parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Delve - multi-agent deep research
///
/// Clarifies a research request, delegates it to parallel researchers and
/// compiles their findings into a structured report.
#[derive(Parser, Debug)]
#[command(
    name = "delve",
    version,
    about = "Delve - multi-agent deep research",
    long_about = "Clarifies a research request, delegates it to parallel researcher agents\n\
                  and compiles their findings into a structured report.\n\n\
                  A run may stop with a clarifying question; answer it by running again\n\
                  with the same --thread id.",
    after_help = "EXAMPLES:\n    \
                  delve run \"Compare EV and ICE manufacturing emissions in 2023\"\n    \
                  delve run --thread t1 \"Tell me about AI\"      # may ask a question\n    \
                  delve run --thread t1 \"AI safety research\"    # answer it\n    \
                  delve run --stream \"History of the transistor\"\n    \
                  delve config --validate"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "delve.toml", global = true, env = "DELVE_CONFIG")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one research turn
    Run {
        /// The research request, or the answer to a clarifying question
        message: String,

        /// Conversation thread id; reuse it to answer a clarifying question
        #[arg(short, long)]
        thread: Option<String>,

        /// Print progress events as they happen
        #[arg(short, long)]
        stream: bool,
    },

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
