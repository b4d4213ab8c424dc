//! Command-line interface definition for docchat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chatting and managing the local history.

use clap::{Parser, Subcommand};

/// docchat - chat with a documentation assistant from the terminal
///
/// Ask questions about the documentation and get answers with cited
/// sources. The conversation is kept across runs.
#[derive(Parser, Debug, Clone)]
#[command(name = "docchat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "DOCCHAT_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "DOCCHAT_LOG_JSON")]
    pub log_json: bool,

    /// Override the assistant service base URL
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Override the path of the local chat store
    #[arg(long)]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for docchat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Page the questions are about (forwarded as context)
        #[arg(short, long)]
        page: Option<String>,
    },

    /// Show the conversation history
    History {
        /// Fetch the backend's record of the session instead of the local copy
        #[arg(long)]
        remote: bool,

        /// Maximum number of messages to show
        #[arg(short, long, default_value_t = 50)]
        limit: usize,

        /// Number of messages to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Delete the saved messages, keeping the session
    Clear,

    /// Forget both the saved messages and the session
    Reset,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Config file to load, falling back to `config/config.yaml`
    pub fn config_path(&self) -> &str {
        self.config.as_deref().unwrap_or("config/config.yaml")
    }
}
