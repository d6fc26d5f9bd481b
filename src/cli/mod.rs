//! CLI module for SearchGPT.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{mask_secret, Output};

use clap::{Parser, Subcommand};

/// SearchGPT - chat with your search index
///
/// Answers questions from the highlighted results of an Azure AI Search index,
/// keeping per-conversation history for follow-up questions.
#[derive(Parser, Debug)]
#[command(name = "searchgpt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check configuration and credentials
    Doctor,

    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,

        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Print the answer as it is generated
        #[arg(short, long)]
        stream: bool,
    },

    /// Start an interactive chat session
    Chat,

    /// Delete a conversation and its history
    Delete {
        /// Conversation ID
        conversation: String,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
