//! Command-line argument parsing for ragpilot.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ragpilot - ask questions grounded in your own documents
#[derive(Parser, Debug)]
#[command(name = "ragpilot")]
#[command(version)]
#[command(about = "Agentic retrieval-augmented question answering on local Ollama models", long_about = None)]
pub struct Args {
    /// Chat model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Ollama host
    #[arg(long)]
    pub host: Option<String>,

    /// Ollama port
    #[arg(long)]
    pub port: Option<u16>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbosity: -v (debug), -vv (trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load, chunk, embed, and index documents
    Index {
        /// Files to index (text, markdown, or JSON)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Ask a single question and print the cited answer
    Ask {
        /// The question
        question: String,

        /// Resume an existing session by id
        #[arg(long)]
        session: Option<String>,
    },

    /// Interactive chat with conversational memory
    Chat {
        /// Resume an existing session by id
        #[arg(long)]
        session: Option<String>,
    },

    /// List persisted sessions
    Sessions,

    /// Display the effective configuration
    Config,
}

impl Args {
    /// Log filter directive from the verbosity flags
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "ragpilot=info",
            1 => "ragpilot=debug",
            _ => "trace",
        }
    }
}
