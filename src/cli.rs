use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "answer-overlay")]
#[command(version)]
#[command(about = "Highlight feedback fragments over long-form answers and route feedback chat")]
pub struct Args {
    /// Path to a TOML config file (defaults to ./answer-overlay.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, overriding config and environment
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Width of the rendered progress bar, in characters
    #[arg(long, global = true, default_value = "30")]
    pub bar_width: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run the reference backend on localhost
    Serve {
        #[arg(long, default_value = "5000")]
        port: u16,
    },
    /// Evaluate one answer and show highlights, score and feedback
    Evaluate {
        /// Question id (e.g. q1)
        question: String,
        /// Answer text
        answer: String,
    },
    /// Evaluate an answer, then open a focused conversation on one feedback item
    Discuss {
        question: String,
        answer: String,
        /// 1-based feedback item number
        #[arg(long, short, default_value = "1")]
        item: usize,
    },
    /// Send a chat message and show where the reply was routed
    Chat {
        message: String,
    },
    /// Save answers given as QID=TEXT pairs
    Save {
        #[arg(value_parser = parse_answer, required = true)]
        answers: Vec<(String, String)>,
    },
    /// Load and print saved answers
    Load,
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Parse `QID=TEXT`. The text may itself contain `=`.
pub fn parse_answer(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((id, text)) if !id.trim().is_empty() => Ok((id.trim().to_string(), text.to_string())),
        _ => Err(format!("expected QID=TEXT, got '{raw}'")),
    }
}
