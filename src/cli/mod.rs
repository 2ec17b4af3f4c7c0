//! Command-line surface of the `sage` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sage conversational client
#[derive(Parser, Debug)]
#[command(name = "sage", version, about = "Chat with hosted and CLI AI backends over a workspace")]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one prompt through the agent loop
    Chat(ChatArgs),
    /// Check which CLI backends are installed and usable
    Check(CheckArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Model to use (provider:model, a CLI name, or a Gemini model id)
    #[arg(short, long, default_value = "gemini:gemini-2.5-flash")]
    pub model: String,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Max output tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Workspace directory the tools operate on
    #[arg(short, long, default_value = ".")]
    pub workspace: PathBuf,

    /// Allow tools that modify the workspace
    #[arg(long)]
    pub allow_writes: bool,

    /// Ground answers with hosted web search
    #[arg(long)]
    pub web_search: bool,

    /// Hosted retrieval store to ground answers with (repeatable)
    #[arg(long = "store")]
    pub stores: Vec<String>,

    /// Chat id used for session resumption
    #[arg(long, default_value = "default")]
    pub chat_id: String,

    /// Forget stored backend sessions for this chat before sending
    #[arg(long)]
    pub new_chat: bool,

    /// User prompt
    pub prompt: String,
}

/// Arguments for the `check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Also send a trivial prompt to every available backend
    #[arg(long)]
    pub verify: bool,
}
