//! Sage: conversational AI client core.
//!
//! Drives one conversation turn against either the hosted Gemini API or a
//! locally installed command-line assistant (Claude Code, Codex, Gemini CLI),
//! feeding tool calls back to the model until it produces a final answer.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sage::prelude::*;
//! use sage::tools::{workspace_tools, FsWorkspace};
//!
//! # async fn example() -> sage::error::Result<()> {
//! let runner = LoopRunner::new(SageConfig::load()?);
//! let model: LanguageModel = "gemini:gemini-2.5-flash".parse()?;
//! let request = RunRequest::new("notes", model, vec![Message::user("What's in todo.md?")])
//!     .with_tools(workspace_tools(Arc::new(FsWorkspace::new("."))));
//!
//! let outcome = runner.start(request).await?.wait().await?;
//! println!("{}", outcome.text);
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod error;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod stream;
pub mod tools;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
