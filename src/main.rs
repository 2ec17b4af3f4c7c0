//! Sage CLI binary entry point.

use std::sync::Arc;

use clap::Parser;
use sage::agent_loop::{
    LoopRunner, RunEvent, RunEventPayload, RunEventSink, RunLifecycle, RunRequest, Runner,
};
use sage::cli::{ChatArgs, CheckArgs, Cli, Commands};
use sage::config::SageConfig;
use sage::error::SageError;
use sage::models::{CliKind, LanguageModel};
use sage::provider::cli as cli_backends;
use sage::session::FileSessionStore;
use sage::tools::{workspace_tools, FsWorkspace};
use sage::types::{GenerationSettings, Message};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SAGE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SageConfig::from_file(path).map(|c| c.overlay_env()),
        None => SageConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Chat(args) => handle_chat(config, args).await,
        Commands::Check(args) => handle_check(config, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_chat(config: SageConfig, args: ChatArgs) -> Result<(), SageError> {
    let model: LanguageModel = args.model.parse()?;
    let config = config.with_working_dir(&args.workspace);

    let runner = LoopRunner::new(config)
        .with_session_store(Arc::new(FileSessionStore::new_default()));
    if args.new_chat {
        runner.new_chat(&args.chat_id)?;
    }

    let settings = GenerationSettings::builder()
        .maybe_temperature(args.temperature)
        .maybe_max_output_tokens(args.max_tokens)
        .build();

    let sink: RunEventSink = Arc::new(|event: RunEvent| {
        use std::io::Write;
        match &event.payload {
            RunEventPayload::AssistantDelta { text } => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            RunEventPayload::ToolCallStarted { call } => {
                eprintln!("\n> {} {}", call.name, serde_json::Value::Object(call.arguments.clone()));
            }
            RunEventPayload::ToolResult { result } if !result.success => {
                eprintln!("  failed: {}", result.error_message.as_deref().unwrap_or(""));
            }
            RunEventPayload::Lifecycle {
                state: RunLifecycle::Aborted,
            } => {
                eprintln!("\n(aborted)");
            }
            _ => {}
        }
    });

    let workspace = Arc::new(FsWorkspace::new(&args.workspace));
    let mut request = RunRequest::new(args.chat_id, model, vec![Message::user(args.prompt)])
        .with_settings(settings)
        .with_tools(workspace_tools(workspace))
        .with_web_search(args.web_search)
        .with_writes(args.allow_writes)
        .with_event_sink(sink);
    if let Some(system) = args.system {
        request = request.with_system_prompt(system);
    }
    for store in args.stores {
        request = request.with_retrieval_store(store);
    }

    let handle = runner.start(request).await?;
    let controller = handle.controller().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            controller.abort();
        }
    });

    let outcome = handle.wait().await;
    println!();
    let outcome = outcome?;
    if outcome.web_search_used {
        eprintln!("(grounded with web search)");
    }
    if !outcome.retrieval_sources.is_empty() {
        eprintln!("Sources:");
        for source in &outcome.retrieval_sources {
            eprintln!("  {source}");
        }
    }
    if !outcome.tool_calls_used.is_empty() {
        tracing::debug!(tools = ?outcome.tool_calls_used, iterations = outcome.iterations, "run finished");
    }
    Ok(())
}

async fn handle_check(config: SageConfig, args: CheckArgs) -> Result<(), SageError> {
    for kind in CliKind::ALL {
        match cli_backends::check_available(kind, &config).await {
            Ok((path, version)) => {
                println!("{:<12} {} ({})", kind.display_name(), version, path.display());
                if args.verify {
                    match cli_backends::verify(kind, &config).await {
                        Ok(()) => println!("{:<12} verified", ""),
                        Err(err) => println!("{:<12} {err}", ""),
                    }
                }
            }
            Err(err) => println!("{:<12} {err}", kind.display_name()),
        }
    }
    Ok(())
}
