//! Adapters for external command-line AI backends.
//!
//! Every backend shares one process contract: the prompt goes to stdin,
//! stdout is one JSON object per line, stderr is captured for diagnostics.
//! Only the argument list and the per-line schema differ, which is what
//! [`CliBackend`] captures.

pub mod check;
pub mod claude;
pub mod codex;
pub mod gemini_cli;
pub mod locate;

use std::marker::PhantomData;
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::SageConfig;
use crate::error::SageError;
use crate::models::{CliKind, ModelCapabilities};
use crate::stream::LineDecoder;
use crate::types::{EventStream, Message, Role, StreamEvent};

use super::{ModelProvider, ProviderFactory, ProviderRequest};

pub use check::{available_backends, check_available, verify};
pub use claude::ClaudeCode;
pub use codex::Codex;
pub use gemini_cli::GeminiCli;

const READ_CHUNK: usize = 8192;
const STDOUT_TAIL_BYTES: usize = 2048;

/// Wire schema and argument conventions of one CLI backend.
pub trait CliBackend: Send + Sync + 'static {
    /// One line of the backend's JSON output.
    type Event: DeserializeOwned + Send + 'static;

    const KIND: CliKind;

    /// Arguments for a non-interactive streaming invocation. The prompt is
    /// written to stdin.
    fn args(model: Option<&str>, resume_session: Option<&str>) -> Vec<String>;

    /// Narrow one backend event onto the shared event set.
    fn map_event(event: Self::Event) -> Option<StreamEvent>;
}

/// Install instructions shown when the executable cannot be found.
pub fn install_hint(kind: CliKind) -> &'static str {
    match kind {
        CliKind::ClaudeCode => "Install it with `npm install -g @anthropic-ai/claude-code`.",
        CliKind::Codex => "Install it with `npm install -g @openai/codex`.",
        CliKind::GeminiCli => "Install it with `npm install -g @google/gemini-cli`.",
    }
}

/// Log-in instructions shown when a verification prompt fails.
pub fn login_hint(kind: CliKind) -> &'static str {
    match kind {
        CliKind::ClaudeCode => "Run `claude` once in a terminal and complete the login.",
        CliKind::Codex => "Run `codex login` in a terminal.",
        CliKind::GeminiCli => "Run `gemini` once in a terminal and sign in.",
    }
}

/// Flatten a conversation into one prompt for a backend without history.
pub fn flatten_conversation(system_prompt: Option<&str>, messages: &[Message]) -> String {
    let mut lines = Vec::new();
    if let Some(system) = system_prompt.filter(|s| !s.trim().is_empty()) {
        lines.push(format!("System: {system}"));
    }
    for msg in messages {
        if msg.is_tool_result_turn() {
            continue;
        }
        let mut text = msg.text.clone();
        for attachment in &msg.attachments {
            let name = attachment.name.as_deref().unwrap_or(&attachment.mime_type);
            text.push_str(&format!(" [attachment: {name}]"));
        }
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let speaker = match msg.role {
            Role::User => "User",
            Role::Model => "Assistant",
        };
        lines.push(format!("{speaker}: {text}"));
    }
    lines.join("\n")
}

/// The newest user-authored message, for resumed sessions.
pub fn latest_user_text(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User && !m.is_tool_result_turn())
        .map(|m| m.text.as_str())
}

/// One CLI backend driven as a [`ModelProvider`].
pub struct CliProvider<B: CliBackend> {
    executable: PathBuf,
    model: Option<String>,
    timeout: Duration,
    working_dir: Option<PathBuf>,
    capabilities: ModelCapabilities,
    _backend: PhantomData<fn() -> B>,
}

impl<B: CliBackend> CliProvider<B> {
    pub fn new(executable: PathBuf, model: Option<String>, config: &SageConfig) -> Self {
        Self {
            executable,
            model: model.filter(|m| !m.is_empty()),
            timeout: config.request_timeout(),
            working_dir: None,
            capabilities: B::KIND.capabilities(),
            _backend: PhantomData,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }

    /// Prompt text and resume id for one invocation.
    fn prepare(&self, request: &ProviderRequest) -> (String, Option<String>) {
        let resume = request
            .session_id
            .clone()
            .filter(|_| self.capabilities.supports_session_resumption);
        match (resume, latest_user_text(&request.messages)) {
            (Some(session), Some(text)) => (text.to_string(), Some(session)),
            _ => (
                flatten_conversation(request.system_prompt.as_deref(), &request.messages),
                None,
            ),
        }
    }

    fn spawn_error(&self, err: std::io::Error) -> SageError {
        if err.kind() == std::io::ErrorKind::NotFound {
            SageError::unavailable(
                B::KIND.display_name(),
                format!(
                    "`{}` was not found. {}",
                    self.executable.display(),
                    install_hint(B::KIND)
                ),
            )
        } else {
            SageError::transport(
                B::KIND.as_str(),
                format!("failed to start {}: {err}", self.executable.display()),
            )
        }
    }
}

enum Step {
    Cancelled,
    TimedOut,
    Read(std::io::Result<usize>),
}

fn exit_detail(stderr: &[u8], stdout_tail: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let tail = String::from_utf8_lossy(stdout_tail);
    let tail = tail.trim();
    if tail.is_empty() {
        "no output".to_string()
    } else {
        tail.to_string()
    }
}

#[async_trait]
impl<B: CliBackend> ModelProvider for CliProvider<B> {
    fn provider_name(&self) -> &str {
        B::KIND.as_str()
    }

    fn model_id(&self) -> &str {
        self.model.as_deref().unwrap_or("")
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    async fn stream(
        &self,
        request: &ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, SageError> {
        let (prompt, resume) = self.prepare(request);
        let args = B::args(self.model.as_deref(), resume.as_deref());
        let kind = B::KIND;
        let timeout = self.timeout;

        debug!(
            backend = kind.as_str(),
            executable = %self.executable.display(),
            resumed = resume.is_some(),
            "spawning CLI backend"
        );

        let mut command = tokio::process::Command::new(&self.executable);
        command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| self.spawn_error(e))?;
        let missing = |stream: &str| SageError::InvalidState(format!("child {stream} not captured"));
        let mut stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let mut stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        tokio::spawn(async move {
            if let Err(err) = stdin.write_all(prompt.as_bytes()).await {
                tracing::trace!(error = %err, "CLI backend closed stdin early");
            }
            let _ = stdin.shutdown().await;
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let stream = async_stream::stream! {
            let mut decoder = LineDecoder::json_lines();
            let mut tail: Vec<u8> = Vec::new();
            let mut buf = vec![0u8; READ_CHUNK];
            let mut session_seen = false;
            let deadline = tokio::time::sleep(timeout);
            tokio::pin!(deadline);

            loop {
                let step = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Step::Cancelled,
                    _ = &mut deadline => Step::TimedOut,
                    read = stdout.read(&mut buf) => Step::Read(read),
                };

                let n = match step {
                    Step::Cancelled => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        debug!(backend = kind.as_str(), "CLI backend killed on abort");
                        yield StreamEvent::Aborted;
                        return;
                    }
                    Step::TimedOut => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        yield StreamEvent::Error(SageError::Timeout(timeout.as_millis() as u64));
                        return;
                    }
                    Step::Read(Ok(0)) => break,
                    Step::Read(Ok(n)) => n,
                    Step::Read(Err(err)) => {
                        let _ = child.start_kill();
                        yield StreamEvent::Error(SageError::transport(kind.as_str(), err.to_string()));
                        return;
                    }
                };

                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDOUT_TAIL_BYTES {
                    tail.drain(..tail.len() - STDOUT_TAIL_BYTES);
                }

                for event in decoder.decode::<B::Event>(&buf[..n]) {
                    match B::map_event(event) {
                        Some(StreamEvent::SessionId(id)) => {
                            // First id of the run wins.
                            if !session_seen {
                                session_seen = true;
                                yield StreamEvent::SessionId(id);
                            }
                        }
                        Some(StreamEvent::Error(err)) => {
                            let _ = child.start_kill();
                            yield StreamEvent::Error(err);
                            return;
                        }
                        Some(event) => yield event,
                        None => {}
                    }
                }
            }

            let leftover = decoder.finish();
            if !leftover.trim().is_empty() {
                tracing::trace!(bytes = leftover.len(), "discarding unterminated CLI output");
            }

            let status = child.wait().await;
            let stderr = stderr_task.await.unwrap_or_default();
            match status {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    yield StreamEvent::Error(SageError::transport(
                        kind.as_str(),
                        format!("{status}: {}", exit_detail(&stderr, &tail)),
                    ));
                }
                Err(err) => {
                    yield StreamEvent::Error(SageError::transport(kind.as_str(), err.to_string()));
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Factory for every CLI backend, keyed by [`CliKind::as_str`].
pub struct CliFactory;

impl ProviderFactory for CliFactory {
    fn provider_keys(&self) -> &[&str] {
        &["claude", "codex", "gemini-cli"]
    }

    fn create(
        &self,
        config: &SageConfig,
        provider_key: &str,
        model_id: &str,
    ) -> Result<Box<dyn ModelProvider>, SageError> {
        let kind = CliKind::from_str(provider_key).map_err(|_| {
            SageError::ModelNotFound(format!("Unknown CLI backend '{provider_key}'"))
        })?;
        let working_dir = config.working_dir().map(PathBuf::from);
        Ok(create_cli_provider(kind, model_id, config, working_dir))
    }

    fn capabilities(&self, provider_key: &str, _model_id: &str) -> ModelCapabilities {
        CliKind::from_str(provider_key)
            .map(CliKind::capabilities)
            .unwrap_or_else(|_| ModelCapabilities::cli(false))
    }
}

/// Build the adapter for `kind`, optionally running inside `working_dir`.
pub fn create_cli_provider(
    kind: CliKind,
    model_id: &str,
    config: &SageConfig,
    working_dir: Option<PathBuf>,
) -> Box<dyn ModelProvider> {
    let executable = locate::resolve(kind, config);
    let model = Some(model_id.to_string());
    fn build<B: CliBackend>(
        executable: PathBuf,
        model: Option<String>,
        config: &SageConfig,
        working_dir: Option<PathBuf>,
    ) -> Box<dyn ModelProvider> {
        let provider = CliProvider::<B>::new(executable, model, config);
        match working_dir {
            Some(dir) => Box::new(provider.with_working_dir(dir)),
            None => Box::new(provider),
        }
    }
    match kind {
        CliKind::ClaudeCode => build::<ClaudeCode>(executable, model, config, working_dir),
        CliKind::Codex => build::<Codex>(executable, model, config, working_dir),
        CliKind::GeminiCli => build::<GeminiCli>(executable, model, config, working_dir),
    }
}
