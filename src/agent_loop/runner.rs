//! Runner interfaces for the agent loop.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::config::SageConfig;
use crate::error::SageError;
use crate::models::LanguageModel;
use crate::provider::{ModelProvider, ProviderRegistry, ProviderRequest};
use crate::session::{InMemorySessionStore, SessionStore};
use crate::tools::{Tool, ToolExecutionContext, ToolGateway};
use crate::types::{
    GenerationSettings, Grounding, Message, StreamEvent, ToolCall, ToolResult,
};

use super::cancel::CancellationController;
use super::events::{
    RunEventEmitter, RunEventPayload, RunEventSink, RunEventStream, RunLifecycle,
};
use super::tool_mode::ToolMode;
use super::types::{RunId, RunOutcome, RunState, RunStatus};

/// Request payload to start a run.
#[derive(Clone)]
pub struct RunRequest {
    pub run_id: RunId,
    /// Conversation the run belongs to. One active run per chat.
    pub chat_id: String,
    pub model: LanguageModel,
    /// Caller's conversation. The run works on a copy.
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub settings: GenerationSettings,
    pub tools: Vec<Arc<dyn Tool>>,
    pub retrieval_stores: Vec<String>,
    pub web_search: bool,
    /// Offer mutating tools.
    pub allow_writes: bool,
    pub event_sink: Option<RunEventSink>,
}

impl RunRequest {
    pub fn new(chat_id: impl Into<String>, model: LanguageModel, messages: Vec<Message>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            chat_id: chat_id.into(),
            model,
            messages,
            system_prompt: None,
            settings: GenerationSettings::default(),
            tools: Vec::new(),
            retrieval_stores: Vec::new(),
            web_search: false,
            allow_writes: false,
            event_sink: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_retrieval_store(mut self, store: impl Into<String>) -> Self {
        self.retrieval_stores.push(store.into());
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    pub fn with_writes(mut self, allow: bool) -> Self {
        self.allow_writes = allow;
        self
    }

    pub fn with_event_sink(mut self, sink: RunEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }
}

impl std::fmt::Debug for RunRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRequest")
            .field("run_id", &self.run_id)
            .field("chat_id", &self.chat_id)
            .field("model", &self.model)
            .field("messages", &self.messages.len())
            .field("tools", &self.tools.len())
            .field("web_search", &self.web_search)
            .finish()
    }
}

/// Handle for an in-flight run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    controller: CancellationController,
    result_rx: oneshot::Receiver<Result<RunOutcome, SageError>>,
}

impl RunHandle {
    /// Create a new run handle and expose the result channel to a runner
    /// implementation.
    pub fn new(
        run_id: RunId,
        controller: CancellationController,
    ) -> (Self, oneshot::Sender<Result<RunOutcome, SageError>>) {
        let (result_tx, result_rx) = oneshot::channel();
        (
            Self {
                run_id,
                controller,
                result_rx,
            },
            result_tx,
        )
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Abort the run. Returns `false` when there was nothing to abort.
    pub fn abort(&self) -> bool {
        self.controller.abort()
    }

    pub fn controller(&self) -> &CancellationController {
        &self.controller
    }

    /// Wait for the run to finish. Aborted runs are `Ok` with
    /// [`RunOutcome::aborted`] set.
    pub async fn wait(self) -> Result<RunOutcome, SageError> {
        self.result_rx.await.unwrap_or_else(|_| {
            Err(SageError::InvalidState(
                "run task ended without reporting a result".into(),
            ))
        })
    }
}

/// Runner trait for executing agent loop requests.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn start(&self, request: RunRequest) -> Result<RunHandle, SageError>;
}

/// Default agent-loop runner.
#[derive(Clone)]
pub struct LoopRunner {
    config: SageConfig,
    registry: Arc<ProviderRegistry>,
    sessions: Arc<dyn SessionStore>,
    active_chats: Arc<Mutex<HashSet<String>>>,
}

impl LoopRunner {
    pub fn new(config: SageConfig) -> Self {
        Self {
            config,
            registry: Arc::new(ProviderRegistry::with_defaults()),
            sessions: Arc::new(InMemorySessionStore::new()),
            active_chats: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn is_active(&self, chat_id: &str) -> bool {
        lock_chats(&self.active_chats).contains(chat_id)
    }

    /// Start a fresh conversation for `chat_id`: stored provider sessions
    /// are forgotten.
    pub fn new_chat(&self, chat_id: &str) -> Result<(), SageError> {
        if self.is_active(chat_id) {
            return Err(SageError::InvalidState(format!(
                "chat '{chat_id}' has an active run"
            )));
        }
        self.sessions.clear(chat_id)
    }
}

fn lock_chats(chats: &Mutex<HashSet<String>>) -> std::sync::MutexGuard<'_, HashSet<String>> {
    chats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks a chat busy for the lifetime of its run task.
struct ActiveChat {
    chat_id: String,
    chats: Arc<Mutex<HashSet<String>>>,
}

impl ActiveChat {
    fn claim(chats: &Arc<Mutex<HashSet<String>>>, chat_id: &str) -> Result<Self, SageError> {
        if !lock_chats(chats).insert(chat_id.to_string()) {
            return Err(SageError::InvalidState(format!(
                "a run is already active for chat '{chat_id}'"
            )));
        }
        Ok(Self {
            chat_id: chat_id.to_string(),
            chats: chats.clone(),
        })
    }
}

impl Drop for ActiveChat {
    fn drop(&mut self) {
        lock_chats(&self.chats).remove(&self.chat_id);
    }
}

#[async_trait]
impl Runner for LoopRunner {
    async fn start(&self, request: RunRequest) -> Result<RunHandle, SageError> {
        let active = ActiveChat::claim(&self.active_chats, &request.chat_id)?;
        let controller = CancellationController::new();
        let (handle, result_tx) = RunHandle::new(request.run_id, controller.clone());
        let runner = self.clone();

        tokio::spawn(async move {
            let run_id = request.run_id;
            tracing::debug!(
                run_id = %run_id,
                chat_id = %request.chat_id,
                model = %request.model,
                "run start"
            );
            let emitter = RunEventEmitter::new(run_id, request.event_sink.clone());
            emitter.lifecycle(RunLifecycle::Started);

            let mut state = RunState::new(request.messages.clone());
            let result = runner.run(request, &mut state, &controller, &emitter).await;
            let aborted = controller.finish();
            let result = match result {
                Ok(run_aborted) => {
                    let outcome = state.into_outcome(run_aborted || aborted);
                    if outcome.aborted {
                        tracing::debug!(run_id = %run_id, "run aborted");
                        emitter.lifecycle(RunLifecycle::Aborted);
                    } else {
                        tracing::debug!(run_id = %run_id, iterations = outcome.iterations, "run completed");
                        emitter.lifecycle(RunLifecycle::Completed);
                    }
                    Ok(outcome)
                }
                Err(err) if aborted => {
                    tracing::debug!(run_id = %run_id, error = %err, "run aborted while failing");
                    emitter.lifecycle(RunLifecycle::Aborted);
                    Ok(state.into_outcome(true))
                }
                Err(err) => {
                    tracing::debug!(run_id = %run_id, error = %err, "run failed");
                    emitter.lifecycle(RunLifecycle::Failed {
                        error: err.to_string(),
                    });
                    Err(err)
                }
            };

            drop(active);
            let _ = result_tx.send(result);
        });

        Ok(handle)
    }
}

/// How one streaming round ended.
enum RoundEnd {
    Completed(Vec<ToolCall>),
    Aborted,
}

impl LoopRunner {
    async fn run(
        &self,
        request: RunRequest,
        state: &mut RunState,
        controller: &CancellationController,
        emitter: &RunEventEmitter,
    ) -> Result<bool, SageError> {
        let provider = self.registry.create_for(&request.model, &self.config)?;
        let capabilities = provider.capabilities().clone();

        let web_search = request.web_search && capabilities.supports_web_search;
        if request.web_search && !web_search {
            tracing::warn!(
                run_id = %request.run_id,
                provider = provider.provider_name(),
                "web search unsupported by this backend, ignoring"
            );
        }
        let retrieval_stores = if capabilities.supports_retrieval {
            request.retrieval_stores.clone()
        } else {
            if !request.retrieval_stores.is_empty() {
                tracing::warn!(
                    run_id = %request.run_id,
                    provider = provider.provider_name(),
                    "retrieval unsupported by this backend, ignoring stores"
                );
            }
            Vec::new()
        };

        let mode = ToolMode::select(&capabilities, web_search, !retrieval_stores.is_empty());
        let gateway = mode.apply(&ToolGateway::new(request.tools.clone()), request.allow_writes);
        let tool_defs = (!gateway.is_empty()).then(|| gateway.definitions());
        tracing::debug!(
            run_id = %request.run_id,
            provider = provider.provider_name(),
            ?mode,
            tools = gateway.len(),
            "tool mode selected"
        );

        let ctx = ToolExecutionContext {
            run_id: Some(request.run_id.to_string()),
            chat_id: Some(request.chat_id.clone()),
        };
        let max_iterations = self.config.max_tool_iterations();

        loop {
            if controller.is_aborted() {
                return Ok(true);
            }
            if state.iteration_count >= max_iterations {
                state.status = RunStatus::Errored;
                return Err(SageError::IterationLimit {
                    max: max_iterations,
                });
            }
            state.iteration_count += 1;
            state.status = RunStatus::Streaming;

            let provider_request = ProviderRequest {
                messages: state.conversation.clone(),
                system_prompt: request.system_prompt.clone(),
                tools: tool_defs.clone(),
                settings: request.settings.clone(),
                retrieval_stores: retrieval_stores.clone(),
                web_search,
                session_id: self.stored_session(&request.chat_id, provider.as_ref(), &capabilities),
            };

            let (round_text, calls) = match self
                .stream_round(provider.as_ref(), &provider_request, &request, state, controller, emitter)
                .await?
            {
                (text, RoundEnd::Aborted) => {
                    if !text.is_empty() {
                        state.conversation.push(Message::model(text));
                    }
                    return Ok(true);
                }
                (text, RoundEnd::Completed(calls)) => (text, calls),
            };

            tracing::debug!(
                run_id = %request.run_id,
                iteration = state.iteration_count,
                tool_calls = calls.len(),
                text_len = round_text.len(),
                "iteration complete"
            );

            if calls.is_empty() {
                if !round_text.is_empty() {
                    state.conversation.push(Message::model(round_text));
                }
                return Ok(false);
            }

            state.status = RunStatus::AwaitingTools;
            state
                .conversation
                .push(Message::model_tool_calls(round_text, calls.clone()));

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                if controller.is_aborted() {
                    results.push(ToolResult::failure(&call.name, "run aborted"));
                    continue;
                }
                emitter.emit(
                    RunEventStream::Tool,
                    RunEventPayload::ToolCallStarted { call: call.clone() },
                );
                let result = gateway.execute(call, &ctx).await;
                emitter.emit(
                    RunEventStream::Tool,
                    RunEventPayload::ToolResult {
                        result: result.clone(),
                    },
                );
                state.tool_calls.push(call.clone());
                state.tool_results.push(result.clone());
                results.push(result);
            }
            state.conversation.push(Message::tool_results(results));
        }
    }

    fn stored_session(
        &self,
        chat_id: &str,
        provider: &dyn ModelProvider,
        capabilities: &crate::models::ModelCapabilities,
    ) -> Option<String> {
        if !capabilities.supports_session_resumption {
            return None;
        }
        match self.sessions.get(chat_id, provider.provider_name()) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(chat_id, error = %err, "failed to read stored session");
                None
            }
        }
    }

    /// Drive one adapter invocation to its end.
    async fn stream_round(
        &self,
        provider: &dyn ModelProvider,
        provider_request: &ProviderRequest,
        request: &RunRequest,
        state: &mut RunState,
        controller: &CancellationController,
        emitter: &RunEventEmitter,
    ) -> Result<(String, RoundEnd), SageError> {
        let token = controller.token();
        let mut round_text = String::new();
        let mut calls = Vec::new();

        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok((round_text, RoundEnd::Aborted)),
            stream = provider.stream(provider_request, token.clone()) => match stream {
                Ok(stream) => stream,
                Err(_) if controller.is_aborted() => return Ok((round_text, RoundEnd::Aborted)),
                Err(err) => return Err(err),
            },
        };

        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => StreamEvent::Aborted,
                event = stream.next() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                StreamEvent::TextDelta(text) => {
                    state.accumulated_text.push_str(&text);
                    round_text.push_str(&text);
                    emitter.emit(
                        RunEventStream::Assistant,
                        RunEventPayload::AssistantDelta { text },
                    );
                }
                StreamEvent::ToolCallRequested(call) => calls.push(call),
                StreamEvent::RetrievalUsed(Grounding::WebSearch) => {
                    state.web_search_used = true;
                    emitter.emit(
                        RunEventStream::Retrieval,
                        RunEventPayload::Grounding {
                            web_search: true,
                            sources: Vec::new(),
                        },
                    );
                }
                StreamEvent::RetrievalUsed(Grounding::Sources(sources)) => {
                    state.retrieval_sources.extend(sources.iter().cloned());
                    emitter.emit(
                        RunEventStream::Retrieval,
                        RunEventPayload::Grounding {
                            web_search: false,
                            sources,
                        },
                    );
                }
                StreamEvent::SessionId(session_id) => {
                    self.record_session(request, provider, state, session_id, emitter);
                }
                StreamEvent::Error(err) => {
                    if controller.is_aborted() {
                        return Ok((round_text, RoundEnd::Aborted));
                    }
                    return Err(err);
                }
                StreamEvent::Aborted => return Ok((round_text, RoundEnd::Aborted)),
            }
        }

        if controller.is_aborted() {
            return Ok((round_text, RoundEnd::Aborted));
        }
        Ok((round_text, RoundEnd::Completed(calls)))
    }

    fn record_session(
        &self,
        request: &RunRequest,
        provider: &dyn ModelProvider,
        state: &mut RunState,
        session_id: String,
        emitter: &RunEventEmitter,
    ) {
        // First id seen during a run is kept for the whole run.
        if state.session_id.is_some() {
            return;
        }
        let provider_name = provider.provider_name().to_string();
        if let Err(err) = self
            .sessions
            .set(&request.chat_id, &provider_name, &session_id)
        {
            tracing::warn!(chat_id = %request.chat_id, error = %err, "failed to store session id");
        }
        state.session_id = Some(session_id.clone());
        emitter.emit(
            RunEventStream::Session,
            RunEventPayload::SessionStarted {
                provider: provider_name,
                session_id,
            },
        );
    }
}
