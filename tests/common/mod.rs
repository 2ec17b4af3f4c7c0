//! Shared test helpers and a scripted provider.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sage::agent_loop::LoopRunner;
use sage::config::SageConfig;
use sage::error::SageError;
use sage::models::{LanguageModel, ModelCapabilities};
use sage::provider::{ModelProvider, ProviderFactory, ProviderRegistry, ProviderRequest};
use sage::types::{EventStream, Grounding, StreamEvent, ToolCall};

pub const SCRIPTED: &str = "scripted";

/// One step of a scripted adapter invocation.
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    Call(String, serde_json::Value),
    Session(String),
    Sources(Vec<String>),
    WebSearch,
    Fail(String),
    /// Block until the run is cancelled, then report the abort.
    Hang,
}

pub fn text(s: &str) -> Step {
    Step::Text(s.to_string())
}

pub fn call(name: &str, args: serde_json::Value) -> Step {
    Step::Call(name.to_string(), args)
}

/// Rounds handed out one per invocation. The last round repeats forever.
#[derive(Default)]
pub struct Script {
    rounds: Mutex<VecDeque<Vec<Step>>>,
    invocations: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl Script {
    pub fn new(rounds: Vec<Vec<Step>>) -> Arc<Self> {
        Arc::new(Self {
            rounds: Mutex::new(rounds.into()),
            ..Default::default()
        })
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Every request the adapter received, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_round(&self, request: &ProviderRequest) -> Vec<Step> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let mut rounds = self.rounds.lock().unwrap();
        if rounds.len() > 1 {
            rounds.pop_front().unwrap_or_default()
        } else {
            rounds.front().cloned().unwrap_or_default()
        }
    }
}

pub struct ScriptedProvider {
    script: Arc<Script>,
    capabilities: ModelCapabilities,
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        SCRIPTED
    }

    fn model_id(&self) -> &str {
        "test"
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    async fn stream(
        &self,
        request: &ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, SageError> {
        let round = self.script.next_round(request);
        let stream = async_stream::stream! {
            for step in round {
                match step {
                    Step::Text(t) => yield StreamEvent::TextDelta(t),
                    Step::Call(name, args) => yield StreamEvent::ToolCallRequested(ToolCall::new(name, args)),
                    Step::Session(id) => yield StreamEvent::SessionId(id),
                    Step::Sources(s) => yield StreamEvent::RetrievalUsed(Grounding::Sources(s)),
                    Step::WebSearch => yield StreamEvent::RetrievalUsed(Grounding::WebSearch),
                    Step::Fail(message) => {
                        yield StreamEvent::Error(SageError::transport(SCRIPTED, message));
                        return;
                    }
                    Step::Hang => {
                        cancel.cancelled().await;
                        yield StreamEvent::Aborted;
                        return;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

pub struct ScriptedFactory {
    script: Arc<Script>,
    capabilities: ModelCapabilities,
}

impl ProviderFactory for ScriptedFactory {
    fn provider_keys(&self) -> &[&str] {
        &[SCRIPTED]
    }

    fn create(
        &self,
        _config: &SageConfig,
        _provider_key: &str,
        _model_id: &str,
    ) -> Result<Box<dyn ModelProvider>, SageError> {
        Ok(Box::new(ScriptedProvider {
            script: self.script.clone(),
            capabilities: self.capabilities.clone(),
        }))
    }

    fn capabilities(&self, _provider_key: &str, _model_id: &str) -> ModelCapabilities {
        self.capabilities.clone()
    }
}

pub fn scripted_model() -> LanguageModel {
    LanguageModel::Custom {
        provider: SCRIPTED.to_string(),
        model_id: "test".to_string(),
    }
}

/// Runner whose only provider is the scripted one.
pub fn scripted_runner(
    script: &Arc<Script>,
    capabilities: ModelCapabilities,
    config: SageConfig,
) -> LoopRunner {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(ScriptedFactory {
        script: script.clone(),
        capabilities,
    }));
    LoopRunner::new(config).with_registry(registry)
}
