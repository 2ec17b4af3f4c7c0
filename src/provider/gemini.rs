//! Hosted Gemini API adapter.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::SageConfig;
use crate::error::SageError;
use crate::models::capabilities::ModelCapabilities;
use crate::models::gemini::GeminiModel;
use crate::stream::LineDecoder;
use crate::types::{EventStream, Grounding, Message, Role, StreamEvent, ToolCall};

use super::http::{gemini_headers, shared_client};
use super::{ModelProvider, ProviderFactory, ProviderRequest};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const PROVIDER: &str = "gemini";
const STORE_PREFIX: &str = "fileSearchStores/";

pub struct GeminiProvider {
    model: GeminiModel,
    api_key: String,
    base_url: String,
    timeout: std::time::Duration,
    capabilities: ModelCapabilities,
}

impl GeminiProvider {
    pub fn new(model: GeminiModel, api_key: String, config: &SageConfig) -> Self {
        let capabilities = model.capabilities();
        let base_url = config
            .get_base_url(PROVIDER)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            model,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout(),
            capabilities,
        }
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url,
            self.model.as_str()
        )
    }

    pub(crate) fn build_request_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter_map(message_content)
            .collect();

        let mut body = serde_json::Map::new();
        body.insert("contents".into(), contents.into());

        if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            body.insert(
                "systemInstruction".into(),
                serde_json::json!({ "parts": [{ "text": system }] }),
            );
        }

        let mut tools = Vec::new();
        if request.web_search {
            // Web search replaces both function declarations and retrieval.
            tools.push(serde_json::json!({ "google_search": {} }));
        } else {
            if let Some(defs) = request.tools.as_ref().filter(|t| !t.is_empty()) {
                let fn_decls: Vec<serde_json::Value> = defs
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        })
                    })
                    .collect();
                tools.push(serde_json::json!({ "functionDeclarations": fn_decls }));
            }
            if request.wants_retrieval() {
                let stores: Vec<String> = request
                    .retrieval_stores
                    .iter()
                    .map(|s| canonical_store_name(s))
                    .collect();
                tools.push(serde_json::json!({
                    "file_search": { "file_search_store_names": stores }
                }));
            }
        }
        if !tools.is_empty() {
            body.insert("tools".into(), tools.into());
        }

        let settings = &request.settings;
        let mut gen_config = serde_json::Map::new();
        if let Some(max) = settings.max_output_tokens {
            gen_config.insert("maxOutputTokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            gen_config.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            gen_config.insert("topP".into(), top_p.into());
        }
        if !gen_config.is_empty() {
            body.insert("generationConfig".into(), gen_config.into());
        }

        serde_json::Value::Object(body)
    }

    fn classify_send_error(&self, err: reqwest::Error, store_requested: bool) -> SageError {
        classify_transport_error(err, store_requested, self.timeout)
    }
}

/// Normalize a retrieval store reference to `fileSearchStores/<name>`.
pub fn canonical_store_name(store: &str) -> String {
    let store = store.trim();
    if store.starts_with(STORE_PREFIX) {
        store.to_string()
    } else {
        format!("{STORE_PREFIX}{store}")
    }
}

fn message_content(msg: &Message) -> Option<serde_json::Value> {
    let mut parts = Vec::new();
    if !msg.text.is_empty() {
        parts.push(serde_json::json!({ "text": msg.text }));
    }
    match msg.role {
        Role::User => {
            for attachment in &msg.attachments {
                parts.push(serde_json::json!({
                    "inlineData": {
                        "mimeType": attachment.mime_type,
                        "data": attachment.data,
                    }
                }));
            }
            for result in &msg.tool_results {
                parts.push(serde_json::json!({
                    "functionResponse": {
                        "name": result.tool_call_name,
                        "response": result.response_value(),
                    }
                }));
            }
        }
        Role::Model => {
            for call in &msg.tool_calls {
                parts.push(serde_json::json!({
                    "functionCall": { "name": call.name, "args": call.arguments }
                }));
            }
        }
    }
    if parts.is_empty() {
        return None;
    }
    let role = match msg.role {
        Role::User => "user",
        Role::Model => "model",
    };
    Some(serde_json::json!({ "role": role, "parts": parts }))
}

fn classify_transport_error(
    err: reqwest::Error,
    store_requested: bool,
    timeout: std::time::Duration,
) -> SageError {
    if err.is_timeout() {
        if store_requested {
            SageError::transport(
                PROVIDER,
                format!(
                    "request timed out after {}s; the retrieval store is likely invalid or empty",
                    timeout.as_secs()
                ),
            )
        } else {
            SageError::Timeout(timeout.as_millis() as u64)
        }
    } else {
        SageError::Network(err)
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn model_id(&self) -> &str {
        self.model.as_str()
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    async fn stream(
        &self,
        request: &ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, SageError> {
        let body = self.build_request_body(request);
        let store_requested = request.wants_retrieval() && !request.web_search;
        let web_search = request.web_search;
        let timeout = self.timeout;

        debug!(
            model = self.model.as_str(),
            tools = request.has_tools(),
            web_search,
            store_requested,
            "Gemini stream"
        );

        let send = shared_client()
            .post(self.stream_url())
            .headers(gemini_headers(&self.api_key))
            .timeout(timeout)
            .json(&body)
            .send();

        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(Box::pin(futures::stream::once(async { StreamEvent::Aborted })));
            }
            resp = send => resp.map_err(|e| self.classify_send_error(e, store_requested))?,
        };

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(SageError::transport(
                PROVIDER,
                format!("HTTP {}: {}", status.as_u16(), body_text.trim()),
            ));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut decoder = LineDecoder::sse();
            let mut captured: Vec<u8> = Vec::new();
            let mut saw_output = false;
            let mut web_search_reported = false;
            futures::pin_mut!(byte_stream);

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    chunk = byte_stream.next() => Some(chunk),
                };

                let chunk = match next {
                    None => {
                        yield StreamEvent::Aborted;
                        return;
                    }
                    Some(None) => break,
                    Some(Some(Ok(chunk))) => chunk,
                    Some(Some(Err(e))) => {
                        yield StreamEvent::Error(classify_transport_error(e, store_requested, timeout));
                        return;
                    }
                };

                captured.extend_from_slice(&chunk);
                for event in decoder.decode::<GeminiChunk>(&chunk) {
                    if let Some(error) = event.error {
                        yield StreamEvent::Error(SageError::protocol(PROVIDER, error.message));
                        return;
                    }
                    let Some(candidate) = event.candidates.into_iter().next() else {
                        continue;
                    };

                    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
                        if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                            saw_output = true;
                            yield StreamEvent::TextDelta(text);
                        }
                        if let Some(fc) = part.function_call {
                            saw_output = true;
                            yield StreamEvent::ToolCallRequested(ToolCall::new(
                                fc.name,
                                fc.args.unwrap_or_default(),
                            ));
                        }
                    }

                    if let Some(grounding) = candidate.grounding_metadata {
                        if web_search {
                            if !web_search_reported {
                                web_search_reported = true;
                                yield StreamEvent::RetrievalUsed(Grounding::WebSearch);
                            }
                        } else if store_requested {
                            let sources = grounding.source_uris();
                            if !sources.is_empty() {
                                yield StreamEvent::RetrievalUsed(Grounding::Sources(sources));
                            }
                        }
                    }
                }
            }

            let rest = decoder.finish();
            if !saw_output {
                if let Some(message) =
                    find_embedded_error(rest.as_bytes()).or_else(|| find_embedded_error(&captured))
                {
                    yield StreamEvent::Error(SageError::protocol(PROVIDER, message));
                    return;
                }
                debug!(bytes = captured.len(), "Gemini stream ended without output");
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Look for an `error` object anywhere in a raw response body.
///
/// Covers bodies that were never SSE-framed (plain JSON objects or arrays)
/// and `data:` lines that did not end with a newline.
pub(crate) fn find_embedded_error(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(message) = error_message(&value) {
            return Some(message);
        }
    }

    for line in trimmed.lines() {
        let payload = line.trim().strip_prefix("data:").unwrap_or(line).trim();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) {
            if let Some(message) = error_message(&value) {
                return Some(message);
            }
        }
    }

    let pattern =
        regex::Regex::new(r#"(?s)"error"\s*:\s*\{.*?"message"\s*:\s*"((?:[^"\\]|\\.)*)""#).ok()?;
    pattern
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace("\\\"", "\"").replace("\\n", "\n"))
}

fn error_message(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Array(items) => items.iter().find_map(error_message),
        serde_json::Value::Object(obj) => {
            let error = obj.get("error")?;
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            Some(message)
        }
        _ => None,
    }
}

/// Factory for the hosted adapter (`gemini`, `google`).
pub struct GeminiFactory;

impl ProviderFactory for GeminiFactory {
    fn provider_keys(&self) -> &[&str] {
        &["gemini", "google"]
    }

    fn create(
        &self,
        config: &SageConfig,
        _provider_key: &str,
        model_id: &str,
    ) -> Result<Box<dyn ModelProvider>, SageError> {
        let api_key = config
            .get_api_key(PROVIDER)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SageError::Configuration("Missing GEMINI_API_KEY".into()))?;
        Ok(Box::new(GeminiProvider::new(
            GeminiModel::from_id(model_id),
            api_key,
            config,
        )))
    }

    fn capabilities(&self, _provider_key: &str, model_id: &str) -> ModelCapabilities {
        GeminiModel::from_id(model_id).capabilities()
    }
}

// Wire types. Unknown fields are ignored.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

impl GroundingMetadata {
    fn source_uris(&self) -> Vec<String> {
        self.grounding_chunks
            .iter()
            .filter_map(|chunk| {
                chunk
                    .retrieved_context
                    .as_ref()
                    .or(chunk.web.as_ref())
                    .and_then(|source| source.uri.clone().or_else(|| source.title.clone()))
            })
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingChunk {
    retrieved_context: Option<GroundingSource>,
    web: Option<GroundingSource>,
}

#[derive(Deserialize)]
struct GroundingSource {
    uri: Option<String>,
    title: Option<String>,
}
