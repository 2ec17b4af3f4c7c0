//! Hosted Gemini adapter against a mock HTTP server.

use futures::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sage::config::SageConfig;
use sage::error::SageError;
use sage::models::GeminiModel;
use sage::provider::gemini::GeminiProvider;
use sage::provider::{ModelProvider, ProviderRequest, ToolDefinition};
use sage::types::{Grounding, Message, StreamEvent};

const STREAM_PATH: &str = "/models/gemini-2.5-flash:streamGenerateContent";

fn provider(server: &MockServer) -> GeminiProvider {
    let config = SageConfig::new();
    config.set_base_url("gemini", server.uri());
    GeminiProvider::new(GeminiModel::Gemini25Flash, "test-key".into(), &config)
}

fn sse(chunks: &[serde_json::Value]) -> String {
    chunks
        .iter()
        .map(|c| format!("data: {c}\r\n\r\n"))
        .collect()
}

fn request(prompt: &str) -> ProviderRequest {
    ProviderRequest {
        messages: vec![Message::user(prompt)],
        ..Default::default()
    }
}

async fn collect(provider: &GeminiProvider, request: &ProviderRequest) -> Vec<StreamEvent> {
    provider
        .stream(request, CancellationToken::new())
        .await
        .unwrap()
        .collect()
        .await
}

#[tokio::test]
async fn streams_text_and_sends_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[
                json!({"candidates": [{"content": {"parts": [{"text": "Hel"}]}}]}),
                json!({"candidates": [{"content": {"parts": [{"text": "lo"}]}}]}),
            ]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let events = collect(&provider(&server), &request("hi")).await;
    let text: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextDelta(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hello");
}

#[tokio::test]
async fn function_calls_become_tool_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_partial_json(json!({
            "tools": [{"functionDeclarations": [{"name": "read_note"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[json!({"candidates": [{"content": {"parts": [
                {"functionCall": {"name": "read_note", "args": {"name": "X"}}}
            ]}}]})]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let mut req = request("what does X say?");
    req.tools = Some(vec![ToolDefinition {
        name: "read_note".into(),
        description: "Read a note".into(),
        parameters: json!({"type": "object", "properties": {"name": {"type": "string"}}}),
    }]);

    let events = collect(&provider(&server), &req).await;
    match events.as_slice() {
        [StreamEvent::ToolCallRequested(call)] => {
            assert_eq!(call.name, "read_note");
            assert_eq!(call.arguments["name"], "X");
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[tokio::test]
async fn web_search_request_carries_only_the_search_tool() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_partial_json(json!({"tools": [{"google_search": {}}]})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[
                json!({"candidates": [{"content": {"parts": [{"text": "News"}]},
                    "groundingMetadata": {"groundingChunks": [{"web": {"uri": "https://a"}}]}}]}),
                json!({"candidates": [{"content": {"parts": [{"text": "!"}]},
                    "groundingMetadata": {"groundingChunks": [{"web": {"uri": "https://b"}}]}}]}),
            ]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut req = request("news?");
    req.web_search = true;
    req.retrieval_stores = vec!["notes".into()];

    let events = collect(&provider(&server), &req).await;
    let grounding: Vec<&Grounding> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::RetrievalUsed(g) => Some(g),
            _ => None,
        })
        .collect();
    assert_eq!(grounding, vec![&Grounding::WebSearch]);

    let received = &server.received_requests().await.unwrap()[0];
    let body: serde_json::Value = serde_json::from_slice(&received.body).unwrap();
    assert_eq!(body["tools"], json!([{"google_search": {}}]));
}

#[tokio::test]
async fn retrieval_sources_are_reported_per_chunk() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_partial_json(json!({
            "tools": [{"file_search": {"file_search_store_names": ["fileSearchStores/notes"]}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[json!({"candidates": [{
                "content": {"parts": [{"text": "From your notes"}]},
                "groundingMetadata": {"groundingChunks": [
                    {"retrievedContext": {"uri": "notes/a.md"}},
                    {"retrievedContext": {"title": "b.md"}}
                ]}
            }]})]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut req = request("summarize");
    req.retrieval_stores = vec!["notes".into()];

    let events = collect(&provider(&server), &req).await;
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::RetrievalUsed(Grounding::Sources(s)) if s == &["notes/a.md", "b.md"]
    )));
}

#[tokio::test]
async fn error_in_unframed_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"error": {"code": 400, "message": "File search store not found", "status": "NOT_FOUND"}}]"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let events = collect(&provider(&server), &request("hi")).await;
    match events.as_slice() {
        [StreamEvent::Error(SageError::Protocol { message, .. })] => {
            assert_eq!(message, "File search store not found");
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[tokio::test]
async fn error_in_sse_chunk_ends_the_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[
                json!({"error": {"message": "quota exceeded"}}),
                json!({"candidates": [{"content": {"parts": [{"text": "never"}]}}]}),
            ]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let events = collect(&provider(&server), &request("hi")).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        StreamEvent::Error(SageError::Protocol { message, .. }) if message == "quota exceeded"
    ));
}

#[tokio::test]
async fn http_error_status_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let err = match provider(&server)
        .stream(&request("hi"), CancellationToken::new())
        .await
    {
        Ok(_) => panic!("expected HTTP failure"),
        Err(err) => err,
    };
    match err {
        SageError::Transport { message, .. } => {
            assert!(message.contains("403"), "{message}");
            assert!(message.contains("API key not valid"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_before_send_yields_abort() {
    let server = MockServer::start().await;
    let token = CancellationToken::new();
    token.cancel();

    let events: Vec<StreamEvent> = provider(&server)
        .stream(&request("hi"), token)
        .await
        .unwrap()
        .collect()
        .await;
    assert!(matches!(events.as_slice(), [StreamEvent::Aborted]));
}

#[tokio::test]
async fn system_prompt_and_settings_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "Be brief"}]},
            "generationConfig": {"maxOutputTokens": 64}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[json!({"candidates": [{"content": {"parts": [{"text": "ok"}]}}]})]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut req = request("hi");
    req.system_prompt = Some("Be brief".into());
    req.settings.max_output_tokens = Some(64);

    let events = collect(&provider(&server), &req).await;
    assert!(matches!(events.as_slice(), [StreamEvent::TextDelta(t)] if t == "ok"));
}
