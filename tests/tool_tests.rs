//! Tests for the tool system.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use sage::error::SageError;
use sage::tools::*;
use sage::types::ToolCall;

fn args(value: serde_json::Value) -> ToolArguments {
    match value {
        serde_json::Value::Object(map) => ToolArguments::new(map),
        _ => ToolArguments::default(),
    }
}

#[test]
fn parameter_builder_constructs_schema() {
    let params = AgentToolParameters::object()
        .string("query", "Search query", true)
        .integer("limit", "Max results", false)
        .boolean("verbose", "Enable verbose output", false)
        .build();

    let schema = &params.schema;
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["query"]["type"], "string");
    assert_eq!(schema["properties"]["limit"]["type"], "integer");
    assert_eq!(params.required(), vec!["query"]);
}

#[test]
fn empty_parameters() {
    let params = AgentToolParameters::empty();
    assert_eq!(params.schema["type"], "object");
    assert!(params.required().is_empty());
}

#[test]
fn tool_arguments_typed_access() {
    let args = args(json!({"name": "Alice", "limit": 3.0, "all": true}));
    assert_eq!(args.get_str("name").unwrap(), "Alice");
    assert!(args.get_str("missing").is_err());
    assert_eq!(args.get_u64_opt("limit"), Some(3));
    assert_eq!(args.get_bool_opt("all"), Some(true));
    assert_eq!(args.get_str_opt("missing"), None);
}

#[test]
fn tool_arguments_deserialize() {
    #[derive(serde::Deserialize, PartialEq, Debug)]
    struct Params {
        query: String,
        limit: Option<u32>,
    }

    let params: Params = args(json!({"query": "rust", "limit": 10}))
        .deserialize()
        .unwrap();
    assert_eq!(params.query, "rust");
    assert_eq!(params.limit, Some(10));
}

#[tokio::test]
async fn agent_tool_executes() {
    let tool = AgentTool::new(
        "greet",
        "Greet a person",
        ToolKind::Read,
        AgentToolParameters::object()
            .string("name", "Name", true)
            .build(),
        |args: ToolArguments, _ctx: ToolExecutionContext| async move {
            let name = args.get_str("name")?;
            Ok::<_, SageError>(json!({"greeting": format!("Hello, {name}!")}))
        },
    );

    assert_eq!(tool.name(), "greet");
    assert_eq!(tool.kind(), ToolKind::Read);
    assert_eq!(tool.definition().name, "greet");

    let result = tool
        .execute(&args(json!({"name": "World"})), &ToolExecutionContext::default())
        .await
        .unwrap();
    assert_eq!(result["greeting"], "Hello, World!");
}

#[test]
fn catalogue_kinds() {
    let dir = TempDir::new().unwrap();
    let tools = workspace_tools(Arc::new(FsWorkspace::new(dir.path())));
    let kinds: Vec<(&str, ToolKind)> = tools.iter().map(|t| (t.name(), t.kind())).collect();
    assert_eq!(
        kinds,
        vec![
            ("read_file", ToolKind::Read),
            ("write_file", ToolKind::Write),
            ("delete_file", ToolKind::Write),
            ("list_files", ToolKind::List),
            ("list_folders", ToolKind::List),
            ("search_files", ToolKind::Search),
            ("search_content", ToolKind::Search),
        ]
    );
}

#[tokio::test]
async fn workspace_catalogue_through_the_gateway() {
    let dir = TempDir::new().unwrap();
    let gateway = ToolGateway::new(workspace_tools(Arc::new(FsWorkspace::new(dir.path()))));
    let ctx = ToolExecutionContext::default();

    let written = gateway
        .execute(
            &ToolCall::new("write_file", json!({"path": "notes/x.md", "content": "X says hello"})),
            &ctx,
        )
        .await;
    assert!(written.success, "{:?}", written.error_message);

    let read = gateway
        .execute(&ToolCall::new("read_file", json!({"path": "notes/x.md"})), &ctx)
        .await;
    assert_eq!(read.payload.as_ref().unwrap()["content"], "X says hello");

    let found = gateway
        .execute(&ToolCall::new("search_content", json!({"query": "HELLO"})), &ctx)
        .await;
    let matches = found.payload.as_ref().unwrap()["matches"].as_array().unwrap().clone();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["path"], "notes/x.md");

    let deleted = gateway
        .execute(&ToolCall::new("delete_file", json!({"path": "notes/x.md"})), &ctx)
        .await;
    assert!(deleted.success);

    let missing = gateway
        .execute(&ToolCall::new("read_file", json!({"path": "notes/x.md"})), &ctx)
        .await;
    assert!(!missing.success);

    let escaped = gateway
        .execute(&ToolCall::new("read_file", json!({"path": "../secret"})), &ctx)
        .await;
    assert!(!escaped.success);
    assert!(escaped.error_message.unwrap().contains("escapes workspace"));
}
