//! Workspace collaborator interface and the standard tool catalogue over it.
//!
//! The agent loop never touches files itself. Tools delegate every side
//! effect to a [`Workspace`]; [`FsWorkspace`] is the local-directory
//! implementation used by the binary and tests.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio_stream::wrappers::ReadDirStream;
use tokio_stream::StreamExt;

use crate::error::SageError;
use crate::tools::tool::{AgentTool, Tool, ToolExecutionContext, ToolKind};
use crate::tools::types::AgentToolParameters;

const READ_FILE_MAX_BYTES: usize = 65_536;
const DEFAULT_CONTENT_MATCHES: usize = 50;

/// One line matched by a content search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentMatch {
    pub path: String,
    /// 1-based line number.
    pub line: usize,
    pub text: String,
}

/// External workspace back end. Paths are relative, `/`-separated.
#[async_trait]
pub trait Workspace: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<String, SageError>;

    /// Create or replace a file, creating parent folders as needed.
    async fn write_file(&self, path: &str, content: &str) -> Result<(), SageError>;

    async fn delete_file(&self, path: &str) -> Result<(), SageError>;

    /// Files under `folder` (the whole workspace when `None`), sorted.
    async fn list_files(&self, folder: Option<&str>) -> Result<Vec<String>, SageError>;

    async fn list_folders(&self) -> Result<Vec<String>, SageError>;

    /// Files whose path contains `query`, case-insensitive.
    async fn search_files(&self, query: &str) -> Result<Vec<String>, SageError>;

    /// Lines containing `query`, case-insensitive, at most `limit`.
    async fn search_content(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ContentMatch>, SageError>;
}

/// The standard tool catalogue, in presentation order.
pub fn workspace_tools(workspace: Arc<dyn Workspace>) -> Vec<Arc<dyn Tool>> {
    vec![
        read_file_tool(workspace.clone()),
        write_file_tool(workspace.clone()),
        delete_file_tool(workspace.clone()),
        list_files_tool(workspace.clone()),
        list_folders_tool(workspace.clone()),
        search_files_tool(workspace.clone()),
        search_content_tool(workspace),
    ]
}

fn tool_error(tool_name: &'static str) -> impl Fn(SageError) -> SageError {
    move |err| match err {
        SageError::ToolExecution { .. } => err,
        other => SageError::ToolExecution {
            tool_name: tool_name.into(),
            message: other.to_string(),
        },
    }
}

fn truncate_utf8(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }

    let mut cutoff = max_bytes;
    while cutoff > 0 && !s.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    s[..cutoff].to_string()
}

fn read_file_tool(workspace: Arc<dyn Workspace>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "read_file",
        "Read a file from the workspace as UTF-8 text",
        ToolKind::Read,
        AgentToolParameters::object()
            .string("path", "Workspace-relative path of the file", true)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let workspace = workspace.clone();
            async move {
                let path = args.get_str("path")?;
                let content = workspace
                    .read_file(path)
                    .await
                    .map_err(tool_error("read_file"))?;

                let bytes = content.len();
                let truncated = bytes > READ_FILE_MAX_BYTES;
                let content = if truncated {
                    let mut s = truncate_utf8(&content, READ_FILE_MAX_BYTES);
                    s.push_str("\n... (truncated)");
                    s
                } else {
                    content
                };

                Ok(serde_json::json!({
                    "path": path,
                    "content": content,
                    "bytes": bytes,
                    "truncated": truncated,
                }))
            }
        },
    ))
}

fn write_file_tool(workspace: Arc<dyn Workspace>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "write_file",
        "Create or overwrite a file in the workspace",
        ToolKind::Write,
        AgentToolParameters::object()
            .string("path", "Workspace-relative path of the file", true)
            .string("content", "Full new content of the file", true)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let workspace = workspace.clone();
            async move {
                let path = args.get_str("path")?;
                let content = args.get_str("content")?;
                workspace
                    .write_file(path, content)
                    .await
                    .map_err(tool_error("write_file"))?;
                Ok(serde_json::json!({
                    "path": path,
                    "bytes_written": content.len(),
                }))
            }
        },
    ))
}

fn delete_file_tool(workspace: Arc<dyn Workspace>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "delete_file",
        "Delete a file from the workspace",
        ToolKind::Write,
        AgentToolParameters::object()
            .string("path", "Workspace-relative path of the file", true)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let workspace = workspace.clone();
            async move {
                let path = args.get_str("path")?;
                workspace
                    .delete_file(path)
                    .await
                    .map_err(tool_error("delete_file"))?;
                Ok(serde_json::json!({ "path": path, "deleted": true }))
            }
        },
    ))
}

fn list_files_tool(workspace: Arc<dyn Workspace>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "list_files",
        "List files in the workspace, optionally inside one folder",
        ToolKind::List,
        AgentToolParameters::object()
            .string("folder", "Workspace-relative folder to list", false)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let workspace = workspace.clone();
            async move {
                let folder = args.get_str_opt("folder").filter(|f| !f.is_empty());
                let files = workspace
                    .list_files(folder)
                    .await
                    .map_err(tool_error("list_files"))?;
                Ok(serde_json::json!({ "files": files }))
            }
        },
    ))
}

fn list_folders_tool(workspace: Arc<dyn Workspace>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "list_folders",
        "List every folder in the workspace",
        ToolKind::List,
        AgentToolParameters::empty(),
        move |_args, _ctx: ToolExecutionContext| {
            let workspace = workspace.clone();
            async move {
                let folders = workspace
                    .list_folders()
                    .await
                    .map_err(tool_error("list_folders"))?;
                Ok(serde_json::json!({ "folders": folders }))
            }
        },
    ))
}

fn search_files_tool(workspace: Arc<dyn Workspace>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "search_files",
        "Find files whose path contains the query",
        ToolKind::Search,
        AgentToolParameters::object()
            .string("query", "Text to look for in file paths", true)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let workspace = workspace.clone();
            async move {
                let query = args.get_str("query")?;
                let files = workspace
                    .search_files(query)
                    .await
                    .map_err(tool_error("search_files"))?;
                Ok(serde_json::json!({ "files": files }))
            }
        },
    ))
}

fn search_content_tool(workspace: Arc<dyn Workspace>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "search_content",
        "Find lines in workspace files that contain the query",
        ToolKind::Search,
        AgentToolParameters::object()
            .string("query", "Text to look for inside files", true)
            .integer("limit", "Maximum number of matching lines", false)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let workspace = workspace.clone();
            async move {
                let query = args.get_str("query")?;
                let limit = args
                    .get_u64_opt("limit")
                    .map(|l| l as usize)
                    .unwrap_or(DEFAULT_CONTENT_MATCHES);
                let matches = workspace
                    .search_content(query, limit)
                    .await
                    .map_err(tool_error("search_content"))?;
                Ok(serde_json::json!({ "matches": matches }))
            }
        },
    ))
}

fn escapes(relative: &str) -> SageError {
    SageError::InvalidArgument(format!("path escapes workspace: {relative}"))
}

/// [`Workspace`] over a local directory. Paths may not escape the root, and
/// dot-prefixed entries are skipped when listing.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn resolve(&self, relative: &str) -> Result<PathBuf, SageError> {
        let relative = relative.trim().trim_start_matches("./");
        if relative.is_empty() {
            return Err(SageError::InvalidArgument("empty path".into()));
        }
        let candidate = Path::new(relative);
        for component in candidate.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(escapes(relative)),
            }
        }
        let full = self.root.join(candidate);
        self.ensure_inside_root(&full, relative).await?;
        Ok(full)
    }

    /// Symlinks are followed: the deepest existing ancestor of `full` must
    /// canonicalize to somewhere under the root.
    async fn ensure_inside_root(&self, full: &Path, relative: &str) -> Result<(), SageError> {
        let root = tokio::fs::canonicalize(&self.root).await?;
        let mut current = full;
        loop {
            match tokio::fs::canonicalize(current).await {
                Ok(real) if real.starts_with(&root) => return Ok(()),
                Ok(_) => return Err(escapes(relative)),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    // dangling symlink
                    if tokio::fs::symlink_metadata(current).await.is_ok() {
                        return Err(escapes(relative));
                    }
                    match current.parent() {
                        Some(parent) => current = parent,
                        None => return Ok(()),
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Depth-first walk; returns (files, folders), both sorted.
    async fn walk(&self, start: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), SageError> {
        let mut files = Vec::new();
        let mut folders = Vec::new();
        let mut pending = vec![start.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = ReadDirStream::new(tokio::fs::read_dir(&dir).await?);
            while let Some(entry) = entries.next().await {
                let entry = entry?;
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    folders.push(entry.path());
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    files.push(entry.path());
                }
            }
        }

        files.sort();
        folders.sort();
        Ok((files, folders))
    }
}

#[async_trait]
impl Workspace for FsWorkspace {
    async fn read_file(&self, path: &str) -> Result<String, SageError> {
        let full = self.resolve(path).await?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| SageError::InvalidArgument(format!("{path}: {e}")))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), SageError> {
        let full = self.resolve(path).await?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), SageError> {
        let full = self.resolve(path).await?;
        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| SageError::InvalidArgument(format!("{path}: {e}")))
    }

    async fn list_files(&self, folder: Option<&str>) -> Result<Vec<String>, SageError> {
        let start = match folder {
            Some(folder) => self.resolve(folder).await?,
            None => self.root.clone(),
        };
        let (files, _) = self.walk(&start).await?;
        Ok(files.iter().map(|p| self.relative(p)).collect())
    }

    async fn list_folders(&self) -> Result<Vec<String>, SageError> {
        let (_, folders) = self.walk(&self.root).await?;
        Ok(folders.iter().map(|p| self.relative(p)).collect())
    }

    async fn search_files(&self, query: &str) -> Result<Vec<String>, SageError> {
        let needle = query.to_lowercase();
        let (files, _) = self.walk(&self.root).await?;
        Ok(files
            .iter()
            .map(|p| self.relative(p))
            .filter(|p| p.to_lowercase().contains(&needle))
            .collect())
    }

    async fn search_content(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ContentMatch>, SageError> {
        let pattern = regex::RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()
            .map_err(|e| SageError::InvalidArgument(e.to_string()))?;

        let (files, _) = self.walk(&self.root).await?;
        let mut matches = Vec::new();
        for file in files {
            // Binary and non-UTF-8 files are not searchable.
            let Ok(content) = tokio::fs::read_to_string(&file).await else {
                continue;
            };
            for (idx, line) in content.lines().enumerate() {
                if matches.len() >= limit {
                    return Ok(matches);
                }
                if pattern.is_match(line) {
                    matches.push(ContentMatch {
                        path: self.relative(&file),
                        line: idx + 1,
                        text: line.trim().to_string(),
                    });
                }
            }
        }
        Ok(matches)
    }
}
