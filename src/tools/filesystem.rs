//! Filesystem tools
//!
//! `read_file` and `list_directory`, confined to a workspace root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::core::{AgentError, Result, ToolOutput};
use crate::tools::registry::Tool;

/// Resolve `relative` inside `root`, refusing paths that escape it
async fn resolve_in_root(root: &Path, relative: &str) -> Result<PathBuf> {
    let root = tokio::fs::canonicalize(root).await.map_err(|e| {
        AgentError::other(format!("workspace '{}' is not accessible: {}", root.display(), e))
    })?;

    let candidate = root.join(relative);
    let resolved = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|e| AgentError::other(format!("cannot access '{}': {}", relative, e)))?;

    if !resolved.starts_with(&root) {
        return Err(AgentError::other(format!(
            "'{}' is outside the workspace",
            relative
        )));
    }
    Ok(resolved)
}

/// Read a UTF-8 text file
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file. Use this whenever the user asks to read, view, \
         explain or analyse a file. Paths are relative to the workspace."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::other("missing 'path' argument"))?;

        let resolved = resolve_in_root(&self.root, path).await?;
        let content = tokio::fs::read_to_string(&resolved).await?;

        tracing::info!(path, bytes = content.len(), "read_file");
        Ok(ToolOutput::text(format!("File contents:\n{}", content)))
    }
}

/// List the entries of a directory
pub struct ListDirectoryTool {
    root: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and sub-directories of a directory in the workspace."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (defaults to the workspace root)"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let resolved = resolve_in_root(&self.root, path).await?;

        let mut reader = tokio::fs::read_dir(&resolved).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let is_dir = entry.file_type().await?.is_dir();
            entries.push((entry.file_name().to_string_lossy().to_string(), is_dir));
        }
        entries.sort();

        let text = if entries.is_empty() {
            format!("{} is empty", path)
        } else {
            entries
                .iter()
                .map(|(name, is_dir)| {
                    if *is_dir {
                        format!("{}/", name)
                    } else {
                        name.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut fields = Map::new();
        fields.insert("text".to_string(), Value::String(text));
        fields.insert(
            "entries".to_string(),
            entries
                .into_iter()
                .map(|(name, is_dir)| json!({"name": name, "dir": is_dir}))
                .collect(),
        );
        Ok(ToolOutput::Structured(fields))
    }
}
