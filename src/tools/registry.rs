//! Tool registry - manages and dispatches tool calls
//!
//! Central hub for registering tools and routing tool calls to them. The
//! registry is read-only once built and is shared between concurrent runs
//! behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::config::ToolsConfig;
use crate::core::{AgentError, Result, ToolCall, ToolDefinition, ToolError, ToolOutput};
use crate::tools::filesystem::{ListDirectoryTool, ReadFileTool};
use crate::tools::search::WebSearchTool;

/// A named capability the model can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name within a registry
    fn name(&self) -> &str;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// JSON Schema for the arguments
    fn input_schema(&self) -> Value;

    /// Run the tool. Arguments are assumed to already follow the schema.
    async fn execute(&self, args: Value) -> Result<ToolOutput>;

    /// Declaration presented to the model
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.input_schema())
    }
}

type ToolFn = dyn Fn(Value) -> Result<ToolOutput> + Send + Sync;

/// A tool backed by a plain function
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    func: Box<ToolFn>,
}

impl FnTool {
    /// Create a tool from a synchronous function
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        func: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<ToolOutput> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        (self.func)(args)
    }
}

/// Registry of available tools, in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in tools enabled by `config`
    pub fn with_builtin_tools(config: &ToolsConfig) -> Result<Self> {
        let mut registry = Self::new();

        registry.register(ReadFileTool::new(&config.workspace))?;
        registry.register(ListDirectoryTool::new(&config.workspace))?;

        if let Some(ref key) = config.serpapi_api_key {
            registry.register(WebSearchTool::from_config(key, config)?)?;
        } else {
            tracing::debug!("SERPAPI_API_KEY not set, web_search disabled");
        }

        Ok(registry)
    }

    /// Register a tool; names must be unique
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register an already shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(AgentError::DuplicateTool(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Look up a tool by name
    pub fn find(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// Declarations of all tools, in registration order
    pub fn describe_all(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Names of all tools, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Error reported for a call naming an unknown tool
    pub fn unresolved(&self, name: &str) -> ToolError {
        let available = if self.tools.is_empty() {
            "(none)".to_string()
        } else {
            self.names().join(", ")
        };
        ToolError::Unresolved {
            name: name.to_string(),
            available,
        }
    }

    /// Execute a tool call and coerce its result to text.
    ///
    /// Never fails the caller: every failure comes back as a `ToolError`
    /// whose text is meant for the model.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<String, ToolError> {
        let Some(tool) = self.find(&call.name) else {
            tracing::warn!(tool = %call.name, "model requested an unknown tool");
            return Err(self.unresolved(&call.name));
        };

        tracing::debug!(tool = %call.name, id = %call.id, args = %call.arguments, "executing tool");

        let output = match tool.execute(call.arguments.clone()).await {
            Ok(output) => output,
            Err(e) => ToolOutput::Failure(e.to_string()),
        };

        let result = output.into_text(&call.name);
        if let Err(ref e) = result {
            tracing::warn!(tool = %call.name, error = %e, "tool call failed");
        }
        result
    }
}
