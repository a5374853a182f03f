//! Tools the chat agent can invoke.
//!
//! A [`Tool`] has a name, a description, an object schema for its arguments
//! and an async procedure. [`ToolRegistry`] resolves calls by name, validates
//! their arguments before anything runs, and turns every result into a
//! [`ToolOutcome`] so failures reach the model as content instead of
//! aborting the turn.

use crate::backend::ToolSpec;
use crate::error::{FlowError, Result};
use crate::exec_ctx::ExecCtx;
use crate::payload::BoxFut;
use crate::schema::ObjectSchema;
use crate::transcript::{ToolCall, ToolOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Why a tool call did not produce output.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Execution failed: {0}")]
    Execution(String),
}

impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        ToolError::Execution(format!("{:#}", err))
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        ToolError::Execution(err.to_string())
    }
}

/// A procedure the model may call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool. Must be unique within a registry.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Schema of the arguments object. Arguments are validated against it
    /// before [`execute`](Tool::execute) is called.
    fn parameters(&self) -> &ObjectSchema;

    async fn execute(&self, ctx: &ExecCtx, args: Value) -> std::result::Result<Value, ToolError>;
}

type ToolFn = dyn for<'a> Fn(&'a ExecCtx, Value) -> BoxFut<'a, anyhow::Result<Value>> + Send + Sync;

/// A [`Tool`] backed by a closure.
///
/// # Example
///
/// ```
/// use llm_flows::schema::{Field, ObjectSchema};
/// use llm_flows::tool::FnTool;
/// use serde_json::json;
///
/// let echo = FnTool::new(
///     "echo",
///     "Repeat the given text",
///     ObjectSchema::new().field(Field::string("text")),
///     |_ctx, args| Box::pin(async move { Ok(json!({"echo": args["text"]})) }),
/// );
/// ```
pub struct FnTool {
    name: String,
    description: String,
    parameters: ObjectSchema,
    func: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ObjectSchema,
        func: F,
    ) -> Self
    where
        F: for<'a> Fn(&'a ExecCtx, Value) -> BoxFut<'a, anyhow::Result<Value>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            func: Box::new(func),
        }
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("parameters", &self.parameters.len())
            .finish()
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

    fn parameters(&self) -> &ObjectSchema {
        &self.parameters
    }

    async fn execute(&self, ctx: &ExecCtx, args: Value) -> std::result::Result<Value, ToolError> {
        Ok((self.func)(ctx, args).await?)
    }
}

/// Tools available to one agent, keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. A second tool with the same name is a configuration error.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(FlowError::InvalidConfig("tool name must not be empty".into()));
        }
        if self.tools.contains_key(&name) {
            return Err(FlowError::InvalidConfig(format!(
                "tool '{}' is already registered",
                name
            )));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: impl Tool + 'static) -> Result<Self> {
        self.register(Arc::new(tool))?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool descriptors as advertised to the model, in name order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters().to_json_schema(),
            })
            .collect()
    }

    /// Resolve a call and check its arguments without running anything.
    pub fn validate_call(&self, call: &ToolCall) -> std::result::Result<Arc<dyn Tool>, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        if !call.arguments.is_object() {
            return Err(ToolError::InvalidArguments(
                "arguments must be a JSON object".into(),
            ));
        }
        tool.parameters()
            .validate(&call.arguments)
            .map_err(|violation| ToolError::InvalidArguments(violation.to_string()))?;

        Ok(tool)
    }

    /// Validate and run one call. Never fails: every problem becomes an outcome.
    pub async fn dispatch(&self, ctx: &ExecCtx, call: &ToolCall) -> ToolOutcome {
        let tool = match self.validate_call(call) {
            Ok(tool) => tool,
            Err(e) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call rejected");
                return ToolOutcome::Rejected(e.to_string());
            }
        };

        tracing::debug!(tool = %call.name, call_id = %call.id, "executing tool");
        match tool.execute(ctx, call.arguments.clone()).await {
            Ok(value) => ToolOutcome::Output(value),
            Err(e) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "tool execution failed");
                ToolOutcome::Failed(e.to_string())
            }
        }
    }
}
