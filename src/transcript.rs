//! Conversation transcript types.
//!
//! A [`Transcript`] is the full, ordered message history of one chat session.
//! The caller owns it and resends it in full on every turn; the agent only
//! appends to it. Tool invocations and their results are distinct message
//! parts so a renderer can tell answer text from tool activity.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Carries tool results back to the model.
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A model's request to run a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id linking the call to its result.
    pub id: String,
    pub name: String,
    /// Parsed arguments. If the model sent text that is not JSON, the raw
    /// text is kept here as a `Value::String`.
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Arguments in the wire form providers expect (a JSON-encoded string).
    pub fn arguments_json(&self) -> String {
        match &self.arguments {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

/// What happened when a tool call was dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The tool ran and produced a value.
    Output(Value),
    /// The tool ran and failed; the reason is shown to the model.
    Failed(String),
    /// The call never ran: unknown tool or arguments that failed validation.
    Rejected(String),
}

impl ToolOutcome {
    pub fn is_output(&self) -> bool {
        matches!(self, ToolOutcome::Output(_))
    }

    /// The content sent back to the model in the tool message.
    pub fn to_model_content(&self) -> String {
        match self {
            ToolOutcome::Output(Value::String(s)) => s.clone(),
            ToolOutcome::Output(value) => value.to_string(),
            ToolOutcome::Failed(reason) => {
                format!("The tool call returned the following error:\n{}", reason)
            }
            ToolOutcome::Rejected(reason) => {
                format!("The tool call was rejected before execution: {}", reason)
            }
        }
    }
}

/// The recorded result of one [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub outcome: ToolOutcome,
}

/// One part of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            MessageContent::ToolCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match self {
            MessageContent::ToolResult(result) => Some(result),
            _ => None,
        }
    }
}

/// A message to or from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<MessageContent>,
}

impl Message {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            content: Vec::new(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System).with_text(text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User).with_text(text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant).with_text(text)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(MessageContent::Text { text: text.into() });
        self
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.content.push(MessageContent::ToolCall(call));
        self
    }

    pub fn with_tool_result(mut self, result: ToolResult) -> Self {
        self.content.push(MessageContent::ToolResult(result));
        self
    }

    /// All text parts concatenated.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(|c| c.as_text()).collect()
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.content.iter().filter_map(|c| c.as_tool_call())
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.content.iter().filter_map(|c| c.as_tool_result())
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls().next().is_some()
    }
}

/// Ordered, append-only message history for one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a user message (builder style).
    pub fn with_user(mut self, text: impl Into<String>) -> Self {
        self.push(Message::user(text));
        self
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages appended after the first `from` entries.
    pub fn since(&self, from: usize) -> &[Message] {
        &self.messages[from.min(self.messages.len())..]
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}
