//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over model providers, translating between
//! normalized [`LlmRequest`]/[`LlmResponse`] types and a provider's HTTP API.
//! Built-in implementations: [`OpenAiBackend`], [`MockBackend`].
//!
//! ## Architecture
//!
//! ```text
//! LlmCall ───┐
//!            ├──► LlmRequest ──► send() ──► Backend::complete[_streaming]() ──► LlmResponse
//! ChatAgent ─┘                                      │
//!                                        ┌──────────┴──────────┐
//!                                  OpenAiBackend           MockBackend
//!                               /v1/chat/completions     scripted replies
//!                                  SSE streaming
//! ```

pub mod mock;
pub mod openai;
pub mod sse;

pub use mock::{MockBackend, MockReply};
pub use openai::OpenAiBackend;

use crate::config::LlmConfig;
use crate::error::{FlowError, Result};
use crate::transcript::Message;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A normalized model request.
///
/// [`LlmCall`](crate::llm_call::LlmCall) and [`ChatAgent`](crate::agent::ChatAgent)
/// build this; the [`Backend`] translates it into the provider's HTTP request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"gpt-4o-mini"`).
    pub model: String,

    /// Sent ahead of `messages` when present and non-empty.
    pub system_prompt: Option<String>,

    /// Conversation so far, oldest first.
    pub messages: Vec<Message>,

    /// Tools the model may call. Empty for single-shot calls.
    pub tools: Vec<ToolSpec>,

    /// When set, the provider is asked to constrain its output to this schema.
    pub response_format: Option<ResponseFormat>,

    pub config: LlmConfig,

    /// Whether to use the streaming endpoint.
    pub stream: bool,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            messages: Vec::new(),
            tools: Vec::new(),
            response_format: None,
            config: LlmConfig::default(),
            stream: false,
        }
    }
}

/// A tool as advertised to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

/// A named JSON Schema the output must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFormat {
    /// Identifier sent to the provider; `[a-zA-Z0-9_-]` only.
    pub name: String,
    pub schema: Value,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A tool call as the provider sent it, arguments still unparsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON text of the arguments.
    pub arguments: String,
}

/// A normalized model response.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// Generated text. Empty when the model only called tools.
    pub text: String,

    /// Tool calls in the order the provider listed them.
    pub tool_calls: Vec<ToolCallRequest>,

    /// Provider finish reason as sent (`"stop"`, `"tool_calls"`, `"length"`, ...).
    pub finish_reason: Option<String>,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    pub usage: Option<Usage>,

    /// Model that actually served the request, if reported.
    pub model: Option<String>,
}

/// Abstraction over model providers.
///
/// Implementors translate between the normalized [`LlmRequest`]/[`LlmResponse`]
/// and the provider's HTTP API, in non-streaming mode and in streaming mode
/// with a text-fragment callback. Tool calls are returned whole in both modes.
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a non-streaming request.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse>;

    /// Execute a streaming request.
    ///
    /// `on_token` is called for each text fragment as it arrives. The
    /// accumulated text and any assembled tool calls are returned at the end.
    async fn complete_streaming(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<LlmResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Send one request through `backend`, streaming when `on_token` is given.
///
/// Checks `cancel` first. There is no automatic retry: a failed request is
/// reported to the caller as-is.
pub async fn send(
    backend: &Arc<dyn Backend>,
    client: &Client,
    base_url: &str,
    request: &LlmRequest,
    cancel: Option<&AtomicBool>,
    on_token: Option<&mut (dyn FnMut(String) + Send)>,
) -> Result<LlmResponse> {
    if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
        return Err(FlowError::Cancelled);
    }

    tracing::debug!(
        backend = backend.name(),
        model = %request.model,
        messages = request.messages.len(),
        tools = request.tools.len(),
        structured = request.response_format.is_some(),
        stream = on_token.is_some(),
        "sending model request"
    );

    let response = match on_token {
        Some(on_token) => {
            backend
                .complete_streaming(client, base_url, request, on_token)
                .await?
        }
        None => backend.complete(client, base_url, request).await?,
    };

    tracing::debug!(
        backend = backend.name(),
        status = response.status,
        finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
        tool_calls = response.tool_calls.len(),
        "model response received"
    );

    Ok(response)
}
