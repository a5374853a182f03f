//! Backend for OpenAI-compatible chat completion APIs.
//!
//! Endpoint: `/v1/chat/completions`.
//! Structured output: `response_format: {"type": "json_schema", ...}` in strict mode.
//! Tools: `tools: [{"type": "function", ...}]`, calls returned in `tool_calls`.
//! Streaming: SSE with `data: {"choices": [{"delta": {...}}]}`; tool-call
//! fragments are assembled by index, usage arrives in the final chunk.

use super::sse::SseDecoder;
use super::{Backend, LlmRequest, LlmResponse, ToolCallRequest, Usage};
use crate::error::{FlowError, Result};
use crate::transcript::{Message, Role};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Backend for any OpenAI-compatible API.
///
/// # Example
///
/// ```
/// use llm_flows::backend::OpenAiBackend;
///
/// let backend = OpenAiBackend::new();
/// let with_key = OpenAiBackend::new().with_api_key("sk-...");
/// assert!(with_key.has_api_key());
/// ```
#[derive(Clone, Default)]
pub struct OpenAiBackend {
    /// Sent as `Authorization: Bearer {key}` when set.
    pub(crate) api_key: Option<String>,
    /// Sent as `OpenAI-Organization: {org}` when set.
    pub(crate) organization: Option<String>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field(
                "api_key",
                &self.api_key.as_ref().map(|k| match k.get(..6) {
                    Some(prefix) if k.len() > 6 => format!("{}***", prefix),
                    _ => "***".to_string(),
                }),
            )
            .field("organization", &self.organization)
            .finish()
    }
}

impl OpenAiBackend {
    /// Create a backend without authentication.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn has_organization(&self) -> bool {
        self.organization.is_some()
    }

    /// Build the `messages` array: system prompt first, then the transcript.
    fn build_messages(request: &LlmRequest) -> Vec<Value> {
        let mut messages = Vec::new();

        if let Some(ref sys) = request.system_prompt {
            if !sys.is_empty() {
                messages.push(json!({"role": "system", "content": sys}));
            }
        }

        for msg in &request.messages {
            Self::push_message(&mut messages, msg);
        }

        messages
    }

    fn push_message(out: &mut Vec<Value>, msg: &Message) {
        match msg.role {
            Role::System | Role::User => {
                out.push(json!({"role": msg.role.as_str(), "content": msg.text()}));
            }
            Role::Assistant => {
                let text = msg.text();
                let calls: Vec<Value> = msg
                    .tool_calls()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments_json(),
                            },
                        })
                    })
                    .collect();
                // Null content is only accepted alongside tool calls.
                let entry = if calls.is_empty() {
                    json!({"role": "assistant", "content": text})
                } else if text.is_empty() {
                    json!({"role": "assistant", "content": null, "tool_calls": calls})
                } else {
                    json!({"role": "assistant", "content": text, "tool_calls": calls})
                };
                out.push(entry);
            }
            // One provider message per result, linked by call id.
            Role::Tool => {
                for result in msg.tool_results() {
                    out.push(json!({
                        "role": "tool",
                        "tool_call_id": result.call_id,
                        "content": result.outcome.to_model_content(),
                    }));
                }
            }
        }
    }

    /// Build the request body for `/v1/chat/completions`.
    fn build_body(request: &LlmRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": Self::build_messages(request),
            "stream": stream,
        });

        if let Some(temperature) = request.config.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(seed) = request.config.seed {
            body["seed"] = json!(seed);
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        },
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        if let Some(ref format) = request.response_format {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": format.name,
                    "strict": true,
                    "schema": format.schema,
                },
            });
        }

        if stream {
            body["stream_options"] = json!({"include_usage": true});
        }

        body
    }

    /// Parse a `Retry-After` header value as seconds.
    fn parse_retry_after(value: &str) -> Option<std::time::Duration> {
        value
            .trim()
            .parse::<u64>()
            .ok()
            .map(std::time::Duration::from_secs)
    }

    fn build_http_request(
        &self,
        client: &Client,
        url: &str,
        body: &Value,
    ) -> reqwest::RequestBuilder {
        let mut req = client.post(url).json(body);

        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(ref org) = self.organization {
            req = req.header("OpenAI-Organization", org.as_str());
        }

        req
    }

    /// Send the request and turn a non-success status into [`FlowError::HttpError`].
    async fn post(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
        let body = Self::build_body(request, stream);

        let resp = self
            .build_http_request(client, &url, &body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, error = %e, "failed to reach model provider");
                FlowError::Request(e)
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(Self::parse_retry_after);
            let body = resp.text().await.unwrap_or_default();
            return Err(FlowError::HttpError {
                status,
                body,
                retry_after,
            });
        }

        Ok(resp)
    }

    fn parse_usage(value: &Value) -> Option<Usage> {
        let usage = value.get("usage").filter(|u| u.is_object())?;
        let field = |name: &str| usage.get(name).and_then(Value::as_u64).unwrap_or(0);
        Some(Usage {
            prompt_tokens: field("prompt_tokens"),
            completion_tokens: field("completion_tokens"),
            total_tokens: field("total_tokens"),
        })
    }

    /// Translate a non-streaming response body.
    fn parse_response(json_resp: &Value, status: u16) -> Result<LlmResponse> {
        let choice = json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| FlowError::Other("provider response has no choices".into()))?;
        let message = choice.get("message").unwrap_or(&Value::Null);

        let text = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let tool_calls = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .map(|call| ToolCallRequest {
                        id: str_field(call, &["id"]),
                        name: str_field(call, &["function", "name"]),
                        arguments: str_field(call, &["function", "arguments"]),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            text,
            tool_calls,
            finish_reason: choice
                .get("finish_reason")
                .and_then(Value::as_str)
                .map(String::from),
            status,
            usage: Self::parse_usage(json_resp),
            model: json_resp.get("model").and_then(Value::as_str).map(String::from),
        })
    }
}

fn str_field(value: &Value, path: &[&str]) -> String {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Assembles a streamed response from SSE chunks.
#[derive(Debug, Default)]
struct StreamAccumulator {
    text: String,
    /// Keyed by the provider's `index` so fragments land on the right call.
    tool_calls: BTreeMap<u64, ToolCallRequest>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
    model: Option<String>,
}

impl StreamAccumulator {
    /// Fold one chunk in, forwarding any text fragment to `on_token`.
    fn apply(&mut self, chunk: &Value, on_token: &mut (dyn FnMut(String) + Send)) -> Result<()> {
        if let Some(error) = chunk.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| error.to_string());
            return Err(FlowError::Other(format!("provider stream error: {}", message)));
        }

        if self.model.is_none() {
            self.model = chunk.get("model").and_then(Value::as_str).map(String::from);
        }
        if let Some(usage) = OpenAiBackend::parse_usage(chunk) {
            self.usage = Some(usage);
        }

        let Some(choice) = chunk.get("choices").and_then(|c| c.get(0)) else {
            return Ok(());
        };

        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            self.finish_reason = Some(reason.to_string());
        }

        let Some(delta) = choice.get("delta") else {
            return Ok(());
        };

        if let Some(content) = delta.get("content").and_then(Value::as_str) {
            if !content.is_empty() {
                self.text.push_str(content);
                on_token(content.to_string());
            }
        }

        if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
            for (position, fragment) in calls.iter().enumerate() {
                let index = fragment
                    .get("index")
                    .and_then(Value::as_u64)
                    .unwrap_or(position as u64);
                let entry = self.tool_calls.entry(index).or_insert_with(|| ToolCallRequest {
                    id: String::new(),
                    name: String::new(),
                    arguments: String::new(),
                });
                if let Some(id) = fragment.get("id").and_then(Value::as_str) {
                    entry.id = id.to_string();
                }
                if let Some(function) = fragment.get("function") {
                    if let Some(name) = function.get("name").and_then(Value::as_str) {
                        entry.name.push_str(name);
                    }
                    if let Some(args) = function.get("arguments").and_then(Value::as_str) {
                        entry.arguments.push_str(args);
                    }
                }
            }
        }

        Ok(())
    }

    fn into_response(self, status: u16) -> LlmResponse {
        LlmResponse {
            text: self.text,
            tool_calls: self.tool_calls.into_values().collect(),
            finish_reason: self.finish_reason,
            status,
            usage: self.usage,
            model: self.model,
        }
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let resp = self.post(client, base_url, request, false).await?;
        let status = resp.status().as_u16();
        let json_resp: Value = resp.json().await?;
        Self::parse_response(&json_resp, status)
    }

    async fn complete_streaming(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<LlmResponse> {
        let resp = self.post(client, base_url, request, true).await?;
        let status = resp.status().as_u16();

        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut acc = StreamAccumulator::default();

        while let Some(chunk) = stream.next().await {
            for value in decoder.decode(&chunk?) {
                acc.apply(&value, on_token)?;
            }
            if decoder.is_done() {
                break;
            }
        }
        for value in decoder.finish() {
            acc.apply(&value, on_token)?;
        }

        Ok(acc.into_response(status))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
