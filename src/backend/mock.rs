//! Mock backend for testing without a live model.
//!
//! [`MockBackend`] plays back scripted replies in order and records every
//! request it receives, so tests can assert on both sides of the exchange.
//!
//! # Example
//!
//! ```
//! use llm_flows::backend::{MockBackend, MockReply};
//! use serde_json::json;
//!
//! let text_only = MockBackend::new(vec!["Hello, world!".to_string()]);
//! let chat = MockBackend::scripted(vec![
//!     MockReply::tool_call("getWeather", json!({"latitude": 59.9, "longitude": 10.7, "city": "Oslo"})),
//!     MockReply::Text("It is 4 degrees in Oslo.".into()),
//! ]);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{Backend, LlmRequest, LlmResponse, ToolCallRequest, Usage};
use crate::error::{FlowError, Result};

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Plain text, finish reason `stop`.
    Text(String),
    /// Tool calls only, finish reason `tool_calls`.
    ToolCalls(Vec<ToolCallRequest>),
    /// Text followed by tool calls.
    TextAndToolCalls(String, Vec<ToolCallRequest>),
    /// A provider failure.
    Error { status: u16, body: String },
}

impl MockReply {
    /// A reply requesting a single tool call. The id is assigned on playback.
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        MockReply::ToolCalls(vec![Self::call(name, arguments)])
    }

    /// A tool call request with an id assigned on playback.
    pub fn call(name: impl Into<String>, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: String::new(),
            name: name.into(),
            arguments: arguments.to_string(),
        }
    }
}

/// A test backend that plays back scripted replies in order.
///
/// Cycles back to the beginning when all replies have been consumed.
/// Streaming delivers text in word-sized fragments.
#[derive(Debug)]
pub struct MockBackend {
    replies: Vec<MockReply>,
    index: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockBackend {
    /// Create a mock that answers with the given texts in order.
    pub fn new(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(MockReply::Text).collect())
    }

    /// Create a mock that always returns the same text.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Create a mock from arbitrary replies. An empty script answers with empty text.
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            replies,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    fn next_reply(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let n = self.index.fetch_add(1, Ordering::Relaxed);
        let reply = match self.replies.len() {
            0 => MockReply::Text(String::new()),
            len => self.replies[n % len].clone(),
        };

        let (text, calls) = match reply {
            MockReply::Text(text) => (text, Vec::new()),
            MockReply::ToolCalls(calls) => (String::new(), calls),
            MockReply::TextAndToolCalls(text, calls) => (text, calls),
            MockReply::Error { status, body } => {
                return Err(FlowError::HttpError {
                    status,
                    body,
                    retry_after: None,
                })
            }
        };

        let tool_calls: Vec<ToolCallRequest> = calls
            .into_iter()
            .enumerate()
            .map(|(i, mut call)| {
                if call.id.is_empty() {
                    call.id = format!("call_{}_{}", n, i);
                }
                call
            })
            .collect();

        let finish_reason = if tool_calls.is_empty() { "stop" } else { "tool_calls" };

        Ok(LlmResponse {
            text,
            tool_calls,
            finish_reason: Some(finish_reason.to_string()),
            status: 200,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: Some(request.model.clone()),
        })
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        self.next_reply(request)
    }

    async fn complete_streaming(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<LlmResponse> {
        let response = self.next_reply(request)?;
        for word in response.text.split_inclusive(' ') {
            on_token(word.to_string());
        }
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_fixed_response() {
        let mock = MockBackend::fixed("Hello!");
        let resp = mock
            .complete(&Client::new(), "http://unused", &LlmRequest::new("test"))
            .await
            .unwrap();
        assert_eq!(resp.text, "Hello!");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_mock_cycles_responses() {
        let mock = MockBackend::new(vec!["first".into(), "second".into()]);
        let client = Client::new();
        let request = LlmRequest::new("test");
        let r1 = mock.complete(&client, "http://unused", &request).await.unwrap();
        let r2 = mock.complete(&client, "http://unused", &request).await.unwrap();
        let r3 = mock.complete(&client, "http://unused", &request).await.unwrap();
        assert_eq!(r1.text, "first");
        assert_eq!(r2.text, "second");
        assert_eq!(r3.text, "first");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_streaming_splits_words() {
        let mock = MockBackend::fixed("sunny and warm");
        let mut tokens = Vec::new();
        let resp = mock
            .complete_streaming(&Client::new(), "http://unused", &LlmRequest::new("test"), &mut |t| {
                tokens.push(t)
            })
            .await
            .unwrap();
        assert_eq!(resp.text, "sunny and warm");
        assert_eq!(tokens, vec!["sunny ", "and ", "warm"]);
    }

    #[tokio::test]
    async fn test_mock_tool_calls_get_ids() {
        let mock = MockBackend::scripted(vec![MockReply::ToolCalls(vec![
            MockReply::call("getWeather", json!({"city": "Oslo"})),
            MockReply::call("getWeather", json!({"city": "Bergen"})),
        ])]);
        let resp = mock
            .complete(&Client::new(), "http://unused", &LlmRequest::new("test"))
            .await
            .unwrap();
        assert_eq!(resp.tool_calls.len(), 2);
        assert_ne!(resp.tool_calls[0].id, resp.tool_calls[1].id);
        assert_eq!(resp.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn test_mock_blocks_on_outside_runtime() {
        let mock = MockBackend::fixed("sync");
        let request = LlmRequest::new("test");
        let resp = tokio_test::block_on(mock.complete(&Client::new(), "http://unused", &request));
        let resp = tokio_test::assert_ok!(resp);
        assert_eq!(resp.text, "sync");
    }

    #[tokio::test]
    async fn test_mock_records_requests_and_errors() {
        let mock = MockBackend::scripted(vec![MockReply::Error {
            status: 503,
            body: "down".into(),
        }]);
        let err = mock
            .complete(&Client::new(), "http://unused", &LlmRequest::new("gpt-test"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::HttpError { status: 503, .. }));
        assert_eq!(mock.requests()[0].model, "gpt-test");
    }
}
