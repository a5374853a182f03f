//! Core payload trait and output types.
//!
//! Every single-shot model call in this crate is a [`Payload`]: it takes a
//! `serde_json::Value` input, runs against an [`ExecCtx`], and returns a
//! [`PayloadOutput`]. Flows wrap payloads and convert the output into their
//! own typed results with [`PayloadOutput::parse_as`].

use crate::diagnostics::CallDiagnostics;
use crate::error::{FlowError, Result};
use crate::exec_ctx::ExecCtx;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// A boxed, pinned, Send future -- the return type of [`Payload::invoke`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe trait for executable payloads.
pub trait Payload: Send + Sync {
    /// Stable identifier for the payload type (e.g. `"llm-call"`).
    fn kind(&self) -> &'static str;

    /// Instance name (for logging and events).
    fn name(&self) -> &str;

    /// Execute the payload.
    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<PayloadOutput>>;
}

/// Output from a payload invocation.
#[derive(Debug, Clone)]
pub struct PayloadOutput {
    /// The result: `Value::String` for text calls, the validated object (or
    /// array of objects) for structured calls.
    pub value: Value,
    /// Raw response text from the model, before any unwrapping.
    pub raw_response: String,
    /// Model that produced this output, as reported by the provider when known.
    pub model: Option<String>,
    pub diagnostics: CallDiagnostics,
}

impl PayloadOutput {
    /// Parse the output value into a typed `T`.
    ///
    /// ```ignore
    /// let output = call.invoke(&ctx, json!(essay)).await?;
    /// let summary: CommentSummary = output.parse_as()?;
    /// ```
    pub fn parse_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            let snippet: String = self.value.to_string().chars().take(200).collect();
            FlowError::Other(format!(
                "Failed to parse PayloadOutput into target type: {}. Value (truncated): {}",
                e, snippet
            ))
        })
    }

    /// The value as text, if it is a string.
    pub fn as_text(&self) -> Option<&str> {
        self.value.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn output(value: Value) -> PayloadOutput {
        PayloadOutput {
            raw_response: value.to_string(),
            value,
            model: None,
            diagnostics: CallDiagnostics::default(),
        }
    }

    #[test]
    fn test_parse_as_typed() {
        #[derive(Deserialize)]
        struct Card {
            headline: String,
        }
        let card: Card = output(json!({"headline": "Ship it"})).parse_as().unwrap();
        assert_eq!(card.headline, "Ship it");
    }

    #[test]
    fn test_parse_as_mismatch_is_error() {
        let result = output(json!("plain text")).parse_as::<Vec<u32>>();
        assert!(matches!(result, Err(FlowError::Other(_))));
    }

    #[test]
    fn test_as_text() {
        assert_eq!(output(json!("hello")).as_text(), Some("hello"));
        assert!(output(json!({"a": 1})).as_text().is_none());
    }
}
