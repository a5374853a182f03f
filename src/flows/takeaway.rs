//! Free-text key takeaway of a long document.

use crate::error::{FlowError, Result};
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::payload::Payload;
use serde_json::Value;

const PROMPT: &str = "What is the key takeaway of this piece in 50 words?\n\n{input}";

/// Asks the model for the key takeaway of a piece of text.
#[derive(Debug, Clone)]
pub struct KeyTakeaway {
    call: LlmCall,
}

impl KeyTakeaway {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            call: LlmCall::new("key-takeaway", PROMPT).with_model(model),
        }
    }

    /// Print tokens as they arrive through the context's event handler.
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.call = self.call.with_streaming(enabled);
        self
    }

    pub fn call(&self) -> &LlmCall {
        &self.call
    }

    /// The model's answer, trimmed. Length is not enforced.
    pub async fn run(&self, ctx: &ExecCtx, text: &str) -> Result<String> {
        let output = self.call.invoke(ctx, Value::String(text.to_string())).await?;
        output
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| FlowError::Other("text call returned a non-text value".into()))
    }
}

impl Default for KeyTakeaway {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FAST_MODEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::transcript::Role;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_prompt_appends_document() {
        let mock = Arc::new(MockBackend::fixed("  Small teams ship faster.  "));
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock.clone())
            .build()
            .unwrap();

        let answer = KeyTakeaway::default()
            .run(&ctx, "An essay about team size.")
            .await
            .unwrap();

        assert_eq!(answer, "Small teams ship faster.");
        let request = &mock.requests()[0];
        assert_eq!(request.model, "gpt-4o-mini");
        assert!(request.response_format.is_none());
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(
            request.messages[0].text(),
            "What is the key takeaway of this piece in 50 words?\n\nAn essay about team size."
        );
    }

    #[tokio::test]
    async fn test_braces_in_document_survive() {
        let mock = Arc::new(MockBackend::fixed("ok"));
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock.clone())
            .build()
            .unwrap();

        KeyTakeaway::default()
            .run(&ctx, "fn main() { println!(\"{x}\"); }")
            .await
            .unwrap();

        assert!(mock.requests()[0].messages[0]
            .text()
            .ends_with("fn main() { println!(\"{x}\"); }"));
    }
}
