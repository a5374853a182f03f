//! Structured summary of a comment thread.

use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::payload::Payload;
use crate::schema::{Field, ObjectSchema};
use serde::{Deserialize, Serialize};
use std::fmt;

const PROMPT: &str = "Please summarise the following comments.\n---\nComments:\n{input}\n";

/// A four-part digest of a discussion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSummary {
    pub headline: String,
    pub context: String,
    pub discussion_points: String,
    /// Next steps, with names.
    pub takeaways: String,
}

/// Summary card for a terminal.
impl fmt::Display for CommentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.headline)?;
        writeln!(f, "{}", "=".repeat(self.headline.chars().count().max(8)))?;
        writeln!(f, "Context:           {}", self.context)?;
        writeln!(f, "Discussion points: {}", self.discussion_points)?;
        write!(f, "Takeaways:         {}", self.takeaways)
    }
}

/// Summarizes comments into a [`CommentSummary`].
#[derive(Debug, Clone)]
pub struct CommentSummarizer {
    call: LlmCall,
}

impl CommentSummarizer {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            call: LlmCall::new("comment-summary", PROMPT)
                .with_model(model)
                .expecting_object(Self::schema()),
        }
    }

    pub fn schema() -> ObjectSchema {
        ObjectSchema::new()
            .field(Field::string("headline").describe("The headline of the summary. Max 5 words."))
            .field(
                Field::string("context")
                    .describe("What is the relevant context that prompted discussion. Max 2 sentences."),
            )
            .field(
                Field::string("discussionPoints")
                    .describe("What are the key discussion points? Max 2 sentences."),
            )
            .field(
                Field::string("takeaways")
                    .describe("What are the key takeaways / next steps? Include names. Max 2 sentences."),
            )
    }

    pub fn call(&self) -> &LlmCall {
        &self.call
    }

    /// Summarize a comment thread. Any serializable shape works; it is sent
    /// to the model as JSON.
    pub async fn summarize<T: Serialize + ?Sized>(
        &self,
        ctx: &ExecCtx,
        comments: &T,
    ) -> Result<CommentSummary> {
        let input = serde_json::to_value(comments)?;
        self.call.invoke(ctx, input).await?.parse_as()
    }
}

impl Default for CommentSummarizer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LARGE_MODEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::error::FlowError;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_summarize_parses_camel_case() {
        let reply = json!({
            "headline": "Launch slips a week",
            "context": "QA found a crash on login.",
            "discussionPoints": "Whether to ship behind a flag.",
            "takeaways": "Dana fixes the crash by Friday."
        });
        let mock = Arc::new(MockBackend::fixed(reply.to_string()));
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock.clone())
            .build()
            .unwrap();
        let comments = json!([{"author": "Dana", "text": "Login crashes on Android."}]);

        let summary = CommentSummarizer::default().summarize(&ctx, &comments).await.unwrap();

        assert_eq!(summary.discussion_points, "Whether to ship behind a flag.");
        let request = &mock.requests()[0];
        assert_eq!(request.model, "gpt-4o");
        assert!(request.messages[0]
            .text()
            .starts_with("Please summarise the following comments.\n---\nComments:\n"));
        let format = request.response_format.as_ref().unwrap();
        assert_eq!(format.name, "comment-summary");
        assert!(format.schema["properties"]["discussionPoints"]["description"]
            .as_str()
            .unwrap()
            .contains("Max 2 sentences"));
    }

    #[tokio::test]
    async fn test_missing_field_fails() {
        let reply = json!({"headline": "Short", "context": "c", "takeaways": "t"});
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(MockBackend::fixed(reply.to_string())))
            .build()
            .unwrap();

        let err = CommentSummarizer::default()
            .summarize(&ctx, &json!([]))
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::SchemaViolation { .. }));
    }

    #[test]
    fn test_display_card() {
        let summary = CommentSummary {
            headline: "Launch slips".into(),
            context: "c".into(),
            discussion_points: "d".into(),
            takeaways: "t".into(),
        };
        let card = summary.to_string();
        assert!(card.starts_with("Launch slips\n============"));
        assert!(card.contains("Takeaways:         t"));
    }
}
