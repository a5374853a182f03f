//! Batch classification of customer support requests.
//!
//! The whole batch goes to the model in one call, serialized as JSON, and
//! comes back as an array of records: one per request, in any language, each
//! tagged with a category, an urgency and the detected language.

use crate::error::{FlowError, Result};
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::payload::Payload;
use crate::schema::{Field, ObjectSchema};
use serde::{Deserialize, Serialize};
use std::fmt;

const PROMPT: &str = "Classify the following support requests.\n\n{input}";

/// Support queue a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Billing,
    ProductIssues,
    EnterpriseSales,
    AccountIssues,
    ProductFeedback,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Billing,
        Category::ProductIssues,
        Category::EnterpriseSales,
        Category::AccountIssues,
        Category::ProductFeedback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Billing => "billing",
            Category::ProductIssues => "product_issues",
            Category::EnterpriseSales => "enterprise_sales",
            Category::AccountIssues => "account_issues",
            Category::ProductFeedback => "product_feedback",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    pub const ALL: [Urgency; 3] = [Urgency::Low, Urgency::Medium, Urgency::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified support request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRequest {
    /// The request text as the model echoed it back.
    pub request: String,
    pub category: Category,
    pub urgency: Urgency,
    /// Language name, e.g. "English" or "Spanish".
    pub language: String,
}

/// Classifies a batch of support requests in a single call.
#[derive(Debug, Clone)]
pub struct SupportClassifier {
    call: LlmCall,
}

impl SupportClassifier {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            call: LlmCall::new("support-classification", PROMPT)
                .with_model(model)
                .expecting_array(Self::schema()),
        }
    }

    /// Record schema for one classified request.
    pub fn schema() -> ObjectSchema {
        let categories: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();
        let urgencies: Vec<&str> = Urgency::ALL.iter().map(Urgency::as_str).collect();

        ObjectSchema::new()
            .field(Field::string("request"))
            .field(Field::one_of("category", &categories))
            .field(Field::one_of("urgency", &urgencies))
            .field(
                Field::string("language")
                    .describe("The language the support request is in. eg. English, Spanish etc."),
            )
    }

    pub fn call(&self) -> &LlmCall {
        &self.call
    }

    /// Classify `requests`, which may be plain strings or any serializable
    /// records. Returns exactly one record per request.
    ///
    /// An empty batch returns an empty result without calling the model.
    pub async fn classify<T: Serialize>(
        &self,
        ctx: &ExecCtx,
        requests: &[T],
    ) -> Result<Vec<ClassifiedRequest>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let input = serde_json::to_value(requests)?;
        let output = self.call.invoke(ctx, input).await?;
        let records: Vec<ClassifiedRequest> = output.parse_as()?;

        if records.len() != requests.len() {
            return Err(FlowError::CountMismatch {
                call: self.call.name().to_string(),
                expected: requests.len(),
                actual: records.len(),
            });
        }
        Ok(records)
    }
}

impl Default for SupportClassifier {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FAST_MODEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx(reply: &str) -> (ExecCtx, Arc<MockBackend>) {
        let mock = Arc::new(MockBackend::fixed(reply));
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock.clone())
            .build()
            .unwrap();
        (ctx, mock)
    }

    #[test]
    fn test_schema_enumerates_categories() {
        let schema = SupportClassifier::schema().to_json_schema();
        assert_eq!(
            schema["properties"]["category"]["enum"],
            json!([
                "billing",
                "product_issues",
                "enterprise_sales",
                "account_issues",
                "product_feedback"
            ])
        );
        assert_eq!(schema["properties"]["urgency"]["enum"], json!(["low", "medium", "high"]));
        assert_eq!(schema["required"], json!(["request", "category", "urgency", "language"]));
    }

    #[tokio::test]
    async fn test_classify_returns_one_record_per_request() {
        let reply = json!({"elements": [
            {"request": "I was charged twice", "category": "billing", "urgency": "high", "language": "English"},
            {"request": "La app se cierra", "category": "product_issues", "urgency": "medium", "language": "Spanish"}
        ]});
        let (ctx, mock) = ctx(&reply.to_string());

        let records = SupportClassifier::default()
            .classify(&ctx, &["I was charged twice", "La app se cierra"])
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, Category::Billing);
        assert_eq!(records[1].urgency, Urgency::Medium);
        assert_eq!(records[1].language, "Spanish");

        let request = &mock.requests()[0];
        let prompt = request.messages[0].text();
        assert!(prompt.starts_with("Classify the following support requests.\n\n["));
        assert!(prompt.contains("La app se cierra"));
        assert!(request.response_format.is_some());
    }

    #[tokio::test]
    async fn test_count_mismatch_is_error() {
        let reply = json!({"elements": [
            {"request": "a", "category": "billing", "urgency": "low", "language": "English"}
        ]});
        let (ctx, _) = ctx(&reply.to_string());

        let err = SupportClassifier::default()
            .classify(&ctx, &["a", "b"])
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::CountMismatch { expected: 2, actual: 1, .. }));
    }

    #[tokio::test]
    async fn test_unknown_category_is_violation() {
        let reply = json!({"elements": [
            {"request": "a", "category": "marketing", "urgency": "low", "language": "English"}
        ]});
        let (ctx, _) = ctx(&reply.to_string());

        let err = SupportClassifier::default()
            .classify(&ctx, &["a"])
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::SchemaViolation { .. }));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_model() {
        let (ctx, mock) = ctx("unused");
        let records = SupportClassifier::default()
            .classify::<String>(&ctx, &[])
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(mock.call_count(), 0);
    }
}
