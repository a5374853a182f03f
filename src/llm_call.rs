//! LLM call payload, the single-shot execution unit.
//!
//! [`LlmCall`] renders a prompt, sends one request through the context's
//! backend and shapes the reply according to its [`OutputStrategy`]: trimmed
//! text, or JSON validated against an [`ObjectSchema`]. Structured output
//! that is malformed or off-schema is an error; there is no retry.

use crate::{
    backend::{self, LlmRequest, LlmResponse, ResponseFormat},
    config::LlmConfig,
    diagnostics::CallDiagnostics,
    error::{FlowError, Result},
    events::{emit, Event},
    exec_ctx::ExecCtx,
    output_strategy::OutputStrategy,
    parsing,
    payload::{BoxFut, Payload, PayloadOutput},
    prompt,
    schema::{self, Framing, ObjectSchema},
    transcript::Message,
};
use serde_json::Value;

/// A single model call with prompt template and output strategy.
///
/// # Example
///
/// ```no_run
/// use llm_flows::{ExecCtx, LlmCall};
/// use llm_flows::payload::Payload;
/// use llm_flows::schema::{Field, ObjectSchema};
/// use serde_json::json;
///
/// # async fn run() -> llm_flows::Result<()> {
/// let call = LlmCall::new("headline", "Write a headline for: {input}")
///     .with_model("gpt-4o-mini")
///     .expecting_object(ObjectSchema::new().field(Field::string("headline")));
///
/// let ctx = ExecCtx::builder("https://api.openai.com")
///     .openai_with_key("sk-...")
///     .build()?;
/// let output = call.invoke(&ctx, json!("Some long text...")).await?;
/// println!("{}", output.value["headline"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LlmCall {
    /// Instance name (for logging/events and the response format name).
    name: String,
    /// Prompt template with `{input}` and `{key}` placeholders.
    prompt_template: String,
    /// Optional system prompt template (`{key}` placeholders only).
    system_template: Option<String>,
    model: String,
    config: LlmConfig,
    streaming: bool,
    output_strategy: OutputStrategy,
}

impl LlmCall {
    /// Create a call with a prompt template. The model defaults to `gpt-4o-mini`.
    pub fn new(name: impl Into<String>, prompt_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt_template: prompt_template.into(),
            system_template: None,
            model: crate::config::DEFAULT_FAST_MODEL.to_string(),
            config: LlmConfig::default(),
            streaming: false,
            output_strategy: OutputStrategy::default(),
        }
    }

    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    pub fn system_template(&self) -> Option<&str> {
        self.system_template.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn output_strategy(&self) -> &OutputStrategy {
        &self.output_strategy
    }

    pub fn with_system(mut self, template: impl Into<String>) -> Self {
        self.system_template = Some(template.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    /// Stream the reply. Fragments are emitted as [`Event::Token`].
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    pub fn with_output_strategy(mut self, strategy: OutputStrategy) -> Self {
        self.output_strategy = strategy;
        self
    }

    /// Shorthand: expect one object matching `schema`.
    pub fn expecting_object(self, schema: ObjectSchema) -> Self {
        self.with_output_strategy(OutputStrategy::structured(schema, Framing::Object))
    }

    /// Shorthand: expect an ordered array of objects matching `schema`.
    pub fn expecting_array(self, schema: ObjectSchema) -> Self {
        self.with_output_strategy(OutputStrategy::structured(schema, Framing::Array))
    }

    /// Convert a `Value` input to a string for template substitution.
    fn input_to_string(input: &Value) -> String {
        match input {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Provider-safe schema name derived from the call name.
    fn format_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .take(64)
            .collect();
        if cleaned.is_empty() {
            "output".to_string()
        } else {
            cleaned
        }
    }

    /// Build the `LlmRequest` for a rendered prompt.
    fn build_request(&self, prompt: String, system: Option<String>) -> LlmRequest {
        let response_format = match &self.output_strategy {
            OutputStrategy::Text => None,
            OutputStrategy::Structured { schema, framing } => Some(ResponseFormat {
                name: self.format_name(),
                schema: schema::response_schema(schema, *framing),
            }),
        };

        LlmRequest {
            model: self.model.clone(),
            system_prompt: system,
            messages: vec![Message::user(prompt)],
            tools: Vec::new(),
            response_format,
            config: self.config.clone(),
            stream: self.streaming,
        }
    }

    async fn call_backend(&self, ctx: &ExecCtx, request: &LlmRequest) -> Result<LlmResponse> {
        if !self.streaming {
            return backend::send(
                &ctx.backend,
                &ctx.client,
                &ctx.base_url,
                request,
                ctx.cancel_flag(),
                None,
            )
            .await;
        }

        let name = self.name.clone();
        let event_handler = ctx.event_handler.clone();
        let mut on_token = move |token: String| {
            emit(
                &event_handler,
                Event::Token {
                    name: name.clone(),
                    chunk: token,
                },
            );
        };
        let on_token: &mut (dyn FnMut(String) + Send) = &mut on_token;

        backend::send(
            &ctx.backend,
            &ctx.client,
            &ctx.base_url,
            request,
            ctx.cancel_flag(),
            Some(on_token),
        )
        .await
    }

    /// Shape a provider response according to the output strategy.
    fn build_output(&self, response: LlmResponse) -> Result<PayloadOutput> {
        let mut diag = CallDiagnostics {
            strategy: self.output_strategy.label(),
            finish_reason: response.finish_reason,
            usage: response.usage,
            ..Default::default()
        };
        let raw = response.text;

        let value = match &self.output_strategy {
            OutputStrategy::Text => Value::String(raw.trim().to_string()),
            OutputStrategy::Structured { schema, framing } => {
                let (parsed, unfenced) =
                    parsing::parse_structured(&raw).map_err(|e| FlowError::MalformedOutput {
                        call: self.name.clone(),
                        reason: format!("{} (output: {})", e, parsing::snippet(&raw, 200)),
                    })?;
                diag.unfenced = unfenced;

                let value = schema::validate_framed(schema, *framing, parsed).map_err(|violation| {
                    FlowError::SchemaViolation {
                        call: self.name.clone(),
                        violation,
                    }
                })?;
                if let Value::Array(ref records) = value {
                    diag.records = Some(records.len());
                }
                value
            }
        };

        Ok(PayloadOutput {
            value,
            raw_response: raw,
            model: response.model.or_else(|| Some(self.model.clone())),
            diagnostics: diag,
        })
    }

    async fn run(&self, ctx: &ExecCtx, input: Value) -> Result<PayloadOutput> {
        let input_str = Self::input_to_string(&input);
        let prompt = prompt::render(&self.prompt_template, &input_str, &ctx.vars);
        let system = self
            .system_template
            .as_ref()
            .map(|t| prompt::render_system(t, &ctx.vars));

        let request = self.build_request(prompt, system);
        let response = self.call_backend(ctx, &request).await?;
        let output = self.build_output(response)?;

        tracing::debug!(
            call = %self.name,
            strategy = output.diagnostics.strategy,
            records = output.diagnostics.records,
            unfenced = output.diagnostics.unfenced,
            "call completed"
        );
        Ok(output)
    }
}

impl Payload for LlmCall {
    fn kind(&self) -> &'static str {
        "llm-call"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<PayloadOutput>> {
        Box::pin(async move {
            ctx.check_cancelled()?;

            emit(
                &ctx.event_handler,
                Event::CallStart {
                    name: self.name.clone(),
                    kind: self.kind(),
                },
            );

            let result = self.run(ctx, input).await;
            if let Err(ref e) = result {
                tracing::warn!(call = %self.name, error = %e, "call failed");
            }

            emit(
                &ctx.event_handler,
                Event::CallEnd {
                    name: self.name.clone(),
                    ok: result.is_ok(),
                },
            );

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::events::FnEventHandler;
    use crate::schema::{Field, SchemaViolation};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn headline_schema() -> ObjectSchema {
        ObjectSchema::new()
            .field(Field::string("headline"))
            .field(Field::string("location").nullable())
    }

    fn response(text: &str) -> LlmResponse {
        LlmResponse {
            text: text.to_string(),
            status: 200,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_output_text_trims() {
        let call = LlmCall::new("test", "prompt");
        let output = call.build_output(response("  The answer.\n")).unwrap();
        assert_eq!(output.value, json!("The answer."));
        assert_eq!(output.diagnostics.strategy, "text");
        assert_eq!(output.raw_response, "  The answer.\n");
    }

    #[test]
    fn test_build_output_object_validates() {
        let call = LlmCall::new("test", "prompt").expecting_object(headline_schema());
        let output = call
            .build_output(response(r#"{"headline": "Hi", "location": null}"#))
            .unwrap();
        assert_eq!(output.value["headline"], "Hi");
        assert!(output.value["location"].is_null());
        assert_eq!(output.diagnostics.strategy, "object");
    }

    #[test]
    fn test_build_output_unwraps_fence() {
        let call = LlmCall::new("test", "prompt").expecting_object(headline_schema());
        let output = call
            .build_output(response("```json\n{\"headline\": \"Hi\", \"location\": \"Rome\"}\n```"))
            .unwrap();
        assert!(output.diagnostics.unfenced);
    }

    #[test]
    fn test_build_output_malformed_is_error() {
        let call = LlmCall::new("test", "prompt").expecting_object(headline_schema());
        let err = call.build_output(response("not json at all")).unwrap_err();
        assert!(matches!(err, FlowError::MalformedOutput { ref call, .. } if call == "test"));
    }

    #[test]
    fn test_build_output_missing_nullable_field_is_violation() {
        let call = LlmCall::new("test", "prompt").expecting_object(headline_schema());
        let err = call.build_output(response(r#"{"headline": "Hi"}"#)).unwrap_err();
        match err {
            FlowError::SchemaViolation { violation, .. } => {
                assert!(matches!(violation, SchemaViolation::MissingField { .. }));
            }
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_build_output_array_unwraps_elements() {
        let call = LlmCall::new("test", "prompt").expecting_array(headline_schema());
        let output = call
            .build_output(response(
                r#"{"elements": [{"headline": "A", "location": null}, {"headline": "B", "location": "Oslo"}]}"#,
            ))
            .unwrap();
        assert_eq!(output.value.as_array().unwrap().len(), 2);
        assert_eq!(output.diagnostics.records, Some(2));
    }

    #[test]
    fn test_request_carries_strict_schema() {
        let call = LlmCall::new("key takeaway!", "prompt").expecting_array(headline_schema());
        let request = call.build_request("p".into(), None);
        let format = request.response_format.unwrap();
        assert_eq!(format.name, "key_takeaway_");
        assert_eq!(format.schema["type"], "object");
        assert!(format.schema["properties"]["elements"].is_object());
    }

    #[test]
    fn test_text_request_has_no_format() {
        let call = LlmCall::new("test", "prompt");
        let request = call.build_request("p".into(), Some("sys".into()));
        assert!(request.response_format.is_none());
        assert_eq!(request.system_prompt.as_deref(), Some("sys"));
        assert_eq!(request.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_invoke_renders_prompt_and_vars() {
        let mock = Arc::new(MockBackend::fixed("Short answer."));
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock.clone())
            .var("words", "50")
            .build()
            .unwrap();
        let call = LlmCall::new("takeaway", "In {words} words:\n\n{input}")
            .with_system("Answer in {words} words or fewer.");

        let output = call.invoke(&ctx, json!("An essay.")).await.unwrap();

        assert_eq!(output.as_text(), Some("Short answer."));
        let sent = &mock.requests()[0];
        assert_eq!(sent.messages[0].text(), "In 50 words:\n\nAn essay.");
        assert_eq!(sent.system_prompt.as_deref(), Some("Answer in 50 words or fewer."));
    }

    #[tokio::test]
    async fn test_invoke_emits_tokens_when_streaming() {
        let tokens = Arc::new(Mutex::new(Vec::new()));
        let sink = tokens.clone();
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(MockBackend::fixed("one two")))
            .event_handler(Arc::new(FnEventHandler(move |event: Event| {
                if let Event::Token { chunk, .. } = event {
                    sink.lock().unwrap().push(chunk);
                }
            })))
            .build()
            .unwrap();

        let call = LlmCall::new("stream", "{input}").with_streaming(true);
        call.invoke(&ctx, json!("go")).await.unwrap();

        assert_eq!(*tokens.lock().unwrap(), vec!["one ", "two"]);
    }

    #[tokio::test]
    async fn test_invoke_reports_failure_event() {
        let ends = Arc::new(Mutex::new(Vec::new()));
        let sink = ends.clone();
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(MockBackend::fixed("nope")))
            .event_handler(Arc::new(FnEventHandler(move |event: Event| {
                if let Event::CallEnd { ok, .. } = event {
                    sink.lock().unwrap().push(ok);
                }
            })))
            .build()
            .unwrap();

        let call = LlmCall::new("strict", "{input}").expecting_object(headline_schema());
        assert!(call.invoke(&ctx, json!("x")).await.is_err());
        assert_eq!(*ends.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn test_invoke_checks_cancellation() {
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let mock = Arc::new(MockBackend::fixed("unused"));
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock.clone())
            .cancellation(Some(flag))
            .build()
            .unwrap();

        let result = LlmCall::new("c", "{input}").invoke(&ctx, json!("x")).await;
        assert!(matches!(result, Err(FlowError::Cancelled)));
        assert_eq!(mock.call_count(), 0);
    }
}
