//! Tool-augmented chat loop.
//!
//! [`ChatAgent`] drives one user turn: it sends the whole transcript to the
//! model, streams text back as [`ChatEvent::TextDelta`], runs any requested
//! tools through its [`ToolRegistry`], appends their results and asks the
//! model again, until the model answers without tools or the step budget
//! runs out.
//!
//! ```text
//! transcript ──► model step ──► text? ──────────────► done (Stop)
//!                    ▲             │
//!                    │        tool calls
//!                    │             ▼
//!                    └──── validate + execute (concurrently)
//!                          append results; budget left?  ──no──► done (StepBudgetExhausted)
//! ```

use crate::backend::{self, LlmRequest, ToolCallRequest, Usage};
use crate::config::LlmConfig;
use crate::error::Result;
use crate::events::{emit, Event};
use crate::exec_ctx::ExecCtx;
use crate::tool::ToolRegistry;
use crate::transcript::{Message, Role, ToolCall, ToolOutcome, ToolResult, Transcript};
use futures::future::join_all;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Model calls allowed per user turn unless configured otherwise.
pub const DEFAULT_MAX_STEPS: u32 = 5;

/// Why a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model answered without requesting tools.
    Stop,
    /// The provider hit its output token limit.
    Length,
    /// The provider withheld output.
    ContentFilter,
    /// The last permitted step still requested tools. Those tools ran and
    /// their results are in the transcript, but the model was not asked again.
    StepBudgetExhausted,
}

impl FinishReason {
    fn from_provider(reason: Option<&str>) -> Self {
        match reason {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        }
    }
}

/// Incremental output of a chat turn, in the order it happened.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A model request (1-based step number) is about to be sent.
    StepStarted { step: u32 },
    /// A fragment of assistant text.
    TextDelta(String),
    /// The model asked for a tool. Emitted before anything runs.
    ToolCallStarted(ToolCall),
    /// The call was refused before execution (unknown tool or bad arguments).
    ToolCallRejected {
        call_id: String,
        tool_name: String,
        reason: String,
    },
    /// The tool ran; the outcome is either output or a failure.
    ToolResult(ToolResult),
    StepFinished { step: u32 },
    /// Always the last event of a successful turn.
    TurnComplete(TurnOutcome),
}

/// Result of one user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Messages appended during the turn, in order.
    pub messages: Vec<Message>,
    pub finish: FinishReason,
    /// Model requests made.
    pub steps: u32,
    /// Token usage summed over all steps.
    pub usage: Usage,
}

impl TurnOutcome {
    /// Text of the last assistant message that has any.
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .map(Message::text)
            .find(|t| !t.is_empty())
            .unwrap_or_default()
    }

    /// Every tool result recorded during the turn.
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.messages.iter().flat_map(|m| m.tool_results())
    }
}

/// A chat assistant: model, instructions, tools and a step budget.
///
/// # Example
///
/// ```no_run
/// use llm_flows::agent::{ChatAgent, ChatEvent};
/// use llm_flows::{ExecCtx, Transcript};
///
/// # async fn run(ctx: ExecCtx) -> llm_flows::Result<()> {
/// let agent = ChatAgent::new("assistant", "gpt-4o").with_system("Be brief.");
/// let mut transcript = Transcript::new().with_user("Hello!");
///
/// let outcome = agent
///     .run_turn(&ctx, &mut transcript, &mut |event| {
///         if let ChatEvent::TextDelta(text) = event {
///             print!("{}", text);
///         }
///     })
///     .await?;
/// println!("\n[{:?} after {} step(s)]", outcome.finish, outcome.steps);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChatAgent {
    name: String,
    model: String,
    system: Option<String>,
    config: LlmConfig,
    tools: Arc<ToolRegistry>,
    max_steps: u32,
    streaming: bool,
}

impl ChatAgent {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            system: None,
            config: LlmConfig::default(),
            tools: Arc::new(ToolRegistry::new()),
            max_steps: DEFAULT_MAX_STEPS,
            streaming: true,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    /// Maximum model requests per turn. Values below 1 are raised to 1.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Use the streaming endpoint (default). Without it, each step's text
    /// arrives as a single [`ChatEvent::TextDelta`].
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn build_request(&self, transcript: &Transcript) -> LlmRequest {
        LlmRequest {
            model: self.model.clone(),
            system_prompt: self.system.clone(),
            messages: transcript.messages().to_vec(),
            tools: self.tools.specs(),
            response_format: None,
            config: self.config.clone(),
            stream: self.streaming,
        }
    }

    /// Run one user turn to completion.
    ///
    /// New messages are appended to `transcript` as they are produced, so on
    /// error it holds everything up to the failed step. Tool failures are
    /// not errors: they are recorded and shown to the model. Provider
    /// failures and cancellation abort the turn.
    pub async fn run_turn(
        &self,
        ctx: &ExecCtx,
        transcript: &mut Transcript,
        on_event: &mut (dyn FnMut(ChatEvent) + Send),
    ) -> Result<TurnOutcome> {
        emit(
            &ctx.event_handler,
            Event::CallStart {
                name: self.name.clone(),
                kind: "chat-turn",
            },
        );

        let start = transcript.len();
        let mut usage = Usage::default();
        let result = self.drive(ctx, transcript, on_event, &mut usage).await;

        emit(
            &ctx.event_handler,
            Event::CallEnd {
                name: self.name.clone(),
                ok: result.is_ok(),
            },
        );

        let (finish, steps) = match result {
            Ok(done) => done,
            Err(e) => {
                tracing::warn!(agent = %self.name, error = %e, "chat turn failed");
                return Err(e);
            }
        };

        tracing::info!(
            agent = %self.name,
            steps,
            finish = ?finish,
            total_tokens = usage.total_tokens,
            "chat turn complete"
        );

        let outcome = TurnOutcome {
            messages: transcript.since(start).to_vec(),
            finish,
            steps,
            usage,
        };
        on_event(ChatEvent::TurnComplete(outcome.clone()));
        Ok(outcome)
    }

    async fn drive(
        &self,
        ctx: &ExecCtx,
        transcript: &mut Transcript,
        on_event: &mut (dyn FnMut(ChatEvent) + Send),
        usage: &mut Usage,
    ) -> Result<(FinishReason, u32)> {
        let mut step = 0;
        loop {
            ctx.check_cancelled()?;
            step += 1;
            on_event(ChatEvent::StepStarted { step });
            emit(
                &ctx.event_handler,
                Event::StepStart {
                    name: self.name.clone(),
                    step,
                },
            );

            let request = self.build_request(transcript);
            let response = if self.streaming {
                let name = self.name.clone();
                let event_handler = ctx.event_handler.clone();
                let mut on_token = |chunk: String| {
                    emit(
                        &event_handler,
                        Event::Token {
                            name: name.clone(),
                            chunk: chunk.clone(),
                        },
                    );
                    on_event(ChatEvent::TextDelta(chunk));
                };
                let on_token: &mut (dyn FnMut(String) + Send) = &mut on_token;
                backend::send(
                    &ctx.backend,
                    &ctx.client,
                    &ctx.base_url,
                    &request,
                    ctx.cancel_flag(),
                    Some(on_token),
                )
                .await?
            } else {
                let response = backend::send(
                    &ctx.backend,
                    &ctx.client,
                    &ctx.base_url,
                    &request,
                    ctx.cancel_flag(),
                    None,
                )
                .await?;
                if !response.text.is_empty() {
                    on_event(ChatEvent::TextDelta(response.text.clone()));
                }
                response
            };

            if let Some(step_usage) = response.usage {
                *usage += step_usage;
            }

            let calls: Vec<ToolCall> = response.tool_calls.iter().map(to_tool_call).collect();
            let mut assistant = Message::new(Role::Assistant);
            if !response.text.is_empty() {
                assistant = assistant.with_text(response.text.clone());
            }
            for call in &calls {
                assistant = assistant.with_tool_call(call.clone());
            }
            transcript.push(assistant);

            if calls.is_empty() {
                on_event(ChatEvent::StepFinished { step });
                return Ok((
                    FinishReason::from_provider(response.finish_reason.as_deref()),
                    step,
                ));
            }

            for call in &calls {
                on_event(ChatEvent::ToolCallStarted(call.clone()));
            }

            let outcomes = join_all(calls.iter().map(|call| self.tools.dispatch(ctx, call))).await;

            let mut results = Message::new(Role::Tool);
            for (call, outcome) in calls.iter().zip(outcomes) {
                emit(
                    &ctx.event_handler,
                    Event::ToolDispatch {
                        name: self.name.clone(),
                        tool: call.name.clone(),
                        call_id: call.id.clone(),
                        outcome: outcome_label(&outcome),
                    },
                );

                let result = ToolResult {
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    outcome,
                };
                match &result.outcome {
                    ToolOutcome::Rejected(reason) => on_event(ChatEvent::ToolCallRejected {
                        call_id: result.call_id.clone(),
                        tool_name: result.tool_name.clone(),
                        reason: reason.clone(),
                    }),
                    _ => on_event(ChatEvent::ToolResult(result.clone())),
                }
                results = results.with_tool_result(result);
            }
            transcript.push(results);
            on_event(ChatEvent::StepFinished { step });

            if step >= self.max_steps {
                tracing::debug!(agent = %self.name, step, "step budget exhausted");
                return Ok((FinishReason::StepBudgetExhausted, step));
            }
        }
    }

    /// Run a turn on the tokio runtime and stream its events.
    ///
    /// The stream ends after [`ChatEvent::TurnComplete`], or after a single
    /// `Err` item if the turn failed. Dropping the stream aborts the turn.
    /// The caller's transcript is not touched: append
    /// [`TurnOutcome::messages`] to it when the turn completes.
    pub fn stream_turn(self: &Arc<Self>, ctx: Arc<ExecCtx>, transcript: Transcript) -> TurnStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let agent = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut transcript = transcript;
            let events = tx.clone();
            let mut on_event = move |event: ChatEvent| {
                // Receiver gone: the stream was dropped and this task is aborting.
                let _ = events.send(Ok(event));
            };
            if let Err(e) = agent.run_turn(&ctx, &mut transcript, &mut on_event).await {
                let _ = tx.send(Err(e));
            }
        });

        TurnStream {
            events: UnboundedReceiverStream::new(rx),
            handle,
        }
    }
}

/// Events of a turn running on a spawned task. See [`ChatAgent::stream_turn`].
///
/// The channel is unbounded: events are produced from synchronous callbacks
/// that cannot wait for a slow consumer.
#[derive(Debug)]
pub struct TurnStream {
    events: UnboundedReceiverStream<Result<ChatEvent>>,
    handle: JoinHandle<()>,
}

impl Stream for TurnStream {
    type Item = Result<ChatEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl Drop for TurnStream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn outcome_label(outcome: &ToolOutcome) -> &'static str {
    match outcome {
        ToolOutcome::Output(_) => "output",
        ToolOutcome::Failed(_) => "failed",
        ToolOutcome::Rejected(_) => "rejected",
    }
}

/// Parse provider arguments. Unparseable text is kept raw so the registry
/// rejects it and the model sees what it sent.
fn to_tool_call(request: &ToolCallRequest) -> ToolCall {
    let raw = request.arguments.trim();
    let arguments = if raw.is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(request.arguments.clone()))
    };
    ToolCall::new(request.id.clone(), request.name.clone(), arguments)
}
