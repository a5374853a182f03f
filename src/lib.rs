//! # llm-flows
//!
//! Small, typed LLM flows on top of an OpenAI-compatible chat API.
//!
//! The crate has two layers. The **call layer** runs one model request and
//! shapes the reply: [`LlmCall`] renders a prompt, sends it through the
//! [`Backend`](backend::Backend) on an [`ExecCtx`], and returns either
//! trimmed text or JSON validated against a declarative
//! [`ObjectSchema`](schema::ObjectSchema). The **chat layer** runs a
//! multi-step conversation: [`ChatAgent`] streams assistant text, dispatches
//! tool calls through a [`ToolRegistry`], feeds results back, and stops when
//! the model answers or its step budget runs out.
//!
//! ## Core Concepts
//!
//! - **[`ExecCtx`]** — HTTP client, backend, endpoint, prompt variables,
//!   cancellation flag and optional event handler.
//! - **[`LlmCall`]** — single-shot call with a text or structured
//!   [`OutputStrategy`]. Structured output is strict: every field is
//!   required, nullable fields must be an explicit `null`, nothing is repaired.
//! - **[`ChatAgent`]** — tool-augmented chat loop over a caller-owned
//!   [`Transcript`], with [`ChatEvent`]s for rendering.
//! - **[`flows`]** — the ready-made flows: key takeaway, support-request
//!   classification, comment summary, appointment extraction, weather chat.
//!
//! ## Quick Start
//!
//! ```no_run
//! use llm_flows::flows::{AppointmentExtractor, SupportClassifier};
//! use llm_flows::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let ctx = settings.exec_ctx()?;
//!
//!     let appointment = AppointmentExtractor::new(&settings.fast_model)
//!         .extract(&ctx, "Design review with Priya and Tom on Friday at 3pm, room 4B")
//!         .await?;
//!     println!("{}", appointment);
//!
//!     let records = SupportClassifier::new(&settings.fast_model)
//!         .classify(&ctx, &["I was charged twice this month", "¿Cómo cambio mi contraseña?"])
//!         .await?;
//!     for record in records {
//!         println!("{:<18} {:<7} {}", record.category, record.urgency, record.language);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Chat
//!
//! ```no_run
//! use futures::StreamExt;
//! use llm_flows::agent::ChatEvent;
//! use llm_flows::flows::weather_assistant;
//! use llm_flows::{Settings, Transcript};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let ctx = Arc::new(settings.exec_ctx()?);
//!     let agent = Arc::new(weather_assistant(
//!         &settings.large_model,
//!         &settings.weather_base_url,
//!         settings.max_steps,
//!     )?);
//!
//!     let mut transcript = Transcript::new().with_user("How warm is it in Lisbon?");
//!     let mut events = agent.stream_turn(ctx, transcript.clone());
//!     while let Some(event) = events.next().await {
//!         match event? {
//!             ChatEvent::TextDelta(text) => print!("{}", text),
//!             ChatEvent::ToolResult(result) => println!("[{}]", result.tool_name),
//!             ChatEvent::TurnComplete(outcome) => transcript.extend(outcome.messages),
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod flows;
pub mod llm_call;
pub mod output_strategy;
pub mod parsing;
pub mod payload;
pub mod prompt;
pub mod schema;
pub mod tool;
pub mod transcript;

pub use agent::{ChatAgent, ChatEvent, FinishReason, TurnOutcome, TurnStream};
pub use backend::{MockBackend, OpenAiBackend};
pub use config::{LlmConfig, Settings};
pub use diagnostics::CallDiagnostics;
pub use error::{FlowError, Result};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use llm_call::LlmCall;
pub use output_strategy::OutputStrategy;
pub use payload::{BoxFut, Payload, PayloadOutput};
pub use schema::{Field, FieldKind, Framing, ObjectSchema, SchemaViolation};
pub use tool::{FnTool, Tool, ToolError, ToolRegistry};
pub use transcript::{Message, Role, ToolCall, ToolOutcome, ToolResult, Transcript};
