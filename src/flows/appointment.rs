//! Appointment details from free-form text.
//!
//! Fields the input does not mention come back as explicit `null`, never
//! omitted. The model has no clock, so today's date is written into the
//! description of the `date` field on every call.

use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::payload::Payload;
use crate::schema::{Field, FieldKind, ObjectSchema};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const PROMPT: &str = "Extract appointment info for the following input: {input}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub title: String,
    /// `HH:MM`
    pub start_time: Option<String>,
    /// `HH:MM`
    pub end_time: Option<String>,
    pub attendees: Option<Vec<String>>,
    pub location: Option<String>,
    pub date: String,
}

impl Appointment {
    /// Start and end joined for display, if the start is known.
    pub fn time_range(&self) -> Option<String> {
        let start = self.start_time.as_deref()?;
        Some(match self.end_time.as_deref() {
            Some(end) => format!("{} - {}", start, end),
            None => start.to_string(),
        })
    }
}

/// Calendar card. Missing fields are shown as placeholders.
impl fmt::Display for Appointment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attendees = match self.attendees.as_deref() {
            Some(list) if !list.is_empty() => list.join(", "),
            _ => "No attendees".to_string(),
        };
        writeln!(f, "+ {}", self.title)?;
        writeln!(f, "| Date:      {}", self.date)?;
        writeln!(
            f,
            "| Time:      {}",
            self.time_range().unwrap_or_else(|| "No time specified".to_string())
        )?;
        writeln!(
            f,
            "| Location:  {}",
            self.location.as_deref().unwrap_or("No location")
        )?;
        write!(f, "| Attendees: {}", attendees)
    }
}

/// Extracts an [`Appointment`] from text such as
/// "Lunch with Sam tomorrow at noon at Café Lumen".
#[derive(Debug, Clone)]
pub struct AppointmentExtractor {
    model: String,
}

impl AppointmentExtractor {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    /// Appointment schema anchored to `today`.
    pub fn schema(today: NaiveDate) -> ObjectSchema {
        ObjectSchema::new()
            .field(Field::string("title").describe(
                "The title of the event. This should be the main purpose of the event. \
                 No need to mention names. Clean up formatting (capitalise).",
            ))
            .field(Field::string("startTime").nullable().describe("format HH:MM"))
            .field(
                Field::string("endTime")
                    .nullable()
                    .describe("format HH:MM - note: default meeting duration is 1 hour"),
            )
            .field(
                Field::array_of("attendees", FieldKind::String)
                    .nullable()
                    .describe("comma separated list of attendees"),
            )
            .field(Field::string("location").nullable())
            .field(
                Field::string("date")
                    .describe(format!("Today's date is: {}", today.format("%Y-%m-%d"))),
            )
    }

    fn call_for(&self, today: NaiveDate) -> LlmCall {
        LlmCall::new("appointment", PROMPT)
            .with_model(self.model.clone())
            .expecting_object(Self::schema(today))
    }

    /// Extract using the local clock for today's date.
    pub async fn extract(&self, ctx: &ExecCtx, text: &str) -> Result<Appointment> {
        self.extract_on(ctx, text, Local::now().date_naive()).await
    }

    /// Extract relative to a fixed `today`.
    pub async fn extract_on(&self, ctx: &ExecCtx, text: &str, today: NaiveDate) -> Result<Appointment> {
        let output = self
            .call_for(today)
            .invoke(ctx, Value::String(text.to_string()))
            .await?;
        tracing::debug!(date = %today, unfenced = output.diagnostics.unfenced, "appointment extracted");
        output.parse_as()
    }
}

impl Default for AppointmentExtractor {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FAST_MODEL)
    }
}
