//! Ready-made flows built on [`LlmCall`](crate::LlmCall) and
//! [`ChatAgent`](crate::agent::ChatAgent).
//!
//! | Flow | Entry point | Output |
//! |------|-------------|--------|
//! | Key takeaway | [`KeyTakeaway::run`] | free text |
//! | Support classification | [`SupportClassifier::classify`] | one [`ClassifiedRequest`] per request |
//! | Comment summary | [`CommentSummarizer::summarize`] | [`CommentSummary`] |
//! | Appointment extraction | [`AppointmentExtractor::extract`] | [`Appointment`] |
//! | Weather chat | [`weather_assistant`] | a [`ChatAgent`](crate::agent::ChatAgent) with [`WeatherTool`] |

pub mod appointment;
pub mod classification;
pub mod summarization;
pub mod takeaway;
pub mod weather;

pub use appointment::{Appointment, AppointmentExtractor};
pub use classification::{Category, ClassifiedRequest, SupportClassifier, Urgency};
pub use summarization::{CommentSummarizer, CommentSummary};
pub use takeaway::KeyTakeaway;
pub use weather::{weather_assistant, WeatherReport, WeatherTool, WEATHER_TOOL_NAME};
