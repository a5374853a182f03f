//! Output strategy for configuring how raw model text becomes a value.
//!
//! [`OutputStrategy`] determines how [`LlmCall`](crate::llm_call::LlmCall)
//! asks the provider for output and how it converts the reply. `Text` keeps
//! the reply as a string; `Structured` sends a strict JSON schema and
//! validates the reply against it locally.

use crate::schema::{Framing, ObjectSchema};
use std::sync::Arc;

/// Controls what [`LlmCall`](crate::llm_call::LlmCall) requests and accepts.
///
/// # Example
///
/// ```
/// use llm_flows::output_strategy::OutputStrategy;
/// use llm_flows::schema::{Field, Framing, ObjectSchema};
///
/// let text = OutputStrategy::default();
/// let schema = ObjectSchema::new().field(Field::string("headline"));
/// let structured = OutputStrategy::structured(schema, Framing::Object);
/// assert_eq!(structured.label(), "object");
/// ```
#[derive(Debug, Clone, Default)]
pub enum OutputStrategy {
    /// Free text, trimmed. Never fails.
    #[default]
    Text,

    /// Strict JSON matching `schema`, one object or an array of them.
    Structured {
        schema: Arc<ObjectSchema>,
        framing: Framing,
    },
}

impl OutputStrategy {
    pub fn structured(schema: ObjectSchema, framing: Framing) -> Self {
        OutputStrategy::Structured {
            schema: Arc::new(schema),
            framing,
        }
    }

    /// Short label used in diagnostics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            OutputStrategy::Text => "text",
            OutputStrategy::Structured {
                framing: Framing::Object,
                ..
            } => "object",
            OutputStrategy::Structured {
                framing: Framing::Array,
                ..
            } => "array",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    #[test]
    fn test_default_is_text() {
        assert!(matches!(OutputStrategy::default(), OutputStrategy::Text));
        assert_eq!(OutputStrategy::default().label(), "text");
    }

    #[test]
    fn test_array_label() {
        let schema = ObjectSchema::new().field(Field::string("request"));
        assert_eq!(OutputStrategy::structured(schema, Framing::Array).label(), "array");
    }
}
