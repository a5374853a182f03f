//! Per-call diagnostics.
//!
//! [`CallDiagnostics`] records what happened during one model call: which
//! output strategy ran, how the provider finished, token usage, and whether
//! the output had to be unwrapped from a markdown fence.

use crate::backend::Usage;

/// Records what happened during one model call.
///
/// Attached to every [`PayloadOutput`](crate::payload::PayloadOutput) produced
/// by [`LlmCall`](crate::llm_call::LlmCall).
///
/// # Example
///
/// ```
/// use llm_flows::diagnostics::CallDiagnostics;
///
/// let diag = CallDiagnostics::default();
/// assert_eq!(diag.strategy, "text");
/// assert!(!diag.truncated());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CallDiagnostics {
    /// `"text"`, `"object"` or `"array"`.
    pub strategy: &'static str,

    /// Provider finish reason (`"stop"`, `"length"`, ...).
    pub finish_reason: Option<String>,

    pub usage: Option<Usage>,

    /// Whether structured output arrived wrapped in a markdown code fence.
    pub unfenced: bool,

    /// Number of records returned by an array-framed call.
    pub records: Option<usize>,
}

impl Default for CallDiagnostics {
    fn default() -> Self {
        Self {
            strategy: "text",
            finish_reason: None,
            usage: None,
            unfenced: false,
            records: None,
        }
    }
}

impl CallDiagnostics {
    /// Did the provider stop because it hit the token limit?
    pub fn truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_default() {
        let d = CallDiagnostics::default();
        assert_eq!(d.strategy, "text");
        assert!(d.usage.is_none());
        assert!(!d.unfenced);
        assert!(d.records.is_none());
    }

    #[test]
    fn test_truncated_on_length() {
        let d = CallDiagnostics {
            finish_reason: Some("length".into()),
            ..Default::default()
        };
        assert!(d.truncated());
    }
}
