//! Parsing utilities for structured model responses.
//!
//! Providers in strict schema mode return bare JSON, but some wrap it in a
//! markdown code fence anyway. The fence is the only thing tolerated: the
//! text inside must parse as JSON as-is. Nothing is repaired or guessed.

use serde_json::Value;

/// Extract the body of a markdown fenced code block that makes up the whole text.
///
/// Recognizes `` ```json ``, `` ```JSON `` and plain `` ``` `` fences. Text
/// with prose around the fence is not unwrapped.
pub fn strip_code_fence(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let body = trimmed.strip_prefix("```")?.strip_suffix("```")?;
    let body = body
        .strip_prefix("json")
        .or_else(|| body.strip_prefix("JSON"))
        .unwrap_or(body);
    // The info string must end at the first newline.
    if !body.starts_with('\n') && !body.starts_with("\r\n") {
        return None;
    }
    Some(body.trim())
}

/// Parse a structured response.
///
/// Returns the value and whether a code fence had to be removed first.
pub fn parse_structured(text: &str) -> Result<(Value, bool), serde_json::Error> {
    match strip_code_fence(text) {
        Some(inner) => serde_json::from_str(inner).map(|v| (v, true)),
        None => serde_json::from_str(text.trim()).map(|v| (v, false)),
    }
}

/// First `max` characters of `text`, for error messages.
pub fn snippet(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence_json() {
        let text = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_code_fence(text), Some("{\"a\":1}"));
    }

    #[test]
    fn test_strip_code_fence_plain() {
        assert_eq!(strip_code_fence("```\n[1, 2]\n```\n"), Some("[1, 2]"));
    }

    #[test]
    fn test_strip_code_fence_requires_whole_text() {
        assert_eq!(strip_code_fence("Here:\n```json\n{}\n```"), None);
        assert_eq!(strip_code_fence("{\"a\": 1}"), None);
    }

    #[test]
    fn test_strip_code_fence_rejects_other_languages() {
        assert_eq!(strip_code_fence("```yaml\na: 1\n```"), None);
    }

    #[test]
    fn test_parse_structured_bare() {
        let (value, unfenced) = parse_structured(" {\"headline\": \"Ok\"} ").unwrap();
        assert_eq!(value["headline"], "Ok");
        assert!(!unfenced);
    }

    #[test]
    fn test_parse_structured_fenced() {
        let (value, unfenced) = parse_structured("```json\n{\"x\": 42}\n```").unwrap();
        assert_eq!(value["x"], 42);
        assert!(unfenced);
    }

    #[test]
    fn test_parse_structured_does_not_repair() {
        assert!(parse_structured("{'key': 'value',}").is_err());
        assert!(parse_structured("Sure! {\"name\": \"test\"}").is_err());
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        assert_eq!(snippet("héllo wörld", 5), "héllo...");
        assert_eq!(snippet("short", 10), "short");
    }
}
