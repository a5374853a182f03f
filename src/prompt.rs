//! Prompt template rendering.

use std::collections::HashMap;

/// Sentinel that should never appear in real templates.
const ESCAPE_SENTINEL: &str = "\x00LBRACE\x00";
/// Sentinel for escaped closing brace.
const ESCAPE_SENTINEL_CLOSE: &str = "\x00RBRACE\x00";

/// Build a prompt string with variable substitution.
///
/// Replaces `{key}` placeholders in the template with values from `vars`,
/// then replaces `{input}` with `input`. Use `{{` to insert a literal `{`
/// and `}}` to insert a literal `}`.
///
/// `input` is inserted last and never scanned for placeholders or escapes,
/// so JSON payloads pass through verbatim.
///
/// # Example
///
/// ```
/// use llm_flows::prompt::render;
/// use std::collections::HashMap;
///
/// let vars = HashMap::from([("team".to_string(), "billing".to_string())]);
/// let result = render("Route to {team}: {input}", r#"{"id": 7}"#, &vars);
/// assert_eq!(result, r#"Route to billing: {"id": 7}"#);
/// ```
pub fn render(template: &str, input: &str, vars: &HashMap<String, String>) -> String {
    substitute_vars(template, vars)
        .split("{input}")
        .map(restore_braces)
        .collect::<Vec<_>>()
        .join(input)
}

/// Render a template with `vars` only, leaving `{input}` alone.
pub fn render_system(template: &str, vars: &HashMap<String, String>) -> String {
    restore_braces(&substitute_vars(template, vars))
}

/// Protect escaped braces, then fill every placeholder except `{input}`.
fn substitute_vars(template: &str, vars: &HashMap<String, String>) -> String {
    let mut rendered = template.replace("{{", ESCAPE_SENTINEL);
    rendered = rendered.replace("}}", ESCAPE_SENTINEL_CLOSE);

    for (key, value) in vars {
        if key == "input" {
            continue;
        }
        let placeholder = format!("{{{}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }
    rendered
}

fn restore_braces(text: &str) -> String {
    text.replace(ESCAPE_SENTINEL, "{")
        .replace(ESCAPE_SENTINEL_CLOSE, "}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_basic() {
        let result = render("Hello {name}, process {input}", "data", &vars(&[("name", "Alice")]));
        assert_eq!(result, "Hello Alice, process data");
    }

    #[test]
    fn test_render_no_placeholders() {
        let result = render("static prompt", "ignored_in_template", &vars(&[]));
        assert_eq!(result, "static prompt");
    }

    #[test]
    fn test_render_escaped_braces() {
        let result = render(
            "Hello {name}, JSON: {{\"key\": \"val\"}}",
            "data",
            &vars(&[("name", "Alice")]),
        );
        assert_eq!(result, r#"Hello Alice, JSON: {"key": "val"}"#);
    }

    #[test]
    fn test_render_input_not_rescanned() {
        let input = r#"[{"request": "{name} owes {{money}}"}]"#;
        let result = render("Classify:\n\n{input}", input, &vars(&[("name", "Alice")]));
        assert_eq!(result, format!("Classify:\n\n{}", input));
    }

    #[test]
    fn test_render_escaped_input_placeholder_is_literal() {
        assert_eq!(render("{{input}} = {input}", "x", &vars(&[])), "{input} = x");
    }

    #[test]
    fn test_render_repeated_input() {
        assert_eq!(render("{input} and {input}", "x", &vars(&[])), "x and x");
    }

    #[test]
    fn test_render_system_keeps_input_placeholder() {
        let result = render_system("Be {tone}. {input}", &vars(&[("tone", "brief")]));
        assert_eq!(result, "Be brief. {input}");
    }
}
