//! Extracts tool calls embedded in free-form assistant text (§4.E).
//!
//! Matches two grammars observed in the wild:
//!
//! - `<tool_call><name>NAME</name><arguments>JSON</arguments></tool_call>`
//! - `<tool_call>[TOOL_CALLS]NAME[ARGS]{...JSON...}</tool_call>`
//!
//! Tags are case-insensitive; content is matched with dot-all semantics.
//! A malformed `arguments` payload never fails the parse — it is wrapped
//! as `{"raw": "<original string>"}` instead.

use agw_domain::tool::ToolCall;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

fn name_args_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<tool_call>\s*<name>(.*?)</name>\s*<arguments>(.*?)</arguments>\s*</tool_call>").unwrap()
    })
}

fn bracket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<tool_call>\s*\[TOOL_CALLS\](.*?)\[ARGS\](.*?)</tool_call>").unwrap())
}

fn make_call(name: &str, args_raw: &str) -> ToolCall {
    let name = name.trim().to_string();
    let args_raw = args_raw.trim().to_string();
    let arguments: Value = serde_json::from_str(&args_raw).unwrap_or_else(|_| serde_json::json!({"raw": args_raw}));
    ToolCall {
        id: format!("xml_{}", uuid::Uuid::new_v4().simple()),
        name,
        arguments,
        provider: "xml".to_string(),
        raw: None,
    }
}

/// Extract every tool-call occurrence from `text`, returning the remaining
/// clean text (tags removed) alongside the parsed calls in source order.
pub fn extract(text: &str) -> (String, Vec<ToolCall>) {
    let mut calls = Vec::new();

    let after_first = name_args_re().replace_all(text, |caps: &Captures| {
        calls.push(make_call(&caps[1], &caps[2]));
        String::new()
    });

    let after_second = bracket_re().replace_all(&after_first, |caps: &Captures| {
        calls.push(make_call(&caps[1], &caps[2]));
        String::new()
    });

    (collapse_whitespace(&after_second), calls)
}

/// Squeeze the blank runs left behind by tag removal down to single spaces,
/// without touching whitespace the model actually produced as content.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = c != '\n';
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

/// True iff `text` has more open `<tool_call>` tags than close tags —
/// used by the loop to buffer deltas and avoid leaking partial XML to the
/// client. Counts tag occurrences only; never re-scans the whole buffer
/// with a regex.
pub fn has_partial_tool_call(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    let opens = lower.matches("<tool_call>").count();
    let closes = lower.matches("</tool_call>").count();
    opens > closes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_name_arguments_grammar() {
        let text = r#"Let me check. <tool_call><name>read_file</name><arguments>{"path":"README"}</arguments></tool_call>"#;
        let (clean, calls) = extract(text);
        assert_eq!(clean, "Let me check.");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].arguments["path"], "README");
        assert!(calls[0].id.starts_with("xml_"));
    }

    #[test]
    fn extracts_bracket_grammar() {
        let text = r#"<tool_call>[TOOL_CALLS]list_files[ARGS]{"path":"."}</tool_call>"#;
        let (clean, calls) = extract(text);
        assert_eq!(clean, "");
        assert_eq!(calls[0].name, "list_files");
        assert_eq!(calls[0].arguments["path"], ".");
    }

    #[test]
    fn case_insensitive_tags() {
        let text = r#"<TOOL_CALL><NAME>ping</NAME><ARGUMENTS>{}</ARGUMENTS></TOOL_CALL>"#;
        let (_, calls) = extract(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "ping");
    }

    #[test]
    fn malformed_arguments_become_raw_wrapper() {
        let text = r#"<tool_call><name>broken</name><arguments>not json</arguments></tool_call>"#;
        let (_, calls) = extract(text);
        assert_eq!(calls[0].arguments["raw"], "not json");
    }

    #[test]
    fn multiple_occurrences_extracted_in_order() {
        let text = r#"<tool_call><name>a</name><arguments>{}</arguments></tool_call> then <tool_call><name>b</name><arguments>{}</arguments></tool_call>"#;
        let (_, calls) = extract(text);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "a");
        assert_eq!(calls[1].name, "b");
    }

    #[test]
    fn no_tool_call_leaves_text_untouched() {
        let (clean, calls) = extract("just plain text");
        assert_eq!(clean, "just plain text");
        assert!(calls.is_empty());
    }

    #[test]
    fn partial_tool_call_detected() {
        assert!(has_partial_tool_call("here is <tool_call><name>x</name>"));
        assert!(!has_partial_tool_call("here is text"));
        assert!(!has_partial_tool_call("<tool_call><name>x</name></tool_call>"));
    }

    #[test]
    fn partial_detection_is_case_insensitive() {
        assert!(has_partial_tool_call("<TOOL_CALL><name>x</name>"));
    }
}
