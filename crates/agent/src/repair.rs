//! Tool-argument repair.
//!
//! Arguments arrive as the raw string the model produced. They go through
//! an ordered chain of total functions: strict JSON, then a relaxed
//! literal syntax (single quotes, `True`/`False`/`None`, trailing commas),
//! then a raw-text fallback. The chain never fails.

use serde_json::{Map, Value, json};
use tracing::{error, warn};

/// Key under which unparsable raw arguments are preserved.
pub const RAW_ARGUMENTS_KEY: &str = "__raw_arguments";

/// Parse `raw` into an argument object for `tool_name`.
pub fn parse_arguments(tool_name: &str, raw: &str) -> Value {
    if let Some(value) = parse_strict(raw) {
        return value;
    }
    error!(tool = tool_name, "Failed to parse tool arguments as JSON");
    if let Some(value) = parse_relaxed(raw) {
        return value;
    }
    raw_fallback(tool_name, raw)
}

/// Strict JSON; an empty payload is an empty object.
pub fn parse_strict(raw: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return Some(Value::Object(Map::new()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Literal-syntax repair; only object results are accepted.
pub fn parse_relaxed(raw: &str) -> Option<Value> {
    let converted = literal_to_json(raw.trim())?;
    match serde_json::from_str::<Value>(&converted) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Last resort: keep the raw text, routing it into the report for `finish`.
pub fn raw_fallback(tool_name: &str, raw: &str) -> Value {
    let text = raw.trim();
    if text.is_empty() {
        return Value::Object(Map::new());
    }
    if tool_name == "finish" {
        warn!("Finish arguments malformed; treating raw payload as report text.");
        return json!({
            "report": text,
            "sources": [],
            RAW_ARGUMENTS_KEY: text,
        });
    }
    json!({ RAW_ARGUMENTS_KEY: text })
}

/// Rewrite literal syntax into JSON text. Returns `None` on an unterminated string.
fn literal_to_json(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                let quote = c;
                out.push('"');
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => {
                            let escaped = chars.next()?;
                            if escaped == '\'' {
                                out.push('\'');
                            } else {
                                out.push('\\');
                                out.push(escaped);
                            }
                        }
                        '"' if quote == '\'' => out.push_str("\\\""),
                        '\n' => out.push_str("\\n"),
                        q if q == quote => {
                            closed = true;
                            break;
                        }
                        other => out.push(other),
                    }
                }
                if !closed {
                    return None;
                }
                out.push('"');
            }
            '(' => out.push('['),
            ')' => out.push(']'),
            ',' => {
                let mut lookahead = chars.clone();
                while lookahead.peek().is_some_and(|n| n.is_whitespace()) {
                    lookahead.next();
                }
                if !matches!(lookahead.peek(), Some('}' | ']' | ')')) {
                    out.push(',');
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        word.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            other => out.push(other),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_passes_through() {
        let value = parse_arguments("web_search", r#"{"query": "rust", "num_results": 3}"#);
        assert_eq!(value, json!({"query": "rust", "num_results": 3}));
    }

    #[test]
    fn empty_arguments_are_an_empty_object() {
        assert_eq!(parse_arguments("web_search", "  "), json!({}));
    }

    #[test]
    fn literal_syntax_is_repaired() {
        let value = parse_arguments(
            "web_search",
            "{'query': 'rust \"async\" runtimes', 'num_results': 5, 'exact': True, 'date_filter': None,}",
        );
        assert_eq!(
            value,
            json!({
                "query": "rust \"async\" runtimes",
                "num_results": 5,
                "exact": true,
                "date_filter": null
            })
        );
    }

    #[test]
    fn escaped_quote_inside_single_quotes() {
        let value = parse_relaxed(r"{'query': 'Moore\'s law'}").unwrap();
        assert_eq!(value["query"], "Moore's law");
    }

    #[test]
    fn tuples_become_arrays() {
        let value = parse_relaxed("{'sources': ('u1', 'u2')}").unwrap();
        assert_eq!(value["sources"], json!(["u1", "u2"]));
    }

    #[test]
    fn unparsable_text_is_preserved() {
        let value = parse_arguments("web_search", "not json");
        assert_eq!(value, json!({"__raw_arguments": "not json"}));
    }

    #[test]
    fn unparsable_finish_becomes_report() {
        let value = parse_arguments("finish", "# Report\nBody text");
        assert_eq!(value["report"], "# Report\nBody text");
        assert_eq!(value["sources"], json!([]));
        assert_eq!(value[RAW_ARGUMENTS_KEY], "# Report\nBody text");
    }

    #[test]
    fn non_object_json_falls_back() {
        assert!(parse_strict("[1, 2]").is_none());
        assert_eq!(
            parse_arguments("pdf_to_text", "\"doc.pdf\""),
            json!({"__raw_arguments": "\"doc.pdf\""})
        );
    }

    #[test]
    fn unterminated_string_is_not_repaired() {
        assert!(parse_relaxed("{'query': 'open").is_none());
    }
}
