//! Helpers shared by every vendor adapter: HTTP posting, status mapping,
//! and content normalization.

use serde_json::Value;
use sleuth_core::error::ProviderError;
use std::time::Duration;
use tracing::warn;

/// Build the HTTP client used by an adapter.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {e}")))
}

/// POST a JSON body and return the parsed JSON reply, mapping HTTP failures.
pub(crate) async fn post_json(
    request: reqwest::RequestBuilder,
    body: &Value,
    provider: &str,
) -> Result<Value, ProviderError> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(format!("{provider}: {e}"))
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        let error_body = response.text().await.unwrap_or_default();
        warn!(provider, status, body = %error_body, "Provider returned error");
        return Err(map_status(status, error_body));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))
}

/// Map a non-success HTTP status to a provider error.
pub(crate) fn map_status(status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited(body),
        401 | 403 => ProviderError::AuthenticationFailed(if body.is_empty() {
            "Invalid API key or insufficient permissions".into()
        } else {
            body
        }),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

/// Collapse a vendor content payload into a single string.
///
/// Accepts a plain string, a list of text parts (objects carrying `text`,
/// or bare strings), or an object with a `text` field. Parts are joined
/// with newlines; empty parts are dropped.
pub fn normalize_content(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                _ => None,
            })
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(obj) => obj
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        other => other.to_string(),
    }
}

/// Tool-call arguments as the raw JSON text a model would send.
pub(crate) fn arguments_to_string(arguments: Option<&Value>) -> String {
    match arguments {
        None | Some(Value::Null) => "{}".into(),
        Some(Value::String(s)) if s.is_empty() => "{}".into(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn u64_field(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_string_and_null() {
        assert_eq!(normalize_content(&json!("hello")), "hello");
        assert_eq!(normalize_content(&Value::Null), "");
    }

    #[test]
    fn normalizes_part_lists() {
        let content = json!([
            {"type": "text", "text": "first"},
            {"type": "image_url", "image_url": "x"},
            "second",
            {"text": ""},
            {"text": "third"}
        ]);
        assert_eq!(normalize_content(&content), "first\nsecond\nthird");
    }

    #[test]
    fn normalizes_text_object() {
        assert_eq!(normalize_content(&json!({"text": "inner"})), "inner");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(map_status(429, "slow".into()), ProviderError::RateLimited(_)));
        assert!(matches!(map_status(401, String::new()), ProviderError::AuthenticationFailed(_)));
        assert!(matches!(map_status(403, "no".into()), ProviderError::AuthenticationFailed(_)));
        assert!(matches!(
            map_status(500, "boom".into()),
            ProviderError::ApiError { status_code: 500, .. }
        ));
    }

    #[test]
    fn arguments_text() {
        assert_eq!(arguments_to_string(None), "{}");
        assert_eq!(arguments_to_string(Some(&json!(""))), "{}");
        assert_eq!(arguments_to_string(Some(&json!("{\"a\":1}"))), "{\"a\":1}");
        assert_eq!(arguments_to_string(Some(&json!({"a": 1}))), "{\"a\":1}");
    }
}
