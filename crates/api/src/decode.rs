//! Response body helpers: strict JSON decoding and secret redaction.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::GatewayError;

const PREVIEW_LIMIT: usize = 200;

static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization: )([\w\-\.=:/+]+)",
        r"(?i)([A-Z0-9_]*?(KEY|TOKEN|SECRET|PASSWORD)=)([^\s]+)",
        r#"(?i)("(?:auth_password|password|access_token|refresh_token)"\s*:\s*)("[^"]*")"#,
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Redacts values that look like secrets in a string.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in SENSITIVE_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |caps: &regex::Captures| {
                let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                format!("{prefix}<redacted>")
            })
            .to_string();
    }
    redacted
}

/// Parse a response body into `T`, reporting failures as [`GatewayError::Decode`]
/// with the originating status and a redacted, truncated body preview.
pub fn decode_json<T: DeserializeOwned>(path: &str, status: u16, text: &str) -> Result<T, GatewayError> {
    serde_json::from_str::<T>(text).map_err(|error| {
        GatewayError::decode(
            path,
            format!("{error} (status {status}); body preview: {}", body_preview(text)),
        )
    })
}

/// Collapse whitespace, redact and truncate a response body for error messages.
///
/// Redaction runs on the whole body so a secret cut by the limit never leaks.
pub fn body_preview(text: &str) -> String {
    if text.trim().is_empty() {
        return "<empty>".to_string();
    }

    let mut collapsed = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' | '\r' | '\t' => {
                if !collapsed.ends_with(' ') {
                    collapsed.push(' ');
                }
            }
            _ => collapsed.push(ch),
        }
    }

    let redacted = redact_sensitive(collapsed.trim());
    match redacted.char_indices().nth(PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}...", &redacted[..cut]),
        None => redacted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_types::AppSummary;

    #[test]
    fn decode_error_carries_status_and_preview() {
        let error = decode_json::<AppSummary>("/v2/apps/a/summary", 200, "{\"mishmash\":\"\"").expect_err("broken body");
        match error {
            GatewayError::Decode { path, message } => {
                assert_eq!(path, "/v2/apps/a/summary");
                assert!(message.contains("status 200"));
                assert!(message.contains("mishmash"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn preview_handles_empty_and_long_bodies() {
        assert_eq!(body_preview("  \n"), "<empty>");
        let long = "x".repeat(PREVIEW_LIMIT * 2);
        let preview = body_preview(&long);
        assert!(preview.ends_with("..."));
        assert!(preview.len() <= PREVIEW_LIMIT + 3);
    }

    #[test]
    fn secrets_crossing_the_limit_are_redacted() {
        let body = format!(
            r#"{}{{"password": "hunter2hunter2hunter2", "description": "{}"}}"#,
            "x".repeat(PREVIEW_LIMIT - 30),
            "z".repeat(40)
        );
        let preview = body_preview(&body);
        assert!(!preview.contains("hunter"), "leaked: {preview}");
        assert!(preview.contains(r#""password": <redacted>"#));
        assert!(preview.ends_with("..."));

        let body = format!("{} FOUNDRY_API_TOKEN=abc123abc123abc123", "y".repeat(PREVIEW_LIMIT - 25));
        assert!(!body_preview(&body).contains("abc123"));
    }

    #[test]
    fn secrets_are_redacted() {
        let redacted = redact_sensitive(r#"FOUNDRY_API_TOKEN=abc123 {"auth_password": "hunter2"}"#);
        assert!(!redacted.contains("abc123"));
        assert!(!redacted.contains("hunter2"));
        assert!(redacted.contains("FOUNDRY_API_TOKEN=<redacted>"));
    }
}
