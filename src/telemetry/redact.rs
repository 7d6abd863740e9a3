//! Redaction
//!
//! Masks credentials in logged headers and bodies.

use reqwest::header::HeaderMap;
use serde_json::Value;

const REDACTED: &str = "***REDACTED***";

/// Keys whose values never reach the logs. Compared case-insensitively.
const SENSITIVE_KEYS: &[&str] = &[
    "access_token",
    "refresh_token",
    "id_token",
    "token_type",
    "authorization",
    "authentication",
    "client_secret",
    "code",
];

fn is_sensitive(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// Redact a JSON value in place, at any depth.
pub fn redact_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if is_sensitive(key) {
                    *v = Value::String(REDACTED.to_string());
                } else {
                    redact_json(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_json),
        _ => {}
    }
}

/// Render a body for logging.
///
/// JSON bodies are redacted key by key, form bodies pair by pair. Anything
/// else is replaced by its length.
pub fn redact_body(body: &[u8]) -> String {
    if body.is_empty() {
        return String::new();
    }

    if let Ok(mut json) = serde_json::from_slice::<Value>(body) {
        redact_json(&mut json);
        return json.to_string();
    }

    if let Ok(pairs) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
        if !pairs.is_empty() && pairs.iter().all(|(k, _)| !k.contains(char::is_whitespace)) {
            let masked: Vec<(String, String)> = pairs
                .into_iter()
                .map(|(k, v)| {
                    let v = if is_sensitive(&k) { REDACTED.to_string() } else { v };
                    (k, v)
                })
                .collect();
            if let Ok(encoded) = serde_urlencoded::to_string(&masked) {
                return encoded;
            }
        }
    }

    format!("<{} bytes>", body.len())
}

/// Header names and values, with sensitive values masked.
pub fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if is_sensitive(name.as_str()) || value.is_sensitive() {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}
