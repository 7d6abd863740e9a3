//! Page Rendering
//!
//! HTML shown in the browser once the redirect has been handled.

use crate::types::AuthResult;

/// Renders the page returned to the browser for a callback.
///
/// Must be deterministic: the same result renders to the same bytes.
pub trait PageRenderer: Send + Sync {
    fn render(&self, result: &AuthResult) -> Vec<u8>;
}

/// Built-in HTML renderer.
#[derive(Debug, Clone)]
pub struct HtmlPageRenderer {
    title: String,
}

impl HtmlPageRenderer {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    fn page(&self, heading: &str, body: &str) -> Vec<u8> {
        format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<h1>{heading}</h1>\n{body}\n</body>\n</html>\n",
            title = escape_html(&self.title),
            heading = escape_html(heading),
        )
        .into_bytes()
    }
}

impl Default for HtmlPageRenderer {
    fn default() -> Self {
        Self::new("OneDrive sign-in")
    }
}

impl PageRenderer for HtmlPageRenderer {
    fn render(&self, result: &AuthResult) -> Vec<u8> {
        if !result.state_matches() {
            return self.page(
                "Sign-in rejected",
                "<p>The response did not match this sign-in attempt. Close this window and start again.</p>",
            );
        }

        if result.is_provider_error() {
            let detail = if result.error_description.is_empty() {
                &result.error
            } else {
                &result.error_description
            };
            return self.page(
                "Sign-in denied",
                &format!("<p>{}</p>", escape_html(detail)),
            );
        }

        if let Some(failure) = &result.failure {
            return self.page(
                "Sign-in failed",
                &format!("<p>Could not obtain a token:</p>\n<pre>{}</pre>", escape_html(failure)),
            );
        }

        match &result.token {
            Some(token) => self.page(
                "Signed in",
                &format!(
                    "<p>You can close this window.</p>\n<pre>{}</pre>",
                    escape_html(&token.to_json_pretty())
                ),
            ),
            None => self.page(
                "Sign-in incomplete",
                "<p>No authorization code was received.</p>",
            ),
        }
    }
}

/// Escape text for inclusion in HTML element content.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
