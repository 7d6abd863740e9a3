//! Callback Types
//!
//! Types for handling the authorization redirect.

use serde::Deserialize;

use crate::types::TokenData;

/// Query parameters of the authorization redirect.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Outcome of one login attempt, as seen by the callback handler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthResult {
    /// Authorization code from the redirect.
    pub code: String,
    /// State issued with the authorize URL.
    pub sent_state: String,
    /// State echoed back by the redirect.
    pub received_state: String,
    /// Provider error code, when the provider refused.
    pub error: String,
    pub error_description: String,
    /// Tokens obtained from the exchange.
    pub token: Option<TokenData>,
    /// Why the exchange failed.
    pub failure: Option<String>,
}

impl AuthResult {
    /// Build from the redirect query.
    pub fn from_callback(sent_state: &str, query: CallbackQuery) -> Self {
        Self {
            code: query.code.unwrap_or_default(),
            sent_state: sent_state.to_string(),
            received_state: query.state.unwrap_or_default(),
            error: query.error.unwrap_or_default(),
            error_description: query.error_description.unwrap_or_default(),
            token: None,
            failure: None,
        }
    }

    /// Exact comparison of sent and received state.
    pub fn state_matches(&self) -> bool {
        !self.sent_state.is_empty() && self.sent_state == self.received_state
    }

    /// Whether the provider reported an error.
    pub fn is_provider_error(&self) -> bool {
        !self.error.is_empty()
    }
}
