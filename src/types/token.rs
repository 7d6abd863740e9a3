//! Token Types
//!
//! Token material returned by the token endpoint.

use serde::{Deserialize, Serialize};

/// Token set from the authorization server.
///
/// Every field defaults to empty/zero when the response omits it. There is no
/// local expiry clock: a token is considered expired when the API says 401.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub ext_expires_in: u64,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub id_token: String,
}

impl TokenData {
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Value for the `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Serialize for persistence or display.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl std::fmt::Debug for TokenData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &str| if v.is_empty() { "" } else { "[REDACTED]" };
        f.debug_struct("TokenData")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .field("ext_expires_in", &self.ext_expires_in)
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("id_token", &redact(&self.id_token))
            .finish()
    }
}

/// What a refresh does when the response carries no `refresh_token`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshTokenPolicy {
    /// Overwrite the stored token wholesale; a missing refresh token stays missing.
    #[default]
    Replace,
    /// Keep the previous refresh token if the response omits one.
    PreserveWhenAbsent,
}

impl RefreshTokenPolicy {
    /// Merge a refresh response into the token it replaces.
    pub fn apply(&self, previous: &TokenData, mut fresh: TokenData) -> TokenData {
        if *self == Self::PreserveWhenAbsent && !fresh.has_refresh_token() {
            fresh.refresh_token = previous.refresh_token.clone();
        }
        fresh
    }
}
