//! Configuration Types
//!
//! Client credentials, provider endpoints and runtime settings.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use url::{Host, Url};

use crate::builders::OneDriveConfigBuilder;
use crate::error::{ConfigurationError, OneDriveResult};
use crate::types::RefreshTokenPolicy;

/// Microsoft identity platform authorize endpoint.
pub const DEFAULT_AUTHORIZATION_ENDPOINT: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
/// Microsoft identity platform token endpoint.
pub const DEFAULT_TOKEN_ENDPOINT: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/token";
/// Microsoft Graph base URL. The trailing slash matters for relative joins.
pub const DEFAULT_API_BASE_URL: &str = "https://graph.microsoft.com/v1.0/";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:9999/authentication";
pub const DEFAULT_CALLBACK_PORT: u16 = 9999;
pub const DEFAULT_SCOPES: &[&str] = &["profile", "email", "openid", "offline_access", "User.Read"];

/// Default configuration values.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

/// Complete client configuration.
#[derive(Clone, Debug)]
pub struct OneDriveConfig {
    /// Application credentials.
    pub credentials: Credentials,
    /// Authorization server endpoints.
    pub provider: ProviderConfig,
    /// Base URL relative request paths are resolved against.
    pub api_base_url: Url,
    /// Per-request timeout for token and API calls.
    pub timeout: Duration,
    /// How long the callback listener stays up after the outcome is known.
    pub shutdown_grace: Duration,
    /// How long `authenticate` waits for the browser redirect. `None` waits forever.
    pub callback_timeout: Option<Duration>,
    /// What to do when a refresh response omits `refresh_token`.
    pub refresh_policy: RefreshTokenPolicy,
}

impl OneDriveConfig {
    /// Start a builder.
    pub fn builder() -> OneDriveConfigBuilder {
        OneDriveConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// `ONEDRIVE_CLIENT_ID` and `ONEDRIVE_CLIENT_SECRET` are required.
    /// `ONEDRIVE_REDIRECT_URL`, `ONEDRIVE_SCOPES` (comma or whitespace
    /// separated) and `ONEDRIVE_TIMEOUT_SECS` override the defaults.
    pub fn from_env() -> OneDriveResult<Self> {
        let mut builder = OneDriveConfigBuilder::new();

        if let Ok(client_id) = std::env::var("ONEDRIVE_CLIENT_ID") {
            builder = builder.client_id(client_id);
        }
        if let Ok(secret) = std::env::var("ONEDRIVE_CLIENT_SECRET") {
            builder = builder.client_secret(secret);
        }
        if let Ok(redirect) = std::env::var("ONEDRIVE_REDIRECT_URL") {
            builder = builder.redirect_uri(redirect);
        }
        if let Ok(scopes) = std::env::var("ONEDRIVE_SCOPES") {
            builder = builder.scopes(parse_scope_list(&scopes));
        }
        if let Ok(secs) = std::env::var("ONEDRIVE_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| ConfigurationError::InvalidValue {
                field: "ONEDRIVE_TIMEOUT_SECS".to_string(),
                message: format!("not a number of seconds: {secs}"),
            })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }

        builder.build()
    }
}

fn parse_scope_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Authorization server endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Authorization endpoint URL.
    pub authorization_endpoint: Url,
    /// Token endpoint URL.
    pub token_endpoint: Url,
}

pub(crate) fn parse_endpoint(raw: &str) -> OneDriveResult<Url> {
    Url::parse(raw).map_err(|e| {
        ConfigurationError::InvalidEndpoint {
            url: raw.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Application credentials registered with the authorization server.
#[derive(Clone)]
pub struct Credentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
    /// Requested scopes, in order.
    pub scopes: Vec<String>,
    /// Where the browser is sent back to. Its path is the only route the
    /// callback listener serves.
    pub redirect_uri: Url,
    /// How the secret is presented to the token endpoint.
    pub auth_method: ClientAuthMethod,
}

impl Credentials {
    /// Scopes joined with a single space.
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    pub fn expose_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }

    /// Path component of the redirect URI.
    pub fn callback_path(&self) -> &str {
        self.redirect_uri.path()
    }

    /// Local address the callback listener binds.
    ///
    /// `localhost` resolves to the IPv4 loopback; any other host must be an
    /// IP literal.
    pub fn callback_bind_addr(&self) -> OneDriveResult<SocketAddr> {
        let invalid = |reason: &str| ConfigurationError::InvalidRedirectUri {
            uri: self.redirect_uri.to_string(),
            reason: reason.to_string(),
        };

        let ip = match self.redirect_uri.host() {
            Some(Host::Domain(d)) if d.eq_ignore_ascii_case("localhost") => {
                IpAddr::V4(Ipv4Addr::LOCALHOST)
            }
            Some(Host::Ipv4(v4)) => IpAddr::V4(v4),
            Some(Host::Ipv6(v6)) => IpAddr::V6(v6),
            Some(Host::Domain(_)) => {
                return Err(invalid("host must be localhost or an IP literal").into())
            }
            None => return Err(invalid("missing host").into()),
        };
        let port = self
            .redirect_uri
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        Ok(SocketAddr::new(ip, port))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// Client authentication method at the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// client_id and client_secret in request body.
    ClientSecretPost,
    /// HTTP Basic Authentication header.
    ClientSecretBasic,
    /// Only client_id in the form.
    #[default]
    None,
}

/// Grant type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantType {
    #[serde(rename = "authorization_code")]
    AuthorizationCode,
    #[serde(rename = "refresh_token")]
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}
