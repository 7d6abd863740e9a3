//! Configuration Builder
//!
//! Fluent builder for the client configuration.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::{ConfigurationError, OneDriveError};
use crate::types::{
    parse_endpoint, ClientAuthMethod, Credentials, OneDriveConfig, ProviderConfig,
    RefreshTokenPolicy, DEFAULT_API_BASE_URL, DEFAULT_AUTHORIZATION_ENDPOINT,
    DEFAULT_CALLBACK_TIMEOUT_SECS, DEFAULT_REDIRECT_URI, DEFAULT_SCOPES,
    DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_TIMEOUT_SECS, DEFAULT_TOKEN_ENDPOINT,
};

/// Client configuration builder.
pub struct OneDriveConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    auth_method: ClientAuthMethod,
    scopes: Vec<String>,
    redirect_uri: String,
    authorization_endpoint: String,
    token_endpoint: String,
    api_base_url: String,
    timeout: Duration,
    shutdown_grace: Duration,
    callback_timeout: Option<Duration>,
    refresh_policy: RefreshTokenPolicy,
}

impl Default for OneDriveConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OneDriveConfigBuilder {
    /// Create new configuration builder with Microsoft defaults.
    pub fn new() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_method: ClientAuthMethod::default(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            callback_timeout: Some(Duration::from_secs(DEFAULT_CALLBACK_TIMEOUT_SECS)),
            refresh_policy: RefreshTokenPolicy::default(),
        }
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set client authentication method.
    pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
        self.auth_method = method;
        self
    }

    /// Replace the requested scopes.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Add a scope.
    pub fn add_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Set authorization endpoint.
    pub fn authorization_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorization_endpoint = endpoint.into();
        self
    }

    /// Set token endpoint.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    /// Set the base URL for API calls.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how long the callback listener lingers after answering.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set how long to wait for the browser redirect. `None` waits forever.
    pub fn callback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn refresh_policy(mut self, policy: RefreshTokenPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<OneDriveConfig, OneDriveError> {
        let client_id = self
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "client_id".to_string(),
            })?;

        let client_secret = self.client_secret.ok_or_else(|| {
            ConfigurationError::MissingRequired {
                field: "client_secret".to_string(),
            }
        })?;

        let redirect_uri =
            Url::parse(&self.redirect_uri).map_err(|e| ConfigurationError::InvalidRedirectUri {
                uri: self.redirect_uri.clone(),
                reason: e.to_string(),
            })?;
        if redirect_uri.scheme() != "http" {
            return Err(ConfigurationError::InvalidRedirectUri {
                uri: self.redirect_uri,
                reason: "scheme must be http".to_string(),
            }
            .into());
        }
        // Registered redirects are matched exactly; an ephemeral port never is.
        if redirect_uri.port() == Some(0) {
            return Err(ConfigurationError::InvalidRedirectUri {
                uri: self.redirect_uri,
                reason: "port must not be 0".to_string(),
            }
            .into());
        }

        let mut api_base_url = parse_endpoint(&self.api_base_url)?;
        if !api_base_url.path().ends_with('/') {
            let path = format!("{}/", api_base_url.path());
            api_base_url.set_path(&path);
        }

        let credentials = Credentials {
            client_id,
            client_secret,
            scopes: self.scopes,
            redirect_uri,
            auth_method: self.auth_method,
        };
        // Rejects hosts the listener could not bind.
        credentials.callback_bind_addr()?;

        Ok(OneDriveConfig {
            credentials,
            provider: ProviderConfig {
                authorization_endpoint: parse_endpoint(&self.authorization_endpoint)?,
                token_endpoint: parse_endpoint(&self.token_endpoint)?,
            },
            api_base_url,
            timeout: self.timeout,
            shutdown_grace: self.shutdown_grace,
            callback_timeout: self.callback_timeout,
            refresh_policy: self.refresh_policy,
        })
    }
}

/// Create a new configuration builder.
pub fn onedrive_config() -> OneDriveConfigBuilder {
    OneDriveConfigBuilder::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_builder_defaults() {
        let config = onedrive_config()
            .client_id("test-client")
            .client_secret("test-secret")
            .build()
            .unwrap();

        assert_eq!(config.credentials.client_id, "test-client");
        assert_eq!(
            config.credentials.scope_string(),
            "profile email openid offline_access User.Read"
        );
        assert_eq!(config.credentials.redirect_uri.as_str(), DEFAULT_REDIRECT_URI);
        assert_eq!(
            config.provider.token_endpoint.as_str(),
            DEFAULT_TOKEN_ENDPOINT
        );
        assert_eq!(config.api_base_url.as_str(), DEFAULT_API_BASE_URL);
        assert_eq!(config.credentials.auth_method, ClientAuthMethod::None);
        assert_eq!(config.refresh_policy, RefreshTokenPolicy::Replace);
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_missing_client_id() {
        let err = onedrive_config().client_secret("s").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_builder_missing_secret() {
        let err = onedrive_config().client_id("c").build().unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn test_builder_rejects_port_zero() {
        let err = onedrive_config()
            .client_id("c")
            .client_secret("s")
            .redirect_uri("http://127.0.0.1:0/authentication")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("port must not be 0"));
    }

    #[test]
    fn test_builder_rejects_unbindable_redirect() {
        let result = onedrive_config()
            .client_id("c")
            .client_secret("s")
            .redirect_uri("https://localhost:9999/cb")
            .build();
        assert!(result.is_err());

        let result = onedrive_config()
            .client_id("c")
            .client_secret("s")
            .redirect_uri("http://example.com/cb")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_api_base_gets_trailing_slash() {
        let config = onedrive_config()
            .client_id("c")
            .client_secret("s")
            .api_base_url("http://127.0.0.1:8080/v1.0")
            .build()
            .unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://127.0.0.1:8080/v1.0/");
    }
}
