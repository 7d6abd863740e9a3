//! OneDrive Error Types
//!
//! Error hierarchy for the login flow and the authenticated transport.
//!
//! Every error is `Clone`: a failed refresh is handed to every caller that was
//! waiting on it, so the same value is returned more than once.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the OneDrive integration.
#[derive(Error, Debug, Clone)]
pub enum OneDriveError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

/// Flat classification of an error, independent of where it was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Callback `state` did not match the nonce issued for the flow.
    StateMismatch,
    /// The authorization server redirected back with `error=...`.
    AccessDenied,
    /// The callback carried neither a code nor an error.
    MissingCode,
    /// Code-for-token exchange failed.
    TokenExchangeFailed,
    /// Refresh-token exchange failed.
    RefreshFailed,
    /// No response was received.
    NetworkError,
    /// A response body was not the expected JSON.
    DecodeError,
    /// The remote answered with a non-2xx status.
    RemoteRejected { status: u16 },
    /// A call required a token and none is stored.
    Unauthenticated,
    /// Invalid or missing configuration.
    Configuration,
    /// The login flow could not be started, or its listener died.
    ListenerFailed,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// The operation ran past its deadline.
    TimedOut,
}

impl OneDriveError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Authorization(e) => match e {
                AuthorizationError::StateMismatch { .. } => ErrorKind::StateMismatch,
                AuthorizationError::AccessDenied { .. } => ErrorKind::AccessDenied,
                AuthorizationError::MissingCode => ErrorKind::MissingCode,
                AuthorizationError::ListenerFailed { .. }
                | AuthorizationError::StateGeneration { .. } => ErrorKind::ListenerFailed,
                AuthorizationError::Cancelled => ErrorKind::Cancelled,
                AuthorizationError::TimedOut { .. } => ErrorKind::TimedOut,
            },
            Self::Token(e) => match e {
                TokenError::Unauthenticated => ErrorKind::Unauthenticated,
                TokenError::NoRefreshToken => ErrorKind::RefreshFailed,
                TokenError::ExchangeFailed { .. } => ErrorKind::TokenExchangeFailed,
                TokenError::RefreshFailed { .. } => ErrorKind::RefreshFailed,
            },
            Self::Network(NetworkError::Timeout { .. }) => ErrorKind::TimedOut,
            Self::Network(NetworkError::Cancelled) => ErrorKind::Cancelled,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Protocol(_) => ErrorKind::DecodeError,
            Self::Remote(RemoteError::Rejected { status, .. }) => {
                ErrorKind::RemoteRejected { status: *status }
            }
        }
    }

    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ONEDRIVE_CONFIG",
            Self::Authorization(_) => "ONEDRIVE_AUTH",
            Self::Token(_) => "ONEDRIVE_TOKEN",
            Self::Network(_) => "ONEDRIVE_NETWORK",
            Self::Protocol(_) => "ONEDRIVE_PROTOCOL",
            Self::Remote(_) => "ONEDRIVE_REMOTE",
        }
    }

    /// HTTP status of the remote rejection, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote(RemoteError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Check if the operator has to go through the browser login again.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Unauthenticated
                | ErrorKind::RefreshFailed
                | ErrorKind::StateMismatch
                | ErrorKind::AccessDenied
        )
    }

    /// Message suitable for showing to the operator.
    pub fn user_message(&self) -> String {
        get_user_message(self)
    }
}

/// Configuration error.
#[derive(Error, Debug, Clone)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL {url}: {message}")]
    InvalidEndpoint { url: String, message: String },

    #[error("Invalid redirect URI {uri}: {reason}")]
    InvalidRedirectUri { uri: String, reason: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("HTTP client setup failed: {message}")]
    HttpClient { message: String },
}

/// Browser login / callback error.
#[derive(Error, Debug, Clone)]
pub enum AuthorizationError {
    #[error("State parameter mismatch (possible CSRF attack)")]
    StateMismatch { expected: String, received: String },

    #[error("Authorization denied: {error}")]
    AccessDenied {
        error: String,
        error_description: Option<String>,
    },

    #[error("Callback carried no authorization code")]
    MissingCode,

    #[error("Callback listener on {address} failed: {message}")]
    ListenerFailed { address: String, message: String },

    #[error("Could not generate state: {message}")]
    StateGeneration { message: String },

    #[error("Authentication cancelled")]
    Cancelled,

    #[error("No callback received within {timeout:?}")]
    TimedOut { timeout: Duration },
}

/// Token lifecycle error.
#[derive(Error, Debug, Clone)]
pub enum TokenError {
    #[error("No access token available, authenticate first")]
    Unauthenticated,

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Token exchange failed: {source}")]
    ExchangeFailed {
        #[source]
        source: Box<OneDriveError>,
    },

    #[error("Token refresh failed: {source}")]
    RefreshFailed {
        #[source]
        source: Box<OneDriveError>,
    },
}

impl TokenError {
    pub(crate) fn exchange_failed(source: OneDriveError) -> Self {
        Self::ExchangeFailed {
            source: Box::new(source),
        }
    }

    pub(crate) fn refresh_failed(source: OneDriveError) -> Self {
        Self::RefreshFailed {
            source: Box::new(source),
        }
    }
}

/// Network/transport error: no response was received.
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Request cancelled")]
    Cancelled,
}

/// Response parsing error.
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Invalid header {name}: {message}")]
    InvalidHeader { name: String, message: String },

    #[error("Unexpected redirect to {location}")]
    UnexpectedRedirect { location: String },

    #[error("Response too large: {size} bytes (limit {limit})")]
    ResponseTooLarge { size: usize, limit: usize },
}

/// The remote answered, but not with success.
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    #[error("HTTP {status}: {}", .error_description.as_deref().or(.error.as_deref()).unwrap_or("request rejected"))]
    Rejected {
        status: u16,
        body: String,
        error: Option<String>,
        error_description: Option<String>,
    },
}

/// Result type for OneDrive operations.
pub type OneDriveResult<T> = Result<T, OneDriveError>;

/// OAuth2 error response from the token endpoint.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Parse an OAuth2 error response from an HTTP body.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Create a rejection error from a non-2xx HTTP response.
pub fn create_error_from_response(status: u16, body: &str) -> OneDriveError {
    let parsed = parse_error_response(body);
    OneDriveError::Remote(RemoteError::Rejected {
        status,
        body: body.to_string(),
        error: parsed.as_ref().map(|p| p.error.clone()),
        error_description: parsed.and_then(|p| p.error_description),
    })
}

/// Get user-friendly error message.
pub fn get_user_message(error: &OneDriveError) -> String {
    match error.kind() {
        ErrorKind::Unauthenticated => "You are not signed in. Please authenticate first.".to_string(),
        ErrorKind::RefreshFailed => {
            "Failed to refresh your session. Please sign in again.".to_string()
        }
        ErrorKind::StateMismatch => {
            "Security validation failed. Please restart the sign-in process.".to_string()
        }
        ErrorKind::AccessDenied => {
            "Access was denied. Please sign in again and grant the requested permissions."
                .to_string()
        }
        ErrorKind::TimedOut => {
            "The operation timed out. Please check your connection and try again.".to_string()
        }
        ErrorKind::Cancelled => "The operation was cancelled.".to_string(),
        ErrorKind::ListenerFailed => {
            "Could not listen for the sign-in redirect. Is another process using the port?"
                .to_string()
        }
        _ => "An authentication error occurred. Please try again.".to_string(),
    }
}
