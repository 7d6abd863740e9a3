//! OneDrive Integration Module
//!
//! Authorization-code login against the Microsoft identity platform with a
//! local redirect listener, and an authenticated transport for Microsoft
//! Graph that refreshes an expired token and retries the call once.
//!
//! # Features
//!
//! - Authorization Code Flow (RFC 6749 Section 4.1) with CSRF `state`
//! - Ephemeral callback listener bound to the redirect URI
//! - Token Refresh (RFC 6749 Section 6), single-flight per client
//! - Bearer-authenticated API calls with one refresh-and-retry on 401
//!
//! # Example
//!
//! ```rust,no_run
//! use integrations_onedrive::{onedrive_config, OneDriveClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = onedrive_config()
//!         .client_id("my-client-id")
//!         .client_secret("my-client-secret")
//!         .build()?;
//!
//!     let client = OneDriveClient::new(config)?;
//!
//!     // Prints the sign-in URL and waits for the browser redirect.
//!     client.authenticate().await?;
//!
//!     let me = client.current_user().await?;
//!     println!("Signed in as {}", me.user_principal_name);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, token and callback data
//! - `error`: error hierarchy and flat [`ErrorKind`]
//! - `core`: HTTP transport seam, request envelopes, state generation
//! - `flows`: authorization URL, login flow and callback listener
//! - `token`: token endpoint exchanges and the token store
//! - `render`: pages shown in the browser after the redirect
//! - `client`: authenticated executor and the [`OneDriveClient`] facade
//! - `services`: typed API calls
//! - `telemetry`: tracing setup and log redaction

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod flows;
pub mod render;
pub mod services;
pub mod telemetry;
pub mod token;
pub mod types;

// Re-export main client
pub use client::{
    onedrive_client, ApiResponse, AuthenticatedTransport, CallOptions, ClientComponents,
    OneDriveClient,
};

// Re-export builders
pub use builders::{onedrive_config, OneDriveConfigBuilder};

// Re-export errors
pub use error::{
    AuthorizationError, ConfigurationError, ErrorKind, NetworkError, OneDriveError,
    OneDriveResult, ProtocolError, RemoteError, TokenError,
};

// Re-export core
pub use self::core::{
    ApiRequest, FlowState, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
    MockHttpTransport, MockStateGenerator, OsRngStateGenerator, ReqwestHttpTransport,
    StateGenerator,
};

// Re-export flows
pub use flows::{
    build_authorization_url, AuthorizationCodeFlow, AuthorizationPrompt, BoundListener,
    CallbackListener, ConsolePrompt, ListenerPhase, PendingAuthorization,
};

// Re-export tokens
pub use token::{HttpTokenExchanger, MockTokenExchanger, TokenExchanger, TokenLease, TokenStore};

// Re-export rendering
pub use render::{HtmlPageRenderer, PageRenderer};

// Re-export services
pub use services::{CurrentUser, UsersService};

// Re-export telemetry
pub use telemetry::init_tracing;

// Re-export types
pub use types::{
    AuthResult, CallbackQuery, ClientAuthMethod, Credentials, GrantType, OneDriveConfig,
    ProviderConfig, RefreshTokenPolicy, TokenData,
};
