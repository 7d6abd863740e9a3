//! OAuth2 Flows
//!
//! Authorization-code login with a local callback listener.

pub mod authorization_code;
pub mod callback;

pub use authorization_code::{
    build_authorization_url, AuthorizationCodeFlow, AuthorizationPrompt, ConsolePrompt,
    PendingAuthorization,
};
pub use callback::{BoundListener, CallbackListener, ListenerPhase};
