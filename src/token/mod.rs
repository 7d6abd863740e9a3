//! Token Management
//!
//! - **Token Exchanger**: authorization-code and refresh-token grants
//! - **Token Store**: current token set with single-flight refresh

pub mod exchanger;
pub mod store;

pub use exchanger::{HttpTokenExchanger, MockTokenExchanger, TokenExchanger};
pub use store::{TokenLease, TokenStore};
