//! OneDrive Types
//!
//! Configuration, token and callback types.

pub mod callback;
pub mod config;
pub mod token;

pub use callback::*;
pub use config::*;
pub use token::*;
