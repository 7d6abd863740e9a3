//! API services built on the authenticated transport.

pub mod users;

pub use users::{CurrentUser, UsersService};
