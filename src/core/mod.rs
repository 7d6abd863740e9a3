//! Core Components
//!
//! Transport seam, request envelopes and state generation.

pub mod request;
pub mod state;
pub mod transport;

pub use request::ApiRequest;
pub use state::*;
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, ReqwestHttpTransport,
    DEFAULT_MAX_RESPONSE_SIZE,
};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
