//! State Generation
//!
//! CSRF `state` nonce for the authorization redirect.

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Mutex;

use crate::core::lock;
use crate::error::{AuthorizationError, OneDriveError, OneDriveResult};

const STATE_BYTES: usize = 32;

/// Opaque per-flow CSRF nonce. Never persisted, never reused.
#[derive(Clone, PartialEq, Eq)]
pub struct FlowState(String);

impl FlowState {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FlowState {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Debug for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FlowState").field(&"[REDACTED]").finish()
    }
}

/// State generator interface (for dependency injection).
pub trait StateGenerator: Send + Sync {
    /// Produce a fresh state for one login attempt.
    fn generate(&self) -> OneDriveResult<FlowState>;
}

/// 256 bits from the operating system CSPRNG, base64url without padding.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRngStateGenerator;

impl StateGenerator for OsRngStateGenerator {
    fn generate(&self) -> OneDriveResult<FlowState> {
        let mut bytes = [0u8; STATE_BYTES];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
            OneDriveError::from(AuthorizationError::StateGeneration {
                message: format!("OS random source unavailable: {e}"),
            })
        })?;
        Ok(FlowState(
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes),
        ))
    }
}

/// Mock state generator for testing.
#[derive(Default)]
pub struct MockStateGenerator {
    next_state: Mutex<Option<String>>,
    generated: Mutex<Vec<String>>,
}

impl MockStateGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator that always yields `state` unless overridden.
    pub fn fixed(state: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.set_next_state(state);
        mock
    }

    /// Set the next state to generate.
    pub fn set_next_state(&self, state: impl Into<String>) -> &Self {
        *lock(&self.next_state) = Some(state.into());
        self
    }

    /// Get generate history.
    pub fn get_generated(&self) -> Vec<String> {
        lock(&self.generated).clone()
    }
}

impl StateGenerator for MockStateGenerator {
    fn generate(&self) -> OneDriveResult<FlowState> {
        let state = lock(&self.next_state)
            .clone()
            .unwrap_or_else(|| format!("mock-state-{}", rand::random::<u32>()));
        lock(&self.generated).push(state.clone());
        Ok(FlowState(state))
    }
}
