//! Token Store
//!
//! Holds the current token set and serializes refreshes.
//!
//! Each write bumps an epoch. A caller remembers the epoch of the token it sent
//! and passes it to [`TokenStore::refresh`]; if the epoch has moved on, some
//! other caller already refreshed (or failed to) and that outcome is reused
//! instead of hitting the token endpoint again.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{NetworkError, OneDriveError, OneDriveResult, TokenError};
use crate::token::TokenExchanger;
use crate::types::{RefreshTokenPolicy, TokenData};

/// An access token together with the epoch it was read at.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenLease {
    pub access_token: String,
    pub epoch: u64,
}

impl std::fmt::Debug for TokenLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLease")
            .field("access_token", &"[REDACTED]")
            .field("epoch", &self.epoch)
            .finish()
    }
}

#[derive(Default)]
struct TokenSlot {
    token: Option<TokenData>,
    epoch: u64,
    /// Failure of the refresh that produced the current epoch, if it failed.
    failure: Option<OneDriveError>,
    updated_at: Option<DateTime<Utc>>,
}

/// In-memory token holder with single-flight refresh.
pub struct TokenStore {
    slot: RwLock<TokenSlot>,
    refresh_gate: Mutex<()>,
    policy: RefreshTokenPolicy,
}

impl TokenStore {
    pub fn new(policy: RefreshTokenPolicy) -> Self {
        Self {
            slot: RwLock::new(TokenSlot::default()),
            refresh_gate: Mutex::new(()),
            policy,
        }
    }

    /// Start with an existing token, e.g. one persisted by a previous run.
    pub fn with_token(policy: RefreshTokenPolicy, token: TokenData) -> Self {
        Self {
            slot: RwLock::new(TokenSlot {
                token: Some(token),
                epoch: 1,
                failure: None,
                updated_at: Some(Utc::now()),
            }),
            refresh_gate: Mutex::new(()),
            policy,
        }
    }

    /// Current access token and its epoch, if one is stored.
    pub async fn lease(&self) -> Option<TokenLease> {
        let slot = self.slot.read().await;
        slot.token
            .as_ref()
            .filter(|t| t.has_access_token())
            .map(|t| TokenLease {
                access_token: t.access_token.clone(),
                epoch: slot.epoch,
            })
    }

    /// Copy of the stored token set.
    pub async fn snapshot(&self) -> Option<TokenData> {
        self.slot.read().await.token.clone()
    }

    /// When the token was last written.
    pub async fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.slot.read().await.updated_at
    }

    pub async fn epoch(&self) -> u64 {
        self.slot.read().await.epoch
    }

    /// Overwrite the stored token wholesale.
    pub async fn replace(&self, token: TokenData) {
        let mut slot = self.slot.write().await;
        slot.token = Some(token);
        slot.epoch += 1;
        slot.failure = None;
        slot.updated_at = Some(Utc::now());
        debug!(epoch = slot.epoch, "Token stored");
    }

    /// Forget the stored token.
    pub async fn clear(&self) {
        let mut slot = self.slot.write().await;
        slot.token = None;
        slot.epoch += 1;
        slot.failure = None;
        slot.updated_at = Some(Utc::now());
    }

    /// Refresh the token that was current at `observed_epoch`.
    ///
    /// Refreshes never overlap. Callers that queued behind a refresh get its
    /// result without a second round-trip. Failures come back as
    /// [`TokenError::RefreshFailed`].
    ///
    /// The exchange runs on its own task, so a caller that is cancelled or
    /// dropped mid-refresh does not abort it: the result still lands in the
    /// store and the next waiter reuses it.
    pub async fn refresh(
        self: &Arc<Self>,
        observed_epoch: u64,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> OneDriveResult<TokenLease> {
        let store = Arc::clone(self);
        let task = tokio::spawn(async move {
            store
                .refresh_exclusive(observed_epoch, exchanger.as_ref())
                .await
        });

        task.await.unwrap_or_else(|e| {
            Err(TokenError::refresh_failed(
                NetworkError::ConnectionFailed {
                    message: format!("refresh task failed: {e}"),
                }
                .into(),
            )
            .into())
        })
    }

    async fn refresh_exclusive(
        &self,
        observed_epoch: u64,
        exchanger: &dyn TokenExchanger,
    ) -> OneDriveResult<TokenLease> {
        let _gate = self.refresh_gate.lock().await;

        let previous = {
            let slot = self.slot.read().await;
            if slot.epoch != observed_epoch {
                debug!(
                    observed_epoch,
                    epoch = slot.epoch,
                    "Token already refreshed by another caller"
                );
                if let Some(failure) = &slot.failure {
                    return Err(failure.clone());
                }
                return slot
                    .token
                    .as_ref()
                    .filter(|t| t.has_access_token())
                    .map(|t| TokenLease {
                        access_token: t.access_token.clone(),
                        epoch: slot.epoch,
                    })
                    .ok_or_else(|| TokenError::Unauthenticated.into());
            }
            slot.token.clone().ok_or(TokenError::Unauthenticated)?
        };

        let outcome = if previous.has_refresh_token() {
            info!(epoch = observed_epoch, "Refreshing access token");
            exchanger.refresh(&previous.refresh_token).await
        } else {
            Err(TokenError::NoRefreshToken.into())
        };

        let mut slot = self.slot.write().await;
        slot.epoch += 1;
        slot.updated_at = Some(Utc::now());
        match outcome {
            Ok(fresh) => {
                let merged = self.policy.apply(&previous, fresh);
                let lease = TokenLease {
                    access_token: merged.access_token.clone(),
                    epoch: slot.epoch,
                };
                slot.token = Some(merged);
                slot.failure = None;
                info!(epoch = slot.epoch, "Access token refreshed");
                Ok(lease)
            }
            Err(e) => {
                let failure = OneDriveError::from(TokenError::refresh_failed(e));
                warn!(epoch = slot.epoch, error = %failure, "Token refresh failed");
                slot.failure = Some(failure.clone());
                Err(failure)
            }
        }
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(RefreshTokenPolicy::default())
    }
}
