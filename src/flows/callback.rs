//! Callback Listener
//!
//! Short-lived local HTTP server that receives the authorization redirect.
//!
//! Lifecycle: `Idle -> Listening -> {Rejected | Exchanging} -> Closed`. At most
//! one callback is processed. The outcome goes to the waiting caller over a
//! oneshot channel; the server then lingers for a grace period so the browser
//! gets its page, and shuts down.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{lock, FlowState};
use crate::error::{AuthorizationError, OneDriveError, OneDriveResult, TokenError};
use crate::render::PageRenderer;
use crate::token::TokenExchanger;
use crate::types::{AuthResult, CallbackQuery};

/// Extra time allowed for in-flight connections once shutdown starts.
const CLOSE_SLACK: Duration = Duration::from_secs(1);

/// Where the listener is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerPhase {
    Idle,
    Listening,
    Rejected,
    Exchanging,
    Closed,
}

type Outcome = OneDriveResult<AuthResult>;

struct CallbackContext {
    sent_state: FlowState,
    exchanger: Arc<dyn TokenExchanger>,
    renderer: Arc<dyn PageRenderer>,
    outcome_tx: tokio::sync::Mutex<Option<oneshot::Sender<Outcome>>>,
    phase: Mutex<ListenerPhase>,
    shutdown: CancellationToken,
    grace: Duration,
}

impl CallbackContext {
    fn set_phase(&self, next: ListenerPhase) {
        let mut phase = lock(&self.phase);
        if *phase != next {
            debug!(from = ?*phase, to = ?next, "Callback listener phase");
            *phase = next;
        }
    }

    fn schedule_shutdown(&self) {
        let shutdown = self.shutdown.clone();
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            shutdown.cancel();
        });
    }
}

/// Builder for the callback listener.
pub struct CallbackListener {
    addr: SocketAddr,
    path: String,
    grace: Duration,
}

impl CallbackListener {
    /// Listener for `path` on `addr`. Port 0 picks a free port; the
    /// configured client never asks for one.
    pub fn new(addr: SocketAddr, path: impl Into<String>) -> Self {
        Self {
            addr,
            path: path.into(),
            grace: Duration::from_secs(crate::types::DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }

    /// How long to keep serving after the outcome is known.
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Bind the socket and start serving.
    pub async fn bind(
        self,
        sent_state: FlowState,
        exchanger: Arc<dyn TokenExchanger>,
        renderer: Arc<dyn PageRenderer>,
    ) -> OneDriveResult<BoundListener> {
        let listen_failed = |message: String| {
            OneDriveError::from(AuthorizationError::ListenerFailed {
                address: self.addr.to_string(),
                message,
            })
        };

        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| listen_failed(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| listen_failed(e.to_string()))?;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let ctx = Arc::new(CallbackContext {
            sent_state,
            exchanger,
            renderer,
            outcome_tx: tokio::sync::Mutex::new(Some(outcome_tx)),
            phase: Mutex::new(ListenerPhase::Idle),
            shutdown: CancellationToken::new(),
            grace: self.grace,
        });

        let router = Router::new()
            .route(&self.path, get(handle_callback))
            .fallback(|| async { StatusCode::NOT_FOUND })
            .with_state(ctx.clone());

        let shutdown = ctx.shutdown.clone();
        let server = axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled_owned().await });
        let server = tokio::spawn(server.into_future());

        ctx.set_phase(ListenerPhase::Listening);
        info!(address = %local_addr, path = %self.path, "Listening for authorization callback");

        Ok(BoundListener {
            ctx,
            local_addr,
            outcome_rx,
            server,
        })
    }
}

/// A running callback listener.
pub struct BoundListener {
    ctx: Arc<CallbackContext>,
    local_addr: SocketAddr,
    outcome_rx: oneshot::Receiver<Outcome>,
    server: JoinHandle<std::io::Result<()>>,
}

impl BoundListener {
    /// Address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn phase(&self) -> ListenerPhase {
        *lock(&self.ctx.phase)
    }

    /// Wait for the callback, then for the listener to close.
    ///
    /// Cancelling `cancel` or running past `timeout` shuts the listener down
    /// at once and fails with `Cancelled` or `TimedOut`.
    pub async fn wait(
        self,
        cancel: CancellationToken,
        timeout: Option<Duration>,
    ) -> OneDriveResult<AuthResult> {
        let BoundListener {
            ctx,
            local_addr,
            outcome_rx,
            mut server,
        } = self;

        let deadline = async {
            match timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut server_exited = false;
        let mut handed_over = false;
        let outcome = tokio::select! {
            received = outcome_rx => {
                handed_over = true;
                received.unwrap_or_else(|_| {
                    Err(AuthorizationError::ListenerFailed {
                        address: local_addr.to_string(),
                        message: "callback handler dropped without an outcome".to_string(),
                    }
                    .into())
                })
            }
            _ = cancel.cancelled() => {
                info!("Authentication cancelled, closing callback listener");
                Err(AuthorizationError::Cancelled.into())
            }
            _ = &mut deadline => {
                let timeout = timeout.unwrap_or_default();
                warn!(?timeout, "No authorization callback received in time");
                Err(AuthorizationError::TimedOut { timeout }.into())
            }
            joined = &mut server => {
                server_exited = true;
                let message = match joined {
                    Ok(Ok(())) => "server stopped before a callback arrived".to_string(),
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => e.to_string(),
                };
                Err(AuthorizationError::ListenerFailed {
                    address: local_addr.to_string(),
                    message,
                }
                .into())
            }
        };

        if !server_exited {
            let limit = if handed_over {
                ctx.grace + CLOSE_SLACK
            } else {
                ctx.shutdown.cancel();
                CLOSE_SLACK
            };
            match tokio::time::timeout(limit, &mut server).await {
                Ok(Ok(Err(e))) => warn!(error = %e, "Callback listener exited with error"),
                Ok(_) => {}
                Err(_) => {
                    warn!("Callback listener did not close in time, aborting");
                    ctx.shutdown.cancel();
                    server.abort();
                }
            }
        }

        ctx.set_phase(ListenerPhase::Closed);
        debug!(address = %local_addr, "Callback listener closed");
        outcome
    }

    /// Shut down without waiting for a callback.
    pub async fn close(self) {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let _ = self.wait(cancel, None).await;
    }
}

async fn handle_callback(
    State(ctx): State<Arc<CallbackContext>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(outcome_tx) = ctx.outcome_tx.lock().await.take() else {
        debug!("Ignoring repeated authorization callback");
        return (StatusCode::CONFLICT, "This sign-in has already been handled.").into_response();
    };

    // Owns the sender so a browser that disconnects mid-exchange cannot drop
    // the outcome along with this handler.
    let task = tokio::spawn(settle(ctx.clone(), query, outcome_tx));
    match task.await {
        Ok((status, page)) => (status, Html(page)).into_response(),
        Err(e) => {
            warn!(error = %e, "Callback processing task failed");
            ctx.schedule_shutdown();
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn settle(
    ctx: Arc<CallbackContext>,
    query: CallbackQuery,
    outcome_tx: oneshot::Sender<Outcome>,
) -> (StatusCode, Vec<u8>) {
    let mut result = AuthResult::from_callback(ctx.sent_state.as_str(), query);
    let (status, outcome) = process(&ctx, &mut result).await;
    let page = ctx.renderer.render(&result);

    let outcome = outcome.map(|()| result);
    if outcome_tx.send(outcome).is_err() {
        debug!("Authentication caller went away before the callback outcome");
    }
    ctx.schedule_shutdown();

    (status, page)
}

async fn process(ctx: &CallbackContext, result: &mut AuthResult) -> (StatusCode, OneDriveResult<()>) {
    if !result.state_matches() {
        ctx.set_phase(ListenerPhase::Rejected);
        warn!("Authorization callback state mismatch");
        let err = AuthorizationError::StateMismatch {
            expected: result.sent_state.clone(),
            received: result.received_state.clone(),
        };
        return (StatusCode::UNAUTHORIZED, Err(err.into()));
    }

    if result.is_provider_error() {
        ctx.set_phase(ListenerPhase::Rejected);
        warn!(error = %result.error, "Authorization server reported an error");
        let err = AuthorizationError::AccessDenied {
            error: result.error.clone(),
            error_description: Some(result.error_description.clone()).filter(|d| !d.is_empty()),
        };
        return (StatusCode::BAD_REQUEST, Err(err.into()));
    }

    if result.code.is_empty() {
        ctx.set_phase(ListenerPhase::Rejected);
        return (
            StatusCode::BAD_REQUEST,
            Err(AuthorizationError::MissingCode.into()),
        );
    }

    ctx.set_phase(ListenerPhase::Exchanging);
    match ctx.exchanger.exchange_code(&result.code).await {
        Ok(token) => {
            info!("Authorization code exchanged for tokens");
            result.token = Some(token);
            (StatusCode::OK, Ok(()))
        }
        Err(e) => {
            warn!(error = %e, "Authorization code exchange failed");
            result.failure = Some(e.to_string());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Err(TokenError::exchange_failed(e).into()),
            )
        }
    }
}
