//! HTTP surface of a node.
//!
//! Client routes `POST /request_challenge` and `POST /authenticate` drive a full round
//! with this node as leader. Peers call `POST /internal/{operation}`. Every failure
//! answers with an [`ErrorBody`].

/// Node configuration.
pub mod config;
/// Token bucket for the client routes.
pub mod rate_limit;
/// JSON-over-HTTP peer transport.
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{debug, error, info};

pub use config::{MetricsSettings, RateLimitSettings, ServerConfig};
pub use rate_limit::RateLimiter;
pub use transport::HttpTransport;

use crate::coordinator::{
    AuthenticateRequest, AuthenticationResult, ChallengeGrant, Coordinator, Dispatcher,
    ErrorBody, Operation, PeerRequest, PeerResponse, PeerService, SessionStore,
};
use crate::primitives::ShareSource;
use crate::protocol::{AuthenticationContext, ClientInit, ServerSecret};
use crate::{Error, ErrorKind, Result};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// The in-process peer service.
    pub fn service(&self) -> &Arc<PeerService> {
        self.coordinator.local()
    }
}

/// Wires a node for one group: store, service, HTTP transport and coordinator.
pub fn build_node(
    config: &ServerConfig,
    context: AuthenticationContext,
    secret: ServerSecret,
    shares: Arc<dyn ShareSource>,
) -> Result<AppState> {
    let peers = config.peer_urls(context.server_count())?;
    let service = PeerService::new(SessionStore::new(config.store_config()), shares)
        .with_group(context, secret)?;
    let transport = HttpTransport::new(peers, config.rpc_timeout())?;
    let dispatcher = Dispatcher::new(
        Arc::new(service),
        Arc::new(transport),
        config.rpc_timeout(),
    );

    Ok(AppState {
        coordinator: Coordinator::new(dispatcher),
        rate_limiter: RateLimiter::from_config(&config.rate_limit),
    })
}

/// Builds the router of a node.
///
/// Client routes are rate limited per peer address, so the router must be served
/// with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/request_challenge", post(request_challenge))
        .route("/authenticate", post(authenticate))
        .route("/internal/{operation}", post(internal))
        .route("/health", get(health))
        .with_state(state)
}

async fn request_challenge(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<Json<ChallengeGrant>> {
    state.rate_limiter.check(addr.ip()).await?;
    let client_data: ClientInit = serde_json::from_slice(&body)?;
    Ok(Json(state.coordinator.request_challenge(client_data).await?))
}

async fn authenticate(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<Json<AuthenticationResult>> {
    state.rate_limiter.check(addr.ip()).await?;
    let request: AuthenticateRequest = serde_json::from_slice(&body)?;
    Ok(Json(state.coordinator.authenticate(request).await?))
}

async fn internal(
    State(state): State<AppState>,
    Path(operation): Path<String>,
    body: Bytes,
) -> Result<PeerResponse> {
    let op = Operation::from_name(&operation)
        .ok_or_else(|| Error::InvalidRequest(format!("Unknown operation '{operation}'")))?;
    let request = PeerRequest::decode(op, &body)?;
    debug!(operation = %op, auth_id = %request.auth_id(), "Peer request received");
    state.service().handle(request).await
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let service = state.service();
    let groups: Vec<String> = service.group_ids().map(ToString::to_string).collect();
    Json(json!({
        "status": "ok",
        "groups": groups,
        "sessions": service.store().session_count().await,
        "bindings": service.store().binding_count().await,
    }))
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::UnknownSession | ErrorKind::UnknownGroup => StatusCode::NOT_FOUND,
        ErrorKind::DuplicateSession | ErrorKind::DuplicateTag | ErrorKind::InvalidState => {
            StatusCode::CONFLICT
        }
        ErrorKind::InvalidSignature | ErrorKind::AuthenticationFailed => StatusCode::UNAUTHORIZED,
        ErrorKind::SessionExpired => StatusCode::GONE,
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::PeerUnreachable | ErrorKind::PeerProtocolError => StatusCode::BAD_GATEWAY,
        ErrorKind::CapacityExceeded => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::Internal => {
                // Log detailed error server-side, return generic message to caller
                error!(error = %self, "Internal server error");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status_for(kind), Json(ErrorBody { error: kind, message })).into_response()
    }
}

impl IntoResponse for PeerResponse {
    fn into_response(self) -> Response {
        match self.to_json() {
            Ok(body) => ([(CONTENT_TYPE, "application/json")], body).into_response(),
            Err(e) => e.into_response(),
        }
    }
}

/// Periodically evicts expired sessions, restarting the sweep if it ever stops.
pub fn spawn_session_sweeper(service: Arc<PeerService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let service = service.clone();
            let sweep = tokio::spawn(async move {
                let mut ticker = time::interval(interval);
                loop {
                    ticker.tick().await;
                    let evicted = service.store().evict_expired().await;
                    if evicted > 0 {
                        info!(evicted, "Evicted expired sessions");
                    }
                }
            });

            match sweep.await {
                Ok(()) => error!("Session sweeper terminated unexpectedly, restarting..."),
                Err(e) => error!("Session sweeper panicked: {e:?}, restarting..."),
            }

            time::sleep(Duration::from_secs(5)).await;
        }
    })
}
