use axum::extract::State;
use axum::middleware;
use axum::response::Json;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use serde::Serialize;
use tokio::sync::oneshot;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use crate::handlers::{sessions, shares};
use crate::logging::log_responses;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
}

/// Build the axum router with all routes and layers.
///
/// Layer order, outermost first: request id assignment, request id echo,
/// response logging, transport body ceiling.
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.tiers.outer_body_limit()).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/v1/sessions",
            get(sessions::list_sessions).post(sessions::save_session),
        )
        .route("/api/v1/sessions/check", post(sessions::check_sessions))
        .route("/api/v1/sessions/{id}", get(sessions::get_session))
        .route("/api/v1/sessions/{id}/title", patch(sessions::update_title))
        .route(
            "/api/v1/sessions/{id}/shares",
            get(shares::list_shares).post(shares::create_share),
        )
        .route("/api/v1/shares/{share_id}", delete(shares::revoke_share))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), log_responses))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Bind and serve in a background task.
pub async fn start(state: AppState) -> Result<ServerHandle, std::io::Error> {
    let addr = state.config.bind_addr();
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    info!(addr = %local_addr, "confab server started");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "server exited with error");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        shutdown: shutdown_tx,
        server,
    })
}

/// Handle returned by [`start`]; keeps the serve task alive.
pub struct ServerHandle {
    pub port: u16,
    shutdown: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.server.await {
            error!(error = %e, "server task failed");
        }
        info!("confab server stopped");
    }
}
