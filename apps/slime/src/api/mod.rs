//! # API Module
//!
//! HTTP surface for a browser front-end.
//!
//! | Method | Path                 | Purpose                               |
//! |--------|----------------------|---------------------------------------|
//! | GET    | `/health`            | liveness, never authenticated         |
//! | GET    | `/state`             | progression state and appearance      |
//! | GET    | `/messages`          | the message log                       |
//! | POST   | `/talk`              | one chat turn (409 while one is busy) |
//! | POST   | `/save`              | write both keys now                   |
//! | POST   | `/reset`             | start over                            |
//! | GET    | `/export/transcript` | plain-text transcript download        |

mod error;
mod handlers;
mod middleware;

pub use error::{ApiError, ErrorBody};
pub use handlers::{StateResponse, TalkRequest, TalkResponse};

use crate::config::{DynStore, ServerConfig};
use crate::orchestrator::Conversation;
use axum::Router;
use axum::routing::{get, post};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub(crate) conversation: Arc<Mutex<Conversation<DynStore>>>,
    pub(crate) server_key: Option<Arc<str>>,
    pub(crate) limiter: Arc<DefaultDirectRateLimiter>,
}

impl AppState {
    pub fn new(
        conversation: Conversation<DynStore>,
        server_key: Option<String>,
        requests_per_second: NonZeroU32,
    ) -> Self {
        Self {
            conversation: Arc::new(Mutex::new(conversation)),
            server_key: server_key.map(Arc::from),
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(requests_per_second))),
        }
    }
}

/// Build the router.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/state", get(handlers::get_state))
        .route("/messages", get(handlers::get_messages))
        .route("/talk", post(handlers::talk))
        .route("/save", post(handlers::save))
        .route("/reset", post(handlers::reset))
        .route("/export/transcript", get(handlers::export_transcript))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_key,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::rate_limit,
                )),
        )
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(
    conversation: Conversation<DynStore>,
    config: ServerConfig,
) -> std::io::Result<()> {
    let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    if config.server_key.is_none() {
        tracing::warn!("no server key configured, API is open to anyone who can reach it");
    }
    let app = create_router(AppState::new(conversation, config.server_key, rps));

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
