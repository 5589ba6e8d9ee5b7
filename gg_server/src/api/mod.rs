//! HTTP API for the guessing game server.
//!
//! # Modules
//!
//! - [`games`]: Session lifecycle, guesses, event long-poll and results
//! - [`request_id`]: Request correlation middleware
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /health                          - Store health
//! POST /api/v1/games/join               - Create or join a session
//! POST /api/v1/games/{id}/start         - Start the round
//! GET  /api/v1/games/{id}/lobby         - Status and roster
//! GET  /api/v1/games/{id}/state         - Range, current player and roster
//! POST /api/v1/games/{id}/guess         - Submit a guess
//! GET  /api/v1/games/{id}/events/next   - Wait for the next move/over event
//! GET  /api/v1/games/{id}/result        - Winner and target of the last round
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod games;
pub mod request_id;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use guessing_game::GameService;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request (cheap due to Arc wrappers).
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GameService>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(service: GameService) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            service: Arc::new(service),
            shutdown: Arc::new(shutdown),
        }
    }

    /// Release every pending event long-poll
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolves once [`AppState::begin_shutdown`] has been called
    pub fn shutdown_signal(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut receiver = self.shutdown.subscribe();
        async move {
            let _ = receiver.wait_for(|stopping| *stopping).await;
        }
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Arguments
///
/// - `state`: Application state
///
/// # Example
///
/// ```rust,no_run
/// # use gg_server::api::{create_router, AppState};
/// # use guessing_game::{GameService, GameSettings, MemoryGameStore};
/// # use std::sync::Arc;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = GameService::new(Arc::new(MemoryGameStore::new()), GameSettings::default());
/// let app = create_router(AppState::new(service));
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", create_v1_router())
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/games/join", post(games::join_game))
        .route("/games/{game_id}/start", post(games::start_game))
        .route("/games/{game_id}/lobby", get(games::get_lobby))
        .route("/games/{game_id}/state", get(games::get_state))
        .route("/games/{game_id}/guess", post(games::submit_guess))
        .route("/games/{game_id}/events/next", get(games::next_event))
        .route("/games/{game_id}/result", get(games::get_result))
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the store is reachable, or `503 Service Unavailable`
/// otherwise.
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","store":true,"version":"0.1.0","timestamp":"..."}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = state.service.health_check().await.is_ok();

    let status_code = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if store_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
