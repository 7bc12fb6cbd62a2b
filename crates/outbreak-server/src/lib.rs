pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod service;
pub mod state;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use config::ServerConfig;
use state::AppState;

pub use service::spawn_tickers;

/// Build the Axum router and application state from a config.
/// Starts the game service; background tickers are left to the caller.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);

    // Admin routes (behind bearer auth middleware)
    let admin_routes = Router::new()
        .route("/npc-tick", post(api::admin_npc_tick))
        .route("/cleanup", post(api::admin_cleanup))
        .route("/reset", post(api::admin_reset))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    let api_routes = Router::new()
        .route("/players", post(api::join_player))
        .route(
            "/players/{player_id}",
            axum::routing::delete(api::disconnect_player),
        )
        .route(
            "/players/{player_id}/position",
            post(api::update_position),
        )
        .route("/round/countdown", post(api::start_countdown))
        .route("/round/countdown/cancel", post(api::cancel_countdown))
        .route("/state", get(api::get_state))
        .nest("/admin", admin_routes);

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api/v1", api_routes)
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}

/// Middleware wrapper that injects AuthConfig into request extensions for the
/// bearer auth middleware.
async fn bearer_auth_layer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut request: axum::extract::Request,
    next: middleware::Next,
) -> Result<axum::response::Response, error::AppError> {
    request.extensions_mut().insert(state.auth.clone());
    auth::bearer_auth_middleware(request, next).await
}
