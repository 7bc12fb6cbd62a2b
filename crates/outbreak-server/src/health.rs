use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use outbreak_core::round::RoundStatus;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub scheduler_enabled: bool,
    pub round: RoundInfo,
}

#[derive(Serialize)]
pub struct RoundInfo {
    pub status: Option<RoundStatus>,
    pub players: usize,
    pub zombies: usize,
    pub npcs: usize,
}

/// Structured health check endpoint. Reports the round summary when the
/// game service answers, and "degraded" when it does not.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, round) = match state.game.snapshot().await {
        Ok(snapshot) => {
            let npcs = snapshot.npcs.len();
            let round = snapshot.round;
            (
                "healthy",
                RoundInfo {
                    status: round.as_ref().map(|r| r.status),
                    players: round.as_ref().map_or(0, |r| r.player_count),
                    zombies: round.as_ref().map_or(0, |r| r.zombie_count),
                    npcs,
                },
            )
        },
        Err(_) => (
            "degraded",
            RoundInfo {
                status: None,
                players: 0,
                zombies: 0,
                npcs: 0,
            },
        ),
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        scheduler_enabled: state.config.scheduler.enabled,
        round,
    })
}

/// Readiness check: the game service must be accepting commands.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.game.snapshot().await {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready: game service stopped",
        ),
    }
}
