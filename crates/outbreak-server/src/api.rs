use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use outbreak_core::WorldSnapshot;
use outbreak_core::coordinator::{JoinOutcome, ResetReport};
use outbreak_core::player::PlayerId;
use outbreak_core::steering::TickReport;
use outbreak_core::time::Timestamp;

use crate::error::AppError;
use crate::state::AppState;

/// Longest client-supplied connection id accepted.
const MAX_CONNECTION_ID_LEN: usize = 128;

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub username: String,
    #[serde(default)]
    pub connection_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    pub infected: Vec<PlayerId>,
}

/// Body of the host-only round routes.
#[derive(Debug, Deserialize)]
pub struct HostRequest {
    pub player_id: PlayerId,
}

#[derive(Debug, Serialize)]
pub struct CountdownResponse {
    pub countdown_end: Timestamp,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub evicted: Vec<PlayerId>,
}

/// POST /api/v1/players: join the lobby (or a running round, as a human).
pub async fn join_player(
    State(state): State<AppState>,
    Json(body): Json<JoinRequest>,
) -> Result<(StatusCode, Json<JoinOutcome>), AppError> {
    let connection_id = match body.connection_id {
        Some(id) if id.is_empty() || id.len() > MAX_CONNECTION_ID_LEN => {
            return Err(AppError::BadRequest(format!(
                "connection_id must be 1-{MAX_CONNECTION_ID_LEN} chars"
            )));
        },
        Some(id) => id,
        None => uuid::Uuid::new_v4().to_string(),
    };
    let outcome = state.game.join(body.username, connection_id).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/v1/players/{player_id}/position
pub async fn update_position(
    State(state): State<AppState>,
    Path(player_id): Path<PlayerId>,
    Json(body): Json<PositionRequest>,
) -> Result<Json<PositionResponse>, AppError> {
    if !body.x.is_finite() || !body.y.is_finite() {
        return Err(AppError::BadRequest("position must be finite".to_string()));
    }
    let infected = state.game.update_position(player_id, body.x, body.y).await?;
    Ok(Json(PositionResponse { infected }))
}

/// DELETE /api/v1/players/{player_id}
pub async fn disconnect_player(
    State(state): State<AppState>,
    Path(player_id): Path<PlayerId>,
) -> Result<StatusCode, AppError> {
    state.game.disconnect(player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/round/countdown
pub async fn start_countdown(
    State(state): State<AppState>,
    Json(body): Json<HostRequest>,
) -> Result<Json<CountdownResponse>, AppError> {
    let countdown_end = state.game.start_countdown(body.player_id).await?;
    Ok(Json(CountdownResponse { countdown_end }))
}

/// POST /api/v1/round/countdown/cancel
pub async fn cancel_countdown(
    State(state): State<AppState>,
    Json(body): Json<HostRequest>,
) -> Result<StatusCode, AppError> {
    state.game.cancel_countdown(body.player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/state
pub async fn get_state(State(state): State<AppState>) -> Result<Json<WorldSnapshot>, AppError> {
    Ok(Json(state.game.snapshot().await?))
}

/// POST /api/v1/admin/npc-tick: drive the NPCs from an external scheduler.
pub async fn admin_npc_tick(State(state): State<AppState>) -> Result<Json<TickReport>, AppError> {
    Ok(Json(state.game.npc_tick().await?))
}

/// POST /api/v1/admin/cleanup
pub async fn admin_cleanup(
    State(state): State<AppState>,
) -> Result<Json<CleanupResponse>, AppError> {
    let evicted = state.game.cleanup().await?;
    Ok(Json(CleanupResponse { evicted }))
}

/// POST /api/v1/admin/reset: wipe players, NPCs and the round.
pub async fn admin_reset(State(state): State<AppState>) -> Result<Json<ResetReport>, AppError> {
    Ok(Json(state.game.admin_reset().await?))
}
