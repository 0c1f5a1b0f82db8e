use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::game::Game;
use crate::models::server::{group_by_region, GameServer, ServerEntry};
use crate::validation::DEFAULT_GAME_SLUG;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ServersQuery {
    pub game: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/servers",
    responses(
        (status = 200, description = "Active servers grouped by region"),
        (status = 404, description = "Unknown or inactive game"),
        (status = 500, description = "Store failure")
    )
)]
pub async fn list_servers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ServersQuery>,
) -> Result<Json<BTreeMap<String, Vec<ServerEntry>>>, ApiError> {
    let slug = params
        .game
        .as_deref()
        .filter(|slug| !slug.is_empty())
        .unwrap_or(DEFAULT_GAME_SLUG);

    let game = sqlx::query_as::<_, Game>("SELECT * FROM games WHERE slug = ? AND is_active = 1")
        .bind(slug)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("game lookup failed: {}", e);
            ApiError::Store("Failed to fetch servers")
        })?
        .ok_or(ApiError::NotFound("Game not found"))?;

    let servers = sqlx::query_as::<_, GameServer>(
        "SELECT * FROM game_servers WHERE game_id = ? AND is_active = 1 ORDER BY region, location",
    )
    .bind(&game.id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("failed to fetch servers: {}", e);
        ApiError::Store("Failed to fetch servers")
    })?;

    Ok(Json(group_by_region(servers)))
}
