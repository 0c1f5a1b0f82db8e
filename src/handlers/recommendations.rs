use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::game::Game;
use crate::validation::{FieldIssue, DEFAULT_GAME_SLUG};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    pub isp: Option<String>,
    pub region: Option<String>,
    pub game: Option<String>,
}

// Shape the desktop client expects; all-null means "no community data yet".
#[derive(Debug, Serialize, ToSchema)]
pub struct Recommendation {
    pub best_server: Option<String>,
    pub avg_ping: Option<f64>,
    pub players_tested: i64,
}

pub async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecommendationsQuery>,
) -> Result<Json<Recommendation>, ApiError> {
    let mut issues = Vec::new();
    let isp = params.isp.as_deref().filter(|isp| !isp.is_empty());
    let region = params.region.as_deref().filter(|region| !region.is_empty());

    if isp.is_none() {
        issues.push(FieldIssue::new("isp", "is required"));
    }
    if region.is_none() {
        issues.push(FieldIssue::new("region", "is required"));
    }
    if !issues.is_empty() {
        return Err(ApiError::Validation(issues));
    }
    let (isp, region) = (isp.unwrap_or_default(), region.unwrap_or_default());

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
            ApiError::Store("Failed to fetch recommendations")
        })?
        .ok_or(ApiError::NotFound("Game not found"))?;

    let best: Option<(String, Option<f64>)> = sqlx::query_as(
        "SELECT gs.location, AVG(tr.ping_avg) AS avg_ping \
         FROM test_results tr \
         JOIN game_servers gs ON gs.id = tr.server_id \
         WHERE tr.game_id = ? AND gs.region = ? AND tr.isp = ? \
         GROUP BY gs.id, gs.location \
         ORDER BY avg_ping ASC \
         LIMIT 1",
    )
    .bind(&game.id)
    .bind(region)
    .bind(isp)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("failed to aggregate recommendations: {}", e);
        ApiError::Store("Failed to fetch recommendations")
    })?;

    let players_tested: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT JSON_UNQUOTE(JSON_EXTRACT(tr.raw_data, '$.anonymous_id'))) \
         FROM test_results tr \
         JOIN game_servers gs ON gs.id = tr.server_id \
         WHERE tr.game_id = ? AND gs.region = ? AND tr.isp = ?",
    )
    .bind(&game.id)
    .bind(region)
    .bind(isp)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("failed to count tested players: {}", e);
        ApiError::Store("Failed to fetch recommendations")
    })?;

    let (best_server, avg_ping) = match best {
        Some((location, avg)) => (Some(location), avg),
        None => (None, None),
    };

    Ok(Json(Recommendation {
        best_server,
        avg_ping,
        players_tested,
    }))
}
