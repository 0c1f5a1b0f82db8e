use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::game::Game;
use crate::models::result::{RawData, ResultResponse, ResultRow, SubmitResponse};
use crate::services::server_resolver::ServerDirectory;
use crate::validation::{
    clamp_limit, is_canonical_result_id, truncate_anonymous_id, validate_submission, FieldIssue,
};
use crate::AppState;

const RESULTS_SELECT: &str = "SELECT tr.id, tr.game_id, tr.server_id, tr.ping_avg, tr.ping_min, \
    tr.ping_max, tr.jitter, tr.packet_loss, tr.isp, tr.country, tr.city, tr.ip_hash, \
    tr.client_version, tr.raw_data, tr.created_at, gs.location, gs.region \
    FROM test_results tr LEFT JOIN game_servers gs ON gs.id = tr.server_id";

struct NewResult {
    id: String,
    game_id: String,
    server_id: Option<String>,
    ping_avg: f64,
    ping_min: f64,
    ping_max: f64,
    jitter: f64,
    packet_loss: f64,
    isp: String,
    country: String,
    city: String,
    ip_hash: String,
    client_version: String,
    raw_data: sqlx::types::Json<RawData>,
}

#[utoipa::path(
    post,
    path = "/api/results",
    responses(
        (status = 200, description = "Results stored", body = SubmitResponse),
        (status = 400, description = "Malformed body or validation failure"),
        (status = 404, description = "Unknown or inactive game"),
        (status = 429, description = "Rate limited"),
        (status = 500, description = "Store failure")
    )
)]
pub async fn submit_results(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    // The body must at least parse as JSON before field checks start.
    let Json(body) = body.map_err(|_| ApiError::MalformedRequest)?;

    let submission = validate_submission(&body).map_err(ApiError::Validation)?;

    let game = sqlx::query_as::<_, Game>("SELECT * FROM games WHERE slug = ? AND is_active = 1")
        .bind(&submission.game)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("game lookup failed: {}", e);
            ApiError::Store("Failed to save results")
        })?
        .ok_or(ApiError::NotFound("Game not found"))?;

    let directory = ServerDirectory::load(&state.db, &game.id)
        .await
        .map_err(|e| {
            tracing::error!("server directory load failed: {}", e);
            ApiError::Store("Failed to save results")
        })?;

    let created_at = Utc::now();
    let rows: Vec<NewResult> = submission
        .results
        .iter()
        .map(|result| NewResult {
            id: Uuid::new_v4().to_string(),
            game_id: game.id.clone(),
            // A miss degrades to a null reference; the raw_data attachment
            // below keeps the client's own identifiers for later diagnosis.
            server_id: directory
                .resolve(&result.server_location)
                .map(str::to_string),
            ping_avg: result.ping_avg,
            ping_min: result.ping_min,
            ping_max: result.ping_max,
            jitter: result.jitter,
            packet_loss: result.packet_loss,
            isp: submission.isp.clone(),
            country: submission.country.clone(),
            city: submission.city.clone(),
            ip_hash: submission.ip_hash.clone(),
            client_version: submission.client_version.clone(),
            raw_data: sqlx::types::Json(RawData {
                raw_times: result.raw_times.clone(),
                anonymous_id: submission.anonymous_id.clone(),
                server_id: result.server_id.clone(),
                server_location: result.server_location.clone(),
            }),
        })
        .collect();

    let first_id = rows.first().map(|row| row.id.clone()).unwrap_or_default();
    let count = rows.len();

    // One multi-row statement, so the batch lands atomically.
    let mut builder = sqlx::QueryBuilder::<sqlx::MySql>::new(
        "INSERT INTO test_results (id, game_id, server_id, ping_avg, ping_min, ping_max, \
         jitter, packet_loss, isp, country, city, ip_hash, client_version, raw_data, created_at) ",
    );
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.id)
            .push_bind(row.game_id)
            .push_bind(row.server_id)
            .push_bind(row.ping_avg)
            .push_bind(row.ping_min)
            .push_bind(row.ping_max)
            .push_bind(row.jitter)
            .push_bind(row.packet_loss)
            .push_bind(row.isp)
            .push_bind(row.country)
            .push_bind(row.city)
            .push_bind(row.ip_hash)
            .push_bind(row.client_version)
            .push_bind(row.raw_data)
            .push_bind(created_at);
    });

    builder.build().execute(&state.db).await.map_err(|e| {
        tracing::error!("failed to insert results: {}", e);
        ApiError::Store("Failed to save results")
    })?;

    Ok(Json(SubmitResponse {
        success: true,
        url: format!("/dashboard?result={}", first_id),
        id: first_id,
        count,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub id: Option<String>,
    pub anonymous_id: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_results(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResultsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let fetched = if let Some(id) = params.id.as_deref().filter(|id| !id.is_empty()) {
        // Reject bad ids before the store sees them.
        if !is_canonical_result_id(id) {
            return Err(ApiError::Validation(vec![FieldIssue::new(
                "id",
                "must be a result id in canonical form",
            )]));
        }

        let sql = format!("{} WHERE tr.id = ?", RESULTS_SELECT);
        sqlx::query_as::<_, ResultRow>(&sql)
            .bind(id)
            .fetch_all(&state.db)
            .await
    } else if let Some(anonymous_id) = params
        .anonymous_id
        .as_deref()
        .filter(|id| !id.is_empty())
    {
        let sql = format!(
            "{} WHERE JSON_UNQUOTE(JSON_EXTRACT(tr.raw_data, '$.anonymous_id')) = ? \
             ORDER BY tr.created_at DESC LIMIT ?",
            RESULTS_SELECT
        );
        sqlx::query_as::<_, ResultRow>(&sql)
            .bind(truncate_anonymous_id(anonymous_id))
            .bind(clamp_limit(params.limit))
            .fetch_all(&state.db)
            .await
    } else {
        let sql = format!("{} ORDER BY tr.created_at DESC LIMIT ?", RESULTS_SELECT);
        sqlx::query_as::<_, ResultRow>(&sql)
            .bind(clamp_limit(params.limit))
            .fetch_all(&state.db)
            .await
    };

    let rows: Vec<ResultRow> = fetched.map_err(|e| {
        tracing::error!("failed to fetch results: {}", e);
        ApiError::Store("Failed to fetch results")
    })?;

    let results: Vec<ResultResponse> = rows.into_iter().map(ResultResponse::from).collect();

    // The dashboard polls this endpoint; let intermediaries cache briefly.
    Ok((
        [(
            header::CACHE_CONTROL,
            "public, max-age=60, stale-while-revalidate=300",
        )],
        Json(results),
    ))
}
