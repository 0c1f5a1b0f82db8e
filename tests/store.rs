//! Store-backed properties: batch insert counts, server resolution into
//! real rows, id/anonymous-id lookups and the documented absence of dedup.
//!
//! These tests need a disposable MySQL database; point DATABASE_URL at one
//! and run with `cargo test -- --ignored`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use pingdiff_backend::{router, AppState};

const GAME_ID: &str = "11111111-1111-4111-8111-111111111111";
const SERVER_ID: &str = "22222222-2222-4222-8222-222222222222";

async fn connect() -> MySqlPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    MySqlPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect to test database")
}

async fn prepare(pool: &MySqlPool) -> Router {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS games (
            id CHAR(36) PRIMARY KEY,
            name VARCHAR(100) NOT NULL,
            slug VARCHAR(50) NOT NULL UNIQUE,
            icon_url VARCHAR(255) NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS game_servers (
            id CHAR(36) PRIMARY KEY,
            game_id CHAR(36) NOT NULL,
            region VARCHAR(50) NOT NULL,
            location VARCHAR(100) NOT NULL,
            ip_address VARCHAR(45) NOT NULL,
            port INT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS test_results (
            id CHAR(36) PRIMARY KEY,
            game_id CHAR(36) NOT NULL,
            server_id CHAR(36) NULL,
            ping_avg DOUBLE NOT NULL,
            ping_min DOUBLE NULL,
            ping_max DOUBLE NULL,
            jitter DOUBLE NULL,
            packet_loss DOUBLE NOT NULL,
            isp VARCHAR(200) NULL,
            country VARCHAR(100) NULL,
            city VARCHAR(100) NULL,
            ip_hash VARCHAR(64) NULL,
            client_version VARCHAR(20) NULL,
            raw_data JSON NULL,
            created_at DATETIME NULL
        )",
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::query("INSERT IGNORE INTO games (id, name, slug, is_active) VALUES (?, 'Overwatch 2', 'overwatch-2', TRUE)")
        .bind(GAME_ID)
        .execute(pool)
        .await
        .unwrap();

    sqlx::query(
        "INSERT IGNORE INTO game_servers (id, game_id, region, location, ip_address, port, is_active) \
         VALUES (?, ?, 'EU', 'frankfurt', '192.0.2.1', 26503, TRUE)",
    )
    .bind(SERVER_ID)
    .bind(GAME_ID)
    .execute(pool)
    .await
    .unwrap();

    router(Arc::new(AppState::new(pool.clone())))
}

async fn submit(app: &Router, payload: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/results")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn payload(anonymous_id: &str, locations: &[&str]) -> Value {
    let results: Vec<Value> = locations
        .iter()
        .map(|location| {
            json!({
                "server_id": format!("client-{}", location),
                "server_location": location,
                "ping_avg": 42.0,
                "ping_min": 30.0,
                "ping_max": 60.0,
                "jitter": 5.0,
                "packet_loss": 0.0,
                "raw_times": [41.0, 42.0, 43.0]
            })
        })
        .collect();

    json!({
        "game": "overwatch-2",
        "results": results,
        "isp": "Example ISP",
        "country": "Germany",
        "city": "Berlin",
        "client_version": "1.2.0",
        "anonymous_id": anonymous_id
    })
}

#[tokio::test]
#[ignore = "requires a MySQL test store via DATABASE_URL"]
async fn insert_reports_count_and_resolves_known_locations() {
    let pool = connect().await;
    let app = prepare(&pool).await;
    let anonymous_id = Uuid::new_v4().to_string();

    // "Frankfurt" resolves case-insensitively; "Atlantis" is kept with a
    // null server reference instead of failing the batch.
    let (status, body) = submit(&app, &payload(&anonymous_id, &["Frankfurt", "Atlantis"])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);

    let first_id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["url"], format!("/dashboard?result={}", first_id));

    let rows: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT id, server_id FROM test_results \
         WHERE JSON_UNQUOTE(JSON_EXTRACT(raw_data, '$.anonymous_id')) = ?",
    )
    .bind(&anonymous_id)
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|(id, _)| *id == first_id));

    let resolved: Vec<&Option<String>> = rows.iter().map(|(_, server_id)| server_id).collect();
    assert!(resolved.contains(&&Some(SERVER_ID.to_string())));
    assert!(resolved.contains(&&None));
}

#[tokio::test]
#[ignore = "requires a MySQL test store via DATABASE_URL"]
async fn resubmitting_an_identical_payload_creates_new_rows() {
    let pool = connect().await;
    let app = prepare(&pool).await;
    let anonymous_id = Uuid::new_v4().to_string();
    let payload = payload(&anonymous_id, &["Frankfurt"]);

    let (status, first) = submit(&app, &payload).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = submit(&app, &payload).await;
    assert_eq!(status, StatusCode::OK);

    // No dedup key exists; both submissions land as distinct rows.
    assert_ne!(first["id"], second["id"]);

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM test_results \
         WHERE JSON_UNQUOTE(JSON_EXTRACT(raw_data, '$.anonymous_id')) = ?",
    )
    .bind(&anonymous_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
#[ignore = "requires a MySQL test store via DATABASE_URL"]
async fn id_lookup_returns_exactly_the_requested_row() {
    let pool = connect().await;
    let app = prepare(&pool).await;
    let anonymous_id = Uuid::new_v4().to_string();

    let (_, body) = submit(&app, &payload(&anonymous_id, &["Frankfurt"])).await;
    let id = body["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/results?id={}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let rows: Value = serde_json::from_slice(&bytes).unwrap();
    let rows = rows.as_array().unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], id);
    assert_eq!(rows[0]["game_servers"]["location"], "frankfurt");
    assert_eq!(rows[0]["game_servers"]["region"], "EU");
}

#[tokio::test]
#[ignore = "requires a MySQL test store via DATABASE_URL"]
async fn anonymous_id_lookup_respects_the_limit() {
    let pool = connect().await;
    let app = prepare(&pool).await;
    let anonymous_id = Uuid::new_v4().to_string();

    for _ in 0..7 {
        let (status, _) = submit(&app, &payload(&anonymous_id, &["Frankfurt"])).await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/api/results?anonymous_id={}&limit=5",
                    anonymous_id
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let rows: Value = serde_json::from_slice(&bytes).unwrap();
    let rows = rows.as_array().unwrap();

    assert_eq!(rows.len(), 5);
    for row in rows {
        assert_eq!(row["raw_data"]["anonymous_id"], anonymous_id.as_str());
    }
}
