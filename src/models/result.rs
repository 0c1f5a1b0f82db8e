use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A submission that passed validation, with every optional field defaulted.
#[derive(Debug, Clone)]
pub struct Submission {
    pub game: String,
    pub results: Vec<PingResult>,
    pub isp: String,
    pub country: String,
    pub city: String,
    pub ip_hash: String,
    pub client_version: String,
    pub anonymous_id: String,
}

#[derive(Debug, Clone)]
pub struct PingResult {
    pub server_id: String,
    pub server_location: String,
    pub ping_avg: f64,
    pub ping_min: f64,
    pub ping_max: f64,
    pub jitter: f64,
    pub packet_loss: f64,
    pub raw_times: Vec<f64>,
}

/// Free-form attachment stored beside each row. Keeps the raw samples and
/// the client's own server identifiers so an unresolved location can still
/// be traced back later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawData {
    pub raw_times: Vec<f64>,
    pub anonymous_id: String,
    pub server_id: String,
    pub server_location: String,
}

/// One `test_results` row joined with its server's display fields.
#[derive(Debug, FromRow)]
pub struct ResultRow {
    pub id: String,
    pub game_id: String,
    pub server_id: Option<String>,
    pub ping_avg: f64,
    pub ping_min: Option<f64>,
    pub ping_max: Option<f64>,
    pub jitter: Option<f64>,
    pub packet_loss: f64,
    pub isp: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub ip_hash: Option<String>,
    pub client_version: Option<String>,
    pub raw_data: Option<Json<serde_json::Value>>,
    pub created_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinedServer {
    pub location: String,
    pub region: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResultResponse {
    pub id: String,
    pub game_id: String,
    pub server_id: Option<String>,
    pub ping_avg: f64,
    pub ping_min: Option<f64>,
    pub ping_max: Option<f64>,
    pub jitter: Option<f64>,
    pub packet_loss: f64,
    pub isp: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub ip_hash: Option<String>,
    pub client_version: Option<String>,
    #[schema(value_type = Object)]
    pub raw_data: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub game_servers: Option<JoinedServer>,
}

impl From<ResultRow> for ResultResponse {
    fn from(row: ResultRow) -> Self {
        // A null server_id leaves the join empty on both columns.
        let game_servers = match (row.location, row.region) {
            (Some(location), Some(region)) => Some(JoinedServer { location, region }),
            _ => None,
        };

        Self {
            id: row.id,
            game_id: row.game_id,
            server_id: row.server_id,
            ping_avg: row.ping_avg,
            ping_min: row.ping_min,
            ping_max: row.ping_max,
            jitter: row.jitter,
            packet_loss: row.packet_loss,
            isp: row.isp,
            country: row.country,
            city: row.city,
            ip_hash: row.ip_hash,
            client_version: row.client_version,
            raw_data: row.raw_data.map(|json| json.0),
            created_at: row.created_at,
            game_servers,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResponse {
    pub success: bool,
    pub id: String,
    pub url: String,
    pub count: usize,
}
