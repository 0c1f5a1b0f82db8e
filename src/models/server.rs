use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use utoipa::ToSchema;

pub const DEFAULT_SERVER_PORT: i32 = 26503;

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct GameServer {
    pub id: String,
    pub game_id: String,
    pub region: String,
    pub location: String,
    pub ip_address: String,
    pub port: Option<i32>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

// What the desktop client consumes per server when it builds its test list.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServerEntry {
    pub id: String,
    pub location: String,
    pub ip: String,
    pub port: i32,
}

/// Groups servers by region name. Regions sort alphabetically through the
/// map; locations keep the order the catalog query produced.
pub fn group_by_region(servers: Vec<GameServer>) -> BTreeMap<String, Vec<ServerEntry>> {
    let mut by_region: BTreeMap<String, Vec<ServerEntry>> = BTreeMap::new();

    for server in servers {
        by_region.entry(server.region).or_default().push(ServerEntry {
            id: server.id,
            location: server.location,
            ip: server.ip_address,
            port: server.port.unwrap_or(DEFAULT_SERVER_PORT),
        });
    }

    by_region
}
