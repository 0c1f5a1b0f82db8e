use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Game {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub icon_url: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}
