use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::env;

const FALLBACK_DATABASE_URL: &str = "mysql://localhost:3306/pingdiff";

/// Connections are opened lazily, so the service starts even without a
/// configured store; every query then fails until DATABASE_URL is set.
pub fn establish_connection() -> MySqlPool {
    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
        tracing::warn!("DATABASE_URL not set, store calls will fail until it is configured");
        FALLBACK_DATABASE_URL.to_string()
    });

    MySqlPoolOptions::new()
        .max_connections(5)
        .connect_lazy(&database_url)
        .expect("Invalid DATABASE_URL")
}
