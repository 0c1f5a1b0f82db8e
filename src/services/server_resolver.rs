use sqlx::MySqlPool;
use std::collections::HashMap;

/// Case-insensitive directory of one game's server locations, loaded once
/// per submission. Clients report display names ("Frankfurt"), the catalog
/// stores them lower-cased or otherwise cased; matching ignores case but is
/// otherwise exact.
pub struct ServerDirectory {
    by_location: HashMap<String, String>,
}

impl ServerDirectory {
    pub async fn load(pool: &MySqlPool, game_id: &str) -> Result<Self, sqlx::Error> {
        let entries: Vec<(String, String)> =
            sqlx::query_as("SELECT id, location FROM game_servers WHERE game_id = ?")
                .bind(game_id)
                .fetch_all(pool)
                .await?;

        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<(String, String)>) -> Self {
        let by_location = entries
            .into_iter()
            .map(|(id, location)| (location.to_lowercase(), id))
            .collect();

        Self { by_location }
    }

    /// Resolves a client-supplied location to a catalog server id. A miss is
    /// not an error; the caller stores a null reference and keeps the
    /// original string in the row's raw_data.
    pub fn resolve(&self, location: &str) -> Option<&str> {
        self.by_location
            .get(&location.to_lowercase())
            .map(String::as_str)
    }
}
