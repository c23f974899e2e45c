use std::collections::HashSet;

use sqlx::sqlite::SqlitePool;

use crate::Result;

/// Feed identities whose recorded expiry is still in the future. Feeds
/// missing from this set are due for a refresh.
pub async fn unexpired_api_urls(pool: &SqlitePool, now: i64) -> Result<HashSet<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT api_url FROM expiry_times WHERE ? < expiry_timestamp")
            .bind(now)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(api_url,)| api_url).collect())
}

pub async fn set_expiry(pool: &SqlitePool, api_url: &str, expiry: i64) -> Result<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO expiry_times (api_url, expiry_timestamp)
            VALUES (?, ?)",
    )
    .bind(api_url)
    .bind(expiry)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn expiry_for(pool: &SqlitePool, api_url: &str) -> Result<Option<i64>> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT expiry_timestamp FROM expiry_times WHERE api_url = ?")
            .bind(api_url)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(expiry,)| expiry))
}
