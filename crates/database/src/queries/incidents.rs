use std::collections::HashMap;

use sqlx::sqlite::SqlitePool;

use crate::data_model::Incident;
use crate::Result;

/// Open incidents affecting one operator.
pub async fn incidents_for_toc(pool: &SqlitePool, toc: &str) -> Result<Vec<Incident>> {
    let incidents = sqlx::query_as(
        "SELECT DISTINCT i.incident_number, i.creation_time, i.planned,
                i.summary, i.description, i.cleared_incident, i.route_affected
            FROM incident_affected_operators ops
            JOIN incidents i ON i.incident_number = ops.incident_number
            WHERE ops.operator_toc = ?",
    )
    .bind(toc)
    .fetch_all(pool)
    .await?;
    Ok(incidents)
}

/// Station display name to TIPLOC, used to scan "routes affected" strings.
pub async fn station_names_to_tiplocs(
    pool: &SqlitePool,
) -> Result<HashMap<String, String>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT s.name, t.tiploc_code
            FROM station s
            JOIN tiploc t ON t.crs_code = s.crs_code",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

/// TIPLOC to station display name for user-facing journey summaries.
pub async fn tiplocs_to_station_names(
    pool: &SqlitePool,
) -> Result<HashMap<String, String>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT t.tiploc_code, s.name
            FROM station s
            JOIN tiploc t ON t.crs_code = s.crs_code",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}
