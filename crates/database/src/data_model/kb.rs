use chrono::NaiveDateTime;
use sqlx::prelude::FromRow;

/// A Knowledgebase service incident. `route_affected` is the free-text
/// "routes affected" sentence the incident matcher parses heuristically.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Incident {
    pub incident_number: String,
    pub creation_time: NaiveDateTime,
    pub planned: bool,
    pub summary: String,
    pub description: String,
    pub cleared_incident: bool,
    pub route_affected: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IncidentAffectedOperator {
    pub incident_number: String,
    pub operator_toc: String,
    pub operator_name: String,
}

/// Display name of a station, keyed by CRS.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Station {
    pub crs_code: String,
    pub name: String,
}
