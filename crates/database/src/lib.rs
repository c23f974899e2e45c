use std::path::Path;
use std::str::FromStr;
use std::{error, fmt, result};

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteSynchronous,
};

pub mod data_model;
pub mod queries;

pub use data_model::{Record, RecordSet, Table};

#[derive(Debug)]
pub enum DatabaseError {
    Sqlx(sqlx::Error),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DatabaseError::Sqlx(e) => write!(f, "database error: {}", e),
        }
    }
}

impl error::Error for DatabaseError {}

impl From<sqlx::Error> for DatabaseError {
    fn from(e: sqlx::Error) -> Self {
        DatabaseError::Sqlx(e)
    }
}

pub type Result<T> = result::Result<T, DatabaseError>;

/// The statements run on every open. Tables carry no constraints of their
/// own; the feed pipeline replaces their contents wholesale, so indexes
/// cover the read patterns instead.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS location_record (
        crs_code TEXT NOT NULL,
        ncl_code TEXT NOT NULL,
        uic_code TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_location_record_crs
        ON location_record (crs_code)",
    "CREATE INDEX IF NOT EXISTS idx_location_record_ncl
        ON location_record (ncl_code)",
    "CREATE TABLE IF NOT EXISTS station_cluster (
        cluster_id TEXT NOT NULL,
        location_nlc TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_station_cluster_id
        ON station_cluster (cluster_id)",
    "CREATE INDEX IF NOT EXISTS idx_station_cluster_nlc
        ON station_cluster (location_nlc)",
    "CREATE TABLE IF NOT EXISTS flow_record (
        flow_id INTEGER NOT NULL,
        origin_code TEXT NOT NULL,
        destination_code TEXT NOT NULL,
        direction TEXT NOT NULL,
        toc TEXT NOT NULL,
        start_date INTEGER NOT NULL,
        end_date INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_flow_record_id ON flow_record (flow_id)",
    "CREATE INDEX IF NOT EXISTS idx_flow_record_origin
        ON flow_record (origin_code)",
    "CREATE INDEX IF NOT EXISTS idx_flow_record_destination
        ON flow_record (destination_code)",
    "CREATE TABLE IF NOT EXISTS fare_record (
        flow_id INTEGER NOT NULL,
        ticket_code TEXT NOT NULL,
        fare INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_fare_record_flow ON fare_record (flow_id)",
    "CREATE TABLE IF NOT EXISTS ticket_type (
        ticket_code TEXT NOT NULL,
        description TEXT NOT NULL,
        tkt_class INTEGER NOT NULL,
        tkt_type TEXT NOT NULL,
        tkt_group TEXT NOT NULL,
        max_passengers INTEGER NOT NULL,
        min_passengers INTEGER NOT NULL,
        max_adults INTEGER NOT NULL,
        min_adults INTEGER NOT NULL,
        max_children INTEGER NOT NULL,
        min_children INTEGER NOT NULL,
        restricted_by_date INTEGER NOT NULL,
        restricted_by_train INTEGER NOT NULL,
        restricted_by_area INTEGER NOT NULL,
        validity_code TEXT NOT NULL,
        reservation_required TEXT NOT NULL,
        capri_code TEXT NOT NULL,
        uts_code TEXT NOT NULL,
        time_restriction INTEGER NOT NULL,
        free_pass_lul INTEGER NOT NULL,
        package_mkr TEXT NOT NULL,
        fare_multiplier INTEGER NOT NULL,
        discount_category TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_ticket_type_code
        ON ticket_type (ticket_code)",
    "CREATE TABLE IF NOT EXISTS train_timetable (
        train_uid TEXT NOT NULL,
        date_runs_from INTEGER NOT NULL,
        date_runs_to INTEGER NOT NULL,
        monday INTEGER NOT NULL,
        tuesday INTEGER NOT NULL,
        wednesday INTEGER NOT NULL,
        thursday INTEGER NOT NULL,
        friday INTEGER NOT NULL,
        saturday INTEGER NOT NULL,
        sunday INTEGER NOT NULL,
        bank_holiday_running INTEGER NOT NULL,
        rsid TEXT NOT NULL,
        toc TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_train_timetable_uid
        ON train_timetable (train_uid)",
    "CREATE TABLE IF NOT EXISTS timetable_location (
        train_uid TEXT NOT NULL,
        train_route_index INTEGER NOT NULL,
        location_type TEXT NOT NULL,
        location TEXT NOT NULL,
        scheduled_arrival_time INTEGER,
        scheduled_departure_time INTEGER,
        public_arrival TEXT,
        public_departure TEXT,
        platform TEXT NOT NULL,
        line TEXT NOT NULL,
        path TEXT NOT NULL,
        activity TEXT NOT NULL,
        engineering_allowance TEXT NOT NULL,
        pathing_allowance TEXT NOT NULL,
        performance_allowance TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_timetable_location_uid
        ON timetable_location (train_uid, train_route_index)",
    "CREATE INDEX IF NOT EXISTS idx_timetable_location_location
        ON timetable_location (location)",
    "CREATE TABLE IF NOT EXISTS timetable_link (
        from_location TEXT NOT NULL,
        to_location TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_timetable_link_from
        ON timetable_link (from_location)",
    "CREATE TABLE IF NOT EXISTS tiploc (
        tiploc_code TEXT NOT NULL,
        crs_code TEXT NOT NULL,
        description TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_tiploc_code ON tiploc (tiploc_code)",
    "CREATE INDEX IF NOT EXISTS idx_tiploc_crs ON tiploc (crs_code)",
    "CREATE TABLE IF NOT EXISTS incidents (
        incident_number TEXT NOT NULL,
        creation_time TEXT NOT NULL,
        planned INTEGER NOT NULL,
        summary TEXT NOT NULL,
        description TEXT NOT NULL,
        cleared_incident INTEGER NOT NULL,
        route_affected TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_incidents_number
        ON incidents (incident_number)",
    "CREATE TABLE IF NOT EXISTS incident_affected_operators (
        incident_number TEXT NOT NULL,
        operator_toc TEXT NOT NULL,
        operator_name TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_incident_operators_toc
        ON incident_affected_operators (operator_toc)",
    "CREATE TABLE IF NOT EXISTS station (
        crs_code TEXT NOT NULL,
        name TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_station_crs ON station (crs_code)",
    "CREATE TABLE IF NOT EXISTS expiry_times (
        api_url TEXT PRIMARY KEY,
        expiry_timestamp INTEGER NOT NULL
    )",
];

/// Handle on the SQLite knowledge store. Cheap to clone; all clones share
/// one connection pool. During an ingest only the orchestrator task writes,
/// readers go through the same pool under WAL.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if absent) the store at the given path and makes
    /// sure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("cache_size", "100000");
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// An in-memory store, used by tests. Limited to a single connection
    /// as every SQLite memory database is private to its connection.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Deletes every row a feed owns before its replacement rows arrive.
    pub async fn wipe(&self, table: Table) -> Result<()> {
        log::debug!("wiping table {}", table.table_name());
        sqlx::query(&format!("DELETE FROM {}", table.table_name()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bulk-inserts a batch of parsed records inside one transaction.
    pub async fn insert_records(&self, records: RecordSet) -> Result<()> {
        queries::insert::insert_record_set(&self.pool, &records).await
    }
}
