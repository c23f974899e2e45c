use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Sqlite};

use super::{push_in_list, IN_LIST_MAX};
use crate::data_model::{date_to_sql, TimetableLink, TimetableLocation, TrainTimetable};
use crate::Result;

fn weekday_column(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Outgoing edges of the adjacency graph for a set of locations, one
/// IN-list query per chunk.
pub async fn links_from(
    pool: &SqlitePool,
    from_locations: &[String],
) -> Result<Vec<TimetableLink>> {
    let mut links = Vec::new();
    for chunk in from_locations.chunks(IN_LIST_MAX) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT from_location, to_location
                FROM timetable_link WHERE from_location IN (",
        );
        push_in_list(&mut builder, chunk);
        builder.push(")");
        links.extend(
            builder
                .build_query_as::<TimetableLink>()
                .fetch_all(pool)
                .await?,
        );
    }
    Ok(links)
}

/// Every stop at one of the given locations made by a service that runs on
/// the requested date (validity window and weekday bit checked in SQL).
pub async fn stops_at_locations(
    pool: &SqlitePool,
    locations: &[String],
    date: NaiveDate,
) -> Result<Vec<TimetableLocation>> {
    let date_sql = date_to_sql(date);
    let mut stops = Vec::new();
    for chunk in locations.chunks(IN_LIST_MAX) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT tl.train_uid, tl.train_route_index, tl.location_type,
                    tl.location, tl.scheduled_arrival_time,
                    tl.scheduled_departure_time, tl.public_arrival,
                    tl.public_departure, tl.platform, tl.line, tl.path,
                    tl.activity, tl.engineering_allowance,
                    tl.pathing_allowance, tl.performance_allowance
                FROM timetable_location tl
                JOIN train_timetable tt ON tt.train_uid = tl.train_uid
                WHERE tl.location IN (",
        );
        push_in_list(&mut builder, chunk);
        builder
            .push(") AND ")
            .push_bind(date_sql)
            .push(" >= tt.date_runs_from AND ")
            .push_bind(date_sql)
            .push(" <= tt.date_runs_to AND tt.")
            .push(weekday_column(date.weekday()))
            .push(" = 1");
        stops.extend(
            builder
                .build_query_as::<TimetableLocation>()
                .fetch_all(pool)
                .await?,
        );
    }
    Ok(stops)
}

pub async fn train_timetable(
    pool: &SqlitePool,
    train_uid: &str,
) -> Result<Option<TrainTimetable>> {
    let train = sqlx::query_as(
        "SELECT train_uid, date_runs_from, date_runs_to, monday, tuesday,
                wednesday, thursday, friday, saturday, sunday,
                bank_holiday_running, rsid, toc
            FROM train_timetable WHERE train_uid = ?",
    )
    .bind(train_uid)
    .fetch_optional(pool)
    .await?;
    Ok(train)
}

/// CRS to TIPLOC lookup. Where several TIPLOCs share a CRS an arbitrary
/// one wins, which is what the routing layer expects.
pub async fn crs_to_tiploc(
    pool: &SqlitePool,
    crs_codes: &[String],
) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for chunk in crs_codes.chunks(IN_LIST_MAX) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT crs_code, tiploc_code FROM tiploc WHERE crs_code IN (",
        );
        push_in_list(&mut builder, chunk);
        builder.push(")");
        let rows: Vec<(String, String)> =
            builder.build_query_as().fetch_all(pool).await?;
        map.extend(rows);
    }
    Ok(map)
}

/// Rebuilds `timetable_link` from consecutive stop pairs. Run by the
/// timetable feed after its rows land.
pub async fn precompute_links(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "INSERT INTO timetable_link (from_location, to_location)
            SELECT DISTINCT a.location, b.location
            FROM timetable_location a
            JOIN timetable_location b
                ON b.train_uid = a.train_uid
                AND b.train_route_index = a.train_route_index + 1",
    )
    .execute(pool)
    .await?;
    Ok(())
}
