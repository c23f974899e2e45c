use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::data_model::{
    FareRecord, FlowRecord, Incident, IncidentAffectedOperator, LocationRecord,
    RecordSet, Station, StationCluster, TicketType, TimetableLink,
    TimetableLocation, Tiploc, TrainTimetable,
};
use crate::Result;

/// SQLite's bound-parameter ceiling; multi-row inserts are chunked so that
/// `columns * rows` stays below it.
const BULK_INSERT_MAX: usize = 999;

/// Writes a whole record set in one transaction. Row order within each
/// table is preserved, so file order survives into the store.
pub async fn insert_record_set(pool: &SqlitePool, records: &RecordSet) -> Result<()> {
    let mut tx = pool.begin().await?;
    insert_locations(&mut tx, &records.locations).await?;
    insert_station_clusters(&mut tx, &records.station_clusters).await?;
    insert_flows(&mut tx, &records.flows).await?;
    insert_fares(&mut tx, &records.fares).await?;
    insert_ticket_types(&mut tx, &records.ticket_types).await?;
    insert_train_timetables(&mut tx, &records.train_timetables).await?;
    insert_timetable_locations(&mut tx, &records.timetable_locations).await?;
    insert_timetable_links(&mut tx, &records.timetable_links).await?;
    insert_tiplocs(&mut tx, &records.tiplocs).await?;
    insert_incidents(&mut tx, &records.incidents).await?;
    insert_incident_operators(&mut tx, &records.incident_operators).await?;
    insert_stations(&mut tx, &records.stations).await?;
    tx.commit().await?;
    Ok(())
}

async fn insert_locations(
    conn: &mut SqliteConnection,
    rows: &[LocationRecord],
) -> Result<()> {
    for chunk in rows.chunks(BULK_INSERT_MAX / 3) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO location_record (crs_code, ncl_code, uic_code) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.crs_code)
                .push_bind(&row.ncl_code)
                .push_bind(&row.uic_code);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_station_clusters(
    conn: &mut SqliteConnection,
    rows: &[StationCluster],
) -> Result<()> {
    for chunk in rows.chunks(BULK_INSERT_MAX / 2) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO station_cluster (cluster_id, location_nlc) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.cluster_id).push_bind(&row.location_nlc);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_flows(conn: &mut SqliteConnection, rows: &[FlowRecord]) -> Result<()> {
    for chunk in rows.chunks(BULK_INSERT_MAX / 7) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO flow_record (flow_id, origin_code, destination_code,
                direction, toc, start_date, end_date) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(row.flow_id)
                .push_bind(&row.origin_code)
                .push_bind(&row.destination_code)
                .push_bind(&row.direction)
                .push_bind(&row.toc)
                .push_bind(row.start_date)
                .push_bind(row.end_date);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_fares(conn: &mut SqliteConnection, rows: &[FareRecord]) -> Result<()> {
    for chunk in rows.chunks(BULK_INSERT_MAX / 3) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO fare_record (flow_id, ticket_code, fare) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(row.flow_id)
                .push_bind(&row.ticket_code)
                .push_bind(row.fare);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_ticket_types(
    conn: &mut SqliteConnection,
    rows: &[TicketType],
) -> Result<()> {
    for chunk in rows.chunks(BULK_INSERT_MAX / 23) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO ticket_type (ticket_code, description, tkt_class,
                tkt_type, tkt_group, max_passengers, min_passengers,
                max_adults, min_adults, max_children, min_children,
                restricted_by_date, restricted_by_train, restricted_by_area,
                validity_code, reservation_required, capri_code, uts_code,
                time_restriction, free_pass_lul, package_mkr, fare_multiplier,
                discount_category) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.ticket_code)
                .push_bind(&row.description)
                .push_bind(row.tkt_class)
                .push_bind(&row.tkt_type)
                .push_bind(&row.tkt_group)
                .push_bind(row.max_passengers)
                .push_bind(row.min_passengers)
                .push_bind(row.max_adults)
                .push_bind(row.min_adults)
                .push_bind(row.max_children)
                .push_bind(row.min_children)
                .push_bind(row.restricted_by_date)
                .push_bind(row.restricted_by_train)
                .push_bind(row.restricted_by_area)
                .push_bind(&row.validity_code)
                .push_bind(&row.reservation_required)
                .push_bind(&row.capri_code)
                .push_bind(&row.uts_code)
                .push_bind(row.time_restriction)
                .push_bind(row.free_pass_lul)
                .push_bind(&row.package_mkr)
                .push_bind(row.fare_multiplier)
                .push_bind(&row.discount_category);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_train_timetables(
    conn: &mut SqliteConnection,
    rows: &[TrainTimetable],
) -> Result<()> {
    for chunk in rows.chunks(BULK_INSERT_MAX / 13) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO train_timetable (train_uid, date_runs_from,
                date_runs_to, monday, tuesday, wednesday, thursday, friday,
                saturday, sunday, bank_holiday_running, rsid, toc) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.train_uid)
                .push_bind(row.date_runs_from)
                .push_bind(row.date_runs_to)
                .push_bind(row.monday)
                .push_bind(row.tuesday)
                .push_bind(row.wednesday)
                .push_bind(row.thursday)
                .push_bind(row.friday)
                .push_bind(row.saturday)
                .push_bind(row.sunday)
                .push_bind(row.bank_holiday_running)
                .push_bind(&row.rsid)
                .push_bind(&row.toc);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_timetable_locations(
    conn: &mut SqliteConnection,
    rows: &[TimetableLocation],
) -> Result<()> {
    for chunk in rows.chunks(BULK_INSERT_MAX / 15) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO timetable_location (train_uid, train_route_index,
                location_type, location, scheduled_arrival_time,
                scheduled_departure_time, public_arrival, public_departure,
                platform, line, path, activity, engineering_allowance,
                pathing_allowance, performance_allowance) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.train_uid)
                .push_bind(row.train_route_index)
                .push_bind(row.location_type)
                .push_bind(&row.location)
                .push_bind(row.scheduled_arrival_time)
                .push_bind(row.scheduled_departure_time)
                .push_bind(row.public_arrival)
                .push_bind(row.public_departure)
                .push_bind(&row.platform)
                .push_bind(&row.line)
                .push_bind(&row.path)
                .push_bind(&row.activity)
                .push_bind(&row.engineering_allowance)
                .push_bind(&row.pathing_allowance)
                .push_bind(&row.performance_allowance);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_timetable_links(
    conn: &mut SqliteConnection,
    rows: &[TimetableLink],
) -> Result<()> {
    for chunk in rows.chunks(BULK_INSERT_MAX / 2) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO timetable_link (from_location, to_location) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.from_location).push_bind(&row.to_location);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_tiplocs(conn: &mut SqliteConnection, rows: &[Tiploc]) -> Result<()> {
    for chunk in rows.chunks(BULK_INSERT_MAX / 3) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO tiploc (tiploc_code, crs_code, description) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.tiploc_code)
                .push_bind(&row.crs_code)
                .push_bind(&row.description);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_incidents(conn: &mut SqliteConnection, rows: &[Incident]) -> Result<()> {
    for chunk in rows.chunks(BULK_INSERT_MAX / 7) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO incidents (incident_number, creation_time, planned,
                summary, description, cleared_incident, route_affected) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.incident_number)
                .push_bind(row.creation_time)
                .push_bind(row.planned)
                .push_bind(&row.summary)
                .push_bind(&row.description)
                .push_bind(row.cleared_incident)
                .push_bind(&row.route_affected);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_incident_operators(
    conn: &mut SqliteConnection,
    rows: &[IncidentAffectedOperator],
) -> Result<()> {
    for chunk in rows.chunks(BULK_INSERT_MAX / 3) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO incident_affected_operators (incident_number,
                operator_toc, operator_name) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.incident_number)
                .push_bind(&row.operator_toc)
                .push_bind(&row.operator_name);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_stations(conn: &mut SqliteConnection, rows: &[Station]) -> Result<()> {
    for chunk in rows.chunks(BULK_INSERT_MAX / 2) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO station (crs_code, name) ");
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.crs_code).push_bind(&row.name);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}
