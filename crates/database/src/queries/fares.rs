use std::collections::HashMap;

use sqlx::prelude::FromRow;
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Sqlite};

use super::{push_in_list, IN_LIST_MAX};
use crate::data_model::TicketType;
use crate::Result;

/// The fares identity of one end of a journey: its own NLC plus every
/// cluster it belongs to.
#[derive(Debug, Clone)]
pub struct ClusterSet {
    pub ncl: String,
    pub clusters: Vec<String>,
}

impl ClusterSet {
    /// The effective set used for flow lookups: `{ncl} ∪ clusters`.
    pub fn all(&self) -> Vec<String> {
        let mut all = vec![self.ncl.clone()];
        all.extend(self.clusters.iter().cloned());
        all
    }
}

#[derive(Debug, FromRow)]
struct ClusterRow {
    crs_code: String,
    ncl_code: String,
    cluster_id: Option<String>,
}

/// Resolves CRS codes to their NLC and cluster memberships.
pub async fn cluster_sets_for_crs(
    pool: &SqlitePool,
    crs_codes: &[String],
) -> Result<HashMap<String, ClusterSet>> {
    let mut sets: HashMap<String, ClusterSet> = HashMap::new();
    for chunk in crs_codes.chunks(IN_LIST_MAX) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT lr.crs_code, lr.ncl_code, sc.cluster_id
                FROM location_record lr
                LEFT JOIN station_cluster sc ON sc.location_nlc = lr.ncl_code
                WHERE lr.crs_code IN (",
        );
        push_in_list(&mut builder, chunk);
        builder.push(")");
        let rows: Vec<ClusterRow> = builder.build_query_as().fetch_all(pool).await?;
        for row in rows {
            let set = sets.entry(row.crs_code).or_insert_with(|| ClusterSet {
                ncl: row.ncl_code.clone(),
                clusters: Vec::new(),
            });
            if let Some(cluster_id) = row.cluster_id {
                set.clusters.push(cluster_id);
            }
        }
    }
    Ok(sets)
}

#[derive(Debug, FromRow)]
struct FareTicketRow {
    fare: i32,
    #[sqlx(flatten)]
    ticket: TicketType,
}

fn into_prices(rows: Vec<FareTicketRow>) -> Vec<(i32, TicketType)> {
    rows.into_iter().map(|row| (row.fare, row.ticket)).collect()
}

const TICKET_COLUMNS: &str = "tt.ticket_code, tt.description, tt.tkt_class,
    tt.tkt_type, tt.tkt_group, tt.max_passengers, tt.min_passengers,
    tt.max_adults, tt.min_adults, tt.max_children, tt.min_children,
    tt.restricted_by_date, tt.restricted_by_train, tt.restricted_by_area,
    tt.validity_code, tt.reservation_required, tt.capri_code, tt.uts_code,
    tt.time_restriction, tt.free_pass_lul, tt.package_mkr, tt.fare_multiplier,
    tt.discount_category";

/// Fares on flows running directly between the two effective sets.
pub async fn direct_tickets(
    pool: &SqlitePool,
    from_set: &[String],
    to_set: &[String],
) -> Result<Vec<(i32, TicketType)>> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT fr.fare AS fare, {TICKET_COLUMNS}
            FROM fare_record fr
            JOIN flow_record fl ON fl.flow_id = fr.flow_id
            JOIN ticket_type tt ON tt.ticket_code = fr.ticket_code
            WHERE fl.origin_code IN ("
    ));
    push_in_list(&mut builder, from_set);
    builder.push(") AND fl.destination_code IN (");
    push_in_list(&mut builder, to_set);
    builder.push(")");
    let rows: Vec<FareTicketRow> = builder.build_query_as().fetch_all(pool).await?;
    Ok(into_prices(rows))
}

/// Zonal fallback: fares from the origin NLC to destinations that sit in a
/// shared cluster but have no public CRS of their own.
pub async fn internal_tickets(
    pool: &SqlitePool,
    from_ncl: &str,
    to_clusters: &[String],
) -> Result<Vec<(i32, TicketType)>> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT fr.fare AS fare, {TICKET_COLUMNS}
            FROM fare_record fr
            JOIN flow_record fl ON fl.flow_id = fr.flow_id
            JOIN ticket_type tt ON tt.ticket_code = fr.ticket_code
            JOIN station_cluster sc ON sc.location_nlc = fl.destination_code
            LEFT JOIN location_record lr ON lr.ncl_code = fl.destination_code
            WHERE lr.crs_code IS NULL
            AND fl.origin_code = "
    ));
    builder.push_bind(from_ncl);
    builder.push(" AND sc.cluster_id IN (");
    push_in_list(&mut builder, to_clusters);
    builder.push(")");
    let rows: Vec<FareTicketRow> = builder.build_query_as().fetch_all(pool).await?;
    Ok(into_prices(rows))
}

/// The reversed form of the zonal fallback, for flows priced in the
/// opposite direction (`direction = 'R'`, operands swapped).
pub async fn internal_tickets_reversed(
    pool: &SqlitePool,
    from_ncl: &str,
    to_clusters: &[String],
) -> Result<Vec<(i32, TicketType)>> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT fr.fare AS fare, {TICKET_COLUMNS}
            FROM fare_record fr
            JOIN flow_record fl ON fl.flow_id = fr.flow_id
            JOIN ticket_type tt ON tt.ticket_code = fr.ticket_code
            JOIN station_cluster sc ON sc.location_nlc = fl.origin_code
            LEFT JOIN location_record lr ON lr.ncl_code = fl.origin_code
            WHERE fl.direction = 'R'
            AND lr.crs_code IS NULL
            AND fl.destination_code = "
    ));
    builder.push_bind(from_ncl);
    builder.push(" AND sc.cluster_id IN (");
    push_in_list(&mut builder, to_clusters);
    builder.push(")");
    let rows: Vec<FareTicketRow> = builder.build_query_as().fetch_all(pool).await?;
    Ok(into_prices(rows))
}
