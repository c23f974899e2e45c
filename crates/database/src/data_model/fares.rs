use sqlx::prelude::FromRow;

/// One active physical station in the fares data. `crs_code` is the public
/// three-letter code, `ncl_code` the four-digit national location code the
/// flow records are keyed on.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct LocationRecord {
    pub crs_code: String,
    pub ncl_code: String,
    pub uic_code: String,
}

/// Many-to-many grouping of NLCs used for zonal fares.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StationCluster {
    pub cluster_id: String,
    pub location_nlc: String,
}

/// A fare corridor between two NLCs. Validity dates are kept in the
/// sortable integer encoding.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FlowRecord {
    pub flow_id: i32,
    pub origin_code: String,
    pub destination_code: String,
    pub direction: String,
    pub toc: String,
    pub start_date: i32,
    pub end_date: i32,
}

/// A priced ticket on a flow, in pence.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FareRecord {
    pub flow_id: i32,
    pub ticket_code: String,
    pub fare: i32,
}

/// The ticket catalogue row, carrying the full column set of the TTY feed
/// record. End-user selection filters on `tkt_group`, `discount_category`,
/// `tkt_type` and the adult/children capacities.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TicketType {
    pub ticket_code: String,
    pub description: String,
    pub tkt_class: i32,
    pub tkt_type: String,
    pub tkt_group: String,
    pub max_passengers: i32,
    pub min_passengers: i32,
    pub max_adults: i32,
    pub min_adults: i32,
    pub max_children: i32,
    pub min_children: i32,
    pub restricted_by_date: bool,
    pub restricted_by_train: bool,
    pub restricted_by_area: bool,
    pub validity_code: String,
    pub reservation_required: String,
    pub capri_code: String,
    pub uts_code: String,
    pub time_restriction: i32,
    pub free_pass_lul: bool,
    pub package_mkr: String,
    pub fare_multiplier: i32,
    pub discount_category: String,
}
