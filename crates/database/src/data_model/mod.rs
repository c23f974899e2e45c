use chrono::{NaiveDate, NaiveTime};

pub mod fares;
pub mod kb;
pub mod timetable;

pub use fares::{FareRecord, FlowRecord, LocationRecord, StationCluster, TicketType};
pub use kb::{Incident, IncidentAffectedOperator, Station};
pub use timetable::{
    LocationType, TimetableLink, TimetableLocation, Tiploc, TrainTimetable,
};

/// Every table a feed can own. `expiry_times` is bookkeeping and never
/// owned by a feed, so it has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    LocationRecord,
    StationCluster,
    FlowRecord,
    FareRecord,
    TicketType,
    TrainTimetable,
    TimetableLocation,
    TimetableLink,
    Tiploc,
    Incident,
    IncidentAffectedOperator,
    Station,
}

impl Table {
    pub fn table_name(self) -> &'static str {
        match self {
            Table::LocationRecord => "location_record",
            Table::StationCluster => "station_cluster",
            Table::FlowRecord => "flow_record",
            Table::FareRecord => "fare_record",
            Table::TicketType => "ticket_type",
            Table::TrainTimetable => "train_timetable",
            Table::TimetableLocation => "timetable_location",
            Table::TimetableLink => "timetable_link",
            Table::Tiploc => "tiploc",
            Table::Incident => "incidents",
            Table::IncidentAffectedOperator => "incident_affected_operators",
            Table::Station => "station",
        }
    }
}

/// One parsed row, tagged with its destination table.
#[derive(Debug, Clone)]
pub enum Record {
    Location(LocationRecord),
    StationCluster(StationCluster),
    Flow(FlowRecord),
    Fare(FareRecord),
    TicketType(TicketType),
    TrainTimetable(TrainTimetable),
    TimetableLocation(TimetableLocation),
    TimetableLink(TimetableLink),
    Tiploc(Tiploc),
    Incident(Incident),
    IncidentAffectedOperator(IncidentAffectedOperator),
    Station(Station),
}

/// Rows grouped per table, the unit passed from the parsers to the single
/// SQL writer.
#[derive(Debug, Default)]
pub struct RecordSet {
    pub locations: Vec<LocationRecord>,
    pub station_clusters: Vec<StationCluster>,
    pub flows: Vec<FlowRecord>,
    pub fares: Vec<FareRecord>,
    pub ticket_types: Vec<TicketType>,
    pub train_timetables: Vec<TrainTimetable>,
    pub timetable_locations: Vec<TimetableLocation>,
    pub timetable_links: Vec<TimetableLink>,
    pub tiplocs: Vec<Tiploc>,
    pub incidents: Vec<Incident>,
    pub incident_operators: Vec<IncidentAffectedOperator>,
    pub stations: Vec<Station>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        match record {
            Record::Location(row) => self.locations.push(row),
            Record::StationCluster(row) => self.station_clusters.push(row),
            Record::Flow(row) => self.flows.push(row),
            Record::Fare(row) => self.fares.push(row),
            Record::TicketType(row) => self.ticket_types.push(row),
            Record::TrainTimetable(row) => self.train_timetables.push(row),
            Record::TimetableLocation(row) => self.timetable_locations.push(row),
            Record::TimetableLink(row) => self.timetable_links.push(row),
            Record::Tiploc(row) => self.tiplocs.push(row),
            Record::Incident(row) => self.incidents.push(row),
            Record::IncidentAffectedOperator(row) => {
                self.incident_operators.push(row)
            }
            Record::Station(row) => self.stations.push(row),
        }
    }

    pub fn merge(&mut self, mut other: RecordSet) {
        self.locations.append(&mut other.locations);
        self.station_clusters.append(&mut other.station_clusters);
        self.flows.append(&mut other.flows);
        self.fares.append(&mut other.fares);
        self.ticket_types.append(&mut other.ticket_types);
        self.train_timetables.append(&mut other.train_timetables);
        self.timetable_locations.append(&mut other.timetable_locations);
        self.timetable_links.append(&mut other.timetable_links);
        self.tiplocs.append(&mut other.tiplocs);
        self.incidents.append(&mut other.incidents);
        self.incident_operators.append(&mut other.incident_operators);
        self.stations.append(&mut other.stations);
    }

    pub fn len(&self) -> usize {
        self.locations.len()
            + self.station_clusters.len()
            + self.flows.len()
            + self.fares.len()
            + self.ticket_types.len()
            + self.train_timetables.len()
            + self.timetable_locations.len()
            + self.timetable_links.len()
            + self.tiplocs.len()
            + self.incidents.len()
            + self.incident_operators.len()
            + self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The positional integer encodings used by range-filtered columns. Times
/// become `hour*100 + minute`, dates `year*10000 + month*100 + day`, so the
/// SQL filters stay plain integer comparisons.
pub fn time_to_sql(time: NaiveTime) -> i32 {
    use chrono::Timelike;
    (time.hour() * 100 + time.minute()) as i32
}

pub fn time_from_sql(value: i32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt((value / 100) as u32, (value % 100) as u32, 0)
}

pub fn date_to_sql(date: NaiveDate) -> i32 {
    use chrono::Datelike;
    date.year() * 10000 + date.month() as i32 * 100 + date.day() as i32
}

pub fn date_from_sql(value: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        value / 10000,
        ((value / 100) % 100) as u32,
        (value % 100) as u32,
    )
}
