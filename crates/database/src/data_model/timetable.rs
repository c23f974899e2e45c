use chrono::NaiveTime;
use sqlx::prelude::FromRow;

/// One scheduled service. `date_runs_from`/`date_runs_to` use the sortable
/// integer date encoding; the weekday flags mirror the feed's bitmap.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TrainTimetable {
    pub train_uid: String,
    pub date_runs_from: i32,
    pub date_runs_to: i32,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
    pub bank_holiday_running: bool,
    pub rsid: String,
    pub toc: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum LocationType {
    Origin,
    Intermediate,
    Terminating,
}

/// One stop of a service. `train_route_index` is contiguous from 0 at the
/// origin. Scheduled times use the `hour*100 + minute` encoding, public
/// times are stored natively.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TimetableLocation {
    pub train_uid: String,
    pub train_route_index: i32,
    pub location_type: LocationType,
    pub location: String,
    pub scheduled_arrival_time: Option<i32>,
    pub scheduled_departure_time: Option<i32>,
    pub public_arrival: Option<NaiveTime>,
    pub public_departure: Option<NaiveTime>,
    pub platform: String,
    pub line: String,
    pub path: String,
    pub activity: String,
    pub engineering_allowance: String,
    pub pathing_allowance: String,
    pub performance_allowance: String,
}

/// Precomputed directed adjacency: a row exists iff some service visits
/// `from_location` immediately before `to_location`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TimetableLink {
    pub from_location: String,
    pub to_location: String,
}

/// Timing-point to CRS mapping. Several TIPLOCs may share one CRS.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Tiploc {
    pub tiploc_code: String,
    pub crs_code: String,
    pub description: String,
}
