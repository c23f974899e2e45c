use database::data_model::{
    date_to_sql, time_to_sql, LocationType, TimetableLocation, Tiploc, TrainTimetable,
};
use database::Record;

use super::line::{FixedLine, ParseError};
use super::DtdState;

/// Assembly state for the train currently being read from an `MCA` file.
/// Every `BS` record resets it, so the parser restarts cleanly per train
/// and per file.
#[derive(Debug, Default)]
pub(super) enum TrainState {
    /// Nothing open, or the last candidate was dropped.
    #[default]
    Idle,
    /// `BS` seen; waiting for the `BX` details record.
    HaveHeader(TrainTimetable),
    /// `BX` seen; the candidate is usable once stops arrive.
    HaveDetails(TrainTimetable),
    /// Stops are being collected; `next_index` numbers the next one.
    EnRoute {
        train: TrainTimetable,
        next_index: i32,
    },
    /// `LT` seen; anything but a new `BS` is ignored.
    Done,
}

pub(super) fn records_for_mca_entry(
    line: &FixedLine,
    state: &mut DtdState,
) -> Result<Vec<Record>, ParseError> {
    match line.field(0, 2).unwrap_or("") {
        "BS" => basic_schedule(line, state),
        "BX" => extra_details(line, state),
        "LO" => origin_location(line, state),
        "LI" => intermediate_location(line, state),
        "LT" => terminating_location(line, state),
        "TI" => tiploc_insert(line),
        _ => Ok(vec![]),
    }
}

fn basic_schedule(
    line: &FixedLine,
    state: &mut DtdState,
) -> Result<Vec<Record>, ParseError> {
    state.train = TrainState::Idle;

    let train_uid = line.field(3, 9)?.to_owned();
    if !state.duplicate_trains.insert(train_uid.clone()) {
        // A second schedule for the same train within one feed is dropped
        // whole; the Idle state swallows its stop records.
        return Ok(vec![]);
    }

    let days_run = line.field(21, 28)?.as_bytes();
    state.train = TrainState::HaveHeader(TrainTimetable {
        train_uid,
        date_runs_from: date_to_sql(line.date_yymmdd(9, 15)?),
        date_runs_to: date_to_sql(line.date_yymmdd(15, 21)?),
        monday: days_run[0] == b'1',
        tuesday: days_run[1] == b'1',
        wednesday: days_run[2] == b'1',
        thursday: days_run[3] == b'1',
        friday: days_run[4] == b'1',
        saturday: days_run[5] == b'1',
        sunday: days_run[6] == b'1',
        bank_holiday_running: line.char_at(28)? == 'Y',
        rsid: String::new(),
        toc: String::new(),
    });
    Ok(vec![])
}

fn extra_details(
    line: &FixedLine,
    state: &mut DtdState,
) -> Result<Vec<Record>, ParseError> {
    match std::mem::take(&mut state.train) {
        TrainState::HaveHeader(mut train) => {
            train.toc = line.field(11, 13)?.to_owned();
            train.rsid = line.field(14, 22)?.to_owned();
            state.train = TrainState::HaveDetails(train);
            Ok(vec![])
        }
        TrainState::HaveDetails(_) | TrainState::EnRoute { .. } => Err(
            ParseError::new("duplicate extra details record for one train"),
        ),
        other => {
            state.train = other;
            Ok(vec![])
        }
    }
}

fn origin_location(
    line: &FixedLine,
    state: &mut DtdState,
) -> Result<Vec<Record>, ParseError> {
    match std::mem::take(&mut state.train) {
        TrainState::HaveDetails(train) => {
            let stop = TimetableLocation {
                train_uid: train.train_uid.clone(),
                train_route_index: 0,
                location_type: LocationType::Origin,
                location: line.trimmed(2, 10)?,
                scheduled_arrival_time: None,
                scheduled_departure_time: Some(time_to_sql(line.time(10, 15)?)),
                public_arrival: None,
                public_departure: Some(line.time(15, 19)?),
                platform: line.trimmed(19, 22)?,
                line: line.trimmed(22, 25)?,
                path: String::new(),
                activity: line.trimmed(39, 41)?,
                engineering_allowance: line.trimmed(25, 27)?,
                pathing_allowance: line.trimmed(27, 29)?,
                performance_allowance: line.trimmed(41, 43)?,
            };
            state.train = TrainState::EnRoute {
                train,
                next_index: 1,
            };
            Ok(vec![Record::TimetableLocation(stop)])
        }
        TrainState::EnRoute { .. } => {
            Err(ParseError::new("second origin record for one train"))
        }
        other => {
            // Stop records before a usable BS/BX pair are ignored.
            state.train = other;
            Ok(vec![])
        }
    }
}

fn intermediate_location(
    line: &FixedLine,
    state: &mut DtdState,
) -> Result<Vec<Record>, ParseError> {
    match std::mem::take(&mut state.train) {
        TrainState::EnRoute { train, next_index } => {
            // A non-blank pass time means the train does not stop here.
            let scheduled_pass = line.field(20, 25)?;
            if !scheduled_pass.trim().is_empty() {
                state.train = TrainState::EnRoute { train, next_index };
                return Ok(vec![]);
            }

            let stop = TimetableLocation {
                train_uid: train.train_uid.clone(),
                train_route_index: next_index,
                location_type: LocationType::Intermediate,
                location: line.trimmed(2, 10)?,
                scheduled_arrival_time: Some(time_to_sql(line.time(10, 15)?)),
                scheduled_departure_time: Some(time_to_sql(line.time(15, 20)?)),
                public_arrival: Some(line.time(25, 29)?),
                public_departure: Some(line.time(29, 33)?),
                platform: line.trimmed(33, 36)?,
                line: line.trimmed(36, 39)?,
                path: line.trimmed(39, 42)?,
                activity: line.trimmed(42, 54)?,
                engineering_allowance: line.trimmed(54, 56)?,
                pathing_allowance: line.trimmed(56, 58)?,
                performance_allowance: line.trimmed(58, 60)?,
            };
            state.train = TrainState::EnRoute {
                train,
                next_index: next_index + 1,
            };
            Ok(vec![Record::TimetableLocation(stop)])
        }
        TrainState::HaveDetails(_) => Err(ParseError::new(
            "intermediate stop before the origin record",
        )),
        other => {
            state.train = other;
            Ok(vec![])
        }
    }
}

fn terminating_location(
    line: &FixedLine,
    state: &mut DtdState,
) -> Result<Vec<Record>, ParseError> {
    match std::mem::take(&mut state.train) {
        TrainState::EnRoute { train, next_index } => {
            let stop = TimetableLocation {
                train_uid: train.train_uid.clone(),
                train_route_index: next_index,
                location_type: LocationType::Terminating,
                location: line.trimmed(2, 10)?,
                scheduled_arrival_time: Some(time_to_sql(line.time(10, 15)?)),
                scheduled_departure_time: None,
                public_arrival: Some(line.time(15, 19)?),
                public_departure: None,
                platform: line.trimmed(19, 22)?,
                line: String::new(),
                path: line.trimmed(22, 25)?,
                activity: line.trimmed(25, 37)?,
                engineering_allowance: String::new(),
                pathing_allowance: String::new(),
                performance_allowance: String::new(),
            };
            state.train = TrainState::Done;
            // The deferred header only lands once the train is complete.
            Ok(vec![
                Record::TrainTimetable(train),
                Record::TimetableLocation(stop),
            ])
        }
        TrainState::HaveDetails(_) => Err(ParseError::new(
            "terminating record before the origin record",
        )),
        other => {
            state.train = other;
            Ok(vec![])
        }
    }
}

fn tiploc_insert(line: &FixedLine) -> Result<Vec<Record>, ParseError> {
    Ok(vec![Record::Tiploc(Tiploc {
        tiploc_code: line.trimmed(2, 9)?,
        crs_code: line.field(53, 56)?.to_owned(),
        description: line.trimmed(56, 72)?,
    })])
}
