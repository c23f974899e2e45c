use database::data_model::{
    date_to_sql, FareRecord, FlowRecord, LocationRecord, StationCluster, TicketType,
};
use database::Record;

use super::line::{has_entry_expired, FixedLine, ParseError};
use super::DtdState;

/// `LOC` RL records name active physical stations. Entries outside their
/// validity window or without a public CRS are dropped at parse time.
pub(super) fn records_for_loc_entry(
    line: &FixedLine,
    state: &mut DtdState,
) -> Result<Vec<Record>, ParseError> {
    if !line.starts_with("RL") {
        return Ok(vec![]);
    }

    let end_date = line.date_ddmmyyyy(9, 17)?;
    let start_date = line.date_ddmmyyyy(17, 25)?;
    if has_entry_expired(start_date, end_date, state.today) {
        return Ok(vec![]);
    }

    let crs_code = line.field(56, 59)?;
    if crs_code.trim().is_empty() {
        return Ok(vec![]);
    }

    Ok(vec![Record::Location(LocationRecord {
        crs_code: crs_code.to_owned(),
        ncl_code: line.field(36, 40)?.to_owned(),
        uic_code: line.field(2, 9)?.to_owned(),
    })])
}

/// `FFL` RF records open fare corridors, RT records price tickets on them.
/// Flows outside their window are remembered so their fares are dropped
/// too.
pub(super) fn records_for_ffl_entry(
    line: &FixedLine,
    state: &mut DtdState,
) -> Result<Vec<Record>, ParseError> {
    if line.starts_with("RF") {
        let flow_id = line.int(42, 49)?;
        let end_date = line.date_ddmmyyyy(20, 28)?;
        let start_date = line.date_ddmmyyyy(28, 36)?;
        if has_entry_expired(start_date, end_date, state.today) {
            state.expired_flow_ids.insert(flow_id);
            return Ok(vec![]);
        }

        return Ok(vec![Record::Flow(FlowRecord {
            flow_id,
            origin_code: line.field(2, 6)?.to_owned(),
            destination_code: line.field(6, 10)?.to_owned(),
            direction: line.field(19, 20)?.to_owned(),
            toc: line.field(36, 39)?.to_owned(),
            start_date: date_to_sql(start_date),
            end_date: date_to_sql(end_date),
        })]);
    }

    if line.starts_with("RT") {
        let flow_id = line.int(2, 9)?;
        if state.expired_flow_ids.contains(&flow_id) {
            return Ok(vec![]);
        }

        return Ok(vec![Record::Fare(FareRecord {
            flow_id,
            ticket_code: line.field(9, 12)?.to_owned(),
            fare: line.int(12, 20)?,
        })]);
    }

    Ok(vec![])
}

/// `FSC` records assign NLCs to fare clusters. Lines starting '/' are
/// comments.
pub(super) fn records_for_fsc_entry(
    line: &FixedLine,
    state: &mut DtdState,
) -> Result<Vec<Record>, ParseError> {
    if line.is_blank() || line.starts_with("/") {
        return Ok(vec![]);
    }

    let end_date = line.date_ddmmyyyy(9, 17)?;
    let start_date = line.date_ddmmyyyy(17, 25)?;
    if has_entry_expired(start_date, end_date, state.today) {
        return Ok(vec![]);
    }

    Ok(vec![Record::StationCluster(StationCluster {
        cluster_id: line.field(1, 5)?.to_owned(),
        location_nlc: line.field(5, 9)?.to_owned(),
    })])
}

/// `TTY` R records fill the ticket catalogue.
pub(super) fn records_for_tty_entry(
    line: &FixedLine,
    state: &mut DtdState,
) -> Result<Vec<Record>, ParseError> {
    if !line.starts_with("R") {
        return Ok(vec![]);
    }

    let end_date = line.date_ddmmyyyy(4, 12)?;
    let start_date = line.date_ddmmyyyy(12, 20)?;
    if has_entry_expired(start_date, end_date, state.today) {
        return Ok(vec![]);
    }

    Ok(vec![Record::TicketType(TicketType {
        ticket_code: line.field(1, 4)?.to_owned(),
        description: line.trimmed(28, 43)?,
        tkt_class: line.int(43, 44)?,
        tkt_type: line.field(44, 45)?.to_owned(),
        tkt_group: line.field(45, 46)?.to_owned(),
        max_passengers: line.int(54, 57)?,
        min_passengers: line.int(57, 60)?,
        max_adults: line.int(60, 63)?,
        min_adults: line.int(63, 66)?,
        max_children: line.int(66, 69)?,
        min_children: line.int(69, 72)?,
        restricted_by_date: line.char_at(72)? == 'Y',
        restricted_by_train: line.char_at(73)? == 'Y',
        restricted_by_area: line.char_at(74)? == 'Y',
        validity_code: line.field(75, 77)?.to_owned(),
        reservation_required: line.field(98, 99)?.to_owned(),
        capri_code: line.field(99, 102)?.to_owned(),
        uts_code: line.field(103, 105)?.to_owned(),
        time_restriction: line.int(105, 106)?,
        free_pass_lul: line.char_at(106)? == 'Y',
        package_mkr: line.field(107, 108)?.to_owned(),
        fare_multiplier: line.int(108, 111)?,
        discount_category: line.field(111, 113)?.to_owned(),
    })])
}
