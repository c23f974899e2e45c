use std::fmt;

use chrono::{NaiveDate, NaiveTime};

/// A single malformed field. The parse task wraps this with the file name
/// and line number before it aborts the ingest.
#[derive(Debug)]
pub struct ParseError {
    message: String,
}

impl ParseError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Bounds-checked access to the fixed column layout of a DTD line. All
/// offsets are byte positions; the files are ASCII.
pub struct FixedLine<'a> {
    text: &'a str,
}

impl<'a> FixedLine<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.text.starts_with(prefix)
    }

    pub fn field(&self, start: usize, end: usize) -> Result<&'a str, ParseError> {
        self.text.get(start..end).ok_or_else(|| {
            ParseError::new(format!(
                "expected at least {} columns, found {}",
                end,
                self.text.len()
            ))
        })
    }

    pub fn trimmed(&self, start: usize, end: usize) -> Result<String, ParseError> {
        Ok(self.field(start, end)?.trim().to_owned())
    }

    pub fn char_at(&self, index: usize) -> Result<char, ParseError> {
        self.field(index, index + 1)?
            .chars()
            .next()
            .ok_or_else(|| ParseError::new("unexpected end of record"))
    }

    pub fn int(&self, start: usize, end: usize) -> Result<i32, ParseError> {
        let field = self.field(start, end)?;
        field.trim().parse().map_err(|_| {
            ParseError::new(format!("expected a number, found '{}'", field))
        })
    }

    /// `HHMM` with blank hour or minute meaning zero. Longer fields carry
    /// an activity suffix which is ignored.
    pub fn time(&self, start: usize, end: usize) -> Result<NaiveTime, ParseError> {
        let field = self.field(start, end)?;
        parse_time(field)
    }

    pub fn date_yymmdd(&self, start: usize, end: usize) -> Result<NaiveDate, ParseError> {
        let field = self.field(start, end)?;
        parse_date_yymmdd(field)
    }

    pub fn date_ddmmyyyy(
        &self,
        start: usize,
        end: usize,
    ) -> Result<NaiveDate, ParseError> {
        let field = self.field(start, end)?;
        parse_date_ddmmyyyy(field)
    }
}

fn two_digits(field: &str, what: &str) -> Result<u32, ParseError> {
    if field == "  " {
        return Ok(0);
    }
    field
        .parse()
        .map_err(|_| ParseError::new(format!("invalid {}: '{}'", what, field)))
}

pub fn parse_time(field: &str) -> Result<NaiveTime, ParseError> {
    if field.len() < 4 {
        return Err(ParseError::new(format!("time field too short: '{}'", field)));
    }
    let hour = two_digits(&field[..2], "hour")?;
    let minute = two_digits(&field[2..4], "minute")?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| ParseError::new(format!("invalid time: '{}'", field)))
}

pub fn parse_date_yymmdd(field: &str) -> Result<NaiveDate, ParseError> {
    if field.len() < 6 {
        return Err(ParseError::new(format!("date field too short: '{}'", field)));
    }
    let year = 2000
        + field[..2]
            .parse::<i32>()
            .map_err(|_| ParseError::new(format!("invalid year: '{}'", field)))?;
    let month = two_digits(&field[2..4], "month")?;
    let day = two_digits(&field[4..6], "day")?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ParseError::new(format!("invalid date: '{}'", field)))
}

pub fn parse_date_ddmmyyyy(field: &str) -> Result<NaiveDate, ParseError> {
    if field.len() < 8 {
        return Err(ParseError::new(format!("date field too short: '{}'", field)));
    }
    let day = two_digits(&field[..2], "day")?;
    let month = two_digits(&field[2..4], "month")?;
    let year = field[4..8]
        .parse::<i32>()
        .map_err(|_| ParseError::new(format!("invalid year: '{}'", field)))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ParseError::new(format!("invalid date: '{}'", field)))
}

/// A validity window excludes today when it starts in the future or ended
/// in the past. A year of 2999 or later means the entry has no end date.
pub fn has_entry_expired(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> bool {
    use chrono::Datelike;
    if today < start {
        return true;
    }
    if end.year() >= 2999 {
        return false;
    }
    today > end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_time_components_read_as_zero() {
        assert_eq!(
            parse_time("  30").unwrap(),
            NaiveTime::from_hms_opt(0, 30, 0).unwrap()
        );
        assert_eq!(
            parse_time("1000H").unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap()
        );
        assert!(parse_time("10").is_err());
    }

    #[test]
    fn date_formats_parse() {
        assert_eq!(
            parse_date_yymmdd("220104").unwrap(),
            NaiveDate::from_ymd_opt(2022, 1, 4).unwrap()
        );
        assert_eq!(
            parse_date_ddmmyyyy("04012022").unwrap(),
            NaiveDate::from_ymd_opt(2022, 1, 4).unwrap()
        );
        assert!(parse_date_ddmmyyyy("99999999").is_err());
    }

    #[test]
    fn expiry_window_rules() {
        let today = NaiveDate::from_ymd_opt(2022, 1, 4).unwrap();
        let past = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let future = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let no_end = NaiveDate::from_ymd_opt(2999, 12, 31).unwrap();

        assert!(has_entry_expired(future, no_end, today));
        assert!(has_entry_expired(past, past, today));
        assert!(!has_entry_expired(past, future, today));
        // Year 2999 means no end date at all.
        assert!(!has_entry_expired(past, no_end, today));
    }

    #[test]
    fn short_lines_are_rejected_not_sliced() {
        let line = FixedLine::new("RL12345");
        assert!(line.field(2, 9).is_err());
        assert!(line.int(2, 9).is_err());
    }
}
