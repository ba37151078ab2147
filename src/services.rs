use jiff::{Timestamp, civil::Date, tz::TimeZone};
use thiserror::Error;

pub mod appointments;
pub mod milestones;
pub mod projects;
pub mod recurring_tasks;
pub mod tasks;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid date '{input}': expected YYYY-MM-DD or an RFC 3339 timestamp")]
pub struct InvalidDate {
    pub input: String,
}

/// Parses a point in time given as an RFC 3339 timestamp
/// (`2024-02-01T09:30:00+01:00`) or a civil date (`2024-02-01`), the latter
/// taken as the start of that day in the system time zone.
pub fn parse_instant(input: &str) -> Result<Timestamp, InvalidDate> {
    let input = input.trim();
    if let Ok(timestamp) = input.parse::<Timestamp>() {
        return Ok(timestamp);
    }
    input
        .parse::<Date>()
        .ok()
        .and_then(|date| date.to_zoned(TimeZone::system()).ok())
        .map(|zoned| zoned.timestamp())
        .ok_or_else(|| InvalidDate {
            input: input.to_string(),
        })
}

pub fn parse_optional_instant(input: Option<&str>) -> Result<Option<Timestamp>, InvalidDate> {
    input.map(parse_instant).transpose()
}

pub fn parse_date(input: &str) -> Result<Date, InvalidDate> {
    input.trim().parse::<Date>().map_err(|_| InvalidDate {
        input: input.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instant_accepts_rfc3339() {
        let parsed = parse_instant("2024-02-01T10:00:00+02:00").unwrap();
        assert_eq!(parsed, "2024-02-01T08:00:00Z".parse::<Timestamp>().unwrap());
    }

    #[test]
    fn test_parse_instant_accepts_civil_dates_in_order() {
        let earlier = parse_instant("2024-02-01").unwrap();
        let later = parse_instant("2024-02-15").unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        assert_eq!(
            parse_instant("next friday"),
            Err(InvalidDate {
                input: "next friday".to_string()
            })
        );
    }

    #[test]
    fn test_parse_optional_instant() {
        assert_eq!(parse_optional_instant(None), Ok(None));
        assert!(parse_optional_instant(Some("2024-02-01")).unwrap().is_some());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-03-04"), Ok(jiff::civil::date(2024, 3, 4)));
        assert!(parse_date("04/03/2024").is_err());
    }
}
