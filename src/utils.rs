use chrono::format::ParseErrorKind;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateArgError {
    #[error("Could not parse date '{0}', expected YYYY, YYYY-MM or YYYY-MM-DD")]
    Format(String),

    #[error("Date '{0}' does not exist")]
    OutOfRange(String),
}

/// Parses a command line date.
///
/// Accepts a year, a year and month, or a full date, with `-`, `/`, `\` or
/// `.` as separator. Missing month and day default to the first.
pub fn parse_date_arg(input: &str) -> Result<NaiveDate, DateArgError> {
    let normalized: String = input
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '.') { '-' } else { c })
        .collect();
    let parts: Vec<&str> = normalized.split('-').collect();
    let well_formed = parts.len() <= 3
        && parts[0].len() == 4
        && parts[1..].iter().all(|p| (1..=2).contains(&p.len()))
        && parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit()));
    if !well_formed {
        return Err(DateArgError::Format(input.to_string()));
    }

    let full = match parts.len() {
        1 => format!("{}-01-01", normalized),
        2 => format!("{}-01", normalized),
        _ => normalized,
    };
    NaiveDate::parse_from_str(&full, "%Y-%m-%d").map_err(|e| match e.kind() {
        ParseErrorKind::OutOfRange | ParseErrorKind::Impossible => {
            DateArgError::OutOfRange(input.to_string())
        }
        _ => DateArgError::Format(input.to_string()),
    })
}
