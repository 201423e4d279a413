//! Envelope line parsing.
//!
//! Every message is introduced by an envelope line: the literal `From `,
//! a sender token, and a ctime-style date, e.g.
//!
//! ```text
//! From alice@example.com Thu Nov 29 22:33:52 2001
//! ```
//!
//! Real archives garble this line in every imaginable way, so the date
//! parser is deliberately forgiving: the weekday is optional, a timezone
//! token between time and year is skipped, trailing junk is ignored. A
//! line that still fails to parse is not an error - the orchestrator
//! substitutes the injected clock's current time.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

/// Literal prefix of an envelope line.
pub const ENVELOPE_PREFIX: &[u8] = b"From ";

/// Returns whether the line is a candidate envelope line.
#[must_use]
pub fn is_envelope(line: &[u8]) -> bool {
    line.starts_with(ENVELOPE_PREFIX)
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const WEEKDAYS: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

fn month_number(token: &str) -> Option<u32> {
    let prefix = token.get(..3)?.to_ascii_lowercase();
    MONTHS.iter().position(|m| *m == prefix).map(|i| i as u32 + 1)
}

fn is_weekday(token: &str) -> bool {
    token
        .get(..3)
        .map(|prefix| {
            let prefix = prefix.to_ascii_lowercase();
            WEEKDAYS.iter().any(|d| *d == prefix)
        })
        .unwrap_or(false)
}

fn parse_time(token: &str) -> Option<(u32, u32, u32)> {
    let mut parts = token.split(':');
    let hour = parts.next()?.parse().ok()?;
    let minute = parts.next()?.parse().ok()?;
    let second = match parts.next() {
        Some(part) => part.parse().ok()?,
        None => 0,
    };
    Some((hour, minute, second))
}

/// Parses the timestamp out of an envelope line.
///
/// Pure function from raw bytes to an optional timestamp. Expects
/// `From <sender> [weekday] <month> <day> <hh:mm[:ss]> [zone] <year> ...`
/// and returns `None` for anything it cannot make sense of; the caller
/// decides the fallback.
#[must_use]
pub fn parse_envelope_date(line: &[u8]) -> Option<DateTime<Utc>> {
    let rest = line.strip_prefix(ENVELOPE_PREFIX)?;
    let text = String::from_utf8_lossy(rest);
    let tokens: Vec<&str> = text.split_whitespace().skip(1).collect();

    let mut i = 0;
    if is_weekday(tokens.get(i)?) {
        i += 1;
    }
    let month = month_number(tokens.get(i)?)?;
    i += 1;
    let day: u32 = tokens.get(i)?.parse().ok()?;
    i += 1;
    let (hour, minute, second) = parse_time(tokens.get(i)?)?;
    i += 1;

    // anything between the time and a plausible year is a timezone token
    let year: i32 = loop {
        let token = tokens.get(i)?;
        if let Ok(year) = token.parse::<i32>() {
            if (1970..=9999).contains(&year) {
                break year;
            }
        }
        i += 1;
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}
