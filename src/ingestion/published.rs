use chrono::{DateTime, NaiveDateTime, Utc};

const SHORT_WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const LONG_WEEKDAYS: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];

const RFC1123_STAMP: &str = "%d %b %Y %H:%M:%S";
const RFC850_STAMP: &str = "%d-%b-%y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParseError {
    pub input: String,
}

impl std::fmt::Display for DateParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no date layout matched {:?}", self.input)
    }
}

impl std::error::Error for DateParseError {}

/// Normalizes a feed item's publish date to UTC.
///
/// Tried in order: RFC 1123 with a numeric zone, RFC 1123 with a named zone,
/// then RFC 850 (`Monday, 02-Jan-06 15:04:05 MST`). The weekday is only
/// checked for spelling; feeds regularly get it wrong and the day/month/year
/// fields are what count.
pub fn parse_published_at(raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    let s = raw.trim();
    rfc1123(s)
        .or_else(|| rfc850(s))
        .ok_or_else(|| DateParseError { input: raw.to_string() })
}

fn rfc1123(s: &str) -> Option<DateTime<Utc>> {
    let rest = strip_weekday(s, &SHORT_WEEKDAYS)?;
    with_zone(rest)
}

fn rfc850(s: &str) -> Option<DateTime<Utc>> {
    let rest = strip_weekday(s, &LONG_WEEKDAYS)?;
    let (stamp, zone) = rest.rsplit_once(' ')?;
    let naive = NaiveDateTime::parse_from_str(stamp, RFC850_STAMP).ok()?;
    // same instant in RFC 1123 form, so zones resolve the same way for both
    with_zone(&format!("{} {}", naive.format(RFC1123_STAMP), zone))
}

// weekday is dropped before chrono sees it, which would reject a mismatch
fn strip_weekday<'a>(s: &'a str, names: &[&str]) -> Option<&'a str> {
    let (day, rest) = s.split_once(',')?;
    names
        .iter()
        .any(|n| n.eq_ignore_ascii_case(day.trim()))
        .then(|| rest.trim_start())
}

// "02 Jan 2006 15:04:05 <zone>"
fn with_zone(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // zones chrono does not know (UTC, CEST, ...) are taken as UTC
    let (stamp, zone) = s.trim_end().rsplit_once(' ')?;
    if !(3..=5).contains(&zone.len()) || !zone.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, RFC1123_STAMP).ok().map(|n| n.and_utc())
}
