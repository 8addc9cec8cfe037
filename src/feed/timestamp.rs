//! Tolerant timestamp parsing for XPath-extracted dates.
//!
//! Scraped pages decorate dates with icon ligatures and labels
//! (`"calendar_month 2025-12"`, `"🕒 Posted 3 Jan 2024"`). Rather than guessing
//! which token is the date, [`parse_timestamp`] tries the whole text and then
//! every suffix left after dropping leading whitespace-separated tokens, and
//! returns the first one that parses.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Date-time layouts tried in order after RFC 3339 and RFC 2822.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%Y.%m.%d",
    "%Y年%m月%d日",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Year-month layouts; parsed as the first day of the month.
const MONTH_FORMATS: &[&str] = &["%Y-%m", "%Y/%m", "%Y年%m月"];

/// Parses scraped date text, stripping leading icon/label tokens.
///
/// With `custom_format` (chrono `strftime` syntax) only that layout is tried;
/// otherwise the built-in layouts are. Returns `None` when nothing parses.
pub fn parse_timestamp(raw: &str, custom_format: Option<&str>) -> Option<DateTime<Utc>> {
    let custom_format = custom_format.map(str::trim).filter(|f| !f.is_empty());

    candidates(raw).find_map(|candidate| match custom_format {
        Some(format) => parse_with_format(candidate, format),
        None => parse_common(candidate),
    })
}

/// The trimmed text, then each suffix after dropping one more leading token.
fn candidates(raw: &str) -> impl Iterator<Item = &str> {
    let text = raw.trim();
    let mut starts = vec![0];
    let mut previous_was_space = false;
    for (idx, c) in text.char_indices() {
        if c.is_whitespace() {
            previous_was_space = true;
        } else if previous_was_space {
            starts.push(idx);
            previous_was_space = false;
        }
    }
    starts
        .into_iter()
        .map(move |start| &text[start..])
        .filter(|candidate| !candidate.is_empty())
}

fn parse_common(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .chain(MONTH_FORMATS.iter())
                .find_map(|f| parse_date(text, f))
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_with_format(text: &str, format: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(text, format) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
        return Some(Utc.from_utc_datetime(&naive));
    }
    parse_date(text, format)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// `NaiveDate` parsing that also accepts layouts without a day of month.
fn parse_date(text: &str, format: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, format) {
        return Some(date);
    }
    if format.contains("%d") || format.contains("%e") {
        return None;
    }
    NaiveDate::parse_from_str(&format!("{text} 1"), &format!("{format} %d")).ok()
}
