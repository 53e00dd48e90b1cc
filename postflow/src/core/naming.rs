//! Deterministic names for runs, rendered images, and archived files.

use chrono::{DateTime, NaiveDate, TimeZone};

use crate::core::platform::Platform;

const SLUG_MAX_CHARS: usize = 30;

/// Identifier of one pipeline run, e.g. `20250301-081500-instagram`.
pub fn run_id<Tz: TimeZone>(now: &DateTime<Tz>, platform: Platform) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}-{}", now.format("%Y%m%d-%H%M%S"), platform)
}

/// File name of the rendered image inside the output directory.
pub fn render_file_name<Tz: TimeZone>(platform: Platform, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}-{}.png", platform, now.format("%Y%m%d-%H%M%S"))
}

/// Topic slug: the first 30 characters, letters, digits and spaces only,
/// spaces turned into `_`.
pub fn topic_slug(topic: &str) -> String {
    topic
        .chars()
        .take(SLUG_MAX_CHARS)
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}

/// Archive name `{date}_{platform}_{slug}.png`, or `{date}_{platform}.png` when
/// the slug is empty.
pub fn archive_file_name(date: NaiveDate, platform: Platform, topic: &str) -> String {
    let slug = topic_slug(topic);
    let date = date.format("%Y-%m-%d");
    if slug.is_empty() {
        format!("{date}_{platform}.png")
    } else {
        format!("{date}_{platform}_{slug}.png")
    }
}
