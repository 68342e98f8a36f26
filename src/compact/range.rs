use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use log::warn;
use std::path::Path;

use crate::archive::persist::{is_metadata_file, read_metadata};
use crate::compact::walk_files;

/// Fallback layouts for `Date:` values chrono's RFC 2822 parser rejects.
const DATE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M %z",
    "%Y-%m-%d %H:%M:%S %z",
];

/// Earliest and latest message dates found in a mailbox directory.
///
/// Ordered by instant; each end keeps the offset of its own `Date:` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    pub earliest: DateTime<FixedOffset>,
    pub latest: DateTime<FixedOffset>,
}

impl TimeRange {
    fn widen(self, t: DateTime<FixedOffset>) -> Self {
        Self {
            earliest: if t < self.earliest { t } else { self.earliest },
            latest: if t > self.latest { t } else { self.latest },
        }
    }
}

/// Parses a `Date:` header value, trying strict RFC 2822 first.
///
/// A trailing comment such as `(UTC)` is ignored. Anything else that does
/// not match a known layout yields `None`.
pub fn parse_message_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = strip_comment(value.trim());
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(value, f).ok())
}

fn strip_comment(value: &str) -> &str {
    match value.rfind('(') {
        Some(i) if value.ends_with(')') => value[..i].trim_end(),
        _ => value,
    }
}

/// Scans every metadata record under `dir` for the span of message dates.
///
/// Unreadable records and unparsable dates are warned about and skipped.
pub fn content_range(dir: &Path) -> Result<Option<TimeRange>> {
    let mut range: Option<TimeRange> = None;

    for path in walk_files(dir)? {
        if !is_metadata_file(&path) {
            continue;
        }
        let meta = match read_metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!("skipping metadata {}: {e:#}", path.display());
                continue;
            }
        };
        let Some(t) = parse_message_date(&meta.date) else {
            warn!("unparsable date {:?} in {}", meta.date, path.display());
            continue;
        };
        range = Some(match range {
            Some(r) => r.widen(t),
            None => TimeRange {
                earliest: t,
                latest: t,
            },
        });
    }

    Ok(range)
}

/// `<min>_to_<max>_<name>` with `YYYY-MM-DD` dates, or just `name`.
pub fn base_label(name: &str, range: Option<TimeRange>) -> String {
    match range {
        Some(r) => format!(
            "{}_to_{}_{}",
            r.earliest.format("%Y-%m-%d"),
            r.latest.format("%Y-%m-%d"),
            name
        ),
        None => name.to_string(),
    }
}
