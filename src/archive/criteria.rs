use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("start date {start} is after end date {end}")]
pub struct InvalidRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Optional `[start, end)` bounds on message dates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateFilter {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn validate(&self) -> Result<(), InvalidRange> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start > end => Err(InvalidRange { start, end }),
            _ => Ok(()),
        }
    }

    /// `SINCE`/`BEFORE` clauses, or `None` when unbounded.
    pub fn criteria(&self) -> Option<String> {
        let clauses: Vec<String> = [
            self.start.map(|d| format!("SINCE {}", imap_date(d))),
            self.end.map(|d| format!("BEFORE {}", imap_date(d))),
        ]
        .into_iter()
        .flatten()
        .collect();

        (!clauses.is_empty()).then(|| clauses.join(" "))
    }

    pub fn search_query(&self) -> String {
        self.criteria().unwrap_or_else(|| "ALL".to_string())
    }
}

/// `DD-Mon-YYYY`, as `SEARCH` expects.
pub fn imap_date(d: NaiveDate) -> String {
    d.format("%d-%b-%Y").to_string()
}

/// Parses a `YYYY-MM-DD` command-line date.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format: {s}. Use YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn no_bounds_means_all() {
        let f = DateFilter::default();
        assert_eq!(f.criteria(), None);
        assert_eq!(f.search_query(), "ALL");
    }

    #[test]
    fn both_bounds() {
        let f = DateFilter::new(Some(d(2023, 1, 1)), Some(d(2023, 12, 31)));
        assert_eq!(f.search_query(), "SINCE 01-Jan-2023 BEFORE 31-Dec-2023");
    }

    #[test]
    fn single_bounds_omit_the_other_clause() {
        assert_eq!(
            DateFilter::new(Some(d(2022, 3, 7)), None).search_query(),
            "SINCE 07-Mar-2022"
        );
        assert_eq!(
            DateFilter::new(None, Some(d(2021, 11, 30))).search_query(),
            "BEFORE 30-Nov-2021"
        );
    }

    #[test]
    fn rejects_inverted_range() {
        let f = DateFilter::new(Some(d(2024, 2, 1)), Some(d(2024, 1, 1)));
        assert_eq!(
            f.validate(),
            Err(InvalidRange {
                start: d(2024, 2, 1),
                end: d(2024, 1, 1)
            })
        );
        assert!(DateFilter::new(Some(d(2024, 1, 1)), Some(d(2024, 1, 1)))
            .validate()
            .is_ok());
    }

    #[test]
    fn parses_cli_dates() {
        assert_eq!(parse_date("2023-06-15"), Ok(d(2023, 6, 15)));
        assert!(parse_date("15/06/2023").is_err());
    }
}
