use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// A calendar month: year plus 0-based month index (0 = January).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month_index: u8,
}

impl Period {
    /// Returns None when `month_index` is outside 0..=11.
    pub fn new(year: i32, month_index: u8) -> Option<Self> {
        (month_index < 12).then_some(Self { year, month_index })
    }

    /// The period a timestamp falls in (UTC).
    pub fn of(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month_index: at.month0() as u8,
        }
    }

    /// Current period from wall-clock UTC time.
    pub fn current() -> Self {
        Self::of(Utc::now())
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        Self::of(at) == *self
    }

    /// Parse "YYYY-MM" (1-based month, as people write it).
    pub fn parse(s: &str) -> Option<Self> {
        let (y, m) = s.trim().split_once('-')?;
        let year: i32 = y.parse().ok()?;
        let month: u8 = m.parse().ok()?;
        if month == 0 {
            return None;
        }
        Self::new(year, month - 1)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month_index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn month_index_is_zero_based() {
        let at = Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 59).unwrap();
        assert_eq!(Period::of(at), Period::new(2026, 0).unwrap());
        let at = Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(Period::of(at).month_index, 11);
    }

    #[test]
    fn rejects_month_twelve() {
        assert!(Period::new(2026, 12).is_none());
    }

    #[test]
    fn parse_and_display() {
        let p = Period::parse("2026-03").unwrap();
        assert_eq!(p, Period { year: 2026, month_index: 2 });
        assert_eq!(p.to_string(), "2026-03");
        assert!(Period::parse("2026-00").is_none());
        assert!(Period::parse("2026-13").is_none());
        assert!(Period::parse("march").is_none());
    }

    #[test]
    fn contains_checks_year_too() {
        let p = Period::new(2026, 4).unwrap();
        assert!(p.contains(Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap()));
        assert!(!p.contains(Utc.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap()));
    }
}
