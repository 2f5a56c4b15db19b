use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Utc};

/// Half-open validity window of a rate.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Validity {
    /// Inclusive.
    pub from: DateTime<Utc>,

    /// Exclusive. `None` means the rate stays valid indefinitely.
    pub until: Option<DateTime<Utc>>,
}

impl Debug for Validity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.until {
            Some(until) => write!(f, "{:?}..{:?}", self.from, until),
            None => write!(f, "{:?}..", self.from),
        }
    }
}

impl Validity {
    pub const fn new(from: DateTime<Utc>, until: Option<DateTime<Utc>>) -> Self {
        Self { from, until }
    }

    pub const fn open(from: DateTime<Utc>) -> Self {
        Self { from, until: None }
    }

    pub fn contains(self, at: DateTime<Utc>) -> bool {
        (self.from <= at) && self.until.is_none_or(|until| at < until)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_contains_half_open() {
        let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2025, 1, 1, 0, 30, 0).unwrap();
        let validity = Validity::new(from, Some(until));
        assert!(validity.contains(from));
        assert!(validity.contains(until - chrono::TimeDelta::seconds(1)));
        assert!(!validity.contains(until));
        assert!(!validity.contains(from - chrono::TimeDelta::seconds(1)));
    }

    #[test]
    fn test_open_ended_contains_any_later_time() {
        let from = Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap();
        let validity = Validity::open(from);
        for days in [0, 1, 365, 10_000] {
            assert!(validity.contains(from + chrono::TimeDelta::days(days)));
        }
        assert!(!validity.contains(from - chrono::TimeDelta::minutes(30)));
    }
}
