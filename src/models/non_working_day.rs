use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A block covering one or more calendar dates. Single-day blocks are stored
/// with `start_date == end_date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonWorkingDay {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub description: Option<String>,
}

impl NonWorkingDay {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn is_single_day(&self) -> bool {
        self.start_date == self.end_date
    }

    /// Every calendar date in the block, in order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut current = self.start_date;
        while current <= self.end_date {
            dates.push(current);
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }
        dates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(start: &str, end: &str) -> NonWorkingDay {
        NonWorkingDay {
            id: 1,
            start_date: start.parse().unwrap(),
            end_date: end.parse().unwrap(),
            reason: "holiday".to_string(),
            description: None,
        }
    }

    #[test]
    fn test_covers_bounds() {
        let b = block("2024-07-01", "2024-07-03");
        assert!(b.covers("2024-07-01".parse().unwrap()));
        assert!(b.covers("2024-07-02".parse().unwrap()));
        assert!(b.covers("2024-07-03".parse().unwrap()));
        assert!(!b.covers("2024-06-30".parse().unwrap()));
        assert!(!b.covers("2024-07-04".parse().unwrap()));
    }

    #[test]
    fn test_dates_expansion() {
        let b = block("2024-07-01", "2024-07-03");
        let dates: Vec<String> = b.dates().iter().map(|d| d.to_string()).collect();
        assert_eq!(dates, vec!["2024-07-01", "2024-07-02", "2024-07-03"]);
    }

    #[test]
    fn test_single_day() {
        let b = block("2024-07-01", "2024-07-01");
        assert!(b.is_single_day());
        assert_eq!(b.dates().len(), 1);
    }
}
