use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::ScheduleTemplate;
use crate::services::slots;

/// The bookable picture for one date. `booked` counts every occupied slot on
/// the date, so the client can show utilisation next to the free list.
#[derive(Debug, PartialEq)]
pub struct DayAvailability {
    pub available: Vec<NaiveTime>,
    pub total: usize,
    pub booked: usize,
    pub blocked_reason: Option<String>,
}

/// Read-only and idempotent; the client polls this while the patient picks a
/// slot, the booking path re-validates on commit.
pub fn resolve_availability(
    conn: &Connection,
    template: &ScheduleTemplate,
    date: NaiveDate,
    specialty_id: i64,
    today: NaiveDate,
) -> Result<DayAvailability, AppError> {
    if date < today {
        return Err(AppError::InvalidInput(
            "appointments cannot be booked on past dates".to_string(),
        ));
    }

    queries::get_active_specialty(conn, specialty_id)?.ok_or(AppError::NotFound("specialty"))?;

    // A blocked date short-circuits before any booking lookup.
    if let Some(block) = queries::blocks_overlapping(conn, date, date)?.into_iter().next() {
        return Ok(DayAvailability {
            available: vec![],
            total: 0,
            booked: 0,
            blocked_reason: Some(block.reason),
        });
    }

    let nominal = slots::generate_slots(template, date);
    let occupied: HashSet<NaiveTime> = queries::occupied_times(conn, date)?.into_iter().collect();

    let available = nominal
        .iter()
        .filter(|slot| !occupied.contains(slot))
        .copied()
        .collect();

    Ok(DayAvailability {
        available,
        total: nominal.len(),
        booked: occupied.len(),
        blocked_reason: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::services::{blocking, booking};

    fn setup() -> (Connection, ScheduleTemplate) {
        let conn = db::init_db(":memory:").unwrap();
        queries::insert_user(&conn, "Ana", "Suarez", "ana@example.com", "patient").unwrap();
        (conn, ScheduleTemplate::clinic_default())
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn time(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn test_open_monday_full_grid() {
        let (conn, template) = setup();
        let result =
            resolve_availability(&conn, &template, date("2024-06-03"), 1, date("2024-06-01"))
                .unwrap();
        assert_eq!(result.total, 7);
        assert_eq!(result.booked, 0);
        assert_eq!(result.available.len(), 7);
        assert_eq!(result.available[0], time("09:00"));
        assert_eq!(result.available[6], time("12:00"));
        assert!(result.blocked_reason.is_none());
    }

    #[test]
    fn test_past_date_rejected() {
        let (conn, template) = setup();
        let result =
            resolve_availability(&conn, &template, date("2024-06-03"), 1, date("2024-06-04"));
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_today_is_bookable() {
        let (conn, template) = setup();
        let result =
            resolve_availability(&conn, &template, date("2024-06-03"), 1, date("2024-06-03"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_unknown_specialty() {
        let (conn, template) = setup();
        let result =
            resolve_availability(&conn, &template, date("2024-06-03"), 999, date("2024-06-01"));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_booked_slot_removed() {
        let (conn, template) = setup();
        let request = booking::BookingRequest {
            specialty_id: 1,
            date: date("2024-06-03"),
            time: time("09:30"),
            notes: None,
        };
        booking::book_appointment(&conn, &request, 1, date("2024-06-01")).unwrap();

        let result =
            resolve_availability(&conn, &template, date("2024-06-03"), 1, date("2024-06-01"))
                .unwrap();
        assert_eq!(result.total, 7);
        assert_eq!(result.booked, 1);
        assert_eq!(result.available.len(), 6);
        assert!(!result.available.contains(&time("09:30")));
    }

    #[test]
    fn test_blocked_date_short_circuits() {
        let (conn, template) = setup();
        blocking::block_day(&conn, date("2024-06-03"), "staff training", None).unwrap();

        let result =
            resolve_availability(&conn, &template, date("2024-06-03"), 1, date("2024-06-01"))
                .unwrap();
        assert!(result.available.is_empty());
        assert_eq!(result.total, 0);
        assert_eq!(result.blocked_reason.as_deref(), Some("staff training"));
    }

    #[test]
    fn test_idempotent() {
        let (conn, template) = setup();
        let request = booking::BookingRequest {
            specialty_id: 1,
            date: date("2024-06-03"),
            time: time("10:00"),
            notes: None,
        };
        booking::book_appointment(&conn, &request, 1, date("2024-06-01")).unwrap();

        let first =
            resolve_availability(&conn, &template, date("2024-06-03"), 1, date("2024-06-01"))
                .unwrap();
        let second =
            resolve_availability(&conn, &template, date("2024-06-03"), 1, date("2024-06-01"))
                .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_weekend_empty_but_not_blocked() {
        let (conn, template) = setup();
        let result =
            resolve_availability(&conn, &template, date("2024-06-01"), 1, date("2024-06-01"))
                .unwrap();
        assert_eq!(result.total, 0);
        assert!(result.available.is_empty());
        assert!(result.blocked_reason.is_none());
    }
}
