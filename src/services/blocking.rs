use std::collections::BTreeSet;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{AppointmentDetail, NonWorkingDay};

pub const MAX_RANGE_DAYS: i64 = 365;

/// The created block plus the appointments it force-cancelled, so the caller
/// can notify each affected patient.
#[derive(Debug)]
pub struct BlockOutcome {
    pub block: NonWorkingDay,
    pub cancelled: Vec<AppointmentDetail>,
}

pub fn block_day(
    conn: &Connection,
    date: NaiveDate,
    reason: &str,
    description: Option<&str>,
) -> Result<BlockOutcome, AppError> {
    if reason.trim().is_empty() {
        return Err(AppError::InvalidInput("a reason is required".to_string()));
    }
    if !queries::blocks_overlapping(conn, date, date)?.is_empty() {
        return Err(AppError::Conflict(
            "this date is already blocked".to_string(),
        ));
    }

    apply_block(conn, date, date, reason, description)
}

pub fn block_range(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
    reason: &str,
    description: Option<&str>,
) -> Result<BlockOutcome, AppError> {
    if reason.trim().is_empty() {
        return Err(AppError::InvalidInput("a reason is required".to_string()));
    }
    if end <= start {
        return Err(AppError::InvalidInput(
            "the end date must be after the start date".to_string(),
        ));
    }
    if (end - start).num_days() > MAX_RANGE_DAYS {
        return Err(AppError::InvalidInput(
            "a blocked period cannot exceed 365 days".to_string(),
        ));
    }

    let overlapping = queries::blocks_overlapping(conn, start, end)?;
    if !overlapping.is_empty() {
        let collisions = colliding_dates(&overlapping, start, end);
        return Err(AppError::Conflict(format!(
            "the following dates are already blocked: {}",
            collisions
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    apply_block(conn, start, end, reason, description)
}

/// Unblocking never resurrects the appointments the block cancelled.
pub fn unblock(conn: &Connection, id: i64) -> Result<(), AppError> {
    if queries::delete_block(conn, id)? {
        Ok(())
    } else {
        Err(AppError::NotFound("non-working day"))
    }
}

fn apply_block(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
    reason: &str,
    description: Option<&str>,
) -> Result<BlockOutcome, AppError> {
    // Snapshot the rows first; the bulk update erases which ones it touched.
    let cancelled = queries::non_terminal_between(conn, start, end)?;
    queries::bulk_cancel_between(conn, start, end, reason)?;
    let block = queries::insert_block(conn, start, end, reason, description)?;

    Ok(BlockOutcome { block, cancelled })
}

fn colliding_dates(blocks: &[NonWorkingDay], start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = BTreeSet::new();
    for block in blocks {
        for date in block.dates() {
            if start <= date && date <= end {
                dates.insert(date);
            }
        }
    }
    dates.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::AppointmentStatus;
    use crate::services::booking::{self, BookingRequest};
    use chrono::NaiveTime;

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::insert_user(&conn, "Ana", "Suarez", "ana@example.com", "patient").unwrap();
        queries::insert_user(&conn, "Bruno", "Gil", "bruno@example.com", "patient").unwrap();
        conn
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn book(conn: &Connection, patient: i64, date_s: &str, time_s: &str) -> i64 {
        let request = BookingRequest {
            specialty_id: 1,
            date: date(date_s),
            time: NaiveTime::parse_from_str(time_s, "%H:%M").unwrap(),
            notes: None,
        };
        booking::book_appointment(conn, &request, patient, date("2024-06-01"))
            .unwrap()
            .id
    }

    #[test]
    fn test_block_day_cancels_non_terminal_only() {
        let conn = setup();
        let cancelled_id = book(&conn, 1, "2024-06-03", "09:00");
        let completed_id = book(&conn, 2, "2024-06-03", "09:30");
        booking::transition_status(&conn, completed_id, AppointmentStatus::Completed, None)
            .unwrap();
        let other_day_id = book(&conn, 1, "2024-06-04", "15:00");

        let outcome = blocking_block_day(&conn, "2024-06-03");
        assert_eq!(outcome.cancelled.len(), 1);
        assert_eq!(outcome.cancelled[0].id, cancelled_id);

        let status = |id: i64| {
            queries::get_appointment(&conn, id)
                .unwrap()
                .unwrap()
                .status
        };
        assert_eq!(status(cancelled_id), AppointmentStatus::Cancelled);
        assert_eq!(status(completed_id), AppointmentStatus::Completed);
        assert_eq!(status(other_day_id), AppointmentStatus::Confirmed);
    }

    fn blocking_block_day(conn: &Connection, date_s: &str) -> BlockOutcome {
        block_day(conn, date(date_s), "holiday", None).unwrap()
    }

    #[test]
    fn test_block_same_day_twice_conflicts() {
        let conn = setup();
        blocking_block_day(&conn, "2024-06-03");
        let again = block_day(&conn, date("2024-06-03"), "holiday", None);
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_block_day_requires_reason() {
        let conn = setup();
        let result = block_day(&conn, date("2024-06-03"), "  ", None);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_block_range_single_row_covering_all_days() {
        let conn = setup();
        let a = book(&conn, 1, "2024-06-03", "09:00");
        let b = book(&conn, 2, "2024-06-05", "09:00");

        let outcome =
            block_range(&conn, date("2024-06-03"), date("2024-06-05"), "works", None).unwrap();
        assert_eq!(outcome.block.start_date, date("2024-06-03"));
        assert_eq!(outcome.block.end_date, date("2024-06-05"));
        assert_eq!(outcome.block.dates().len(), 3);
        let cancelled_ids: Vec<i64> = outcome.cancelled.iter().map(|a| a.id).collect();
        assert_eq!(cancelled_ids, vec![a, b]);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM non_working_days", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_block_range_rejects_inverted_and_oversized() {
        let conn = setup();
        let inverted =
            block_range(&conn, date("2024-06-05"), date("2024-06-03"), "works", None);
        assert!(matches!(inverted, Err(AppError::InvalidInput(_))));

        let same_day = block_range(&conn, date("2024-06-03"), date("2024-06-03"), "works", None);
        assert!(matches!(same_day, Err(AppError::InvalidInput(_))));

        let oversized =
            block_range(&conn, date("2024-01-01"), date("2025-06-01"), "works", None);
        assert!(matches!(oversized, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_block_range_reports_colliding_dates() {
        let conn = setup();
        blocking_block_day(&conn, "2024-06-04");

        let result = block_range(&conn, date("2024-06-03"), date("2024-06-05"), "works", None);
        match result {
            Err(AppError::Conflict(message)) => assert!(message.contains("2024-06-04")),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_unblock_removes_block_but_not_cancellations() {
        let conn = setup();
        let appointment_id = book(&conn, 1, "2024-06-03", "09:00");
        let outcome = blocking_block_day(&conn, "2024-06-03");

        unblock(&conn, outcome.block.id).unwrap();
        assert!(queries::list_blocks(&conn).unwrap().is_empty());

        let appointment = queries::get_appointment(&conn, appointment_id)
            .unwrap()
            .unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Cancelled);
        assert!(appointment.cancelled_by_admin);
    }

    #[test]
    fn test_unblock_unknown_id() {
        let conn = setup();
        assert!(matches!(
            unblock(&conn, 42),
            Err(AppError::NotFound(_))
        ));
    }
}
