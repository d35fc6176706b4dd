use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;

use crate::auth::Principal;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus};

pub const MAX_CONFIRMED_APPOINTMENTS: i64 = 3;
pub const CANCELLATION_CUTOFF_HOURS: i64 = 2;
pub const MAX_NOTES_LEN: usize = 500;

#[derive(Debug)]
pub struct BookingRequest {
    pub specialty_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub notes: Option<String>,
}

/// Reserve a slot. Run inside a transaction: the occupancy re-check, the
/// patient cap and the write must commit as one unit, and the partial unique
/// index on active (date, time) rows catches whatever still races past the
/// check.
pub fn book_appointment(
    conn: &Connection,
    request: &BookingRequest,
    patient_id: i64,
    today: NaiveDate,
) -> Result<Appointment, AppError> {
    if let Some(notes) = &request.notes {
        if notes.len() > MAX_NOTES_LEN {
            return Err(AppError::InvalidInput(
                "notes cannot exceed 500 characters".to_string(),
            ));
        }
    }
    if request.date < today {
        return Err(AppError::InvalidInput(
            "appointments cannot be booked on past dates".to_string(),
        ));
    }

    queries::get_active_specialty(conn, request.specialty_id)?
        .ok_or(AppError::NotFound("specialty"))?;

    // Authoritative re-check; the availability endpoint the client saw is
    // stale by now.
    if queries::slot_is_taken(conn, request.date, request.time)? {
        return Err(AppError::SlotTaken);
    }

    if queries::count_confirmed_for_patient(conn, patient_id)? >= MAX_CONFIRMED_APPOINTMENTS {
        return Err(AppError::LimitExceeded);
    }

    // A cancelled or no-show row at this slot is rebooked in place, keeping
    // one row per physical slot across cancel/rebook cycles.
    let id = match queries::find_released_slot(conn, request.date, request.time)? {
        Some(id) => {
            queries::reuse_appointment(
                conn,
                id,
                patient_id,
                request.specialty_id,
                request.notes.as_deref(),
            )?;
            id
        }
        None => {
            match queries::insert_appointment(
                conn,
                patient_id,
                request.specialty_id,
                request.date,
                request.time,
                request.notes.as_deref(),
            ) {
                Ok(id) => id,
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(AppError::SlotTaken)
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    queries::get_appointment(conn, id)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("appointment {id} missing after write")))
}

pub fn cancel_appointment(
    conn: &Connection,
    id: i64,
    principal: &Principal,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    let appointment = queries::get_appointment(conn, id)?.ok_or(AppError::NotFound("appointment"))?;

    if !principal.is_admin() && principal.id != appointment.user_id {
        return Err(AppError::Forbidden);
    }

    match appointment.status {
        AppointmentStatus::Cancelled => return Err(AppError::AlreadyCancelled),
        AppointmentStatus::Completed => return Err(AppError::InvalidTransition),
        _ => {}
    }

    // Patients must cancel at least two hours ahead; staff may cancel any
    // time.
    if !principal.is_admin()
        && appointment.starts_at() - now < Duration::hours(CANCELLATION_CUTOFF_HOURS)
    {
        return Err(AppError::TooLate);
    }

    queries::update_appointment_status(
        conn,
        id,
        AppointmentStatus::Cancelled,
        None,
        principal.is_admin(),
    )?;

    queries::get_appointment(conn, id)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("appointment {id} missing after update")))
}

/// Staff-side status transition. Returns the updated appointment and whether
/// this call is what cancelled it (the caller sends the email only then).
pub fn transition_status(
    conn: &Connection,
    id: i64,
    status: AppointmentStatus,
    notes: Option<&str>,
) -> Result<(Appointment, bool), AppError> {
    let current = queries::get_appointment(conn, id)?.ok_or(AppError::NotFound("appointment"))?;

    // Reviving a released row must not collide with a booking that took the
    // slot in the meantime.
    if status.occupies_slot()
        && !current.status.occupies_slot()
        && queries::slot_is_taken(conn, current.appointment_date, current.appointment_time)?
    {
        return Err(AppError::SlotTaken);
    }

    let newly_cancelled =
        status == AppointmentStatus::Cancelled && current.status != AppointmentStatus::Cancelled;
    let cancelled_by_admin = if newly_cancelled {
        true
    } else {
        current.cancelled_by_admin
    };

    queries::update_appointment_status(conn, id, status, notes, cancelled_by_admin)?;

    let updated = queries::get_appointment(conn, id)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("appointment {id} missing after update")))?;
    Ok((updated, newly_cancelled))
}
