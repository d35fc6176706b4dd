use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    Appointment, AppointmentDetail, AppointmentStatus, NonWorkingDay, Specialty, User,
};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn now_str() -> String {
    Utc::now().naive_utc().format(DATETIME_FMT).to_string()
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|_| anyhow::anyhow!("bad date in row: {s}"))
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FMT).map_err(|_| anyhow::anyhow!("bad time in row: {s}"))
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).unwrap_or_else(|_| Utc::now().naive_utc())
}

fn parse_status(s: &str) -> anyhow::Result<AppointmentStatus> {
    AppointmentStatus::parse(s).ok_or_else(|| anyhow::anyhow!("unknown status in row: {s}"))
}

// ── Specialties ──

pub fn list_active_specialties(conn: &Connection) -> anyhow::Result<Vec<Specialty>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, duration_minutes, price, active
         FROM specialties WHERE active = 1 ORDER BY name",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(Specialty {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            duration_minutes: row.get(3)?,
            price: row.get(4)?,
            active: row.get::<_, i64>(5)? != 0,
        })
    })?;

    let mut specialties = vec![];
    for row in rows {
        specialties.push(row?);
    }
    Ok(specialties)
}

pub fn get_active_specialty(conn: &Connection, id: i64) -> anyhow::Result<Option<Specialty>> {
    let result = conn.query_row(
        "SELECT id, name, description, duration_minutes, price, active
         FROM specialties WHERE id = ?1 AND active = 1",
        params![id],
        |row| {
            Ok(Specialty {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                duration_minutes: row.get(3)?,
                price: row.get(4)?,
                active: row.get::<_, i64>(5)? != 0,
            })
        },
    );

    match result {
        Ok(specialty) => Ok(Some(specialty)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Users ──

pub fn get_user(conn: &Connection, id: i64) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        "SELECT id, first_name, last_name, email, phone, role, active
         FROM users WHERE id = ?1",
        params![id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                email: row.get(3)?,
                phone: row.get(4)?,
                role: row.get(5)?,
                active: row.get::<_, i64>(6)? != 0,
            })
        },
    );

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_user(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    email: &str,
    role: &str,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO users (first_name, last_name, email, role) VALUES (?1, ?2, ?3, ?4)",
        params![first_name, last_name, email, role],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Appointments ──

const APPOINTMENT_COLS: &str = "id, user_id, specialty_id, appointment_date, appointment_time, \
     status, notes, cancelled_by_admin, reminder_24h_sent, reminder_2h_sent, \
     created_at, updated_at";

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let date_str: String = row.get(3)?;
    let time_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(10)?;
    let updated_at_str: String = row.get(11)?;

    Ok(Appointment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        specialty_id: row.get(2)?,
        appointment_date: parse_date(&date_str)?,
        appointment_time: parse_time(&time_str)?,
        status: parse_status(&status_str)?,
        notes: row.get(6)?,
        cancelled_by_admin: row.get::<_, i64>(7)? != 0,
        reminder_24h_sent: row.get::<_, i64>(8)? != 0,
        reminder_2h_sent: row.get::<_, i64>(9)? != 0,
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

const DETAIL_COLS: &str = "a.id, a.user_id, a.appointment_date, a.appointment_time, a.status, \
     a.notes, a.cancelled_by_admin, u.first_name || ' ' || u.last_name, u.email, \
     s.name, s.duration_minutes, s.price, a.created_at";

const DETAIL_FROM: &str = "FROM appointments a
     JOIN users u ON u.id = a.user_id
     JOIN specialties s ON s.id = a.specialty_id";

fn parse_detail_row(row: &rusqlite::Row) -> anyhow::Result<AppointmentDetail> {
    let date_str: String = row.get(2)?;
    let time_str: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let created_at_str: String = row.get(12)?;

    Ok(AppointmentDetail {
        id: row.get(0)?,
        user_id: row.get(1)?,
        appointment_date: parse_date(&date_str)?,
        appointment_time: parse_time(&time_str)?,
        status: parse_status(&status_str)?,
        notes: row.get(5)?,
        cancelled_by_admin: row.get::<_, i64>(6)? != 0,
        patient_name: row.get(7)?,
        patient_email: row.get(8)?,
        specialty_name: row.get(9)?,
        duration_minutes: row.get(10)?,
        price: row.get(11)?,
        created_at: parse_datetime(&created_at_str),
    })
}

/// Times already reserved on a date by appointments still occupying their slot.
pub fn occupied_times(conn: &Connection, date: NaiveDate) -> anyhow::Result<Vec<NaiveTime>> {
    let date_str = date.format(DATE_FMT).to_string();
    let mut stmt = conn.prepare(
        "SELECT appointment_time FROM appointments
         WHERE appointment_date = ?1 AND status NOT IN ('cancelled', 'no_show')
         ORDER BY appointment_time",
    )?;

    let rows = stmt.query_map(params![date_str], |row| row.get::<_, String>(0))?;

    let mut times = vec![];
    for row in rows {
        times.push(parse_time(&row?)?);
    }
    Ok(times)
}

pub fn slot_is_taken(conn: &Connection, date: NaiveDate, time: NaiveTime) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE appointment_date = ?1 AND appointment_time = ?2
         AND status NOT IN ('cancelled', 'no_show')",
        params![
            date.format(DATE_FMT).to_string(),
            time.format(TIME_FMT).to_string()
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn count_confirmed_for_patient(conn: &Connection, user_id: i64) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE user_id = ?1 AND status = 'confirmed'",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// A released row (cancelled/no-show) at this slot, if one exists, for reuse.
pub fn find_released_slot(
    conn: &Connection,
    date: NaiveDate,
    time: NaiveTime,
) -> anyhow::Result<Option<i64>> {
    let result = conn.query_row(
        "SELECT id FROM appointments
         WHERE appointment_date = ?1 AND appointment_time = ?2
         AND status IN ('cancelled', 'no_show')
         LIMIT 1",
        params![
            date.format(DATE_FMT).to_string(),
            time.format(TIME_FMT).to_string()
        ],
        |row| row.get(0),
    );

    match result {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Rebook a released row in place. The row id (and created_at) survive the
/// cancel/rebook cycle.
pub fn reuse_appointment(
    conn: &Connection,
    id: i64,
    user_id: i64,
    specialty_id: i64,
    notes: Option<&str>,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE appointments
         SET user_id = ?1, specialty_id = ?2, notes = ?3, status = 'confirmed',
             cancelled_by_admin = 0, reminder_24h_sent = 0, reminder_2h_sent = 0,
             updated_at = ?4
         WHERE id = ?5",
        params![user_id, specialty_id, notes, now_str(), id],
    )?;
    Ok(())
}

/// Raw rusqlite result so the caller can map a unique-index violation on the
/// active-slot index to a conflict.
pub fn insert_appointment(
    conn: &Connection,
    user_id: i64,
    specialty_id: i64,
    date: NaiveDate,
    time: NaiveTime,
    notes: Option<&str>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO appointments
         (user_id, specialty_id, appointment_date, appointment_time, notes, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'confirmed', ?6, ?6)",
        params![
            user_id,
            specialty_id,
            date.format(DATE_FMT).to_string(),
            time.format(TIME_FMT).to_string(),
            notes,
            now_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_appointment(conn: &Connection, id: i64) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        &format!("SELECT {APPOINTMENT_COLS} FROM appointments WHERE id = ?1"),
        params![id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appointment) => Ok(Some(appointment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_appointment_detail(
    conn: &Connection,
    id: i64,
) -> anyhow::Result<Option<AppointmentDetail>> {
    let result = conn.query_row(
        &format!("SELECT {DETAIL_COLS} {DETAIL_FROM} WHERE a.id = ?1"),
        params![id],
        |row| Ok(parse_detail_row(row)),
    );

    match result {
        Ok(detail) => Ok(Some(detail?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_appointments_for_patient(
    conn: &Connection,
    user_id: i64,
) -> anyhow::Result<Vec<AppointmentDetail>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DETAIL_COLS} {DETAIL_FROM}
         WHERE a.user_id = ?1
         ORDER BY a.appointment_date DESC, a.appointment_time DESC"
    ))?;

    let rows = stmt.query_map(params![user_id], |row| Ok(parse_detail_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub struct AppointmentFilter {
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub limit: i64,
    pub offset: i64,
}

pub fn admin_list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> anyhow::Result<(Vec<AppointmentDetail>, i64)> {
    let mut where_clauses = vec!["1=1".to_string()];
    let mut filter_params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(date) = filter.date {
        where_clauses.push(format!("a.appointment_date = ?{}", filter_params.len() + 1));
        filter_params.push(Box::new(date.format(DATE_FMT).to_string()));
    }
    if let Some(status) = filter.status {
        where_clauses.push(format!("a.status = ?{}", filter_params.len() + 1));
        filter_params.push(Box::new(status.as_str().to_string()));
    }

    let where_sql = where_clauses.join(" AND ");

    let total: i64 = {
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            filter_params.iter().map(|p| p.as_ref()).collect();
        conn.query_row(
            &format!("SELECT COUNT(*) {DETAIL_FROM} WHERE {where_sql}"),
            params_refs.as_slice(),
            |row| row.get(0),
        )?
    };

    let sql = format!(
        "SELECT {DETAIL_COLS} {DETAIL_FROM} WHERE {where_sql}
         ORDER BY a.id DESC LIMIT ?{} OFFSET ?{}",
        filter_params.len() + 1,
        filter_params.len() + 2,
    );
    filter_params.push(Box::new(filter.limit));
    filter_params.push(Box::new(filter.offset));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        filter_params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_detail_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok((appointments, total))
}

pub fn update_appointment_status(
    conn: &Connection,
    id: i64,
    status: AppointmentStatus,
    notes: Option<&str>,
    cancelled_by_admin: bool,
) -> anyhow::Result<bool> {
    let count = match notes {
        Some(notes) => conn.execute(
            "UPDATE appointments
             SET status = ?1, notes = ?2, cancelled_by_admin = ?3, updated_at = ?4
             WHERE id = ?5",
            params![status.as_str(), notes, cancelled_by_admin as i64, now_str(), id],
        )?,
        None => conn.execute(
            "UPDATE appointments
             SET status = ?1, cancelled_by_admin = ?2, updated_at = ?3
             WHERE id = ?4",
            params![status.as_str(), cancelled_by_admin as i64, now_str(), id],
        )?,
    };
    Ok(count > 0)
}

pub fn delete_appointment(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Bulk cancellation for non-working days ──

/// Appointments in the date range that a block would cancel: everything not
/// already cancelled, completed or marked no-show.
pub fn non_terminal_between(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<Vec<AppointmentDetail>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DETAIL_COLS} {DETAIL_FROM}
         WHERE a.appointment_date BETWEEN ?1 AND ?2
         AND a.status NOT IN ('cancelled', 'completed', 'no_show')
         ORDER BY a.appointment_date, a.appointment_time"
    ))?;

    let rows = stmt.query_map(
        params![
            start.format(DATE_FMT).to_string(),
            end.format(DATE_FMT).to_string()
        ],
        |row| Ok(parse_detail_row(row)),
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn bulk_cancel_between(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
    reason: &str,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE appointments
         SET status = 'cancelled', cancelled_by_admin = 1,
             notes = TRIM(COALESCE(notes, '') || ' - cancelled, non-working day: ' || ?1),
             updated_at = ?2
         WHERE appointment_date BETWEEN ?3 AND ?4
         AND status NOT IN ('cancelled', 'completed', 'no_show')",
        params![
            reason,
            now_str(),
            start.format(DATE_FMT).to_string(),
            end.format(DATE_FMT).to_string()
        ],
    )?;
    Ok(count)
}

// ── Reminders ──

pub fn unsent_24h_reminders(
    conn: &Connection,
    date: NaiveDate,
) -> anyhow::Result<Vec<AppointmentDetail>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DETAIL_COLS} {DETAIL_FROM}
         WHERE a.appointment_date = ?1
         AND a.status IN ('scheduled', 'confirmed')
         AND a.reminder_24h_sent = 0
         AND u.email != ''
         ORDER BY a.appointment_time"
    ))?;

    let rows = stmt.query_map(params![date.format(DATE_FMT).to_string()], |row| {
        Ok(parse_detail_row(row))
    })?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Same-day appointments still waiting for their 2-hour reminder. The caller
/// narrows to the actual send window; SQLite has no interval arithmetic worth
/// pushing this into.
pub fn unsent_2h_candidates(
    conn: &Connection,
    date: NaiveDate,
) -> anyhow::Result<Vec<AppointmentDetail>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DETAIL_COLS} {DETAIL_FROM}
         WHERE a.appointment_date = ?1
         AND a.status IN ('scheduled', 'confirmed')
         AND a.reminder_2h_sent = 0
         AND u.email != ''
         ORDER BY a.appointment_time"
    ))?;

    let rows = stmt.query_map(params![date.format(DATE_FMT).to_string()], |row| {
        Ok(parse_detail_row(row))
    })?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn mark_24h_reminder_sent(conn: &Connection, id: i64) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE appointments SET reminder_24h_sent = 1, reminder_24h_sent_at = ?1 WHERE id = ?2",
        params![now_str(), id],
    )?;
    Ok(())
}

pub fn mark_2h_reminder_sent(conn: &Connection, id: i64) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE appointments SET reminder_2h_sent = 1, reminder_2h_sent_at = ?1 WHERE id = ?2",
        params![now_str(), id],
    )?;
    Ok(())
}

// ── Non-working days ──

fn parse_block_row(row: &rusqlite::Row) -> anyhow::Result<NonWorkingDay> {
    let start_str: String = row.get(1)?;
    let end_str: String = row.get(2)?;

    Ok(NonWorkingDay {
        id: row.get(0)?,
        start_date: parse_date(&start_str)?,
        end_date: parse_date(&end_str)?,
        reason: row.get(3)?,
        description: row.get(4)?,
    })
}

pub fn insert_block(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
    reason: &str,
    description: Option<&str>,
) -> anyhow::Result<NonWorkingDay> {
    conn.execute(
        "INSERT INTO non_working_days (start_date, end_date, reason, description)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            start.format(DATE_FMT).to_string(),
            end.format(DATE_FMT).to_string(),
            reason,
            description
        ],
    )?;

    Ok(NonWorkingDay {
        id: conn.last_insert_rowid(),
        start_date: start,
        end_date: end,
        reason: reason.to_string(),
        description: description.map(|s| s.to_string()),
    })
}

pub fn blocks_overlapping(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<Vec<NonWorkingDay>> {
    let mut stmt = conn.prepare(
        "SELECT id, start_date, end_date, reason, description
         FROM non_working_days
         WHERE start_date <= ?2 AND end_date >= ?1
         ORDER BY start_date",
    )?;

    let rows = stmt.query_map(
        params![
            start.format(DATE_FMT).to_string(),
            end.format(DATE_FMT).to_string()
        ],
        |row| Ok(parse_block_row(row)),
    )?;

    let mut blocks = vec![];
    for row in rows {
        blocks.push(row??);
    }
    Ok(blocks)
}

pub fn list_blocks(conn: &Connection) -> anyhow::Result<Vec<NonWorkingDay>> {
    let mut stmt = conn.prepare(
        "SELECT id, start_date, end_date, reason, description
         FROM non_working_days ORDER BY start_date",
    )?;

    let rows = stmt.query_map([], |row| Ok(parse_block_row(row)))?;

    let mut blocks = vec![];
    for row in rows {
        blocks.push(row??);
    }
    Ok(blocks)
}

pub fn delete_block(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM non_working_days WHERE id = ?1", params![id])?;
    Ok(count > 0)
}
