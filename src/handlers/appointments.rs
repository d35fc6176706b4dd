use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Datelike, Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::AppointmentDetail;
use crate::services::{availability, booking, notifications};
use crate::state::AppState;

#[derive(Serialize)]
pub struct AppointmentResponse {
    id: i64,
    appointment_date: String,
    appointment_time: String,
    status: String,
    notes: Option<String>,
    cancelled_by_admin: bool,
    patient_name: String,
    specialty_name: String,
    duration_minutes: i64,
    price: f64,
}

impl AppointmentResponse {
    pub fn from_detail(detail: &AppointmentDetail) -> Self {
        Self {
            id: detail.id,
            appointment_date: detail.appointment_date.to_string(),
            appointment_time: detail.appointment_time.format("%H:%M").to_string(),
            status: detail.status.as_str().to_string(),
            notes: detail.notes.clone(),
            cancelled_by_admin: detail.cancelled_by_admin,
            patient_name: detail.patient_name.clone(),
            specialty_name: detail.specialty_name.clone(),
            duration_minutes: detail.duration_minutes,
            price: detail.price,
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| AppError::InvalidInput("date must be formatted as YYYY-MM-DD".to_string()))
}

fn parse_time(s: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| AppError::InvalidInput("time must be formatted as HH:MM".to_string()))
}

// GET /api/appointments/available-slots
#[derive(Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: Option<String>,
    pub specialty_id: Option<i64>,
}

#[derive(Serialize)]
pub struct AvailableSlotsResponse {
    available_slots: Vec<String>,
    total_slots: usize,
    booked_slots: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

pub async fn available_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<AvailableSlotsResponse>, AppError> {
    let date_str = query.date.ok_or_else(|| {
        AppError::InvalidInput("date and specialty_id are required".to_string())
    })?;
    let specialty_id = query.specialty_id.ok_or_else(|| {
        AppError::InvalidInput("date and specialty_id are required".to_string())
    })?;
    let date = parse_date(&date_str)?;
    let today = Local::now().date_naive();

    let result = {
        let db = state.db.lock().unwrap();
        availability::resolve_availability(&db, &state.schedule, date, specialty_id, today)?
    };

    let message = match &result.blocked_reason {
        Some(reason) => Some(format!("Non-working day: {reason}")),
        None if result.total == 0 => {
            Some("No appointments are available on this date".to_string())
        }
        None => None,
    };

    Ok(Json(AvailableSlotsResponse {
        available_slots: result
            .available
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect(),
        total_slots: result.total,
        booked_slots: result.booked,
        message,
    }))
}

// POST /api/appointments
#[derive(Deserialize)]
pub struct CreateAppointmentRequest {
    pub specialty_id: i64,
    pub appointment_date: String,
    pub appointment_time: String,
    pub notes: Option<String>,
}

pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let principal = auth::authenticate(&headers, &state.config.jwt_secret)?;

    let request = booking::BookingRequest {
        specialty_id: body.specialty_id,
        date: parse_date(&body.appointment_date)?,
        time: parse_time(&body.appointment_time)?,
        notes: body.notes,
    };
    let today = Local::now().date_naive();

    let detail = {
        let mut db = state.db.lock().unwrap();
        let tx = db.transaction()?;
        let appointment = booking::book_appointment(&tx, &request, principal.id, today)?;
        let detail = queries::get_appointment_detail(&tx, appointment.id)?;
        tx.commit()?;
        detail.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("appointment missing after commit"))
        })?
    };

    let (subject, mail_body) = notifications::confirmation(&detail);
    notifications::send_in_background(&state, detail.patient_email.clone(), subject, mail_body);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "appointment booked",
            "appointment": AppointmentResponse::from_detail(&detail),
        })),
    ))
}

// GET /api/appointments
pub async fn list_my_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = auth::authenticate(&headers, &state.config.jwt_secret)?;

    let appointments = {
        let db = state.db.lock().unwrap();
        queries::list_appointments_for_patient(&db, principal.id)?
    };

    let response: Vec<AppointmentResponse> = appointments
        .iter()
        .map(AppointmentResponse::from_detail)
        .collect();
    Ok(Json(serde_json::json!({ "appointments": response })))
}

// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = auth::authenticate(&headers, &state.config.jwt_secret)?;

    let detail = {
        let db = state.db.lock().unwrap();
        queries::get_appointment_detail(&db, id)?
    }
    .ok_or(AppError::NotFound("appointment"))?;

    if !principal.is_admin() && principal.id != detail.user_id {
        return Err(AppError::Forbidden);
    }

    Ok(Json(serde_json::json!({
        "appointment": AppointmentResponse::from_detail(&detail)
    })))
}

// PUT /api/appointments/:id/cancel
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = auth::authenticate(&headers, &state.config.jwt_secret)?;
    let now = Local::now().naive_local();

    let detail = {
        let mut db = state.db.lock().unwrap();
        let tx = db.transaction()?;
        booking::cancel_appointment(&tx, id, &principal, now)?;
        let detail = queries::get_appointment_detail(&tx, id)?;
        tx.commit()?;
        detail
    };

    if let Some(detail) = detail {
        let (subject, mail_body) =
            notifications::cancellation(&detail, None, principal.is_admin());
        notifications::send_in_background(
            &state,
            detail.patient_email.clone(),
            subject,
            mail_body,
        );
    }

    Ok(Json(serde_json::json!({
        "message": "appointment cancelled",
        "appointment_id": id,
    })))
}

// GET /api/non-working-days
#[derive(Deserialize)]
pub struct BlockedDatesQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Serialize)]
pub struct BlockedDateResponse {
    date: String,
    reason: String,
    description: Option<String>,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Public read path for the booking calendar: every block expanded to its
/// individual dates.
pub async fn non_working_days(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BlockedDatesQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let blocks = {
        let db = state.db.lock().unwrap();
        queries::list_blocks(&db)?
    };

    let mut blocked_dates = Vec::new();
    for block in &blocks {
        let kind = if block.is_single_day() { "single" } else { "range" };
        for date in block.dates() {
            if let Some(year) = query.year {
                if date.year() != year {
                    continue;
                }
            }
            if let Some(month) = query.month {
                if date.month() != month {
                    continue;
                }
            }
            blocked_dates.push(BlockedDateResponse {
                date: date.to_string(),
                reason: block.reason.clone(),
                description: block.description.clone(),
                kind,
            });
        }
    }
    blocked_dates.sort_by(|a, b| a.date.cmp(&b.date));

    Ok(Json(serde_json::json!({ "blocked_dates": blocked_dates })))
}
