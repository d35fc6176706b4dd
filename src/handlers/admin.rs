use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::AppointmentStatus;
use crate::services::{blocking, booking, notifications, reminders};
use crate::state::AppState;

use super::appointments::AppointmentResponse;

// GET /api/admin/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub date: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = auth::authenticate(&headers, &state.config.jwt_secret)?;
    auth::require_admin(&principal)?;

    let date = query
        .date
        .as_deref()
        .map(|s| {
            s.parse().map_err(|_| {
                AppError::InvalidInput("date must be formatted as YYYY-MM-DD".to_string())
            })
        })
        .transpose()?;
    let status = query
        .status
        .as_deref()
        .map(|s| {
            AppointmentStatus::parse(s)
                .ok_or_else(|| AppError::InvalidInput(format!("unknown status: {s}")))
        })
        .transpose()?;

    let filter = queries::AppointmentFilter {
        date,
        status,
        limit: query.limit.unwrap_or(20),
        offset: query.offset.unwrap_or(0),
    };

    let (appointments, total) = {
        let db = state.db.lock().unwrap();
        queries::admin_list_appointments(&db, &filter)?
    };

    let response: Vec<AppointmentResponse> = appointments
        .iter()
        .map(AppointmentResponse::from_detail)
        .collect();

    Ok(Json(serde_json::json!({
        "appointments": response,
        "pagination": {
            "total": total,
            "limit": filter.limit,
            "offset": filter.offset,
            "has_more": filter.offset + filter.limit < total,
        },
    })))
}

// PUT /api/admin/appointments/:id/status
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub notes: Option<String>,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = auth::authenticate(&headers, &state.config.jwt_secret)?;
    auth::require_admin(&principal)?;

    let status = AppointmentStatus::parse(&body.status)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown status: {}", body.status)))?;
    if let Some(notes) = &body.notes {
        if notes.len() > booking::MAX_NOTES_LEN {
            return Err(AppError::InvalidInput(
                "notes cannot exceed 500 characters".to_string(),
            ));
        }
    }

    let (detail, newly_cancelled) = {
        let mut db = state.db.lock().unwrap();
        let tx = db.transaction()?;
        let (_, newly_cancelled) =
            booking::transition_status(&tx, id, status, body.notes.as_deref())?;
        let detail = queries::get_appointment_detail(&tx, id)?;
        tx.commit()?;
        (detail, newly_cancelled)
    };

    let detail = detail
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("appointment missing after update")))?;

    if newly_cancelled {
        let (subject, mail_body) =
            notifications::cancellation(&detail, body.notes.as_deref(), true);
        notifications::send_in_background(
            &state,
            detail.patient_email.clone(),
            subject,
            mail_body,
        );
    }

    Ok(Json(serde_json::json!({
        "message": "appointment updated",
        "appointment": AppointmentResponse::from_detail(&detail),
    })))
}

// DELETE /api/admin/appointments/:id
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = auth::authenticate(&headers, &state.config.jwt_secret)?;
    auth::require_admin(&principal)?;

    let deleted = {
        let db = state.db.lock().unwrap();
        queries::delete_appointment(&db, id)?
    };

    if deleted {
        Ok(Json(serde_json::json!({ "message": "appointment deleted" })))
    } else {
        Err(AppError::NotFound("appointment"))
    }
}

// POST /api/admin/appointments/:id/reminder
#[derive(Deserialize)]
pub struct SendReminderRequest {
    pub kind: Option<String>,
}

pub async fn send_reminder(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<SendReminderRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = auth::authenticate(&headers, &state.config.jwt_secret)?;
    auth::require_admin(&principal)?;

    let kind_str = body.kind.as_deref().unwrap_or("24h");
    let kind = notifications::ReminderKind::parse(kind_str)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown reminder kind: {kind_str}")))?;

    reminders::send_manual_reminder(&state, id, kind).await?;

    Ok(Json(serde_json::json!({ "message": "reminder sent" })))
}

// ── Non-working days ──

#[derive(Serialize)]
pub struct NonWorkingDayResponse {
    id: i64,
    start_date: String,
    end_date: String,
    reason: String,
    description: Option<String>,
}

impl NonWorkingDayResponse {
    fn from_model(block: &crate::models::NonWorkingDay) -> Self {
        Self {
            id: block.id,
            start_date: block.start_date.to_string(),
            end_date: block.end_date.to_string(),
            reason: block.reason.clone(),
            description: block.description.clone(),
        }
    }
}

// GET /api/admin/non-working-days
pub async fn list_blocks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = auth::authenticate(&headers, &state.config.jwt_secret)?;
    auth::require_admin(&principal)?;

    let blocks = {
        let db = state.db.lock().unwrap();
        queries::list_blocks(&db)?
    };

    let response: Vec<NonWorkingDayResponse> =
        blocks.iter().map(NonWorkingDayResponse::from_model).collect();
    Ok(Json(serde_json::json!({ "non_working_days": response })))
}

fn queue_block_cancellation_emails(
    state: &Arc<AppState>,
    outcome: &blocking::BlockOutcome,
) {
    let reason = format!("Non-working day: {}", outcome.block.reason);
    let emails: Vec<(String, String, String)> = outcome
        .cancelled
        .iter()
        .map(|appointment| {
            let (subject, body) =
                notifications::cancellation(appointment, Some(reason.as_str()), true);
            (appointment.patient_email.clone(), subject, body)
        })
        .collect();
    notifications::send_bulk_in_background(state, emails);
}

// POST /api/admin/non-working-days
#[derive(Deserialize)]
pub struct BlockDayRequest {
    pub date: String,
    pub reason: String,
    pub description: Option<String>,
}

pub async fn block_day(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BlockDayRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let principal = auth::authenticate(&headers, &state.config.jwt_secret)?;
    auth::require_admin(&principal)?;

    let date = body.date.parse().map_err(|_| {
        AppError::InvalidInput("date must be formatted as YYYY-MM-DD".to_string())
    })?;

    let outcome = {
        let mut db = state.db.lock().unwrap();
        let tx = db.transaction()?;
        let outcome = blocking::block_day(&tx, date, &body.reason, body.description.as_deref())?;
        tx.commit()?;
        outcome
    };

    queue_block_cancellation_emails(&state, &outcome);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "day blocked",
            "non_working_day": NonWorkingDayResponse::from_model(&outcome.block),
            "cancelled_appointments": outcome.cancelled.len(),
        })),
    ))
}

// POST /api/admin/non-working-days/range
#[derive(Deserialize)]
pub struct BlockRangeRequest {
    pub start_date: String,
    pub end_date: String,
    pub reason: String,
    pub description: Option<String>,
}

pub async fn block_range(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BlockRangeRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let principal = auth::authenticate(&headers, &state.config.jwt_secret)?;
    auth::require_admin(&principal)?;

    let parse = |s: &str| {
        s.parse().map_err(|_| {
            AppError::InvalidInput("dates must be formatted as YYYY-MM-DD".to_string())
        })
    };
    let start = parse(&body.start_date)?;
    let end = parse(&body.end_date)?;

    let outcome = {
        let mut db = state.db.lock().unwrap();
        let tx = db.transaction()?;
        let outcome =
            blocking::block_range(&tx, start, end, &body.reason, body.description.as_deref())?;
        tx.commit()?;
        outcome
    };

    queue_block_cancellation_emails(&state, &outcome);

    let blocked_dates: Vec<String> = outcome
        .block
        .dates()
        .iter()
        .map(|d| d.to_string())
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "period blocked",
            "non_working_day": NonWorkingDayResponse::from_model(&outcome.block),
            "total_days": blocked_dates.len(),
            "cancelled_appointments": outcome.cancelled.len(),
            "blocked_dates": blocked_dates,
        })),
    ))
}

// DELETE /api/admin/non-working-days/:id
pub async fn unblock(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = auth::authenticate(&headers, &state.config.jwt_secret)?;
    auth::require_admin(&principal)?;

    {
        let db = state.db.lock().unwrap();
        blocking::unblock(&db, id)?;
    }

    Ok(Json(serde_json::json!({ "message": "block removed" })))
}
