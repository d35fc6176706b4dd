use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SpecialtyResponse {
    id: i64,
    name: String,
    description: Option<String>,
    duration_minutes: i64,
    price: f64,
}

pub async fn list_specialties(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let specialties = {
        let db = state.db.lock().unwrap();
        queries::list_active_specialties(&db)?
    };

    let response: Vec<SpecialtyResponse> = specialties
        .into_iter()
        .map(|s| SpecialtyResponse {
            id: s.id,
            name: s.name,
            description: s.description,
            duration_minutes: s.duration_minutes,
            price: s.price,
        })
        .collect();

    Ok(Json(serde_json::json!({ "specialties": response })))
}
