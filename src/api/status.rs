use axum::{extract::State, Json};

use crate::{domain::status::StatusReport, meter::AppState};

/// GET /api/status - live readings, accounting totals and derived costs.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.meter.status().await)
}

/// GET /debug - plain-text internals dump.
pub async fn debug_dump(State(state): State<AppState>) -> String {
    state.meter.debug_report().await
}
