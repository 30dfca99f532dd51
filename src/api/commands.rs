use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::error::ApiError;
use crate::meter::AppState;

#[derive(Debug, Deserialize)]
pub struct TariffQuery {
    pub tariff: f64,
}

/// POST /settariff?tariff=F - update the cost per kWh.
///
/// Non-numeric input is rejected by the typed query extractor; this handler
/// adds the range check. Bad input is never coerced to a number.
pub async fn set_tariff(
    State(state): State<AppState>,
    Query(query): Query<TariffQuery>,
) -> Result<StatusCode, ApiError> {
    if !query.tariff.is_finite() || query.tariff <= 0.0 {
        return Err(ApiError::BadRequest(format!(
            "tariff must be a positive number, got {}",
            query.tariff
        )));
    }
    state.meter.set_tariff(query.tariff).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /formatfs - erase the persistent store and recreate defaults.
pub async fn format_store(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.meter.format_store().await?;
    Ok(StatusCode::OK)
}

/// POST /resetenergy - zero all four energy counters.
pub async fn reset_energy(State(state): State<AppState>) -> StatusCode {
    state.meter.reset_energy().await;
    StatusCode::NO_CONTENT
}

/// POST /starttimer
pub async fn start_timer(State(state): State<AppState>) -> StatusCode {
    state.meter.start_timer().await;
    StatusCode::NO_CONTENT
}

/// POST /stoptimer
pub async fn stop_timer(State(state): State<AppState>) -> StatusCode {
    state.meter.stop_timer().await;
    StatusCode::NO_CONTENT
}

/// POST /resettimer
pub async fn reset_timer(State(state): State<AppState>) -> StatusCode {
    state.meter.reset_timer().await;
    StatusCode::NO_CONTENT
}
