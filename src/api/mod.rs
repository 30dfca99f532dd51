pub mod commands;
pub mod dashboard;
pub mod error;
pub mod status;

use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, meter::AppState};

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new()
        .route("/", get(dashboard::index))
        .route("/api/status", get(status::get_status))
        .route("/settariff", post(commands::set_tariff))
        .route("/formatfs", post(commands::format_store))
        .route("/resetenergy", post(commands::reset_energy))
        .route("/starttimer", post(commands::start_timer))
        .route("/stoptimer", post(commands::stop_timer))
        .route("/resettimer", post(commands::reset_timer))
        .route("/debug", get(status::debug_dump))
        .with_state(state);

    if cfg.server.enable_cors {
        use tower_http::cors::{Any, CorsLayer};
        router = router.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any));
    }

    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_secs(
                cfg.server.request_timeout_secs,
            ))),
    )
}
