use axum::response::Html;

/// GET / - the embedded monitoring dashboard. Pure presentation; everything
/// it shows comes from polling /api/status.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../assets/dashboard.html"))
}
