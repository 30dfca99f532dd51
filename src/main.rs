use anyhow::Result;
use axum::Router;
use open_energy_meter::{api, config::Config, meter, telemetry};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let cfg = Config::load()?;

    let app_state = meter::AppState::new(cfg.clone()).await?;

    let app: Router = api::router(app_state.clone(), &cfg);

    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!(
            "WARNING: Server binding to 0.0.0.0 - the meter API will be reachable from the whole \
            network. For production, bind to 127.0.0.1 unless behind a firewall/reverse proxy."
        );
    }

    info!(%addr, store = %cfg.storage.path.display(), "starting Open Energy Meter");

    meter::spawn_meter_tasks(app_state.clone(), cfg.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    // Last flush so a clean shutdown loses nothing since the previous
    // periodic save.
    app_state.meter.save().await;

    warn!("shutdown complete");
    Ok(())
}
