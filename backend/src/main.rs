//! Backend entry-point: configuration, migrations, worker and HTTP server.

mod server;

use actix_web::web;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use backend::inbound::http::health::HealthState;
use server::{build_services, run_migrations, run_server, AppConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;

    run_migrations(config.database_url.clone())
        .await
        .map_err(std::io::Error::other)?;

    let services = build_services(&config)
        .await
        .map_err(std::io::Error::other)?;

    // The expiry sweep runs on its own task for the life of the process.
    tokio::spawn(services.reclaimer.clone().run());

    let health = web::Data::new(HealthState::new());
    let server = run_server(&config, services.state, health.clone())?;
    info!(addr = %config.bind_addr, "listening");
    health.mark_ready();
    server.await
}
