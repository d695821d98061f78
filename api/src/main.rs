use anyhow::Context;

use garden_auth_api::app_state::AppState;
use garden_auth_api::config::load_config;
use garden_auth_api::http;
use garden_auth_api::infra::{postgres, redis};
use garden_auth_api::metrics::AppMetrics;
use garden_auth_api::telemetry::init_telemetry;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if exists
    let _ = dotenvy::dotenv();

    let config = load_config().context("failed to load configuration")?;

    init_telemetry(&config.telemetry);

    let metrics = AppMetrics::new().context("failed to register metrics")?;

    tracing::info!("Initializing integrations...");

    let pg_pool = postgres::init_postgres(&config.integrations, &config.db).await;
    let redis_conn = redis::init_redis(&config.integrations).await;

    let app_state = AppState::new(&config, metrics, pg_pool.clone(), redis_conn)
        .context("invalid auth configuration")?;

    let server = http::start_server(config, app_state).context("failed to bind HTTP server")?;
    let handle = server.handle();

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server error");
                return Err(e.into());
            }
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => tracing::info!("Shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "Failed to listen for ctrl-c"),
            }
            handle.stop(true).await;
        }
    }

    if let Some(pool) = pg_pool {
        tracing::info!("Closing PostgreSQL connection pool");
        pool.close().await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
