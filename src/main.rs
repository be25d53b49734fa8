//! campaign-settlement server entry point.
//!
//! Starts the Axum HTTP server, the optional PostgreSQL event log and the
//! campaign deadline sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use campaign_settlement::api;
use campaign_settlement::app_state::AppState;
use campaign_settlement::config::{LogFormat, SettlementConfig};
use campaign_settlement::persistence::{PostgresPersistence, spawn_event_log};
use campaign_settlement::service::CampaignService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SettlementConfig::from_env()?;
    init_tracing(config.log_format);
    tracing::info!(
        addr = %config.listen_addr,
        commission_bps = config.commission.bps(),
        "starting campaign-settlement"
    );

    let app_state = AppState::new(&config);

    if config.persistence_enabled {
        let persistence = PostgresPersistence::connect(&config).await?;
        spawn_event_log(persistence, &app_state.event_bus);
        tracing::info!("event log persistence enabled");
    }

    if config.deadline_sweep_interval_secs > 0 {
        spawn_deadline_sweep(
            Arc::clone(&app_state.campaigns),
            Duration::from_secs(config.deadline_sweep_interval_secs),
        );
    }

    let app = api::build_router()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Plain => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Periodically switches off live campaigns whose deadline has passed.
fn spawn_deadline_sweep(campaigns: Arc<CampaignService>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let expired = campaigns.deactivate_expired(Utc::now()).await;
            if !expired.is_empty() {
                tracing::info!(count = expired.len(), "deactivated expired campaigns");
            }
        }
    });
}
