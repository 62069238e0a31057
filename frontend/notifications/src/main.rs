use std::net::SocketAddr;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use notifications::config::AppConfig;
use notifications::repository::http::HttpNotificationGateway;
use notifications::telemetry::{self, TelemetryConfig};
use notifications::usecase::polling::PollingRefresher;
use notifications::usecase::provider::NotificationProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let tracer_provider = if config.telemetry_enabled {
        Some(telemetry::init_telemetry_with_subscriber(&TelemetryConfig::from(&config), env_filter)?)
    } else {
        telemetry::init_subscriber_without_telemetry(env_filter);
        None
    };

    tracing::info!(
        api_base_url = %config.api_base_url,
        poll_interval_secs = config.poll_interval().as_secs(),
        telemetry_enabled = config.telemetry_enabled,
        "starting notification watcher"
    );

    if let Some(addr) = &config.metrics_listen_addr {
        let addr: SocketAddr = addr.parse().context("invalid METRICS_LISTEN_ADDR")?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        tracing::info!(%addr, "prometheus metrics initialized");
    }

    let session = config
        .session()
        .context("USER_ID, TENANT_ID and ACCESS_TOKEN must be set")?;

    let gateway = HttpNotificationGateway::new(&config.api_base_url, config.request_timeout())?;
    let mut provider = NotificationProvider::new(gateway, PollingRefresher::new(config.poll_interval()))
        .with_page_limit(config.page_size);

    provider.begin_session(session).await;
    if let Some(error) = provider.store().error().await {
        tracing::warn!(%error, "initial load incomplete");
    }

    let mut unread = provider.store().subscribe_unread();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = unread.changed() => {
                if changed.is_err() {
                    break;
                }
                let count = *unread.borrow_and_update();
                tracing::info!(unread = count, "unread count changed");
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    provider.end_session().await;

    if let Some(tracer_provider) = tracer_provider {
        telemetry::shutdown_telemetry(tracer_provider);
    }

    Ok(())
}
