//! HTTP Server
//!
//! Serves scrapes on demand. Every `GET /metrics` triggers a fresh poll of the
//! configured BMCs through the [`ScrapeCoordinator`]; nothing is collected in
//! the background.
//!
//! # Endpoints
//!
//! - `GET /` - HTML landing page with links to metrics and health
//! - `GET /metrics` - Scrape every target, Prometheus text format
//! - `GET /metrics?target=<address>` - Scrape a single configured target (404 when unknown)
//! - `GET /health` - 200 when at least one target is configured, 503 otherwise
//!
//! # Error Handling
//!
//! Per-target failures are reported through `redfish_up` and
//! `redfish_scrape_status` in a normal 200 response. Only a scrape that cannot
//! run at all (no targets configured) fails with 500.
//!
//! # Process Lifecycle
//!
//! - `SIGHUP` re-reads the configuration file and replaces the target set
//! - `SIGINT`/`SIGTERM` stop accepting connections, give in-flight scrapes
//!   `shutdown_grace_seconds` to finish, then log out of every BMC session

use crate::config::Config;
use crate::error::{ExporterError, ScrapeError};
use crate::metrics::{self, ExporterMetrics};
use crate::redfish::SessionStore;
use crate::scrape::{ScrapeCoordinator, ScrapeSettings};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: ScrapeCoordinator,
    pub metrics: ExporterMetrics,
}

impl AppState {
    /// Builds the coordinator for `config` with a fresh session store.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let coordinator = ScrapeCoordinator::new(
            config.targets()?,
            Arc::new(SessionStore::new()),
            ScrapeSettings::from(&config.scrape),
        )?;

        Ok(Self {
            coordinator,
            metrics: ExporterMetrics::new()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    target: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub async fn start(config: Config, config_path: String) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let coordinator = state.coordinator.clone();

    if coordinator.target_count() == 0 {
        warn!("No targets configured, every scrape will fail until the configuration is reloaded");
    }

    #[cfg(unix)]
    spawn_reload_handler(coordinator.clone(), config_path);
    #[cfg(not(unix))]
    let _ = config_path;

    let app = router(state);

    // Start the server
    let addr = format!("{}:{}", config.server.addr, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|err| ExporterError::Server(format!("failed to bind {}: {}", addr, err)))?;

    info!("Metrics server listening on {}", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let stop = Arc::new(Notify::new());
    let mut server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown({
                let stop = stop.clone();
                async move { stop.notified().await }
            })
            .into_future(),
    );

    tokio::select! {
        result = &mut server => {
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    info!(grace_seconds = grace.as_secs(), "Shutting down, draining in-flight scrapes");
    stop.notify_one();

    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => result??,
        Err(_) => {
            warn!("Grace period elapsed, abandoning in-flight scrapes");
            server.abort();
        }
    }

    coordinator.shutdown().await;
    info!("Exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(unix)]
fn spawn_reload_handler(coordinator: ScrapeCoordinator, config_path: String) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to listen for SIGHUP, reload disabled: {}", e);
                return;
            }
        };

        while hangup.recv().await.is_some() {
            info!(path = %config_path, "SIGHUP received, reloading configuration");
            if let Err(e) = reload(&coordinator, &config_path).await {
                error!("Reload failed, keeping previous targets: {:#}", e);
            }
        }
    });
}

/// Re-reads the configuration file and swaps the target set.
pub async fn reload(coordinator: &ScrapeCoordinator, config_path: &str) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    coordinator.reload(config.targets()?).await?;
    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    axum::response::Html(
        r#"<html>
<head><title>Redfish Exporter</title></head>
<body>
<h1>Redfish Prometheus Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>"#,
    )
}

async fn metrics_handler(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    let result = match query.target.as_deref() {
        Some(address) => state.coordinator.scrape_target(address).await,
        None => state.coordinator.scrape().await,
    };

    let result = match result {
        Ok(result) => result,
        Err(e @ ScrapeError::UnknownTarget(_)) => {
            return (StatusCode::NOT_FOUND, e.to_string()).into_response();
        }
        Err(e @ ScrapeError::NoTargets) => {
            error!("Scrape failed: {}", e);
            state.metrics.observe_failure();
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    state.metrics.observe(&result);

    let rendered = metrics::render(&result.samples())
        .and_then(|device| Ok(device + &state.metrics.render()?));

    match rendered {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.coordinator.target_count() > 0 {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "No targets configured")
    }
}
