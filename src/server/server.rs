use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::cache::token_cache::TokenCache;
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::resilience::retry::RetrySettings;
use crate::server::token_routes::TokenRoutesState;
use crate::sources::client_credentials::ClientCredentialsIssuer;

/// The cache type the service runs with.
pub type SharedTokenCache = TokenCache<ClientCredentialsIssuer>;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub token_state: TokenRoutesState,
}

impl AppState {
    pub fn new(metrics: &Metrics, settings: &SettingsConfig, cache: SharedTokenCache) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            token_state: TokenRoutesState::new(
                cache,
                settings.retry.as_ref().map(RetrySettings::from),
                settings.server.bearer_token.clone(),
            ),
        }
    }
}

/// Build the diagnostic router: token routes plus the optional metrics route.
pub async fn router(settings: &SettingsConfig, cache: SharedTokenCache) -> Router {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, settings, cache);

    Router::new()
        .merge(state.metrics_state.router(&settings.metrics))
        .merge(state.token_state.router(state.clone()))
        .with_state(state)
}

/// Bind the configured address and serve until ctrl-c.
pub async fn start(settings: &SettingsConfig, cache: SharedTokenCache) -> Result<()> {
    let app = router(settings, cache).await;

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    info!(address = %addr, "token cache server listening");

    let metrics = get_metrics().await;
    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    metrics.up.set(0);

    info!("token cache server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // no signal handler available, run until killed
        std::future::pending::<()>().await;
    }
}
