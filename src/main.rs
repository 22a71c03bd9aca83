//! # Passkey Auth Gateway
//!
//! Entry point: loads configuration, wires the stores, ceremony engine and
//! token issuer together, starts the challenge sweeper and serves the API.

use passkey_auth_gateway::config::Config;
use passkey_auth_gateway::handlers;
use passkey_auth_gateway::state::AppState;
use passkey_auth_gateway::store::ChallengeStore;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Overridable with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,passkey_auth_gateway=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded: {:?}", config);

    let app_state = AppState::new(&config).await?;
    tracing::info!("Application state initialized");

    spawn_challenge_sweeper(
        app_state.challenges.clone(),
        Duration::from_secs(config.challenge_sweep_interval_seconds),
    );

    let app = handlers::router(app_state);

    let bind_addr = config.bind_address();
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop expired challenges
///
/// Expiry is enforced on every read, so this only bounds storage growth.
fn spawn_challenge_sweeper(challenges: Arc<dyn ChallengeStore>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match challenges.purge_expired().await {
                Ok(0) => tracing::debug!("Challenge sweep: nothing to purge"),
                Ok(purged) => tracing::debug!(purged, "Challenge sweep complete"),
                Err(e) => tracing::error!("Challenge sweep failed: {:?}", e),
            }
        }
    });
}
