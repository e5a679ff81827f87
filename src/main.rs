use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::fmt::time::ChronoLocal;

use callguard::server::AppState;
use callguard::store::{InMemoryCallStore, LogAlertSink};
use callguard::{router, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let bind_address = config.bind_address;
    let state = Arc::new(AppState::new(
        config,
        Arc::new(InMemoryCallStore::new()),
        Arc::new(LogAlertSink),
    ));

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!("call analysis service listening on {bind_address}");

    axum::serve(listener, router(state))
        .await
        .context("server error")?;
    Ok(())
}
