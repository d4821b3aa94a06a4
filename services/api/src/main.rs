//! GraphQL API service entry point.
//!
//! # Purpose
//! Wires configuration, storage, the token codec, the event bus, and the
//! GraphQL schema, then starts the HTTP server.
use anyhow::Context;
use nosh_api::app::{AppState, build_router};
use nosh_api::auth::password::SaltedSha256;
use nosh_api::config::AppConfig;
use nosh_api::graphql::{Services, build_schema};
use nosh_api::observability;
use nosh_api::store::memory::MemoryStore;
use nosh_bus::EventBus;
use nosh_token::TokenCodec;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("load configuration")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability();

    let codec = match config.token_ttl {
        Some(ttl) => TokenCodec::with_ttl(&config.secret, ttl),
        None => TokenCodec::new(&config.secret),
    };
    let codec = Arc::new(codec);
    let store = Arc::new(MemoryStore::new());
    let services = Arc::new(Services {
        users: store.clone(),
        restaurants: store.clone(),
        orders: store,
        bus: EventBus::new(),
        codec,
        passwords: Arc::new(SaltedSha256::new(config.secret.as_str())),
    });
    let resolver = Arc::new(services.identity_resolver());
    let schema = build_schema(services);

    let app = build_router(AppState {
        schema,
        resolver,
        metrics: metrics_handle,
    });

    let addr = config.bind_addr;
    tracing::info!(%addr, "api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }
    Ok(())
}
