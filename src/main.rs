mod cache;
mod calendar;
mod catalog;
mod clock;
mod config;
mod daily;
mod error;
mod handlers;
mod metrics;
mod models;
mod postgrest;
mod rate_limit;
mod sources;
mod state;
#[cfg(test)]
mod test_utils;

use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::{MemoryHistory, MemorySelectionStore};
use crate::config::{Args, LogFormat};
use crate::daily::{DailySelectionCache, pruner};
use crate::postgrest::PostgrestStore;
use crate::rate_limit::{RateLimiter, sweeper};
use crate::sources::{BackendContentSource, ContentSource, HistorySource, SelectionStore};
use crate::state::AppState;

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // parse cli arguments
    let args = Args::parse();
    init_tracing(args.log_format);

    let client = reqwest::Client::builder()
        .timeout(args.upstream_timeout())
        .build()?;

    let content: Arc<dyn ContentSource> =
        Arc::new(BackendContentSource::new(client.clone(), &args.backend_url));

    let (history, store): (Arc<dyn HistorySource>, Arc<dyn SelectionStore>) = match &args.postgrest_url {
        Some(url) => {
            let postgrest = Arc::new(PostgrestStore::new(client.clone(), url, &args.postgrest_key));
            let history: Arc<dyn HistorySource> = postgrest.clone();
            let store: Arc<dyn SelectionStore> = postgrest;
            (history, store)
        }
        None => {
            tracing::warn!("no PostgREST url configured, history and daily verses stay in memory");
            let history: Arc<dyn HistorySource> = Arc::new(MemoryHistory::new());
            let store: Arc<dyn SelectionStore> = Arc::new(MemorySelectionStore::new());
            (history, store)
        }
    };

    let daily = Arc::new(
        DailySelectionCache::new(content.clone(), history.clone(), store)
            .with_fallback_timezone(args.fallback_timezone)
            .with_timeout(args.upstream_timeout()),
    );

    let limiter = RateLimiter::in_memory();

    // creating shared state
    let state = Arc::new(AppState {
        limiter: limiter.clone(),
        policies: args.policies(),
        content,
        history,
        daily: daily.clone(),
        upstream_timeout: args.upstream_timeout(),
    });

    // expired windows are swept on a timer, not on the request path
    tokio::spawn(sweeper(limiter, args.sweep_every()));
    tokio::spawn(pruner(daily, args.sweep_every()));

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let policies = args.policies();
    tracing::info!(
        %addr,
        backend = %args.backend_url,
        postgrest = args.postgrest_url.is_some(),
        fallback_timezone = args.fallback_timezone.name(),
        verse_limit = policies.verse.limit,
        daily_limit = policies.daily.limit,
        history_limit = policies.history.limit,
        "verse gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
