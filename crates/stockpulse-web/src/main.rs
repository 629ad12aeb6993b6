use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use stockpulse_core::{
    api_key_from_env, AlphaVantageAdapter, CacheStore, HttpClient, ListingStore,
    MarketDataSource, MarketstackAdapter, OpenAiAnalysisEngine, PriceRefreshCache, ProviderId,
    ReqwestHttpClient, SourceSet,
};
use stockpulse_web::{router, AppState, ServerArgs, StartupError};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "stockpulse=info,tower_http=info";

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run(ServerArgs::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "stockpulse exited with an error");
            ExitCode::from(error.exit_code())
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(args: ServerArgs) -> Result<(), StartupError> {
    let watch = args.watch_symbols()?;

    for provider in ProviderId::ALL {
        if api_key_from_env(provider).is_none() {
            let [primary, fallback] = provider.api_key_vars();
            warn!(%provider, "no API key in {primary} or {fallback}; its endpoints will fail");
        }
    }

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let marketstack = Arc::new(MarketstackAdapter::from_env(Arc::clone(&http)));
    let adapters: Vec<Arc<dyn MarketDataSource>> = vec![
        Arc::clone(&marketstack) as Arc<dyn MarketDataSource>,
        Arc::new(AlphaVantageAdapter::from_env(Arc::clone(&http))),
    ];
    let sources = SourceSet::new(adapters);
    let analysis = Arc::new(
        OpenAiAnalysisEngine::from_env(http)
            .with_model(args.openai_model.clone())
            .with_chat_model(args.openai_chat_model.clone()),
    );

    let prices = PriceRefreshCache::builder(Arc::new(sources.clone()))
        .config(args.price_cache_config())
        .build();

    let listings = match &args.listings {
        Some(path) => ListingStore::from_json_file(path)?,
        None => ListingStore::default(),
    };
    info!(count = listings.len(), "listings loaded");

    let responses = CacheStore::<serde_json::Value>::new(args.cache_ttl());
    if responses.is_disabled().await {
        info!("response cache disabled; every request goes upstream");
    }

    let state = AppState::new(sources, analysis, prices.clone(), responses)
        .with_listings(listings)
        .with_ipo_source(marketstack);

    if !watch.is_empty() {
        prices.start_updates(watch);
    }

    let listener = TcpListener::bind(args.bind).await?;
    info!(addr = %args.bind, "stockpulse listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    prices.stop_updates();
    info!("stockpulse stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
