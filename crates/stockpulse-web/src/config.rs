//! Command-line configuration for the `stockpulse` server.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--bind` | `127.0.0.1:3000` | Listen address |
//! | `--refresh-interval-secs` | `1800` | Price refresh period |
//! | `--batch-size` | `50` | Symbols per upstream batch |
//! | `--batch-delay-ms` | `1000` | Pause between batches |
//! | `--batch-timeout-secs` | `30` | Upper bound for one batch call |
//! | `--cache-ttl-secs` | `300` | Quote TTL; `0` disables the response cache |
//! | `--listings` | none | JSON file of IPO listings |
//! | `--watch` | none | Comma-separated symbols to refresh from startup |
//! | `--openai-model` | `gpt-4-turbo-preview` | Model used for analyses |
//! | `--openai-chat-model` | `gpt-4o-mini` | Model used by `/api/chat` |
//!
//! API keys are read from the environment only, see
//! [`stockpulse_core::api_key_from_env`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use stockpulse_core::{
    PriceCacheConfig, Symbol, ValidationError, DEFAULT_OPENAI_CHAT_MODEL, DEFAULT_OPENAI_MODEL,
};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "stockpulse",
    version,
    about = "Stock dashboard API with a batched price refresh cache"
)]
pub struct ServerArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Seconds between timer-driven price refresh cycles.
    #[arg(long, default_value_t = 1800, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_interval_secs: u64,

    /// Symbols per upstream batch request.
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..=1000))]
    pub batch_size: u64,

    /// Milliseconds to wait between batches of one cycle.
    #[arg(long, default_value_t = 1000)]
    pub batch_delay_ms: u64,

    /// Seconds before a batch call is abandoned.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_timeout_secs: u64,

    /// TTL of cached quotes; 0 disables the response cache entirely.
    #[arg(long, default_value_t = 300)]
    pub cache_ttl_secs: u64,

    /// JSON array of listings served by `/api/stocks`.
    #[arg(long)]
    pub listings: Option<PathBuf>,

    /// Symbols to start refreshing at startup, e.g. `AAPL,MSFT`.
    #[arg(long)]
    pub watch: Option<String>,

    /// Chat completion model used by `/api/analysis`.
    #[arg(long, default_value = DEFAULT_OPENAI_MODEL)]
    pub openai_model: String,

    /// Chat completion model used by `/api/chat`.
    #[arg(long, default_value = DEFAULT_OPENAI_CHAT_MODEL)]
    pub openai_chat_model: String,
}

impl ServerArgs {
    pub fn price_cache_config(&self) -> PriceCacheConfig {
        PriceCacheConfig {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            batch_size: usize::try_from(self.batch_size).unwrap_or(usize::MAX),
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            batch_timeout: Duration::from_secs(self.batch_timeout_secs),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn watch_symbols(&self) -> Result<Vec<Symbol>, ValidationError> {
        match self.watch.as_deref() {
            Some(raw) => Symbol::parse_list(raw),
            None => Ok(Vec::new()),
        }
    }
}
