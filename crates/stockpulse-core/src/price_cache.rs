//! Batched, market-hours-aware price refresh cache.
//!
//! A [`PriceRefreshCache`] keeps the last known [`PriceSnapshot`] for every
//! symbol registered through [`PriceRefreshCache::start_updates`] and refreshes
//! them from a [`PriceSource`] on a fixed interval. Reads never reach upstream.
//!
//! ```text
//! start_updates ──▶ seed placeholders ──▶ spawn cycle ──▶ arm timer
//!                                              │              │ every interval
//!                                              ▼              ▼
//!                                   ┌──────────────────────────────┐
//!                                   │ refresh cycle (one at a time)│
//!                                   │  market open?                │
//!                                   │  batch ─▶ source ─▶ snapshots│
//!                                   │  pace, next batch            │
//!                                   └──────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::data_source::PriceSource;
use crate::market_hours::MarketHours;
use crate::{PriceSnapshot, Symbol};

/// Tunables for the refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceCacheConfig {
    /// Period between timer-driven cycles.
    pub refresh_interval: Duration,
    /// Symbols per upstream call.
    pub batch_size: usize,
    /// Pause between consecutive upstream calls of one cycle.
    pub batch_delay: Duration,
    /// Upper bound for a single upstream call; a timeout fails the batch.
    pub batch_timeout: Duration,
}

impl Default for PriceCacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30 * 60),
            batch_size: 50,
            batch_delay: Duration::from_secs(1),
            batch_timeout: Duration::from_secs(30),
        }
    }
}

/// What one call to [`PriceRefreshCache::refresh_now`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle held the guard; nothing was done.
    AlreadyRunning,
    /// Exchange closed; upstream was not contacted.
    MarketClosed,
    Completed(CycleReport),
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Per-cycle counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub batches: usize,
    pub failed_batches: usize,
    /// Snapshots overwritten this cycle.
    pub updated: usize,
    /// Requested in a successful batch but absent from its response.
    pub unmatched: Vec<Symbol>,
    /// Symbols of batches that errored or timed out.
    pub failed: Vec<Symbol>,
}

/// Builder for [`PriceRefreshCache`] with non-default collaborators.
pub struct PriceCacheBuilder {
    source: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
    market_hours: MarketHours,
    config: PriceCacheConfig,
}

impl PriceCacheBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn market_hours(mut self, market_hours: MarketHours) -> Self {
        self.market_hours = market_hours;
        self
    }

    pub fn config(mut self, config: PriceCacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> PriceRefreshCache {
        PriceRefreshCache {
            inner: Arc::new(Inner {
                source: self.source,
                clock: self.clock,
                market_hours: self.market_hours,
                config: self.config,
                snapshots: RwLock::new(HashMap::new()),
                timer: Mutex::new(None),
                cycle_guard: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

struct Inner {
    source: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
    market_hours: MarketHours,
    config: PriceCacheConfig,
    snapshots: RwLock<HashMap<Symbol, PriceSnapshot>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    cycle_guard: tokio::sync::Mutex<()>,
}

/// Shared handle to the price cache. Clones address the same cache.
#[derive(Clone)]
pub struct PriceRefreshCache {
    inner: Arc<Inner>,
}

impl PriceRefreshCache {
    /// Cache with the system clock, US equity hours and default tunables.
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self::builder(source).build()
    }

    pub fn builder(source: Arc<dyn PriceSource>) -> PriceCacheBuilder {
        PriceCacheBuilder {
            source,
            clock: Arc::new(SystemClock),
            market_hours: MarketHours::default(),
            config: PriceCacheConfig::default(),
        }
    }

    pub fn config(&self) -> &PriceCacheConfig {
        &self.inner.config
    }

    /// Register `symbols`, refresh once right away and arm the periodic timer.
    ///
    /// Calling it again replaces the timer; symbols from earlier calls stay
    /// tracked. Must run inside a tokio runtime for the refresh to be
    /// scheduled; outside one only the placeholders are seeded.
    pub fn start_updates<I>(&self, symbols: I)
    where
        I: IntoIterator<Item = Symbol>,
    {
        let mut timer = self.lock_timer();
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let seeded = self.seed_placeholders(symbols);

        let Ok(runtime) = Handle::try_current() else {
            warn!("start_updates called outside a tokio runtime; refresh not scheduled");
            return;
        };

        let cache = self.clone();
        runtime.spawn(async move {
            cache.refresh_now().await;
        });

        let period = self.inner.config.refresh_interval;
        let weak = Arc::downgrade(&self.inner);
        *timer = Some(runtime.spawn(run_timer(weak, period)));

        info!(
            seeded,
            tracked = self.read_snapshots().len(),
            interval_secs = period.as_secs(),
            "price updates started"
        );
    }

    /// Disarm the timer. Stored snapshots are kept and a cycle already in
    /// flight runs to completion.
    pub fn stop_updates(&self) {
        if let Some(timer) = self.lock_timer().take() {
            timer.abort();
            info!("price updates stopped");
        }
    }

    /// Latest snapshot for `symbol`, `None` if it was never registered.
    pub fn get_price(&self, symbol: &Symbol) -> Option<PriceSnapshot> {
        self.read_snapshots().get(symbol).cloned()
    }

    /// Registered symbols in sorted order.
    pub fn tracked_symbols(&self) -> Vec<Symbol> {
        let mut symbols = self.read_snapshots().keys().cloned().collect::<Vec<_>>();
        symbols.sort();
        symbols
    }

    pub fn has_active_timer(&self) -> bool {
        self.lock_timer()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Run one refresh cycle in the caller's task.
    ///
    /// Returns [`CycleOutcome::AlreadyRunning`] immediately if another cycle
    /// holds the guard. Upstream failures are logged and counted, never
    /// returned.
    pub async fn refresh_now(&self) -> CycleOutcome {
        let Ok(_guard) = self.inner.cycle_guard.try_lock() else {
            debug!("refresh cycle already running, trigger dropped");
            return CycleOutcome::AlreadyRunning;
        };

        let now = self.inner.clock.now();
        if !self.inner.market_hours.is_open(now) {
            debug!(%now, "market closed, skipping refresh");
            return CycleOutcome::MarketClosed;
        }

        let config = self.inner.config;
        let symbols = self.tracked_symbols();
        let mut report = CycleReport::default();

        for (index, batch) in symbols.chunks(config.batch_size.max(1)).enumerate() {
            if index > 0 {
                tokio::time::sleep(config.batch_delay).await;
            }
            report.batches += 1;

            let fetched = tokio::time::timeout(
                config.batch_timeout,
                self.inner.source.fetch_batch_prices(batch),
            )
            .await;

            match fetched {
                Ok(Ok(rows)) => self.apply_batch(batch, rows, &mut report),
                Ok(Err(error)) => {
                    warn!(
                        batch = index,
                        size = batch.len(),
                        code = error.code(),
                        message = error.message(),
                        "price batch failed"
                    );
                    report.failed_batches += 1;
                    report.failed.extend_from_slice(batch);
                }
                Err(_) => {
                    warn!(
                        batch = index,
                        size = batch.len(),
                        timeout_secs = config.batch_timeout.as_secs(),
                        "price batch timed out"
                    );
                    report.failed_batches += 1;
                    report.failed.extend_from_slice(batch);
                }
            }
        }

        if !report.unmatched.is_empty() {
            warn!(
                count = report.unmatched.len(),
                symbols = %join(&report.unmatched),
                "upstream omitted requested symbols"
            );
        }
        info!(
            batches = report.batches,
            failed_batches = report.failed_batches,
            updated = report.updated,
            "price refresh cycle finished"
        );
        CycleOutcome::Completed(report)
    }

    fn apply_batch(&self, batch: &[Symbol], rows: Vec<PriceSnapshot>, report: &mut CycleReport) {
        let requested = batch.iter().collect::<HashSet<_>>();
        let mut seen = HashSet::new();
        let mut snapshots = self.write_snapshots();

        for row in rows {
            if !requested.contains(&row.symbol) {
                debug!(symbol = %row.symbol, "ignoring unrequested symbol in batch response");
                continue;
            }
            seen.insert(row.symbol.clone());
            snapshots.insert(row.symbol.clone(), row);
        }

        report.updated += seen.len();
        report
            .unmatched
            .extend(batch.iter().filter(|symbol| !seen.contains(*symbol)).cloned());
    }

    fn seed_placeholders<I>(&self, symbols: I) -> usize
    where
        I: IntoIterator<Item = Symbol>,
    {
        let now = self.inner.clock.now();
        let mut snapshots = self.write_snapshots();
        let mut seeded = 0;
        for symbol in symbols {
            snapshots.entry(symbol).or_insert_with_key(|symbol| {
                seeded += 1;
                PriceSnapshot::placeholder(symbol.clone(), now)
            });
        }
        seeded
    }

    fn read_snapshots(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Symbol, PriceSnapshot>> {
        self.inner
            .snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_snapshots(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Symbol, PriceSnapshot>> {
        self.inner
            .snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Timer loop: each tick spawns its own cycle task so aborting the timer
/// never cancels a cycle mid-flight. Exits once the cache is dropped.
async fn run_timer(cache: Weak<Inner>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(inner) = cache.upgrade() else {
            return;
        };
        let cache = PriceRefreshCache { inner };
        tokio::spawn(async move {
            cache.refresh_now().await;
        });
    }
}

fn join(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(Symbol::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::clock::FixedClock;
    use crate::data_source::{SourceError, SourceFuture};
    use crate::UtcDateTime;

    /// Wednesday 2024-01-10 10:00 New York.
    const OPEN_AT: i64 = 1_704_898_800;

    struct CountingSource {
        calls: AtomicUsize,
    }

    impl PriceSource for CountingSource {
        fn fetch_batch_prices<'a>(
            &'a self,
            symbols: &'a [Symbol],
        ) -> SourceFuture<'a, Vec<PriceSnapshot>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let at = UtcDateTime::from_unix_seconds(OPEN_AT).expect("valid");
                let mut rows = symbols
                    .iter()
                    .skip(1)
                    .map(|symbol| PriceSnapshot::from_closes(symbol.clone(), 20.0, 10.0, at))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|error| SourceError::malformed(error.to_string()))?;
                rows.push(PriceSnapshot::placeholder(Symbol::parse("ZZZ").expect("valid"), at));
                Ok(rows)
            })
        }
    }

    fn cache(source: Arc<CountingSource>, config: PriceCacheConfig) -> PriceRefreshCache {
        let clock = FixedClock::new(UtcDateTime::from_unix_seconds(OPEN_AT).expect("valid"));
        PriceRefreshCache::builder(source)
            .clock(Arc::new(clock))
            .config(config)
            .build()
    }

    fn symbols(raw: &str) -> Vec<Symbol> {
        Symbol::parse_list(raw).expect("valid list")
    }

    #[tokio::test(start_paused = true)]
    async fn report_counts_unmatched_and_ignores_extras() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = cache(source.clone(), PriceCacheConfig::default());
        cache.seed_placeholders(symbols("AAPL,MSFT,TSLA"));

        let outcome = cache.refresh_now().await;
        let report = outcome.report().expect("cycle completed");

        assert_eq!(report.batches, 1);
        assert_eq!(report.updated, 2);
        assert_eq!(report.unmatched, symbols("AAPL"));
        assert!(cache.get_price(&Symbol::parse("ZZZ").expect("valid")).is_none());
        assert!(cache
            .get_price(&Symbol::parse("AAPL").expect("valid"))
            .expect("tracked")
            .is_placeholder());
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_paced_by_configured_delay() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let config = PriceCacheConfig {
            batch_size: 2,
            batch_delay: Duration::from_secs(3),
            ..PriceCacheConfig::default()
        };
        let cache = cache(source.clone(), config);
        cache.seed_placeholders(symbols("A,B,C,D,E"));

        let started = Instant::now();
        let outcome = cache.refresh_now().await;

        assert_eq!(outcome.report().map(|r| r.batches), Some(3));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn empty_cache_completes_without_upstream_calls() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = cache(source.clone(), PriceCacheConfig::default());

        let outcome = cache.refresh_now().await;
        assert_eq!(outcome, CycleOutcome::Completed(CycleReport::default()));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_outside_runtime_only_seeds() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = cache(source, PriceCacheConfig::default());

        cache.start_updates(symbols("AAPL"));

        assert!(cache.get_price(&Symbol::parse("AAPL").expect("valid")).is_some());
        assert!(!cache.has_active_timer());
    }
}
