use std::sync::Arc;

use serde_json::Value;
use stockpulse_core::{
    AnalysisEngine, CacheStore, Clock, ListingSource, ListingStore, PriceRefreshCache, SourceSet,
    SystemClock,
};
use tokio::sync::RwLock;

/// Shared state handed to every handler. Cloning shares the underlying caches.
#[derive(Clone)]
pub struct AppState {
    pub sources: SourceSet,
    pub analysis: Arc<dyn AnalysisEngine>,
    pub prices: PriceRefreshCache,
    /// Serialized historical series and company overviews.
    pub responses: CacheStore<Value>,
    pub listings: Arc<RwLock<ListingStore>>,
    /// Feed behind `/api/ipos/update`; unset means the endpoint fails.
    pub ipo_source: Option<Arc<dyn ListingSource>>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        sources: SourceSet,
        analysis: Arc<dyn AnalysisEngine>,
        prices: PriceRefreshCache,
        responses: CacheStore<Value>,
    ) -> Self {
        Self {
            sources,
            analysis,
            prices,
            responses,
            listings: Arc::new(RwLock::new(ListingStore::default())),
            ipo_source: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_listings(mut self, listings: ListingStore) -> Self {
        self.listings = Arc::new(RwLock::new(listings));
        self
    }

    pub fn with_ipo_source(mut self, source: Arc<dyn ListingSource>) -> Self {
        self.ipo_source = Some(source);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
