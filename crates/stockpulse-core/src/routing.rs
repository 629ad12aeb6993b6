use std::sync::Arc;

use tracing::{debug, warn};

use crate::data_source::{
    Endpoint, HistoricalRequest, MarketDataSource, PriceSource, SourceError, SourceErrorKind,
    SourceFuture,
};
use crate::{CompanyOverview, HistoricalPoint, PriceSnapshot, ProviderId, Quote, Symbol};

/// Ordered set of market-data adapters.
///
/// Each endpoint is served by the first source whose capabilities include it.
/// On a retryable failure, or when a source is missing its credentials, the
/// call falls through to the next capable source; any other failure is
/// returned as is.
#[derive(Clone, Default)]
pub struct SourceSet {
    sources: Vec<Arc<dyn MarketDataSource>>,
}

impl SourceSet {
    pub fn new(sources: Vec<Arc<dyn MarketDataSource>>) -> Self {
        Self { sources }
    }

    pub fn with_source(mut self, source: Arc<dyn MarketDataSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn providers(&self) -> Vec<ProviderId> {
        self.sources.iter().map(|source| source.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Providers able to serve `endpoint`, in routing order.
    pub fn chain_for(&self, endpoint: Endpoint) -> Vec<ProviderId> {
        self.sources
            .iter()
            .filter(|source| source.capabilities().supports(endpoint))
            .map(|source| source.id())
            .collect()
    }

    pub async fn quote(&self, symbol: &Symbol) -> Result<Quote, SourceError> {
        self.route(Endpoint::Quote, move |source| source.quote(symbol))
            .await
    }

    pub async fn historical(
        &self,
        req: &HistoricalRequest,
    ) -> Result<Vec<HistoricalPoint>, SourceError> {
        self.route(Endpoint::Historical, move |source| source.historical(req))
            .await
    }

    pub async fn company_overview(&self, symbol: &Symbol) -> Result<CompanyOverview, SourceError> {
        self.route(Endpoint::Overview, move |source| {
            source.company_overview(symbol)
        })
        .await
    }

    pub async fn batch_prices(&self, symbols: &[Symbol]) -> Result<Vec<PriceSnapshot>, SourceError> {
        self.route(Endpoint::BatchPrices, move |source| {
            source.batch_prices(symbols)
        })
        .await
    }

    async fn route<'s, T, F>(&'s self, endpoint: Endpoint, invoke: F) -> Result<T, SourceError>
    where
        F: Fn(&'s dyn MarketDataSource) -> SourceFuture<'s, T>,
    {
        let mut last_error = None;

        for source in &self.sources {
            if !source.capabilities().supports(endpoint) {
                continue;
            }

            let provider = source.id();
            match invoke(source.as_ref()).await {
                Ok(data) => {
                    if last_error.is_some() {
                        debug!(%provider, %endpoint, "served by fallback source");
                    }
                    return Ok(data);
                }
                Err(error) if falls_through(&error) => {
                    warn!(
                        %provider,
                        %endpoint,
                        code = error.code(),
                        message = error.message(),
                        "source failed, trying next"
                    );
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SourceError::misconfigured(format!("no configured source supports {endpoint}"))
        }))
    }
}

fn falls_through(error: &SourceError) -> bool {
    error.retryable() || error.kind() == SourceErrorKind::Misconfigured
}

impl PriceSource for SourceSet {
    fn fetch_batch_prices<'a>(
        &'a self,
        symbols: &'a [Symbol],
    ) -> SourceFuture<'a, Vec<PriceSnapshot>> {
        Box::pin(self.batch_prices(symbols))
    }
}
