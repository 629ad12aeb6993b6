//! Recently listed companies served by `/api/stocks`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::{Listing, Symbol, UtcDateTime};

pub const DEFAULT_DAYS: u32 = 30;
pub const DEFAULT_PAGE_SIZE: usize = 30;
pub const MAX_PAGE_SIZE: usize = 100;

/// Filter and page selection for [`ListingStore::query`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListingQuery {
    pub search: Option<String>,
    pub days: u32,
    pub page: usize,
    pub limit: usize,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            search: None,
            days: DEFAULT_DAYS,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub stocks: Vec<Listing>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// In-memory listing table.
#[derive(Debug, Clone, Default)]
pub struct ListingStore {
    listings: Vec<Listing>,
}

impl ListingStore {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self { listings }
    }

    /// Load a JSON array of listings.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let raw = fs::read_to_string(path)?;
        let listings = serde_json::from_str::<Vec<Listing>>(&raw)?;
        Ok(Self::new(listings))
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// Append listings whose symbol is not stored yet; returns how many were added.
    pub fn insert_new(&mut self, listings: impl IntoIterator<Item = Listing>) -> usize {
        let mut added = 0;
        for listing in listings {
            if self.contains(&listing.symbol) {
                continue;
            }
            self.listings.push(listing);
            added += 1;
        }
        added
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.listings.iter().any(|listing| &listing.symbol == symbol)
    }

    /// Listings dated within `query.days` of `now`, newest first, matching
    /// `query.search` on symbol or name, sliced to the requested page.
    pub fn query(&self, query: &ListingQuery, now: UtcDateTime) -> ListingPage {
        let cutoff = now.minus_days(query.days);
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .map(str::to_lowercase);

        let mut matching = self
            .listings
            .iter()
            .filter(|listing| listing.listing_date >= cutoff)
            .filter(|listing| match &needle {
                Some(needle) => {
                    listing.symbol.as_str().to_lowercase().contains(needle)
                        || listing.name.to_lowercase().contains(needle)
                }
                None => true,
            })
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| right.listing_date.cmp(&left.listing_date));

        let page = query.page.max(1);
        let page_size = query.limit.clamp(1, MAX_PAGE_SIZE);
        let total = matching.len();

        let stocks = matching
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .cloned()
            .collect();

        ListingPage {
            stocks,
            total,
            page,
            page_size,
            total_pages: total.div_ceil(page_size),
        }
    }
}
