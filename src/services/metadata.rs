//! Metadata lookup abstraction
//!
//! The renamer only needs two searches: a TV series by title and a movie by
//! title and year. Each returns the provider's total hit count plus the first
//! hit, which is all the naming rules ever look at.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// First TV search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvMatch {
    pub title: String,
}

/// First movie search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieMatch {
    pub title: String,
    /// Genre names as the provider reports them
    pub genres: Vec<String>,
}

/// Result of one search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult<T> {
    pub total_results: u32,
    pub first: Option<T>,
}

impl<T> LookupResult<T> {
    pub fn empty() -> Self {
        Self {
            total_results: 0,
            first: None,
        }
    }

    pub fn found(total_results: u32, first: T) -> Self {
        Self {
            total_results,
            first: Some(first),
        }
    }

    /// The first hit, provided the search reported any results
    pub fn into_first(self) -> Option<T> {
        if self.total_results == 0 {
            None
        } else {
            self.first
        }
    }
}

#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn search_tv(&self, title: &str) -> Result<LookupResult<TvMatch>>;

    async fn search_movie(&self, title: &str, year: u16) -> Result<LookupResult<MovieMatch>>;
}

/// Used when no API key is configured: every search comes back empty, so
/// names fall back to the cleaned filename.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLookup;

#[async_trait]
impl MetadataLookup for NoLookup {
    async fn search_tv(&self, title: &str) -> Result<LookupResult<TvMatch>> {
        debug!(title = %title, "Metadata lookups disabled");
        Ok(LookupResult::empty())
    }

    async fn search_movie(&self, title: &str, year: u16) -> Result<LookupResult<MovieMatch>> {
        debug!(title = %title, year, "Metadata lookups disabled");
        Ok(LookupResult::empty())
    }
}
