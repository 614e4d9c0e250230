//! TMDB (The Movie Database) API client
//!
//! Base URL: https://api.themoviedb.org/3
//!
//! Only the two search endpoints are used. Search results carry genre ids,
//! which are mapped to names through TMDB's fixed genre table.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::metadata::{LookupResult, MetadataLookup, MovieMatch, TvMatch};
use super::rate_limiter::{RateLimitedClient, ResponseExt, RetryConfig, retry_async};

pub const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// TMDB movie and TV genre ids
const TMDB_GENRES: &[(i32, &str)] = &[
    (28, "Action"),
    (12, "Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (14, "Fantasy"),
    (36, "History"),
    (27, "Horror"),
    (10402, "Music"),
    (9648, "Mystery"),
    (10749, "Romance"),
    (878, "Science Fiction"),
    (10770, "TV Movie"),
    (53, "Thriller"),
    (10752, "War"),
    (37, "Western"),
];

pub fn genre_name(id: i32) -> Option<&'static str> {
    TMDB_GENRES
        .iter()
        .find(|(genre_id, _)| *genre_id == id)
        .map(|(_, name)| *name)
}

/// One page of search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbSearchPage<T> {
    #[serde(default)]
    pub page: i32,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub total_results: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbMovie {
    pub id: i32,
    pub title: String,
    pub release_date: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<i32>,
}

impl TmdbMovie {
    pub fn genre_names(&self) -> Vec<String> {
        self.genre_ids
            .iter()
            .filter_map(|id| genre_name(*id))
            .map(String::from)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbTvShow {
    pub id: i32,
    pub name: String,
    pub first_air_date: Option<String>,
}

/// TMDB API client with rate limiting and retry logic
pub struct TmdbClient {
    client: Arc<RateLimitedClient>,
    base_url: String,
    api_key: String,
    retry_config: RetryConfig,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: Arc::new(RateLimitedClient::for_tmdb()?),
            base_url: TMDB_BASE_URL.to_string(),
            api_key,
            retry_config: RetryConfig::default(),
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Search for TV series by name
    pub async fn search_tv_shows(&self, query: &str) -> Result<TmdbSearchPage<TmdbTvShow>> {
        info!("Searching TMDB for series '{}'", query);
        let params = vec![("query", query.to_string())];
        self.search("tv", params, "tmdb_search_tv").await
    }

    /// Search for movies by name and release year
    pub async fn search_movies(&self, query: &str, year: u16) -> Result<TmdbSearchPage<TmdbMovie>> {
        info!("Searching TMDB for movie '{}' ({})", query, year);
        let params = vec![
            ("query", query.to_string()),
            ("year", year.to_string()),
            ("include_adult", "false".to_string()),
        ];
        self.search("movie", params, "tmdb_search_movies").await
    }

    async fn search<T>(
        &self,
        kind: &str,
        params: Vec<(&'static str, String)>,
        operation: &str,
    ) -> Result<TmdbSearchPage<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        if !self.has_api_key() {
            anyhow::bail!("TMDB API key not configured");
        }

        let url = format!("{}/search/{}", self.base_url, kind);
        let mut query_params = vec![("api_key", self.api_key.clone())];
        query_params.extend(params);

        let page: TmdbSearchPage<T> = retry_async(
            || {
                let url = url.clone();
                let client = self.client.clone();
                let query_params = query_params.clone();
                async move {
                    let response = client.get_with_query(&url, &query_params).await?;

                    if response.is_rate_limited() {
                        warn!("TMDB rate limit hit, will retry");
                        anyhow::bail!("Rate limited (429)");
                    }

                    if response.status().as_u16() == 401 {
                        anyhow::bail!("TMDB API key is invalid");
                    }

                    if !response.status().is_success() {
                        let transient = response.is_transient_error();
                        anyhow::bail!(
                            "TMDB search failed with status: {} (transient: {})",
                            response.status(),
                            transient
                        );
                    }

                    response
                        .json::<TmdbSearchPage<T>>()
                        .await
                        .context("Failed to parse TMDB search results")
                }
            },
            &self.retry_config,
            operation,
        )
        .await?;

        debug!(
            total = page.total_results,
            returned = page.results.len(),
            "TMDB search returned results"
        );
        Ok(page)
    }
}

fn total(page_total: i32) -> u32 {
    u32::try_from(page_total).unwrap_or(0)
}

#[async_trait]
impl MetadataLookup for TmdbClient {
    async fn search_tv(&self, title: &str) -> Result<LookupResult<TvMatch>> {
        let page = self.search_tv_shows(title).await?;
        let total_results = total(page.total_results);
        Ok(match page.results.into_iter().next() {
            Some(show) => LookupResult::found(total_results, TvMatch { title: show.name }),
            None => LookupResult::empty(),
        })
    }

    async fn search_movie(&self, title: &str, year: u16) -> Result<LookupResult<MovieMatch>> {
        let page = self.search_movies(title, year).await?;
        let total_results = total(page.total_results);
        Ok(match page.results.into_iter().next() {
            Some(movie) => LookupResult::found(
                total_results,
                MovieMatch {
                    genres: movie.genre_names(),
                    title: movie.title,
                },
            ),
            None => LookupResult::empty(),
        })
    }
}
