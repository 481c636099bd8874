//! Jikan (MyAnimeList) API client
//!
//! Wraps outbound GETs to the Jikan v4 API with a request cache, a fixed
//! pre-request throttle, and bounded retry when the API answers 429.

use std::sync::Arc;

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::query::Params;
use super::{Anime, CharacterRole, Recommendation};
use crate::cache::RequestCache;
use crate::config::ClientConfig;

/// Result count used by search when the caller has no preference
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// Result count used by the trending list when the caller has no preference
pub const DEFAULT_TRENDING_LIMIT: u32 = 10;

/// Result count used by genre browsing when the caller has no preference
pub const DEFAULT_GENRE_LIMIT: u32 = 24;

/// Errors that can occur when talking to the Jikan API
#[derive(Debug, Error)]
pub enum JikanError {
    /// Transport failure or timeout; no response was received
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API answered with a non-success status other than 429
    #[error("API request failed with status {0}")]
    RequestFailed(u16),

    /// The API kept answering 429 until every attempt was used
    #[error("Rate limited by API after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// The body was not JSON, or not the shape the endpoint promises
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The endpoint could not be joined onto the base URL
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

/// A related-items listing hanging off a single anime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Characters,
    Recommendations,
}

impl Relation {
    /// Parses a relation name as typed by a user
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "characters" | "character" | "chars" => Some(Relation::Characters),
            "recommendations" | "recommendation" | "recs" => Some(Relation::Recommendations),
            _ => None,
        }
    }

    /// Path segment under `anime/{id}/`
    pub fn path(self) -> &'static str {
        match self {
            Relation::Characters => "characters",
            Relation::Recommendations => "recommendations",
        }
    }
}

/// The `data` envelope every Jikan response is wrapped in
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Single-resource endpoints
    Item(Value),
    /// Listing endpoints
    List(Vec<Value>),
    /// `data` was missing or null
    Empty,
}

impl Envelope {
    /// Validates a response body and classifies its `data` field
    pub fn from_body(body: Value) -> Result<Self, JikanError> {
        let Value::Object(mut fields) = body else {
            return Err(JikanError::ParseError(
                "response body is not a JSON object".to_string(),
            ));
        };

        match fields.remove("data") {
            None | Some(Value::Null) => Ok(Envelope::Empty),
            Some(Value::Array(items)) => Ok(Envelope::List(items)),
            Some(item @ Value::Object(_)) => Ok(Envelope::Item(item)),
            Some(other) => Err(JikanError::ParseError(format!(
                "unexpected `data` value: {}",
                other
            ))),
        }
    }

    /// Unwraps a listing; a missing `data` field is an empty listing
    pub fn into_list(self) -> Result<Vec<Value>, JikanError> {
        match self {
            Envelope::List(items) => Ok(items),
            Envelope::Empty => Ok(Vec::new()),
            Envelope::Item(_) => Err(JikanError::ParseError(
                "expected a list in `data`, found an object".to_string(),
            )),
        }
    }

    /// Unwraps a single resource; a missing `data` field is `None`
    pub fn into_item(self) -> Result<Option<Value>, JikanError> {
        match self {
            Envelope::Item(item) => Ok(Some(item)),
            Envelope::Empty => Ok(None),
            Envelope::List(_) => Err(JikanError::ParseError(
                "expected an object in `data`, found a list".to_string(),
            )),
        }
    }
}

/// Decodes every element of a listing into `T`
fn decode_list<T: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<T>, JikanError> {
    items.into_iter().map(decode).collect()
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, JikanError> {
    serde_json::from_value(value).map_err(|e| JikanError::ParseError(e.to_string()))
}

/// Client for fetching anime data from the Jikan API
#[derive(Debug, Clone)]
pub struct JikanClient {
    http_client: Client,
    cache: Arc<RequestCache>,
    config: ClientConfig,
}

impl JikanClient {
    /// Creates a client with its own request cache
    pub fn new(config: ClientConfig) -> Result<Self, JikanError> {
        let cache = Arc::new(RequestCache::new(config.cache_ttl));
        Self::with_cache(config, cache)
    }

    /// Creates a client that shares an existing request cache
    ///
    /// The cache's own TTL applies; `config.cache_ttl` is ignored.
    pub fn with_cache(config: ClientConfig, cache: Arc<RequestCache>) -> Result<Self, JikanError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http_client,
            cache,
            config,
        })
    }

    /// The cache backing this client
    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.cache
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Builds the canonical URL for a request, which doubles as its cache key
    ///
    /// # Arguments
    /// * `endpoint` - Path under the API root (e.g., "anime", "top/anime")
    /// * `params` - Query parameters; their order never changes the result
    pub fn request_url(&self, endpoint: &str, params: &Params) -> Result<Url, JikanError> {
        let raw = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        let mut url =
            Url::parse(&raw).map_err(|e| JikanError::InvalidUrl(format!("{}: {}", raw, e)))?;
        params.append_to(&mut url);
        Ok(url)
    }

    /// Fetches a JSON document from the API, serving it from cache when fresh
    ///
    /// # Arguments
    /// * `endpoint` - Path under the API root
    /// * `params` - Query parameters
    ///
    /// # Returns
    /// * `Ok(Value)` - The parsed response body
    /// * `Err(JikanError)` - If the request fails; nothing is cached
    ///
    /// # Behavior
    /// - A fresh cache entry is returned without touching the network
    /// - Concurrent calls for the same URL share one request
    /// - On a miss, waits the configured throttle before sending
    /// - A 429 response waits the backoff and retries, up to `max_attempts` in total
    pub async fn get(&self, endpoint: &str, params: &Params) -> Result<Value, JikanError> {
        let url = self.request_url(endpoint, params)?;
        self.cache
            .get_or_fetch(url.as_str(), || self.fetch_from_api(&url))
            .await
    }

    /// Sends the request, retrying while rate limited
    async fn fetch_from_api(&self, url: &Url) -> Result<Value, JikanError> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            tokio::time::sleep(self.config.throttle).await;

            debug!(%url, attempt, "sending request");
            let response = self.http_client.get(url.clone()).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!(%url, attempt, max_attempts, "rate limited by API");
                if attempt < max_attempts {
                    tokio::time::sleep(self.config.rate_limit_backoff).await;
                }
                continue;
            }

            if !status.is_success() {
                debug!(%url, status = status.as_u16(), "request failed");
                return Err(JikanError::RequestFailed(status.as_u16()));
            }

            let body = response.bytes().await?;
            return serde_json::from_slice(&body)
                .map_err(|e| JikanError::ParseError(e.to_string()));
        }

        Err(JikanError::RateLimitExceeded {
            attempts: max_attempts,
        })
    }

    /// Fetches an endpoint and unwraps its listing envelope
    async fn get_list(&self, endpoint: &str, params: &Params) -> Result<Vec<Value>, JikanError> {
        let body = self.get(endpoint, params).await?;
        Envelope::from_body(body)?.into_list()
    }

    /// Searches anime by free text with the safe-content filter on
    ///
    /// An empty or whitespace-only query returns no results without a request.
    pub async fn search_anime(&self, query: &str, limit: u32) -> Result<Vec<Anime>, JikanError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let params = Params::new()
            .with("q", query)
            .with("limit", limit)
            .with("sfw", true);
        decode_list(self.get_list("anime", &params).await?)
    }

    /// Fetches a single anime by MyAnimeList id
    ///
    /// Returns `Ok(None)` when the API omits the `data` field.
    pub async fn anime_by_id(&self, id: u32) -> Result<Option<Anime>, JikanError> {
        let body = self.get(&format!("anime/{}", id), &Params::new()).await?;
        Envelope::from_body(body)?
            .into_item()?
            .map(decode)
            .transpose()
    }

    /// Fetches the top currently-airing anime
    pub async fn trending_anime(&self, limit: u32) -> Result<Vec<Anime>, JikanError> {
        let params = Params::new().with("limit", limit).with("filter", "airing");
        decode_list(self.get_list("top/anime", &params).await?)
    }

    /// Fetches the most popular anime in a genre
    pub async fn anime_by_genre(&self, genre_id: u32, limit: u32) -> Result<Vec<Anime>, JikanError> {
        let params = Params::new()
            .with("genres", genre_id)
            .with("order_by", "popularity")
            .with("sort", "desc")
            .with("limit", limit);
        decode_list(self.get_list("anime", &params).await?)
    }

    /// Fetches a related-items listing for an anime as raw JSON entries
    pub async fn related(&self, id: u32, relation: Relation) -> Result<Vec<Value>, JikanError> {
        self.get_list(&format!("anime/{}/{}", id, relation.path()), &Params::new())
            .await
    }

    /// Fetches the characters of an anime
    pub async fn characters(&self, id: u32) -> Result<Vec<CharacterRole>, JikanError> {
        decode_list(self.related(id, Relation::Characters).await?)
    }

    /// Fetches user recommendations for an anime
    pub async fn recommendations(&self, id: u32) -> Result<Vec<Recommendation>, JikanError> {
        decode_list(self.related(id, Relation::Recommendations).await?)
    }
}
