//! Events provider client (Luma public API)
//!
//! Every request goes through the shared [`RateLimiter`]: minimum spacing between
//! requests, bounded backoff on HTTP 429. Client errors other than 429 are not retried;
//! 401/403 surface as `PROVIDER_UNAUTHORIZED` so the reconciler can abort that operator.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{Guest, RemoteEvent};
use crate::providers::rate_limit::{RateLimiter, THROTTLED_STATUS};
use crate::utils::constants::{
    EVENTS_PAGE_LIMIT, GUESTS_PAGE_LIMIT, LUMA_API_KEY_HEADER, USER_AGENT as USER_AGENT_CONST,
};

/// Read access to the events provider, per operator API key
#[async_trait]
pub trait EventsProvider: Send + Sync {
    /// Verify the key is accepted
    async fn test_credential(&self, api_key: &str) -> AppResult<()>;

    /// Every event on the operator's calendar, past events included
    async fn list_events(&self, api_key: &str) -> AppResult<Vec<RemoteEvent>>;

    async fn get_event(&self, api_key: &str, event_id: &str) -> AppResult<RemoteEvent>;

    /// Full guest list of one event
    async fn get_event_guests(&self, api_key: &str, event_id: &str) -> AppResult<Vec<Guest>>;
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    entries: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    event: RemoteEvent,
}

#[derive(Debug, Deserialize)]
struct GuestEntry {
    guest: Guest,
}

/// HTTP client for the Luma public API
pub struct LumaClient {
    base_url: String,
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    max_attempts: u32,
}

impl LumaClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        limiter: Arc<RateLimiter>,
        max_retries: u32,
    ) -> AppResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("🌐 Events provider client ready ({})", base_url);
        Ok(Self {
            base_url,
            client: Self::build_client(timeout)?,
            limiter,
            max_attempts: max_retries + 1,
        })
    }

    /// HTTP client with default headers and gzip enabled
    fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| AppError::with_source(ErrorCode::ProviderUnavailable, "Failed to build HTTP client", e))
    }

    /// Rate-limited GET with throttling backoff
    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)], api_key: &str) -> AppResult<T> {
        let url = format!("{}/{}", self.base_url, path);
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| AppError::unauthorized("API key contains invalid header characters"))?;
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            self.limiter.wait().await;

            let response = match self
                .client
                .get(&url)
                .query(query)
                .header(LUMA_API_KEY_HEADER, key.clone())
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    warn!("⚠️ Provider request failed (attempt {}/{}): {}", attempt + 1, self.max_attempts, e);
                    self.limiter.reset().await;
                    last_error = Some(AppError::from(e));
                    continue;
                }
            };

            let status = response.status().as_u16();
            debug!("📡 {} -> {}", path, status);

            if status == THROTTLED_STATUS {
                if self.limiter.backoff(status).await {
                    continue;
                }
                return Err(AppError::rate_limited(self.max_attempts - 1));
            }
            self.limiter.backoff(status).await;

            if response.status().is_success() {
                let body = response.text().await?;
                return serde_json::from_str(&body).map_err(AppError::from);
            }

            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            match status {
                401 | 403 => {
                    return Err(AppError::unauthorized(format!(
                        "Provider rejected API key (HTTP {})",
                        status
                    )))
                }
                400..=499 => {
                    return Err(AppError::new(
                        ErrorCode::ProviderHttp,
                        format!("Provider returned HTTP {}: {}", status, snippet),
                    ))
                }
                _ => {
                    warn!("⚠️ Provider server error HTTP {} (attempt {}/{})", status, attempt + 1, self.max_attempts);
                    last_error = Some(AppError::new(
                        ErrorCode::ProviderHttp,
                        format!("Provider returned HTTP {}: {}", status, snippet),
                    ));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::new(ErrorCode::ProviderUnavailable, "Provider request failed")
        }))
    }

    /// Follow `next_cursor` while `has_more`
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        mut query: Vec<(&str, String)>,
        api_key: &str,
    ) -> AppResult<Vec<T>> {
        let mut items = Vec::new();
        let base_len = query.len();

        loop {
            let page: Page<T> = self.get(path, &query, api_key).await?;
            items.extend(page.entries);

            match page.next_cursor {
                Some(cursor) if page.has_more && !cursor.is_empty() => {
                    query.truncate(base_len);
                    query.push(("pagination_cursor", cursor));
                }
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl EventsProvider for LumaClient {
    async fn test_credential(&self, api_key: &str) -> AppResult<()> {
        let _: serde_json::Value = self.get("user/get-self", &[], api_key).await?;
        Ok(())
    }

    async fn list_events(&self, api_key: &str) -> AppResult<Vec<RemoteEvent>> {
        let query = vec![
            ("series_mode", "events".to_string()),
            ("pagination_limit", EVENTS_PAGE_LIMIT.to_string()),
            ("include_past_events", "true".to_string()),
        ];
        let entries: Vec<EventEntry> = self.get_all_pages("calendar/list-events", query, api_key).await?;
        Ok(entries.into_iter().map(|e| e.event).collect())
    }

    async fn get_event(&self, api_key: &str, event_id: &str) -> AppResult<RemoteEvent> {
        let entry: EventEntry = self
            .get("event/get", &[("api_id", event_id.to_string())], api_key)
            .await?;
        Ok(entry.event)
    }

    async fn get_event_guests(&self, api_key: &str, event_id: &str) -> AppResult<Vec<Guest>> {
        let query = vec![
            ("event_api_id", event_id.to_string()),
            ("pagination_limit", GUESTS_PAGE_LIMIT.to_string()),
        ];
        let entries: Vec<GuestEntry> = self.get_all_pages("event/get-guests", query, api_key).await?;
        Ok(entries.into_iter().map(|e| e.guest).collect())
    }
}
