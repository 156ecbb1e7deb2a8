pub mod aad;
pub mod lookup;
pub mod planner;
pub mod search;
pub mod sharepoint;
pub mod spo;
pub mod teams;
pub mod todo;

use crate::error::{M365Error, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Accept header for Graph requests that do not need OData annotations
pub const GRAPH_ACCEPT: &str = "application/json;odata.metadata=none";

/// Default retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 30000;
const JITTER_FACTOR: f64 = 0.3; // +/- 30% jitter

/// Calculate backoff with jitter for exponential backoff
fn calculate_backoff_with_jitter(initial: Duration, attempt: u32) -> Duration {
    let initial_ms = initial.as_millis() as u64;
    if initial_ms == 0 {
        return Duration::ZERO;
    }

    let capped_backoff = initial_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(MAX_BACKOFF_MS);

    let jitter_range = (capped_backoff as f64 * JITTER_FACTOR) as u64;
    let jitter = if jitter_range > 0 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::time::SystemTime::now().hash(&mut hasher);
        (hasher.finish() % (jitter_range * 2)) as i64 - jitter_range as i64
    } else {
        0
    };

    Duration::from_millis((capped_backoff as i64 + jitter).max(0) as u64)
}

/// Send a request, retrying 429 (honouring `Retry-After`), 5xx and
/// connection failures. Other error statuses are turned into `ApiError`
/// with the OData message of the body.
///
/// `build` is called once per attempt because a `RequestBuilder` is consumed
/// by `send`.
pub(crate) async fn send_with_retry<F>(
    build: F,
    label: &str,
    initial_backoff: Duration,
) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    for attempt in 0..MAX_RETRIES {
        let last_attempt = attempt == MAX_RETRIES - 1;
        debug!("{} (attempt {}/{})", label, attempt + 1, MAX_RETRIES);

        match build().send().await {
            Ok(resp) => {
                let status = resp.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS && !last_attempt {
                    let retry_after = resp
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| calculate_backoff_with_jitter(initial_backoff, attempt));
                    warn!(
                        "Rate limited (429). Retrying in {:?}... (attempt {}/{})",
                        retry_after,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(retry_after).await;
                    continue;
                }

                if status.is_server_error() && !last_attempt {
                    let wait_time = calculate_backoff_with_jitter(initial_backoff, attempt);
                    warn!(
                        "Server error ({}). Retrying in {:?}... (attempt {}/{})",
                        status,
                        wait_time,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(wait_time).await;
                    continue;
                }

                if !status.is_success() {
                    let error_text = resp.text().await.unwrap_or_default();
                    debug!("{} failed with {}: {}", label, status, error_text);
                    return Err(M365Error::from_response(status.as_u16(), &error_text));
                }

                return Ok(resp);
            }
            Err(e) => {
                if !last_attempt {
                    let wait_time = calculate_backoff_with_jitter(initial_backoff, attempt);
                    warn!(
                        "Connection error: {}. Retrying in {:?}... (attempt {}/{})",
                        e,
                        wait_time,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(wait_time).await;
                    continue;
                }
                return Err(e.into());
            }
        }
    }

    Err(M365Error::ApiError {
        status: 0,
        code: None,
        message: format!("{} failed after {} retries", label, MAX_RETRIES),
    })
}

/// Deserialize a response body, treating an empty body as JSON `null`
pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let text = resp.text().await?;
    if text.trim().is_empty() {
        return Ok(serde_json::from_value(serde_json::Value::Null)?);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Microsoft Graph client with retry support
pub struct GraphClient {
    client: Client,
    access_token: String,
    base_url: String,
    initial_backoff: Duration,
}

impl GraphClient {
    pub fn new(access_token: String) -> Self {
        Self::with_base_url(access_token, GRAPH_API_BASE)
    }

    /// Client against a different Graph root, e.g. a mock server
    pub fn with_base_url(access_token: String, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            access_token,
            base_url: base_url.trim_end_matches('/').to_string(),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Override the first retry delay (tests use zero)
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Absolute URL for an endpoint; absolute URLs (nextLink) pass through
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }

    fn request(&self, method: Method, url: &str, headers: &[(&str, &str)]) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .bearer_auth(&self.access_token);
        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("accept")) {
            builder = builder.header("accept", GRAPH_ACCEPT);
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        endpoint: &str,
        headers: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<Response> {
        let url = self.url(endpoint);
        let label = format!("{} {}", method, url);
        send_with_retry(
            || {
                let builder = self.request(method.clone(), &url, headers);
                match body {
                    Some(b) => builder.json(b),
                    None => builder,
                }
            },
            &label,
            self.initial_backoff,
        )
        .await
    }

    /// Make a GET request to Graph API with retry for transient failures
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.get_with_headers(endpoint, &[]).await
    }

    pub async fn get_with_headers<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        headers: &[(&str, &str)],
    ) -> Result<T> {
        let resp = self
            .send::<()>(Method::GET, endpoint, headers, None)
            .await?;
        read_json(resp).await
    }

    /// GET returning the raw body, for endpoints that answer with CSV
    pub async fn get_text(&self, endpoint: &str) -> Result<String> {
        let resp = self
            .send::<()>(Method::GET, endpoint, &[], None)
            .await?;
        Ok(resp.text().await?)
    }

    /// Make a POST request to Graph API with retry for transient failures
    pub async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<R> {
        let resp = self.send(Method::POST, endpoint, &[], Some(body)).await?;
        read_json(resp).await
    }

    /// Make a PATCH request to Graph API with retry
    pub async fn patch<T: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<R> {
        self.patch_with_headers(endpoint, body, &[]).await
    }

    pub async fn patch_with_headers<T: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &T,
        headers: &[(&str, &str)],
    ) -> Result<R> {
        let resp = self
            .send(Method::PATCH, endpoint, headers, Some(body))
            .await?;
        read_json(resp).await
    }

    /// PATCH for endpoints that answer 204 No Content
    pub async fn patch_no_content<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<()> {
        self.send(Method::PATCH, endpoint, &[], Some(body)).await?;
        Ok(())
    }
}

// ============================================================================
// Pagination Helpers
// ============================================================================

/// Generic paginated response from Graph API
///
/// Use this for standard OData paginated responses with `value` array and `@odata.nextLink`
#[derive(Debug, Deserialize)]
pub struct PaginatedResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
    #[serde(rename = "@odata.count")]
    pub count: Option<i64>,
}

impl GraphClient {
    /// Fetch all pages of a paginated Graph API endpoint
    ///
    /// Automatically follows `@odata.nextLink` until all pages are retrieved.
    ///
    /// # Example
    /// ```ignore
    /// let all_users: Vec<User> = client.get_all_pages("users").await?;
    /// ```
    pub async fn get_all_pages<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let mut all_items: Vec<T> = Vec::new();
        let mut current_url = self.url(endpoint);

        loop {
            let response: PaginatedResponse<T> = self.get(&current_url).await?;
            all_items.extend(response.value);

            match response.next_link {
                Some(next) => current_url = next,
                None => break,
            }
        }

        Ok(all_items)
    }
}
