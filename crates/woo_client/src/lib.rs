use models::Order;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use thiserror::Error;

/// Orders per page. The WooCommerce REST API caps `per_page` at 100.
pub const PAGE_SIZE: usize = 100;

/// Hard ceiling on pages per run (20k orders) so a misbehaving upstream can
/// never keep the fetcher looping forever.
pub const MAX_PAGES: u32 = 200;

const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Statuses requested from the API. Cancelled and failed orders never
/// produced revenue and are left out.
const INCLUDED_STATUSES: &str = "pending,processing,on-hold,completed,refunded";

/// Dropped client-side as well, in case the upstream ignores the status
/// query parameter (older WooCommerce builds do).
const EXCLUDED_STATUSES: [&str; 2] = ["cancelled", "failed"];

const BODY_PREVIEW_CHARS: usize = 500;

/// Configuration for the WooCommerce orders endpoint.
///
/// Loaded from env vars:
/// - `WOO_BASE_URL`          (store root, e.g. `https://shop.example.com`)
/// - `WOO_CONSUMER_KEY`      (REST API consumer key)
/// - `WOO_CONSUMER_SECRET`   (REST API consumer secret)
/// - `WOO_PAGE_TIMEOUT_SECS` (default: 60)
///
/// There are no defaults for the store URL or the credentials; construction
/// of [`WooClient`] fails if they are missing.
#[derive(Debug, Clone)]
pub struct WooConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    /// Timeout applied to each page request. A single page slower than this
    /// aborts the whole run.
    pub page_timeout: Duration,
}

impl WooConfig {
    pub fn from_env() -> Self {
        let page_timeout = std::env::var("WOO_PAGE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PAGE_TIMEOUT);
        Self {
            base_url: std::env::var("WOO_BASE_URL").unwrap_or_default(),
            consumer_key: std::env::var("WOO_CONSUMER_KEY").unwrap_or_default(),
            consumer_secret: std::env::var("WOO_CONSUMER_SECRET").unwrap_or_default(),
            page_timeout,
        }
    }
}

#[derive(Debug, Error)]
pub enum WooError {
    #[error("order request for page {page} timed out after fetching {orders_fetched} orders")]
    PageTimeout { page: u32, orders_fetched: usize },

    #[error("order API returned HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("order API response for page {page} was not a list of orders")]
    UnexpectedShape { page: u32 },

    #[error("order request for page {page} failed: {source}")]
    Transport { page: u32, source: reqwest::Error },

    #[error("invalid WooCommerce configuration: {0}")]
    Config(String),
}

/// Read-only client for the legacy WooCommerce order API. Only supports the
/// one call the revenue pipeline needs: fetching every order of a year.
pub struct WooClient {
    http: Client,
    config: WooConfig,
}

impl WooClient {
    pub fn new(config: WooConfig) -> Result<Self, WooError> {
        if config.base_url.trim().is_empty() {
            return Err(WooError::Config("WOO_BASE_URL is not set".to_string()));
        }
        Url::parse(&config.base_url)
            .map_err(|e| WooError::Config(format!("WOO_BASE_URL is not a valid URL: {e}")))?;
        if config.consumer_key.trim().is_empty() || config.consumer_secret.trim().is_empty() {
            return Err(WooError::Config(
                "WOO_CONSUMER_KEY and WOO_CONSUMER_SECRET are required".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(config.page_timeout)
            .build()
            .map_err(|e| WooError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn orders_endpoint(&self) -> String {
        format!(
            "{}/wp-json/wc/v3/orders",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Fetch every order created in `year`, walking the paginated endpoint
    /// until it runs dry.
    ///
    /// Pagination stops when a page comes back shorter than the page size,
    /// when the page count declared by the first response is reached, or at
    /// the [`MAX_PAGES`] ceiling. The short-page check uses the raw page
    /// length, before the cancelled/failed filter, so a page thinned out by
    /// the filter does not end the walk early.
    pub async fn fetch_orders_for_year(&self, year: i32) -> Result<Vec<Order>, WooError> {
        let endpoint = self.orders_endpoint();
        let after = format!("{year}-01-01T00:00:00Z");
        let before = format!("{year}-12-31T23:59:59Z");
        let per_page = PAGE_SIZE.to_string();

        let mut all = Vec::new();
        let mut total_pages_hint: Option<u32> = None;
        let mut page: u32 = 1;

        loop {
            let page_str = page.to_string();
            let query = [
                ("consumer_key", self.config.consumer_key.as_str()),
                ("consumer_secret", self.config.consumer_secret.as_str()),
                ("after", after.as_str()),
                ("before", before.as_str()),
                ("status", INCLUDED_STATUSES),
                ("per_page", per_page.as_str()),
                ("page", page_str.as_str()),
            ];

            let response = self
                .http
                .get(&endpoint)
                .query(&query)
                .send()
                .await
                .map_err(|e| classify_request_error(page, all.len(), e))?;

            if page == 1 {
                total_pages_hint = header_number(&response, "x-wp-totalpages").map(|n| n as u32);
                if let Some(total) = header_number(&response, "x-wp-total") {
                    tracing::debug!(
                        "order API reports {} orders for {} across {} pages",
                        total,
                        year,
                        total_pages_hint.unwrap_or(0)
                    );
                }
            }

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(WooError::Http {
                    status,
                    body: preview(&body),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| classify_request_error(page, all.len(), e))?;
            let raw_orders: Vec<serde_json::Value> =
                serde_json::from_str(&body).map_err(|_| WooError::UnexpectedShape { page })?;
            let raw_count = raw_orders.len();

            let mut kept = 0usize;
            for raw in raw_orders {
                match serde_json::from_value::<Order>(raw) {
                    Ok(order) => {
                        if EXCLUDED_STATUSES.contains(&order.status.as_str()) {
                            continue;
                        }
                        all.push(order);
                        kept += 1;
                    }
                    Err(e) => {
                        tracing::warn!("skipping malformed order record on page {}: {}", page, e);
                    }
                }
            }
            tracing::debug!("page {}: {} orders received, {} kept", page, raw_count, kept);

            // An empty or short page means the API ran out of orders.
            if raw_count < PAGE_SIZE {
                break;
            }
            if let Some(total) = total_pages_hint {
                if page >= total {
                    break;
                }
            }
            if page >= MAX_PAGES {
                tracing::warn!(
                    "hit the {}-page ceiling for {}; result may be truncated at {} orders",
                    MAX_PAGES,
                    year,
                    all.len()
                );
                break;
            }
            page += 1;
        }

        tracing::info!("retrieved {} orders for {} across {} pages", all.len(), year, page);
        Ok(all)
    }
}

fn classify_request_error(page: u32, orders_fetched: usize, err: reqwest::Error) -> WooError {
    if err.is_timeout() {
        WooError::PageTimeout {
            page,
            orders_fetched,
        }
    } else {
        WooError::Transport { page, source: err }
    }
}

fn header_number(response: &reqwest::Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn preview(body: &str) -> String {
    let truncated: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
    if truncated.len() < body.len() {
        format!("{truncated}...")
    } else {
        truncated
    }
}
