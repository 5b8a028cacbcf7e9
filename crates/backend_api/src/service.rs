use async_trait::async_trait;
use models::{CountryFilter, Order, RevenueSummary};
use revenue_engine::{aggregate_orders, project};
use snapshot_store::SnapshotStore;
use std::sync::Arc;
use woo_client::{WooClient, WooError};

use crate::error::Result;

/// Source of the raw order list for one year.
/// This abstraction allows swapping the live WooCommerce client for a
/// scripted source in tests.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch_orders(&self, year: i32) -> std::result::Result<Vec<Order>, WooError>;
}

#[async_trait]
impl OrderSource for WooClient {
    async fn fetch_orders(&self, year: i32) -> std::result::Result<Vec<Order>, WooError> {
        self.fetch_orders_for_year(year).await
    }
}

/// Orchestrates the revenue pipeline: snapshot cache in front, the full
/// fetch-and-aggregate run behind it.
pub struct RevenueService {
    source: Arc<dyn OrderSource>,
    store: SnapshotStore,
    year: i32,
}

impl RevenueService {
    pub fn new(source: Arc<dyn OrderSource>, store: SnapshotStore, year: i32) -> Self {
        Self {
            source,
            store,
            year,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Serve the revenue summary for one country filter.
    ///
    /// Without `refresh`, a stored snapshot answers the request outright. On
    /// a cache miss or a forced refresh the full unfiltered year is fetched,
    /// aggregated and persisted, and the filter is applied to the fresh
    /// snapshot. Country scoping never reaches the order API; it is always a
    /// projection over stored buckets.
    pub async fn revenue_stats(
        &self,
        filter: CountryFilter,
        refresh: bool,
    ) -> Result<RevenueSummary> {
        if !refresh {
            if let Some(snapshot) = self.store.get(self.year) {
                tracing::debug!("serving {} revenue stats from the snapshot cache", self.year);
                return Ok(project(&snapshot, filter));
            }
        }

        tracing::info!(
            "rebuilding revenue snapshot for {} (refresh={})",
            self.year,
            refresh
        );
        let orders = self.source.fetch_orders(self.year).await?;
        let snapshot = aggregate_orders(self.year, &orders);
        if let Err(e) = self.store.put(self.year, &snapshot) {
            // Persisting is best-effort; the freshly computed numbers are
            // still served.
            tracing::warn!("failed to persist snapshot for {}: {}", self.year, e);
        }
        Ok(project(&snapshot, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use axum::http::StatusCode;
    use models::{Address, CountryKey, LineItem};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn make_order(id: i64, date: &str, country: &str, total: &str) -> Order {
        Order {
            id,
            status: "completed".to_string(),
            date_created_gmt: Some(date.to_string()),
            date_created: None,
            billing: Address {
                country: country.to_string(),
            },
            shipping: Address::default(),
            total: total.to_string(),
            total_tax: "0.00".to_string(),
            shipping_total: "0.00".to_string(),
            discount_total: "0.00".to_string(),
            line_items: vec![LineItem { quantity: 1 }],
            refunds: vec![],
        }
    }

    struct ScriptedSource {
        orders: Vec<Order>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(orders: Vec<Order>) -> Self {
            Self {
                orders,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OrderSource for ScriptedSource {
        async fn fetch_orders(&self, _year: i32) -> std::result::Result<Vec<Order>, WooError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.orders.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl OrderSource for FailingSource {
        async fn fetch_orders(&self, _year: i32) -> std::result::Result<Vec<Order>, WooError> {
            Err(WooError::Http {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "down for maintenance".to_string(),
            })
        }
    }

    fn service_with(
        source: Arc<ScriptedSource>,
        dir: &TempDir,
        year: i32,
    ) -> RevenueService {
        RevenueService::new(source, SnapshotStore::new(dir.path()), year)
    }

    #[tokio::test]
    async fn test_cache_miss_fetches_aggregates_and_persists() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::new(vec![
            make_order(1, "2024-02-01T10:00:00", "NL", "10.00"),
            make_order(2, "2024-03-01T10:00:00", "BE", "20.00"),
        ]));
        let service = service_with(source.clone(), &dir, 2024);

        let summary = service
            .revenue_stats(CountryFilter::All, false)
            .await
            .unwrap();
        assert_eq!(source.calls(), 1);
        assert!((summary.total_revenue - 30.00).abs() < 0.01);
        assert_eq!(summary.total_orders, 2);

        // The snapshot landed on disk and now answers without a fetch.
        let store = SnapshotStore::new(dir.path());
        assert_eq!(store.get(2024).unwrap().total_orders, 2);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_the_order_api() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let cached = aggregate_orders(
            2024,
            &[make_order(1, "2024-05-01T10:00:00", "NL", "42.00")],
        );
        store.put(2024, &cached).unwrap();

        let source = Arc::new(ScriptedSource::new(vec![make_order(
            2,
            "2024-06-01T10:00:00",
            "BE",
            "999.00",
        )]));
        let service = service_with(source.clone(), &dir, 2024);

        let summary = service
            .revenue_stats(CountryFilter::All, false)
            .await
            .unwrap();
        assert_eq!(source.calls(), 0);
        assert!((summary.total_revenue - 42.00).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_refresh_bypasses_a_valid_cache() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let stale = aggregate_orders(
            2024,
            &[make_order(1, "2024-05-01T10:00:00", "NL", "42.00")],
        );
        store.put(2024, &stale).unwrap();

        let source = Arc::new(ScriptedSource::new(vec![
            make_order(2, "2024-06-01T10:00:00", "BE", "10.00"),
            make_order(3, "2024-06-02T10:00:00", "BE", "10.00"),
            make_order(4, "2024-06-03T10:00:00", "BE", "10.00"),
        ]));
        let service = service_with(source.clone(), &dir, 2024);

        let summary = service
            .revenue_stats(CountryFilter::All, true)
            .await
            .unwrap();
        assert_eq!(source.calls(), 1);
        assert_eq!(summary.total_orders, 3);
        assert!((summary.total_revenue - 30.00).abs() < 0.01);

        // The stale snapshot was replaced on disk.
        assert_eq!(store.get(2024).unwrap().total_orders, 3);
    }

    #[tokio::test]
    async fn test_corrupt_cache_falls_back_to_a_fresh_run() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        std::fs::write(store.path_for(2024), "{ broken").unwrap();

        let source = Arc::new(ScriptedSource::new(vec![make_order(
            1,
            "2024-04-01T10:00:00",
            "NL",
            "15.00",
        )]));
        let service = service_with(source.clone(), &dir, 2024);

        let summary = service
            .revenue_stats(CountryFilter::All, false)
            .await
            .unwrap();
        assert_eq!(source.calls(), 1);
        assert_eq!(summary.total_orders, 1);
        assert_eq!(store.get(2024).unwrap().total_orders, 1);
    }

    #[tokio::test]
    async fn test_country_filter_is_served_from_the_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let cached = aggregate_orders(
            2024,
            &[
                make_order(1, "2024-01-01T10:00:00", "NL", "10.00"),
                make_order(2, "2024-01-02T10:00:00", "BE", "20.00"),
            ],
        );
        store.put(2024, &cached).unwrap();

        let source = Arc::new(ScriptedSource::new(vec![]));
        let service = service_with(source.clone(), &dir, 2024);

        let summary = service
            .revenue_stats(CountryFilter::Country(CountryKey::Be), false)
            .await
            .unwrap();
        // Scoped requests never trigger a country-scoped fetch.
        assert_eq!(source.calls(), 0);
        assert_eq!(summary.country, "BE");
        assert!((summary.total_revenue - 20.00).abs() < 0.01);
        assert_eq!(summary.total_orders, 1);
        assert_eq!(summary.buckets.len(), 36);
    }

    #[tokio::test]
    async fn test_upstream_failure_surfaces_when_nothing_is_cached() {
        let dir = TempDir::new().unwrap();
        let service = RevenueService::new(
            Arc::new(FailingSource),
            SnapshotStore::new(dir.path()),
            2024,
        );

        let err = service
            .revenue_stats(CountryFilter::All, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_unwritable_store_still_serves_fresh_numbers() {
        let dir = TempDir::new().unwrap();
        // A regular file where the data dir should be makes every write fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let source = Arc::new(ScriptedSource::new(vec![make_order(
            1,
            "2024-09-01T10:00:00",
            "NL",
            "33.00",
        )]));
        let service = RevenueService::new(
            source.clone(),
            SnapshotStore::new(blocker.join("data")),
            2024,
        );

        let summary = service
            .revenue_stats(CountryFilter::All, false)
            .await
            .unwrap();
        assert_eq!(source.calls(), 1);
        assert!((summary.total_revenue - 33.00).abs() < 0.01);
    }
}
