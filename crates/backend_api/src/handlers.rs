use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use models::CountryFilter;
use serde::Deserialize;
use std::sync::Arc;

use crate::{error::ApiError, service::RevenueService, Result};

pub type ServiceState = Arc<RevenueService>;

#[derive(Debug, Deserialize)]
pub struct RevenueStatsQuery {
    /// "all" (default), "NL", "BE" or "OTHER", case-insensitive.
    pub country: Option<String>,
    /// "true" forces a rebuild from the order API; anything else reads the
    /// snapshot cache.
    pub refresh: Option<String>,
}

/// GET /api/revenue-stats
/// Returns the yearly revenue summary, optionally scoped to one country
pub async fn get_revenue_stats(
    State(service): State<ServiceState>,
    Query(params): Query<RevenueStatsQuery>,
) -> Result<impl IntoResponse> {
    let raw_country = params.country.unwrap_or_else(|| "all".to_string());
    let filter = CountryFilter::from_str(&raw_country)
        .ok_or_else(|| ApiError::InvalidCountry(raw_country.clone()))?;
    let refresh = params.refresh.as_deref() == Some("true");

    let summary = service.revenue_stats(filter, refresh).await?;

    Ok(Json(summary))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "revenue-stats-api"
    }))
}
