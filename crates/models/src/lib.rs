use chrono::{DateTime, Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// Wire types for the legacy WooCommerce order API. Monetary fields arrive as
// JSON strings ("129.95"); unparseable amounts count as 0.00 like the old
// storefront did.

#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub date_created_gmt: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub billing: Address,
    #[serde(default)]
    pub shipping: Address,
    #[serde(default)]
    pub total: String,
    #[serde(default)]
    pub total_tax: String,
    #[serde(default)]
    pub shipping_total: String,
    #[serde(default)]
    pub discount_total: String,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub refunds: Vec<RefundSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub quantity: u32,
}

/// Refund stub embedded in the order payload (`refunds: [{id, reason, total}]`).
/// The total is negative in the wire format.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundSummary {
    #[serde(default)]
    pub total: String,
}

impl RefundSummary {
    /// Signed refund amount as reported by the API (usually negative).
    pub fn amount(&self) -> f64 {
        parse_amount(&self.total)
    }
}

impl Order {
    pub fn gross(&self) -> f64 {
        parse_amount(&self.total)
    }

    pub fn tax(&self) -> f64 {
        parse_amount(&self.total_tax)
    }

    pub fn shipping_cost(&self) -> f64 {
        parse_amount(&self.shipping_total)
    }

    pub fn discount(&self) -> f64 {
        parse_amount(&self.discount_total)
    }

    /// Sum of line-item quantities.
    pub fn items_count(&self) -> u64 {
        self.line_items.iter().map(|li| u64::from(li.quantity)).sum()
    }

    /// Country bucket for this order: billing country wins, shipping country
    /// is the fallback, everything else lands in OTHER.
    pub fn country_key(&self) -> CountryKey {
        CountryKey::from_codes(&self.billing.country, &self.shipping.country)
    }

    /// Month (1-12) of the order's creation timestamp. Prefers the GMT field
    /// and falls back to the shop-local one; accepts both the WooCommerce
    /// `YYYY-MM-DDTHH:MM:SS` shape and full RFC 3339. Returns None when
    /// neither field parses.
    pub fn creation_month(&self) -> Option<u32> {
        for raw in [self.date_created_gmt.as_deref(), self.date_created.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Some(month) = parse_month(raw) {
                return Some(month);
            }
        }
        None
    }
}

fn parse_month(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.month());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.month());
    }
    None
}

fn parse_amount(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or(0.0)
}

/// Closed country classification for the revenue breakdown. The shop sells
/// almost exclusively to the Netherlands and Belgium; everything else is
/// folded into one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CountryKey {
    #[serde(rename = "NL")]
    Nl,
    #[serde(rename = "BE")]
    Be,
    #[serde(rename = "OTHER")]
    Other,
}

impl CountryKey {
    pub const ALL: [CountryKey; 3] = [CountryKey::Nl, CountryKey::Be, CountryKey::Other];

    /// Billing country if non-empty, else shipping country, else empty; the
    /// ISO codes "NL" and "BE" map literally, anything else is OTHER.
    pub fn from_codes(billing: &str, shipping: &str) -> Self {
        let code = if billing.is_empty() { shipping } else { billing };
        match code {
            "NL" => CountryKey::Nl,
            "BE" => CountryKey::Be,
            _ => CountryKey::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CountryKey::Nl => "NL",
            CountryKey::Be => "BE",
            CountryKey::Other => "OTHER",
        }
    }

    /// Position inside a per-month row (NL, BE, OTHER).
    pub fn index(&self) -> usize {
        match self {
            CountryKey::Nl => 0,
            CountryKey::Be => 1,
            CountryKey::Other => 2,
        }
    }
}

impl fmt::Display for CountryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Country selector for the query surface: the whole year or one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountryFilter {
    All,
    Country(CountryKey),
}

impl CountryFilter {
    pub fn from_str(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("all") {
            return Some(CountryFilter::All);
        }
        if raw.eq_ignore_ascii_case("NL") {
            return Some(CountryFilter::Country(CountryKey::Nl));
        }
        if raw.eq_ignore_ascii_case("BE") {
            return Some(CountryFilter::Country(CountryKey::Be));
        }
        if raw.eq_ignore_ascii_case("OTHER") {
            return Some(CountryFilter::Country(CountryKey::Other));
        }
        None
    }

    pub fn includes(&self, key: CountryKey) -> bool {
        match self {
            CountryFilter::All => true,
            CountryFilter::Country(selected) => *selected == key,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CountryFilter::All => "all",
            CountryFilter::Country(key) => key.as_str(),
        }
    }
}

/// One (month, country) accumulator cell, finalized for output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyCountryBucket {
    pub month: u32,
    pub country: CountryKey,
    pub orders: u64,
    pub gross_revenue: f64,
    pub net_revenue: f64,
    pub tax: f64,
    pub shipping: f64,
    pub discount: f64,
    pub refund_amount: f64,
    pub refund_count: u64,
    pub items: u64,
    pub avg_order_value: f64,
}

/// The complete, persisted aggregation result for one year. Built once per
/// aggregation run, never mutated afterwards, serialized verbatim to the
/// snapshot store. The bucket list always carries the full 12x3 matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueSnapshot {
    pub year: i32,
    pub total_revenue: f64,
    pub total_refunds: f64,
    pub net_revenue: f64,
    pub average_per_month: f64,
    pub highest_month: u32,
    pub highest_month_revenue: f64,
    pub monthly_revenue: BTreeMap<u32, f64>,
    pub monthly_refunds: BTreeMap<u32, f64>,
    pub total_orders: u64,
    /// Raw order count per country, incremented before date validation. An
    /// order with an unparseable date shows up here but in no revenue bucket,
    /// so this tally may exceed the sum of bucket order counts.
    pub orders_by_country: BTreeMap<CountryKey, u64>,
    pub buckets: Vec<MonthlyCountryBucket>,
    pub last_updated: String,
}

/// Response view derived from a snapshot for one country filter. Never
/// persisted; the bucket list stays unfiltered regardless of the summary
/// filter so downstream consumers always see the raw breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct RevenueSummary {
    pub country: String,
    pub total_revenue: f64,
    pub total_refunds: f64,
    pub net_revenue: f64,
    pub average_per_month: f64,
    pub highest_month: u32,
    pub highest_month_revenue: f64,
    pub monthly_revenue: BTreeMap<u32, f64>,
    pub monthly_refunds: BTreeMap<u32, f64>,
    pub total_orders: u64,
    pub orders_by_country: BTreeMap<CountryKey, u64>,
    pub buckets: Vec<MonthlyCountryBucket>,
    pub last_updated: String,
}
