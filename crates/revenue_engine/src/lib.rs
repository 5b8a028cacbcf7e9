use chrono::Utc;
use models::{
    CountryFilter, CountryKey, MonthlyCountryBucket, Order, RevenueSnapshot, RevenueSummary,
};
use std::collections::BTreeMap;

const MONTHS: usize = 12;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Running totals for one (month, country) cell. Raw sums only; rounding
/// happens once, when the cell is finalized into an output bucket.
#[derive(Debug, Default)]
struct BucketAcc {
    orders: u64,
    gross: f64,
    net: f64,
    tax: f64,
    shipping: f64,
    discount: f64,
    refund_amount: f64,
    refund_count: u64,
    items: u64,
}

impl BucketAcc {
    fn finalize(&self, month: u32, country: CountryKey) -> MonthlyCountryBucket {
        let avg = if self.orders > 0 {
            self.gross / self.orders as f64
        } else {
            0.0
        };
        MonthlyCountryBucket {
            month,
            country,
            orders: self.orders,
            gross_revenue: round2(self.gross),
            net_revenue: round2(self.net),
            tax: round2(self.tax),
            shipping: round2(self.shipping),
            discount: round2(self.discount),
            refund_amount: round2(self.refund_amount),
            refund_count: self.refund_count,
            items: self.items,
            avg_order_value: round2(avg),
        }
    }
}

/// Totals folded out of finalized buckets for one country selection.
struct FoldedTotals {
    total_revenue: f64,
    total_refunds: f64,
    net_revenue: f64,
    average_per_month: f64,
    highest_month: u32,
    highest_month_revenue: f64,
    monthly_revenue: BTreeMap<u32, f64>,
    monthly_refunds: BTreeMap<u32, f64>,
    total_orders: u64,
}

fn fold_buckets(buckets: &[MonthlyCountryBucket], filter: CountryFilter) -> FoldedTotals {
    let mut monthly_revenue: BTreeMap<u32, f64> = (1..=MONTHS as u32).map(|m| (m, 0.0)).collect();
    let mut monthly_refunds: BTreeMap<u32, f64> = (1..=MONTHS as u32).map(|m| (m, 0.0)).collect();
    let mut total_revenue = 0.0;
    let mut total_refunds = 0.0;
    let mut total_orders = 0u64;

    for bucket in buckets.iter().filter(|b| filter.includes(b.country)) {
        total_revenue += bucket.gross_revenue;
        total_refunds += bucket.refund_amount;
        total_orders += bucket.orders;
        *monthly_revenue.entry(bucket.month).or_insert(0.0) += bucket.gross_revenue;
        *monthly_refunds.entry(bucket.month).or_insert(0.0) += bucket.refund_amount;
    }

    for value in monthly_revenue.values_mut() {
        *value = round2(*value);
    }
    for value in monthly_refunds.values_mut() {
        *value = round2(*value);
    }

    // Strictly-greater comparison: the earliest month wins ties, and an
    // all-zero year reports January at 0.00.
    let mut highest_month = 1u32;
    let mut highest_month_revenue = monthly_revenue.get(&1).copied().unwrap_or(0.0);
    for (month, revenue) in &monthly_revenue {
        if *revenue > highest_month_revenue {
            highest_month = *month;
            highest_month_revenue = *revenue;
        }
    }

    let total_revenue = round2(total_revenue);
    let total_refunds = round2(total_refunds);

    FoldedTotals {
        total_revenue,
        total_refunds,
        net_revenue: round2(total_revenue - total_refunds),
        average_per_month: round2(total_revenue / MONTHS as f64),
        highest_month,
        highest_month_revenue,
        monthly_revenue,
        monthly_refunds,
        total_orders,
    }
}

/// Build the complete yearly snapshot from a raw order list.
///
/// Every order is tallied by country before its date is validated, so the
/// country tally counts all orders while the monthly buckets only contain
/// orders with a parseable creation date. The bucket list always covers the
/// full 12x3 month/country matrix, empty cells included.
pub fn aggregate_orders(year: i32, orders: &[Order]) -> RevenueSnapshot {
    let mut cells: [[BucketAcc; 3]; MONTHS] =
        std::array::from_fn(|_| std::array::from_fn(|_| BucketAcc::default()));
    let mut orders_by_country: BTreeMap<CountryKey, u64> = BTreeMap::new();
    let mut skipped = 0usize;

    for order in orders {
        let country = order.country_key();
        *orders_by_country.entry(country).or_insert(0) += 1;

        let Some(month) = order.creation_month() else {
            tracing::warn!(
                "order {} has no parseable creation date; excluded from monthly buckets",
                order.id
            );
            skipped += 1;
            continue;
        };

        let cell = &mut cells[(month - 1) as usize][country.index()];
        let gross = order.gross();
        let tax = order.tax();
        cell.orders += 1;
        cell.gross += gross;
        cell.net += gross - tax;
        cell.tax += tax;
        cell.shipping += order.shipping_cost();
        cell.discount += order.discount();
        cell.items += order.items_count();
        for refund in &order.refunds {
            // Refund totals come in negative on the wire; normalize to a
            // positive refunded amount.
            cell.refund_amount += refund.amount().abs();
            cell.refund_count += 1;
        }
    }

    let mut buckets = Vec::with_capacity(MONTHS * CountryKey::ALL.len());
    for (idx, row) in cells.iter().enumerate() {
        let month = idx as u32 + 1;
        for country in CountryKey::ALL {
            buckets.push(row[country.index()].finalize(month, country));
        }
    }

    let totals = fold_buckets(&buckets, CountryFilter::All);
    tracing::debug!(
        "aggregated {} orders for {} ({} skipped for missing dates)",
        orders.len(),
        year,
        skipped
    );

    RevenueSnapshot {
        year,
        total_revenue: totals.total_revenue,
        total_refunds: totals.total_refunds,
        net_revenue: totals.net_revenue,
        average_per_month: totals.average_per_month,
        highest_month: totals.highest_month,
        highest_month_revenue: totals.highest_month_revenue,
        monthly_revenue: totals.monthly_revenue,
        monthly_refunds: totals.monthly_refunds,
        total_orders: totals.total_orders,
        orders_by_country,
        buckets,
        last_updated: Utc::now().to_rfc3339(),
    }
}

/// Derive the response view for one country filter from a finished snapshot.
///
/// Country scoping never goes back to the raw orders: a scoped view is
/// recomputed from the 36 stored buckets, and the "all" view returns the
/// snapshot's own aggregates untouched. The bucket list and the country
/// tally pass through unfiltered in every case.
pub fn project(snapshot: &RevenueSnapshot, filter: CountryFilter) -> RevenueSummary {
    match filter {
        CountryFilter::All => RevenueSummary {
            country: filter.as_str().to_string(),
            total_revenue: snapshot.total_revenue,
            total_refunds: snapshot.total_refunds,
            net_revenue: snapshot.net_revenue,
            average_per_month: snapshot.average_per_month,
            highest_month: snapshot.highest_month,
            highest_month_revenue: snapshot.highest_month_revenue,
            monthly_revenue: snapshot.monthly_revenue.clone(),
            monthly_refunds: snapshot.monthly_refunds.clone(),
            total_orders: snapshot.total_orders,
            orders_by_country: snapshot.orders_by_country.clone(),
            buckets: snapshot.buckets.clone(),
            last_updated: snapshot.last_updated.clone(),
        },
        CountryFilter::Country(_) => {
            let totals = fold_buckets(&snapshot.buckets, filter);
            RevenueSummary {
                country: filter.as_str().to_string(),
                total_revenue: totals.total_revenue,
                total_refunds: totals.total_refunds,
                net_revenue: totals.net_revenue,
                average_per_month: totals.average_per_month,
                highest_month: totals.highest_month,
                highest_month_revenue: totals.highest_month_revenue,
                monthly_revenue: totals.monthly_revenue,
                monthly_refunds: totals.monthly_refunds,
                total_orders: totals.total_orders,
                orders_by_country: snapshot.orders_by_country.clone(),
                buckets: snapshot.buckets.clone(),
                last_updated: snapshot.last_updated.clone(),
            }
        }
    }
}
