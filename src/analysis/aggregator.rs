//! Grouped sales metrics.
//!
//! Every aggregation reads the immutable [`Table`] and returns a fresh,
//! rounded table. Each one is gated on the columns it needs and returns
//! [`Availability::Unavailable`] instead of failing when they are absent.

use crate::analysis::stats::{pct_change, round2, sample_indices, weighted_asp, SampleSettings};
use crate::models::{
    Availability, Column, CrossTab, Dimension, EnginePrice, GroupRevenue, GroupShare,
    MissingColumns, PriceMileage, SalesRecord, Table, YearlyRevenue, YearlyVolume,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Which rows feed a revenue or price grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    /// Every row.
    All,
    /// Only rows with `Sales_Volume > 0`; missing volume is dropped too.
    PositiveVolume,
}

impl RowFilter {
    pub fn keeps(&self, row: &SalesRecord) -> bool {
        match self {
            RowFilter::All => true,
            RowFilter::PositiveVolume => row.sales_volume.is_some_and(|v| v > 0.0),
        }
    }
}

/// Running sums for one revenue group.
#[derive(Debug, Default)]
struct RevenueAccumulator {
    volume: f64,
    revenue: f64,
    price_sum: f64,
    price_count: usize,
}

impl RevenueAccumulator {
    fn add(&mut self, row: &SalesRecord) {
        self.volume += row.sales_volume.unwrap_or(0.0);
        self.revenue += row.revenue().unwrap_or(0.0);
        if let Some(price) = row.price_usd {
            self.price_sum += price;
            self.price_count += 1;
        }
    }

    fn avg_price(&self) -> Option<f64> {
        (self.price_count > 0).then(|| self.price_sum / self.price_count as f64)
    }
}

/// Check the required columns, logging when an aggregation has to be skipped.
fn gate(table: &Table, operation: &str, required: &[Column]) -> Result<(), MissingColumns> {
    table.require(required).map_err(|missing| {
        warn!("Cannot compute {}: {}", operation, missing);
        missing
    })
}

/// Descending by `primary`, ties broken by ascending key.
fn descending<K: Ord>(a: (f64, &K), b: (f64, &K)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1))
}

/// Units sold per year, ascending, with year-over-year growth.
pub fn yearly_volume(table: &Table) -> Availability<Vec<YearlyVolume>> {
    if let Err(missing) = gate(table, "yearly volume", &[Column::Year, Column::SalesVolume]) {
        return Availability::Unavailable(missing);
    }

    let mut totals: BTreeMap<i32, f64> = BTreeMap::new();
    for row in table.rows() {
        if let Some(year) = row.year {
            *totals.entry(year).or_default() += row.sales_volume.unwrap_or(0.0);
        }
    }

    let mut previous: Option<f64> = None;
    let rows: Vec<YearlyVolume> = totals
        .into_iter()
        .map(|(year, total)| {
            let growth = previous.and_then(|prev| pct_change(prev, total));
            previous = Some(total);
            YearlyVolume {
                year,
                total_sales_volume: round2(total),
                yoy_growth_pct: growth.map(round2),
            }
        })
        .collect();

    debug!("Yearly volume covers {} years", rows.len());
    Availability::Computed(rows)
}

/// Volume, revenue, mean price and weighted ASP per year, ascending.
pub fn yearly_price_revenue(table: &Table) -> Availability<Vec<YearlyRevenue>> {
    let required = [Column::Year, Column::SalesVolume, Column::PriceUsd];
    if let Err(missing) = gate(table, "yearly price and revenue", &required) {
        return Availability::Unavailable(missing);
    }

    let mut groups: BTreeMap<i32, RevenueAccumulator> = BTreeMap::new();
    for row in table.rows() {
        if let Some(year) = row.year {
            groups.entry(year).or_default().add(row);
        }
    }

    let rows = groups
        .into_iter()
        .map(|(year, acc)| YearlyRevenue {
            year,
            total_sales_volume: round2(acc.volume),
            total_revenue_usd: round2(acc.revenue),
            avg_price_usd: acc.avg_price().map(round2),
            weighted_asp_usd: round2(weighted_asp(acc.revenue, acc.volume)),
        })
        .collect();

    Availability::Computed(rows)
}

/// Units sold per model or region with each group's share of the total.
///
/// Sorted by volume, largest first.
pub fn group_share(table: &Table, dimension: Dimension) -> Availability<Vec<GroupShare>> {
    let operation = format!("{} share", dimension);
    if let Err(missing) = gate(table, &operation, &[dimension.column(), Column::SalesVolume]) {
        return Availability::Unavailable(missing);
    }

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for row in table.rows() {
        if let Some(key) = row.key(dimension) {
            *totals.entry(key.to_string()).or_default() += row.sales_volume.unwrap_or(0.0);
        }
    }

    let grand_total: f64 = totals.values().sum();
    let mut groups: Vec<(String, f64)> = totals.into_iter().collect();
    groups.sort_by(|a, b| descending((a.1, &a.0), (b.1, &b.0)));

    let rows: Vec<GroupShare> = groups
        .into_iter()
        .map(|(key, volume)| GroupShare {
            label: dimension.label(key),
            total_sales_volume: round2(volume),
            share_pct: (grand_total > 0.0).then(|| round2(volume / grand_total * 100.0)),
        })
        .collect();

    debug!("{} share covers {} groups", dimension, rows.len());
    Availability::Computed(rows)
}

/// Revenue metrics per model or region over rows with positive volume.
///
/// Sorted by revenue, largest first.
pub fn group_revenue(table: &Table, dimension: Dimension) -> Availability<Vec<GroupRevenue>> {
    group_revenue_with(table, dimension, RowFilter::PositiveVolume)
}

/// Revenue metrics per model or region over the rows `filter` keeps.
pub fn group_revenue_with(
    table: &Table,
    dimension: Dimension,
    filter: RowFilter,
) -> Availability<Vec<GroupRevenue>> {
    let operation = format!("{} revenue", dimension);
    let required = [Column::PriceUsd, Column::SalesVolume, dimension.column()];
    if let Err(missing) = gate(table, &operation, &required) {
        return Availability::Unavailable(missing);
    }

    let mut groups: BTreeMap<String, RevenueAccumulator> = BTreeMap::new();
    for row in table.rows().iter().filter(|r| filter.keeps(r)) {
        if let Some(key) = row.key(dimension) {
            groups.entry(key.to_string()).or_default().add(row);
        }
    }

    let mut groups: Vec<(String, RevenueAccumulator)> = groups.into_iter().collect();
    groups.sort_by(|a, b| descending((a.1.revenue, &a.0), (b.1.revenue, &b.0)));

    let rows = groups
        .into_iter()
        .map(|(key, acc)| GroupRevenue {
            label: dimension.label(key),
            total_sales_volume: round2(acc.volume),
            total_revenue_usd: round2(acc.revenue),
            avg_price_usd: acc.avg_price().map(round2),
            weighted_asp_usd: round2(weighted_asp(acc.revenue, acc.volume)),
        })
        .collect();

    Availability::Computed(rows)
}

/// Re-sort revenue groups by volume, ties broken by label.
pub fn sort_by_volume(rows: &mut [GroupRevenue], largest_first: bool) {
    rows.sort_by(|a, b| {
        let order = descending((a.total_sales_volume, &a.label), (b.total_sales_volume, &b.label));
        if largest_first {
            order
        } else {
            a.total_sales_volume
                .total_cmp(&b.total_sales_volume)
                .then_with(|| a.label.cmp(&b.label))
        }
    });
}

/// Mean price per engine displacement, ascending by displacement.
pub fn engine_size_price(table: &Table, filter: RowFilter) -> Availability<Vec<EnginePrice>> {
    let mut required = vec![Column::PriceUsd, Column::EngineSizeL];
    if filter == RowFilter::PositiveVolume {
        required.push(Column::SalesVolume);
    }
    if let Err(missing) = gate(table, "engine size vs price", &required) {
        return Availability::Unavailable(missing);
    }

    let mut points: Vec<(f64, Option<f64>)> = table
        .rows()
        .iter()
        .filter(|r| filter.keeps(r))
        .filter_map(|r| Some((r.engine_size_l?, r.price_usd)))
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    // (size, price sum, priced rows)
    let mut groups: Vec<(f64, f64, usize)> = Vec::new();
    for (engine, price) in points {
        if groups.last().map_or(true, |last| last.0 != engine) {
            groups.push((engine, 0.0, 0));
        }
        if let (Some(last), Some(p)) = (groups.last_mut(), price) {
            last.1 += p;
            last.2 += 1;
        }
    }

    Availability::Computed(groups.into_iter().map(engine_row).collect())
}

fn engine_row((size, sum, count): (f64, f64, usize)) -> EnginePrice {
    EnginePrice {
        engine_size_l: round2(size),
        price_usd: (count > 0).then(|| round2(sum / count as f64)),
    }
}

/// Units sold per region and year.
pub fn year_region_volume(table: &Table) -> Availability<CrossTab> {
    let required = [Column::Year, Column::Region, Column::SalesVolume];
    if let Err(missing) = gate(table, "year x region volume", &required) {
        return Availability::Unavailable(missing);
    }

    let mut totals: BTreeMap<(String, i32), f64> = BTreeMap::new();
    let mut years: BTreeSet<i32> = BTreeSet::new();
    let mut regions: BTreeSet<String> = BTreeSet::new();
    for row in table.rows() {
        if let (Some(year), Some(region)) = (row.year, row.region.as_ref()) {
            years.insert(year);
            regions.insert(region.clone());
            *totals.entry((region.clone(), year)).or_default() += row.sales_volume.unwrap_or(0.0);
        }
    }

    let years: Vec<i32> = years.into_iter().collect();
    let regions: Vec<String> = regions.into_iter().collect();
    let cells = regions
        .iter()
        .map(|region| {
            years
                .iter()
                .map(|year| totals.get(&(region.clone(), *year)).copied().map(round2))
                .collect()
        })
        .collect();

    Availability::Computed(CrossTab {
        years,
        regions,
        cells,
    })
}

/// Every non-missing price.
pub fn price_distribution(table: &Table) -> Availability<Vec<f64>> {
    if let Err(missing) = gate(table, "price distribution", &[Column::PriceUsd]) {
        return Availability::Unavailable(missing);
    }

    Availability::Computed(table.rows().iter().filter_map(|r| r.price_usd).collect())
}

/// A reproducible sample of complete price/mileage pairs.
pub fn price_mileage_sample(
    table: &Table,
    settings: SampleSettings,
) -> Availability<Vec<PriceMileage>> {
    let required = [Column::PriceUsd, Column::MileageKm];
    if let Err(missing) = gate(table, "price vs mileage sample", &required) {
        return Availability::Unavailable(missing);
    }

    let pairs: Vec<PriceMileage> = table
        .rows()
        .iter()
        .filter_map(|r| {
            Some(PriceMileage {
                mileage_km: r.mileage_km?,
                price_usd: r.price_usd?,
            })
        })
        .collect();

    let sample: Vec<PriceMileage> = sample_indices(pairs.len(), settings)
        .into_iter()
        .map(|i| pairs[i])
        .collect();

    debug!(
        "Sampled {} of {} complete price/mileage pairs",
        sample.len(),
        pairs.len()
    );
    Availability::Computed(sample)
}
