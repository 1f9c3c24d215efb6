//! Dataset structure and quality checks.

use crate::analysis::aggregator::RowFilter;
use crate::analysis::stats::describe;
use crate::models::{Availability, Column, Describe, Table};
use tracing::{info, warn};

/// Shape, missing values and numeric statistics of the loaded table.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetProfile {
    pub rows: usize,
    pub columns: Vec<String>,
    /// Missing cells per column, in header order.
    pub missing: Vec<(String, usize)>,
    pub numeric: Vec<(Column, Describe)>,
}

impl DatasetProfile {
    pub fn total_missing(&self) -> usize {
        self.missing.iter().map(|(_, n)| n).sum()
    }
}

/// Price and row-revenue statistics over rows with positive volume.
#[derive(Debug, Clone, PartialEq)]
pub struct RevenueOverview {
    pub rows_used: usize,
    pub price: Option<Describe>,
    pub revenue: Option<Describe>,
}

/// Profile the table's shape and quality.
pub fn dataset_profile(table: &Table) -> DatasetProfile {
    let missing: Vec<(String, usize)> = table
        .header()
        .iter()
        .map(|name| {
            let count = match Column::from_name(name) {
                Some(column) => table.rows().iter().filter(|r| r.is_missing(column)).count(),
                None => table
                    .rows()
                    .iter()
                    .filter(|r| !r.extras.contains_key(name))
                    .count(),
            };
            (name.clone(), count)
        })
        .collect();

    let numeric = Column::ALL
        .iter()
        .copied()
        .filter(|c| c.is_numeric() && table.has(*c))
        .filter_map(|c| {
            let values: Vec<f64> = table.rows().iter().filter_map(|r| r.numeric(c)).collect();
            describe(&values).map(|d| (c, d))
        })
        .collect();

    let profile = DatasetProfile {
        rows: table.len(),
        columns: table.header().to_vec(),
        missing,
        numeric,
    };

    let total_missing = profile.total_missing();
    if total_missing > 0 {
        warn!("Found {} missing values", total_missing);
    } else {
        info!("Data is complete, no missing values");
    }

    profile
}

/// Distribution of per-vehicle price and row revenue for sold rows.
pub fn revenue_overview(table: &Table) -> Availability<RevenueOverview> {
    if let Err(missing) = table.require(&[Column::PriceUsd, Column::SalesVolume]) {
        warn!("Cannot compute revenue overview: {}", missing);
        return Availability::Unavailable(missing);
    }

    let sold: Vec<_> = table
        .rows()
        .iter()
        .filter(|r| RowFilter::PositiveVolume.keeps(r))
        .collect();
    let prices: Vec<f64> = sold.iter().filter_map(|r| r.price_usd).collect();
    let revenues: Vec<f64> = sold.iter().filter_map(|r| r.revenue()).collect();

    Availability::Computed(RevenueOverview {
        rows_used: sold.len(),
        price: describe(&prices),
        revenue: describe(&revenues),
    })
}
