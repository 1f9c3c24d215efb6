//! Condensed summary for the narrative report.
//!
//! The text generator is billed per unit of input, so long tails are cut:
//! only the top and bottom model slices are kept.

use crate::analysis::aggregator::{
    engine_size_price, group_revenue_with, price_mileage_sample, sort_by_volume, yearly_volume,
    RowFilter,
};
use crate::analysis::stats::{pearson, SampleSettings};
use crate::models::{Availability, Dimension, EnginePrice, GroupRevenue, Table, YearlyVolume};
use serde::Serialize;
use tracing::info;

/// Models kept in the top-by-volume and top-by-revenue slices.
pub const TOP_MODELS: usize = 10;

/// Models kept in the bottom-by-volume slice.
pub const BOTTOM_MODELS: usize = 5;

/// Compact nested summary of the dataset.
///
/// Sections whose columns are missing are left out of the JSON entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalesSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yearly_sales: Option<Vec<YearlyVolume>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_summary: Option<Vec<GroupRevenue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_top_by_volume: Option<Vec<GroupRevenue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_bottom_by_volume: Option<Vec<GroupRevenue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_top_by_revenue: Option<Vec<GroupRevenue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_numeric_insights: Option<ExtraInsights>,
}

/// Price relationships with engine size and mileage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtraInsights {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_size_vs_price: Option<Vec<EnginePrice>>,
    /// Outer `None`: columns absent. Inner `None`: too few usable pairs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corr_price_mileage: Option<Option<f64>>,
}

impl ExtraInsights {
    fn is_empty(&self) -> bool {
        self.engine_size_vs_price.is_none() && self.corr_price_mileage.is_none()
    }
}

impl SalesSummary {
    /// Number of top-level sections present.
    pub fn dimensions(&self) -> usize {
        [
            self.yearly_sales.is_some(),
            self.region_summary.is_some(),
            self.model_top_by_volume.is_some(),
            self.model_bottom_by_volume.is_some(),
            self.model_top_by_revenue.is_some(),
            self.extra_numeric_insights.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    /// Compact JSON, as embedded in prompts.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Indented JSON, for writing next to the report.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Condense the table with the default sampler (5000 rows, seed 42).
pub fn condense_for_external_summary(table: &Table) -> SalesSummary {
    condense_with(table, SampleSettings::default())
}

/// Condense the table into the summary handed to the text generator.
pub fn condense_with(table: &Table, sampling: SampleSettings) -> SalesSummary {
    info!("Building condensed data summary...");

    let mut summary = SalesSummary {
        yearly_sales: yearly_volume(table).computed(),
        region_summary: group_revenue_with(table, Dimension::Region, RowFilter::All).computed(),
        ..Default::default()
    };

    if let Availability::Computed(models) =
        group_revenue_with(table, Dimension::Model, RowFilter::All)
    {
        summary.model_top_by_revenue = Some(models.iter().take(TOP_MODELS).cloned().collect());

        let mut by_volume = models.clone();
        sort_by_volume(&mut by_volume, true);
        summary.model_top_by_volume = Some(by_volume.into_iter().take(TOP_MODELS).collect());

        let mut by_volume = models;
        sort_by_volume(&mut by_volume, false);
        summary.model_bottom_by_volume = Some(by_volume.into_iter().take(BOTTOM_MODELS).collect());
    }

    let extra = ExtraInsights {
        engine_size_vs_price: engine_size_price(table, RowFilter::All).computed(),
        corr_price_mileage: price_mileage_sample(table, sampling)
            .computed()
            .map(|sample| {
                let prices: Vec<f64> = sample.iter().map(|p| p.price_usd).collect();
                let mileage: Vec<f64> = sample.iter().map(|p| p.mileage_km).collect();
                pearson(&prices, &mileage)
            }),
    };
    if !extra.is_empty() {
        summary.extra_numeric_insights = Some(extra);
    }

    info!(
        "Summary built with {} main dimensions",
        summary.dimensions()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, SalesRecord};
    use pretty_assertions::assert_eq;

    fn record(year: i32, model: &str, region: &str, volume: f64, price: f64) -> SalesRecord {
        SalesRecord {
            year: Some(year),
            model: Some(model.to_string()),
            region: Some(region.to_string()),
            sales_volume: Some(volume),
            price_usd: Some(price),
            ..Default::default()
        }
    }

    fn many_models(count: usize) -> Vec<SalesRecord> {
        (0..count)
            .map(|i| {
                record(
                    2020 + (i % 3) as i32,
                    &format!("M{:02}", i),
                    if i % 2 == 0 { "Europe" } else { "Asia" },
                    (i + 1) as f64 * 10.0,
                    1000.0 + (count - i) as f64 * 100.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_missing_engine_and_mileage_omits_extra_insights() {
        let table = Table::new(
            [
                Column::Year,
                Column::Model,
                Column::Region,
                Column::SalesVolume,
                Column::PriceUsd,
            ],
            many_models(4),
        );

        let summary = condense_for_external_summary(&table);
        assert!(summary.extra_numeric_insights.is_none());

        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert!(json.get("extra_numeric_insights").is_none());
        assert!(json.get("yearly_sales").is_some());
        assert_eq!(summary.dimensions(), 5);
    }

    #[test]
    fn test_model_slices_are_truncated() {
        let table = Table::new(
            [
                Column::Model,
                Column::Region,
                Column::SalesVolume,
                Column::PriceUsd,
            ],
            many_models(25),
        );

        let summary = condense_for_external_summary(&table);
        let top = summary.model_top_by_volume.unwrap();
        let bottom = summary.model_bottom_by_volume.unwrap();
        let by_revenue = summary.model_top_by_revenue.unwrap();

        assert_eq!(top.len(), TOP_MODELS);
        assert_eq!(bottom.len(), BOTTOM_MODELS);
        assert_eq!(by_revenue.len(), TOP_MODELS);

        assert_eq!(top[0].label.value(), "M24");
        assert_eq!(bottom[0].label.value(), "M00");
        assert!(by_revenue
            .windows(2)
            .all(|w| w[0].total_revenue_usd >= w[1].total_revenue_usd));

        // no Year column
        assert!(summary.yearly_sales.is_none());
        assert_eq!(summary.region_summary.unwrap().len(), 2);
    }

    #[test]
    fn test_correlation_present_with_mileage() {
        let rows: Vec<SalesRecord> = (0..50)
            .map(|i| SalesRecord {
                price_usd: Some(100_000.0 - i as f64 * 1000.0),
                mileage_km: Some(i as f64 * 2000.0),
                ..Default::default()
            })
            .collect();
        let table = Table::new([Column::PriceUsd, Column::MileageKm], rows);

        let summary = condense_for_external_summary(&table);
        let extra = summary.extra_numeric_insights.unwrap();
        assert!(extra.engine_size_vs_price.is_none());
        let corr = extra.corr_price_mileage.unwrap().unwrap();
        assert!((corr + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_sample_yields_null_correlation() {
        let rows = vec![
            SalesRecord {
                price_usd: Some(10.0),
                mileage_km: Some(5.0),
                ..Default::default()
            },
            SalesRecord {
                price_usd: Some(12.0),
                ..Default::default()
            },
        ];
        let table = Table::new([Column::PriceUsd, Column::MileageKm], rows);

        let summary = condense_for_external_summary(&table);
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["extra_numeric_insights"]["corr_price_mileage"].is_null());
        assert!(json["extra_numeric_insights"]
            .as_object()
            .unwrap()
            .contains_key("corr_price_mileage"));
    }

    #[test]
    fn test_summary_is_reproducible() {
        let mut rows = many_models(30);
        for (i, row) in rows.iter_mut().enumerate() {
            row.mileage_km = Some((i * 37 % 11) as f64 * 1000.0);
            row.engine_size_l = Some(1.5 + (i % 4) as f64 * 0.5);
        }
        let table = Table::new(Column::ALL, rows);

        let settings = SampleSettings { cap: 10, seed: 42 };
        let first = condense_with(&table, settings);
        let second = condense_with(&table, settings);
        assert_eq!(first, second);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[test]
    fn test_sampled_correlation_is_pinned() {
        let mut rows = many_models(30);
        for (i, row) in rows.iter_mut().enumerate() {
            row.mileage_km = Some((i * 37 % 11) as f64 * 1000.0);
        }
        let table = Table::new(Column::ALL, rows);

        // rows 5, 10, 11, 12, 15, 17, 24, 26, 28 and 29 are sampled
        let summary = condense_with(&table, SampleSettings { cap: 10, seed: 42 });
        let corr = summary
            .extra_numeric_insights
            .and_then(|extra| extra.corr_price_mileage)
            .flatten()
            .unwrap();
        assert!((corr - 0.117_214_151_317_467_43).abs() < 1e-12, "corr = {}", corr);
    }
}
