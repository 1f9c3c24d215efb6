//! Chart rendering.
//!
//! One SVG file per chart. Every chart is gated on the aggregation that
//! feeds it and fails on its own: a missing column or a drawing error skips
//! that chart and the rest still render.

pub mod render;

use crate::analysis::{
    engine_size_price, group_revenue_with, price_distribution, price_mileage_sample,
    sort_by_volume, year_region_volume, yearly_price_revenue, yearly_volume, RowFilter,
    SampleSettings,
};
use crate::config::ChartsConfig;
use crate::models::{Availability, Dimension, GroupRevenue, Table};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const YEAR_VOLUME_YOY: &str = "chart_01_year_volume_yoy.svg";
pub const YEAR_REVENUE_ASP: &str = "chart_02_year_revenue_asp.svg";
pub const MODEL_TOP10_VOLUME: &str = "chart_03_model_top10_volume.svg";
pub const MODEL_TOP10_REVENUE: &str = "chart_04_model_top10_revenue.svg";
pub const MODEL_WEIGHTED_ASP: &str = "chart_05_model_weighted_asp.svg";
pub const REGION_VOLUME: &str = "chart_06_region_volume.svg";
pub const REGION_REVENUE: &str = "chart_07_region_revenue.svg";
pub const REGION_WEIGHTED_ASP: &str = "chart_08_region_weighted_asp.svg";
pub const YEAR_REGION_HEATMAP: &str = "chart_09_year_region_heatmap.svg";
pub const PRICE_DISTRIBUTION: &str = "chart_12_price_distribution.svg";
pub const ENGINE_SIZE_VS_PRICE: &str = "chart_13_engine_size_vs_price.svg";
pub const MILEAGE_VS_PRICE: &str = "chart_14_mileage_vs_price.svg";

/// Bitmap copies handed to image-capable models.
pub const ENGINE_SIZE_VS_PRICE_PNG: &str = "chart_13_engine_size_vs_price.png";
pub const MILEAGE_VS_PRICE_PNG: &str = "chart_14_mileage_vs_price.png";

/// Models shown in the top-10 charts.
const TOP_N: usize = 10;

/// Rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartSettings {
    pub width: u32,
    pub height: u32,
    pub sampling: SampleSettings,
    pub histogram_bins: usize,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self::from(&ChartsConfig::default())
    }
}

impl From<&ChartsConfig> for ChartSettings {
    fn from(config: &ChartsConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            sampling: SampleSettings {
                cap: config.sample_cap,
                seed: config.sample_seed,
            },
            histogram_bins: config.histogram_bins,
        }
    }
}

/// What a rendering pass produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedCharts {
    /// Directory the charts were written to.
    pub dir: PathBuf,
    /// File names written, relative to the output directory.
    pub written: Vec<String>,
    /// PNG copies written, relative to the output directory.
    pub images: Vec<String>,
    /// Charts whose input columns were missing.
    pub skipped: usize,
    /// Charts that failed while drawing.
    pub failed: usize,
}

impl RenderedCharts {
    pub fn contains(&self, file_name: &str) -> bool {
        self.written.iter().any(|f| f == file_name)
    }

    pub fn has_image(&self, file_name: &str) -> bool {
        self.images.iter().any(|f| f == file_name)
    }

    /// Draw a PNG copy of a chart that was already written.
    ///
    /// Failures only lose the copy.
    fn bitmap_copy(&mut self, file_name: &str, draw: impl FnOnce(&Path) -> Result<()>) {
        let path = self.dir.join(file_name);
        match draw(&path) {
            Ok(()) => {
                debug!("Bitmap copy saved: {}", path.display());
                self.images.push(file_name.to_string());
            }
            Err(e) => warn!("Failed to draw bitmap copy {}: {:#}", file_name, e),
        }
    }

    fn attempt<T>(
        &mut self,
        dir: &Path,
        file_name: &str,
        data: Availability<T>,
        draw: impl FnOnce(&Path, T) -> Result<()>,
    ) {
        let value = match data {
            Availability::Computed(value) => value,
            Availability::Unavailable(missing) => {
                debug!("Skipping {}: {}", file_name, missing);
                self.skipped += 1;
                return;
            }
        };

        let path = dir.join(file_name);
        match draw(&path, value) {
            Ok(()) => {
                info!("Chart saved: {}", path.display());
                self.written.push(file_name.to_string());
            }
            Err(e) => {
                error!("Failed to render {}: {:#}", file_name, e);
                self.failed += 1;
            }
        }
    }
}

fn labels(rows: &[GroupRevenue]) -> Vec<String> {
    rows.iter().map(|r| r.label.value().to_string()).collect()
}

/// Render every chart the table supports into `out_dir`.
pub fn render_all(table: &Table, out_dir: &Path, settings: &ChartSettings) -> Result<RenderedCharts> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create chart directory: {}", out_dir.display()))?;

    let size = (settings.width, settings.height);
    let mut out = RenderedCharts {
        dir: out_dir.to_path_buf(),
        ..Default::default()
    };

    out.attempt(out_dir, YEAR_VOLUME_YOY, yearly_volume(table), |path, rows| {
        let years: Vec<String> = rows.iter().map(|r| r.year.to_string()).collect();
        let volume: Vec<f64> = rows.iter().map(|r| r.total_sales_volume).collect();
        let yoy: Vec<Option<f64>> = rows.iter().map(|r| r.yoy_growth_pct).collect();
        render::bars_with_line(
            path,
            size,
            "Annual Sales Volume & YoY Growth",
            ("Sales volume", "YoY growth (%)"),
            &years,
            &volume,
            &yoy,
        )
    });

    out.attempt(out_dir, YEAR_REVENUE_ASP, yearly_price_revenue(table), |path, rows| {
        let years: Vec<String> = rows.iter().map(|r| r.year.to_string()).collect();
        let revenue: Vec<f64> = rows.iter().map(|r| r.total_revenue_usd).collect();
        let asp: Vec<Option<f64>> = rows.iter().map(|r| Some(r.weighted_asp_usd)).collect();
        render::bars_with_line(
            path,
            size,
            "Annual Revenue & Weighted ASP",
            ("Revenue (USD)", "Weighted ASP (USD)"),
            &years,
            &revenue,
            &asp,
        )
    });

    let models = group_revenue_with(table, Dimension::Model, RowFilter::All);

    out.attempt(out_dir, MODEL_TOP10_VOLUME, models.as_ref(), |path, rows| {
        let mut top = rows.clone();
        sort_by_volume(&mut top, true);
        top.truncate(TOP_N);
        let volume: Vec<f64> = top.iter().map(|r| r.total_sales_volume).collect();
        render::horizontal_bars(
            path,
            size,
            "Top 10 Models by Sales Volume",
            "Sales volume",
            &labels(&top),
            &volume,
        )
    });

    out.attempt(out_dir, MODEL_TOP10_REVENUE, models.as_ref(), |path, rows| {
        let top = &rows[..rows.len().min(TOP_N)];
        let revenue: Vec<f64> = top.iter().map(|r| r.total_revenue_usd).collect();
        render::horizontal_bars(
            path,
            size,
            "Top 10 Models by Revenue",
            "Revenue (USD)",
            &labels(top),
            &revenue,
        )
    });

    out.attempt(out_dir, MODEL_WEIGHTED_ASP, models.as_ref(), |path, rows| {
        let mut by_asp = rows.clone();
        by_asp.sort_by(|a, b| {
            b.weighted_asp_usd
                .total_cmp(&a.weighted_asp_usd)
                .then_with(|| a.label.cmp(&b.label))
        });
        let asp: Vec<f64> = by_asp.iter().map(|r| r.weighted_asp_usd).collect();
        render::vertical_bars(
            path,
            size,
            "Weighted ASP by Model",
            "Weighted ASP (USD)",
            &labels(&by_asp),
            &asp,
        )
    });

    let regions = group_revenue_with(table, Dimension::Region, RowFilter::All);

    out.attempt(out_dir, REGION_VOLUME, regions.as_ref(), |path, rows| {
        let mut by_volume = rows.clone();
        sort_by_volume(&mut by_volume, true);
        let volume: Vec<f64> = by_volume.iter().map(|r| r.total_sales_volume).collect();
        render::vertical_bars(
            path,
            size,
            "Sales Volume by Region",
            "Sales volume",
            &labels(&by_volume),
            &volume,
        )
    });

    out.attempt(out_dir, REGION_REVENUE, regions.as_ref(), |path, rows| {
        let revenue: Vec<f64> = rows.iter().map(|r| r.total_revenue_usd).collect();
        render::vertical_bars(
            path,
            size,
            "Revenue by Region",
            "Revenue (USD)",
            &labels(rows),
            &revenue,
        )
    });

    out.attempt(out_dir, REGION_WEIGHTED_ASP, regions.as_ref(), |path, rows| {
        let asp: Vec<f64> = rows.iter().map(|r| r.weighted_asp_usd).collect();
        render::vertical_bars(
            path,
            size,
            "Weighted ASP by Region",
            "Weighted ASP (USD)",
            &labels(rows),
            &asp,
        )
    });

    out.attempt(out_dir, YEAR_REGION_HEATMAP, year_region_volume(table), |path, tab| {
        let years: Vec<String> = tab.years.iter().map(|y| y.to_string()).collect();
        render::heatmap(
            path,
            size,
            "Sales Volume by Year and Region",
            &years,
            &tab.regions,
            &tab.cells,
        )
    });

    out.attempt(out_dir, PRICE_DISTRIBUTION, price_distribution(table), |path, prices| {
        render::histogram(
            path,
            size,
            "Price Distribution",
            "Price (USD)",
            &prices,
            settings.histogram_bins,
        )
    });

    let engine_chart = |path: &Path, points: &[(f64, f64)]| {
        render::line_chart(
            path,
            size,
            "Average Price by Engine Size",
            ("Engine size (L)", "Average price (USD)"),
            points,
        )
    };
    let engine_points = engine_size_price(table, RowFilter::All).map(|rows| {
        rows.iter()
            .filter_map(|r| Some((r.engine_size_l, r.price_usd?)))
            .collect::<Vec<(f64, f64)>>()
    });
    out.attempt(out_dir, ENGINE_SIZE_VS_PRICE, engine_points.as_ref(), |path, points| {
        engine_chart(path, points.as_slice())
    });
    if let (true, Availability::Computed(points)) =
        (out.contains(ENGINE_SIZE_VS_PRICE), &engine_points)
    {
        out.bitmap_copy(ENGINE_SIZE_VS_PRICE_PNG, |path| engine_chart(path, points.as_slice()));
    }

    let mileage_chart = |path: &Path, points: &[(f64, f64)]| {
        render::scatter(
            path,
            size,
            "Mileage vs Price",
            ("Mileage (km)", "Price (USD)"),
            points,
        )
    };
    let mileage_points = price_mileage_sample(table, settings.sampling).map(|sample| {
        sample
            .iter()
            .map(|p| (p.mileage_km, p.price_usd))
            .collect::<Vec<(f64, f64)>>()
    });
    out.attempt(out_dir, MILEAGE_VS_PRICE, mileage_points.as_ref(), |path, points| {
        mileage_chart(path, points.as_slice())
    });
    if let (true, Availability::Computed(points)) =
        (out.contains(MILEAGE_VS_PRICE), &mileage_points)
    {
        out.bitmap_copy(MILEAGE_VS_PRICE_PNG, |path| mileage_chart(path, points.as_slice()));
    }

    info!(
        "Rendered {} charts ({} skipped, {} failed)",
        out.written.len(),
        out.skipped,
        out.failed
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{read_table, LoadOptions};
    use crate::models::{Column, SalesRecord};

    const FIXTURE: &str = include_str!("../../fixtures/sales_sample.csv");

    fn small_settings() -> ChartSettings {
        ChartSettings {
            width: 400,
            height: 300,
            ..ChartSettings::default()
        }
    }

    #[test]
    fn test_settings_from_config() {
        let settings = ChartSettings::default();
        assert_eq!(settings.width, 800);
        assert_eq!(settings.height, 400);
        assert_eq!(settings.sampling, SampleSettings::default());
        assert_eq!(settings.histogram_bins, 40);
    }

    #[test]
    fn test_render_all_on_complete_table() {
        let table = read_table(FIXTURE.as_bytes(), &LoadOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let rendered = render_all(&table, dir.path(), &small_settings()).unwrap();

        assert_eq!(rendered.skipped, 0);
        assert_eq!(rendered.failed, 0);
        assert_eq!(rendered.written.len(), 12);
        for name in &rendered.written {
            assert!(dir.path().join(name).exists(), "{} not written", name);
        }
        assert!(rendered.contains(YEAR_REGION_HEATMAP));

        assert_eq!(rendered.dir, dir.path());
        assert!(rendered.has_image(ENGINE_SIZE_VS_PRICE_PNG));
        assert!(rendered.has_image(MILEAGE_VS_PRICE_PNG));
        assert!(dir.path().join(MILEAGE_VS_PRICE_PNG).exists());
    }

    #[test]
    fn test_missing_region_skips_region_charts() {
        let rows: Vec<SalesRecord> = (0..6)
            .map(|i| SalesRecord {
                year: Some(2020 + i % 3),
                model: Some(format!("M{}", i % 2)),
                sales_volume: Some(10.0 + i as f64),
                price_usd: Some(40_000.0 + i as f64 * 500.0),
                ..Default::default()
            })
            .collect();
        let table = Table::new(
            [Column::Year, Column::Model, Column::SalesVolume, Column::PriceUsd],
            rows,
        );
        let dir = tempfile::tempdir().unwrap();

        let rendered = render_all(&table, dir.path(), &small_settings()).unwrap();

        assert!(rendered.contains(YEAR_VOLUME_YOY));
        assert!(rendered.contains(MODEL_TOP10_REVENUE));
        assert!(!rendered.contains(REGION_VOLUME));
        assert!(!rendered.contains(YEAR_REGION_HEATMAP));
        assert!(!dir.path().join(REGION_REVENUE).exists());
        assert!(rendered.images.is_empty());
        // regions x3, heatmap, engine, mileage
        assert_eq!(rendered.skipped, 6);
        assert_eq!(rendered.failed, 0);
    }

    #[test]
    fn test_empty_table_counts_failures_not_panics() {
        let table = Table::new(Column::ALL, vec![]);
        let dir = tempfile::tempdir().unwrap();

        let rendered = render_all(&table, dir.path(), &small_settings()).unwrap();
        assert!(rendered.written.is_empty());
        assert_eq!(rendered.skipped, 0);
        assert_eq!(rendered.failed, 12);
    }
}
