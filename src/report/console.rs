//! Plain-text analysis printed to the terminal.
//!
//! Every section is built as a string first so it can be tested; an
//! aggregation that is unavailable prints a "cannot compute" line in
//! place of its table.

use crate::analysis::{
    dataset_profile, engine_size_price, group_revenue, group_share, revenue_overview,
    yearly_price_revenue, yearly_volume, RowFilter,
};
use crate::models::{Availability, Describe, Dimension, MissingColumns, Table};
use std::fmt::Write;
use tabled::settings::object::Rows;
use tabled::settings::{Format, Modify, Style};
use tabled::{Table as TextTable, Tabled};

/// Rows shown for model tables.
const MODEL_ROWS: usize = 20;

/// Placeholder header of the group column, replaced by the grouping column name.
const GROUP_HEADER: &str = "Group";

fn num(value: f64) -> String {
    format!("{:.2}", value)
}

fn opt(value: Option<f64>) -> String {
    value.map(num).unwrap_or_else(|| "-".to_string())
}

#[derive(Tabled)]
struct MissingRow {
    #[tabled(rename = "column")]
    column: String,
    #[tabled(rename = "missing")]
    missing: usize,
}

#[derive(Tabled)]
struct DescribeRow {
    #[tabled(rename = "column")]
    column: String,
    #[tabled(rename = "count")]
    count: usize,
    #[tabled(rename = "mean")]
    mean: String,
    #[tabled(rename = "std")]
    std: String,
    #[tabled(rename = "min")]
    min: String,
    #[tabled(rename = "25%")]
    q25: String,
    #[tabled(rename = "50%")]
    median: String,
    #[tabled(rename = "75%")]
    q75: String,
    #[tabled(rename = "max")]
    max: String,
}

impl DescribeRow {
    fn new(column: &str, d: &Describe) -> Self {
        Self {
            column: column.to_string(),
            count: d.count,
            mean: num(d.mean),
            std: opt(d.std),
            min: num(d.min),
            q25: num(d.q25),
            median: num(d.median),
            q75: num(d.q75),
            max: num(d.max),
        }
    }
}

#[derive(Tabled)]
struct YearVolumeRow {
    #[tabled(rename = "Year")]
    year: i32,
    #[tabled(rename = "Total_Sales_Volume")]
    total_sales_volume: String,
    #[tabled(rename = "YoY_growth_%")]
    yoy_growth_pct: String,
}

#[derive(Tabled)]
struct YearRevenueRow {
    #[tabled(rename = "Year")]
    year: i32,
    #[tabled(rename = "Total_Sales_Volume")]
    total_sales_volume: String,
    #[tabled(rename = "Total_Revenue_USD")]
    total_revenue_usd: String,
    #[tabled(rename = "Avg_Price_USD")]
    avg_price_usd: String,
    #[tabled(rename = "Weighted_ASP_USD")]
    weighted_asp_usd: String,
}

#[derive(Tabled)]
struct ShareRow {
    #[tabled(rename = "Group")]
    label: String,
    #[tabled(rename = "Total_Sales_Volume")]
    total_sales_volume: String,
    #[tabled(rename = "share_%")]
    share_pct: String,
}

#[derive(Tabled)]
struct RevenueRow {
    #[tabled(rename = "Group")]
    label: String,
    #[tabled(rename = "Total_Sales_Volume")]
    total_sales_volume: String,
    #[tabled(rename = "Total_Revenue_USD")]
    total_revenue_usd: String,
    #[tabled(rename = "Avg_Price_USD")]
    avg_price_usd: String,
    #[tabled(rename = "Weighted_ASP_USD")]
    weighted_asp_usd: String,
}

#[derive(Tabled)]
struct EnginePriceRow {
    #[tabled(rename = "Engine_Size_L")]
    engine_size_l: String,
    #[tabled(rename = "Price_USD")]
    price_usd: String,
}

/// Markdown-style terminal table, newline terminated.
fn render<T: Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    let mut table = TextTable::new(rows);
    table.with(Style::markdown());
    format!("{}\n", table)
}

/// Like [`render`], with the group column titled after `dimension`.
fn render_grouped<T: Tabled>(rows: impl IntoIterator<Item = T>, dimension: Dimension) -> String {
    let key = dimension.column().name();
    let mut table = TextTable::new(rows);
    table.with(Style::markdown()).with(
        Modify::new(Rows::first()).with(Format::content(move |header| {
            if header == GROUP_HEADER {
                key.to_string()
            } else {
                header.to_string()
            }
        })),
    );
    format!("{}\n", table)
}

fn cannot_compute(what: &str, missing: &MissingColumns) -> String {
    format!("Cannot compute {}: {}.\n", what, missing)
}

fn describe_table(series: &[(&str, &Describe)]) -> String {
    render(series.iter().map(|(name, d)| DescribeRow::new(name, d)))
}

/// "Basic Information": shape, columns, missing values, numeric statistics.
pub fn basic_information(table: &Table) -> String {
    let profile = dataset_profile(table);
    let mut out = String::from("=== Basic Information ===\n");

    let _ = writeln!(out, "Rows x Columns: {} x {}", profile.rows, profile.columns.len());
    let _ = writeln!(out, "\nColumn names:\n{}", profile.columns.join(", "));

    out.push_str("\nMissing values statistics:\n");
    out.push_str(&render(profile.missing.iter().map(|(name, n)| MissingRow {
        column: name.clone(),
        missing: *n,
    })));

    if !profile.numeric.is_empty() {
        out.push_str("\nDescriptive statistics:\n");
        let series: Vec<(&str, &Describe)> =
            profile.numeric.iter().map(|(c, d)| (c.name(), d)).collect();
        out.push_str(&describe_table(&series));
    }
    out
}

/// "Annual Sales Trend" and "Annual Average Price & Revenue Trend".
pub fn trend_sections(table: &Table) -> String {
    let mut out = String::from("\n=== Annual Sales Trend (Sales_Volume) ===\n");
    match yearly_volume(table) {
        Availability::Computed(rows) => {
            out.push_str(&render(rows.iter().map(|r| YearVolumeRow {
                year: r.year,
                total_sales_volume: num(r.total_sales_volume),
                yoy_growth_pct: opt(r.yoy_growth_pct),
            })));
        }
        Availability::Unavailable(missing) => {
            out.push_str(&cannot_compute("annual sales aggregation", &missing))
        }
    }

    out.push_str("\n=== Annual Average Price & Revenue Trend ===\n");
    match yearly_price_revenue(table) {
        Availability::Computed(rows) => {
            out.push_str(&render(rows.iter().map(|r| YearRevenueRow {
                year: r.year,
                total_sales_volume: num(r.total_sales_volume),
                total_revenue_usd: num(r.total_revenue_usd),
                avg_price_usd: opt(r.avg_price_usd),
                weighted_asp_usd: num(r.weighted_asp_usd),
            })));
        }
        Availability::Unavailable(missing) => {
            out.push_str(&cannot_compute("annual price and revenue analysis", &missing))
        }
    }
    out
}

fn share_section(table: &Table, dimension: Dimension, limit: usize) -> String {
    match group_share(table, dimension) {
        Availability::Computed(rows) => render_grouped(
            rows.iter().take(limit).map(|r| ShareRow {
                label: r.label.value().to_string(),
                total_sales_volume: num(r.total_sales_volume),
                share_pct: opt(r.share_pct),
            }),
            dimension,
        ),
        Availability::Unavailable(missing) => {
            cannot_compute(&format!("{} structure analysis", dimension), &missing)
        }
    }
}

/// "Model Sales Structure" and "Regional Sales Structure".
pub fn structure_sections(table: &Table) -> String {
    let mut out = String::from("\n=== Model Sales Structure (Sales_Volume) ===\n");
    out.push_str(&share_section(table, Dimension::Model, MODEL_ROWS));
    out.push_str("\n=== Regional Sales Structure (Sales_Volume) ===\n");
    out.push_str(&share_section(table, Dimension::Region, usize::MAX));
    out
}

fn revenue_table(table: &Table, dimension: Dimension, limit: usize) -> String {
    match group_revenue(table, dimension) {
        Availability::Computed(rows) => render_grouped(
            rows.iter().take(limit).map(|r| RevenueRow {
                label: r.label.value().to_string(),
                total_sales_volume: num(r.total_sales_volume),
                total_revenue_usd: num(r.total_revenue_usd),
                avg_price_usd: opt(r.avg_price_usd),
                weighted_asp_usd: num(r.weighted_asp_usd),
            }),
            dimension,
        ),
        Availability::Unavailable(missing) => {
            cannot_compute(&format!("{} revenue analysis", dimension), &missing)
        }
    }
}

/// "Revenue/Price Analysis".
pub fn revenue_section(table: &Table) -> String {
    let mut out = String::from("\n=== Revenue/Price Analysis ===\n");

    let overview = match revenue_overview(table) {
        Availability::Computed(overview) => overview,
        Availability::Unavailable(missing) => {
            out.push_str(&cannot_compute("revenue and per-vehicle price analysis", &missing));
            return out;
        }
    };

    let _ = writeln!(out, "Rows with positive volume: {}", overview.rows_used);
    let mut series = Vec::new();
    if let Some(ref price) = overview.price {
        series.push(("Price_USD", price));
    }
    if let Some(ref revenue) = overview.revenue {
        series.push(("Revenue_USD", revenue));
    }
    if !series.is_empty() {
        out.push_str(&describe_table(&series));
    }

    out.push_str("\nSales volume, revenue and weighted ASP by model:\n");
    out.push_str(&revenue_table(table, Dimension::Model, MODEL_ROWS));
    out.push_str("\nSales volume, revenue and weighted ASP by region:\n");
    out.push_str(&revenue_table(table, Dimension::Region, usize::MAX));

    out.push_str("\nAverage price by engine size:\n");
    match engine_size_price(table, RowFilter::PositiveVolume) {
        Availability::Computed(rows) => {
            out.push_str(&render(rows.iter().map(|r| EnginePriceRow {
                engine_size_l: num(r.engine_size_l),
                price_usd: opt(r.price_usd),
            })));
        }
        Availability::Unavailable(missing) => {
            out.push_str(&cannot_compute("engine size price analysis", &missing))
        }
    }
    out
}

/// Every console section, in print order.
pub fn analysis_text(table: &Table) -> String {
    let mut out = basic_information(table);
    out.push_str(&trend_sections(table));
    out.push_str(&structure_sections(table));
    out.push_str(&revenue_section(table));
    out
}

/// Print the full console analysis to stdout.
pub fn print_analysis(table: &Table) {
    println!("{}", analysis_text(table));
}
