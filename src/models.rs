//! Data models for the sales analyzer.
//!
//! This module contains the loaded sales table and every derived
//! metric row the aggregation engine produces for the console, the
//! chart renderer and the condensed report summary.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A canonical column the aggregation engine knows how to read.
///
/// Names are case-sensitive and exact; fuzzy matching is the loader's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Year,
    Model,
    Region,
    SalesVolume,
    PriceUsd,
    EngineSizeL,
    MileageKm,
}

impl Column {
    /// Every canonical column, in display order.
    pub const ALL: [Column; 7] = [
        Column::Year,
        Column::Model,
        Column::Region,
        Column::SalesVolume,
        Column::PriceUsd,
        Column::EngineSizeL,
        Column::MileageKm,
    ];

    /// The header name as it appears in the source table.
    pub fn name(&self) -> &'static str {
        match self {
            Column::Year => "Year",
            Column::Model => "Model",
            Column::Region => "Region",
            Column::SalesVolume => "Sales_Volume",
            Column::PriceUsd => "Price_USD",
            Column::EngineSizeL => "Engine_Size_L",
            Column::MileageKm => "Mileage_KM",
        }
    }

    /// Look up a canonical column by its exact header name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Returns true for columns holding numbers.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Column::Model | Column::Region)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A categorical column that sales can be broken down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Model,
    Region,
}

impl Dimension {
    pub fn column(&self) -> Column {
        match self {
            Dimension::Model => Column::Model,
            Dimension::Region => Column::Region,
        }
    }

    /// Wrap a group key in the label variant for this dimension.
    pub fn label(&self, value: String) -> GroupLabel {
        match self {
            Dimension::Model => GroupLabel::Model(value),
            Dimension::Region => GroupLabel::Region(value),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column().name())
    }
}

/// One sales record.
///
/// Every field is optional: an empty or unparseable cell is a missing value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesRecord {
    pub year: Option<i32>,
    pub model: Option<String>,
    pub region: Option<String>,
    pub sales_volume: Option<f64>,
    pub price_usd: Option<f64>,
    pub engine_size_l: Option<f64>,
    pub mileage_km: Option<f64>,
    /// Non-empty cells of columns the engine does not interpret.
    pub extras: BTreeMap<String, String>,
}

impl SalesRecord {
    /// Numeric value of a column, `None` for categorical columns.
    pub fn numeric(&self, column: Column) -> Option<f64> {
        match column {
            Column::Year => self.year.map(f64::from),
            Column::SalesVolume => self.sales_volume,
            Column::PriceUsd => self.price_usd,
            Column::EngineSizeL => self.engine_size_l,
            Column::MileageKm => self.mileage_km,
            Column::Model | Column::Region => None,
        }
    }

    /// Returns true if the cell for `column` is missing.
    pub fn is_missing(&self, column: Column) -> bool {
        match column {
            Column::Model => self.model.is_none(),
            Column::Region => self.region.is_none(),
            numeric => self.numeric(numeric).is_none(),
        }
    }

    /// Group key for a categorical dimension.
    pub fn key(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::Model => self.model.as_deref(),
            Dimension::Region => self.region.as_deref(),
        }
    }

    /// Row-level revenue: price times units sold.
    pub fn revenue(&self) -> Option<f64> {
        Some(self.price_usd? * self.sales_volume?)
    }
}

/// The loaded sales table.
///
/// Immutable once built: aggregations read it and produce new tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    header: Vec<String>,
    columns: BTreeSet<Column>,
    rows: Vec<SalesRecord>,
}

impl Table {
    /// Build a table holding exactly the given canonical columns.
    #[cfg(test)]
    pub fn new(columns: impl IntoIterator<Item = Column>, rows: Vec<SalesRecord>) -> Self {
        let columns: BTreeSet<Column> = columns.into_iter().collect();
        let header = columns.iter().map(|c| c.name().to_string()).collect();
        Self {
            header,
            columns,
            rows,
        }
    }

    /// Build a table from a normalized header, keeping unknown names.
    pub fn from_header(header: Vec<String>, rows: Vec<SalesRecord>) -> Self {
        let columns = header.iter().filter_map(|h| Column::from_name(h)).collect();
        Self {
            header,
            columns,
            rows,
        }
    }

    pub fn rows(&self) -> &[SalesRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All column names in header order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Returns true if the canonical column is present.
    pub fn has(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Check that every required column is present.
    pub fn require(&self, required: &[Column]) -> Result<(), MissingColumns> {
        let missing: Vec<Column> = required
            .iter()
            .copied()
            .filter(|c| !self.has(*c))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MissingColumns { missing })
        }
    }
}

/// Required columns absent from the input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingColumns {
    pub missing: Vec<Column>,
}

impl fmt::Display for MissingColumns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.missing.iter().map(|c| c.name()).collect();
        write!(f, "missing {} column(s)", names.join(" / "))
    }
}

/// Outcome of a column-gated aggregation.
///
/// `Unavailable` is an expected result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Availability<T> {
    Computed(T),
    Unavailable(MissingColumns),
}

impl<T> Availability<T> {
    /// Converts into an `Option`, dropping the missing-column reason.
    pub fn computed(self) -> Option<T> {
        match self {
            Availability::Computed(value) => Some(value),
            Availability::Unavailable(_) => None,
        }
    }

    pub fn as_ref(&self) -> Availability<&T> {
        match self {
            Availability::Computed(value) => Availability::Computed(value),
            Availability::Unavailable(missing) => Availability::Unavailable(missing.clone()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Availability<U> {
        match self {
            Availability::Computed(value) => Availability::Computed(f(value)),
            Availability::Unavailable(missing) => Availability::Unavailable(missing),
        }
    }
}

/// Group key, serialized under its column name (`"Model": "X1"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum GroupLabel {
    Model(String),
    Region(String),
}

impl GroupLabel {
    pub fn value(&self) -> &str {
        match self {
            GroupLabel::Model(v) | GroupLabel::Region(v) => v,
        }
    }
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Units sold per year with year-over-year growth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyVolume {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Total_Sales_Volume")]
    pub total_sales_volume: f64,
    /// Null for the first year and after a zero-volume year.
    #[serde(rename = "YoY_growth_%")]
    pub yoy_growth_pct: Option<f64>,
}

/// Volume, revenue and prices per year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyRevenue {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Total_Sales_Volume")]
    pub total_sales_volume: f64,
    #[serde(rename = "Total_Revenue_USD")]
    pub total_revenue_usd: f64,
    #[serde(rename = "Avg_Price_USD")]
    pub avg_price_usd: Option<f64>,
    #[serde(rename = "Weighted_ASP_USD")]
    pub weighted_asp_usd: f64,
}

/// A group's share of total units sold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupShare {
    #[serde(flatten)]
    pub label: GroupLabel,
    #[serde(rename = "Total_Sales_Volume")]
    pub total_sales_volume: f64,
    #[serde(rename = "share_%")]
    pub share_pct: Option<f64>,
}

/// Volume, revenue and prices per model or region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRevenue {
    #[serde(flatten)]
    pub label: GroupLabel,
    #[serde(rename = "Total_Sales_Volume")]
    pub total_sales_volume: f64,
    #[serde(rename = "Total_Revenue_USD")]
    pub total_revenue_usd: f64,
    #[serde(rename = "Avg_Price_USD")]
    pub avg_price_usd: Option<f64>,
    #[serde(rename = "Weighted_ASP_USD")]
    pub weighted_asp_usd: f64,
}

/// Mean price for one engine displacement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnginePrice {
    #[serde(rename = "Engine_Size_L")]
    pub engine_size_l: f64,
    #[serde(rename = "Price_USD")]
    pub price_usd: Option<f64>,
}

/// Units sold per region (rows) and year (columns).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CrossTab {
    pub years: Vec<i32>,
    pub regions: Vec<String>,
    /// `cells[region][year]`; `None` where no rows exist for the pair.
    pub cells: Vec<Vec<Option<f64>>>,
}

/// One sampled price/mileage observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceMileage {
    #[serde(rename = "Mileage_KM")]
    pub mileage_km: f64,
    #[serde(rename = "Price_USD")]
    pub price_usd: f64,
}

/// Descriptive statistics for one numeric series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` with fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    #[serde(rename = "25%")]
    pub q25: f64,
    #[serde(rename = "50%")]
    pub median: f64,
    #[serde(rename = "75%")]
    pub q75: f64,
    pub max: f64,
}
