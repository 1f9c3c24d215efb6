//! Analysis modules.
//!
//! The aggregation engine: column-gated grouped metrics, the dataset
//! profile and the condensed summary handed to the report writer.

pub mod aggregator;
pub mod profile;
pub mod stats;
pub mod summary;

pub use aggregator::*;
pub use profile::{dataset_profile, revenue_overview};
pub use stats::SampleSettings;
pub use summary::{condense_for_external_summary, SalesSummary};
