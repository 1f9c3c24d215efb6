//! Markdown report generation.
//!
//! The condensed summary is embedded in one prompt per section, each
//! section is generated by a single call to the text generator, and the
//! charts belonging to the section are appended after its text. A failed
//! call turns into a placeholder section; the rest of the report still
//! gets written.

use crate::analysis::SalesSummary;
use crate::charts::{self, RenderedCharts};
use crate::llm::TextGenerator;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A chart file referenced from a report section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartRef {
    pub file: &'static str,
    pub description: &'static str,
}

/// One generated section of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub number: usize,
    pub name: &'static str,
    /// What the section should cover, inserted into the user prompt.
    pub brief: &'static str,
    pub charts: &'static [ChartRef],
    /// Bitmap charts attached to the prompt when images are enabled.
    pub images: &'static [&'static str],
}

pub const SYSTEM_PROMPT: &str = "You are a senior business analyst in the global automotive \
industry. You turn complex quantitative data into concise, executive-ready insights. Write in \
clear, structured, business-oriented English suitable for non-technical senior leaders. Format \
all output as GitHub-Flavored Markdown with appropriate headings, bullet points, and tables.";

/// Report sections, in order.
pub const SECTIONS: [Section; 5] = [
    Section {
        number: 1,
        name: "Executive Summary",
        brief: "3-6 bullet points that capture the overall performance and key messages.\n\
- Include at least one Markdown table built from the JSON data.",
        charts: &[],
        images: &[],
    },
    Section {
        number: 2,
        name: "Sales Performance Over Time",
        brief: "a section that:\n\
- Describes sales and revenue trends by year and by region\n\
- Highlights inflection points and years of acceleration or slowdown\n\
- Includes at least one Markdown table of key year-over-year comparisons",
        charts: &[
            ChartRef {
                file: charts::YEAR_VOLUME_YOY,
                description: "Annual total sales volume and year-over-year (YoY) growth.",
            },
            ChartRef {
                file: charts::YEAR_REVENUE_ASP,
                description: "Annual total revenue and weighted average selling price (ASP).",
            },
            ChartRef {
                file: charts::YEAR_REGION_HEATMAP,
                description: "Sales volume heatmap by year and region.",
            },
        ],
        images: &[],
    },
    Section {
        number: 3,
        name: "Top & Underperforming Models / Markets",
        brief: "a section that:\n\
- Names the best and worst performing models and regions\n\
- Explains plausible reasons based on the data\n\
- Includes at least one Markdown table highlighting rankings or performance gaps",
        charts: &[
            ChartRef {
                file: charts::MODEL_TOP10_VOLUME,
                description: "Top 10 models ranked by total sales volume.",
            },
            ChartRef {
                file: charts::MODEL_TOP10_REVENUE,
                description: "Top 10 models ranked by total revenue.",
            },
            ChartRef {
                file: charts::REGION_VOLUME,
                description: "Total sales volume by region.",
            },
            ChartRef {
                file: charts::REGION_REVENUE,
                description: "Total revenue by region.",
            },
        ],
        images: &[],
    },
    Section {
        number: 4,
        name: "Key Sales Drivers",
        brief: "a section that:\n\
- Analyses drivers such as price positioning, model mix, regional mix and engine size\n\
- Uses the engine-size price curve and the price/mileage correlation in the JSON\n\
- Focuses on business reasoning supported by data (do not claim strict causality)\n\
- Includes at least one Markdown table that makes a key driver comparison explicit",
        charts: &[
            ChartRef {
                file: charts::MODEL_WEIGHTED_ASP,
                description: "Weighted average selling price (ASP) by model.",
            },
            ChartRef {
                file: charts::REGION_WEIGHTED_ASP,
                description: "Weighted ASP by region.",
            },
            ChartRef {
                file: charts::ENGINE_SIZE_VS_PRICE,
                description: "Average price by engine size.",
            },
            ChartRef {
                file: charts::MILEAGE_VS_PRICE,
                description: "Mileage vs price scatter plot.",
            },
        ],
        images: &[charts::ENGINE_SIZE_VS_PRICE_PNG, charts::MILEAGE_VS_PRICE_PNG],
    },
    Section {
        number: 5,
        name: "Strategic Insights & Recommendations",
        brief: "a section that:\n\
- Draws two or three non-obvious insights from price dispersion, depreciation and mix\n\
- Gives 3-5 specific, actionable recommendations (regions, models, price bands to prioritise)\n\
- Includes a Markdown table or structured list",
        charts: &[ChartRef {
            file: charts::PRICE_DISTRIBUTION,
            description: "Price distribution across models and configurations.",
        }],
        images: &[],
    },
];

/// Build the user prompt for one section.
pub fn build_prompt(section: &Section, summary_json: &str) -> String {
    format!(
        "Below is a JSON summary of vehicle sales data:\n\n{json}\n\n\
Write the **{name}** section: {brief}\n\n\
Use the heading \"## {number}. {name}\" and format as Markdown.\n",
        json = summary_json,
        name = section.name,
        brief = section.brief,
        number = section.number,
    )
}

/// Append image references after a section's text.
pub fn insert_charts_after_text(text: &str, charts: &[ChartRef]) -> String {
    let mut result = text.trim_end().to_string();
    result.push_str("\n\n");
    for chart in charts {
        result.push_str(&format!("![{}]({})\n\n", chart.description, chart.file));
    }
    result
}

/// Section body used when generation fails.
pub fn failure_placeholder(section_name: &str, err: &impl std::fmt::Display) -> String {
    format!("\n\n## {}\n\n_Generation failed: {}_\n\n", section_name, err)
}

/// The assembled Markdown and how it went.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledReport {
    pub markdown: String,
    pub sections_generated: usize,
    pub sections_failed: usize,
}

/// A report written to disk.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub path: PathBuf,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub sections_generated: usize,
    pub sections_failed: usize,
}

/// Builds the narrative report from the condensed summary.
///
/// The generator is optional; without one the assembler reports that no
/// report can be written and returns `None` instead of failing.
pub struct ReportAssembler<G> {
    generator: Option<G>,
    title: String,
    show_progress: bool,
    attach_images: bool,
}

impl<G: TextGenerator> ReportAssembler<G> {
    pub fn new(generator: Option<G>, title: impl Into<String>) -> Self {
        Self {
            generator,
            title: title.into(),
            show_progress: false,
            attach_images: false,
        }
    }

    /// Attach each section's bitmap charts to its prompt.
    pub fn with_images(mut self, attach: bool) -> Self {
        self.attach_images = attach;
        self
    }

    /// Base64 payloads of the section's bitmap charts that were drawn.
    fn section_images(&self, section: &Section, rendered: &RenderedCharts) -> Vec<String> {
        if !self.attach_images {
            return Vec::new();
        }

        let mut images = Vec::new();
        for file in section.images {
            if !rendered.has_image(file) {
                warn!("Image does not exist, skipping: {}", file);
                continue;
            }
            let path = rendered.dir.join(file);
            match std::fs::read(&path) {
                Ok(bytes) => {
                    debug!("Attaching image {} ({} bytes)", path.display(), bytes.len());
                    images.push(STANDARD.encode(bytes));
                }
                Err(e) => warn!("Failed to read image {}: {}", path.display(), e),
            }
        }
        images
    }

    /// Show a spinner while each section is generated.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn spinner(&self, section: &Section) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(format!("Generating {}...", section.name));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }

    /// Generate every section; `None` when no generator is configured.
    pub async fn assemble(
        &self,
        summary: &SalesSummary,
        rendered: &RenderedCharts,
    ) -> Result<Option<AssembledReport>> {
        let Some(generator) = self.generator.as_ref() else {
            error!("Text generator not configured, cannot generate report");
            println!(
                "⚠️  No text generator available, the narrative report will be skipped.\n   \
Check that Ollama is running and reachable (--ollama-url), or pass --no-report."
            );
            return Ok(None);
        };

        let summary_json = summary
            .to_json()
            .context("Failed to serialize data summary")?;
        debug!("Data summary size: {} characters", summary_json.len());

        let mut markdown = format!("# {}\n\n", self.title);
        let mut sections_generated = 0;
        let mut sections_failed = 0;

        for section in &SECTIONS {
            info!("Generating section: {}", section.name);
            let mut prompt = build_prompt(section, &summary_json);
            let images = self.section_images(section, rendered);
            if !images.is_empty() {
                debug!("Including {} images as input", images.len());
                prompt.push_str("\nThe attached chart images are provided as visual input.\n");
            }

            let spinner = self.spinner(section);
            let outcome = generator.generate(SYSTEM_PROMPT, &prompt, &images).await;
            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            let body = match outcome {
                Ok(text) => {
                    info!("✓ {} generated", section.name);
                    sections_generated += 1;
                    text
                }
                Err(e) => {
                    warn!("Text generation failed ({}): {}", section.name, e);
                    sections_failed += 1;
                    failure_placeholder(section.name, &e)
                }
            };

            let charts: Vec<ChartRef> = section
                .charts
                .iter()
                .filter(|c| rendered.contains(c.file))
                .copied()
                .collect();
            let body = if charts.is_empty() {
                body
            } else {
                insert_charts_after_text(&body, &charts)
            };

            markdown.push_str(&body);
            markdown.push_str("\n\n");
        }

        Ok(Some(AssembledReport {
            markdown,
            sections_generated,
            sections_failed,
        }))
    }

    /// Generate the report and write it to `path`.
    pub async fn write_report(
        &self,
        summary: &SalesSummary,
        rendered: &RenderedCharts,
        path: &Path,
    ) -> Result<Option<ReportOutcome>> {
        let Some(report) = self.assemble(summary, rendered).await? else {
            return Ok(None);
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, &report.markdown)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report saved to {}", path.display());

        Ok(Some(ReportOutcome {
            path: path.to_path_buf(),
            model: self
                .generator
                .as_ref()
                .map(|g| g.model_name().to_string())
                .unwrap_or_default(),
            generated_at: Utc::now(),
            sections_generated: report.sections_generated,
            sections_failed: report.sections_failed,
        }))
    }
}
