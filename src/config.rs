//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.salescope.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".salescope.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input table settings.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Text generation settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Chart settings.
    #[serde(default)]
    pub charts: ChartsConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory receiving charts and the report.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            verbose: false,
        }
    }
}

fn default_output_dir() -> String {
    ".".to_string()
}

/// Sales table input settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Path to the workbook (first sheet is read) or CSV export.
    #[serde(default = "default_input")]
    pub input: String,

    /// Field delimiter for delimited input (first byte is used).
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Raw column name to canonical column name.
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            delimiter: default_delimiter(),
            rename: BTreeMap::new(),
        }
    }
}

fn default_input() -> String {
    "sales_data.csv".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Generate the narrative report at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Send bitmap copies of the driver charts along with the prompt.
    /// Needs a vision-capable model.
    #[serde(default)]
    pub vision: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            enabled: true,
            vision: false,
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout() -> u64 {
    600
}

/// Chart rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartsConfig {
    /// Render charts at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Chart width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Chart height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,

    /// Maximum points in sampled scatter plots.
    #[serde(default = "default_sample_cap")]
    pub sample_cap: usize,

    /// Seed for the scatter sampler.
    #[serde(default = "default_sample_seed")]
    pub sample_seed: u64,

    /// Bins in the price histogram.
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: default_width(),
            height: default_height(),
            sample_cap: default_sample_cap(),
            sample_seed: default_sample_seed(),
            histogram_bins: default_histogram_bins(),
        }
    }
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    400
}

fn default_sample_cap() -> usize {
    crate::analysis::stats::DEFAULT_SAMPLE_CAP
}

fn default_sample_seed() -> u64 {
    crate::analysis::stats::DEFAULT_SAMPLE_SEED
}

fn default_histogram_bins() -> usize {
    40
}

/// Report generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report file name, relative to the output directory.
    #[serde(default = "default_report_output")]
    pub output: String,

    /// Top-level report heading.
    #[serde(default = "default_title")]
    pub title: String,

    /// Also write the condensed summary as JSON to this path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_json: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_report_output(),
            title: default_title(),
            summary_json: None,
        }
    }
}

fn default_report_output() -> String {
    "sales_report.md".to_string()
}

fn default_title() -> String {
    "Vehicle Sales Analysis Report".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.salescope.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the CLI provides explicitly are overridden.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref input) = args.input {
            self.loader.input = input.display().to_string();
        }
        if let Some(ref dir) = args.output_dir {
            self.general.output_dir = dir.display().to_string();
        }
        if let Some(ref report) = args.report {
            self.report.output = report.display().to_string();
        }
        if let Some(ref summary) = args.summary_json {
            self.report.summary_json = Some(summary.display().to_string());
        }

        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        // Flags only ever switch things off / on
        if args.no_charts {
            self.charts.enabled = false;
        }
        if args.no_report {
            self.model.enabled = false;
        }
        if args.vision {
            self.model.vision = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Output directory as a path.
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.general.output_dir)
    }

    /// Report path inside the output directory.
    pub fn report_path(&self) -> PathBuf {
        self.output_dir().join(&self.report.output)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.ollama_url, "http://localhost:11434");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.loader.input, "sales_data.csv");
        assert_eq!(config.charts.sample_cap, 5000);
        assert_eq!(config.charts.sample_seed, 42);
        assert!(config.loader.rename.is_empty());
        assert!(!config.model.vision);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output_dir = "out"
verbose = true

[loader]
input = "bmw.csv"
delimiter = ";"

[loader.rename]
"Units Sold" = "Sales_Volume"

[model]
name = "qwen2.5:14b"
temperature = 0.5
vision = true

[charts]
enabled = false
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output_dir, "out");
        assert!(config.general.verbose);
        assert_eq!(config.loader.input, "bmw.csv");
        assert_eq!(config.loader.delimiter, ";");
        assert_eq!(
            config.loader.rename.get("Units Sold").map(String::as_str),
            Some("Sales_Volume")
        );
        assert_eq!(config.model.name, "qwen2.5:14b");
        assert_eq!(config.model.temperature, 0.5);
        assert_eq!(config.model.timeout_seconds, 600);
        assert!(config.model.vision);
        assert!(!config.charts.enabled);
        assert_eq!(config.charts.width, 800);
        assert_eq!(config.report.output, "sales_report.md");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[loader]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[charts]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "[report]\ntitle = \"Q4\"\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.report.title, "Q4");

        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "[report\n").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_report_path_joins_output_dir() {
        let mut config = Config::default();
        config.general.output_dir = "out".to_string();
        assert_eq!(config.report_path(), PathBuf::from("out/sales_report.md"));
    }
}
