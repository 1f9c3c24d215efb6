//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Every value flag is optional so that the
//! config file keeps its say unless the flag is given.

use clap::Parser;
use std::path::PathBuf;

/// Salescope - vehicle sales aggregation and reporting
///
/// Loads a sales export, prints summary tables, renders charts and asks a
/// local model to write a Markdown analysis report.
///
/// Examples:
///   salescope --input sales_data.csv
///   salescope -i sales_data.csv -o out --model llama3.2:latest
///   salescope -i sales_data.csv --no-report --summary-json summary.json
///   salescope --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Sales table to analyze (.xlsx/.xls workbook or CSV)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Directory for charts and the report
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report file name inside the output directory
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Ollama model used to write the report
    ///
    /// Can also be set via SALESCOPE_MODEL env var or .salescope.toml config.
    #[arg(short, long, env = "SALESCOPE_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .salescope.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Skip chart rendering
    #[arg(long)]
    pub no_charts: bool,

    /// Skip the generated narrative report
    #[arg(long)]
    pub no_report: bool,

    /// Send the engine-size and mileage charts to the model as images
    #[arg(long)]
    pub vision: bool,

    /// Also write the condensed summary as JSON
    #[arg(long, value_name = "FILE")]
    pub summary_json: Option<PathBuf>,

    /// Generate a default .salescope.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: Some(PathBuf::from("sales.csv")),
            output_dir: None,
            report: None,
            model: None,
            ollama_url: None,
            temperature: None,
            timeout: None,
            config: None,
            verbose: false,
            quiet: false,
            no_charts: false,
            no_report: false,
            vision: false,
            summary_json: None,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_accepts_defaults() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.ollama_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());

        args.ollama_url = Some("https://ollama.internal".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_temperature_range() {
        let mut args = make_args();
        args.temperature = Some(1.5);
        assert!(args.validate().is_err());
        args.temperature = Some(0.0);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.init_config = true;
        args.timeout = Some(0);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "salescope",
            "-i",
            "data.csv",
            "-o",
            "out",
            "--no-charts",
            "--temperature",
            "0.4",
        ])
        .unwrap();
        assert_eq!(args.input, Some(PathBuf::from("data.csv")));
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert!(args.no_charts);
        assert_eq!(args.temperature, Some(0.4));
    }

    #[test]
    fn test_merge_only_overrides_given_values() {
        let mut args = make_args();
        args.timeout = Some(30);
        args.no_report = true;

        let mut config = crate::config::Config::default();
        config.model.name = "from-file".to_string();
        config.merge_with_args(&args);

        assert_eq!(config.model.name, "from-file");
        assert_eq!(config.model.timeout_seconds, 30);
        assert_eq!(config.loader.input, "sales.csv");
        assert!(!config.model.enabled);
        assert!(!config.model.vision);
        assert!(config.charts.enabled);

        args.vision = true;
        config.merge_with_args(&args);
        assert!(config.model.vision);
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
