//! Salescope - vehicle sales analytics
//!
//! A CLI tool that loads a sales export, prints grouped metrics, renders
//! charts and asks a local Ollama model to write a Markdown report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing input, config failure, write failure, etc.)

mod analysis;
mod charts;
mod cli;
mod config;
mod llm;
mod loader;
mod models;
mod report;

use anyhow::{Context, Result};
use charts::{ChartSettings, RenderedCharts};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use llm::{LlmConfig, OllamaClient};
use loader::LoadOptions;
use report::ReportAssembler;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so the file can enable verbose output
    let (mut config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, &config);

    info!("Salescope v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    origin.log();

    if let Err(e) = run(&args, config).await {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .salescope.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize input, column renames, model, charts, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `--quiet` wins; otherwise `verbose` from either the CLI or the config
/// file switches to debug output.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete workflow: load, print, chart, summarize, report.
async fn run(args: &Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    // Step 1: Load the table
    println!("📥 Loading sales data: {}", config.loader.input);
    let table = loader::load_table(&LoadOptions::from(&config.loader))
        .with_context(|| format!("Failed to load {}", config.loader.input))?;
    if table.is_empty() {
        warn!("Loaded table has no rows; every table and chart will be empty");
    }

    // Step 2: Console analysis
    report::print_analysis(&table);

    // Step 3: Charts
    let out_dir = config.output_dir();
    let settings = ChartSettings::from(&config.charts);
    let rendered = if config.charts.enabled {
        println!("\n🎨 Rendering charts to {}...", out_dir.display());
        charts::render_all(&table, &out_dir, &settings)?
    } else {
        info!("Chart rendering disabled");
        RenderedCharts::default()
    };

    // Step 4: Condensed summary (fixed sampler, independent of chart settings)
    let summary = analysis::condense_for_external_summary(&table);
    if let Some(ref json_path) = config.report.summary_json {
        let json = summary
            .to_json_pretty()
            .context("Failed to serialize data summary")?;
        std::fs::write(json_path, json)
            .with_context(|| format!("Failed to write summary to {}", json_path))?;
        println!("🧾 Data summary saved to: {}", json_path);
    }

    // Step 5: Narrative report
    let mut report_path = None;
    if config.model.enabled {
        println!("\n🤖 Generating report...");
        println!("   Model: {}", config.model.name);
        println!("   Ollama: {}", config.model.ollama_url);
        println!("   Timeout: {}s per section", config.model.timeout_seconds);

        let client = match OllamaClient::new(LlmConfig::from(&config.model)) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Text generator unavailable: {}", e);
                None
            }
        };

        let assembler = ReportAssembler::new(client, config.report.title.clone())
            .with_progress(!args.quiet)
            .with_images(config.model.vision);
        if let Some(outcome) = assembler
            .write_report(&summary, &rendered, &config.report_path())
            .await?
        {
            println!(
                "   Sections: {} generated, {} failed ({})",
                outcome.sections_generated, outcome.sections_failed, outcome.model
            );
            println!(
                "   Generated at: {}",
                outcome.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            report_path = Some(outcome.path);
        }
    } else {
        info!("Report generation disabled");
    }

    // Print summary
    println!("\n📊 Run Summary:");
    println!("   Rows loaded: {}", table.len());
    println!(
        "   Charts: {} written, {} skipped, {} failed",
        rendered.written.len(),
        rendered.skipped,
        rendered.failed
    );
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    match report_path {
        Some(path) => println!("\n✅ Analysis complete! Report saved to: {}", path.display()),
        None => println!("\n✅ Analysis complete!"),
    }

    Ok(())
}

/// Where the effective configuration came from.
enum ConfigOrigin {
    File(PathBuf),
    Defaults,
    /// The default file exists but could not be read or parsed.
    FallbackDefaults(anyhow::Error),
}

impl ConfigOrigin {
    fn log(&self) {
        match self {
            ConfigOrigin::File(path) => info!("Loaded config from {}", path.display()),
            ConfigOrigin::Defaults => debug!("No config file found, using defaults"),
            ConfigOrigin::FallbackDefaults(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` that fails is an error; a broken default file
/// falls back to defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::File(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigOrigin::File(PathBuf::from(DEFAULT_CONFIG_FILE)))),
        Ok(None) => Ok((Config::default(), ConfigOrigin::Defaults)),
        Err(e) => Ok((Config::default(), ConfigOrigin::FallbackDefaults(e))),
    }
}
