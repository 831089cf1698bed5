//! ---
//! retic_section: "05-networking-external-interfaces"
//! retic_subsection: "binary"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Command-line front end for radial network analysis."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use retic_calc_engine::{Analyzer, Libraries};
use retic_common::{init_tracing, AppConfig, LogFormat};

mod analyze;
mod serve;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Voltage drop, loading and fault level analysis for radial networks",
    long_about = None
)]
struct Cli {
    /// Configuration file (otherwise RETIC_CONFIG, retic.toml or config/retic.toml).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Conductor/transformer table replacing the built-in SANS set.
    #[arg(long, global = true, value_name = "FILE")]
    libraries: Option<PathBuf>,

    /// Console log format; overrides the configuration file.
    #[arg(long = "log-format", global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyse a network file (JSON or YAML).
    Analyze(analyze::AnalyzeArgs),
    /// Analyse the bundled 132/11 kV demonstration network.
    Demo(analyze::DemoArgs),
    /// Print the effective conductor and transformer tables.
    Libraries,
    /// Serve the analysis REST API.
    Serve(serve::ServeArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    StructuredJson,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::StructuredJson => LogFormat::StructuredJson,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_path(path)?,
        None => AppConfig::load(&AppConfig::DEFAULT_CANDIDATES[..])?,
    };
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }
    init_tracing("reticctl", &config.logging)?;

    let library_path = cli.libraries.as_deref().or(config.libraries.path.as_deref());
    let analyzer = Analyzer::new(load_libraries(library_path)?, config.analysis.clone());

    match cli.command {
        Commands::Analyze(args) => analyze::run_file(&analyzer, args),
        Commands::Demo(args) => analyze::run_demo(&analyzer, args),
        Commands::Libraries => {
            let rendered = serde_json::to_string_pretty(analyzer.libraries())
                .context("failed to render libraries")?;
            println!("{rendered}");
            Ok(())
        }
        Commands::Serve(args) => serve::run(analyzer, args.listen.unwrap_or(config.api.listen)),
    }
}

fn load_libraries(path: Option<&Path>) -> Result<Libraries> {
    match path {
        Some(path) => Libraries::from_file(path)
            .with_context(|| format!("failed to load libraries from {}", path.display())),
        None => Ok(Libraries::sans()),
    }
}
