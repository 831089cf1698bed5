//! ---
//! retic_section: "05-networking-external-interfaces"
//! retic_subsection: "binary"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Command-line front end for radial network analysis."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use retic_calc_engine::{
    demo::demo_network_with_tap,
    io::{load_editor_document_from_file, load_network_from_file},
    AnalysisReport, Analyzer, Network,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Summary,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// How the result is printed on stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Also write an `analysis.json` report envelope into this directory.
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Network file in JSON or YAML.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Read the file as an editor save (nodes with `data` bags).
    #[arg(long)]
    editor: bool,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct DemoArgs {
    /// Transformer tap position.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    tap: i32,

    #[command(flatten)]
    output: OutputArgs,
}

pub fn run_file(analyzer: &Analyzer, args: AnalyzeArgs) -> Result<()> {
    let network = if args.editor {
        load_editor_document_from_file(&args.file)
    } else {
        load_network_from_file(&args.file)
    }
    .with_context(|| format!("failed to load network from {}", args.file.display()))?;
    run(analyzer, &network, &args.output)
}

pub fn run_demo(analyzer: &Analyzer, args: DemoArgs) -> Result<()> {
    run(analyzer, &demo_network_with_tap(args.tap), &args.output)
}

fn run(analyzer: &Analyzer, network: &Network, output: &OutputArgs) -> Result<()> {
    let report = analyzer.analyze(network);
    print_report(&report, output.format)?;

    if let Some(dir) = &output.output {
        let path = report
            .exporter()
            .export(network.display_name(), dir)
            .with_context(|| format!("failed to export report to {}", dir.display()))?;
        tracing::info!(report = %path.display(), "report written");
    }
    Ok(())
}

fn print_report(report: &AnalysisReport, format: OutputFormat) -> Result<()> {
    let result = &report.result;
    match format {
        OutputFormat::Json => println!("{}", result.to_json_pretty()?),
        OutputFormat::Yaml => print!("{}", result.to_yaml()?),
        OutputFormat::Summary => {
            println!("{}", result.summary);
            for alert in &result.alerts {
                println!("  - {alert}");
            }
        }
    }
    Ok(())
}
