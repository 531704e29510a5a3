//! rvar CLI binary.
//!
//! Computes the rolling three-factor residual variance characteristic for a
//! daily security panel.

mod config;
mod logging;

use clap::{Parser, Subcommand};
use config::{FormatArg, PipelineArgs};
use indicatif::{ProgressBar, ProgressStyle};
use rvar::data::read_panel_csv;
use rvar::output::{ExportFormat, Exporter};
use rvar::{PartitionOutcome, ResidualVariancePipeline};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "rvar")]
#[command(about = "Rolling three-factor residual variance", long_about = None)]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors, and hide progress
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the characteristic and write it to a file
    Run {
        /// Input panel (CSV)
        #[arg(long, short)]
        input: PathBuf,

        /// Output table
        #[arg(long, short)]
        output: PathBuf,

        /// Output format (default: from the output file extension)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Also write the run summary as JSON
        #[arg(long)]
        summary: Option<PathBuf>,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Show how securities would be partitioned, without computing anything
    Plan {
        /// Input panel (CSV)
        #[arg(long, short)]
        input: PathBuf,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet)?;

    match cli.command {
        Commands::Run {
            input,
            output,
            format,
            summary,
            pipeline,
        } => {
            let format = format.map_or_else(|| ExportFormat::from_path(&output), Into::into);
            compute(&input, &output, format, summary.as_deref(), &pipeline, cli.quiet)?;
        }
        Commands::Plan {
            input,
            json,
            pipeline,
        } => {
            plan(&input, json, &pipeline)?;
        }
    }

    Ok(())
}

fn progress_bar(len: usize, quiet: bool) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn compute(
    input: &Path,
    output: &Path,
    format: ExportFormat,
    summary_path: Option<&Path>,
    args: &PipelineArgs,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.resolve()?;
    let partitions = config.partitioning.partition_count()?;

    info!(path = %input.display(), "Loading panel");
    let panel = read_panel_csv(input)?;

    let pb = progress_bar(partitions, quiet)?;
    pb.set_message("Fitting rolling regressions...");
    let ticker = pb.clone();
    let pipeline = ResidualVariancePipeline::new(config)?.on_partition_complete(Arc::new(
        move |outcome: &PartitionOutcome| {
            ticker.inc(1);
            ticker.set_message(format!(
                "partition {} done ({} records)",
                outcome.partition, outcome.records
            ));
        },
    ));

    let result = match pipeline.run(panel) {
        Ok(result) => {
            pb.finish_with_message(format!("{} records", result.table.len()));
            result
        }
        Err(e) => {
            pb.abandon_with_message("Failed!");
            return Err(e.into());
        }
    };

    result.table.export_to_file(output, format)?;
    info!(path = %output.display(), records = result.table.len(), "Wrote characteristic");

    if let Some(path) = summary_path {
        result
            .summary
            .export_to_file(path, ExportFormat::PrettyJson)?;
        info!(path = %path.display(), "Wrote run summary");
    }

    if !quiet {
        println!("{}", result.summary.to_ascii_table());
    }

    Ok(())
}

fn plan(input: &Path, as_json: bool, args: &PipelineArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.resolve()?;
    let panel = read_panel_csv(input)?;
    let pipeline = ResidualVariancePipeline::new(config)?;
    let plan = pipeline.plan(&panel)?;

    if as_json {
        let partitions: Vec<_> = plan
            .assignments()
            .iter()
            .zip(plan.loads())
            .enumerate()
            .map(|(i, (ids, load))| {
                json!({
                    "partition": i,
                    "securities": ids.len(),
                    "observations": load,
                    "security_ids": ids,
                })
            })
            .collect();
        let output = json!({
            "strategy": pipeline.config().partitioning,
            "securities": plan.security_count(),
            "empty_partitions": plan.empty_partitions(),
            "imbalance": plan.imbalance(),
            "partitions": partitions,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("\nPartition Plan: {}", input.display());
    println!("{}", "=".repeat(48));
    println!(
        "{:<12} {:>16} {:>16}",
        "Partition", "Securities", "Observations"
    );
    println!("{}", "-".repeat(48));
    for (i, (ids, load)) in plan.assignments().iter().zip(plan.loads()).enumerate() {
        println!("{:<12} {:>16} {:>16}", i, ids.len(), load);
    }
    println!("{}", "-".repeat(48));
    println!(
        "{:<12} {:>16} {:>16}",
        "Total",
        plan.security_count(),
        plan.loads().iter().sum::<usize>()
    );
    println!("{}", "=".repeat(48));
    println!("Empty partitions: {}", plan.empty_partitions());
    println!("Load imbalance:   {:.3}", plan.imbalance());

    Ok(())
}
