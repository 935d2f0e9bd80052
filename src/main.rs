//! infer-adapters: decode JSON/CSV inputs into one batch from the command line.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use infer_adapters::transport::{tasks_from_inputs, CliInputs};
use infer_adapters::{DataframeInput, DataframeInputConfig, DtypeSpec, InputAdapter, Orient};

/// Batching input adapter toolkit
#[derive(Parser)]
#[command(name = "infer-adapters")]
#[command(about = "Decode JSON and CSV inference inputs into one tabular batch", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode inputs and print the merged batch with per-input outcomes
    Extract {
        #[command(flatten)]
        adapter: AdapterArgs,

        /// Orient of the printed batch
        #[arg(long, default_value = "records")]
        output_orient: Orient,

        #[command(flatten)]
        inputs: CliInputs,
    },

    /// Print the request schema derived from the declared types
    Schema {
        #[command(flatten)]
        adapter: AdapterArgs,
    },
}

#[derive(Args)]
struct AdapterArgs {
    /// TOML configuration file (defaults to .infer-adapters.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON orient: split, records, index, columns or values
    #[arg(long)]
    orient: Option<String>,

    /// Comma-separated column names
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// Declared type, as `column=type` or positionally as `type`
    #[arg(long)]
    dtype: Vec<String>,

    /// Bytes of a rejected payload echoed in its message
    #[arg(long)]
    echo_limit: Option<usize>,
}

impl AdapterArgs {
    fn build(self) -> Result<DataframeInput> {
        let mut config = match &self.config {
            Some(path) => DataframeInputConfig::from_file(path)?,
            None => DataframeInputConfig::load()?,
        };
        if self.orient.is_some() {
            config.orient = self.orient;
        }
        if self.columns.is_some() {
            config.columns = self.columns;
        }
        if !self.dtype.is_empty() {
            config.dtype = Some(parse_dtype(&self.dtype)?);
        }
        if let Some(limit) = self.echo_limit {
            config.echo_limit = limit;
        }
        DataframeInput::from_config(&config).context("Invalid adapter configuration")
    }
}

fn parse_dtype(entries: &[String]) -> Result<DtypeSpec> {
    let named = entries.iter().filter(|e| e.contains('=')).count();
    if named == 0 {
        return Ok(DtypeSpec::ByPosition(entries.to_vec()));
    }
    if named != entries.len() {
        bail!("--dtype entries must all be `column=type` or all be bare types");
    }
    Ok(entries
        .iter()
        .filter_map(|entry| entry.split_once('='))
        .collect())
}

fn main() -> Result<()> {
    infer_adapters::logging::init_with_default("warn");

    let cli = Cli::parse();
    match cli.command {
        Commands::Extract {
            adapter,
            output_orient,
            inputs,
        } => extract(adapter, output_orient, &inputs),
        Commands::Schema { adapter } => {
            let adapter = adapter.build()?;
            println!("{}", serde_json::to_string_pretty(&adapter.request_schema())?);
            Ok(())
        },
    }
}

fn extract(adapter: AdapterArgs, output_orient: Orient, inputs: &CliInputs) -> Result<()> {
    if inputs.is_empty() {
        bail!("No inputs given, use --input or --input-file");
    }
    let adapter = adapter.build()?;
    let mut tasks = tasks_from_inputs(inputs);

    let batch = adapter.extract(&mut tasks);
    let output = json!({
        "batch": batch.as_ref().map(|b| b.to_json(output_orient)),
        "tasks": tasks
            .iter()
            .map(|task| json!({"id": task.id(), "outcome": task.outcome()}))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if batch.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
