//! CLI tool to run a delimited text file through a batch engine.
//!
//! Usage:
//!   batch-run <input.csv>
//!   batch-run <input.csv> --config job.toml
//!   batch-run <input.csv> --fields 3 --require 1 --route-field 2 --route SALES --route ENGINEER
//!
//! Prints the execution report, and per-route counts when routing is
//! configured. Log verbosity follows `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::process;

use clap::Parser;
use line_batch::{JobConfig, JobError, LineSource, RoutingConfig, run_job};

/// Run a delimited text file through filter, map, validate and process
/// stages, and print the execution report.
#[derive(Parser)]
#[command(name = "batch-run")]
struct Cli {
    /// Input file, one record per line
    input: PathBuf,

    /// TOML job file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engine name used in logs
    #[arg(long)]
    name: Option<String>,

    /// Field delimiter
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Expected field count; lines with another count are ignored
    #[arg(short, long)]
    fields: Option<usize>,

    /// Filter lines starting with this prefix (empty string disables)
    #[arg(long)]
    exclude_prefix: Option<String>,

    /// Keep blank lines instead of filtering them
    #[arg(long)]
    keep_blank: bool,

    /// Reject records whose field at this index is missing or empty
    #[arg(short, long = "require")]
    required: Vec<usize>,

    /// Stop after reading this many records
    #[arg(short, long)]
    limit: Option<u64>,

    /// Index of the field used for routing
    #[arg(long)]
    route_field: Option<usize>,

    /// Route value, one destination queue each (repeatable)
    #[arg(long = "route")]
    routes: Vec<String>,

    /// Capacity of each destination queue
    #[arg(long)]
    queue_capacity: Option<usize>,
}

impl Cli {
    fn job_config(&self) -> Result<JobConfig, JobError> {
        let mut config = match &self.config {
            Some(path) => JobConfig::load(path)?,
            None => JobConfig::default(),
        };

        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if self.fields.is_some() {
            config.fields = self.fields;
        }
        if let Some(prefix) = &self.exclude_prefix {
            config.exclude_prefix = Some(prefix.clone());
        }
        if self.keep_blank {
            config.keep_blank = true;
        }
        if !self.required.is_empty() {
            config.required = self.required.clone();
        }
        if self.limit.is_some() {
            config.limit = self.limit;
        }

        if let Some(field) = self.route_field {
            let mut routing = RoutingConfig::new(field, self.routes.clone());
            if let Some(existing) = &config.routing {
                routing.queue_capacity = existing.queue_capacity;
            }
            config.routing = Some(routing);
        } else if !self.routes.is_empty() {
            return Err(JobError::Config {
                context: "args",
                detail: "--route requires --route-field".to_string(),
            });
        }
        if let (Some(capacity), Some(routing)) = (self.queue_capacity, config.routing.as_mut()) {
            routing.queue_capacity = capacity;
        }
        if config.routing.as_ref().is_some_and(|r| r.queue_capacity == 0) {
            return Err(JobError::Config {
                context: "args",
                detail: "queue capacity must be greater than zero".to_string(),
            });
        }

        Ok(config)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.job_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    match run_job(LineSource::from_path(&cli.input), &config) {
        Ok(outcome) => {
            println!("{}", outcome.report);
            if !outcome.routes.is_empty() {
                println!("Routes:");
                for (name, count) in &outcome.routes {
                    println!("  {name}: {count}");
                }
            }
        }
        Err(JobError::Engine(e)) => {
            println!("{}", e.report());
            eprintln!("Error: {e}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
