//! `transparency-checkr`: infer AI provider jurisdictions and score model documentation.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load and validate the keyword tables ([`config::load_config`]).
//! 3. Load fetched pages ([`ingest::load_inputs`]) and, for a gap-filling
//!    pass, the records of an earlier run ([`ingest::load_records`]).
//! 4. Normalize, extract signals and fields, resolve regions and score every
//!    model in parallel ([`pipeline`]).
//! 5. Merge results into the record store by confidence ([`store`]).
//! 6. Render the requested report ([`report`]).
//! 7. Exit `0` (all models processed) or `1` (at least one model failed).

mod cli;
mod config;
mod fields;
mod ingest;
mod models;
mod normalize;
mod pipeline;
mod record;
mod region;
mod report;
mod scoring;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use cli::{Cli, ReportFormat};
use config::load_config;
use pipeline::Pipeline;
use report::terminal::Failure;
use store::{MemoryStore, RecordStore};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let base_dir = std::env::current_dir().context("Failed to resolve working directory")?;
    let config = load_config(&base_dir, cli.config.as_deref())?;
    let pipeline = Pipeline::new(config).context("Invalid configuration")?;

    let inputs = ingest::load_inputs(&cli.input)?;
    if inputs.is_empty() {
        eprintln!("No models found in {}", cli.input.display());
        std::process::exit(1);
    }

    let store = MemoryStore::new(pipeline.config().clone());
    if let Some(path) = &cli.gap_fill {
        let previous = ingest::load_records(path)?;
        info!(records = previous.len(), path = %path.display(), "seeding store for gap fill");
        for record in previous {
            store.upsert(record)?;
        }
        if !cli.quiet {
            eprintln!(
                "  {} gap-filling {} stored records",
                "→".cyan(),
                store.records()?.len()
            );
        }
    }

    let pb = if !cli.quiet && inputs.len() > 1 {
        let pb = ProgressBar::new(inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let outcomes = pipeline.process_all(&inputs, |_| {
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    });

    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(record) => {
                store.upsert(record)?;
            }
            Err(e) => failures.push(Failure {
                model_name: outcome.model_name,
                error: e.to_string(),
            }),
        }
    }

    let records = store.records()?;

    if let Some(path) = &cli.output {
        std::fs::write(path, serde_json::to_string_pretty(&records)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    match cli.report {
        ReportFormat::Terminal => {
            report::terminal::render(&records, &failures, &cli.input, cli.verbose, cli.quiet)?;
        }
        ReportFormat::Json => {
            if cli.output.is_none() {
                println!("{}", serde_json::to_string_pretty(&records)?);
            }
        }
    }

    // Exit code: 1 if any model failed
    if !failures.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
