//! Catalog Sync - spreadsheet-driven product data extraction
//!
//! Reads model numbers from input sheets, retrieves the matching catalog
//! pages, extracts product fields and writes them to an XLSX file that is
//! updated after every row.

#![allow(clippy::uninlined_format_args)]

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::{BatchJob, BatchQueue, BatchRunner, BatchSettings, EventEmitter};
use crate::domain::events::BatchEvent;
use crate::domain::fields::FieldSelection;
use crate::domain::identifier::RetrievalKey;
use crate::domain::schema::OutputSchema;
use crate::infrastructure::config::{AppConfig, ConfigLoader, FieldSelectionStore};
use crate::infrastructure::http_client::{DocumentFetcher, FetcherConfig, HttpSessionFactory};
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::parsing::ProductPageExtractor;
use crate::infrastructure::spreadsheet::XlsxTableWriter;

/// Command-line interface
#[derive(Parser, Debug)]
#[command(
    name = "catalog-sync",
    version,
    about = "Extract catalog product data for the models listed in spreadsheets"
)]
pub struct Cli {
    /// Configuration file (TOML or JSON); defaults to the user config directory
    #[arg(long, global = true, env = "CATALOG_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process input sheets one after another
    Run {
        /// Input files (.csv, .xlsx, .xls, .ods)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Catalog prefix; inferred from each file name when omitted
        #[arg(long)]
        prefix: Option<String>,

        /// Field selection JSON
        #[arg(long)]
        fields: Option<PathBuf>,

        /// Directory for output workbooks
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the output columns for a field selection
    Schema {
        /// Field selection JSON
        #[arg(long)]
        fields: Option<PathBuf>,
    },

    /// Print the page URL for each model
    Normalize {
        /// Catalog prefix
        #[arg(long)]
        prefix: String,

        #[arg(required = true)]
        models: Vec<String>,
    },
}

/// Entry point used by the binary
pub async fn run(cli: Cli) -> Result<()> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_file(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("Failed to load configuration")?;

    match cli.command {
        Command::Run {
            inputs,
            prefix,
            fields,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.output.output_dir = dir;
            }
            init_logging(&config.logging)?;
            let selection = load_selection(&config, fields).await;
            run_batches(&config, selection, &inputs, prefix.as_deref()).await
        }
        Command::Schema { fields } => {
            let selection = load_selection(&config, fields).await;
            let schema = OutputSchema::for_selection(&selection);
            for column in schema.columns() {
                println!("{}", column);
            }
            for column in schema.dropped() {
                eprintln!("dropped duplicate column: {}", column);
            }
            Ok(())
        }
        Command::Normalize { prefix, models } => {
            for model in &models {
                match RetrievalKey::new(&prefix, model) {
                    Some(key) => println!("{}\t{}", model, key.url(&config.scraping.site_base_url)),
                    None => eprintln!("{}\t(no usable characters)", model),
                }
            }
            Ok(())
        }
    }
}

async fn load_selection(config: &AppConfig, fields: Option<PathBuf>) -> FieldSelection {
    let path = fields.unwrap_or_else(|| config.fields.selection_path.clone());
    FieldSelectionStore::new(path).load().await
}

async fn run_batches(
    config: &AppConfig,
    selection: FieldSelection,
    inputs: &[PathBuf],
    prefix: Option<&str>,
) -> Result<()> {
    let fetcher = DocumentFetcher::new(
        HttpSessionFactory::new(config.scraping.page_load_timeout()),
        FetcherConfig::from_scraping(&config.scraping),
    );
    let extractor = ProductPageExtractor::new().context("Failed to build page extractor")?;
    let writer = XlsxTableWriter::new(config.output.description_row_height);

    let (emitter, mut events) = EventEmitter::channel();
    let cancellation_token = CancellationToken::new();
    let runner = Arc::new(
        BatchRunner::new(
            Arc::new(fetcher),
            Arc::new(writer),
            Arc::new(extractor),
            selection,
            BatchSettings::from_config(config),
        )
        .with_emitter(emitter)
        .with_cancellation(cancellation_token.clone()),
    );

    let mut queue = BatchQueue::new(Arc::clone(&runner));
    for input in inputs {
        queue.enqueue(BatchJob::new(input, prefix)?);
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current row");
            cancellation_token.cancel();
        }
    });

    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                BatchEvent::Progress { current, total } => info!("Progress {}/{}", current, total),
                BatchEvent::Status(message) => info!("{}", message),
                BatchEvent::Finished => info!("Batch finished"),
                BatchEvent::Error(message) => warn!("Batch error: {}", message),
            }
        }
    });

    let results = queue.run_all().await;
    drop(queue);
    drop(runner);
    reporter.await.context("Event reporter failed")?;

    let mut failures = 0;
    for result in &results {
        match result {
            Ok(summary) => println!(
                "{}: {} ({} written, {} not found, {} failed) -> {}",
                summary.input_path.display(),
                summary.status,
                summary.written,
                summary.not_found,
                summary.failed,
                summary.output_path.display()
            ),
            Err(e) => {
                failures += 1;
                eprintln!("error: {}", e);
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!("{} of {} input files failed", failures, inputs.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_with_options() {
        let cli = Cli::try_parse_from([
            "catalog-sync",
            "run",
            "a.csv",
            "b.xlsx",
            "--prefix",
            "150",
            "--output-dir",
            "/tmp/out",
        ])
        .unwrap();

        match cli.command {
            Command::Run {
                inputs,
                prefix,
                output_dir,
                fields,
            } => {
                assert_eq!(inputs, vec![PathBuf::from("a.csv"), PathBuf::from("b.xlsx")]);
                assert_eq!(prefix.as_deref(), Some("150"));
                assert_eq!(output_dir, Some(PathBuf::from("/tmp/out")));
                assert!(fields.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn cli_requires_inputs_and_models() {
        assert!(Cli::try_parse_from(["catalog-sync", "run"]).is_err());
        assert!(Cli::try_parse_from(["catalog-sync", "normalize", "--prefix", "150"]).is_err());
        assert!(Cli::try_parse_from(["catalog-sync", "schema"]).is_ok());
    }
}
