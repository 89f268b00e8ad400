//! Batch driver: one input sheet in, one incrementally written output file out
//!
//! Rows are processed strictly in file order, one fetch at a time. The
//! output file is rewritten after every appended row. Cancellation is
//! cooperative and checked once before each row.

#![allow(clippy::uninlined_format_args)]

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::assembler::assemble;
use super::events::EventEmitter;
use crate::domain::events::{BatchEvent, BatchStatus, BatchSummary};
use crate::domain::fields::FieldSelection;
use crate::domain::identifier::{RetrievalKey, infer_prefix_from_filename};
use crate::domain::schema::{IDENTIFIER_COLUMN, OutputSchema};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http_client::{DocumentSource, FetchError, FetchOutcome};
use crate::infrastructure::parsing::ProductPageExtractor;
use crate::infrastructure::spreadsheet::{
    OutputRow, OutputTable, SpreadsheetError, TableWriter, load_input, output_path_for,
};

/// Fatal batch failures. Per-row failures never surface here.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Input error: {0}")]
    Input(#[from] SpreadsheetError),

    #[error("Cannot write output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: SpreadsheetError,
    },

    #[error("No catalog prefix given and none found in file name {path}")]
    MissingPrefix { path: PathBuf },

    #[error("Batch task failed: {0}")]
    Join(String),
}

/// Output location and pacing for a batch run
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub output_dir: PathBuf,
    pub file_prefix: String,
    /// Pause after every attempted row
    pub inter_row_delay: Duration,
}

impl BatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            output_dir: config.output.output_dir.clone(),
            file_prefix: config.output.file_prefix.clone(),
            inter_row_delay: config.scraping.inter_row_delay(),
        }
    }
}

/// One input file and the catalog prefix its models live under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub input_path: PathBuf,
    pub prefix: String,
}

impl BatchJob {
    /// Use `prefix` when given, otherwise infer it from the file name
    pub fn new(input_path: impl Into<PathBuf>, prefix: Option<&str>) -> Result<Self, BatchError> {
        let input_path = input_path.into();
        let prefix = match prefix.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => p.to_string(),
            None => input_path
                .file_name()
                .and_then(|n| infer_prefix_from_filename(&n.to_string_lossy()))
                .ok_or_else(|| BatchError::MissingPrefix {
                    path: input_path.clone(),
                })?,
        };
        Ok(Self { input_path, prefix })
    }
}

/// What happened to one attempted row
#[derive(Debug)]
enum RowOutcome {
    Assembled(OutputRow),
    NotFound,
    Failed(FetchError),
}

/// Runs batches against a document source and a table writer
pub struct BatchRunner {
    source: Arc<dyn DocumentSource>,
    writer: Arc<dyn TableWriter>,
    extractor: Arc<ProductPageExtractor>,
    selection: FieldSelection,
    settings: BatchSettings,
    emitter: EventEmitter,
    cancellation_token: CancellationToken,
}

impl BatchRunner {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        writer: Arc<dyn TableWriter>,
        extractor: Arc<ProductPageExtractor>,
        selection: FieldSelection,
        settings: BatchSettings,
    ) -> Self {
        Self {
            source,
            writer,
            extractor,
            selection,
            settings,
            emitter: EventEmitter::disabled(),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Request a stop before the next row
    pub fn stop(&self) {
        info!("🛑 Stop requested");
        self.cancellation_token.cancel();
    }

    pub fn output_path(&self, job: &BatchJob) -> PathBuf {
        output_path_for(
            &self.settings.output_dir,
            &self.settings.file_prefix,
            &job.prefix,
            &job.input_path,
        )
    }

    /// Process every row of `job`. Fatal failures are reported through an
    /// `Error` event as well as the returned error.
    pub async fn run(&self, job: &BatchJob) -> Result<BatchSummary, BatchError> {
        match self.run_rows(job).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!("❌ Batch for {} failed: {}", job.input_path.display(), e);
                self.emitter.emit(BatchEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_rows(&self, job: &BatchJob) -> Result<BatchSummary, BatchError> {
        let sheet = load_input(&job.input_path)?;
        let id_column = sheet.identifier_column(IDENTIFIER_COLUMN)?;

        let schema = OutputSchema::for_selection(&self.selection);
        let output_path = self.output_path(job);
        let total = sheet.len();

        let mut summary = BatchSummary::new(job.input_path.clone(), output_path.clone(), total);
        let mut table = OutputTable::new(schema.clone());
        self.persist(&table, &output_path)?;

        summary.transition(BatchStatus::Running);
        info!(
            "🚀 Processing {} rows from {} into {}",
            total,
            job.input_path.display(),
            output_path.display()
        );
        self.emitter.status(format!("Processing {}", job.input_path.display()));
        self.emitter.progress(0, total);

        for row_index in 0..total {
            if self.cancellation_token.is_cancelled() {
                info!("🛑 Batch stopped before row {}/{}", row_index + 1, total);
                summary.transition(BatchStatus::Stopped);
                self.emitter.status("Stopped");
                return Ok(summary);
            }

            let raw_model = sheet.cell(row_index, id_column);
            let Some(key) = RetrievalKey::new(&job.prefix, raw_model) else {
                debug!("Row {} has no model, skipping", row_index + 1);
                summary.blank += 1;
                continue;
            };

            info!("Row {}/{}: {}", row_index + 1, total, key);
            let outcome = AssertUnwindSafe(self.process_row(&key, raw_model, &schema))
                .catch_unwind()
                .await;

            match outcome {
                Ok(RowOutcome::Assembled(row)) => {
                    table.push(row);
                    summary.written += 1;
                    // The row stays in the table; the next successful write carries it
                    if let Err(e) = self.persist(&table, &output_path) {
                        error!("Failed to save after row {} ({}): {}", row_index + 1, key, e);
                    }
                }
                Ok(RowOutcome::NotFound) => {
                    info!("Product {} not found", key);
                    summary.not_found += 1;
                }
                Ok(RowOutcome::Failed(e)) => {
                    warn!("Skipping {}: {}", key, e);
                    summary.failed += 1;
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("Row {} ({}) panicked: {}", row_index + 1, key, message);
                    summary.failed += 1;
                }
            }

            summary.attempted += 1;
            self.emitter.progress(row_index + 1, total);

            tokio::select! {
                () = tokio::time::sleep(self.settings.inter_row_delay) => {}
                () = self.cancellation_token.cancelled() => {}
            }
        }

        summary.transition(BatchStatus::Completed);
        info!(
            "✅ Batch finished: {} written, {} not found, {} failed, {} blank",
            summary.written, summary.not_found, summary.failed, summary.blank
        );
        self.emitter.emit(BatchEvent::Finished);
        Ok(summary)
    }

    async fn process_row(&self, key: &RetrievalKey, raw_model: &str, schema: &OutputSchema) -> RowOutcome {
        let page = match self.source.fetch(key).await {
            Ok(FetchOutcome::Found(page)) => page,
            Ok(FetchOutcome::NotFound) => return RowOutcome::NotFound,
            Err(e) => return RowOutcome::Failed(e),
        };

        let record = self.extractor.extract_page(&page);
        match assemble(raw_model, &record, schema, &self.selection) {
            Some(row) => RowOutcome::Assembled(row),
            None => RowOutcome::NotFound,
        }
    }

    fn persist(&self, table: &OutputTable, path: &Path) -> Result<(), BatchError> {
        self.writer
            .persist(table, path)
            .map_err(|source| BatchError::Output {
                path: path.to_path_buf(),
                source,
            })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one batch on its own task
pub fn spawn_batch(runner: Arc<BatchRunner>, job: BatchJob) -> JoinHandle<Result<BatchSummary, BatchError>> {
    tokio::spawn(async move { runner.run(&job).await })
}

/// Several input files processed one after another by a single runner
pub struct BatchQueue {
    runner: Arc<BatchRunner>,
    jobs: VecDeque<BatchJob>,
}

impl BatchQueue {
    pub fn new(runner: Arc<BatchRunner>) -> Self {
        Self {
            runner,
            jobs: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, job: BatchJob) {
        debug!("Queued {}", job.input_path.display());
        self.jobs.push_back(job);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Run queued jobs in order. A fatal error ends only its own file;
    /// a stop ends the current file and skips everything still queued.
    pub async fn run_all(&mut self) -> Vec<Result<BatchSummary, BatchError>> {
        let mut results = Vec::with_capacity(self.jobs.len());

        while let Some(job) = self.jobs.pop_front() {
            if self.runner.cancellation_token.is_cancelled() {
                info!(
                    "🛑 Skipping {} and {} more queued files",
                    job.input_path.display(),
                    self.jobs.len()
                );
                self.jobs.clear();
                break;
            }

            let result = match spawn_batch(Arc::clone(&self.runner), job).await {
                Ok(result) => result,
                Err(e) => Err(BatchError::Join(e.to_string())),
            };
            results.push(result);
        }

        results
    }
}
