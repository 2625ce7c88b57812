//! Batch coordination: one table source in, one directory of files out.
//!
//! For each source the coordinator reads its columns, picks the columns to
//! download from, flattens them into locators, creates the destination
//! directory `<output_root>/<stem> (<count>)` and hands the locators to the
//! [`DownloadEngine`]. Failures that only concern one source are returned as
//! [`SourceError`]s; [`BatchCoordinator::process_paths`] reports and skips
//! them, and only stops when a destination directory cannot be created.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::detect::{ColumnRequest, SelectionError, extract_links, select_columns};
use crate::download::{
    BatchSummary, DownloadEngine, DownloadOutcome, EngineError, HttpClient,
};
use crate::table::{ColumnId, TableError, TableSource, XlsxTable};

/// Per-run choices that are not engine settings.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorOptions {
    /// How columns are chosen in every source.
    pub columns: ColumnRequest,
}

/// Why one source produced no downloads.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The table could not be read.
    #[error("cannot read {source_name}: {source}")]
    Unreadable {
        /// Source display name.
        source_name: String,
        /// Underlying table error.
        #[source]
        source: TableError,
    },

    /// No column qualified for download.
    #[error("{source_name}: {source}")]
    NoUsableColumns {
        /// Source display name.
        source_name: String,
        /// Selection failure.
        #[source]
        source: SelectionError,
    },

    /// The selected columns hold no values.
    #[error("{source_name}: no links found in columns {}", format_columns(.columns))]
    NoLocators {
        /// Source display name.
        source_name: String,
        /// Columns that were selected.
        columns: Vec<ColumnId>,
    },

    /// The destination directory could not be created.
    #[error("cannot create destination directory {}: {source}", .path.display())]
    Destination {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The engine itself failed.
    #[error("download engine failed for {source_name}: {source}")]
    Engine {
        /// Source display name.
        source_name: String,
        /// Engine error.
        #[source]
        source: EngineError,
    },
}

impl SourceError {
    /// Whether the whole run must stop rather than skip this source.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Destination { .. } | Self::Engine { .. })
    }
}

fn format_columns(columns: &[ColumnId]) -> String {
    columns
        .iter()
        .map(ColumnId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// What happened to one source.
#[derive(Debug)]
pub struct SourceReport {
    /// Source display name.
    pub source_name: String,
    /// Columns downloaded from, in selection order.
    pub columns: Vec<ColumnId>,
    /// Directory the files went to.
    pub destination: PathBuf,
    /// One outcome per locator, in locator order.
    pub outcomes: Vec<DownloadOutcome>,
}

impl SourceReport {
    /// Totals over [`outcomes`](Self::outcomes).
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_outcomes(&self.outcomes)
    }
}

/// Result for one path handed to [`BatchCoordinator::process_paths`].
#[derive(Debug)]
pub struct SourceResult {
    /// The workbook path.
    pub path: PathBuf,
    /// Report, or the reason the source was skipped.
    pub report: Result<SourceReport, SourceError>,
}

/// Ties table sources to column detection and the download engine.
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    client: HttpClient,
    engine: DownloadEngine,
    options: CoordinatorOptions,
    interrupted: Arc<AtomicBool>,
}

impl BatchCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(client: HttpClient, engine: DownloadEngine, options: CoordinatorOptions) -> Self {
        Self {
            client,
            engine,
            options,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares an interrupt flag with the engine; once set, remaining
    /// sources are skipped and running downloads stop.
    #[must_use]
    pub fn with_interrupt_flag(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    /// Downloads every link of one source into `<output_root>/<stem> (<count>)`.
    ///
    /// No directory is created when the source has no links.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] describing why the source produced no
    /// downloads. Individual download failures are not errors; they are in
    /// the report's outcomes.
    #[instrument(skip(self, table, output_root), fields(source = %table.name()))]
    pub async fn process_source(
        &self,
        table: &dyn TableSource,
        stem: &str,
        output_root: &Path,
    ) -> Result<SourceReport, SourceError> {
        let source_name = table.name().to_string();
        let columns = table.columns().map_err(|source| SourceError::Unreadable {
            source_name: source_name.clone(),
            source,
        })?;

        let selected = select_columns(&columns, &self.options.columns).map_err(|source| {
            SourceError::NoUsableColumns {
                source_name: source_name.clone(),
                source,
            }
        })?;

        let locators = extract_links(&columns, &selected);
        if locators.is_empty() {
            return Err(SourceError::NoLocators {
                source_name,
                columns: selected,
            });
        }

        let destination = output_root.join(destination_dir_name(stem, locators.len()));
        tokio::fs::create_dir_all(&destination)
            .await
            .map_err(|source| SourceError::Destination {
                path: destination.clone(),
                source,
            })?;

        info!(
            links = locators.len(),
            destination = %destination.display(),
            "downloading links"
        );

        let outcomes = self
            .engine
            .run_interruptible(
                &self.client,
                &locators,
                &destination,
                Arc::clone(&self.interrupted),
            )
            .await
            .map_err(|source| SourceError::Engine {
                source_name: source_name.clone(),
                source,
            })?;

        Ok(SourceReport {
            source_name,
            columns: selected,
            destination,
            outcomes,
        })
    }

    /// Opens and processes each workbook in turn.
    ///
    /// Unreadable sources, sources without usable columns and sources
    /// without links are reported in the result and skipped. Sources not yet
    /// started when the interrupt flag is set are left out.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`SourceError`] (see [`SourceError::is_fatal`]).
    pub async fn process_paths(
        &self,
        paths: &[PathBuf],
        output_root: &Path,
    ) -> Result<Vec<SourceResult>, SourceError> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            if self.interrupted.load(Ordering::SeqCst) {
                warn!(remaining = paths.len() - results.len(), "interrupted; skipping remaining sources");
                break;
            }

            let report = match open_workbook(path).await {
                Ok(table) => {
                    let stem = source_stem(path);
                    self.process_source(&table, &stem, output_root).await
                }
                Err(source) => Err(SourceError::Unreadable {
                    source_name: path.display().to_string(),
                    source,
                }),
            };

            match report {
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "skipping source");
                    results.push(SourceResult {
                        path: path.clone(),
                        report: Err(error),
                    });
                }
                Ok(report) => results.push(SourceResult {
                    path: path.clone(),
                    report: Ok(report),
                }),
            }
        }
        Ok(results)
    }
}

/// Reads a workbook on the blocking pool; zip and XML parsing are synchronous.
async fn open_workbook(path: &Path) -> Result<XlsxTable, TableError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || XlsxTable::open(owned))
        .await
        .unwrap_or_else(|e| Err(TableError::malformed(path, format!("reader task failed: {e}"))))
}

/// Destination folder name: `<stem> (<count>)`.
#[must_use]
pub fn destination_dir_name(stem: &str, link_count: usize) -> String {
    format!("{stem} ({link_count})")
}

/// File name without its extension, used as the destination stem.
#[must_use]
pub fn source_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "source".to_string(), |s| s.to_string_lossy().into_owned())
}
