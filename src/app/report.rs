//! Run summary on stdout, as text or JSON.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use tabfetch::download::{BatchSummary, OutcomeStatus};
use tabfetch::{ColumnId, SourceResult};

#[derive(Debug, Serialize)]
pub(crate) struct RunReport {
    pub(crate) sources: Vec<SourceEntry>,
    pub(crate) totals: BatchSummary,
    pub(crate) interrupted: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SourceEntry {
    pub(crate) path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) destination: Option<PathBuf>,
    pub(crate) columns: Vec<ColumnId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) skipped: Option<String>,
    pub(crate) summary: BatchSummary,
    pub(crate) failures: Vec<FailureEntry>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FailureEntry {
    pub(crate) locator: String,
    pub(crate) attempts: u32,
    pub(crate) kind: &'static str,
    pub(crate) error: String,
}

impl RunReport {
    pub(crate) fn from_results(results: &[SourceResult], interrupted: bool) -> Self {
        let sources: Vec<SourceEntry> = results.iter().map(SourceEntry::from_result).collect();
        let totals = sources.iter().fold(BatchSummary::default(), |mut acc, s| {
            acc.succeeded += s.summary.succeeded;
            acc.failed += s.summary.failed;
            acc.retries += s.summary.retries;
            acc.bytes += s.summary.bytes;
            acc
        });
        Self {
            sources,
            totals,
            interrupted,
        }
    }

    pub(crate) fn write_text(&self, out: &mut impl Write) -> Result<()> {
        for source in &self.sources {
            if let Some(reason) = &source.skipped {
                writeln!(out, "{}: skipped ({reason})", source.path.display())?;
                continue;
            }
            let destination = source
                .destination
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default();
            writeln!(
                out,
                "{}: {} downloaded, {} failed -> {destination}",
                source.path.display(),
                source.summary.succeeded,
                source.summary.failed,
            )?;
            for failure in &source.failures {
                writeln!(
                    out,
                    "  failed: {} ({} attempts): {}",
                    failure.locator, failure.attempts, failure.error
                )?;
            }
        }
        writeln!(
            out,
            "Done: {} downloaded, {} failed, {} retries across {} workbook(s){}",
            self.totals.succeeded,
            self.totals.failed,
            self.totals.retries,
            self.sources.len(),
            if self.interrupted { " (interrupted)" } else { "" }
        )?;
        Ok(())
    }

    pub(crate) fn write_json(&self, out: &mut impl Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)?;
        Ok(())
    }
}

impl SourceEntry {
    fn from_result(result: &SourceResult) -> Self {
        match &result.report {
            Ok(report) => Self {
                path: result.path.clone(),
                destination: Some(report.destination.clone()),
                columns: report.columns.clone(),
                skipped: None,
                summary: report.summary(),
                failures: report
                    .outcomes
                    .iter()
                    .filter_map(|outcome| match &outcome.status {
                        OutcomeStatus::Failed { error } => Some(FailureEntry {
                            locator: outcome.locator.clone(),
                            attempts: outcome.attempts,
                            kind: error.kind(),
                            error: error.to_string(),
                        }),
                        OutcomeStatus::Success { .. } => None,
                    })
                    .collect(),
            },
            Err(error) => Self {
                path: result.path.clone(),
                destination: None,
                columns: Vec::new(),
                skipped: Some(error.to_string()),
                summary: BatchSummary::default(),
                failures: Vec::new(),
            },
        }
    }
}
