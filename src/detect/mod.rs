//! Column detection: deciding which columns of a table hold image URLs.
//!
//! Every visible column gets a score: one point for each value that starts
//! with [`URL_SCHEME_PREFIX`] and one point for each value that ends with an
//! extension from [`IMAGE_EXTENSIONS`]. Columns scoring zero are never
//! selected; the rest are ranked by score, earlier columns winning ties.
//!
//! Callers that already know their columns pass them explicitly instead; the
//! request is then filtered to present, visible columns and never replaced
//! by detection.
//!
//! # Example
//!
//! ```
//! use tabfetch::detect::{ColumnRequest, select_columns};
//! use tabfetch::table::{InMemoryTable, TableSource};
//!
//! let table = InMemoryTable::new("catalog")
//!     .with_column("Name", ["Lamp", "Chair"])
//!     .with_column("ImageURL", ["http://x/a.jpg", "http://x/b.png"]);
//! let columns = table.columns().unwrap();
//! let selected = select_columns(&columns, &ColumnRequest::default()).unwrap();
//! assert_eq!(selected[0].as_str(), "ImageURL");
//! ```

mod extract;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::table::{Column, ColumnId};

pub use extract::extract_links;

/// Prefix a value must start with (case-sensitive, after trimming) to count as a URL.
pub const URL_SCHEME_PREFIX: &str = "http";

/// Lower-cased suffixes that identify an image resource.
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif", ".bmp"];

/// Default number of columns chosen by detection.
pub const DEFAULT_MAX_COLUMNS: usize = 2;

/// Heuristic score of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnScore {
    /// The scored column.
    pub column: ColumnId,
    /// Values starting with the URL scheme prefix.
    pub url_matches: u32,
    /// Values ending with an image extension.
    pub extension_matches: u32,
}

impl ColumnScore {
    /// Total score; higher means more URL-like.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.url_matches + self.extension_matches
    }
}

/// How the columns to download from are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRequest {
    /// Detect the best-scoring columns, at most `max_columns` of them.
    Detect {
        /// Upper bound on the number of selected columns.
        max_columns: usize,
    },
    /// Use exactly these columns, in this order, if present and visible.
    Explicit(Vec<ColumnId>),
}

impl Default for ColumnRequest {
    fn default() -> Self {
        Self::Detect {
            max_columns: DEFAULT_MAX_COLUMNS,
        }
    }
}

/// Column selection produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// No requested column exists as a visible column, or detection found none.
    #[error("{}", no_usable_columns_message(.explicit))]
    NoUsableColumns {
        /// `true` when the caller supplied the column list.
        explicit: bool,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn no_usable_columns_message(explicit: &bool) -> &'static str {
    if *explicit {
        "none of the requested columns exist or all are hidden"
    } else {
        "no URL columns detected"
    }
}

/// Scores one trimmed value: 0, 1 or 2.
#[must_use]
pub fn score_value(value: &str) -> u32 {
    let trimmed = value.trim();
    u32::from(is_url(trimmed)) + u32::from(has_image_extension(trimmed))
}

fn is_url(trimmed: &str) -> bool {
    trimmed.starts_with(URL_SCHEME_PREFIX)
}

fn has_image_extension(trimmed: &str) -> bool {
    let lowered = trimmed.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}

/// Scores every visible column, in column order. Zero scores are included.
#[must_use]
pub fn score_columns(columns: &[Column]) -> Vec<ColumnScore> {
    columns
        .iter()
        .filter(|column| column.visible)
        .map(|column| {
            let mut score = ColumnScore {
                column: column.id.clone(),
                url_matches: 0,
                extension_matches: 0,
            };
            for value in column.present_values() {
                let trimmed = value.trim();
                score.url_matches += u32::from(is_url(trimmed));
                score.extension_matches += u32::from(has_image_extension(trimmed));
            }
            score
        })
        .collect()
}

/// Returns up to `max_columns` visible columns with a nonzero score, best first.
///
/// The sort is stable, so equal scores keep their original column order.
#[must_use]
#[instrument(level = "debug", skip(columns), fields(columns = columns.len()))]
pub fn detect_url_columns(columns: &[Column], max_columns: usize) -> Vec<ColumnId> {
    let mut scores: Vec<ColumnScore> = score_columns(columns)
        .into_iter()
        .filter(|score| score.score() > 0)
        .collect();
    scores.sort_by(|a, b| b.score().cmp(&a.score()));

    for score in &scores {
        debug!(
            column = %score.column,
            score = score.score(),
            url_matches = score.url_matches,
            extension_matches = score.extension_matches,
            "scored column"
        );
    }

    let best: Vec<ColumnId> = scores
        .into_iter()
        .take(max_columns)
        .map(|score| score.column)
        .collect();

    if best.is_empty() {
        info!("no URL columns detected");
    } else {
        info!(columns = ?best, "detected URL columns");
    }
    best
}

/// Keeps the requested columns that exist and are visible, in request order.
///
/// A column named twice in the request is kept once.
#[must_use]
pub fn select_user_columns(columns: &[Column], requested: &[ColumnId]) -> Vec<ColumnId> {
    let mut selected: Vec<ColumnId> = Vec::new();
    for id in requested {
        let usable = columns
            .iter()
            .any(|column| column.visible && &column.id == id);
        if !usable {
            debug!(column = %id, "requested column missing or hidden");
            continue;
        }
        // Repeating a name must not download that column's links twice.
        if !selected.contains(id) {
            selected.push(id.clone());
        }
    }
    selected
}

/// Resolves a [`ColumnRequest`] against a table.
///
/// # Errors
///
/// Returns [`SelectionError::NoUsableColumns`] when the result would be
/// empty. An explicit request that matches nothing does not fall back to
/// detection.
pub fn select_columns(
    columns: &[Column],
    request: &ColumnRequest,
) -> Result<Vec<ColumnId>, SelectionError> {
    let (selected, explicit) = match request {
        ColumnRequest::Detect { max_columns } => {
            (detect_url_columns(columns, *max_columns), false)
        }
        ColumnRequest::Explicit(requested) => {
            let selected = select_user_columns(columns, requested);
            if !selected.is_empty() {
                info!(columns = ?selected, "using requested columns");
            }
            (selected, true)
        }
    };

    if selected.is_empty() {
        return Err(SelectionError::NoUsableColumns { explicit });
    }
    Ok(selected)
}
