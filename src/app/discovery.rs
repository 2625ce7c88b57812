//! Finding workbooks under the input directory.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{debug, warn};
use walkdir::WalkDir;

const WORKBOOK_EXTENSION: &str = "xlsx";

/// Prefix Excel gives the lock file of an open workbook.
const LOCK_FILE_PREFIX: &str = "~$";

/// Lists `.xlsx` files under `input_dir`, recursively, in sorted order.
///
/// With `name_filter`, only files whose name contains it are kept.
/// Unreadable directory entries are logged and skipped.
pub(crate) fn discover_workbooks(input_dir: &Path, name_filter: Option<&str>) -> Result<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        bail!("Input directory '{}' does not exist or is not a directory", input_dir.display());
    }

    let mut found: Vec<PathBuf> = WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_candidate(&entry.file_name().to_string_lossy(), name_filter))
        .map(walkdir::DirEntry::into_path)
        .collect();
    found.sort();

    debug!(count = found.len(), dir = %input_dir.display(), "discovered workbooks");
    Ok(found)
}

fn is_candidate(file_name: &str, name_filter: Option<&str>) -> bool {
    if file_name.starts_with(LOCK_FILE_PREFIX) {
        return false;
    }
    let is_workbook = Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(WORKBOOK_EXTENSION));
    is_workbook && name_filter.is_none_or(|filter| file_name.contains(filter))
}
