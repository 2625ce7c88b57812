//! Target filename derivation for downloaded resources.
//!
//! A locator's file is named after the last segment of its URL path. When the
//! path has no usable segment, a synthesized `image_<secs>_<n>.jpg` name is
//! used; `n` comes from a process-wide counter so synthesized names never
//! collide inside one process. Bytes are first written to a per-task
//! `.part` file next to the target and only renamed into place once complete.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use url::Url;

/// Extension used for synthesized names.
pub const DEFAULT_RESOURCE_EXTENSION: &str = ".jpg";

/// Suffix of in-progress files.
pub const PARTIAL_SUFFIX: &str = "part";

static SYNTHESIZED_NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How to name targets when several locators in one batch derive the same filename.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Keep the derived names; the last download to finish wins.
    #[default]
    Overwrite,
    /// Append `_<index>` to every name shared by more than one locator.
    IndexSuffix,
}

/// Derives a filename from the last segment of the locator's URL path.
///
/// Returns `None` when the locator does not parse as a URL or its path ends
/// without a segment (`http://host/` or `http://host/dir/`).
#[must_use]
pub fn filename_from_locator(locator: &str) -> Option<String> {
    let url = Url::parse(locator.trim()).ok()?;
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
        debug!(
            segment = %last,
            error = %e,
            "URL decoding failed, using raw segment"
        );
        last.into()
    });
    Some(sanitize_filename(&decoded))
}

/// Synthesizes a unique fallback name: `image_<unix-secs>_<counter>.jpg`.
#[must_use]
pub fn synthesize_filename() -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let sequence = SYNTHESIZED_NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("image_{timestamp}_{sequence}{DEFAULT_RESOURCE_EXTENSION}")
}

/// Returns the derived filename, or a synthesized one.
#[must_use]
pub fn target_filename(locator: &str) -> String {
    filename_from_locator(locator).unwrap_or_else(synthesize_filename)
}

/// Names every locator of a batch, in input order.
#[must_use]
pub fn plan_filenames(locators: &[String], policy: CollisionPolicy) -> Vec<String> {
    let names: Vec<String> = locators.iter().map(|l| target_filename(l)).collect();
    if policy == CollisionPolicy::Overwrite {
        return names;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in &names {
        *counts.entry(name.as_str()).or_insert(0) += 1;
    }
    names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            if counts.get(name.as_str()).copied().unwrap_or(0) > 1 {
                with_index_suffix(name, index)
            } else {
                name.clone()
            }
        })
        .collect()
}

fn with_index_suffix(name: &str, index: usize) -> String {
    match name.rfind('.') {
        Some(pos) if pos > 0 => format!("{}_{index}{}", &name[..pos], &name[pos..]),
        _ => format!("{name}_{index}"),
    }
}

/// In-progress path for task `index`: `<final>.<index>.part`.
///
/// The index keeps temporary files distinct even when two tasks share a
/// final name.
#[must_use]
pub fn partial_path(final_path: &Path, index: usize) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{index}.{PARTIAL_SUFFIX}"));
    final_path.with_file_name(name)
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
