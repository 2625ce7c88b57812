//! Flattening selected columns into an ordered list of locators.

use tracing::debug;

use crate::table::{Column, ColumnId};

/// Collects the trimmed, non-empty values of the selected columns.
///
/// Output order is the order of `selected`, then row order within each
/// column. Repeated values are kept: every occurrence is its own download.
/// Selected identifiers that match no column contribute nothing.
#[must_use]
pub fn extract_links(columns: &[Column], selected: &[ColumnId]) -> Vec<String> {
    let mut links = Vec::new();
    for id in selected {
        let Some(column) = columns.iter().find(|column| &column.id == id) else {
            debug!(column = %id, "selected column not present in table");
            continue;
        };
        let before = links.len();
        links.extend(
            column
                .present_values()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        );
        debug!(column = %id, links = links.len() - before, "extracted links");
    }
    links
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::table::{InMemoryTable, TableSource};

    fn table() -> Vec<Column> {
        InMemoryTable::new("t")
            .with_column("Name", ["Lamp", "Chair"])
            .with_column("ImageURL", ["http://x/a.jpg", "http://x/b.png", ""])
            .with_column("Alt", ["  http://x/c.gif ", "   ", "http://x/a.jpg"])
            .columns()
            .unwrap()
    }

    #[test]
    fn test_extract_skips_empty_values() {
        let links = extract_links(&table(), &[ColumnId::from("ImageURL")]);
        assert_eq!(links, ["http://x/a.jpg", "http://x/b.png"]);
    }

    #[test]
    fn test_extract_trims_and_drops_whitespace_only_values() {
        let links = extract_links(&table(), &[ColumnId::from("Alt")]);
        assert_eq!(links, ["http://x/c.gif", "http://x/a.jpg"]);
    }

    #[test]
    fn test_extract_follows_selection_order_and_keeps_duplicates() {
        let selected = [ColumnId::from("Alt"), ColumnId::from("ImageURL")];
        let links = extract_links(&table(), &selected);
        assert_eq!(
            links,
            [
                "http://x/c.gif",
                "http://x/a.jpg",
                "http://x/a.jpg",
                "http://x/b.png"
            ]
        );
    }

    #[test]
    fn test_extract_unknown_column_contributes_nothing() {
        let links = extract_links(&table(), &[ColumnId::from("Missing")]);
        assert!(links.is_empty());
    }
}
