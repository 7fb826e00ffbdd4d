//! Row/cell view of one worksheet.

use serde::Serialize;
use tierlift_core::ObjectReference;

/// Ordered rows of cell strings. Row 0 is the header row.
///
/// Rows may be ragged. Reading past the end of a row yields `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpreadsheetTable {
    rows: Vec<Vec<String>>,
}

impl SpreadsheetTable {
    /// Creates a table from rows.
    #[must_use]
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Builds a table from anything string-like.
    #[must_use]
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// All rows, header included.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Consumes the table and returns its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    /// The header row, if the table has any rows.
    #[must_use]
    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Data rows paired with their row index in the table.
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, row)| (index, row.as_slice()))
    }

    /// Number of rows, header included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of the widest row.
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell text, or `None` when the row or column is out of range.
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// Writes a cell, padding the row with empty cells as needed.
    ///
    /// Writing to a row index past the end of the table is a no-op.
    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        let Some(cells) = self.rows.get_mut(row) else {
            return;
        };
        if cells.len() <= column {
            cells.resize(column + 1, String::new());
        }
        cells[column] = value.into();
    }
}

/// A reference found in a specific cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoundReference {
    /// Zero-based row index (0 is the header row).
    pub row: usize,
    /// Zero-based column index.
    pub column: usize,
    /// The decomposed reference.
    pub reference: ObjectReference,
}

/// Scans every cell of a table, header included, for blob references.
#[must_use]
pub fn find_references(table: &SpreadsheetTable) -> Vec<FoundReference> {
    table
        .rows()
        .iter()
        .enumerate()
        .flat_map(|(row, cells)| {
            cells.iter().enumerate().filter_map(move |(column, text)| {
                ObjectReference::parse(text).map(|reference| FoundReference {
                    row,
                    column,
                    reference,
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_access_is_a_no_op() {
        let table = SpreadsheetTable::from_rows([vec!["a", "b", "c"], vec!["x"]]);
        assert_eq!(table.cell(1, 0), Some("x"));
        assert_eq!(table.cell(1, 2), None);
        assert_eq!(table.cell(5, 0), None);
        assert_eq!(table.width(), 3);
    }

    #[test]
    fn set_cell_pads_short_rows() {
        let mut table = SpreadsheetTable::from_rows([vec!["a", "b", "c"], vec!["x"]]);
        table.set_cell(1, 3, "done");
        assert_eq!(table.rows()[1], vec!["x", "", "", "done"]);

        table.set_cell(9, 0, "ignored");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn find_references_reports_positions() {
        let table = SpreadsheetTable::from_rows([
            vec!["name", "link"],
            vec!["one", "https://acct.blob.core.windows.net/cont/a.txt"],
            vec!["https://other.blob.core.windows.net/c2/dir/b.txt", "n/a"],
        ]);

        let found = find_references(&table);
        assert_eq!(found.len(), 2);
        assert_eq!((found[0].row, found[0].column), (1, 1));
        assert_eq!(found[1].reference.account(), "other");
        assert_eq!((found[1].row, found[1].column), (2, 0));
    }
}
