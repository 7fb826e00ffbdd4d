//! Status column annotation.

use crate::table::SpreadsheetTable;
use crate::tier::RemediationOutcome;

/// Header of the appended outcome column.
pub const STATUS_HEADER: &str = "Status";

/// Appends a `Status` column and writes one outcome per processed row.
///
/// The column goes one past the widest row so no existing cell is ever
/// overwritten. Rows without an outcome keep an empty status. Running this
/// on an already annotated table appends a second `Status` column.
///
/// Returns the index of the new column. Outcomes for rows outside the table
/// are ignored.
pub fn annotate(table: &mut SpreadsheetTable, outcomes: &[(usize, RemediationOutcome)]) -> usize {
    let column = table.width();
    table.set_cell(0, column, STATUS_HEADER);
    for (row, outcome) in outcomes {
        if *row == 0 {
            continue;
        }
        table.set_cell(*row, column, outcome.to_string());
    }
    column
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::{FailureReason, SkipReason};
    use pretty_assertions::assert_eq;

    const REF: &str = "https://acct.blob.core.windows.net/cont/a.txt";

    #[test]
    fn appends_status_after_widest_row() {
        let mut table = SpreadsheetTable::from_rows([
            vec!["url"],
            vec![REF, "extra"],
            vec!["no reference"],
        ]);

        let column = annotate(&mut table, &[(1, RemediationOutcome::Changed)]);

        assert_eq!(column, 2);
        assert_eq!(
            table.into_rows(),
            vec![
                vec!["url".to_string(), String::new(), "Status".to_string()],
                vec![
                    REF.to_string(),
                    "extra".to_string(),
                    "Changed: Archive → Cool".to_string()
                ],
                vec!["no reference".to_string()],
            ]
        );
    }

    #[test]
    fn rerun_appends_second_status_column() {
        // Known gap: annotation is not deduplicated across runs.
        let mut table = SpreadsheetTable::from_rows([vec!["url"], vec![REF]]);
        let outcome = RemediationOutcome::Skipped(SkipReason::AlreadyInTier(
            tierlift_core::AccessTier::Cool,
        ));

        annotate(&mut table, &[(1, outcome.clone())]);
        annotate(&mut table, &[(1, outcome)]);

        let header = table.header().expect("header");
        assert_eq!(header, ["url", "Status", "Status"]);
        assert_eq!(table.cell(1, 1), table.cell(1, 2));
        assert_eq!(table.cell(1, 2), Some("Skipped: Already Cool"));
    }

    #[test]
    fn outcomes_outside_table_are_ignored() {
        let mut table = SpreadsheetTable::from_rows([vec!["url"], vec![REF]]);
        annotate(
            &mut table,
            &[(7, RemediationOutcome::Error(FailureReason::NotAccessible))],
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, 1), None);
    }
}
