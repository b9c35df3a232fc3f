// Truncation Merger - fold OCR-split description/counterparty lines back into
// the ledger row they belong to
//
// Two split shapes show up in practice:
// 1) two lines, fragment before (or after) the dated line
// 2) three lines, fragment / dated line / fragment
// Other kinds of rows can sit between the pieces.

use crate::error::{LedgerError, Result};
use crate::row::{join_fragments, ClassifiedRow, Column, Field, RowKind};
use tracing::debug;

/// Most rows folded into one target
pub const DEFAULT_MAX_MERGE: usize = 3;

/// Kind of the row next to a target, or the edge of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbor {
    Kind(RowKind),
    Edge,
}

fn neighbor(rows: &[ClassifiedRow], position: Option<usize>) -> Neighbor {
    position
        .and_then(|pos| rows.get(pos))
        .map_or(Neighbor::Edge, |row| Neighbor::Kind(row.kind))
}

/// First ROW strictly after `index`.
pub fn next_row_after(rows: &[ClassifiedRow], index: usize) -> Option<usize> {
    rows.iter()
        .enumerate()
        .skip(index + 1)
        .find(|(_, row)| row.kind == RowKind::Row)
        .map(|(pos, _)| pos)
}

/// First truncated row at or after `from`.
pub fn next_truncated(rows: &[ClassifiedRow], from: usize) -> Option<usize> {
    rows.iter()
        .enumerate()
        .skip(from)
        .find(|(_, row)| row.kind.is_truncated())
        .map(|(pos, _)| pos)
}

/// Merge the truncated rows starting at `start` into the next ROW.
///
/// Fragments are collected in order from `start` up to the next ROW after the
/// target. Fragments after the target are only taken when the rows on both
/// sides of the target have the same kind. The target's Description and
/// Counterparty are overwritten with the collected text, even when nothing
/// was collected. Returns a new sequence without the consumed rows.
pub fn merge_truncated(
    rows: &[ClassifiedRow],
    start: usize,
    max_merge: usize,
) -> Result<Vec<ClassifiedRow>> {
    let target = next_row_after(rows, start).ok_or(LedgerError::MissingMergeTarget { start })?;
    let boundary = next_row_after(rows, target).unwrap_or(rows.len());

    let before = neighbor(rows, target.checked_sub(1));
    let after = neighbor(rows, Some(target + 1));
    let absorb_trailing = before == after;

    let mut consumed = Vec::new();
    let mut descriptions = Vec::new();
    let mut counterparties = Vec::new();

    for (pos, row) in rows.iter().enumerate().take(boundary).skip(start) {
        if pos > target && !absorb_trailing {
            break;
        }
        if !row.kind.is_truncated() {
            continue;
        }

        consumed.push(pos);
        descriptions.push(row.row.text(Column::Description));
        counterparties.push(row.row.text(Column::Counterparty));

        if consumed.len() >= max_merge {
            break;
        }
    }

    let description = join_fragments(descriptions);
    let counterparty = join_fragments(counterparties);

    debug!(
        target_ordinal = rows[target].ordinal,
        merged = consumed.len(),
        "merged truncated rows"
    );

    let merged = rows
        .iter()
        .enumerate()
        .filter(|(pos, _)| !consumed.contains(pos))
        .map(|(pos, row)| {
            let mut row = row.clone();
            if pos == target {
                row.row.set(Column::Description, Field::from_cell(&description));
                row.row.set(Column::Counterparty, Field::from_cell(&counterparty));
            }
            row
        })
        .collect();

    Ok(merged)
}

/// Merge every truncated run that has a ROW after it.
///
/// Fragments with no later ROW are left in place; they never become entries.
pub fn reconcile(rows: Vec<ClassifiedRow>, max_merge: usize) -> Result<Vec<ClassifiedRow>> {
    let mut rows = rows;
    let mut cursor = 0;

    while let Some(start) = next_truncated(&rows, cursor) {
        if next_row_after(&rows, start).is_none() {
            debug!(ordinal = rows[start].ordinal, "truncated rows without a target row");
            break;
        }

        let start_ordinal = rows[start].ordinal;
        rows = merge_truncated(&rows, start, max_merge)?;
        cursor = rows
            .iter()
            .position(|row| row.ordinal > start_ordinal)
            .unwrap_or(rows.len());
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify_rows;
    use crate::row::DecodedRow;

    fn rows(cells: &[[&str; 6]]) -> Vec<ClassifiedRow> {
        classify_rows(cells.iter().map(|c| DecodedRow::from_cells(*c)).collect())
    }

    #[test]
    fn test_three_truncated_rows_merge_into_row() {
        let table = rows(&[
            ["", "CONTA", "", "", "", ""],
            ["", "DE", "", "", "", ""],
            ["", "LUZ", "CEMIG", "", "", ""],
            ["05/10/2022", "", "", "99", "10/2022", "100,00"],
        ]);

        let merged = merge_truncated(&table, 0, DEFAULT_MAX_MERGE).unwrap();

        assert_eq!(merged.len(), table.len() - 3);
        assert_eq!(merged[0].kind, RowKind::Row);
        assert_eq!(merged[0].row.text(Column::Description), "CONTA DE LUZ");
        assert_eq!(merged[0].row.text(Column::Counterparty), "CEMIG");
        assert_eq!(merged[0].row.text(Column::Document), "99");
    }

    #[test]
    fn test_merge_without_fragments_overwrites_with_empty() {
        let table = rows(&[
            ["1.2 - Receitas", "", "", "", "", ""],
            ["05/10/2022", "Taxa", "Fulano", "1", "10/2022", "1,00"],
        ]);

        let merged = merge_truncated(&table, 0, DEFAULT_MAX_MERGE).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].row.get(Column::Description), &Field::Blank);
        assert_eq!(merged[1].row.get(Column::Counterparty), &Field::Blank);
    }

    #[test]
    fn test_merge_respects_bound() {
        let table = rows(&[
            ["", "A", "", "", "", ""],
            ["", "B", "", "", "", ""],
            ["", "C", "", "", "", ""],
            ["", "D", "", "", "", ""],
            ["05/10/2022", "", "", "", "", "1,00"],
        ]);

        let merged = merge_truncated(&table, 0, DEFAULT_MAX_MERGE).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].row.text(Column::Description), "D");
        assert_eq!(merged[1].row.text(Column::Description), "A B C");
    }

    #[test]
    fn test_merge_sandwiched_row_takes_trailing_fragment() {
        let table = rows(&[
            ["", "CONTA DE", "", "", "", ""],
            ["05/10/2022", "", "", "7", "10/2022", "1,00"],
            ["", "LUZ", "", "", "", ""],
            ["06/10/2022", "Taxa", "", "8", "10/2022", "2,00"],
        ]);

        let merged = merge_truncated(&table, 0, DEFAULT_MAX_MERGE).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].row.text(Column::Description), "CONTA DE LUZ");
        assert_eq!(merged[1].row.text(Column::Description), "Taxa");
    }

    #[test]
    fn test_merge_stops_at_target_when_neighbours_differ() {
        let table = rows(&[
            ["", "CONTA DE", "", "", "", ""],
            ["05/10/2022", "", "", "7", "10/2022", "1,00"],
            ["", "", "SILVA", "", "", ""],
            ["06/10/2022", "", "", "8", "10/2022", "2,00"],
        ]);

        let merged = merge_truncated(&table, 0, DEFAULT_MAX_MERGE).unwrap();

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].row.text(Column::Description), "CONTA DE");
        assert_eq!(merged[1].kind, RowKind::TruncatedParticipant);
    }

    #[test]
    fn test_merge_missing_target_is_error() {
        let table = rows(&[["", "ORPHAN", "", "", "", ""]]);
        let err = merge_truncated(&table, 0, DEFAULT_MAX_MERGE).unwrap_err();
        assert!(matches!(err, LedgerError::MissingMergeTarget { start: 0 }));
    }

    #[test]
    fn test_neighbor_edge_sentinel() {
        let table = rows(&[["05/10/2022", "A", "", "", "", "1,00"]]);
        assert_eq!(neighbor(&table, None), Neighbor::Edge);
        assert_eq!(neighbor(&table, Some(1)), Neighbor::Edge);
        assert_eq!(neighbor(&table, Some(0)), Neighbor::Kind(RowKind::Row));
    }

    #[test]
    fn test_reconcile_merges_every_run() {
        let table = rows(&[
            ["1.2 - Receitas", "", "", "", "", ""],
            ["", "CONTA DE", "", "", "", ""],
            ["05/10/2022", "", "", "7", "10/2022", "1,00"],
            ["06/10/2022", "Taxa", "Fulano", "8", "10/2022", "2,00"],
            ["", "AGUA", "", "", "", ""],
            ["", "", "COPASA", "", "", ""],
            ["07/10/2022", "", "", "9", "10/2022", "3,00"],
            ["", "SOBRA", "", "", "", ""],
        ]);

        let merged = reconcile(table, DEFAULT_MAX_MERGE).unwrap();

        let kinds: Vec<RowKind> = merged.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RowKind::Title,
                RowKind::Row,
                RowKind::Row,
                RowKind::Row,
                RowKind::TruncatedDescription,
            ]
        );
        assert_eq!(merged[1].row.text(Column::Description), "CONTA DE");
        assert_eq!(merged[2].row.text(Column::Description), "Taxa");
        assert_eq!(merged[3].row.text(Column::Description), "AGUA");
        assert_eq!(merged[3].row.text(Column::Counterparty), "COPASA");
    }

    #[test]
    fn test_reconcile_without_truncation_is_identity() {
        let table = rows(&[
            ["1.2 - Receitas", "", "", "", "", ""],
            ["05/10/2022", "Taxa", "Fulano", "1", "10/2022", "1,00"],
        ]);
        let merged = reconcile(table.clone(), DEFAULT_MAX_MERGE).unwrap();
        assert_eq!(merged, table);
    }
}
