// Row Classifier - semantic role of every decoded row

use crate::normalizer::is_valid_date;
use crate::patterns;
use crate::row::{ClassifiedRow, Column, DecodedRow, RowKind};

/// Header tokens printed in the Date column of a repeated header row
const HEADER_TOKENS: [&str; 2] = ["Data", "Date"];

/// Classify a row from which fields are blank and the Date text.
///
/// Total: every row gets exactly one kind.
pub fn classify(row: &DecodedRow) -> RowKind {
    let date = row.text(Column::Date);

    if row.is_blank(Column::Date) {
        if !row.is_blank(Column::Amount) {
            return RowKind::Others;
        }
        // Counterparty fragments wrap onto their own line with an empty
        // description; anything else is a description fragment.
        return if row.is_blank(Column::Description) {
            RowKind::TruncatedParticipant
        } else {
            RowKind::TruncatedDescription
        };
    }

    let rest_blank = Column::ALL[1..].iter().all(|column| row.is_blank(*column));
    if rest_blank {
        if patterns::total_row().is_match(date) {
            RowKind::Total
        } else if patterns::title_row().is_match(date) {
            RowKind::Title
        } else {
            RowKind::Others
        }
    } else if HEADER_TOKENS.contains(&date) {
        RowKind::Header
    } else if is_valid_date(date) {
        RowKind::Row
    } else {
        RowKind::Others
    }
}

/// Classify a block's rows, numbering them in order.
pub fn classify_rows(rows: Vec<DecodedRow>) -> Vec<ClassifiedRow> {
    classify_rows_from(rows, 0)
}

/// Same as [`classify_rows`], numbering from `first_ordinal` so ordinals stay
/// unique across the blocks of a page.
pub fn classify_rows_from(rows: Vec<DecodedRow>, first_ordinal: usize) -> Vec<ClassifiedRow> {
    rows.into_iter()
        .enumerate()
        .map(|(offset, row)| ClassifiedRow::new(first_ordinal + offset, classify(&row), row))
        .collect()
}
