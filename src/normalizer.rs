// Field Normalizer - typed ledger entries from classified rows

use crate::hierarchy::{self, AccountHierarchy};
use crate::lookup::Enrichment;
use crate::patterns;
use crate::row::{ClassifiedRow, Column, RowKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Date format printed on the statements
pub const DATE_FORMAT: &str = "%d/%m/%Y";

// ============================================================================
// LEDGER ENTRY
// ============================================================================

/// LedgerEntry - one normalized transaction ready for the warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Short hierarchy code, e.g. "1.2" (None when no section title precedes the row)
    pub account_code: Option<String>,
    /// Descriptive suffix of the section title
    pub account_label: Option<String>,
    pub date: NaiveDate,
    pub description: String,
    pub counterparty: String,
    pub document: String,
    pub period: String,
    /// None when the Amount cell was blank or unreadable
    pub amount: Option<Decimal>,

    // Provenance
    pub source_file: String,
    /// Position of the row in its page, before merging
    pub ordinal: usize,

    /// Lookup-table attributes, present when an accounts table was supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
}

impl LedgerEntry {
    pub fn account_code_str(&self) -> &str {
        self.account_code.as_deref().unwrap_or("")
    }

    pub fn account_label_str(&self) -> &str {
        self.account_label.as_deref().unwrap_or("")
    }

    /// Amount as a plain decimal string, empty when missing
    pub fn amount_str(&self) -> String {
        self.amount.map(|a| a.to_string()).unwrap_or_default()
    }
}

// ============================================================================
// FIELD PARSERS
// ============================================================================

/// Parse a `dd/mm/yyyy` date.
///
/// The value must format back to the same string, so impossible dates such as
/// `31/02/2024` are rejected.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if !patterns::date_shape().is_match(text) {
        return None;
    }
    let date = NaiveDate::parse_from_str(text, DATE_FORMAT).ok()?;
    if date.format(DATE_FORMAT).to_string() != text {
        return None;
    }
    Some(date)
}

pub fn is_valid_date(text: &str) -> bool {
    parse_date(text).is_some()
}

/// Parse a Brazilian-formatted amount: `1.234,56` → 1234.56
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let cleaned = text.trim().replace('.', "").replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

// ============================================================================
// ROW → ENTRY
// ============================================================================

/// Build an entry from a ROW. Returns None for any other kind.
pub fn normalize_row(
    row: &ClassifiedRow,
    hierarchy: Option<AccountHierarchy>,
    source_file: &str,
) -> Option<LedgerEntry> {
    if row.kind != RowKind::Row {
        return None;
    }

    let date = parse_date(row.row.text(Column::Date))?;

    let amount_text = row.row.text(Column::Amount);
    let amount = parse_amount(amount_text);
    if amount.is_none() && !amount_text.is_empty() {
        warn!(
            source_file,
            ordinal = row.ordinal,
            amount = amount_text,
            "unreadable amount, emitting entry without it"
        );
    }

    let (account_code, account_label) = match hierarchy {
        Some(h) => (Some(h.code), Some(h.label)),
        None => (None, None),
    };

    Some(LedgerEntry {
        account_code,
        account_label,
        date,
        description: row.row.text(Column::Description).to_string(),
        counterparty: row.row.text(Column::Counterparty).to_string(),
        document: row.row.text(Column::Document).to_string(),
        period: row.row.text(Column::Period).to_string(),
        amount,
        source_file: source_file.to_string(),
        ordinal: row.ordinal,
        enrichment: None,
    })
}

/// Entries for every ROW of a reconciled sequence, with their hierarchy.
pub fn normalize_rows(rows: &[ClassifiedRow], source_file: &str) -> Vec<LedgerEntry> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| row.kind == RowKind::Row)
        .filter_map(|(index, row)| {
            normalize_row(row, hierarchy::resolve(rows, index), source_file)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify_rows;
    use crate::row::DecodedRow;
    use chrono::Datelike;

    #[test]
    fn test_parse_date_valid() {
        let date = parse_date("05/10/2022").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2022, 10, 5).unwrap());
        assert_eq!(date.format(DATE_FORMAT).to_string(), "05/10/2022");
        assert!(is_valid_date("29/02/2024"));
    }

    #[test]
    fn test_parse_date_rejects_impossible_dates() {
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("29/02/2023"), None);
        assert_eq!(parse_date("32/01/2024"), None);
        assert_eq!(parse_date("01/13/2024"), None);
    }

    #[test]
    fn test_parse_date_rejects_other_shapes() {
        assert_eq!(parse_date("5/10/2022"), None);
        assert_eq!(parse_date("2022-10-05"), None);
        assert_eq!(parse_date("Data"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_date_round_trips_every_day_of_a_year() {
        let mut day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        while day.year() == 2024 {
            let text = day.format(DATE_FORMAT).to_string();
            assert_eq!(parse_date(&text), Some(day), "{}", text);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1.234,56"), Some(Decimal::from_str("1234.56").unwrap()));
        assert_eq!(parse_amount("-10,00"), Some(Decimal::from_str("-10.00").unwrap()));
        assert_eq!(parse_amount("1.000.000,01"), Some(Decimal::from_str("1000000.01").unwrap()));
        assert_eq!(parse_amount(" 15 "), Some(Decimal::from(15)));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_normalize_rows_with_hierarchy() {
        let rows = classify_rows(vec![
            DecodedRow::section("1.2 - Receitas"),
            DecodedRow::from_cells(["05/10/2022", "Taxa", "Fulano", "123", "10/2022", "1.234,56"]),
            DecodedRow::from_cells(["TOTAL: 1.234,56", "", "", "", "", ""]),
        ]);

        let entries = normalize_rows(&rows, "page_1_2022-10.txt");

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.account_code.as_deref(), Some("1.2"));
        assert_eq!(entry.account_label.as_deref(), Some("Receitas"));
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2022, 10, 5).unwrap());
        assert_eq!(entry.amount_str(), "1234.56");
        assert_eq!(entry.document, "123");
        assert_eq!(entry.ordinal, 1);
    }

    #[test]
    fn test_normalize_rows_without_title() {
        let rows = classify_rows(vec![DecodedRow::from_cells([
            "05/10/2022", "Taxa", "", "", "", "",
        ])]);

        let entries = normalize_rows(&rows, "p.txt");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].account_code, None);
        assert_eq!(entries[0].account_code_str(), "");
        assert_eq!(entries[0].amount, None);
        assert_eq!(entries[0].amount_str(), "");
    }
}
