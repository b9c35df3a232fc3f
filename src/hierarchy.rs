// Title/Hierarchy Resolver - account code and label from section titles

use crate::patterns;
use crate::row::{ClassifiedRow, Column, RowKind};
use serde::{Deserialize, Serialize};

/// Two-part account code taken from a section title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHierarchy {
    /// Dotted numeric code, e.g. "1.2"
    pub code: String,
    /// Free text after the code, e.g. "Receitas"
    pub label: String,
}

/// Most recent TITLE text at or before `index`.
pub fn current_title(rows: &[ClassifiedRow], index: usize) -> Option<&str> {
    let end = index.min(rows.len().checked_sub(1)?);
    rows[..=end]
        .iter()
        .rev()
        .find(|row| row.kind == RowKind::Title)
        .map(|row| row.row.text(Column::Date))
}

/// Split a section title on `<code> - <label>`.
pub fn split_title(title: &str) -> Option<AccountHierarchy> {
    let caps = patterns::account_title().captures(title.trim())?;
    Some(AccountHierarchy {
        code: caps[1].to_string(),
        label: caps[2].trim().to_string(),
    })
}

/// Hierarchy of the row at `index`; None when no title precedes it or the
/// title does not split.
pub fn resolve(rows: &[ClassifiedRow], index: usize) -> Option<AccountHierarchy> {
    current_title(rows, index).and_then(split_title)
}
