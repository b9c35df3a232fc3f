// Row model shared by every pipeline stage

use serde::{Deserialize, Serialize};

// ============================================================================
// FIELD
// ============================================================================

/// One cell of a decoded row: absent, empty, or trimmed text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Field {
    /// The row had no cell for this column
    #[default]
    Missing,
    /// The cell existed but was empty after trimming
    Blank,
    /// Trimmed, non-empty cell content
    Text(String),
}

impl Field {
    /// Build a field from raw cell text, trimming it.
    pub fn from_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Field::Blank
        } else {
            Field::Text(trimmed.to_string())
        }
    }

    /// Missing and Blank both count as blank.
    pub fn is_blank(&self) -> bool {
        !matches!(self, Field::Text(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Field::Text(text) => text,
            _ => "",
        }
    }

    /// Space-join another fragment onto this field.
    pub fn append(&mut self, other: &Field) {
        if other.is_blank() {
            return;
        }
        let joined = join_fragments([self.as_str(), other.as_str()]);
        *self = Field::from_cell(&joined);
    }
}

impl From<&str> for Field {
    fn from(raw: &str) -> Self {
        Field::from_cell(raw)
    }
}

/// Join text fragments with single spaces, skipping empty ones.
pub fn join_fragments<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    fragments
        .into_iter()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// COLUMN
// ============================================================================

/// The six canonical semantic columns, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Date,
    Description,
    Counterparty,
    Document,
    Period,
    Amount,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Date,
        Column::Description,
        Column::Counterparty,
        Column::Document,
        Column::Period,
        Column::Amount,
    ];

    /// Header text as printed on the statements
    pub fn header(&self) -> &'static str {
        match self {
            Column::Date => "Data",
            Column::Description => "Descrição",
            Column::Counterparty => "Participante",
            Column::Document => "Documento",
            Column::Period => "Período",
            Column::Amount => "Valor",
        }
    }

    /// English name used in the ledger output
    pub fn name(&self) -> &'static str {
        match self {
            Column::Date => "Date",
            Column::Description => "Description",
            Column::Counterparty => "Counterparty",
            Column::Document => "Document",
            Column::Period => "Period",
            Column::Amount => "Amount",
        }
    }

    /// Recognize a trimmed header cell (Portuguese, unaccented or English).
    pub fn from_header(name: &str) -> Option<Column> {
        match name.trim().to_lowercase().as_str() {
            "data" | "date" => Some(Column::Date),
            "descrição" | "descricao" | "description" => Some(Column::Description),
            "participante" | "counterparty" => Some(Column::Counterparty),
            "documento" | "document" => Some(Column::Document),
            "período" | "periodo" | "period" => Some(Column::Period),
            "valor" | "amount" => Some(Column::Amount),
            _ => None,
        }
    }

    fn index(&self) -> usize {
        match self {
            Column::Date => 0,
            Column::Description => 1,
            Column::Counterparty => 2,
            Column::Document => 3,
            Column::Period => 4,
            Column::Amount => 5,
        }
    }
}

/// True when a header is the merged "Description Counterparty" column.
pub fn is_merged_description_header(name: &str) -> bool {
    let words: Vec<String> = name
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect();
    words.len() == 2
        && Column::from_header(&words[0]) == Some(Column::Description)
        && Column::from_header(&words[1]) == Some(Column::Counterparty)
}

// ============================================================================
// DECODED ROW
// ============================================================================

/// One table row with exactly six semantic fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecodedRow {
    fields: [Field; 6],
}

impl DecodedRow {
    pub fn new(fields: [Field; 6]) -> Self {
        DecodedRow { fields }
    }

    /// Build a row from six cell strings in canonical order.
    pub fn from_cells(cells: [&str; 6]) -> Self {
        DecodedRow {
            fields: cells.map(Field::from_cell),
        }
    }

    /// A section row: the title text in Date, every other field blank.
    pub fn section(title: &str) -> Self {
        let mut row = DecodedRow::from_cells(["", "", "", "", "", ""]);
        row.set(Column::Date, Field::from_cell(title));
        row
    }

    pub fn get(&self, column: Column) -> &Field {
        &self.fields[column.index()]
    }

    pub fn text(&self, column: Column) -> &str {
        self.get(column).as_str()
    }

    pub fn set(&mut self, column: Column, value: Field) {
        self.fields[column.index()] = value;
    }

    pub fn is_blank(&self, column: Column) -> bool {
        self.get(column).is_blank()
    }

    /// Every field blank or missing
    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(Field::is_blank)
    }

    pub fn fields(&self) -> &[Field; 6] {
        &self.fields
    }
}

// ============================================================================
// ROW KIND
// ============================================================================

/// Semantic role of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowKind {
    Total,
    Title,
    Row,
    Header,
    TruncatedDescription,
    TruncatedParticipant,
    Others,
}

impl RowKind {
    pub fn is_truncated(&self) -> bool {
        matches!(self, RowKind::TruncatedDescription | RowKind::TruncatedParticipant)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RowKind::Total => "TOTAL",
            RowKind::Title => "TITLE",
            RowKind::Row => "ROW",
            RowKind::Header => "HEADER",
            RowKind::TruncatedDescription => "TRUNCATED_DESCRIPTION",
            RowKind::TruncatedParticipant => "TRUNCATED_PARTICIPANT",
            RowKind::Others => "OTHERS",
        }
    }
}

/// A row with its kind, computed once during classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRow {
    /// Position in the block before any merge; stable across merges.
    pub ordinal: usize,
    pub kind: RowKind,
    pub row: DecodedRow,
}

impl ClassifiedRow {
    pub fn new(ordinal: usize, kind: RowKind, row: DecodedRow) -> Self {
        ClassifiedRow { ordinal, kind, row }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_from_cell_tags() {
        assert_eq!(Field::from_cell("  "), Field::Blank);
        assert_eq!(Field::from_cell(" abc "), Field::Text("abc".to_string()));
        assert!(Field::Missing.is_blank());
        assert!(Field::Blank.is_blank());
        assert!(!Field::from("x").is_blank());
    }

    #[test]
    fn test_field_append() {
        let mut field = Field::from("CONTA DE");
        field.append(&Field::from("LUZ"));
        assert_eq!(field.as_str(), "CONTA DE LUZ");

        let mut empty = Field::Missing;
        empty.append(&Field::Blank);
        assert_eq!(empty, Field::Missing);
        empty.append(&Field::from("X"));
        assert_eq!(empty.as_str(), "X");
    }

    #[test]
    fn test_join_fragments_skips_empty() {
        assert_eq!(join_fragments(["a", "", " b ", "  "]), "a b");
        assert_eq!(join_fragments(Vec::<&str>::new()), "");
    }

    #[test]
    fn test_column_from_header() {
        assert_eq!(Column::from_header(" Descrição "), Some(Column::Description));
        assert_eq!(Column::from_header("Periodo"), Some(Column::Period));
        assert_eq!(Column::from_header("Amount"), Some(Column::Amount));
        assert_eq!(Column::from_header("Unnamed"), None);
    }

    #[test]
    fn test_merged_description_header() {
        assert!(is_merged_description_header("Descrição Participante"));
        assert!(is_merged_description_header("Description  Counterparty"));
        assert!(!is_merged_description_header("Descrição"));
    }

    #[test]
    fn test_section_row() {
        let row = DecodedRow::section("1.2 - Receitas");
        assert_eq!(row.text(Column::Date), "1.2 - Receitas");
        assert!(Column::ALL[1..].iter().all(|c| row.is_blank(*c)));
    }
}
