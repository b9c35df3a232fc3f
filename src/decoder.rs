// Table Decoder - ASCII table text → six-column rows
//
// Repairs, applied in order when the header does not line up with the six
// canonical columns:
// 1) duplicate column title ("Documento" / "Documento .1")
// 2) merged "Descrição Participante" column
// 3) phantom unnamed column pushing the header one step right

use crate::normalizer::is_valid_date;
use crate::patterns;
use crate::row::{is_merged_description_header, Column, DecodedRow, Field};
use serde::{Deserialize, Serialize};
use std::iter;
use tracing::{debug, warn};

/// What to do with a blank-Date row carrying text (a wrapped cell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContinuationMode {
    /// Keep the row; the merger folds it into the next ROW
    Truncation,
    /// Append the text to the preceding dated row and drop it
    #[default]
    Append,
}

/// Rows of one table block, plus the column count read from the table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DecodedTable {
    pub rows: Vec<DecodedRow>,
    /// Columns seen before any repair
    pub arity: usize,
}

impl DecodedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A table column before mapping onto the canonical six
#[derive(Debug, Clone)]
struct RawColumn {
    name: String,
    cells: Vec<Field>,
}

impl RawColumn {
    fn is_unnamed(&self) -> bool {
        self.name.trim().is_empty()
    }
}

// ============================================================================
// PARSING
// ============================================================================

fn split_cells(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(|cell| cell.trim().to_string()).collect()
}

/// Header plus data lines as columns. Short rows get `Field::Missing`; cells
/// beyond the header become unnamed columns.
fn parse_columns(text: &str) -> Option<Vec<RawColumn>> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !patterns::border_line().is_match(line))
        .filter(|line| line.contains('|'));

    let header = split_cells(lines.next()?);
    let rows: Vec<Vec<String>> = lines.map(split_cells).collect();

    let width = rows
        .iter()
        .map(Vec::len)
        .chain(iter::once(header.len()))
        .max()
        .unwrap_or(0);

    let columns = (0..width)
        .map(|index| RawColumn {
            name: header.get(index).cloned().unwrap_or_default(),
            cells: rows
                .iter()
                .map(|row| row.get(index).map_or(Field::Missing, |cell| Field::from_cell(cell)))
                .collect(),
        })
        .collect();

    Some(columns)
}

// ============================================================================
// REPAIRS
// ============================================================================

fn base_name(name: &str) -> String {
    patterns::duplicate_suffix()
        .replace(name.trim(), "")
        .trim()
        .to_string()
}

/// Fold repeated headers into their first column, keeping the first
/// non-blank value of the group for every row.
fn repair_duplicates(columns: Vec<RawColumn>) -> Vec<RawColumn> {
    let mut kept: Vec<RawColumn> = Vec::with_capacity(columns.len());

    for column in columns {
        let base = base_name(&column.name);
        if !base.is_empty() {
            if let Some(first) = kept.iter_mut().find(|c| base_name(&c.name) == base) {
                warn!(column = %column.name, into = %first.name, "merging duplicate column");
                for (value, extra) in first.cells.iter_mut().zip(column.cells) {
                    if value.is_blank() && !extra.is_blank() {
                        *value = extra;
                    }
                }
                first.name = base;
                continue;
            }
        }
        kept.push(column);
    }

    kept
}

/// Split a merged "Description Counterparty" column into Description plus an
/// empty Counterparty.
fn repair_merged_description(columns: Vec<RawColumn>) -> Vec<RawColumn> {
    let mut repaired = Vec::with_capacity(columns.len() + 1);

    for column in columns {
        if is_merged_description_header(&column.name) {
            warn!(column = %column.name, "splitting merged description column");
            let height = column.cells.len();
            repaired.push(RawColumn {
                name: Column::Description.header().to_string(),
                cells: column.cells,
            });
            repaired.push(RawColumn {
                name: Column::Counterparty.header().to_string(),
                cells: vec![Field::Blank; height],
            });
        } else {
            repaired.push(column);
        }
    }

    repaired
}

/// An unnamed header cell with an all-blank Amount column means the header
/// sits one column right of the data: drop the unnamed name and the empty
/// Amount data, then re-pair names and data in order.
fn repair_phantom_column(mut columns: Vec<RawColumn>) -> Vec<RawColumn> {
    let Some(unnamed) = columns.iter().position(RawColumn::is_unnamed) else {
        return columns;
    };

    let amount = columns
        .iter()
        .rposition(|c| Column::from_header(&c.name) == Some(Column::Amount));

    match amount {
        Some(amount) if columns[amount].cells.iter().all(Field::is_blank) => {
            warn!(position = unnamed, "phantom empty column, shifting header left");
            let mut names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
            names.remove(unnamed);
            columns.remove(amount);
            for (column, name) in columns.iter_mut().zip(names) {
                column.name = name;
            }
        }
        _ => {
            warn!(position = unnamed, "unnamed column with a populated amount, dropping it");
        }
    }

    columns
}

/// Column index for each canonical field: by name when all six are present,
/// else by position when exactly six columns are left.
fn map_columns(columns: &[RawColumn]) -> Option<[usize; 6]> {
    if let Some(mapping) = map_by_name(columns) {
        return Some(mapping);
    }
    if columns.len() == Column::ALL.len() {
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        warn!(?names, "header not recognized, mapping columns by position");
        return Some([0, 1, 2, 3, 4, 5]);
    }
    None
}

fn map_by_name(columns: &[RawColumn]) -> Option<[usize; 6]> {
    let mut mapping = [0usize; 6];
    for (slot, canonical) in mapping.iter_mut().zip(Column::ALL) {
        *slot = columns
            .iter()
            .position(|c| Column::from_header(&c.name) == Some(canonical))?;
    }
    Some(mapping)
}

// ============================================================================
// ROW FILTERS
// ============================================================================

/// Title text in Date with every other field blank
fn is_section_row(row: &DecodedRow) -> bool {
    patterns::title_row().is_match(row.text(Column::Date))
        && Column::ALL[1..].iter().all(|column| row.is_blank(*column))
}

fn is_dated(row: &DecodedRow) -> bool {
    is_valid_date(row.text(Column::Date))
}

fn filter_rows(rows: Vec<DecodedRow>, mode: ContinuationMode) -> Vec<DecodedRow> {
    let mut kept: Vec<DecodedRow> = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;

    for row in rows {
        if row.is_empty() {
            dropped += 1;
            continue;
        }

        if !row.is_blank(Column::Date) {
            if is_dated(&row) || is_section_row(&row) {
                kept.push(row);
            } else {
                dropped += 1;
            }
            continue;
        }

        if mode == ContinuationMode::Append {
            if let Some(previous) = kept.last_mut().filter(|previous| is_dated(previous)) {
                for column in &Column::ALL[1..] {
                    let mut field = previous.get(*column).clone();
                    field.append(row.get(*column));
                    previous.set(*column, field);
                }
                continue;
            }
        }
        kept.push(row);
    }

    if dropped > 0 {
        debug!(dropped, "noise rows dropped");
    }
    kept
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Decode one table block. Never fails: a block that cannot be mapped onto
/// the six columns yields no rows.
pub fn decode_table(text: &str, mode: ContinuationMode) -> DecodedTable {
    let Some(columns) = parse_columns(text) else {
        return DecodedTable::default();
    };
    let arity = columns.len();

    let columns = repair_duplicates(columns);
    let columns = repair_merged_description(columns);
    let mut columns = repair_phantom_column(columns);
    columns.retain(|column| !column.is_unnamed());

    let Some(mapping) = map_columns(&columns) else {
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        warn!(?names, "undecodable table block");
        return DecodedTable { rows: Vec::new(), arity };
    };

    let height = columns.first().map_or(0, |c| c.cells.len());
    let rows = (0..height)
        .map(|index| DecodedRow::new(mapping.map(|col| columns[col].cells[index].clone())))
        .collect();

    DecodedTable {
        rows: filter_rows(rows, mode),
        arity,
    }
}

fn render_line(cells: [&str; 6], widths: &[usize; 6]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!(" {:<width$} ", cell, width = *width))
        .collect();
    format!("|{}|", padded.join("|"))
}

/// Canonical ASCII table with the Portuguese header.
pub fn render_table(rows: &[DecodedRow]) -> String {
    let widths: [usize; 6] = Column::ALL.map(|column| {
        rows.iter()
            .map(|row| row.text(column).chars().count())
            .chain(iter::once(column.header().chars().count()))
            .max()
            .unwrap_or(0)
    });

    let border = format!(
        "+{}+",
        widths
            .iter()
            .map(|width| "-".repeat(width + 2))
            .collect::<Vec<_>>()
            .join("+")
    );

    let mut lines = vec![
        border.clone(),
        render_line(Column::ALL.map(|column| column.header()), &widths),
        border.clone(),
    ];
    for row in rows {
        lines.push(render_line(Column::ALL.map(|column| row.text(column)), &widths));
    }
    lines.push(border);

    lines.join("\n")
}
