// Ledger CSV output: per-page files and the directory merge

use crate::lookup::{Enrichment, LookupTables};
use crate::normalizer::LedgerEntry;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use csv::{QuoteStyle, StringRecord, WriterBuilder};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// ISO date format of the ledger output
pub const ISO_DATE: &str = "%Y-%m-%d";

pub const LEDGER_HEADERS: [&str; 8] = [
    "AccountCode",
    "AccountLabel",
    "Date",
    "Description",
    "Counterparty",
    "Document",
    "Period",
    "Amount",
];

pub const ENRICHMENT_HEADERS: [&str; 7] = [
    "PeriodOfAccounting",
    "AccountGroup",
    "AccountGroupLabel",
    "Nature",
    "NatureLabel",
    "ChargesFee",
    "AssemblyAgreed",
];

/// Output columns, with the enrichment block when an accounts table was used.
pub fn ledger_headers(enriched: bool) -> Vec<&'static str> {
    let mut headers = LEDGER_HEADERS.to_vec();
    if enriched {
        headers.extend(ENRICHMENT_HEADERS);
    }
    headers
}

fn entry_record(entry: &LedgerEntry, enriched: bool) -> Vec<String> {
    let mut record = vec![
        entry.account_code_str().to_string(),
        entry.account_label_str().to_string(),
        entry.date.format(ISO_DATE).to_string(),
        entry.description.clone(),
        entry.counterparty.clone(),
        entry.document.clone(),
        entry.period.clone(),
        entry.amount_str(),
    ];

    if enriched {
        let extra = entry.enrichment.clone().unwrap_or_default();
        record.extend([
            extra.period_of_accounting,
            extra.account_group,
            extra.account_group_label,
            extra.nature,
            extra.nature_label,
            extra.charges_fee,
            extra.assembly_agreed,
        ]);
    }

    record
}

/// Write entries as CSV, every field quoted.
pub fn write_ledger<W: Write>(writer: W, entries: &[LedgerEntry], enriched: bool) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(writer);

    wtr.write_record(ledger_headers(enriched))
        .context("Failed to write ledger header")?;
    for entry in entries {
        wtr.write_record(entry_record(entry, enriched))
            .context("Failed to write ledger row")?;
    }
    wtr.flush().context("Failed to flush ledger CSV")?;
    Ok(())
}

/// Write a ledger CSV file, creating its directory.
pub fn write_ledger_csv(path: &Path, entries: &[LedgerEntry], enriched: bool) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create ledger CSV: {:?}", path))?;
    write_ledger(file, entries, enriched)?;
    Ok(entries.len())
}

/// `page_3_2023-01.txt` → `page_3_2023-01.csv`
pub fn page_csv_name(source_file: &str) -> String {
    let stem = Path::new(source_file)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(source_file);
    format!("{}.csv", stem)
}

// ============================================================================
// READING
// ============================================================================

fn column<'a>(record: &'a StringRecord, index: &HashMap<String, usize>, name: &str) -> &'a str {
    index
        .get(name)
        .and_then(|pos| record.get(*pos))
        .unwrap_or("")
        .trim()
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Read a ledger CSV written by [`write_ledger_csv`].
///
/// Entries take the CSV's file name as source and their row number as
/// ordinal.
pub fn read_ledger_csv(path: &Path) -> Result<Vec<LedgerEntry>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open ledger CSV: {:?}", path))?;

    let headers = rdr.headers().context("Failed to read ledger header")?.clone();
    let index: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(pos, name)| (name.trim().to_string(), pos))
        .collect();

    if !index.contains_key("Date") {
        bail!("Not a ledger CSV (no Date column): {:?}", path);
    }
    let enriched = index.contains_key(ENRICHMENT_HEADERS[0]);

    let source_file = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();

    let mut entries = Vec::new();
    for (ordinal, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read ledger line {}", ordinal + 2))?;
        let get = |name: &str| column(&record, &index, name);

        let date = NaiveDate::parse_from_str(get("Date"), ISO_DATE)
            .with_context(|| format!("Invalid date on ledger line {}", ordinal + 2))?;
        let amount = match get("Amount") {
            "" => None,
            text => Some(
                Decimal::from_str(text)
                    .with_context(|| format!("Invalid amount on ledger line {}", ordinal + 2))?,
            ),
        };

        let enrichment = enriched.then(|| Enrichment {
            period_of_accounting: get("PeriodOfAccounting").to_string(),
            account_group: get("AccountGroup").to_string(),
            account_group_label: get("AccountGroupLabel").to_string(),
            nature: get("Nature").to_string(),
            nature_label: get("NatureLabel").to_string(),
            charges_fee: get("ChargesFee").to_string(),
            assembly_agreed: get("AssemblyAgreed").to_string(),
        });

        entries.push(LedgerEntry {
            account_code: non_empty(get("AccountCode")),
            account_label: non_empty(get("AccountLabel")),
            date,
            description: get("Description").to_string(),
            counterparty: get("Counterparty").to_string(),
            document: get("Document").to_string(),
            period: get("Period").to_string(),
            amount,
            source_file: source_file.clone(),
            ordinal,
            enrichment,
        });
    }

    Ok(entries)
}

/// Re-apply the lookup tables to a ledger CSV, rewriting it in place.
///
/// Enrichment columns already in the file are kept when no accounts table is
/// given.
pub fn enrich_ledger_csv(path: &Path, tables: &LookupTables) -> Result<usize> {
    let entries: Vec<LedgerEntry> = read_ledger_csv(path)?
        .into_iter()
        .map(|entry| tables.enrich(entry))
        .collect();
    let enriched = tables.has_accounts() || entries.iter().any(|e| e.enrichment.is_some());

    let written = write_ledger_csv(path, &entries, enriched)?;
    info!(path = ?path, entries = written, enriched, "ledger CSV enriched");
    Ok(written)
}

// ============================================================================
// MERGE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    pub files: usize,
    pub rows: usize,
}

/// Absolute form of a path that may not exist yet: the parent is resolved
/// and the file name joined back on.
fn resolved_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

fn csv_files(dir: &Path, exclude: &Path) -> Result<Vec<PathBuf>> {
    let exclude = resolved_path(exclude);
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list directory: {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
        })
        .filter(|path| resolved_path(path) != exclude)
        .collect();
    files.sort();
    Ok(files)
}

/// Concatenate every CSV of `dir` (by file name) into `out`.
///
/// Columns are aligned by header name: the union of headers in first-seen
/// order, with empty cells where a file lacks a column.
pub fn merge_csv_dir(dir: &Path, out: &Path) -> Result<MergeSummary> {
    let files = csv_files(dir, out)?;

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<HashMap<String, String>> = Vec::new();

    for path in &files {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open CSV: {:?}", path))?;
        let file_headers = rdr
            .headers()
            .with_context(|| format!("Failed to read CSV header: {:?}", path))?
            .clone();

        for name in file_headers.iter() {
            if !headers.iter().any(|h| h == name) {
                headers.push(name.to_string());
            }
        }

        for result in rdr.records() {
            let record = result.with_context(|| format!("Failed to read CSV row: {:?}", path))?;
            rows.push(
                file_headers
                    .iter()
                    .zip(record.iter())
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
            );
        }
    }

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_path(out)
        .with_context(|| format!("Failed to create merged CSV: {:?}", out))?;

    if !headers.is_empty() {
        wtr.write_record(&headers)?;
    }
    for row in &rows {
        wtr.write_record(
            headers
                .iter()
                .map(|name| row.get(name).map(String::as_str).unwrap_or("")),
        )?;
    }
    wtr.flush()?;

    let summary = MergeSummary {
        files: files.len(),
        rows: rows.len(),
    };
    info!(files = summary.files, rows = summary.rows, out = ?out, "merged page CSVs");
    Ok(summary)
}
