use crate::lookup::Enrichment;
use crate::normalizer::LedgerEntry;
use crate::output::ISO_DATE;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Hash of the fields that identify an entry, for duplicate detection.
/// NOTE: this is for DEDUPLICATION, not IDENTITY. Identity is the UUID.
pub fn compute_idempotency_hash(entry: &LedgerEntry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}|{}|{}|{}|{}",
        entry.source_file,
        entry.ordinal,
        entry.account_code_str(),
        entry.date.format(ISO_DATE),
        entry.description,
        entry.document,
        entry.amount_str(),
    ));
    format!("{:x}", hasher.finalize())
}

/// A ledger entry as stored, with its identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: String,
    pub idempotency_hash: String,
    #[serde(flatten)]
    pub entry: LedgerEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_uuid TEXT UNIQUE NOT NULL,
            idempotency_hash TEXT UNIQUE NOT NULL,
            account_code TEXT,
            account_label TEXT,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            counterparty TEXT NOT NULL,
            document TEXT NOT NULL,
            period TEXT NOT NULL,
            amount TEXT,
            source_file TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            enrichment TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_source ON ledger_entries(source_file)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_date ON ledger_entries(date)",
        [],
    )?;

    Ok(())
}

/// Open (or create) the store at `path`.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {:?}", path))?;
    setup_database(&conn)?;
    Ok(conn)
}

/// Insert entries; already-stored entries (same hash) are skipped.
pub fn insert_entries(conn: &Connection, entries: &[LedgerEntry]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for entry in entries {
        let hash = compute_idempotency_hash(entry);
        let enrichment_json = entry
            .enrichment
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = conn.execute(
            "INSERT INTO ledger_entries (
                entry_uuid, idempotency_hash, account_code, account_label, date,
                description, counterparty, document, period, amount,
                source_file, ordinal, enrichment
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                uuid::Uuid::new_v4().to_string(),
                hash,
                entry.account_code,
                entry.account_label,
                entry.date.format(ISO_DATE).to_string(),
                entry.description,
                entry.counterparty,
                entry.document,
                entry.period,
                entry.amount.map(|amount| amount.to_string()),
                entry.source_file,
                entry.ordinal as i64,
                enrichment_json,
            ],
        );

        match result {
            Ok(_) => summary.inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                summary.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "ledger entries stored"
    );

    Ok(summary)
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

fn stored_entry_from_row(row: &Row) -> rusqlite::Result<StoredEntry> {
    let date: String = row.get(4)?;
    let amount: Option<String> = row.get(9)?;
    let ordinal: i64 = row.get(11)?;
    let enrichment: Option<String> = row.get(12)?;

    let date = NaiveDate::parse_from_str(&date, ISO_DATE).map_err(|e| conversion_error(4, e))?;
    let amount = amount
        .map(|text| Decimal::from_str(&text))
        .transpose()
        .map_err(|e| conversion_error(9, e))?;
    let enrichment: Option<Enrichment> = enrichment
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| conversion_error(12, e))?;

    Ok(StoredEntry {
        id: row.get(0)?,
        idempotency_hash: row.get(1)?,
        entry: LedgerEntry {
            account_code: row.get(2)?,
            account_label: row.get(3)?,
            date,
            description: row.get(5)?,
            counterparty: row.get(6)?,
            document: row.get(7)?,
            period: row.get(8)?,
            amount,
            source_file: row.get(10)?,
            ordinal: ordinal.max(0) as usize,
            enrichment,
        },
    })
}

const SELECT_ENTRIES: &str = "SELECT entry_uuid, idempotency_hash, account_code, account_label,
        date, description, counterparty, document, period, amount,
        source_file, ordinal, enrichment
     FROM ledger_entries";

/// Entries of one source file, in page order
pub fn get_entries_by_source(conn: &Connection, source_file: &str) -> Result<Vec<StoredEntry>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE source_file = ?1 ORDER BY ordinal",
        SELECT_ENTRIES
    ))?;

    let entries = stmt
        .query_map(params![source_file], stored_entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

/// Per-source summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileStat {
    pub source_file: String,
    pub entry_count: i64,
    pub date_range: String,
}

pub fn get_source_file_stats(conn: &Connection) -> Result<Vec<SourceFileStat>> {
    let mut stmt = conn.prepare(
        "SELECT
            source_file,
            COUNT(*) as count,
            MIN(date) || ' - ' || MAX(date) as date_range
         FROM ledger_entries
         GROUP BY source_file
         ORDER BY source_file",
    )?;

    let stats = stmt
        .query_map([], |row| {
            Ok(SourceFileStat {
                source_file: row.get(0)?,
                entry_count: row.get(1)?,
                date_range: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(stats)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| row.get(0))?;

    Ok(count)
}
