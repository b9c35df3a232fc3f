// OCR Ledger - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod patterns;
pub mod row;
pub mod blocks;       // Page → titled table blocks
pub mod decoder;      // Table Decoder
pub mod classifier;   // Row Classifier
pub mod merger;       // Truncation Merger
pub mod hierarchy;    // Title/Hierarchy Resolver
pub mod normalizer;   // Field Normalizer
pub mod lookup;       // Lookup tables and enrichment
pub mod config;
pub mod pipeline;
pub mod output;
pub mod db;

// Re-export commonly used types
pub use error::{LedgerError, Result};
pub use row::{ClassifiedRow, Column, DecodedRow, Field, RowKind};
pub use blocks::{split_blocks, RawBlock};
pub use decoder::{decode_table, render_table, ContinuationMode, DecodedTable};
pub use classifier::{classify, classify_rows};
pub use merger::{merge_truncated, reconcile, DEFAULT_MAX_MERGE};
pub use hierarchy::{resolve, AccountHierarchy};
pub use normalizer::{normalize_rows, parse_amount, parse_date, LedgerEntry};
pub use lookup::{
    AccountConfigEntry, AccountsConfiguration, Enrichment, LookupTables,
    UnitRenameRule, UnitRenames,
};
pub use config::PipelineConfig;
pub use pipeline::{process_file, process_page, PageOutput};
pub use output::{enrich_ledger_csv, merge_csv_dir, read_ledger_csv, write_ledger_csv, MergeSummary};
pub use db::{
    StoredEntry, SourceFileStat, ImportSummary,
    setup_database, open_database, insert_entries,
    get_entries_by_source, get_source_file_stats, verify_count,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
