use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::EnvFilter;

use ocr_ledger::{
    enrich_ledger_csv, get_source_file_stats, insert_entries, merge_csv_dir, open_database,
    output, process_file, read_ledger_csv, verify_count, write_ledger_csv, ContinuationMode,
    LookupTables, PipelineConfig,
};

#[derive(Parser)]
#[command(name = "ocr-ledger")]
#[command(about = "Rebuild ledger entries from OCR'd statement tables")]
#[command(version)]
struct Cli {
    /// JSON pipeline configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract ledger entries from OCR text pages, one CSV per page
    Extract {
        /// Page text files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Accounts configuration CSV
        #[arg(long)]
        accounts: Option<PathBuf>,
        /// Unit rename CSV
        #[arg(long)]
        units: Option<PathBuf>,
        #[arg(long)]
        max_merge: Option<usize>,
        /// Keep wrapped cells for the merger instead of joining them upward
        #[arg(long)]
        truncation: bool,
    },
    /// Merge every page CSV of a directory into one file
    Merge { dir: PathBuf, out: PathBuf },
    /// Re-apply the lookup tables to ledger CSVs, rewriting them in place
    Enrich {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Accounts configuration CSV
        #[arg(long)]
        accounts: Option<PathBuf>,
        /// Unit rename CSV
        #[arg(long)]
        units: Option<PathBuf>,
    },
    /// Import ledger CSVs into the local store
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List source files held in the local store
    Sources {
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ocr_ledger=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {:?}", path))?,
        None => PipelineConfig::default(),
    };
    Ok(config.apply_env())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Extract {
            files,
            output_dir,
            accounts,
            units,
            max_merge,
            truncation,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if accounts.is_some() {
                config.accounts_configuration = accounts;
            }
            if units.is_some() {
                config.units_renamed = units;
            }
            if let Some(max_merge) = max_merge {
                config.max_merge = max_merge;
            }
            if truncation {
                config.continuation_mode = ContinuationMode::Truncation;
            }
            config.validate()?;
            run_extract(&config, &files)
        }
        Commands::Merge { dir, out } => run_merge(&dir, &out),
        Commands::Enrich {
            files,
            accounts,
            units,
        } => {
            if accounts.is_some() {
                config.accounts_configuration = accounts;
            }
            if units.is_some() {
                config.units_renamed = units;
            }
            run_enrich(&config, &files)
        }
        Commands::Import { files, db } => {
            if let Some(db) = db {
                config.db_path = db;
            }
            run_import(&config, &files)
        }
        Commands::Sources { db } => {
            if let Some(db) = db {
                config.db_path = db;
            }
            run_sources(&config)
        }
    }
}

fn run_extract(config: &PipelineConfig, files: &[PathBuf]) -> Result<()> {
    println!("📄 OCR Ledger: Extract - text pages → ledger CSV");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Lookup tables
    println!("\n📂 Loading lookup tables...");
    let tables = LookupTables::load(
        config.accounts_configuration.as_deref(),
        config.units_renamed.as_deref(),
    )?;
    if let Some(accounts) = &tables.accounts {
        println!("✓ Accounts configuration: {} rows", accounts.len());
    }
    if let Some(units) = &tables.units {
        println!("✓ Unit renames: {} rows", units.len());
    }

    // 2. Pages
    println!("\n🔍 Processing {} page(s)...", files.len());
    let mut total = 0;
    let mut failed = 0;
    for path in files {
        match process_file(path, config, &tables) {
            Ok(page) => {
                let out = config
                    .output_dir
                    .join(output::page_csv_name(&page.source_file));
                let written = write_ledger_csv(&out, &page.entries, tables.has_accounts())?;
                total += written;
                println!(
                    "✓ {} → {:?} ({} entries, {} empty blocks)",
                    page.source_file, out, written, page.empty_blocks
                );
            }
            Err(e) => {
                failed += 1;
                error!(path = ?path, error = %e, "page failed");
                eprintln!("❌ {:?}: {:#}", path, e);
            }
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Extracted {} entries from {} page(s)", total, files.len() - failed);
    if failed > 0 {
        println!("⚠️  {} page(s) failed", failed);
    }

    Ok(())
}

fn run_merge(dir: &Path, out: &Path) -> Result<()> {
    println!("🧩 OCR Ledger: Merge page CSVs");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let summary = merge_csv_dir(dir, out)?;
    println!("✓ Merged {} rows from {} file(s) into {:?}", summary.rows, summary.files, out);

    Ok(())
}

fn run_enrich(config: &PipelineConfig, files: &[PathBuf]) -> Result<()> {
    println!("🏷️  OCR Ledger: Enrich - lookup tables → ledger CSV");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let tables = LookupTables::load(
        config.accounts_configuration.as_deref(),
        config.units_renamed.as_deref(),
    )?;
    if tables.accounts.is_none() && tables.units.is_none() {
        anyhow::bail!("No lookup table given: pass --accounts and/or --units");
    }

    let mut total = 0;
    for path in files {
        let written = enrich_ledger_csv(path, &tables)?;
        total += written;
        println!("✓ {:?} ({} entries)", path, written);
    }

    println!("\n✅ Enriched {} entries in {} file(s)", total, files.len());
    Ok(())
}

fn run_import(config: &PipelineConfig, files: &[PathBuf]) -> Result<()> {
    println!("🗄️  OCR Ledger: Import - CSV → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Setup database
    println!("\n🔧 Setting up database...");
    let conn = open_database(&config.db_path)?;
    println!("✓ Database initialized with WAL mode: {:?}", config.db_path);

    // 2. Load and insert
    let mut loaded = 0;
    for path in files {
        println!("\n📂 Loading {:?}...", path);
        let entries = read_ledger_csv(path)?;
        loaded += entries.len();
        let summary = insert_entries(&conn, &entries)?;
        println!("✓ Inserted: {} entries", summary.inserted);
        println!("✓ Skipped duplicates: {}", summary.duplicates);
    }

    // 3. Verify count
    println!("\n🔍 Verifying database...");
    let count = verify_count(&conn)?;
    println!("✓ Database contains {} entries ({} loaded this run)", count, loaded);

    Ok(())
}

fn run_sources(config: &PipelineConfig) -> Result<()> {
    let conn = open_database(&config.db_path)?;
    let stats = get_source_file_stats(&conn)?;

    if stats.is_empty() {
        println!("No entries stored in {:?}", config.db_path);
        return Ok(());
    }

    println!("{:<40} {:>8}  {}", "SOURCE", "ENTRIES", "DATES");
    for stat in stats {
        println!("{:<40} {:>8}  {}", stat.source_file, stat.entry_count, stat.date_range);
    }

    Ok(())
}
