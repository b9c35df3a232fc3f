// Page pipeline: blocks → decode → classify → merge → resolve → normalize → enrich

use crate::blocks::{split_blocks, RawBlock};
use crate::classifier::classify_rows_from;
use crate::config::PipelineConfig;
use crate::decoder::decode_table;
use crate::error::Result;
use crate::lookup::LookupTables;
use crate::merger;
use crate::normalizer::{normalize_rows, LedgerEntry};
use crate::row::{ClassifiedRow, DecodedRow, RowKind};
use anyhow::Context;
use serde::Serialize;
use std::iter;
use std::path::Path;
use tracing::{info, warn};

/// Entries of one page plus block counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageOutput {
    pub source_file: String,
    pub entries: Vec<LedgerEntry>,
    pub blocks: usize,
    /// Blocks that decoded to no rows
    pub empty_blocks: usize,
}

/// Classified rows of one block, led by its title as a TITLE row.
///
/// Ordinals start at `first_ordinal` so they stay unique across the page.
pub fn block_rows(block: &RawBlock, first_ordinal: usize, config: &PipelineConfig) -> Vec<ClassifiedRow> {
    let decoded = decode_table(&block.table, config.continuation_mode);
    if decoded.is_empty() {
        return Vec::new();
    }

    let title = ClassifiedRow::new(first_ordinal, RowKind::Title, DecodedRow::section(&block.title));
    iter::once(title)
        .chain(classify_rows_from(decoded.rows, first_ordinal + 1))
        .collect()
}

/// Run one page of OCR text through every stage.
///
/// Undecodable blocks are skipped; the page still yields the entries of the
/// others.
pub fn process_page(
    text: &str,
    source_file: &str,
    config: &PipelineConfig,
    tables: &LookupTables,
) -> Result<PageOutput> {
    config.validate()?;

    let blocks = split_blocks(text);
    let mut output = PageOutput {
        source_file: source_file.to_string(),
        blocks: blocks.len(),
        ..PageOutput::default()
    };

    let mut next_ordinal = 0;
    for block in &blocks {
        let rows = block_rows(block, next_ordinal, config);
        if rows.is_empty() {
            warn!(source_file, title = %block.title, "block yielded no rows");
            output.empty_blocks += 1;
            continue;
        }
        next_ordinal += rows.len();

        let reconciled = merger::reconcile(rows, config.max_merge)?;
        output.entries.extend(
            normalize_rows(&reconciled, source_file)
                .into_iter()
                .map(|entry| tables.enrich(entry)),
        );
    }

    info!(
        source_file,
        blocks = output.blocks,
        empty_blocks = output.empty_blocks,
        entries = output.entries.len(),
        "page processed"
    );

    Ok(output)
}

/// Read a text page from disk and process it under its file name.
pub fn process_file<P: AsRef<Path>>(
    path: P,
    config: &PipelineConfig,
    tables: &LookupTables,
) -> anyhow::Result<PageOutput> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read page: {:?}", path))?;
    let source_file = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    process_page(&text, source_file, config, tables)
        .with_context(|| format!("Failed to process page: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::ContinuationMode;

    const PAGE: &str = "\
1 - Receitas

+------------+-------------+--------------+-----------+---------+----------+
| Data       | Descrição   | Participante | Documento | Período | Valor    |
+------------+-------------+--------------+-----------+---------+----------+
|            | CONTA DE    |              |           |         |          |
| 05/10/2022 |             |              | 1         | 10/2022 | 1.234,56 |
| 06/10/2022 | Juros       | Banco        | 2         | 10/2022 | 10,00    |
| TOTAL: 1.244,56 |        |              |           |         |          |
+------------+-------------+--------------+-----------+---------+----------+

2.1 - Despesas

| Foo | Bar |
| 1   | 2   |

2.2 - Pessoal

| Data | Descrição | Participante | Documento | Período | Valor |
| 07/10/2022 | Salario | Fulano | 3 | 10/2022 | 500,00 |
";

    #[test]
    fn test_process_page() {
        let config = PipelineConfig::default();
        let output = process_page(PAGE, "page_1_2022-10.txt", &config, &LookupTables::default()).unwrap();

        assert_eq!(output.blocks, 3);
        assert_eq!(output.empty_blocks, 1);
        assert_eq!(output.entries.len(), 3);

        let first = &output.entries[0];
        assert_eq!(first.account_code.as_deref(), Some("1"));
        assert_eq!(first.account_label.as_deref(), Some("Receitas"));
        assert_eq!(first.description, "CONTA DE");
        assert_eq!(first.amount_str(), "1234.56");

        let last = &output.entries[2];
        assert_eq!(last.account_code.as_deref(), Some("2.2"));
        assert_eq!(last.counterparty, "Fulano");
        assert!(output.entries.iter().all(|e| e.source_file == "page_1_2022-10.txt"));
    }

    #[test]
    fn test_ordinals_unique_across_blocks() {
        let output = process_page(PAGE, "p.txt", &PipelineConfig::default(), &LookupTables::default()).unwrap();
        let mut ordinals: Vec<usize> = output.entries.iter().map(|e| e.ordinal).collect();
        ordinals.dedup();
        assert_eq!(ordinals.len(), output.entries.len());
        assert!(ordinals.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_leading_fragment_reaches_merger_in_both_modes() {
        for mode in [ContinuationMode::Append, ContinuationMode::Truncation] {
            let config = PipelineConfig {
                continuation_mode: mode,
                ..PipelineConfig::default()
            };
            let output = process_page(PAGE, "p.txt", &config, &LookupTables::default()).unwrap();
            assert_eq!(output.entries[0].description, "CONTA DE");
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            max_merge: 0,
            ..PipelineConfig::default()
        };
        assert!(process_page(PAGE, "p.txt", &config, &LookupTables::default()).is_err());
    }

    #[test]
    fn test_page_without_blocks() {
        let output = process_page("nothing here", "p.txt", &PipelineConfig::default(), &LookupTables::default()).unwrap();
        assert_eq!(output.blocks, 0);
        assert!(output.entries.is_empty());
    }

    #[test]
    fn test_process_file_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_7_2022-10.txt");
        std::fs::write(&path, PAGE).unwrap();

        let output = process_file(&path, &PipelineConfig::default(), &LookupTables::default()).unwrap();

        assert_eq!(output.source_file, "page_7_2022-10.txt");
        assert_eq!(output.entries.len(), 3);
    }
}
