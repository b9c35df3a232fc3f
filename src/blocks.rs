// Page splitting: OCR page text → titled table blocks

use crate::patterns;
use serde::{Deserialize, Serialize};

/// RawBlock - one section title plus the ASCII table under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    /// Trimmed title line, e.g. "1.2 - Receitas"
    pub title: String,
    /// Table lines only (borders and pipe rows), newline-joined
    pub table: String,
}

/// Split a page's OCR text into titled table blocks.
///
/// A block starts at a title line followed by a blank line. Only the first
/// table after the title is kept: an untitled table appended after another
/// blank line belongs to no section and is discarded. Bodies that do not
/// start with a table line are skipped.
pub fn split_blocks(page: &str) -> Vec<RawBlock> {
    let lines: Vec<&str> = page.lines().collect();
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let next_is_blank = lines.get(i + 1).map_or(false, |next| next.trim().is_empty());

        if patterns::block_title().is_match(line) && next_is_blank {
            if let Some((title, body)) = current.take() {
                blocks.extend(build_block(title, &body));
            }
            current = Some((line.trim().to_string(), Vec::new()));
            i += 2;
            continue;
        }

        if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
        i += 1;
    }

    if let Some((title, body)) = current.take() {
        blocks.extend(build_block(title, &body));
    }

    blocks
}

fn build_block(title: String, body: &[&str]) -> Option<RawBlock> {
    let table = clean_table_text(body)?;
    Some(RawBlock { title, table })
}

/// Keep the first table of a block body.
///
/// Returns None when the body does not start with a table line.
pub fn clean_table_text(body: &[&str]) -> Option<String> {
    let mut lines = body.iter().skip_while(|line| line.trim().is_empty()).peekable();

    match lines.peek() {
        Some(first) if patterns::table_line().is_match(first) => {}
        _ => return None,
    }

    let table: Vec<&str> = lines
        .take_while(|line| !line.trim().is_empty())
        .filter(|line| patterns::table_line().is_match(line))
        .map(|line| line.trim())
        .collect();

    Some(table.join("\n"))
}
