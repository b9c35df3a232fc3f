// Named text matchers shared by the pipeline stages.
//
// Each matcher is compiled once and is stateless, so the same instance can be
// read from any thread.

use regex::Regex;
use std::sync::OnceLock;

/// `+-----+` style border, or a `|-----|` separator row.
pub fn border_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:\+[-=+|:\s]*[-=][-=+|:\s]*|\|[-=+|:]*[-=][-=+|:]*)\s*$")
            .expect("border regex")
    })
}

/// Any line that belongs to an ASCII table (border or pipe-delimited content).
pub fn table_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\+-|\|)").expect("table line regex"))
}

/// Section title preceding a table on the page, e.g. `1.2 - Receitas`.
pub fn block_title() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[ ]*[12][.0-9]* - .*\S.*$").expect("block title regex"))
}

/// TITLE row inside a table: a dotted code with at least two segments.
pub fn title_row() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d[0-9.]* - .*$").expect("title row regex"))
}

/// TOTAL row, e.g. `TOTAL: 1.234,56`.
pub fn total_row() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^TOTAL: \d+(?:[.,]\d+)*").expect("total regex"))
}

/// Splits a section title into code (group 1) and label (group 2).
pub fn account_title() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+[.\d]*) - (.*)$").expect("account title regex"))
}

/// Shape of a `dd/mm/yyyy` date. Calendar validity is checked separately.
pub fn date_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("date regex"))
}

/// Legacy unit participant, e.g. `Un. 888-QD88-LT88`; group 1 is the unit id.
pub fn legacy_unit() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Un\. (\d*-QD\d*-LT\d*)$").expect("unit regex"))
}

/// Page file name carrying the accounting period, e.g. `page_12_2023-01.csv`.
pub fn page_file() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^page_\d+_(\d+-\d+)\.[A-Za-z0-9]+$").expect("page file regex"))
}

/// Numeric suffix added to a repeated header, e.g. the ` .1` in `Documento .1`.
pub fn duplicate_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\.\d+$").expect("duplicate suffix regex"))
}
