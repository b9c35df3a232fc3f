// 🏷️ Lookup tables - account configuration and unit renames
// Loaded once per run, never mutated; first matching row wins.

use crate::normalizer::LedgerEntry;
use crate::patterns;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

// ============================================================================
// RECORDS
// ============================================================================

/// One row of the accounts configuration table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountConfigEntry {
    #[serde(rename = "ContaContabil", alias = "AccountCode", default)]
    pub account_code: String,

    #[serde(rename = "ContaContabilNormalizado", alias = "NormalizedAccountCode", default)]
    pub normalized_code: String,

    #[serde(rename = "ContaContabilDescritivo", alias = "AccountLabel", default)]
    pub account_label: String,

    #[serde(rename = "ContaContabilGrupo", alias = "AccountGroup", default)]
    pub account_group: String,

    #[serde(rename = "ContaContabilGrupoDescritivo", alias = "AccountGroupLabel", default)]
    pub account_group_label: String,

    #[serde(rename = "Natureza", alias = "Nature", default)]
    pub nature: String,

    #[serde(rename = "NaturezaDescritivo", alias = "NatureLabel", default)]
    pub nature_label: String,

    #[serde(rename = "CompoeTaxa", alias = "ChargesFee", default)]
    pub charges_fee: String,

    #[serde(rename = "AcordadoAssembleia", alias = "AssemblyAgreed", default)]
    pub assembly_agreed: String,
}

impl AccountConfigEntry {
    /// Key match on either the raw or the normalized code
    pub fn matches(&self, code: &str) -> bool {
        !code.is_empty() && (self.account_code == code || self.normalized_code == code)
    }
}

/// One row of the unit rename table: the canonical participant name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitRenameRule {
    #[serde(rename = "Participante", alias = "Counterparty", default)]
    pub canonical: String,
}

/// Attributes the accounts table can contribute to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountAttribute {
    NormalizedCode,
    AccountLabel,
    AccountGroup,
    AccountGroupLabel,
    Nature,
    NatureLabel,
    ChargesFee,
    AssemblyAgreed,
}

impl AccountAttribute {
    fn value<'a>(&self, entry: &'a AccountConfigEntry) -> &'a str {
        match self {
            AccountAttribute::NormalizedCode => &entry.normalized_code,
            AccountAttribute::AccountLabel => &entry.account_label,
            AccountAttribute::AccountGroup => &entry.account_group,
            AccountAttribute::AccountGroupLabel => &entry.account_group_label,
            AccountAttribute::Nature => &entry.nature,
            AccountAttribute::NatureLabel => &entry.nature_label,
            AccountAttribute::ChargesFee => &entry.charges_fee,
            AccountAttribute::AssemblyAgreed => &entry.assembly_agreed,
        }
    }
}

/// Enrichment columns appended to an entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub period_of_accounting: String,
    pub account_group: String,
    pub account_group_label: String,
    pub nature: String,
    pub nature_label: String,
    pub charges_fee: String,
    pub assembly_agreed: String,
}

// ============================================================================
// TABLES
// ============================================================================

fn read_csv_records<T, R>(reader: R) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for (line_num, result) in rdr.deserialize().enumerate() {
        let record: T = result
            .with_context(|| format!("Failed to parse lookup CSV line {}", line_num + 2))?;
        records.push(record);
    }
    Ok(records)
}

/// Accounts configuration, in file order
#[derive(Debug, Clone, Default)]
pub struct AccountsConfiguration {
    entries: Vec<AccountConfigEntry>,
}

impl AccountsConfiguration {
    pub fn from_entries(entries: Vec<AccountConfigEntry>) -> Self {
        AccountsConfiguration { entries }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(AccountsConfiguration::from_entries(read_csv_records(reader)?))
    }

    /// Load from a CSV file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).with_context(|| {
            format!("Failed to open accounts configuration: {:?}", path.as_ref())
        })?;
        AccountsConfiguration::from_reader(file)
            .with_context(|| format!("Failed to load accounts configuration: {:?}", path.as_ref()))
    }

    /// First row whose raw or normalized code equals `code`.
    ///
    /// Input order decides ties; a later, more specific row never wins.
    pub fn first_match(&self, code: &str) -> Option<&AccountConfigEntry> {
        self.entries.iter().find(|entry| entry.matches(code))
    }

    /// Attribute of the first matching row, or "" when nothing matches.
    pub fn attribute(&self, code: &str, attribute: AccountAttribute) -> String {
        self.first_match(code)
            .map(|entry| attribute.value(entry).to_string())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Unit rename rules, in file order
#[derive(Debug, Clone, Default)]
pub struct UnitRenames {
    rules: Vec<UnitRenameRule>,
}

impl UnitRenames {
    pub fn from_rules(rules: Vec<UnitRenameRule>) -> Self {
        UnitRenames { rules }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(UnitRenames::from_rules(read_csv_records(reader)?))
    }

    /// Load from a CSV file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())
            .with_context(|| format!("Failed to open unit rename list: {:?}", path.as_ref()))?;
        UnitRenames::from_reader(file)
            .with_context(|| format!("Failed to load unit rename list: {:?}", path.as_ref()))
    }

    /// Canonical name for a participant.
    ///
    /// Empty participants and participants with no matching rule keep their
    /// original text.
    pub fn rename(&self, participant: &str) -> String {
        if participant.is_empty() {
            return String::new();
        }
        let key = unit_match_key(participant);
        self.rules
            .iter()
            .find(|rule| rule.canonical.contains(key))
            .map(|rule| rule.canonical.clone())
            .unwrap_or_else(|| participant.to_string())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Match key for a participant: the unit id of a legacy `Un. ` name, or the
/// participant itself.
pub fn unit_match_key(participant: &str) -> &str {
    patterns::legacy_unit()
        .captures(participant)
        .and_then(|caps| caps.get(1))
        .map_or(participant, |unit| unit.as_str())
}

/// Accounting period carried by a page file name (`page_<n>_<yyyy-mm>.<ext>`).
pub fn accounting_period(source_file: &str) -> String {
    let file_name = Path::new(source_file)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(source_file);

    patterns::page_file()
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|period| period.as_str().to_string())
        .unwrap_or_default()
}

// ============================================================================
// LOOKUP TABLES
// ============================================================================

/// Every lookup table of a run. Immutable, shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub accounts: Option<AccountsConfiguration>,
    pub units: Option<UnitRenames>,
}

impl LookupTables {
    pub fn new(accounts: Option<AccountsConfiguration>, units: Option<UnitRenames>) -> Self {
        LookupTables { accounts, units }
    }

    /// Load whichever tables have a path.
    pub fn load(accounts: Option<&Path>, units: Option<&Path>) -> Result<Self> {
        let accounts = accounts.map(AccountsConfiguration::from_file).transpose()?;
        let units = units.map(UnitRenames::from_file).transpose()?;
        Ok(LookupTables { accounts, units })
    }

    /// True when entries gain the enrichment columns
    pub fn has_accounts(&self) -> bool {
        self.accounts.is_some()
    }

    /// Apply participant renaming and account enrichment.
    ///
    /// The account code and label are replaced only by non-empty configured
    /// values of a matching row. Without a match the parsed code and label
    /// stay as they were instead of being blanked.
    pub fn enrich(&self, mut entry: LedgerEntry) -> LedgerEntry {
        if let Some(units) = &self.units {
            entry.counterparty = units.rename(&entry.counterparty);
        }

        if let Some(accounts) = &self.accounts {
            let code = entry.account_code_str().to_string();

            let normalized = accounts.attribute(&code, AccountAttribute::NormalizedCode);
            if !normalized.is_empty() {
                entry.account_code = Some(normalized);
            }
            let label = accounts.attribute(&code, AccountAttribute::AccountLabel);
            if !label.is_empty() {
                entry.account_label = Some(label);
            }

            entry.enrichment = Some(Enrichment {
                period_of_accounting: accounting_period(&entry.source_file),
                account_group: accounts.attribute(&code, AccountAttribute::AccountGroup),
                account_group_label: accounts.attribute(&code, AccountAttribute::AccountGroupLabel),
                nature: accounts.attribute(&code, AccountAttribute::Nature),
                nature_label: accounts.attribute(&code, AccountAttribute::NatureLabel),
                charges_fee: accounts.attribute(&code, AccountAttribute::ChargesFee),
                assembly_agreed: accounts.attribute(&code, AccountAttribute::AssemblyAgreed),
            });
        }

        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    const ACCOUNTS_CSV: &str = "\
Natureza,CompoeTaxa,AcordadoAssembleia,NaturezaDescritivo,ContaContabil,ContaContabilDescritivo,ContaContabilGrupo,ContaContabilGrupoDescritivo,ContaContabilNormalizado
R,True,True,Receita,100,Taxas,G1,Grupo 1,100
D,True,False,Despesa,200,Pessoal,G2,Grupo 2,2.1
D,False,False,Despesa,200,Outro,G9,Grupo 9,2.9
";

    const UNITS_CSV: &str = "\
Participante
Un. R22-888-QD88-LT88
Un. R16-999-QD99-LT99
";

    fn entry(code: Option<&str>, counterparty: &str, source_file: &str) -> LedgerEntry {
        LedgerEntry {
            account_code: code.map(str::to_string),
            account_label: code.map(|_| "Original".to_string()),
            date: NaiveDate::from_ymd_opt(2023, 1, 5).unwrap(),
            description: "Taxa".to_string(),
            counterparty: counterparty.to_string(),
            document: String::new(),
            period: String::new(),
            amount: None,
            source_file: source_file.to_string(),
            ordinal: 0,
            enrichment: None,
        }
    }

    #[test]
    fn test_accounts_from_reader() {
        let accounts = AccountsConfiguration::from_reader(ACCOUNTS_CSV.as_bytes()).unwrap();
        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts.first_match("100").unwrap().nature, "R");
    }

    #[test]
    fn test_first_match_wins() {
        let accounts = AccountsConfiguration::from_reader(ACCOUNTS_CSV.as_bytes()).unwrap();
        assert_eq!(accounts.attribute("200", AccountAttribute::AccountGroup), "G2");
        assert_eq!(accounts.attribute("200", AccountAttribute::AccountLabel), "Pessoal");
        assert_eq!(accounts.attribute("200", AccountAttribute::NormalizedCode), "2.1");
        assert_eq!(accounts.attribute("999", AccountAttribute::NormalizedCode), "");
    }

    #[test]
    fn test_match_on_normalized_code() {
        let accounts = AccountsConfiguration::from_reader(ACCOUNTS_CSV.as_bytes()).unwrap();
        assert_eq!(accounts.attribute("2.9", AccountAttribute::AccountGroup), "G9");
    }

    #[test]
    fn test_no_match_is_empty_string() {
        let accounts = AccountsConfiguration::from_reader(ACCOUNTS_CSV.as_bytes()).unwrap();
        assert_eq!(accounts.attribute("999", AccountAttribute::Nature), "");
        assert_eq!(accounts.attribute("", AccountAttribute::Nature), "");
    }

    #[test]
    fn test_english_headers_accepted() {
        let csv = "AccountCode,AccountGroup\n1.2,G1\n";
        let accounts = AccountsConfiguration::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(accounts.attribute("1.2", AccountAttribute::AccountGroup), "G1");
        assert_eq!(accounts.attribute("1.2", AccountAttribute::Nature), "");
    }

    #[test]
    fn test_unit_match_key() {
        assert_eq!(unit_match_key("Un. 888-QD88-LT88"), "888-QD88-LT88");
        assert_eq!(unit_match_key("JOSÉ DA SILVA"), "JOSÉ DA SILVA");
    }

    #[test]
    fn test_rename_legacy_unit() {
        let units = UnitRenames::from_reader(UNITS_CSV.as_bytes()).unwrap();
        assert_eq!(units.rename("Un. 888-QD88-LT88"), "Un. R22-888-QD88-LT88");
        assert_eq!(units.rename("Un. 999-QD99-LT99"), "Un. R16-999-QD99-LT99");
    }

    #[test]
    fn test_rename_passes_through_unknown_and_empty() {
        let units = UnitRenames::from_reader(UNITS_CSV.as_bytes()).unwrap();
        assert_eq!(units.rename("Un. 111-QD11-LT11"), "Un. 111-QD11-LT11");
        assert_eq!(units.rename("CEMIG"), "CEMIG");
        assert_eq!(units.rename(""), "");
    }

    #[test]
    fn test_accounting_period() {
        assert_eq!(accounting_period("page_99_2023-01.csv"), "2023-01");
        assert_eq!(accounting_period("/tmp/out/page_3_2024-12.txt"), "2024-12");
        assert_eq!(accounting_period("statement.txt"), "");
    }

    #[test]
    fn test_enrich_with_all_tables() {
        let tables = LookupTables::new(
            Some(AccountsConfiguration::from_reader(ACCOUNTS_CSV.as_bytes()).unwrap()),
            Some(UnitRenames::from_reader(UNITS_CSV.as_bytes()).unwrap()),
        );

        let enriched = tables.enrich(entry(Some("200"), "Un. 888-QD88-LT88", "page_99_2023-01.txt"));

        assert_eq!(enriched.counterparty, "Un. R22-888-QD88-LT88");
        assert_eq!(enriched.account_code.as_deref(), Some("2.1"));
        assert_eq!(enriched.account_label.as_deref(), Some("Pessoal"));
        let extra = enriched.enrichment.unwrap();
        assert_eq!(extra.period_of_accounting, "2023-01");
        assert_eq!(extra.account_group, "G2");
        assert_eq!(extra.nature_label, "Despesa");
        assert_eq!(extra.assembly_agreed, "False");
    }

    #[test]
    fn test_enrich_unmatched_account_keeps_code() {
        let tables = LookupTables::new(
            Some(AccountsConfiguration::from_reader(ACCOUNTS_CSV.as_bytes()).unwrap()),
            None,
        );

        let enriched = tables.enrich(entry(Some("7.7"), "CEMIG", "p.txt"));

        assert_eq!(enriched.account_code.as_deref(), Some("7.7"));
        assert_eq!(enriched.account_label.as_deref(), Some("Original"));
        assert_eq!(enriched.enrichment.unwrap(), Enrichment::default());
    }

    #[test]
    fn test_enrich_twice_is_stable() {
        let tables = LookupTables::new(
            Some(AccountsConfiguration::from_reader(ACCOUNTS_CSV.as_bytes()).unwrap()),
            Some(UnitRenames::from_reader(UNITS_CSV.as_bytes()).unwrap()),
        );

        let once = tables.enrich(entry(Some("200"), "Un. 888-QD88-LT88", "page_99_2023-01.txt"));
        let twice = tables.enrich(once.clone());

        assert_eq!(twice, once);
    }

    #[test]
    fn test_enrich_without_tables_is_identity() {
        let tables = LookupTables::default();
        let original = entry(Some("100"), "Un. 888-QD88-LT88", "p.txt");
        assert_eq!(tables.enrich(original.clone()), original);
        assert!(!tables.has_accounts());
    }

    #[test]
    fn test_load_from_files() {
        let mut accounts = tempfile::NamedTempFile::new().unwrap();
        accounts.write_all(ACCOUNTS_CSV.as_bytes()).unwrap();
        let mut units = tempfile::NamedTempFile::new().unwrap();
        units.write_all(UNITS_CSV.as_bytes()).unwrap();

        let tables = LookupTables::load(Some(accounts.path()), Some(units.path())).unwrap();

        assert_eq!(tables.accounts.as_ref().unwrap().len(), 3);
        assert_eq!(tables.units.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = LookupTables::load(Some(Path::new("/nonexistent/accounts.csv")), None);
        assert!(result.is_err());
    }
}
