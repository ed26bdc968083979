use crate::errors::{ErrorKind, ProbeError};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// One row returned by the store.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Name of a logical table in the remote store. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Result<Self, ProbeError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ProbeError::Configuration(
                "table name cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds names from raw input, skipping blank entries with a warning.
    ///
    /// # Arguments
    ///
    /// * `raw` - Table names as given on the command line or in config.
    ///
    /// # Returns
    ///
    /// * `Vec<TableName>` - The non-blank names, in input order.
    pub fn parse_list<I, T>(raw: I) -> Vec<TableName>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        raw.into_iter()
            .enumerate()
            .filter_map(|(idx, name)| match TableName::new(name) {
                Ok(table) => Some(table),
                Err(e) => {
                    tracing::warn!("Skipping table argument #{}: {}", idx + 1, e);
                    None
                }
            })
            .collect()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for TableName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Techniques for extracting information about a table, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ProbeStrategy {
    /// Fetch a few rows and read the keys of the first one.
    SampleSelect,
    /// Ask for an exact row count without payloads.
    CountOnly,
    /// Send a placeholder row the backend must reject, then read the rejection.
    InsertProbe,
}

impl ProbeStrategy {
    pub const DEFAULT_ORDER: [ProbeStrategy; 3] = [
        ProbeStrategy::SampleSelect,
        ProbeStrategy::CountOnly,
        ProbeStrategy::InsertProbe,
    ];

    pub fn is_destructive(self) -> bool {
        matches!(self, ProbeStrategy::InsertProbe)
    }
}

impl fmt::Display for ProbeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeStrategy::SampleSelect => "SampleSelect",
            ProbeStrategy::CountOnly => "CountOnly",
            ProbeStrategy::InsertProbe => "InsertProbe",
        };
        f.write_str(name)
    }
}

/// A single failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyError {
    pub strategy: ProbeStrategy,
    pub kind: ErrorKind,
    pub message: String,
}

impl StrategyError {
    pub fn new(strategy: ProbeStrategy, err: &ProbeError) -> Self {
        Self {
            strategy,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for StrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.strategy, self.kind, self.message)
    }
}

/// Everything learned about one table during a single probe pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticResult {
    pub table_exists: bool,
    pub row_count: Option<u64>,
    pub columns: Option<BTreeSet<String>>,
    pub sample_rows: Option<Vec<Record>>,
    pub errors: Vec<StrategyError>,
    pub strategy_used: Option<ProbeStrategy>,
}

impl DiagnosticResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn first_error(&self) -> Option<&StrategyError> {
        self.errors.first()
    }

    pub fn errors_of_kind(&self, kind: ErrorKind) -> impl Iterator<Item = &StrategyError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    pub(crate) fn record_error(&mut self, strategy: ProbeStrategy, err: &ProbeError) {
        self.errors.push(StrategyError::new(strategy, err));
    }

    /// Sets `columns` unless an earlier strategy already did. Returns whether
    /// the offer was taken.
    ///
    /// Until columns are known, `strategy_used` only credits whoever proved
    /// the table exists, so the strategy that found columns takes over.
    pub(crate) fn offer_columns(
        &mut self,
        strategy: ProbeStrategy,
        columns: BTreeSet<String>,
    ) -> bool {
        if columns.is_empty() || self.columns.is_some() {
            return false;
        }
        self.columns = Some(columns);
        self.strategy_used = Some(strategy);
        true
    }

    /// Marks the table as existing, crediting `strategy` when nothing else has.
    pub(crate) fn confirm_exists(&mut self, strategy: ProbeStrategy) {
        self.table_exists = true;
        if self.strategy_used.is_none() {
            self.strategy_used = Some(strategy);
        }
    }
}

/// Keys of a row as a column set.
pub fn columns_of(record: &Record) -> BTreeSet<String> {
    record.keys().cloned().collect()
}

/// One entry per requested table, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub entries: Vec<(TableName, DiagnosticResult)>,
}

impl DiagnosticReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, table: &str) -> Option<&DiagnosticResult> {
        self.entries
            .iter()
            .find(|(name, _)| name.as_str() == table)
            .map(|(_, result)| result)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableName> {
        self.entries.iter().map(|(name, _)| name)
    }

    pub fn tables_with_errors(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.has_errors()).count()
    }
}
