//! Per-table probing.
//!
//! The prober walks an ordered list of [`ProbeStrategy`] values. Before each
//! attempt the strategy is asked whether it applies to what has been learned
//! so far, so adding a strategy means adding a variant and its gate, not
//! rewriting the loop.

use crate::errors::ProbeError;
use crate::models::{columns_of, DiagnosticResult, ProbeStrategy, Record, TableName};
use crate::postgrest::{classify_failure, harvest_columns, PostgrestErrorBody, SENTINEL_FIELD};
use crate::session::{InsertOutcome, Rejection, TableStore};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Instant;

/// Decision taken before an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Run,
    Skip,
    Stop,
}

#[derive(Debug, Clone)]
pub struct ProberOptions {
    pub sample_limit: usize,
    pub insert_probe: bool,
    pub strategies: Vec<ProbeStrategy>,
}

impl Default for ProberOptions {
    fn default() -> Self {
        Self {
            sample_limit: crate::config::DEFAULT_SAMPLE_LIMIT,
            insert_probe: true,
            strategies: ProbeStrategy::DEFAULT_ORDER.to_vec(),
        }
    }
}

pub struct TableProber<'a, S: TableStore + ?Sized> {
    store: &'a S,
    options: ProberOptions,
}

impl<'a, S: TableStore + ?Sized> TableProber<'a, S> {
    pub fn new(store: &'a S, options: ProberOptions) -> Self {
        Self { store, options }
    }

    /// Probes one table. Never fails: every backend error lands in `errors`.
    pub async fn probe(&self, table: &TableName) -> DiagnosticResult {
        let started = Instant::now();
        let mut result = DiagnosticResult::default();

        for &strategy in &self.options.strategies {
            match self.gate(strategy, &result) {
                Gate::Run => {}
                Gate::Skip => {
                    tracing::debug!("{}: skipping {}", table, strategy);
                    continue;
                }
                Gate::Stop => {
                    tracing::debug!("{}: stopping before {}", table, strategy);
                    break;
                }
            }

            if strategy.is_destructive() {
                tracing::info!("{}: no columns yet, falling back to {}", table, strategy);
            }
            match strategy {
                ProbeStrategy::SampleSelect => self.sample_select(table, &mut result).await,
                ProbeStrategy::CountOnly => self.count_only(table, &mut result).await,
                ProbeStrategy::InsertProbe => self.insert_probe(table, &mut result).await,
            }
        }

        tracing::info!(
            table = %table,
            exists = result.table_exists,
            rows = ?result.row_count,
            errors = result.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "probe finished"
        );
        result
    }

    fn gate(&self, strategy: ProbeStrategy, result: &DiagnosticResult) -> Gate {
        match strategy {
            ProbeStrategy::SampleSelect | ProbeStrategy::CountOnly => Gate::Run,
            ProbeStrategy::InsertProbe => {
                if result.columns.is_some() {
                    // A non-destructive strategy already answered
                    Gate::Skip
                } else if !result.table_exists {
                    Gate::Stop
                } else if !self.options.insert_probe || !is_known_empty(result) {
                    // Only an empty sample, uncontradicted by the count, justifies a write
                    Gate::Skip
                } else {
                    Gate::Run
                }
            }
        }
    }

    async fn sample_select(&self, table: &TableName, result: &mut DiagnosticResult) {
        let strategy = ProbeStrategy::SampleSelect;
        match self
            .store
            .select_sample(table, self.options.sample_limit)
            .await
        {
            Ok(rows) => {
                result.confirm_exists(strategy);
                if let Some(first) = rows.first() {
                    result.offer_columns(strategy, columns_of(first));
                } else {
                    tracing::info!("{}: table is empty, columns cannot be inferred from rows", table);
                }
                result.sample_rows = Some(rows);
            }
            Err(e) => {
                tracing::warn!("{}: {} failed: {}", table, strategy, e);
                result.record_error(strategy, &e);
            }
        }
    }

    async fn count_only(&self, table: &TableName, result: &mut DiagnosticResult) {
        let strategy = ProbeStrategy::CountOnly;
        match self.store.count(table).await {
            Ok(count) => {
                result.confirm_exists(strategy);
                result.row_count = Some(count);
            }
            Err(e) => {
                tracing::warn!("{}: {} failed: {}", table, strategy, e);
                result.record_error(strategy, &e);
            }
        }
    }

    async fn insert_probe(&self, table: &TableName, result: &mut DiagnosticResult) {
        let strategy = ProbeStrategy::InsertProbe;
        match self.store.insert_probe(table, &placeholder()).await {
            Ok(InsertOutcome::Rejected(rejection)) => {
                if let Err(e) = read_rejection(&rejection, result) {
                    tracing::warn!("{}: {}", table, e);
                    result.record_error(strategy, &e);
                }
            }
            Ok(InsertOutcome::Inserted(rows)) => {
                let anomaly = ProbeError::Unknown(format!(
                    "insert probe unexpectedly succeeded ({} row(s) echoed)",
                    rows.len()
                ));
                tracing::warn!("{}: {}", table, anomaly);
                result.record_error(strategy, &anomaly);

                if let Some(first) = rows.first() {
                    result.offer_columns(strategy, columns_of(first));
                }
                self.undo_insert(table, &rows, result).await;
            }
            Err(e) => {
                tracing::warn!("{}: {} failed: {}", table, strategy, e);
                result.record_error(strategy, &e);
            }
        }
    }

    async fn undo_insert(&self, table: &TableName, rows: &[Record], result: &mut DiagnosticResult) {
        let strategy = ProbeStrategy::InsertProbe;
        if rows.is_empty() {
            let err = ProbeError::Unknown(
                "probe row was not echoed back; it must be removed manually".to_string(),
            );
            tracing::error!("{}: {}", table, err);
            result.record_error(strategy, &err);
            return;
        }
        for row in rows {
            let Some(id) = row.get("id").filter(|v| !v.is_null()) else {
                let err = ProbeError::Unknown(
                    "probe row has no id; it must be removed manually".to_string(),
                );
                tracing::error!("{}: {}", table, err);
                result.record_error(strategy, &err);
                continue;
            };

            if let Err(e) = self.store.delete_row(table, "id", id).await {
                tracing::error!("{}: failed to delete probe row id={}: {}", table, id, e);
                result.record_error(
                    strategy,
                    &ProbeError::Unknown(format!("failed to delete probe row id={}: {}", id, e)),
                );
            }
        }
    }
}

/// True when the sample came back empty and the count, if any, agrees.
fn is_known_empty(result: &DiagnosticResult) -> bool {
    result.sample_rows.as_ref().is_some_and(Vec::is_empty)
        && matches!(result.row_count, None | Some(0))
}

/// The single-field record the insert probe sends.
pub fn placeholder() -> Record {
    let mut record = Record::new();
    record.insert(SENTINEL_FIELD.to_string(), Value::Bool(true));
    record
}

/// Applies a rejection to `result`, returning the error to record when the
/// rejection says nothing about columns.
fn read_rejection(rejection: &Rejection, result: &mut DiagnosticResult) -> Result<(), ProbeError> {
    let Some(body) = PostgrestErrorBody::parse(&rejection.body) else {
        return Err(ProbeError::Malformed(format!(
            "unstructured rejection ({}): {}",
            rejection.status,
            rejection.body.trim()
        )));
    };

    let status = StatusCode::from_u16(rejection.status).unwrap_or(StatusCode::BAD_REQUEST);
    let classified = classify_failure(status, &rejection.body);
    if matches!(
        classified,
        ProbeError::NotFound(_) | ProbeError::PermissionDenied(_)
    ) {
        return Err(classified);
    }

    let columns = harvest_columns(&body);
    if columns.is_empty() {
        return Err(ProbeError::Malformed(format!(
            "rejection named no columns: {}",
            body.summary()
        )));
    }
    result.offer_columns(ProbeStrategy::InsertProbe, columns);
    Ok(())
}
