//! Batch runs and report rendering.

use crate::models::{DiagnosticReport, DiagnosticResult, TableName};
use crate::prober::TableProber;
use crate::session::TableStore;
use futures::stream::{self, StreamExt};

/// Runs the prober over an ordered list of tables and renders the outcome.
pub struct BatchReporter<'a, S: TableStore + ?Sized> {
    prober: TableProber<'a, S>,
    concurrency: usize,
}

impl<'a, S: TableStore + ?Sized> BatchReporter<'a, S> {
    /// Creates a sequential reporter.
    ///
    /// # Arguments
    ///
    /// * `prober` - Prober shared by every table in the batch.
    pub fn new(prober: TableProber<'a, S>) -> Self {
        Self {
            prober,
            concurrency: 1,
        }
    }

    /// Probes up to `concurrency` tables at once. Output order is unaffected.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// One entry per input table, in input order.
    pub async fn run(&self, tables: &[TableName]) -> DiagnosticReport {
        let total = tables.len();
        tracing::info!(
            "Probing {} table(s) with concurrency {}",
            total,
            self.concurrency
        );

        let entries: Vec<(TableName, DiagnosticResult)> = stream::iter(tables.iter().enumerate())
            .map(|(idx, table)| async move {
                tracing::debug!("[{}/{}] {}", idx + 1, total, table);
                let result = self.prober.probe(table).await;
                (table.clone(), result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        DiagnosticReport { entries }
    }
}

/// One line per table: name, row count or first error, columns when verbose.
pub fn render_text(report: &DiagnosticReport, verbose: bool) -> String {
    let width = report
        .tables()
        .map(|t| t.as_str().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (table, result) in &report.entries {
        out.push_str(&render_line(table, result, width, verbose));
        out.push('\n');
    }
    out
}

fn render_line(table: &TableName, result: &DiagnosticResult, width: usize, verbose: bool) -> String {
    let status = match (result.row_count, result.first_error()) {
        (Some(count), _) => format!("rows={}", count),
        (None, Some(err)) => format!("ERROR: {}", err.message),
        (None, None) => "rows=unknown".to_string(),
    };

    let mut line = format!("{:<width$}  {}", table.as_str(), status, width = width);
    if verbose {
        let columns = match &result.columns {
            Some(columns) => columns.iter().cloned().collect::<Vec<_>>().join(", "),
            None => "unknown".to_string(),
        };
        line.push_str(&format!("  columns=[{}]", columns));
        if let Some(strategy) = result.strategy_used {
            line.push_str(&format!("  via={}", strategy));
        }
        if result.errors.len() > 1 || (result.row_count.is_some() && result.has_errors()) {
            line.push_str(&format!("  errors={}", result.errors.len()));
        }
    }
    line
}

/// Closing line printed after the table lines.
pub fn render_summary(report: &DiagnosticReport) -> String {
    format!(
        "{} table(s) probed, {} with errors",
        report.len(),
        report.tables_with_errors()
    )
}

/// Sample rows and every recorded error, grouped per table.
pub fn render_details(report: &DiagnosticReport) -> String {
    let mut out = String::new();
    for (table, result) in &report.entries {
        if result.sample_rows.as_ref().map_or(true, Vec::is_empty) && result.errors.is_empty() {
            continue;
        }
        out.push_str(&format!("== {}\n", table));
        for row in result.sample_rows.iter().flatten() {
            out.push_str(&format!(
                "  row: {}\n",
                serde_json::Value::Object(row.clone())
            ));
        }
        for err in &result.errors {
            out.push_str(&format!("  error: {}\n", err));
        }
    }
    out
}

/// Serializes the whole report.
///
/// # Arguments
///
/// * `report` - Report produced by `BatchReporter::run`.
///
/// # Returns
///
/// * `Result<String, serde_json::Error>` - Pretty-printed JSON whose `entries`
///   are `[table, result]` pairs in request order.
pub fn render_json(report: &DiagnosticReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
