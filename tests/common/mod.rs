//! In-memory `TableStore` shared by the integration and property tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use table_probe::errors::ProbeError;
use table_probe::models::{Record, TableName};
use table_probe::session::{InsertOutcome, Rejection, TableStore};

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub rows: Vec<Record>,
    /// Body returned when the insert probe is rejected.
    pub rejection: Option<String>,
    pub denied: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub tables: HashMap<String, MemoryTable>,
}

impl MemoryStore {
    pub fn with_table(mut self, name: &str, table: MemoryTable) -> Self {
        self.tables.insert(name.to_string(), table);
        self
    }

    fn lookup(&self, table: &TableName) -> Result<&MemoryTable, ProbeError> {
        let found = self.tables.get(table.as_str()).ok_or_else(|| {
            ProbeError::NotFound(format!("relation \"public.{}\" does not exist", table))
        })?;
        if found.denied {
            return Err(ProbeError::PermissionDenied(format!(
                "permission denied for table {}",
                table
            )));
        }
        Ok(found)
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn select_sample(
        &self,
        table: &TableName,
        limit: usize,
    ) -> Result<Vec<Record>, ProbeError> {
        Ok(self.lookup(table)?.rows.iter().take(limit).cloned().collect())
    }

    async fn count(&self, table: &TableName) -> Result<u64, ProbeError> {
        Ok(self.lookup(table)?.rows.len() as u64)
    }

    async fn insert_probe(
        &self,
        table: &TableName,
        _placeholder: &Record,
    ) -> Result<InsertOutcome, ProbeError> {
        let found = self.lookup(table)?;
        Ok(InsertOutcome::Rejected(Rejection {
            status: 400,
            body: found
                .rejection
                .clone()
                .unwrap_or_else(|| "rejected".to_string()),
        }))
    }

    async fn delete_row(
        &self,
        _table: &TableName,
        _column: &str,
        _value: &Value,
    ) -> Result<(), ProbeError> {
        Ok(())
    }
}

pub fn row(value: Value) -> Record {
    value.as_object().cloned().expect("row must be an object")
}

pub fn names(tables: &[&str]) -> Vec<TableName> {
    tables.iter().map(|t| TableName::new(*t).unwrap()).collect()
}
