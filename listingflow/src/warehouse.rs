//! Bulk-loading cleaned CSV artifacts into the warehouse.
//!
//! The pipeline consumes exactly one warehouse operation: copy the object at
//! a bucket/key into a schema-qualified table, optionally skipping the CSV
//! header row. [`RedshiftWarehouse`] renders that as a `COPY` statement over
//! the Postgres wire protocol; [`MemoryWarehouse`] backs the tests.

use crate::errors::PipelineError;
use crate::config::WarehouseConfig;
use crate::storage::{get_bytes, StoreSet};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Options for the bulk copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Treat the first CSV row as a header and skip it.
    pub skip_header: bool,
}

/// The warehouse seam: one bulk-copy operation.
#[async_trait]
pub trait Warehouse: Send + Sync + fmt::Debug {
    /// Loads the CSV object at `bucket`/`key` into `schema`.`table`,
    /// returning the number of rows loaded when the backend reports it.
    async fn copy_from_object(
        &self,
        bucket: &str,
        key: &str,
        schema: &str,
        table: &str,
        options: &CopyOptions,
    ) -> Result<u64, PipelineError>;
}

/// Redshift-backed warehouse speaking the Postgres protocol.
#[derive(Debug)]
pub struct RedshiftWarehouse {
    pool: sqlx::PgPool,
    iam_role: Option<String>,
}

impl RedshiftWarehouse {
    /// Connects to the configured cluster.
    pub async fn connect(config: &WarehouseConfig) -> Result<Self, PipelineError> {
        let pool = sqlx::PgPool::connect(&config.connection_url)
            .await
            .map_err(|e| PipelineError::warehouse(format!("connect failed: {e}")))?;
        info!(schema = %config.schema, table = %config.table, "warehouse connected");
        Ok(Self {
            pool,
            iam_role: config.iam_role.clone(),
        })
    }
}

fn copy_statement(
    bucket: &str,
    key: &str,
    schema: &str,
    table: &str,
    options: &CopyOptions,
    iam_role: Option<&str>,
) -> String {
    let mut statement = format!("COPY \"{schema}\".\"{table}\" FROM 's3://{bucket}/{key}'");
    if let Some(role) = iam_role {
        statement.push_str(&format!(" IAM_ROLE '{role}'"));
    }
    statement.push_str(" CSV");
    if options.skip_header {
        statement.push_str(" IGNOREHEADER 1");
    }
    statement
}

#[async_trait]
impl Warehouse for RedshiftWarehouse {
    async fn copy_from_object(
        &self,
        bucket: &str,
        key: &str,
        schema: &str,
        table: &str,
        options: &CopyOptions,
    ) -> Result<u64, PipelineError> {
        let statement = copy_statement(bucket, key, schema, table, options, self.iam_role.as_deref());
        info!(bucket, key, schema, table, "issuing bulk copy");

        let result = sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .map_err(|e| PipelineError::warehouse(format!("COPY rejected: {e}")))?;
        Ok(result.rows_affected())
    }
}

/// In-memory warehouse for tests: tables of string rows, loaded by reading
/// the CSV object back out of the store registry.
#[derive(Debug)]
pub struct MemoryWarehouse {
    stores: Arc<StoreSet>,
    tables: Mutex<HashMap<String, Vec<Vec<String>>>>,
}

impl MemoryWarehouse {
    /// Creates a warehouse reading objects from the given registry.
    #[must_use]
    pub fn new(stores: Arc<StoreSet>) -> Self {
        Self {
            stores,
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the rows loaded into a table so far.
    #[must_use]
    pub fn rows(&self, schema: &str, table: &str) -> Vec<Vec<String>> {
        self.tables
            .lock()
            .get(&format!("{schema}.{table}"))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn copy_from_object(
        &self,
        bucket: &str,
        key: &str,
        schema: &str,
        table: &str,
        options: &CopyOptions,
    ) -> Result<u64, PipelineError> {
        let store = self.stores.resolve(bucket)?;
        let payload = get_bytes(store.as_ref(), key).await?;
        let text = String::from_utf8(payload.to_vec())
            .map_err(|e| PipelineError::warehouse(format!("object is not UTF-8 text: {e}")))?;

        let mut rows = parse_csv(&text);
        if options.skip_header && !rows.is_empty() {
            rows.remove(0);
        }
        let loaded = rows.len() as u64;

        self.tables
            .lock()
            .entry(format!("{schema}.{table}"))
            .or_default()
            .extend(rows);
        Ok(loaded)
    }
}

// Minimal CSV reader: quoted fields, doubled quotes, CRLF tolerant.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => row.push(std::mem::take(&mut field)),
                '\r' => {}
                '\n' => {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                _ => field.push(c),
            }
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}
