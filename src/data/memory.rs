//! In-process implementation of [`DataService`].
//!
//! Used for local development when no `DATABASE_URL` is configured, and as the
//! backend for tests. Writes hold a single lock so upserts are atomic.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::service::{DataError, DataService, Filter, Row};

#[derive(Default)]
struct Table {
    rows: Vec<Row>,
    next_id: i64,
}

impl Table {
    /// Assign an `id` when the caller did not supply one, mirroring a serial key.
    fn assign_id(&mut self, row: &mut Row) {
        match row.get("id") {
            Some(id) => {
                if let Some(id) = id.as_i64() {
                    self.next_id = self.next_id.max(id);
                }
            }
            None => {
                self.next_id += 1;
                row.insert("id".to_owned(), Value::from(self.next_id));
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryService {
    tables: RwLock<HashMap<String, Table>>,
    failing: RwLock<HashSet<String>>,
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `table` fail until [`Self::recover`] is called.
    pub async fn fail_table(&self, table: &str) {
        self.failing.write().await.insert(table.to_owned());
    }

    pub async fn recover(&self, table: &str) {
        self.failing.write().await.remove(table);
    }

    /// Number of rows currently stored in `table`.
    pub async fn len(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    async fn check(&self, table: &str) -> Result<(), DataError> {
        if self.failing.read().await.contains(table) {
            return Err(DataError::Unavailable(format!("table {table} is unreachable")));
        }
        Ok(())
    }
}

fn matches(row: &Row, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, value) => row.get(column) == Some(value),
        Filter::In(column, values) => row.get(column).is_some_and(|v| values.contains(v)),
        Filter::ILike(column, needle) => row
            .get(column)
            .and_then(Value::as_str)
            .is_some_and(|text| text.to_lowercase().contains(&needle.to_lowercase())),
        Filter::IsNull(column) => row.get(column).is_none_or(Value::is_null),
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches(row, f))
}

/// Equality filters on the `conflict_key` columns of `row`.
fn key_filters(row: &Row, conflict_key: &[&str]) -> Vec<Filter> {
    conflict_key
        .iter()
        .map(|c| Filter::Eq((*c).to_owned(), row.get(*c).cloned().unwrap_or(Value::Null)))
        .collect()
}

fn project(row: &Row, columns: &[&str]) -> Row {
    if columns.is_empty() {
        return row.clone();
    }
    columns
        .iter()
        .filter_map(|c| row.get(*c).map(|v| ((*c).to_owned(), v.clone())))
        .collect()
}

#[async_trait]
impl DataService for MemoryService {
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[Filter],
    ) -> Result<Vec<Row>, DataError> {
        self.check(table).await?;
        let tables = self.tables.read().await;
        let Some(t) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(t.rows
            .iter()
            .filter(|row| matches_all(row, filters))
            .map(|row| project(row, columns))
            .collect())
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<(), DataError> {
        self.check(table).await?;
        let mut tables = self.tables.write().await;
        let t = tables.entry(table.to_owned()).or_default();
        t.assign_id(&mut row);
        t.rows.push(row);
        Ok(())
    }

    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> Result<u64, DataError> {
        self.check(table).await?;
        let mut tables = self.tables.write().await;
        let Some(t) = tables.get_mut(table) else {
            return Ok(0);
        };
        let mut changed = 0;
        for row in t.rows.iter_mut().filter(|row| matches_all(row, filters)) {
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            changed += 1;
        }
        Ok(changed)
    }

    async fn upsert(&self, table: &str, mut row: Row, conflict_key: &[&str]) -> Result<(), DataError> {
        self.check(table).await?;
        let key = key_filters(&row, conflict_key);

        let mut tables = self.tables.write().await;
        let t = tables.entry(table.to_owned()).or_default();
        match t.rows.iter_mut().find(|existing| matches_all(existing, &key)) {
            Some(existing) => {
                for (column, value) in row {
                    existing.insert(column, value);
                }
            }
            None => {
                t.assign_id(&mut row);
                t.rows.push(row);
            }
        }
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        table: &str,
        mut row: Row,
        conflict_key: &[&str],
    ) -> Result<bool, DataError> {
        self.check(table).await?;
        let key = key_filters(&row, conflict_key);

        let mut tables = self.tables.write().await;
        let t = tables.entry(table.to_owned()).or_default();
        if t.rows.iter().any(|existing| matches_all(existing, &key)) {
            return Ok(false);
        }
        t.assign_id(&mut row);
        t.rows.push(row);
        Ok(true)
    }
}
