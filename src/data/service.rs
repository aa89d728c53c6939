//! Capability interface to the external tabular data service.
//!
//! Every read and write the core performs goes through [`DataService`]. Rows
//! travel as JSON objects so the same record types decode from either backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// One row of a table, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Row predicate understood by every backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq(String, Value),
    /// `column IN (values)`; an empty list matches nothing.
    In(String, Vec<Value>),
    /// Case-insensitive substring match on a text column.
    ILike(String, String),
    /// `column IS NULL`; rows missing the column also match.
    IsNull(String),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_owned(), value.into())
    }

    pub fn any_of<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(
            column.to_owned(),
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn contains(column: &str, needle: &str) -> Self {
        Filter::ILike(column.to_owned(), needle.to_owned())
    }

    pub fn is_null(column: &str) -> Self {
        Filter::IsNull(column.to_owned())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::In(c, _) | Filter::ILike(c, _) | Filter::IsNull(c) => c,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("data service unavailable: {0}")]
    Unavailable(String),
    #[error("data service did not answer within {0:?}")]
    Timeout(Duration),
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
    #[error("failed to decode row from {table}")]
    Decode {
        table: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Generic remote tabular data service.
#[async_trait]
pub trait DataService: Send + Sync + 'static {
    /// Read rows matching every filter. An empty `columns` slice selects all columns.
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[Filter],
    ) -> Result<Vec<Row>, DataError>;

    async fn insert(&self, table: &str, row: Row) -> Result<(), DataError>;

    /// Apply `patch` to every row matching the filters, returning the number of rows changed.
    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> Result<u64, DataError>;

    /// Insert `row`, or replace the non-key columns of the row whose
    /// `conflict_key` columns are equal. Atomic with respect to other writers.
    async fn upsert(&self, table: &str, row: Row, conflict_key: &[&str]) -> Result<(), DataError>;

    /// Insert `row` unless a row with equal `conflict_key` columns exists.
    /// Returns whether the row was inserted. The check and the write are one
    /// atomic step.
    async fn insert_if_absent(
        &self,
        table: &str,
        row: Row,
        conflict_key: &[&str],
    ) -> Result<bool, DataError>;
}

#[async_trait]
impl<S: DataService + ?Sized> DataService for Arc<S> {
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[Filter],
    ) -> Result<Vec<Row>, DataError> {
        (**self).select(table, columns, filters).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<(), DataError> {
        (**self).insert(table, row).await
    }

    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> Result<u64, DataError> {
        (**self).update(table, patch, filters).await
    }

    async fn upsert(&self, table: &str, row: Row, conflict_key: &[&str]) -> Result<(), DataError> {
        (**self).upsert(table, row, conflict_key).await
    }

    async fn insert_if_absent(
        &self,
        table: &str,
        row: Row,
        conflict_key: &[&str],
    ) -> Result<bool, DataError> {
        (**self).insert_if_absent(table, row, conflict_key).await
    }
}

/// Decorator bounding every call to the inner service with a deadline.
///
/// A request that exceeds the deadline fails with [`DataError::Timeout`], so a
/// hung backend can never leave a caller waiting indefinitely.
pub struct Deadline<S> {
    inner: S,
    timeout: Duration,
}

impl<S> Deadline<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn run<T>(
        &self,
        fut: impl Future<Output = Result<T, DataError>>,
    ) -> Result<T, DataError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| DataError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl<S: DataService> DataService for Deadline<S> {
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[Filter],
    ) -> Result<Vec<Row>, DataError> {
        self.run(self.inner.select(table, columns, filters)).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<(), DataError> {
        self.run(self.inner.insert(table, row)).await
    }

    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> Result<u64, DataError> {
        self.run(self.inner.update(table, patch, filters)).await
    }

    async fn upsert(&self, table: &str, row: Row, conflict_key: &[&str]) -> Result<(), DataError> {
        self.run(self.inner.upsert(table, row, conflict_key)).await
    }

    async fn insert_if_absent(
        &self,
        table: &str,
        row: Row,
        conflict_key: &[&str],
    ) -> Result<bool, DataError> {
        self.run(self.inner.insert_if_absent(table, row, conflict_key))
            .await
    }
}

/// Decode raw rows into a typed record.
pub fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Row>) -> Result<Vec<T>, DataError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(Value::Object(row)).map_err(|source| DataError::Decode {
                table: table.to_owned(),
                source,
            })
        })
        .collect()
}

/// Encode a record as a row. Records must serialize to JSON objects.
pub fn encode_row<T: Serialize>(table: &str, value: &T) -> Result<Row, DataError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(DataError::Decode {
            table: table.to_owned(),
            source: serde::de::Error::custom(format!("expected an object, got {other}")),
        }),
        Err(source) => Err(DataError::Decode {
            table: table.to_owned(),
            source,
        }),
    }
}
