//! PostgreSQL implementation of [`DataService`].
//!
//! Rows cross the boundary as `jsonb`: reads project `to_jsonb(t)` and writes
//! go through `jsonb_populate_record`, so column types are resolved by the
//! table definition rather than by the caller. Table and column names are
//! interpolated into SQL and are therefore checked against a strict pattern.

use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{ConnectOptions, PgPool};
use tracing::{debug, info, instrument};

use super::service::{DataError, DataService, Filter, Row};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("identifier pattern is valid"));

fn ident(name: &str) -> Result<String, DataError> {
    if IDENTIFIER.is_match(name) {
        Ok(format!("\"{name}\""))
    } else {
        Err(DataError::InvalidIdentifier(name.to_owned()))
    }
}

/// Escape `LIKE` metacharacters so user text only ever matches literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

enum Bind {
    Json(Value),
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Ints(Vec<i64>),
    Texts(Vec<String>),
}

macro_rules! bind_all {
    ($query:expr, $binds:expr) => {{
        let mut query = $query;
        for bind in $binds {
            query = match bind {
                Bind::Json(v) => query.bind(Json(v)),
                Bind::Text(s) => query.bind(s),
                Bind::Int(i) => query.bind(i),
                Bind::Float(f) => query.bind(f),
                Bind::Bool(b) => query.bind(b),
                Bind::Ints(v) => query.bind(v),
                Bind::Texts(v) => query.bind(v),
            };
        }
        query
    }};
}

/// Equality on the column itself so its indexes apply. Text goes through
/// `::text`, a no-op on text columns that also lets uuid keys compare.
fn eq_condition(column: &str, name: &str, value: &Value, n: usize) -> (String, Option<Bind>) {
    match value {
        Value::Null => (format!("t.{column} IS NULL"), None),
        Value::Bool(b) => (format!("t.{column} = ${n}"), Some(Bind::Bool(*b))),
        Value::String(s) => (format!("t.{column}::text = ${n}"), Some(Bind::Text(s.clone()))),
        Value::Number(num) if num.is_i64() => (
            format!("t.{column} = ${n}"),
            num.as_i64().map(Bind::Int),
        ),
        Value::Number(num) if num.is_f64() => (
            format!("t.{column} = ${n}"),
            num.as_f64().map(Bind::Float),
        ),
        _ => (
            format!("to_jsonb(t) -> '{name}' = ${n}"),
            Some(Bind::Json(value.clone())),
        ),
    }
}

fn in_condition(column: &str, name: &str, values: &[Value], n: usize) -> (String, Option<Bind>) {
    if values.is_empty() {
        return ("FALSE".to_owned(), None);
    }
    if let Some(ints) = values.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
        return (format!("t.{column} = ANY(${n})"), Some(Bind::Ints(ints)));
    }
    if let Some(texts) = values
        .iter()
        .map(|v| v.as_str().map(str::to_owned))
        .collect::<Option<Vec<_>>>()
    {
        return (format!("t.{column}::text = ANY(${n})"), Some(Bind::Texts(texts)));
    }
    (
        format!("to_jsonb(t) -> '{name}' IN (SELECT jsonb_array_elements(${n}))"),
        Some(Bind::Json(Value::Array(values.to_vec()))),
    )
}

/// Render filters as a `WHERE` body over alias `t`, numbering placeholders from `first`.
fn where_clause(filters: &[Filter], first: usize) -> Result<(String, Vec<Bind>), DataError> {
    if filters.is_empty() {
        return Ok(("TRUE".to_owned(), Vec::new()));
    }

    let mut conditions = Vec::with_capacity(filters.len());
    let mut binds = Vec::with_capacity(filters.len());
    for filter in filters {
        let n = first + binds.len();
        // `ident` validates; the bare name is safe inside a string literal afterwards.
        let column = ident(filter.column())?;
        let name = filter.column();
        let (condition, bind) = match filter {
            Filter::Eq(_, value) => eq_condition(&column, name, value, n),
            Filter::In(_, values) => in_condition(&column, name, values, n),
            Filter::ILike(_, needle) => (
                format!("t.{column}::text ILIKE ${n}"),
                Some(Bind::Text(format!("%{}%", escape_like(needle)))),
            ),
            Filter::IsNull(_) => (format!("t.{column} IS NULL"), None),
        };
        conditions.push(condition);
        binds.extend(bind);
    }
    Ok((conditions.join(" AND "), binds))
}

/// `INSERT ... SELECT` of `columns` from a JSON row bound as `$1`.
fn insert_sql(table_sql: &str, columns: &[String]) -> String {
    let columns = columns.join(", ");
    format!(
        "INSERT INTO {table_sql} ({columns}) \
         SELECT {columns} FROM jsonb_populate_record(NULL::{table_sql}, $1)"
    )
}

fn unique_index_sql(table: &str, columns: &[&str]) -> Result<String, DataError> {
    let table_sql = ident(table)?;
    let index = ident(&format!("{table}_{}_key", columns.join("_")))?;
    let columns = columns
        .iter()
        .map(|c| ident(c))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {index} ON {table_sql} ({})",
        columns.join(", ")
    ))
}

fn column_list(row: &Row) -> Result<Vec<String>, DataError> {
    row.keys().map(|c| ident(c)).collect()
}

pub struct PgService {
    pool: PgPool,
}

impl PgService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let connect_options = PgConnectOptions::from_str(database_url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            min_connections = 0,
            max_connections = 4,
            acquire_timeout = "4s",
            "database pool established"
        );
        Ok(Self { pool })
    }

    /// Create or upgrade the unified schema.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Create the unique indexes that upserts conflict on, for tables this
    /// crate does not migrate. Fails if existing rows already violate a key.
    pub async fn ensure_unique_keys(&self, keys: &[(&str, Vec<&str>)]) -> anyhow::Result<()> {
        for (table, columns) in keys {
            let sql = unique_index_sql(table, columns)?;
            debug!(sql, "ensure unique key");
            sqlx::query(&sql).execute(&self.pool).await.with_context(|| {
                format!("Failed to create unique key ({}) on {table}", columns.join(", "))
            })?;
        }
        info!(tables = keys.len(), "unique keys in place");
        Ok(())
    }
}

#[async_trait]
impl DataService for PgService {
    #[instrument(skip(self, filters), fields(filters = filters.len()))]
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[Filter],
    ) -> Result<Vec<Row>, DataError> {
        let table_sql = ident(table)?;
        let projection = if columns.is_empty() {
            "to_jsonb(t)".to_owned()
        } else {
            let pairs = columns
                .iter()
                .map(|c| ident(c).map(|quoted| format!("'{c}', t.{quoted}")))
                .collect::<Result<Vec<_>, _>>()?;
            format!("jsonb_build_object({})", pairs.join(", "))
        };
        let (conditions, binds) = where_clause(filters, 1)?;
        let sql = format!("SELECT {projection} FROM {table_sql} t WHERE {conditions}");
        debug!(sql, "select");

        let query = bind_all!(sqlx::query_scalar::<_, Json<Value>>(&sql), binds);
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .filter_map(|Json(v)| match v {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect())
    }

    #[instrument(skip(self, row))]
    async fn insert(&self, table: &str, row: Row) -> Result<(), DataError> {
        let table_sql = ident(table)?;
        let sql = insert_sql(&table_sql, &column_list(&row)?);
        sqlx::query(&sql)
            .bind(Json(Value::Object(row)))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, patch, filters))]
    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> Result<u64, DataError> {
        let table_sql = ident(table)?;
        let assignments = column_list(&patch)?
            .iter()
            .map(|c| format!("{c} = r.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let (conditions, binds) = where_clause(filters, 2)?;
        let sql = format!(
            "UPDATE {table_sql} AS t SET {assignments} \
             FROM jsonb_populate_record(NULL::{table_sql}, $1) AS r \
             WHERE {conditions}"
        );

        let query = bind_all!(sqlx::query(&sql).bind(Json(Value::Object(patch))), binds);
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    #[instrument(skip(self, row))]
    async fn upsert(&self, table: &str, row: Row, conflict_key: &[&str]) -> Result<(), DataError> {
        let table_sql = ident(table)?;
        let columns = column_list(&row)?;
        let key = conflict_key
            .iter()
            .map(|c| ident(c))
            .collect::<Result<Vec<_>, _>>()?;

        let updates: Vec<String> = columns
            .iter()
            .filter(|c| !key.contains(c))
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect();
        let action = if updates.is_empty() {
            "DO NOTHING".to_owned()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        let sql = format!(
            "{} ON CONFLICT ({}) {action}",
            insert_sql(&table_sql, &columns),
            key.join(", ")
        );
        sqlx::query(&sql)
            .bind(Json(Value::Object(row)))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, row))]
    async fn insert_if_absent(
        &self,
        table: &str,
        row: Row,
        conflict_key: &[&str],
    ) -> Result<bool, DataError> {
        let table_sql = ident(table)?;
        let key = conflict_key
            .iter()
            .map(|c| ident(c))
            .collect::<Result<Vec<_>, _>>()?;
        let sql = format!(
            "{} ON CONFLICT ({}) DO NOTHING",
            insert_sql(&table_sql, &column_list(&row)?),
            key.join(", ")
        );
        let inserted = sqlx::query(&sql)
            .bind(Json(Value::Object(row)))
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(inserted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identifiers_are_validated() {
        assert_eq!(ident("profesores_med").unwrap(), "\"profesores_med\"");
        assert!(ident("profesores; DROP TABLE x").is_err());
        assert!(ident("Profesores").is_err());
        assert!(ident("").is_err());
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
        assert_eq!(escape_like("juan"), "juan");
    }

    #[test]
    fn where_clause_compares_typed_columns() {
        let filters = vec![
            Filter::eq("usuario_id", "u1"),
            Filter::any_of("profesor_id", [1, 2]),
            Filter::contains("nombre_apellido", "per"),
            Filter::eq("aprobado", true),
        ];
        let (sql, binds) = where_clause(&filters, 2).unwrap();
        assert_eq!(
            sql,
            "t.\"usuario_id\"::text = $2 AND \
             t.\"profesor_id\" = ANY($3) AND \
             t.\"nombre_apellido\"::text ILIKE $4 AND \
             t.\"aprobado\" = $5"
        );
        assert_eq!(binds.len(), 4);
        assert!(matches!(&binds[0], Bind::Text(s) if s == "u1"));
        assert!(matches!(&binds[1], Bind::Ints(v) if *v == [1, 2]));
        assert!(matches!(&binds[2], Bind::Text(s) if s == "%per%"));
        assert!(matches!(&binds[3], Bind::Bool(true)));
    }

    #[test]
    fn placeholders_skip_filters_without_binds() {
        let filters = vec![
            Filter::is_null("facultad"),
            Filter::any_of("id", Vec::<i64>::new()),
            Filter::eq("id", "u1"),
        ];
        let (sql, binds) = where_clause(&filters, 2).unwrap();
        assert_eq!(sql, "t.\"facultad\" IS NULL AND FALSE AND t.\"id\"::text = $2");
        assert_eq!(binds.len(), 1);
    }

    #[test]
    fn mixed_lists_fall_back_to_jsonb() {
        let (sql, binds) = where_clause(&[Filter::any_of("x", [json!(1), json!("a")])], 1).unwrap();
        assert_eq!(sql, "to_jsonb(t) -> 'x' IN (SELECT jsonb_array_elements($1))");
        assert!(matches!(&binds[0], Bind::Json(v) if *v == json!([1, "a"])));
    }

    #[test]
    fn unique_index_statement() {
        assert_eq!(
            unique_index_sql("calificaciones_med", &["user_id", "profesor_id"]).unwrap(),
            "CREATE UNIQUE INDEX IF NOT EXISTS \"calificaciones_med_user_id_profesor_id_key\" \
             ON \"calificaciones_med\" (\"user_id\", \"profesor_id\")"
        );
        assert!(unique_index_sql("calificaciones", &["usuario id"]).is_err());
    }

    #[test]
    fn where_clause_rejects_bad_columns() {
        let filters = vec![Filter::eq("id' OR '1'='1", 1)];
        assert!(matches!(
            where_clause(&filters, 1),
            Err(DataError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn empty_filters_match_everything() {
        let (sql, binds) = where_clause(&[], 1).unwrap();
        assert_eq!(sql, "TRUE");
        assert!(binds.is_empty());
    }
}
