//! Destination table writes: create-or-replace once, then append batches.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions};
use sqlx::query::Query;
use sqlx::{Connection as _, Postgres};
use tracing::debug;

use super::connection::Connection;
use super::schema::{Column, SqlType, generate_ddl, quote_ident};
use crate::formats::datetime::parse_timestamp;
use crate::formats::{Batch, Record};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Destination for batches
#[async_trait]
pub trait TableSink: Send {
    /// Drop and recreate the table from a column set
    async fn replace(&mut self, columns: &[Column]) -> Result<()>;

    /// Insert every row of a batch; returns the number of rows written
    async fn append(&mut self, batch: &Batch) -> Result<u64>;
}

/// Writes batches into a Postgres table over a single connection.
///
/// The connection is opened on the first write.
pub struct TableWriter {
    connect_options: Option<PgConnectOptions>,
    conn: Option<Connection>,
    table_name: String,
}

impl TableWriter {
    pub fn new(connect_options: PgConnectOptions, table_name: impl Into<String>) -> Self {
        Self {
            connect_options: Some(connect_options),
            conn: None,
            table_name: table_name.into(),
        }
    }

    /// Write through an already open connection
    #[cfg(test)]
    pub fn with_connection(conn: Connection, table_name: impl Into<String>) -> Self {
        Self {
            connect_options: None,
            conn: Some(conn),
            table_name: table_name.into(),
        }
    }

    #[cfg(test)]
    pub fn into_connection(self) -> Option<Connection> {
        self.conn
    }

    async fn connection(&mut self) -> Result<&mut Connection> {
        if self.conn.is_none() {
            let options = self
                .connect_options
                .as_ref()
                .ok_or_else(|| anyhow!("No connection settings for table writer"))?;
            self.conn = Some(Connection::connect(options).await?);
        }

        self.conn
            .as_mut()
            .ok_or_else(|| anyhow!("Connection unavailable"))
    }

    /// Bind record fields to query with proper types based on the columns
    fn bind_record<'q>(
        mut query: PgQuery<'q>,
        record: &'q Record,
        columns: &[Column],
    ) -> Result<PgQuery<'q>> {
        check_field_count(record, columns)?;

        for (field, col) in record.fields.iter().zip(columns) {
            query = bind_typed_value(query, field, col)?;
        }
        Ok(query)
    }
}

#[async_trait]
impl TableSink for TableWriter {
    async fn replace(&mut self, columns: &[Column]) -> Result<()> {
        let statements = vec![
            format!("DROP TABLE IF EXISTS {}", quote_ident(&self.table_name)),
            generate_ddl(&self.table_name, columns),
        ];
        debug!(ddl = %statements[1], "replacing table");

        let table_name = self.table_name.clone();
        self.connection()
            .await?
            .execute_all(&statements)
            .await
            .with_context(|| format!("Failed to create table '{}'", table_name))
    }

    async fn append(&mut self, batch: &Batch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let columns = &batch.columns;
        let max_params = self.connection().await?.max_bind_params();
        let rows_per_statement = (max_params / columns.len().max(1)).max(1);
        let use_pg_cast = self.connection().await?.is_postgres();

        // Statements are identical for every full chunk; only the tail differs
        let full_sql = insert_sql(&self.table_name, columns, rows_per_statement, use_pg_cast);
        let chunks: Vec<&[Record]> = batch.records.chunks(rows_per_statement).collect();
        let tail_sql = chunks
            .last()
            .filter(|chunk| chunk.len() != rows_per_statement)
            .map(|chunk| insert_sql(&self.table_name, columns, chunk.len(), use_pg_cast));

        match self.connection().await? {
            Connection::Postgres(conn) => {
                let mut tx = conn.begin().await?;
                for chunk in &chunks {
                    let sql = if chunk.len() == rows_per_statement {
                        &full_sql
                    } else {
                        tail_sql.as_ref().unwrap_or(&full_sql)
                    };
                    let mut query = sqlx::query(sql);
                    for record in chunk.iter() {
                        query = Self::bind_record(query, record, columns)?;
                    }
                    query
                        .execute(&mut *tx)
                        .await
                        .context("Failed to execute batch insert")?;
                }
                tx.commit().await.context("Failed to commit batch")?;
            }
            #[cfg(test)]
            Connection::Sqlite(conn) => {
                let mut tx = conn.begin().await?;
                for chunk in &chunks {
                    let sql = if chunk.len() == rows_per_statement {
                        &full_sql
                    } else {
                        tail_sql.as_ref().unwrap_or(&full_sql)
                    };
                    let sqlite_sql = convert_to_sqlite_placeholders(sql);
                    let mut query = sqlx::query(&sqlite_sql);
                    // SQLite: simple string binding for testing
                    for record in chunk.iter() {
                        check_field_count(record, columns)?;
                        for (field, col) in record.fields.iter().zip(columns) {
                            query = query.bind(field_value(field, col.sql_type));
                        }
                    }
                    query
                        .execute(&mut *tx)
                        .await
                        .context("Failed to execute batch insert")?;
                }
                tx.commit().await.context("Failed to commit batch")?;
            }
        }

        Ok(batch.len() as u64)
    }
}

/// Build a multi-row INSERT for `rows` rows.
///
/// Postgres gets explicit CASTs for the types bound as text.
fn insert_sql(table_name: &str, columns: &[Column], rows: usize, use_pg_cast: bool) -> String {
    let column_list: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();

    let mut param_idx = 1;
    let mut value_groups = Vec::with_capacity(rows);
    for _ in 0..rows {
        let placeholders: Vec<String> = columns
            .iter()
            .map(|col| {
                let placeholder = format!("${}", param_idx);
                param_idx += 1;
                if use_pg_cast && binds_as_text(col.sql_type) {
                    format!("CAST({} AS {})", placeholder, col.sql_type.to_postgres())
                } else {
                    placeholder
                }
            })
            .collect();
        value_groups.push(format!("({})", placeholders.join(", ")));
    }

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table_name),
        column_list.join(", "),
        value_groups.join(", ")
    )
}

/// Types bound as strings and converted by the server with CAST()
fn binds_as_text(sql_type: SqlType) -> bool {
    matches!(
        sql_type,
        SqlType::Numeric | SqlType::Date | SqlType::Time | SqlType::TimestampTz | SqlType::Bytea
    )
}

fn check_field_count(record: &Record, columns: &[Column]) -> Result<()> {
    if record.fields.len() != columns.len() {
        return Err(anyhow!(
            "Record has {} fields but the table has {} columns",
            record.fields.len(),
            columns.len()
        ));
    }
    Ok(())
}

/// The value written for a field, or `None` for NULL.
///
/// Text is written exactly as read. Other types ignore surrounding whitespace,
/// and a blank value has nothing to convert.
fn field_value(field: &Option<String>, sql_type: SqlType) -> Option<&str> {
    let value = field.as_deref()?;
    if sql_type == SqlType::Text {
        return Some(value);
    }

    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Bind a single value with proper type conversion
fn bind_typed_value<'q>(
    query: PgQuery<'q>,
    field: &'q Option<String>,
    col: &Column,
) -> Result<PgQuery<'q>> {
    let Some(value) = field_value(field, col.sql_type) else {
        return Ok(bind_null(query, col.sql_type));
    };

    Ok(match col.sql_type {
        SqlType::Boolean => query.bind(parse_bool(value, col)?),
        SqlType::SmallInt => query.bind(parse::<i16>(value, col)?),
        SqlType::Integer => query.bind(parse::<i32>(value, col)?),
        SqlType::BigInt => query.bind(parse::<i64>(value, col)?),
        SqlType::Real => query.bind(parse::<f32>(value, col)?),
        SqlType::DoublePrecision => query.bind(parse::<f64>(value, col)?),
        SqlType::Timestamp => {
            let ts = parse_timestamp(value).ok_or_else(|| mismatch(value, col, None))?;
            query.bind(ts)
        }
        SqlType::Text => query.bind(value),
        SqlType::Numeric | SqlType::Date | SqlType::Time | SqlType::TimestampTz | SqlType::Bytea => {
            query.bind(value)
        }
    })
}

/// Bind NULL value for the appropriate type
fn bind_null(query: PgQuery<'_>, sql_type: SqlType) -> PgQuery<'_> {
    match sql_type {
        SqlType::Boolean => query.bind(None::<bool>),
        SqlType::SmallInt => query.bind(None::<i16>),
        SqlType::Integer => query.bind(None::<i32>),
        SqlType::BigInt => query.bind(None::<i64>),
        SqlType::Real => query.bind(None::<f32>),
        SqlType::DoublePrecision => query.bind(None::<f64>),
        SqlType::Timestamp => query.bind(None::<chrono::NaiveDateTime>),
        _ => query.bind(None::<String>),
    }
}

fn mismatch(value: &str, col: &Column, error: Option<String>) -> anyhow::Error {
    let detail = error.map(|e| format!("\n- Error: {}", e)).unwrap_or_default();
    anyhow!(
        "Type mismatch in column '{}': cannot convert value to {}.\n\
         - Got: '{}'{}",
        col.name,
        col.sql_type.to_postgres(),
        value,
        detail
    )
}

fn parse<T: std::str::FromStr>(value: &str, col: &Column) -> Result<T>
where
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| mismatch(value, col, Some(e.to_string())))
}

fn parse_bool(value: &str, col: &Column) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Ok(true),
        "false" | "f" | "0" => Ok(false),
        _ => Err(mismatch(value, col, None)),
    }
}

/// Convert Postgres-style placeholders ($1, $2, ...) to SQLite-style (?, ?, ...)
#[cfg(test)]
fn convert_to_sqlite_placeholders(sql: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' {
            while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                chars.next();
            }
            result.push('?');
        } else {
            result.push(ch);
        }
    }

    result
}
