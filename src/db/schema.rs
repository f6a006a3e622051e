use crate::formats::Record;
use crate::formats::datetime::parse_timestamp;

/// SQL data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    DoublePrecision,
    Numeric,
    Text,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Bytea,
}

impl SqlType {
    /// Returns the Postgres type name
    pub fn to_postgres(self) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::DoublePrecision => "DOUBLE PRECISION",
            SqlType::Numeric => "NUMERIC",
            SqlType::Text => "TEXT",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            SqlType::Bytea => "BYTEA",
        }
    }

    /// True for the integer family, whose values are whole numbers
    pub fn is_integer(self) -> bool {
        matches!(self, SqlType::SmallInt | SqlType::Integer | SqlType::BigInt)
    }

    /// Find the most specific common type that accommodates both types
    pub fn common_type(self, other: SqlType) -> SqlType {
        if self == other {
            return self;
        }

        use SqlType::*;
        match (self, other) {
            (SmallInt | Integer | BigInt, SmallInt | Integer | BigInt) => BigInt,
            (SmallInt | Integer | BigInt | Real | DoublePrecision, Real | DoublePrecision)
            | (Real | DoublePrecision, SmallInt | Integer | BigInt) => DoublePrecision,
            (Date, Timestamp) | (Timestamp, Date) => Timestamp,
            _ => Text,
        }
    }
}

/// A column of the destination table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
        }
    }
}

/// Quote an identifier for Postgres, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Generate the `CREATE TABLE` statement for a column set.
///
/// Every column is nullable: later batches may carry nulls the first one did not.
pub fn generate_ddl(table_name: &str, columns: &[Column]) -> String {
    let column_defs: Vec<String> = columns
        .iter()
        .map(|col| format!("  {} {}", quote_ident(&col.name), col.sql_type.to_postgres()))
        .collect();

    format!(
        "CREATE TABLE {} (\n{}\n)",
        quote_ident(table_name),
        column_defs.join(",\n")
    )
}

/// Infers column types for delimited files from the first batch of values
pub struct SchemaInferrer;

impl SchemaInferrer {
    /// Infer the type of a single value. Returns `None` for nulls.
    fn infer_value_type(value: &str) -> Option<SqlType> {
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return None;
        }

        if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
            return Some(SqlType::Boolean);
        }

        if trimmed.parse::<i64>().is_ok() {
            return Some(SqlType::BigInt);
        }

        if trimmed.parse::<f64>().is_ok() {
            return Some(SqlType::DoublePrecision);
        }

        // Only ISO-looking values; "12/25/2025" stays text unless it is a datetime column
        if trimmed.len() >= 16
            && trimmed.as_bytes()[4] == b'-'
            && parse_timestamp(trimmed).is_some()
        {
            return Some(SqlType::Timestamp);
        }

        Some(SqlType::Text)
    }

    /// Infer a column type from its values; all-null columns become TEXT
    fn infer_column_type<'a>(values: impl Iterator<Item = &'a str>) -> SqlType {
        values
            .filter_map(Self::infer_value_type)
            .reduce(SqlType::common_type)
            .unwrap_or(SqlType::Text)
    }

    /// Infer the column set from a header row and sample records
    pub fn infer_columns(headers: &[String], records: &[Record]) -> Vec<Column> {
        headers
            .iter()
            .enumerate()
            .map(|(col_idx, name)| {
                let values = records
                    .iter()
                    .filter_map(|record| record.fields.get(col_idx)?.as_deref());
                Column::new(name.clone(), Self::infer_column_type(values))
            })
            .collect()
    }
}
