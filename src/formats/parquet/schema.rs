//! Mapping from Arrow field types to destination column types.

use anyhow::{Result, bail};
use arrow::datatypes::{DataType, Schema};

use crate::db::schema::{Column, SqlType};

fn sql_type_for(data_type: &DataType) -> Option<SqlType> {
    Some(match data_type {
        DataType::Boolean => SqlType::Boolean,
        DataType::Int8 | DataType::Int16 | DataType::UInt8 => SqlType::SmallInt,
        DataType::Int32 | DataType::UInt16 => SqlType::Integer,
        DataType::Int64 | DataType::UInt32 => SqlType::BigInt,
        DataType::UInt64 | DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => {
            SqlType::Numeric
        }
        DataType::Float32 => SqlType::Real,
        DataType::Float64 => SqlType::DoublePrecision,
        DataType::Utf8 | DataType::LargeUtf8 => SqlType::Text,
        DataType::Binary | DataType::LargeBinary => SqlType::Bytea,
        DataType::Date32 | DataType::Date64 => SqlType::Date,
        DataType::Time32(_) | DataType::Time64(_) => SqlType::Time,
        DataType::Timestamp(_, None) => SqlType::Timestamp,
        DataType::Timestamp(_, Some(_)) => SqlType::TimestampTz,
        _ => return None,
    })
}

/// Map every field of an Arrow schema to a destination column
pub fn columns_from_arrow(schema: &Schema) -> Result<Vec<Column>> {
    let mut columns = Vec::with_capacity(schema.fields().len());

    for field in schema.fields() {
        let Some(sql_type) = sql_type_for(field.data_type()) else {
            bail!(
                "Unsupported Parquet column '{}' of type {:?}",
                field.name(),
                field.data_type()
            );
        };
        columns.push(Column::new(field.name().clone(), sql_type));
    }

    Ok(columns)
}
