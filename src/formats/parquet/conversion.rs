//! Conversion from Arrow RecordBatch to row-based Records.
//!
//! Every value is rendered as a string and nulls become `None`. Timestamps
//! use the same canonical layout as the datetime normalizer, so Parquet
//! timestamps pass through normalization unchanged. The writer parses the
//! strings back into typed values using the column types.

use anyhow::{Context, Result, anyhow};
use arrow::array::{Array, ArrowPrimitiveType, AsArray};
use arrow::datatypes::{
    ArrowTemporalType, DataType, Date32Type, Date64Type, Decimal128Type, Decimal256Type,
    Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, Time32MillisecondType,
    Time32SecondType, Time64MicrosecondType, Time64NanosecondType, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow::record_batch::RecordBatch;

use crate::formats::Record;
use crate::formats::datetime::format_timestamp;

/// Convert an Arrow RecordBatch to a vector of Records
pub fn record_batch_to_records(batch: &RecordBatch) -> Result<Vec<Record>> {
    let num_rows = batch.num_rows();

    if num_rows == 0 {
        return Ok(Vec::new());
    }

    let mut columns = Vec::with_capacity(batch.num_columns());
    for (col_idx, array) in batch.columns().iter().enumerate() {
        let strings = array_to_strings(array.as_ref()).with_context(|| {
            format!(
                "Failed to convert column '{}' ({:?}) to strings",
                batch.schema().field(col_idx).name(),
                array.data_type()
            )
        })?;
        columns.push(strings.into_iter());
    }

    // Transpose to rows
    let records = (0..num_rows)
        .map(|_| Record {
            fields: columns
                .iter_mut()
                .map(|col| col.next().flatten())
                .collect(),
        })
        .collect();

    Ok(records)
}

/// Render each slot of an array; only null slots become `None`
fn render_column(
    array: &dyn Array,
    mut render: impl FnMut(usize) -> Result<String>,
) -> Result<Vec<Option<String>>> {
    (0..array.len())
        .map(|i| {
            if array.is_null(i) {
                Ok(None)
            } else {
                render(i).map(Some)
            }
        })
        .collect()
}

fn primitive_column<T: ArrowPrimitiveType>(array: &dyn Array) -> Result<Vec<Option<String>>>
where
    T::Native: std::fmt::Display,
{
    let arr = array.as_primitive::<T>();
    render_column(array, |i| Ok(arr.value(i).to_string()))
}

fn date_column<T>(array: &dyn Array) -> Result<Vec<Option<String>>>
where
    T: ArrowTemporalType,
    i64: From<T::Native>,
{
    let arr = array.as_primitive::<T>();
    render_column(array, |i| {
        let date = arr.value_as_date(i).context("Date out of range")?;
        Ok(date.format("%Y-%m-%d").to_string())
    })
}

fn time_column<T>(array: &dyn Array) -> Result<Vec<Option<String>>>
where
    T: ArrowTemporalType,
    i64: From<T::Native>,
{
    let arr = array.as_primitive::<T>();
    render_column(array, |i| {
        let time = arr.value_as_time(i).context("Time out of range")?;
        Ok(time.format("%H:%M:%S%.f").to_string())
    })
}

fn timestamp_column<T>(array: &dyn Array, zoned: bool) -> Result<Vec<Option<String>>>
where
    T: ArrowTemporalType,
    i64: From<T::Native>,
{
    let arr = array.as_primitive::<T>();
    render_column(array, |i| {
        // Zoned values are stored as UTC instants
        let ts = arr.value_as_datetime(i).context("Timestamp out of range")?;
        let rendered = format_timestamp(&ts);
        Ok(if zoned {
            format!("{rendered}+00:00")
        } else {
            rendered
        })
    })
}

/// Convert an Arrow array to a vector of string representations
fn array_to_strings(array: &dyn Array) -> Result<Vec<Option<String>>> {
    match array.data_type() {
        DataType::Boolean => {
            let arr = array.as_boolean();
            render_column(array, |i| Ok(arr.value(i).to_string()))
        }
        DataType::Int8 => primitive_column::<Int8Type>(array),
        DataType::Int16 => primitive_column::<Int16Type>(array),
        DataType::Int32 => primitive_column::<Int32Type>(array),
        DataType::Int64 => primitive_column::<Int64Type>(array),
        DataType::UInt8 => primitive_column::<UInt8Type>(array),
        DataType::UInt16 => primitive_column::<UInt16Type>(array),
        DataType::UInt32 => primitive_column::<UInt32Type>(array),
        DataType::UInt64 => primitive_column::<UInt64Type>(array),
        DataType::Float32 => primitive_column::<Float32Type>(array),
        DataType::Float64 => primitive_column::<Float64Type>(array),
        DataType::Utf8 => {
            let arr = array.as_string::<i32>();
            render_column(array, |i| Ok(arr.value(i).to_string()))
        }
        DataType::LargeUtf8 => {
            let arr = array.as_string::<i64>();
            render_column(array, |i| Ok(arr.value(i).to_string()))
        }
        // Postgres hex format for bytea input
        DataType::Binary => {
            let arr = array.as_binary::<i32>();
            render_column(array, |i| Ok(format!("\\x{}", hex::encode(arr.value(i)))))
        }
        DataType::LargeBinary => {
            let arr = array.as_binary::<i64>();
            render_column(array, |i| Ok(format!("\\x{}", hex::encode(arr.value(i)))))
        }
        DataType::Date32 => date_column::<Date32Type>(array),
        DataType::Date64 => date_column::<Date64Type>(array),
        DataType::Time32(TimeUnit::Second) => time_column::<Time32SecondType>(array),
        DataType::Time32(TimeUnit::Millisecond) => time_column::<Time32MillisecondType>(array),
        DataType::Time64(TimeUnit::Microsecond) => time_column::<Time64MicrosecondType>(array),
        DataType::Time64(TimeUnit::Nanosecond) => time_column::<Time64NanosecondType>(array),
        DataType::Timestamp(unit, tz) => {
            let zoned = tz.is_some();
            match unit {
                TimeUnit::Second => timestamp_column::<TimestampSecondType>(array, zoned),
                TimeUnit::Millisecond => {
                    timestamp_column::<TimestampMillisecondType>(array, zoned)
                }
                TimeUnit::Microsecond => {
                    timestamp_column::<TimestampMicrosecondType>(array, zoned)
                }
                TimeUnit::Nanosecond => timestamp_column::<TimestampNanosecondType>(array, zoned),
            }
        }
        DataType::Decimal128(_, _) => {
            let arr = array.as_primitive::<Decimal128Type>();
            render_column(array, |i| Ok(arr.value_as_string(i)))
        }
        DataType::Decimal256(_, _) => {
            let arr = array.as_primitive::<Decimal256Type>();
            render_column(array, |i| Ok(arr.value_as_string(i)))
        }
        other => Err(anyhow!("Unsupported array type for conversion: {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{
        BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float64Array, Int32Array,
        Int64Array, StringArray, Time64MicrosecondArray, TimestampMicrosecondArray,
        TimestampSecondArray,
    };
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn single_column(field: Field, array: Arc<dyn Array>) -> Vec<Record> {
        let batch = RecordBatch::try_new(Arc::new(Schema::new(vec![field])), vec![array]).unwrap();
        record_batch_to_records(&batch).unwrap()
    }

    #[test]
    fn test_record_batch_to_records_mixed_types() {
        let schema = Schema::new(vec![
            Field::new("VendorID", DataType::Int32, false),
            Field::new("store_and_fwd_flag", DataType::Utf8, true),
            Field::new("fare_amount", DataType::Float64, true),
            Field::new("PULocationID", DataType::Int64, false),
            Field::new("congestion", DataType::Boolean, true),
        ]);

        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("N"), None])),
                Arc::new(Float64Array::from(vec![Some(100.50), None])),
                Arc::new(Int64Array::from(vec![142, 43])),
                Arc::new(BooleanArray::from(vec![Some(true), Some(false)])),
            ],
        )
        .unwrap();

        let records = record_batch_to_records(&batch).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].values(),
            vec![Some("1"), Some("N"), Some("100.5"), Some("142"), Some("true")]
        );
        assert_eq!(
            records[1].values(),
            vec![Some("2"), None, None, Some("43"), Some("false")]
        );
    }

    #[test]
    fn test_timestamps_use_canonical_layout() {
        // 2021-01-01 00:30:10.5 UTC
        let records = single_column(
            Field::new(
                "tpep_pickup_datetime",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                true,
            ),
            Arc::new(TimestampMicrosecondArray::from(vec![
                Some(1_609_461_010_500_000),
                None,
            ])),
        );

        assert_eq!(records[0].values(), vec![Some("2021-01-01 00:30:10.500")]);
        assert_eq!(records[1].values(), vec![None]);
    }

    #[test]
    fn test_zoned_timestamps_carry_offset() {
        let records = single_column(
            Field::new(
                "ts",
                DataType::Timestamp(TimeUnit::Second, Some("UTC".into())),
                false,
            ),
            Arc::new(TimestampSecondArray::from(vec![1_609_461_010]).with_timezone("UTC")),
        );

        assert_eq!(records[0].values(), vec![Some("2021-01-01 00:30:10+00:00")]);
    }

    #[test]
    fn test_empty_string_is_not_null() {
        let records = single_column(
            Field::new("store_and_fwd_flag", DataType::Utf8, true),
            Arc::new(StringArray::from(vec![Some(""), None, Some("  ")])),
        );

        assert_eq!(records[0].values(), vec![Some("")]);
        assert_eq!(records[1].values(), vec![None]);
        assert_eq!(records[2].values(), vec![Some("  ")]);
    }

    #[test]
    fn test_times_of_day() {
        // 00:30:10.5 after midnight
        let records = single_column(
            Field::new("pickup_time", DataType::Time64(TimeUnit::Microsecond), true),
            Arc::new(Time64MicrosecondArray::from(vec![Some(1_810_500_000), None])),
        );

        assert_eq!(records[0].values(), vec![Some("00:30:10.500")]);
        assert_eq!(records[1].values(), vec![None]);
    }

    #[test]
    fn test_dates() {
        // Date32 is days since epoch; 18993 = 2022-01-01
        let records = single_column(
            Field::new("date", DataType::Date32, false),
            Arc::new(Date32Array::from(vec![0, 18993])),
        );

        assert_eq!(records[0].values(), vec![Some("1970-01-01")]);
        assert_eq!(records[1].values(), vec![Some("2022-01-01")]);
    }

    #[test]
    fn test_decimals_keep_scale() {
        let array = Decimal128Array::from(vec![12345, -5])
            .with_precision_and_scale(10, 2)
            .unwrap();
        let records = single_column(
            Field::new("amount", DataType::Decimal128(10, 2), false),
            Arc::new(array),
        );

        assert_eq!(records[0].values(), vec![Some("123.45")]);
        assert_eq!(records[1].values(), vec![Some("-0.05")]);
    }

    #[test]
    fn test_binary_rendered_as_bytea_hex() {
        let records = single_column(
            Field::new("payload", DataType::Binary, false),
            Arc::new(BinaryArray::from_vec(vec![&b"\xde\xad"[..]])),
        );

        assert_eq!(records[0].values(), vec![Some("\\xdead")]);
    }

    #[test]
    fn test_record_batch_to_records_empty() {
        let records = single_column(
            Field::new("id", DataType::Int32, false),
            Arc::new(Int32Array::from(Vec::<i32>::new())),
        );

        assert!(records.is_empty());
    }
}
