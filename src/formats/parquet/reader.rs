//! Parquet file reader implementation.

use anyhow::{Context, Result};
use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use parquet::arrow::async_reader::ParquetRecordBatchStreamBuilder;
use parquet::errors::ParquetError;
use std::path::Path;
use tokio::fs::File;
use tracing::debug;

use super::conversion::record_batch_to_records;
use super::schema::columns_from_arrow;
use crate::db::schema::Column;
use crate::formats::reader::{Batch, BatchReader};

/// Parquet reader that yields exactly `batch_size` rows per batch.
///
/// The underlying stream never crosses a row group boundary, so smaller
/// batches are buffered and re-sliced until a full batch is available.
pub struct ParquetBatchReader {
    stream: BoxStream<'static, Result<RecordBatch, ParquetError>>,
    arrow_schema: SchemaRef,
    columns: Vec<Column>,
    batch_size: usize,
    pending: Vec<RecordBatch>,
    pending_rows: usize,
    exhausted: bool,
    started: bool,
}

impl ParquetBatchReader {
    /// Open a Parquet file and read its footer metadata
    pub async fn open(path: &Path, batch_size: usize) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("Failed to open Parquet file {}", path.display()))?;

        let builder = ParquetRecordBatchStreamBuilder::new(file)
            .await
            .context("Failed to read Parquet metadata")?;

        let metadata = builder.metadata();
        debug!(
            row_groups = metadata.num_row_groups(),
            rows = metadata.file_metadata().num_rows(),
            "opened Parquet source"
        );

        let arrow_schema = builder.schema().clone();
        let columns = columns_from_arrow(&arrow_schema)?;

        let stream = builder
            .with_batch_size(batch_size)
            .build()
            .context("Failed to build Parquet stream")?
            .boxed();

        Ok(Self {
            stream,
            arrow_schema,
            columns,
            batch_size,
            pending: Vec::new(),
            pending_rows: 0,
            exhausted: false,
            started: false,
        })
    }

    /// Pull from the stream until a full batch is buffered or the file ends,
    /// then split off the next `batch_size` rows.
    async fn next_record_batch(&mut self) -> Result<Option<RecordBatch>> {
        while self.pending_rows < self.batch_size && !self.exhausted {
            match self.stream.next().await {
                Some(batch) => {
                    let batch = batch.context("Failed to read record batch")?;
                    if batch.num_rows() > 0 {
                        self.pending_rows += batch.num_rows();
                        self.pending.push(batch);
                    }
                }
                None => self.exhausted = true,
            }
        }

        if self.pending_rows == 0 {
            return Ok(None);
        }

        let combined = if self.pending.len() == 1 {
            self.pending.remove(0)
        } else {
            let combined = concat_batches(&self.arrow_schema, &self.pending)
                .context("Failed to combine record batches")?;
            self.pending.clear();
            combined
        };

        let total = combined.num_rows();
        let take = total.min(self.batch_size);
        if total > take {
            self.pending.push(combined.slice(take, total - take));
        }
        self.pending_rows = total - take;

        Ok(Some(combined.slice(0, take)))
    }
}

#[async_trait]
impl BatchReader for ParquetBatchReader {
    async fn next_batch(&mut self) -> Result<Option<Batch>> {
        let first = !self.started;
        self.started = true;

        let records = match self.next_record_batch().await? {
            Some(batch) => record_batch_to_records(&batch)
                .context("Failed to convert RecordBatch to Records")?,
            // A file without rows still defines the table
            None if first => Vec::new(),
            None => return Ok(None),
        };

        Ok(Some(Batch {
            columns: self.columns.clone(),
            records,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::arrow::ArrowWriter;
    use parquet::file::properties::WriterProperties;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    /// Helper to create a test Parquet file
    fn create_test_parquet_file(num_rows: usize, row_group_size: usize) -> NamedTempFile {
        let temp_file = NamedTempFile::new().unwrap();

        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("zone", DataType::Utf8, true),
            Field::new("fare", DataType::Float64, true),
        ]));

        let props = WriterProperties::builder()
            .set_max_row_group_size(row_group_size)
            .build();

        let file = std::fs::File::create(temp_file.path()).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props)).unwrap();

        // Write data in batches
        let write_batch = 100;
        for start in (0..num_rows).step_by(write_batch) {
            let end = std::cmp::min(start + write_batch, num_rows);

            let batch = RecordBatch::try_new(
                schema.clone(),
                vec![
                    Arc::new(Int64Array::from_iter_values(start as i64..end as i64)),
                    Arc::new(StringArray::from_iter_values(
                        (start..end).map(|i| format!("zone_{}", i)),
                    )),
                    Arc::new(Float64Array::from_iter_values(
                        (start..end).map(|i| i as f64 * 1.5),
                    )),
                ],
            )
            .unwrap();

            writer.write(&batch).unwrap();
        }

        writer.close().unwrap();
        temp_file
    }

    async fn batch_sizes(reader: &mut ParquetBatchReader) -> Vec<usize> {
        let mut sizes = Vec::new();
        while let Some(batch) = reader.next_batch().await.unwrap() {
            sizes.push(batch.len());
        }
        sizes
    }

    #[tokio::test]
    async fn test_rebatches_across_row_groups() {
        // Row groups of 30 rows, batches of 50
        let temp_file = create_test_parquet_file(130, 30);
        let mut reader = ParquetBatchReader::open(temp_file.path(), 50).await.unwrap();

        assert_eq!(batch_sizes(&mut reader).await, vec![50, 50, 30]);
    }

    #[tokio::test]
    async fn test_row_order_preserved() {
        let temp_file = create_test_parquet_file(120, 40);
        let mut reader = ParquetBatchReader::open(temp_file.path(), 25).await.unwrap();

        let mut ids = Vec::new();
        while let Some(batch) = reader.next_batch().await.unwrap() {
            ids.extend(batch.records.iter().map(|r| r.fields[0].clone()));
        }

        let expected: Vec<Option<String>> = (0..120).map(|i| Some(i.to_string())).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_columns_from_file_schema() {
        let temp_file = create_test_parquet_file(10, 100);
        let mut reader = ParquetBatchReader::open(temp_file.path(), 100).await.unwrap();

        let batch = reader.next_batch().await.unwrap().unwrap();
        let names: Vec<&str> = batch.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "zone", "fare"]);
        assert_eq!(
            batch.records[3].values(),
            vec![Some("3"), Some("zone_3"), Some("4.5")]
        );
        assert!(reader.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_file_yields_one_empty_batch() {
        let temp_file = create_test_parquet_file(0, 100);
        let mut reader = ParquetBatchReader::open(temp_file.path(), 100).await.unwrap();

        let batch = reader.next_batch().await.unwrap().unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.columns.len(), 3);
        assert!(reader.next_batch().await.unwrap().is_none());
    }
}
