use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::db::schema::{Column, SchemaInferrer};
use crate::formats::reader::{Batch, BatchReader, Record};

/// CSV reader that yields `batch_size` records at a time.
///
/// The header row names the columns. Column types are inferred once, from the
/// first batch, and reused for every later batch.
pub struct CsvBatchReader {
    reader: csv::Reader<File>,
    headers: Vec<String>,
    columns: Option<Vec<Column>>,
    batch_size: usize,
    row: csv::StringRecord,
    exhausted: bool,
}

impl CsvBatchReader {
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

        let headers: Vec<String> = reader
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(|s| s.to_string())
            .collect();

        if headers.is_empty() {
            bail!("CSV file {} has no header row", path.display());
        }

        debug!(columns = headers.len(), "opened CSV source");

        Ok(Self {
            reader,
            headers,
            columns: None,
            batch_size,
            row: csv::StringRecord::new(),
            exhausted: false,
        })
    }

    fn read_records(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(self.batch_size.min(4096));

        while records.len() < self.batch_size {
            let more = self
                .reader
                .read_record(&mut self.row)
                .context("Failed to parse CSV record")?;
            if !more {
                self.exhausted = true;
                break;
            }

            records.push(Record::from_text(self.row.iter()));
        }

        Ok(records)
    }
}

#[async_trait]
impl BatchReader for CsvBatchReader {
    async fn next_batch(&mut self) -> Result<Option<Batch>> {
        let first = self.columns.is_none();
        if self.exhausted && !first {
            return Ok(None);
        }

        let records = if self.exhausted {
            Vec::new()
        } else {
            self.read_records()?
        };

        if records.is_empty() && !first {
            return Ok(None);
        }

        let columns = self
            .columns
            .get_or_insert_with(|| SchemaInferrer::infer_columns(&self.headers, &records))
            .clone();

        Ok(Some(Batch { columns, records }))
    }
}
