use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use super::delimited::CsvBatchReader;
use super::parquet::ParquetBatchReader;
use crate::db::schema::Column;
use crate::io::SourceFile;

/// A single record (row) from the file
///
/// Values are kept as strings; `None` is a NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub fields: Vec<Option<String>>,
}

impl Record {
    /// Build a record from delimited text, where an empty field is a NULL
    pub fn from_text<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            fields: values
                .into_iter()
                .map(|v| (!v.is_empty()).then(|| v.to_string()))
                .collect(),
        }
    }

    #[cfg(test)]
    pub fn values(&self) -> Vec<Option<&str>> {
        self.fields.iter().map(Option::as_deref).collect()
    }
}

/// A bounded block of rows sharing one column set
#[derive(Debug, Clone)]
pub struct Batch {
    pub columns: Vec<Column>,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Parquet,
}

impl Format {
    /// A `.parquet` suffix selects Parquet; every other file is read as CSV.
    pub fn detect(path: &Path) -> Self {
        if path.to_string_lossy().ends_with(".parquet") {
            Format::Parquet
        } else {
            Format::Csv
        }
    }
}

/// Trait for reading a source file as a sequence of fixed-size batches
#[async_trait]
pub trait BatchReader: Send {
    /// Read the next batch, or `None` once the source is exhausted.
    ///
    /// The first call yields a batch even when the source has no data rows, so
    /// the destination table can still be created from the column set.
    async fn next_batch(&mut self) -> Result<Option<Batch>>;
}

/// Open a batch reader over a resolved source file
pub async fn open_reader(source: &SourceFile, batch_size: usize) -> Result<Box<dyn BatchReader>> {
    match source.format() {
        Format::Csv => {
            let reader = CsvBatchReader::open(source.path(), batch_size)?;
            Ok(Box::new(reader) as Box<dyn BatchReader>)
        }
        Format::Parquet => {
            let reader = ParquetBatchReader::open(source.path(), batch_size).await?;
            Ok(Box::new(reader) as Box<dyn BatchReader>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::Builder;

    #[test]
    fn test_detect_format() {
        assert_eq!(
            Format::detect(&PathBuf::from("yellow_tripdata_2021-01.parquet")),
            Format::Parquet
        );
        assert_eq!(
            Format::detect(&PathBuf::from("yellow_tripdata_2021-01.csv")),
            Format::Csv
        );
        assert_eq!(
            Format::detect(&PathBuf::from("yellow_tripdata_2021-01.parquet.bak")),
            Format::Csv
        );
        assert_eq!(Format::detect(&PathBuf::from("trips")), Format::Csv);
    }

    #[tokio::test]
    async fn test_non_parquet_extension_read_as_csv() {
        // Content is irrelevant to format selection
        let mut temp_file = Builder::new().suffix(".dat").tempfile().unwrap();
        writeln!(temp_file, "id,name").unwrap();
        writeln!(temp_file, "1,Alice").unwrap();
        temp_file.flush().unwrap();

        let source = SourceFile::resolve(temp_file.path().to_str().unwrap()).unwrap();
        let mut reader = open_reader(&source, 10).await.unwrap();
        let batch = reader.next_batch().await.unwrap().unwrap();

        assert_eq!(batch.columns.len(), 2);
        assert_eq!(batch.records[0].values(), vec![Some("1"), Some("Alice")]);
    }

    #[tokio::test]
    async fn test_parquet_extension_with_csv_content_fails() {
        let mut temp_file = Builder::new().suffix(".parquet").tempfile().unwrap();
        writeln!(temp_file, "id,name").unwrap();
        temp_file.flush().unwrap();

        let source = SourceFile::resolve(temp_file.path().to_str().unwrap()).unwrap();
        assert!(open_reader(&source, 10).await.is_err());
    }
}
