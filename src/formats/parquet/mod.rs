//! Parquet file format support.
//!
//! This module reads Apache Parquet files as fixed-size batches. It includes:
//! - Schema mapping from Arrow to SQL types
//! - Conversion from Arrow RecordBatches to row-based Records
//! - ParquetBatchReader, which implements the BatchReader trait

mod conversion;
mod reader;
mod schema;

pub use reader::ParquetBatchReader;
