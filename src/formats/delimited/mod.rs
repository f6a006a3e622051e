//! Comma-delimited text sources

pub mod reader;

pub use reader::CsvBatchReader;
