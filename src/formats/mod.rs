//! File format readers and batch normalization

pub mod datetime;
pub mod delimited;
pub mod parquet;
pub mod reader;

pub use reader::{Batch, BatchReader, Format, Record, open_reader};
