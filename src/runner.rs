//! High-level runner API for the taxi data ingester.
//!
//! This module wires the pieces together: it resolves the source file, opens a
//! batch reader for it and streams every batch into the destination table.
//!
//! This is the primary API for the CLI.

use anyhow::{Context, Result, bail};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{BATCH_SIZE, DATETIME_COLUMNS};
use crate::db::{ConnectArgs, ConnectArgsBuilder, TableSink, TableWriter};
use crate::formats::datetime::normalize_datetime_columns;
use crate::formats::{BatchReader, Format, open_reader};
use crate::io::SourceFile;
use crate::telemetry::{IngestEvent, ProgressStats};

/// Arguments for running an ingest, as given on the command line
#[derive(Debug, Clone, Default)]
pub struct IngestArgs {
    // Connection configuration
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub db: Option<String>,

    // Destination and source
    pub table_name: Option<String>,
    pub url: Option<String>,
}

/// Result of a completed ingest
#[derive(Debug)]
pub struct IngestResult {
    pub table: String,
    pub batches_written: usize,
    pub rows_loaded: u64,
    pub duration: Duration,
    pub p50_ms: Option<u64>,
    pub p90_ms: Option<u64>,
    pub p99_ms: Option<u64>,
}

/// Load a CSV or Parquet file into a Postgres table
///
/// The table is dropped and recreated from the first batch, then every batch
/// (the first included) is appended. The source file is checked before any
/// connection is attempted; the connection itself opens on the first write.
///
/// # Example
///
/// ```no_run
/// use taxi_ingest::runner::{IngestArgs, run_ingest};
///
/// # async fn example() -> anyhow::Result<()> {
/// let args = IngestArgs {
///     user: Some("root".to_string()),
///     password: Some("root".to_string()),
///     host: Some("localhost".to_string()),
///     port: Some("5432".to_string()),
///     db: Some("ny_taxi".to_string()),
///     table_name: Some("yellow_taxi_trips".to_string()),
///     url: Some("yellow_tripdata_2021-01.csv".to_string()),
/// };
///
/// let result = run_ingest(args).await?;
/// println!("Loaded {} rows in {:?}", result.rows_loaded, result.duration);
/// # Ok(())
/// # }
/// ```
pub async fn run_ingest(args: IngestArgs) -> Result<IngestResult> {
    let url = required(&args.url, "--url")?;
    let table = required(&args.table_name, "--table_name")?.to_string();

    let source = SourceFile::resolve(url)?;
    let connect_args = connect_args(&args)?;

    match source.format() {
        Format::Parquet => println!("Reading parquet file: {}", url),
        Format::Csv => println!("Reading CSV file: {}", url),
    }

    let start = Instant::now();
    let mut reader = open_reader(&source, BATCH_SIZE).await?;
    let mut writer = TableWriter::new(connect_args.connect_options(), table.clone());

    let stats = ingest(reader.as_mut(), &mut writer, &DATETIME_COLUMNS).await?;
    let duration = start.elapsed();

    info!(
        table = %table,
        columns = stats.columns,
        replaced = stats.tables_replaced,
        batches = stats.batches_written,
        rows = stats.rows_loaded,
        "ingest complete"
    );

    let (p50_ms, p90_ms, p99_ms) = stats.get_percentiles();
    Ok(IngestResult {
        table,
        batches_written: stats.batches_written,
        rows_loaded: stats.rows_loaded,
        duration,
        p50_ms,
        p90_ms,
        p99_ms,
    })
}

/// Stream every batch from `reader` into `sink`.
///
/// The first batch defines the table, which is replaced exactly once before
/// any rows are appended.
pub(crate) async fn ingest(
    reader: &mut dyn BatchReader,
    sink: &mut dyn TableSink,
    datetime_columns: &[&str],
) -> Result<ProgressStats> {
    let mut stats = ProgressStats::new();

    let Some(mut batch) = reader.next_batch().await? else {
        bail!("Source produced no batches");
    };

    let start = Instant::now();
    normalize_datetime_columns(&mut batch, datetime_columns)?;
    sink.replace(&batch.columns).await?;
    stats.update(&IngestEvent::TableReplaced {
        columns: batch.columns.len(),
    });

    if !batch.is_empty() {
        let rows = sink.append(&batch).await?;
        stats.update(&IngestEvent::BatchInserted {
            rows,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }
    println!("Inserted first chunk");

    while let Some(mut batch) = reader.next_batch().await? {
        let start = Instant::now();
        normalize_datetime_columns(&mut batch, datetime_columns)?;
        let rows = sink.append(&batch).await?;
        let elapsed = start.elapsed();

        stats.update(&IngestEvent::BatchInserted {
            rows,
            duration_ms: elapsed.as_millis() as u64,
        });
        debug!(batch = stats.batches_written, rows, "appended batch");
        println!(
            "Inserted another chunk, took {:.3} seconds",
            elapsed.as_secs_f64()
        );
    }

    Ok(stats)
}

fn required<'a>(value: &'a Option<String>, flag: &str) -> Result<&'a str> {
    value
        .as_deref()
        .with_context(|| format!("Missing required argument {}", flag))
}

fn connect_args(args: &IngestArgs) -> Result<ConnectArgs> {
    let port = required(&args.port, "--port")?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("Invalid --port '{}'", port))?;

    let mut builder = ConnectArgsBuilder::default();
    builder
        .host(required(&args.host, "--host")?)
        .port(port)
        .user(required(&args.user, "--user")?)
        .database(required(&args.db, "--db")?);
    if let Some(password) = &args.password {
        builder.password(password.as_str());
    }

    builder.build().context("Invalid connection settings")
}
