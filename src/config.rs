//! Configuration constants for the ingest pipeline
//!
//! This module centralizes the fixed parameters of a load. None of them are
//! exposed as CLI flags.

use std::time::Duration;

// ============================================================================
// Batching
// ============================================================================

/// Number of rows read, normalized and written as one unit.
pub const BATCH_SIZE: usize = 100_000;

/// Columns rewritten to `TIMESTAMP` before every write.
pub const DATETIME_COLUMNS: [&str; 2] = ["tpep_pickup_datetime", "tpep_dropoff_datetime"];

// ============================================================================
// Connection Configuration
// ============================================================================

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(45);

/// Upper bound on bind parameters in a single Postgres statement.
///
/// The wire protocol encodes the parameter count in 16 bits, so a batch of
/// 100,000 rows has to be split into several `INSERT` statements.
pub const MAX_BIND_PARAMS: usize = 65_535;
