/// Progress events emitted by the ingest loop
#[derive(Debug, Clone)]
pub enum IngestEvent {
    /// Destination table was dropped and recreated
    TableReplaced { columns: usize },
    /// Batch of rows was appended to the table
    BatchInserted { rows: u64, duration_ms: u64 },
}

/// Statistics aggregated from ingest events
#[derive(Debug, Default, Clone)]
pub struct ProgressStats {
    pub tables_replaced: usize,
    pub columns: usize,
    pub batches_written: usize,
    pub rows_loaded: u64,
    pub batch_durations_ms: Vec<u64>,
}

impl ProgressStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with an ingest event
    pub fn update(&mut self, event: &IngestEvent) {
        match event {
            IngestEvent::TableReplaced { columns } => {
                self.tables_replaced += 1;
                self.columns = *columns;
            }
            IngestEvent::BatchInserted { rows, duration_ms } => {
                self.batches_written += 1;
                self.rows_loaded += rows;
                self.batch_durations_ms.push(*duration_ms);
            }
        }
    }

    /// Calculate percentile from batch durations
    pub fn percentile(&self, p: f64) -> Option<u64> {
        if self.batch_durations_ms.is_empty() {
            return None;
        }

        let mut sorted = self.batch_durations_ms.clone();
        sorted.sort_unstable();

        let index = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let index = index.saturating_sub(1).min(sorted.len() - 1);

        Some(sorted[index])
    }

    /// Get p50, p90, p99 percentiles
    pub fn get_percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        (
            self.percentile(50.0),
            self.percentile(90.0),
            self.percentile(99.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_counts_batches_and_rows() {
        let mut stats = ProgressStats::new();
        stats.update(&IngestEvent::TableReplaced { columns: 18 });
        stats.update(&IngestEvent::BatchInserted {
            rows: 100_000,
            duration_ms: 900,
        });
        stats.update(&IngestEvent::BatchInserted {
            rows: 1,
            duration_ms: 3,
        });

        assert_eq!(stats.tables_replaced, 1);
        assert_eq!(stats.columns, 18);
        assert_eq!(stats.batches_written, 2);
        assert_eq!(stats.rows_loaded, 100_001);
        assert_eq!(stats.batch_durations_ms, vec![900, 3]);
    }

    #[test]
    fn test_percentiles() {
        let mut stats = ProgressStats::new();
        for ms in 1..=100 {
            stats.update(&IngestEvent::BatchInserted {
                rows: 10,
                duration_ms: ms,
            });
        }

        assert_eq!(stats.get_percentiles(), (Some(50), Some(90), Some(99)));
        assert_eq!(stats.percentile(0.0), Some(1));
    }

    #[test]
    fn test_percentiles_without_batches() {
        let stats = ProgressStats::new();
        assert_eq!(stats.get_percentiles(), (None, None, None));
    }
}
