use clap::Parser;
use taxi_ingest::runner::{IngestArgs, run_ingest};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Ingest a CSV or Parquet file into a Postgres table
#[derive(Parser, Clone)]
#[command(version)]
struct Args {
    /// User name for Postgres
    #[arg(long)]
    user: Option<String>,

    /// Password for Postgres
    #[arg(long)]
    password: Option<String>,

    /// Host for Postgres
    #[arg(long)]
    host: Option<String>,

    /// Port for Postgres
    #[arg(long)]
    port: Option<String>,

    /// Database name for Postgres
    #[arg(long)]
    db: Option<String>,

    /// Name of the table to write the results to
    #[arg(long = "table_name")]
    table_name: Option<String>,

    /// Path or file:// URI of the CSV or Parquet file
    #[arg(long)]
    url: Option<String>,
}

impl From<Args> for IngestArgs {
    fn from(args: Args) -> Self {
        IngestArgs {
            user: args.user,
            password: args.password,
            host: args.host,
            port: args.port,
            db: args.db,
            table_name: args.table_name,
            url: args.url,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("taxi_ingest=info,sqlx=warn"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let result = run_ingest(args.into()).await?;

    println!();
    println!("Ingest Summary");
    println!("==============");
    println!("Table: {}", result.table);
    println!("Batches written: {}", result.batches_written);
    println!("Rows loaded: {}", result.rows_loaded);
    println!("Duration: {:.2}s", result.duration.as_secs_f64());
    println!(
        "Throughput: {:.2} rows/sec",
        result.rows_loaded as f64 / result.duration.as_secs_f64().max(f64::EPSILON)
    );
    if let (Some(p50), Some(p90), Some(p99)) = (result.p50_ms, result.p90_ms, result.p99_ms) {
        println!("Batch latency: p50={}ms p90={}ms p99={}ms", p50, p90, p99);
    }

    Ok(())
}
