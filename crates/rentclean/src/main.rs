use anyhow::{Context, Result};
use clap::Parser;
use rentclean_core::config::{CleaningConfig, TrackingConfig};
use rentclean_core::job::run_basic_cleaning;
use rentclean_core::object_store::ObjectStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Download a listings artifact, drop price and location outliers, and
/// publish the result as a new artifact version.
#[derive(Parser, Debug)]
#[command(author, version, about = "A very basic data cleaning", long_about = None)]
struct Cli {
    /// Name of uncleaned dataset.
    #[arg(long = "input_artifact")]
    input_artifact: String,

    /// Name of cleaned dataset.
    #[arg(long = "output_artifact")]
    output_artifact: String,

    /// Type of output.
    #[arg(long = "output_type")]
    output_type: String,

    /// Description of output dataset.
    #[arg(long = "output_description")]
    output_description: String,

    /// Minimum price. Lower values are outliers and will be removed.
    #[arg(long = "min_price", allow_negative_numbers = true)]
    min_price: f64,

    /// Maximum price. Higher values are outliers and will be removed.
    #[arg(long = "max_price", allow_negative_numbers = true)]
    max_price: f64,
}

impl From<Cli> for CleaningConfig {
    fn from(cli: Cli) -> Self {
        CleaningConfig {
            input_artifact: cli.input_artifact,
            output_artifact: cli.output_artifact,
            output_type: cli.output_type,
            output_description: cli.output_description,
            min_price: cli.min_price,
            max_price: cli.max_price,
        }
    }
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // `.env` may carry RUST_LOG, so it is loaded before the subscriber.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .json()
        .init();

    let cli = Cli::parse();

    let tracking = TrackingConfig::from_env().context("invalid tracking configuration")?;
    let store = ObjectStore::from_config(&tracking)
        .await
        .context("failed to configure object store")?;
    let work_dir = std::env::current_dir().context("failed to resolve working directory")?;

    let config = CleaningConfig::from(cli);
    let outcome = run_basic_cleaning(&store, &tracking, &config, &work_dir).await?;

    info!(
        run_id = %outcome.run_id,
        input = %outcome.input_artifact,
        output = %outcome.output_artifact,
        rows_in = outcome.report.input_rows,
        rows_out = outcome.report.output_rows,
        "basic cleaning finished"
    );
    Ok(())
}
