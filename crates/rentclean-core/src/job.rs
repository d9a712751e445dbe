use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cleaning::{self, CleaningReport};
use crate::config::{CleaningConfig, TrackingConfig};
use crate::dataset;
use crate::object_store::ObjectStore;
use crate::tracking::{Artifact, Run, RunStatus};

pub const JOB_TYPE: &str = "basic_cleaning";

#[derive(Debug, Clone, Serialize)]
pub struct CleaningOutcome {
    pub run_id: Uuid,
    pub input_artifact: String,
    pub output_artifact: String,
    pub output_path: PathBuf,
    pub report: CleaningReport,
}

/// Fetch the input artifact, drop price and location outliers, write the
/// cleaned CSV into `work_dir` and publish it as a new artifact version.
///
/// The run record is written whether the job succeeds or fails.
pub async fn run_basic_cleaning(
    store: &ObjectStore,
    tracking: &TrackingConfig,
    config: &CleaningConfig,
    work_dir: &Path,
) -> Result<CleaningOutcome> {
    let mut run = Run::init(store.clone(), &tracking.cache_dir, JOB_TYPE, &tracking.git_commit)
        .await
        .context("failed to start tracking run")?;
    run.update_config(config)?;

    match execute(&mut run, config, work_dir).await {
        Ok(outcome) => {
            run.set_summary(&outcome.report)?;
            run.finish(RunStatus::Success)
                .await
                .context("failed to record run completion")?;
            Ok(outcome)
        }
        Err(err) => {
            let status = RunStatus::Failed {
                message: format!("{err:#}"),
            };
            if let Err(record_err) = run.finish(status).await {
                warn!(error = %record_err, "failed to record failed run");
            }
            Err(err)
        }
    }
}

async fn execute(
    run: &mut Run,
    config: &CleaningConfig,
    work_dir: &Path,
) -> Result<CleaningOutcome> {
    let input_path = run
        .use_artifact(&config.input_artifact)
        .await
        .with_context(|| format!("failed to fetch artifact '{}'", config.input_artifact))?;
    info!(artifact = %config.input_artifact, "downloaded artifact");

    let listings = dataset::read_csv(&input_path)
        .with_context(|| format!("failed to read {}", input_path.display()))?;

    info!(
        min_price = config.min_price,
        max_price = config.max_price,
        "removing outliers"
    );
    let (cleaned, report) = cleaning::clean_listings(&listings, &config.price_bounds())?;

    // Validates the name before it is used as a local file name.
    let mut artifact = Artifact::new(
        config.output_artifact.as_str(),
        config.output_type.as_str(),
        config.output_description.as_str(),
    )?;

    let output_path = work_dir.join(&config.output_artifact);
    dataset::write_csv(&cleaned, &output_path)
        .with_context(|| format!("failed to write {}", output_path.display()))?;
    info!(path = %output_path.display(), rows = report.output_rows, "saved cleaned data");

    artifact.add_file(&output_path);
    let upload = run
        .log_artifact(artifact)
        .await
        .with_context(|| format!("failed to log artifact '{}'", config.output_artifact))?;
    let manifest = upload
        .wait()
        .await
        .context("artifact upload did not complete")?;
    info!(artifact = %manifest.reference(), "uploaded cleaned data");

    Ok(CleaningOutcome {
        run_id: run.id(),
        input_artifact: run
            .record()
            .used_artifacts
            .last()
            .cloned()
            .unwrap_or_else(|| config.input_artifact.clone()),
        output_artifact: manifest.reference(),
        output_path,
        report,
    })
}
