//! Per-iteration and end-of-run reporting.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What happened in one active-learning iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationReport {
    /// Zero-based iteration index.
    pub iteration: usize,
    /// Training set size after the new sample was appended.
    pub training_size: usize,
    /// Sample chosen by the ensemble.
    pub next_sample: Vec<f64>,
    /// Ensemble mean prediction at `next_sample`.
    pub next_sample_prediction: Vec<f64>,
    /// Mean training relative error across members.
    pub mean_train_error: f64,
    /// Mean validation relative error across members.
    pub mean_valid_error: f64,
    /// Validation inputs sorted along the first dimension.
    pub sorted_validation: Vec<Vec<f64>>,
    /// Ensemble mean at each sorted validation input.
    pub mean: Vec<Vec<f64>>,
    /// Reduced ensemble variance at each sorted validation input.
    pub variance: Vec<f64>,
    /// Members dropped for numerical instability.
    pub failed_members: Vec<usize>,
}

/// Summary written once the budget is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Iterations performed.
    pub iterations: usize,
    /// Final training set.
    pub training_samples: Vec<Vec<f64>>,
    /// Fixed validation set.
    pub validation_samples: Vec<Vec<f64>>,
    /// Number of leading rows of `training_samples` drawn by LHS.
    pub initial_samples: usize,
    /// Samples appended by the loop, in order.
    pub adaptive_samples: Vec<Vec<f64>>,
    /// Mean training error per iteration.
    pub train_errors: Vec<f64>,
    /// Mean validation error per iteration.
    pub valid_errors: Vec<f64>,
    /// Final ensemble's mean prediction at each adaptive sample.
    pub adaptive_predictions: Vec<Vec<f64>>,
}

/// Receives progress from [`crate::ActiveLearner::run`].
pub trait Reporter {
    /// Called after every iteration.
    ///
    /// # Errors
    ///
    /// An error aborts the run.
    fn on_iteration(&mut self, report: &IterationReport) -> Result<()>;

    /// Called once after the last iteration.
    ///
    /// # Errors
    ///
    /// An error aborts the run.
    fn on_complete(&mut self, summary: &RunSummary) -> Result<()>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn on_iteration(&mut self, _report: &IterationReport) -> Result<()> {
        Ok(())
    }

    fn on_complete(&mut self, _summary: &RunSummary) -> Result<()> {
        Ok(())
    }
}

/// Keeps reports in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryReporter {
    /// Iteration reports in arrival order.
    pub iterations: Vec<IterationReport>,
    /// Summary, once the run completes.
    pub summary: Option<RunSummary>,
}

impl Reporter for MemoryReporter {
    fn on_iteration(&mut self, report: &IterationReport) -> Result<()> {
        self.iterations.push(report.clone());
        Ok(())
    }

    fn on_complete(&mut self, summary: &RunSummary) -> Result<()> {
        self.summary = Some(summary.clone());
        Ok(())
    }
}

/// Writes `iteration_<n>.json` per iteration and `summary.json` at the end.
#[derive(Debug, Clone)]
pub struct JsonReporter {
    output_dir: PathBuf,
}

impl JsonReporter {
    /// Report into `output_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    /// Directory reports are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn iteration_path(&self, iteration: usize) -> PathBuf {
        self.output_dir.join(format!("iteration_{iteration}.json"))
    }
}

impl Reporter for JsonReporter {
    fn on_iteration(&mut self, report: &IterationReport) -> Result<()> {
        let path = self.iteration_path(report.iteration);
        fs::write(&path, serde_json::to_string_pretty(report)?)?;
        tracing::debug!("wrote {}", path.display());
        Ok(())
    }

    fn on_complete(&mut self, summary: &RunSummary) -> Result<()> {
        let path = self.output_dir.join("summary.json");
        fs::write(&path, serde_json::to_string_pretty(summary)?)?;
        tracing::info!("run summary written to {}", path.display());
        Ok(())
    }
}
