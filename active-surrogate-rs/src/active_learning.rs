//! The active-learning driver.
//!
//! A run draws an initial training set and a fixed validation set by Latin
//! Hypercube sampling, then repeatedly asks the reduced-order model for
//! snapshots, trains the ensemble on them and appends the sample the
//! ensemble is least certain about, until the training budget is spent.

use candle_core::Device;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::collaborator::{OnlineSnapshots, ReducedOrderModel};
use crate::config::ActiveLearningConfig;
use crate::ensemble::{aggregate, EnsembleOutcome, EnsembleTrainer};
use crate::error::{Result, SurrogateError};
use crate::report::{IterationReport, Reporter, RunSummary};
use crate::sampler::latin_hypercube;
use crate::trainer::TrainedMember;

/// Environment variable that forces CPU execution when set to `1`/`true`.
pub const FORCE_CPU_ENV: &str = "ACTIVE_SURROGATE_FORCE_CPU";

/// Pick the compute device.
///
/// CPU unless the crate is built with the `cuda` feature and a device is
/// available. [`FORCE_CPU_ENV`] always wins.
#[must_use]
pub fn resolve_device() -> Device {
    let force_cpu = std::env::var(FORCE_CPU_ENV)
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if force_cpu {
        tracing::info!("CPU mode forced via {FORCE_CPU_ENV}");
        return Device::Cpu;
    }

    #[cfg(feature = "cuda")]
    {
        match Device::cuda_if_available(0) {
            Ok(device @ Device::Cuda(_)) => return device,
            Ok(_) => tracing::warn!("CUDA not available; falling back to CPU"),
            Err(err) => tracing::warn!("CUDA init failed ({err}); falling back to CPU"),
        }
    }

    Device::Cpu
}

/// Lifecycle of an [`ActiveLearner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Drawing the initial and validation samples.
    Initializing,
    /// Running offline/online/ensemble iterations.
    Iterating,
    /// Budget exhausted.
    Done,
}

/// Everything a finished run produced.
pub struct ActiveLearningOutcome {
    /// Final training set: initial samples followed by adaptive samples.
    pub training_samples: Vec<Vec<f64>>,
    /// The fixed validation set.
    pub validation_samples: Vec<Vec<f64>>,
    /// LHS-drawn initial training samples.
    pub initial_samples: Vec<Vec<f64>>,
    /// Samples chosen by the ensemble, in order.
    pub adaptive_samples: Vec<Vec<f64>>,
    /// Mean training error per iteration.
    pub train_errors: Vec<f64>,
    /// Mean validation error per iteration.
    pub valid_errors: Vec<f64>,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Members of the last iteration's ensemble; empty if no iteration ran.
    pub final_members: Vec<TrainedMember>,
    /// Final ensemble's mean prediction at each adaptive sample.
    pub adaptive_predictions: Vec<Vec<f64>>,
}

impl ActiveLearningOutcome {
    /// Serializable view of the run.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            iterations: self.iterations,
            training_samples: self.training_samples.clone(),
            validation_samples: self.validation_samples.clone(),
            initial_samples: self.initial_samples.len(),
            adaptive_samples: self.adaptive_samples.clone(),
            train_errors: self.train_errors.clone(),
            valid_errors: self.valid_errors.clone(),
            adaptive_predictions: self.adaptive_predictions.clone(),
        }
    }
}

/// Drives sampling, the reduced-order model and the ensemble.
///
/// # Example
///
/// ```no_run
/// use active_surrogate_rs::collaborator::{LotkaVolterra, SimulatorRom};
/// use active_surrogate_rs::report::NoopReporter;
/// use active_surrogate_rs::{ActiveLearner, ActiveLearningConfig};
///
/// # fn main() -> active_surrogate_rs::Result<()> {
/// let config = ActiveLearningConfig::from_preset("lotka-volterra-quick")?;
/// let mut rom = SimulatorRom::new(LotkaVolterra, config.simulator.clone());
///
/// let mut learner = ActiveLearner::new(config)?;
/// let outcome = learner.run(&mut rom, &mut NoopReporter)?;
/// println!("final training set: {} samples", outcome.training_samples.len());
/// # Ok(())
/// # }
/// ```
pub struct ActiveLearner {
    config: ActiveLearningConfig,
    ensemble: EnsembleTrainer,
    phase: Phase,
    show_progress: bool,
}

impl ActiveLearner {
    /// Create a learner on the device picked by [`resolve_device`].
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::InvalidArgument`] for an invalid
    /// configuration.
    pub fn new(config: ActiveLearningConfig) -> Result<Self> {
        Self::with_device(config, resolve_device())
    }

    /// Create a learner on `device`.
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::InvalidArgument`] for an invalid
    /// configuration.
    pub fn with_device(config: ActiveLearningConfig, device: Device) -> Result<Self> {
        config.validate()?;
        let ensemble = EnsembleTrainer::new(config.ensemble.clone(), config.seed, device)?;
        Ok(Self {
            config,
            ensemble,
            phase: Phase::Initializing,
            show_progress: false,
        })
    }

    /// Show progress bars for the loop and for each ensemble.
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self.ensemble = self.ensemble.with_progress(show);
        self
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Draw the initial training and validation sets.
    ///
    /// Both are deterministic in the configured seed and drawn from distinct
    /// streams.
    ///
    /// # Errors
    ///
    /// Propagates sampler errors.
    pub fn initial_samples(&self) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
        let s = &self.config.sampling;
        let mut seeder = ChaCha8Rng::seed_from_u64(self.config.seed);
        let train_seed: u64 = seeder.random();
        let valid_seed: u64 = seeder.random();

        let train = latin_hypercube(s.dimension, &s.lower, &s.upper, s.num_init, train_seed)?;
        let valid = latin_hypercube(s.dimension, &s.lower, &s.upper, s.num_valid, valid_seed)?;
        Ok((train, valid))
    }

    /// Run the loop until the training set holds `n_all` samples.
    ///
    /// # Errors
    ///
    /// - [`SurrogateError::CollaboratorFailure`] if the model fails or
    ///   returns malformed snapshots; the iteration is abandoned before the
    ///   training set changes
    /// - [`SurrogateError::NumericalInstability`] if every member diverged
    /// - reporter errors
    pub fn run<R, P>(&mut self, rom: &mut R, reporter: &mut P) -> Result<ActiveLearningOutcome>
    where
        R: ReducedOrderModel + ?Sized,
        P: Reporter + ?Sized,
    {
        self.phase = Phase::Initializing;
        let (initial, validation) = self.initial_samples()?;
        let n_all = self.config.sampling.n_all;
        tracing::info!(
            initial = initial.len(),
            validation = validation.len(),
            n_all,
            "drew initial samples"
        );

        let mut training = initial.clone();
        let mut adaptive_samples = Vec::new();
        let mut train_errors = Vec::new();
        let mut valid_errors = Vec::new();
        let mut last: Option<EnsembleOutcome> = None;

        let pb = if self.show_progress {
            ProgressBar::new((n_all - initial.len()) as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos:>3}/{len:3} {msg}")?
                .progress_chars("#>-"),
        );

        self.phase = Phase::Iterating;
        tracing::info!("entering active-learning iterations");

        while training.len() < n_all {
            let iteration = train_errors.len();
            tracing::info!(iteration, training = training.len(), "offline phase");

            rom.offline_phase(&training, &validation)
                .map_err(collaborator_failure("offline phase"))?;
            let snapshots = rom
                .online_phase()
                .map_err(collaborator_failure("online phase"))?;
            self.check_snapshots(&snapshots, training.len(), validation.len())?;

            let outcome = self.ensemble.train_ensemble(
                &snapshots.x_train,
                &snapshots.y_train,
                &snapshots.x_valid,
                &snapshots.y_valid,
            )?;

            training.push(outcome.next_sample.clone());
            adaptive_samples.push(outcome.next_sample.clone());
            train_errors.push(outcome.mean_train_error);
            valid_errors.push(outcome.mean_valid_error);

            let report = IterationReport {
                iteration,
                training_size: training.len(),
                next_sample: outcome.next_sample.clone(),
                next_sample_prediction: outcome.next_sample_prediction.clone(),
                mean_train_error: outcome.mean_train_error,
                mean_valid_error: outcome.mean_valid_error,
                sorted_validation: outcome.sorted_validation.clone(),
                mean: outcome.mean.clone(),
                variance: outcome.variance.clone(),
                failed_members: outcome.failed_members.clone(),
            };
            reporter.on_iteration(&report)?;

            pb.set_message(format!(
                "train {:.4} valid {:.4}",
                outcome.mean_train_error, outcome.mean_valid_error
            ));
            pb.inc(1);
            last = Some(outcome);
        }
        pb.finish_with_message("budget exhausted");

        self.phase = Phase::Done;
        let final_members = last.map(|o| o.members).unwrap_or_default();
        let adaptive_predictions = ensemble_mean(&final_members, &adaptive_samples)?;

        tracing::info!(
            iterations = train_errors.len(),
            training = training.len(),
            "active learning finished"
        );

        let outcome = ActiveLearningOutcome {
            iterations: train_errors.len(),
            training_samples: training,
            validation_samples: validation,
            initial_samples: initial,
            adaptive_samples,
            train_errors,
            valid_errors,
            final_members,
            adaptive_predictions,
        };
        reporter.on_complete(&outcome.summary())?;
        Ok(outcome)
    }

    fn check_snapshots(
        &self,
        snapshots: &OnlineSnapshots,
        num_train: usize,
        num_valid: usize,
    ) -> Result<()> {
        snapshots.check(num_train, num_valid)?;

        let dimension = self.config.sampling.dimension;
        let dofs = self.config.ensemble.dofs;
        let bad_x = snapshots
            .x_train
            .iter()
            .chain(&snapshots.x_valid)
            .any(|row| row.len() != dimension);
        let bad_y = snapshots
            .y_train
            .iter()
            .chain(&snapshots.y_valid)
            .any(|row| row.len() != dofs);
        if bad_x || bad_y {
            return Err(SurrogateError::CollaboratorFailure(format!(
                "expected {dimension}-wide parameters and {dofs}-wide snapshots"
            )));
        }
        Ok(())
    }
}

/// Report any reduced-order model error as a collaborator failure.
fn collaborator_failure(phase: &'static str) -> impl Fn(SurrogateError) -> SurrogateError {
    move |err| match err {
        SurrogateError::CollaboratorFailure(_) => err,
        other => SurrogateError::CollaboratorFailure(format!("{phase}: {other}")),
    }
}

fn ensemble_mean(members: &[TrainedMember], points: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    if members.is_empty() || points.is_empty() {
        return Ok(Vec::new());
    }
    let predictions = members
        .iter()
        .map(|m| m.predict(points))
        .collect::<Result<Vec<_>>>()?;
    Ok(aggregate(&predictions)?.mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActivationKind;
    use crate::report::MemoryReporter;

    /// Snapshot `[2x, 1 - x]` of each sample.
    #[derive(Default)]
    struct LinearRom {
        train: Vec<Vec<f64>>,
        valid: Vec<Vec<f64>>,
        offline_sizes: Vec<usize>,
        drop_row_on_call: Option<usize>,
        missing_basis: bool,
    }

    impl ReducedOrderModel for LinearRom {
        fn offline_phase(&mut self, train: &[Vec<f64>], valid: &[Vec<f64>]) -> Result<()> {
            self.offline_sizes.push(train.len());
            if self.missing_basis {
                return Err(std::io::Error::other("basis file missing").into());
            }
            self.train = train.to_vec();
            self.valid = valid.to_vec();
            Ok(())
        }

        fn online_phase(&mut self) -> Result<OnlineSnapshots> {
            let eval = |xs: &[Vec<f64>]| -> Vec<Vec<f64>> {
                xs.iter().map(|x| vec![2.0 * x[0], 1.0 - x[0]]).collect()
            };
            let mut y_train = eval(&self.train);
            if self.drop_row_on_call == Some(self.offline_sizes.len()) {
                y_train.pop();
            }
            Ok(OnlineSnapshots {
                x_train: self.train.clone(),
                y_train,
                x_valid: self.valid.clone(),
                y_valid: eval(&self.valid),
            })
        }
    }

    fn config(num_init: usize, n_all: usize) -> ActiveLearningConfig {
        let mut config = ActiveLearningConfig::lotka_volterra_quick_preset();
        config.sampling.lower = vec![0.0];
        config.sampling.upper = vec![1.0];
        config.sampling.num_init = num_init;
        config.sampling.num_valid = 8;
        config.sampling.n_all = n_all;
        config.ensemble.num_networks = 2;
        config.ensemble.depths = vec![1, 1];
        config.ensemble.widths = vec![8, 8];
        config.ensemble.activations = vec![ActivationKind::Relu, ActivationKind::Snake];
        config.ensemble.epochs = 3;
        config
    }

    #[test]
    fn test_runs_exact_number_of_iterations() {
        let mut learner = ActiveLearner::with_device(config(10, 13), Device::Cpu).unwrap();
        let mut rom = LinearRom::default();
        let mut reporter = MemoryReporter::default();

        let outcome = learner.run(&mut rom, &mut reporter).unwrap();

        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.training_samples.len(), 13);
        assert_eq!(outcome.adaptive_samples.len(), 3);
        assert_eq!(outcome.train_errors.len(), 3);
        assert_eq!(outcome.final_members.len(), 2);
        assert_eq!(outcome.adaptive_predictions.len(), 3);
        assert_eq!(rom.offline_sizes, vec![10, 11, 12]);
        assert_eq!(learner.phase(), Phase::Done);

        let sizes: Vec<usize> = reporter.iterations.iter().map(|r| r.training_size).collect();
        assert_eq!(sizes, vec![11, 12, 13]);
        assert_eq!(reporter.summary.unwrap().iterations, 3);
    }

    #[test]
    fn test_adaptive_samples_come_from_validation() {
        let mut learner = ActiveLearner::with_device(config(4, 6), Device::Cpu).unwrap();
        let outcome = learner
            .run(&mut LinearRom::default(), &mut MemoryReporter::default())
            .unwrap();

        for sample in &outcome.adaptive_samples {
            assert!(outcome.validation_samples.contains(sample));
        }
        assert_eq!(outcome.training_samples[..4], outcome.initial_samples[..]);
        assert_eq!(outcome.training_samples[4..], outcome.adaptive_samples[..]);
    }

    #[test]
    fn test_no_iterations_when_budget_met() {
        let mut learner = ActiveLearner::with_device(config(5, 5), Device::Cpu).unwrap();
        let mut rom = LinearRom::default();
        let outcome = learner.run(&mut rom, &mut MemoryReporter::default()).unwrap();

        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.training_samples.len(), 5);
        assert!(outcome.final_members.is_empty());
        assert!(rom.offline_sizes.is_empty());
    }

    #[test]
    fn test_malformed_snapshots_abort_before_append() {
        let mut learner = ActiveLearner::with_device(config(6, 9), Device::Cpu).unwrap();
        let mut rom = LinearRom {
            drop_row_on_call: Some(2),
            ..Default::default()
        };
        let mut reporter = MemoryReporter::default();

        let result = learner.run(&mut rom, &mut reporter);

        assert!(matches!(result, Err(SurrogateError::CollaboratorFailure(_))));
        assert_eq!(rom.offline_sizes, vec![6, 7]);
        assert_eq!(reporter.iterations.len(), 1);
        assert_eq!(reporter.iterations[0].training_size, 7);
        assert!(reporter.summary.is_none());
    }

    #[test]
    fn test_rom_errors_become_collaborator_failures() {
        let mut learner = ActiveLearner::with_device(config(6, 9), Device::Cpu).unwrap();
        let mut rom = LinearRom {
            missing_basis: true,
            ..Default::default()
        };
        let mut reporter = MemoryReporter::default();

        match learner.run(&mut rom, &mut reporter) {
            Err(SurrogateError::CollaboratorFailure(msg)) => {
                assert!(msg.contains("offline phase"), "{msg}");
                assert!(msg.contains("basis file missing"), "{msg}");
            }
            Err(e) => panic!("expected a collaborator failure, got {e:?}"),
            Ok(_) => panic!("run should fail"),
        }
        assert_eq!(rom.offline_sizes, vec![6]);
        assert!(reporter.iterations.is_empty());
    }

    #[test]
    fn test_initial_samples_deterministic() {
        let learner = ActiveLearner::with_device(config(6, 9), Device::Cpu).unwrap();
        let (train_a, valid_a) = learner.initial_samples().unwrap();
        let (train_b, valid_b) = learner.initial_samples().unwrap();
        assert_eq!(train_a, train_b);
        assert_eq!(valid_a, valid_b);
        assert_eq!(train_a.len(), 6);
        assert_eq!(valid_a.len(), 8);
        assert_ne!(train_a[..], valid_a[..6]);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut cfg = config(6, 9);
        cfg.sampling.n_all = 3;
        assert!(matches!(
            ActiveLearner::with_device(cfg, Device::Cpu),
            Err(SurrogateError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_force_cpu_env() {
        std::env::set_var(FORCE_CPU_ENV, "1");
        assert!(resolve_device().is_cpu());
    }
}
