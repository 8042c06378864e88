//! Ensemble training and uncertainty-driven sample acquisition.
//!
//! All members are trained independently on the same split. Their
//! disagreement on the validation inputs is the uncertainty estimate: the
//! pointwise population variance of the member predictions, reduced to one
//! scalar per input by taking the most uncertain output channel. The input
//! with the largest reduced variance is proposed as the next sample.

use candle_core::Device;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::EnsembleConfig;
use crate::dataset::{mean, mean_relative_error, sorted_by_leading_dimension, Dataset};
use crate::error::{Result, SurrogateError};
use crate::network::MemberSpec;
use crate::trainer::{MemberTrainer, TrainedMember, TrainingOptions};

/// Pointwise statistics of member predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleStatistics {
    /// Mean prediction, `(points, outputs)`.
    pub mean: Vec<Vec<f64>>,
    /// Population variance, `(points, outputs)`.
    pub variance: Vec<Vec<f64>>,
    /// Per-point maximum of `variance` over outputs.
    pub max_variance: Vec<f64>,
    /// Index of the largest `max_variance` (first on ties).
    pub argmax: usize,
}

/// Aggregate per-member predictions, each shaped `(points, outputs)`.
///
/// # Example
///
/// ```rust
/// use active_surrogate_rs::ensemble::aggregate;
///
/// # fn main() -> active_surrogate_rs::Result<()> {
/// let stats = aggregate(&[
///     vec![vec![1.0, 0.0], vec![2.0, 2.0]],
///     vec![vec![3.0, 0.0], vec![2.0, 2.0]],
/// ])?;
/// assert_eq!(stats.mean[0], vec![2.0, 0.0]);
/// assert_eq!(stats.max_variance, vec![1.0, 0.0]);
/// assert_eq!(stats.argmax, 0);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`SurrogateError::InvalidArgument`] if there are no predictions
/// or their shapes differ.
pub fn aggregate(predictions: &[Vec<Vec<f64>>]) -> Result<EnsembleStatistics> {
    let first = predictions.first().ok_or_else(|| {
        SurrogateError::InvalidArgument("no member predictions to aggregate".into())
    })?;
    let points = first.len();
    let outputs = first.first().map_or(0, Vec::len);
    if points == 0 || outputs == 0 {
        return Err(SurrogateError::InvalidArgument(
            "member predictions are empty".into(),
        ));
    }
    let shape_ok = predictions
        .iter()
        .all(|p| p.len() == points && p.iter().all(|row| row.len() == outputs));
    if !shape_ok {
        return Err(SurrogateError::InvalidArgument(
            "member predictions differ in shape".into(),
        ));
    }

    let members = predictions.len() as f64;
    let mut mean = vec![vec![0.0; outputs]; points];
    let mut variance = vec![vec![0.0; outputs]; points];

    for i in 0..points {
        for j in 0..outputs {
            let mu = predictions.iter().map(|p| p[i][j]).sum::<f64>() / members;
            let var = predictions
                .iter()
                .map(|p| (p[i][j] - mu) * (p[i][j] - mu))
                .sum::<f64>()
                / members;
            mean[i][j] = mu;
            variance[i][j] = var;
        }
    }

    let max_variance: Vec<f64> = variance
        .iter()
        .map(|row| row.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        .collect();

    let argmax = max_variance
        .iter()
        .enumerate()
        .fold(0, |best, (i, &v)| if v > max_variance[best] { i } else { best });

    Ok(EnsembleStatistics {
        mean,
        variance,
        max_variance,
        argmax,
    })
}

/// Result of one [`EnsembleTrainer::train_ensemble`] call.
pub struct EnsembleOutcome {
    /// Validation input with the largest reduced variance.
    pub next_sample: Vec<f64>,
    /// Ensemble mean prediction at `next_sample`.
    pub next_sample_prediction: Vec<f64>,
    /// Validation inputs sorted along the first dimension.
    pub sorted_validation: Vec<Vec<f64>>,
    /// Mean prediction at each sorted validation input.
    pub mean: Vec<Vec<f64>>,
    /// Reduced variance at each sorted validation input.
    pub variance: Vec<f64>,
    /// Training relative error averaged across members.
    pub mean_train_error: f64,
    /// Validation relative error averaged across members.
    pub mean_valid_error: f64,
    /// Members that finished training.
    pub members: Vec<TrainedMember>,
    /// Indices of members dropped for numerical instability.
    pub failed_members: Vec<usize>,
}

/// Trains a heterogeneous ensemble of surrogate networks.
///
/// # Example
///
/// ```no_run
/// use active_surrogate_rs::config::EnsembleConfig;
/// use active_surrogate_rs::ensemble::EnsembleTrainer;
/// use candle_core::Device;
///
/// # fn main() -> active_surrogate_rs::Result<()> {
/// let mut ensemble = EnsembleTrainer::new(EnsembleConfig::default(), 42, Device::Cpu)?;
/// let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64 / 10.0]).collect();
/// let y: Vec<Vec<f64>> = x.iter().map(|p| vec![p[0].sin(), p[0].cos()]).collect();
///
/// let outcome = ensemble.train_ensemble(&x, &y, &x, &y)?;
/// println!("next sample: {:?}", outcome.next_sample);
/// # Ok(())
/// # }
/// ```
pub struct EnsembleTrainer {
    config: EnsembleConfig,
    specs: Vec<MemberSpec>,
    trainer: MemberTrainer,
    seed: u64,
    times_run: u64,
    show_progress: bool,
}

impl EnsembleTrainer {
    /// Create an ensemble trainer.
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::InvalidArgument`] if the configuration lists
    /// fewer depths, widths or activations than `num_networks`, or any
    /// hyperparameter is out of range.
    pub fn new(config: EnsembleConfig, seed: u64, device: Device) -> Result<Self> {
        config.validate()?;
        let specs = config.member_specs()?;
        let trainer = MemberTrainer::new(TrainingOptions::from(&config), device);
        Ok(Self {
            config,
            specs,
            trainer,
            seed,
            times_run: 0,
            show_progress: false,
        })
    }

    /// Show a progress bar over members.
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Completed [`Self::train_ensemble`] calls.
    #[must_use]
    pub fn times_run(&self) -> u64 {
        self.times_run
    }

    /// Train every member on one split and propose the next sample.
    ///
    /// Members are retrained from scratch with fresh seeds on every call.
    /// Validation errors are computed in the given order; the returned
    /// `mean`/`variance` curves follow `sorted_validation`.
    ///
    /// # Errors
    ///
    /// - [`SurrogateError::InvalidArgument`] for malformed or mis-sized data
    /// - [`SurrogateError::NumericalInstability`] if every member diverged
    /// - any other member training error
    pub fn train_ensemble(
        &mut self,
        x_train: &[Vec<f64>],
        y_train: &[Vec<f64>],
        x_valid: &[Vec<f64>],
        y_valid: &[Vec<f64>],
    ) -> Result<EnsembleOutcome> {
        self.train_ensemble_with(
            x_train,
            y_train,
            x_valid,
            y_valid,
            |trainer, index, spec, seed, train, valid| {
                trainer.train(index, spec, seed, train, valid)
            },
        )
    }

    /// [`Self::train_ensemble`] with member training routed through
    /// `train_member`.
    pub(crate) fn train_ensemble_with<F>(
        &mut self,
        x_train: &[Vec<f64>],
        y_train: &[Vec<f64>],
        x_valid: &[Vec<f64>],
        y_valid: &[Vec<f64>],
        mut train_member: F,
    ) -> Result<EnsembleOutcome>
    where
        F: FnMut(&MemberTrainer, usize, MemberSpec, u64, &Dataset, &Dataset) -> Result<TrainedMember>,
    {
        let train = Dataset::new(x_train.to_vec(), y_train.to_vec())?;
        let valid = Dataset::new(x_valid.to_vec(), y_valid.to_vec())?;
        for (name, data) in [("training", &train), ("validation", &valid)] {
            if data.input_dim() != self.config.num_params || data.output_dim() != self.config.dofs
            {
                return Err(SurrogateError::InvalidArgument(format!(
                    "{name} data is {}→{}, ensemble expects {}→{}",
                    data.input_dim(),
                    data.output_dim(),
                    self.config.num_params,
                    self.config.dofs
                )));
            }
        }

        self.times_run += 1;
        let mut seeder = ChaCha8Rng::seed_from_u64(self.seed);
        seeder.set_stream(self.times_run);

        let pb = if self.show_progress {
            ProgressBar::new(self.specs.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos:>3}/{len:3} {msg}")?
                .progress_chars("#>-"),
        );

        let mut members = Vec::with_capacity(self.specs.len());
        let mut failed_members = Vec::new();
        let mut last_failure = None;
        for (index, &spec) in self.specs.iter().enumerate() {
            let member_seed: u64 = seeder.random();
            pb.set_message(format!("member {index}"));
            match train_member(&self.trainer, index, spec, member_seed, &train, &valid) {
                Ok(member) => members.push(member),
                Err(err @ SurrogateError::NumericalInstability { member, epoch }) => {
                    tracing::warn!(member, epoch, "dropping member after non-finite loss");
                    failed_members.push(member);
                    last_failure = Some(err);
                }
                Err(e) => return Err(e),
            }
            pb.inc(1);
        }
        pb.finish_with_message("ensemble trained");

        if let (true, Some(err)) = (members.is_empty(), last_failure) {
            return Err(err);
        }

        let mut train_errors = Vec::with_capacity(members.len());
        let mut valid_errors = Vec::with_capacity(members.len());
        for member in &members {
            train_errors.push(mean_relative_error(
                train.targets(),
                &member.predict(train.inputs())?,
            ));
            valid_errors.push(mean_relative_error(
                valid.targets(),
                &member.predict(valid.inputs())?,
            ));
        }

        let sorted_validation = sorted_by_leading_dimension(valid.inputs());
        let predictions = members
            .iter()
            .map(|m| m.predict(&sorted_validation))
            .collect::<Result<Vec<_>>>()?;
        let stats = aggregate(&predictions)?;

        let outcome = EnsembleOutcome {
            next_sample: sorted_validation[stats.argmax].clone(),
            next_sample_prediction: stats.mean[stats.argmax].clone(),
            sorted_validation,
            mean: stats.mean,
            variance: stats.max_variance,
            mean_train_error: mean(&train_errors),
            mean_valid_error: mean(&valid_errors),
            members,
            failed_members,
        };

        tracing::info!(
            run = self.times_run,
            members = outcome.members.len(),
            train_error = outcome.mean_train_error,
            valid_error = outcome.mean_valid_error,
            "ensemble proposes {:?}",
            outcome.next_sample
        );

        Ok(outcome)
    }
}
