//! Training loop of a single ensemble member.
//!
//! Every epoch makes one pass of Adam updates over the training batches and
//! one evaluation pass over the validation batches. The weights with the
//! lowest validation error are kept aside and restored once the full epoch
//! budget has run; training never stops early.

use candle_core::Device;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::EnsembleConfig;
use crate::dataset::{mean, relative_errors, tensor_to_rows, Dataset};
use crate::error::{Result, SurrogateError};
use crate::network::{MemberSpec, ParameterSnapshot, SurrogateNet};

/// Stream offset separating batch shuffling from weight initialization.
const SHUFFLE_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;

/// Hyperparameters shared by all members.
#[derive(Debug, Clone)]
pub struct TrainingOptions {
    /// Full passes over the training set.
    pub epochs: usize,
    /// Batch size as a fraction of each split.
    pub batch_frac: f64,
    /// Adam learning rate.
    pub learning_rate: f64,
    /// Reshuffle training batches each epoch.
    pub shuffle: bool,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            epochs: 500,
            batch_frac: 0.25,
            learning_rate: 7e-4,
            shuffle: true,
        }
    }
}

impl From<&EnsembleConfig> for TrainingOptions {
    fn from(config: &EnsembleConfig) -> Self {
        Self {
            epochs: config.epochs,
            batch_frac: config.batch_frac,
            learning_rate: config.learning_rate,
            shuffle: config.shuffle,
        }
    }
}

/// Errors and loss recorded after one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    /// Zero-based epoch index.
    pub epoch: usize,
    /// Mean MSE over the training batches.
    pub loss: f64,
    /// Mean per-sample relative L2 error on the training split.
    pub train_error: f64,
    /// Mean per-sample relative L2 error on the validation split.
    pub valid_error: f64,
}

struct Checkpoint {
    epoch: usize,
    valid_error: f64,
    weights: ParameterSnapshot,
}

/// A member restored to its best-validation weights.
pub struct TrainedMember {
    /// Position in the ensemble.
    pub index: usize,
    /// Seed its weights were drawn from.
    pub seed: u64,
    /// Epoch whose weights were retained.
    pub best_epoch: usize,
    /// Validation error of the retained weights.
    pub best_valid_error: f64,
    /// Per-epoch history.
    pub history: Vec<EpochMetrics>,
    net: SurrogateNet,
}

impl TrainedMember {
    /// The trained network.
    #[must_use]
    pub fn net(&self) -> &SurrogateNet {
        &self.net
    }

    /// Predict snapshots for parameter rows.
    ///
    /// # Errors
    ///
    /// Returns an error for rows of the wrong width.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.net.predict(rows)
    }

    /// Training error per epoch.
    #[must_use]
    pub fn train_errors(&self) -> Vec<f64> {
        self.history.iter().map(|m| m.train_error).collect()
    }

    /// Validation error per epoch.
    #[must_use]
    pub fn valid_errors(&self) -> Vec<f64> {
        self.history.iter().map(|m| m.valid_error).collect()
    }
}

/// Trains individual members on a fixed device.
///
/// # Example
///
/// ```rust
/// use active_surrogate_rs::dataset::Dataset;
/// use active_surrogate_rs::network::{Activation, MemberSpec};
/// use active_surrogate_rs::trainer::{MemberTrainer, TrainingOptions};
/// use candle_core::Device;
/// use candle_nn::{AdamW, Optimizer, ParamsAdamW};
///
/// # fn main() -> active_surrogate_rs::Result<()> {
/// let xs: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64 / 8.0]).collect();
/// let ys: Vec<Vec<f64>> = xs.iter().map(|x| vec![2.0 * x[0] + 1.0]).collect();
/// let data = Dataset::new(xs, ys)?;
///
/// let trainer = MemberTrainer::new(TrainingOptions { epochs: 5, ..Default::default() }, Device::Cpu);
/// let spec = MemberSpec { depth: 1, width: 8, activation: Activation::Relu };
/// let member = trainer.train(0, spec, 42, &data, &data)?;
/// assert_eq!(member.history.len(), 5);
/// # Ok(())
/// # }
/// ```
pub struct MemberTrainer {
    options: TrainingOptions,
    device: Device,
}

impl MemberTrainer {
    /// Create a trainer.
    #[must_use]
    pub fn new(options: TrainingOptions, device: Device) -> Self {
        Self { options, device }
    }

    /// Train one member for the full epoch budget.
    ///
    /// # Errors
    ///
    /// - [`SurrogateError::NumericalInstability`] if a loss or validation
    ///   error becomes non-finite
    /// - [`SurrogateError::InvalidArgument`] if the splits disagree in width
    /// - candle or optimizer errors
    pub fn train(
        &self,
        index: usize,
        spec: MemberSpec,
        seed: u64,
        train: &Dataset,
        valid: &Dataset,
    ) -> Result<TrainedMember> {
        if train.input_dim() != valid.input_dim() || train.output_dim() != valid.output_dim() {
            return Err(SurrogateError::InvalidArgument(format!(
                "training split is {}→{} but validation split is {}→{}",
                train.input_dim(),
                train.output_dim(),
                valid.input_dim(),
                valid.output_dim()
            )));
        }
        if self.options.epochs == 0 {
            return Err(SurrogateError::InvalidArgument("epochs must be > 0".into()));
        }

        let mut net = SurrogateNet::new(
            train.input_dim(),
            train.output_dim(),
            spec,
            seed,
            &self.device,
        )?;
        // Plain Adam: AdamW without decoupled weight decay.
        let mut optimizer = AdamW::new(
            net.varmap().all_vars(),
            ParamsAdamW {
                lr: self.options.learning_rate,
                weight_decay: 0.0,
                ..ParamsAdamW::default()
            },
        )?;

        let train_tensors = train.to_tensors(&self.device)?;
        let valid_tensors = valid.to_tensors(&self.device)?;
        let train_batch = train.batch_size(self.options.batch_frac);
        let valid_order: Vec<u32> = (0..valid.len() as u32).collect();
        let valid_batches =
            valid_tensors.batches(&valid_order, valid.batch_size(self.options.batch_frac))?;

        let mut order: Vec<u32> = (0..train.len() as u32).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed ^ SHUFFLE_STREAM);
        let mut history = Vec::with_capacity(self.options.epochs);

        tracing::debug!(
            member = index,
            seed,
            params = net.num_parameters(),
            train_batch,
            "training member {:?}",
            spec
        );

        let best = (0..self.options.epochs).try_fold(
            None::<Checkpoint>,
            |best, epoch| -> Result<Option<Checkpoint>> {
                if self.options.shuffle {
                    order.shuffle(&mut rng);
                }

                let mut losses = Vec::new();
                let mut train_errors = Vec::with_capacity(train.len());
                for (x, y) in train_tensors.batches(&order, train_batch)? {
                    let prediction = net.forward(&x)?;
                    let loss = candle_nn::loss::mse(&prediction, &y)?;
                    let loss_value = f64::from(loss.to_scalar::<f32>()?);
                    if !loss_value.is_finite() {
                        return Err(SurrogateError::NumericalInstability {
                            member: index,
                            epoch,
                        });
                    }
                    train_errors.extend(relative_errors(
                        &tensor_to_rows(&y)?,
                        &tensor_to_rows(&prediction)?,
                    ));
                    optimizer.backward_step(&loss)?;
                    losses.push(loss_value);
                }

                let mut valid_errors = Vec::with_capacity(valid.len());
                for (x, y) in &valid_batches {
                    let prediction = net.forward(x)?;
                    valid_errors.extend(relative_errors(
                        &tensor_to_rows(y)?,
                        &tensor_to_rows(&prediction)?,
                    ));
                }

                let metrics = EpochMetrics {
                    epoch,
                    loss: mean(&losses),
                    train_error: mean(&train_errors),
                    valid_error: mean(&valid_errors),
                };
                if !metrics.valid_error.is_finite() {
                    return Err(SurrogateError::NumericalInstability {
                        member: index,
                        epoch,
                    });
                }
                history.push(metrics);

                tracing::trace!(
                    member = index,
                    epoch,
                    loss = metrics.loss,
                    train = metrics.train_error,
                    valid = metrics.valid_error,
                    "epoch finished"
                );

                Ok(match best {
                    Some(kept) if kept.valid_error <= metrics.valid_error => Some(kept),
                    _ => Some(Checkpoint {
                        epoch,
                        valid_error: metrics.valid_error,
                        weights: net.snapshot()?,
                    }),
                })
            },
        )?;

        let best = best.ok_or_else(|| SurrogateError::Training("no epoch was run".into()))?;
        net.restore(&best.weights)?;

        let min_train = history
            .iter()
            .map(|m| m.train_error)
            .fold(f64::INFINITY, f64::min);
        tracing::info!(
            member = index,
            best_epoch = best.epoch,
            "min train error: {:.4e}, min valid error: {:.4e}",
            min_train,
            best.valid_error
        );

        Ok(TrainedMember {
            index,
            seed,
            best_epoch: best.epoch,
            best_valid_error: best.valid_error,
            history,
            net,
        })
    }
}
