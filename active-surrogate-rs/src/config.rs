//! Configuration parsing and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SurrogateError};
use crate::network::{Activation, MemberSpec};

/// Main configuration for an active learning run.
///
/// # Example
///
/// ```rust
/// use active_surrogate_rs::ActiveLearningConfig;
///
/// # fn main() -> active_surrogate_rs::Result<()> {
/// let config = ActiveLearningConfig::from_preset("lotka-volterra")?;
/// config.validate()?;
/// assert_eq!(config.sampling.dimension, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveLearningConfig {
    /// Parameter-space sampling and budget.
    pub sampling: SamplingConfig,

    /// Ensemble architecture and training hyperparameters.
    pub ensemble: EnsembleConfig,

    /// Reference simulator used by the `run` command.
    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Directory for iteration reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Random seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_output_dir() -> String {
    "./outputs".into()
}

fn default_seed() -> u64 {
    42
}

/// Parameter-space bounds and sampling budget.
///
/// # Example
///
/// ```rust
/// use active_surrogate_rs::config::SamplingConfig;
///
/// let sampling = SamplingConfig {
///     dimension: 1,
///     lower: vec![0.5],
///     upper: vec![1.5],
///     num_init: 10,
///     num_valid: 100,
///     n_all: 13,
/// };
///
/// assert_eq!(sampling.n_all - sampling.num_init, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Dimensionality of the varied parameter space.
    pub dimension: usize,

    /// Lower bound per dimension.
    pub lower: Vec<f64>,

    /// Upper bound per dimension.
    pub upper: Vec<f64>,

    /// Number of initial LHS training samples.
    #[serde(default = "default_num_init")]
    pub num_init: usize,

    /// Size of the fixed validation set.
    #[serde(default = "default_num_valid")]
    pub num_valid: usize,

    /// Final training set size.
    #[serde(default = "default_n_all")]
    pub n_all: usize,
}

fn default_num_init() -> usize {
    10
}
fn default_num_valid() -> usize {
    100
}
fn default_n_all() -> usize {
    20
}

/// Activation function kind of an ensemble member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationKind {
    /// Rectified linear unit.
    #[default]
    Relu,
    /// Periodic `x + sin²(αx)/α` activation.
    Snake,
}

/// Ensemble architecture and training hyperparameters.
///
/// Member `i` uses `depths[i]`, `widths[i]` and `activations[i]`.
///
/// # Example
///
/// ```rust
/// use active_surrogate_rs::config::{ActivationKind, EnsembleConfig};
///
/// let ensemble = EnsembleConfig {
///     num_networks: 2,
///     depths: vec![1, 2],
///     widths: vec![16, 32],
///     activations: vec![ActivationKind::Relu, ActivationKind::Snake],
///     ..Default::default()
/// };
///
/// assert_eq!(ensemble.member_specs().unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Number of ensemble members.
    #[serde(default = "default_num_networks")]
    pub num_networks: usize,

    /// Input width (number of varied parameters).
    #[serde(default = "default_num_params")]
    pub num_params: usize,

    /// Output width (state dimension of the system).
    #[serde(default = "default_dofs")]
    pub dofs: usize,

    /// Hidden depth per member.
    pub depths: Vec<usize>,

    /// Hidden width per member.
    pub widths: Vec<usize>,

    /// Activation per member.
    pub activations: Vec<ActivationKind>,

    /// Frequency of the snake activation.
    #[serde(default = "default_snake_alpha")]
    pub snake_alpha: f64,

    /// Training epochs per member.
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// Mini-batch size as a fraction of each split.
    #[serde(default = "default_batch_frac")]
    pub batch_frac: f64,

    /// Adam learning rate.
    #[serde(default = "default_lr")]
    pub learning_rate: f64,

    /// Reshuffle training batches every epoch.
    #[serde(default = "default_true")]
    pub shuffle: bool,
}

fn default_num_networks() -> usize {
    5
}
fn default_num_params() -> usize {
    1
}
fn default_dofs() -> usize {
    2
}
fn default_snake_alpha() -> f64 {
    0.5
}
fn default_epochs() -> usize {
    500
}
fn default_batch_frac() -> f64 {
    0.25
}
fn default_lr() -> f64 {
    7e-4
}
fn default_true() -> bool {
    true
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            num_networks: default_num_networks(),
            num_params: default_num_params(),
            dofs: default_dofs(),
            depths: vec![2, 2, 3, 3, 4],
            widths: vec![32, 64, 32, 64, 32],
            activations: vec![
                ActivationKind::Snake,
                ActivationKind::Relu,
                ActivationKind::Snake,
                ActivationKind::Relu,
                ActivationKind::Snake,
            ],
            snake_alpha: default_snake_alpha(),
            epochs: default_epochs(),
            batch_frac: default_batch_frac(),
            learning_rate: default_lr(),
            shuffle: true,
        }
    }
}

impl EnsembleConfig {
    /// Per-member architectures.
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::InvalidArgument`] when there are no members or
    /// when any of the depth, width or activation lists is shorter than
    /// `num_networks`.
    pub fn member_specs(&self) -> Result<Vec<MemberSpec>> {
        if self.num_networks == 0 {
            return Err(SurrogateError::InvalidArgument(
                "ensemble.num_networks must be > 0".into(),
            ));
        }
        for (name, len) in [
            ("depths", self.depths.len()),
            ("widths", self.widths.len()),
            ("activations", self.activations.len()),
        ] {
            if len < self.num_networks {
                return Err(SurrogateError::InvalidArgument(format!(
                    "ensemble.{name} has {len} entries but num_networks is {}",
                    self.num_networks
                )));
            }
        }

        (0..self.num_networks)
            .map(|i| {
                if self.widths[i] == 0 {
                    return Err(SurrogateError::InvalidArgument(format!(
                        "ensemble.widths[{i}] must be > 0"
                    )));
                }
                let activation = match self.activations[i] {
                    ActivationKind::Relu => Activation::Relu,
                    ActivationKind::Snake => Activation::Snake {
                        alpha: self.snake_alpha,
                    },
                };
                Ok(MemberSpec {
                    depth: self.depths[i],
                    width: self.widths[i],
                    activation,
                })
            })
            .collect()
    }

    /// Validate training hyperparameters and member lists.
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::InvalidArgument`] describing the first
    /// offending field.
    pub fn validate(&self) -> Result<()> {
        self.member_specs()?;

        if self.num_params == 0 || self.dofs == 0 {
            return Err(SurrogateError::InvalidArgument(
                "ensemble.num_params and ensemble.dofs must be > 0".into(),
            ));
        }
        if self.epochs == 0 {
            return Err(SurrogateError::InvalidArgument(
                "ensemble.epochs must be > 0".into(),
            ));
        }
        if !(self.batch_frac > 0.0 && self.batch_frac <= 1.0) {
            return Err(SurrogateError::InvalidArgument(format!(
                "ensemble.batch_frac must be in (0, 1], got {}",
                self.batch_frac
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(SurrogateError::InvalidArgument(
                "ensemble.learning_rate must be a positive number".into(),
            ));
        }
        if !(self.snake_alpha.is_finite() && self.snake_alpha > 0.0) {
            return Err(SurrogateError::InvalidArgument(
                "ensemble.snake_alpha must be a positive number".into(),
            ));
        }
        Ok(())
    }
}

/// Settings of the reference Lotka-Volterra simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Parameters appended after the sampled ones (`[β, γ, δ]` when only `α` varies).
    #[serde(default = "default_fixed_parameters")]
    pub fixed_parameters: Vec<f64>,

    /// Initial prey and predator populations.
    #[serde(default = "default_initial_conditions")]
    pub initial_conditions: Vec<f64>,

    /// Final simulation time.
    #[serde(default = "default_final_time")]
    pub final_time: f64,

    /// RK4 steps between `0` and `final_time`.
    #[serde(default = "default_time_steps")]
    pub time_steps: usize,

    /// Number of recorded time slices.
    #[serde(default = "default_num_sensors")]
    pub num_sensors: usize,
}

fn default_fixed_parameters() -> Vec<f64> {
    vec![0.4, 0.4, 0.1]
}
fn default_initial_conditions() -> Vec<f64> {
    vec![10.0, 10.0]
}
fn default_final_time() -> f64 {
    10.0
}
fn default_time_steps() -> usize {
    1000
}
fn default_num_sensors() -> usize {
    100
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            fixed_parameters: default_fixed_parameters(),
            initial_conditions: default_initial_conditions(),
            final_time: default_final_time(),
            time_steps: default_time_steps(),
            num_sensors: default_num_sensors(),
        }
    }
}

impl SimulatorConfig {
    /// Evenly spaced integration grid on `[0, final_time]`.
    #[must_use]
    pub fn time_grid(&self) -> Vec<f64> {
        let steps = self.time_steps.max(1);
        (0..=steps)
            .map(|i| self.final_time * i as f64 / steps as f64)
            .collect()
    }
}

impl ActiveLearningConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create a configuration from a preset.
    ///
    /// Available presets:
    /// - `"lotka-volterra"` - five mixed ReLU/snake members, 500 epochs
    /// - `"lotka-volterra-quick"` - three small members, for smoke runs
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::Config`] for an unknown preset name.
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "lotka-volterra" => Ok(Self::lotka_volterra_preset()),
            "lotka-volterra-quick" => Ok(Self::lotka_volterra_quick_preset()),
            _ => Err(SurrogateError::Config(format!("Unknown preset: {preset}"))),
        }
    }

    /// Lotka-Volterra with the prey growth rate `α` varied.
    #[must_use]
    pub fn lotka_volterra_preset() -> Self {
        Self {
            sampling: SamplingConfig {
                dimension: 1,
                lower: vec![0.5],
                upper: vec![1.5],
                num_init: default_num_init(),
                num_valid: default_num_valid(),
                n_all: default_n_all(),
            },
            ensemble: EnsembleConfig::default(),
            simulator: SimulatorConfig::default(),
            output_dir: "./outputs/lotka-volterra".into(),
            seed: 42,
        }
    }

    /// Small and fast variant of [`Self::lotka_volterra_preset`].
    #[must_use]
    pub fn lotka_volterra_quick_preset() -> Self {
        Self {
            sampling: SamplingConfig {
                dimension: 1,
                lower: vec![0.5],
                upper: vec![1.5],
                num_init: 6,
                num_valid: 30,
                n_all: 9,
            },
            ensemble: EnsembleConfig {
                num_networks: 3,
                depths: vec![1, 1, 2],
                widths: vec![16, 16, 16],
                activations: vec![
                    ActivationKind::Relu,
                    ActivationKind::Snake,
                    ActivationKind::Snake,
                ],
                epochs: 50,
                batch_frac: 0.5,
                ..Default::default()
            },
            simulator: SimulatorConfig {
                time_steps: 200,
                num_sensors: 20,
                ..Default::default()
            },
            output_dir: "./outputs/lotka-volterra-quick".into(),
            seed: 7,
        }
    }

    /// Validate the configuration.
    ///
    /// Checks for:
    /// - well-formed bounds (`lower < upper` in every dimension)
    /// - positive sample counts and `n_all >= num_init`
    /// - an ensemble whose member lists cover `num_networks`
    /// - `ensemble.num_params == sampling.dimension`
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::InvalidArgument`] describing the problem.
    pub fn validate(&self) -> Result<()> {
        let s = &self.sampling;
        crate::sampler::check_bounds(s.dimension, &s.lower, &s.upper)?;

        if s.num_init == 0 || s.num_valid == 0 {
            return Err(SurrogateError::InvalidArgument(
                "sampling.num_init and sampling.num_valid must be > 0".into(),
            ));
        }
        if s.n_all < s.num_init {
            return Err(SurrogateError::InvalidArgument(format!(
                "sampling.n_all ({}) must be >= sampling.num_init ({})",
                s.n_all, s.num_init
            )));
        }

        self.ensemble.validate()?;

        if self.ensemble.num_params != s.dimension {
            return Err(SurrogateError::InvalidArgument(format!(
                "ensemble.num_params ({}) must equal sampling.dimension ({})",
                self.ensemble.num_params, s.dimension
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_serialization() {
        let config = ActiveLearningConfig::lotka_volterra_preset();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let restored: ActiveLearningConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.sampling.lower, restored.sampling.lower);
        assert_eq!(config.ensemble.activations, restored.ensemble.activations);
    }

    #[test]
    fn test_presets() {
        assert!(ActiveLearningConfig::from_preset("lotka-volterra").is_ok());
        assert!(ActiveLearningConfig::from_preset("lotka-volterra-quick").is_ok());
        assert!(ActiveLearningConfig::from_preset("invalid").is_err());
    }

    #[test]
    fn test_presets_validate() {
        for preset in ["lotka-volterra", "lotka-volterra-quick"] {
            let config = ActiveLearningConfig::from_preset(preset).unwrap();
            assert!(config.validate().is_ok(), "{preset} should validate");
        }
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = ActiveLearningConfig::lotka_volterra_preset();
        config.sampling.lower = vec![2.0];
        assert!(matches!(
            config.validate(),
            Err(SurrogateError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_budget_below_initial_rejected() {
        let mut config = ActiveLearningConfig::lotka_volterra_preset();
        config.sampling.n_all = config.sampling.num_init - 1;
        assert!(config.validate().is_err());

        config.sampling.n_all = config.sampling.num_init;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_member_lists_rejected() {
        let mut config = ActiveLearningConfig::lotka_volterra_preset();
        config.ensemble.num_networks = 6;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SurrogateError::InvalidArgument(_)));
        assert!(err.to_string().contains("depths"));
    }

    #[test]
    fn test_member_specs_map_snake_alpha() {
        let ensemble = EnsembleConfig {
            num_networks: 2,
            depths: vec![1, 3],
            widths: vec![8, 4],
            activations: vec![ActivationKind::Relu, ActivationKind::Snake],
            snake_alpha: 0.25,
            ..Default::default()
        };
        let specs = ensemble.member_specs().unwrap();
        assert_eq!(specs[0].activation, Activation::Relu);
        assert_eq!(specs[1].activation, Activation::Snake { alpha: 0.25 });
        assert_eq!(specs[1].depth, 3);
        assert_eq!(specs[1].width, 4);
    }

    #[test]
    fn test_batch_frac_bounds() {
        let mut ensemble = EnsembleConfig::default();
        ensemble.batch_frac = 0.0;
        assert!(ensemble.validate().is_err());
        ensemble.batch_frac = 1.5;
        assert!(ensemble.validate().is_err());
        ensemble.batch_frac = 1.0;
        assert!(ensemble.validate().is_ok());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut config = ActiveLearningConfig::lotka_volterra_preset();
        config.ensemble.num_params = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_applies_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
sampling:
  dimension: 1
  lower: [0.0]
  upper: [1.0]
ensemble:
  num_networks: 1
  depths: [1]
  widths: [8]
  activations: [snake]
"#
        )
        .unwrap();

        let config = ActiveLearningConfig::from_file(file.path()).unwrap();
        assert_eq!(config.sampling.num_init, 10);
        assert_eq!(config.sampling.n_all, 20);
        assert_eq!(config.ensemble.learning_rate, 7e-4);
        assert_eq!(config.ensemble.snake_alpha, 0.5);
        assert_eq!(config.ensemble.activations, vec![ActivationKind::Snake]);
        assert_eq!(config.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_file_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let config = ActiveLearningConfig::lotka_volterra_quick_preset();
        config.to_file(file.path()).unwrap();

        let loaded = ActiveLearningConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.ensemble.num_networks, 3);
        assert_eq!(loaded.sampling.n_all, 9);
    }

    #[test]
    fn test_time_grid_endpoints() {
        let sim = SimulatorConfig {
            final_time: 2.0,
            time_steps: 4,
            ..Default::default()
        };
        assert_eq!(sim.time_grid(), vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    }
}
