//! Reduced-order model and full-order simulator seams.
//!
//! The active-learning loop only talks to a [`ReducedOrderModel`]. The
//! shipped [`SimulatorRom`] evaluates a [`Simulator`] at every sample instead
//! of building a true reduced basis, which is enough to drive the loop end to
//! end with the reference [`LotkaVolterra`] system.

use crate::config::SimulatorConfig;
use crate::error::{Result, SurrogateError};

/// Parameter/snapshot pairs produced by one online phase.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OnlineSnapshots {
    /// Training parameters.
    pub x_train: Vec<Vec<f64>>,
    /// Training snapshots, one per training parameter.
    pub y_train: Vec<Vec<f64>>,
    /// Validation parameters.
    pub x_valid: Vec<Vec<f64>>,
    /// Validation snapshots, one per validation parameter.
    pub y_valid: Vec<Vec<f64>>,
}

impl OnlineSnapshots {
    /// Check that the split sizes match what was handed to the offline
    /// phase and that every value is finite.
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::CollaboratorFailure`] describing the first
    /// problem found.
    pub fn check(&self, num_train: usize, num_valid: usize) -> Result<()> {
        let splits = [
            ("training", &self.x_train, &self.y_train, num_train),
            ("validation", &self.x_valid, &self.y_valid, num_valid),
        ];
        for (name, x, y, expected) in splits {
            if x.len() != expected || y.len() != expected {
                return Err(SurrogateError::CollaboratorFailure(format!(
                    "{name} split has {} parameters and {} snapshots, expected {expected}",
                    x.len(),
                    y.len()
                )));
            }
            if !x.iter().chain(y).flatten().all(|v| v.is_finite()) {
                return Err(SurrogateError::CollaboratorFailure(format!(
                    "{name} split contains non-finite values"
                )));
            }
        }
        Ok(())
    }
}

/// A reduced-order model that turns parameter samples into snapshots.
pub trait ReducedOrderModel {
    /// Build or update the model from the current sample sets.
    ///
    /// # Errors
    ///
    /// Any error aborts the iteration; the driver reports it as
    /// [`SurrogateError::CollaboratorFailure`].
    fn offline_phase(&mut self, train: &[Vec<f64>], valid: &[Vec<f64>]) -> Result<()>;

    /// Evaluate the model at the samples of the last offline phase.
    ///
    /// # Errors
    ///
    /// Any error aborts the iteration; the driver reports it as
    /// [`SurrogateError::CollaboratorFailure`].
    fn online_phase(&mut self) -> Result<OnlineSnapshots>;
}

/// States of a system sampled at evenly spaced sensor times.
///
/// Stored as `dofs × num_sensors`: row `d` is the history of state `d`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    states: Vec<Vec<f64>>,
}

impl Trajectory {
    /// Wrap per-state histories.
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::CollaboratorFailure`] if there are no
    /// states, no sensors, or the histories differ in length.
    pub fn new(states: Vec<Vec<f64>>) -> Result<Self> {
        let sensors = states.first().map_or(0, Vec::len);
        if sensors == 0 || states.iter().any(|s| s.len() != sensors) {
            return Err(SurrogateError::CollaboratorFailure(
                "trajectory must be a non-empty dofs × sensors matrix".into(),
            ));
        }
        Ok(Self { states })
    }

    /// Number of state variables.
    #[must_use]
    pub fn dofs(&self) -> usize {
        self.states.len()
    }

    /// Number of sensor times.
    #[must_use]
    pub fn num_sensors(&self) -> usize {
        self.states[0].len()
    }

    /// History of state `dof`.
    #[must_use]
    pub fn history(&self, dof: usize) -> Option<&[f64]> {
        self.states.get(dof).map(Vec::as_slice)
    }

    /// State vector at the last sensor time.
    #[must_use]
    pub fn final_state(&self) -> Vec<f64> {
        self.states
            .iter()
            .filter_map(|s| s.last().copied())
            .collect()
    }
}

/// A full-order model integrated in time.
pub trait Simulator {
    /// Integrate over `time_grid` from `initial_conditions` and record the
    /// state at `num_sensors` evenly spaced grid points, the last of which is
    /// the final time.
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::CollaboratorFailure`] on bad inputs or a
    /// diverging integration.
    fn snapshot(
        &self,
        parameters: &[f64],
        time_grid: &[f64],
        initial_conditions: &[f64],
        num_sensors: usize,
    ) -> Result<Trajectory>;
}

/// Simulate `new_point` completed with `fixed_parameters` and return the
/// final state.
///
/// # Errors
///
/// Propagates simulator errors.
pub fn generate_snapshot<S: Simulator + ?Sized>(
    simulator: &S,
    new_point: &[f64],
    time_grid: &[f64],
    initial_conditions: &[f64],
    num_sensors: usize,
    fixed_parameters: &[f64],
) -> Result<Vec<f64>> {
    let parameters: Vec<f64> = new_point.iter().chain(fixed_parameters).copied().collect();
    let trajectory = simulator.snapshot(&parameters, time_grid, initial_conditions, num_sensors)?;
    Ok(trajectory.final_state())
}

/// Classic Lotka-Volterra predator/prey system.
///
/// With parameters `[α, β, γ, δ]` and state `(x, y)`:
///
/// ```text
/// x' = αx − βxy
/// y' = δxy − γy
/// ```
///
/// Integrated with fixed-step fourth-order Runge-Kutta on the given grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct LotkaVolterra;

impl LotkaVolterra {
    fn rhs(p: &[f64; 4], s: [f64; 2]) -> [f64; 2] {
        let [alpha, beta, gamma, delta] = *p;
        let [x, y] = s;
        [alpha * x - beta * x * y, delta * x * y - gamma * y]
    }

    fn rk4(p: &[f64; 4], s: [f64; 2], h: f64) -> [f64; 2] {
        let shift = |s: [f64; 2], k: [f64; 2], f: f64| [s[0] + f * k[0], s[1] + f * k[1]];
        let k1 = Self::rhs(p, s);
        let k2 = Self::rhs(p, shift(s, k1, h / 2.0));
        let k3 = Self::rhs(p, shift(s, k2, h / 2.0));
        let k4 = Self::rhs(p, shift(s, k3, h));
        [
            s[0] + h / 6.0 * (k1[0] + 2.0 * k2[0] + 2.0 * k3[0] + k4[0]),
            s[1] + h / 6.0 * (k1[1] + 2.0 * k2[1] + 2.0 * k3[1] + k4[1]),
        ]
    }
}

impl Simulator for LotkaVolterra {
    fn snapshot(
        &self,
        parameters: &[f64],
        time_grid: &[f64],
        initial_conditions: &[f64],
        num_sensors: usize,
    ) -> Result<Trajectory> {
        let p: [f64; 4] = parameters.try_into().map_err(|_| {
            SurrogateError::CollaboratorFailure(format!(
                "Lotka-Volterra takes 4 parameters, got {}",
                parameters.len()
            ))
        })?;
        let mut state: [f64; 2] = initial_conditions.try_into().map_err(|_| {
            SurrogateError::CollaboratorFailure(format!(
                "Lotka-Volterra takes 2 initial conditions, got {}",
                initial_conditions.len()
            ))
        })?;
        if time_grid.len() < 2 || num_sensors == 0 {
            return Err(SurrogateError::CollaboratorFailure(
                "need at least two time points and one sensor".into(),
            ));
        }

        let sensors = sensor_indices(time_grid.len(), num_sensors);
        let mut history = vec![Vec::with_capacity(num_sensors); 2];
        let mut next = sensors.iter().peekable();

        for (i, window) in std::iter::once(None)
            .chain(time_grid.windows(2).map(Some))
            .enumerate()
        {
            if let Some(w) = window {
                state = Self::rk4(&p, state, w[1] - w[0]);
                if !(state[0].is_finite() && state[1].is_finite()) {
                    return Err(SurrogateError::CollaboratorFailure(format!(
                        "Lotka-Volterra diverged at t = {}",
                        w[1]
                    )));
                }
            }
            while next.next_if(|&&s| s == i).is_some() {
                history[0].push(state[0]);
                history[1].push(state[1]);
            }
        }

        Trajectory::new(history)
    }
}

/// `count` grid indices evenly spread over `0..len`, ending at `len - 1`.
fn sensor_indices(len: usize, count: usize) -> Vec<usize> {
    if count == 1 {
        return vec![len - 1];
    }
    (0..count)
        .map(|k| ((k * (len - 1)) as f64 / (count - 1) as f64).round() as usize)
        .collect()
}

/// A [`ReducedOrderModel`] that evaluates a [`Simulator`] at every sample.
pub struct SimulatorRom<S> {
    simulator: S,
    settings: SimulatorConfig,
    time_grid: Vec<f64>,
    train: Vec<Vec<f64>>,
    valid: Vec<Vec<f64>>,
    prepared: bool,
}

impl<S: Simulator> SimulatorRom<S> {
    /// Wrap `simulator` with fixed parameters, initial conditions and time
    /// grid taken from `settings`.
    pub fn new(simulator: S, settings: SimulatorConfig) -> Self {
        let time_grid = settings.time_grid();
        Self {
            simulator,
            settings,
            time_grid,
            train: Vec::new(),
            valid: Vec::new(),
            prepared: false,
        }
    }

    fn evaluate(&self, points: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        points
            .iter()
            .map(|point| {
                generate_snapshot(
                    &self.simulator,
                    point,
                    &self.time_grid,
                    &self.settings.initial_conditions,
                    self.settings.num_sensors,
                    &self.settings.fixed_parameters,
                )
            })
            .collect()
    }
}

impl<S: Simulator> ReducedOrderModel for SimulatorRom<S> {
    fn offline_phase(&mut self, train: &[Vec<f64>], valid: &[Vec<f64>]) -> Result<()> {
        tracing::debug!(train = train.len(), valid = valid.len(), "offline phase");
        self.train = train.to_vec();
        self.valid = valid.to_vec();
        self.prepared = true;
        Ok(())
    }

    fn online_phase(&mut self) -> Result<OnlineSnapshots> {
        if !self.prepared {
            return Err(SurrogateError::CollaboratorFailure(
                "online phase requested before offline phase".into(),
            ));
        }
        Ok(OnlineSnapshots {
            y_train: self.evaluate(&self.train)?,
            y_valid: self.evaluate(&self.valid)?,
            x_train: self.train.clone(),
            x_valid: self.valid.clone(),
        })
    }
}
