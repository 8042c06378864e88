//! Feed-forward surrogate network mapping parameter vectors to state vectors.
//!
//! The stack is `Linear(d → w)`, `depth` × `Linear(w → w)`, each followed by
//! the member's activation, then a linear output layer `Linear(w → k)` and a
//! learned per-output bias added after the stack.

use std::collections::HashMap;

use candle_core::{DType, Device, Shape, Tensor};
use candle_nn::{Init, Linear, Module, VarBuilder, VarMap};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::dataset::{rows_to_tensor, tensor_to_rows};
use crate::error::{Result, SurrogateError};

const OUTPUT_BIAS: &str = "output_bias";

/// Nonlinearity applied after every hidden layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    /// `max(0, x)`.
    Relu,
    /// `x + sin²(αx) / α`, suited to oscillatory targets.
    Snake {
        /// Assumed frequency of the data.
        alpha: f64,
    },
}

impl Module for Activation {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match *self {
            Activation::Relu => xs.relu(),
            Activation::Snake { alpha } => {
                let periodic = xs.affine(alpha, 0.0)?.sin()?.sqr()?.affine(1.0 / alpha, 0.0)?;
                xs.add(&periodic)
            }
        }
    }
}

/// Architecture of one ensemble member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberSpec {
    /// Number of `width → width` hidden layers after the input layer.
    pub depth: usize,
    /// Units per hidden layer.
    pub width: usize,
    /// Hidden nonlinearity.
    pub activation: Activation,
}

/// Deep copy of every parameter of a [`SurrogateNet`].
#[derive(Debug, Clone)]
pub struct ParameterSnapshot {
    tensors: HashMap<String, Tensor>,
}

/// Feed-forward regressor `R^d → R^k`.
///
/// # Example
///
/// ```rust
/// use active_surrogate_rs::network::{Activation, MemberSpec, SurrogateNet};
/// use candle_core::Device;
///
/// # fn main() -> active_surrogate_rs::Result<()> {
/// let spec = MemberSpec { depth: 2, width: 16, activation: Activation::Snake { alpha: 0.5 } };
/// let net = SurrogateNet::new(1, 2, spec, 7, &Device::Cpu)?;
///
/// let out = net.predict(&[vec![0.3], vec![0.9]])?;
/// assert_eq!(out.len(), 2);
/// assert_eq!(out[0].len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct SurrogateNet {
    spec: MemberSpec,
    num_inputs: usize,
    num_outputs: usize,
    hidden: Vec<Linear>,
    output: Linear,
    output_bias: Tensor,
    varmap: VarMap,
    device: Device,
}

impl SurrogateNet {
    /// Build a network and draw its initial weights from `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::InvalidArgument`] for zero input, output or
    /// hidden widths, or a candle error if parameter allocation fails.
    pub fn new(
        num_inputs: usize,
        num_outputs: usize,
        spec: MemberSpec,
        seed: u64,
        device: &Device,
    ) -> Result<Self> {
        if num_inputs == 0 || num_outputs == 0 || spec.width == 0 {
            return Err(SurrogateError::InvalidArgument(format!(
                "network widths must be > 0 (inputs {num_inputs}, outputs {num_outputs}, hidden {})",
                spec.width
            )));
        }

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);

        let dims = layer_dims(num_inputs, num_outputs, &spec);
        let mut layers = Vec::with_capacity(dims.len());
        for (i, &(fan_in, fan_out)) in dims.iter().enumerate() {
            let lvb = vb.pp(format!("layer{i}"));
            let weight = lvb.get_with_hints((fan_out, fan_in), "weight", Init::Const(0.0))?;
            let bias = lvb.get_with_hints(fan_out, "bias", Init::Const(0.0))?;
            layers.push(Linear::new(weight, Some(bias)));
        }
        let output_bias = vb.get_with_hints(num_outputs, OUTPUT_BIAS, Init::Const(0.0))?;

        let output = layers
            .pop()
            .ok_or_else(|| SurrogateError::Training("network has no output layer".into()))?;

        let mut net = Self {
            spec,
            num_inputs,
            num_outputs,
            hidden: layers,
            output,
            output_bias,
            varmap,
            device: device.clone(),
        };
        net.reinitialize(seed)?;
        Ok(net)
    }

    /// Redraw every weight from `seed`.
    ///
    /// Weights are Xavier-uniform, layer biases uniform in `±1/sqrt(fan_in)`,
    /// and the output bias is reset to zero.
    ///
    /// # Errors
    ///
    /// Returns a candle error if a parameter cannot be written.
    pub fn reinitialize(&mut self, seed: u64) -> Result<()> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        for (i, (fan_in, fan_out)) in layer_dims(self.num_inputs, self.num_outputs, &self.spec)
            .into_iter()
            .enumerate()
        {
            let xavier = (6.0 / (fan_in + fan_out) as f64).sqrt();
            let weight = uniform_tensor(&mut rng, (fan_out, fan_in), xavier, &self.device)?;
            self.varmap.set_one(format!("layer{i}.weight"), &weight)?;

            let bias_bound = 1.0 / (fan_in as f64).sqrt();
            let bias = uniform_tensor(&mut rng, fan_out, bias_bound, &self.device)?;
            self.varmap.set_one(format!("layer{i}.bias"), &bias)?;
        }

        let zeros = Tensor::zeros(self.num_outputs, DType::F32, &self.device)?;
        self.varmap.set_one(OUTPUT_BIAS, &zeros)?;
        Ok(())
    }

    /// Forward pass over a `(batch, num_inputs)` tensor.
    ///
    /// # Errors
    ///
    /// Returns a candle error on shape mismatch.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        Ok(Module::forward(self, xs)?)
    }

    /// Forward pass over host rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows are ragged or do not have `num_inputs`
    /// columns.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if let Some(row) = rows.iter().find(|r| r.len() != self.num_inputs) {
            return Err(SurrogateError::InvalidArgument(format!(
                "expected {} inputs per row, got {}",
                self.num_inputs,
                row.len()
            )));
        }
        let xs = rows_to_tensor(rows, &self.device)?;
        tensor_to_rows(&self.forward(&xs)?)
    }

    /// Copy every parameter tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter store is poisoned or a copy fails.
    pub fn snapshot(&self) -> Result<ParameterSnapshot> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|e| SurrogateError::Training(format!("parameter store poisoned: {e}")))?;

        let tensors = data
            .iter()
            .map(|(name, var)| Ok((name.clone(), var.as_tensor().copy()?)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(ParameterSnapshot { tensors })
    }

    /// Overwrite every parameter with the values of `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns a candle error if a name is unknown or a shape differs.
    pub fn restore(&mut self, snapshot: &ParameterSnapshot) -> Result<()> {
        for (name, tensor) in &snapshot.tensors {
            self.varmap.set_one(name, tensor)?;
        }
        Ok(())
    }

    /// Parameter store, for building optimizers.
    #[must_use]
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Total number of scalar parameters.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.varmap.all_vars().iter().map(|v| v.elem_count()).sum()
    }
}

impl Module for SurrogateNet {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut h = xs.clone();
        for layer in &self.hidden {
            h = self.spec.activation.forward(&layer.forward(&h)?)?;
        }
        self.output.forward(&h)?.broadcast_add(&self.output_bias)
    }
}

/// `(fan_in, fan_out)` of every linear layer, output layer last.
fn layer_dims(num_inputs: usize, num_outputs: usize, spec: &MemberSpec) -> Vec<(usize, usize)> {
    let mut dims = Vec::with_capacity(spec.depth + 2);
    dims.push((num_inputs, spec.width));
    dims.extend(std::iter::repeat((spec.width, spec.width)).take(spec.depth));
    dims.push((spec.width, num_outputs));
    dims
}

fn uniform_tensor<S: Into<Shape>>(
    rng: &mut ChaCha8Rng,
    shape: S,
    bound: f64,
    device: &Device,
) -> Result<Tensor> {
    let shape = shape.into();
    let data: Vec<f32> = (0..shape.elem_count())
        .map(|_| rng.random_range(-bound..bound) as f32)
        .collect();
    Ok(Tensor::from_vec(data, shape, device)?)
}
