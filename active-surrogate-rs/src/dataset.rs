//! Paired parameter/snapshot sets and their tensor views.

use std::cmp::Ordering;

use candle_core::{Device, Tensor};

use crate::error::{Result, SurrogateError};

/// Parameter samples paired one-to-one with state snapshots.
///
/// # Example
///
/// ```rust
/// use active_surrogate_rs::dataset::Dataset;
///
/// # fn main() -> active_surrogate_rs::Result<()> {
/// let data = Dataset::new(
///     vec![vec![0.1], vec![0.2]],
///     vec![vec![1.0, 2.0], vec![3.0, 4.0]],
/// )?;
/// assert_eq!(data.len(), 2);
/// assert_eq!(data.input_dim(), 1);
/// assert_eq!(data.output_dim(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    inputs: Vec<Vec<f64>>,
    targets: Vec<Vec<f64>>,
}

impl Dataset {
    /// Pair `inputs` with `targets`.
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::InvalidArgument`] if the sets are empty, have
    /// different lengths, or are ragged.
    pub fn new(inputs: Vec<Vec<f64>>, targets: Vec<Vec<f64>>) -> Result<Self> {
        if inputs.is_empty() {
            return Err(SurrogateError::InvalidArgument("dataset is empty".into()));
        }
        if inputs.len() != targets.len() {
            return Err(SurrogateError::InvalidArgument(format!(
                "{} input rows but {} target rows",
                inputs.len(),
                targets.len()
            )));
        }
        check_rectangular("inputs", &inputs)?;
        check_rectangular("targets", &targets)?;
        Ok(Self { inputs, targets })
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Always false; construction rejects empty sets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Width of a parameter row.
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.inputs[0].len()
    }

    /// Width of a snapshot row.
    #[must_use]
    pub fn output_dim(&self) -> usize {
        self.targets[0].len()
    }

    /// Parameter rows.
    #[must_use]
    pub fn inputs(&self) -> &[Vec<f64>] {
        &self.inputs
    }

    /// Snapshot rows.
    #[must_use]
    pub fn targets(&self) -> &[Vec<f64>] {
        &self.targets
    }

    /// Mini-batch size for a fraction of this set, at least one.
    #[must_use]
    pub fn batch_size(&self, frac: f64) -> usize {
        ((self.len() as f64 * frac).floor() as usize).max(1)
    }

    /// Upload to `device` as a pair of `(n, d)` and `(n, k)` tensors.
    ///
    /// # Errors
    ///
    /// Returns a candle error if the upload fails.
    pub fn to_tensors(&self, device: &Device) -> Result<TensorDataset> {
        Ok(TensorDataset {
            inputs: rows_to_tensor(&self.inputs, device)?,
            targets: rows_to_tensor(&self.targets, device)?,
        })
    }
}

/// A [`Dataset`] resident on a device.
#[derive(Debug, Clone)]
pub struct TensorDataset {
    /// `(n, d)` inputs.
    pub inputs: Tensor,
    /// `(n, k)` targets.
    pub targets: Tensor,
}

impl TensorDataset {
    /// Split the rows listed in `order` into consecutive batches of
    /// `batch_size`; the last batch may be smaller.
    ///
    /// # Errors
    ///
    /// Returns a candle error if an index is out of range.
    pub fn batches(&self, order: &[u32], batch_size: usize) -> Result<Vec<(Tensor, Tensor)>> {
        let device = self.inputs.device();
        order
            .chunks(batch_size.max(1))
            .map(|chunk| {
                let idx = Tensor::from_vec(chunk.to_vec(), chunk.len(), device)?;
                Ok((
                    self.inputs.index_select(&idx, 0)?,
                    self.targets.index_select(&idx, 0)?,
                ))
            })
            .collect()
    }
}

/// Stack host rows into an `(n, d)` f32 tensor.
///
/// # Errors
///
/// Returns [`SurrogateError::InvalidArgument`] for empty or ragged rows.
pub fn rows_to_tensor(rows: &[Vec<f64>], device: &Device) -> Result<Tensor> {
    if rows.is_empty() {
        return Err(SurrogateError::InvalidArgument("no rows to convert".into()));
    }
    check_rectangular("rows", rows)?;
    let width = rows[0].len();
    let flat: Vec<f32> = rows.iter().flatten().map(|&v| v as f32).collect();
    Ok(Tensor::from_vec(flat, (rows.len(), width), device)?)
}

/// Read a 2-D tensor back into host rows.
///
/// # Errors
///
/// Returns a candle error if the tensor is not a 2-D f32 tensor.
pub fn tensor_to_rows(tensor: &Tensor) -> Result<Vec<Vec<f64>>> {
    Ok(tensor
        .to_vec2::<f32>()?
        .into_iter()
        .map(|row| row.into_iter().map(f64::from).collect())
        .collect())
}

/// Relative L2 error `‖y − ŷ‖ / ‖y‖` of every row.
///
/// Rows whose reference norm is zero report the absolute error `‖ŷ‖`.
#[must_use]
pub fn relative_errors(truth: &[Vec<f64>], prediction: &[Vec<f64>]) -> Vec<f64> {
    truth
        .iter()
        .zip(prediction)
        .map(|(y, y_hat)| {
            let residual = y
                .iter()
                .zip(y_hat)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            let reference = y.iter().map(|a| a * a).sum::<f64>().sqrt();
            if reference > 0.0 {
                residual / reference
            } else {
                residual
            }
        })
        .collect()
}

/// Mean of [`relative_errors`]; `0` for empty input.
#[must_use]
pub fn mean_relative_error(truth: &[Vec<f64>], prediction: &[Vec<f64>]) -> f64 {
    mean(&relative_errors(truth, prediction))
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Copy of `rows` sorted ascending along the first column, rows kept intact.
#[must_use]
pub fn sorted_by_leading_dimension(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| {
        a.iter()
            .zip(b)
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    sorted
}

fn check_rectangular(name: &str, rows: &[Vec<f64>]) -> Result<()> {
    let width = rows.first().map_or(0, Vec::len);
    if width == 0 {
        return Err(SurrogateError::InvalidArgument(format!("{name} have no columns")));
    }
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(SurrogateError::InvalidArgument(format!(
            "{name} row {i} has {} columns, expected {width}",
            row.len()
        )));
    }
    Ok(())
}
