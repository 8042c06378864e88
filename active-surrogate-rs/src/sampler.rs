//! Latin Hypercube sampling of the parameter space.
//!
//! Each of the `count` equal-width strata of every dimension receives exactly
//! one sample. Points are jittered uniformly inside their stratum, and the
//! strata are paired across dimensions by independent random permutations.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, SurrogateError};

/// Draw `count` Latin Hypercube samples from `[lower, upper]`.
///
/// # Example
///
/// ```rust
/// use active_surrogate_rs::sampler::latin_hypercube;
///
/// # fn main() -> active_surrogate_rs::Result<()> {
/// let samples = latin_hypercube(2, &[0.0, -1.0], &[1.0, 1.0], 8, 42)?;
/// assert_eq!(samples.len(), 8);
/// assert!(samples.iter().all(|s| s.len() == 2));
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`SurrogateError::InvalidArgument`] if `dimension` or `count` is
/// zero, the bound vectors do not have `dimension` finite entries, or
/// `lower >= upper` in any dimension.
pub fn latin_hypercube(
    dimension: usize,
    lower: &[f64],
    upper: &[f64],
    count: usize,
    seed: u64,
) -> Result<Vec<Vec<f64>>> {
    check_bounds(dimension, lower, upper)?;
    if count == 0 {
        return Err(SurrogateError::InvalidArgument(
            "sample count must be > 0".into(),
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut samples = vec![vec![0.0; dimension]; count];

    for d in 0..dimension {
        let mut strata: Vec<usize> = (0..count).collect();
        strata.shuffle(&mut rng);

        let span = upper[d] - lower[d];
        for (sample, &stratum) in samples.iter_mut().zip(&strata) {
            let unit = (stratum as f64 + rng.random::<f64>()) / count as f64;
            // Rounding at the top of the range must not escape the box.
            sample[d] = (lower[d] + unit * span).min(upper[d]);
        }
    }

    tracing::debug!(dimension, count, seed, "drew latin hypercube samples");
    Ok(samples)
}

/// Check that `lower`/`upper` describe a non-empty box of `dimension` axes.
pub(crate) fn check_bounds(dimension: usize, lower: &[f64], upper: &[f64]) -> Result<()> {
    if dimension == 0 {
        return Err(SurrogateError::InvalidArgument(
            "dimension must be > 0".into(),
        ));
    }
    if lower.len() != dimension || upper.len() != dimension {
        return Err(SurrogateError::InvalidArgument(format!(
            "expected {dimension} bounds, got {} lower and {} upper",
            lower.len(),
            upper.len()
        )));
    }
    for (d, (&lo, &hi)) in lower.iter().zip(upper).enumerate() {
        if !lo.is_finite() || !hi.is_finite() {
            return Err(SurrogateError::InvalidArgument(format!(
                "bounds of dimension {d} must be finite"
            )));
        }
        if lo >= hi {
            return Err(SurrogateError::InvalidArgument(format!(
                "lower bound {lo} must be < upper bound {hi} in dimension {d}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stratum_of(value: f64, lower: f64, upper: f64, count: usize) -> usize {
        let unit = (value - lower) / (upper - lower);
        ((unit * count as f64).floor() as usize).min(count - 1)
    }

    #[test]
    fn test_unit_interval_five_strata() {
        let samples = latin_hypercube(1, &[0.0], &[1.0], 5, 3).unwrap();
        assert_eq!(samples.len(), 5);

        let mut hits = [0usize; 5];
        for s in &samples {
            assert!((0.0..=1.0).contains(&s[0]));
            hits[stratum_of(s[0], 0.0, 1.0, 5)] += 1;
        }
        assert_eq!(hits, [1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_every_dimension_is_stratified() {
        let lower = [0.5, -3.0, 10.0];
        let upper = [1.5, 3.0, 20.0];
        let count = 17;

        for seed in 0..10 {
            let samples = latin_hypercube(3, &lower, &upper, count, seed).unwrap();
            assert_eq!(samples.len(), count);

            for d in 0..3 {
                let mut hits = vec![0usize; count];
                for s in &samples {
                    assert!(s[d] >= lower[d] && s[d] <= upper[d]);
                    hits[stratum_of(s[d], lower[d], upper[d], count)] += 1;
                }
                assert!(hits.iter().all(|&h| h == 1), "seed {seed}, dim {d}: {hits:?}");
            }
        }
    }

    #[test]
    fn test_same_seed_same_design() {
        let a = latin_hypercube(2, &[0.0, 0.0], &[1.0, 1.0], 10, 99).unwrap();
        let b = latin_hypercube(2, &[0.0, 0.0], &[1.0, 1.0], 10, 99).unwrap();
        let c = latin_hypercube(2, &[0.0, 0.0], &[1.0, 1.0], 10, 100).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_single_sample() {
        let samples = latin_hypercube(2, &[0.0, 5.0], &[1.0, 6.0], 1, 0).unwrap();
        assert_eq!(samples.len(), 1);
        assert!((0.0..=1.0).contains(&samples[0][0]));
        assert!((5.0..=6.0).contains(&samples[0][1]));
    }

    #[test]
    fn test_invalid_arguments() {
        let invalid = |r: Result<Vec<Vec<f64>>>| matches!(r, Err(SurrogateError::InvalidArgument(_)));

        assert!(invalid(latin_hypercube(1, &[1.0], &[0.0], 5, 0)));
        assert!(invalid(latin_hypercube(1, &[1.0], &[1.0], 5, 0)));
        assert!(invalid(latin_hypercube(1, &[0.0], &[1.0], 0, 0)));
        assert!(invalid(latin_hypercube(0, &[], &[], 5, 0)));
        assert!(invalid(latin_hypercube(2, &[0.0], &[1.0, 1.0], 5, 0)));
        assert!(invalid(latin_hypercube(1, &[f64::NAN], &[1.0], 5, 0)));
        assert!(invalid(latin_hypercube(1, &[0.0], &[f64::INFINITY], 5, 0)));
    }
}
