use rand::{Rng, seq::SliceRandom};
use rand_distr::{Distribution, Normal};

use super::Modulus;
use crate::errors::{HeError, HeResult};

/// Standard deviation of the discrete error distribution.
pub const DEFAULT_ERROR_STD_DEV: f64 = 3.2;

/// Error samples are clipped to this many standard deviations.
pub const ERROR_CLIP_FACTOR: f64 = 6.0;

/// Parameters for secret, error and ephemeral sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    /// Standard deviation of the rounded Gaussian error.
    pub error_std_dev: f64,
    /// Exact number of non-zero secret coefficients, or `None` for a uniform
    /// ternary secret.
    pub hamming_weight: Option<usize>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            error_std_dev: DEFAULT_ERROR_STD_DEV,
            hamming_weight: None,
        }
    }
}

impl SamplingParams {
    pub fn validate(&self, degree: usize) -> HeResult<()> {
        if !(self.error_std_dev.is_finite() && self.error_std_dev > 0.0) {
            return Err(HeError::invalid(format!(
                "error standard deviation must be finite and positive, got {}",
                self.error_std_dev
            )));
        }
        if let Some(weight) = self.hamming_weight {
            if weight == 0 || weight > degree {
                return Err(HeError::invalid(format!(
                    "hamming weight {weight} must be in [1, {degree}]"
                )));
            }
        }
        Ok(())
    }
}

/// Samples `len` coefficients uniformly from `[0, q)`.
pub fn uniform_coefficients<R: Rng + ?Sized>(
    len: usize,
    modulus: &Modulus,
    rng: &mut R,
) -> Vec<u64> {
    let q = modulus.value();
    (0..len).map(|_| rng.random_range(0..q)).collect()
}

/// Samples rounded Gaussian integers clipped to `ERROR_CLIP_FACTOR * std_dev`.
pub fn gaussian_coefficients<R: Rng + ?Sized>(
    len: usize,
    std_dev: f64,
    rng: &mut R,
) -> HeResult<Vec<i64>> {
    let normal = Normal::new(0.0, std_dev).map_err(|err| {
        HeError::invalid(format!("invalid error distribution: {err}"))
    })?;
    let bound = ERROR_CLIP_FACTOR * std_dev;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let sample: f64 = normal.sample(rng);
        if sample.abs() <= bound {
            out.push(sample.round() as i64);
        }
    }
    Ok(out)
}

/// Samples a ternary vector with exactly `hamming_weight` entries in `{-1, 1}`.
pub fn ternary_coefficients<R: Rng + ?Sized>(
    len: usize,
    hamming_weight: usize,
    rng: &mut R,
) -> HeResult<Vec<i64>> {
    if hamming_weight > len {
        return Err(HeError::invalid(format!(
            "hamming weight {hamming_weight} exceeds length {len}"
        )));
    }
    let mut out = vec![0i64; len];
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);
    for &idx in indices.iter().take(hamming_weight) {
        out[idx] = if rng.random_bool(0.5) { 1 } else { -1 };
    }
    Ok(out)
}

/// Samples each coefficient uniformly from `{-1, 0, 1}`.
pub fn uniform_ternary_coefficients<R: Rng + ?Sized>(
    len: usize,
    rng: &mut R,
) -> Vec<i64> {
    (0..len).map(|_| rng.random_range(-1i64..=1)).collect()
}
