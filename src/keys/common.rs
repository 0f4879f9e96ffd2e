//! Polynomial samplers over an RNS modulus list.
//!
//! Every sampler draws the integer polynomial once and reduces it into each
//! channel, so the channels describe the same ring element.

use rand::Rng;

use crate::errors::HeResult;
use crate::math::{
    Modulus, SamplingParams, gaussian_coefficients, ternary_coefficients, uniform_coefficients,
    uniform_ternary_coefficients,
};
use crate::rings::RnsPoly;

/// Uniform element of `R_Q`. Uniform in either domain, so the caller picks
/// the form tag.
pub(crate) fn sample_uniform_poly<R: Rng + ?Sized>(
    degree: usize,
    moduli: &[Modulus],
    is_ntt_form: bool,
    rng: &mut R,
) -> RnsPoly {
    let mut data = Vec::with_capacity(degree * moduli.len());
    for q in moduli {
        data.extend(uniform_coefficients(degree, q, rng));
    }
    RnsPoly::from_raw(data, degree, is_ntt_form)
}

/// Clipped rounded-Gaussian error in coefficient form.
pub(crate) fn sample_error_poly<R: Rng + ?Sized>(
    degree: usize,
    moduli: &[Modulus],
    sampling: &SamplingParams,
    rng: &mut R,
) -> HeResult<RnsPoly> {
    let coeffs = gaussian_coefficients(degree, sampling.error_std_dev, rng)?;
    Ok(RnsPoly::from_signed(&coeffs, moduli))
}

/// Ternary secret in coefficient form, sparse when a Hamming weight is set.
pub(crate) fn sample_secret_poly<R: Rng + ?Sized>(
    degree: usize,
    moduli: &[Modulus],
    sampling: &SamplingParams,
    rng: &mut R,
) -> HeResult<RnsPoly> {
    let coeffs = match sampling.hamming_weight {
        Some(weight) => ternary_coefficients(degree, weight, rng)?,
        None => uniform_ternary_coefficients(degree, rng),
    };
    Ok(RnsPoly::from_signed(&coeffs, moduli))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn moduli() -> Vec<Modulus> {
        vec![Modulus::new(97).unwrap(), Modulus::new(113).unwrap()]
    }

    #[test]
    fn channels_agree_on_small_samples() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let sampling = SamplingParams {
            hamming_weight: Some(4),
            ..SamplingParams::default()
        };
        let secret = sample_secret_poly(16, &moduli(), &sampling, &mut rng).unwrap();
        let q = moduli();
        let nonzero = secret.channel(0).iter().filter(|&&c| c != 0).count();
        assert_eq!(nonzero, 4);
        for (a, b) in secret.channel(0).iter().zip(secret.channel(1)) {
            assert_eq!(q[0].center(*a), q[1].center(*b));
        }

        let error = sample_error_poly(16, &q, &sampling, &mut rng).unwrap();
        for (a, b) in error.channel(0).iter().zip(error.channel(1)) {
            assert_eq!(q[0].center(*a), q[1].center(*b));
            assert!(q[0].center(*a).abs() <= 20);
        }
    }

    #[test]
    fn uniform_poly_is_reduced_and_tagged() {
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let poly = sample_uniform_poly(16, &moduli(), true, &mut rng);
        assert!(poly.is_ntt_form());
        assert!(poly.channel(0).iter().all(|&c| c < 97));
        assert!(poly.channel(1).iter().all(|&c| c < 113));
    }
}
