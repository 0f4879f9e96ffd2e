//! Negacyclic number-theoretic transform over `Z_q[X] / (X^N + 1)`.
//!
//! Forward is Cooley-Tukey on natural-order input producing bit-reversed
//! output: after the transform, index `bitrev(k)` holds `a(ψ^(2k+1))`.
//! Inverse is Gentleman-Sande on bit-reversed input and undoes the forward
//! transform exactly.

use crate::errors::{HeError, HeResult};
use crate::math::primes::minimal_primitive_root;
use crate::math::{Modulus, MultiplyOperand};

#[derive(Debug, Clone)]
pub struct NttTables {
    modulus: Modulus,
    degree: usize,
    log_degree: u32,
    root: u64,
    /// `ψ^bitrev(i)` for `i` in `0..N`.
    root_powers: Vec<MultiplyOperand>,
    /// `ψ^-bitrev(i)` for `i` in `0..N`.
    inv_root_powers: Vec<MultiplyOperand>,
    inv_degree: MultiplyOperand,
}

impl NttTables {
    pub fn new(degree: usize, modulus: Modulus) -> HeResult<Self> {
        if degree < 2 || !degree.is_power_of_two() {
            return Err(HeError::configuration(format!(
                "ring degree must be a power of two >= 2, got {degree}"
            )));
        }
        let root = minimal_primitive_root(degree as u64, modulus.value())
            .filter(|_| modulus.is_prime())
            .ok_or_else(|| {
                HeError::configuration(format!(
                    "modulus {} is not an NTT-friendly prime for degree {degree}",
                    modulus.value()
                ))
            })?;
        let inv_root = modulus.inverse(root).ok_or_else(|| {
            HeError::configuration("primitive root is not invertible")
        })?;
        let log_degree = degree.trailing_zeros();

        let mut root_powers = Vec::with_capacity(degree);
        let mut inv_root_powers = Vec::with_capacity(degree);
        for i in 0..degree {
            let exponent = reverse_bits(i, log_degree) as u64;
            root_powers.push(MultiplyOperand::new(modulus.pow(root, exponent), &modulus));
            inv_root_powers
                .push(MultiplyOperand::new(modulus.pow(inv_root, exponent), &modulus));
        }
        let inv_degree = modulus
            .inverse(degree as u64)
            .map(|inv| MultiplyOperand::new(inv, &modulus))
            .ok_or_else(|| HeError::configuration("degree is not invertible"))?;

        Ok(Self {
            modulus,
            degree,
            log_degree,
            root,
            root_powers,
            inv_root_powers,
            inv_degree,
        })
    }

    #[inline]
    pub fn modulus(&self) -> &Modulus {
        &self.modulus
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// The minimal primitive `2N`-th root of unity used by the transform.
    #[inline]
    pub fn root(&self) -> u64 {
        self.root
    }

    pub fn forward(&self, values: &mut [u64]) {
        debug_assert_eq!(values.len(), self.degree);
        let q = &self.modulus;
        let mut gap = self.degree;
        let mut m = 1;
        while m < self.degree {
            gap >>= 1;
            for i in 0..m {
                let twiddle = &self.root_powers[m + i];
                let start = 2 * i * gap;
                for j in start..start + gap {
                    let u = values[j];
                    let v = q.mul_shoup(values[j + gap], twiddle);
                    values[j] = q.add(u, v);
                    values[j + gap] = q.sub(u, v);
                }
            }
            m <<= 1;
        }
    }

    pub fn inverse(&self, values: &mut [u64]) {
        debug_assert_eq!(values.len(), self.degree);
        let q = &self.modulus;
        let mut gap = 1;
        let mut m = self.degree;
        while m > 1 {
            let half = m >> 1;
            let mut start = 0;
            for i in 0..half {
                let twiddle = &self.inv_root_powers[half + i];
                for j in start..start + gap {
                    let u = values[j];
                    let v = values[j + gap];
                    values[j] = q.add(u, v);
                    values[j + gap] = q.mul_shoup(q.sub(u, v), twiddle);
                }
                start += 2 * gap;
            }
            gap <<= 1;
            m = half;
        }
        for v in values.iter_mut() {
            *v = q.mul_shoup(*v, &self.inv_degree);
        }
    }

    #[inline]
    pub(crate) fn log_degree(&self) -> u32 {
        self.log_degree
    }
}

#[inline]
pub(crate) fn reverse_bits(value: usize, bit_count: u32) -> usize {
    if bit_count == 0 {
        0
    } else {
        value.reverse_bits() >> (usize::BITS - bit_count)
    }
}
