//! Special FFT for the CKKS canonical embedding.
//!
//! A real polynomial `c` of degree `N` is folded into `N/2` complex values
//! `u_j = c_j + i c_{j+N/2}` and pushed through a bit-reversed butterfly
//! network whose twiddles follow the powers of 5 mod `2N`. That yields
//! `c(ζ^{5^k})` for every `k` in `O(N log N)`. Slots are ordered by powers of
//! the Galois generator instead, and each `g^h` is `±5^k` for exactly one `k`,
//! so a fixed index map (conjugating on the minus sign) moves between the two.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::rings::GALOIS_GENERATOR;
use crate::rings::ntt::reverse_bits;

const FFT_GENERATOR: usize = 5;

#[derive(Debug, Clone)]
pub(crate) struct SpecialFft {
    degree: usize,
    /// `ζ^k`, `ζ = e^{iπ/N}`, for `k` in `0..2N`.
    roots: Vec<Complex64>,
    /// `5^j mod 2N`.
    rot_group: Vec<usize>,
    /// FFT output index for each slot, and whether the slot is its conjugate.
    slot_map: Vec<(usize, bool)>,
}

impl SpecialFft {
    pub(crate) fn new(degree: usize) -> Self {
        debug_assert!(degree >= 2 && degree.is_power_of_two());
        let order = 2 * degree;
        let slots = degree / 2;
        let roots = (0..order)
            .map(|k| Complex64::from_polar(1.0, PI * k as f64 / degree as f64))
            .collect();
        let rot_group = powers(FFT_GENERATOR, slots, order);

        let mut position = vec![None; order];
        for (k, &r) in rot_group.iter().enumerate() {
            position[r] = Some(k);
        }
        let slot_map = powers(GALOIS_GENERATOR as usize, slots, order)
            .into_iter()
            .map(|e| match (position[e], position[order - e]) {
                (Some(k), _) => (k, false),
                (None, Some(k)) => (k, true),
                // the powers of 5 and their negatives cover every odd residue
                (None, None) => unreachable!("{e} is not ±5^k mod {order}"),
            })
            .collect();

        Self {
            degree,
            roots,
            rot_group,
            slot_map,
        }
    }

    #[inline]
    pub(crate) fn slot_count(&self) -> usize {
        self.degree / 2
    }

    /// Slot values `c(ζ^{g^h})` of `N` real coefficients.
    pub(crate) fn embed(&self, coeffs: &[f64]) -> Vec<Complex64> {
        debug_assert_eq!(coeffs.len(), self.degree);
        let n = self.slot_count();
        let mut folded: Vec<Complex64> = (0..n)
            .map(|j| Complex64::new(coeffs[j], coeffs[j + n]))
            .collect();
        self.forward(&mut folded);
        self.slot_map
            .iter()
            .map(|&(k, conj)| if conj { folded[k].conj() } else { folded[k] })
            .collect()
    }

    /// Real coefficients whose embedding is `values`, zero-padded to
    /// `N/2` slots. Left inverse of [`SpecialFft::embed`].
    pub(crate) fn project(&self, values: &[Complex64]) -> Vec<f64> {
        debug_assert!(values.len() <= self.slot_count());
        let mut spread = vec![Complex64::new(0.0, 0.0); self.slot_count()];
        for (&z, &(k, conj)) in values.iter().zip(&self.slot_map) {
            spread[k] = if conj { z.conj() } else { z };
        }
        self.inverse(&mut spread);
        spread
            .iter()
            .map(|u| u.re)
            .chain(spread.iter().map(|u| u.im))
            .collect()
    }

    fn forward(&self, values: &mut [Complex64]) {
        let size = values.len();
        let order = 2 * self.degree;
        bit_reverse(values);
        let mut len = 2;
        while len <= size {
            let half = len / 2;
            let lenq = 4 * len;
            for block in values.chunks_exact_mut(len) {
                let (lo, hi) = block.split_at_mut(half);
                for j in 0..half {
                    let idx = (self.rot_group[j] % lenq) * (order / lenq);
                    let u = lo[j];
                    let v = hi[j] * self.roots[idx];
                    lo[j] = u + v;
                    hi[j] = u - v;
                }
            }
            len *= 2;
        }
    }

    fn inverse(&self, values: &mut [Complex64]) {
        let size = values.len();
        let order = 2 * self.degree;
        let mut len = size;
        while len >= 2 {
            let half = len / 2;
            let lenq = 4 * len;
            for block in values.chunks_exact_mut(len) {
                let (lo, hi) = block.split_at_mut(half);
                for j in 0..half {
                    let idx = (lenq - self.rot_group[j] % lenq) * (order / lenq);
                    let u = lo[j] + hi[j];
                    let v = (lo[j] - hi[j]) * self.roots[idx];
                    lo[j] = u;
                    hi[j] = v;
                }
            }
            len /= 2;
        }
        bit_reverse(values);
        let inv_size = 1.0 / size as f64;
        for v in values.iter_mut() {
            *v *= inv_size;
        }
    }
}

fn powers(base: usize, count: usize, modulus: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(count);
    let mut acc = 1usize;
    for _ in 0..count {
        out.push(acc);
        acc = acc * base % modulus;
    }
    out
}

fn bit_reverse(values: &mut [Complex64]) {
    let bits = values.len().trailing_zeros();
    for i in 0..values.len() {
        let r = reverse_bits(i, bits);
        if i < r {
            values.swap(i, r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // Direct evaluation at ζ^{3^h}, the O(N^2) reference.
    fn naive_embed(coeffs: &[f64]) -> Vec<Complex64> {
        let degree = coeffs.len();
        let order = 2 * degree;
        powers(GALOIS_GENERATOR as usize, degree / 2, order)
            .into_iter()
            .map(|e| {
                coeffs
                    .iter()
                    .enumerate()
                    .map(|(j, &c)| {
                        let angle = PI * (e * j % order) as f64 / degree as f64;
                        Complex64::from_polar(c, angle)
                    })
                    .sum()
            })
            .collect()
    }

    fn sample_coeffs(degree: usize) -> Vec<f64> {
        (0..degree).map(|j| (j * 7 % 11) as f64 - 5.0).collect()
    }

    #[test]
    fn embed_matches_direct_evaluation() {
        for degree in [2usize, 4, 8, 16, 64, 256] {
            let fft = SpecialFft::new(degree);
            let coeffs = sample_coeffs(degree);
            let fast = fft.embed(&coeffs);
            let slow = naive_embed(&coeffs);
            assert_eq!(fast.len(), degree / 2);
            for (a, b) in fast.iter().zip(&slow) {
                assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-9);
                assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn project_inverts_embed() {
        let fft = SpecialFft::new(16);
        let coeffs = sample_coeffs(16);
        let recovered = fft.project(&fft.embed(&coeffs));
        for (a, b) in recovered.iter().zip(&coeffs) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn project_zero_pads_missing_slots() {
        let fft = SpecialFft::new(16);
        let values = [Complex64::new(1.5, -0.5), Complex64::new(0.25, 2.0)];
        let slots = fft.embed(&fft.project(&values));
        for (h, z) in slots.iter().enumerate() {
            let expected = values.get(h).copied().unwrap_or_default();
            assert_abs_diff_eq!(z.re, expected.re, epsilon = 1e-9);
            assert_abs_diff_eq!(z.im, expected.im, epsilon = 1e-9);
        }
    }

    #[test]
    fn slot_map_is_a_permutation() {
        let fft = SpecialFft::new(64);
        let mut seen: Vec<usize> = fft.slot_map.iter().map(|&(k, _)| k).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..32).collect::<Vec<_>>());
        // slot 0 is ζ itself
        assert_eq!(fft.slot_map[0], (0, false));
    }
}
