//! Ring automorphisms `X ↦ X^k` for odd `k` in `Z_2N^*`.
//!
//! Slots are indexed by powers of the generator `3`: rotating left by
//! `step` is the automorphism with element `3^step mod 2N`, and the
//! conjugation / column swap is `2N - 1`.

use std::collections::BTreeMap;

use super::ntt::reverse_bits;
use crate::errors::{HeError, HeResult};
use crate::math::Modulus;

pub const GALOIS_GENERATOR: u64 = 3;

#[derive(Debug, Clone)]
pub struct GaloisTool {
    degree: usize,
    log_degree: u32,
    /// NTT-domain index permutation for every odd element, built eagerly for
    /// the rotation group so lookups never allocate on the hot path.
    ntt_permutations: BTreeMap<u64, Vec<usize>>,
}

impl GaloisTool {
    pub fn new(degree: usize) -> HeResult<Self> {
        if degree < 2 || !degree.is_power_of_two() {
            return Err(HeError::configuration(format!(
                "ring degree must be a power of two >= 2, got {degree}"
            )));
        }
        let mut tool = Self {
            degree,
            log_degree: degree.trailing_zeros(),
            ntt_permutations: BTreeMap::new(),
        };
        for element in tool.default_elements() {
            let table = tool.build_ntt_permutation(element);
            tool.ntt_permutations.insert(element, table);
        }
        Ok(tool)
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of slots in one row of the rotation group.
    #[inline]
    pub fn row_size(&self) -> usize {
        self.degree / 2
    }

    fn order(&self) -> u64 {
        2 * self.degree as u64
    }

    /// Checks that `element` is odd and below `2N`.
    pub fn validate_element(&self, element: u64) -> HeResult<()> {
        if element & 1 == 0 || element >= self.order() {
            return Err(HeError::invalid(format!(
                "Galois element {element} must be odd and below {}",
                self.order()
            )));
        }
        Ok(())
    }

    /// Galois element for a slot rotation by `step` (0 means column swap).
    pub fn element_from_step(&self, step: i64) -> HeResult<u64> {
        let row_size = self.row_size() as u64;
        if step == 0 {
            return Ok(self.order() - 1);
        }
        // unsigned_abs keeps i64::MIN in range checks
        if step.unsigned_abs() >= row_size.max(1) {
            return Err(HeError::invalid(format!(
                "rotation step {step} out of range for row size {row_size}"
            )));
        }
        let exponent = if step < 0 {
            row_size - step.unsigned_abs()
        } else {
            step.unsigned_abs()
        };
        let modulus = self.order();
        let mut element = 1u64;
        for _ in 0..exponent {
            element = element * GALOIS_GENERATOR % modulus;
        }
        Ok(element)
    }

    pub fn elements_from_steps(&self, steps: &[i64]) -> HeResult<Vec<u64>> {
        steps.iter().map(|&s| self.element_from_step(s)).collect()
    }

    /// Power-of-two steps in both directions plus the column swap.
    pub fn default_elements(&self) -> Vec<u64> {
        let mut elements = vec![self.order() - 1];
        let row_size = self.row_size() as i64;
        let mut step = 1i64;
        while step < row_size {
            for signed in [step, -step] {
                if let Ok(element) = self.element_from_step(signed) {
                    if !elements.contains(&element) {
                        elements.push(element);
                    }
                }
            }
            step <<= 1;
        }
        elements
    }

    /// Applies the automorphism to one coefficient-form channel.
    pub fn apply_coeff(&self, input: &[u64], element: u64, modulus: &Modulus, out: &mut [u64]) {
        let n = self.degree;
        let mask = n - 1;
        for (i, &c) in input.iter().enumerate() {
            let raw = (i as u64 * element) as usize;
            let index = raw & mask;
            out[index] = if (raw >> self.log_degree) & 1 == 1 {
                modulus.neg(c)
            } else {
                c
            };
        }
    }

    /// Applies the automorphism to one NTT-form channel (a pure permutation).
    pub fn apply_ntt(&self, input: &[u64], element: u64, out: &mut [u64]) {
        match self.ntt_permutations.get(&element) {
            Some(table) => permute(input, table, out),
            None => permute(input, &self.build_ntt_permutation(element), out),
        }
    }

    fn build_ntt_permutation(&self, element: u64) -> Vec<usize> {
        let n = self.degree as u64;
        let order = self.order();
        (0..self.degree)
            .map(|j| {
                let k = reverse_bits(j, self.log_degree) as u64;
                let image = element * (2 * k + 1) % order;
                reverse_bits(((image - 1) / 2 % n) as usize, self.log_degree)
            })
            .collect()
    }

    /// Decomposes `step` into signed powers of two (non-adjacent form), so a
    /// rotation without its own key can be run through the default keys.
    pub fn naf(step: i64) -> Vec<i64> {
        let mut out = Vec::new();
        let negative = step < 0;
        let mut value = step.unsigned_abs();
        let mut bit = 0u32;
        while value > 0 {
            if value & 1 == 1 {
                let digit: i64 = if value & 3 == 3 { -1 } else { 1 };
                let term = digit << bit;
                out.push(if negative { -term } else { term });
                value = if digit == 1 { value - 1 } else { value + 1 };
            }
            value >>= 1;
            bit += 1;
        }
        out
    }
}

fn permute(input: &[u64], table: &[usize], out: &mut [u64]) {
    for (dst, &src) in out.iter_mut().zip(table) {
        *dst = input[src];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rings::ntt::NttTables;

    #[test]
    fn elements_from_steps_follow_generator() {
        let tool = GaloisTool::new(8).unwrap();
        assert_eq!(tool.element_from_step(0).unwrap(), 15);
        assert_eq!(tool.element_from_step(1).unwrap(), 3);
        assert_eq!(tool.element_from_step(2).unwrap(), 9);
        assert_eq!(tool.element_from_step(-1).unwrap(), 11);
        assert!(tool.element_from_step(4).is_err());
        assert!(matches!(
            tool.element_from_step(-4),
            Err(HeError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn extreme_steps_are_rejected() {
        let tool = GaloisTool::new(8).unwrap();
        for step in [i64::MIN, i64::MIN + 1, i64::MAX] {
            assert!(matches!(
                tool.element_from_step(step),
                Err(HeError::InvalidArgument { .. })
            ));
        }
        assert!(tool.elements_from_steps(&[1, i64::MIN]).is_err());
    }

    #[test]
    fn default_elements_cover_powers_of_two() {
        let tool = GaloisTool::new(16).unwrap();
        let elements = tool.default_elements();
        for step in [1i64, -1, 2, -2, 4, -4] {
            assert!(elements.contains(&tool.element_from_step(step).unwrap()));
        }
        assert!(elements.contains(&31));
    }

    #[test]
    fn validate_rejects_even_or_large() {
        let tool = GaloisTool::new(8).unwrap();
        assert!(tool.validate_element(3).is_ok());
        assert!(tool.validate_element(4).is_err());
        assert!(tool.validate_element(17).is_err());
    }

    #[test]
    fn coefficient_automorphism_wraps_sign() {
        let tool = GaloisTool::new(4).unwrap();
        let q = Modulus::new(17).unwrap();
        // a = x, element 3: x -> x^3; a = x^2, element 3: x^6 = -x^2
        let mut out = vec![0u64; 4];
        tool.apply_coeff(&[0, 1, 0, 0], 3, &q, &mut out);
        assert_eq!(out, vec![0, 0, 0, 1]);
        tool.apply_coeff(&[0, 0, 1, 0], 3, &q, &mut out);
        assert_eq!(out, vec![0, 0, 16, 0]);
    }

    #[test]
    fn ntt_automorphism_commutes_with_transform() {
        let q = Modulus::new(97).unwrap();
        let tables = NttTables::new(8, q).unwrap();
        let tool = GaloisTool::new(8).unwrap();
        let coeffs: Vec<u64> = vec![5, 1, 0, 96, 3, 2, 7, 11];
        for element in [3u64, 5, 9, 11, 15, 13] {
            let mut expected = vec![0u64; 8];
            tool.apply_coeff(&coeffs, element, &q, &mut expected);
            tables.forward(&mut expected);

            let mut transformed = coeffs.clone();
            tables.forward(&mut transformed);
            let mut got = vec![0u64; 8];
            tool.apply_ntt(&transformed, element, &mut got);
            assert_eq!(got, expected, "element {element}");
        }
    }

    #[test]
    fn naf_sums_back_to_step() {
        for step in [-13i64, -7, -1, 1, 3, 7, 11, 12, 100] {
            let parts = GaloisTool::naf(step);
            assert_eq!(parts.iter().sum::<i64>(), step);
            for p in &parts {
                assert!(p.unsigned_abs().is_power_of_two());
            }
        }
        assert!(GaloisTool::naf(0).is_empty());
        assert_eq!(GaloisTool::naf(7), vec![-1, 8]);
    }
}
