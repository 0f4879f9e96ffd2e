//! RNS bases, exact CRT composition and centered base conversion.

use crypto_bigint::{Limb, U4096};

use crate::errors::{HeError, HeResult};
use crate::math::{Modulus, MultiplyOperand};

/// Wide integer used for CRT composition. Moduli are capped at 60 bits and
/// 64 per base, so every product fits with room for one carry.
pub type WideUint = U4096;

/// Upper bound on the bit width of a base product.
pub const RNS_BASE_MAX_BITS: u32 = 4000;

/// An ordered set of pairwise coprime moduli with CRT constants.
///
/// Invariant: `punctured_inv[i] = (Q / q_i)^{-1} mod q_i`.
#[derive(Debug, Clone)]
pub struct RnsBase {
    moduli: Vec<Modulus>,
    punctured_inv: Vec<MultiplyOperand>,
    punctured_products: Vec<WideUint>,
    product: WideUint,
    bit_count: u32,
}

impl RnsBase {
    pub fn new(moduli: Vec<Modulus>) -> HeResult<Self> {
        if moduli.is_empty() {
            return Err(HeError::configuration("RNS base must contain at least one modulus"));
        }
        let total_bits: u32 = moduli.iter().map(Modulus::bit_count).sum();
        if total_bits > RNS_BASE_MAX_BITS {
            return Err(HeError::overflow(format!(
                "RNS base of {total_bits} bits exceeds {RNS_BASE_MAX_BITS} bits"
            )));
        }

        let mut punctured_inv = Vec::with_capacity(moduli.len());
        let mut punctured_products = Vec::with_capacity(moduli.len());
        for (i, qi) in moduli.iter().enumerate() {
            let mut residue = 1u64;
            let mut wide = WideUint::ONE;
            for (j, qj) in moduli.iter().enumerate() {
                if i != j {
                    residue = qi.mul(residue, qi.reduce(qj.value()));
                    wide = wide.wrapping_mul(&WideUint::from_u64(qj.value()));
                }
            }
            let inv = qi.inverse(residue).ok_or_else(|| {
                HeError::configuration(format!(
                    "modulus {} is not coprime to the rest of the base",
                    qi.value()
                ))
            })?;
            punctured_inv.push(MultiplyOperand::new(inv, qi));
            punctured_products.push(wide);
        }
        let product = moduli.iter().fold(WideUint::ONE, |acc, q| {
            acc.wrapping_mul(&WideUint::from_u64(q.value()))
        });
        let bit_count = bit_length(&product);

        Ok(Self {
            moduli,
            punctured_inv,
            punctured_products,
            product,
            bit_count,
        })
    }

    #[inline]
    pub fn moduli(&self) -> &[Modulus] {
        &self.moduli
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.moduli.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moduli.is_empty()
    }

    #[inline]
    pub fn product(&self) -> &WideUint {
        &self.product
    }

    /// Exact bit length of the base product `Q`.
    #[inline]
    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// `Q mod m` for an arbitrary modulus `m`.
    pub fn product_mod(&self, m: &Modulus) -> u64 {
        self.moduli
            .iter()
            .fold(1u64, |acc, q| m.mul(acc, m.reduce(q.value())))
    }

    /// Recovers `x mod Q` from its residues.
    pub fn compose(&self, residues: &[u64]) -> WideUint {
        debug_assert_eq!(residues.len(), self.moduli.len());
        let mut acc = WideUint::ZERO;
        for (i, (&r, q)) in residues.iter().zip(&self.moduli).enumerate() {
            let y = q.mul_shoup(r, &self.punctured_inv[i]);
            // y * (Q / q_i) < Q, so the running sum stays below 2Q.
            let term = self.punctured_products[i].wrapping_mul(&WideUint::from_u64(y));
            acc = acc.wrapping_add(&term);
            if acc >= self.product {
                acc = acc.wrapping_sub(&self.product);
            }
        }
        acc
    }

    /// Composes and returns `(is_negative, |x|)` for the centered representative.
    pub fn compose_centered(&self, residues: &[u64]) -> (bool, WideUint) {
        let value = self.compose(residues);
        if value.wrapping_add(&value) > self.product {
            (true, self.product.wrapping_sub(&value))
        } else {
            (false, value)
        }
    }

    /// Centered representative of `x mod Q` as a float.
    pub fn compose_centered_f64(&self, residues: &[u64]) -> f64 {
        let (negative, magnitude) = self.compose_centered(residues);
        let value = to_f64(&magnitude);
        if negative { -value } else { value }
    }
}

/// Bit length of a wide integer (0 for zero).
pub fn bit_length(x: &WideUint) -> u32 {
    let words = x.as_words();
    for (index, &word) in words.iter().enumerate().rev() {
        if word != 0 {
            return index as u32 * Limb::BITS + (Limb::BITS - word.leading_zeros());
        }
    }
    0
}

fn to_f64(x: &WideUint) -> f64 {
    let radix = 2f64.powi(Limb::BITS as i32);
    x.as_words()
        .iter()
        .rev()
        .fold(0.0, |acc, &word| acc * radix + word as f64)
}

/// Fast base conversion with exact centering.
///
/// For input residues `x_i` modulo the input base `Q` it computes the centered
/// representative of `x mod Q` in every output modulus:
/// `y_i = [x_i (Q/q_i)^{-1}]_{q_i}`, `v = round(sum y_i / q_i)` and
/// `x mod p = sum y_i (Q/q_i mod p) - v (Q mod p)`.
#[derive(Debug, Clone)]
pub struct BaseConverter {
    ibase: RnsBase,
    obase: Vec<Modulus>,
    /// `base_change[j][i] = (Q / q_i) mod p_j`
    base_change: Vec<Vec<u64>>,
    /// `Q mod p_j`
    ibase_mod_obase: Vec<u64>,
}

impl BaseConverter {
    pub fn new(ibase: &RnsBase, obase: &[Modulus]) -> Self {
        let base_change = obase
            .iter()
            .map(|p| {
                (0..ibase.len())
                    .map(|i| {
                        ibase
                            .moduli()
                            .iter()
                            .enumerate()
                            .filter(|&(j, _)| j != i)
                            .fold(1u64, |acc, (_, q)| p.mul(acc, p.reduce(q.value())))
                    })
                    .collect()
            })
            .collect();
        let ibase_mod_obase = obase.iter().map(|p| ibase.product_mod(p)).collect();
        Self {
            ibase: ibase.clone(),
            obase: obase.to_vec(),
            base_change,
            ibase_mod_obase,
        }
    }

    #[inline]
    pub fn ibase(&self) -> &RnsBase {
        &self.ibase
    }

    #[inline]
    pub fn obase(&self) -> &[Modulus] {
        &self.obase
    }

    /// Converts `degree` coefficients laid out channel by channel.
    pub fn convert_centered(&self, input: &[u64], degree: usize, out: &mut [u64]) {
        let k = self.ibase.len();
        debug_assert_eq!(input.len(), k * degree);
        debug_assert_eq!(out.len(), self.obase.len() * degree);

        let mut y = vec![0u64; k];
        for c in 0..degree {
            let mut fraction = 0.0f64;
            for (i, q) in self.ibase.moduli().iter().enumerate() {
                y[i] = q.mul_shoup(input[i * degree + c], &self.ibase.punctured_inv[i]);
                fraction += y[i] as f64 / q.value() as f64;
            }
            let v = fraction.round() as u64;
            for (j, p) in self.obase.iter().enumerate() {
                let acc: u128 = y
                    .iter()
                    .zip(&self.base_change[j])
                    .map(|(&yi, &m)| yi as u128 * m as u128)
                    .sum();
                let correction = p.mul(p.reduce(v), self.ibase_mod_obase[j]);
                out[j * degree + c] = p.sub(p.reduce_u128(acc), correction);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(values: &[u64]) -> RnsBase {
        RnsBase::new(values.iter().map(|&v| Modulus::new(v).unwrap()).collect()).unwrap()
    }

    fn residues(x: i128, base: &RnsBase) -> Vec<u64> {
        base.moduli()
            .iter()
            .map(|q| x.rem_euclid(q.value() as i128) as u64)
            .collect()
    }

    #[test]
    fn rejects_empty_and_non_coprime() {
        assert!(matches!(
            RnsBase::new(vec![]),
            Err(HeError::Configuration { .. })
        ));
        let shared = vec![Modulus::new(6).unwrap(), Modulus::new(9).unwrap()];
        assert!(matches!(
            RnsBase::new(shared),
            Err(HeError::Configuration { .. })
        ));
    }

    #[test]
    fn compose_recovers_small_values() {
        let b = base(&[17, 97, 113]);
        assert_eq!(b.bit_count(), 18);
        for x in [0i128, 1, 3, 90_000, -7, -90_000] {
            let expected = if x < 0 { x + 17 * 97 * 113 } else { x };
            assert_eq!(b.compose(&residues(x, &b)), WideUint::from_u64(expected as u64));
            assert_eq!(b.compose_centered_f64(&residues(x, &b)), x as f64);
        }
        // above Q/2 the centered value wraps negative
        assert_eq!(b.compose_centered_f64(&residues(186_000, &b)), -337.0);
    }

    #[test]
    fn compose_centered_reports_sign() {
        let b = base(&[1_152_921_504_606_584_833, 1_073_750_017]);
        let (negative, magnitude) = b.compose_centered(&residues(-12_345, &b));
        assert!(negative);
        assert_eq!(magnitude, WideUint::from_u64(12_345));
        assert_eq!(bit_length(&magnitude), 14);
        assert_eq!(bit_length(&WideUint::ZERO), 0);
    }

    #[test]
    fn converter_returns_centered_representative() {
        let ibase = base(&[17, 97]);
        let obase = vec![Modulus::new(113).unwrap(), Modulus::new(257).unwrap()];
        let converter = BaseConverter::new(&ibase, &obase);
        let values = [0i128, 5, -5, 800, -800, 824, -824];
        let degree = values.len();
        let mut input = vec![0u64; 2 * degree];
        for (c, &x) in values.iter().enumerate() {
            let r = residues(x, &ibase);
            input[c] = r[0];
            input[degree + c] = r[1];
        }
        let mut out = vec![0u64; 2 * degree];
        converter.convert_centered(&input, degree, &mut out);
        for (c, &x) in values.iter().enumerate() {
            assert_eq!(out[c], x.rem_euclid(113) as u64, "value {x}");
            assert_eq!(out[degree + c], x.rem_euclid(257) as u64, "value {x}");
        }
    }

    #[test]
    fn product_mod_matches_direct() {
        let b = base(&[17, 97, 113]);
        let m = Modulus::new(1000).unwrap();
        assert_eq!(b.product_mod(&m), (17 * 97 * 113) % 1000);
    }
}
