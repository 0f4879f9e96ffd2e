//! Word-sized moduli with precomputed reduction constants.
//!
//! `Modulus` carries the Barrett ratio `floor((2^128 - 1) / q)` so that any
//! `u128` product of two reduced values can be brought back into `[0, q)`
//! with two wide multiplications and at most a couple of subtractions.
//! `MultiplyOperand` is the Shoup precomputation for multiplying many values
//! by the same constant (NTT twiddles, RNS correction factors).

use serde::{Deserialize, Serialize};

use super::primes::is_prime;
use crate::errors::{HeError, HeResult};

/// Widest modulus accepted anywhere in the crate.
pub const MODULUS_MAX_BITS: u32 = 61;

const LOW_MASK: u128 = u64::MAX as u128;

/// A modulus `q` in `[2, 2^61)` with its Barrett constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Modulus {
    value: u64,
    bit_count: u32,
    ratio: u128,
}

impl Modulus {
    pub fn new(value: u64) -> HeResult<Self> {
        if value < 2 {
            return Err(HeError::configuration(format!(
                "modulus must be at least 2, got {value}"
            )));
        }
        let bit_count = u64::BITS - value.leading_zeros();
        if bit_count > MODULUS_MAX_BITS {
            return Err(HeError::overflow(format!(
                "modulus {value} has {bit_count} bits, limit is {MODULUS_MAX_BITS}"
            )));
        }
        Ok(Self {
            value,
            bit_count,
            ratio: u128::MAX / value as u128,
        })
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }

    #[inline]
    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    pub fn is_prime(&self) -> bool {
        is_prime(self.value)
    }

    // ─── Reduction ───────────────────────────────────────────────────────────

    #[inline]
    pub fn reduce(&self, x: u64) -> u64 {
        if x < self.value {
            x
        } else {
            self.reduce_u128(x as u128)
        }
    }

    /// Barrett reduction of a full 128-bit value.
    #[inline]
    pub fn reduce_u128(&self, x: u128) -> u64 {
        let q = self.value as u128;
        // The estimate never exceeds floor(x / q), so the product cannot wrap.
        let estimate = mul_high_u128(x, self.ratio);
        let mut r = x - estimate * q;
        while r >= q {
            r -= q;
        }
        r as u64
    }

    /// Maps a signed integer to its representative in `[0, q)`.
    #[inline]
    pub fn reduce_i64(&self, x: i64) -> u64 {
        let magnitude = self.reduce(x.unsigned_abs());
        if x < 0 { self.neg(magnitude) } else { magnitude }
    }

    /// Maps `x` in `[0, q)` to its centered representative in `(-q/2, q/2]`.
    #[inline]
    pub fn center(&self, x: u64) -> i64 {
        if x > self.value / 2 {
            -((self.value - x) as i64)
        } else {
            x as i64
        }
    }

    // ─── Arithmetic on reduced operands ──────────────────────────────────────

    #[inline]
    pub fn add(&self, a: u64, b: u64) -> u64 {
        let s = a + b;
        if s >= self.value { s - self.value } else { s }
    }

    #[inline]
    pub fn sub(&self, a: u64, b: u64) -> u64 {
        if a >= b { a - b } else { a + self.value - b }
    }

    #[inline]
    pub fn neg(&self, a: u64) -> u64 {
        if a == 0 { 0 } else { self.value - a }
    }

    #[inline]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        self.reduce_u128(a as u128 * b as u128)
    }

    pub fn pow(&self, base: u64, mut exponent: u64) -> u64 {
        let mut base = self.reduce(base);
        let mut acc = 1;
        while exponent > 0 {
            if exponent & 1 == 1 {
                acc = self.mul(acc, base);
            }
            base = self.mul(base, base);
            exponent >>= 1;
        }
        acc
    }

    /// Multiplicative inverse, or `None` when `gcd(a, q) != 1`.
    pub fn inverse(&self, a: u64) -> Option<u64> {
        let a = self.reduce(a);
        if a == 0 {
            return None;
        }
        let (mut old_r, mut r) = (a as i128, self.value as i128);
        let (mut old_s, mut s) = (1i128, 0i128);
        while r != 0 {
            let quotient = old_r / r;
            (old_r, r) = (r, old_r - quotient * r);
            (old_s, s) = (s, old_s - quotient * s);
        }
        if old_r != 1 {
            return None;
        }
        Some(old_s.rem_euclid(self.value as i128) as u64)
    }

    /// Shoup multiplication by a precomputed constant. `x` may be any `u64`.
    #[inline]
    pub fn mul_shoup(&self, x: u64, operand: &MultiplyOperand) -> u64 {
        let estimate = ((x as u128 * operand.quotient as u128) >> 64) as u64;
        let r = x
            .wrapping_mul(operand.operand)
            .wrapping_sub(estimate.wrapping_mul(self.value));
        if r >= self.value { r - self.value } else { r }
    }
}

impl TryFrom<u64> for Modulus {
    type Error = HeError;

    fn try_from(value: u64) -> HeResult<Self> {
        Self::new(value)
    }
}

impl From<Modulus> for u64 {
    fn from(modulus: Modulus) -> Self {
        modulus.value
    }
}

/// A constant `w < q` together with `floor(w * 2^64 / q)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiplyOperand {
    operand: u64,
    quotient: u64,
}

impl MultiplyOperand {
    pub fn new(operand: u64, modulus: &Modulus) -> Self {
        let operand = modulus.reduce(operand);
        let quotient = (((operand as u128) << 64) / modulus.value() as u128) as u64;
        Self { operand, quotient }
    }

    #[inline]
    pub fn operand(&self) -> u64 {
        self.operand
    }
}

/// High 128 bits of the 256-bit product `a * b`.
#[inline]
fn mul_high_u128(a: u128, b: u128) -> u128 {
    let (a_hi, a_lo) = (a >> 64, a & LOW_MASK);
    let (b_hi, b_lo) = (b >> 64, b & LOW_MASK);
    let lo_lo = a_lo * b_lo;
    let hi_lo = a_hi * b_lo;
    let lo_hi = a_lo * b_hi;
    let hi_hi = a_hi * b_hi;
    let cross = (lo_lo >> 64) + (hi_lo & LOW_MASK) + (lo_hi & LOW_MASK);
    hi_hi + (hi_lo >> 64) + (lo_hi >> 64) + (cross >> 64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    const Q60: u64 = 1_152_921_504_606_846_883;

    #[test]
    fn rejects_degenerate_values() {
        assert!(matches!(Modulus::new(0), Err(HeError::Configuration { .. })));
        assert!(matches!(Modulus::new(1), Err(HeError::Configuration { .. })));
        assert!(matches!(
            Modulus::new(1 << 61),
            Err(HeError::ArithmeticOverflow { .. })
        ));
        assert_eq!(Modulus::new((1 << 61) - 1).unwrap().bit_count(), 61);
    }

    #[test]
    fn barrett_matches_remainder() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        for &q in &[2u64, 3, 17, 257, 65_537, 1_073_750_017, Q60, 1 << 40] {
            let modulus = Modulus::new(q).unwrap();
            for _ in 0..200 {
                let x: u128 = rng.random();
                assert_eq!(modulus.reduce_u128(x), (x % q as u128) as u64);
                let y: u64 = rng.random();
                assert_eq!(modulus.reduce(y), y % q);
            }
            assert_eq!(modulus.reduce_u128(u128::MAX), (u128::MAX % q as u128) as u64);
        }
    }

    #[test]
    fn mul_and_shoup_agree() {
        let modulus = Modulus::new(Q60).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        for _ in 0..500 {
            let a = rng.random_range(0..Q60);
            let b = rng.random_range(0..Q60);
            let expected = ((a as u128 * b as u128) % Q60 as u128) as u64;
            assert_eq!(modulus.mul(a, b), expected);
            let operand = MultiplyOperand::new(b, &modulus);
            assert_eq!(modulus.mul_shoup(a, &operand), expected);
        }
    }

    #[test]
    fn add_sub_neg_wrap() {
        let m = Modulus::new(17).unwrap();
        assert_eq!(m.add(16, 2), 1);
        assert_eq!(m.sub(2, 5), 14);
        assert_eq!(m.neg(0), 0);
        assert_eq!(m.neg(3), 14);
        assert_eq!(m.reduce_i64(-1), 16);
        assert_eq!(m.reduce_i64(-35), 16);
        assert_eq!(m.center(16), -1);
        assert_eq!(m.center(8), 8);
        assert_eq!(m.center(9), -8);
    }

    #[test]
    fn inverse_and_pow() {
        let m = Modulus::new(97).unwrap();
        for a in 1..97 {
            let inv = m.inverse(a).unwrap();
            assert_eq!(m.mul(a, inv), 1);
        }
        assert_eq!(m.inverse(0), None);
        assert_eq!(Modulus::new(256).unwrap().inverse(6), None);
        assert_eq!(m.pow(5, 96), 1);
        assert_eq!(m.pow(3, 0), 1);
    }

    #[test]
    fn serde_roundtrip_revalidates() {
        let m = Modulus::new(257).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "257");
        let back: Modulus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
        assert!(serde_json::from_str::<Modulus>("1").is_err());
    }
}
