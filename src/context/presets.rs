//! Modulus selection helpers and the security bound table.

use std::collections::BTreeMap;

use super::parameters::SecurityLevel;
use crate::errors::{HeError, HeResult};
use crate::math::{Modulus, generate_primes};

pub const POLY_MODULUS_DEGREE_MIN: usize = 2;
pub const POLY_MODULUS_DEGREE_MAX: usize = 131_072;
pub const COEFF_MODULUS_COUNT_MAX: usize = 64;
pub const COEFF_MODULUS_BITS_MIN: u32 = 2;
pub const COEFF_MODULUS_BITS_MAX: u32 = 60;

/// `(degree, tc128, tc192, tc256)`: the largest total coefficient modulus
/// bit count for a ternary secret at each classical security level.
const SECURITY_TABLE: [(usize, u32, u32, u32); 6] = [
    (1024, 27, 19, 14),
    (2048, 54, 37, 29),
    (4096, 109, 75, 58),
    (8192, 218, 152, 118),
    (16384, 438, 305, 237),
    (32768, 881, 611, 476),
];

pub struct CoeffModulus;

impl CoeffModulus {
    /// Largest total coefficient modulus bit count allowed for `degree` at
    /// `security`. Degrees outside the table allow nothing, unless the bound
    /// is disabled.
    pub fn max_bit_count(degree: usize, security: SecurityLevel) -> u32 {
        let Some(&(_, tc128, tc192, tc256)) =
            SECURITY_TABLE.iter().find(|(d, ..)| *d == degree)
        else {
            return match security {
                SecurityLevel::None => u32::MAX,
                _ => 0,
            };
        };
        match security {
            SecurityLevel::None => u32::MAX,
            SecurityLevel::Tc128 => tc128,
            SecurityLevel::Tc192 => tc192,
            SecurityLevel::Tc256 => tc256,
        }
    }

    /// One NTT-friendly prime per entry of `bit_sizes`, all distinct.
    ///
    /// Primes sharing a bit size are handed out in increasing order, so a
    /// trailing special prime of the same size as the data primes is still
    /// the largest of them.
    pub fn create(degree: usize, bit_sizes: &[u32]) -> HeResult<Vec<Modulus>> {
        if !(POLY_MODULUS_DEGREE_MIN..=POLY_MODULUS_DEGREE_MAX).contains(&degree)
            || !degree.is_power_of_two()
        {
            return Err(HeError::configuration(format!(
                "poly_modulus_degree {degree} is not a supported power of two"
            )));
        }
        if bit_sizes.is_empty() || bit_sizes.len() > COEFF_MODULUS_COUNT_MAX {
            return Err(HeError::configuration(format!(
                "between 1 and {COEFF_MODULUS_COUNT_MAX} primes are required, got {}",
                bit_sizes.len()
            )));
        }
        if let Some(bad) = bit_sizes
            .iter()
            .find(|b| !(COEFF_MODULUS_BITS_MIN..=COEFF_MODULUS_BITS_MAX).contains(*b))
        {
            return Err(HeError::configuration(format!(
                "prime bit size {bad} outside [{COEFF_MODULUS_BITS_MIN}, {COEFF_MODULUS_BITS_MAX}]"
            )));
        }

        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for &bits in bit_sizes {
            *counts.entry(bits).or_default() += 1;
        }
        let mut pools = BTreeMap::new();
        for (&bits, &count) in &counts {
            let mut primes = generate_primes(bits, count, degree as u64, &[])?;
            // popped from the back: smallest first
            primes.sort_unstable_by(|a, b| b.cmp(a));
            pools.insert(bits, primes);
        }

        bit_sizes
            .iter()
            .map(|bits| {
                pools
                    .get_mut(bits)
                    .and_then(Vec::pop)
                    .ok_or_else(|| HeError::configuration("prime pool exhausted"))
                    .and_then(Modulus::new)
            })
            .collect()
    }
}

pub struct PlainModulus;

impl PlainModulus {
    /// A prime plain modulus of `bit_size` bits that supports batching
    /// (`t = 1 mod 2N`).
    pub fn batching(degree: usize, bit_size: u32) -> HeResult<Modulus> {
        let primes = generate_primes(bit_size, 1, degree as u64, &[])?;
        primes
            .first()
            .copied()
            .ok_or_else(|| HeError::configuration("no batching prime found"))
            .and_then(Modulus::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::is_ntt_friendly_prime;

    #[test]
    fn security_table_lookup() {
        assert_eq!(CoeffModulus::max_bit_count(4096, SecurityLevel::Tc128), 109);
        assert_eq!(CoeffModulus::max_bit_count(8192, SecurityLevel::Tc256), 118);
        assert_eq!(CoeffModulus::max_bit_count(32768, SecurityLevel::Tc192), 611);
        assert_eq!(CoeffModulus::max_bit_count(8, SecurityLevel::Tc128), 0);
        assert_eq!(CoeffModulus::max_bit_count(8, SecurityLevel::None), u32::MAX);
    }

    #[test]
    fn create_returns_distinct_friendly_primes() {
        let primes = CoeffModulus::create(32, &[60, 40, 40, 60]).unwrap();
        assert_eq!(primes.len(), 4);
        let bits: Vec<u32> = primes.iter().map(Modulus::bit_count).collect();
        assert_eq!(bits, vec![60, 40, 40, 60]);
        assert!(primes[0].value() < primes[3].value());
        assert!(primes[1].value() < primes[2].value());
        for q in &primes {
            assert!(is_ntt_friendly_prime(q.value(), 32));
        }
    }

    #[test]
    fn create_rejects_bad_input() {
        assert!(matches!(
            CoeffModulus::create(12, &[30]),
            Err(HeError::Configuration { .. })
        ));
        assert!(CoeffModulus::create(8, &[]).is_err());
        assert!(CoeffModulus::create(8, &[61]).is_err());
        assert!(CoeffModulus::create(8, &[1]).is_err());
    }

    #[test]
    fn batching_prime_is_friendly() {
        let t = PlainModulus::batching(1024, 20).unwrap();
        assert_eq!(t.bit_count(), 20);
        assert!(is_ntt_friendly_prime(t.value(), 1024));
    }
}
