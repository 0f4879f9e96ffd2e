//! Prime utilities for building NTT-friendly modulus chains.
//!
//! Primality uses Miller-Rabin with a fixed base set that is deterministic
//! for every `u64`. Searches only visit candidates `p = 1 (mod 2n)`, which is
//! exactly the set of moduli admitting a primitive `2n`-th root of unity and
//! therefore a negacyclic NTT over `x^n + 1`.

use crate::errors::{HeError, HeResult};

// Deterministic for all n < 3.3 * 10^24, which covers all u64 values.
const MILLER_RABIN_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

#[inline]
fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((a as u128 * b as u128) % modulus as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    let mut acc = 1 % modulus;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exp >>= 1;
    }
    acc
}

/// Returns `true` if `n` is prime.
pub fn is_prime(n: u64) -> bool {
    match n {
        0 | 1 => return false,
        2 | 3 => return true,
        _ if n & 1 == 0 => return false,
        _ => {}
    }

    let r = (n - 1).trailing_zeros();
    let d = (n - 1) >> r;
    'bases: for &a in MILLER_RABIN_BASES.iter() {
        if a % n == 0 {
            continue;
        }
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'bases;
            }
        }
        return false;
    }
    true
}

/// `p` is prime and `p = 1 (mod 2n)`.
#[inline]
pub fn is_ntt_friendly_prime(p: u64, n: u64) -> bool {
    match n.checked_mul(2) {
        Some(order) if order > 0 => p % order == 1 && is_prime(p),
        _ => false,
    }
}

/// Largest NTT-friendly prime strictly below `bound`, if any.
pub fn get_first_prime_down(bound: u64, n: u64) -> Option<u64> {
    let step = n.checked_mul(2).filter(|&s| s > 0)?;
    if bound <= step {
        return None;
    }
    // Largest candidate < bound with candidate = 1 (mod step).
    let mut candidate = bound - 1 - ((bound - 2) % step);
    loop {
        if is_prime(candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_sub(step).filter(|&c| c > 1)?;
    }
}

/// Smallest NTT-friendly prime strictly above `bound`, if one fits in `u64`.
pub fn get_first_prime_up(bound: u64, n: u64) -> Option<u64> {
    let step = n.checked_mul(2).filter(|&s| s > 0)?;
    let mut candidate = bound - (bound % step) + 1;
    if candidate <= bound {
        candidate = candidate.checked_add(step)?;
    }
    loop {
        if is_prime(candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_add(step)?;
    }
}

/// Generates `count` distinct NTT-friendly primes of exactly `bit_size` bits,
/// walking downward from `2^bit_size`, skipping anything in `exclude`.
///
/// ```
/// use toy_rlwe::math::{generate_primes, is_ntt_friendly_prime};
///
/// let primes = generate_primes(32, 3, 1024, &[]).unwrap();
/// assert_eq!(primes.len(), 3);
/// for p in primes {
///     assert!(is_ntt_friendly_prime(p, 1024));
/// }
/// ```
pub fn generate_primes(
    bit_size: u32,
    count: usize,
    n: u64,
    exclude: &[u64],
) -> HeResult<Vec<u64>> {
    if !(2..=62).contains(&bit_size) {
        return Err(HeError::configuration(format!(
            "prime bit size {bit_size} outside [2, 62]"
        )));
    }
    let lower_bound = 1u64 << (bit_size - 1);
    let mut primes = Vec::with_capacity(count);
    let mut cursor = 1u64 << bit_size;

    while primes.len() < count {
        match get_first_prime_down(cursor, n) {
            Some(prime) if prime >= lower_bound => {
                if !exclude.contains(&prime) {
                    primes.push(prime);
                }
                cursor = prime;
            }
            _ => {
                return Err(HeError::configuration(format!(
                    "not enough {bit_size}-bit primes congruent to 1 mod {}",
                    2 * n
                )));
            }
        }
    }
    Ok(primes)
}

/// Finds the minimal primitive `2n`-th root of unity modulo prime `p`.
pub(crate) fn minimal_primitive_root(n: u64, p: u64) -> Option<u64> {
    let order = n.checked_mul(2)?;
    if order == 0 || (p - 1) % order != 0 {
        return None;
    }
    let cofactor = (p - 1) / order;
    // Any generator of the order-2n subgroup satisfies g^n = -1 because 2n is
    // a power of two.
    let mut root = None;
    for candidate in 2..p {
        let g = pow_mod(candidate, cofactor, p);
        if pow_mod(g, n, p) == p - 1 {
            root = Some(g);
            break;
        }
    }
    let root = root?;

    // Scan all odd powers for the smallest representative.
    let square = mul_mod(root, root, p);
    let mut current = root;
    let mut minimal = root;
    for _ in 0..n {
        if current < minimal {
            minimal = current;
        }
        current = mul_mod(current, square, p);
    }
    Some(minimal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_prime_reference(n: u64) -> bool {
        if n < 2 {
            return false;
        }
        let mut d = 2u64;
        while d * d <= n {
            if n % d == 0 {
                return false;
            }
            d += 1;
        }
        true
    }

    #[test]
    fn miller_rabin_matches_trial_division() {
        for (start, end) in [(0u64, 200u64), (10_000, 10_200), (1_000_000, 1_000_100)] {
            for n in start..end {
                assert_eq!(is_prime(n), is_prime_reference(n), "mismatch at {n}");
            }
        }
    }

    #[test]
    fn rejects_tricky_composites() {
        for n in [561u64, 1_105, 1_729, 3_215_031_751, u64::MAX] {
            assert!(!is_prime(n), "expected composite: {n}");
        }
        assert!(is_prime(18_446_744_073_709_551_557));
        assert!(is_prime(2_147_483_647));
    }

    #[test]
    fn ntt_friendly_condition() {
        assert!(is_ntt_friendly_prime(12289, 1024));
        assert!(is_ntt_friendly_prime(257, 128));
        assert!(!is_ntt_friendly_prime(257, 256));
        assert!(!is_ntt_friendly_prime(2049, 1024));
        assert!(!is_ntt_friendly_prime(17, 0));
    }

    #[test]
    fn prime_search_in_both_directions() {
        let up = get_first_prime_up(1 << 30, 1024).unwrap();
        assert_eq!(up, 1_073_750_017);
        let down = get_first_prime_down(up, 1024).unwrap();
        assert!(down < up);
        assert!(is_ntt_friendly_prime(down, 1024));
        assert_eq!(get_first_prime_down(17, 8), None);
        assert_eq!(get_first_prime_down(18, 8), Some(17));
        assert_eq!(get_first_prime_up(16, 8), Some(17));
        assert_eq!(get_first_prime_up(17, 8), Some(97));
    }

    #[test]
    fn generated_primes_are_distinct_and_sized() {
        let primes = generate_primes(40, 4, 4096, &[]).unwrap();
        assert_eq!(primes.len(), 4);
        for window in primes.windows(2) {
            assert!(window[0] > window[1]);
        }
        for &p in &primes {
            assert_eq!(64 - p.leading_zeros(), 40);
            assert!(is_ntt_friendly_prime(p, 4096));
        }

        let skipped = generate_primes(40, 1, 4096, &primes[..1]).unwrap();
        assert_eq!(skipped[0], primes[1]);
    }

    #[test]
    fn generation_fails_when_range_is_exhausted() {
        assert!(matches!(
            generate_primes(5, 3, 8, &[]),
            Err(HeError::Configuration { .. })
        ));
        assert!(matches!(
            generate_primes(63, 1, 8, &[]),
            Err(HeError::Configuration { .. })
        ));
    }

    #[test]
    fn primitive_root_has_exact_order() {
        for &(n, p) in &[(8u64, 17u64), (8, 97), (4, 257), (1024, 12289)] {
            let root = minimal_primitive_root(n, p).unwrap();
            assert_eq!(pow_mod(root, n, p), p - 1);
            assert_eq!(pow_mod(root, 2 * n, p), 1);
        }
        assert_eq!(minimal_primitive_root(8, 19), None);
    }
}
