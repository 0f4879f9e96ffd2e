use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::ntt::NttTables;
use crate::errors::{HeError, HeResult};
use crate::math::Modulus;

/// A polynomial in `Z_{q_0} x … x Z_{q_{k-1}}[X] / (X^N + 1)`.
///
/// Coefficients are stored flat, channel by channel: channel `i` occupies
/// `data[i * N..(i + 1) * N]` and holds residues modulo the `i`-th prime of
/// whatever modulus list the caller pairs it with. The polynomial does not
/// own its moduli or NTT tables; those live in the context arena and are
/// passed in by the caller.
///
/// # Invariants
/// - `data.len() == channel_count * degree`
/// - every residue in channel `i` is reduced modulo the `i`-th modulus
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRnsPoly")]
pub struct RnsPoly {
    data: Vec<u64>,
    degree: usize,
    is_ntt_form: bool,
}

/// Unchecked wire form; residues are checked once a modulus list is known.
#[derive(Deserialize)]
struct RawRnsPoly {
    data: Vec<u64>,
    degree: usize,
    is_ntt_form: bool,
}

impl TryFrom<RawRnsPoly> for RnsPoly {
    type Error = HeError;

    fn try_from(raw: RawRnsPoly) -> HeResult<Self> {
        if !raw.degree.is_power_of_two() {
            return Err(HeError::invalid(format!(
                "polynomial degree {} is not a power of two",
                raw.degree
            )));
        }
        if raw.data.is_empty() || raw.data.len() % raw.degree != 0 {
            return Err(HeError::invalid(format!(
                "{} residues do not fill whole channels of degree {}",
                raw.data.len(),
                raw.degree
            )));
        }
        Ok(Self::from_raw(raw.data, raw.degree, raw.is_ntt_form))
    }
}

// ─── Constructors ─────────────────────────────────────────────────────────────

impl RnsPoly {
    /// The zero polynomial in coefficient form.
    pub fn zero(degree: usize, channel_count: usize) -> Self {
        Self {
            data: vec![0; degree * channel_count],
            degree,
            is_ntt_form: false,
        }
    }

    /// Reduces signed coefficients into every channel.
    pub fn from_signed(coeffs: &[i64], moduli: &[Modulus]) -> Self {
        let degree = coeffs.len();
        let mut data = Vec::with_capacity(degree * moduli.len());
        for modulus in moduli {
            data.extend(coeffs.iter().map(|&c| modulus.reduce_i64(c)));
        }
        Self {
            data,
            degree,
            is_ntt_form: false,
        }
    }

    /// Builds a polynomial from raw residues, checking shape and reduction.
    pub fn from_channels(
        data: Vec<u64>,
        degree: usize,
        moduli: &[Modulus],
        is_ntt_form: bool,
    ) -> HeResult<Self> {
        if degree == 0 || data.len() != degree * moduli.len() {
            return Err(HeError::invalid(format!(
                "expected {} residues for {} channels of degree {degree}, got {}",
                degree * moduli.len(),
                moduli.len(),
                data.len()
            )));
        }
        let poly = Self {
            data,
            degree,
            is_ntt_form,
        };
        poly.check_reduced(moduli)?;
        Ok(poly)
    }

    // Internal: caller guarantees shape and reduction.
    pub(crate) fn from_raw(data: Vec<u64>, degree: usize, is_ntt_form: bool) -> Self {
        debug_assert!(degree > 0 && data.len() % degree == 0);
        Self {
            data,
            degree,
            is_ntt_form,
        }
    }
}

// ─── Accessors ────────────────────────────────────────────────────────────────

impl RnsPoly {
    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.data.len() / self.degree
    }

    #[inline]
    pub fn is_ntt_form(&self) -> bool {
        self.is_ntt_form
    }

    #[inline]
    pub(crate) fn set_ntt_form(&mut self, is_ntt_form: bool) {
        self.is_ntt_form = is_ntt_form;
    }

    #[inline]
    pub fn data(&self) -> &[u64] {
        &self.data
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut [u64] {
        &mut self.data
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[u64] {
        &self.data[index * self.degree..(index + 1) * self.degree]
    }

    #[inline]
    pub(crate) fn channel_mut(&mut self, index: usize) -> &mut [u64] {
        &mut self.data[index * self.degree..(index + 1) * self.degree]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[u64]> {
        self.data.chunks(self.degree)
    }

    pub(crate) fn channels_mut(&mut self) -> impl Iterator<Item = &mut [u64]> {
        self.data.chunks_mut(self.degree)
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&c| c == 0)
    }

    /// Keeps only the first `channel_count` channels.
    pub fn truncate(&mut self, channel_count: usize) {
        self.data.truncate(channel_count * self.degree);
    }

    /// Appends a zeroed channel.
    pub(crate) fn push_zero_channel(&mut self) {
        self.data.extend(std::iter::repeat_n(0, self.degree));
    }

    /// Fails with an overflow error if any residue is not below its channel's
    /// modulus. Deserialized polynomials have not been through this yet.
    pub(crate) fn check_reduced(&self, moduli: &[Modulus]) -> HeResult<()> {
        self.check_moduli(moduli)?;
        for (channel, modulus) in self.data.chunks(self.degree).zip(moduli) {
            if let Some(&bad) = channel.iter().find(|&&c| c >= modulus.value()) {
                return Err(HeError::overflow(format!(
                    "residue {bad} is not reduced modulo {}",
                    modulus.value()
                )));
            }
        }
        Ok(())
    }
}

// ─── Domain conversion ───────────────────────────────────────────────────────

impl RnsPoly {
    /// Forward NTT on every channel. Fails if already in NTT form.
    pub fn ntt_forward(&mut self, tables: &[NttTables]) -> HeResult<()> {
        if self.is_ntt_form {
            return Err(HeError::state("polynomial is already in NTT form"));
        }
        self.check_tables(tables)?;
        self.data
            .par_chunks_mut(self.degree)
            .zip(tables.par_iter())
            .for_each(|(channel, table)| table.forward(channel));
        self.is_ntt_form = true;
        Ok(())
    }

    /// Inverse NTT on every channel. Fails if already in coefficient form.
    pub fn ntt_inverse(&mut self, tables: &[NttTables]) -> HeResult<()> {
        if !self.is_ntt_form {
            return Err(HeError::state("polynomial is already in coefficient form"));
        }
        self.check_tables(tables)?;
        self.data
            .par_chunks_mut(self.degree)
            .zip(tables.par_iter())
            .for_each(|(channel, table)| table.inverse(channel));
        self.is_ntt_form = false;
        Ok(())
    }

    fn check_tables(&self, tables: &[NttTables]) -> HeResult<()> {
        if tables.len() != self.channel_count() {
            return Err(HeError::state(format!(
                "{} NTT tables supplied for {} channels",
                tables.len(),
                self.channel_count()
            )));
        }
        if tables.iter().any(|t| t.degree() != self.degree) {
            return Err(HeError::state("NTT table degree does not match polynomial"));
        }
        Ok(())
    }
}

// ─── Arithmetic ───────────────────────────────────────────────────────────────

impl RnsPoly {
    pub fn add_assign(&mut self, rhs: &RnsPoly, moduli: &[Modulus]) -> HeResult<()> {
        self.check_compatible(rhs, moduli)?;
        self.zip_channels(rhs, moduli, |q, a, b| q.add(a, b));
        Ok(())
    }

    pub fn sub_assign(&mut self, rhs: &RnsPoly, moduli: &[Modulus]) -> HeResult<()> {
        self.check_compatible(rhs, moduli)?;
        self.zip_channels(rhs, moduli, |q, a, b| q.sub(a, b));
        Ok(())
    }

    /// Pointwise product; both operands must be in NTT form.
    pub fn dyadic_mul_assign(&mut self, rhs: &RnsPoly, moduli: &[Modulus]) -> HeResult<()> {
        self.check_compatible(rhs, moduli)?;
        if !self.is_ntt_form {
            return Err(HeError::state("pointwise product requires NTT form"));
        }
        self.zip_channels(rhs, moduli, |q, a, b| q.mul(a, b));
        Ok(())
    }

    pub fn negate(&mut self, moduli: &[Modulus]) -> HeResult<()> {
        self.check_moduli(moduli)?;
        for (channel, q) in self.data.chunks_mut(self.degree).zip(moduli) {
            for c in channel.iter_mut() {
                *c = q.neg(*c);
            }
        }
        Ok(())
    }

    /// Multiplies every coefficient by an integer scalar.
    pub fn multiply_scalar(&mut self, scalar: u64, moduli: &[Modulus]) -> HeResult<()> {
        self.check_moduli(moduli)?;
        for (channel, q) in self.data.chunks_mut(self.degree).zip(moduli) {
            let s = q.reduce(scalar);
            for c in channel.iter_mut() {
                *c = q.mul(*c, s);
            }
        }
        Ok(())
    }

    /// Multiplies by the monomial `X^shift` in coefficient form.
    pub fn negacyclic_shift(&mut self, shift: usize, moduli: &[Modulus]) -> HeResult<()> {
        self.check_moduli(moduli)?;
        if self.is_ntt_form {
            return Err(HeError::state("monomial shift requires coefficient form"));
        }
        let n = self.degree;
        let shift = shift % (2 * n);
        for (channel, q) in self.data.chunks_mut(n).zip(moduli) {
            let source = channel.to_vec();
            for (i, &c) in source.iter().enumerate() {
                let target = (i + shift) % (2 * n);
                if target < n {
                    channel[target] = c;
                } else {
                    channel[target - n] = q.neg(c);
                }
            }
        }
        Ok(())
    }

    fn zip_channels(
        &mut self,
        rhs: &RnsPoly,
        moduli: &[Modulus],
        op: impl Fn(&Modulus, u64, u64) -> u64,
    ) {
        let n = self.degree;
        for ((lhs, rhs), q) in self.data.chunks_mut(n).zip(rhs.data.chunks(n)).zip(moduli) {
            for (a, &b) in lhs.iter_mut().zip(rhs) {
                *a = op(q, *a, b);
            }
        }
    }

    fn check_moduli(&self, moduli: &[Modulus]) -> HeResult<()> {
        if moduli.len() != self.channel_count() {
            return Err(HeError::state(format!(
                "{} moduli supplied for {} channels",
                moduli.len(),
                self.channel_count()
            )));
        }
        Ok(())
    }

    fn check_compatible(&self, rhs: &RnsPoly, moduli: &[Modulus]) -> HeResult<()> {
        self.check_moduli(moduli)?;
        if self.degree != rhs.degree || self.data.len() != rhs.data.len() {
            return Err(HeError::state("polynomial shapes differ"));
        }
        if self.is_ntt_form != rhs.is_ntt_form {
            return Err(HeError::state("operands are in different NTT forms"));
        }
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn moduli() -> Vec<Modulus> {
        vec![Modulus::new(17).unwrap(), Modulus::new(97).unwrap()]
    }

    fn tables() -> Vec<NttTables> {
        moduli()
            .into_iter()
            .map(|q| NttTables::new(8, q).unwrap())
            .collect()
    }

    #[test]
    fn from_signed_reduces_per_channel() {
        let poly = RnsPoly::from_signed(&[-1, 2, -3, 4, 0, 0, 0, 0], &moduli());
        assert_eq!(poly.channel_count(), 2);
        assert_eq!(&poly.channel(0)[..3], &[16, 2, 14]);
        assert_eq!(poly.channel(1)[0], 96);
        assert!(!poly.is_ntt_form());
    }

    #[test]
    fn from_channels_validates() {
        let bad = vec![17u64; 8].into_iter().chain(vec![0u64; 8]).collect();
        assert!(matches!(
            RnsPoly::from_channels(bad, 8, &moduli(), false),
            Err(HeError::ArithmeticOverflow { .. })
        ));
        assert!(matches!(
            RnsPoly::from_channels(vec![0; 8], 8, &moduli(), false),
            Err(HeError::InvalidArgument { .. })
        ));
        assert!(RnsPoly::from_channels(vec![0; 16], 8, &moduli(), true).is_ok());
    }

    #[test]
    fn deserialization_checks_shape() {
        let poly = RnsPoly::from_signed(&[1, -2, 3, 0, 0, 0, 0, 5], &moduli());
        let json = serde_json::to_string(&poly).unwrap();
        assert_eq!(serde_json::from_str::<RnsPoly>(&json).unwrap(), poly);

        for bad in [
            r#"{"data":[1,2,3,4],"degree":0,"is_ntt_form":false}"#,
            r#"{"data":[1,2,3,4,5,6],"degree":3,"is_ntt_form":false}"#,
            r#"{"data":[1,2,3,4,5,6],"degree":4,"is_ntt_form":false}"#,
            r#"{"data":[],"degree":4,"is_ntt_form":true}"#,
        ] {
            assert!(serde_json::from_str::<RnsPoly>(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn check_reduced_flags_large_residues() {
        let mut poly = RnsPoly::from_signed(&[1, 2, 3, 4, 5, 6, 7, 8], &moduli());
        assert!(poly.check_reduced(&moduli()).is_ok());
        poly.data_mut()[9] = 97;
        assert!(matches!(
            poly.check_reduced(&moduli()),
            Err(HeError::ArithmeticOverflow { .. })
        ));
        assert!(matches!(
            poly.check_reduced(&moduli()[..1]),
            Err(HeError::State { .. })
        ));
    }

    #[test]
    fn ntt_roundtrip_and_form_tracking() {
        let tables = tables();
        let mut poly = RnsPoly::from_signed(&[1, -2, 3, 4, -5, 6, 7, -8], &moduli());
        let original = poly.clone();
        poly.ntt_forward(&tables).unwrap();
        assert!(poly.is_ntt_form());
        assert!(matches!(
            poly.ntt_forward(&tables),
            Err(HeError::State { .. })
        ));
        poly.ntt_inverse(&tables).unwrap();
        assert_eq!(poly, original);
    }

    #[test]
    fn add_sub_negate() {
        let q = moduli();
        let mut a = RnsPoly::from_signed(&[1, 2, 3, 4, 5, 6, 7, 8], &q);
        let b = RnsPoly::from_signed(&[8, 7, 6, 5, 4, 3, 2, 1], &q);
        a.add_assign(&b, &q).unwrap();
        assert!(a.channels().all(|ch| ch.iter().all(|&c| c == 9)));
        a.sub_assign(&b, &q).unwrap();
        a.negate(&q).unwrap();
        assert_eq!(a, RnsPoly::from_signed(&[-1, -2, -3, -4, -5, -6, -7, -8], &q));
    }

    #[test]
    fn mismatched_forms_are_rejected() {
        let q = moduli();
        let mut a = RnsPoly::zero(8, 2);
        let mut b = RnsPoly::zero(8, 2);
        b.ntt_forward(&tables()).unwrap();
        assert!(matches!(a.add_assign(&b, &q), Err(HeError::State { .. })));
        assert!(matches!(
            a.dyadic_mul_assign(&a.clone(), &q),
            Err(HeError::State { .. })
        ));
        assert!(matches!(a.negate(&q[..1]), Err(HeError::State { .. })));
    }

    #[test]
    fn dyadic_product_matches_negacyclic_convolution() {
        // (1 + x) * x^7 = x^7 + x^8 = -1 + x^7
        let q = moduli();
        let tables = tables();
        let mut a = RnsPoly::from_signed(&[1, 1, 0, 0, 0, 0, 0, 0], &q);
        let mut b = RnsPoly::from_signed(&[0, 0, 0, 0, 0, 0, 0, 1], &q);
        a.ntt_forward(&tables).unwrap();
        b.ntt_forward(&tables).unwrap();
        a.dyadic_mul_assign(&b, &q).unwrap();
        a.ntt_inverse(&tables).unwrap();
        assert_eq!(a, RnsPoly::from_signed(&[-1, 0, 0, 0, 0, 0, 0, 1], &q));
    }

    #[test]
    fn shift_and_scalar() {
        let q = moduli();
        let mut a = RnsPoly::from_signed(&[1, 0, 0, 0, 0, 0, 0, 2], &q);
        a.negacyclic_shift(1, &q).unwrap();
        assert_eq!(a, RnsPoly::from_signed(&[-2, 1, 0, 0, 0, 0, 0, 0], &q));
        a.multiply_scalar(3, &q).unwrap();
        assert_eq!(a, RnsPoly::from_signed(&[-6, 3, 0, 0, 0, 0, 0, 0], &q));
        a.negacyclic_shift(16, &q).unwrap();
        assert_eq!(a, RnsPoly::from_signed(&[-6, 3, 0, 0, 0, 0, 0, 0], &q));
    }

    #[test]
    fn truncate_drops_trailing_channels() {
        let mut a = RnsPoly::from_signed(&[5; 8], &moduli());
        a.truncate(1);
        assert_eq!(a.channel_count(), 1);
        a.push_zero_channel();
        assert_eq!(a.channel_count(), 2);
        assert!(a.channel(1).iter().all(|&c| c == 0));
    }
}
