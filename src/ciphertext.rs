use serde::{Deserialize, Serialize};

use crate::context::ParmsId;
use crate::rings::RnsPoly;

/// An RLWE ciphertext `(c_0, c_1, ..., c_{size-1})` decrypting as
/// `sum c_i s^i`.
///
/// Fresh and relinearized ciphertexts have size 2; a product before
/// relinearization has size 3. Integer-scheme ciphertexts are kept in
/// coefficient form and approximate-scheme ones in NTT form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ciphertext {
    polys: Vec<RnsPoly>,
    parms_id: ParmsId,
    scale: f64,
    correction_factor: u64,
}

impl Ciphertext {
    pub(crate) fn new(polys: Vec<RnsPoly>, parms_id: ParmsId, scale: f64) -> Self {
        debug_assert!(!polys.is_empty());
        Self {
            polys,
            parms_id,
            scale,
            correction_factor: 1,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.polys.len()
    }

    #[inline]
    pub fn polys(&self) -> &[RnsPoly] {
        &self.polys
    }

    #[inline]
    pub(crate) fn polys_mut(&mut self) -> &mut Vec<RnsPoly> {
        &mut self.polys
    }

    #[inline]
    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    #[inline]
    pub(crate) fn set_parms_id(&mut self, parms_id: ParmsId) {
        self.parms_id = parms_id;
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Overrides the tracked scale, e.g. to align two ciphertexts whose
    /// scales differ only by rounding.
    #[inline]
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    #[inline]
    pub fn correction_factor(&self) -> u64 {
        self.correction_factor
    }

    #[inline]
    pub fn is_ntt_form(&self) -> bool {
        self.polys.first().is_some_and(RnsPoly::is_ntt_form)
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.polys.first().map_or(0, RnsPoly::degree)
    }

    /// Number of RNS channels, i.e. primes of the current level.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.polys.first().map_or(0, RnsPoly::channel_count)
    }

    /// True when every component except `c_0` is zero, so the ciphertext
    /// decrypts without the secret key.
    pub fn is_transparent(&self) -> bool {
        self.polys.iter().skip(1).all(RnsPoly::is_zero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparency_tracks_non_constant_components() {
        let zero = RnsPoly::zero(8, 2);
        let mut one = RnsPoly::zero(8, 2);
        one.data_mut()[3] = 1;
        let ct = Ciphertext::new(vec![one.clone(), zero.clone()], ParmsId::ZERO, 1.0);
        assert!(ct.is_transparent());
        assert_eq!(ct.size(), 2);
        assert_eq!(ct.channel_count(), 2);
        assert_eq!(ct.correction_factor(), 1);
        assert!(!ct.is_ntt_form());

        let ct = Ciphertext::new(vec![zero, one], ParmsId::ZERO, 1.0);
        assert!(!ct.is_transparent());
    }
}
