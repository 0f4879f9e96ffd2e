use serde::{Deserialize, Serialize};

use crate::context::ParmsId;
use crate::errors::{HeError, HeResult};
use crate::math::Modulus;
use crate::rings::RnsPoly;

/// An encoded message.
///
/// Two shapes exist:
/// - a single-channel polynomial modulo the plain modulus `t` in coefficient
///   form with `parms_id == ParmsId::ZERO` (integer scheme), or
/// - an NTT-form polynomial at a chain level, tagged with that level's
///   fingerprint (approximate scheme, or a transformed integer plaintext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plaintext {
    poly: RnsPoly,
    parms_id: ParmsId,
    /// Encoding scale; 1 for integer plaintexts.
    scale: f64,
}

impl Plaintext {
    /// A coefficient plaintext modulo `t`, zero-padded to `degree`.
    pub fn from_coefficients(
        coeffs: &[u64],
        plain_modulus: &Modulus,
        degree: usize,
    ) -> HeResult<Self> {
        if coeffs.len() > degree {
            return Err(HeError::invalid(format!(
                "{} coefficients do not fit in degree {degree}",
                coeffs.len()
            )));
        }
        if let Some(&bad) = coeffs.iter().find(|&&c| c >= plain_modulus.value()) {
            return Err(HeError::invalid(format!(
                "plaintext coefficient {bad} is not reduced modulo {}",
                plain_modulus.value()
            )));
        }
        let mut data = vec![0u64; degree];
        data[..coeffs.len()].copy_from_slice(coeffs);
        Ok(Self {
            poly: RnsPoly::from_raw(data, degree, false),
            parms_id: ParmsId::ZERO,
            scale: 1.0,
        })
    }

    pub(crate) fn from_parts(poly: RnsPoly, parms_id: ParmsId, scale: f64) -> Self {
        Self {
            poly,
            parms_id,
            scale,
        }
    }

    #[inline]
    pub fn poly(&self) -> &RnsPoly {
        &self.poly
    }

    #[inline]
    pub(crate) fn poly_mut(&mut self) -> &mut RnsPoly {
        &mut self.poly
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

    #[inline]
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.poly.degree()
    }

    #[inline]
    pub fn is_ntt_form(&self) -> bool {
        !self.parms_id.is_zero()
    }

    /// Coefficients modulo `t` of an integer plaintext.
    pub fn coefficients(&self) -> HeResult<&[u64]> {
        if self.is_ntt_form() {
            return Err(HeError::state("plaintext is in NTT form"));
        }
        Ok(self.poly.channel(0))
    }

    pub fn is_zero(&self) -> bool {
        self.poly.is_zero()
    }
}
