//! CKKS encoder/decoder.
//!
//! Implements the canonical embedding with slot `h` evaluated at `ζ^{3^h}`,
//! `ζ = e^{iπ/N}`, the same generator the Galois tool rotates with:
//!   encode: inverse special FFT, scale, round, reduce per prime
//!   decode: inverse NTT, exact CRT composition, special FFT, unscale

use std::sync::Arc;

use num_complex::Complex64;
use tracing::instrument;

use crate::context::{Context, ContextData, ParmsId, SchemeKind};
use crate::errors::{HeError, HeResult};
use crate::math::Modulus;
use crate::plaintext::Plaintext;
use crate::rings::RnsPoly;

use super::special_fft::SpecialFft;

/// Accepted input views for the slot builder, real or complex.
#[derive(Clone, Copy, Debug)]
pub enum SlotInput<'a> {
    Real(&'a [f64]),
    Complex(&'a [Complex64]),
}

impl SlotInput<'_> {
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            SlotInput::Real(values) => values.len(),
            SlotInput::Complex(values) => values.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn get(&self, idx: usize) -> Complex64 {
        match self {
            SlotInput::Real(values) => Complex64::new(values[idx], 0.0),
            SlotInput::Complex(values) => values[idx],
        }
    }
}

impl<'a> From<&'a [f64]> for SlotInput<'a> {
    fn from(values: &'a [f64]) -> Self {
        SlotInput::Real(values)
    }
}

impl<'a> From<&'a [Complex64]> for SlotInput<'a> {
    fn from(values: &'a [Complex64]) -> Self {
        SlotInput::Complex(values)
    }
}

pub struct CkksEncoder {
    context: Arc<Context>,
    degree: usize,
    fft: SpecialFft,
}

impl CkksEncoder {
    pub fn new(context: Arc<Context>) -> HeResult<Self> {
        if context.scheme() != SchemeKind::Approximate {
            return Err(HeError::configuration(
                "CKKS encoding requires the approximate scheme",
            ));
        }
        let degree = context.degree();
        Ok(Self {
            context,
            degree,
            fft: SpecialFft::new(degree),
        })
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.degree / 2
    }

    pub fn encode_real(
        &self,
        values: &[f64],
        parms_id: &ParmsId,
        scale: f64,
    ) -> HeResult<Plaintext> {
        self.encode(SlotInput::Real(values), parms_id, scale)
    }

    pub fn encode_complex(
        &self,
        values: &[Complex64],
        parms_id: &ParmsId,
        scale: f64,
    ) -> HeResult<Plaintext> {
        self.encode(SlotInput::Complex(values), parms_id, scale)
    }

    /// Encodes up to `N/2` slots into an NTT-form plaintext at `parms_id`.
    #[instrument(skip_all, fields(slots = values.len(), scale = scale))]
    pub fn encode(
        &self,
        values: SlotInput<'_>,
        parms_id: &ParmsId,
        scale: f64,
    ) -> HeResult<Plaintext> {
        let data = self.context.data_level(parms_id)?;
        if values.len() > self.slot_count() {
            return Err(HeError::invalid(format!(
                "{} values exceed {} slots",
                values.len(),
                self.slot_count()
            )));
        }
        if !(scale.is_finite() && scale >= 1.0) {
            return Err(HeError::invalid(format!("scale must be finite and >= 1, got {scale}")));
        }
        let slots: Vec<Complex64> = (0..values.len()).map(|h| values.get(h)).collect();
        if slots.iter().any(|z| !(z.re.is_finite() && z.im.is_finite())) {
            return Err(HeError::invalid("slot values must be finite"));
        }

        let coefficients: Vec<f64> = self
            .fft
            .project(&slots)
            .into_iter()
            .map(|c| (c * scale).round())
            .collect();

        let max_abs = coefficients.iter().fold(0.0f64, |m, c| m.max(c.abs()));
        let bits = data.total_coeff_modulus_bit_count();
        if max_abs >= 2f64.powi(bits as i32 - 2) {
            return Err(HeError::overflow(format!(
                "encoded coefficient of magnitude {max_abs:e} does not fit a {bits}-bit modulus"
            )));
        }

        let mut poly = residues(&coefficients, data.coeff_modulus());
        poly.ntt_forward(data.ntt_tables())?;
        Ok(Plaintext::from_parts(poly, *parms_id, scale))
    }

    pub fn decode(&self, plain: &Plaintext) -> HeResult<Vec<Complex64>> {
        let data = self.plain_level(plain)?;
        let mut poly = plain.poly().clone();
        poly.ntt_inverse(data.ntt_tables())?;

        let base = data.rns_tool().base_q();
        let channels = poly.channel_count();
        let mut residues = vec![0u64; channels];
        let coefficients: Vec<f64> = (0..self.degree)
            .map(|j| {
                for (i, r) in residues.iter_mut().enumerate() {
                    *r = poly.channel(i)[j];
                }
                base.compose_centered_f64(&residues)
            })
            .collect();

        let inv_scale = 1.0 / plain.scale();
        Ok(self
            .fft
            .embed(&coefficients)
            .into_iter()
            .map(|z| z * inv_scale)
            .collect())
    }

    pub fn decode_real(&self, plain: &Plaintext) -> HeResult<Vec<f64>> {
        Ok(self.decode(plain)?.into_iter().map(|z| z.re).collect())
    }

    fn plain_level(&self, plain: &Plaintext) -> HeResult<&ContextData> {
        if !plain.is_ntt_form() {
            return Err(HeError::invalid("CKKS plaintexts are NTT-form at a chain level"));
        }
        self.context.data_level(&plain.parms_id())
    }
}

/// Reduces integral floats into every channel without passing through a
/// lossy integer cast.
fn residues(coefficients: &[f64], moduli: &[Modulus]) -> RnsPoly {
    let degree = coefficients.len();
    let mut data = vec![0u64; degree * moduli.len()];
    for (q, channel) in moduli.iter().zip(data.chunks_mut(degree)) {
        for (dst, &c) in channel.iter_mut().zip(coefficients) {
            *dst = reduce_f64(c, q);
        }
    }
    RnsPoly::from_raw(data, degree, false)
}

fn reduce_f64(c: f64, q: &Modulus) -> u64 {
    let magnitude = c.abs();
    let reduced = if magnitude < 2f64.powi(63) {
        q.reduce(magnitude as u64)
    } else {
        // magnitude = mantissa * 2^exponent with exponent > 0
        let bits = magnitude.to_bits();
        let exponent = ((bits >> 52) & 0x7ff) - 1075;
        let mantissa = (bits & ((1u64 << 52) - 1)) | (1u64 << 52);
        q.mul(q.reduce(mantissa), q.pow(2, exponent))
    };
    if c < 0.0 { q.neg(reduced) } else { reduced }
}
