//! Homomorphic operations over ciphertexts of one [`Context`].
//!
//! Every operation comes as an in-place entry (`*_inplace`) that mutates its
//! first operand and a returning entry that works on a copy. Binary
//! operations check fingerprints before touching any data.

mod galois;
pub(crate) mod keyswitch;
mod levels;
mod multiply;
mod plain;

use std::sync::Arc;

use tracing::instrument;

use crate::ciphertext::Ciphertext;
use crate::context::{Context, ContextData, SchemeKind};
use crate::errors::{HeError, HeResult, ensure_same_level};

/// Relative tolerance when comparing approximate-scheme scales.
const SCALE_TOLERANCE: f64 = 1e-10;

pub struct Evaluator {
    context: Arc<Context>,
}

impl Evaluator {
    pub fn new(context: Arc<Context>) -> Self {
        Self { context }
    }

    #[inline]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    fn level(&self, encrypted: &Ciphertext) -> HeResult<&ContextData> {
        let data = self.context.data_level(&encrypted.parms_id())?;
        let moduli = data.coeff_modulus();
        if encrypted.size() == 0 {
            return Err(HeError::invalid("ciphertext has no components"));
        }
        for poly in encrypted.polys() {
            if poly.channel_count() != moduli.len() || poly.degree() != data.degree() {
                return Err(HeError::invalid(
                    "ciphertext shape does not match its level",
                ));
            }
            // residues straight from serde have not been range checked
            poly.check_reduced(moduli)?;
        }
        Ok(data)
    }

    fn is_approximate(&self) -> bool {
        self.context.scheme() == SchemeKind::Approximate
    }

    /// Fingerprint, form and (approximate scheme) scale agreement.
    fn check_compatible(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> HeResult<()> {
        ensure_same_level(&lhs.parms_id(), &rhs.parms_id())?;
        if lhs.is_ntt_form() != rhs.is_ntt_form() {
            return Err(HeError::state("operands are in different forms"));
        }
        if self.is_approximate() {
            check_scales(lhs.scale(), rhs.scale())?;
        }
        Ok(())
    }
}

fn check_scales(expected: f64, actual: f64) -> HeResult<()> {
    if (expected - actual).abs() <= SCALE_TOLERANCE * expected.abs().max(actual.abs()) {
        Ok(())
    } else {
        Err(HeError::ScaleMismatch { expected, actual })
    }
}

fn require_size(encrypted: &Ciphertext, size: usize) -> HeResult<()> {
    if encrypted.size() != size {
        return Err(HeError::state(format!(
            "operation requires a size-{size} ciphertext, got size {}",
            encrypted.size()
        )));
    }
    Ok(())
}

// ─── Additive operations ──────────────────────────────────────────────────────

impl Evaluator {
    pub fn negate_inplace(&self, encrypted: &mut Ciphertext) -> HeResult<()> {
        let moduli = self.level(encrypted)?.coeff_modulus();
        for poly in encrypted.polys_mut() {
            poly.negate(moduli)?;
        }
        Ok(())
    }

    pub fn negate(&self, encrypted: &Ciphertext) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.negate_inplace(&mut out)?;
        Ok(out)
    }

    pub fn add_inplace(&self, lhs: &mut Ciphertext, rhs: &Ciphertext) -> HeResult<()> {
        self.additive(lhs, rhs, false)
    }

    pub fn add(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> HeResult<Ciphertext> {
        let mut out = lhs.clone();
        self.add_inplace(&mut out, rhs)?;
        Ok(out)
    }

    pub fn sub_inplace(&self, lhs: &mut Ciphertext, rhs: &Ciphertext) -> HeResult<()> {
        self.additive(lhs, rhs, true)
    }

    pub fn sub(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> HeResult<Ciphertext> {
        let mut out = lhs.clone();
        self.sub_inplace(&mut out, rhs)?;
        Ok(out)
    }

    /// Sums the operands left to right.
    #[instrument(skip_all, fields(count = operands.len()))]
    pub fn add_many(&self, operands: &[Ciphertext]) -> HeResult<Ciphertext> {
        let (first, rest) = operands
            .split_first()
            .ok_or_else(|| HeError::invalid("add_many needs at least one ciphertext"))?;
        let mut acc = first.clone();
        for operand in rest {
            self.add_inplace(&mut acc, operand)?;
        }
        Ok(acc)
    }

    fn additive(&self, lhs: &mut Ciphertext, rhs: &Ciphertext, subtract: bool) -> HeResult<()> {
        self.check_compatible(lhs, rhs)?;
        if lhs.size() != rhs.size() {
            return Err(HeError::state(format!(
                "operands have sizes {} and {}",
                lhs.size(),
                rhs.size()
            )));
        }
        self.level(rhs)?;
        let moduli = self.level(lhs)?.coeff_modulus();
        for (a, b) in lhs.polys_mut().iter_mut().zip(rhs.polys()) {
            if subtract {
                a.sub_assign(b, moduli)?;
            } else {
                a.add_assign(b, moduli)?;
            }
        }
        Ok(())
    }
}

// ─── Form conversion ──────────────────────────────────────────────────────────

impl Evaluator {
    pub fn transform_to_ntt_inplace(&self, encrypted: &mut Ciphertext) -> HeResult<()> {
        let tables = self.level(encrypted)?.ntt_tables();
        if encrypted.is_ntt_form() {
            return Err(HeError::state("ciphertext is already in NTT form"));
        }
        for poly in encrypted.polys_mut() {
            poly.ntt_forward(tables)?;
        }
        Ok(())
    }

    pub fn transform_to_ntt(&self, encrypted: &Ciphertext) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.transform_to_ntt_inplace(&mut out)?;
        Ok(out)
    }

    pub fn transform_from_ntt_inplace(&self, encrypted: &mut Ciphertext) -> HeResult<()> {
        let tables = self.level(encrypted)?.ntt_tables();
        if !encrypted.is_ntt_form() {
            return Err(HeError::state("ciphertext is already in coefficient form"));
        }
        for poly in encrypted.polys_mut() {
            poly.ntt_inverse(tables)?;
        }
        Ok(())
    }

    pub fn transform_from_ntt(&self, encrypted: &Ciphertext) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.transform_from_ntt_inplace(&mut out)?;
        Ok(out)
    }
}
