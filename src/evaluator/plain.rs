use tracing::instrument;

use super::multiply::check_scale_fits;
use super::{Evaluator, check_scales};
use crate::ciphertext::Ciphertext;
use crate::context::{ContextData, ParmsId, PlainScaling};
use crate::errors::{HeError, HeResult, ensure_same_level};
use crate::math::Modulus;
use crate::plaintext::Plaintext;
use crate::rings::RnsPoly;

impl Evaluator {
    /// Multiplies by a plaintext.
    ///
    /// Integer coefficient plaintexts are lifted to the ciphertext's level
    /// with centered representatives; NTT-form plaintexts must sit at the
    /// ciphertext's level. An all-zero plaintext is rejected since the
    /// product would be transparent.
    #[instrument(skip_all)]
    pub fn multiply_plain_inplace(
        &self,
        encrypted: &mut Ciphertext,
        plain: &Plaintext,
    ) -> HeResult<()> {
        let data = self.level(encrypted)?;
        if plain.is_zero() {
            return Err(HeError::invalid("multiplying by a zero plaintext"));
        }
        let moduli = data.coeff_modulus();
        let tables = data.ntt_tables();

        if plain.is_ntt_form() {
            ensure_same_level(&encrypted.parms_id(), &plain.parms_id())?;
            if plain.poly().channel_count() != moduli.len() {
                return Err(HeError::invalid("plaintext shape does not match its level"));
            }
            let scale = encrypted.scale() * plain.scale();
            if self.is_approximate() {
                check_scale_fits(scale, data)?;
            }
            let coefficient_form = !encrypted.is_ntt_form();
            for poly in encrypted.polys_mut() {
                if coefficient_form {
                    poly.ntt_forward(tables)?;
                }
                poly.dyadic_mul_assign(plain.poly(), moduli)?;
                if coefficient_form {
                    poly.ntt_inverse(tables)?;
                }
            }
            encrypted.set_scale(scale);
            return Ok(());
        }

        let (scaling, _) = plain_scaling(data)?;
        let coefficients = integer_coefficients(plain, data)?;
        let mut lifted = scaling.lift_plain(coefficients, moduli, data.degree());
        lifted.ntt_forward(tables)?;
        let coefficient_form = !encrypted.is_ntt_form();
        for poly in encrypted.polys_mut() {
            if coefficient_form {
                poly.ntt_forward(tables)?;
            }
            poly.dyadic_mul_assign(&lifted, moduli)?;
            if coefficient_form {
                poly.ntt_inverse(tables)?;
            }
        }
        Ok(())
    }

    pub fn multiply_plain(
        &self,
        encrypted: &Ciphertext,
        plain: &Plaintext,
    ) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.multiply_plain_inplace(&mut out, plain)?;
        Ok(out)
    }

    pub fn add_plain_inplace(&self, encrypted: &mut Ciphertext, plain: &Plaintext) -> HeResult<()> {
        self.additive_plain(encrypted, plain, false)
    }

    pub fn add_plain(&self, encrypted: &Ciphertext, plain: &Plaintext) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.add_plain_inplace(&mut out, plain)?;
        Ok(out)
    }

    pub fn sub_plain_inplace(&self, encrypted: &mut Ciphertext, plain: &Plaintext) -> HeResult<()> {
        self.additive_plain(encrypted, plain, true)
    }

    pub fn sub_plain(&self, encrypted: &Ciphertext, plain: &Plaintext) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.sub_plain_inplace(&mut out, plain)?;
        Ok(out)
    }

    /// Lifts an integer plaintext to `parms_id` and moves it to NTT form,
    /// ready for repeated [`multiply_plain`](Self::multiply_plain) calls.
    pub fn transform_plain_to_ntt_inplace(
        &self,
        plain: &mut Plaintext,
        parms_id: &ParmsId,
    ) -> HeResult<()> {
        if plain.is_ntt_form() {
            return Err(HeError::state("plaintext is already in NTT form"));
        }
        let data = self.context.data_level(parms_id)?;
        let (scaling, _) = plain_scaling(data)?;
        let coefficients = integer_coefficients(plain, data)?;
        let mut lifted = scaling.lift_plain(coefficients, data.coeff_modulus(), data.degree());
        lifted.ntt_forward(data.ntt_tables())?;
        *plain = Plaintext::from_parts(lifted, *parms_id, 1.0);
        Ok(())
    }

    pub fn transform_plain_to_ntt(
        &self,
        plain: &Plaintext,
        parms_id: &ParmsId,
    ) -> HeResult<Plaintext> {
        let mut out = plain.clone();
        self.transform_plain_to_ntt_inplace(&mut out, parms_id)?;
        Ok(out)
    }

    fn additive_plain(
        &self,
        encrypted: &mut Ciphertext,
        plain: &Plaintext,
        subtract: bool,
    ) -> HeResult<()> {
        let data = self.level(encrypted)?;
        let moduli = data.coeff_modulus();

        let delta = if self.is_approximate() {
            if !plain.is_ntt_form() {
                return Err(HeError::invalid("approximate plaintexts are NTT-form"));
            }
            ensure_same_level(&encrypted.parms_id(), &plain.parms_id())?;
            check_scales(encrypted.scale(), plain.scale())?;
            let mut delta = plain.poly().clone();
            if !encrypted.is_ntt_form() {
                delta.ntt_inverse(data.ntt_tables())?;
            }
            delta
        } else {
            if plain.is_ntt_form() {
                return Err(HeError::invalid(
                    "adding to an integer ciphertext expects a coefficient plaintext",
                ));
            }
            let (scaling, t) = plain_scaling(data)?;
            let coefficients = integer_coefficients(plain, data)?;
            if !encrypted.is_ntt_form() {
                let c0 = first_component(encrypted)?;
                scaling.add_scaled_plain(coefficients, t, moduli, c0, subtract);
                return Ok(());
            }
            let mut delta = RnsPoly::zero(data.degree(), moduli.len());
            scaling.add_scaled_plain(coefficients, t, moduli, &mut delta, false);
            delta.ntt_forward(data.ntt_tables())?;
            delta
        };

        let c0 = first_component(encrypted)?;
        if subtract {
            c0.sub_assign(&delta, moduli)
        } else {
            c0.add_assign(&delta, moduli)
        }
    }
}

fn plain_scaling(data: &ContextData) -> HeResult<(&PlainScaling, &Modulus)> {
    match (data.plain_scaling(), data.parms().plain_modulus()) {
        (Some(scaling), Some(t)) => Ok((scaling, t)),
        _ => Err(HeError::invalid(
            "coefficient plaintexts need the integer scheme",
        )),
    }
}

fn integer_coefficients<'a>(plain: &'a Plaintext, data: &ContextData) -> HeResult<&'a [u64]> {
    if plain.degree() != data.degree() {
        return Err(HeError::invalid(format!(
            "plaintext of degree {} does not match ring degree {}",
            plain.degree(),
            data.degree()
        )));
    }
    plain.coefficients()
}

fn first_component(encrypted: &mut Ciphertext) -> HeResult<&mut RnsPoly> {
    encrypted
        .polys_mut()
        .first_mut()
        .ok_or_else(|| HeError::state("ciphertext has no components"))
}
