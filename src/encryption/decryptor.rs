use std::sync::Arc;

use tracing::instrument;

use crate::ciphertext::Ciphertext;
use crate::context::{Context, ContextData, SchemeKind};
use crate::errors::{HeError, HeResult, ensure_same_level};
use crate::keys::SecretKey;
use crate::plaintext::Plaintext;
use crate::rings::RnsPoly;

/// Decrypts ciphertexts of any size by evaluating `sum c_i s^i`.
pub struct Decryptor {
    context: Arc<Context>,
    secret_key: SecretKey,
}

impl Decryptor {
    pub fn new(context: Arc<Context>, secret_key: SecretKey) -> HeResult<Self> {
        ensure_same_level(&context.key_parms_id(), &secret_key.parms_id())?;
        Ok(Self {
            context,
            secret_key,
        })
    }

    /// Integer ciphertexts decrypt to a coefficient plaintext mod `t`;
    /// approximate ones to an NTT plaintext at the ciphertext's level and
    /// scale.
    #[instrument(skip_all, fields(size = encrypted.size()))]
    pub fn decrypt(&self, encrypted: &Ciphertext) -> HeResult<Plaintext> {
        let data = self.context.data_level(&encrypted.parms_id())?;
        let phase = self.phase(encrypted, data)?;
        match self.context.scheme() {
            SchemeKind::Integer => {
                let scaling = integer_scaling(data)?;
                let mut phase = phase;
                phase.ntt_inverse(data.ntt_tables())?;
                let coefficients = scaling.scale_to_plain(&phase)?;
                Plaintext::from_coefficients(&coefficients, scaling.plain_modulus(), data.degree())
            }
            SchemeKind::Approximate => Ok(Plaintext::from_parts(
                phase,
                encrypted.parms_id(),
                encrypted.scale(),
            )),
        }
    }

    /// Bits of noise headroom left in an integer ciphertext; zero means
    /// decryption is no longer reliable.
    pub fn invariant_noise_budget(&self, encrypted: &Ciphertext) -> HeResult<u32> {
        if self.context.scheme() != SchemeKind::Integer {
            return Err(HeError::invalid("noise budget is defined for the integer scheme only"));
        }
        let data = self.context.data_level(&encrypted.parms_id())?;
        let scaling = integer_scaling(data)?;
        let mut phase = self.phase(encrypted, data)?;
        phase.ntt_inverse(data.ntt_tables())?;
        scaling.noise_budget(&phase)
    }

    /// `c_0 + c_1 s + c_2 s^2 + ...` in NTT form.
    fn phase(&self, encrypted: &Ciphertext, data: &ContextData) -> HeResult<RnsPoly> {
        let moduli = data.coeff_modulus();
        let tables = data.ntt_tables();
        for poly in encrypted.polys() {
            if poly.channel_count() != moduli.len() || poly.degree() != data.degree() {
                return Err(HeError::invalid("ciphertext shape does not match its level"));
            }
            poly.check_reduced(moduli)?;
        }
        let s = self.secret_key.truncated(moduli.len());

        let mut components = encrypted.polys().iter().map(|poly| {
            let mut poly = poly.clone();
            if !poly.is_ntt_form() {
                poly.ntt_forward(tables)?;
            }
            Ok::<_, HeError>(poly)
        });
        let mut acc = match components.next() {
            Some(first) => first?,
            None => return Err(HeError::state("ciphertext has no components")),
        };
        let mut power = s.clone();
        for component in components {
            let mut term = component?;
            term.dyadic_mul_assign(&power, moduli)?;
            acc.add_assign(&term, moduli)?;
            power.dyadic_mul_assign(&s, moduli)?;
        }
        Ok(acc)
    }
}

fn integer_scaling(data: &ContextData) -> HeResult<&crate::rns::IntegerScaling> {
    data.rns_tool()
        .integer_scaling()
        .ok_or_else(|| HeError::state("level has no integer scaling data"))
}
