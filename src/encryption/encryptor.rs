use std::sync::Arc;

use rand::Rng;
use tracing::instrument;

use super::zero::{encrypt_zero_asymmetric, encrypt_zero_symmetric};
use crate::ciphertext::Ciphertext;
use crate::context::{Context, ParmsId, SchemeKind};
use crate::errors::{HeError, HeResult, ensure_same_level};
use crate::keys::{PublicKey, SecretKey};
use crate::math::SamplingParams;
use crate::plaintext::Plaintext;

enum EncryptionKey {
    Public(PublicKey),
    Secret(SecretKey),
}

/// Produces fresh size-2 ciphertexts.
///
/// Integer plaintexts (coefficients mod `t`) are encrypted in coefficient
/// form, at the first data level unless [`Encryptor::encrypt_at`] names
/// one. Approximate plaintexts are encrypted at their own level in NTT form
/// and keep their scale.
pub struct Encryptor {
    context: Arc<Context>,
    key: EncryptionKey,
    sampling: SamplingParams,
}

impl Encryptor {
    pub fn new(context: Arc<Context>, public_key: PublicKey) -> HeResult<Self> {
        ensure_same_level(&context.key_parms_id(), &public_key.parms_id())?;
        Ok(Self {
            context,
            key: EncryptionKey::Public(public_key),
            sampling: SamplingParams::default(),
        })
    }

    /// Symmetric encryption with the secret key.
    pub fn with_secret_key(context: Arc<Context>, secret_key: SecretKey) -> HeResult<Self> {
        ensure_same_level(&context.key_parms_id(), &secret_key.parms_id())?;
        Ok(Self {
            context,
            key: EncryptionKey::Secret(secret_key),
            sampling: SamplingParams::default(),
        })
    }

    pub fn sampling(mut self, sampling: SamplingParams) -> HeResult<Self> {
        sampling.validate(self.context.degree())?;
        self.sampling = sampling;
        Ok(self)
    }

    #[instrument(skip_all)]
    pub fn encrypt<R: Rng + ?Sized>(&self, plain: &Plaintext, rng: &mut R) -> HeResult<Ciphertext> {
        match self.context.scheme() {
            SchemeKind::Integer => {
                self.encrypt_integer(plain, &self.context.first_parms_id(), rng)
            }
            SchemeKind::Approximate => self.encrypt_approximate(plain, rng),
        }
    }

    /// Encrypts at `parms_id` instead of the first data level. Approximate
    /// plaintexts must already be encoded at that level.
    pub fn encrypt_at<R: Rng + ?Sized>(
        &self,
        plain: &Plaintext,
        parms_id: &ParmsId,
        rng: &mut R,
    ) -> HeResult<Ciphertext> {
        match self.context.scheme() {
            SchemeKind::Integer => self.encrypt_integer(plain, parms_id, rng),
            SchemeKind::Approximate => {
                ensure_same_level(parms_id, &plain.parms_id())?;
                self.encrypt_approximate(plain, rng)
            }
        }
    }

    /// A fresh encryption of zero at `parms_id` in the scheme's usual form.
    pub fn encrypt_zero<R: Rng + ?Sized>(
        &self,
        parms_id: &ParmsId,
        rng: &mut R,
    ) -> HeResult<Ciphertext> {
        self.context.data_level(parms_id)?;
        let is_ntt_form = self.context.scheme() == SchemeKind::Approximate;
        self.zero(parms_id, is_ntt_form, rng)
    }

    fn zero<R: Rng + ?Sized>(
        &self,
        parms_id: &ParmsId,
        is_ntt_form: bool,
        rng: &mut R,
    ) -> HeResult<Ciphertext> {
        match &self.key {
            EncryptionKey::Public(pk) => encrypt_zero_asymmetric(
                &self.context,
                parms_id,
                pk,
                is_ntt_form,
                &self.sampling,
                rng,
            ),
            EncryptionKey::Secret(sk) => encrypt_zero_symmetric(
                &self.context,
                parms_id,
                sk,
                is_ntt_form,
                &self.sampling,
                rng,
            ),
        }
    }

    fn encrypt_integer<R: Rng + ?Sized>(
        &self,
        plain: &Plaintext,
        parms_id: &ParmsId,
        rng: &mut R,
    ) -> HeResult<Ciphertext> {
        let coefficients = plain.coefficients().map_err(|_| {
            HeError::invalid("integer encryption expects a coefficient plaintext")
        })?;
        let data = self.context.data_level(parms_id)?;
        let (Some(t), Some(scaling)) = (data.parms().plain_modulus(), data.plain_scaling()) else {
            return Err(HeError::state("level carries no plain modulus"));
        };
        if plain.degree() != data.degree() {
            return Err(HeError::invalid("plaintext degree does not match the context"));
        }

        let mut ct = self.zero(parms_id, false, rng)?;
        let c0 = ct
            .polys_mut()
            .first_mut()
            .ok_or_else(|| HeError::state("ciphertext has no components"))?;
        scaling.add_scaled_plain(coefficients, t, data.coeff_modulus(), c0, false);
        Ok(ct)
    }

    fn encrypt_approximate<R: Rng + ?Sized>(
        &self,
        plain: &Plaintext,
        rng: &mut R,
    ) -> HeResult<Ciphertext> {
        if !plain.is_ntt_form() {
            return Err(HeError::invalid("approximate encryption expects an encoded plaintext"));
        }
        let parms_id = plain.parms_id();
        let data = self.context.data_level(&parms_id)?;
        let mut ct = self.zero(&parms_id, true, rng)?;
        ct.polys_mut()[0].add_assign(plain.poly(), data.coeff_modulus())?;
        ct.set_scale(plain.scale());
        Ok(ct)
    }
}
