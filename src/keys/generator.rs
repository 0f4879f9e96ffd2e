use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, instrument};

use super::common::sample_secret_poly;
use super::{GaloisKeys, KSwitchKeys, PublicKey, RelinKeys, SecretKey};
use crate::context::Context;
use crate::encryption::zero::encrypt_zero_symmetric;
use crate::errors::{HeError, HeResult, ensure_same_level};
use crate::math::SamplingParams;
use crate::rings::RnsPoly;

/// Samples a secret key and derives every public key material from it.
pub struct KeyGenerator {
    context: Arc<Context>,
    secret_key: SecretKey,
    sampling: SamplingParams,
}

impl KeyGenerator {
    pub fn new<R: Rng + ?Sized>(context: Arc<Context>, rng: &mut R) -> HeResult<Self> {
        Self::with_sampling(context, SamplingParams::default(), rng)
    }

    #[instrument(skip_all)]
    pub fn with_sampling<R: Rng + ?Sized>(
        context: Arc<Context>,
        sampling: SamplingParams,
        rng: &mut R,
    ) -> HeResult<Self> {
        let key = context.key_context_data();
        sampling.validate(key.degree())?;
        let mut s = sample_secret_poly(key.degree(), key.coeff_modulus(), &sampling, rng)?;
        s.ntt_forward(key.ntt_tables())?;
        let secret_key = SecretKey::new(s, key.parms_id());
        Ok(Self {
            context,
            secret_key,
            sampling,
        })
    }

    /// Reuses an existing secret key, e.g. one restored from storage.
    pub fn from_secret_key(
        context: Arc<Context>,
        secret_key: SecretKey,
        sampling: SamplingParams,
    ) -> HeResult<Self> {
        ensure_same_level(&context.key_parms_id(), &secret_key.parms_id())?;
        sampling.validate(context.degree())?;
        Ok(Self {
            context,
            secret_key,
            sampling,
        })
    }

    #[inline]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    #[inline]
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn create_public_key<R: Rng + ?Sized>(&self, rng: &mut R) -> HeResult<PublicKey> {
        let ct = encrypt_zero_symmetric(
            &self.context,
            &self.context.key_parms_id(),
            &self.secret_key,
            true,
            &self.sampling,
            rng,
        )?;
        Ok(PublicKey::new(ct))
    }

    #[instrument(skip_all)]
    pub fn create_relin_keys<R: Rng + ?Sized>(&self, rng: &mut R) -> HeResult<RelinKeys> {
        self.require_keyswitching()?;
        let moduli = self.context.key_context_data().coeff_modulus();
        let mut s2 = self.secret_key.poly().clone();
        s2.dyadic_mul_assign(self.secret_key.poly(), moduli)?;
        Ok(RelinKeys::new(self.create_switch_keys(&s2, rng)?))
    }

    /// Keys for every power-of-two rotation in both directions and the
    /// column swap.
    pub fn create_galois_keys<R: Rng + ?Sized>(&self, rng: &mut R) -> HeResult<GaloisKeys> {
        let elements = self.context.galois_tool().default_elements();
        self.create_galois_keys_from_elements(&elements, rng)
    }

    pub fn create_galois_keys_from_steps<R: Rng + ?Sized>(
        &self,
        steps: &[i64],
        rng: &mut R,
    ) -> HeResult<GaloisKeys> {
        let elements = self.context.galois_tool().elements_from_steps(steps)?;
        self.create_galois_keys_from_elements(&elements, rng)
    }

    #[instrument(skip_all, fields(count = elements.len()))]
    pub fn create_galois_keys_from_elements<R: Rng + ?Sized>(
        &self,
        elements: &[u64],
        rng: &mut R,
    ) -> HeResult<GaloisKeys> {
        self.require_keyswitching()?;
        let tool = self.context.galois_tool();
        for &element in elements {
            tool.validate_element(element)?;
        }

        let secret = self.secret_key.poly();
        let mut keys = BTreeMap::new();
        for &element in elements {
            if keys.contains_key(&element) {
                continue;
            }
            let mut rotated = RnsPoly::from_raw(
                vec![0; secret.data().len()],
                secret.degree(),
                true,
            );
            for (i, out) in rotated.channels_mut().enumerate() {
                tool.apply_ntt(secret.channel(i), element, out);
            }
            keys.insert(element, self.create_switch_keys(&rotated, rng)?);
        }
        debug!(elements = ?keys.keys().collect::<Vec<_>>(), "galois keys created");
        Ok(GaloisKeys::new(keys, self.context.key_parms_id()))
    }

    /// One encryption of zero per data prime `q_i` of the key level, with
    /// `(P mod q_i) s'` added into channel `i`, where `P` is the special prime.
    fn create_switch_keys<R: Rng + ?Sized>(
        &self,
        new_key: &RnsPoly,
        rng: &mut R,
    ) -> HeResult<KSwitchKeys> {
        let key = self.context.key_context_data();
        let moduli = key.coeff_modulus();
        let decomp_count = moduli.len() - 1;
        let special = moduli[decomp_count].value();

        let mut keys = Vec::with_capacity(decomp_count);
        for (i, q) in moduli[..decomp_count].iter().enumerate() {
            let mut ct = encrypt_zero_symmetric(
                &self.context,
                &key.parms_id(),
                &self.secret_key,
                true,
                &self.sampling,
                rng,
            )?;
            let factor = q.reduce(special);
            let target = new_key.channel(i);
            let c0 = ct.polys_mut()[0].channel_mut(i);
            for (c, &s) in c0.iter_mut().zip(target) {
                *c = q.add(*c, q.mul(s, factor));
            }
            keys.push(PublicKey::new(ct));
        }
        Ok(KSwitchKeys::new(keys, key.parms_id()))
    }

    fn require_keyswitching(&self) -> HeResult<()> {
        if self.context.using_keyswitching() {
            Ok(())
        } else {
            Err(HeError::state(
                "key switching needs at least two coefficient primes",
            ))
        }
    }
}
