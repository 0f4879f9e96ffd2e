use tracing::{instrument, trace};

use super::Evaluator;
use crate::ciphertext::Ciphertext;
use crate::context::{ContextData, ParmsId};
use crate::errors::{HeError, HeResult};
use crate::plaintext::Plaintext;

impl Evaluator {
    /// Moves to the next level of the chain.
    ///
    /// Integer ciphertexts are divided by the dropped prime with rounding,
    /// which keeps the plaintext and shrinks the noise. Approximate
    /// ciphertexts simply lose the last channel and keep their scale.
    #[instrument(skip_all)]
    pub fn mod_switch_to_next_inplace(&self, encrypted: &mut Ciphertext) -> HeResult<()> {
        let data = self.level(encrypted)?;
        let next = self.next_level(data)?;
        if self.is_approximate() {
            let channels = next.coeff_modulus().len();
            for poly in encrypted.polys_mut() {
                poly.truncate(channels);
            }
        } else {
            let tables = encrypted.is_ntt_form().then(|| data.ntt_tables());
            for poly in encrypted.polys_mut() {
                data.rns_tool().divide_and_round_q_last(poly, tables)?;
            }
        }
        encrypted.set_parms_id(next.parms_id());
        trace!(chain_index = data.chain_index() - 1, "mod switched");
        Ok(())
    }

    pub fn mod_switch_to_next(&self, encrypted: &Ciphertext) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.mod_switch_to_next_inplace(&mut out)?;
        Ok(out)
    }

    /// Repeats [`mod_switch_to_next_inplace`](Self::mod_switch_to_next_inplace)
    /// until `parms_id` is reached.
    pub fn mod_switch_to_inplace(
        &self,
        encrypted: &mut Ciphertext,
        parms_id: &ParmsId,
    ) -> HeResult<()> {
        let steps = self.steps_down(&encrypted.parms_id(), parms_id)?;
        for _ in 0..steps {
            self.mod_switch_to_next_inplace(encrypted)?;
        }
        Ok(())
    }

    pub fn mod_switch_to(
        &self,
        encrypted: &Ciphertext,
        parms_id: &ParmsId,
    ) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.mod_switch_to_inplace(&mut out, parms_id)?;
        Ok(out)
    }

    /// Drops the last channel of an NTT-form plaintext.
    pub fn mod_switch_plain_to_next_inplace(&self, plain: &mut Plaintext) -> HeResult<()> {
        if !plain.is_ntt_form() {
            return Err(HeError::invalid(
                "only NTT-form plaintexts are bound to a level",
            ));
        }
        let data = self.context.data_level(&plain.parms_id())?;
        let next = self.next_level(data)?;
        plain.poly_mut().truncate(next.coeff_modulus().len());
        plain.set_parms_id(next.parms_id());
        Ok(())
    }

    pub fn mod_switch_plain_to_next(&self, plain: &Plaintext) -> HeResult<Plaintext> {
        let mut out = plain.clone();
        self.mod_switch_plain_to_next_inplace(&mut out)?;
        Ok(out)
    }

    pub fn mod_switch_plain_to_inplace(
        &self,
        plain: &mut Plaintext,
        parms_id: &ParmsId,
    ) -> HeResult<()> {
        if !plain.is_ntt_form() {
            return Err(HeError::invalid(
                "only NTT-form plaintexts are bound to a level",
            ));
        }
        let steps = self.steps_down(&plain.parms_id(), parms_id)?;
        for _ in 0..steps {
            self.mod_switch_plain_to_next_inplace(plain)?;
        }
        Ok(())
    }

    pub fn mod_switch_plain_to(
        &self,
        plain: &Plaintext,
        parms_id: &ParmsId,
    ) -> HeResult<Plaintext> {
        let mut out = plain.clone();
        self.mod_switch_plain_to_inplace(&mut out, parms_id)?;
        Ok(out)
    }

    /// Divides an approximate ciphertext by the last prime of its level with
    /// rounding and divides its scale by the same prime.
    #[instrument(skip_all)]
    pub fn rescale_to_next_inplace(&self, encrypted: &mut Ciphertext) -> HeResult<()> {
        if !self.is_approximate() {
            return Err(HeError::invalid("rescaling applies to the approximate scheme"));
        }
        let data = self.level(encrypted)?;
        let next = self.next_level(data)?;
        if !encrypted.is_ntt_form() {
            return Err(HeError::state("rescaling expects NTT-form ciphertexts"));
        }
        let dropped = data
            .coeff_modulus()
            .last()
            .map(|q| q.value())
            .ok_or_else(|| HeError::state("level has no primes"))?;
        for poly in encrypted.polys_mut() {
            data.rns_tool()
                .divide_and_round_q_last(poly, Some(data.ntt_tables()))?;
        }
        encrypted.set_parms_id(next.parms_id());
        encrypted.set_scale(encrypted.scale() / dropped as f64);
        trace!(dropped, scale = encrypted.scale(), "rescaled");
        Ok(())
    }

    pub fn rescale_to_next(&self, encrypted: &Ciphertext) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.rescale_to_next_inplace(&mut out)?;
        Ok(out)
    }

    pub fn rescale_to_inplace(
        &self,
        encrypted: &mut Ciphertext,
        parms_id: &ParmsId,
    ) -> HeResult<()> {
        if !self.is_approximate() {
            return Err(HeError::invalid("rescaling applies to the approximate scheme"));
        }
        let steps = self.steps_down(&encrypted.parms_id(), parms_id)?;
        for _ in 0..steps {
            self.rescale_to_next_inplace(encrypted)?;
        }
        Ok(())
    }

    pub fn rescale_to(&self, encrypted: &Ciphertext, parms_id: &ParmsId) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.rescale_to_inplace(&mut out, parms_id)?;
        Ok(out)
    }

    fn next_level(&self, data: &ContextData) -> HeResult<&ContextData> {
        let id = data
            .next_parms_id()
            .ok_or_else(|| HeError::state("ciphertext is already at the last level"))?;
        self.context.context_data(&id)
    }

    /// Number of single-prime steps from `from` down to `to`.
    fn steps_down(&self, from: &ParmsId, to: &ParmsId) -> HeResult<usize> {
        let current = self.context.data_level(from)?;
        let target = self.context.data_level(to)?;
        current
            .chain_index()
            .checked_sub(target.chain_index())
            .ok_or_else(|| {
                HeError::invalid(format!(
                    "level {to} lies above the current level {from}"
                ))
            })
    }
}
