use tracing::{debug, instrument};

use super::keyswitch::switch_key_inplace;
use super::{Evaluator, require_size};
use crate::ciphertext::Ciphertext;
use crate::context::ContextData;
use crate::errors::{HeError, HeResult, ensure_same_level};
use crate::keys::RelinKeys;
use crate::rings::RnsPoly;

impl Evaluator {
    /// Tensor product of two size-2 ciphertexts; the result has size 3.
    #[instrument(skip_all)]
    pub fn multiply_inplace(&self, lhs: &mut Ciphertext, rhs: &Ciphertext) -> HeResult<()> {
        ensure_same_level(&lhs.parms_id(), &rhs.parms_id())?;
        if lhs.is_ntt_form() != rhs.is_ntt_form() {
            return Err(HeError::state("operands are in different forms"));
        }
        require_size(lhs, 2)?;
        require_size(rhs, 2)?;
        self.level(rhs)?;
        let data = self.level(lhs)?;
        if self.is_approximate() {
            let scale = lhs.scale() * rhs.scale();
            check_scale_fits(scale, data)?;
            let product = dyadic_tensor(lhs.polys(), rhs.polys(), data)?;
            *lhs.polys_mut() = product;
            lhs.set_scale(scale);
        } else {
            let product = self.integer_tensor(lhs.polys(), rhs.polys(), data)?;
            *lhs.polys_mut() = product;
        }
        Ok(())
    }

    pub fn multiply(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> HeResult<Ciphertext> {
        let mut out = lhs.clone();
        self.multiply_inplace(&mut out, rhs)?;
        Ok(out)
    }

    pub fn square_inplace(&self, encrypted: &mut Ciphertext) -> HeResult<()> {
        let copy = encrypted.clone();
        self.multiply_inplace(encrypted, &copy)
    }

    pub fn square(&self, encrypted: &Ciphertext) -> HeResult<Ciphertext> {
        self.multiply(encrypted, encrypted)
    }

    /// Folds `c_2` of a size-3 ciphertext into `c_0, c_1`.
    #[instrument(skip_all)]
    pub fn relinearize_inplace(
        &self,
        encrypted: &mut Ciphertext,
        relin_keys: &RelinKeys,
    ) -> HeResult<()> {
        require_size(encrypted, 3)?;
        self.level(encrypted)?;
        ensure_same_level(&self.context.key_parms_id(), &relin_keys.parms_id())?;
        let c2 = encrypted
            .polys_mut()
            .pop()
            .ok_or_else(|| HeError::state("ciphertext has no components"))?;
        if let Err(err) = switch_key_inplace(&self.context, encrypted, &c2, relin_keys.key()) {
            encrypted.polys_mut().push(c2);
            return Err(err);
        }
        Ok(())
    }

    pub fn relinearize(
        &self,
        encrypted: &Ciphertext,
        relin_keys: &RelinKeys,
    ) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.relinearize_inplace(&mut out, relin_keys)?;
        Ok(out)
    }

    /// Raises to `exponent` by square-and-multiply, relinearizing after
    /// every product.
    #[instrument(skip_all, fields(exponent = exponent))]
    pub fn exponentiate_inplace(
        &self,
        encrypted: &mut Ciphertext,
        exponent: u64,
        relin_keys: &RelinKeys,
    ) -> HeResult<()> {
        if exponent == 0 {
            return Err(HeError::invalid("exponent must be positive"));
        }
        require_size(encrypted, 2)?;
        self.level(encrypted)?;
        if exponent == 1 {
            return Ok(());
        }

        let base = encrypted.clone();
        for bit in (0..exponent.ilog2()).rev() {
            self.square_inplace(encrypted)?;
            self.relinearize_inplace(encrypted, relin_keys)?;
            if (exponent >> bit) & 1 == 1 {
                self.multiply_inplace(encrypted, &base)?;
                self.relinearize_inplace(encrypted, relin_keys)?;
            }
        }
        Ok(())
    }

    pub fn exponentiate(
        &self,
        encrypted: &Ciphertext,
        exponent: u64,
        relin_keys: &RelinKeys,
    ) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.exponentiate_inplace(&mut out, exponent, relin_keys)?;
        Ok(out)
    }

    /// Product of all operands as a balanced binary tree, relinearizing every
    /// intermediate product.
    #[instrument(skip_all, fields(count = operands.len()))]
    pub fn multiply_many(
        &self,
        operands: &[Ciphertext],
        relin_keys: &RelinKeys,
    ) -> HeResult<Ciphertext> {
        if operands.is_empty() {
            return Err(HeError::invalid("multiply_many needs at least one ciphertext"));
        }
        let first = operands[0].parms_id();
        for operand in operands {
            ensure_same_level(&first, &operand.parms_id())?;
            require_size(operand, 2)?;
        }

        let mut layer = operands.to_vec();
        let mut depth = 0u32;
        while layer.len() > 1 {
            let mut next = Vec::with_capacity(layer.len().div_ceil(2));
            let mut pairs = layer.chunks_exact(2);
            for pair in pairs.by_ref() {
                let mut product = self.multiply(&pair[0], &pair[1])?;
                self.relinearize_inplace(&mut product, relin_keys)?;
                next.push(product);
            }
            next.extend(pairs.remainder().iter().cloned());
            layer = next;
            depth += 1;
        }
        debug!(depth, "multiply_many done");
        layer
            .pop()
            .ok_or_else(|| HeError::state("empty product layer"))
    }

    fn integer_tensor(
        &self,
        lhs: &[RnsPoly],
        rhs: &[RnsPoly],
        data: &ContextData,
    ) -> HeResult<Vec<RnsPoly>> {
        let scaling = data
            .rns_tool()
            .integer_scaling()
            .ok_or_else(|| HeError::state("level has no integer scaling data"))?;
        if lhs[0].is_ntt_form() {
            return Err(HeError::state(
                "integer multiplication expects coefficient-form ciphertexts",
            ));
        }
        scaling.multiply(lhs, rhs, data.ntt_tables(), self.context.aux_ntt_tables())
    }
}

/// `(a_0 b_0, a_0 b_1 + a_1 b_0, a_1 b_1)` pointwise in NTT form.
fn dyadic_tensor(lhs: &[RnsPoly], rhs: &[RnsPoly], data: &ContextData) -> HeResult<Vec<RnsPoly>> {
    if !lhs[0].is_ntt_form() {
        return Err(HeError::state(
            "approximate multiplication expects NTT-form ciphertexts",
        ));
    }
    let moduli = data.coeff_modulus();
    let mut c0 = lhs[0].clone();
    c0.dyadic_mul_assign(&rhs[0], moduli)?;
    let mut c1 = lhs[0].clone();
    c1.dyadic_mul_assign(&rhs[1], moduli)?;
    let mut cross = lhs[1].clone();
    cross.dyadic_mul_assign(&rhs[0], moduli)?;
    c1.add_assign(&cross, moduli)?;
    let mut c2 = lhs[1].clone();
    c2.dyadic_mul_assign(&rhs[1], moduli)?;
    Ok(vec![c0, c1, c2])
}

/// Fails when `scale` needs as many bits as the level modulus.
pub(super) fn check_scale_fits(scale: f64, data: &ContextData) -> HeResult<()> {
    let bits = data.total_coeff_modulus_bit_count();
    if !scale.is_finite() || scale.log2() + 1.0 >= bits as f64 {
        return Err(HeError::overflow(format!(
            "scale 2^{:.1} does not fit the {bits}-bit level modulus",
            scale.log2()
        )));
    }
    Ok(())
}
