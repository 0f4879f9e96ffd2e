use tracing::{debug, instrument};

use super::keyswitch::switch_key_inplace;
use super::{Evaluator, require_size};
use crate::ciphertext::Ciphertext;
use crate::errors::{HeError, HeResult, ensure_same_level};
use crate::keys::GaloisKeys;
use crate::rings::{GaloisTool, RnsPoly};

impl Evaluator {
    /// Applies `X -> X^element` and switches the result back to `s`.
    #[instrument(skip_all, fields(element = element))]
    pub fn apply_galois_inplace(
        &self,
        encrypted: &mut Ciphertext,
        element: u64,
        galois_keys: &GaloisKeys,
    ) -> HeResult<()> {
        require_size(encrypted, 2)?;
        let data = self.level(encrypted)?;
        let tool = self.context.galois_tool();
        tool.validate_element(element)?;
        ensure_same_level(&self.context.key_parms_id(), &galois_keys.parms_id())?;
        let key = galois_keys
            .key(element)
            .ok_or_else(|| HeError::state(format!("no Galois key for element {element}")))?;

        let moduli = data.coeff_modulus();
        let is_ntt_form = encrypted.is_ntt_form();
        let mut permuted = Vec::with_capacity(2);
        for poly in encrypted.polys() {
            let mut out = RnsPoly::from_raw(vec![0; poly.data().len()], poly.degree(), is_ntt_form);
            for ((input, output), q) in poly.channels().zip(out.channels_mut()).zip(moduli) {
                if is_ntt_form {
                    tool.apply_ntt(input, element, output);
                } else {
                    tool.apply_coeff(input, element, q, output);
                }
            }
            permuted.push(out);
        }
        let c1 = permuted.pop().ok_or_else(|| HeError::state("ciphertext has no components"))?;
        let c0 = permuted.pop().ok_or_else(|| HeError::state("ciphertext has no components"))?;

        let mut zero = c1.clone();
        zero.data_mut().fill(0);
        *encrypted.polys_mut() = vec![c0, zero];
        switch_key_inplace(&self.context, encrypted, &c1, key)
    }

    pub fn apply_galois(
        &self,
        encrypted: &Ciphertext,
        element: u64,
        galois_keys: &GaloisKeys,
    ) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.apply_galois_inplace(&mut out, element, galois_keys)?;
        Ok(out)
    }

    /// Rotates both rows of the integer slot matrix left by `steps`.
    pub fn rotate_rows_inplace(
        &self,
        encrypted: &mut Ciphertext,
        steps: i64,
        galois_keys: &GaloisKeys,
    ) -> HeResult<()> {
        if self.is_approximate() {
            return Err(HeError::invalid("row rotation needs the integer scheme"));
        }
        self.rotate_internal(encrypted, steps, galois_keys)
    }

    pub fn rotate_rows(
        &self,
        encrypted: &Ciphertext,
        steps: i64,
        galois_keys: &GaloisKeys,
    ) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.rotate_rows_inplace(&mut out, steps, galois_keys)?;
        Ok(out)
    }

    /// Swaps the two rows of the integer slot matrix.
    pub fn rotate_columns_inplace(
        &self,
        encrypted: &mut Ciphertext,
        galois_keys: &GaloisKeys,
    ) -> HeResult<()> {
        if self.is_approximate() {
            return Err(HeError::invalid("column rotation needs the integer scheme"));
        }
        let element = self.context.galois_tool().element_from_step(0)?;
        self.apply_galois_inplace(encrypted, element, galois_keys)
    }

    pub fn rotate_columns(
        &self,
        encrypted: &Ciphertext,
        galois_keys: &GaloisKeys,
    ) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.rotate_columns_inplace(&mut out, galois_keys)?;
        Ok(out)
    }

    /// Rotates the approximate slot vector left by `steps`.
    pub fn rotate_vector_inplace(
        &self,
        encrypted: &mut Ciphertext,
        steps: i64,
        galois_keys: &GaloisKeys,
    ) -> HeResult<()> {
        if !self.is_approximate() {
            return Err(HeError::invalid("vector rotation needs the approximate scheme"));
        }
        self.rotate_internal(encrypted, steps, galois_keys)
    }

    pub fn rotate_vector(
        &self,
        encrypted: &Ciphertext,
        steps: i64,
        galois_keys: &GaloisKeys,
    ) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.rotate_vector_inplace(&mut out, steps, galois_keys)?;
        Ok(out)
    }

    /// Conjugates every approximate slot.
    pub fn complex_conjugate_inplace(
        &self,
        encrypted: &mut Ciphertext,
        galois_keys: &GaloisKeys,
    ) -> HeResult<()> {
        if !self.is_approximate() {
            return Err(HeError::invalid("conjugation needs the approximate scheme"));
        }
        let element = self.context.galois_tool().element_from_step(0)?;
        self.apply_galois_inplace(encrypted, element, galois_keys)
    }

    pub fn complex_conjugate(
        &self,
        encrypted: &Ciphertext,
        galois_keys: &GaloisKeys,
    ) -> HeResult<Ciphertext> {
        let mut out = encrypted.clone();
        self.complex_conjugate_inplace(&mut out, galois_keys)?;
        Ok(out)
    }

    /// Uses the key for `steps` when present, otherwise walks the
    /// non-adjacent form of `steps` through the available power-of-two keys.
    fn rotate_internal(
        &self,
        encrypted: &mut Ciphertext,
        steps: i64,
        galois_keys: &GaloisKeys,
    ) -> HeResult<()> {
        let tool = self.context.galois_tool();
        let row_size = tool.row_size() as i64;
        let steps = steps.rem_euclid(row_size);
        if steps == 0 {
            require_size(encrypted, 2)?;
            self.level(encrypted)?;
            return Ok(());
        }
        let element = tool.element_from_step(steps)?;
        if galois_keys.has_key(element) {
            return self.apply_galois_inplace(encrypted, element, galois_keys);
        }

        let terms: Vec<i64> = GaloisTool::naf(steps)
            .into_iter()
            .map(|term| term.rem_euclid(row_size))
            .filter(|&term| term != 0)
            .collect();
        debug!(steps, ?terms, "rotation decomposed");
        for term in terms {
            let element = tool.element_from_step(term)?;
            self.apply_galois_inplace(encrypted, element, galois_keys)?;
        }
        Ok(())
    }
}
