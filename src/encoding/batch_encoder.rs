//! Integer slot batching.
//!
//! With a plain modulus `t ≡ 1 (mod 2N)` the plaintext ring splits into `N`
//! slots arranged as a `2 x N/2` matrix. Slot `i` of row 0 is the evaluation
//! at `ψ^{3^i}` and slot `i` of row 1 the evaluation at `ψ^{-3^i}`, so the
//! Galois element `3` rotates rows left and `2N - 1` swaps the rows.

use std::sync::Arc;

use crate::context::Context;
use crate::errors::{HeError, HeResult};
use crate::math::Modulus;
use crate::plaintext::Plaintext;
use crate::rings::NttTables;
use crate::rings::ntt::reverse_bits;

pub struct BatchEncoder {
    context: Arc<Context>,
    plain_modulus: Modulus,
    tables: NttTables,
    /// Slot index to position in the bit-reversed NTT output.
    index_map: Vec<usize>,
}

impl BatchEncoder {
    pub fn new(context: Arc<Context>) -> HeResult<Self> {
        let tables = context
            .plain_ntt_tables()
            .cloned()
            .ok_or_else(|| {
                HeError::configuration(
                    "plain modulus is not congruent to 1 mod 2N; batching is unavailable",
                )
            })?;
        let plain_modulus = *tables.modulus();
        let index_map = slot_index_map(context.degree());
        Ok(Self {
            context,
            plain_modulus,
            tables,
            index_map,
        })
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.index_map.len()
    }

    /// Half the slot count; the length of one matrix row.
    #[inline]
    pub fn row_size(&self) -> usize {
        self.slot_count() / 2
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Encodes up to `N` values modulo `t`; missing slots are zero.
    pub fn encode(&self, values: &[u64]) -> HeResult<Plaintext> {
        self.check_len(values.len())?;
        let t = &self.plain_modulus;
        if let Some(&bad) = values.iter().find(|&&v| v >= t.value()) {
            return Err(HeError::invalid(format!(
                "slot value {bad} is not reduced modulo {}",
                t.value()
            )));
        }
        self.encode_reduced(values.iter().copied())
    }

    /// Encodes signed values with `|v| <= (t - 1) / 2`.
    pub fn encode_signed(&self, values: &[i64]) -> HeResult<Plaintext> {
        self.check_len(values.len())?;
        let t = &self.plain_modulus;
        let bound = (t.value() - 1) / 2;
        if let Some(&bad) = values.iter().find(|v| v.unsigned_abs() > bound) {
            return Err(HeError::invalid(format!(
                "slot value {bad} is outside [-{bound}, {bound}]"
            )));
        }
        self.encode_reduced(values.iter().map(|&v| t.reduce_i64(v)))
    }

    pub fn decode(&self, plain: &Plaintext) -> HeResult<Vec<u64>> {
        let degree = self.slot_count();
        if plain.degree() != degree {
            return Err(HeError::invalid(format!(
                "plaintext of degree {} does not match {degree} slots",
                plain.degree()
            )));
        }
        let mut values = plain.coefficients()?.to_vec();
        self.tables.forward(&mut values);
        Ok(self.index_map.iter().map(|&pos| values[pos]).collect())
    }

    pub fn decode_signed(&self, plain: &Plaintext) -> HeResult<Vec<i64>> {
        let t = &self.plain_modulus;
        Ok(self
            .decode(plain)?
            .into_iter()
            .map(|v| t.center(v))
            .collect())
    }

    fn encode_reduced(&self, values: impl Iterator<Item = u64>) -> HeResult<Plaintext> {
        let mut coefficients = vec![0u64; self.slot_count()];
        for (&pos, v) in self.index_map.iter().zip(values) {
            coefficients[pos] = v;
        }
        self.tables.inverse(&mut coefficients);
        Plaintext::from_coefficients(&coefficients, &self.plain_modulus, self.slot_count())
    }

    fn check_len(&self, len: usize) -> HeResult<()> {
        if len > self.slot_count() {
            return Err(HeError::invalid(format!(
                "{len} values exceed {} slots",
                self.slot_count()
            )));
        }
        Ok(())
    }
}

fn slot_index_map(degree: usize) -> Vec<usize> {
    let log_degree = degree.trailing_zeros();
    let row_size = degree / 2;
    let order = 2 * degree;
    let mut map = vec![0usize; degree];
    let mut pos = 1usize;
    for i in 0..row_size {
        map[i] = reverse_bits((pos - 1) / 2, log_degree);
        map[row_size + i] = reverse_bits((order - pos - 1) / 2, log_degree);
        pos = pos * 3 % order;
    }
    map
}
