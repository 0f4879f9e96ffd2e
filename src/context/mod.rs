//! The modulus chain: one validated [`ContextData`] per level, from the key
//! level (every prime, including the special prime) down to a single prime.
//!
//! All NTT tables live in one arena owned by the [`Context`]; a level sees
//! the prefix of that arena matching its modulus list.

mod parameters;
mod presets;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument, trace};

pub use parameters::{
    EncryptionParameters, EncryptionParametersBuilder, ParmsId, SchemeKind, SecurityLevel,
};
pub use presets::{
    COEFF_MODULUS_BITS_MAX, COEFF_MODULUS_BITS_MIN, COEFF_MODULUS_COUNT_MAX, CoeffModulus,
    POLY_MODULUS_DEGREE_MAX, POLY_MODULUS_DEGREE_MIN, PlainModulus,
};

use crate::errors::{HeError, HeResult};
use crate::math::{Modulus, MultiplyOperand, generate_primes, is_ntt_friendly_prime};
use crate::rings::{GaloisTool, NttTables, RnsPoly};
use crate::rns::{RnsBase, RnsTool, WideUint};

/// Bit size of the auxiliary primes used for exact integer multiplication.
const AUX_PRIME_BITS: u32 = 60;

/// Constants for lifting an integer plaintext `m mod t` into `Z_Q`.
#[derive(Debug, Clone)]
pub struct PlainScaling {
    /// `floor(Q / t) mod q_i`
    coeff_div_plain_modulus: Vec<MultiplyOperand>,
    /// `Q mod t`
    q_mod_t: u64,
    /// Plain coefficients at or above this value represent negatives.
    upper_half_threshold: u64,
    /// `q_i - t mod q_i`, added to upper-half coefficients.
    upper_half_increment: Vec<u64>,
}

impl PlainScaling {
    fn new(moduli: &[Modulus], base: &RnsBase, t: &Modulus) -> HeResult<Self> {
        let q_mod_t = base.product_mod(t);
        let coeff_div_plain_modulus = moduli
            .iter()
            .map(|q| {
                let inv_t = q.inverse(q.reduce(t.value())).ok_or_else(|| {
                    HeError::configuration(format!(
                        "plain modulus {} is not invertible modulo {}",
                        t.value(),
                        q.value()
                    ))
                })?;
                let delta = q.mul(q.neg(q.reduce(q_mod_t)), inv_t);
                Ok(MultiplyOperand::new(delta, q))
            })
            .collect::<HeResult<Vec<_>>>()?;
        let upper_half_increment = moduli
            .iter()
            .map(|q| q.neg(q.reduce(t.value())))
            .collect();
        Ok(Self {
            coeff_div_plain_modulus,
            q_mod_t,
            upper_half_threshold: t.value().div_ceil(2),
            upper_half_increment,
        })
    }

    #[inline]
    pub fn coeff_div_plain_modulus(&self) -> &[MultiplyOperand] {
        &self.coeff_div_plain_modulus
    }

    #[inline]
    pub fn q_mod_t(&self) -> u64 {
        self.q_mod_t
    }

    #[inline]
    pub fn upper_half_threshold(&self) -> u64 {
        self.upper_half_threshold
    }

    #[inline]
    pub fn upper_half_increment(&self) -> &[u64] {
        &self.upper_half_increment
    }

    /// Adds `floor(Q/t) m + round((Q mod t) m / t)` into a coefficient-form
    /// polynomial, or subtracts it when `negate` is set.
    pub(crate) fn add_scaled_plain(
        &self,
        plain: &[u64],
        t: &Modulus,
        moduli: &[Modulus],
        dest: &mut RnsPoly,
        negate: bool,
    ) {
        let half_t = (t.value() as u128 + 1) >> 1;
        for (c, &m) in plain.iter().enumerate() {
            let fix = ((self.q_mod_t as u128 * m as u128 + half_t) / t.value() as u128) as u64;
            for (i, q) in moduli.iter().enumerate() {
                let scaled = q.add(
                    q.mul_shoup(q.reduce(m), &self.coeff_div_plain_modulus[i]),
                    q.reduce(fix),
                );
                let slot = &mut dest.channel_mut(i)[c];
                *slot = if negate {
                    q.sub(*slot, scaled)
                } else {
                    q.add(*slot, scaled)
                };
            }
        }
    }

    /// Lifts `m mod t` to `Z_Q` with centered representatives, so the upper
    /// half of `[0, t)` maps to negatives.
    pub(crate) fn lift_plain(&self, plain: &[u64], moduli: &[Modulus], degree: usize) -> RnsPoly {
        let mut data = vec![0u64; moduli.len() * degree];
        for (i, (q, channel)) in moduli.iter().zip(data.chunks_mut(degree)).enumerate() {
            for (dst, &m) in channel.iter_mut().zip(plain) {
                *dst = if m >= self.upper_half_threshold {
                    q.add(q.reduce(m), self.upper_half_increment[i])
                } else {
                    q.reduce(m)
                };
            }
        }
        RnsPoly::from_raw(data, degree, false)
    }
}

/// Precomputation for one level of the chain.
#[derive(Debug)]
pub struct ContextData {
    parms: EncryptionParameters,
    parms_id: ParmsId,
    chain_index: usize,
    prev_parms_id: Option<ParmsId>,
    next_parms_id: Option<ParmsId>,
    ntt_arena: Arc<[NttTables]>,
    rns_tool: RnsTool,
    plain_scaling: Option<PlainScaling>,
}

impl ContextData {
    #[inline]
    pub fn parms(&self) -> &EncryptionParameters {
        &self.parms
    }

    #[inline]
    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    /// Distance from the last level; the last level has index 0.
    #[inline]
    pub fn chain_index(&self) -> usize {
        self.chain_index
    }

    /// The level one prime richer, if any.
    #[inline]
    pub fn prev_parms_id(&self) -> Option<ParmsId> {
        self.prev_parms_id
    }

    /// The level one prime poorer, if any.
    #[inline]
    pub fn next_parms_id(&self) -> Option<ParmsId> {
        self.next_parms_id
    }

    #[inline]
    pub fn coeff_modulus(&self) -> &[Modulus] {
        self.parms.coeff_modulus()
    }

    #[inline]
    pub fn ntt_tables(&self) -> &[NttTables] {
        &self.ntt_arena[..self.parms.coeff_modulus().len()]
    }

    #[inline]
    pub fn rns_tool(&self) -> &RnsTool {
        &self.rns_tool
    }

    #[inline]
    pub fn plain_scaling(&self) -> Option<&PlainScaling> {
        self.plain_scaling.as_ref()
    }

    #[inline]
    pub fn total_coeff_modulus_bit_count(&self) -> u32 {
        self.rns_tool.base_q().bit_count()
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.parms.poly_modulus_degree()
    }
}

/// Validated, immutable modulus chain shared by every evaluator, encoder
/// and key generator built on it.
#[derive(Debug)]
pub struct Context {
    /// Ordered from the key level (index 0) to the last level.
    chain: Vec<ContextData>,
    index: HashMap<ParmsId, usize>,
    first_index: usize,
    security: SecurityLevel,
    galois_tool: GaloisTool,
    plain_ntt_tables: Option<NttTables>,
    aux_ntt_tables: Arc<[NttTables]>,
}

impl Context {
    #[instrument(skip_all, fields(
        scheme = ?parms.scheme(),
        degree = parms.poly_modulus_degree(),
        primes = parms.coeff_modulus().len(),
    ))]
    pub fn new(parms: EncryptionParameters, security: SecurityLevel) -> HeResult<Arc<Self>> {
        validate(&parms, security)?;
        let degree = parms.poly_modulus_degree();
        let key_moduli = parms.coeff_modulus().to_vec();

        let ntt_arena: Arc<[NttTables]> = key_moduli
            .iter()
            .map(|&q| NttTables::new(degree, q))
            .collect::<HeResult<Vec<_>>>()?
            .into();

        // Levels from richest to poorest. With a single prime the key level
        // is also the only data level.
        let mut levels = vec![parms.clone()];
        if key_moduli.len() > 1 {
            let mut current = parms.without_last_prime();
            loop {
                if let Some(t) = parms.plain_modulus() {
                    let base = RnsBase::new(current.coeff_modulus().to_vec())?;
                    if *base.product() <= WideUint::from_u64(t.value()) {
                        break;
                    }
                }
                let done = current.coeff_modulus().len() == 1;
                levels.push(current.clone());
                if done {
                    break;
                }
                current = current.without_last_prime();
            }
        }
        let first_index = usize::from(key_moduli.len() > 1);
        if levels.len() <= first_index {
            return Err(HeError::configuration(
                "plain modulus is not smaller than the first data level modulus",
            ));
        }

        let aux_moduli = match parms.plain_modulus() {
            Some(t) => aux_base(&levels[first_index], degree, t)?,
            None => Vec::new(),
        };
        let aux_ntt_tables: Arc<[NttTables]> = aux_moduli
            .iter()
            .map(|&p| NttTables::new(degree, p))
            .collect::<HeResult<Vec<_>>>()?
            .into();

        let ids: Vec<ParmsId> = levels.iter().map(EncryptionParameters::parms_id).collect();
        let count = levels.len();
        let mut chain = Vec::with_capacity(count);
        for (i, level) in levels.into_iter().enumerate() {
            let base = RnsBase::new(level.coeff_modulus().to_vec())?;
            let mut rns_tool = RnsTool::new(degree, base.clone())?;
            let mut plain_scaling = None;
            match level.plain_modulus() {
                Some(t) if i >= first_index => {
                    rns_tool = rns_tool.with_integer_scaling(*t, &aux_moduli)?;
                    plain_scaling = Some(PlainScaling::new(level.coeff_modulus(), &base, t)?);
                }
                _ => {}
            }
            trace!(
                level = i,
                parms_id = %ids[i],
                primes = level.coeff_modulus().len(),
                "level ready"
            );
            chain.push(ContextData {
                parms: level,
                parms_id: ids[i],
                chain_index: count - 1 - i,
                prev_parms_id: i.checked_sub(1).map(|p| ids[p]),
                next_parms_id: ids.get(i + 1).copied(),
                ntt_arena: Arc::clone(&ntt_arena),
                rns_tool,
                plain_scaling,
            });
        }
        let index = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let plain_ntt_tables = parms
            .plain_modulus()
            .filter(|t| is_ntt_friendly_prime(t.value(), degree as u64))
            .map(|&t| NttTables::new(degree, t))
            .transpose()?;

        debug!(
            levels = count,
            key_parms_id = %ids[0],
            first_parms_id = %ids[first_index],
            batching = plain_ntt_tables.is_some(),
            aux_primes = aux_moduli.len(),
            "modulus chain built"
        );

        Ok(Arc::new(Self {
            chain,
            index,
            first_index,
            security,
            galois_tool: GaloisTool::new(degree)?,
            plain_ntt_tables,
            aux_ntt_tables,
        }))
    }

    #[inline]
    pub fn key_parms_id(&self) -> ParmsId {
        self.chain[0].parms_id
    }

    #[inline]
    pub fn first_parms_id(&self) -> ParmsId {
        self.chain[self.first_index].parms_id
    }

    #[inline]
    pub fn last_parms_id(&self) -> ParmsId {
        self.last_context_data().parms_id
    }

    pub fn get_context_data(&self, parms_id: &ParmsId) -> Option<&ContextData> {
        self.index.get(parms_id).map(|&i| &self.chain[i])
    }

    /// Like [`get_context_data`](Self::get_context_data), failing for ids
    /// that belong to no level of this chain.
    pub fn context_data(&self, parms_id: &ParmsId) -> HeResult<&ContextData> {
        self.get_context_data(parms_id).ok_or_else(|| {
            HeError::invalid(format!("parms id {parms_id} is not part of this context"))
        })
    }

    /// Same as [`context_data`](Self::context_data) but rejects the key level
    /// when it carries the special prime.
    pub fn data_level(&self, parms_id: &ParmsId) -> HeResult<&ContextData> {
        let data = self.context_data(parms_id)?;
        if self.using_keyswitching() && data.parms_id == self.key_parms_id() {
            return Err(HeError::invalid("the key level cannot hold data"));
        }
        Ok(data)
    }

    #[inline]
    pub fn key_context_data(&self) -> &ContextData {
        &self.chain[0]
    }

    #[inline]
    pub fn first_context_data(&self) -> &ContextData {
        &self.chain[self.first_index]
    }

    #[inline]
    pub fn last_context_data(&self) -> &ContextData {
        &self.chain[self.chain.len() - 1]
    }

    /// Data levels from richest to poorest.
    pub fn data_levels(&self) -> impl Iterator<Item = &ContextData> {
        self.chain[self.first_index..].iter()
    }

    #[inline]
    pub fn scheme(&self) -> SchemeKind {
        self.chain[0].parms.scheme()
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.chain[0].parms.poly_modulus_degree()
    }

    #[inline]
    pub fn security_level(&self) -> SecurityLevel {
        self.security
    }

    /// Whether a special prime is available for key switching.
    #[inline]
    pub fn using_keyswitching(&self) -> bool {
        self.first_index > 0
    }

    /// Whether the plain modulus supports slot batching.
    #[inline]
    pub fn using_batching(&self) -> bool {
        self.plain_ntt_tables.is_some()
    }

    #[inline]
    pub fn galois_tool(&self) -> &GaloisTool {
        &self.galois_tool
    }

    #[inline]
    pub fn plain_ntt_tables(&self) -> Option<&NttTables> {
        self.plain_ntt_tables.as_ref()
    }

    #[inline]
    pub fn aux_ntt_tables(&self) -> &[NttTables] {
        &self.aux_ntt_tables
    }
}

fn validate(parms: &EncryptionParameters, security: SecurityLevel) -> HeResult<()> {
    let degree = parms.poly_modulus_degree();
    if !(POLY_MODULUS_DEGREE_MIN..=POLY_MODULUS_DEGREE_MAX).contains(&degree)
        || !degree.is_power_of_two()
    {
        return Err(HeError::configuration(format!(
            "poly_modulus_degree {degree} must be a power of two in \
             [{POLY_MODULUS_DEGREE_MIN}, {POLY_MODULUS_DEGREE_MAX}]"
        )));
    }

    let moduli = parms.coeff_modulus();
    if moduli.is_empty() || moduli.len() > COEFF_MODULUS_COUNT_MAX {
        return Err(HeError::configuration(format!(
            "coeff_modulus must hold 1 to {COEFF_MODULUS_COUNT_MAX} primes, got {}",
            moduli.len()
        )));
    }
    for (i, q) in moduli.iter().enumerate() {
        if !(COEFF_MODULUS_BITS_MIN..=COEFF_MODULUS_BITS_MAX).contains(&q.bit_count()) {
            return Err(HeError::configuration(format!(
                "coefficient prime {} has {} bits",
                q.value(),
                q.bit_count()
            )));
        }
        if !is_ntt_friendly_prime(q.value(), degree as u64) {
            return Err(HeError::configuration(format!(
                "coefficient modulus {} is not a prime congruent to 1 mod {}",
                q.value(),
                2 * degree
            )));
        }
        if moduli[..i].contains(q) {
            return Err(HeError::configuration(format!(
                "coefficient prime {} appears twice",
                q.value()
            )));
        }
    }
    if let Some((special, data)) = moduli.split_last() {
        if let Some(larger) = data.iter().find(|q| q.value() >= special.value()) {
            return Err(HeError::configuration(format!(
                "special prime {} must exceed every data prime, found {}",
                special.value(),
                larger.value()
            )));
        }
    }

    let total_bits: u32 = moduli.iter().map(Modulus::bit_count).sum();
    let bound = CoeffModulus::max_bit_count(degree, security);
    if total_bits > bound {
        return Err(HeError::configuration(format!(
            "coefficient modulus of {total_bits} bits exceeds the {security:?} bound of {bound}"
        )));
    }

    match (parms.scheme(), parms.plain_modulus()) {
        (SchemeKind::Integer, None) => {
            return Err(HeError::configuration("integer scheme requires a plain modulus"));
        }
        (SchemeKind::Integer, Some(t)) => {
            if !(COEFF_MODULUS_BITS_MIN..=COEFF_MODULUS_BITS_MAX).contains(&t.bit_count()) {
                return Err(HeError::configuration(format!(
                    "plain modulus {} has {} bits",
                    t.value(),
                    t.bit_count()
                )));
            }
            if let Some(q) = moduli.iter().find(|q| gcd(q.value(), t.value()) != 1) {
                return Err(HeError::configuration(format!(
                    "plain modulus {} is not coprime to {}",
                    t.value(),
                    q.value()
                )));
            }
            let product = RnsBase::new(moduli.to_vec())?;
            if *product.product() <= WideUint::from_u64(t.value()) {
                return Err(HeError::configuration(
                    "plain modulus must be smaller than the coefficient modulus",
                ));
            }
        }
        (SchemeKind::Approximate, Some(_)) => {
            return Err(HeError::configuration(
                "approximate scheme does not take a plain modulus",
            ));
        }
        (SchemeKind::Approximate, None) => {}
    }
    Ok(())
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Auxiliary primes `P` with `log P >= log Q + log N + log t + 2` for the
/// given level, disjoint from its coefficient primes.
fn aux_base(level: &EncryptionParameters, degree: usize, t: &Modulus) -> HeResult<Vec<Modulus>> {
    let q_bits: u32 = level.coeff_modulus().iter().map(Modulus::bit_count).sum();
    let needed = q_bits + degree.trailing_zeros() + t.bit_count() + 2;
    // each prime contributes at least AUX_PRIME_BITS - 1 bits
    let count = needed.div_ceil(AUX_PRIME_BITS - 1) as usize;
    let exclude: Vec<u64> = level.coeff_modulus().iter().map(Modulus::value).collect();
    generate_primes(AUX_PRIME_BITS, count, degree as u64, &exclude)?
        .into_iter()
        .map(Modulus::new)
        .collect()
}
