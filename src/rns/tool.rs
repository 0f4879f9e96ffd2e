//! Per-level RNS constants: dropping the last prime with rounding, and the
//! exact `t / Q` scaling used by integer multiplication and decryption.

use tracing::instrument;

use super::base::{BaseConverter, RnsBase, bit_length};
use crate::errors::{HeError, HeResult};
use crate::math::{Modulus, MultiplyOperand};
use crate::rings::{NttTables, RnsPoly};

#[derive(Debug, Clone)]
pub struct RnsTool {
    degree: usize,
    base_q: RnsBase,
    /// `q_last^{-1} mod q_i` for every prime but the last; empty for a
    /// single-prime base.
    inv_q_last_mod_q: Vec<MultiplyOperand>,
    integer: Option<IntegerScaling>,
}

impl RnsTool {
    pub fn new(degree: usize, base_q: RnsBase) -> HeResult<Self> {
        let inv_q_last_mod_q = match base_q.moduli().split_last() {
            Some((last, rest)) if !rest.is_empty() => rest
                .iter()
                .map(|q| {
                    q.inverse(q.reduce(last.value()))
                        .map(|inv| MultiplyOperand::new(inv, q))
                        .ok_or_else(|| {
                            HeError::configuration(format!(
                                "{} is not invertible modulo {}",
                                last.value(),
                                q.value()
                            ))
                        })
                })
                .collect::<HeResult<Vec<_>>>()?,
            _ => Vec::new(),
        };
        Ok(Self {
            degree,
            base_q,
            inv_q_last_mod_q,
            integer: None,
        })
    }

    /// Attaches the constants needed for exact integer scaling by `t / Q`.
    pub fn with_integer_scaling(
        mut self,
        plain_modulus: Modulus,
        aux_moduli: &[Modulus],
    ) -> HeResult<Self> {
        self.integer = Some(IntegerScaling::new(
            self.degree,
            &self.base_q,
            plain_modulus,
            aux_moduli,
        )?);
        Ok(self)
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    #[inline]
    pub fn base_q(&self) -> &RnsBase {
        &self.base_q
    }

    #[inline]
    pub fn inv_q_last_mod_q(&self) -> &[MultiplyOperand] {
        &self.inv_q_last_mod_q
    }

    #[inline]
    pub fn integer_scaling(&self) -> Option<&IntegerScaling> {
        self.integer.as_ref()
    }

    /// Replaces `x` by `round(x / q_last)` and drops the last channel.
    ///
    /// `tables` must be supplied (one per channel) iff `poly` is in NTT form.
    pub fn divide_and_round_q_last(
        &self,
        poly: &mut RnsPoly,
        tables: Option<&[NttTables]>,
    ) -> HeResult<()> {
        if self.inv_q_last_mod_q.is_empty() {
            return Err(HeError::state("cannot drop the only remaining prime"));
        }
        divide_and_round_by_last(poly, self.base_q.moduli(), &self.inv_q_last_mod_q, tables)
    }
}

/// Divides by the last modulus with rounding and truncates that channel.
///
/// Adds `floor(q_last / 2)` in the last channel, so the result is
/// `floor((x + q_last/2) / q_last)` in every remaining channel.
pub(crate) fn divide_and_round_by_last(
    poly: &mut RnsPoly,
    moduli: &[Modulus],
    inv_last: &[MultiplyOperand],
    tables: Option<&[NttTables]>,
) -> HeResult<()> {
    let k = moduli.len();
    if k < 2 || poly.channel_count() != k || inv_last.len() != k - 1 {
        return Err(HeError::state(format!(
            "cannot divide a {}-channel polynomial by the last of {k} moduli",
            poly.channel_count()
        )));
    }
    match tables {
        Some(tables) if !poly.is_ntt_form() || tables.len() != k => {
            return Err(HeError::state("NTT tables supplied for a mismatched polynomial"));
        }
        None if poly.is_ntt_form() => {
            return Err(HeError::state("NTT-form polynomial needs NTT tables to rescale"));
        }
        _ => {}
    }

    let last = &moduli[k - 1];
    let half = last.value() >> 1;
    let mut last_channel = poly.channel(k - 1).to_vec();
    if let Some(tables) = tables {
        tables[k - 1].inverse(&mut last_channel);
    }
    for c in last_channel.iter_mut() {
        *c = last.add(*c, half);
    }

    let mut temp = vec![0u64; poly.degree()];
    for (i, q) in moduli[..k - 1].iter().enumerate() {
        let half_mod = q.reduce(half);
        for (t, &c) in temp.iter_mut().zip(&last_channel) {
            *t = q.sub(q.reduce(c), half_mod);
        }
        if let Some(tables) = tables {
            tables[i].forward(&mut temp);
        }
        for (a, &t) in poly.channel_mut(i).iter_mut().zip(&temp) {
            *a = q.mul_shoup(q.sub(*a, t), &inv_last[i]);
        }
    }
    poly.truncate(k - 1);
    Ok(())
}

// ─── Integer scaling ──────────────────────────────────────────────────────────

/// Constants for computing `round(t * x / Q)` exactly in RNS.
///
/// The auxiliary base `P` is wide enough to hold a tensor product of two
/// centered ciphertext polynomials scaled by `t`, so the rounded quotient can
/// be formed in `P` and converted back to `Q` without loss.
#[derive(Debug, Clone)]
pub struct IntegerScaling {
    degree: usize,
    plain_modulus: Modulus,
    base_p: RnsBase,
    q_to_p: BaseConverter,
    p_to_q: BaseConverter,
    q_to_t: BaseConverter,
    inv_q_mod_p: Vec<MultiplyOperand>,
    neg_inv_q_mod_t: u64,
}

impl IntegerScaling {
    fn new(
        degree: usize,
        base_q: &RnsBase,
        plain_modulus: Modulus,
        aux_moduli: &[Modulus],
    ) -> HeResult<Self> {
        let base_p = RnsBase::new(aux_moduli.to_vec())?;
        let q_to_p = BaseConverter::new(base_q, base_p.moduli());
        let p_to_q = BaseConverter::new(&base_p, base_q.moduli());
        let q_to_t = BaseConverter::new(base_q, std::slice::from_ref(&plain_modulus));

        let inv_q_mod_p = base_p
            .moduli()
            .iter()
            .map(|p| {
                p.inverse(base_q.product_mod(p))
                    .map(|inv| MultiplyOperand::new(inv, p))
                    .ok_or_else(|| {
                        HeError::configuration(format!(
                            "auxiliary prime {} is not coprime to the coefficient modulus",
                            p.value()
                        ))
                    })
            })
            .collect::<HeResult<Vec<_>>>()?;
        let inv_q_mod_t = plain_modulus
            .inverse(base_q.product_mod(&plain_modulus))
            .ok_or_else(|| {
                HeError::configuration("plain modulus is not coprime to the coefficient modulus")
            })?;

        Ok(Self {
            degree,
            neg_inv_q_mod_t: plain_modulus.neg(inv_q_mod_t),
            plain_modulus,
            base_p,
            q_to_p,
            p_to_q,
            q_to_t,
            inv_q_mod_p,
        })
    }

    #[inline]
    pub fn plain_modulus(&self) -> &Modulus {
        &self.plain_modulus
    }

    #[inline]
    pub fn base_p(&self) -> &RnsBase {
        &self.base_p
    }

    fn q_moduli(&self) -> &[Modulus] {
        self.q_to_p.ibase().moduli()
    }

    /// Tensor product of two coefficient-form ciphertexts followed by
    /// `round(t * . / Q)` on every output component.
    #[instrument(skip_all, fields(lhs = lhs.len(), rhs = rhs.len()))]
    pub fn multiply(
        &self,
        lhs: &[RnsPoly],
        rhs: &[RnsPoly],
        q_tables: &[NttTables],
        p_tables: &[NttTables],
    ) -> HeResult<Vec<RnsPoly>> {
        if lhs.is_empty() || rhs.is_empty() {
            return Err(HeError::invalid("cannot multiply an empty ciphertext"));
        }
        let q = self.q_moduli();
        let p = self.base_p.moduli();
        let lhs_ext = lhs
            .iter()
            .map(|poly| self.lift(poly, q_tables, p_tables))
            .collect::<HeResult<Vec<_>>>()?;
        let rhs_ext = rhs
            .iter()
            .map(|poly| self.lift(poly, q_tables, p_tables))
            .collect::<HeResult<Vec<_>>>()?;

        let n = self.degree;
        let size = lhs.len() + rhs.len() - 1;
        let mut acc: Vec<(RnsPoly, RnsPoly)> = (0..size)
            .map(|_| {
                (
                    RnsPoly::from_raw(vec![0; q.len() * n], n, true),
                    RnsPoly::from_raw(vec![0; p.len() * n], n, true),
                )
            })
            .collect();
        for (i, (a_q, a_p)) in lhs_ext.iter().enumerate() {
            for (j, (b_q, b_p)) in rhs_ext.iter().enumerate() {
                let mut prod_q = a_q.clone();
                prod_q.dyadic_mul_assign(b_q, q)?;
                acc[i + j].0.add_assign(&prod_q, q)?;
                let mut prod_p = a_p.clone();
                prod_p.dyadic_mul_assign(b_p, p)?;
                acc[i + j].1.add_assign(&prod_p, p)?;
            }
        }

        acc.into_iter()
            .map(|(mut e_q, mut e_p)| {
                e_q.ntt_inverse(q_tables)?;
                e_p.ntt_inverse(p_tables)?;
                self.scale_and_round(&e_q, &e_p)
            })
            .collect()
    }

    fn lift(
        &self,
        poly: &RnsPoly,
        q_tables: &[NttTables],
        p_tables: &[NttTables],
    ) -> HeResult<(RnsPoly, RnsPoly)> {
        if poly.is_ntt_form() {
            return Err(HeError::state("integer multiplication expects coefficient form"));
        }
        let n = self.degree;
        let mut in_p = vec![0u64; self.base_p.len() * n];
        self.q_to_p.convert_centered(poly.data(), n, &mut in_p);
        let mut in_p = RnsPoly::from_raw(in_p, n, false);
        let mut in_q = poly.clone();
        in_q.ntt_forward(q_tables)?;
        in_p.ntt_forward(p_tables)?;
        Ok((in_q, in_p))
    }

    /// Given `e` in `Q ∪ P`, returns `round(t * e / Q)` in `Q`.
    fn scale_and_round(&self, e_q: &RnsPoly, e_p: &RnsPoly) -> HeResult<RnsPoly> {
        let n = self.degree;
        let t = self.plain_modulus.value();
        let mut te_q = e_q.clone();
        te_q.multiply_scalar(t, self.q_moduli())?;

        // r = [t e]_Q (centered), reconstructed in P
        let mut w = vec![0u64; self.base_p.len() * n];
        self.q_to_p.convert_centered(te_q.data(), n, &mut w);
        for (j, p) in self.base_p.moduli().iter().enumerate() {
            let t_mod_p = p.reduce(t);
            let e = e_p.channel(j);
            for (c, w) in w[j * n..(j + 1) * n].iter_mut().enumerate() {
                let te = p.mul(e[c], t_mod_p);
                *w = p.mul_shoup(p.sub(te, *w), &self.inv_q_mod_p[j]);
            }
        }

        let mut out = vec![0u64; self.q_moduli().len() * n];
        self.p_to_q.convert_centered(&w, n, &mut out);
        Ok(RnsPoly::from_raw(out, n, false))
    }

    /// `round(t * x / Q) mod t` for a coefficient-form polynomial.
    pub fn scale_to_plain(&self, x: &RnsPoly) -> HeResult<Vec<u64>> {
        let n = self.degree;
        let t = &self.plain_modulus;
        let mut tx = x.clone();
        tx.multiply_scalar(t.value(), self.q_moduli())?;
        let mut r = vec![0u64; n];
        self.q_to_t.convert_centered(tx.data(), n, &mut r);
        Ok(r.into_iter().map(|ri| t.mul(ri, self.neg_inv_q_mod_t)).collect())
    }

    /// Bits of headroom left between `[t x]_Q` and `Q / 2`.
    pub fn noise_budget(&self, x: &RnsPoly) -> HeResult<u32> {
        let q = self.q_to_p.ibase();
        let mut tx = x.clone();
        tx.multiply_scalar(self.plain_modulus.value(), q.moduli())?;
        let n = self.degree;
        let mut residues = vec![0u64; q.len()];
        let mut max_bits = 0u32;
        for c in 0..n {
            for (i, r) in residues.iter_mut().enumerate() {
                *r = tx.channel(i)[c];
            }
            let (_, magnitude) = q.compose_centered(&residues);
            max_bits = max_bits.max(bit_length(&magnitude));
        }
        Ok(q.bit_count().saturating_sub(max_bits + 1))
    }
}
