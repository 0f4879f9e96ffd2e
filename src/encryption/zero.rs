//! Encryptions of zero, the primitive behind public keys, switch keys and
//! fresh ciphertexts.

use rand::Rng;

use crate::ciphertext::Ciphertext;
use crate::context::{Context, ParmsId};
use crate::errors::{HeResult, ensure_same_level};
use crate::keys::common::{sample_error_poly, sample_secret_poly, sample_uniform_poly};
use crate::keys::{PublicKey, SecretKey};
use crate::math::SamplingParams;

/// `(-a s + e, a)` at `parms_id`.
pub(crate) fn encrypt_zero_symmetric<R: Rng + ?Sized>(
    context: &Context,
    parms_id: &ParmsId,
    secret_key: &SecretKey,
    is_ntt_form: bool,
    sampling: &SamplingParams,
    rng: &mut R,
) -> HeResult<Ciphertext> {
    ensure_same_level(&context.key_parms_id(), &secret_key.parms_id())?;
    let data = context.context_data(parms_id)?;
    let moduli = data.coeff_modulus();
    let tables = data.ntt_tables();
    let degree = data.degree();

    let s = secret_key.truncated(moduli.len());
    let a = sample_uniform_poly(degree, moduli, true, rng);
    let mut e = sample_error_poly(degree, moduli, sampling, rng)?;

    let mut c0 = a.clone();
    c0.dyadic_mul_assign(&s, moduli)?;
    c0.negate(moduli)?;
    let mut c1 = a;
    if is_ntt_form {
        e.ntt_forward(tables)?;
    } else {
        c0.ntt_inverse(tables)?;
        c1.ntt_inverse(tables)?;
    }
    c0.add_assign(&e, moduli)?;
    Ok(Ciphertext::new(vec![c0, c1], *parms_id, 1.0))
}

/// `(pk_0 u + e_0, pk_1 u + e_1)` at `parms_id` for a fresh ternary `u`.
pub(crate) fn encrypt_zero_asymmetric<R: Rng + ?Sized>(
    context: &Context,
    parms_id: &ParmsId,
    public_key: &PublicKey,
    is_ntt_form: bool,
    sampling: &SamplingParams,
    rng: &mut R,
) -> HeResult<Ciphertext> {
    ensure_same_level(&context.key_parms_id(), &public_key.parms_id())?;
    let data = context.context_data(parms_id)?;
    let moduli = data.coeff_modulus();
    let tables = data.ntt_tables();
    let degree = data.degree();

    let ephemeral = SamplingParams {
        hamming_weight: None,
        ..*sampling
    };
    let mut u = sample_secret_poly(degree, moduli, &ephemeral, rng)?;
    u.ntt_forward(tables)?;

    let mut polys = Vec::with_capacity(2);
    for pk in public_key.data().polys() {
        let mut c = pk.clone();
        c.truncate(moduli.len());
        c.dyadic_mul_assign(&u, moduli)?;
        let mut e = sample_error_poly(degree, moduli, sampling, rng)?;
        if is_ntt_form {
            e.ntt_forward(tables)?;
        } else {
            c.ntt_inverse(tables)?;
        }
        c.add_assign(&e, moduli)?;
        polys.push(c);
    }
    Ok(Ciphertext::new(polys, *parms_id, 1.0))
}
