//! Hybrid key switching with one special prime.
//!
//! A polynomial `c` at a level with primes `q_0..q_{k-1}` is split into the
//! digits `c mod q_i`. Each digit is multiplied by the matching switch key
//! over `q_0..q_{k-1}, P`, the products are summed and the sums divided by
//! `P` with rounding. The result encrypts `c * s'` under `s` and is added into
//! `c_0` and `c_1` of the destination.

use tracing::{instrument, trace};

use crate::ciphertext::Ciphertext;
use crate::context::Context;
use crate::errors::{HeError, HeResult, ensure_same_level};
use crate::keys::KSwitchKeys;
use crate::math::Modulus;
use crate::rings::RnsPoly;
use crate::rns::tool::divide_and_round_by_last;

/// Adds the key-switched image of `target` into `c_0` and `c_1` of `dest`.
///
/// `target` must live at the level of `dest`, in either form.
#[instrument(skip_all, fields(channels = target.channel_count()))]
pub(crate) fn switch_key_inplace(
    context: &Context,
    dest: &mut Ciphertext,
    target: &RnsPoly,
    keys: &KSwitchKeys,
) -> HeResult<()> {
    if !context.using_keyswitching() {
        return Err(HeError::state("key switching needs a special prime"));
    }
    ensure_same_level(&context.key_parms_id(), &keys.parms_id())?;
    let data = context.data_level(&dest.parms_id())?;
    let key_data = context.key_context_data();

    let level_moduli = data.coeff_modulus();
    let k = level_moduli.len();
    if target.channel_count() != k || dest.channel_count() != k {
        return Err(HeError::state(format!(
            "key switching input has {} channels, level has {k}",
            target.channel_count()
        )));
    }
    if keys.len() < k {
        return Err(HeError::state(format!(
            "switch key has {} digits, level needs {k}",
            keys.len()
        )));
    }

    let key_moduli = key_data.coeff_modulus();
    let key_tables = key_data.ntt_tables();
    let special_index = key_moduli.len() - 1;
    // output channel -> key-level channel
    let channel_map: Vec<usize> = (0..k).chain(std::iter::once(special_index)).collect();
    let moduli: Vec<Modulus> = channel_map.iter().map(|&j| key_moduli[j]).collect();

    let mut digits = target.clone();
    if digits.is_ntt_form() {
        digits.ntt_inverse(data.ntt_tables())?;
    }

    let n = data.degree();
    let mut acc = [
        vec![0u64; (k + 1) * n],
        vec![0u64; (k + 1) * n],
    ];
    let mut scratch = vec![0u64; n];
    for (i, key) in keys.keys()[..k].iter().enumerate() {
        let digit = digits.channel(i);
        let key_polys = key.data().polys();
        for (out, &j) in channel_map.iter().enumerate() {
            let q = &key_moduli[j];
            if j == i {
                scratch.copy_from_slice(digit);
            } else {
                for (s, &d) in scratch.iter_mut().zip(digit) {
                    *s = q.reduce(d);
                }
            }
            key_tables[j].forward(&mut scratch);
            for (a, key_poly) in acc.iter_mut().zip(key_polys) {
                let a = &mut a[out * n..(out + 1) * n];
                for ((a, &s), &kv) in a.iter_mut().zip(&scratch).zip(key_poly.channel(j)) {
                    *a = q.add(*a, q.mul(s, kv));
                }
            }
        }
    }

    let inv_special = &key_data.rns_tool().inv_q_last_mod_q()[..k];
    let dest_ntt = dest.is_ntt_form();
    for (c, mut data_acc) in dest.polys_mut().iter_mut().zip(acc) {
        for (out, &j) in channel_map.iter().enumerate() {
            key_tables[j].inverse(&mut data_acc[out * n..(out + 1) * n]);
        }
        let mut delta = RnsPoly::from_raw(data_acc, n, false);
        divide_and_round_by_last(&mut delta, &moduli, inv_special, None)?;
        if dest_ntt {
            delta.ntt_forward(data.ntt_tables())?;
        }
        c.add_assign(&delta, level_moduli)?;
    }
    trace!(digits = k, "key switched");
    Ok(())
}
