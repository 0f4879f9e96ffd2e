//! Public and key-switching keys.
//!
//! All of them are RLWE encryptions at the key level in NTT form:
//! `(b, a) = (-a s + e + m, a)` with `m = 0` for the public key and
//! `m = P s'` placed in one data prime for each key-switching digit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ciphertext::Ciphertext;
use crate::context::ParmsId;

/// An encryption of zero under the secret key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicKey(Ciphertext);

impl PublicKey {
    pub(crate) fn new(ciphertext: Ciphertext) -> Self {
        Self(ciphertext)
    }

    #[inline]
    pub fn data(&self) -> &Ciphertext {
        &self.0
    }

    #[inline]
    pub fn parms_id(&self) -> ParmsId {
        self.0.parms_id()
    }
}

/// Switch keys for one auxiliary secret `s'`: entry `i` is used with the
/// digit `c mod q_i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KSwitchKeys {
    keys: Vec<PublicKey>,
    parms_id: ParmsId,
}

impl KSwitchKeys {
    pub(crate) fn new(keys: Vec<PublicKey>, parms_id: ParmsId) -> Self {
        Self { keys, parms_id }
    }

    #[inline]
    pub fn keys(&self) -> &[PublicKey] {
        &self.keys
    }

    /// Number of RNS digits covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }
}

/// Switch keys from `s^2` back to `s`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelinKeys(KSwitchKeys);

impl RelinKeys {
    pub(crate) fn new(keys: KSwitchKeys) -> Self {
        Self(keys)
    }

    #[inline]
    pub fn key(&self) -> &KSwitchKeys {
        &self.0
    }

    #[inline]
    pub fn parms_id(&self) -> ParmsId {
        self.0.parms_id()
    }
}

/// Switch keys from `s(X^k)` back to `s`, indexed by Galois element `k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaloisKeys {
    keys: BTreeMap<u64, KSwitchKeys>,
    parms_id: ParmsId,
}

impl GaloisKeys {
    pub(crate) fn new(keys: BTreeMap<u64, KSwitchKeys>, parms_id: ParmsId) -> Self {
        Self { keys, parms_id }
    }

    #[inline]
    pub fn has_key(&self, element: u64) -> bool {
        self.keys.contains_key(&element)
    }

    #[inline]
    pub fn key(&self, element: u64) -> Option<&KSwitchKeys> {
        self.keys.get(&element)
    }

    pub fn elements(&self) -> impl Iterator<Item = u64> + '_ {
        self.keys.keys().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }
}
