//! Secret key: a small ternary polynomial `s(X)` stored at the key level in
//! NTT form.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::ParmsId;
use crate::rings::RnsPoly;

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretKey {
    poly: RnsPoly,
    parms_id: ParmsId,
}

impl SecretKey {
    pub(crate) fn new(poly: RnsPoly, parms_id: ParmsId) -> Self {
        debug_assert!(poly.is_ntt_form());
        Self { poly, parms_id }
    }

    /// NTT-form residues over every prime of the key level.
    #[inline]
    pub fn poly(&self) -> &RnsPoly {
        &self.poly
    }

    #[inline]
    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    /// The secret restricted to the first `channel_count` primes.
    pub(crate) fn truncated(&self, channel_count: usize) -> RnsPoly {
        let mut poly = self.poly.clone();
        poly.truncate(channel_count);
        poly
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("parms_id", &self.parms_id)
            .field("channels", &self.poly.channel_count())
            .finish_non_exhaustive()
    }
}
