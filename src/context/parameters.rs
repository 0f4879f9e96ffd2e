use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{HeError, HeResult};
use crate::math::Modulus;

/// Which plaintext semantics a parameter set carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemeKind {
    /// Exact arithmetic modulo a plain modulus `t` (BFV).
    Integer,
    /// Approximate fixed-point arithmetic on complex slots (CKKS).
    Approximate,
}

impl SchemeKind {
    fn tag(self) -> u8 {
        match self {
            SchemeKind::Integer => 1,
            SchemeKind::Approximate => 2,
        }
    }
}

/// Fingerprint of a parameter set: a SHA-256 digest as four little-endian
/// words. `ParmsId::ZERO` marks a value that has not been assigned a level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ParmsId([u64; 4]);

impl ParmsId {
    pub const ZERO: ParmsId = ParmsId([0; 4]);

    #[inline]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    #[inline]
    pub fn words(&self) -> &[u64; 4] {
        &self.0
    }
}

impl fmt::Display for ParmsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for word in self.0 {
            write!(f, "{word:016x}")?;
        }
        Ok(())
    }
}

/// Scheme, ring degree, coefficient modulus and plain modulus of one level.
///
/// Structural checks happen in the builder; the full set of constraints
/// (primality, NTT friendliness, security bound) is enforced by
/// [`Context::new`](crate::context::Context::new).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionParameters {
    scheme: SchemeKind,
    poly_modulus_degree: usize,
    coeff_modulus: Vec<Modulus>,
    plain_modulus: Option<Modulus>,
}

impl EncryptionParameters {
    pub fn builder(scheme: SchemeKind) -> EncryptionParametersBuilder {
        EncryptionParametersBuilder::new(scheme)
    }

    #[inline]
    pub fn scheme(&self) -> SchemeKind {
        self.scheme
    }

    #[inline]
    pub fn poly_modulus_degree(&self) -> usize {
        self.poly_modulus_degree
    }

    #[inline]
    pub fn coeff_modulus(&self) -> &[Modulus] {
        &self.coeff_modulus
    }

    #[inline]
    pub fn plain_modulus(&self) -> Option<&Modulus> {
        self.plain_modulus.as_ref()
    }

    /// Same parameters with the last coefficient prime removed.
    pub(crate) fn without_last_prime(&self) -> Self {
        let mut next = self.clone();
        next.coeff_modulus.pop();
        next
    }

    pub fn parms_id(&self) -> ParmsId {
        let mut hasher = Sha256::new();
        hasher.update(b"toy_rlwe_parms_v1");
        hasher.update([self.scheme.tag()]);
        hasher.update((self.poly_modulus_degree as u64).to_le_bytes());
        hasher.update(self.plain_modulus.map_or(0, |t| t.value()).to_le_bytes());
        hasher.update((self.coeff_modulus.len() as u64).to_le_bytes());
        for q in &self.coeff_modulus {
            hasher.update(q.value().to_le_bytes());
        }
        let digest = hasher.finalize();

        let mut words = [0u64; 4];
        for (word, chunk) in words.iter_mut().zip(digest.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *word = u64::from_le_bytes(bytes);
        }
        ParmsId(words)
    }
}

/// Consuming builder for [`EncryptionParameters`].
#[derive(Debug, Clone)]
pub struct EncryptionParametersBuilder {
    scheme: SchemeKind,
    poly_modulus_degree: Option<usize>,
    coeff_modulus: Vec<Modulus>,
    plain_modulus: Option<u64>,
}

impl EncryptionParametersBuilder {
    pub fn new(scheme: SchemeKind) -> Self {
        Self {
            scheme,
            poly_modulus_degree: None,
            coeff_modulus: Vec::new(),
            plain_modulus: None,
        }
    }

    pub fn poly_modulus_degree(mut self, degree: usize) -> Self {
        self.poly_modulus_degree = Some(degree);
        self
    }

    pub fn coeff_modulus(mut self, moduli: impl IntoIterator<Item = Modulus>) -> Self {
        self.coeff_modulus = moduli.into_iter().collect();
        self
    }

    pub fn plain_modulus(mut self, value: u64) -> Self {
        self.plain_modulus = Some(value);
        self
    }

    pub fn build(self) -> HeResult<EncryptionParameters> {
        let poly_modulus_degree = self
            .poly_modulus_degree
            .ok_or_else(|| HeError::configuration("poly_modulus_degree is not set"))?;
        if self.coeff_modulus.is_empty() {
            return Err(HeError::configuration("coeff_modulus is not set"));
        }
        let plain_modulus = self.plain_modulus.map(Modulus::new).transpose()?;
        Ok(EncryptionParameters {
            scheme: self.scheme,
            poly_modulus_degree,
            coeff_modulus: self.coeff_modulus,
            plain_modulus,
        })
    }
}

/// Target security for the total coefficient modulus size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// No bound is enforced.
    None,
    #[default]
    Tc128,
    Tc192,
    Tc256,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moduli(values: &[u64]) -> Vec<Modulus> {
        values.iter().map(|&v| Modulus::new(v).unwrap()).collect()
    }

    #[test]
    fn builder_requires_degree_and_modulus() {
        assert!(matches!(
            EncryptionParameters::builder(SchemeKind::Integer).build(),
            Err(HeError::Configuration { .. })
        ));
        assert!(matches!(
            EncryptionParameters::builder(SchemeKind::Integer)
                .poly_modulus_degree(8)
                .build(),
            Err(HeError::Configuration { .. })
        ));
        assert!(matches!(
            EncryptionParameters::builder(SchemeKind::Integer)
                .poly_modulus_degree(8)
                .coeff_modulus(moduli(&[97]))
                .plain_modulus(1)
                .build(),
            Err(HeError::Configuration { .. })
        ));
    }

    #[test]
    fn fingerprint_depends_on_every_field() {
        let base = EncryptionParameters::builder(SchemeKind::Integer)
            .poly_modulus_degree(8)
            .coeff_modulus(moduli(&[97, 113]))
            .plain_modulus(17)
            .build()
            .unwrap();
        let id = base.parms_id();
        assert!(!id.is_zero());
        assert_eq!(id, base.clone().parms_id());

        let other_t = EncryptionParameters::builder(SchemeKind::Integer)
            .poly_modulus_degree(8)
            .coeff_modulus(moduli(&[97, 113]))
            .plain_modulus(257)
            .build()
            .unwrap();
        let other_degree = EncryptionParameters::builder(SchemeKind::Integer)
            .poly_modulus_degree(16)
            .coeff_modulus(moduli(&[97, 113]))
            .plain_modulus(17)
            .build()
            .unwrap();
        let approx = EncryptionParameters::builder(SchemeKind::Approximate)
            .poly_modulus_degree(8)
            .coeff_modulus(moduli(&[97, 113]))
            .build()
            .unwrap();
        for other in [&other_t, &other_degree, &approx] {
            assert_ne!(other.parms_id(), id);
        }
        assert_ne!(base.without_last_prime().parms_id(), id);
        assert_eq!(base.without_last_prime().coeff_modulus().len(), 1);
    }

    #[test]
    fn parms_id_displays_as_hex() {
        assert_eq!(ParmsId::ZERO.to_string(), "0".repeat(64));
        assert!(ParmsId::ZERO.is_zero());
        assert_eq!(ParmsId::default(), ParmsId::ZERO);
    }
}
