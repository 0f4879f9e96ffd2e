#![allow(dead_code)]

use std::sync::{Arc, Once};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use toy_rlwe::{CoeffModulus, Context, EncryptionParameters, SchemeKind, SecurityLevel};

static TRACING: Once = Once::new();

/// Routes `tracing` output through the test harness.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

pub fn rng(seed: u64) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(seed)
}

pub fn integer_context(degree: usize, bits: &[u32], t: u64) -> Arc<Context> {
    let parms = EncryptionParameters::builder(SchemeKind::Integer)
        .poly_modulus_degree(degree)
        .coeff_modulus(CoeffModulus::create(degree, bits).unwrap())
        .plain_modulus(t)
        .build()
        .unwrap();
    Context::new(parms, SecurityLevel::None).unwrap()
}

pub fn approximate_context(degree: usize, bits: &[u32]) -> Arc<Context> {
    let parms = EncryptionParameters::builder(SchemeKind::Approximate)
        .poly_modulus_degree(degree)
        .coeff_modulus(CoeffModulus::create(degree, bits).unwrap())
        .build()
        .unwrap();
    Context::new(parms, SecurityLevel::None).unwrap()
}
