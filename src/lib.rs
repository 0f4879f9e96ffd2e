//! Toy RLWE homomorphic encryption core with an exact integer scheme (BFV)
//! and an approximate scheme (CKKS) over a shared RNS/NTT ring.

pub mod ciphertext;
pub mod context;
pub mod encoding;
pub mod encryption;
pub mod errors;
pub mod evaluator;
pub mod keys;
pub mod math;
pub mod plaintext;
pub mod rings;
pub mod rns;

pub use ciphertext::Ciphertext;
pub use context::{
    CoeffModulus, Context, ContextData, EncryptionParameters, ParmsId, PlainModulus, SchemeKind,
    SecurityLevel,
};
pub use encoding::{BatchEncoder, CkksEncoder, SlotInput};
pub use encryption::{Decryptor, Encryptor};
pub use errors::{HeError, HeResult};
pub use evaluator::Evaluator;
pub use keys::{GaloisKeys, KSwitchKeys, KeyGenerator, PublicKey, RelinKeys, SecretKey};
pub use math::{Modulus, SamplingParams};
pub use plaintext::Plaintext;
