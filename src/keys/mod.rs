pub(crate) mod common;
pub mod generator;
pub mod public_key;
pub mod secret_key;

pub use generator::KeyGenerator;
pub use public_key::{GaloisKeys, KSwitchKeys, PublicKey, RelinKeys};
pub use secret_key::SecretKey;
