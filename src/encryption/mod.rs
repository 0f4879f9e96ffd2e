pub mod decryptor;
pub mod encryptor;
pub(crate) mod zero;

pub use decryptor::Decryptor;
pub use encryptor::Encryptor;
