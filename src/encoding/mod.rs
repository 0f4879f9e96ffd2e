pub mod batch_encoder;
pub mod ckks_encoder;
mod special_fft;

pub use batch_encoder::BatchEncoder;
pub use ckks_encoder::{CkksEncoder, SlotInput};
