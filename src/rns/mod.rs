//! Residue number system bases and the per-level conversion tools built on
//! them.

pub mod base;
pub mod tool;

pub use base::{BaseConverter, RNS_BASE_MAX_BITS, RnsBase, WideUint};
pub use tool::{IntegerScaling, RnsTool};
