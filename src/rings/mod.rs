pub mod galois;
pub mod ntt;
pub mod poly;

pub use galois::{GALOIS_GENERATOR, GaloisTool};
pub use ntt::NttTables;
pub use poly::RnsPoly;
