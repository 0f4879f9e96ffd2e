pub mod modulus;
pub mod primes;
pub mod sampling;

pub use modulus::{MODULUS_MAX_BITS, Modulus, MultiplyOperand};
pub use primes::{
    generate_primes, get_first_prime_down, get_first_prime_up, is_ntt_friendly_prime,
    is_prime,
};
pub use sampling::{
    SamplingParams, gaussian_coefficients, ternary_coefficients, uniform_coefficients,
    uniform_ternary_coefficients,
};
