mod common;

use std::sync::Arc;

use common::{init_tracing, integer_context, rng};
use toy_rlwe::math::Modulus;
use toy_rlwe::{
    Decryptor, Encryptor, Evaluator, HeError, KeyGenerator, Plaintext, SamplingParams,
};

const T: u64 = 257;
const DEGREE: usize = 8;

fn plain(coeffs: &[u64]) -> Plaintext {
    Plaintext::from_coefficients(coeffs, &Modulus::new(T).unwrap(), DEGREE).unwrap()
}

#[test]
fn galois_automorphism_matches_plain_permutation() {
    init_tracing();
    let context = integer_context(DEGREE, &[30, 60], T);
    let mut rng = rng(1);
    let keygen = KeyGenerator::new(Arc::clone(&context), &mut rng).unwrap();
    let galois_keys = keygen
        .create_galois_keys_from_elements(&[5, 5, 15], &mut rng)
        .unwrap();
    assert_eq!(galois_keys.len(), 2);
    assert_eq!(galois_keys.elements().collect::<Vec<_>>(), [5, 15]);

    let encryptor =
        Encryptor::with_secret_key(Arc::clone(&context), keygen.secret_key().clone()).unwrap();
    let decryptor = Decryptor::new(Arc::clone(&context), keygen.secret_key().clone()).unwrap();
    let evaluator = Evaluator::new(Arc::clone(&context));

    let coeffs = [3u64, 1, 4, 1, 5, 9, 2, 6];
    let encrypted = encryptor.encrypt(&plain(&coeffs), &mut rng).unwrap();

    let t = Modulus::new(T).unwrap();
    let mut expected = vec![0u64; DEGREE];
    context.galois_tool().apply_coeff(&coeffs, 5, &t, &mut expected);

    let rotated = evaluator.apply_galois(&encrypted, 5, &galois_keys).unwrap();
    let decrypted = decryptor.decrypt(&rotated).unwrap();
    assert_eq!(decrypted.coefficients().unwrap(), &expected[..]);

    // NTT-form ciphertexts permute their evaluations instead
    let ntt = evaluator.transform_to_ntt(&encrypted).unwrap();
    let rotated = evaluator.apply_galois(&ntt, 5, &galois_keys).unwrap();
    assert!(rotated.is_ntt_form());
    let rotated = evaluator.transform_from_ntt(&rotated).unwrap();
    let decrypted = decryptor.decrypt(&rotated).unwrap();
    assert_eq!(decrypted.coefficients().unwrap(), &expected[..]);

    // X -> X^15 = X^-1 mod X^8 + 1, applied twice is the identity
    let there = evaluator.apply_galois(&encrypted, 15, &galois_keys).unwrap();
    let back = evaluator.apply_galois(&there, 15, &galois_keys).unwrap();
    assert_eq!(decryptor.decrypt(&back).unwrap().coefficients().unwrap(), &coeffs[..]);
}

#[test]
fn missing_and_invalid_elements() {
    init_tracing();
    let context = integer_context(DEGREE, &[30, 60], T);
    let mut rng = rng(2);
    let keygen = KeyGenerator::new(Arc::clone(&context), &mut rng).unwrap();
    let galois_keys = keygen.create_galois_keys_from_elements(&[5], &mut rng).unwrap();
    let encryptor = Encryptor::new(
        Arc::clone(&context),
        keygen.create_public_key(&mut rng).unwrap(),
    )
    .unwrap();
    let evaluator = Evaluator::new(Arc::clone(&context));
    let encrypted = encryptor.encrypt(&plain(&[1, 2, 3]), &mut rng).unwrap();

    assert!(matches!(
        evaluator.apply_galois(&encrypted, 3, &galois_keys),
        Err(HeError::State { .. })
    ));
    assert!(matches!(
        evaluator.apply_galois(&encrypted, 4, &galois_keys),
        Err(HeError::InvalidArgument { .. })
    ));
    assert!(matches!(
        evaluator.apply_galois(&encrypted, 17, &galois_keys),
        Err(HeError::InvalidArgument { .. })
    ));
    assert!(keygen.create_galois_keys_from_elements(&[6], &mut rng).is_err());

    for steps in [i64::MIN, i64::MAX, DEGREE as i64 / 2] {
        assert!(matches!(
            keygen.create_galois_keys_from_steps(&[steps], &mut rng),
            Err(HeError::InvalidArgument { .. })
        ));
    }
}

#[test]
fn keys_from_another_chain_are_rejected() {
    init_tracing();
    let context = integer_context(DEGREE, &[30, 60], T);
    let other = integer_context(DEGREE, &[30, 50], T);
    assert_ne!(context.key_parms_id(), other.key_parms_id());

    let mut rng = rng(3);
    let keygen = KeyGenerator::new(Arc::clone(&context), &mut rng).unwrap();
    let foreign = KeyGenerator::new(Arc::clone(&other), &mut rng).unwrap();
    let foreign_galois = foreign.create_galois_keys(&mut rng).unwrap();
    let foreign_relin = foreign.create_relin_keys(&mut rng).unwrap();

    let encryptor =
        Encryptor::with_secret_key(Arc::clone(&context), keygen.secret_key().clone()).unwrap();
    let evaluator = Evaluator::new(Arc::clone(&context));
    let encrypted = encryptor.encrypt(&plain(&[7]), &mut rng).unwrap();

    assert!(matches!(
        evaluator.rotate_columns(&encrypted, &foreign_galois),
        Err(HeError::LevelMismatch { .. })
    ));
    let squared = evaluator.square(&encrypted).unwrap();
    assert!(matches!(
        evaluator.relinearize(&squared, &foreign_relin),
        Err(HeError::LevelMismatch { .. })
    ));
    assert!(matches!(
        Decryptor::new(Arc::clone(&context), foreign.secret_key().clone()),
        Err(HeError::LevelMismatch { .. })
    ));
    assert!(matches!(
        Encryptor::with_secret_key(context, foreign.secret_key().clone()),
        Err(HeError::LevelMismatch { .. })
    ));
}

#[test]
fn encryptions_of_zero_and_sampling_choices() {
    init_tracing();
    let context = integer_context(DEGREE, &[30, 60], T);
    let mut rng = rng(4);
    let sparse = SamplingParams {
        hamming_weight: Some(4),
        ..SamplingParams::default()
    };
    let keygen = KeyGenerator::with_sampling(Arc::clone(&context), sparse, &mut rng).unwrap();
    let mut secret = keygen.secret_key().poly().clone();
    secret.ntt_inverse(context.key_context_data().ntt_tables()).unwrap();
    let weight = secret
        .channel(0)
        .iter()
        .filter(|&&c| c != 0)
        .count();
    assert_eq!(weight, 4);

    let public_key = keygen.create_public_key(&mut rng).unwrap();
    let encryptor = Encryptor::new(Arc::clone(&context), public_key)
        .unwrap()
        .sampling(SamplingParams {
            error_std_dev: 2.0,
            hamming_weight: None,
        })
        .unwrap();
    let decryptor = Decryptor::new(Arc::clone(&context), keygen.secret_key().clone()).unwrap();

    let zero = encryptor.encrypt_zero(&context.first_parms_id(), &mut rng).unwrap();
    assert!(!zero.is_transparent());
    assert!(decryptor.decrypt(&zero).unwrap().is_zero());

    let bad = SamplingParams {
        error_std_dev: f64::NAN,
        hamming_weight: None,
    };
    let encryptor = Encryptor::new(
        Arc::clone(&context),
        keygen.create_public_key(&mut rng).unwrap(),
    )
    .unwrap();
    assert!(matches!(encryptor.sampling(bad), Err(HeError::InvalidArgument { .. })));
}
