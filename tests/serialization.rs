mod common;

use std::sync::Arc;

use common::{approximate_context, init_tracing, integer_context, rng};
use toy_rlwe::{
    BatchEncoder, Ciphertext, CkksEncoder, Context, Decryptor, EncryptionParameters, Encryptor,
    Evaluator, GaloisKeys, HeError, KeyGenerator, Plaintext, PublicKey, RelinKeys, SecretKey,
    SecurityLevel,
};

fn json_round_trip<T>(value: &T) -> T
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let json = serde_json::to_string(value).unwrap();
    serde_json::from_str(&json).unwrap()
}

#[test]
fn parameters_rebuild_the_same_chain() {
    init_tracing();
    let context = integer_context(16, &[30, 40, 50], 97);
    let parms = context.key_context_data().parms().clone();
    let restored: EncryptionParameters = json_round_trip(&parms);
    assert_eq!(restored, parms);
    assert_eq!(restored.parms_id(), context.key_parms_id());

    let rebuilt = Context::new(restored, SecurityLevel::None).unwrap();
    let original: Vec<_> = context.data_levels().map(|d| d.parms_id()).collect();
    let again: Vec<_> = rebuilt.data_levels().map(|d| d.parms_id()).collect();
    assert_eq!(original, again);
}

#[test]
fn integer_keys_and_ciphertexts_survive_json() {
    init_tracing();
    let context = integer_context(8, &[30, 60], 257);
    let mut rng = rng(1);
    let keygen = KeyGenerator::new(Arc::clone(&context), &mut rng).unwrap();

    let secret_key: SecretKey = json_round_trip(keygen.secret_key());
    let public_key: PublicKey = json_round_trip(&keygen.create_public_key(&mut rng).unwrap());
    let relin_keys: RelinKeys = json_round_trip(&keygen.create_relin_keys(&mut rng).unwrap());
    let galois_keys: GaloisKeys = json_round_trip(&keygen.create_galois_keys(&mut rng).unwrap());
    assert_eq!(&secret_key, keygen.secret_key());

    let encoder = BatchEncoder::new(Arc::clone(&context)).unwrap();
    let encryptor = Encryptor::new(Arc::clone(&context), public_key).unwrap();
    let decryptor = Decryptor::new(Arc::clone(&context), secret_key).unwrap();
    let evaluator = Evaluator::new(Arc::clone(&context));

    let plain: Plaintext = json_round_trip(&encoder.encode(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap());
    let encrypted = encryptor.encrypt(&plain, &mut rng).unwrap();
    let squared = evaluator.square(&encrypted).unwrap();
    let squared: Ciphertext = json_round_trip(&squared);
    assert_eq!(squared.size(), 3);

    let relinearized = evaluator.relinearize(&squared, &relin_keys).unwrap();
    let rotated = evaluator.rotate_rows(&relinearized, 1, &galois_keys).unwrap();
    let decoded = encoder.decode(&decryptor.decrypt(&rotated).unwrap()).unwrap();
    assert_eq!(decoded, [4, 9, 16, 1, 36, 49, 64, 25]);
}

#[test]
fn approximate_ciphertexts_keep_scale_and_level() {
    init_tracing();
    let context = approximate_context(16, &[50, 40, 50]);
    let mut rng = rng(2);
    let keygen = KeyGenerator::new(Arc::clone(&context), &mut rng).unwrap();
    let encoder = CkksEncoder::new(Arc::clone(&context)).unwrap();
    let encryptor =
        Encryptor::with_secret_key(Arc::clone(&context), keygen.secret_key().clone()).unwrap();
    let decryptor = Decryptor::new(Arc::clone(&context), keygen.secret_key().clone()).unwrap();

    let scale = 2f64.powi(30);
    let plain = encoder
        .encode_real(&[0.25, -1.5, 3.0], &context.first_parms_id(), scale)
        .unwrap();
    let encrypted = encryptor.encrypt(&plain, &mut rng).unwrap();
    let restored: Ciphertext = json_round_trip(&encrypted);
    assert_eq!(restored, encrypted);
    assert_eq!(restored.scale(), scale);
    assert_eq!(restored.parms_id(), context.first_parms_id());

    let decoded = encoder.decode_real(&decryptor.decrypt(&restored).unwrap()).unwrap();
    for (actual, expected) in decoded.iter().zip([0.25, -1.5, 3.0]) {
        approx::assert_abs_diff_eq!(*actual, expected, epsilon = 1e-5);
    }
}

#[test]
fn tampered_ciphertexts_are_rejected() {
    init_tracing();
    let context = integer_context(8, &[30, 60], 257);
    let mut rng = rng(3);
    let keygen = KeyGenerator::new(Arc::clone(&context), &mut rng).unwrap();
    let encoder = BatchEncoder::new(Arc::clone(&context)).unwrap();
    let encryptor =
        Encryptor::with_secret_key(Arc::clone(&context), keygen.secret_key().clone()).unwrap();
    let decryptor = Decryptor::new(Arc::clone(&context), keygen.secret_key().clone()).unwrap();
    let evaluator = Evaluator::new(Arc::clone(&context));
    let encrypted = encryptor
        .encrypt(&encoder.encode(&[1, 2, 3]).unwrap(), &mut rng)
        .unwrap();
    let json = serde_json::to_value(&encrypted).unwrap();

    // a zero degree never makes it past loading
    let mut zero_degree = json.clone();
    zero_degree["polys"][0]["degree"] = 0.into();
    assert!(serde_json::from_value::<Ciphertext>(zero_degree).is_err());

    let mut ragged = json.clone();
    ragged["polys"][1]["data"].as_array_mut().unwrap().pop();
    assert!(serde_json::from_value::<Ciphertext>(ragged).is_err());

    // well-shaped but unreduced residues load and are caught on use
    let mut unreduced = json;
    unreduced["polys"][0]["data"][0] = u64::MAX.into();
    let unreduced: Ciphertext = serde_json::from_value(unreduced).unwrap();
    assert!(matches!(
        evaluator.negate(&unreduced),
        Err(HeError::ArithmeticOverflow { .. })
    ));
    assert!(matches!(
        evaluator.add(&encrypted, &unreduced),
        Err(HeError::ArithmeticOverflow { .. })
    ));
    assert!(matches!(
        decryptor.decrypt(&unreduced),
        Err(HeError::ArithmeticOverflow { .. })
    ));
    assert!(matches!(
        decryptor.invariant_noise_budget(&unreduced),
        Err(HeError::ArithmeticOverflow { .. })
    ));
}
