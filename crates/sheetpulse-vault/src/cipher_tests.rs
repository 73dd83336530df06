use super::*;

fn vault() -> CredentialVault {
    CredentialVault::new("unit-test-salt-0123456789")
}

#[test]
fn test_round_trip() {
    let vault = vault();
    let plaintext = r#"{"access_token":"EAAB-secret","ad_account_id":"act_1"}"#;

    let blob = vault.encrypt(plaintext, "42").unwrap();
    let decrypted = vault.decrypt(&blob, "42").unwrap();

    assert_eq!(decrypted.expose(), plaintext);
}

#[test]
fn test_round_trip_various_payloads() {
    let vault = vault();
    let payloads = [
        "{}",
        "[]",
        r#""just a string""#,
        r#"{"nested":{"list":[1,2,{"k":"v"}]},"unicode":"é中"}"#,
        &format!(r#"{{"big":"{}"}}"#, "x".repeat(10_000)),
    ];

    for (i, payload) in payloads.iter().enumerate() {
        let tenant = format!("tenant-{}", i);
        let blob = vault.encrypt(payload, &tenant).unwrap();
        assert_eq!(vault.decrypt(&blob, &tenant).unwrap().expose(), *payload);
    }
}

#[test]
fn test_wrong_tenant_fails() {
    let vault = vault();
    let blob = vault.encrypt(r#"{"token":"t"}"#, "tenant-1").unwrap();

    let result = vault.decrypt(&blob, "tenant-2");
    assert!(matches!(result, Err(VaultError::Decryption(_))));
}

#[test]
fn test_wrong_salt_fails() {
    let blob = vault().encrypt(r#"{"token":"t"}"#, "42").unwrap();
    let rotated = CredentialVault::new("another-salt-9876543210");

    assert!(matches!(rotated.decrypt(&blob, "42"), Err(VaultError::Decryption(_))));
}

#[test]
fn test_tampered_ciphertext_fails() {
    let vault = vault();
    let blob = vault.encrypt(r#"{"token":"abcdef"}"#, "42").unwrap();

    let mut parsed: serde_json::Value = serde_json::from_str(&blob).unwrap();
    let mut ct = BASE64.decode(parsed["ciphertext"].as_str().unwrap()).unwrap();
    ct[0] ^= 0x01;
    parsed["ciphertext"] = serde_json::Value::String(BASE64.encode(ct));

    let result = vault.decrypt(&parsed.to_string(), "42");
    assert!(matches!(result, Err(VaultError::Decryption(_))));
}

#[test]
fn test_tampered_tag_fails() {
    let vault = vault();
    let blob = vault.encrypt(r#"{"token":"abcdef"}"#, "42").unwrap();

    let mut parsed: serde_json::Value = serde_json::from_str(&blob).unwrap();
    let mut tag = BASE64.decode(parsed["authTag"].as_str().unwrap()).unwrap();
    tag[15] ^= 0x80;
    parsed["authTag"] = serde_json::Value::String(BASE64.encode(tag));

    assert!(matches!(
        vault.decrypt(&parsed.to_string(), "42"),
        Err(VaultError::Decryption(_))
    ));
}

#[test]
fn test_malformed_blob_fails() {
    let vault = vault();
    for blob in ["", "not json", "{}", r#"{"v":1,"algorithm":"rot13","nonce":"","authTag":"","ciphertext":""}"#] {
        assert!(matches!(vault.decrypt(blob, "42"), Err(VaultError::Decryption(_))), "{}", blob);
    }
}

#[test]
fn test_fresh_nonce_per_call() {
    let vault = vault();
    let a = vault.encrypt(r#"{"k":"v"}"#, "42").unwrap();
    let b = vault.encrypt(r#"{"k":"v"}"#, "42").unwrap();
    assert_ne!(a, b);

    let a: serde_json::Value = serde_json::from_str(&a).unwrap();
    let b: serde_json::Value = serde_json::from_str(&b).unwrap();
    assert_ne!(a["nonce"], b["nonce"]);
}

#[test]
fn test_blob_shape_hides_plaintext() {
    let blob = vault().encrypt(r#"{"password":"hunter2"}"#, "42").unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&blob).unwrap();

    assert_eq!(parsed["algorithm"], ALGORITHM);
    assert_eq!(parsed["v"], 1);
    assert!(parsed["nonce"].is_string());
    assert!(parsed["authTag"].is_string());
    assert!(parsed["ciphertext"].is_string());
    assert!(!blob.contains("hunter2"));
}

#[test]
fn test_rejects_non_json_plaintext() {
    let result = vault().encrypt("token=abc", "42");
    assert!(matches!(result, Err(VaultError::InvalidPayload(_))));
}

#[test]
fn test_default_iterations() {
    assert_eq!(vault().iterations(), DEFAULT_ITERATIONS);
}

#[test]
fn test_derived_key_is_per_tenant_and_wipeable() {
    use zeroize::Zeroize;

    let vault = vault();
    let mut key = vault.derive_key("42");
    assert_eq!(*key, *vault.derive_key("42"));
    assert_ne!(*key, *vault.derive_key("43"));
    assert_ne!(*key, [0u8; 32]);

    key.zeroize();
    assert_eq!(*key, [0u8; 32]);
}
