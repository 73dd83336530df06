//! Decrypted credential wrapper.

use std::fmt;

/// Plaintext credential JSON, alive only for the duration of one operation.
///
/// `Debug` and `Display` never print the contents.
pub struct DecryptedCredential(String);

impl DecryptedCredential {
    pub fn new(plaintext: String) -> Self {
        Self(plaintext)
    }

    /// Borrow the plaintext JSON.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Parse the plaintext as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.0)
    }
}

impl fmt::Debug for DecryptedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DecryptedCredential([REDACTED])")
    }
}

impl fmt::Display for DecryptedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = DecryptedCredential::new(r#"{"access_token":"abc123"}"#.to_string());
        assert!(!format!("{:?}", secret).contains("abc123"));
        assert!(!secret.to_string().contains("abc123"));
        assert_eq!(secret.json().unwrap()["access_token"], "abc123");
    }
}
