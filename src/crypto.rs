use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;

const HKDF_SALT: &[u8] = b"formrelay-v1";
const HKDF_INFO: &[u8] = b"credential-key";
const NONCE_LEN: usize = 12;

fn derive_key(key: &str) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), key.as_bytes());
    let mut okm = [0u8; 32];
    hk.expand(HKDF_INFO, &mut okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}

/// Encrypt a stored token with AES-256-GCM. The random nonce is prepended to
/// the ciphertext.
pub fn encrypt(plaintext: &str, key: &str) -> Result<Vec<u8>, String> {
    let cipher = Aes256Gcm::new_from_slice(&derive_key(key))
        .map_err(|e| format!("Invalid key: {e}"))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| format!("Encryption failed: {e}"))?;

    let mut out = nonce.to_vec();
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt data produced by [`encrypt`].
pub fn decrypt(data: &[u8], key: &str) -> Result<String, String> {
    if data.len() < NONCE_LEN {
        return Err("Ciphertext too short".to_string());
    }

    let cipher = Aes256Gcm::new_from_slice(&derive_key(key))
        .map_err(|e| format!("Invalid key: {e}"))?;

    let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
    let plaintext = cipher
        .decrypt(nonce, &data[NONCE_LEN..])
        .map_err(|e| format!("Decryption failed: {e}"))?;

    String::from_utf8(plaintext).map_err(|e| format!("Invalid UTF-8: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = "test-encryption-key";
        let ct = encrypt("ya29.some-access-token", key).unwrap();
        assert_eq!(decrypt(&ct, key).unwrap(), "ya29.some-access-token");
    }

    #[test]
    fn wrong_key_fails() {
        let ct = encrypt("secret", "key-a").unwrap();
        assert!(decrypt(&ct, "key-b").is_err());
    }

    #[test]
    fn truncated_ciphertext_fails() {
        assert!(decrypt(&[0u8; 4], "key").is_err());
    }
}
