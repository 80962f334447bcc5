//! At-rest encryption seam.
//!
//! Snapshots and raw vectors can pass through a [`Vault`] before touching
//! storage. The index itself never encrypts; it only requires that
//! `decrypt(encrypt(x)) == x` for any implementation plugged in.

use thiserror::Error;

/// Failure modes of an encryption backend.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Key material is missing or malformed.
    #[error("vault key error: {0}")]
    Key(String),

    /// The ciphertext could not be decrypted (corrupt or wrong key).
    #[error("vault decryption failed: {0}")]
    Decrypt(String),

    /// Encryption failed.
    #[error("vault encryption failed: {0}")]
    Encrypt(String),
}

/// A reversible byte-buffer transform guarding data at rest.
pub trait Vault: Send + Sync {
    /// Encrypt `plaintext`.
    ///
    /// # Errors
    ///
    /// Any [`VaultError`] the backend reports.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError>;

    /// Decrypt `ciphertext`, inverting [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Any [`VaultError`] the backend reports.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, VaultError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test double: XOR with a repeating key, its own inverse.
    struct XorVault {
        key: Vec<u8>,
    }

    impl Vault for XorVault {
        fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
            if self.key.is_empty() {
                return Err(VaultError::Key("empty key".into()));
            }
            Ok(plaintext
                .iter()
                .zip(self.key.iter().cycle())
                .map(|(&b, &k)| b ^ k)
                .collect())
        }

        fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, VaultError> {
            self.encrypt(ciphertext)
        }
    }

    #[test]
    fn round_trip_restores_plaintext() {
        let vault = XorVault { key: vec![0xA5, 0x3C] };
        let plaintext = b"vector index snapshot";
        let ciphertext = vault.encrypt(plaintext).unwrap();
        assert_ne!(&ciphertext, plaintext);
        assert_eq!(vault.decrypt(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn empty_key_is_rejected() {
        let vault = XorVault { key: Vec::new() };
        assert!(matches!(vault.encrypt(b"x"), Err(VaultError::Key(_))));
    }
}
