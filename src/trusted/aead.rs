//! Software AEAD module
//!
//! AES-GCM through `ring`. The key length picks the cipher:
//! - 16 bytes: AES-128-GCM
//! - 32 bytes: AES-256-GCM
//!
//! ## Ciphertext Format
//! ```text
//! ┌────────────┬──────────────────────┬────────────┐
//! │ Nonce (12) │      Ciphertext      │  Tag (16)  │
//! └────────────┴──────────────────────┴────────────┘
//! ```

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::buffer::SecretBuffer;
use crate::error::{KeywardError, Result};

use super::{Operation, TrustedModule};

/// AES-GCM transform backed by the system RNG
pub struct AeadModule {
    rng: SystemRandom,
}

impl AeadModule {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    fn cipher_key(key: &SecretBuffer) -> Result<LessSafeKey> {
        let algorithm = match key.len() {
            16 => &aead::AES_128_GCM,
            32 => &aead::AES_256_GCM,
            n => {
                return Err(KeywardError::Transform(format!(
                    "unsupported key length: {} bytes",
                    n
                )))
            }
        };

        let unbound = UnboundKey::new(algorithm, key.as_bytes())
            .map_err(|_| KeywardError::Transform("invalid key".into()))?;
        Ok(LessSafeKey::new(unbound))
    }

    fn encrypt(&self, key: &SecretBuffer, plaintext: &[u8]) -> Result<SecretBuffer> {
        let cipher = Self::cipher_key(key)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| KeywardError::Transform("nonce generation failed".into()))?;

        let mut in_out = Zeroizing::new(plaintext.to_vec());
        cipher
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut *in_out,
            )
            .map_err(|_| KeywardError::Transform("seal failed".into()))?;

        let mut output = Vec::with_capacity(NONCE_LEN + in_out.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&in_out);
        Ok(SecretBuffer::new(output))
    }

    fn decrypt(&self, key: &SecretBuffer, ciphertext: &[u8]) -> Result<SecretBuffer> {
        let cipher = Self::cipher_key(key)?;

        let min_len = NONCE_LEN + cipher.algorithm().tag_len();
        if ciphertext.len() < min_len {
            return Err(KeywardError::Transform(format!(
                "ciphertext too short: {} bytes (min {})",
                ciphertext.len(),
                min_len
            )));
        }

        let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| KeywardError::Transform("invalid nonce".into()))?;

        // Erased on drop whether or not authentication succeeds
        let mut buffer = Zeroizing::new(sealed.to_vec());
        let plaintext = cipher
            .open_in_place(nonce, Aad::empty(), &mut buffer[..])
            .map_err(|_| KeywardError::Transform("authentication failed".into()))?;

        Ok(SecretBuffer::from_slice(plaintext))
    }
}

impl Default for AeadModule {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustedModule for AeadModule {
    fn transform(
        &mut self,
        op: Operation,
        key: &SecretBuffer,
        payload: &[u8],
    ) -> Result<SecretBuffer> {
        match op {
            Operation::Encrypt => self.encrypt(key, payload),
            Operation::Decrypt => self.decrypt(key, payload),
        }
    }
}
