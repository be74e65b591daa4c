use aes_gcm_siv::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256GcmSiv,
};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};

const NONCE_LENGTH: usize = 12;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Base64 decoding error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("Cipher secret invalid length: {0}")]
    CipherKeyInvalidLength(#[from] crypto_common::InvalidLength),
    #[error("Encryption failed")]
    Encrypt,
    #[cfg(test)]
    #[error("Decryption failed")]
    Decrypt,
}

/// Encrypts personal data at rest. Output is the nonce followed by the
/// ciphertext.
pub struct Cipher(Aes256GcmSiv);

impl Cipher {
    pub fn from_base64_encoded(secret: &str) -> Result<Self, Error> {
        let key = STANDARD_NO_PAD.decode(secret.as_bytes())?;
        Ok(Self(Aes256GcmSiv::new_from_slice(&key)?))
    }

    pub fn encrypt(&self, plain_text: &[u8]) -> Result<Vec<u8>, Error> {
        let nonce = Aes256GcmSiv::generate_nonce(&mut OsRng);
        let cipher_text = self
            .0
            .encrypt(&nonce, plain_text)
            .map_err(|_| Error::Encrypt)?;
        let mut sealed = Vec::with_capacity(NONCE_LENGTH + cipher_text.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&cipher_text);
        Ok(sealed)
    }

    #[cfg(test)]
    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, Error> {
        if sealed.len() < NONCE_LENGTH {
            return Err(Error::Decrypt);
        }
        let (nonce, cipher_text) = sealed.split_at(NONCE_LENGTH);
        self.0
            .decrypt(aes_gcm_siv::Nonce::from_slice(nonce), cipher_text)
            .map_err(|_| Error::Decrypt)
    }
}
