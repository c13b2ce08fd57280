use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::ZeroizeOnDrop;

use crate::errors::{Result, StoreError};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_LEN: usize = 16;

/// Encrypts and decrypts credential fields for storage at rest.
///
/// Output format is `"<ivHex>:<cipherHex>"` — AES-256-CBC with a random
/// 16-byte IV per call and a key derived as SHA-256 of a passphrase. The
/// format matches what earlier store versions wrote, so existing files stay
/// readable.
#[derive(Clone, ZeroizeOnDrop)]
pub struct CredentialCipher {
    key: [u8; 32],
}

impl CredentialCipher {
    /// Derive the cipher key from a passphrase via a one-way hash.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(passphrase.as_bytes()).into();
        Self { key }
    }

    /// Encrypt a credential for storage.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut iv = [0u8; IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let enc = Aes256CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|e| StoreError::Encrypt(e.to_string()))?;
        let ciphertext = enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
    }

    /// Decrypt a stored credential.
    ///
    /// Returns `None` for anything that cannot be recovered — missing
    /// delimiter, bad hex, truncated ciphertext, wrong key, tampering.
    /// `None` means "secret unrecoverable", not "empty string".
    pub fn decrypt(&self, stored: &str) -> Option<String> {
        let (iv_hex, cipher_hex) = stored.split_once(':')?;

        let iv = hex::decode(iv_hex).ok()?;
        if iv.len() != IV_LEN {
            return None;
        }
        let ciphertext = hex::decode(cipher_hex).ok()?;

        let dec = Aes256CbcDec::new_from_slices(&self.key, &iv).ok()?;
        let plaintext = dec.decrypt_padded_vec_mut::<Pkcs7>(&ciphertext).ok()?;

        String::from_utf8(plaintext).ok()
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialCipher([REDACTED])")
    }
}
