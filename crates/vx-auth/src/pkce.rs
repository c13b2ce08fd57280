use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// PKCE verifier/challenge pair for one authorization attempt (RFC 7636,
/// S256 only).
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Secret kept client-side and sent with the token exchange
    pub verifier: String,
    /// base64url(SHA-256(verifier)), embedded in the authorize URL
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a fresh pair: 32 bytes from the OS CSPRNG, base64url
    /// encoded without padding (43 characters).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));

        Self {
            verifier,
            challenge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_is_43_chars_and_challenge_is_its_digest() {
        let pkce = PkceChallenge::generate();

        assert_eq!(pkce.verifier.len(), 43);
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pkce.verifier.as_bytes()));
        assert_eq!(pkce.challenge, expected);
        assert_ne!(pkce.verifier, pkce.challenge);
    }

    #[test]
    fn each_call_rerandomizes() {
        let a = PkceChallenge::generate();
        let b = PkceChallenge::generate();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
    }

    #[test]
    fn verifier_uses_only_url_safe_characters() {
        for _ in 0..50 {
            let pkce = PkceChallenge::generate();
            assert!(
                pkce.verifier
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
        }
    }
}
