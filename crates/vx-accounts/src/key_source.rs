#[cfg(feature = "keyring-support")]
use zeroize::Zeroizing;

use crate::cipher::CredentialCipher;

#[cfg(feature = "keyring-support")]
const KEYRING_SERVICE: &str = "voxel-launcher";
#[cfg(feature = "keyring-support")]
const KEYRING_ENTRY: &str = "accounts:v1";

/// Passphrase used by store versions that predate keyring support.
///
/// SECURITY: a fixed passphrase is a known gap, kept only so files written
/// by those versions stay readable. It is seeded into the OS keyring on
/// first run; a future store version should rotate to a random key and
/// re-encrypt.
const LEGACY_PASSPHRASE: &str = "voxel-launcher-secure-key-2024";

/// Resolve the credential cipher for the current user.
///
/// The passphrase comes from the OS keyring (macOS Keychain, Windows
/// Credential Manager, Linux Secret Service). A missing entry is seeded;
/// only an unreachable keyring falls back to the legacy passphrase.
#[cfg(feature = "keyring-support")]
pub fn resolve_cipher() -> CredentialCipher {
    let passphrase = match load_from_keyring() {
        Ok(Some(passphrase)) => {
            tracing::debug!("Loaded store passphrase from OS keyring");
            passphrase
        }
        Ok(None) => {
            let passphrase = Zeroizing::new(LEGACY_PASSPHRASE.to_string());
            if let Err(e) = save_to_keyring(&passphrase) {
                tracing::warn!("Failed to seed store passphrase into keyring: {}", e);
            }
            passphrase
        }
        Err(e) => {
            tracing::warn!("Keyring unavailable ({}), using built-in passphrase", e);
            Zeroizing::new(LEGACY_PASSPHRASE.to_string())
        }
    };

    CredentialCipher::from_passphrase(&passphrase)
}

#[cfg(not(feature = "keyring-support"))]
pub fn resolve_cipher() -> CredentialCipher {
    CredentialCipher::from_passphrase(LEGACY_PASSPHRASE)
}

#[cfg(feature = "keyring-support")]
fn load_from_keyring() -> std::result::Result<Option<Zeroizing<String>>, keyring::Error> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ENTRY)?;
    match entry.get_password() {
        Ok(passphrase) => Ok(Some(Zeroizing::new(passphrase))),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(feature = "keyring-support")]
fn save_to_keyring(passphrase: &str) -> std::result::Result<(), keyring::Error> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ENTRY)?;
    entry.set_password(passphrase)
}
