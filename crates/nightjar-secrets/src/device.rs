//! Device-bound secret bootstrap.
//!
//! The device salt is why the same gesture derives different keys on
//! different devices: an attacker who copies the container cannot
//! brute-force gestures offline without also extracting this salt from the
//! platform credential store.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use nightjar_core::{VaultError, VaultResult};

use crate::keychain::{self, keys};

/// Fetch the per-install device salt, generating and persisting it on first
/// use. Never leaves the platform keychain in any other form.
pub fn get_or_create_device_salt() -> VaultResult<[u8; 32]> {
    get_or_create(keys::DEVICE_SALT)
}

/// Fetch the recovery database master key, generating it on first use.
/// Independent of every vault key by construction: 32 fresh CSPRNG bytes.
pub fn get_or_create_master_key() -> VaultResult<[u8; 32]> {
    get_or_create(keys::MASTER_KEY)
}

fn get_or_create(key_name: &str) -> VaultResult<[u8; 32]> {
    let existing = keychain::get_secret(key_name)
        .map_err(|e| VaultError::KeyStore(e.to_string()))?;

    if let Some(secret) = existing {
        return decode(key_name, secret.expose_secret());
    }

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);

    let mut encoded = B64.encode(bytes);
    let secret = SecretString::from(encoded.clone());
    encoded.zeroize();

    keychain::store_secret(key_name, &secret).map_err(|e| VaultError::KeyStore(e.to_string()))?;
    tracing::info!(key = key_name, "generated new device secret");
    Ok(bytes)
}

fn decode(key_name: &str, encoded: &str) -> VaultResult<[u8; 32]> {
    let mut decoded = B64
        .decode(encoded)
        .map_err(|e| VaultError::KeyStore(format!("corrupt '{key_name}' entry: {e}")))?;
    if decoded.len() != 32 {
        decoded.zeroize();
        return Err(VaultError::KeyStore(format!(
            "'{key_name}' entry has wrong length"
        )));
    }

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&decoded);
    decoded.zeroize();
    Ok(bytes)
}
