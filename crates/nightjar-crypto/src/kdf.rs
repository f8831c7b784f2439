//! Key derivation: canonical gesture bytes or phrase → 256-bit vault key
//!
//! All three derivation paths use PBKDF2-HMAC-SHA512. Gesture and recovery
//! keys mix in the device salt from the platform keychain, so an attacker who
//! extracts the container cannot brute-force gestures offline on other
//! hardware. Share keys deliberately use a fixed public salt so the same
//! phrase derives the same key on any device; their security rests entirely
//! on phrase entropy.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use zeroize::Zeroize;

use nightjar_core::{VaultError, VaultFingerprint, VaultResult};

use crate::KEY_SIZE;

/// Fixed public salt for cross-device share keys. Changing this constant
/// invalidates every share phrase ever issued.
const SHARE_SALT: &[u8] = b"nightjar-share-key-v1";

/// BLAKE3 derivation context for vault fingerprints.
const FINGERPRINT_CONTEXT: &str = "nightjar v1 vault fingerprint";

/// A 256-bit vault key. The key *is* the vault's identity: two different
/// keys address two different vaults by construction.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct VaultKey {
    bytes: [u8; KEY_SIZE],
}

impl VaultKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// One-way fingerprint used to name index artifacts and key the duress
    /// flag. Keyed BLAKE3 derivation: irreversible, domain-separated.
    pub fn fingerprint(&self) -> VaultFingerprint {
        VaultFingerprint::from_bytes(blake3::derive_key(FINGERPRINT_CONTEXT, &self.bytes))
    }
}

impl Drop for VaultKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive a vault key from canonical gesture bytes and the device salt.
///
/// Deterministic: the same gesture and salt always yield the same key,
/// across process restarts. The iteration count comes from `KdfConfig`
/// (default 600,000); tests pass a small count.
pub fn derive_vault_key(
    canonical_gesture: &[u8],
    device_salt: &[u8; 32],
    iterations: u32,
) -> VaultResult<VaultKey> {
    if canonical_gesture.is_empty() {
        return Err(VaultError::InvalidInput("empty gesture".into()));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha512>(canonical_gesture, device_salt, iterations, &mut key);
    Ok(VaultKey::from_bytes(key))
}

/// Derive a vault key from a recovery phrase and the device salt.
///
/// The phrase is normalized first, so re-derivation is deterministic
/// regardless of input casing or whitespace. Default iteration count is
/// 800,000; typing a phrase tolerates a slower KDF than drawing a gesture.
pub fn derive_recovery_key(
    phrase: &str,
    device_salt: &[u8; 32],
    iterations: u32,
) -> VaultResult<VaultKey> {
    let normalized = normalize_phrase(phrase);
    if normalized.is_empty() {
        return Err(VaultError::InvalidInput("empty phrase".into()));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha512>(normalized.as_bytes(), device_salt, iterations, &mut key);
    Ok(VaultKey::from_bytes(key))
}

/// Derive a share key from a phrase alone.
///
/// Not device-bound: a share key must derive identically on any device, so
/// the salt is a fixed public constant. Target phrase entropy is 80 bits or
/// better; see `phrase::validate_phrase`.
pub fn derive_share_key(phrase: &str, iterations: u32) -> VaultResult<VaultKey> {
    let normalized = normalize_phrase(phrase);
    if normalized.is_empty() {
        return Err(VaultError::InvalidInput("empty phrase".into()));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha512>(normalized.as_bytes(), SHARE_SALT, iterations, &mut key);
    Ok(VaultKey::from_bytes(key))
}

/// Derive a unique per-recipient sync key from a vault key and a share id.
///
/// Keyed BLAKE3 over the share id: the owner can re-derive any recipient's
/// key on demand without persisting the original share phrase.
pub fn derive_recipient_key(vault_key: &VaultKey, share_id: &str) -> [u8; KEY_SIZE] {
    *blake3::keyed_hash(vault_key.as_bytes(), share_id.as_bytes()).as_bytes()
}

/// Normalize a phrase for derivation and lookup: lowercase, trim, collapse
/// internal whitespace to single spaces.
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fast rounds for tests; production counts live in KdfConfig.
    const TEST_ITERS: u32 = 10;

    #[test]
    fn test_derivation_deterministic() {
        let salt = [1u8; 32];
        let k1 = derive_vault_key(b"gesture-bytes", &salt, TEST_ITERS).unwrap();
        let k2 = derive_vault_key(b"gesture-bytes", &salt, TEST_ITERS).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes(), "KDF must be deterministic");
    }

    #[test]
    fn test_different_gestures_different_keys() {
        let salt = [1u8; 32];
        let k1 = derive_vault_key(b"gesture-a", &salt, TEST_ITERS).unwrap();
        let k2 = derive_vault_key(b"gesture-b", &salt, TEST_ITERS).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_device_binding() {
        let k1 = derive_vault_key(b"same-gesture", &[1u8; 32], TEST_ITERS).unwrap();
        let k2 = derive_vault_key(b"same-gesture", &[2u8; 32], TEST_ITERS).unwrap();
        assert_ne!(
            k1.as_bytes(),
            k2.as_bytes(),
            "different device salts must produce different keys"
        );
    }

    #[test]
    fn test_empty_gesture_rejected() {
        let result = derive_vault_key(b"", &[1u8; 32], TEST_ITERS);
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
    }

    #[test]
    fn test_recovery_key_normalization() {
        let salt = [3u8; 32];
        let k1 = derive_recovery_key("Correct Horse  Battery", &salt, TEST_ITERS).unwrap();
        let k2 = derive_recovery_key("  correct horse battery ", &salt, TEST_ITERS).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_share_key_not_device_bound() {
        // Same phrase, no salt input: must derive identically anywhere.
        let k1 = derive_share_key("orbit lumber quiet vessel", TEST_ITERS).unwrap();
        let k2 = derive_share_key("Orbit  Lumber Quiet Vessel", TEST_ITERS).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_share_key_differs_from_recovery_key() {
        let salt = [0u8; 32];
        let share = derive_share_key("same phrase here please", TEST_ITERS).unwrap();
        let recovery = derive_recovery_key("same phrase here please", &salt, TEST_ITERS).unwrap();
        assert_ne!(share.as_bytes(), recovery.as_bytes());
    }

    #[test]
    fn test_recipient_keys_distinct_per_share() {
        let vault = VaultKey::from_bytes([9u8; KEY_SIZE]);
        let a = derive_recipient_key(&vault, "share-aaaa");
        let b = derive_recipient_key(&vault, "share-bbbb");
        assert_ne!(a, b);
        // Re-derivable on demand
        assert_eq!(a, derive_recipient_key(&vault, "share-aaaa"));
    }

    #[test]
    fn test_fingerprint_one_way_and_stable() {
        let key = VaultKey::from_bytes([5u8; KEY_SIZE]);
        let fp1 = key.fingerprint();
        let fp2 = key.fingerprint();
        assert_eq!(fp1, fp2);
        assert_ne!(fp1.as_bytes(), key.as_bytes(), "fingerprint must not expose the key");
    }

    #[test]
    fn test_normalize_phrase() {
        assert_eq!(normalize_phrase("  A  b\tC  "), "a b c");
        assert_eq!(normalize_phrase(""), "");
        assert_eq!(normalize_phrase("   "), "");
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = VaultKey::from_bytes([0xAA; KEY_SIZE]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("170")); // 0xAA
    }
}
