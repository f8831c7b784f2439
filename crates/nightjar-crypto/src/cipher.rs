//! ChaCha20-Poly1305 seal/open with self-describing ciphertext
//!
//! Output format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! ```
//!
//! `open` returns `Option`, not `Result`: there is no error type for callers
//! to branch on, because "wrong key", "corrupted bytes", and "random bytes
//! that were never a ciphertext" must be indistinguishable at every boundary.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use crate::kdf::VaultKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Encrypt a buffer under a vault key. Fresh random 96-bit nonce per call,
/// embedded in the output so no side-channel state is needed to decrypt.
pub fn seal(key: &VaultKey, plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
    seal_with_aad(key, &[], plaintext)
}

/// Encrypt a buffer with additional authenticated data bound into the tag.
pub fn seal_with_aad(key: &VaultKey, aad: &[u8], plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| anyhow::anyhow!("encryption failed: {e}"))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt a buffer sealed by `seal`. `None` means the bytes did not
/// authenticate under this key, whatever the reason.
pub fn open(key: &VaultKey, sealed: &[u8]) -> Option<Vec<u8>> {
    open_with_aad(key, &[], sealed)
}

/// Decrypt a buffer sealed by `seal_with_aad`.
pub fn open_with_aad(key: &VaultKey, aad: &[u8], sealed: &[u8]) -> Option<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return None;
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .ok()
}

/// Size of a sealed buffer for a given plaintext length.
pub fn sealed_len(plaintext_len: usize) -> usize {
    NONCE_SIZE + plaintext_len + TAG_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;
    use proptest::prelude::*;
    use rand::RngCore;

    fn test_key(byte: u8) -> VaultKey {
        VaultKey::from_bytes([byte; KEY_SIZE])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key(1);
        let sealed = seal(&key, b"hidden contents").unwrap();
        let opened = open(&key, &sealed).unwrap();
        assert_eq!(opened, b"hidden contents");
    }

    #[test]
    fn test_seal_open_empty() {
        let key = test_key(1);
        let sealed = seal(&key, b"").unwrap();
        assert_eq!(open(&key, &sealed).unwrap(), b"");
    }

    #[test]
    fn test_wrong_key_is_none_not_error() {
        let sealed = seal(&test_key(1), b"secret").unwrap();
        assert!(open(&test_key(2), &sealed).is_none());
    }

    #[test]
    fn test_random_bytes_open_to_none() {
        // Decrypting a never-written region must produce the same result
        // type as decrypting with a wrong key.
        let mut junk = vec![0u8; 256];
        rand::thread_rng().fill_bytes(&mut junk);
        assert!(open(&test_key(1), &junk).is_none());
    }

    #[test]
    fn test_short_input_is_none() {
        assert!(open(&test_key(1), b"").is_none());
        assert!(open(&test_key(1), &[0u8; NONCE_SIZE + TAG_SIZE - 1]).is_none());
    }

    #[test]
    fn test_tampered_ciphertext_is_none() {
        let key = test_key(1);
        let mut sealed = seal(&key, b"payload").unwrap();
        sealed[NONCE_SIZE + 2] ^= 0xFF;
        assert!(open(&key, &sealed).is_none());
    }

    #[test]
    fn test_aad_mismatch_is_none() {
        let key = test_key(1);
        let sealed = seal_with_aad(&key, b"context-a", b"payload").unwrap();
        assert!(open_with_aad(&key, b"context-b", &sealed).is_none());
        assert!(open_with_aad(&key, b"context-a", &sealed).is_some());
    }

    #[test]
    fn test_sealed_len() {
        let key = test_key(1);
        let sealed = seal(&key, &[0u8; 1000]).unwrap();
        assert_eq!(sealed.len(), sealed_len(1000));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let key = test_key(7);
            let sealed = seal(&key, &data).unwrap();
            prop_assert_eq!(open(&key, &sealed).unwrap(), data);
        }

        #[test]
        fn prop_wrong_key_never_opens(data in proptest::collection::vec(any::<u8>(), 1..1024)) {
            let sealed = seal(&test_key(7), &data).unwrap();
            prop_assert!(open(&test_key(8), &sealed).is_none());
        }
    }
}
