//! nightjar-crypto: gesture encoding, key derivation, and authenticated encryption
//!
//! Key hierarchy:
//! ```text
//! Gesture (ordered cell indices + grid size)
//!   └── canonical bytes ── PBKDF2-HMAC-SHA512 (600k rounds, device salt) ──> VaultKey
//! Recovery phrase ──────── PBKDF2-HMAC-SHA512 (800k rounds, device salt) ──> VaultKey
//! Share phrase ──────────── PBKDF2-HMAC-SHA512 (800k rounds, public salt) ──> VaultKey
//! VaultKey
//!   ├── fingerprint: keyed BLAKE3 derivation (names index artifacts, duress flag)
//!   ├── index/file AEAD: ChaCha20-Poly1305 (96-bit random nonce, 128-bit tag)
//!   └── per-recipient sync key: BLAKE3 keyed by VaultKey over the share id
//! ```
//!
//! The device salt lives only in the platform keychain (`nightjar-secrets`),
//! which is why the same gesture derives different keys on different devices.

pub mod cipher;
pub mod file;
pub mod gesture;
pub mod kdf;
pub mod phrase;

pub use cipher::{open, seal};
pub use file::{decrypt_file, decrypt_header, encrypt_file, EncryptedFile, FileHeader, FileMeta};
pub use gesture::{analyze, canonicalize, classify_weak, GestureMetrics};
pub use kdf::{
    derive_recipient_key, derive_recovery_key, derive_share_key, derive_vault_key,
    normalize_phrase, VaultKey,
};
pub use phrase::{estimate_entropy_bits, generate_phrase, validate_phrase, PhraseStrength};

/// Size of a vault key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a ChaCha20-Poly1305 nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;
