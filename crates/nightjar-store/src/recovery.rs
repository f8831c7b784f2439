//! The recovery-phrase store.
//!
//! One sealed database artifact system-wide maps vault-key fingerprints to
//! {phrase, gesture, grid size, key copy}. The database is encrypted under
//! the keychain master key, never derivable from any vault key, and is a
//! single opaque blob: its size grows with vault count (an accepted,
//! unavoidable signal) but its structure never maps a gesture to a record
//! without the correct phrase.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use nightjar_core::{GestureInput, RecoveryError, VaultFingerprint};
use nightjar_crypto::{cipher, normalize_phrase, phrase, VaultKey};

use crate::index::atomic_write;

const DB_FILE: &str = "recovery.db";

// No Debug impl: records carry a vault key copy.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct RecoveryRecord {
    /// One-way fingerprint of the vault key
    fingerprint: [u8; 32],
    /// The recovery phrase, as entered or generated
    phrase: String,
    /// The original gesture, for restoring it after recovery
    gesture_cells: Vec<u16>,
    grid_size: u8,
    /// Copy of the vault key itself
    key: [u8; 32],
    /// Unix timestamp
    created_at: u64,
}

#[derive(Default, Serialize, Deserialize)]
struct RecoveryDatabase {
    version: u32,
    records: Vec<RecoveryRecord>,
}

pub struct RecoveryStore {
    path: PathBuf,
    master_key: VaultKey,
}

impl RecoveryStore {
    pub fn new(root: &Path, master_key: [u8; 32]) -> Self {
        Self {
            path: root.join(DB_FILE),
            master_key: VaultKey::from_bytes(master_key),
        }
    }

    /// Store (or replace) the recovery record for a vault.
    pub fn save(
        &self,
        phrase_text: &str,
        gesture: &GestureInput,
        key: &VaultKey,
    ) -> Result<(), RecoveryError> {
        let fingerprint = key.fingerprint();
        let mut db = self.load_db()?;

        db.records
            .retain(|r| VaultFingerprint::from_bytes(r.fingerprint) != fingerprint);
        db.records.push(RecoveryRecord {
            fingerprint: *fingerprint.as_bytes(),
            phrase: phrase_text.to_string(),
            gesture_cells: gesture.cells.clone(),
            grid_size: gesture.grid_size,
            key: *key.as_bytes(),
            created_at: now(),
        });

        self.persist_db(&db)
    }

    /// Look up the phrase for a vault. Absent is `None`, not an error.
    pub fn load(&self, key: &VaultKey) -> Result<Option<String>, RecoveryError> {
        let fingerprint = key.fingerprint();
        let db = self.load_db()?;
        Ok(db
            .records
            .iter()
            .find(|r| VaultFingerprint::from_bytes(r.fingerprint) == fingerprint)
            .map(|r| r.phrase.clone()))
    }

    /// Recover a vault key from its phrase. Matching is case-insensitive
    /// and whitespace-normalized; every record is compared before answering.
    pub fn recover(&self, phrase_text: &str) -> Result<VaultKey, RecoveryError> {
        let wanted = normalize_phrase(phrase_text);
        let db = self.load_db()?;

        let mut found: Option<[u8; 32]> = None;
        for record in &db.records {
            if normalize_phrase(&record.phrase) == wanted {
                found = Some(record.key);
            }
        }

        found
            .map(VaultKey::from_bytes)
            .ok_or(RecoveryError::InvalidPhrase)
    }

    /// Replace a vault's phrase. A custom phrase must pass strength
    /// validation; otherwise a fresh one is generated from the wordlist.
    /// The old phrase is overwritten, not superseded.
    pub fn regenerate(
        &self,
        key: &VaultKey,
        custom_phrase: Option<&str>,
    ) -> Result<String, RecoveryError> {
        let new_phrase = match custom_phrase {
            Some(candidate) => {
                phrase::validate_phrase(candidate)?;
                candidate.to_string()
            }
            None => phrase::generate_phrase(phrase::GENERATED_WORD_COUNT),
        };

        let fingerprint = key.fingerprint();
        let mut db = self.load_db()?;
        let record = db
            .records
            .iter_mut()
            .find(|r| VaultFingerprint::from_bytes(r.fingerprint) == fingerprint)
            .ok_or(RecoveryError::VaultNotFound)?;

        record.phrase = new_phrase.clone();
        record.created_at = now();
        self.persist_db(&db)?;
        Ok(new_phrase)
    }

    /// Remove a vault's record. The database persists unchanged otherwise.
    pub fn delete(&self, key: &VaultKey) -> Result<(), RecoveryError> {
        let fingerprint = key.fingerprint();
        let mut db = self.load_db()?;
        db.records
            .retain(|r| VaultFingerprint::from_bytes(r.fingerprint) != fingerprint);
        self.persist_db(&db)
    }

    fn load_db(&self) -> Result<RecoveryDatabase, RecoveryError> {
        let sealed = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RecoveryDatabase {
                    version: 1,
                    records: Vec::new(),
                })
            }
            Err(e) => return Err(RecoveryError::EncryptionFailed(e.to_string())),
        };

        // The master key is not attacker-supplied, so a database that does
        // not authenticate is corruption, not a deniability boundary.
        let plain = cipher::open(&self.master_key, &sealed).ok_or_else(|| {
            RecoveryError::EncryptionFailed("recovery database did not authenticate".into())
        })?;

        serde_json::from_slice(&plain)
            .map_err(|e| RecoveryError::EncryptionFailed(format!("recovery database: {e}")))
    }

    fn persist_db(&self, db: &RecoveryDatabase) -> Result<(), RecoveryError> {
        let plain = serde_json::to_vec(db)
            .map_err(|e| RecoveryError::EncryptionFailed(e.to_string()))?;
        let sealed = cipher::seal(&self.master_key, &plain)
            .map_err(|e| RecoveryError::EncryptionFailed(e.to_string()))?;
        atomic_write(&self.path, &sealed).map_err(|e| RecoveryError::EncryptionFailed(e.to_string()))
    }
}

fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightjar_crypto::KEY_SIZE;

    const MASTER: [u8; 32] = [0xDD; 32];

    fn test_key(byte: u8) -> VaultKey {
        VaultKey::from_bytes([byte; KEY_SIZE])
    }

    fn gesture() -> GestureInput {
        GestureInput {
            cells: vec![0, 6, 12, 18, 24, 19],
            grid_size: 5,
        }
    }

    fn store() -> (tempfile::TempDir, RecoveryStore) {
        let dir = tempfile::tempdir().unwrap();
        let s = RecoveryStore::new(dir.path(), MASTER);
        (dir, s)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (_dir, s) = store();
        let key = test_key(1);

        s.save("orbit lumber quiet vessel amber tonight", &gesture(), &key)
            .unwrap();
        assert_eq!(
            s.load(&key).unwrap().unwrap(),
            "orbit lumber quiet vessel amber tonight"
        );
    }

    #[test]
    fn test_load_absent_is_none() {
        let (_dir, s) = store();
        assert!(s.load(&test_key(9)).unwrap().is_none());
    }

    #[test]
    fn test_recover_normalizes() {
        let (_dir, s) = store();
        let key = test_key(1);
        s.save("Orbit Lumber  Quiet Vessel Amber Tonight", &gesture(), &key)
            .unwrap();

        let recovered = s
            .recover("  orbit lumber quiet vessel amber tonight ")
            .unwrap();
        assert_eq!(recovered.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_recover_unknown_phrase() {
        let (_dir, s) = store();
        s.save("orbit lumber quiet vessel amber tonight", &gesture(), &test_key(1))
            .unwrap();
        assert!(matches!(
            s.recover("entirely different words in this phrase"),
            Err(RecoveryError::InvalidPhrase)
        ));
    }

    #[test]
    fn test_save_replaces_by_fingerprint() {
        let (_dir, s) = store();
        let key = test_key(1);

        s.save("first phrase variant with enough words", &gesture(), &key)
            .unwrap();
        s.save("second phrase variant with enough words", &gesture(), &key)
            .unwrap();

        assert_eq!(
            s.load(&key).unwrap().unwrap(),
            "second phrase variant with enough words"
        );
        // Old phrase no longer recovers anything
        assert!(s.recover("first phrase variant with enough words").is_err());
    }

    #[test]
    fn test_regenerate_rejects_weak_custom_phrase() {
        let (_dir, s) = store();
        let key = test_key(1);
        s.save("orbit lumber quiet vessel amber tonight", &gesture(), &key)
            .unwrap();

        assert!(matches!(
            s.regenerate(&key, Some("cat")),
            Err(RecoveryError::WeakPhrase(_))
        ));
        // Original phrase untouched after rejection
        assert_eq!(
            s.load(&key).unwrap().unwrap(),
            "orbit lumber quiet vessel amber tonight"
        );
    }

    #[test]
    fn test_regenerate_accepts_strong_custom_phrase() {
        let (_dir, s) = store();
        let key = test_key(1);
        s.save("orbit lumber quiet vessel amber tonight", &gesture(), &key)
            .unwrap();

        let custom = "seven distinct uncommon words chosen randomly now";
        let phrase = s.regenerate(&key, Some(custom)).unwrap();
        assert_eq!(phrase, custom);

        let recovered = s.recover(custom).unwrap();
        assert_eq!(recovered.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_regenerate_generates_when_no_custom() {
        let (_dir, s) = store();
        let key = test_key(1);
        s.save("orbit lumber quiet vessel amber tonight", &gesture(), &key)
            .unwrap();

        let generated = s.regenerate(&key, None).unwrap();
        assert_ne!(generated, "orbit lumber quiet vessel amber tonight");

        let recovered = s.recover(&generated).unwrap();
        assert_eq!(recovered.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_regenerate_unknown_vault() {
        let (_dir, s) = store();
        assert!(matches!(
            s.regenerate(&test_key(9), None),
            Err(RecoveryError::VaultNotFound)
        ));
    }

    #[test]
    fn test_delete_removes_one_record() {
        let (_dir, s) = store();
        let (k1, k2) = (test_key(1), test_key(2));

        s.save("orbit lumber quiet vessel amber tonight", &gesture(), &k1)
            .unwrap();
        s.save("velvet canyon rubber immense spatial brick", &gesture(), &k2)
            .unwrap();

        s.delete(&k1).unwrap();
        assert!(s.load(&k1).unwrap().is_none());
        assert_eq!(
            s.load(&k2).unwrap().unwrap(),
            "velvet canyon rubber immense spatial brick"
        );
        // Deleting again is fine
        s.delete(&k1).unwrap();
    }

    #[test]
    fn test_database_is_opaque_on_disk() {
        let (dir, s) = store();
        s.save("orbit lumber quiet vessel amber tonight", &gesture(), &test_key(1))
            .unwrap();

        let raw = std::fs::read(dir.path().join(DB_FILE)).unwrap();
        let rendered = String::from_utf8_lossy(&raw);
        assert!(!rendered.contains("orbit"));
        assert!(!rendered.contains("phrase"));
    }

    #[test]
    fn test_wrong_master_key_is_error_not_empty() {
        let (dir, s) = store();
        s.save("orbit lumber quiet vessel amber tonight", &gesture(), &test_key(1))
            .unwrap();

        let other = RecoveryStore::new(dir.path(), [0x11; 32]);
        assert!(matches!(
            other.load(&test_key(1)),
            Err(RecoveryError::EncryptionFailed(_))
        ));
    }
}
