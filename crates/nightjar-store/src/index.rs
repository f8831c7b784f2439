//! Per-vault encrypted index artifacts.
//!
//! Each vault key owns one artifact, `<fingerprint-hex>.idx`, holding the
//! sealed JSON index of its live files. The fingerprint is one-way, so the
//! filesystem reveals how many index artifacts exist but nothing about the
//! keys behind them. An artifact count says nothing about vault count
//! to an adversary who cannot enumerate gestures.
//!
//! `load_or_empty` is the deniability contract of the whole engine and must
//! never grow an error path: a missing artifact, a torn artifact, and an
//! artifact sealed under a different key all produce an empty index, doing
//! the same amount of cryptographic work in each case.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use nightjar_core::{VaultFingerprint, VaultResult};
use nightjar_crypto::{cipher, VaultKey};

const INDEX_EXT: &str = "idx";

/// Size of the decoy buffer decrypted when no artifact exists. Matches the
/// sealed size of a small index so both empty paths cost the same.
const DECOY_LEN: usize = 128;

/// One live file tracked by a vault index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: nightjar_core::FileId,
    /// Offset of the record in the container
    pub offset: u64,
    /// Encrypted record length in bytes
    pub length: u64,
    /// The file's header, sealed on its own (base64)
    pub sealed_header: String,
    /// Set while a secure delete is in flight; entries are dropped, not
    /// flagged, once the overwrite completes
    pub deleted: bool,
}

/// The decrypted index of one vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultIndex {
    pub version: u32,
    pub files: Vec<StoredFile>,
    /// Next-free-offset high-water mark as this vault last saw it
    pub cursor: u64,
    /// Declared container capacity at creation time
    pub capacity: u64,
}

impl VaultIndex {
    pub fn empty(capacity: u64) -> Self {
        Self {
            version: 1,
            files: Vec::new(),
            cursor: 0,
            capacity,
        }
    }

    pub fn sealed_header_bytes(file: &StoredFile) -> Option<Vec<u8>> {
        B64.decode(&file.sealed_header).ok()
    }

    pub fn encode_sealed_header(sealed: &[u8]) -> String {
        B64.encode(sealed)
    }
}

/// Manages index artifacts in the store directory.
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn artifact_path(&self, fingerprint: &VaultFingerprint) -> PathBuf {
        self.root
            .join(format!("{}.{INDEX_EXT}", fingerprint.to_hex()))
    }

    /// O(1) existence check, used to prevent two gestures colliding onto the
    /// same storage slot during creation or key rotation.
    pub fn exists(&self, fingerprint: &VaultFingerprint) -> bool {
        self.artifact_path(fingerprint).exists()
    }

    /// Load a vault's index, or an empty index if anything prevents that.
    ///
    /// SECURITY CONTRACT: this function has no error path. Authentication
    /// failure, a missing artifact, and a corrupt artifact are all reported
    /// as "this vault has zero files". When no artifact exists, a decoy
    /// buffer of fresh random bytes is decrypted instead, so the missing
    /// case does the same cryptographic work as the corrupt case.
    pub fn load_or_empty(&self, key: &VaultKey, capacity: u64) -> VaultIndex {
        let sealed = std::fs::read(self.artifact_path(&key.fingerprint())).unwrap_or_else(|_| {
            let mut decoy = vec![0u8; DECOY_LEN];
            rand::thread_rng().fill_bytes(&mut decoy);
            decoy
        });

        cipher::open(key, &sealed)
            .and_then(|plain| serde_json::from_slice(&plain).ok())
            .unwrap_or_else(|| VaultIndex::empty(capacity))
    }

    /// Seal and persist an index atomically (temp file, fsync, rename).
    pub fn persist(&self, key: &VaultKey, index: &VaultIndex) -> VaultResult<()> {
        let plain = serde_json::to_vec(index).map_err(anyhow::Error::from)?;
        let sealed = cipher::seal(key, &plain)?;
        atomic_write(&self.artifact_path(&key.fingerprint()), &sealed)
    }

    /// Remove a vault's artifact. Missing is fine.
    pub fn remove(&self, fingerprint: &VaultFingerprint) -> VaultResult<()> {
        match std::fs::remove_file(self.artifact_path(fingerprint)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// File names of every index artifact in the store directory.
    pub fn list_artifacts(&self) -> VaultResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(&format!(".{INDEX_EXT}")) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Write a file atomically: temp file in the same directory, fsync, rename.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> VaultResult<()> {
    use std::io::Write;

    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    let mut file = std::fs::File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
