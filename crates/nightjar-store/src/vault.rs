//! The vault engine: file operations over the container, keyed by VaultKey.
//!
//! Placement is append-only. A container-wide high-water mark (`alloc.cur`)
//! hands out offsets; space freed by deletion is scrambled and never reused,
//! so deletion patterns cannot be read back out of offset reuse. The mark
//! reveals aggregate bytes consumed, nothing per-vault.
//!
//! Concurrency: one writer per vault, enforced with a per-fingerprint mutex;
//! the allocation mark has its own short-lived lock.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;

use nightjar_core::{EngineConfig, FileId, GestureInput, VaultError, VaultFingerprint, VaultResult};
use nightjar_crypto::{
    decrypt_file, decrypt_header, encrypt_file, gesture, kdf, FileMeta, VaultKey,
};

use crate::container::Container;
use crate::duress::{self, DuressController};
use crate::index::{atomic_write, IndexStore, StoredFile, VaultIndex};

const ALLOC_FILE: &str = "alloc.cur";

/// Result of a successful unlock attempt. "Successful" includes a wrong
/// gesture: the caller receives a vault with zero files, not an error.
pub struct UnlockedVault {
    pub key: VaultKey,
    pub files: Vec<FileMeta>,
}

pub struct VaultStore {
    pub(crate) container: Container,
    pub(crate) indexes: IndexStore,
    root: PathBuf,
    config: EngineConfig,
    alloc_lock: Mutex<()>,
    vault_locks: Mutex<HashMap<VaultFingerprint, Arc<Mutex<()>>>>,
}

impl VaultStore {
    /// Create the store directory and the container. One-time per install.
    pub fn create(config: &EngineConfig) -> VaultResult<Self> {
        let root = config.container.root.clone();
        std::fs::create_dir_all(&root)?;
        let container = Container::create(&root, config.container.capacity_bytes)?;

        Ok(Self {
            indexes: IndexStore::new(&root),
            container,
            root,
            config: config.clone(),
            alloc_lock: Mutex::new(()),
            vault_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Open an existing store. Replays a pending duress wipe first, so a
    /// crash mid-wipe can never leave a half-destroyed vault observable.
    pub fn open(config: &EngineConfig) -> VaultResult<Self> {
        let root = config.container.root.clone();
        let container = Container::open(&root, config.container.capacity_bytes)?;
        let indexes = IndexStore::new(&root);

        duress::resume_pending_wipe(&root, &container)?;

        Ok(Self {
            indexes,
            container,
            root,
            config: config.clone(),
            alloc_lock: Mutex::new(()),
            vault_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// O(1) existence check for the vault behind a key.
    pub fn vault_exists(&self, key: &VaultKey) -> bool {
        self.indexes.exists(&key.fingerprint())
    }

    /// Create an empty vault under `key`. Fails with `KeyCollision` if a
    /// vault already exists there; the caller should prompt for a
    /// different gesture rather than silently merging two vaults.
    pub fn create_vault(&self, key: &VaultKey) -> VaultResult<()> {
        let lock = self.vault_lock(&key.fingerprint());
        let _guard = hold(&lock);

        if self.vault_exists(key) {
            return Err(VaultError::KeyCollision);
        }
        self.indexes
            .persist(key, &VaultIndex::empty(self.container.capacity()))
    }

    /// Unlock with a raw key, applying the uniform latency envelope.
    pub fn unlock(&self, key: VaultKey, duress: &DuressController) -> VaultResult<UnlockedVault> {
        self.unlock_from(Instant::now(), key, duress)
    }

    /// Unlock with a gesture: canonicalize, derive, then unlock. The whole
    /// path, derivation included, sits inside the latency envelope.
    pub fn unlock_with_gesture(
        &self,
        gesture_input: &GestureInput,
        device_salt: &[u8; 32],
        duress: &DuressController,
    ) -> VaultResult<UnlockedVault> {
        let started = Instant::now();
        let canonical = gesture::canonicalize(&gesture_input.cells, gesture_input.grid_size)?;
        let key = kdf::derive_vault_key(
            &canonical,
            device_salt,
            self.config.kdf.gesture_iterations,
        )?;
        self.unlock_from(started, key, duress)
    }

    fn unlock_from(
        &self,
        started: Instant,
        key: VaultKey,
        duress: &DuressController,
    ) -> VaultResult<UnlockedVault> {
        if duress.matches(&key) {
            duress.execute_wipe(self, &key)?;
        }

        let files = self.list_files(&key);
        self.pad_unlock_latency(started);
        Ok(UnlockedVault { key, files })
    }

    /// Pad total elapsed time to floor + U(0, jitter). Correct key, wrong
    /// key, and duress key all leave through this same wait.
    fn pad_unlock_latency(&self, started: Instant) {
        let jitter = if self.config.unlock.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.config.unlock.jitter_ms)
        };
        let target = Duration::from_millis(self.config.unlock.floor_ms + jitter);
        if let Some(remaining) = target.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    /// Import a file into the vault behind `key`.
    pub fn store_file(
        &self,
        key: &VaultKey,
        name: &str,
        mime: &str,
        data: &[u8],
    ) -> VaultResult<FileMeta> {
        let lock = self.vault_lock(&key.fingerprint());
        let _guard = hold(&lock);

        let mut index = self
            .indexes
            .load_or_empty(key, self.container.capacity());

        let encrypted = encrypt_file(key, name, mime, data, self.config.container.chunk_size)?;
        let needed = encrypted.record.len() as u64;

        // Hold the allocation lock across read-place-advance so two vaults
        // cannot be handed overlapping extents.
        let offset = {
            let _alloc = hold(&self.alloc_lock);
            let cursor = self.read_alloc()?;
            if cursor + needed > self.container.capacity() {
                return Err(VaultError::CapacityExceeded {
                    requested: needed,
                    available: self.container.capacity() - cursor,
                });
            }
            self.container.write_at(cursor, &encrypted.record)?;
            self.container.sync()?;
            self.write_alloc(cursor + needed)?;
            cursor
        };

        index.files.push(StoredFile {
            id: encrypted.header.id,
            offset,
            length: needed,
            sealed_header: VaultIndex::encode_sealed_header(&encrypted.sealed_header),
            deleted: false,
        });
        index.cursor = offset + needed;
        self.indexes.persist(key, &index)?;

        Ok(encrypted.header.meta())
    }

    /// List the vault's files. A wrong key lists zero files.
    pub fn list_files(&self, key: &VaultKey) -> Vec<FileMeta> {
        let index = self
            .indexes
            .load_or_empty(key, self.container.capacity());

        index
            .files
            .iter()
            .filter(|f| !f.deleted)
            .filter_map(|f| {
                let sealed = VaultIndex::sealed_header_bytes(f)?;
                decrypt_header(key, &sealed).map(|h| h.meta())
            })
            .collect()
    }

    /// Read a file back. `Ok(None)` covers unknown id and any decryption
    /// failure alike; `Err` is reserved for container I/O trouble.
    pub fn read_file(
        &self,
        key: &VaultKey,
        id: FileId,
    ) -> VaultResult<Option<(FileMeta, Vec<u8>)>> {
        let index = self
            .indexes
            .load_or_empty(key, self.container.capacity());

        let Some(entry) = index.files.iter().find(|f| f.id == id && !f.deleted) else {
            return Ok(None);
        };

        let record = self.container.read_at(entry.offset, entry.length as usize)?;
        Ok(decrypt_file(key, &record).map(|(header, data)| (header.meta(), data)))
    }

    /// Securely delete a file: scramble its backing bytes, then drop the
    /// entry. The deleted flag is persisted first so a crash between the
    /// two steps resumes as "already scrambled, entry pending removal"
    /// rather than resurrecting half-overwritten ciphertext.
    pub fn delete_file(&self, key: &VaultKey, id: FileId) -> VaultResult<bool> {
        let lock = self.vault_lock(&key.fingerprint());
        let _guard = hold(&lock);

        let mut index = self
            .indexes
            .load_or_empty(key, self.container.capacity());

        let Some(pos) = index.files.iter().position(|f| f.id == id) else {
            return Ok(false);
        };

        index.files[pos].deleted = true;
        self.indexes.persist(key, &index)?;

        let (offset, length) = (index.files[pos].offset, index.files[pos].length);
        self.container.scramble(offset, length)?;
        self.container.sync()?;

        index.files.remove(pos);
        self.indexes.persist(key, &index)?;
        Ok(true)
    }

    /// Rotate a vault to a new key by re-encrypting only its index:
    /// O(index size), not O(blob size), so rotation is near-instant
    /// regardless of how much data the vault holds.
    pub fn change_key(&self, old_key: &VaultKey, new_key: &VaultKey) -> VaultResult<()> {
        let old_fp = old_key.fingerprint();
        let new_fp = new_key.fingerprint();
        if old_fp == new_fp {
            return Err(VaultError::KeyCollision);
        }

        // Lock both vaults in fingerprint order so concurrent rotations
        // cannot deadlock.
        let (first, second) = if old_fp.as_bytes() < new_fp.as_bytes() {
            (self.vault_lock(&old_fp), self.vault_lock(&new_fp))
        } else {
            (self.vault_lock(&new_fp), self.vault_lock(&old_fp))
        };
        let _g1 = hold(&first);
        let _g2 = hold(&second);

        if self.indexes.exists(&new_fp) {
            return Err(VaultError::KeyCollision);
        }

        let index = self
            .indexes
            .load_or_empty(old_key, self.container.capacity());
        self.indexes.persist(new_key, &index)?;
        self.indexes.remove(&old_fp)?;
        Ok(())
    }

    fn vault_lock(&self, fingerprint: &VaultFingerprint) -> Arc<Mutex<()>> {
        let mut map = self
            .vault_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(*fingerprint).or_default().clone()
    }

    fn read_alloc(&self) -> VaultResult<u64> {
        match std::fs::read(self.root.join(ALLOC_FILE)) {
            Ok(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| VaultError::Corrupted("allocation mark malformed".into()))?;
                Ok(u64::from_be_bytes(arr))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_alloc(&self, cursor: u64) -> VaultResult<()> {
        atomic_write(&self.root.join(ALLOC_FILE), &cursor.to_be_bytes())
    }
}

fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}
