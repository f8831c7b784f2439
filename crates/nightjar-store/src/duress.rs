//! The duress controller: one designated key silently destroys the rest.
//!
//! The duress flag is a vault-key fingerprint sealed under the recovery
//! master key, stored beside (but independent of) the recovery database.
//! Every unlock attempt is compared against it with the same amount of work
//! whether or not a flag is configured, so the comparison itself leaks
//! nothing.
//!
//! Triggering is journaled: a write-ahead file lists the victim artifacts
//! and the duress vault's protected extents before any byte is touched.
//! A crash mid-wipe is replayed from the journal on next open, so no
//! observable half-destroyed state can persist. Nothing on this path is
//! ever logged.

use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::{Deserialize, Serialize};

use nightjar_core::{VaultError, VaultFingerprint, VaultResult};
use nightjar_crypto::{cipher, VaultKey};

use crate::container::Container;
use crate::index::atomic_write;
use crate::vault::VaultStore;

const TAG_FILE: &str = "duress.tag";
const JOURNAL_FILE: &str = "duress.wipe";

/// Sized like the sealed tag so the unconfigured path decrypts the same
/// number of bytes as the configured one.
const DECOY_TAG_LEN: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuressState {
    /// No duress key designated
    Armed,
    /// One key flagged; its use at unlock time destroys every other vault
    Configured,
}

/// Write-ahead record of a wipe in progress.
#[derive(Debug, Serialize, Deserialize)]
struct WipeJournal {
    /// Index artifact file names to delete
    victims: Vec<String>,
    /// Extents that must survive: the duress vault's live files, sorted
    protected: Vec<(u64, u64)>,
}

pub struct DuressController {
    root: PathBuf,
    master_key: VaultKey,
}

impl DuressController {
    pub fn new(root: &Path, master_key: [u8; 32]) -> Self {
        Self {
            root: root.to_path_buf(),
            master_key: VaultKey::from_bytes(master_key),
        }
    }

    pub fn state(&self) -> DuressState {
        if self.root.join(TAG_FILE).exists() {
            DuressState::Configured
        } else {
            DuressState::Armed
        }
    }

    /// Designate `key` as the duress key, replacing any previous flag.
    pub fn set_duress(&self, key: &VaultKey) -> VaultResult<()> {
        let sealed = cipher::seal(&self.master_key, key.fingerprint().as_bytes())?;
        atomic_write(&self.root.join(TAG_FILE), &sealed)
    }

    pub fn clear_duress(&self) -> VaultResult<()> {
        match std::fs::remove_file(self.root.join(TAG_FILE)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Compare a candidate key against the duress flag.
    ///
    /// Runs on every unlock attempt. Both branches, flag present and flag
    /// absent, perform one AEAD open and one constant-time fingerprint
    /// comparison; the absent branch compares against a random fingerprint
    /// that can never match.
    pub fn matches(&self, key: &VaultKey) -> bool {
        let sealed = std::fs::read(self.root.join(TAG_FILE)).unwrap_or_else(|_| {
            let mut decoy = vec![0u8; DECOY_TAG_LEN];
            rand::thread_rng().fill_bytes(&mut decoy);
            decoy
        });

        let stored = cipher::open(&self.master_key, &sealed)
            .and_then(|bytes| <[u8; 32]>::try_from(bytes.as_slice()).ok())
            .map(VaultFingerprint::from_bytes)
            .unwrap_or_else(|| {
                let mut dummy = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut dummy);
                VaultFingerprint::from_bytes(dummy)
            });

        stored == key.fingerprint()
    }

    /// Destroy every vault except the one behind `duress_key`.
    ///
    /// Every non-duress index artifact is deleted and the entire blob is
    /// scrambled except the duress vault's live extents (other vaults'
    /// extents are unknowable without their keys). Afterwards the
    /// container reads exactly like one that only ever held the duress
    /// vault. The duress index artifact itself is not rewritten.
    pub(crate) fn execute_wipe(
        &self,
        store: &VaultStore,
        duress_key: &VaultKey,
    ) -> VaultResult<()> {
        let duress_artifact = format!("{}.idx", duress_key.fingerprint().to_hex());

        let index = store
            .indexes
            .load_or_empty(duress_key, store.container.capacity());
        let mut protected: Vec<(u64, u64)> = index
            .files
            .iter()
            .map(|f| (f.offset, f.length))
            .collect();
        protected.sort_unstable();

        let victims: Vec<String> = store
            .indexes
            .list_artifacts()?
            .into_iter()
            .filter(|name| *name != duress_artifact)
            .collect();

        let journal = WipeJournal { victims, protected };
        let journal_path = self.root.join(JOURNAL_FILE);
        atomic_write(
            &journal_path,
            &serde_json::to_vec(&journal).map_err(anyhow::Error::from)?,
        )?;

        perform_wipe(&self.root, &store.container, &journal)?;
        std::fs::remove_file(&journal_path)?;
        Ok(())
    }
}

/// Replay a wipe journal left by a crash. Called before any other store
/// operation on open; a no-op when no journal exists.
pub(crate) fn resume_pending_wipe(root: &Path, container: &Container) -> VaultResult<()> {
    let journal_path = root.join(JOURNAL_FILE);
    let bytes = match std::fs::read(&journal_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let journal: WipeJournal = serde_json::from_slice(&bytes)
        .map_err(|e| VaultError::Corrupted(format!("wipe journal unreadable: {e}")))?;

    perform_wipe(root, container, &journal)?;
    std::fs::remove_file(&journal_path)?;
    Ok(())
}

/// Scramble every byte of the container outside the protected extents,
/// then delete the victim artifacts. Idempotent: replaying after a partial
/// run only re-randomizes already-random bytes.
fn perform_wipe(root: &Path, container: &Container, journal: &WipeJournal) -> VaultResult<()> {
    let mut position = 0u64;
    for &(offset, length) in &journal.protected {
        if offset > position {
            container.scramble(position, offset - position)?;
        }
        position = position.max(offset.saturating_add(length));
    }
    if position < container.capacity() {
        container.scramble(position, container.capacity() - position)?;
    }
    container.sync()?;

    for name in &journal.victims {
        match std::fs::remove_file(root.join(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
