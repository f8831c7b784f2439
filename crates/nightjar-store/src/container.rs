//! The fixed-size blob backing all vaults.
//!
//! Created once per install and filled entirely with CSPRNG output. The file
//! carries no magic bytes, no header, no structure: every byte that is not a
//! live ciphertext must be indistinguishable from random, and ciphertexts
//! themselves are indistinguishable from random without their key. Writes,
//! partial overwrites, and deletions must all preserve this invariant.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rand::RngCore;

use nightjar_core::{VaultError, VaultResult};

/// I/O chunk for filling and scrambling.
const FILL_CHUNK: usize = 1024 * 1024;

pub const CONTAINER_FILE: &str = "container.bin";

pub struct Container {
    file: Mutex<File>,
    capacity: u64,
    path: PathBuf,
}

impl Container {
    /// Create the container: allocate `capacity` bytes of CSPRNG output.
    /// One-time operation per install; fails if the file already exists.
    pub fn create(root: &Path, capacity: u64) -> VaultResult<Self> {
        let path = root.join(CONTAINER_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        let mut rng = rand::thread_rng();
        let mut buf = vec![0u8; FILL_CHUNK];
        let mut remaining = capacity;
        while remaining > 0 {
            let n = remaining.min(FILL_CHUNK as u64) as usize;
            rng.fill_bytes(&mut buf[..n]);
            file.write_all(&buf[..n])?;
            remaining -= n as u64;
        }
        file.sync_all()?;

        tracing::info!(capacity, path = %path.display(), "container created");
        Ok(Self {
            file: Mutex::new(file),
            capacity,
            path,
        })
    }

    /// Open an existing container, verifying only its size. There is no
    /// header to validate: the blob is opaque by design.
    pub fn open(root: &Path, capacity: u64) -> VaultResult<Self> {
        let path = root.join(CONTAINER_FILE);
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let actual = file.metadata()?.len();
        if actual != capacity {
            return Err(VaultError::Corrupted(format!(
                "container is {actual} bytes, expected {capacity}"
            )));
        }

        Ok(Self {
            file: Mutex::new(file),
            capacity,
            path,
        })
    }

    pub fn exists(root: &Path) -> bool {
        root.join(CONTAINER_FILE).exists()
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_at(&self, offset: u64, len: usize) -> VaultResult<Vec<u8>> {
        self.check_range(offset, len as u64)?;
        let mut file = lock(&self.file);
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn write_at(&self, offset: u64, data: &[u8]) -> VaultResult<()> {
        self.check_range(offset, data.len() as u64)?;
        let mut file = lock(&self.file);
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    /// Overwrite a range with fresh CSPRNG output. The secure-delete and
    /// duress-wipe primitive: afterwards the range reads exactly like space
    /// that never held data.
    pub fn scramble(&self, offset: u64, len: u64) -> VaultResult<()> {
        self.check_range(offset, len)?;
        let mut file = lock(&self.file);
        file.seek(SeekFrom::Start(offset))?;

        let mut rng = rand::thread_rng();
        let mut buf = vec![0u8; FILL_CHUNK];
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(FILL_CHUNK as u64) as usize;
            rng.fill_bytes(&mut buf[..n]);
            file.write_all(&buf[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }

    /// Flush outstanding writes to stable storage.
    pub fn sync(&self) -> VaultResult<()> {
        lock(&self.file).sync_data()?;
        Ok(())
    }

    fn check_range(&self, offset: u64, len: u64) -> VaultResult<()> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| VaultError::Corrupted("container range overflow".into()))?;
        if end > self.capacity {
            return Err(VaultError::Corrupted(format!(
                "range {offset}+{len} beyond container capacity {}",
                self.capacity
            )));
        }
        Ok(())
    }
}

fn lock(file: &Mutex<File>) -> std::sync::MutexGuard<'_, File> {
    file.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
