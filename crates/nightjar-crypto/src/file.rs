//! Encrypted file record format
//!
//! Record layout (binary):
//! ```text
//! [4 bytes BE: sealed header length][sealed header][sealed chunk 0]...[sealed chunk N-1]
//! AAD per chunk = chunk_index (8 bytes, big-endian) || file_id (16 bytes)
//! ```
//!
//! The header carries the original name, MIME type, size, creation time, and
//! a BLAKE3 checksum of the plaintext. The checksum is distinct from the
//! per-chunk Poly1305 tags: a truncated record can authenticate chunk-by-chunk
//! yet still fail the whole-file checksum.
//!
//! Content is encrypted in fixed-size chunks so peak memory stays bounded for
//! large files, and the AAD binds each chunk to its position and file,
//! preventing reordering and cross-file substitution.

use serde::{Deserialize, Serialize};

use nightjar_core::FileId;

use crate::cipher::{open_with_aad, seal_with_aad, sealed_len};
use crate::kdf::VaultKey;

/// Encrypted per-file metadata. Lives sealed inside the record on the blob
/// and, separately sealed, inside the vault index for listing without a
/// blob read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHeader {
    pub id: FileId,
    /// Original file name
    pub name: String,
    /// MIME type as reported at import
    pub mime: String,
    /// Plaintext size in bytes
    pub original_size: u64,
    /// Unix timestamp of import
    pub created_at: u64,
    /// BLAKE3 hash of the plaintext (hex)
    pub checksum: String,
    /// Plaintext chunk size used for the content section
    pub chunk_size: usize,
}

impl FileHeader {
    pub fn meta(&self) -> FileMeta {
        FileMeta {
            id: self.id,
            name: self.name.clone(),
            mime: self.mime.clone(),
            original_size: self.original_size,
            created_at: self.created_at,
        }
    }
}

/// Decrypted listing view of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: FileId,
    pub name: String,
    pub mime: String,
    pub original_size: u64,
    pub created_at: u64,
}

/// Output of `encrypt_file`: the blob record plus an independently sealed
/// header copy for the index.
pub struct EncryptedFile {
    /// Full record as written to the container
    pub record: Vec<u8>,
    /// Header sealed on its own, for the vault index
    pub sealed_header: Vec<u8>,
    /// The plaintext header (caller may want the id and checksum)
    pub header: FileHeader,
}

/// Encrypt a file into the record format.
pub fn encrypt_file(
    key: &VaultKey,
    name: &str,
    mime: &str,
    data: &[u8],
    chunk_size: usize,
) -> anyhow::Result<EncryptedFile> {
    if chunk_size == 0 {
        anyhow::bail!("chunk size must be non-zero");
    }

    let id = FileId::generate();
    let created_at = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let header = FileHeader {
        id,
        name: name.to_string(),
        mime: mime.to_string(),
        original_size: data.len() as u64,
        created_at,
        checksum: blake3::hash(data).to_hex().to_string(),
        chunk_size,
    };

    let header_bytes = serde_json::to_vec(&header)?;
    let sealed_header = seal_with_aad(key, &[], &header_bytes)?;

    let mut record =
        Vec::with_capacity(4 + sealed_header.len() + data.len() + data.len() / chunk_size * 28);
    record.extend_from_slice(&(sealed_header.len() as u32).to_be_bytes());
    record.extend_from_slice(&sealed_header);

    for (index, chunk) in data.chunks(chunk_size).enumerate() {
        let aad = chunk_aad(index as u64, &id);
        let sealed = seal_with_aad(key, &aad, chunk)?;
        record.extend_from_slice(&sealed);
    }

    Ok(EncryptedFile {
        record,
        sealed_header,
        header,
    })
}

/// Decrypt a full record. `None` on any authentication, layout, or checksum
/// failure; a record that does not open under this key carries no further
/// diagnostics.
pub fn decrypt_file(key: &VaultKey, record: &[u8]) -> Option<(FileHeader, Vec<u8>)> {
    if record.len() < 4 {
        return None;
    }
    let header_len = u32::from_be_bytes(record[..4].try_into().ok()?) as usize;
    let header_end = 4usize.checked_add(header_len)?;
    if record.len() < header_end {
        return None;
    }

    let header_bytes = open_with_aad(key, &[], &record[4..header_end])?;
    let header: FileHeader = serde_json::from_slice(&header_bytes).ok()?;
    if header.chunk_size == 0 {
        return None;
    }

    let mut plaintext = Vec::with_capacity(header.original_size as usize);
    let mut cursor = header_end;
    let mut remaining = header.original_size as usize;
    let mut index = 0u64;

    while remaining > 0 {
        let chunk_plain = remaining.min(header.chunk_size);
        let chunk_sealed = sealed_len(chunk_plain);
        let end = cursor.checked_add(chunk_sealed)?;
        if record.len() < end {
            return None;
        }

        let aad = chunk_aad(index, &header.id);
        let chunk = open_with_aad(key, &aad, &record[cursor..end])?;
        plaintext.extend_from_slice(&chunk);

        cursor = end;
        remaining -= chunk_plain;
        index += 1;
    }

    if blake3::hash(&plaintext).to_hex().to_string() != header.checksum {
        return None;
    }

    Some((header, plaintext))
}

/// Decrypt a sealed header taken from the vault index.
pub fn decrypt_header(key: &VaultKey, sealed_header: &[u8]) -> Option<FileHeader> {
    let bytes = open_with_aad(key, &[], sealed_header)?;
    serde_json::from_slice(&bytes).ok()
}

/// Total record size for a plaintext of `data_len` bytes.
pub fn record_len(sealed_header_len: usize, data_len: usize, chunk_size: usize) -> usize {
    let full_chunks = data_len / chunk_size;
    let tail = data_len % chunk_size;
    let mut len = 4 + sealed_header_len + full_chunks * sealed_len(chunk_size);
    if tail > 0 {
        len += sealed_len(tail);
    }
    len
}

/// AAD: chunk_index (8 bytes BE) || file_id (16 bytes)
fn chunk_aad(index: u64, id: &FileId) -> Vec<u8> {
    let mut aad = Vec::with_capacity(8 + 16);
    aad.extend_from_slice(&index.to_be_bytes());
    aad.extend_from_slice(id.as_bytes());
    aad
}
