use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

/// Errors surfaced by the storage engine.
///
/// There is deliberately no `AuthenticationFailure` variant: a ciphertext
/// that does not authenticate under the presented key is reported as an
/// *empty result* (`None`, an index with zero files) by the layer that
/// attempted the decryption. Callers must not be able to distinguish
/// "wrong key" from "empty vault" through the error channel. This is a
/// security contract, not incidental error handling.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("container full: {requested} bytes requested, {available} available")]
    CapacityExceeded { requested: u64, available: u64 },

    #[error("a vault already exists under the requested key")]
    KeyCollision,

    #[error("container corrupted: {0}")]
    Corrupted(String),

    /// The platform credential store is unavailable or refused the request.
    ///
    /// If the device salt or the recovery master key is lost with it, every
    /// vault becomes permanently inaccessible. There is no recovery path;
    /// do not retry in a loop.
    #[error("key store error: {0}")]
    KeyStore(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors surfaced by the recovery-phrase store.
///
/// None of these variants disclose which other vaults exist or how many
/// records the database holds.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("phrase does not match any stored recovery record")]
    InvalidPhrase,

    #[error("no recovery record exists for this vault")]
    VaultNotFound,

    #[error("phrase too weak: {0}")]
    WeakPhrase(String),

    #[error("recovery database error: {0}")]
    EncryptionFailed(String),

    #[error("key store error: {0}")]
    KeyStore(String),
}
