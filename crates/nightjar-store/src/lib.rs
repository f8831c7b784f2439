//! nightjar-store: the deniable container and everything that lives in it
//!
//! One fixed-size blob, created once and filled with CSPRNG output, backs
//! every vault. Files are written at monotonically increasing offsets;
//! freed space is scrambled and never reused. Each vault key owns one
//! encrypted index artifact, named by the key's one-way fingerprint.
//!
//! The central contract is `IndexStore::load_or_empty`: a key that does not
//! decrypt a valid index yields an *empty* index, through the same code path
//! and the same amount of work as a corrupted artifact. "Wrong key",
//! "empty vault", and "destroyed vault" are indistinguishable by design.
//!
//! Services are constructed explicitly and injected by the application
//! layer; there is no process-wide shared state.

pub mod container;
pub mod duress;
pub mod index;
pub mod recovery;
pub mod vault;

pub use container::Container;
pub use duress::{DuressController, DuressState};
pub use index::{IndexStore, StoredFile, VaultIndex};
pub use recovery::RecoveryStore;
pub use vault::{UnlockedVault, VaultStore};
