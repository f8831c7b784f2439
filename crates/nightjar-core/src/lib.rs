//! nightjar-core: shared types, config schema, and error taxonomy
//!
//! Everything in this crate is plumbing shared by the other nightjar crates:
//! the error types callers match on, the toml-backed engine configuration,
//! and the small value types (fingerprints, file ids, gesture input) that
//! cross crate boundaries.

pub mod config;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use error::{RecoveryError, VaultError, VaultResult};
pub use types::{FileId, GestureInput, VaultFingerprint};
