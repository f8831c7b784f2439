//! nightjar-secrets: platform keychain integration
//!
//! Two secrets live here, and only here:
//! - the **device salt**, mixed into every gesture and recovery derivation,
//!   which binds vault keys to this install;
//! - the **recovery master key**, protecting the recovery database, never
//!   derivable from any vault key.
//!
//! Both are generated once from the OS CSPRNG and stored exclusively in the
//! platform credential store (macOS Keychain, Secret Service, Windows
//! Credential Manager). If the credential store is corrupted or lost, every
//! vault becomes permanently inaccessible. This is an accepted risk with no
//! recovery path.

pub mod device;
pub mod keychain;

pub use device::{get_or_create_device_salt, get_or_create_master_key};
