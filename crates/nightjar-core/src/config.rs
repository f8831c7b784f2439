use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level engine configuration (loaded from nightjar.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub container: ContainerConfig,
    pub kdf: KdfConfig,
    pub unlock: UnlockConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Directory holding the blob and all index artifacts
    pub root: PathBuf,
    /// Fixed container size in bytes, allocated once (default: 500 MiB)
    pub capacity_bytes: u64,
    /// Plaintext chunk size for file content encryption (default: 1 MiB)
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// PBKDF2 rounds for gesture-derived keys (default: 600,000)
    pub gesture_iterations: u32,
    /// PBKDF2 rounds for phrase-derived keys (default: 800,000)
    pub phrase_iterations: u32,
}

/// Unlock latency envelope.
///
/// Every unlock attempt is padded to `floor_ms` plus a uniformly random
/// 0..jitter_ms, so that total latency is identical whether the key is
/// correct, wrong, or the duress key. Derivation and index decryption must
/// both complete inside this window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockConfig {
    pub floor_ms: u64,
    pub jitter_ms: u64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/.local/share/nightjar"),
            capacity_bytes: 500 * 1024 * 1024,
            chunk_size: 1024 * 1024,
        }
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            gesture_iterations: 600_000,
            phrase_iterations: 800_000,
        }
    }
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            floor_ms: 1200,
            jitter_ms: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[container]
root = "/var/lib/nightjar"
capacity_bytes = 1073741824
chunk_size = 524288

[kdf]
gesture_iterations = 700000
phrase_iterations = 900000

[unlock]
floor_ms = 1500
jitter_ms = 500
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.container.root, PathBuf::from("/var/lib/nightjar"));
        assert_eq!(config.container.capacity_bytes, 1_073_741_824);
        assert_eq!(config.container.chunk_size, 524_288);
        assert_eq!(config.kdf.gesture_iterations, 700_000);
        assert_eq!(config.kdf.phrase_iterations, 900_000);
        assert_eq!(config.unlock.floor_ms, 1500);
        assert_eq!(config.unlock.jitter_ms, 500);
    }

    #[test]
    fn test_parse_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();

        assert_eq!(config.container.capacity_bytes, 500 * 1024 * 1024);
        assert_eq!(config.container.chunk_size, 1024 * 1024);
        assert_eq!(config.kdf.gesture_iterations, 600_000);
        assert_eq!(config.kdf.phrase_iterations, 800_000);
        assert_eq!(config.unlock.floor_ms, 1200);
        assert_eq!(config.unlock.jitter_ms, 600);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[container]
capacity_bytes = 67108864
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.container.capacity_bytes, 67_108_864);
        // Defaults
        assert_eq!(config.container.chunk_size, 1024 * 1024);
        assert_eq!(config.kdf.gesture_iterations, 600_000);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.container.root, parsed.container.root);
        assert_eq!(config.container.capacity_bytes, parsed.container.capacity_bytes);
        assert_eq!(config.unlock.floor_ms, parsed.unlock.floor_ms);
    }
}
