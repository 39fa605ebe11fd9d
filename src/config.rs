//! Scan configuration loaded from TOML.

use crate::analyzers::ast::ParserConfig;
use crate::discovery::DiscoveryConfig;
use crate::error::ConfigError;
use crate::reader::{ReadOptions, DEFAULT_MEMORY_CEILING, STREAM_CHUNK_SIZE, STREAM_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Content reader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// Resident memory ceiling in bytes.
    pub memory_ceiling: u64,
    pub chunk_size: usize,
    /// Files at or above this size are streamed.
    pub stream_threshold: u64,
    /// Per-file read timeout.
    pub file_timeout_secs: u64,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            memory_ceiling: DEFAULT_MEMORY_CEILING,
            chunk_size: STREAM_CHUNK_SIZE,
            stream_threshold: STREAM_THRESHOLD,
            file_timeout_secs: 30,
        }
    }
}

impl ReaderSettings {
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            chunk_size: self.chunk_size,
            memory_ceiling: self.memory_ceiling,
            stream_threshold: self.stream_threshold,
            ..ReadOptions::streaming()
        }
    }

    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }
}

/// Scheduling limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Files read and parsed at the same time.
    pub max_concurrency: usize,
    /// Cancel the whole scan after this many seconds.
    pub scan_timeout_secs: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            scan_timeout_secs: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub discovery: DiscoveryConfig,
    pub reader: ReaderSettings,
    pub parser: ParserConfig,
    pub limits: Limits,
    /// JSON rule file replacing the built-in rules.
    pub rules_file: Option<PathBuf>,
}

impl ScanConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from the user config directory, falling back to defaults.
    pub fn load_default() -> Self {
        let path = match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Self::default(),
        };
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// `<config dir>/codesentry/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("codesentry").join("config.toml"))
}

/// A commented template with every default spelled out.
pub fn generate_default_config() -> String {
    r#"# codesentry configuration

# JSON file replacing the built-in rule table.
# rules_file = "rules.json"

[discovery]
# Maximum directory depth below the scan root.
max_depth = 10
# Include dot-files and dot-directories.
include_hidden = false
# Only keep these extensions (empty = all files).
extensions = []
# Skip files larger than this many bytes.
# max_file_size = 5242880
follow_symlinks = false
# Glob patterns relative to the scan root.
exclude = ["node_modules/**", "dist/**"]

[reader]
# Resident memory ceiling in bytes (100 MiB).
memory_ceiling = 104857600
chunk_size = 65536
# Files at or above this size are streamed in chunks (10 MiB).
stream_threshold = 10485760
file_timeout_secs = 30

[parser]
# es5, es2015, es2017, es2020, es2022 or latest
ecma_version = "latest"
# module or script
source_type = "module"
jsx = true
timeout_micros = 5000000

[limits]
max_concurrency = 8
# scan_timeout_secs = 300
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::ast::{EcmaVersion, SourceType};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.discovery.max_depth, 10);
        assert!(!config.discovery.include_hidden);
        assert!(!config.discovery.follow_symlinks);
        assert_eq!(config.reader.memory_ceiling, 100 * 1024 * 1024);
        assert_eq!(config.reader.file_timeout(), Duration::from_secs(30));
        assert_eq!(config.limits.max_concurrency, 8);
        assert_eq!(config.parser.ecma_version, EcmaVersion::Latest);
        assert!(config.rules_file.is_none());
    }

    #[test]
    fn test_generated_template_parses() {
        let config: ScanConfig = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.discovery.exclude, vec!["node_modules/**", "dist/**"]);
        assert_eq!(config.reader.stream_threshold, 10 * 1024 * 1024);
        assert_eq!(config.parser.source_type, SourceType::Module);
        assert!(config.parser.jsx);
        assert_eq!(config.limits.scan_timeout_secs, None);
    }

    #[test]
    fn test_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            "[discovery]\ninclude_hidden = true\n\n[parser]\necma_version = \"es2017\"\n",
        )
        .unwrap();

        let config = ScanConfig::load(&path).unwrap();
        assert!(config.discovery.include_hidden);
        assert_eq!(config.discovery.max_depth, 10);
        assert_eq!(config.parser.ecma_version, EcmaVersion::Es2017);
        assert_eq!(config.reader.chunk_size, 64 * 1024);
    }

    #[test]
    fn test_invalid_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[limits]\nmax_concurrency = \"many\"\n").unwrap();
        assert!(matches!(ScanConfig::load(&path), Err(ConfigError::Toml { .. })));
        assert!(matches!(
            ScanConfig::load(&tmp.path().join("nope.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
