//! Error types for each stage of the scan pipeline.
//!
//! Only [`ScanError`] and [`AcquisitionError`] end a session. Everything else
//! is recorded as a string in the session's error list and scanning goes on.

use crate::analyzers::ast::config::EcmaVersion;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems with the scan root itself.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Scan root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Scan root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Per-file content acquisition failures.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Initial memory too high before reading {path}: {usage} bytes in use (ceiling {ceiling})")]
    InitialMemoryTooHigh {
        path: String,
        usage: u64,
        ceiling: u64,
    },

    #[error("Memory limit exceeded while reading {path}: {usage} bytes in use after {bytes_read} bytes read (ceiling {ceiling})")]
    MemoryLimitExceeded {
        path: String,
        usage: u64,
        ceiling: u64,
        bytes_read: u64,
    },

    #[error("Failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out reading {path} after {millis} ms")]
    Timeout { path: String, millis: u64 },
}

/// Per-file syntax-tree construction failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unsupported file type: {path}")]
    UnsupportedFileType { path: String },

    #[error("Invalid content in {path}: {reason}")]
    InvalidContent { path: String, reason: String },

    #[error("Syntax error in {path} at line {line}, column {column}: {message}")]
    Syntax {
        path: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{feature} in {path} at line {line} requires {required}, configured ceiling is {ceiling}")]
    UnsupportedSyntax {
        path: String,
        feature: &'static str,
        required: EcmaVersion,
        ceiling: EcmaVersion,
        line: usize,
    },

    #[error("Import/export declaration in {path} at line {line} is only valid in module mode")]
    ModuleSyntaxInScript { path: String, line: usize },

    #[error("Failed to load grammar: {0}")]
    Language(String),

    #[error("Parser gave up on {path} (timeout or cancellation)")]
    Aborted { path: String },
}

/// A rule faulted while inspecting one node.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Node {0} referenced by the syntax tree does not exist")]
    DanglingNode(usize),

    #[error("Rule {rule} expected {expected} at node {node}")]
    UnexpectedShape {
        rule: String,
        expected: &'static str,
        node: usize,
    },
}

/// Repository-level acquisition failures. All of them end the session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    #[error("Invalid repository URL: {0}")]
    InvalidUrl(String),

    #[error("Authentication required for {0}")]
    AuthRequired(String),

    #[error("Repository not found: {0}")]
    NotFound(String),

    #[error("Timed out acquiring {url} after {secs} s")]
    Timeout { url: String, secs: u64 },

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Acquisition failed: {0}")]
    Failed(String),
}

impl AcquisitionError {
    /// Short category label used in session error strings.
    pub fn category(&self) -> &'static str {
        match self {
            AcquisitionError::InvalidUrl(_) => "invalid_url",
            AcquisitionError::AuthRequired(_) => "auth_required",
            AcquisitionError::NotFound(_) => "not_found",
            AcquisitionError::Timeout { .. } => "timeout",
            AcquisitionError::Network(_) => "network",
            AcquisitionError::Failed(_) => "failed",
        }
    }
}

/// Failures loading a custom rule table.
#[derive(Error, Debug)]
pub enum RuleLoadError {
    #[error("Failed to read rule file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rule file {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid rule {id}: {reason}")]
    Invalid { id: String, reason: String },
}

/// Failures loading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid exclude pattern: {0}")]
    Glob(#[from] globset::Error),
}

/// Errors that abort a whole scan session.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Rules(#[from] RuleLoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
