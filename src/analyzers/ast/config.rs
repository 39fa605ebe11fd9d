//! Configuration for syntax-tree construction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Language-version ceiling. Syntax newer than the ceiling is a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EcmaVersion {
    Es5,
    Es2015,
    Es2017,
    Es2020,
    Es2022,
    Latest,
}

impl fmt::Display for EcmaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcmaVersion::Es5 => write!(f, "ES5"),
            EcmaVersion::Es2015 => write!(f, "ES2015"),
            EcmaVersion::Es2017 => write!(f, "ES2017"),
            EcmaVersion::Es2020 => write!(f, "ES2020"),
            EcmaVersion::Es2022 => write!(f, "ES2022"),
            EcmaVersion::Latest => write!(f, "latest"),
        }
    }
}

/// Module or classic script parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Module,
    /// Top-level import/export declarations are rejected.
    Script,
}

/// Configuration for the syntax-tree builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub ecma_version: EcmaVersion,
    pub source_type: SourceType,
    /// Accept `.jsx` / `.tsx` files.
    pub jsx: bool,
    /// Parser time budget per file in microseconds (0 = unlimited).
    pub timeout_micros: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            ecma_version: EcmaVersion::Latest,
            source_type: SourceType::Module,
            jsx: true,
            timeout_micros: 5_000_000, // 5 s
        }
    }
}
