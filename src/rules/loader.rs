//! JSON rule loader.
//!
//! A rule file replaces the built-in table:
//!
//! ```json
//! { "rules": [ { "id": "...", "title": "...", "subcategory": "...",
//!                "category": "shell_execution", "severity": "critical",
//!                "detector": "shell_execution", "callees": ["execFile"] } ] }
//! ```

use super::{PatternRule, RuleSet};
use crate::error::RuleLoadError;
use serde::Deserialize;
use std::path::Path;

/// JSON structure for a rule file.
#[derive(Debug, Deserialize)]
struct RuleFile {
    rules: Vec<PatternRule>,
}

/// Load rules from a JSON file.
pub fn load_rules_from_file(path: &Path) -> Result<Vec<PatternRule>, RuleLoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| RuleLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rule_file: RuleFile =
        serde_json::from_str(&content).map_err(|source| RuleLoadError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!("Loaded {} rules from {:?}", rule_file.rules.len(), path);
    Ok(rule_file.rules)
}

/// Load and validate a rule table, or fall back to the built-ins.
pub fn load_rule_set(path: Option<&Path>) -> Result<RuleSet, RuleLoadError> {
    match path {
        Some(path) => {
            let set = RuleSet::from_rules(load_rules_from_file(path)?)?;
            tracing::info!("Using {} rules from {}", set.rules().len(), path.display());
            Ok(set)
        }
        None => Ok(RuleSet::builtin()),
    }
}
