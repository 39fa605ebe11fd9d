//! Built-in rule table.

use super::{DetectorKind, PatternRule};
use crate::types::{FindingCategory, Severity};

/// Global objects through which browser/Node built-ins can be reached.
const GLOBAL_RECEIVERS: &[&str] = &["window", "globalThis", "global", "self"];

/// Names `child_process` is usually imported or required as.
const CHILD_PROCESS_RECEIVERS: &[&str] = &[
    "child_process",
    "node:child_process",
    "childProcess",
    "cp",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn builtin_rules() -> Vec<PatternRule> {
    let mut eval_receivers = strings(GLOBAL_RECEIVERS);
    eval_receivers.push("this".to_string());

    vec![
        PatternRule {
            id: "JS-EXEC-001".to_string(),
            title: "Dynamic code evaluation".to_string(),
            subcategory: "eval_usage".to_string(),
            category: FindingCategory::CodeExecution,
            severity: Severity::Critical,
            detector: DetectorKind::Eval,
            callees: strings(&["eval"]),
            receivers: eval_receivers,
            enabled: true,
        },
        PatternRule {
            id: "JS-EXEC-002".to_string(),
            title: "Function constructor".to_string(),
            subcategory: "function_constructor".to_string(),
            category: FindingCategory::CodeExecution,
            severity: Severity::Warning,
            detector: DetectorKind::FunctionConstructor,
            callees: strings(&["Function"]),
            receivers: strings(GLOBAL_RECEIVERS),
            enabled: true,
        },
        PatternRule {
            id: "JS-LOAD-001".to_string(),
            title: "Dynamic import".to_string(),
            subcategory: "dynamic_import".to_string(),
            category: FindingCategory::DynamicLoading,
            severity: Severity::Warning,
            detector: DetectorKind::DynamicImport,
            callees: Vec::new(),
            receivers: Vec::new(),
            enabled: true,
        },
        PatternRule {
            id: "JS-EXEC-003".to_string(),
            title: "String code passed to timer".to_string(),
            subcategory: "timer_code_injection".to_string(),
            category: FindingCategory::CodeExecution,
            severity: Severity::Warning,
            detector: DetectorKind::TimerString,
            callees: strings(&["setTimeout", "setInterval"]),
            receivers: strings(GLOBAL_RECEIVERS),
            enabled: true,
        },
        PatternRule {
            id: "JS-SHELL-001".to_string(),
            title: "Shell command execution".to_string(),
            subcategory: "shell_execution".to_string(),
            category: FindingCategory::ShellExecution,
            severity: Severity::Critical,
            detector: DetectorKind::ShellExecution,
            callees: strings(&["exec", "spawn", "execSync", "spawnSync"]),
            receivers: strings(CHILD_PROCESS_RECEIVERS),
            enabled: true,
        },
    ]
}
