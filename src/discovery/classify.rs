//! Static name/extension table used to classify discovered files.
//!
//! Lock and dependency manifests are recognised by exact file name and take
//! precedence over extension-based classification (`package.json` is a
//! dependency manifest, not a config file).

use serde::{Deserialize, Serialize};
use std::fmt;

/// What role a file plays in the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Code,
    Config,
    Dependency,
    Lock,
    Document,
    Other,
}

/// Source language inferred from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Shell,
    PowerShell,
    Ruby,
    Php,
    Go,
    Rust,
    Java,
    C,
    Cpp,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::TypeScript => "TypeScript",
            Language::JavaScript => "JavaScript",
            Language::Python => "Python",
            Language::Shell => "Shell",
            Language::PowerShell => "PowerShell",
            Language::Ruby => "Ruby",
            Language::Php => "PHP",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Java => "Java",
            Language::C => "C",
            Language::Cpp => "C++",
        };
        write!(f, "{}", name)
    }
}

/// Scan priority tier. Ordered so that `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Result of classifying a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: FileCategory,
    pub language: Option<Language>,
    pub priority: Priority,
}

/// Code extensions with their language and priority.
const CODE_EXTENSIONS: &[(&str, Language, Priority)] = &[
    ("ts", Language::TypeScript, Priority::High),
    ("tsx", Language::TypeScript, Priority::High),
    ("mts", Language::TypeScript, Priority::High),
    ("cts", Language::TypeScript, Priority::High),
    ("js", Language::JavaScript, Priority::High),
    ("jsx", Language::JavaScript, Priority::High),
    ("mjs", Language::JavaScript, Priority::High),
    ("cjs", Language::JavaScript, Priority::High),
    ("sh", Language::Shell, Priority::High),
    ("bash", Language::Shell, Priority::High),
    ("zsh", Language::Shell, Priority::High),
    ("ps1", Language::PowerShell, Priority::High),
    ("py", Language::Python, Priority::Medium),
    ("rb", Language::Ruby, Priority::Medium),
    ("php", Language::Php, Priority::Medium),
    ("go", Language::Go, Priority::Medium),
    ("rs", Language::Rust, Priority::Medium),
    ("java", Language::Java, Priority::Medium),
    ("c", Language::C, Priority::Low),
    ("h", Language::C, Priority::Low),
    ("cpp", Language::Cpp, Priority::Low),
    ("cc", Language::Cpp, Priority::Low),
    ("hpp", Language::Cpp, Priority::Low),
];

/// Dependency manifests, matched by exact file name.
const DEPENDENCY_FILES: &[&str] = &[
    "package.json",
    "requirements.txt",
    "pyproject.toml",
    "Pipfile",
    "setup.py",
    "Cargo.toml",
    "go.mod",
    "Gemfile",
    "composer.json",
    "pom.xml",
    "build.gradle",
];

/// Lock files, matched by exact file name.
const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "Pipfile.lock",
    "poetry.lock",
    "Cargo.lock",
    "go.sum",
    "Gemfile.lock",
    "composer.lock",
];

const CONFIG_EXTENSIONS: &[&str] = &[
    "json", "yaml", "yml", "toml", "ini", "cfg", "conf", "env", "xml",
];

const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst", "adoc", "html"];

/// Classify a file by its name alone.
pub fn classify(file_name: &str) -> Classification {
    if LOCK_FILES.contains(&file_name) {
        return Classification {
            category: FileCategory::Lock,
            language: None,
            priority: Priority::Low,
        };
    }

    if DEPENDENCY_FILES.contains(&file_name) {
        return Classification {
            category: FileCategory::Dependency,
            language: None,
            priority: Priority::Medium,
        };
    }

    let ext = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    };

    if let Some((_, language, priority)) = CODE_EXTENSIONS.iter().find(|(e, _, _)| *e == ext) {
        return Classification {
            category: FileCategory::Code,
            language: Some(*language),
            priority: *priority,
        };
    }

    let category = if CONFIG_EXTENSIONS.contains(&ext.as_str()) {
        FileCategory::Config
    } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
        FileCategory::Document
    } else {
        FileCategory::Other
    };

    Classification {
        category,
        language: None,
        priority: Priority::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_files() {
        let c = classify("index.ts");
        assert_eq!(c.category, FileCategory::Code);
        assert_eq!(c.language, Some(Language::TypeScript));
        assert_eq!(c.priority, Priority::High);

        let c = classify("App.JSX");
        assert_eq!(c.language, Some(Language::JavaScript));
    }

    #[test]
    fn test_lock_and_dependency_take_precedence() {
        assert_eq!(classify("package.json").category, FileCategory::Dependency);
        assert_eq!(classify("package-lock.json").category, FileCategory::Lock);
        assert_eq!(classify("tsconfig.json").category, FileCategory::Config);
        // setup.py would be Python code by extension.
        assert_eq!(classify("setup.py").category, FileCategory::Dependency);
    }

    #[test]
    fn test_other_categories() {
        assert_eq!(classify("README.md").category, FileCategory::Document);
        assert_eq!(classify("logo.png").category, FileCategory::Other);
        assert_eq!(classify("Makefile").category, FileCategory::Other);
        // A leading dot is a hidden name, not an extension.
        assert_eq!(classify(".env").category, FileCategory::Other);
    }
}
