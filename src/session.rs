//! Scan session aggregate and the report handed to presentation.

use crate::adapters::RepositoryMetadata;
use crate::discovery::{FileRecord, SkippedFile};
use crate::error::AcquisitionError;
use crate::reader::MemoryReport;
use crate::types::{Finding, OverallStatus, Severity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Everything one scan produced.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub root: PathBuf,
    /// Files considered, in traversal order.
    pub files: Vec<FileRecord>,
    pub skipped: Vec<SkippedFile>,
    /// Sorted by file path, source order within a file.
    pub findings: Vec<Finding>,
    /// Non-fatal problems. Present errors do not mean the scan failed.
    pub errors: Vec<String>,
    pub memory: MemoryReport,
    pub elapsed: Duration,
    /// Files read and parsed successfully.
    pub scanned_files: usize,
    /// False when the scan was cancelled before every file was processed.
    pub completed: bool,
    pub started_at: DateTime<Utc>,
}

impl ScanSession {
    pub fn overall_status(&self) -> OverallStatus {
        OverallStatus::from_findings(&self.findings)
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    /// Findings reported for one file.
    pub fn findings_for<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.file == file)
    }

    pub fn into_report(self, repository: Option<RepositoryMetadata>) -> ScanReport {
        let overall_status = self.overall_status();
        ScanReport {
            repository,
            scan_completed: self.completed,
            errors: self.errors,
            threats: self.findings,
            overall_status,
            scan_time: self.elapsed.as_millis() as u64,
            scanned_files: self.scanned_files,
            memory_usage: Some(self.memory),
            timestamp: self.started_at,
        }
    }
}

/// Result contract consumed by presentation layers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub repository: Option<RepositoryMetadata>,
    pub scan_completed: bool,
    pub errors: Vec<String>,
    pub threats: Vec<Finding>,
    pub overall_status: OverallStatus,
    /// Milliseconds.
    pub scan_time: u64,
    pub scanned_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<MemoryReport>,
    pub timestamp: DateTime<Utc>,
}

impl ScanReport {
    /// Report for a session that never got a tree to scan.
    pub fn failed(repository: Option<RepositoryMetadata>, error: String) -> Self {
        Self {
            repository,
            scan_completed: false,
            errors: vec![error],
            threats: Vec::new(),
            overall_status: OverallStatus::Safe,
            scan_time: 0,
            scanned_files: 0,
            memory_usage: None,
            timestamp: Utc::now(),
        }
    }

    /// One categorized error, e.g. `[not_found] Repository not found: ...`.
    pub fn acquisition_failed(url: &str, error: &AcquisitionError) -> Self {
        let repository = RepositoryMetadata {
            url: url.to_string(),
            ..Default::default()
        };
        Self::failed(Some(repository), format!("[{}] {}", error.category(), error))
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.threats.iter().map(|f| f.severity).max()
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.threats.iter().filter(|f| f.severity == severity).count()
    }
}
