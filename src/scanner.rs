//! Scan orchestration: discover, read, parse and scan, then aggregate.
//!
//! Per-file work runs on a bounded worker pool. A file that cannot be read or
//! parsed adds one error string and no findings; the rest of the scan goes on.

use crate::adapters::{AcquireRequest, RepositorySource};
use crate::analyzers::ast::builder::Dialect;
use crate::analyzers::AstAnalyzer;
use crate::config::ScanConfig;
use crate::discovery::{DiscoveryResult, FileRecord, FileWalker};
use crate::error::{Result, ScanError};
use crate::reader::{ContentReader, MemoryMonitor, MemoryProbe, ProcessMemory};
use crate::rules::{loader::load_rule_set, RuleSet};
use crate::session::{ScanReport, ScanSession};
use crate::types::Finding;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
pub use tokio_util::sync::CancellationToken;

/// Result of one file's read, parse and scan.
enum FileOutcome {
    Scanned(Vec<Finding>),
    Failed(String),
}

/// Main scanner.
pub struct Scanner {
    config: ScanConfig,
    walker: Arc<FileWalker>,
    analyzer: Arc<AstAnalyzer>,
    probe: Arc<dyn MemoryProbe>,
}

impl Scanner {
    /// Scanner with default configuration and the built-in rules.
    pub fn new() -> Result<Self> {
        Self::with_config(ScanConfig::default())
    }

    /// Scanner using `config`, loading `rules_file` when set.
    pub fn with_config(config: ScanConfig) -> Result<Self> {
        let rules = load_rule_set(config.rules_file.as_deref())?;
        Self::with_rules(config, &rules)
    }

    pub fn with_rules(config: ScanConfig, rules: &RuleSet) -> Result<Self> {
        let walker = FileWalker::new(config.discovery.clone())?;
        let analyzer = AstAnalyzer::with_rules(config.parser.clone(), rules);
        Ok(Self {
            config,
            walker: Arc::new(walker),
            analyzer: Arc::new(analyzer),
            probe: Arc::new(ProcessMemory),
        })
    }

    /// Replace the memory source used for the ceiling and checkpoints.
    pub fn with_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan a local directory.
    pub async fn scan_path(&self, root: &Path) -> Result<ScanSession> {
        self.scan_with_cancel(root, CancellationToken::new()).await
    }

    /// Scan a local directory until done or cancelled. A cancelled scan keeps
    /// what it has and reports how many files it never reached.
    pub async fn scan_with_cancel(
        &self,
        root: &Path,
        token: CancellationToken,
    ) -> Result<ScanSession> {
        let deadline = self.config.limits.scan_timeout_secs.map(|secs| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                tracing::warn!("Scan timeout of {} s reached, cancelling", secs);
                token.cancel();
            })
        });

        let result = self.run(root, &token).await;

        if let Some(handle) = deadline {
            handle.abort();
        }
        result
    }

    /// Acquire a repository, scan it and release it. Acquisition failures
    /// become a report with `scan_completed = false` and one error.
    pub async fn scan_repository(
        &self,
        source: &dyn RepositorySource,
        request: &AcquireRequest,
    ) -> ScanReport {
        let acquired = match source.acquire(request).await {
            Ok(acquired) => acquired,
            Err(e) => {
                tracing::warn!("Acquisition of {} failed: {}", request.url, e);
                return ScanReport::acquisition_failed(&request.url, &e);
            }
        };

        let result = self.scan_path(&acquired.root).await;
        source.cleanup(&acquired).await;

        match result {
            Ok(session) => session.into_report(Some(acquired.metadata)),
            Err(e) => ScanReport::failed(Some(acquired.metadata), e.to_string()),
        }
    }

    async fn run(&self, root: &Path, token: &CancellationToken) -> Result<ScanSession> {
        let started_at = Utc::now();
        let start = Instant::now();
        let monitor = MemoryMonitor::new(self.config.reader.memory_ceiling, self.probe.clone());
        monitor.checkpoint("session_start");

        tracing::info!("Scanning {}", root.display());
        let discovery = self.discover(root).await?;
        monitor.checkpoint("post_discovery");

        let DiscoveryResult {
            files,
            skipped,
            errors: mut session_errors,
            ..
        } = discovery;

        let candidates: Vec<FileRecord> = files
            .iter()
            .filter(|f| Dialect::from_path(&f.relative_path, self.config.parser.jsx).is_some())
            .cloned()
            .collect();
        let total = candidates.len();
        tracing::info!("Discovered {} files, {} to scan", files.len(), total);

        let (outcomes, not_started) = self.scan_files(candidates, token).await;
        monitor.checkpoint("post_scan");

        let mut findings = Vec::new();
        let mut scanned_files = 0;
        for outcome in outcomes {
            match outcome {
                FileOutcome::Scanned(file_findings) => {
                    scanned_files += 1;
                    findings.extend(file_findings);
                }
                FileOutcome::Failed(error) => session_errors.push(error),
            }
        }
        // Stable: source order within a file is kept.
        findings.sort_by(|a, b| a.file.cmp(&b.file));

        let completed = not_started == 0;
        if !completed {
            session_errors.push(format!(
                "Scan cancelled: {} of {} files not scanned",
                not_started, total
            ));
        }

        monitor.checkpoint("session_end");
        let memory = monitor.report();
        let elapsed = start.elapsed();

        tracing::info!(
            "Scanned {} files in {:?}: {} findings, {} errors",
            scanned_files,
            elapsed,
            findings.len(),
            session_errors.len()
        );

        Ok(ScanSession {
            root: root.to_path_buf(),
            files,
            skipped,
            findings,
            errors: session_errors,
            memory,
            elapsed,
            scanned_files,
            completed,
            started_at,
        })
    }

    async fn discover(&self, root: &Path) -> Result<DiscoveryResult> {
        let walker = self.walker.clone();
        let root = root.to_path_buf();
        let result = tokio::task::spawn_blocking(move || walker.walk(&root))
            .await
            .map_err(|e| ScanError::Worker(e.to_string()))??;
        Ok(result)
    }

    /// Run the per-file pipeline on at most `max_concurrency` files at once.
    /// Returns outcomes in input order and the count of files never started.
    async fn scan_files(
        &self,
        candidates: Vec<FileRecord>,
        token: &CancellationToken,
    ) -> (Vec<FileOutcome>, usize) {
        let total = candidates.len();
        let semaphore = Arc::new(Semaphore::new(self.config.limits.max_concurrency.max(1)));
        let reader = ContentReader::with_probe(self.config.reader.read_options(), self.probe.clone());
        let timeout = self.config.reader.file_timeout();
        let mut set = JoinSet::new();
        let mut not_started = 0;

        for (index, record) in candidates.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let permit = match permit {
                Some(permit) => permit,
                None => {
                    not_started = total - index;
                    break;
                }
            };

            let reader = reader.clone();
            let analyzer = self.analyzer.clone();
            set.spawn(async move {
                let _permit = permit;
                (index, scan_file(reader, analyzer, record, timeout).await)
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::warn!("Worker task failed: {}", e);
                    let message = format!("Worker task failed: {}", e);
                    outcomes.push((usize::MAX, FileOutcome::Failed(message)));
                }
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);

        (outcomes.into_iter().map(|(_, o)| o).collect(), not_started)
    }
}

/// Read, parse and scan one file. The content is dropped before returning.
async fn scan_file(
    reader: ContentReader,
    analyzer: Arc<AstAnalyzer>,
    record: FileRecord,
    timeout: Duration,
) -> FileOutcome {
    let file = record.display_path();

    let unit = match reader.read_with_timeout(&record, timeout).await {
        Ok(unit) => unit,
        Err(e) => {
            let message = error_chain(&e);
            tracing::warn!("{}", message);
            return FileOutcome::Failed(message);
        }
    };
    tracing::debug!(
        file = %file,
        bytes = unit.content.len(),
        read_ms = unit.read_time.as_millis() as u64,
        "Read file"
    );

    match tokio::task::spawn_blocking(move || analyzer.analyze_unit(&unit)).await {
        Ok(Ok(findings)) => FileOutcome::Scanned(findings),
        Ok(Err(e)) => {
            tracing::warn!("{}", e);
            FileOutcome::Failed(e.to_string())
        }
        Err(e) => FileOutcome::Failed(format!("Analysis of {} failed: {}", file, e)),
    }
}

/// An error and its sources, joined with `: `.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LocalSource;
    use crate::reader::memory::test_support::SequenceProbe;
    use crate::reader::MIB;
    use crate::types::{OverallStatus, Severity};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn repo(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn scanner() -> Scanner {
        Scanner::new()
            .unwrap()
            .with_probe(Arc::new(SequenceProbe::new(vec![10 * MIB])))
    }

    #[tokio::test]
    async fn test_two_file_scan() {
        let dir = repo(&[("a.ts", "eval(userInput);\n"), ("b.ts", "console.log(\"hi\");\n")]);
        let session = scanner().scan_path(dir.path()).await.unwrap();

        assert!(session.completed);
        assert!(session.errors.is_empty(), "{:?}", session.errors);
        assert_eq!(session.scanned_files, 2);
        assert_eq!(session.findings.len(), 1);
        let finding = &session.findings[0];
        assert_eq!(finding.subcategory, "eval_usage");
        assert_eq!(finding.file, "a.ts");
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(session.findings_for("b.ts").count(), 0);
        assert_eq!(session.overall_status(), OverallStatus::Unsafe);
    }

    #[tokio::test]
    async fn test_malformed_file_is_one_error() {
        let dir = repo(&[
            ("a.js", "function (( {\n"),
            ("b.js", "setTimeout('run()', 10);\n"),
            ("c.md", "not code"),
        ]);
        let session = scanner().scan_path(dir.path()).await.unwrap();

        assert!(session.completed);
        assert_eq!(session.errors.len(), 1);
        assert!(session.errors[0].contains("a.js"));
        assert_eq!(session.scanned_files, 1);
        assert_eq!(session.findings.len(), 1);
        assert_eq!(session.findings[0].file, "b.js");
        assert_eq!(session.overall_status(), OverallStatus::Warning);
        assert_eq!(session.files.len(), 3);
    }

    #[tokio::test]
    async fn test_findings_sorted_by_file() {
        let dir = repo(&[
            ("z.ts", "exec(a);\neval(b);\n"),
            ("lib/m.js", "spawn(c);\n"),
            ("a.ts", "new Function(d);\n"),
        ]);
        let session = scanner().scan_path(dir.path()).await.unwrap();
        let order: Vec<(&str, &str)> = session
            .findings
            .iter()
            .map(|f| (f.file.as_str(), f.subcategory.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a.ts", "function_constructor"),
                ("lib/m.js", "shell_execution"),
                ("z.ts", "shell_execution"),
                ("z.ts", "eval_usage"),
            ]
        );
    }

    #[tokio::test]
    async fn test_memory_checkpoints() {
        let dir = repo(&[("a.ts", "let a = 1;\n")]);
        let session = scanner().scan_path(dir.path()).await.unwrap();
        let names: Vec<&str> = session
            .memory
            .checkpoints
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["session_start", "post_discovery", "post_scan", "session_end"]);
        assert_eq!(session.memory.peak, 10 * MIB);
        assert!(!session.memory.exceeded);
    }

    #[tokio::test]
    async fn test_memory_ceiling_fails_reads() {
        let dir = repo(&[("a.ts", "eval(x);\n")]);
        let session = Scanner::new()
            .unwrap()
            .with_probe(Arc::new(SequenceProbe::new(vec![500 * MIB])))
            .scan_path(dir.path())
            .await
            .unwrap();

        assert!(session.completed);
        assert!(session.findings.is_empty());
        assert_eq!(session.errors.len(), 1);
        assert!(session.errors[0].contains("Initial memory too high"));
        assert!(session.memory.exceeded);
    }

    #[tokio::test]
    async fn test_cancelled_scan_keeps_partial_results() {
        let dir = repo(&[("a.ts", "eval(x);\n"), ("b.ts", "eval(y);\n")]);
        let token = CancellationToken::new();
        token.cancel();

        let session = scanner()
            .scan_with_cancel(dir.path(), token)
            .await
            .unwrap();
        assert!(!session.completed);
        assert_eq!(session.scanned_files, 0);
        assert_eq!(session.errors, vec!["Scan cancelled: 2 of 2 files not scanned"]);
    }

    /// Cancels `token` on the given probe sample, which lands inside a file read.
    struct CancelOnSample {
        token: CancellationToken,
        at: usize,
        calls: AtomicUsize,
    }

    impl MemoryProbe for CancelOnSample {
        fn current_usage(&self) -> u64 {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.at {
                self.token.cancel();
            }
            10 * MIB
        }
    }

    #[tokio::test]
    async fn test_cancel_during_scan_keeps_finished_files() {
        let dir = repo(&[
            ("a.ts", "eval(x);\n"),
            ("b.ts", "eval(y);\n"),
            ("c.ts", "eval(z);\n"),
        ]);
        let token = CancellationToken::new();
        // Samples 1 and 2 are the start and discovery checkpoints; 3 is the
        // first read's initial check.
        let probe = CancelOnSample {
            token: token.clone(),
            at: 3,
            calls: AtomicUsize::new(0),
        };
        let mut config = ScanConfig::default();
        config.limits.max_concurrency = 1;

        let session = Scanner::with_config(config)
            .unwrap()
            .with_probe(Arc::new(probe))
            .scan_with_cancel(dir.path(), token)
            .await
            .unwrap();

        assert!(!session.completed);
        assert_eq!(session.scanned_files, 1);
        assert_eq!(session.findings.len(), 1);
        assert_eq!(session.findings[0].file, "a.ts");
        assert_eq!(session.errors, vec!["Scan cancelled: 2 of 3 files not scanned"]);
        assert_eq!(session.overall_status(), OverallStatus::Unsafe);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_timeout_is_file_error() {
        let dir = repo(&[("a.ts", "eval(x);\n")]);
        let pipe = dir.path().join("pipe.js");
        assert!(std::process::Command::new("mkfifo")
            .arg(&pipe)
            .status()
            .unwrap()
            .success());
        let mut record = FileWalker::new(Default::default())
            .unwrap()
            .walk(dir.path())
            .unwrap()
            .files
            .remove(0);
        record.path = pipe.clone();
        record.relative_path = "pipe.js".into();

        let reader = ContentReader::with_probe(
            Default::default(),
            Arc::new(SequenceProbe::new(vec![10 * MIB])),
        );
        let outcome = scan_file(
            reader,
            Arc::new(AstAnalyzer::default()),
            record,
            Duration::from_millis(50),
        )
        .await;
        match outcome {
            FileOutcome::Failed(message) => {
                assert_eq!(message, "Timed out reading pipe.js after 50 ms")
            }
            FileOutcome::Scanned(_) => panic!("read should have timed out"),
        }

        drop(fs::OpenOptions::new().write(true).open(&pipe).unwrap());
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let result = scanner().scan_path(Path::new("/no/such/root")).await;
        assert!(matches!(result, Err(ScanError::Discovery(_))));
    }

    #[tokio::test]
    async fn test_scan_repository() {
        let dir = repo(&[("index.js", "require('child_process').exec(cmd);\n")]);
        let scanner = scanner();

        let report = scanner
            .scan_repository(&LocalSource::new(), &AcquireRequest::new(dir.path().to_str().unwrap()))
            .await;
        assert!(report.scan_completed);
        assert_eq!(report.overall_status, OverallStatus::Unsafe);
        assert_eq!(report.scanned_files, 1);
        assert_eq!(report.repository.unwrap().file_count, 1);

        let report = scanner
            .scan_repository(&LocalSource::new(), &AcquireRequest::new("git@example.com:a/b.git"))
            .await;
        assert!(!report.scan_completed);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("[invalid_url]"));
    }

    #[tokio::test]
    async fn test_cancellation_token_wakes_waiters() {
        let token = CancellationToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(token.is_cancelled());
    }
}
