//! Process memory sampling and checkpoint tracking.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Source of "current memory usage" readings, in bytes.
pub trait MemoryProbe: Send + Sync {
    fn current_usage(&self) -> u64;
}

/// Resident set size of the current process.
///
/// Reads `VmRSS` from `/proc/self/status` on Linux. Other platforms report 0,
/// which disables ceiling enforcement.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemory;

impl MemoryProbe for ProcessMemory {
    fn current_usage(&self) -> u64 {
        rss_bytes().unwrap_or(0)
    }
}

#[cfg(target_os = "linux")]
fn rss_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

#[cfg(not(target_os = "linux"))]
fn rss_bytes() -> Option<u64> {
    None
}

/// A single usage reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemorySnapshot {
    pub usage: u64,
    pub at: DateTime<Utc>,
}

impl MemorySnapshot {
    pub fn take(probe: &dyn MemoryProbe) -> Self {
        Self {
            usage: probe.current_usage(),
            at: Utc::now(),
        }
    }
}

/// A named reading recorded by [`MemoryMonitor::checkpoint`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryCheckpoint {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub usage: u64,
}

/// Start/peak/end summary over all recorded checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryReport {
    pub start: u64,
    pub peak: u64,
    pub end: u64,
    pub ceiling: u64,
    pub exceeded: bool,
    pub checkpoints: Vec<MemoryCheckpoint>,
}

/// Records named usage checkpoints against a ceiling.
///
/// Shared by reference between workers; checkpoints are appended under a lock.
pub struct MemoryMonitor {
    ceiling: u64,
    probe: Arc<dyn MemoryProbe>,
    checkpoints: Mutex<Vec<MemoryCheckpoint>>,
}

impl MemoryMonitor {
    pub fn new(ceiling: u64, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            ceiling,
            probe,
            checkpoints: Mutex::new(Vec::new()),
        }
    }

    /// Record a named checkpoint and return the sampled usage.
    pub fn checkpoint(&self, name: impl Into<String>) -> u64 {
        let usage = self.probe.current_usage();
        let checkpoint = MemoryCheckpoint {
            name: name.into(),
            timestamp: Utc::now(),
            usage,
        };
        if usage > self.ceiling {
            tracing::warn!(
                "Memory checkpoint '{}' over ceiling: {} > {}",
                checkpoint.name,
                usage,
                self.ceiling
            );
        }
        self.lock().push(checkpoint);
        usage
    }

    /// True once any recorded checkpoint exceeded the ceiling.
    pub fn is_over_limit(&self) -> bool {
        self.peak() > self.ceiling
    }

    fn peak(&self) -> u64 {
        self.lock().iter().map(|c| c.usage).max().unwrap_or(0)
    }

    pub fn report(&self) -> MemoryReport {
        let checkpoints = self.lock().clone();
        let start = checkpoints.first().map(|c| c.usage).unwrap_or(0);
        let end = checkpoints.last().map(|c| c.usage).unwrap_or(0);
        let peak = checkpoints.iter().map(|c| c.usage).max().unwrap_or(0);

        MemoryReport {
            start,
            peak,
            end,
            ceiling: self.ceiling,
            exceeded: peak > self.ceiling,
            checkpoints,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MemoryCheckpoint>> {
        self.checkpoints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for MemoryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMonitor")
            .field("ceiling", &self.ceiling)
            .field("checkpoints", &self.lock().len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::MemoryProbe;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed usage sequence; the last value repeats once exhausted.
    pub struct SequenceProbe {
        values: Vec<u64>,
        next: AtomicUsize,
    }

    impl SequenceProbe {
        pub fn new(values: Vec<u64>) -> Self {
            Self {
                values,
                next: AtomicUsize::new(0),
            }
        }
    }

    impl MemoryProbe for SequenceProbe {
        fn current_usage(&self) -> u64 {
            let i = self.next.fetch_add(1, Ordering::SeqCst);
            self.values
                .get(i)
                .or_else(|| self.values.last())
                .copied()
                .unwrap_or(0)
        }
    }
}
