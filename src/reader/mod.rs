//! Memory-bounded content acquisition.
//!
//! Small files are read in one call. Files at or above the stream threshold
//! are read chunk by chunk, re-sampling memory after every chunk and giving up
//! as soon as the ceiling is crossed.

pub mod memory;

pub use memory::{
    MemoryCheckpoint, MemoryMonitor, MemoryProbe, MemoryReport, MemorySnapshot, ProcessMemory,
};

use crate::discovery::FileRecord;
use crate::error::ReadError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;

/// Chunk size when streaming a single large file.
pub const STREAM_CHUNK_SIZE: usize = 64 * KIB as usize;
/// Chunk size when processing files in bulk.
pub const BULK_CHUNK_SIZE: usize = MIB as usize;
/// Files at or above this size are streamed.
pub const STREAM_THRESHOLD: u64 = 10 * MIB;
pub const DEFAULT_MEMORY_CEILING: u64 = 100 * MIB;

/// How the bytes of a file should be returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// UTF-8 text; undecodable files come back as raw bytes.
    #[default]
    Text,
    Binary,
}

/// Reader options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub encoding: Encoding,
    pub chunk_size: usize,
    pub memory_ceiling: u64,
    pub stream_threshold: u64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::streaming()
    }
}

impl ReadOptions {
    pub fn streaming() -> Self {
        Self {
            encoding: Encoding::Text,
            chunk_size: STREAM_CHUNK_SIZE,
            memory_ceiling: DEFAULT_MEMORY_CEILING,
            stream_threshold: STREAM_THRESHOLD,
        }
    }

    pub fn bulk() -> Self {
        Self {
            chunk_size: BULK_CHUNK_SIZE,
            ..Self::streaming()
        }
    }
}

/// Decoded file content.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

impl Content {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            Content::Bytes(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Content::Text(s) => s.len(),
            Content::Bytes(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A file record with its content. Consumed once by the parser.
#[derive(Debug)]
pub struct ContentUnit {
    pub record: FileRecord,
    pub content: Content,
    pub read_time: Duration,
    /// Usage sampled right after the read.
    pub memory: MemorySnapshot,
}

/// Progress report passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadProgress {
    pub bytes_read: u64,
    pub total_bytes: u64,
}

/// Optional per-chunk and per-progress hooks.
#[derive(Default)]
pub struct ReadCallbacks<'a> {
    on_chunk: Option<Box<dyn FnMut(&[u8]) + Send + 'a>>,
    on_progress: Option<Box<dyn FnMut(ReadProgress) + Send + 'a>>,
}

impl<'a> ReadCallbacks<'a> {
    pub fn on_chunk(mut self, f: impl FnMut(&[u8]) + Send + 'a) -> Self {
        self.on_chunk = Some(Box::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl FnMut(ReadProgress) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    fn chunk(&mut self, data: &[u8], bytes_read: u64, total_bytes: u64) {
        if let Some(f) = self.on_chunk.as_mut() {
            f(data);
        }
        if let Some(f) = self.on_progress.as_mut() {
            f(ReadProgress {
                bytes_read,
                total_bytes,
            });
        }
    }
}

/// Reads file content without exceeding a memory ceiling.
#[derive(Clone)]
pub struct ContentReader {
    options: ReadOptions,
    probe: Arc<dyn MemoryProbe>,
}

impl ContentReader {
    pub fn new(options: ReadOptions) -> Self {
        Self::with_probe(options, Arc::new(ProcessMemory))
    }

    pub fn with_probe(options: ReadOptions, probe: Arc<dyn MemoryProbe>) -> Self {
        Self { options, probe }
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub async fn read(&self, record: &FileRecord) -> Result<ContentUnit, ReadError> {
        self.read_with(record, ReadCallbacks::default()).await
    }

    /// Read with a deadline. Exceeding it is a per-file error.
    pub async fn read_with_timeout(
        &self,
        record: &FileRecord,
        timeout: Duration,
    ) -> Result<ContentUnit, ReadError> {
        match tokio::time::timeout(timeout, self.read(record)).await {
            Ok(result) => result,
            Err(_) => Err(ReadError::Timeout {
                path: record.display_path(),
                millis: timeout.as_millis() as u64,
            }),
        }
    }

    pub async fn read_with(
        &self,
        record: &FileRecord,
        mut callbacks: ReadCallbacks<'_>,
    ) -> Result<ContentUnit, ReadError> {
        let ceiling = self.options.memory_ceiling;
        let initial = self.probe.current_usage();
        if initial > ceiling {
            return Err(ReadError::InitialMemoryTooHigh {
                path: record.display_path(),
                usage: initial,
                ceiling,
            });
        }

        let start = Instant::now();
        let bytes = if record.size < self.options.stream_threshold {
            let data = tokio::fs::read(&record.path)
                .await
                .map_err(|source| self.io_error(record, source))?;
            let len = data.len() as u64;
            callbacks.chunk(&data, len, len);
            data
        } else {
            self.stream(record, &mut callbacks).await?
        };
        let read_time = start.elapsed();
        let memory = MemorySnapshot::take(self.probe.as_ref());

        tracing::debug!(
            "Read {} ({} bytes) in {:?}",
            record.display_path(),
            bytes.len(),
            read_time
        );

        Ok(ContentUnit {
            record: record.clone(),
            content: decode(bytes, self.options.encoding),
            read_time,
            memory,
        })
    }

    async fn stream(
        &self,
        record: &FileRecord,
        callbacks: &mut ReadCallbacks<'_>,
    ) -> Result<Vec<u8>, ReadError> {
        let ceiling = self.options.memory_ceiling;
        let mut file = tokio::fs::File::open(&record.path)
            .await
            .map_err(|source| self.io_error(record, source))?;

        let mut chunk = vec![0u8; self.options.chunk_size.max(1)];
        let mut data = Vec::with_capacity(record.size as usize);

        loop {
            let n = file
                .read(&mut chunk)
                .await
                .map_err(|source| self.io_error(record, source))?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
            callbacks.chunk(&chunk[..n], data.len() as u64, record.size);

            let usage = self.probe.current_usage();
            if usage > ceiling {
                tracing::warn!(
                    "Aborting read of {}: memory {} over ceiling {}",
                    record.display_path(),
                    usage,
                    ceiling
                );
                return Err(ReadError::MemoryLimitExceeded {
                    path: record.display_path(),
                    usage,
                    ceiling,
                    bytes_read: data.len() as u64,
                });
            }
        }

        Ok(data)
    }

    fn io_error(&self, record: &FileRecord, source: std::io::Error) -> ReadError {
        ReadError::Io {
            path: record.display_path(),
            source,
        }
    }
}

fn decode(bytes: Vec<u8>, encoding: Encoding) -> Content {
    match encoding {
        Encoding::Binary => Content::Bytes(bytes),
        Encoding::Text => match String::from_utf8(bytes) {
            Ok(mut text) => {
                if text.starts_with('\u{feff}') {
                    text.drain(..'\u{feff}'.len_utf8());
                }
                Content::Text(text)
            }
            Err(e) => Content::Bytes(e.into_bytes()),
        },
    }
}
