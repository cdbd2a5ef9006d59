//! Side-channel sinks for spying on agent chats.
//!
//! [`Orchestrator::spy_on_agents`](crate::orchestrator::Orchestrator::spy_on_agents) hands the
//! chat records it has not yet delivered to a [`ChatSink`]. Sinks only append; the orchestrator
//! never reads anything back.
//!
//! Three sinks ship with the crate:
//!
//! - [`JsonlFileSink`]: one JSON object per line, appended to a file
//! - [`LogSink`]: one `log::info!` line per record
//! - [`MemorySink`]: keeps records in memory for inspection

use crate::agentrelay::message::Chat;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Failure to persist chat records.
#[derive(Debug)]
pub enum SinkError {
    Io(io::Error),
    Serialization(serde_json::Error),
    /// Sink specific failure (poisoned lock, remote rejection, ...).
    Other(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "Chat sink I/O error: {}", e),
            SinkError::Serialization(e) => write!(f, "Chat sink serialization error: {}", e),
            SinkError::Other(msg) => write!(f, "Chat sink error: {}", msg),
        }
    }
}

impl Error for SinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            SinkError::Serialization(e) => Some(e),
            SinkError::Other(_) => None,
        }
    }
}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        SinkError::Io(e)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::Serialization(e)
    }
}

/// Destination for chat records, in chronological order.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn append(&self, records: &[Chat]) -> Result<(), SinkError>;
}

/// Appends chat records to a JSON Lines file.
#[derive(Debug, Clone)]
pub struct JsonlFileSink {
    path: PathBuf,
}

impl JsonlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/agent_chats_<team>.jsonl`
    pub fn for_team(dir: impl AsRef<Path>, team: &str) -> Self {
        Self::new(dir.as_ref().join(format!("agent_chats_{}.jsonl", team)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ChatSink for JsonlFileSink {
    async fn append(&self, records: &[Chat]) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&buffer)?;
        Ok(())
    }
}

/// Writes each record to the `log` facade at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl ChatSink for LogSink {
    async fn append(&self, records: &[Chat]) -> Result<(), SinkError> {
        for record in records {
            log::info!(
                "[chat] {} -> {}: {}",
                record.from_name,
                record.to_name,
                record.message
            );
        }
        Ok(())
    }
}

/// Keeps every appended record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Chat>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn records(&self) -> Vec<Chat> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatSink for MemorySink {
    async fn append(&self, records: &[Chat]) -> Result<(), SinkError> {
        let mut stored = self
            .records
            .lock()
            .map_err(|e| SinkError::Other(e.to_string()))?;
        stored.extend_from_slice(records);
        Ok(())
    }
}
