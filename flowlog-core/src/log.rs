use crate::events::RecordValue;
use crate::types::{BranchKey, LogPosition};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One immutable record on the log. Once appended, the bytes at a position
/// never change; only new records are appended after it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub position: LogPosition,
    pub key: BranchKey,
    pub value: RecordValue,
}

/// Append-only record log plus the branch-key index.
///
/// The index maps a branch key to the position of the record holding that
/// key's current payload. Index updates are explicit and owned by the
/// event-writing path: append first, then `index_put`, so a reader never
/// observes an index entry pointing past the durable tail. An unknown key
/// reads back as `None` — there is no sentinel position that could collide
/// with a real one.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append a record and return its position.
    async fn append(&self, key: BranchKey, value: RecordValue) -> Result<LogPosition>;

    /// Read the record at `position`. Reading past the durable tail is a
    /// hard error: it means an index was updated before its append became
    /// visible, which the ordering contract forbids.
    async fn read(&self, position: LogPosition) -> Result<LogRecord>;

    /// Sequential scan from `position` to the tail.
    async fn read_from(&self, position: LogPosition) -> Result<Vec<LogRecord>>;

    /// Position the next append will receive.
    async fn tail(&self) -> Result<LogPosition>;

    async fn index_put(&self, key: BranchKey, position: LogPosition) -> Result<()>;

    async fn index_get(&self, key: BranchKey) -> Result<Option<LogPosition>>;
}

// ─── MemoryLog ────────────────────────────────────────────────

#[derive(Default)]
struct MemoryLogInner {
    records: Vec<LogRecord>,
    index: HashMap<BranchKey, LogPosition>,
}

/// In-memory log for tests and single-node runs. Positions are dense from
/// 0, so the record vector doubles as the position space.
#[derive(Default)]
pub struct MemoryLog {
    inner: Mutex<MemoryLogInner>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for MemoryLog {
    async fn append(&self, key: BranchKey, value: RecordValue) -> Result<LogPosition> {
        let mut inner = self.inner.lock().map_err(|e| anyhow!("Lock: {}", e))?;
        let position = inner.records.len() as LogPosition;
        inner.records.push(LogRecord {
            position,
            key,
            value,
        });
        Ok(position)
    }

    async fn read(&self, position: LogPosition) -> Result<LogRecord> {
        let inner = self.inner.lock().map_err(|e| anyhow!("Lock: {}", e))?;
        match inner.records.get(position as usize) {
            Some(record) => Ok(record.clone()),
            None => bail!(
                "read past durable tail: position {} >= {}",
                position,
                inner.records.len()
            ),
        }
    }

    async fn read_from(&self, position: LogPosition) -> Result<Vec<LogRecord>> {
        let inner = self.inner.lock().map_err(|e| anyhow!("Lock: {}", e))?;
        let start = (position as usize).min(inner.records.len());
        Ok(inner.records[start..].to_vec())
    }

    async fn tail(&self) -> Result<LogPosition> {
        let inner = self.inner.lock().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(inner.records.len() as LogPosition)
    }

    async fn index_put(&self, key: BranchKey, position: LogPosition) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|e| anyhow!("Lock: {}", e))?;
        inner.index.insert(key, position);
        Ok(())
    }

    async fn index_get(&self, key: BranchKey) -> Result<Option<LogPosition>> {
        let inner = self.inner.lock().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(inner.index.get(&key).copied())
    }
}

// ─── LogReader ────────────────────────────────────────────────

/// Owned seek/next cursor for sequential replay. Each logical thread takes
/// its own reader; the underlying store is shared.
pub struct LogReader {
    store: Arc<dyn LogStore>,
    position: LogPosition,
}

impl LogReader {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store, position: 0 }
    }

    pub fn seek(&mut self, position: LogPosition) {
        self.position = position;
    }

    pub fn position(&self) -> LogPosition {
        self.position
    }

    /// Read the record at the cursor and advance. `None` once the cursor
    /// reaches the durable tail.
    pub async fn next(&mut self) -> Result<Option<LogRecord>> {
        if self.position >= self.store.tail().await? {
            return Ok(None);
        }
        let record = self.store.read(self.position).await?;
        self.position += 1;
        Ok(Some(record))
    }
}
