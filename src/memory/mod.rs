//! Assistant memory
//!
//! Two containers with different lifetimes:
//! - a bounded short-term buffer that lives only as long as the process
//! - a long-term log that is written through to durable storage on every append
//!
//! The durable document keeps the layout
//!
//! ```text
//! {
//!     "conversations": [ {timestamp, content}, ... ],
//!     "learned_preferences": { key: value, ... },
//!     "system_interactions": [ {timestamp, content}, ... ]
//! }
//! ```

mod buffer;
mod storage;

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use buffer::ShortTermBuffer;
pub use storage::{DurableStorage, JsonFileStorage, StorageError};

use crate::{Error, Result};

/// Timestamp layout, matching naive local ISO-8601 with microseconds
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// A timestamped memory, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// ISO-8601 creation time
    pub timestamp: String,

    /// Arbitrary structured content
    pub content: Value,
}

impl MemoryEntry {
    /// Create an entry stamped with the current local time
    #[must_use]
    pub fn now(content: Value) -> Self {
        Self {
            timestamp: chrono::Local::now()
                .naive_local()
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            content,
        }
    }

    /// Parse the timestamp back into a date-time
    #[must_use]
    pub fn parsed_timestamp(&self) -> Option<chrono::NaiveDateTime> {
        chrono::NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).ok()
    }
}

/// The durable document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongTermLog {
    /// Recorded exchanges, oldest first
    #[serde(default)]
    pub conversations: Vec<MemoryEntry>,

    /// Free-form preferences; kept as loaded, never written by the assistant
    #[serde(default)]
    pub learned_preferences: Map<String, Value>,

    /// System events; kept as loaded, never written by the assistant
    #[serde(default)]
    pub system_interactions: Vec<MemoryEntry>,
}

/// Which container an entry goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// Bounded, never persisted
    ShortTerm,
    /// Appended to `conversations` and flushed before returning
    LongTerm,
}

/// Owns both memory containers
///
/// Safe to share behind an `Arc`: durable appends hold the log lock across
/// append and flush, so writers never interleave partial documents.
pub struct MemoryStore {
    storage: Box<dyn DurableStorage>,
    short_term: Mutex<ShortTermBuffer>,
    long_term: Mutex<LongTermLog>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("short_term", &lock(&self.short_term).len())
            .field("conversations", &lock(&self.long_term).conversations.len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Open the store, loading the long-term log from `storage`
    ///
    /// # Errors
    ///
    /// Returns error if the stored document exists but cannot be read or parsed
    pub fn open(storage: impl DurableStorage + 'static, short_term_capacity: usize) -> Result<Self> {
        let long_term = Self::load(&storage)?;

        tracing::info!(
            conversations = long_term.conversations.len(),
            short_term_capacity,
            "memory loaded"
        );

        Ok(Self {
            storage: Box::new(storage),
            short_term: Mutex::new(ShortTermBuffer::new(short_term_capacity)),
            long_term: Mutex::new(long_term),
        })
    }

    /// Read the durable document
    ///
    /// A missing document yields the empty default.
    ///
    /// # Errors
    ///
    /// Returns error on any other read or parse failure
    pub fn load(storage: &dyn DurableStorage) -> Result<LongTermLog> {
        match storage.read() {
            Ok(log) => Ok(log),
            Err(StorageError::NotFound) => {
                tracing::debug!("no memory document yet, starting empty");
                Ok(LongTermLog::default())
            }
            Err(e) => Err(Error::Memory(e.to_string())),
        }
    }

    /// Record `content` with the current timestamp
    ///
    /// Never fails. A failed flush of the long-term log is logged and the
    /// entry is kept in memory only.
    pub fn add_memory(&self, kind: MemoryKind, content: Value) {
        let entry = MemoryEntry::now(content);

        match kind {
            MemoryKind::ShortTerm => {
                if let Some(evicted) = lock(&self.short_term).push(entry) {
                    tracing::trace!(timestamp = %evicted.timestamp, "short-term memory evicted");
                }
            }
            MemoryKind::LongTerm => {
                let mut log = lock(&self.long_term);
                log.conversations.push(entry);

                if let Err(e) = self.storage.write(&log) {
                    tracing::error!(error = %e, "memory save error");
                }
            }
        }
    }

    /// Short-term entries, oldest first
    #[must_use]
    pub fn short_term(&self) -> Vec<MemoryEntry> {
        lock(&self.short_term).iter().cloned().collect()
    }

    /// Short-term buffer capacity
    #[must_use]
    pub fn short_term_capacity(&self) -> usize {
        lock(&self.short_term).capacity()
    }

    /// Snapshot of the long-term log
    #[must_use]
    pub fn long_term(&self) -> LongTermLog {
        lock(&self.long_term).clone()
    }

    /// The last `limit` conversations, oldest first
    #[must_use]
    pub fn recent_conversations(&self, limit: usize) -> Vec<MemoryEntry> {
        let log = lock(&self.long_term);
        let skip = log.conversations.len().saturating_sub(limit);
        log.conversations[skip..].to_vec()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    /// Storage that counts writes and fails all of them
    #[derive(Default)]
    struct FailingStorage {
        writes: Arc<AtomicUsize>,
    }

    impl DurableStorage for FailingStorage {
        fn read(&self) -> std::result::Result<LongTermLog, StorageError> {
            Err(StorageError::NotFound)
        }

        fn write(&self, _log: &LongTermLog) -> std::result::Result<(), StorageError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Write("disk full".to_string()))
        }
    }

    #[test]
    fn test_short_term_keeps_last_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(JsonFileStorage::new(dir.path().join("m.json")), 3).unwrap();

        for n in 0..5 {
            store.add_memory(MemoryKind::ShortTerm, json!(n));
        }

        let contents: Vec<_> = store.short_term().into_iter().map(|e| e.content).collect();
        assert_eq!(contents, vec![json!(2), json!(3), json!(4)]);
        // short-term never touches disk
        assert!(!dir.path().join("m.json").exists());
    }

    #[test]
    fn test_failed_flush_keeps_entry() {
        let writes = Arc::new(AtomicUsize::new(0));
        let storage = FailingStorage {
            writes: Arc::clone(&writes),
        };
        let store = MemoryStore::open(storage, 10).unwrap();

        store.add_memory(MemoryKind::LongTerm, json!("remember me"));

        assert_eq!(writes.load(Ordering::SeqCst), 1);
        assert_eq!(store.long_term().conversations.len(), 1);
        assert_eq!(store.long_term().conversations[0].content, json!("remember me"));
    }

    #[test]
    fn test_timestamp_is_iso8601() {
        let entry = MemoryEntry::now(json!(null));
        assert!(entry.parsed_timestamp().is_some());
        assert!(entry.timestamp.contains('T'));
    }

    #[test]
    fn test_recent_conversations() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(JsonFileStorage::new(dir.path().join("m.json")), 3).unwrap();
        for n in 0..4 {
            store.add_memory(MemoryKind::LongTerm, json!(n));
        }

        let recent: Vec<_> = store
            .recent_conversations(2)
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(recent, vec![json!(2), json!(3)]);
        assert_eq!(store.recent_conversations(10).len(), 4);
    }
}
