use async_trait::async_trait;
use serde::Serialize;
use spin::Mutex;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::fs;
use tokio::io::AsyncWrite;
use uuid::Uuid;

/// An opaque, server-generated storage identifier.
///
/// Keys are high-entropy random values, never derived from client input, so
/// concurrent requests cannot collide without any cross-request locking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn generate() -> StorageKey {
        StorageKey(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A durably stored upload: the opaque key it lives under, the HTML-escaped
/// client file name kept for acknowledgements and logs, and the byte length
/// written.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub key: StorageKey,
    pub display_name: String,
    pub length: u64,
}

pub type SinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The durable-storage collaborator.
///
/// Writes are staged: `create` opens a writer for a staged object, `commit`
/// makes it durable under its key and `abort` discards it. The upload
/// orchestrator commits a batch only after every section validated, so a
/// rejected request never leaves committed artifacts behind.
#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn create(&self, key: &StorageKey) -> io::Result<SinkWriter>;
    async fn commit(&self, key: &StorageKey) -> io::Result<()>;
    async fn abort(&self, key: &StorageKey) -> io::Result<()>;
}

/// Local-filesystem sink. Stages under `<root>/staging/<key>` and commits by
/// renaming to `<root>/<key>`.
pub struct DiskSink {
    root: PathBuf,
}

impl DiskSink {
    pub fn new<P: AsRef<Path>>(root: P) -> DiskSink {
        DiskSink {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn staging_path(&self, key: &StorageKey) -> PathBuf {
        self.root.join("staging").join(key.as_str())
    }

    fn final_path(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.as_str())
    }
}

#[async_trait]
impl StorageSink for DiskSink {
    async fn create(&self, key: &StorageKey) -> io::Result<SinkWriter> {
        fs::create_dir_all(self.root.join("staging")).await?;
        let file = fs::File::create(self.staging_path(key)).await?;
        Ok(Box::new(file))
    }

    async fn commit(&self, key: &StorageKey) -> io::Result<()> {
        fs::rename(self.staging_path(key), self.final_path(key)).await
    }

    async fn abort(&self, key: &StorageKey) -> io::Result<()> {
        match fs::remove_file(self.staging_path(key)).await {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Staged,
    Committed,
    Aborted,
}

#[derive(Debug)]
struct MemoryEntry {
    data: Vec<u8>,
    state: EntryState,
}

/// In-memory sink for tests and embedders that do not need durability.
///
/// Aborted entries keep their bytes around so callers can observe how much
/// content ever reached the sink.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<HashMap<String, MemoryEntry>>>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    /// The bytes committed under `key`, if any.
    pub fn committed(&self, key: &StorageKey) -> Option<Vec<u8>> {
        let entries = self.entries.lock();
        entries
            .get(key.as_str())
            .filter(|entry| entry.state == EntryState::Committed)
            .map(|entry| entry.data.clone())
    }

    pub fn committed_count(&self) -> usize {
        let entries = self.entries.lock();
        entries
            .values()
            .filter(|entry| entry.state == EntryState::Committed)
            .count()
    }

    /// The largest byte count any single object ever accumulated, across all
    /// entry states.
    pub fn max_received(&self) -> usize {
        let entries = self.entries.lock();
        entries.values().map(|entry| entry.data.len()).max().unwrap_or(0)
    }
}

#[async_trait]
impl StorageSink for MemorySink {
    async fn create(&self, key: &StorageKey) -> io::Result<SinkWriter> {
        let mut entries = self.entries.lock();
        entries.insert(
            key.as_str().to_owned(),
            MemoryEntry {
                data: Vec::new(),
                state: EntryState::Staged,
            },
        );

        Ok(Box::new(MemoryWriter {
            key: key.as_str().to_owned(),
            entries: Arc::clone(&self.entries),
        }))
    }

    async fn commit(&self, key: &StorageKey) -> io::Result<()> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key.as_str()) {
            Some(entry) if entry.state == EntryState::Staged => {
                entry.state = EntryState::Committed;
                Ok(())
            }
            _ => Err(io::Error::new(io::ErrorKind::NotFound, "no staged object for key")),
        }
    }

    async fn abort(&self, key: &StorageKey) -> io::Result<()> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key.as_str()) {
            entry.state = EntryState::Aborted;
        }
        Ok(())
    }
}

struct MemoryWriter {
    key: String,
    entries: Arc<Mutex<HashMap<String, MemoryEntry>>>,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let mut entries = self.entries.lock();
        match entries.get_mut(&self.key) {
            Some(entry) if entry.state == EntryState::Staged => {
                entry.data.extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
            _ => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotFound,
                "no staged object for key",
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_generated_keys_are_distinct() {
        let a = StorageKey::generate();
        let b = StorageKey::generate();

        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[tokio::test]
    async fn test_memory_sink_commit_cycle() {
        let sink = MemorySink::new();
        let key = StorageKey::generate();

        let mut writer = sink.create(&key).await.unwrap();
        writer.write_all(b"hello").await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(sink.committed(&key), None);
        sink.commit(&key).await.unwrap();
        assert_eq!(sink.committed(&key), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_sink_abort_discards_commit() {
        let sink = MemorySink::new();
        let key = StorageKey::generate();

        let mut writer = sink.create(&key).await.unwrap();
        writer.write_all(b"partial").await.unwrap();
        drop(writer);

        sink.abort(&key).await.unwrap();
        assert!(sink.commit(&key).await.is_err());
        assert_eq!(sink.committed(&key), None);
        assert_eq!(sink.max_received(), 7);
    }
}
