//! In-process store with the same conditional-write contract as the remote one.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{RemoteStore, Revision, Snapshot};
use crate::error::{Error, Result};
use crate::table::AnswerTable;

const MEMORY_PATH: &str = "memory://respostas.csv";

/// The stored file: serialized CSV plus its revision.
#[derive(Debug)]
struct StoredFile {
    content: String,
    revision: Revision,
}

/// Answer table kept in memory.
///
/// Revisions are BLAKE3 hashes of the serialized content, so two writes of
/// identical bytes share a revision, like content-addressed remote stores.
#[derive(Debug, Default)]
pub struct MemoryStore {
    file: Mutex<Option<StoredFile>>,
    fetches: AtomicU64,
    commits: AtomicU64,
}

impl MemoryStore {
    /// Create a store whose file does not exist yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be serialized.
    pub fn seeded(table: &AnswerTable) -> Result<Self> {
        let content = table.to_csv()?;
        let revision = revision_of(&content);
        Ok(Self {
            file: Mutex::new(Some(StoredFile { content, revision })),
            ..Self::default()
        })
    }

    /// Raw CSV currently stored, if the file exists.
    pub async fn content(&self) -> Option<String> {
        self.file.lock().await.as_ref().map(|f| f.content.clone())
    }

    /// Number of `fetch` calls served.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Number of successful commits.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }
}

fn revision_of(content: &str) -> Revision {
    Revision::new(blake3::hash(content.as_bytes()).to_hex().to_string())
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn location(&self) -> String {
        MEMORY_PATH.to_string()
    }

    async fn fetch(&self) -> Result<Snapshot> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let guard = self.file.lock().await;
        match guard.as_ref() {
            None => Ok(Snapshot::default()),
            Some(file) => Ok(Snapshot {
                table: AnswerTable::from_csv(&file.content)?,
                revision: Some(file.revision.clone()),
            }),
        }
    }

    async fn commit(&self, table: &AnswerTable, revision: Option<&Revision>) -> Result<Revision> {
        let content = table.to_csv()?;
        let mut guard = self.file.lock().await;

        let current = guard.as_ref().map(|f| &f.revision);
        if current != revision {
            debug!(
                expected = ?revision.map(Revision::as_str),
                actual = ?current.map(Revision::as_str),
                "Rejecting stale write"
            );
            return Err(Error::conflict(MEMORY_PATH));
        }

        let new_revision = revision_of(&content);
        *guard = Some(StoredFile {
            content,
            revision: new_revision.clone(),
        });
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(new_revision)
    }
}
