//! Remote storage for the answer table.
//!
//! The table lives as a single file behind a store that only supports
//! whole-file replacement guarded by a revision token. Everything that reads
//! or writes the table goes through [`RemoteStore`].

mod github;
mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::table::AnswerTable;

pub use github::GitHubStore;
pub use memory::MemoryStore;

/// Opaque token identifying one version of the remote file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Wrap a token returned by the store.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The table as read from the store, with the revision it was read at.
///
/// `revision` is `None` when the remote file does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Current rows.
    pub table: AnswerTable,
    /// Token to pass back to [`RemoteStore::commit`].
    pub revision: Option<Revision>,
}

/// A file store with optimistic-concurrency writes.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short backend name (for logging).
    fn name(&self) -> &'static str;

    /// Remote location of the table (for logging and error messages).
    fn location(&self) -> String;

    /// Read the current table and its revision.
    ///
    /// A missing file is an empty snapshot, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RemoteStore`] on authentication, network or
    /// server failures, or a table error if the content cannot be decoded.
    async fn fetch(&self) -> Result<Snapshot>;

    /// Replace the remote file with `table`.
    ///
    /// With `Some(revision)` the write only succeeds if the file is still at
    /// that revision; with `None` it only succeeds if the file does not exist.
    /// Returns the new revision.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Conflict`] when the precondition fails and
    /// [`crate::Error::RemoteStore`] for any other rejected write.
    async fn commit(&self, table: &AnswerTable, revision: Option<&Revision>) -> Result<Revision>;
}

/// Build the store selected by the configuration.
///
/// # Errors
///
/// Returns an error if the selected backend is missing required settings.
pub fn from_config(config: &Config) -> Result<Arc<dyn RemoteStore>> {
    match config.store.backend {
        StoreBackend::Github => Ok(Arc::new(GitHubStore::from_config(config)?)),
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
